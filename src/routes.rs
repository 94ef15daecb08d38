use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::charts::{self, ChartError};
use crate::evaluator::RiskEvaluator;
use crate::resolver::InputResolver;
use crate::types::{
    round_percent, FeatureSource, Mine, PredictionRequest, PredictionResult, RequestError,
};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const MAP_SCRIPT: &str = include_str!("../static/js/script.js");

// ---------- Server state ----------

/// Everything a request needs, built once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    resolver: Arc<InputResolver>,
    evaluator: RiskEvaluator,
    mines: Arc<Vec<Mine>>,
    log_features: bool,
}

impl AppState {
    pub fn new(
        resolver: InputResolver,
        evaluator: RiskEvaluator,
        mines: Vec<Mine>,
        log_features: bool,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            evaluator,
            mines: Arc::new(mines),
            log_features,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict))
        .route("/static/js/script.js", get(script))
        .with_state(state)
}

// ---------- Errors ----------

/// Anything that stops `/predict` from producing a result. All map to 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed request body: {0}")]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error("failed to render page: {0}")]
    Page(#[from] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

// ---------- Handlers ----------

async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    Ok(Html(render_index(&state.mines)?))
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], MAP_SCRIPT)
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(req) = payload?;
    let source = req.feature_source()?;
    let mut rng = StdRng::from_entropy();

    let inputs = state.resolver.resolve(&source, &mut rng).await;
    let eval = state.evaluator.evaluate(&inputs.features, &mut rng);
    if state.log_features {
        let path = match &source {
            FeatureSource::Explicit(_) => "explicit",
            FeatureSource::Derived(_) => "derived",
        };
        info!(
            name = req.location_name(),
            path,
            slope_angle = inputs.features.slope_angle,
            rainfall = inputs.features.rainfall,
            rock_type_granite = inputs.features.rock_type_granite,
            rainfall_origin = ?inputs.rainfall_origin,
            risk = ?eval.risk,
            probability = eval.probability,
            outcome = ?eval.outcome,
            "prediction"
        );
    }

    let charts = charts::render(
        eval.risk,
        eval.probability,
        inputs.features.slope_angle,
        inputs.features.rainfall,
    )?;

    Ok(Json(PredictionResult {
        name: req.location_name().to_string(),
        lat: req.lat,
        lon: req.lon,
        slope_angle: inputs.features.slope_angle,
        rainfall: inputs.features.rainfall,
        rock_type: inputs.rock_type,
        risk: eval.risk,
        probability: round_percent(eval.probability),
        graph_prob: charts.probability,
        graph_feat: charts.features,
    }))
}

// ---------- Page ----------

/// Fill the index template with the mine list and its JSON for the map.
pub fn render_index(mines: &[Mine]) -> Result<String, serde_json::Error> {
    // `</` would close the surrounding script element
    let mines_json = serde_json::to_string(mines)?.replace("</", "<\\/");
    let items: String = mines
        .iter()
        .map(|m| {
            format!(
                "<li>{} <span class=\"coords\">({}, {})</span></li>\n",
                escape_html(&m.name),
                m.lat,
                m.lon
            )
        })
        .collect();
    Ok(INDEX_TEMPLATE
        .replace("{{mine_items}}", &items)
        .replace("{{mines_json}}", &mines_json))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_lists_mines_and_embeds_json() {
        let page = render_index(&crate::types::default_mines()).unwrap();
        assert!(page.contains("<li>Jharia Coal Mine"));
        assert!(page.contains(r#""name":"Bailadila Iron Ore Mine","lat":18.7167,"lon":81.2333"#));
        assert!(!page.contains("{{"));
    }

    #[test]
    fn mine_names_cannot_break_out() {
        let mines = vec![Mine {
            name: "</script><b>x</b>".into(),
            lat: 0.0,
            lon: 0.0,
        }];
        let page = render_index(&mines).unwrap();
        assert!(page.contains("&lt;/script&gt;&lt;b&gt;x&lt;/b&gt;"));
        assert!(page.contains(r#"<\/script><b>x<\/b>"#));
    }
}
