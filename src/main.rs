use anyhow::Context;
use tracing_subscriber::EnvFilter;

use rockfall_predictor::{
    charts,
    config::AppConfig,
    evaluator::RiskEvaluator,
    model,
    resolver::InputResolver,
    router,
    types::FeatureVector,
    weather::WeatherClient,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = AppConfig::from_env().context("invalid configuration")?;
    let mines = cfg.mines()?;

    let evaluator = match model::load(&cfg.model_path, cfg.meta_path.as_deref()) {
        Ok(clf) => {
            tracing::info!(
                "loaded model {}; feat_list[{}]: {:?}",
                cfg.model_path.display(),
                clf.feature_names().len(),
                clf.feature_names()
            );
            RiskEvaluator::new(clf)
        }
        Err(e) if cfg.require_model => {
            return Err(e).with_context(|| format!("failed to load {}", cfg.model_path.display()))
        }
        Err(e) => {
            tracing::error!(
                "model unavailable ({}); every prediction will use the fallback",
                e
            );
            RiskEvaluator::without_model()
        }
    };

    // Warmup so a column mismatch shows up before the first request
    if evaluator.has_model() {
        match evaluator.try_evaluate(&FeatureVector::probe()) {
            Ok((risk, p)) => tracing::info!("warmup evaluation ok: {:?} {:.2}%", risk, p),
            Err(e) => tracing::warn!("warmup evaluation failed: {}", e),
        }
    }
    charts::register_fonts()?;

    let weather = WeatherClient::new(cfg.weather_base_url.clone(), cfg.weather_timeout)?;
    let state = AppState::new(
        InputResolver::new(weather),
        evaluator,
        mines,
        cfg.log_features,
    );
    let app = router(state);

    tracing::info!("listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
