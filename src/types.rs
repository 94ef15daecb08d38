use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LOCATION_NAME: &str = "Selected Location";
pub const DEFAULT_ROCK_TYPE: &str = "Other";
pub const GRANITE: &str = "Granite";

/// Column names the classifier was trained on, in training order.
pub const FEATURE_NAMES: [&str; 3] = ["slope_angle", "rainfall", "rock_type_granite"];

// ---------- Request ----------

/// `/predict` body. Numeric fields accept numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub lat: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub lon: f64,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub rainfall: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub slope_angle: Option<f64>,
    #[serde(default)]
    pub rock_type: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("slope_angle is required when rainfall is supplied")]
    MissingSlopeAngle,
}

/// Where the feature values of a request come from. A request that carries
/// `rainfall` supplies every feature itself; anything else is a map click
/// and gets its features derived from the forecast and random defaults.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureSource {
    Explicit(ExplicitFeatures),
    Derived(Location),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplicitFeatures {
    pub rainfall: f64,
    pub slope_angle: f64,
    pub rock_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl PredictionRequest {
    pub fn location_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_LOCATION_NAME)
    }

    pub fn location(&self) -> Location {
        Location {
            lat: self.lat,
            lon: self.lon,
        }
    }

    pub fn feature_source(&self) -> Result<FeatureSource, RequestError> {
        let Some(rainfall) = self.rainfall else {
            return Ok(FeatureSource::Derived(self.location()));
        };
        let slope_angle = self.slope_angle.ok_or(RequestError::MissingSlopeAngle)?;
        Ok(FeatureSource::Explicit(ExplicitFeatures {
            rainfall,
            slope_angle,
            rock_type: self
                .rock_type
                .clone()
                .unwrap_or_else(|| DEFAULT_ROCK_TYPE.to_string()),
        }))
    }
}

// ---------- Features ----------

/// The only input shape the risk evaluator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub slope_angle: f64,
    pub rainfall: f64,
    pub rock_type_granite: u8,
}

impl FeatureVector {
    pub fn new(slope_angle: f64, rainfall: f64, rock_type: &str) -> Self {
        Self {
            slope_angle,
            rainfall,
            rock_type_granite: granite_flag(rock_type),
        }
    }

    /// Look a feature up by its training column name.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "slope_angle" => Some(self.slope_angle),
            "rainfall" => Some(self.rainfall),
            "rock_type_granite" => Some(f64::from(self.rock_type_granite)),
            _ => None,
        }
    }

    /// Representative input used to warm the model up at startup.
    pub fn probe() -> Self {
        Self {
            slope_angle: 30.0,
            rainfall: 10.0,
            rock_type_granite: 1,
        }
    }
}

/// 1 if `rock_type` names granite (any casing), else 0.
pub fn granite_flag(rock_type: &str) -> u8 {
    u8::from(rock_type.eq_ignore_ascii_case(GRANITE))
}

// ---------- Response ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskClass {
    Low,
    High,
}

impl RiskClass {
    pub fn from_class(class: u8) -> Option<Self> {
        match class {
            0 => Some(RiskClass::Low),
            1 => Some(RiskClass::High),
            _ => None,
        }
    }

    pub fn is_high(self) -> bool {
        self == RiskClass::High
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(serialize_with = "lenient::compact")]
    pub slope_angle: f64,
    #[serde(serialize_with = "lenient::compact")]
    pub rainfall: f64,
    pub rock_type: String,
    pub risk: RiskClass,
    pub probability: f64, // percent, 2 decimals
    pub graph_prob: String,
    pub graph_feat: String,
}

/// Round a percentage to two decimals for the response.
pub fn round_percent(p: f64) -> f64 {
    (p * 100.0).round() / 100.0
}

// ---------- Mines ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mine {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

pub fn default_mines() -> Vec<Mine> {
    [
        ("Bailadila Iron Ore Mine", 18.7167, 81.2333),
        ("Jharia Coal Mine", 23.7402, 86.4145),
        ("Singrauli Coalfield", 24.1992, 82.6754),
    ]
    .into_iter()
    .map(|(name, lat, lon)| Mine {
        name: name.to_string(),
        lat,
        lon,
    })
    .collect()
}

// ---------- Lenient numbers ----------

mod lenient {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    impl NumberOrText {
        fn into_f64<E: de::Error>(self) -> Result<f64, E> {
            match self {
                NumberOrText::Number(n) => Ok(n),
                NumberOrText::Text(s) => match s.trim().parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(n),
                    Ok(_) => Err(E::custom(format!("expected a finite number, got {:?}", s))),
                    Err(_) => Err(E::custom(format!("expected a number, got {:?}", s))),
                },
            }
        }
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        NumberOrText::deserialize(d)?.into_f64()
    }

    pub fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Option::<NumberOrText>::deserialize(d)?
            .map(NumberOrText::into_f64)
            .transpose()
    }

    /// Integral values go out as JSON integers, so `30.0` is written `30`.
    pub fn compact<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.fract() == 0.0 && v.abs() < 9.0e15 {
            s.serialize_i64(*v as i64)
        } else {
            s.serialize_f64(*v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rainfall_selects_explicit_path() {
        let req: PredictionRequest = serde_json::from_value(json!({
            "lat": 18.7, "lon": 81.2, "rainfall": 10, "slope_angle": "30"
        }))
        .unwrap();
        assert_eq!(
            req.feature_source().unwrap(),
            FeatureSource::Explicit(ExplicitFeatures {
                rainfall: 10.0,
                slope_angle: 30.0,
                rock_type: "Other".to_string(),
            })
        );
        assert_eq!(req.location_name(), "Selected Location");
    }

    #[test]
    fn null_rainfall_is_a_map_click() {
        let req: PredictionRequest =
            serde_json::from_value(json!({"lat": 1, "lon": 2, "rainfall": null})).unwrap();
        assert!(matches!(req.feature_source(), Ok(FeatureSource::Derived(_))));
    }

    #[test]
    fn explicit_path_needs_slope() {
        let req: PredictionRequest =
            serde_json::from_value(json!({"lat": 1, "lon": 2, "rainfall": 5})).unwrap();
        assert_eq!(req.feature_source(), Err(RequestError::MissingSlopeAngle));
    }

    #[test]
    fn non_numeric_text_is_rejected() {
        let res = serde_json::from_value::<PredictionRequest>(json!({"lat": "north", "lon": 2}));
        assert!(res.is_err());

        for text in ["NaN", "inf", "-infinity"] {
            let res = serde_json::from_value::<PredictionRequest>(
                json!({"lat": 0, "lon": 0, "rainfall": text, "slope_angle": 30}),
            );
            assert!(res.is_err(), "{} should be rejected", text);
        }
        let res = serde_json::from_value::<PredictionRequest>(
            json!({"lat": 0, "lon": 0, "rainfall": 1, "slope_angle": " Infinity "}),
        );
        assert!(res.is_err());
    }

    #[test]
    fn granite_match_ignores_case() {
        assert_eq!(granite_flag("granite"), 1);
        assert_eq!(granite_flag("GRANITE"), 1);
        assert_eq!(granite_flag("Basalt"), 0);
        assert_eq!(granite_flag("granite "), 0);
    }

    #[test]
    fn integral_numbers_serialise_as_integers() {
        let out = PredictionResult {
            name: "x".into(),
            lat: 18.7,
            lon: 81.0,
            slope_angle: 30.0,
            rainfall: 0.4,
            rock_type: "Other".into(),
            risk: RiskClass::High,
            probability: 12.5,
            graph_prob: String::new(),
            graph_feat: String::new(),
        };
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["lon"], json!(81.0));
        assert_eq!(v["slope_angle"], json!(30));
        assert_eq!(v["rainfall"], json!(0.4));
        assert_eq!(v["risk"], json!("High"));
    }

    #[test]
    fn percent_rounding() {
        assert_eq!(round_percent(42.4567), 42.46);
        assert_eq!(round_percent(0.0), 0.0);
        assert_eq!(round_percent(100.0), 100.0);
    }
}
