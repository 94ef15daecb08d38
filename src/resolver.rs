use rand::Rng;
use tracing::warn;

use crate::types::{
    ExplicitFeatures, FeatureSource, FeatureVector, Location, DEFAULT_ROCK_TYPE, GRANITE,
};
use crate::weather::WeatherClient;

pub const SLOPE_ANGLE_MIN: i64 = 5;
pub const SLOPE_ANGLE_MAX: i64 = 60;
pub const FALLBACK_RAINFALL_MAX: i64 = 100;

/// How the rainfall value of a resolved request was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RainfallOrigin {
    Request,
    Forecast,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInputs {
    pub features: FeatureVector,
    pub rock_type: String,
    pub rainfall_origin: RainfallOrigin,
}

/// Turns a request's feature source into a feature vector.
#[derive(Debug, Clone)]
pub struct InputResolver {
    weather: WeatherClient,
}

impl InputResolver {
    pub fn new(weather: WeatherClient) -> Self {
        Self { weather }
    }

    pub async fn resolve<R: Rng + Send>(
        &self,
        source: &FeatureSource,
        rng: &mut R,
    ) -> ResolvedInputs {
        match source {
            FeatureSource::Explicit(explicit) => resolve_explicit(explicit),
            FeatureSource::Derived(location) => self.resolve_derived(*location, rng).await,
        }
    }

    async fn resolve_derived<R: Rng + Send>(&self, at: Location, rng: &mut R) -> ResolvedInputs {
        let forecast = self.weather.hourly_precipitation(at.lat, at.lon).await;
        let (rainfall, rainfall_origin) = match forecast {
            Ok(mm) => (mm, RainfallOrigin::Forecast),
            Err(err) => {
                let mm = rng.gen_range(0..=FALLBACK_RAINFALL_MAX) as f64;
                warn!(
                    lat = at.lat,
                    lon = at.lon,
                    error = %err,
                    rainfall = mm,
                    "weather fetch failed; using random rainfall"
                );
                (mm, RainfallOrigin::Fallback)
            }
        };

        // No slope or geology data exists for arbitrary map points.
        let slope_angle = rng.gen_range(SLOPE_ANGLE_MIN..=SLOPE_ANGLE_MAX) as f64;
        let rock_type = if rng.gen_bool(0.5) { GRANITE } else { DEFAULT_ROCK_TYPE };

        ResolvedInputs {
            features: FeatureVector::new(slope_angle, rainfall, rock_type),
            rock_type: rock_type.to_string(),
            rainfall_origin,
        }
    }
}

fn resolve_explicit(explicit: &ExplicitFeatures) -> ResolvedInputs {
    ResolvedInputs {
        features: FeatureVector::new(explicit.slope_angle, explicit.rainfall, &explicit.rock_type),
        rock_type: explicit.rock_type.clone(),
        rainfall_origin: RainfallOrigin::Request,
    }
}
