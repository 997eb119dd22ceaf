use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::types::vitals::FeatureVector;

/// A trained risk model. `predict` is always available; calibrated scoring is
/// an optional capability advertised by `supports_probability`.
pub trait RiskModel: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> bool;

    fn supports_probability(&self) -> bool {
        false
    }

    /// Probability of the positive class. Only called when
    /// `supports_probability` is true.
    fn predict_probability(&self, _features: &FeatureVector) -> Result<f64, String> {
        Err("probability scoring not supported".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelScore {
    pub verdict: bool,
    pub probability: Option<f64>,
}

/// Scores from the three models for one feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub tachycardia: ModelScore,
    pub hypertrophy: ModelScore,
    pub high_cholesterol: ModelScore,
}

impl Classification {
    pub fn any_positive(&self) -> bool {
        self.tachycardia.verdict || self.hypertrophy.verdict || self.high_cholesterol.verdict
    }
}

/// Immutable set of loaded models, built once at startup and shared.
#[derive(Clone)]
pub struct ClassifierRegistry {
    tachycardia: Arc<dyn RiskModel>,
    hypertrophy: Arc<dyn RiskModel>,
    high_cholesterol: Arc<dyn RiskModel>,
}

impl ClassifierRegistry {
    pub fn new(
        tachycardia: Arc<dyn RiskModel>,
        hypertrophy: Arc<dyn RiskModel>,
        high_cholesterol: Arc<dyn RiskModel>,
    ) -> Self {
        Self {
            tachycardia,
            hypertrophy,
            high_cholesterol,
        }
    }

    pub fn classify(&self, features: &FeatureVector) -> Classification {
        Classification {
            tachycardia: score("tachycardia", self.tachycardia.as_ref(), features),
            hypertrophy: score("hypertrophy", self.hypertrophy.as_ref(), features),
            high_cholesterol: score("high_cholesterol", self.high_cholesterol.as_ref(), features),
        }
    }
}

fn score(name: &str, model: &dyn RiskModel, features: &FeatureVector) -> ModelScore {
    let verdict = model.predict(features);
    let probability = if model.supports_probability() {
        match model.predict_probability(features) {
            Ok(p) if p.is_finite() && (0.0..=1.0).contains(&p) => Some(p),
            Ok(p) => {
                debug!(model = name, probability = p, "discarding out-of-range probability");
                None
            }
            Err(e) => {
                debug!(model = name, error = %e, "probability scoring failed");
                None
            }
        }
    } else {
        None
    };
    ModelScore {
        verdict,
        probability,
    }
}
