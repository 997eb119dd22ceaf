use serde::Deserialize;
use std::{fs, path::Path, sync::Arc};
use tracing::info;

use crate::config::ModelPaths;
use crate::error::MonitorError;
use crate::service::classifier::{ClassifierRegistry, RiskModel};
use crate::types::vitals::{FEATURE_COUNT, Feature, FeatureVector};

/// On-disk model description.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Logistic {
        weights: [f64; FEATURE_COUNT],
        intercept: f64,
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
    Threshold {
        feature: Feature,
        above: f64,
    },
}

fn default_threshold() -> f64 {
    0.5
}

/// Logistic regression over the full feature vector; calibrated.
pub struct LogisticModel {
    weights: [f64; FEATURE_COUNT],
    intercept: f64,
    threshold: f64,
}

impl LogisticModel {
    fn probability(&self, features: &FeatureVector) -> f64 {
        let z = features
            .as_array()
            .iter()
            .zip(self.weights.iter())
            .fold(self.intercept, |acc, (x, w)| acc + x * w);
        1.0 / (1.0 + (-z).exp())
    }
}

impl RiskModel for LogisticModel {
    fn predict(&self, features: &FeatureVector) -> bool {
        self.probability(features) >= self.threshold
    }

    fn supports_probability(&self) -> bool {
        true
    }

    fn predict_probability(&self, features: &FeatureVector) -> Result<f64, String> {
        Ok(self.probability(features))
    }
}

/// Single-feature cut-off. Label only.
pub struct ThresholdModel {
    feature: Feature,
    above: f64,
}

impl RiskModel for ThresholdModel {
    fn predict(&self, features: &FeatureVector) -> bool {
        features.as_array()[self.feature.index()] > self.above
    }
}

impl ModelArtifact {
    pub fn into_model(self) -> Arc<dyn RiskModel> {
        match self {
            ModelArtifact::Logistic {
                weights,
                intercept,
                threshold,
            } => Arc::new(LogisticModel {
                weights,
                intercept,
                threshold,
            }),
            ModelArtifact::Threshold { feature, above } => {
                Arc::new(ThresholdModel { feature, above })
            }
        }
    }
}

fn load_one(name: &'static str, path: Option<&Path>) -> Result<Arc<dyn RiskModel>, MonitorError> {
    let Some(path) = path else {
        return Err(MonitorError::ModelLoad {
            name,
            path: Default::default(),
            reason: "no artifact path configured".to_string(),
        });
    };
    let load_err = |reason: String| MonitorError::ModelLoad {
        name,
        path: path.to_path_buf(),
        reason,
    };
    let contents = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
    let artifact: ModelArtifact =
        serde_json::from_str(&contents).map_err(|e| load_err(e.to_string()))?;
    info!(model = name, path = %path.display(), kind = artifact_kind(&artifact), "loaded risk model");
    Ok(artifact.into_model())
}

fn artifact_kind(artifact: &ModelArtifact) -> &'static str {
    match artifact {
        ModelArtifact::Logistic { .. } => "logistic",
        ModelArtifact::Threshold { .. } => "threshold",
    }
}

/// Load all three risk models. Any missing or malformed artifact is fatal.
pub fn load_registry(paths: &ModelPaths) -> Result<ClassifierRegistry, MonitorError> {
    Ok(ClassifierRegistry::new(
        load_one("tachycardia", paths.tachycardia.as_deref())?,
        load_one("hypertrophy", paths.hypertrophy.as_deref())?,
        load_one("cholesterol", paths.cholesterol.as_deref())?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::features::derive;
    use crate::types::vitals::HeartRate;
    use std::path::PathBuf;

    fn features(bpm: i64) -> FeatureVector {
        derive(HeartRate::new(bpm).unwrap())
    }

    #[test]
    fn logistic_artifact_scores() {
        let artifact: ModelArtifact = serde_json::from_str(
            r#"{"kind":"logistic","weights":[0.25,0,0,0,0,0],"intercept":-25.0}"#,
        )
        .unwrap();
        let model = artifact.into_model();
        assert!(model.supports_probability());
        assert!(!model.predict(&features(75)));
        assert!(model.predict(&features(130)));
        let p = model.predict_probability(&features(100)).unwrap();
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn threshold_artifact_has_no_probability() {
        let artifact: ModelArtifact =
            serde_json::from_str(r#"{"kind":"threshold","feature":"systolic","above":125}"#)
                .unwrap();
        let model = artifact.into_model();
        assert!(!model.supports_probability());
        assert!(!model.predict(&features(150)));
        assert!(model.predict(&features(160)));
    }

    #[test]
    fn missing_artifact_is_fatal() {
        let paths = ModelPaths {
            tachycardia: Some(PathBuf::from("/nonexistent/tachycardia.json")),
            hypertrophy: None,
            cholesterol: None,
        };
        let err = load_registry(&paths).err().expect("load should fail");
        assert!(matches!(err, MonitorError::ModelLoad { name: "tachycardia", .. }));
    }

    #[test]
    fn unset_path_is_fatal() {
        let paths = ModelPaths {
            tachycardia: None,
            hypertrophy: None,
            cholesterol: None,
        };
        assert!(matches!(
            load_registry(&paths),
            Err(MonitorError::ModelLoad { .. })
        ));
    }

    #[test]
    fn bundled_artifacts_load() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models");
        let paths = ModelPaths {
            tachycardia: Some(root.join("tachycardia.json")),
            hypertrophy: Some(root.join("hypertrophy.json")),
            cholesterol: Some(root.join("cholesterol.json")),
        };
        let registry = load_registry(&paths).expect("bundled models load");
        let resting = registry.classify(&features(75));
        assert!(!resting.any_positive());
    }
}
