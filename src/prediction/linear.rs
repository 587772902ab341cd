//! Linear and logistic model artifacts.
//!
//! A trained model is exported as a small JSON document:
//!
//! ```json
//! {
//!   "kind": "irrigation_classifier",
//!   "version": 3,
//!   "features": ["soil_moisture_d1", "..."],
//!   "outputs": [{ "intercept": -1.2, "weights": [0.4, "..."] }],
//!   "link": "logistic",
//!   "threshold": 0.5
//! }
//! ```
//!
//! Each output is `link(intercept + Σ wᵢ·xᵢ)`.  The feature list is checked
//! against the caller's [`FeatureVector::NAMES`] on every prediction, so an
//! artifact trained on other columns, or the same columns in another order,
//! is refused.

use serde::Deserialize;

use crate::error::{ModelError, ModelKind};

use super::features::FeatureVector;

/// Decision threshold for logistic classifiers without an explicit one.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Tag stored in the artifact's `kind` field.
pub fn kind_tag(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::MoistureForecast => "moisture_forecast",
        ModelKind::IrrigationClassifier => "irrigation_classifier",
        ModelKind::IrrigationAmount => "irrigation_amount",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    #[default]
    Identity,
    Logistic,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinearOutput {
    pub intercept: f64,
    pub weights: Vec<f64>,
}

/// On-disk layout.
#[derive(Debug, Clone, Deserialize)]
struct Artifact {
    kind: String,
    version: u32,
    features: Vec<String>,
    outputs: Vec<LinearOutput>,
    #[serde(default)]
    link: Link,
    threshold: Option<f64>,
}

/// A validated, ready-to-evaluate model.
#[derive(Debug, Clone)]
pub struct LinearModel {
    kind: ModelKind,
    version: u32,
    features: Vec<String>,
    outputs: Vec<LinearOutput>,
    link: Link,
    threshold: f64,
}

impl LinearModel {
    /// Parse and validate an artifact.  Anything that is not a well-formed
    /// artifact of `kind` is [`ModelError::Unavailable`].
    pub fn from_json(kind: ModelKind, json: &str) -> Result<Self, ModelError> {
        let artifact: Artifact =
            serde_json::from_str(json).map_err(|_| ModelError::Unavailable(kind))?;

        if artifact.kind != kind_tag(kind) || artifact.outputs.is_empty() {
            return Err(ModelError::Unavailable(kind));
        }
        let width = artifact.features.len();
        let well_formed = artifact.outputs.iter().all(|o| {
            o.weights.len() == width
                && o.intercept.is_finite()
                && o.weights.iter().all(|w| w.is_finite())
        });
        if !well_formed {
            return Err(ModelError::Unavailable(kind));
        }

        Ok(Self {
            kind,
            version: artifact.version,
            features: artifact.features,
            outputs: artifact.outputs,
            link: artifact.link,
            threshold: artifact.threshold.unwrap_or(DEFAULT_THRESHOLD),
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Refuse inputs whose column list differs from the training columns.
    ///
    /// A different width reports both widths; same width in a different order
    /// reports how many leading columns agree.
    pub fn check_inputs(&self, names: &[&str]) -> Result<(), ModelError> {
        let expected = self.features.len();
        if names.len() != expected {
            return Err(ModelError::ShapeMismatch {
                kind: self.kind,
                expected,
                found: names.len(),
            });
        }
        let agreeing = self
            .features
            .iter()
            .zip(names)
            .take_while(|(a, b)| a.as_str() == **b)
            .count();
        if agreeing != expected {
            return Err(ModelError::ShapeMismatch {
                kind: self.kind,
                expected,
                found: agreeing,
            });
        }
        Ok(())
    }

    /// Evaluate every output for `features`.
    pub fn predict<F: FeatureVector>(&self, features: &F) -> Result<Vec<f64>, ModelError> {
        self.check_inputs(F::NAMES)?;
        let x = features.values();
        Ok(self
            .outputs
            .iter()
            .map(|o| {
                let z = o.intercept + o.weights.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>();
                match self.link {
                    Link::Identity => z,
                    Link::Logistic => 1.0 / (1.0 + (-z).exp()),
                }
            })
            .collect())
    }

    /// Evaluate and require exactly `N` outputs.
    pub fn predict_exact<F: FeatureVector, const N: usize>(
        &self,
        features: &F,
    ) -> Result<[f64; N], ModelError> {
        let out = self.predict(features)?;
        <[f64; N]>::try_from(out.as_slice()).map_err(|_| ModelError::ShapeMismatch {
            kind: self.kind,
            expected: N,
            found: out.len(),
        })
    }

    /// Single-output classification: score ≥ threshold.
    pub fn classify<F: FeatureVector>(&self, features: &F) -> Result<bool, ModelError> {
        let [score] = self.predict_exact::<F, 1>(features)?;
        Ok(score >= self.threshold)
    }
}
