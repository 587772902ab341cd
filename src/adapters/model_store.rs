//! File-backed model store.
//!
//! Implements [`PredictionPort`] over three JSON artifacts resolved against
//! `models.base_dir`.  Artifacts are parsed on first use and cached for the
//! life of the process; the cache is guarded by one `Mutex`, so a first load
//! cannot race even if cycles ever run in parallel.  [`FileModelStore::invalidate`]
//! drops the cache so retrained artifacts are picked up on the next call.
//!
//! Failures are never cached: a missing artifact is looked for again on the
//! next call.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};

use crate::app::ports::PredictionPort;
use crate::config::ModelConfig;
use crate::error::{ModelError, ModelKind};
use crate::prediction::{ClassifierFeatures, IrrigationFeatures, LinearModel, MoistureFeatures};

pub struct FileModelStore {
    base_dir: PathBuf,
    moisture_forecast: PathBuf,
    irrigation_classifier: PathBuf,
    irrigation_amount: PathBuf,
    cache: Mutex<HashMap<ModelKind, Arc<LinearModel>>>,
}

impl FileModelStore {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
            moisture_forecast: config.moisture_forecast.clone(),
            irrigation_classifier: config.irrigation_classifier.clone(),
            irrigation_amount: config.irrigation_amount.clone(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Path the artifact for `kind` is read from.
    pub fn path_for(&self, kind: ModelKind) -> PathBuf {
        let file: &Path = match kind {
            ModelKind::MoistureForecast => &self.moisture_forecast,
            ModelKind::IrrigationClassifier => &self.irrigation_classifier,
            ModelKind::IrrigationAmount => &self.irrigation_amount,
        };
        self.base_dir.join(file)
    }

    /// The cached model for `kind`, loading it on first use.
    pub fn model(&self, kind: ModelKind) -> Result<Arc<LinearModel>, ModelError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = cache.get(&kind) {
            return Ok(Arc::clone(model));
        }

        let path = self.path_for(kind);
        let json = fs::read_to_string(&path).map_err(|e| {
            warn!("{} model: cannot read {}: {}", kind, path.display(), e);
            ModelError::Unavailable(kind)
        })?;
        let model = LinearModel::from_json(kind, &json).inspect_err(|_| {
            warn!("{} model: {} is not a valid artifact", kind, path.display());
        })?;
        info!(
            "{} model v{} loaded from {}",
            kind,
            model.version(),
            path.display()
        );

        let model = Arc::new(model);
        cache.insert(kind, Arc::clone(&model));
        Ok(model)
    }

    /// Forget every loaded artifact.
    pub fn invalidate(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn cached(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PredictionPort for FileModelStore {
    fn forecast_moisture(&self, features: &MoistureFeatures) -> Result<[f64; 2], ModelError> {
        self.model(ModelKind::MoistureForecast)?
            .predict_exact::<_, 2>(features)
    }

    fn classify_irrigate(&self, features: &ClassifierFeatures) -> Result<bool, ModelError> {
        self.model(ModelKind::IrrigationClassifier)?
            .classify(features)
    }

    fn predict_amount(&self, features: &IrrigationFeatures) -> Result<f64, ModelError> {
        let [amount] = self
            .model(ModelKind::IrrigationAmount)?
            .predict_exact::<_, 1>(features)?;
        Ok(amount)
    }
}
