//! Model inputs and artifact evaluation.
//!
//! - [`features`] — typed, fixed-order feature vectors.
//! - [`linear`] — JSON linear/logistic artifacts and their evaluation.
//!
//! Loading artifacts from disk and caching them is the job of
//! [`FileModelStore`](crate::adapters::model_store::FileModelStore).

pub mod features;
pub mod linear;

pub use features::{ClassifierFeatures, FeatureVector, IrrigationFeatures, MoistureFeatures};
pub use linear::LinearModel;
