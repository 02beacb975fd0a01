//! # sedbn core
//!
//! Exact inference over small discrete Bayesian networks relating sediment
//! contaminant concentrations, environmental modifiers and ecological effects.
//!
//! ## Architecture
//!
//! - **engine**: model representation, variable elimination, scenario batches
//! - **adapter**: the prediction request/response boundary
//! - **config**: model and scenario definition files
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sedbn_core::{infer, load_model, Evidence};
//!
//! let loaded = load_model("models/bc_sediment.toml")?;
//! let evidence = Evidence::new()
//!     .with("Contaminant_Conc", "High")
//!     .with("TOC", "Low")
//!     .with("Benthic_Community_Type", "Sensitive");
//! let posterior = infer(&loaded.model, &evidence, &["Ecological_Effect"])?;
//! println!("{:?}", posterior.get("Ecological_Effect"));
//! ```

#![forbid(unsafe_code)]

pub mod adapter;
pub mod config;
pub mod engine;

// Re-export commonly used types
pub use adapter::{PredictionRequest, PredictionResponse, QueryAdapter, ResponseMode};
pub use config::{load_model, LoadedModel, ModelDefinition, ScenarioFile};
pub use engine::definition::{CptRow, FactorDef, VariableDef};
pub use engine::elimination::{infer, infer_with_config, infer_with_diagnostics, InferenceConfig};
pub use engine::errors::BnError;
pub use engine::evidence::Evidence;
pub use engine::features::{BinDef, FeatureDef, FeatureValue};
pub use engine::model::Model;
pub use engine::posterior::{Distribution, PosteriorResult};
pub use engine::scenario::{evaluate, evaluate_with_config, Scenario, ScenarioReport};
