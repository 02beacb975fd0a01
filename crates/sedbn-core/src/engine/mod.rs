//! The inference engine for discrete Bayesian networks.
//!
//! This module provides:
//! - **errors**: Error taxonomy shared by construction, querying and serving
//! - **definition**: Name-based variable and CPT definitions
//! - **model**: Immutable validated network with cached topological order
//! - **features**: External feature bindings used by the query adapter
//! - **evidence**: Observed-state assignments and their validation
//! - **factor**: Dense factor tables (reduce, product, sum out)
//! - **elimination**: Exact posterior marginals by variable elimination
//! - **posterior**: Posterior distributions returned to callers
//! - **scenario**: Batched what-if evaluation with per-scenario failures

pub mod definition;
pub mod elimination;
pub mod errors;
pub mod evidence;
pub mod factor;
pub mod features;
pub mod model;
pub mod posterior;
pub mod scenario;
