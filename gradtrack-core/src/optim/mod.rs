// gradtrack-core/src/optim/mod.rs

//! Optimizers for training neural networks.
//!
//! This module provides the `Optimizer` trait, the `ParamGroup` structure, and
//! the `SgdOptimizer` / `AdamOptimizer` implementations.

pub mod adam;
pub mod optimizer_trait;
pub mod param_group;
pub mod sgd;

// Re-export key items for easier access
pub use adam::AdamOptimizer;
pub use optimizer_trait::Optimizer;
pub use param_group::{ParamGroup, ParamGroupOptions};
pub use sgd::SgdOptimizer;
