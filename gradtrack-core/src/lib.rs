//! Minimal tensor, parameter and optimizer layer used by `gradtrack-trainer`.
//!
//! Tensors are f32, CPU-only, and carry an optional gradient slot. There is no
//! autograd graph: layers and losses expose an explicit `backward`.

pub mod error;
pub mod nn;
pub mod optim;
pub mod tensor;

pub use error::GradTrackError;
// Re-exports the Tensor type so it is reachable as `gradtrack_core::Tensor`
pub use tensor::Tensor;
// Re-export traits required by public functions/structs
pub use num_traits;
