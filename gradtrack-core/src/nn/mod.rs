// src/nn/mod.rs
// Layers, losses and the Module trait.

pub mod layers;
pub mod losses;
pub mod module; // Trait Module
pub mod parameter; // struct Parameter

// Re-export common items
pub use layers::linear::Linear;
pub use losses::MSELoss;
pub use module::Module;
pub use parameter::Parameter;
