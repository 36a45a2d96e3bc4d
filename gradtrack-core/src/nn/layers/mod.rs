// src/nn/layers/mod.rs

pub mod linear;

// Re-export key layer structs
pub use linear::Linear;
