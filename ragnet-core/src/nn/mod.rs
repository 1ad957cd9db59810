// src/nn/mod.rs
// Layers operating on ragged batches.

pub mod layer; // Trait Layer
pub mod layers;

// Re-export common items
pub use layer::{Backprop, Layer};
pub use layers::ParametricAttention;
