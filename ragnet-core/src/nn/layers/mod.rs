// src/nn/layers/mod.rs

pub mod parametric_attention;

pub use parametric_attention::ParametricAttention;
