// Déclare les modules principaux de la crate
pub mod error;
pub mod grad_check;
pub mod model;
pub mod nn;
pub mod ops;
pub mod ragged;
pub mod tensor;
pub mod types;
pub mod utils;

// Re-export the types most callers need, e.g. `ragnet_core::Ragged`
pub use error::RagNetError;
pub use model::Model;
pub use nn::{Backprop, Layer, ParametricAttention};
pub use ops::{get_ops, CpuOps, Ops};
pub use ragged::Ragged;
pub use tensor::Tensor;
pub use types::Numeric;
// Re-export traits required by public functions/structs
pub use num_traits;
