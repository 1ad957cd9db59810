use ragnet_core::nn::Layer;
use ragnet_core::utils::testing::{random_ragged, random_tensor, seeded_rng};
use ragnet_core::{ParametricAttention, RagNetError, Ragged};

// Shared by several test crates; not every helper is used by each of them.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Initialized layer with a random (non-zero) Q, so that attention is not
/// uniform and the softmax path carries gradient.
#[allow(dead_code)]
pub fn random_layer(width: usize, seed: u64) -> Result<ParametricAttention<f64>, RagNetError> {
    let mut rng = seeded_rng(seed);
    let mut layer = ParametricAttention::new(Some(width));
    layer.initialize(None, None)?;
    layer
        .model_mut()
        .set_param("Q", random_tensor(&mut rng, &[width], 0.5)?);
    Ok(layer)
}

/// Random input batch and upstream gradient with the same ragged shape.
#[allow(dead_code)]
pub fn random_batch(
    lengths: &[usize],
    width: usize,
    seed: u64,
) -> Result<(Ragged<f64>, Ragged<f64>), RagNetError> {
    let mut rng = seeded_rng(seed);
    let x = random_ragged(&mut rng, lengths, width, 1.0)?;
    let d_y = random_ragged(&mut rng, lengths, width, 1.0)?;
    Ok((x, d_y))
}
