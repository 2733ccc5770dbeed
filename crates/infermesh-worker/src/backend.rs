//! The inference backend seam.
//!
//! The serving layer treats the compute engine as an external
//! collaborator: all it relies on is [`InferenceBackend::batch_predict`]
//! and its same-order contract. Model loading, tensor shapes, and device
//! selection all live behind this trait.

use infermesh_common::Result;

/// A compute backend that can run a batch of inputs in one call.
///
/// # Contract
///
/// `batch_predict` must return exactly one output per input, in input
/// order. The batch processor maps outputs back to waiting callers by
/// position; a backend that reorders results would silently answer the
/// wrong caller, and one that returns a short vector fails the tail of
/// the batch.
pub trait InferenceBackend: Send + Sync {
    /// Runs the batch. Called from the blocking pool; may take its time.
    fn batch_predict(&self, inputs: &[Vec<f32>]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic stand-in backend.
///
/// Applies an affine transform whose coefficients derive from the model
/// reference, so distinct "models" produce distinct outputs while the
/// same model and input always agree, which is what the result cache and
/// the routing tests need. Replace with a real engine by implementing
/// [`InferenceBackend`].
pub struct SyntheticBackend {
    model_ref: String,
    weight: f32,
    bias: f32,
}

impl SyntheticBackend {
    pub fn new(model_ref: impl Into<String>) -> Self {
        let model_ref = model_ref.into();

        // FNV-1a over the model reference seeds the coefficients.
        let mut hash: u32 = 0x811c_9dc5;
        for &b in model_ref.as_bytes() {
            hash ^= u32::from(b);
            hash = hash.wrapping_mul(0x0100_0193);
        }

        // Map the hash into modest, non-degenerate coefficients.
        let weight = 0.5 + (hash % 1000) as f32 / 1000.0;
        let bias = ((hash >> 16) % 100) as f32 / 100.0;

        Self {
            model_ref,
            weight,
            bias,
        }
    }

    pub fn model_ref(&self) -> &str {
        &self.model_ref
    }
}

impl InferenceBackend for SyntheticBackend {
    fn batch_predict(&self, inputs: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let outputs = inputs
            .iter()
            .map(|input| {
                input
                    .iter()
                    .map(|x| x * self.weight + self.bias)
                    .collect()
            })
            .collect();
        Ok(outputs)
    }
}
