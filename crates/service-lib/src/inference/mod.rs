//! Text classification engine
//!
//! The model itself is an opaque backend producing class logits for a piece
//! of text. The gateway turns those logits into a label and a confidence.

mod onnx;

pub use onnx::{compute_checksum, OnnxClassifier, MAX_SEQ_LEN};

use std::sync::Arc;

use crate::error::{Result, ServiceError};
use crate::models::Classification;

/// Trait for model implementations (tokenize + infer)
pub trait ModelBackend: Send + Sync {
    /// Raw class logits for `text`
    fn logits(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Identifier of the loaded model
    fn model_version(&self) -> &str;
}

/// Adapts raw text into a label/confidence pair
#[derive(Clone)]
pub struct InferenceGateway {
    backend: Arc<dyn ModelBackend>,
}

impl InferenceGateway {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    pub fn model_version(&self) -> &str {
        self.backend.model_version()
    }

    /// Classify one input; empty text is forwarded as-is
    pub fn classify(&self, text: &str) -> Result<Classification> {
        let logits = self
            .backend
            .logits(text)
            .map_err(|e| ServiceError::inference(format!("{:#}", e)))?;

        classification_from_logits(&logits)
    }
}

/// Argmax label with its softmax probability
pub fn classification_from_logits(logits: &[f32]) -> Result<Classification> {
    if logits.is_empty() {
        return Err(ServiceError::inference("model returned no logits"));
    }
    if logits.iter().any(|l| !l.is_finite()) {
        return Err(ServiceError::inference("model returned non-finite logits"));
    }

    let (label, max) = logits
        .iter()
        .copied()
        .enumerate()
        .fold((0usize, f32::NEG_INFINITY), |best, (i, l)| {
            if l > best.1 {
                (i, l)
            } else {
                best
            }
        });

    // Shift by the max so exp() cannot overflow; exp(0) = 1 for the winner
    let denom: f64 = logits.iter().map(|&l| f64::from(l - max).exp()).sum();
    let confidence = (1.0 / denom).clamp(0.0, 1.0);

    Ok(Classification {
        label: label as u32,
        confidence,
    })
}
