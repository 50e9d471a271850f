//! ONNX sequence classifier using tract
//!
//! Loads `model.onnx` and `tokenizer.json` from a model directory once at
//! startup. Inputs are `input_ids`, `attention_mask` and, when the graph
//! declares a third input, `token_type_ids`, padded to `MAX_SEQ_LEN` and
//! bound to graph inputs by name.

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use sha2::{Digest, Sha256};
use tokenizers::{Tokenizer, TruncationParams};
use tract_onnx::prelude::*;
use tracing::{debug, info, warn};

use super::ModelBackend;

/// Fixed sequence length fed to the model
pub const MAX_SEQ_LEN: usize = 128;

/// Inference latency above which a warning is logged
const SLOW_INFERENCE_MS: u128 = 250;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Pretrained classifier backed by tract and a HuggingFace tokenizer
pub struct OnnxClassifier {
    model: TractModel,
    tokenizer: Tokenizer,
    input_roles: Vec<InputRole>,
    model_version: String,
}

impl OnnxClassifier {
    /// Load the model directory, verifying the model checksum when given
    pub fn load(model_dir: &Path, expected_sha256: Option<&str>) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        let model_bytes = std::fs::read(&model_path)
            .with_context(|| format!("Failed to read model {}", model_path.display()))?;

        let checksum = compute_checksum(&model_bytes);
        if let Some(expected) = expected_sha256 {
            if !checksum.eq_ignore_ascii_case(expected) {
                bail!(
                    "Model checksum mismatch for {}: expected {}, got {}",
                    model_path.display(),
                    expected,
                    checksum
                );
            }
            debug!(checksum = %checksum, "Model checksum validated");
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            anyhow!("Failed to load tokenizer {}: {}", tokenizer_path.display(), e)
        })?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        let (model, input_roles) = Self::load_model(&model_bytes)?;
        let model_version = format!(
            "{}@{}",
            model_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "model".to_string()),
            &checksum[..12]
        );

        info!(
            model_version = %model_version,
            inputs = ?input_roles,
            max_seq_len = MAX_SEQ_LEN,
            "Loaded classification model"
        );

        Ok(Self {
            model,
            tokenizer,
            input_roles,
            model_version,
        })
    }

    /// Parse and optimize an ONNX graph with `[1, MAX_SEQ_LEN]` i64 inputs
    fn load_model(model_bytes: &[u8]) -> Result<(TractModel, Vec<InputRole>)> {
        let mut model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?;

        let names: Vec<String> = model
            .inputs
            .iter()
            .map(|outlet| model.node(outlet.node).name.clone())
            .collect();
        let input_roles = resolve_input_roles(&names)?;

        for i in 0..input_roles.len() {
            model = model
                .with_input_fact(i, i64::fact([1, MAX_SEQ_LEN]).into())
                .with_context(|| format!("Failed to set shape of input {}", names[i]))?;
        }

        let model = model
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;

        Ok((model, input_roles))
    }

    /// Tokenize into padded `(input_ids, attention_mask, token_type_ids)`
    fn encode(&self, text: &str) -> Result<[Vec<i64>; 3]> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let pad = |values: &[u32]| -> Vec<i64> {
            let mut out: Vec<i64> = values
                .iter()
                .take(MAX_SEQ_LEN)
                .map(|&v| i64::from(v))
                .collect();
            out.resize(MAX_SEQ_LEN, 0);
            out
        };

        Ok([
            pad(encoding.get_ids()),
            pad(encoding.get_attention_mask()),
            pad(encoding.get_type_ids()),
        ])
    }
}

impl ModelBackend for OnnxClassifier {
    fn logits(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();

        let [ids, mask, type_ids] = self.encode(text)?;
        let inputs: TVec<TValue> = self
            .input_roles
            .iter()
            .map(|role| -> Result<TValue> {
                let values = match role {
                    InputRole::Ids => ids.clone(),
                    InputRole::Mask => mask.clone(),
                    InputRole::TypeIds => type_ids.clone(),
                };
                let tensor: Tensor =
                    tract_ndarray::Array2::from_shape_vec((1, MAX_SEQ_LEN), values)?.into();
                Ok(tensor.into())
            })
            .collect::<Result<_>>()?;

        let result = self.model.run(inputs)?;
        let output = result.first().context("No output from model")?;
        let logits: Vec<f32> = output.to_array_view::<f32>()?.iter().copied().collect();

        let elapsed = start.elapsed();
        if elapsed.as_millis() > SLOW_INFERENCE_MS {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                "Inference exceeded {}ms target", SLOW_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
        }

        Ok(logits)
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}

/// Tokenizer output a graph input is fed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum InputRole {
    Ids,
    Mask,
    TypeIds,
}

impl InputRole {
    const POSITIONAL: [InputRole; 3] = [InputRole::Ids, InputRole::Mask, InputRole::TypeIds];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "input_ids" => Some(InputRole::Ids),
            "attention_mask" => Some(InputRole::Mask),
            "token_type_ids" => Some(InputRole::TypeIds),
            _ => None,
        }
    }
}

/// Map graph inputs to tokenizer outputs by name, falling back to
/// `input_ids, attention_mask[, token_type_ids]` order for unnamed exports
fn resolve_input_roles(names: &[String]) -> Result<Vec<InputRole>> {
    if !(2..=3).contains(&names.len()) {
        bail!(
            "Model declares {} inputs, expected input_ids, attention_mask[, token_type_ids]",
            names.len()
        );
    }

    let Some(roles) = names
        .iter()
        .map(|name| InputRole::from_name(name))
        .collect::<Option<Vec<_>>>()
    else {
        warn!(inputs = ?names, "Unrecognized model input names, binding inputs by position");
        return Ok(InputRole::POSITIONAL[..names.len()].to_vec());
    };

    let mut unique = roles.clone();
    unique.sort();
    unique.dedup();
    if unique.len() != roles.len() {
        bail!("Model inputs {:?} bind the same tokenizer output twice", names);
    }
    if !roles.contains(&InputRole::Ids) || !roles.contains(&InputRole::Mask) {
        bail!("Model inputs {:?} must include input_ids and attention_mask", names);
    }

    Ok(roles)
}

/// Compute SHA256 checksum of data as lowercase hex
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
