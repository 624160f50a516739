//! Pure-Rust local embeddings: tract-onnx for inference, tokenizers for
//! WordPiece. Model files are fetched from Hugging Face into the configured
//! cache directory once and read from disk afterwards.
#![cfg_attr(
    all(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"),
    allow(dead_code)
)]

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

use super::EmbedError;

const MAX_SEQ_LEN: usize = 256;

struct Manifest {
    repo: &'static str,
    onnx: &'static str,
    tokenizer: &'static str,
    dims: usize,
}

pub(super) fn model_manifest(model_name: &str) -> Result<(&'static str, usize)> {
    let m = manifest(model_name)?;
    Ok((m.repo, m.dims))
}

fn manifest(model_name: &str) -> Result<Manifest> {
    match model_name {
        "all-minilm-l6-v2" => Ok(Manifest {
            repo: "sentence-transformers/all-MiniLM-L6-v2",
            onnx: "onnx/model.onnx",
            tokenizer: "tokenizer.json",
            dims: 384,
        }),
        "multilingual-e5-small" => Ok(Manifest {
            repo: "intfloat/multilingual-e5-small",
            onnx: "onnx/model.onnx",
            tokenizer: "tokenizer.json",
            dims: 384,
        }),
        _ => bail!(
            "tract backend supports all-minilm-l6-v2 and multilingual-e5-small, got '{}'",
            model_name
        ),
    }
}

fn download_to_cache(repo: &str, rel: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Ok(());
    }
    let url = format!("https://huggingface.co/{}/resolve/main/{}", repo, rel);
    tracing::info!(%url, dest = %dest.display(), "downloading model file");

    let bytes = reqwest::blocking::get(&url)
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .with_context(|| format!("Download {}", url))?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Create cache dir {}", parent.display()))?;
    }
    std::fs::write(dest, &bytes).with_context(|| format!("Write {}", dest.display()))?;
    Ok(())
}

fn ensure_cached(model_name: &str, cache_dir: &Path) -> Result<(PathBuf, PathBuf, usize)> {
    let m = manifest(model_name)?;
    let model_dir = cache_dir.join(model_name);
    let onnx_path = model_dir.join(m.onnx);
    let tokenizer_path = model_dir.join(m.tokenizer);
    download_to_cache(m.repo, m.onnx, &onnx_path)?;
    download_to_cache(m.repo, m.tokenizer, &tokenizer_path)?;
    Ok((onnx_path, tokenizer_path, m.dims))
}

/// Tokenizer and optimized ONNX plan, loaded once and reused across calls.
pub(super) struct TractModel {
    tokenizer: tokenizers::Tokenizer,
    plan: TypedRunnableModel<TypedModel>,
    dims: usize,
}

impl TractModel {
    /// Fetch the model files if needed, then parse and optimize the graph.
    pub(super) fn load(model_name: &str, cache_dir: &Path) -> Result<Self, EmbedError> {
        let (onnx_path, tokenizer_path, dims) = ensure_cached(model_name, cache_dir)
            .map_err(|e| EmbedError::Unavailable(format!("{e:#}")))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedError::Unavailable(format!("load tokenizer: {e}")))?;
        let plan = tract_onnx::onnx()
            .model_for_path(&onnx_path)
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| EmbedError::Unavailable(format!("load ONNX model: {e}")))?;

        Ok(Self {
            tokenizer,
            plan,
            dims,
        })
    }

    pub(super) fn embed(
        &self,
        batch_size: usize,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            out.extend(self.embed_batch(batch)?);
        }
        Ok(out)
    }

    fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let failed =
            |what: &str, e: &dyn std::fmt::Display| EmbedError::Failed(format!("{what}: {e}"));
        let dims = self.dims;

        let encodings = batch
            .iter()
            .map(|s| self.tokenizer.encode(s.as_str(), true))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| failed("tokenize", &e))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(1)
            .clamp(1, MAX_SEQ_LEN);
        let rows = encodings.len();

        let mut ids = vec![0i64; rows * seq_len];
        let mut mask = vec![0i64; rows * seq_len];
        for (i, enc) in encodings.iter().enumerate() {
            for (j, &id) in enc.get_ids().iter().take(seq_len).enumerate() {
                ids[i * seq_len + j] = id as i64;
                mask[i * seq_len + j] = 1;
            }
        }
        let types = vec![0i64; rows * seq_len];

        let to_tensor = |v: Vec<i64>| -> Result<Tensor, EmbedError> {
            ndarray::Array2::from_shape_vec((rows, seq_len), v)
                .map(Tensor::from)
                .map_err(|e| failed("input shape", &e))
        };
        let mut inputs: TVec<TValue> =
            tvec!(to_tensor(ids)?.into(), to_tensor(mask.clone())?.into());
        if self.plan.model().inputs.len() > 2 {
            inputs.push(to_tensor(types)?.into());
        }

        let result = self.plan.run(inputs).map_err(|e| failed("inference", &e))?;
        let output = result
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Failed("no output tensor".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| failed("output tensor", &e))?;

        let mut out = Vec::with_capacity(rows);
        match view.shape() {
            [n, _] => {
                for i in 0..*n {
                    out.push(normalize_l2(view.slice(ndarray::s![i, ..]).to_vec()));
                }
            }
            [_, seq, _] => {
                // Mean-pool over attended tokens.
                for i in 0..rows {
                    let mut sum = vec![0f32; dims];
                    let mut count = 0f32;
                    for j in 0..(*seq).min(seq_len) {
                        if mask[i * seq_len + j] == 0 {
                            continue;
                        }
                        let token = view.slice(ndarray::s![i, j, ..]);
                        for (k, &v) in token.iter().take(dims).enumerate() {
                            sum[k] += v;
                        }
                        count += 1.0;
                    }
                    if count > 0.0 {
                        sum.iter_mut().for_each(|x| *x /= count);
                    }
                    out.push(normalize_l2(sum));
                }
            }
            shape => {
                return Err(EmbedError::Failed(format!(
                    "unexpected output shape: {:?}",
                    shape
                )))
            }
        }
        Ok(out)
    }
}

fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}
