//! GGUF inference via llama.cpp.

use crate::error::{ConfabError, Result};
use crate::llm::{EngineLoader, EngineParams, TextEngine};
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

/// Maximum tokens per decode batch (llama.cpp limit; larger prefills fail
/// with "Insufficient Space").
const PREFILL_BATCH_SIZE: usize = 512;

const SAMPLER_SEED: u32 = 1234;
const PENALTY_LAST_N: i32 = 64;

/// Loader holding the process-wide llama.cpp backend
///
/// The backend initializes once per process; handles constructed from the
/// same loader share it.
pub struct LlamaLoader {
    backend: Arc<LlamaBackend>,
}

impl LlamaLoader {
    pub fn new() -> Result<Self> {
        let backend = LlamaBackend::init()
            .map_err(|e| ConfabError::Load(format!("Failed to initialize llama backend: {e}")))?;
        Ok(Self {
            backend: Arc::new(backend),
        })
    }
}

impl EngineLoader for LlamaLoader {
    fn load(&self, path: &Path, params: &EngineParams) -> Result<Arc<dyn TextEngine>> {
        let model_params = LlamaModelParams::default();
        let model = LlamaModel::load_from_file(&self.backend, path, &model_params)
            .map_err(|e| ConfabError::Load(format!("{}: {e}", path.display())))?;

        Ok(Arc::new(LlamaEngine {
            backend: Arc::clone(&self.backend),
            model: Arc::new(model),
            params: params.clone(),
        }))
    }
}

/// One loaded GGUF model. Stateless across calls; each `generate`
/// builds a fresh context.
pub struct LlamaEngine {
    backend: Arc<LlamaBackend>,
    model: Arc<LlamaModel>,
    params: EngineParams,
}

impl TextEngine for LlamaEngine {
    fn generate(&self, prompt: &str, max_tokens: usize, stop: &[&str]) -> Result<String> {
        let n_ctx = NonZeroU32::new(self.params.context_size)
            .ok_or_else(|| ConfabError::Generation("Invalid context size".into()))?;

        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(Some(n_ctx))
            .with_n_threads(self.params.threads)
            .with_n_threads_batch(self.params.threads);

        let mut ctx = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| ConfabError::Generation(e.to_string()))?;

        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| ConfabError::Generation(e.to_string()))?;

        let mut batch = LlamaBatch::new(PREFILL_BATCH_SIZE, 1);
        let n_prompt = tokens.len();
        let last_pos = (n_prompt as i32).saturating_sub(1);

        // Prefill in chunks to stay under the batch limit.
        let mut pos = 0i32;
        for chunk in tokens.chunks(PREFILL_BATCH_SIZE) {
            batch.clear();
            for (j, &token) in chunk.iter().enumerate() {
                let p = pos + j as i32;
                batch
                    .add(token, p, &[0], p == last_pos)
                    .map_err(|e| ConfabError::Generation(e.to_string()))?;
            }
            ctx.decode(&mut batch)
                .map_err(|e| ConfabError::Generation(e.to_string()))?;
            pos += chunk.len() as i32;
        }

        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::penalties(PENALTY_LAST_N, self.params.repeat_penalty, 0.0, 0.0),
            LlamaSampler::top_p(self.params.top_p, 1),
            LlamaSampler::temp(self.params.temperature),
            LlamaSampler::dist(SAMPLER_SEED),
        ]);

        let mut output = String::new();
        let mut n_cur = n_prompt as i32;

        for _ in 0..max_tokens {
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);

            if self.model.is_eog_token(token) {
                break;
            }

            let piece = self
                .model
                .token_to_str(token, Special::Tokenize)
                .unwrap_or_default();
            output.push_str(&piece);

            if truncate_at_stop(&mut output, stop) {
                break;
            }

            batch.clear();
            batch
                .add(token, n_cur, &[0], true)
                .map_err(|e| ConfabError::Generation(e.to_string()))?;
            n_cur += 1;

            ctx.decode(&mut batch)
                .map_err(|e| ConfabError::Generation(e.to_string()))?;
        }

        Ok(output)
    }
}

/// Cut `output` at the earliest stop sequence. Returns true when a cut
/// happened and generation should end.
fn truncate_at_stop(output: &mut String, stop: &[&str]) -> bool {
    let earliest = stop
        .iter()
        .filter_map(|s| output.find(s))
        .min();

    if let Some(idx) = earliest {
        output.truncate(idx);
        return true;
    }
    false
}
