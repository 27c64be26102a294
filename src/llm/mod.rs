pub mod llama;

use crate::config::schema::GenerationConfig;
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

pub use llama::LlamaLoader;

/// Engine construction and sampling parameters. Static configuration,
/// fixed for the lifetime of a loaded handle.
#[derive(Debug, Clone)]
pub struct EngineParams {
    pub context_size: u32,
    pub threads: i32,
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl From<&GenerationConfig> for EngineParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            context_size: config.context_size,
            threads: config.threads,
            temperature: config.temperature,
            top_p: config.top_p,
            repeat_penalty: config.repeat_penalty,
        }
    }
}

/// A loaded model handle able to complete prompts
///
/// Generation is CPU-bound and blocking; callers run it off the async
/// runtime (`spawn_blocking`).
pub trait TextEngine: Send + Sync {
    /// Complete `prompt`, stopping at `max_tokens`, end-of-generation or
    /// the first occurrence of any stop sequence
    fn generate(&self, prompt: &str, max_tokens: usize, stop: &[&str]) -> Result<String>;
}

/// Constructs engine handles from weights files
pub trait EngineLoader: Send + Sync {
    fn load(&self, path: &Path, params: &EngineParams) -> Result<Arc<dyn TextEngine>>;
}
