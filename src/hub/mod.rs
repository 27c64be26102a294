pub mod huggingface;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

pub use huggingface::HuggingFaceHub;

/// One entry from a hub model search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubModel {
    /// Hub-style identifier, `owner/name`
    pub id: String,
    pub downloads: u64,
}

/// Byte-level progress for a file transfer
pub type ProgressFn<'a> = &'a mut (dyn FnMut(u64, Option<u64>) + Send);

/// Unified interface to the model hub
///
/// The hub is an external collaborator: list candidate identifiers, list the
/// files under one identifier, fetch one file. Implementations map transport
/// failures onto `Discovery` / `Download` errors.
#[async_trait]
pub trait ModelHub: Send + Sync {
    /// Search models tagged with the quantized-weights format, most
    /// downloaded first, at most `limit` results
    async fn search_models(&self, limit: usize) -> Result<Vec<HubModel>>;

    /// List file names available under `model_id`
    async fn list_files(&self, model_id: &str) -> Result<Vec<String>>;

    /// Download `filename` from `model_id` to `dest`, reporting byte progress
    async fn download_file(
        &self,
        model_id: &str,
        filename: &str,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<()>;
}
