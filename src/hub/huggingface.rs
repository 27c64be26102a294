use crate::error::{ConfabError, Result};
use crate::hub::{HubModel, ModelHub, ProgressFn};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const HUB_BASE: &str = "https://huggingface.co";

/// Hub search result entry
#[derive(Debug, Deserialize)]
struct ApiModel {
    #[serde(rename = "modelId", alias = "id")]
    id: String,
    #[serde(default)]
    downloads: u64,
}

/// One entry of the repository tree listing
#[derive(Debug, Deserialize)]
struct TreeItem {
    #[serde(rename = "type")]
    item_type: String,
    path: String,
}

/// HuggingFace Hub client
pub struct HuggingFaceHub {
    client: reqwest::Client,
    base_url: String,
}

impl HuggingFaceHub {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfabError::Discovery(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: HUB_BASE.to_string(),
        })
    }

    /// Point the client at a different hub endpoint (mirrors, tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn search_url(&self, limit: usize) -> String {
        format!(
            "{}/api/models?filter=gguf&sort=downloads&direction=-1&limit={limit}",
            self.base_url
        )
    }

    fn tree_url(&self, model_id: &str) -> String {
        format!("{}/api/models/{model_id}/tree/main", self.base_url)
    }

    fn resolve_url(&self, model_id: &str, filename: &str) -> String {
        format!("{}/{model_id}/resolve/main/{filename}", self.base_url)
    }
}

#[async_trait]
impl ModelHub for HuggingFaceHub {
    async fn search_models(&self, limit: usize) -> Result<Vec<HubModel>> {
        let response = self
            .client
            .get(self.search_url(limit))
            .send()
            .await
            .map_err(|e| ConfabError::Discovery(format!("Hub query failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ConfabError::Discovery(format!(
                "Hub query returned HTTP {}",
                response.status()
            )));
        }

        let models: Vec<ApiModel> = response
            .json()
            .await
            .map_err(|e| ConfabError::Discovery(format!("Malformed hub response: {e}")))?;

        Ok(models
            .into_iter()
            .map(|m| HubModel {
                id: m.id,
                downloads: m.downloads,
            })
            .collect())
    }

    async fn list_files(&self, model_id: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.tree_url(model_id))
            .send()
            .await
            .map_err(|e| ConfabError::Download(format!("File listing failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ConfabError::Download(format!(
                "File listing for {model_id} returned HTTP {}",
                response.status()
            )));
        }

        let items: Vec<TreeItem> = response
            .json()
            .await
            .map_err(|e| ConfabError::Download(format!("Malformed tree listing: {e}")))?;

        Ok(items
            .into_iter()
            .filter(|i| i.item_type == "file")
            .map(|i| i.path)
            .collect())
    }

    async fn download_file(
        &self,
        model_id: &str,
        filename: &str,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let url = self.resolve_url(model_id, filename);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ConfabError::Download(format!("Transfer failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ConfabError::Download(format!(
                "{url} returned HTTP {}",
                response.status()
            )));
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut bytes_done: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(ConfabError::Download(format!("Transfer failed: {e}")));
                }
            };
            file.write_all(&chunk).await?;
            bytes_done += chunk.len() as u64;
            progress(bytes_done, total);
        }

        file.flush().await?;
        Ok(())
    }
}
