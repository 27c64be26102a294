use crate::error::{ConfabError, Result};
use crate::hub::ModelHub;
use crate::models::registry::model_dir_name;
use std::path::PathBuf;

/// Weights file extension expected by the inference engine
const WEIGHTS_EXTENSION: &str = ".gguf";

/// Milestones reported while fetching a model. There is no cancellation;
/// a download runs to completion or error.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Started,
    FileSelected(String),
    Downloading {
        bytes_done: u64,
        bytes_total: Option<u64>,
    },
    Completed(PathBuf),
}

/// Fetches weights files into the per-identifier storage layout
pub struct ModelDownloader {
    models_dir: PathBuf,
}

impl ModelDownloader {
    #[must_use]
    pub fn new(models_dir: PathBuf) -> Self {
        Self { models_dir }
    }

    /// Directory a model's weights land in
    #[must_use]
    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        self.models_dir.join(model_dir_name(model_id))
    }

    /// Download the weights file for `model_id`, returning the absolute
    /// path and the source filename. The registry is not touched here;
    /// the caller records success.
    pub async fn download(
        &self,
        hub: &dyn ModelHub,
        model_id: &str,
        on_event: &mut (dyn FnMut(DownloadEvent) + Send),
    ) -> Result<(PathBuf, String)> {
        on_event(DownloadEvent::Started);

        let filename = match hub.list_files(model_id).await {
            Ok(files) => pick_weights_file(&files).ok_or_else(|| {
                ConfabError::Download(format!("No {WEIGHTS_EXTENSION} file in {model_id}"))
            })?,
            Err(e) => {
                tracing::warn!("File listing for {model_id} failed, trying a common filename: {e}");
                fallback_filename(model_id)
            }
        };
        on_event(DownloadEvent::FileSelected(filename.clone()));

        let dest = self.model_dir(model_id).join(&filename);
        hub.download_file(model_id, &filename, &dest, &mut |bytes_done, bytes_total| {
            on_event(DownloadEvent::Downloading {
                bytes_done,
                bytes_total,
            });
        })
        .await?;

        let abs = if dest.is_absolute() {
            dest
        } else {
            std::env::current_dir()?.join(dest)
        };
        on_event(DownloadEvent::Completed(abs.clone()));

        Ok((abs, filename))
    }
}

/// Pick the lexicographically smallest weights filename. A heuristic proxy
/// for the smallest quantized variant, not a guaranteed minimum.
#[must_use]
pub fn pick_weights_file(files: &[String]) -> Option<String> {
    files
        .iter()
        .filter(|f| f.ends_with(WEIGHTS_EXTENSION))
        .min()
        .cloned()
}

/// Commonly-used weights filenames, tried (first only) when the
/// repository listing is unavailable
fn fallback_filename(model_id: &str) -> String {
    let name = model_id.rsplit('/').next().unwrap_or(model_id);
    let candidates = [
        "model.gguf".to_string(),
        "ggml-model.gguf".to_string(),
        format!("{name}.gguf"),
        "pytorch_model.gguf".to_string(),
    ];
    candidates[0].clone()
}

/// Format bytes as human-readable string
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_weights_file_lexicographically_smallest() {
        let files = vec![
            "b.gguf".to_string(),
            "a.gguf".to_string(),
            "readme.md".to_string(),
        ];
        assert_eq!(pick_weights_file(&files), Some("a.gguf".to_string()));
    }

    #[test]
    fn test_pick_weights_file_ignores_other_extensions() {
        let files = vec!["config.json".to_string(), "model.safetensors".to_string()];
        assert_eq!(pick_weights_file(&files), None);
    }

    #[test]
    fn test_pick_weights_file_empty() {
        assert_eq!(pick_weights_file(&[]), None);
    }

    #[test]
    fn test_fallback_filename_is_first_common_name() {
        assert_eq!(fallback_filename("org/some-model"), "model.gguf");
    }

    #[test]
    fn test_model_dir_layout() {
        let downloader = ModelDownloader::new(PathBuf::from("/data/models"));
        assert_eq!(
            downloader.model_dir("org/model-a"),
            PathBuf::from("/data/models/org_model-a")
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1_572_864), "1.50 MB");
        assert_eq!(format_bytes(1_073_741_824), "1.00 GB");
    }
}
