use crate::chat::prompt::STOP_SEQUENCES;
use crate::config::Config;
use crate::error::{ConfabError, Result};
use crate::hub::ModelHub;
use crate::llm::{EngineLoader, EngineParams, TextEngine};
use crate::models::downloader::{format_bytes, DownloadEvent, ModelDownloader};
use crate::models::registry::{ModelRecord, Registry};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lifecycle state of the single active model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
}

/// Owns the registry and the single active inference handle.
///
/// At most one model is loaded at any time; replacing it releases the
/// previous handle first. Constructed explicitly and passed around, never
/// a process-wide singleton. Calls are not internally serialized; the
/// manager expects the single-flow dispatch of the hosting front-end.
pub struct ModelManager {
    registry: Registry,
    hub: Arc<dyn ModelHub>,
    loader: Arc<dyn EngineLoader>,
    downloader: ModelDownloader,
    engine_params: EngineParams,
    engine: Option<Arc<dyn TextEngine>>,
    state: ModelState,
    active_path: Option<PathBuf>,
}

impl ModelManager {
    pub fn new(
        registry: Registry,
        hub: Arc<dyn ModelHub>,
        loader: Arc<dyn EngineLoader>,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            hub,
            loader,
            downloader: ModelDownloader::new(config.directories.models_dir()),
            engine_params: EngineParams::from(&config.generation),
            engine: None,
            state: ModelState::Unloaded,
            active_path: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> ModelState {
        self.state
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ModelState::Ready
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Path of the currently loaded model, if any
    #[must_use]
    pub fn active_path(&self) -> Option<&Path> {
        self.active_path.as_deref()
    }

    /// Make sure the weights for `model_id` are on disk, downloading on a
    /// registry miss (or when the recorded file has gone missing).
    /// Successful downloads are recorded in the registry; failures leave
    /// it untouched.
    pub async fn ensure_available(
        &mut self,
        model_id: &str,
        on_event: &mut (dyn FnMut(DownloadEvent) + Send),
    ) -> Result<PathBuf> {
        if let Some(record) = self.registry.get(model_id) {
            if record.downloaded && record.path.exists() {
                tracing::info!("Model {model_id} already downloaded: {}", record.path.display());
                return Ok(record.path.clone());
            }
        }

        let (path, file) = self
            .downloader
            .download(self.hub.as_ref(), model_id, on_event)
            .await?;

        self.registry.upsert(
            model_id.to_string(),
            ModelRecord {
                path: path.clone(),
                downloaded: true,
                file,
            },
        )?;
        tracing::info!("Downloaded {model_id} to {}", path.display());

        Ok(path)
    }

    /// Load the model at `path`, releasing any previously active handle
    /// first. A failed load always leaves the manager Unloaded, even when
    /// a model was loaded before.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        self.engine = None;
        self.active_path = None;
        self.state = ModelState::Loading;

        if !path.exists() {
            self.state = ModelState::Unloaded;
            tracing::error!("Model file not found: {}", path.display());
            return Err(ConfabError::Load(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let size = std::fs::metadata(&path).map_or(0, |m| m.len());
        tracing::info!(
            "Loading model: {} ({})",
            path.display(),
            format_bytes(size)
        );

        match self.loader.load(&path, &self.engine_params) {
            Ok(engine) => {
                self.engine = Some(engine);
                self.active_path = Some(path.clone());
                self.state = ModelState::Ready;
                tracing::info!("Model loaded: {}", path.display());
                Ok(())
            }
            Err(e) => {
                self.state = ModelState::Unloaded;
                tracing::error!("Failed to load {}: {e:?}", path.display());
                Err(e)
            }
        }
    }

    /// Release the active handle
    pub fn unload(&mut self) {
        self.engine = None;
        self.active_path = None;
        self.state = ModelState::Unloaded;
    }

    /// Complete `prompt` with the active model, stopping at the fixed
    /// turn-boundary sequences. Fails with `NoModelLoaded` unless Ready;
    /// engine faults surface as tagged `Generation` errors (the chat
    /// boundary flattens them to display text).
    pub async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String> {
        let engine = match (&self.state, &self.engine) {
            (ModelState::Ready, Some(engine)) => Arc::clone(engine),
            _ => return Err(ConfabError::NoModelLoaded),
        };

        let prompt = prompt.to_string();
        let text = tokio::task::spawn_blocking(move || {
            engine.generate(&prompt, max_tokens, STOP_SEQUENCES)
        })
        .await
        .map_err(|e| ConfabError::Generation(format!("Generation task panicked: {e}")))??;

        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DirectoriesConfig;
    use crate::hub::{HubModel, ProgressFn};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakeHub {
        files: Vec<&'static str>,
    }

    #[async_trait]
    impl ModelHub for FakeHub {
        async fn search_models(&self, _limit: usize) -> Result<Vec<HubModel>> {
            Ok(Vec::new())
        }

        async fn list_files(&self, _model_id: &str) -> Result<Vec<String>> {
            Ok(self.files.iter().map(ToString::to_string).collect())
        }

        async fn download_file(
            &self,
            _model_id: &str,
            filename: &str,
            dest: &Path,
            progress: ProgressFn<'_>,
        ) -> Result<()> {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest, filename)?;
            progress(filename.len() as u64, Some(filename.len() as u64));
            Ok(())
        }
    }

    struct FakeEngine {
        reply: String,
        calls: Arc<AtomicUsize>,
    }

    impl TextEngine for FakeEngine {
        fn generate(&self, _prompt: &str, _max_tokens: usize, _stop: &[&str]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct FakeLoader {
        reply: String,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl EngineLoader for FakeLoader {
        fn load(&self, _path: &Path, _params: &EngineParams) -> Result<Arc<dyn TextEngine>> {
            if self.fail {
                return Err(ConfabError::Load("engine construction failed".into()));
            }
            Ok(Arc::new(FakeEngine {
                reply: self.reply.clone(),
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    fn test_manager(temp: &TempDir, files: Vec<&'static str>, loader_fails: bool) -> ModelManager {
        let mut config = Config::default();
        config.directories = DirectoriesConfig {
            data_dir: Some(temp.path().to_path_buf()),
        };
        let registry = Registry::load(&config.directories.registry_path()).unwrap();
        ModelManager::new(
            registry,
            Arc::new(FakeHub { files }),
            Arc::new(FakeLoader {
                reply: "hello there".to_string(),
                fail: loader_fails,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            &config,
        )
    }

    #[tokio::test]
    async fn test_ensure_available_downloads_and_registers() {
        let temp = TempDir::new().unwrap();
        let mut manager = test_manager(&temp, vec!["b.gguf", "a.gguf"], false);

        let path = manager
            .ensure_available("org/model-a", &mut |_| {})
            .await
            .unwrap();

        assert!(path.is_absolute());
        assert!(path.exists());
        assert!(path.ends_with("org_model-a/a.gguf"));

        let record = manager.registry().get("org/model-a").unwrap();
        assert!(record.downloaded);
        assert_eq!(record.file, "a.gguf");
        assert_eq!(record.path, path);
    }

    #[tokio::test]
    async fn test_ensure_available_skips_when_present() {
        let temp = TempDir::new().unwrap();
        let mut manager = test_manager(&temp, vec!["a.gguf"], false);

        let first = manager
            .ensure_available("org/model-a", &mut |_| {})
            .await
            .unwrap();

        let mut events = 0usize;
        let second = manager
            .ensure_available("org/model-a", &mut |_| events += 1)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(events, 0, "no download milestones on a registry hit");
    }

    #[tokio::test]
    async fn test_ensure_available_redownloads_missing_file() {
        let temp = TempDir::new().unwrap();
        let mut manager = test_manager(&temp, vec!["a.gguf"], false);

        let path = manager
            .ensure_available("org/model-a", &mut |_| {})
            .await
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        let again = manager
            .ensure_available("org/model-a", &mut |_| {})
            .await
            .unwrap();
        assert!(again.exists());
    }

    #[tokio::test]
    async fn test_ensure_available_failure_leaves_registry_unchanged() {
        let temp = TempDir::new().unwrap();
        // listing succeeds but carries no weights file
        let mut manager = test_manager(&temp, vec!["readme.md"], false);

        let result = manager.ensure_available("org/model-a", &mut |_| {}).await;
        assert!(matches!(result, Err(ConfabError::Download(_))));
        assert!(manager.registry().is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_path_clears_previous_model() {
        let temp = TempDir::new().unwrap();
        let mut manager = test_manager(&temp, vec!["a.gguf"], false);

        let path = manager
            .ensure_available("org/model-a", &mut |_| {})
            .await
            .unwrap();
        manager.load(&path).unwrap();
        assert!(manager.is_ready());

        let result = manager.load(Path::new("/nonexistent/model.gguf"));
        assert!(matches!(result, Err(ConfabError::Load(_))));
        assert_eq!(manager.state(), ModelState::Unloaded);
        assert!(manager.active_path().is_none());
        assert!(matches!(
            manager.generate("hi", 16).await,
            Err(ConfabError::NoModelLoaded)
        ));
    }

    #[tokio::test]
    async fn test_failed_engine_construction_leaves_unloaded() {
        let temp = TempDir::new().unwrap();
        let mut manager = test_manager(&temp, vec!["a.gguf"], true);

        let path = manager
            .ensure_available("org/model-a", &mut |_| {})
            .await
            .unwrap();
        let result = manager.load(&path);
        assert!(result.is_err());
        assert_eq!(manager.state(), ModelState::Unloaded);
    }

    #[tokio::test]
    async fn test_generate_without_model_is_tagged() {
        let temp = TempDir::new().unwrap();
        let manager = test_manager(&temp, vec![], false);
        assert!(matches!(
            manager.generate("hi", 16).await,
            Err(ConfabError::NoModelLoaded)
        ));
    }

    #[tokio::test]
    async fn test_generate_trims_reply() {
        let temp = TempDir::new().unwrap();
        let mut manager = test_manager(&temp, vec!["a.gguf"], false);
        let path = manager
            .ensure_available("org/model-a", &mut |_| {})
            .await
            .unwrap();
        manager.load(&path).unwrap();

        let reply = manager.generate("hi", 16).await.unwrap();
        assert_eq!(reply, "hello there");
    }

    #[tokio::test]
    async fn test_unload_releases_handle() {
        let temp = TempDir::new().unwrap();
        let mut manager = test_manager(&temp, vec!["a.gguf"], false);
        let path = manager
            .ensure_available("org/model-a", &mut |_| {})
            .await
            .unwrap();
        manager.load(&path).unwrap();

        manager.unload();
        assert_eq!(manager.state(), ModelState::Unloaded);
        assert!(manager.active_path().is_none());
    }
}
