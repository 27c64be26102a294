use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub directories: DirectoriesConfig,
}

/// Static engine and sampling parameters. Fixed per process, not tunable per call.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
    #[serde(default = "default_context_size")]
    pub context_size: u32,
    #[serde(default = "default_threads")]
    pub threads: i32,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DownloadConfig {
    /// How many candidates discovery returns at most
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// How many hub search results to scan for small-model matches
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Heuristic keyword filter for "small" models. Both sets are matched
/// against the case-folded identifier; a candidate qualifies when it
/// contains at least one include keyword and no exclude keyword.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct FilterConfig {
    #[serde(default = "default_include_keywords")]
    pub include_keywords: Vec<String>,
    #[serde(default = "default_exclude_keywords")]
    pub exclude_keywords: Vec<String>,
    /// Known-small identifiers appended to every discovery result and
    /// returned alone when the hub query fails
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct DirectoriesConfig {
    /// Overrides the platform data dir (`~/.local/share/confab` on Linux)
    pub data_dir: Option<PathBuf>,
}

impl DirectoriesConfig {
    /// Root directory for models, registry and logs
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("confab")
        })
    }

    /// Root directory for downloaded weights, one subdirectory per identifier
    #[must_use]
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir().join("models")
    }

    /// Persisted identifier -> file mapping
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir().join("registry.json")
    }

    /// Dated log files
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

// Default value functions
fn default_max_tokens() -> usize {
    512
}
fn default_temperature() -> f32 {
    0.8
}
fn default_top_p() -> f32 {
    0.95
}
fn default_repeat_penalty() -> f32 {
    1.15
}
fn default_context_size() -> u32 {
    2048
}
fn default_threads() -> i32 {
    4
}
fn default_max_results() -> usize {
    20
}
fn default_scan_limit() -> usize {
    50
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_include_keywords() -> Vec<String> {
    [
        "1b", "2b", "3b", "4b", "5b", "6b", "7b", "small", "mini", "tiny", "chat", "instruct",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
fn default_exclude_keywords() -> Vec<String> {
    [
        "8b", "9b", "10b", "11b", "12b", "13b", "14b", "15b", "20b", "30b", "70b", "175b",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
fn default_fallback_models() -> Vec<String> {
    [
        "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
        "Qwen/Qwen2.5-0.5B-Instruct-GGUF",
        "Qwen/Qwen2.5-1.5B-Instruct-GGUF",
        "HuggingFaceTB/SmolLM2-1.7B-Instruct-GGUF",
        "bartowski/Llama-3.2-1B-Instruct-GGUF",
        "bartowski/Phi-3.5-mini-instruct-GGUF",
        "Qwen/Qwen2.5-3B-Instruct-GGUF",
        "TheBloke/phi-2-GGUF",
        "Qwen/Qwen3-0.6B-GGUF",
        "Qwen/Qwen3-1.7B-GGUF",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
            context_size: default_context_size(),
            threads: default_threads(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            scan_limit: default_scan_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_keywords: default_include_keywords(),
            exclude_keywords: default_exclude_keywords(),
            fallback_models: default_fallback_models(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.generation.context_size, 2048);
        assert_eq!(config.generation.threads, 4);
        assert_eq!(config.download.max_results, 20);
        assert!(!config.filter.fallback_models.is_empty());
    }

    #[test]
    fn test_partial_config_merges_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [generation]
            temperature = 0.5
            "#,
        )
        .unwrap();

        assert!((config.generation.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.generation.max_tokens, 512);
        assert_eq!(config.download.scan_limit, 50);
    }

    #[test]
    fn test_filter_keyword_sets_disjoint() {
        let filter = FilterConfig::default();
        for kw in &filter.include_keywords {
            assert!(
                !filter.exclude_keywords.contains(kw),
                "'{kw}' appears in both keyword sets"
            );
        }
    }

    #[test]
    fn test_directories_derive_from_data_dir() {
        let dirs = DirectoriesConfig {
            data_dir: Some(PathBuf::from("/tmp/confab-test")),
        };
        assert_eq!(dirs.models_dir(), PathBuf::from("/tmp/confab-test/models"));
        assert_eq!(
            dirs.registry_path(),
            PathBuf::from("/tmp/confab-test/registry.json")
        );
        assert_eq!(dirs.logs_dir(), PathBuf::from("/tmp/confab-test/logs"));
    }
}
