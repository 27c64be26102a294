use thiserror::Error;

/// Main error type for Confab
#[derive(Error, Debug)]
pub enum ConfabError {
    #[error("Discovery error: {0}\n\nTroubleshooting:\n- Check internet connection\n- Verify the hub is reachable: https://huggingface.co\n- The built-in fallback list still works offline")]
    Discovery(String),

    #[error("Download error: {0}\n\nTroubleshooting:\n- Check internet connection and free disk space\n- Some repositories gate their files; try another model\n- Verify the identifier is spelled owner/name")]
    Download(String),

    #[error("Model load error: {0}\n\nTroubleshooting:\n- Run 'confab models list' to check downloaded files\n- Run 'confab models clean' to drop stale registry entries\n- The file may be a partial download; delete and re-download")]
    Load(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("No model loaded. Select and load a model first")]
    NoModelLoaded,

    #[error("Registry error: {0}\n\nTroubleshooting:\n- The registry file is plain JSON and can be hand-edited\n- Run 'confab models fix-paths' to repair relative paths\n- Delete the registry file to start from an empty mapping")]
    Registry(String),

    #[error("Config error: {0}\n\nTroubleshooting:\n- Check config file: ~/.config/confab/config.toml\n- Run with RUST_LOG=debug for more details")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfabError>;
