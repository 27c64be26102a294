//! Maintenance operations over the registry and the models directory.
//!
//! These back the `confab models` tool: pure-ish functions returning
//! reports, rendered by the CLI. Failures are reported, never raised past
//! the tool's loop.

use crate::error::Result;
use crate::models::registry::Registry;
use std::fs;
use std::path::{Path, PathBuf};

/// One registry entry with its on-disk status
#[derive(Debug, Clone)]
pub struct EntryStatus {
    pub model_id: String,
    pub path: PathBuf,
    pub file: String,
    /// None when the backing file is missing
    pub size_bytes: Option<u64>,
}

/// Registry entries with size and availability
#[must_use]
pub fn list_entries(registry: &Registry) -> Vec<EntryStatus> {
    registry
        .iter()
        .map(|(id, record)| EntryStatus {
            model_id: id.clone(),
            path: record.path.clone(),
            file: record.file.clone(),
            size_bytes: fs::metadata(&record.path).ok().map(|m| m.len()),
        })
        .collect()
}

/// What `clean` removed
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub dropped_entries: Vec<String>,
    pub removed_dirs: Vec<PathBuf>,
}

/// Drop registry entries whose backing file is missing, then remove
/// directories left empty under the models root
pub fn clean(registry: &mut Registry, models_dir: &Path) -> Result<CleanReport> {
    let mut report = CleanReport::default();

    let stale: Vec<String> = registry
        .iter()
        .filter(|(_, record)| !record.path.exists())
        .map(|(id, _)| id.clone())
        .collect();

    for id in stale {
        registry.remove(&id)?;
        report.dropped_entries.push(id);
    }

    remove_empty_dirs(models_dir, &mut report.removed_dirs)?;
    Ok(report)
}

/// Remove empty directories below `dir`, deepest first. `dir` itself stays.
fn remove_empty_dirs(dir: &Path, removed: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        remove_empty_dirs(&path, removed)?;
        if fs::read_dir(&path)?.next().is_none() {
            fs::remove_dir(&path)?;
            removed.push(path);
        }
    }
    Ok(())
}

/// Registry-wide counts and disk usage
#[derive(Debug, Clone)]
pub struct Stats {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub total_bytes: u64,
    pub models_dir: PathBuf,
}

#[must_use]
pub fn stats(registry: &Registry, models_dir: &Path) -> Stats {
    let mut valid = 0usize;
    let mut total_bytes = 0u64;

    for (_, record) in registry.iter() {
        if let Ok(meta) = fs::metadata(&record.path) {
            valid += 1;
            total_bytes += meta.len();
        }
    }

    Stats {
        total: registry.len(),
        valid,
        invalid: registry.len() - valid,
        total_bytes,
        models_dir: models_dir.to_path_buf(),
    }
}

/// What `delete` removed
#[derive(Debug, Clone)]
pub struct DeleteReport {
    pub model_id: String,
    pub removed_file: Option<PathBuf>,
    pub removed_dir: Option<PathBuf>,
    pub freed_bytes: u64,
}

/// Remove a model's weights file, its directory if now empty, and the
/// registry entry
pub fn delete(registry: &mut Registry, model_id: &str) -> Result<DeleteReport> {
    let record = registry.remove(model_id)?;

    let mut report = DeleteReport {
        model_id: model_id.to_string(),
        removed_file: None,
        removed_dir: None,
        freed_bytes: 0,
    };

    if record.path.exists() {
        report.freed_bytes = fs::metadata(&record.path).map_or(0, |m| m.len());
        fs::remove_file(&record.path)?;
        report.removed_file = Some(record.path.clone());
    }

    if let Some(dir) = record.path.parent() {
        if dir.exists() && fs::read_dir(dir)?.next().is_none() {
            fs::remove_dir(dir)?;
            report.removed_dir = Some(dir.to_path_buf());
        }
    }

    Ok(report)
}
