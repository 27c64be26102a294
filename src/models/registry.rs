use crate::error::{ConfabError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One downloaded model known to the registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelRecord {
    /// Absolute path of the weights file at write time. Staleness is
    /// possible if the file is deleted externally; `confab models clean`
    /// repairs the mapping.
    pub path: PathBuf,
    pub downloaded: bool,
    /// Source filename within the hub repository
    pub file: String,
}

/// Persistent identifier -> record mapping
///
/// Stored as a single pretty-printed JSON object keyed by hub identifier,
/// kept human-readable and hand-editable. Rewritten after every mutation.
#[derive(Debug)]
pub struct Registry {
    entries: BTreeMap<String, ModelRecord>,
    path: PathBuf,
}

impl Registry {
    /// Load the registry file, starting empty if it doesn't exist.
    /// Malformed JSON is a fatal parse error, never silently empty.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                ConfabError::Registry(format!("Failed to parse {}: {e}", path.display()))
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            entries,
            path: path.to_path_buf(),
        })
    }

    /// Write the full mapping back to disk (tmp + rename)
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| ConfabError::Registry(format!("Failed to serialize registry: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Insert or replace an entry and persist
    pub fn upsert(&mut self, model_id: String, record: ModelRecord) -> Result<()> {
        self.entries.insert(model_id, record);
        self.save()
    }

    /// Remove an entry and persist. Removing an absent identifier is an error.
    pub fn remove(&mut self, model_id: &str) -> Result<ModelRecord> {
        let record = self.entries.remove(model_id).ok_or_else(|| {
            ConfabError::Registry(format!("Model '{model_id}' not in registry"))
        })?;
        self.save()?;
        Ok(record)
    }

    #[must_use]
    pub fn get(&self, model_id: &str) -> Option<&ModelRecord> {
        self.entries.get(model_id)
    }

    #[must_use]
    pub fn contains(&self, model_id: &str) -> bool {
        self.entries.contains_key(model_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelRecord)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite any relative `path` to an absolute path in place,
    /// persisting if anything changed. Returns what was rewritten.
    pub fn fix_paths(&mut self) -> Result<Vec<PathFix>> {
        let base = std::env::current_dir()?;
        let mut fixes = Vec::new();

        for (id, record) in &mut self.entries {
            if record.path.is_relative() {
                let old = record.path.clone();
                record.path = base.join(&old);
                fixes.push(PathFix {
                    model_id: id.clone(),
                    old_path: old,
                    new_path: record.path.clone(),
                    exists: record.path.exists(),
                });
            }
        }

        if !fixes.is_empty() {
            self.save()?;
        }
        Ok(fixes)
    }
}

/// One rewritten registry path
#[derive(Debug, Clone)]
pub struct PathFix {
    pub model_id: String,
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    pub exists: bool,
}

/// Directory name for an identifier under the models root,
/// slashes replaced with underscores
#[must_use]
pub fn model_dir_name(model_id: &str) -> String {
    model_id.replace('/', "_")
}
