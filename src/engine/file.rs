//! File-backed engine adapter
//!
//! Reads and writes the engine configuration document directly. Writes go to
//! a sibling temp file that is renamed over the original, so a crash never
//! leaves a half-written configuration behind.

use super::{ConfigEngine, EngineFeature, EngineSetting, EngineSnapshot, EngineSource};
use crate::error::EngineError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Engine configuration stored as a JSON document on disk
pub struct FileEngine {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<EngineSnapshot, EngineError> {
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), EngineError> {
        let body = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load, apply `edit`, and save while holding the write lock
    fn modify<F>(&self, edit: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut EngineSnapshot) -> Result<(), EngineError>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| EngineError::Rejected("engine writer lock poisoned".into()))?;

        let mut snapshot = self.load()?;
        edit(&mut snapshot)?;
        self.save(&snapshot)
    }
}

impl ConfigEngine for FileEngine {
    fn list_sources(&self) -> Result<Vec<EngineSource>, EngineError> {
        Ok(self.load()?.sources)
    }

    fn list_features(&self) -> Result<Vec<EngineFeature>, EngineError> {
        Ok(self.load()?.features)
    }

    fn list_settings(&self) -> Result<Vec<EngineSetting>, EngineError> {
        Ok(self.load()?.settings)
    }

    fn snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        self.load()
    }

    fn set_feature(&self, name: &str, enabled: bool) -> Result<(), EngineError> {
        self.modify(|snapshot| {
            let feature = snapshot
                .features
                .iter_mut()
                .find(|f| f.name == name)
                .ok_or_else(|| EngineError::Rejected(format!("no feature named '{name}'")))?;
            feature.enabled = enabled;
            feature.set_explicitly = true;
            Ok(())
        })?;
        tracing::info!(feature = name, enabled, "Engine feature updated");
        Ok(())
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.modify(|snapshot| {
            match snapshot.settings.iter_mut().find(|s| s.key == key) {
                Some(setting) => setting.value = value.to_string(),
                None => snapshot.settings.push(EngineSetting {
                    key: key.to_string(),
                    value: value.to_string(),
                    description: String::new(),
                }),
            }
            Ok(())
        })?;
        tracing::info!(key, "Engine setting updated");
        Ok(())
    }

    fn set_source(&self, source: &EngineSource) -> Result<(), EngineError> {
        self.modify(|snapshot| {
            match snapshot.sources.iter_mut().find(|s| s.id == source.id) {
                Some(existing) => *existing = source.clone(),
                None => snapshot.sources.push(source.clone()),
            }
            Ok(())
        })?;
        tracing::info!(source = %source.id, "Engine source saved");
        Ok(())
    }

    fn remove_source(&self, id: &str) -> Result<(), EngineError> {
        self.modify(|snapshot| {
            snapshot.sources.retain(|s| s.id != id);
            Ok(())
        })?;
        tracing::info!(source = id, "Engine source removed");
        Ok(())
    }
}
