//! In-memory engine double for tests

use super::{ConfigEngine, EngineFeature, EngineSetting, EngineSnapshot, EngineSource};
use crate::error::EngineError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Engine that keeps its configuration in memory and can be told to fail
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineSnapshot>,
    reject_writes: AtomicBool,
    fail_reads: AtomicBool,
    writes: AtomicUsize,
}

impl FakeEngine {
    pub fn new(snapshot: EngineSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
            ..Default::default()
        }
    }

    /// Replace the upstream configuration wholesale
    pub fn replace(&self, snapshot: EngineSnapshot) {
        *self.state.lock().unwrap() = snapshot;
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of accepted writes
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> EngineSnapshot {
        self.state.lock().unwrap().clone()
    }

    fn read(&self) -> Result<EngineSnapshot, EngineError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "engine config not reachable",
            )));
        }
        Ok(self.current())
    }

    fn write<F>(&self, edit: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut EngineSnapshot) -> Result<(), EngineError>,
    {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(EngineError::Rejected("simulated engine failure".into()));
        }
        edit(&mut *self.state.lock().unwrap())?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ConfigEngine for FakeEngine {
    fn list_sources(&self) -> Result<Vec<EngineSource>, EngineError> {
        Ok(self.read()?.sources)
    }

    fn list_features(&self) -> Result<Vec<EngineFeature>, EngineError> {
        Ok(self.read()?.features)
    }

    fn list_settings(&self) -> Result<Vec<EngineSetting>, EngineError> {
        Ok(self.read()?.settings)
    }

    fn set_feature(&self, name: &str, enabled: bool) -> Result<(), EngineError> {
        self.write(|s| {
            let feature = s
                .features
                .iter_mut()
                .find(|f| f.name == name)
                .ok_or_else(|| EngineError::Rejected(format!("no feature named '{name}'")))?;
            feature.enabled = enabled;
            Ok(())
        })
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.write(|s| {
            match s.settings.iter_mut().find(|x| x.key == key) {
                Some(setting) => setting.value = value.to_string(),
                None => s.settings.push(EngineSetting {
                    key: key.to_string(),
                    value: value.to_string(),
                    description: String::new(),
                }),
            }
            Ok(())
        })
    }

    fn set_source(&self, source: &EngineSource) -> Result<(), EngineError> {
        self.write(|s| {
            s.sources.retain(|x| x.id != source.id);
            s.sources.push(source.clone());
            Ok(())
        })
    }

    fn remove_source(&self, id: &str) -> Result<(), EngineError> {
        self.write(|s| {
            s.sources.retain(|x| x.id != id);
            Ok(())
        })
    }
}
