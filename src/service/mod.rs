//! Config service: engine ⇄ local mirror orchestration
//!
//! ```text
//! refresh():      engine.snapshot() ──→ mapper ──→ store.upsert / prune
//! set_feature():  validate ──→ engine.set_feature ──(ok)──→ store.upsert
//! set_setting():  engine.set_setting ──(ok)──→ store.upsert
//! list_*():       store only (no engine round-trip)
//! ```
//!
//! Mutations are write-through: the engine is changed first and the mirror is
//! only updated once the engine confirms. Every mutating call, `refresh`
//! included, runs under one coarse lock so an engine call and its mirror
//! update never interleave with another operation.

use crate::engine::ConfigEngine;
use crate::error::{ConfigError, Result};
use crate::mapper::{self, SkippedRecord};
use crate::models::{FeatureFlag, Setting, SourceConfig};
use crate::secret::SecretCodec;
use crate::store::{Collection, LocalStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(test)]
mod tests;

/// Result of a successful mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The mirror changed
    Applied,
    /// The value was already in the requested state; still a success
    Unchanged,
}

/// Summary of one refresh pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub sources: usize,
    pub features: usize,
    pub settings: usize,
    /// Local records deleted because the engine no longer reports them
    pub removed: usize,
    /// Upstream records that could not be mapped
    pub skipped: Vec<SkippedRecord>,
}

pub struct ConfigService {
    engine: Arc<dyn ConfigEngine>,
    store: Arc<LocalStore>,
    codec: SecretCodec,
    mutation_lock: Mutex<()>,
}

impl ConfigService {
    pub fn new(engine: Arc<dyn ConfigEngine>, store: Arc<LocalStore>, codec: SecretCodec) -> Self {
        Self {
            engine,
            store,
            codec,
            mutation_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state
        self.mutation_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Refresh
    // ─────────────────────────────────────────────────────────────────────

    /// Mirror the engine's current configuration into the local store
    ///
    /// Records that fail to map are skipped and reported; they are not
    /// deleted locally since they still exist upstream.
    pub fn refresh(&self) -> Result<RefreshReport> {
        let _guard = self.lock();

        let snapshot = self.engine.snapshot().map_err(|e| {
            tracing::warn!("Engine read failed during refresh: {}", e);
            ConfigError::from(e)
        })?;

        let (sources, skipped) = mapper::map_sources(&self.codec, &snapshot.sources);
        let features: Vec<FeatureFlag> = snapshot.features.iter().map(mapper::map_feature).collect();
        let settings: Vec<Setting> = snapshot.settings.iter().map(mapper::map_setting).collect();

        for source in &sources {
            self.store.upsert(source)?;
        }
        for feature in &features {
            self.store.upsert(feature)?;
        }
        for setting in &settings {
            self.store.upsert(setting)?;
        }

        let mut removed = 0;
        removed += self.prune(
            Collection::Sources,
            snapshot.sources.iter().map(|s| s.id.as_str()).collect(),
        )?;
        removed += self.prune(
            Collection::Features,
            snapshot.features.iter().map(|f| f.name.as_str()).collect(),
        )?;
        removed += self.prune(
            Collection::Settings,
            snapshot.settings.iter().map(|s| s.key.as_str()).collect(),
        )?;

        let report = RefreshReport {
            sources: sources.len(),
            features: features.len(),
            settings: settings.len(),
            removed,
            skipped,
        };

        tracing::info!(
            sources = report.sources,
            features = report.features,
            settings = report.settings,
            removed = report.removed,
            skipped = report.skipped.len(),
            "Refreshed local mirror from engine"
        );

        Ok(report)
    }

    /// Delete local keys the engine no longer reports
    fn prune(&self, collection: Collection, upstream: HashSet<&str>) -> Result<usize> {
        let mut removed = 0;
        for key in self.store.keys(collection)? {
            if !upstream.contains(key.as_str()) {
                self.store.delete_key(collection, &key)?;
                tracing::debug!(%collection, key = %key, "Removed record absent upstream");
                removed += 1;
            }
        }
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────

    /// Enable or disable a feature the engine has reported
    pub fn set_feature(&self, name: &str, enabled: bool) -> Result<MutationOutcome> {
        let _guard = self.lock();

        let current: FeatureFlag = self
            .store
            .get_by_key(name)?
            .ok_or_else(|| ConfigError::UnknownFeature(name.to_string()))?;

        self.engine.set_feature(name, enabled).map_err(|e| {
            tracing::warn!(feature = name, "Engine rejected feature change: {}", e);
            ConfigError::from(e)
        })?;

        let outcome = if current.enabled == enabled {
            MutationOutcome::Unchanged
        } else {
            MutationOutcome::Applied
        };

        self.store.upsert(&FeatureFlag {
            enabled,
            set_explicitly: true,
            ..current
        })?;

        tracing::info!(feature = name, enabled, ?outcome, "Feature updated");
        Ok(outcome)
    }

    /// Set a global setting; keys are open-ended
    pub fn set_setting(&self, key: &str, value: &str) -> Result<MutationOutcome> {
        let _guard = self.lock();

        let current: Option<Setting> = self.store.get_by_key(key)?;

        self.engine.set_setting(key, value).map_err(|e| {
            tracing::warn!(key, "Engine rejected setting change: {}", e);
            ConfigError::from(e)
        })?;

        let outcome = match &current {
            Some(existing) if existing.value == value => MutationOutcome::Unchanged,
            _ => MutationOutcome::Applied,
        };

        self.store.upsert(&Setting {
            key: key.to_string(),
            value: value.to_string(),
            description: current.map(|c| c.description).unwrap_or_default(),
        })?;

        tracing::info!(key, ?outcome, "Setting updated");
        Ok(outcome)
    }

    /// Add or replace a source; secrets are encrypted before they reach the engine
    pub fn set_source(&self, source: SourceConfig) -> Result<MutationOutcome> {
        let _guard = self.lock();

        let current: Option<SourceConfig> = self.store.get_by_key(&source.id)?;
        let engine_source = mapper::unmap_source(&self.codec, &source)?;

        self.engine.set_source(&engine_source).map_err(|e| {
            tracing::warn!(source = %source.id, "Engine rejected source change: {}", e);
            ConfigError::from(e)
        })?;

        // Mirror what the engine now holds, in the same form a refresh produces
        let accepted = mapper::map_source(&self.codec, &engine_source)?;

        let outcome = if current.as_ref() == Some(&accepted) {
            MutationOutcome::Unchanged
        } else {
            MutationOutcome::Applied
        };

        self.store.upsert(&accepted)?;
        tracing::info!(source = %accepted.id, ?outcome, "Source saved");
        Ok(outcome)
    }

    /// Remove a source upstream, then locally
    pub fn remove_source(&self, id: &str) -> Result<MutationOutcome> {
        let _guard = self.lock();

        let existed = self.store.get_by_key::<SourceConfig>(id)?.is_some();

        self.engine.remove_source(id).map_err(|e| {
            tracing::warn!(source = id, "Engine rejected source removal: {}", e);
            ConfigError::from(e)
        })?;

        self.store.delete::<SourceConfig>(id)?;

        Ok(if existed {
            MutationOutcome::Applied
        } else {
            MutationOutcome::Unchanged
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads (served from the mirror)
    // ─────────────────────────────────────────────────────────────────────

    pub fn list_sources(&self) -> Result<Vec<SourceConfig>> {
        self.store.get_all()
    }

    pub fn list_features(&self) -> Result<Vec<FeatureFlag>> {
        self.store.get_all()
    }

    pub fn list_settings(&self) -> Result<Vec<Setting>> {
        self.store.get_all()
    }

    pub fn get_feature(&self, name: &str) -> Result<Option<FeatureFlag>> {
        self.store.get_by_key(name)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<Setting>> {
        self.store.get_by_key(key)
    }
}
