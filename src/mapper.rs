//! Engine record → local model mapping
//!
//! Pure functions, one per entity kind. Secrets are decrypted here and
//! nowhere else, so a mapped `SourceConfig` never carries ciphertext.
//! Mapping is deterministic: the same input always yields the same output.

use crate::engine::{EngineFeature, EnginePackage, EngineSetting, EngineSource};
use crate::error::{ConfigError, Result};
use crate::models::{FeatureFlag, Package, Setting, SourceConfig};
use crate::secret::SecretCodec;
use crate::store::Collection;
use serde::Serialize;

/// A record left out of a batch because it could not be mapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub collection: Collection,
    pub key: String,
    pub reason: String,
}

pub fn map_source(codec: &SecretCodec, source: &EngineSource) -> Result<SourceConfig> {
    let decrypt = |field: &str, value: Option<&str>| {
        codec.decrypt_optional(value).map_err(|e| match e {
            ConfigError::SecretDecryption(reason) => ConfigError::SecretDecryption(format!(
                "source '{}' field '{}': {}",
                source.id, field, reason
            )),
            other => other,
        })
    };

    Ok(SourceConfig {
        id: source.id.clone(),
        url: source.value.clone(),
        disabled: source.disabled,
        priority: source.priority,
        user_name: source.user_name.clone().filter(|u| !u.is_empty()),
        password: decrypt("password", source.password.as_deref())?,
        certificate: source.certificate.clone().filter(|c| !c.is_empty()),
        certificate_password: decrypt(
            "certificatePassword",
            source.certificate_password.as_deref(),
        )?,
        visible_to_admins_only: source.visible_to_admin_only,
        bypass_proxy: source.bypass_proxy,
        allow_self_service: source.allow_self_service,
    })
}

/// Inverse of [`map_source`] for write-back; secrets are re-encrypted
pub fn unmap_source(codec: &SecretCodec, source: &SourceConfig) -> Result<EngineSource> {
    let encrypt = |value: &Option<String>| -> Result<Option<String>> {
        match value.as_deref() {
            Some(plain) if !plain.is_empty() => Ok(Some(codec.encrypt(plain)?)),
            _ => Ok(None),
        }
    };

    Ok(EngineSource {
        id: source.id.clone(),
        value: source.url.clone(),
        disabled: source.disabled,
        priority: source.priority,
        user_name: source.user_name.clone().filter(|u| !u.is_empty()),
        password: encrypt(&source.password)?,
        certificate: source.certificate.clone().filter(|c| !c.is_empty()),
        certificate_password: encrypt(&source.certificate_password)?,
        visible_to_admin_only: source.visible_to_admins_only,
        bypass_proxy: source.bypass_proxy,
        allow_self_service: source.allow_self_service,
    })
}

pub fn map_setting(setting: &EngineSetting) -> Setting {
    Setting {
        key: setting.key.clone(),
        value: setting.value.clone(),
        description: setting.description.clone(),
    }
}

pub fn map_feature(feature: &EngineFeature) -> FeatureFlag {
    FeatureFlag {
        name: feature.name.clone(),
        enabled: feature.enabled,
        description: feature.description.clone(),
        set_explicitly: feature.set_explicitly,
    }
}

pub fn map_package(package: &EnginePackage) -> Package {
    Package {
        id: package.id.clone(),
        version: package.version.clone(),
        title: package.title.clone(),
        authors: split_people(&package.authors),
        owners: split_people(&package.owners),
        summary: package.summary.clone(),
        description: package.description.clone(),
        project_url: package.project_url.clone(),
        download_count: package.download_count,
        is_prerelease: package.is_prerelease,
    }
}

/// Split "a, b,c" into ["a", "b", "c"], keeping order
fn split_people(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

/// Map a batch of sources; one bad record never blocks the rest
pub fn map_sources(
    codec: &SecretCodec,
    sources: &[EngineSource],
) -> (Vec<SourceConfig>, Vec<SkippedRecord>) {
    let mut mapped = Vec::with_capacity(sources.len());
    let mut skipped = Vec::new();

    for source in sources {
        match map_source(codec, source) {
            Ok(config) => mapped.push(config),
            Err(e) => {
                tracing::warn!(source = %source.id, "Skipping source: {}", e);
                skipped.push(SkippedRecord {
                    collection: Collection::Sources,
                    key: source.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    (mapped, skipped)
}
