//! Config service tests against an in-memory engine and an on-disk store

use super::*;
use crate::engine::fake::FakeEngine;
use crate::engine::{EngineFeature, EngineSetting, EngineSnapshot, EngineSource};

// ─────────────────────────────────────────────────────────────────────────────
// Fixtures
// ─────────────────────────────────────────────────────────────────────────────

const ENTROPY: &str = "service-tests";

struct Harness {
    _dir: tempfile::TempDir,
    engine: Arc<FakeEngine>,
    store: Arc<LocalStore>,
    service: ConfigService,
}

fn harness(snapshot: EngineSnapshot) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalStore::open(dir.path().join("data.db")).unwrap());
    let engine = Arc::new(FakeEngine::new(snapshot));
    let service = ConfigService::new(engine.clone(), store.clone(), SecretCodec::new(ENTROPY));
    Harness {
        _dir: dir,
        engine,
        store,
        service,
    }
}

fn source(id: &str) -> EngineSource {
    EngineSource {
        id: id.to_string(),
        value: format!("https://{id}.example/api/v2/"),
        disabled: false,
        priority: 0,
        user_name: None,
        password: None,
        certificate: None,
        certificate_password: None,
        visible_to_admin_only: false,
        bypass_proxy: false,
        allow_self_service: false,
    }
}

fn feature(name: &str, enabled: bool) -> EngineFeature {
    EngineFeature {
        name: name.to_string(),
        enabled,
        set_explicitly: false,
        description: format!("{name} description"),
    }
}

fn setting(key: &str, value: &str) -> EngineSetting {
    EngineSetting {
        key: key.to_string(),
        value: value.to_string(),
        description: String::new(),
    }
}

fn sample_snapshot() -> EngineSnapshot {
    let codec = SecretCodec::new(ENTROPY);
    let mut private = source("private");
    private.user_name = Some("ci".into());
    private.password = Some(codec.encrypt("token").unwrap());
    private.visible_to_admin_only = true;

    EngineSnapshot {
        sources: vec![source("community"), private],
        features: vec![
            feature("checksumFiles", true),
            feature("autoUninstaller", false),
        ],
        settings: vec![
            setting("cacheLocation", ""),
            setting("commandExecutionTimeoutSeconds", "2700"),
        ],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn refresh_mirrors_the_mapped_snapshot() {
    let snapshot = sample_snapshot();
    let h = harness(snapshot.clone());

    let report = h.service.refresh().unwrap();
    assert_eq!(report.sources, 2);
    assert_eq!(report.features, 2);
    assert_eq!(report.settings, 2);
    assert!(report.skipped.is_empty());

    let codec = SecretCodec::new(ENTROPY);
    let expected_sources: Vec<_> = snapshot
        .sources
        .iter()
        .map(|s| mapper::map_source(&codec, s).unwrap())
        .collect();
    let expected_features: Vec<_> = snapshot.features.iter().map(mapper::map_feature).collect();
    let expected_settings: Vec<_> = snapshot.settings.iter().map(mapper::map_setting).collect();

    assert_eq!(h.service.list_sources().unwrap(), expected_sources);
    assert_eq!(h.service.list_features().unwrap(), expected_features);
    assert_eq!(h.service.list_settings().unwrap(), expected_settings);

    let private = &h.service.list_sources().unwrap()[1];
    assert_eq!(private.password.as_deref(), Some("token"));
    assert!(private.visible_to_admins_only);
}

#[test]
fn refresh_deletes_records_removed_upstream() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();

    let mut smaller = sample_snapshot();
    smaller.sources.retain(|s| s.id == "community");
    smaller.features.retain(|f| f.name == "checksumFiles");
    smaller.settings.clear();
    h.engine.replace(smaller);

    let report = h.service.refresh().unwrap();
    assert_eq!(report.removed, 4);

    let ids: Vec<_> = h.service.list_sources().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["community"]);
    assert_eq!(h.service.list_features().unwrap().len(), 1);
    assert!(h.service.list_settings().unwrap().is_empty());
}

#[test]
fn refresh_isolates_one_corrupt_source() {
    let mut snapshot = EngineSnapshot::default();
    for id in ["a", "b", "c", "d", "e"] {
        snapshot.sources.push(source(id));
    }
    snapshot.sources[3].password = Some("bm90LWEtcmVhbC1lbnZlbG9wZQ==".into());
    let h = harness(snapshot);

    let report = h.service.refresh().unwrap();
    assert_eq!(report.sources, 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].key, "d");
    assert_eq!(report.skipped[0].collection, Collection::Sources);
    assert_eq!(h.service.list_sources().unwrap().len(), 4);
}

#[test]
fn skipped_source_keeps_its_last_good_copy() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();

    let mut broken = sample_snapshot();
    broken.sources[1].password = Some("corrupt".into());
    h.engine.replace(broken);

    let report = h.service.refresh().unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.removed, 0);

    let private: SourceConfig = h.store.get_by_key("private").unwrap().unwrap();
    assert_eq!(private.password.as_deref(), Some("token"));
}

#[test]
fn refresh_with_unreachable_engine_leaves_mirror_alone() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();
    h.engine.set_fail_reads(true);

    let err = h.service.refresh().unwrap_err();
    assert!(matches!(err, ConfigError::EngineUnavailable(_)));
    assert_eq!(h.service.list_sources().unwrap().len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Features
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn unknown_feature_fails_and_changes_nothing() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();
    let before = h.service.list_features().unwrap();

    let err = h.service.set_feature("X", true).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownFeature(ref n) if n == "X"));
    assert_eq!(h.service.list_features().unwrap(), before);
    assert_eq!(h.engine.writes(), 0);
}

#[test]
fn feature_toggle_writes_through_then_mirrors() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();

    let outcome = h.service.set_feature("autoUninstaller", true).unwrap();
    assert_eq!(outcome, MutationOutcome::Applied);
    assert!(h.service.get_feature("autoUninstaller").unwrap().unwrap().enabled);
    assert!(h
        .engine
        .current()
        .features
        .iter()
        .any(|f| f.name == "autoUninstaller" && f.enabled));
}

#[test]
fn reapplying_a_feature_state_is_an_unchanged_success() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();

    let outcome = h.service.set_feature("checksumFiles", true).unwrap();
    assert_eq!(outcome, MutationOutcome::Unchanged);
    assert!(h.service.get_feature("checksumFiles").unwrap().unwrap().enabled);
}

#[test]
fn rejected_feature_write_leaves_mirror_unchanged() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();
    h.engine.set_reject_writes(true);

    let err = h.service.set_feature("autoUninstaller", true).unwrap_err();
    assert!(matches!(err, ConfigError::EngineUnavailable(_)));
    assert!(!h.service.get_feature("autoUninstaller").unwrap().unwrap().enabled);
}

/// Local mirror holds "community" and a disabled "autoUninstaller"; the
/// toggle is mirrored, and a later refresh lets the engine win again.
#[test]
fn engine_stays_authoritative_after_local_toggle() {
    let h = harness(EngineSnapshot {
        sources: vec![source("community")],
        features: vec![feature("autoUninstaller", false)],
        settings: vec![],
    });
    h.store
        .upsert(&SourceConfig::new("community", "https://community.example/api/v2/"))
        .unwrap();
    h.store
        .upsert(&mapper::map_feature(&feature("autoUninstaller", false)))
        .unwrap();

    h.service.set_feature("autoUninstaller", true).unwrap();
    let features = h.service.list_features().unwrap();
    assert_eq!(features.len(), 1);
    assert!(features[0].enabled);

    h.engine.replace(EngineSnapshot {
        sources: vec![source("community")],
        features: vec![feature("autoUninstaller", false)],
        settings: vec![],
    });
    h.service.refresh().unwrap();

    let features = h.service.list_features().unwrap();
    assert!(!features[0].enabled);
    let sources = h.service.list_sources().unwrap();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].enabled());
    assert!(!sources[0].has_credentials());
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn accepted_setting_is_readable_immediately() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();

    let outcome = h.service.set_setting("proxy", "http://proxy:3128").unwrap();
    assert_eq!(outcome, MutationOutcome::Applied);
    assert_eq!(
        h.service.get_setting("proxy").unwrap().unwrap().value,
        "http://proxy:3128"
    );

    let again = h.service.set_setting("proxy", "http://proxy:3128").unwrap();
    assert_eq!(again, MutationOutcome::Unchanged);
}

#[test]
fn rejected_setting_keeps_previous_value() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();
    h.engine.set_reject_writes(true);

    let err = h
        .service
        .set_setting("commandExecutionTimeoutSeconds", "10")
        .unwrap_err();
    assert!(matches!(err, ConfigError::EngineUnavailable(_)));
    assert_eq!(
        h.service
            .get_setting("commandExecutionTimeoutSeconds")
            .unwrap()
            .unwrap()
            .value,
        "2700"
    );
    assert!(h.service.get_setting("proxy").unwrap().is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Sources
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn saved_source_reaches_engine_encrypted() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();

    let mut internal = SourceConfig::new("internal", "https://nexus.local/repository/choco/");
    internal.user_name = Some("svc".into());
    internal.password = Some("p@ss".into());
    internal.priority = 1;

    assert_eq!(
        h.service.set_source(internal.clone()).unwrap(),
        MutationOutcome::Applied
    );

    let upstream = h
        .engine
        .current()
        .sources
        .into_iter()
        .find(|s| s.id == "internal")
        .unwrap();
    assert_ne!(upstream.password.as_deref(), Some("p@ss"));

    // A refresh reads the encrypted copy back to the same plaintext
    h.service.refresh().unwrap();
    let mirrored: SourceConfig = h.store.get_by_key("internal").unwrap().unwrap();
    assert_eq!(mirrored, internal);
}

#[test]
fn saved_source_mirrors_what_the_engine_holds() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();

    let mut blank = SourceConfig::new("blank", "https://blank.example/");
    blank.user_name = Some(String::new());
    blank.password = Some(String::new());

    h.service.set_source(blank).unwrap();

    let mirrored: SourceConfig = h.store.get_by_key("blank").unwrap().unwrap();
    assert_eq!(mirrored.user_name, None);
    assert_eq!(mirrored.password, None);
    assert!(!mirrored.has_credentials());

    let upstream = h
        .engine
        .current()
        .sources
        .into_iter()
        .find(|s| s.id == "blank")
        .unwrap();
    assert_eq!(upstream.user_name, None);
    assert_eq!(upstream.password, None);

    // A refresh leaves the mirror exactly as the save did
    h.service.refresh().unwrap();
    let refreshed: SourceConfig = h.store.get_by_key("blank").unwrap().unwrap();
    assert_eq!(refreshed, mirrored);

    // Saving the empty-credential form again is a no-op against the mirror
    let mut again = SourceConfig::new("blank", "https://blank.example/");
    again.password = Some(String::new());
    assert_eq!(h.service.set_source(again).unwrap(), MutationOutcome::Unchanged);
}

#[test]
fn removing_a_source_is_idempotent() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();

    assert_eq!(
        h.service.remove_source("community").unwrap(),
        MutationOutcome::Applied
    );
    assert_eq!(
        h.service.remove_source("community").unwrap(),
        MutationOutcome::Unchanged
    );
    assert!(h
        .service
        .list_sources()
        .unwrap()
        .iter()
        .all(|s| s.id != "community"));
}

#[test]
fn mutations_and_refreshes_can_race() {
    let h = harness(sample_snapshot());
    h.service.refresh().unwrap();
    let service = Arc::new(h.service);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = service.clone();
            std::thread::spawn(move || {
                for n in 0..10 {
                    if i % 2 == 0 {
                        service.refresh().unwrap();
                    } else {
                        service.set_setting("webRequestTimeoutSeconds", &n.to_string()).unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Every write went to the engine first, so the last refresh or write agrees with it
    let engine_value = h
        .engine
        .current()
        .settings
        .into_iter()
        .find(|s| s.key == "webRequestTimeoutSeconds")
        .unwrap()
        .value;
    assert_eq!(
        service.get_setting("webRequestTimeoutSeconds").unwrap().unwrap().value,
        engine_value
    );
}
