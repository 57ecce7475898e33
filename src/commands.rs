//! User-invokable commands
//!
//! A fixed list of commands, built once at startup from a single
//! `ConfigService`. The presentation layer enumerates the registry and
//! invokes commands by name; every command delegates straight to the service.
//!
//! Adding a command means adding its constructor to `KNOWN_COMMANDS`.

use crate::error::ConfigError;
use crate::service::{ConfigService, MutationOutcome};
use std::sync::Arc;

/// What a command reports back to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

impl From<ConfigError> for CommandOutcome {
    fn from(err: ConfigError) -> Self {
        Self::failed(err.to_string())
    }
}

pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn usage(&self) -> &'static str;
    fn execute(&self, args: &[String]) -> CommandOutcome;
}

// ─────────────────────────────────────────────────────────────────────────────
// feature <enable|disable> <name>
// ─────────────────────────────────────────────────────────────────────────────

pub struct FeatureCommand {
    service: Arc<ConfigService>,
}

impl FeatureCommand {
    pub fn new(service: Arc<ConfigService>) -> Self {
        Self { service }
    }

    fn build(service: Arc<ConfigService>) -> Arc<dyn Command> {
        Arc::new(Self::new(service))
    }
}

impl Command for FeatureCommand {
    fn name(&self) -> &'static str {
        "feature"
    }

    fn description(&self) -> &'static str {
        "Toggle or inspect an engine feature"
    }

    fn usage(&self) -> &'static str {
        "feature <enable|disable|status> <name>"
    }

    fn execute(&self, args: &[String]) -> CommandOutcome {
        let [action, name] = args else {
            return CommandOutcome::failed(format!("usage: {}", self.usage()));
        };

        let enabled = match action.as_str() {
            "status" => {
                return match self.service.get_feature(name) {
                    Ok(Some(flag)) => {
                        let state = if flag.enabled { "enabled" } else { "disabled" };
                        CommandOutcome::ok(format!("Feature '{}' is {state}", flag.name))
                    }
                    Ok(None) => ConfigError::UnknownFeature(name.clone()).into(),
                    Err(e) => e.into(),
                }
            }
            "enable" => true,
            "disable" => false,
            other => {
                return CommandOutcome::failed(format!(
                    "unknown action '{other}' (usage: {})",
                    self.usage()
                ))
            }
        };
        let state = if enabled { "enabled" } else { "disabled" };

        match self.service.set_feature(name, enabled) {
            Ok(MutationOutcome::Applied) => CommandOutcome::ok(format!("Feature '{name}' {state}")),
            Ok(MutationOutcome::Unchanged) => {
                CommandOutcome::ok(format!("Feature '{name}' was already {state}"))
            }
            Err(e) => e.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// config get <key> | config set <key> <value>
// ─────────────────────────────────────────────────────────────────────────────

pub struct ConfigCommand {
    service: Arc<ConfigService>,
}

impl ConfigCommand {
    pub fn new(service: Arc<ConfigService>) -> Self {
        Self { service }
    }

    fn build(service: Arc<ConfigService>) -> Arc<dyn Command> {
        Arc::new(Self::new(service))
    }
}

impl Command for ConfigCommand {
    fn name(&self) -> &'static str {
        "config"
    }

    fn description(&self) -> &'static str {
        "Read or change an engine setting"
    }

    fn usage(&self) -> &'static str {
        "config <get <key> | set <key> <value>>"
    }

    fn execute(&self, args: &[String]) -> CommandOutcome {
        match args {
            [action, key] if action == "get" => match self.service.get_setting(key) {
                Ok(Some(setting)) => CommandOutcome::ok(format!("{} = {}", setting.key, setting.value)),
                Ok(None) => CommandOutcome::ok(format!("{key} is not set (engine default)")),
                Err(e) => e.into(),
            },
            // Values may contain spaces; everything after the key is the value
            [action, key, value @ ..] if action == "set" && !value.is_empty() => {
                let value = value.join(" ");
                match self.service.set_setting(key, &value) {
                    Ok(MutationOutcome::Applied) => {
                        CommandOutcome::ok(format!("Updated {key} = {value}"))
                    }
                    Ok(MutationOutcome::Unchanged) => {
                        CommandOutcome::ok(format!("{key} was already {value}"))
                    }
                    Err(e) => e.into(),
                }
            }
            _ => CommandOutcome::failed(format!("usage: {}", self.usage())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

type CommandConstructor = fn(Arc<ConfigService>) -> Arc<dyn Command>;

/// Every command the client knows, in display order
const KNOWN_COMMANDS: &[CommandConstructor] = &[FeatureCommand::build, ConfigCommand::build];

/// Immutable, shareable list of commands bound to one service
#[derive(Clone)]
pub struct CommandRegistry {
    commands: Arc<[Arc<dyn Command>]>,
}

impl CommandRegistry {
    pub fn new(service: Arc<ConfigService>) -> Self {
        let commands: Vec<Arc<dyn Command>> = KNOWN_COMMANDS
            .iter()
            .map(|build| build(service.clone()))
            .collect();
        Self {
            commands: commands.into(),
        }
    }

    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Command>> {
        self.commands.iter().find(|c| c.name() == name)
    }

    pub fn execute(&self, name: &str, args: &[String]) -> CommandOutcome {
        match self.get(name) {
            Some(command) => {
                tracing::debug!(command = name, ?args, "Executing command");
                command.execute(args)
            }
            None => CommandOutcome::failed(format!("unknown command '{name}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fake::FakeEngine;
    use crate::engine::{EngineFeature, EngineSetting, EngineSnapshot};
    use crate::secret::SecretCodec;
    use crate::store::LocalStore;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn registry() -> (tempfile::TempDir, Arc<FakeEngine>, CommandRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::open(dir.path().join("data.db")).unwrap());
        let engine = Arc::new(FakeEngine::new(EngineSnapshot {
            sources: vec![],
            features: vec![EngineFeature {
                name: "autoUninstaller".into(),
                enabled: false,
                set_explicitly: false,
                description: String::new(),
            }],
            settings: vec![EngineSetting {
                key: "cacheLocation".into(),
                value: "C:\\cache".into(),
                description: String::new(),
            }],
        }));
        let service = Arc::new(ConfigService::new(
            engine.clone(),
            store,
            SecretCodec::default(),
        ));
        service.refresh().unwrap();
        (dir, engine, CommandRegistry::new(service))
    }

    #[test]
    fn registry_lists_feature_and_config_commands() {
        let (_dir, _engine, registry) = registry();
        let names: Vec<_> = registry.commands().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["feature", "config"]);
        assert_eq!(
            registry.get("feature").unwrap().description(),
            "Toggle or inspect an engine feature"
        );

        let shared = registry.clone();
        assert!(Arc::ptr_eq(&registry.commands()[0], &shared.commands()[0]));
    }

    #[test]
    fn feature_command_toggles_and_reports_noop() {
        let (_dir, _engine, registry) = registry();

        let first = registry.execute("feature", &args(&["enable", "autoUninstaller"]));
        assert!(first.success);
        assert_eq!(first.message.as_deref(), Some("Feature 'autoUninstaller' enabled"));

        let second = registry.execute("feature", &args(&["enable", "autoUninstaller"]));
        assert!(second.success);
        assert!(second.message.unwrap().contains("already enabled"));
    }

    #[test]
    fn feature_command_reports_status() {
        let (_dir, _engine, registry) = registry();

        let status = registry.execute("feature", &args(&["status", "autoUninstaller"]));
        assert_eq!(status.message.as_deref(), Some("Feature 'autoUninstaller' is disabled"));

        let unknown = registry.execute("feature", &args(&["status", "X"]));
        assert!(!unknown.success);
    }

    #[test]
    fn feature_command_failures() {
        let (_dir, engine, registry) = registry();

        let unknown = registry.execute("feature", &args(&["enable", "X"]));
        assert!(!unknown.success);
        assert!(unknown.message.unwrap().contains("unknown feature"));

        let bad_action = registry.execute("feature", &args(&["flip", "autoUninstaller"]));
        assert!(!bad_action.success);

        let missing = registry.execute("feature", &args(&["enable"]));
        assert!(!missing.success);

        engine.set_reject_writes(true);
        let rejected = registry.execute("feature", &args(&["enable", "autoUninstaller"]));
        assert!(!rejected.success);
        assert!(rejected.message.unwrap().contains("engine unavailable"));
    }

    #[test]
    fn config_command_get_and_set() {
        let (_dir, _engine, registry) = registry();

        let set = registry.execute("config", &args(&["set", "proxyBypassList", "a.local,", "b.local"]));
        assert!(set.success);

        let get = registry.execute("config", &args(&["get", "proxyBypassList"]));
        assert_eq!(get.message.as_deref(), Some("proxyBypassList = a.local, b.local"));

        let absent = registry.execute("config", &args(&["get", "proxy"]));
        assert!(absent.success);
        assert!(absent.message.unwrap().contains("engine default"));

        let usage = registry.execute("config", &args(&["set", "proxy"]));
        assert!(!usage.success);
    }

    #[test]
    fn unknown_command_fails() {
        let (_dir, _engine, registry) = registry();
        let outcome = registry.execute("install", &args(&["git"]));
        assert!(!outcome.success);
    }
}
