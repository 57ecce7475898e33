//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

/// Escape text for the inside of a TOML basic string
fn toml_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Windows paths carry backslashes
fn toml_path(path: &std::path::Path) -> String {
    toml_str(&path.display().to_string())
}

impl Config {
    /// Serialize the configuration as a commented TOML document
    pub fn to_toml(&self) -> String {
        format!(
            r#"# cupboard configuration

# Local mirror database (SQLite)
db_path = "{db_path}"

# Package engine configuration document
engine_config = "{engine_config}"

# Secret handling for source passwords
[secrets]
# Changing this makes previously stored source passwords unreadable
entropy = "{entropy}"

# Mirror refresh
[refresh]
interval_secs = {interval_secs}   # watch mode
on_startup = {on_startup}         # refresh before running a command

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = "{log_level}"
# File logging (in addition to stderr)
file_enabled = {log_file_enabled}
file_dir = "{log_file_dir}"
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = "{log_file_prefix}"
"#,
            db_path = toml_path(&self.db_path),
            engine_config = toml_path(&self.engine_config),
            entropy = toml_str(&self.secrets.entropy),
            interval_secs = self.refresh.interval_secs,
            on_startup = self.refresh.on_startup,
            log_level = toml_str(&self.logging.level),
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = toml_path(&self.logging.file_dir),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = toml_str(&self.logging.file_prefix),
        )
    }
}
