//! Process-wide configuration.
//!
//! Loaded from `storm.yaml` when present, then overridden by `STORM_*`
//! environment variables. Every field has a default, so an empty file or no
//! file at all is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use storm_store::StoreConfig;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "storm.yaml";

/// Where planned file content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    /// Built-in template table
    #[default]
    Template,
    /// Text-generation provider, falling back to templates on failure
    Generated,
}

impl std::str::FromStr for ContentMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "template" => Ok(Self::Template),
            "generated" => Ok(Self::Generated),
            other => Err(CoreError::Config(format!("unknown content source: {}", other))),
        }
    }
}

/// Settings shared by every build in the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StormConfig {
    /// Root under which each project gets `<user_id>/<project_id>`.
    pub workspace_root: PathBuf,
    /// Database location and retry policy.
    pub store: StoreConfig,
    /// Timeout for simple (non-streamed) commands.
    pub command_timeout_secs: u64,
    /// Multiplier on simulated waits and the notification throttle window.
    pub pacing_scale: f64,
    /// Recovery attempts allowed per build before the breaker trips.
    pub max_recovery_attempts: u32,
    pub content_source: ContentMode,
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("user_workspaces"),
            store: StoreConfig::default(),
            command_timeout_secs: 30,
            pacing_scale: 1.0,
            max_recovery_attempts: 10,
            content_source: ContentMode::Template,
        }
    }
}

impl StormConfig {
    /// Parse YAML config text.
    pub fn from_yaml(yaml: &str) -> CoreResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from `path` if given, else from `storm.yaml` if it exists, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::from_yaml(&content)?
            }
            None if Path::new(CONFIG_FILE).exists() => {
                let content = std::fs::read_to_string(CONFIG_FILE)?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Apply `STORM_*` environment variables. Unparseable values are ignored
    /// with a warning.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup("STORM_WORKSPACE_ROOT") {
            self.workspace_root = PathBuf::from(root);
        }
        if let Some(db) = lookup("STORM_DATABASE_PATH") {
            self.store.database_path = PathBuf::from(db);
        }
        parse_into(&lookup, "STORM_COMMAND_TIMEOUT", &mut self.command_timeout_secs);
        parse_into(&lookup, "STORM_PACING_SCALE", &mut self.pacing_scale);
        parse_into(&lookup, "STORM_MAX_RECOVERY_ATTEMPTS", &mut self.max_recovery_attempts);
        parse_into(&lookup, "STORM_CONTENT_SOURCE", &mut self.content_source);
        if !self.pacing_scale.is_finite() {
            warn!(pacing_scale = self.pacing_scale, "Non-finite pacing scale, using 1");
            self.pacing_scale = 1.0;
        } else if self.pacing_scale < 0.0 {
            warn!(pacing_scale = self.pacing_scale, "Negative pacing scale, using 0");
            self.pacing_scale = 0.0;
        }
        self
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Scale a nominal duration by `pacing_scale`. Saturates instead of
    /// overflowing.
    pub fn paced(&self, duration: Duration) -> Duration {
        let secs = duration.as_secs_f64() * self.pacing_scale.max(0.0);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Workspace directory for one project.
    pub fn project_workspace(&self, user_id: &str, project_id: &str) -> PathBuf {
        self.workspace_root.join(user_id).join(project_id)
    }

    /// Config suitable for tests: everything under `root`, no pacing, 1 ms backoff.
    pub fn for_root(root: &Path) -> Self {
        Self {
            workspace_root: root.join("workspaces"),
            store: StoreConfig::new(root.join("storm.db")).with_backoff(1),
            pacing_scale: 0.0,
            ..Default::default()
        }
    }
}

fn parse_into<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else { return };
    match raw.parse::<T>() {
        Ok(value) => {
            debug!(key, value = %raw, "Config override from environment");
            *slot = value;
        }
        Err(_) => warn!(key, value = %raw, "Ignoring unparseable config override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = StormConfig::default();
        assert_eq!(config.command_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_recovery_attempts, 10);
        assert_eq!(config.store.max_attempts, 3);
        assert_eq!(config.content_source, ContentMode::Template);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
workspace_root: /srv/storm
command_timeout_secs: 60
store:
  database_path: /var/lib/storm.db
content_source: generated
"#;
        let config = StormConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.workspace_root, PathBuf::from("/srv/storm"));
        assert_eq!(config.command_timeout_secs, 60);
        assert_eq!(config.store.database_path, PathBuf::from("/var/lib/storm.db"));
        assert_eq!(config.store.busy_timeout_ms, 3000);
        assert_eq!(config.content_source, ContentMode::Generated);
        assert_eq!(config.pacing_scale, 1.0);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(StormConfig::from_yaml("  \n").unwrap(), StormConfig::default());
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            StormConfig::from_yaml("command_timeout_secs: [1, 2]"),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("STORM_WORKSPACE_ROOT", "/tmp/ws"),
            ("STORM_PACING_SCALE", "0.25"),
            ("STORM_COMMAND_TIMEOUT", "not-a-number"),
            ("STORM_CONTENT_SOURCE", "generated"),
        ]
        .into_iter()
        .collect();

        let config = StormConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.workspace_root, PathBuf::from("/tmp/ws"));
        assert_eq!(config.pacing_scale, 0.25);
        assert_eq!(config.command_timeout_secs, 30);
        assert_eq!(config.content_source, ContentMode::Generated);
        assert_eq!(config.paced(Duration::from_secs(4)), Duration::from_secs(1));
    }

    #[test]
    fn test_non_finite_pacing_scale_is_rejected() {
        for raw in ["inf", "-inf", "NaN"] {
            let config = StormConfig::default()
                .with_overrides(|key| (key == "STORM_PACING_SCALE").then(|| raw.to_string()));
            assert_eq!(config.pacing_scale, 1.0, "{}", raw);
            assert_eq!(config.paced(Duration::from_secs(2)), Duration::from_secs(2));
        }

        let config = StormConfig::from_yaml("pacing_scale: .inf\n")
            .unwrap()
            .with_overrides(|_| None);
        assert_eq!(config.pacing_scale, 1.0);
    }

    #[test]
    fn test_project_workspace() {
        let config = StormConfig::default();
        assert_eq!(
            config.project_workspace("alice", "p-1"),
            PathBuf::from("user_workspaces/alice/p-1")
        );
    }
}
