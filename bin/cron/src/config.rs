//! Cron runner configuration.
//!
//! Loaded via the `config` crate from an optional file and `NODEFLOW__`
//! environment variables, e.g. `NODEFLOW__SNAPSHOT_PATH` or
//! `NODEFLOW__SWEEP__INTERVAL_SECONDS`. Environment values win.

use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "NODEFLOW";

/// Cron runner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CronConfig {
    /// Snapshot file holding workflows, content and scheduled transitions.
    pub snapshot_path: PathBuf,

    /// Sweep cursor file. Defaults to `cursor.json` next to the snapshot.
    #[serde(default)]
    pub cursor_path: Option<PathBuf>,

    /// Sweep configuration.
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Sweep-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Keep running and sweep on this interval instead of exiting after one
    /// sweep.
    #[serde(default)]
    pub repeat: bool,

    /// Interval between sweeps when repeating, in seconds.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// How far back the very first sweep looks, in hours.
    #[serde(default = "default_initial_lookback_hours")]
    pub initial_lookback_hours: i64,
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_initial_lookback_hours() -> i64 {
    24
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            repeat: false,
            interval_seconds: default_interval_seconds(),
            initial_lookback_hours: default_initial_lookback_hours(),
        }
    }
}

impl CronConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Loads configuration from `file`, if given, overlaid with environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or required configuration
    /// is missing or invalid.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::build(file, environment())
    }

    fn build(
        file: Option<&Path>,
        environment: config::Environment,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file));
        }
        builder.add_source(environment).build()?.try_deserialize()
    }

    /// Returns the sweep cursor file.
    #[must_use]
    pub fn cursor_path(&self) -> PathBuf {
        self.cursor_path.clone().unwrap_or_else(|| {
            self.snapshot_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("cursor.json")
        })
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        environment().source(Some(source))
    }

    #[test]
    fn sweep_config_has_correct_defaults() {
        let config = SweepConfig::default();
        assert!(!config.repeat);
        assert_eq!(config.interval_seconds, 60);
        assert_eq!(config.initial_lookback_hours, 24);
    }

    #[test]
    fn environment_overrides_nested_values() {
        let config = CronConfig::build(
            None,
            env(&[
                ("NODEFLOW__SNAPSHOT_PATH", "/var/lib/nodeflow/snapshot.json"),
                ("NODEFLOW__SWEEP__INTERVAL_SECONDS", "15"),
                ("NODEFLOW__SWEEP__REPEAT", "true"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.snapshot_path,
            PathBuf::from("/var/lib/nodeflow/snapshot.json")
        );
        assert!(config.sweep.repeat);
        assert_eq!(config.sweep.interval_seconds, 15);
        assert_eq!(config.sweep.initial_lookback_hours, 24);
        assert_eq!(
            config.cursor_path(),
            PathBuf::from("/var/lib/nodeflow/cursor.json")
        );
    }

    #[test]
    fn file_values_are_overlaid_by_the_environment() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cron.toml");
        std::fs::write(
            &file,
            "snapshot_path = \"/srv/snapshot.json\"\n\
             cursor_path = \"/srv/state/cursor.json\"\n\
             [sweep]\n\
             interval_seconds = 120\n",
        )
        .unwrap();

        let config = CronConfig::build(
            Some(&file),
            env(&[("NODEFLOW__SWEEP__INTERVAL_SECONDS", "30")]),
        )
        .unwrap();

        assert_eq!(config.snapshot_path, PathBuf::from("/srv/snapshot.json"));
        assert_eq!(
            config.cursor_path(),
            PathBuf::from("/srv/state/cursor.json")
        );
        assert_eq!(config.sweep.interval_seconds, 30);
    }

    #[test]
    fn snapshot_path_is_required() {
        assert!(CronConfig::build(None, env(&[])).is_err());
    }
}
