use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use inago_controller::ControllerSettings;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/inago/config.toml";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fleet_endpoint: Option<String>,
    pub controller: ControllerFileConfig,
    pub task: TaskFileConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerFileConfig {
    pub wait_count: usize,
    pub wait_sleep_ms: u64,
    pub wait_timeout_secs: u64,
    pub max_failed_change_attempts: usize,
}

impl Default for ControllerFileConfig {
    fn default() -> Self {
        let settings = ControllerSettings::default();
        Self {
            wait_count: settings.wait_count,
            wait_sleep_ms: settings.wait_sleep.as_millis() as u64,
            wait_timeout_secs: settings.wait_timeout.as_secs(),
            max_failed_change_attempts: settings.max_failed_change_attempts,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskFileConfig {
    pub wait_sleep_ms: u64,
}

impl Default for TaskFileConfig {
    fn default() -> Self {
        Self { wait_sleep_ms: 1000 }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Loads `explicit` when given. Otherwise the default location is tried
    /// and a missing file there yields the defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let path = config_path(explicit)?;
        if explicit.is_some() || path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            wait_count: self.controller.wait_count,
            wait_sleep: Duration::from_millis(self.controller.wait_sleep_ms),
            wait_timeout: Duration::from_secs(self.controller.wait_timeout_secs),
            max_failed_change_attempts: self.controller.max_failed_change_attempts,
        }
    }

    pub fn task_wait_sleep(&self) -> Duration {
        Duration::from_millis(self.task.wait_sleep_ms)
    }
}

/// `explicit` or the default location, with `~` and variables expanded.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    expand(explicit.unwrap_or(Path::new(DEFAULT_CONFIG_PATH)))
}

fn expand(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw).with_context(|| format!("expand {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "fleet_endpoint = \"http://10.0.0.1:49153\"\n[controller]\nwait_count = 5\n",
        )
        .unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.fleet_endpoint.as_deref(), Some("http://10.0.0.1:49153"));
        let settings = cfg.controller_settings();
        assert_eq!(settings.wait_count, 5);
        assert_eq!(settings.wait_sleep, Duration::from_secs(1));
        assert_eq!(settings.wait_timeout, Duration::from_secs(300));
        assert_eq!(settings.max_failed_change_attempts, 10);
        assert_eq!(cfg.task_wait_sleep(), Duration::from_secs(1));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.task.wait_sleep_ms = 250;
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::resolve(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
