use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use svcwatch::MonitorSettings;
use thiserror::Error;

/// Environment variable overriding `[database] path`
pub const DATABASE_ENV: &str = "SVCWATCH_DATABASE";

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {0}: {1}")]
    ReadFailed(path::PathBuf, #[source] io::Error),

    #[error("failed to write config {0}: {1}")]
    WriteFailed(path::PathBuf, #[source] io::Error),

    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("no config directory: neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: Monitor,
    pub connectivity: Connectivity,
    pub alerts: Alerts,
    pub database: Database,
    pub logging: Logging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    /// Scan periodically while `run` is up
    pub active: bool,
    pub trigger_interval_seconds: u64,
    pub check_interval_seconds: u64,
    pub react_interval_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
    pub probe_timeout_seconds: u64,
    /// 0 means unbounded
    pub max_concurrency: usize,
    pub discard_offline_failures: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connectivity {
    pub enabled: bool,
    /// `host:port` that answers TCP when the network is up
    pub target: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alerts {
    /// Empty disables the webhook
    pub webhook_url: String,
    pub webhook_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    /// `compact` or `json`
    pub format: String,
}

impl Default for Monitor {
    fn default() -> Self {
        let settings = MonitorSettings::default();
        Self {
            active: true,
            trigger_interval_seconds: settings.check_interval.as_secs(),
            check_interval_seconds: settings.check_interval.as_secs(),
            react_interval_seconds: settings.react_interval.as_secs(),
            retry_attempts: settings.retry_attempts,
            retry_delay_seconds: settings.retry_delay.as_secs(),
            probe_timeout_seconds: settings.probe_timeout.as_secs(),
            max_concurrency: settings.max_concurrency.unwrap_or(0),
            discard_offline_failures: settings.discard_offline_failures,
        }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self { enabled: true, target: "1.1.1.1:53".into(), timeout_seconds: 3 }
    }
}

impl Default for Alerts {
    fn default() -> Self {
        Self { webhook_url: String::new(), webhook_timeout_seconds: 10 }
    }
}

impl Default for Database {
    fn default() -> Self {
        let path = default_database_path()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_else(|| "svcwatch.db".into());
        Self { path }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

impl Monitor {
    /// Engine settings; not validated here
    pub fn to_settings(&self) -> MonitorSettings {
        let builder = MonitorSettings::builder()
            .check_interval(Duration::from_secs(self.check_interval_seconds))
            .react_interval(Duration::from_secs(self.react_interval_seconds))
            .retry_attempts(self.retry_attempts)
            .retry_delay(Duration::from_secs(self.retry_delay_seconds))
            .probe_timeout(Duration::from_secs(self.probe_timeout_seconds))
            .discard_offline_failures(self.discard_offline_failures);

        match self.max_concurrency {
            0 => builder.unbounded().build(),
            limit => builder.max_concurrency(limit).build(),
        }
    }

    pub fn trigger_interval(&self) -> Duration {
        Duration::from_secs(self.trigger_interval_seconds)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/svcwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("svcwatch/config.toml"))
}

/// $XDG_DATA_HOME/svcwatch/svcwatch.db or $HOME/.local/share/...
fn default_database_path() -> Option<path::PathBuf> {
    let base = match env::var("XDG_DATA_HOME") {
        Ok(data_home) => path::PathBuf::from(data_home),
        Err(_) => env::home_dir()?.join(".local/share"),
    };
    Some(base.join("svcwatch/svcwatch.db"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let seconds = |value: u64| format!("{value}s");

        let monitor = &self.monitor;
        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Active", &monitor.active)?;
        write_1(f, "Trigger Interval", &seconds(monitor.trigger_interval_seconds))?;
        write_1(f, "Check Interval", &seconds(monitor.check_interval_seconds))?;
        write_1(f, "React Interval", &seconds(monitor.react_interval_seconds))?;
        write_1(f, "Retry Attempts", &monitor.retry_attempts)?;
        write_1(f, "Retry Delay", &seconds(monitor.retry_delay_seconds))?;
        write_1(f, "Probe Timeout", &seconds(monitor.probe_timeout_seconds))?;
        match monitor.max_concurrency {
            0 => write_1(f, "Max Concurrency", &"unbounded")?,
            limit => write_1(f, "Max Concurrency", &limit)?,
        }
        write_1(f, "Discard Offline Failures", &monitor.discard_offline_failures)?;

        write_title_1(f, "Connectivity")?;
        write_1(f, "Enabled", &self.connectivity.enabled)?;
        write_1(f, "Target", &self.connectivity.target)?;
        write_1(f, "Timeout", &seconds(self.connectivity.timeout_seconds))?;

        write_title_1(f, "Alerts")?;
        if self.alerts.webhook_url.is_empty() {
            write_1(f, "Webhook", &"disabled")?;
        } else {
            write_1(f, "Webhook", &self.alerts.webhook_url)?;
        }

        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;

        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/svcwatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }

    /// Apply overrides from the environment
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = env::var(DATABASE_ENV) {
            if !path.trim().is_empty() {
                self.database.path = path;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_written_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::from_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_extension_is_forced_to_toml() {
        let dir = tempdir().unwrap();
        Config::from_config(Some(dir.path().join("svcwatch.conf"))).unwrap();

        assert!(dir.path().join("svcwatch.toml").exists());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [monitor]
            check_interval_seconds = 120
            max_concurrency = 4

            [alerts]
            webhook_url = "https://hooks.example.org/svcwatch"
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.check_interval_seconds, 120);
        assert_eq!(config.monitor.react_interval_seconds, 3300);
        assert_eq!(config.connectivity, Connectivity::default());

        let settings = config.monitor.to_settings();
        assert_eq!(settings.check_interval, Duration::from_secs(120));
        assert_eq!(settings.max_concurrency, Some(4));
        assert_eq!(settings.retry_attempts, 3);
    }

    #[test]
    fn test_zero_concurrency_means_unbounded() {
        assert_eq!(Monitor::default().to_settings().max_concurrency, None);
        assert_eq!(Monitor::default().to_settings(), MonitorSettings::default());
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[monitor\nactive = ").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(Error::ParseFailed(_))));
    }

    #[test]
    fn test_display_lists_sections() {
        let rendered = Config::default().to_string();
        assert!(rendered.contains("Check Interval: 600s"));
        assert!(rendered.contains("Max Concurrency: unbounded"));
        assert!(rendered.contains("Webhook: disabled"));
    }
}
