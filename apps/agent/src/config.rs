use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::client::{DEFAULT_BASE_URL, DEFAULT_IP_ECHO_URL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write config {}: {source}", .path.display())]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: &'static str },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceSection,
    pub schedule: ScheduleSection,
    pub probe: ProbeSection,
    pub files: FilesSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub base_url: String,
    pub ip_echo_url: String,
    pub request_timeout_secs: u64,
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub heartbeat_interval_secs: u64,
    pub test_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSection {
    pub timeout_secs: u64,
    /// Unset means every node in a batch is probed at once
    pub max_concurrency: Option<usize>,
    /// Skip TLS verification when a node is probed over https
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesSection {
    pub tokens: path::PathBuf,
    pub credentials: path::PathBuf,
    pub proxies: path::PathBuf,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            ip_echo_url: DEFAULT_IP_ECHO_URL.into(),
            request_timeout_secs: 5,
            accept_invalid_certs: false,
        }
    }
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self { heartbeat_interval_secs: 300, test_interval_secs: 30 * 60 }
    }
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self { timeout_secs: 5, max_concurrency: None, accept_invalid_certs: true }
    }
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            tokens: "tokens.txt".into(),
            credentials: "accounts.txt".into(),
            proxies: "proxy.txt".into(),
        }
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

/// Get default config path ($XDG_CONFIG_HOME/pipe-agent/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("pipe-agent/config.toml"))
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

        writeln!(f, "Current Agent Configuration:")?;
        write_title_1(f, "Service")?;
        write_1(f, "Base URL", &self.service.base_url)?;
        write_1(f, "IP Echo URL", &self.service.ip_echo_url)?;
        write_1(f, "Request Timeout (s)", &self.service.request_timeout_secs)?;
        write_1(f, "Accept Invalid Certs", &self.service.accept_invalid_certs)?;

        write_title_1(f, "Schedule")?;
        write_1(f, "Heartbeat Interval (s)", &self.schedule.heartbeat_interval_secs)?;
        write_1(f, "Test Interval (s)", &self.schedule.test_interval_secs)?;

        write_title_1(f, "Probe")?;
        write_1(f, "Timeout (s)", &self.probe.timeout_secs)?;
        match self.probe.max_concurrency {
            Some(max) => write_1(f, "Max Concurrency", &max)?,
            None => write_1(f, "Max Concurrency", &"unbounded")?,
        }
        write_1(f, "Accept Invalid Certs", &self.probe.accept_invalid_certs)?;

        write_title_1(f, "Files")?;
        write_1(f, "Tokens", &self.files.tokens.display())?;
        write_1(f, "Credentials", &self.files.credentials.display())?;
        write_1(f, "Proxies", &self.files.proxies.display())?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/pipe-agent/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            let config: Self = toml::from_str(raw_string.as_str())?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Reject values that would make the agent spin or never wait
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("schedule.heartbeat_interval_secs", self.schedule.heartbeat_interval_secs),
            ("schedule.test_interval_secs", self.schedule.test_interval_secs),
            ("probe.timeout_secs", self.probe.timeout_secs),
            ("service.request_timeout_secs", self.service.request_timeout_secs),
        ];

        match positive.into_iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::InvalidValue { field, reason: "must be at least 1" }),
            None => Ok(()),
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        fs::write(path, config_str).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent");

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config, Config::default());
        assert!(dir.path().join("agent.toml").exists());
        assert_eq!(Config::from_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[schedule]\nheartbeat_interval_secs = 60\n\n[probe]\nmax_concurrency = 16\n",
        )
        .unwrap();

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config.schedule.heartbeat_interval_secs, 60);
        assert_eq!(config.schedule.test_interval_secs, 1800);
        assert_eq!(config.probe.max_concurrency, Some(16));
        assert_eq!(config.service.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[schedule\n").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[schedule]\nheartbeat_interval_secs = 0\n").unwrap();

        assert!(matches!(
            Config::from_config(Some(&path)),
            Err(ConfigError::InvalidValue { field: "schedule.heartbeat_interval_secs", .. })
        ));
    }

    #[test]
    fn test_zero_probe_timeout_is_rejected() {
        let mut config = Config::default();
        config.probe.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "probe.timeout_secs", .. })
        ));

        config.probe.timeout_secs = 1;
        config.schedule.test_interval_secs = 0;
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_display_lists_sections() {
        let shown = Config::default().to_string();
        assert!(shown.contains("Heartbeat Interval (s): 300"));
        assert!(shown.contains("Max Concurrency: unbounded"));
    }
}
