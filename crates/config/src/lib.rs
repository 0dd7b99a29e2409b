//! User configuration for the `godet` command line client.
//!
//! Settings live in a TOML file, by default
//! `<config dir>/godet/config.toml`. Every field is optional and a missing
//! file is the same as an empty one.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

const APP_DIR: &str = "godet";
const CONFIG_FILE: &str = "config.toml";

/// Errors raised while reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Discovery endpoint of the browser, `host:port`.
    pub address: String,
    /// Command line that starts the browser, if it should be started.
    pub command: Option<String>,
    /// Only list targets of this kind. Empty lists everything.
    pub filter: String,
    /// Page to navigate to once connected.
    pub page: String,
    /// How long to wait for a freshly started browser to answer.
    pub startup_timeout_secs: u64,
    /// Deadline for each call, `0` waits forever.
    pub call_timeout_secs: u64,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
    /// How long to print events before disconnecting.
    pub watch_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "localhost:9222".to_string(),
            command: None,
            filter: "page".to_string(),
            page: "http://httpbin.org".to_string(),
            startup_timeout_secs: 10,
            call_timeout_secs: 30,
            max_message_size: 64 * 1024 * 1024,
            watch_secs: 60,
        }
    }
}

impl Config {
    /// Default location of the configuration file, if the platform has a
    /// configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(path),
            None => {
                tracing::debug!("no configuration directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`, falling back to the defaults if it does not exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let span = tracing::debug_span!("Config", config_path = %path.display());
        let _guard = span.enter();

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("configuration file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Call deadline, `None` when disabled.
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
    }

    pub fn watch(&self) -> Duration {
        Duration::from_secs(self.watch_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::default();

        assert_eq!(config.address, "localhost:9222");
        assert_eq!(config.command, None);
        assert_eq!(config.filter, "page");
        assert_eq!(config.page, "http://httpbin.org");
        assert_eq!(config.startup_timeout(), Duration::from_secs(10));
        assert_eq!(config.call_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.max_message_size, 64 * 1024 * 1024);
        assert_eq!(config.watch(), Duration::from_secs(60));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let config = Config::load_from(dir.path().join("nope.toml")).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn file_overrides_some_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
address = "127.0.0.1:9333"
command = "chromium --remote-debugging-port=9333 --headless"
call_timeout_secs = 0
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();

        assert_eq!(config.address, "127.0.0.1:9333");
        assert_eq!(
            config.command.as_deref(),
            Some("chromium --remote-debugging-port=9333 --headless")
        );
        assert_eq!(config.call_timeout(), None);
        // untouched fields keep their defaults
        assert_eq!(config.filter, "page");
        assert_eq!(config.watch_secs, 60);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "watch_secs = \"soon\"").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "adress = \"typo:9222\"").unwrap();

        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn default_path_ends_in_app_dir() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with("godet/config.toml"));
        }
    }
}
