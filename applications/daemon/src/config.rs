/// Daemon configuration
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    /// Unix socket the control surface listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Initial volume level (0-100)
    #[serde(default = "default_volume")]
    pub volume: u8,

    /// Headphone jack poll interval in milliseconds
    #[serde(default = "default_jack_poll_ms")]
    pub jack_poll_ms: u64,
}

impl DaemonConfig {
    /// Load configuration from file and environment
    ///
    /// `path` overrides the default `chimed.toml` lookup; environment
    /// variables prefixed with `CHIME_` override both.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("chimed.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CHIME")
                .separator("_")
                .try_parsing(true),
        );

        let config = settings.build().context("failed to read configuration")?;

        config
            .try_deserialize()
            .context("invalid configuration values")
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            volume: default_volume(),
            jack_poll_ms: default_jack_poll_ms(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/chimed.sock")
}

fn default_volume() -> u8 {
    80
}

fn default_jack_poll_ms() -> u64 {
    500
}
