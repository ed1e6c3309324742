//! Configuration management for the RAX FTP client
//!
//! Settings come from an optional `config.toml` with environment overrides
//! (`RAX_FTP_CLIENT__PORT=2121`). Every field has a default so the client
//! runs without any file present.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

use crate::transfer::TransferMode;

/// Client configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    // ═══ SERVER ═══
    /// Host name or address of the FTP server
    pub host: String,

    /// Control connection port
    pub port: u16,

    // ═══ TIMEOUTS ═══
    /// Control connect and greeting read
    pub connect_timeout_secs: u64,

    /// Each reply read on the control channel
    pub reply_timeout_secs: u64,

    /// Data connect (passive modes) or accept (active modes)
    pub data_timeout_secs: u64,

    /// How long a data read may yield nothing before it counts as an empty read
    pub idle_poll_millis: u64,

    // ═══ DATA CHANNEL ═══
    /// Chunk size for uploads and read buffer size for downloads
    pub buffer_size: usize,

    /// Mode used by the shell when the operator has not picked one
    pub default_mode: TransferMode,

    /// Optional protocol argument sent with EPSV
    pub epsv_protocol: Option<u8>,

    /// Address advertised in PORT/EPRT instead of the control connection's local address
    pub listen_host: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 21,
            connect_timeout_secs: 10,
            reply_timeout_secs: 30,
            data_timeout_secs: 10,
            idle_poll_millis: 500,
            buffer_size: 8192,
            default_mode: TransferMode::Passive,
            epsv_protocol: None,
            listen_host: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("rax-ftp-client/config").required(false))
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("RAX_FTP_CLIENT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ClientConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.host.trim().is_empty() {
            return Err(config::ConfigError::Message("host cannot be empty".into()));
        }

        if self.port == 0 {
            return Err(config::ConfigError::Message("port cannot be 0".into()));
        }

        if self.connect_timeout_secs == 0
            || self.reply_timeout_secs == 0
            || self.data_timeout_secs == 0
            || self.idle_poll_millis == 0
        {
            return Err(config::ConfigError::Message(
                "timeouts must be greater than 0".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if let Some(host) = &self.listen_host {
            if host.parse::<IpAddr>().is_err() {
                return Err(config::ConfigError::Message(format!(
                    "listen_host is not an IP address: {host}"
                )));
            }
        }

        Ok(())
    }

    /// Host and port of the control connection
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_millis)
    }

    /// Parsed `listen_host`; `validate` guarantees it parses when set.
    pub fn listen_ip(&self) -> Option<IpAddr> {
        self.listen_host.as_deref().and_then(|h| h.parse().ok())
    }
}
