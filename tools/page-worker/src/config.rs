//! Worker configuration.

use anyhow::{bail, Context, Result};
use page_ipc::DEFAULT_MAX_FRAME_BYTES;
use page_observability::LoggingSettings;
use serde::{Deserialize, Serialize};

/// Worker configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Channel to the host.
    #[serde(default)]
    pub ipc: IpcConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl WorkerConfig {
    /// Load config from a file (JSON if the name ends in `.json`, else TOML).
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Check that the configuration can be used to connect.
    pub fn validate(&self) -> Result<()> {
        if self.ipc.transport == Transport::Tcp && self.ipc.port.is_none() {
            bail!("an IPC port is required for the tcp transport");
        }
        if self.limits.max_frame_bytes == 0 {
            bail!("limits.max_frame_bytes must be greater than zero");
        }
        Ok(())
    }
}

/// How the worker talks to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Connect back to a TCP listener opened by the host.
    #[default]
    Tcp,
    /// Frames on stdin/stdout.
    Stdio,
}

/// IPC settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcConfig {
    /// Transport kind.
    #[serde(default)]
    pub transport: Transport,

    /// Host to connect to (tcp only).
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to connect to (tcp only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            host: default_host(),
            port: None,
        }
    }
}

/// Resource limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest frame accepted or sent, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}
