use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

// =============================================================================
// Tunable config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Two equivalent ways to configure:
//
//   config.toml:     [server]
//                    allowed_origin = "http://localhost:5173"
//
//   env var:         SHOAL_SERVER__ALLOWED_ORIGIN=...   (double underscore = nesting)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub chat: ChatFileConfig,
    #[serde(default)]
    pub auth: AuthFileConfig,
}

/// Server tuning knobs (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// The single origin allowed for both the history query and the
    /// WebSocket handshake. Credentials are allowed for this origin only.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            allowed_origin: default_allowed_origin(),
        }
    }
}

/// Relay tunables (lives under `[chat]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatFileConfig {
    #[serde(default = "default_send_channel_capacity")]
    pub send_channel_capacity: usize,
}

impl Default for ChatFileConfig {
    fn default() -> Self {
        Self {
            send_channel_capacity: default_send_channel_capacity(),
        }
    }
}

/// Identity gating (lives under `[auth]` in config.toml). Identity itself is
/// provisioned by an external provider; the relay only optionally checks a
/// shared token at connect time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthFileConfig {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub token: Option<String>,
}

fn default_allowed_origin() -> String {
    "http://localhost:5173".to_string()
}

fn default_send_channel_capacity() -> usize {
    100
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    5000
}

/// Build a figment that layers: defaults → config.toml → SHOAL_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `SHOAL_AUTH__REQUIRED=true`  →  `auth.required = true`
///   `SHOAL_SERVER__PORT=6000`    →  `server.port = 6000`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("SHOAL_").split("__"))
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Server configuration for runtime behavior.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Allowed CORS origin for the query endpoint and the WS handshake
    pub allowed_origin: String,
    /// Capacity of each session's outbound event channel
    pub send_channel_capacity: usize,
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            allowed_origin: fc.server.allowed_origin.clone(),
            send_channel_capacity: fc.chat.send_channel_capacity,
        }
    }
}

/// Identity gating configuration (runtime view).
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Whether the WS handshake must carry the shared token
    pub required: bool,
    pub token: Option<String>,
}

impl AuthConfig {
    pub fn from_file(fc: &AuthFileConfig) -> Self {
        Self {
            required: fc.required,
            token: fc.token.clone(),
        }
    }
}

// =============================================================================
// Directory layout config (not tunable via figment — derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct ShoalConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl ShoalConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = custom_dir.unwrap_or_else(|| {
            dirs::home_dir()
                .expect("Could not find home directory")
                .join(".shoal")
        });

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let db_path = data_dir.join("shoal.db");

        info!("Data directory: {}", data_dir.display());

        Ok(Self { data_dir, db_path })
    }

    pub fn db_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.db_path.display())
    }
}
