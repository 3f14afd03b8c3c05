use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ConfigError;
use crate::protocol::DEFAULT_VISCA_PORT;

pub const DEFAULT_CONFIG_FILE: &str = "ptz_config.json";

/// Where the camera lives. Replaced wholesale on reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraEndpoint {
    pub cam_ip: String,
    pub cam_port: u16,
    pub rtsp_url: String,
}

impl Default for CameraEndpoint {
    fn default() -> Self {
        Self {
            cam_ip: "192.168.1.11".to_string(),
            cam_port: DEFAULT_VISCA_PORT,
            rtsp_url: "rtsp://192.168.1.11/1/h264major".to_string(),
        }
    }
}

impl CameraEndpoint {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cam_ip.trim().is_empty() {
            return Err(ConfigError::Invalid("cam_ip must not be empty".to_string()));
        }
        if self.cam_port == 0 {
            return Err(ConfigError::Invalid("cam_port must not be 0".to_string()));
        }
        if self.rtsp_url.trim().is_empty() {
            return Err(ConfigError::Invalid("rtsp_url must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_bind: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind: "127.0.0.1".to_string(),
            http_port: 5007,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub reply_timeout_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    /// Consecutive read failures tolerated before the offline frame is shown
    pub failure_threshold: u32,
    pub retry_delay_ms: u64,
    pub error_backoff_ms: u64,
    pub read_timeout_ms: u64,
    pub ffmpeg_bin: String,
    pub rtsp_transport: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            jpeg_quality: 75,
            failure_threshold: 10,
            retry_delay_ms: 100,
            error_backoff_ms: 1000,
            read_timeout_ms: 5000,
            ffmpeg_bin: "ffmpeg".to_string(),
            rtsp_transport: "tcp".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProberConfig {
    pub interval_secs: u64,
    pub ping_timeout_secs: u64,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            ping_timeout_secs: 1,
        }
    }
}

/// On-disk configuration. The camera fields sit at the top level so the
/// file keeps the `cam_ip` / `cam_port` / `rtsp_url` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(flatten)]
    pub camera: CameraEndpoint,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub prober: ProberConfig,
}

impl AppConfig {
    /// Load the config file. A missing, unreadable or invalid file falls
    /// back to the defaults so the controller still starts.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::warn!("{} not found, using default configuration", path.display());
            return AppConfig::default();
        }

        match Self::read(path) {
            Ok(config) => {
                tracing::info!("⚙️ Config loaded: {}:{}", config.camera.cam_ip, config.camera.cam_port);
                config
            }
            Err(e) => {
                tracing::error!("❌ Config error: {:#}; using default configuration", e);
                AppConfig::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&config_str)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.camera.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config_str = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, config_str)
            .await
            .map_err(|source| ConfigError::Persist {
                path: path.display().to_string(),
                source,
            })
    }
}

/// Live configuration shared by the command channel and the relay loops.
///
/// The endpoint is held behind an `Arc` that is swapped as a unit, so
/// in-flight work keeps the snapshot it started with.
#[derive(Debug)]
pub struct ConfigStore {
    base: AppConfig,
    endpoint: RwLock<Arc<CameraEndpoint>>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// `path` is where `replace_endpoint` persists to; `None` keeps it in memory
    pub fn new(config: AppConfig, path: Option<PathBuf>) -> Self {
        let endpoint = RwLock::new(Arc::new(config.camera.clone()));
        Self {
            base: config,
            endpoint,
            path,
        }
    }

    pub async fn endpoint(&self) -> Arc<CameraEndpoint> {
        self.endpoint.read().await.clone()
    }

    pub fn protocol(&self) -> &ProtocolConfig {
        &self.base.protocol
    }

    pub fn video(&self) -> &VideoConfig {
        &self.base.video
    }

    pub fn prober(&self) -> &ProberConfig {
        &self.base.prober
    }

    pub fn server(&self) -> &ServerConfig {
        &self.base.server
    }

    /// Swap in a new endpoint and persist the full configuration.
    ///
    /// Callers that must not race a pending command go through
    /// `ViscaChannel::update_endpoint`, which holds the send lock around this.
    pub async fn replace_endpoint(&self, endpoint: CameraEndpoint) -> Result<(), ConfigError> {
        endpoint.validate()?;

        let mut current = self.endpoint.write().await;
        if let Some(path) = &self.path {
            let mut config = self.base.clone();
            config.camera = endpoint.clone();
            config.save(path).await?;
        }

        tracing::info!(
            "⚙️ Camera endpoint now {}:{} ({})",
            endpoint.cam_ip,
            endpoint.cam_port,
            endpoint.rtsp_url
        );
        *current = Arc::new(endpoint);
        Ok(())
    }
}
