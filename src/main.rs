use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::camera::PtzCamera;
use crate::camera_state::CameraState;
use crate::config::{AppConfig, ConfigStore, DEFAULT_CONFIG_FILE};
use crate::net::{run_prober, PingCheck, ReachabilityCheck};
use crate::pipeline::FfmpegOpener;
use crate::web::AppState;

mod camera;
mod camera_state;
mod config;
mod error;
mod net;
mod pipeline;
mod protocol;
mod telemetry;
mod types;
mod web;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();

    let config_path = std::env::var_os("PTZ_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = AppConfig::load(&config_path);

    info!("🚀 Starting PTZ controller");
    info!("📹 Camera: {}:{}", config.camera.cam_ip, config.camera.cam_port);
    info!("🎥 RTSP: {}", config.camera.rtsp_url);
    info!("🌐 Control UI API: http://{}:{}", config.server.http_bind, config.server.http_port);

    let opener = Arc::new(FfmpegOpener::new(&config.video));
    let store = Arc::new(ConfigStore::new(config, Some(config_path)));
    let state = CameraState::new();
    let camera = Arc::new(PtzCamera::new(store.clone(), state.clone()));

    if !camera.channel().self_test().await {
        warn!("⚠️ Camera did not accept the UDP test packet; continuing anyway");
    }

    let shutdown = CancellationToken::new();

    let prober_config = store.prober().clone();
    let reachability: Arc<dyn ReachabilityCheck> = Arc::new(PingCheck::new(prober_config.ping_timeout_secs));
    let prober = tokio::spawn(run_prober(
        reachability.clone(),
        store.clone(),
        state.clone(),
        Duration::from_secs(prober_config.interval_secs.max(1)),
        shutdown.clone(),
    ));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            info!("🛑 Ctrl-C received, shutting down");
            shutdown.cancel();
        });
    }

    let server = store.server().clone();
    let app_state = AppState {
        camera,
        opener,
        reachability,
        shutdown: shutdown.clone(),
    };
    let result = web::start_web_server(app_state, &server.http_bind, server.http_port).await;

    // The server may have failed on its own; stop the background work either way
    shutdown.cancel();
    if let Err(e) = prober.await {
        error!("❌ Prober task failed: {:?}", e);
    }

    info!("🛑 Server shutdown complete");
    result
}
