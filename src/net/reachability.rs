use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::camera_state::CameraState;
use crate::config::ConfigStore;

/// A network-level reachability check against the camera host
#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    async fn is_reachable(&self, host: &str) -> Result<bool>;
}

/// One ICMP echo via the system `ping` binary
pub struct PingCheck {
    wait_secs: u64,
}

impl PingCheck {
    pub fn new(wait_secs: u64) -> Self {
        Self {
            wait_secs: wait_secs.max(1),
        }
    }
}

#[async_trait]
impl ReachabilityCheck for PingCheck {
    async fn is_reachable(&self, host: &str) -> Result<bool> {
        let wait = self.wait_secs.to_string();
        let child = Command::new("ping")
            .args(["-c", "1", "-W", wait.as_str(), host])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        // Give ping a little longer than its own wait before giving up on it
        let limit = Duration::from_secs(self.wait_secs + 1);
        let status = tokio::time::timeout(limit, child)
            .await
            .map_err(|_| anyhow::anyhow!("ping timed out after {:?}", limit))??;

        Ok(status.success())
    }
}

/// Run one check and publish the result. Any failure of the check itself
/// is recorded as unreachable.
pub async fn probe_once(check: &dyn ReachabilityCheck, config: &ConfigStore, state: &CameraState) -> bool {
    let endpoint = config.endpoint().await;

    let reachable = match check.is_reachable(&endpoint.cam_ip).await {
        Ok(reachable) => reachable,
        Err(e) => {
            error!("Ping error for {}: {}", endpoint.cam_ip, e);
            false
        }
    };

    debug!(
        "Camera ping {}: {}",
        endpoint.cam_ip,
        if reachable { "✓ REACHABLE" } else { "✗ UNREACHABLE" }
    );
    state.set_reachable(reachable).await;
    reachable
}

/// Probe the camera host every `interval` until `cancel` fires
pub async fn run_prober(
    check: Arc<dyn ReachabilityCheck>,
    config: Arc<ConfigStore>,
    state: CameraState,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!("📡 Reachability prober started (every {:?})", interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                probe_once(check.as_ref(), &config, &state).await;
            }
        }
    }

    info!("🛑 Reachability prober stopped");
}
