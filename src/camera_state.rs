use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::types::{PtzState, StreamStatus};

/// Shared handle to the camera's `PtzState`.
///
/// Every write is a whole-field replacement under one lock and every read
/// clones the record under the same lock, so readers always see a
/// consistent snapshot.
#[derive(Debug, Clone, Default)]
pub struct CameraState {
    inner: Arc<RwLock<PtzState>>,
}

impl CameraState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> PtzState {
        self.inner.read().await.clone()
    }

    /// Apply `f` to the state and bump `updated_at`
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut PtzState),
    {
        let mut state = self.inner.write().await;
        f(&mut state);
        state.updated_at = Utc::now();
    }

    pub async fn record_command(&self, payload_hex: String) {
        self.update(|s| {
            s.last_command = Some(payload_hex);
            s.last_error = None;
        })
        .await;
    }

    pub async fn record_error(&self, error: String) {
        self.update(|s| s.last_error = Some(error)).await;
    }

    pub async fn set_reachable(&self, reachable: bool) {
        self.update(|s| s.reachable = reachable).await;
    }

    pub async fn set_stream_status(&self, status: StreamStatus) {
        self.update(|s| s.stream_status = status).await;
    }

    pub async fn set_stream_fps(&self, fps: u32) {
        self.update(|s| s.stream_fps = fps).await;
    }
}
