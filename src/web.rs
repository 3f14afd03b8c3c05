pub mod camera_endpoints;
pub mod server;

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::camera::PtzCamera;
use crate::net::ReachabilityCheck;
use crate::pipeline::CaptureOpener;
use camera_endpoints::*;

pub use server::start_web_server;

#[derive(Clone)]
pub struct AppState {
    pub camera: Arc<PtzCamera>,
    pub opener: Arc<dyn CaptureOpener>,
    pub reachability: Arc<dyn ReachabilityCheck>,
    /// Cancelled on shutdown; every video relay holds a child token
    pub shutdown: CancellationToken,
}

/// Control API and video feed
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/move", get(move_camera))
        .route("/api/stop", get(stop_camera))
        .route("/api/zoom", get(zoom_camera))
        .route("/api/focus", get(focus_camera))
        .route("/api/focus/auto", get(auto_focus))
        .route("/api/home", get(home_camera))
        .route("/api/preset/call", get(preset_call))
        .route("/api/preset/set", get(preset_set))
        .route("/api/preset/delete", get(preset_delete))
        .route("/api/status", get(get_status))
        .route("/api/config", get(get_config).post(update_config))
        .route("/api/test", get(run_diagnostics))
        .route("/video", get(video_feed))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera_state::CameraState;
    use crate::config::{AppConfig, ConfigStore};
    use crate::pipeline::FrameSource;
    use crate::protocol::ViscaHeader;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use futures::StreamExt;
    use image::RgbImage;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tower::ServiceExt;

    struct SolidSource;

    #[async_trait]
    impl FrameSource for SolidSource {
        async fn read_frame(&mut self) -> Result<RgbImage> {
            Ok(RgbImage::from_pixel(64, 36, image::Rgb([40, 40, 40])))
        }

        fn is_open(&mut self) -> bool {
            true
        }
    }

    struct FixedCheck(bool);

    #[async_trait]
    impl ReachabilityCheck for FixedCheck {
        async fn is_reachable(&self, _host: &str) -> Result<bool> {
            Ok(self.0)
        }
    }

    struct SolidOpener;

    #[async_trait]
    impl CaptureOpener for SolidOpener {
        async fn open(&self, url: &str) -> Result<Box<dyn FrameSource>> {
            if url.is_empty() {
                return Err(anyhow!("empty url"));
            }
            Ok(Box::new(SolidSource))
        }
    }

    async fn test_app() -> (Router, AppState, UdpSocket) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut config = AppConfig::default();
        config.camera.cam_ip = "127.0.0.1".to_string();
        config.camera.cam_port = socket.local_addr().unwrap().port();
        config.protocol.reply_timeout_ms = 20;
        config.video.width = 64;
        config.video.height = 36;

        let store = Arc::new(ConfigStore::new(config, None));
        let state = AppState {
            camera: Arc::new(PtzCamera::new(store, CameraState::new())),
            opener: Arc::new(SolidOpener),
            reachability: Arc::new(FixedCheck(true)),
            shutdown: CancellationToken::new(),
        };
        (create_router(state.clone()), state, socket)
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn received_payload(socket: &UdpSocket) -> Vec<u8> {
        let mut buf = [0u8; 256];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let (_, rest) = ViscaHeader::from_bytes(&buf[..n]).unwrap();
        rest[..rest.len() - 1].to_vec()
    }

    #[tokio::test]
    async fn test_move_sends_pan_tilt() {
        let (app, state, socket) = test_app().await;

        let (status, body) = get_json(&app, "/api/move?p=01&t=02&s=12").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["replied"], false);
        assert_eq!(received_payload(&socket).await, vec![0x81, 0x01, 0x06, 0x01, 0x0C, 0x0C, 0x01, 0x02]);

        let snapshot = state.camera.state().snapshot().await;
        assert_eq!(snapshot.pan, crate::types::AxisDirection::Negative);
    }

    #[tokio::test]
    async fn test_bad_direction_is_rejected() {
        let (app, _state, socket) = test_app().await;

        let (status, body) = get_json(&app, "/api/zoom?dir=sideways&s=3").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);

        let mut buf = [0u8; 64];
        assert!(tokio::time::timeout(Duration::from_millis(100), socket.recv_from(&mut buf))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_zoom_defaults_and_auto_focus() {
        let (app, _state, socket) = test_app().await;

        get_json(&app, "/api/zoom?dir=in").await;
        assert_eq!(received_payload(&socket).await, vec![0x81, 0x01, 0x04, 0x07, 0x21]);

        get_json(&app, "/api/focus/auto?enable=false").await;
        assert_eq!(received_payload(&socket).await, vec![0x81, 0x01, 0x04, 0x38, 0x03]);

        get_json(&app, "/api/home").await;
        assert_eq!(received_payload(&socket).await, vec![0x81, 0x01, 0x06, 0x04]);
    }

    #[tokio::test]
    async fn test_preset_routes() {
        let (app, _state, socket) = test_app().await;

        let (_, body) = get_json(&app, "/api/preset/call?num=5").await;
        assert_eq!(body, serde_json::json!({ "ok": true }));
        assert_eq!(received_payload(&socket).await, vec![0x81, 0x01, 0x04, 0x3F, 0x02, 0x05]);

        let (_, body) = get_json(&app, "/api/preset/set?num=0").await;
        assert_eq!(body, serde_json::json!({ "ok": false }));

        let (_, body) = get_json(&app, "/api/preset/delete?num=9").await;
        assert_eq!(body["ok"], true);
        assert_eq!(received_payload(&socket).await, vec![0x81, 0x01, 0x04, 0x3F, 0x01, 0x09]);
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let (app, _state, _socket) = test_app().await;
        get_json(&app, "/api/focus?dir=far&s=4").await;

        let (status, body) = get_json(&app, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["focus"], "far");
        assert_eq!(body["focus_speed"], 4);
        assert_eq!(body["last_command"], "8101040834");
        assert_eq!(body["stream_status"], "init");
    }

    #[tokio::test]
    async fn test_config_get_and_partial_post() {
        let (app, state, _socket) = test_app().await;

        let (_, body) = get_json(&app, "/api/config").await;
        assert_eq!(body["cam_ip"], "127.0.0.1");

        let request = Request::builder()
            .method("POST")
            .uri("/api/config")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"rtsp_url": "rtsp://127.0.0.1/2/h264minor"}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let endpoint = state.camera.config().endpoint().await;
        assert_eq!(endpoint.rtsp_url, "rtsp://127.0.0.1/2/h264minor");
        assert_eq!(endpoint.cam_ip, "127.0.0.1");

        let request = Request::builder()
            .method("POST")
            .uri("/api/config")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"cam_ip": ""}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.camera.config().endpoint().await.cam_ip, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_diagnostics_report_ping_and_udp() {
        let (app, state, socket) = test_app().await;
        let port = socket.local_addr().unwrap().port();

        let (status, body) = get_json(&app, "/api/test").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ping"], true);
        assert_eq!(body["udp"], true);
        assert_eq!(body["camera_ip"], "127.0.0.1");
        assert_eq!(body["camera_port"], port);
        assert_eq!(received_payload(&socket).await, vec![0x81, 0x01, 0x04, 0x07, 0x00]);

        // The on-demand ping also refreshes the shared reachability flag
        assert!(state.camera.state().snapshot().await.reachable);
    }

    #[tokio::test]
    async fn test_video_feed_streams_frames_until_shutdown() {
        let (app, state, _socket) = test_app().await;

        let response = app
            .oneshot(Request::builder().uri("/video").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "multipart/x-mixed-replace; boundary=frame"
        );

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));

        state.shutdown.cancel();
        // Whatever was already produced drains, then the body ends
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(chunk) = body.next().await {
                chunk.unwrap();
            }
        })
        .await;
        assert!(drained.is_ok());
        assert_eq!(state.camera.state().snapshot().await.stream_status, crate::types::StreamStatus::Live);
    }
}
