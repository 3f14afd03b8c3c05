use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::CameraEndpoint;
use crate::error::ApiError;
use crate::net::{probe_once, Ack};
use crate::pipeline::{mjpeg, StreamSession};
use crate::types::{AxisDirection, FocusDirection, ZoomDirection};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct MoveParams {
    p: Option<String>,
    t: Option<String>,
    s: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LensParams {
    dir: Option<String>,
    s: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AutoFocusParams {
    enable: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PresetParams {
    num: Option<u32>,
}

/// Partial endpoint update; absent fields keep their current value
#[derive(Debug, Default, Deserialize)]
pub struct ConfigUpdate {
    cam_ip: Option<String>,
    cam_port: Option<u16>,
    rtsp_url: Option<String>,
}

fn parse<T>(value: Option<&str>, default: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr<Err = String>,
{
    value.unwrap_or(default).parse().map_err(ApiError::BadRequest)
}

fn ack_json(ack: Ack) -> Json<Value> {
    let replied = matches!(ack, Ack::Replied { .. });
    Json(json!({ "ok": true, "replied": replied }))
}

pub async fn move_camera(
    State(state): State<AppState>,
    Query(params): Query<MoveParams>,
) -> Result<Json<Value>, ApiError> {
    let pan: AxisDirection = parse(params.p.as_deref(), "03")?;
    let tilt: AxisDirection = parse(params.t.as_deref(), "03")?;
    let ack = state.camera.pan_tilt(pan, tilt, params.s.unwrap_or(10)).await?;
    Ok(ack_json(ack))
}

pub async fn stop_camera(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.camera.stop_all().await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn zoom_camera(
    State(state): State<AppState>,
    Query(params): Query<LensParams>,
) -> Result<Json<Value>, ApiError> {
    let direction: ZoomDirection = parse(params.dir.as_deref(), "stop")?;
    let ack = state.camera.zoom(direction, params.s.unwrap_or(1)).await?;
    Ok(ack_json(ack))
}

pub async fn focus_camera(
    State(state): State<AppState>,
    Query(params): Query<LensParams>,
) -> Result<Json<Value>, ApiError> {
    let direction: FocusDirection = parse(params.dir.as_deref(), "stop")?;
    let ack = state.camera.focus(direction, params.s.unwrap_or(1)).await?;
    Ok(ack_json(ack))
}

pub async fn auto_focus(
    State(state): State<AppState>,
    Query(params): Query<AutoFocusParams>,
) -> Result<Json<Value>, ApiError> {
    let enable = params
        .enable
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "on"))
        .unwrap_or(true);
    let ack = state.camera.auto_focus(enable).await?;
    Ok(ack_json(ack))
}

pub async fn home_camera(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let ack = state.camera.home().await?;
    Ok(ack_json(ack))
}

pub async fn preset_call(State(state): State<AppState>, Query(params): Query<PresetParams>) -> Json<Value> {
    let ok = state.camera.preset_recall(params.num.unwrap_or(1)).await;
    Json(json!({ "ok": ok }))
}

pub async fn preset_set(State(state): State<AppState>, Query(params): Query<PresetParams>) -> Json<Value> {
    let ok = state.camera.preset_save(params.num.unwrap_or(1)).await;
    Json(json!({ "ok": ok }))
}

pub async fn preset_delete(State(state): State<AppState>, Query(params): Query<PresetParams>) -> Json<Value> {
    let ok = state.camera.preset_delete(params.num.unwrap_or(1)).await;
    Json(json!({ "ok": ok }))
}

pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.camera.state().snapshot().await)
}

pub async fn get_config(State(state): State<AppState>) -> Json<CameraEndpoint> {
    let endpoint = state.camera.config().endpoint().await;
    Json((*endpoint).clone())
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<Value>, ApiError> {
    state
        .camera
        .update_endpoint(move |endpoint| {
            if let Some(cam_ip) = update.cam_ip {
                endpoint.cam_ip = cam_ip;
            }
            if let Some(cam_port) = update.cam_port {
                endpoint.cam_port = cam_port;
            }
            if let Some(rtsp_url) = update.rtsp_url {
                endpoint.rtsp_url = rtsp_url;
            }
        })
        .await?;
    Ok(Json(json!({ "ok": true })))
}

/// On-demand connectivity check: one ping plus one UDP test packet
pub async fn run_diagnostics(State(state): State<AppState>) -> Json<Value> {
    let camera = &state.camera;
    let ping = probe_once(state.reachability.as_ref(), camera.config(), camera.state()).await;
    let udp = camera.channel().self_test().await;
    let endpoint = camera.config().endpoint().await;

    Json(json!({
        "ping": ping,
        "udp": udp,
        "camera_ip": endpoint.cam_ip,
        "camera_port": endpoint.cam_port,
    }))
}

/// One relay session per viewer, torn down when the client disconnects
/// or the server shuts down
pub async fn video_feed(State(state): State<AppState>) -> Response {
    let session = StreamSession::new(
        state.opener.clone(),
        state.camera.config().clone(),
        state.camera.state().clone(),
    );
    mjpeg::stream_response(session.into_stream(state.shutdown.child_token()))
}
