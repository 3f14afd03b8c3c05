use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::camera_state::CameraState;
use crate::config::{CameraEndpoint, ConfigStore};
use crate::error::{ConfigError, TransportError};
use crate::net::{Ack, ViscaChannel};
use crate::protocol::ViscaCommand;
use crate::types::{AxisDirection, FocusDirection, PresetAction, ZoomDirection};

/// The controller context handed to every component: configuration, the
/// command channel and the shared state.
///
/// State fields are updated once a send has been attempted, whatever its
/// outcome, so status reflects operator intent rather than confirmed
/// camera position.
pub struct PtzCamera {
    config: Arc<ConfigStore>,
    state: CameraState,
    channel: ViscaChannel,
}

impl PtzCamera {
    pub fn new(config: Arc<ConfigStore>, state: CameraState) -> Self {
        let channel = ViscaChannel::new(config.clone(), state.clone());
        Self {
            config,
            state,
            channel,
        }
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn channel(&self) -> &ViscaChannel {
        &self.channel
    }

    async fn dispatch(&self, command: ViscaCommand) -> Result<Ack, TransportError> {
        self.channel.send(&command.payload_hex()).await
    }

    /// Continuous pan/tilt; both axes share `speed`
    pub async fn pan_tilt(
        &self,
        pan: AxisDirection,
        tilt: AxisDirection,
        speed: u32,
    ) -> Result<Ack, TransportError> {
        debug!("🕹️ MOVE pan={} tilt={} speed={}", pan, tilt, speed);
        let result = self.dispatch(ViscaCommand::pan_tilt(speed, speed, pan, tilt)).await;

        self.state
            .update(|s| {
                s.pan = pan;
                s.tilt = tilt;
            })
            .await;
        result
    }

    pub async fn zoom(&self, direction: ZoomDirection, speed: u32) -> Result<Ack, TransportError> {
        debug!("🔍 ZOOM {:?} {}", direction, speed);
        let command = ViscaCommand::zoom(direction, speed);
        let result = self.dispatch(command).await;

        let speed = match command {
            ViscaCommand::Zoom { speed, .. } if direction != ZoomDirection::Stop => speed,
            _ => 0,
        };
        self.state
            .update(|s| {
                s.zoom = direction;
                s.zoom_speed = speed;
            })
            .await;
        result
    }

    pub async fn focus(&self, direction: FocusDirection, speed: u32) -> Result<Ack, TransportError> {
        debug!("🎯 FOCUS {:?} {}", direction, speed);
        let command = ViscaCommand::focus(direction, speed);
        let result = self.dispatch(command).await;

        let speed = match command {
            ViscaCommand::Focus { speed, .. } if direction != FocusDirection::Stop => speed,
            _ => 0,
        };
        self.state
            .update(|s| {
                s.focus = direction;
                s.focus_speed = speed;
            })
            .await;
        result
    }

    pub async fn auto_focus(&self, enabled: bool) -> Result<Ack, TransportError> {
        debug!("🎯 AUTO FOCUS {}", if enabled { "on" } else { "off" });
        let result = self.dispatch(ViscaCommand::AutoFocus(enabled)).await;
        self.state.update(|s| s.auto_focus = enabled).await;
        result
    }

    pub async fn home(&self) -> Result<Ack, TransportError> {
        debug!("🏠 HOME");
        let result = self.dispatch(ViscaCommand::Home).await;
        self.state
            .update(|s| {
                s.pan = AxisDirection::Stop;
                s.tilt = AxisDirection::Stop;
            })
            .await;
        result
    }

    /// Relay a preset command to the camera.
    ///
    /// Returns `true` when the command was delivered. A number outside
    /// 1-255 sends nothing and returns `false`.
    pub async fn preset(&self, action: PresetAction, number: u32) -> bool {
        let Some(command) = ViscaCommand::preset(action, number) else {
            debug!("Ignoring preset {:?} for out-of-range number {}", action, number);
            return false;
        };

        info!("📌 PRESET {:?} {}", action, number);
        let result = self.dispatch(command).await;

        let number = number as u8;
        self.state
            .update(|s| match action {
                PresetAction::Recall | PresetAction::Save => s.preset = number,
                PresetAction::Delete => {
                    if s.preset == number {
                        s.preset = 0;
                    }
                }
            })
            .await;

        result.is_ok()
    }

    pub async fn preset_recall(&self, number: u32) -> bool {
        self.preset(PresetAction::Recall, number).await
    }

    pub async fn preset_save(&self, number: u32) -> bool {
        self.preset(PresetAction::Save, number).await
    }

    pub async fn preset_delete(&self, number: u32) -> bool {
        self.preset(PresetAction::Delete, number).await
    }

    /// Stop pan/tilt, zoom and focus. Every stop is sent even if an earlier
    /// one fails; the first failure is returned.
    pub async fn stop_all(&self) -> Result<(), TransportError> {
        info!("⏹️ STOP");
        let pan_tilt = self.pan_tilt(AxisDirection::Stop, AxisDirection::Stop, 0).await;
        let zoom = self.zoom(ZoomDirection::Stop, 0).await;
        let focus = self.focus(FocusDirection::Stop, 0).await;

        let mut first_error = None;
        for result in [pan_tilt, zoom, focus] {
            if let Err(e) = result {
                warn!("Stop command failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Point the controller at a different camera
    pub async fn update_endpoint<F>(&self, edit: F) -> Result<CameraEndpoint, ConfigError>
    where
        F: FnOnce(&mut CameraEndpoint) + Send,
    {
        self.channel.update_endpoint(edit).await
    }
}
