use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a single pan or tilt axis, serialized as the VISCA byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisDirection {
    #[serde(rename = "01")]
    Negative,
    #[serde(rename = "02")]
    Positive,
    #[serde(rename = "03")]
    Stop,
}

impl AxisDirection {
    pub fn code(self) -> u8 {
        match self {
            AxisDirection::Negative => 0x01,
            AxisDirection::Positive => 0x02,
            AxisDirection::Stop => 0x03,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(AxisDirection::Negative),
            0x02 => Some(AxisDirection::Positive),
            0x03 => Some(AxisDirection::Stop),
            _ => None,
        }
    }
}

impl Default for AxisDirection {
    fn default() -> Self {
        AxisDirection::Stop
    }
}

impl FromStr for AxisDirection {
    type Err = String;

    /// Accepts the joystick codes `01`/`02`/`03` (or `1`/`2`/`3`) and `stop`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("stop") {
            return Ok(AxisDirection::Stop);
        }

        u8::from_str_radix(trimmed, 16)
            .ok()
            .and_then(AxisDirection::from_code)
            .ok_or_else(|| format!("invalid axis direction: {}", s))
    }
}

impl fmt::Display for AxisDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomDirection {
    In,
    Out,
    Stop,
}

impl Default for ZoomDirection {
    fn default() -> Self {
        ZoomDirection::Stop
    }
}

impl FromStr for ZoomDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" | "tele" => Ok(ZoomDirection::In),
            "out" | "wide" => Ok(ZoomDirection::Out),
            "stop" => Ok(ZoomDirection::Stop),
            other => Err(format!("invalid zoom direction: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusDirection {
    Near,
    Far,
    Stop,
}

impl Default for FocusDirection {
    fn default() -> Self {
        FocusDirection::Stop
    }
}

impl FromStr for FocusDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "near" => Ok(FocusDirection::Near),
            "far" => Ok(FocusDirection::Far),
            "stop" => Ok(FocusDirection::Stop),
            other => Err(format!("invalid focus direction: {}", other)),
        }
    }
}

/// Preset memory operations relayed to the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetAction {
    Save,
    Delete,
    Recall,
}

impl PresetAction {
    /// Sub-command byte following `81 01 04 3F`
    pub fn code(self) -> u8 {
        match self {
            PresetAction::Save => 0x00,
            PresetAction::Delete => 0x01,
            PresetAction::Recall => 0x02,
        }
    }
}

/// Video relay status as reported to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Init,
    Live,
    Buffering,
    Offline,
}

impl Default for StreamStatus {
    fn default() -> Self {
        StreamStatus::Init
    }
}

/// Process-wide camera record. Mutated by the command channel, the relay
/// loop and the reachability prober; served as-is by `/api/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtzState {
    pub pan: AxisDirection,
    pub tilt: AxisDirection,
    pub zoom: ZoomDirection,
    pub zoom_speed: u8,
    pub focus: FocusDirection,
    pub focus_speed: u8,
    pub auto_focus: bool,
    pub preset: u8,
    pub reachable: bool,
    pub stream_fps: u32,
    pub stream_status: StreamStatus,
    pub last_command: Option<String>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for PtzState {
    fn default() -> Self {
        Self {
            pan: AxisDirection::Stop,
            tilt: AxisDirection::Stop,
            zoom: ZoomDirection::Stop,
            zoom_speed: 0,
            focus: FocusDirection::Stop,
            focus_speed: 0,
            auto_focus: true,
            preset: 0,
            reachable: false,
            stream_fps: 0,
            stream_status: StreamStatus::Init,
            last_command: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}
