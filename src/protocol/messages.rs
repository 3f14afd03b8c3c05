use crate::types::{AxisDirection, FocusDirection, PresetAction, ZoomDirection};

pub const PAN_TILT_SPEED_MAX: u8 = 24;
pub const ZOOM_SPEED_MAX: u8 = 7;
pub const FOCUS_SPEED_MAX: u8 = 8;
pub const PRESET_MIN: u32 = 1;
pub const PRESET_MAX: u32 = 255;

/// VISCA camera commands.
///
/// Speeds are clamped by the constructors, so every value of this type
/// encodes to a valid payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViscaCommand {
    PanTilt {
        pan_speed: u8,
        tilt_speed: u8,
        pan: AxisDirection,
        tilt: AxisDirection,
    },
    Zoom {
        direction: ZoomDirection,
        speed: u8,
    },
    Focus {
        direction: FocusDirection,
        speed: u8,
    },
    AutoFocus(bool),
    Home,
    Preset {
        action: PresetAction,
        number: u8,
    },
}

fn clamp_speed(speed: u32, max: u8) -> u8 {
    speed.min(max as u32) as u8
}

impl ViscaCommand {
    pub fn pan_tilt(pan_speed: u32, tilt_speed: u32, pan: AxisDirection, tilt: AxisDirection) -> Self {
        ViscaCommand::PanTilt {
            pan_speed: clamp_speed(pan_speed, PAN_TILT_SPEED_MAX),
            tilt_speed: clamp_speed(tilt_speed, PAN_TILT_SPEED_MAX),
            pan,
            tilt,
        }
    }

    pub fn zoom(direction: ZoomDirection, speed: u32) -> Self {
        ViscaCommand::Zoom {
            direction,
            speed: clamp_speed(speed, ZOOM_SPEED_MAX),
        }
    }

    pub fn focus(direction: FocusDirection, speed: u32) -> Self {
        ViscaCommand::Focus {
            direction,
            speed: clamp_speed(speed, FOCUS_SPEED_MAX),
        }
    }

    /// `None` when `number` is outside the camera's 1-255 preset range
    pub fn preset(action: PresetAction, number: u32) -> Option<Self> {
        if !(PRESET_MIN..=PRESET_MAX).contains(&number) {
            return None;
        }
        Some(ViscaCommand::Preset {
            action,
            number: number as u8,
        })
    }

    /// Raw command body, without the IP header or the terminator
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            ViscaCommand::PanTilt {
                pan_speed,
                tilt_speed,
                pan,
                tilt,
            } => vec![0x81, 0x01, 0x06, 0x01, pan_speed, tilt_speed, pan.code(), tilt.code()],
            ViscaCommand::Zoom { direction, speed } => {
                let byte = match direction {
                    ZoomDirection::In => 0x20 + speed,
                    ZoomDirection::Out => 0x30 + speed,
                    ZoomDirection::Stop => 0x00,
                };
                vec![0x81, 0x01, 0x04, 0x07, byte]
            }
            ViscaCommand::Focus { direction, speed } => {
                let byte = match direction {
                    FocusDirection::Near => 0x20 + speed,
                    FocusDirection::Far => 0x30 + speed,
                    FocusDirection::Stop => 0x00,
                };
                vec![0x81, 0x01, 0x04, 0x08, byte]
            }
            ViscaCommand::AutoFocus(enabled) => {
                vec![0x81, 0x01, 0x04, 0x38, if enabled { 0x02 } else { 0x03 }]
            }
            ViscaCommand::Home => vec![0x81, 0x01, 0x06, 0x04],
            ViscaCommand::Preset { action, number } => {
                vec![0x81, 0x01, 0x04, 0x3F, action.code(), number]
            }
        }
    }

    /// Space-separated upper-case hex, e.g. `81 01 04 07 23`
    pub fn payload_hex(&self) -> String {
        self.payload()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
