use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client configuration. Every field has a default so a partial JSON file
/// only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Analysis server endpoint, `host:port`.
    pub server_addr: String,
    /// Delay between frame cycles in milliseconds (33 ≈ 30 fps).
    pub frame_interval_ms: u64,
    /// JPEG quality handed to the encoder, 0–100.
    pub jpeg_quality: u8,
    /// Camera device index for the frame source.
    pub camera_index: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Name of the looping cue played while a critical alert is active.
    pub alert_sound: String,
    /// Number of on/off flash toggles per critical escalation.
    pub flash_toggles: u32,
    pub flash_interval_ms: u64,
    pub connect_timeout_ms: u64,
    /// Bounded wait for the close handshake during disconnect.
    pub close_timeout_ms: u64,
    /// Bounded wait for the in-flight frame cycle during stop.
    pub stop_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8000".to_owned(),
            frame_interval_ms: 33,
            jpeg_quality: 75,
            camera_index: 0,
            frame_width: 640,
            frame_height: 480,
            alert_sound: "alerta_roja".to_owned(),
            flash_toggles: 10,
            flash_interval_ms: 500,
            connect_timeout_ms: 5_000,
            close_timeout_ms: 2_000,
            stop_timeout_ms: 2_000,
        }
    }
}

impl ClientConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn flash_interval(&self) -> Duration {
        Duration::from_millis(self.flash_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
