//! Seams to the external collaborators: camera, encoder, rendering surface
//! and audio device. The engine only ever talks to these traits; concrete
//! device backends live with the embedder.

use async_trait::async_trait;
use bytes::Bytes;
use vigil_core::ClientError;

// ── Frame source ──────────────────────────────────────────────────────────────

/// Configuration for the camera frame source.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Zero-based device index.
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { index: 0, width: 640, height: 480 }
    }
}

/// A raw captured frame, pixels as delivered by the device.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp in milliseconds.
    pub pts_ms: u64,
}

/// Produces raw frames on demand.
#[async_trait]
pub trait FrameSource: Send {
    /// Verify the device is usable. Called once at session start; a failure
    /// here stops the session from starting at all.
    async fn open(&mut self) -> Result<(), ClientError>;

    /// Grab the next frame if one is ready. `None` is a valid empty capture,
    /// not an error; the pipeline simply skips the cycle.
    async fn try_capture(&mut self) -> Result<Option<RawFrame>, ClientError>;
}

// ── Encoder ───────────────────────────────────────────────────────────────────

/// Compresses a raw frame into an outbound byte payload.
pub trait FrameEncoder: Send + Sync {
    /// `quality` is the 0–100 size/quality tradeoff handed to the codec.
    fn encode(&self, frame: &RawFrame, quality: u8) -> Result<Bytes, ClientError>;
}

// ── Render sink ───────────────────────────────────────────────────────────────

/// Consumes server-relayed frame payloads for on-screen presentation.
pub trait RenderSink: Send + Sync {
    /// Must return promptly; a slow sink would stall inbound dispatch.
    fn display(&self, frame: Bytes);
}

// ── Audio sink ────────────────────────────────────────────────────────────────

/// Plays and stops a named alert cue.
pub trait AudioSink: Send + Sync {
    fn play_looping(&self, name: &str);
    fn stop(&self);
}
