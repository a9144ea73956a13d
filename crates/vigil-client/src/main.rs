//! vigil — monitoring client demo binary.
//!
//! Wires the engine to synthetic stand-ins for the external collaborators
//! (camera, encoder, render surface, audio device): a moving test-pattern
//! source, a passthrough encoder and logging sinks. Point it at an analysis
//! server and it streams frames and reacts to alerts; Ctrl-C stops the
//! session gracefully.
//!
//! Usage: `vigil [config.json]` — the file may override any subset of the
//! defaults (see `vigil_core::ClientConfig`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use vigil_client::{
    AudioSink, CameraConfig, Client, ClientEvent, FrameEncoder, FrameSource, RawFrame, RenderSink,
};
use vigil_core::{ClientConfig, ClientError};

// ── Demo collaborators ────────────────────────────────────────────────────────

/// Synthetic camera: a moving gradient, so the server sees changing frames.
struct TestPatternSource {
    camera: CameraConfig,
    tick: u64,
    interval_ms: u64,
}

impl TestPatternSource {
    fn new(config: &ClientConfig) -> Self {
        let camera = CameraConfig {
            index: config.camera_index,
            width: config.frame_width,
            height: config.frame_height,
        };
        Self { camera, tick: 0, interval_ms: config.frame_interval_ms }
    }
}

#[async_trait]
impl FrameSource for TestPatternSource {
    async fn open(&mut self) -> Result<(), ClientError> {
        info!(
            "Test-pattern source ready (device {}, {}×{})",
            self.camera.index, self.camera.width, self.camera.height
        );
        Ok(())
    }

    async fn try_capture(&mut self) -> Result<Option<RawFrame>, ClientError> {
        self.tick += 1;
        let shift = (self.tick % 256) as u8;
        let mut data = Vec::with_capacity((self.camera.width * self.camera.height * 4) as usize);
        for y in 0..self.camera.height {
            for x in 0..self.camera.width {
                // BGRx, 4 bytes per pixel.
                data.push((x as u8).wrapping_add(shift));
                data.push((y as u8).wrapping_add(shift));
                data.push(shift);
                data.push(0);
            }
        }
        Ok(Some(RawFrame {
            data,
            width: self.camera.width,
            height: self.camera.height,
            pts_ms: self.tick * self.interval_ms,
        }))
    }
}

/// Demo encoder: no compression, hands the raw pixels through.
struct PassthroughEncoder;

impl FrameEncoder for PassthroughEncoder {
    fn encode(&self, frame: &RawFrame, _quality: u8) -> Result<Bytes, ClientError> {
        Ok(Bytes::from(frame.data.clone()))
    }
}

/// Logs relayed frames instead of painting them.
#[derive(Default)]
struct LogRenderSink {
    frames: AtomicU64,
}

impl RenderSink for LogRenderSink {
    fn display(&self, frame: Bytes) {
        let n = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if n % 30 == 0 {
            debug!("Displayed {n} relayed frames (last {} bytes)", frame.len());
        }
    }
}

struct LogAudioSink;

impl AudioSink for LogAudioSink {
    fn play_looping(&self, name: &str) {
        info!("Audio cue '{name}' looping");
    }

    fn stop(&self) {
        info!("Audio stopped");
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn load_config(path: &str) -> Result<ClientConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config file {path}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("vigil v{}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(&path)?,
        None => ClientConfig::default(),
    };

    let mut client = Client::new(config.clone());
    let mut events = client
        .start(
            Box::new(TestPatternSource::new(&config)),
            Arc::new(PassthroughEncoder),
            Arc::new(LogRenderSink::default()),
            Arc::new(LogAudioSink),
        )
        .await
        .context("starting streaming session")?;

    info!("Streaming to {} (Ctrl-C to stop)", config.server_addr);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stop requested");
                break;
            }
            event = events.recv() => match event {
                Some(ClientEvent::Log(line)) => info!("{line}"),
                Some(ClientEvent::AlertRaised { severity, message }) => {
                    warn!("ALERT [{severity}]: {message}");
                }
                Some(ClientEvent::Flash(on)) => debug!("Flash {}", if on { "on" } else { "off" }),
                Some(ClientEvent::AlertCleared) => info!("Alert cleared"),
                Some(ClientEvent::ConnectionClosed) => {
                    info!("Server ended the stream");
                    break;
                }
                Some(ClientEvent::TransportFailed(reason)) => {
                    warn!("Connection lost: {reason}");
                    break;
                }
                Some(ClientEvent::Stopped) | None => break,
            }
        }
    }

    client.stop().await;
    Ok(())
}
