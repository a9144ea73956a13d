//! Session ownership: one connection + one frame pipeline per session,
//! stop-then-start idempotency, bounded teardown.
//!
//! ```text
//! Client::start ─► probe source ─► connect ─► "start_stream"
//!                    │
//!                    ├─ spawn dispatcher (sole transport subscriber)
//!                    └─ spawn frame pipeline (single-slot guard)
//!
//! Client::stop  ─► cancel pipeline ─► bounded join ─► graceful disconnect
//!                  ─► bounded dispatcher join ─► local alert fallback
//! ```
//!
//! Every session builds its connection, guard, stop channel and event
//! channels from scratch — nothing from a previous session leaks into the
//! next one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};
use vigil_core::protocol;
use vigil_core::{ClientConfig, ClientError, ConnectionState, Severity, TransportError};
use vigil_transport::Connection;

use crate::alert::{AlertMonitor, AlertSnapshot};
use crate::dispatch::run_dispatch;
use crate::io::{AudioSink, FrameEncoder, FrameSource, RenderSink};
use crate::pipeline::{run_pipeline, FramePipeline};

/// Events surfaced to the embedding UI, polled from the session's event
/// channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Informational line for the monitoring log.
    Log(String),
    AlertRaised { severity: Severity, message: String },
    /// Visual flash toggle during critical escalation.
    Flash(bool),
    AlertCleared,
    /// Server ended the stream normally.
    ConnectionClosed,
    /// Mid-stream failure; the session owner decides whether to reconnect.
    TransportFailed(String),
    Stopped,
}

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Session ───────────────────────────────────────────────────────────────────

/// A running streaming session.
pub struct Session {
    config: ClientConfig,
    connection: Connection,
    alerts: Arc<AlertMonitor>,
    pipeline_stop: mpsc::Sender<()>,
    pipeline_task: Option<JoinHandle<()>>,
    dispatch_task: Option<JoinHandle<()>>,
    frames_sent: Arc<AtomicU64>,
    events_tx: mpsc::Sender<ClientEvent>,
}

impl Session {
    pub(crate) async fn start(
        config: ClientConfig,
        mut source: Box<dyn FrameSource>,
        encoder: Arc<dyn FrameEncoder>,
        render: Arc<dyn RenderSink>,
        audio: Arc<dyn AudioSink>,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>), ClientError> {
        // Without a frame source there is nothing to stream; surface the
        // device failure once, before touching the network.
        source.open().await?;

        let connection =
            Connection::new(config.connect_timeout(), config.close_timeout());
        connection.connect(&config.server_addr).await?;
        connection.send_text(protocol::START_STREAM).await?;

        let transport_events = connection.take_events().ok_or_else(|| {
            ClientError::Transport(TransportError::ConnectFailed {
                reason: "event stream already taken".to_owned(),
            })
        })?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let alerts = Arc::new(AlertMonitor::new(audio, events_tx.clone(), &config));

        let dispatch_task = tokio::spawn(run_dispatch(
            transport_events,
            render,
            Arc::clone(&alerts),
            events_tx.clone(),
        ));

        let guard = Arc::new(Semaphore::new(1));
        let (pipeline_stop, stop_rx) = mpsc::channel(1);
        let frames_sent = Arc::new(AtomicU64::new(0));
        let pipeline = FramePipeline {
            source,
            encoder,
            connection: connection.clone(),
            guard,
            interval: config.frame_interval(),
            quality: config.jpeg_quality,
            frames_sent: Arc::clone(&frames_sent),
        };
        let pipeline_task = tokio::spawn(run_pipeline(pipeline, stop_rx));

        info!("Session started against {}", config.server_addr);
        Ok((
            Self {
                config,
                connection,
                alerts,
                pipeline_stop,
                pipeline_task: Some(pipeline_task),
                dispatch_task: Some(dispatch_task),
                frames_sent,
                events_tx,
            },
            events_rx,
        ))
    }

    /// Tear the session down. Each step is bounded; the connection and
    /// frame source are released exactly once even if a step overruns.
    pub(crate) async fn shutdown(&mut self) {
        // (a) cancel the pipeline loop…
        let _ = self.pipeline_stop.try_send(());

        // (b) …and wait (bounded) for the in-flight cycle to finish and
        // release its guard.
        if let Some(mut task) = self.pipeline_task.take() {
            if timeout(self.config.stop_timeout(), &mut task).await.is_err() {
                warn!("Frame pipeline did not stop in time; aborting");
                task.abort();
            }
        }

        // (c) graceful close; bounded inside disconnect, socket released on
        // every path.
        if let Err(e) = self.connection.disconnect().await {
            warn!("Disconnect: {e}");
        }

        // The dispatcher drains out once the receive loop is gone.
        if let Some(mut task) = self.dispatch_task.take() {
            if timeout(self.config.stop_timeout(), &mut task).await.is_err() {
                warn!("Dispatcher did not stop in time; aborting");
                task.abort();
            }
        }

        // (d) no connection remains, so a pending acknowledgement can never
        // settle; clear any active alert locally.
        self.alerts.reset_local();

        let _ = self.events_tx.try_send(ClientEvent::Stopped);
        info!("Session stopped ({} frames sent)", self.frames_sent.load(Ordering::Relaxed));
    }

    /// Acknowledge the active critical alert.
    pub async fn acknowledge_alert(&self) -> Result<(), ClientError> {
        self.alerts.acknowledge(&self.connection).await
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn alert_state(&self) -> AlertSnapshot {
        self.alerts.snapshot()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Session owner. Holds at most one live session; starting while one is
/// active fully stops the old one first.
pub struct Client {
    config: ClientConfig,
    active: Option<Session>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, active: None }
    }

    /// Stop-then-start: never two overlapping sessions.
    pub async fn start(
        &mut self,
        source: Box<dyn FrameSource>,
        encoder: Arc<dyn FrameEncoder>,
        render: Arc<dyn RenderSink>,
        audio: Arc<dyn AudioSink>,
    ) -> Result<mpsc::Receiver<ClientEvent>, ClientError> {
        self.stop().await;

        let (session, events) =
            Session::start(self.config.clone(), source, encoder, render, audio).await?;
        self.active = Some(session);
        Ok(events)
    }

    /// Idempotent: a second stop is a no-op.
    pub async fn stop(&mut self) {
        if let Some(mut session) = self.active.take() {
            session.shutdown().await;
        }
    }

    pub async fn acknowledge_alert(&self) -> Result<(), ClientError> {
        match &self.active {
            Some(session) => session.acknowledge_alert().await,
            None => Err(ClientError::NotCritical),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }
}
