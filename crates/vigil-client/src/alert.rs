//! Alert state machine.
//!
//! ```text
//! Idle ──new alert S──► Active(S) ──user ack (critical)──► AwaitingAck
//!  ▲                      │  ▲                                  │
//!  │                      └──┘ higher severity re-escalates     │
//!  └──────── server reset_ok / local fallback ◄─────────────────┘
//! ```
//!
//! Escalation (looping audio cue + bounded flash burst) fires only when a
//! critical alert first lands or when severity strictly increases while
//! active. Equal-or-lower reports are logged without re-escalating, so a
//! flood of repeated low-severity alerts cannot re-trigger the alarm. The
//! flash never re-arms while an acknowledgement is pending.
//!
//! One `AlertMonitor` per session owns all of this state — the receive loop
//! and the user-facing acknowledge action race on it, so every transition
//! happens under the one internal lock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use vigil_core::protocol;
use vigil_core::{AlertPhase, AlertRecord, ClientConfig, ClientError, Severity};
use vigil_transport::Connection;

use crate::io::AudioSink;
use crate::session::ClientEvent;

/// Point-in-time view of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertSnapshot {
    pub phase: AlertPhase,
    pub severity: Option<Severity>,
    /// True only while an acknowledgement round trip is in flight; implies
    /// the alert is still active.
    pub ack_pending: bool,
}

struct AlertInner {
    phase: AlertPhase,
    record: Option<AlertRecord>,
}

pub struct AlertMonitor {
    inner: Mutex<AlertInner>,
    flash: Mutex<Option<JoinHandle<()>>>,
    audio: Arc<dyn AudioSink>,
    events: mpsc::Sender<ClientEvent>,
    sound: String,
    flash_toggles: u32,
    flash_interval: Duration,
}

enum Outcome {
    Raised { escalate: bool },
    LogOnly,
}

impl AlertMonitor {
    pub fn new(
        audio: Arc<dyn AudioSink>,
        events: mpsc::Sender<ClientEvent>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            inner: Mutex::new(AlertInner { phase: AlertPhase::Idle, record: None }),
            flash: Mutex::new(None),
            audio,
            events,
            sound: config.alert_sound.clone(),
            flash_toggles: config.flash_toggles,
            flash_interval: config.flash_interval(),
        }
    }

    pub fn snapshot(&self) -> AlertSnapshot {
        let inner = self.inner.lock().unwrap();
        AlertSnapshot {
            phase: inner.phase,
            severity: inner.record.as_ref().map(|r| r.severity),
            ack_pending: inner.phase == AlertPhase::AwaitingAck,
        }
    }

    // ── Inbound transitions (receive-loop side) ───────────────────────────────

    /// A new server-reported alert.
    pub fn on_alert(&self, record: AlertRecord) {
        let severity = record.severity;
        let message = record.message.clone();

        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            match inner.phase {
                AlertPhase::Idle => {
                    inner.phase = AlertPhase::Active;
                    inner.record = Some(record);
                    Outcome::Raised { escalate: severity == Severity::Critical }
                }
                AlertPhase::Active => {
                    let current = inner
                        .record
                        .as_ref()
                        .map(|r| r.severity)
                        .unwrap_or(Severity::Informational);
                    if severity > current {
                        inner.record = Some(record);
                        Outcome::Raised { escalate: severity == Severity::Critical }
                    } else {
                        Outcome::LogOnly
                    }
                }
                // Never re-arm escalation while an acknowledgement is pending.
                AlertPhase::AwaitingAck => Outcome::LogOnly,
            }
        };

        match outcome {
            Outcome::Raised { escalate } => {
                info!("Alert raised: {message} ({severity})");
                let _ = self.events.try_send(ClientEvent::AlertRaised { severity, message });
                if escalate {
                    self.escalate();
                }
            }
            Outcome::LogOnly => {
                info!("Alert repeated at {severity}; logged, no re-escalation");
                let _ = self.events.try_send(ClientEvent::Log(format!(
                    "alert repeated ({severity}): {message}"
                )));
            }
        }
    }

    /// Server confirmed the acknowledged alert was reset.
    pub fn on_reset_confirmed(&self) {
        let cleared = {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase == AlertPhase::AwaitingAck {
                inner.phase = AlertPhase::Idle;
                inner.record = None;
                true
            } else {
                false
            }
        };

        if cleared {
            self.stop_flash();
            info!("Server confirmed alert reset");
            let _ = self.events.try_send(ClientEvent::AlertCleared);
        } else {
            debug!("Unsolicited reset confirmation ignored");
        }
    }

    // ── User-facing acknowledgement ───────────────────────────────────────────

    /// Acknowledge the active critical alert. With an open connection this
    /// starts the server round trip (`AwaitingAck` until `reset_ok`);
    /// without one no round trip is possible and the alert clears locally.
    pub async fn acknowledge(&self, connection: &Connection) -> Result<(), ClientError> {
        let connected = connection.state().is_open();
        {
            let mut inner = self.inner.lock().unwrap();
            let critical = inner.phase == AlertPhase::Active
                && inner.record.as_ref().map(|r| r.severity) == Some(Severity::Critical);
            if !critical {
                return Err(ClientError::NotCritical);
            }
            if connected {
                inner.phase = AlertPhase::AwaitingAck;
            } else {
                inner.phase = AlertPhase::Idle;
                inner.record = None;
            }
        }

        // Escalation stops immediately, before the round trip settles.
        self.audio.stop();
        self.stop_flash();

        if !connected {
            info!("No connection; alert cleared locally");
            let _ = self.events.try_send(ClientEvent::AlertCleared);
            return Ok(());
        }

        match connection.send_text(&protocol::reset_confirm()).await {
            Ok(()) => {
                info!("Acknowledgement sent; awaiting server reset");
                Ok(())
            }
            Err(e) => {
                // The connection went away under us; same fallback as having
                // none at all.
                warn!("Acknowledgement not delivered ({e}); clearing locally");
                self.clear_pending_ack();
                Ok(())
            }
        }
    }

    /// Session-teardown fallback: no connection remains, so no round trip
    /// can ever settle. Clears whatever is active.
    pub fn reset_local(&self) {
        let was_active = {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase.is_active() {
                inner.phase = AlertPhase::Idle;
                inner.record = None;
                true
            } else {
                false
            }
        };

        if was_active {
            self.audio.stop();
            self.stop_flash();
            debug!("Alert state reset locally");
            let _ = self.events.try_send(ClientEvent::AlertCleared);
        }
    }

    // ── Escalation ────────────────────────────────────────────────────────────

    fn escalate(&self) {
        self.audio.play_looping(&self.sound);
        self.start_flash();
    }

    fn start_flash(&self) {
        let mut slot = self.flash.lock().unwrap();
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let events = self.events.clone();
        let toggles = self.flash_toggles;
        let interval = self.flash_interval;
        *slot = Some(tokio::spawn(async move {
            let mut on = false;
            for _ in 0..toggles {
                on = !on;
                let _ = events.try_send(ClientEvent::Flash(on));
                sleep(interval).await;
            }
            // Time-bounded: the burst ends by itself, overlay dark.
            let _ = events.try_send(ClientEvent::Flash(false));
        }));
    }

    fn stop_flash(&self) {
        if let Some(task) = self.flash.lock().unwrap().take() {
            task.abort();
            let _ = self.events.try_send(ClientEvent::Flash(false));
        }
    }

    fn clear_pending_ack(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.phase == AlertPhase::AwaitingAck {
            inner.phase = AlertPhase::Idle;
            inner.record = None;
            drop(inner);
            let _ = self.events.try_send(ClientEvent::AlertCleared);
        }
    }
}
