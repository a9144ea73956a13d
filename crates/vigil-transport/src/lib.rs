//! vigil-transport — framed duplex connection to the analysis server.
//!
//! One [`Connection`] owns one TCP channel. Outbound messages are written
//! whole (binary frame payloads, text control messages); inbound bytes are
//! reassembled from wire fragments into complete logical messages by a
//! single background receive loop and surfaced as [`TransportEvent`]s.
//!
//! ```text
//! Client                                        Analysis server
//! ──────────────────────────────                ───────────────
//! send_binary / send_text ── framed TCP ──────► frame + control intake
//! recv loop ◄── framed TCP ──────────────────── relayed frames + alerts
//!    │
//!    └─► mpsc<TransportEvent> ──► dispatcher (one subscriber)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use vigil_transport::{Connection, TransportEvent};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), vigil_core::TransportError> {
//! let connection = Connection::new(Duration::from_secs(5), Duration::from_secs(2));
//! connection.connect("127.0.0.1:8000").await?;
//! let mut events = connection.take_events().expect("first subscriber");
//! connection.send_text("start_stream").await?;
//! while let Some(event) = events.recv().await {
//!     // TransportEvent::Message / Closed / Error
//! }
//! connection.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod reassembly;
pub mod wire;

pub use client::{Connection, TransportEvent};
pub use reassembly::Reassembler;
pub use wire::{read_frame, write_frame, Opcode, WireFrame};
