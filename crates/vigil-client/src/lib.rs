//! vigil-client — the streaming-and-alert engine.
//!
//! A [`Client`] owns at most one [`session::Session`] at a time. Each session
//! runs two independently scheduled loops over one duplex connection:
//!
//! ```text
//! FrameSource → encode → Connection ── framed TCP ──► analysis server
//!                                                          │
//! RenderSink ◄── dispatcher ◄── receive loop ◄─────────────┘
//!                    │
//!                    └─► AlertMonitor ──(ack)──► Connection
//! ```
//!
//! The camera, encoder, rendering surface and audio device are external
//! collaborators behind the [`io`] traits; the engine here is the connection
//! lifecycle, the backpressured frame pipeline, inbound demultiplexing, and
//! the alert escalation/acknowledgement state machine.

pub mod alert;
mod dispatch;
pub mod io;
mod pipeline;
pub mod session;

pub use alert::{AlertMonitor, AlertSnapshot};
pub use io::{AudioSink, CameraConfig, FrameEncoder, FrameSource, RawFrame, RenderSink};
pub use session::{Client, ClientEvent, Session};
