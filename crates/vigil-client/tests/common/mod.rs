//! Shared fixtures: mock collaborators and a scripted loopback server
//! speaking the wire framing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use vigil_client::{AudioSink, ClientEvent, FrameEncoder, FrameSource, RawFrame, RenderSink};
use vigil_core::{ClientConfig, ClientError};
use vigil_transport::{read_frame, write_frame, Opcode, WireFrame};

pub const EVENT_WAIT: Duration = Duration::from_secs(3);

// ── Config ────────────────────────────────────────────────────────────────────

/// Short intervals so tests run dozens of cycles in milliseconds.
pub fn fast_config(server_addr: &str) -> ClientConfig {
    ClientConfig {
        server_addr: server_addr.to_owned(),
        frame_interval_ms: 5,
        flash_toggles: 4,
        flash_interval_ms: 1,
        connect_timeout_ms: 1_000,
        close_timeout_ms: 500,
        stop_timeout_ms: 1_000,
        ..ClientConfig::default()
    }
}

// ── Mock collaborators ────────────────────────────────────────────────────────

pub struct CountingSource {
    pub captures: Arc<AtomicU64>,
}

impl CountingSource {
    pub fn boxed() -> (Box<dyn FrameSource>, Arc<AtomicU64>) {
        let captures = Arc::new(AtomicU64::new(0));
        (Box::new(Self { captures: Arc::clone(&captures) }), captures)
    }
}

#[async_trait]
impl FrameSource for CountingSource {
    async fn open(&mut self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn try_capture(&mut self) -> Result<Option<RawFrame>, ClientError> {
        let n = self.captures.fetch_add(1, Ordering::Relaxed);
        Ok(Some(RawFrame { data: vec![0xAB; 32], width: 4, height: 2, pts_ms: n * 5 }))
    }
}

/// A camera that is not there.
pub struct MissingSource;

#[async_trait]
impl FrameSource for MissingSource {
    async fn open(&mut self) -> Result<(), ClientError> {
        Err(ClientError::Device { reason: "camera 0 not detected".to_owned() })
    }

    async fn try_capture(&mut self) -> Result<Option<RawFrame>, ClientError> {
        Ok(None)
    }
}

pub struct StubEncoder;

impl FrameEncoder for StubEncoder {
    fn encode(&self, frame: &RawFrame, _quality: u8) -> Result<Bytes, ClientError> {
        Ok(Bytes::from(frame.data.clone()))
    }
}

#[derive(Default)]
pub struct CollectingRender {
    pub frames: Mutex<Vec<Bytes>>,
}

impl RenderSink for CollectingRender {
    fn display(&self, frame: Bytes) {
        self.frames.lock().unwrap().push(frame);
    }
}

pub struct RecordingAudio {
    pub plays: AtomicU64,
    pub playing: AtomicBool,
}

impl RecordingAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { plays: AtomicU64::new(0), playing: AtomicBool::new(false) })
    }
}

impl AudioSink for RecordingAudio {
    fn play_looping(&self, _name: &str) {
        self.plays.fetch_add(1, Ordering::Relaxed);
        self.playing.store(true, Ordering::Relaxed);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::Relaxed);
    }
}

// ── Loopback server ───────────────────────────────────────────────────────────

pub struct TestServer {
    listener: TcpListener,
    pub addr: String,
}

impl TestServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr").to_string();
        Self { listener, addr }
    }

    pub async fn accept(&self) -> TcpStream {
        timeout(EVENT_WAIT, self.listener.accept())
            .await
            .expect("client connects")
            .expect("accept")
            .0
    }
}

/// Read one wire frame with a deadline.
pub async fn read_one(stream: &mut TcpStream) -> WireFrame {
    timeout(EVENT_WAIT, read_frame(stream)).await.expect("frame within deadline").expect("read")
}

/// Read frames until a text message arrives, skipping relayed binary frames
/// that the pipeline keeps producing concurrently.
pub async fn expect_text_skipping_binary(stream: &mut TcpStream) -> String {
    loop {
        let frame = read_one(stream).await;
        match frame.opcode {
            Opcode::Text => {
                return String::from_utf8(frame.payload.to_vec()).expect("utf-8 text");
            }
            Opcode::Binary => continue,
            Opcode::Close => panic!("unexpected close while waiting for text"),
        }
    }
}

pub async fn send_text(stream: &mut TcpStream, text: &str) {
    write_frame(stream, &WireFrame::text(text)).await.expect("server write");
}

/// Drain until the client's close frame arrives, then echo it.
pub async fn answer_close(stream: &mut TcpStream) {
    loop {
        let frame = read_one(stream).await;
        if frame.opcode == Opcode::Close {
            write_frame(stream, &WireFrame::close()).await.expect("close echo");
            return;
        }
    }
}

// ── Event helpers ─────────────────────────────────────────────────────────────

/// Wait for the first event matching `pred`, discarding everything else.
pub async fn wait_for(
    events: &mut mpsc::Receiver<ClientEvent>,
    pred: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    timeout(EVENT_WAIT, async {
        loop {
            match events.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed before the expected event"),
            }
        }
    })
    .await
    .expect("expected event within deadline")
}
