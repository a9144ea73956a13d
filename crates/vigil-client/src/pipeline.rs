//! The capture → encode → send loop.
//!
//! One cycle: take the single-slot guard, pull a frame, encode, send if the
//! connection is open, then sleep out the frame interval. The guard has
//! capacity 1 so two encode/send cycles can never overlap, even under
//! scheduler reordering; its permit is RAII-released on every exit path —
//! holding it across a cancellation would deadlock every later session.
//!
//! Frames produced while the connection is not open are silently dropped.
//! There is no outbound queue, so a slow or absent network never grows
//! memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use vigil_core::{ClientError, TransportError};
use vigil_transport::Connection;

use crate::io::{FrameEncoder, FrameSource};

pub(crate) struct FramePipeline {
    pub source: Box<dyn FrameSource>,
    pub encoder: Arc<dyn FrameEncoder>,
    pub connection: Connection,
    pub guard: Arc<Semaphore>,
    pub interval: Duration,
    pub quality: u8,
    pub frames_sent: Arc<AtomicU64>,
}

/// Run until the stop channel fires. In-flight cycle work finishes before
/// cancellation is observed; the loop never exits holding the guard.
pub(crate) async fn run_pipeline(mut pipeline: FramePipeline, mut stop_rx: mpsc::Receiver<()>) {
    info!("Frame pipeline running ({}ms per cycle)", pipeline.interval.as_millis());

    loop {
        let permit = tokio::select! {
            biased;
            _ = stop_rx.recv() => break,
            permit = Arc::clone(&pipeline.guard).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break, // guard closed: session tearing down
            },
        };

        if let Err(e) = run_cycle(&mut pipeline).await {
            // A single bad frame never ends the session.
            warn!("Frame cycle failed: {e}");
        }
        drop(permit);

        tokio::select! {
            biased;
            _ = stop_rx.recv() => break,
            _ = sleep(pipeline.interval) => {}
        }
    }

    info!(
        "Frame pipeline stopped after {} frames",
        pipeline.frames_sent.load(Ordering::Relaxed)
    );
}

async fn run_cycle(pipeline: &mut FramePipeline) -> Result<(), ClientError> {
    let Some(raw) = pipeline.source.try_capture().await? else {
        debug!("Empty capture; skipping cycle");
        return Ok(());
    };

    let encoded = pipeline.encoder.encode(&raw, pipeline.quality)?;

    if !pipeline.connection.state().is_open() {
        debug!("Not connected; frame dropped");
        return Ok(());
    }
    match pipeline.connection.send_binary(encoded).await {
        Ok(()) => {
            pipeline.frames_sent.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
        // Connection went away between the state check and the write.
        Err(TransportError::NotConnected) => {
            debug!("Connection lost mid-cycle; frame dropped");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
