//! Wire framing for the duplex channel.
//!
//! # Frame layout (6-byte header)
//!
//! ```text
//! [0]      opcode   u8      0x01 text · 0x02 binary · 0x08 close
//! [1]      flags    u8      bit0 = FIN (final fragment of the message)
//! [2..6]   len      u32 BE  payload length
//! [6..]    payload  [u8]
//! ```
//!
//! Outbound messages are always written as a single FIN fragment; the read
//! side accepts multi-fragment messages and leaves reassembly to
//! [`crate::Reassembler`].

use std::io;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::trace;
use vigil_core::TransportError;

/// Upper bound on a single fragment's payload. Encoded camera frames stay
/// well under this; anything larger is a protocol violation.
pub const MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

const HEADER_SIZE: usize = 6;
const FLAG_FIN: u8 = 0x01;

// ── Opcode ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Text = 0x01,
    Binary = 0x02,
    Close = 0x08,
}

impl Opcode {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Text),
            0x02 => Some(Self::Binary),
            0x08 => Some(Self::Close),
            _ => None,
        }
    }

    /// Text and binary carry message payload; close is a control frame.
    pub fn is_data(self) -> bool {
        matches!(self, Self::Text | Self::Binary)
    }
}

// ── WireFrame ─────────────────────────────────────────────────────────────────

/// One fragment on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct WireFrame {
    pub opcode: Opcode,
    pub fin: bool,
    pub payload: Bytes,
}

impl WireFrame {
    pub fn text(text: &str) -> Self {
        Self {
            opcode: Opcode::Text,
            fin: true,
            payload: Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    pub fn binary(payload: Bytes) -> Self {
        Self { opcode: Opcode::Binary, fin: true, payload }
    }

    pub fn close() -> Self {
        Self { opcode: Opcode::Close, fin: true, payload: Bytes::new() }
    }
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Write one fragment (header + payload) and flush.
pub async fn write_frame(
    stream: &mut (impl AsyncWriteExt + Unpin),
    frame: &WireFrame,
) -> Result<(), TransportError> {
    if frame.payload.len() > MAX_PAYLOAD_BYTES {
        return Err(TransportError::FrameTooLarge { len: frame.payload.len() });
    }

    let mut header = [0u8; HEADER_SIZE];
    header[0] = frame.opcode as u8;
    header[1] = if frame.fin { FLAG_FIN } else { 0 };
    header[2..6].copy_from_slice(&(frame.payload.len() as u32).to_be_bytes());

    stream.write_all(&header).await?;
    stream.write_all(&frame.payload).await?;
    stream.flush().await?;
    trace!("Sent {:?} ({} bytes, fin={})", frame.opcode, frame.payload.len(), frame.fin);
    Ok(())
}

/// Read exactly one fragment.
pub async fn read_frame(
    stream: &mut (impl AsyncReadExt + Unpin),
) -> Result<WireFrame, TransportError> {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).await?;

    let opcode = Opcode::from_u8(header[0]).ok_or_else(|| {
        TransportError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown opcode {:#04x}", header[0]),
        ))
    })?;
    let fin = header[1] & FLAG_FIN != 0;

    let len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]) as usize;
    if len > MAX_PAYLOAD_BYTES {
        return Err(TransportError::FrameTooLarge { len });
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    trace!("Received {:?} ({} bytes, fin={})", opcode, len, fin);

    Ok(WireFrame { opcode, fin, payload: Bytes::from(payload) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_text_frame() {
        let (mut tx, mut rx) = tokio::io::duplex(1024);
        let frame = WireFrame::text("start_stream");
        write_frame(&mut tx, &frame).await.expect("write");
        let back = read_frame(&mut rx).await.expect("read");
        assert_eq!(back, frame);
    }

    #[tokio::test]
    async fn round_trips_a_binary_frame() {
        let (mut tx, mut rx) = tokio::io::duplex(1024);
        let frame = WireFrame::binary(Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0]));
        write_frame(&mut tx, &frame).await.expect("write");
        let back = read_frame(&mut rx).await.expect("read");
        assert_eq!(back.opcode, Opcode::Binary);
        assert!(back.fin);
        assert_eq!(back.payload.as_ref(), &[0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[tokio::test]
    async fn round_trips_an_empty_close_frame() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        write_frame(&mut tx, &WireFrame::close()).await.expect("write");
        let back = read_frame(&mut rx).await.expect("read");
        assert_eq!(back.opcode, Opcode::Close);
        assert!(back.payload.is_empty());
    }

    #[tokio::test]
    async fn preserves_the_fin_flag_on_continuation_fragments() {
        let (mut tx, mut rx) = tokio::io::duplex(1024);
        let fragment = WireFrame {
            opcode: Opcode::Binary,
            fin: false,
            payload: Bytes::from_static(b"part"),
        };
        write_frame(&mut tx, &fragment).await.expect("write");
        let back = read_frame(&mut rx).await.expect("read");
        assert!(!back.fin);
    }

    #[tokio::test]
    async fn rejects_an_oversized_outbound_payload() {
        let (mut tx, _rx) = tokio::io::duplex(64);
        let frame = WireFrame::binary(Bytes::from(vec![0u8; MAX_PAYLOAD_BYTES + 1]));
        let err = write_frame(&mut tx, &frame).await.expect_err("must reject");
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn rejects_an_oversized_inbound_length() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        let mut header = [0u8; 6];
        header[0] = Opcode::Binary as u8;
        header[1] = FLAG_FIN;
        header[2..6].copy_from_slice(&((MAX_PAYLOAD_BYTES as u32 + 1).to_be_bytes()));
        tokio::io::AsyncWriteExt::write_all(&mut tx, &header).await.expect("write header");
        let err = read_frame(&mut rx).await.expect_err("must reject");
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn rejects_an_unknown_opcode() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        let header = [0x7Fu8, FLAG_FIN, 0, 0, 0, 0];
        tokio::io::AsyncWriteExt::write_all(&mut tx, &header).await.expect("write header");
        let err = read_frame(&mut rx).await.expect_err("must reject");
        assert!(matches!(err, TransportError::Io(_)));
    }
}
