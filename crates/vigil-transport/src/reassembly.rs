//! Fragment reassembly.
//!
//! The wire delivers a logical message as one or more fragments sharing an
//! opcode, the last one carrying FIN. The protocol allows only one in-flight
//! message per direction, so a fragment of a different data opcode arriving
//! mid-message is a violation, not a second stream.
//!
//! A [`Reassembler`] is owned by its connection's receive loop and dropped
//! with it — partial state can never leak into a later connection.

use std::io;

use bytes::Bytes;
use vigil_core::{InboundMessage, TransportError};

use crate::wire::{Opcode, WireFrame};

#[derive(Debug, Default)]
pub struct Reassembler {
    in_progress: Option<(Opcode, Vec<u8>)>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one data fragment. Returns a complete message on FIN, `None`
    /// while the message is still accumulating.
    pub fn push(&mut self, frame: WireFrame) -> Result<Option<InboundMessage>, TransportError> {
        let WireFrame { opcode, fin, payload } = frame;
        if !opcode.is_data() {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "control frame routed into reassembly",
            )));
        }

        let (head, buffer) = match self.in_progress.take() {
            None => (opcode, payload.to_vec()),
            Some((head, mut buffer)) => {
                if head != opcode {
                    return Err(TransportError::InterleavedFragments);
                }
                buffer.extend_from_slice(&payload);
                (head, buffer)
            }
        };

        if !fin {
            self.in_progress = Some((head, buffer));
            return Ok(None);
        }

        let message = match head {
            Opcode::Text => {
                let text = String::from_utf8(buffer).map_err(|e| {
                    TransportError::Io(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("text message is not UTF-8: {e}"),
                    ))
                })?;
                InboundMessage::Text(text)
            }
            Opcode::Binary => InboundMessage::Binary(Bytes::from(buffer)),
            // Unreachable: is_data() filtered Close above.
            Opcode::Close => return Err(TransportError::ConnectionClosed),
        };
        Ok(Some(message))
    }

    /// True while a partially received message is buffered.
    pub fn is_mid_message(&self) -> bool {
        self.in_progress.is_some()
    }
}
