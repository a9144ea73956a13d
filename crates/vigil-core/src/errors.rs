use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection attempt already in flight")]
    AlreadyConnecting,

    #[error("Connect failed: {reason}")]
    ConnectFailed { reason: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Message too large: {len} bytes")]
    FrameTooLarge { len: usize },

    #[error("Fragments of two messages interleaved on one connection")]
    InterleavedFragments,

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Frame source unavailable: {reason}")]
    Device { reason: String },

    #[error("Encode failed: {reason}")]
    Encode { reason: String },

    #[error("No critical alert to acknowledge")]
    NotCritical,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
