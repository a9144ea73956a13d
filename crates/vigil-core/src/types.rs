use bytes::Bytes;
use serde::{Deserialize, Serialize};

// MARK: - Severity

/// Ordered alert classification. `Critical` is the highest level and the
/// only one that triggers audio/visual escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Informational,
    Warning,
    Critical,
}

impl Severity {
    /// Map the wire's integer `level` field. Levels above the defined range
    /// clamp to `Critical`, levels below it to `Informational`.
    pub fn from_level(level: i64) -> Self {
        match level {
            l if l <= 0 => Self::Informational,
            1 => Self::Warning,
            _ => Self::Critical,
        }
    }

    pub fn level(&self) -> i64 {
        match self {
            Self::Informational => 0,
            Self::Warning => 1,
            Self::Critical => 2,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Informational => write!(f, "informational"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// MARK: - AlertRecord

/// A server-reported condition. One "current" record exists at a time while
/// an alert is active; nothing is persisted across restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub severity: Severity,
    pub message: String,
    /// Seconds the condition has persisted, as reported by the server.
    pub elapsed_time: f64,
}

// MARK: - InboundMessage

/// One fully reassembled logical message from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Binary(Bytes),
    Text(String),
}

impl InboundMessage {
    pub fn len(&self) -> usize {
        match self {
            Self::Binary(b) => b.len(),
            Self::Text(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// MARK: - ConnectionState

/// Lifecycle of the single duplex connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Closed,
    Faulted,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Faulted => write!(f, "faulted"),
        }
    }
}

// MARK: - AlertPhase

/// Phase of the alert state machine. `AwaitingAck` implies an alert is
/// still active; both flags clear together on a confirmed reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPhase {
    Idle,
    Active,
    AwaitingAck,
}

impl AlertPhase {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::Severity;

    #[test]
    fn severity_orders_informational_below_critical() {
        assert!(Severity::Informational < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn level_mapping_clamps_out_of_range_values() {
        assert_eq!(Severity::from_level(-3), Severity::Informational);
        assert_eq!(Severity::from_level(0), Severity::Informational);
        assert_eq!(Severity::from_level(1), Severity::Warning);
        assert_eq!(Severity::from_level(2), Severity::Critical);
        assert_eq!(Severity::from_level(9), Severity::Critical);
    }
}
