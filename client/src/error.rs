use lapin::protocol::{AMQPErrorKind, AMQPSoftError};
use thiserror::Error;

/// Error taxonomy for the resilient AMQP client.
///
/// `Transport` and `Protocol` are distinguished so the circuit breaker can
/// tell a broken connection from a broker that is healthy but rejected a
/// malformed request: only `Transport` counts as a breaker failure.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("publish queue is full")]
    QueueFull,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Broker-level AMQP replies that mean the request was rejected on its
/// merits, not that the connection is unhealthy. Mirrors the original
/// implementation's `isConnectionError` channel-error allowlist.
const PROTOCOL_SOFT_ERRORS: &[AMQPSoftError] = &[
    AMQPSoftError::CONTENTTOOLARGE,
    AMQPSoftError::NOCONSUMERS,
    AMQPSoftError::ACCESSREFUSED,
    AMQPSoftError::NOTFOUND,
    AMQPSoftError::RESOURCELOCKED,
    AMQPSoftError::PRECONDITIONFAILED,
];

impl ClientError {
    /// Classifies a lapin error the way the breaker needs: `true` means the
    /// broker is unreachable or the connection is bad (a breaker failure);
    /// `false` means the broker rejected the request on its merits.
    pub fn is_connection_fault(err: &lapin::Error) -> bool {
        match err.kind() {
            lapin::ErrorKind::ProtocolError(amqp_err) => match amqp_err.kind() {
                AMQPErrorKind::Soft(soft) => !PROTOCOL_SOFT_ERRORS.contains(soft),
                AMQPErrorKind::Hard(_) => true,
            },
            _ => true,
        }
    }

    /// Converts a lapin error into a `ClientError`, classifying it as
    /// `Transport` or `Protocol` so callers surfacing it keep that distinction.
    pub fn from_lapin(err: lapin::Error) -> Self {
        if Self::is_connection_fault(&err) {
            ClientError::Transport(err.to_string())
        } else {
            ClientError::Protocol(err.to_string())
        }
    }

    /// Whether an already-classified `ClientError` should be treated as a
    /// breaker failure and a re-enqueue candidate, as opposed to a rejection
    /// on the message's merits that should be dropped and logged.
    pub fn is_connection_fault_err(err: &ClientError) -> bool {
        matches!(err, ClientError::Transport(_) | ClientError::Cancelled)
    }
}

impl From<lapin::Error> for ClientError {
    fn from(err: lapin::Error) -> Self {
        Self::from_lapin(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::InvalidInput(err.to_string())
    }
}
