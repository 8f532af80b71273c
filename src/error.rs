use thiserror::Error;

use crate::protocol::{ProtocolError, TransportError};

/// Failure of a single daemon exchange, as surfaced by the control
/// operations (`ping`, `version`, `reload`, `shutdown`).
///
/// Scan operations never return this directly; the batch and single-target
/// scan calls fold it into a [`ScanOutcome::Error`](crate::ScanOutcome)
/// so a failed exchange can never be mistaken for a clean verdict.
#[derive(Debug, Error)]
pub enum ClamdError {
    /// The connection could not be established, or I/O on it failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The daemon answered, but not in the shape the command expects.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ClamdError {
    /// Whether the underlying failure was a deadline/timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            ClamdError::Transport(e) => e.is_timeout(),
            ClamdError::Protocol(_) => false,
        }
    }
}
