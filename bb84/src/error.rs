use std::io;

use thiserror::Error;

use crate::session::SessionState;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Bb84Error {
    #[error("transport closed after {received} of {expected} bytes")]
    TransportClosedPrematurely { expected: usize, received: usize },

    #[error("size mismatch in {field}: expected {expected} values, got {actual}")]
    SizeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} holds non-binary value {value} at position {index}")]
    NonBinaryValue {
        field: &'static str,
        index: usize,
        value: u8,
    },

    #[error("peer advertised {advertised} bits, limit is {limit}")]
    FrameTooLarge { advertised: usize, limit: usize },

    #[error("disclosed index {index} at position {position} does not follow the previous one")]
    UnorderedDisclosure { position: usize, index: usize },

    #[error("basis reconciliation left no matching positions")]
    DegenerateSift,

    #[error("insufficient key material: {available_bits} bits available, {required_bits} required")]
    InsufficientKeyMaterial {
        available_bits: usize,
        required_bits: usize,
    },

    #[error("eavesdropping detected: error rate {error_rate:.4} exceeds threshold {threshold:.4}")]
    EavesdroppingDetected { error_rate: f64, threshold: f64 },

    #[error("cipher contract violation: {0}")]
    CipherContractViolation(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot {operation} while session is {state:?}")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },

    #[error("transport error: {0}")]
    Transport(String),
}

impl Bb84Error {
    /// Errors after which the same session may run a fresh exchange.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Bb84Error::DegenerateSift | Bb84Error::InsufficientKeyMaterial { .. }
        )
    }
}

impl From<io::Error> for Bb84Error {
    fn from(err: io::Error) -> Self {
        Bb84Error::Transport(err.to_string())
    }
}
