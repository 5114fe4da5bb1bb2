use bb84::Bb84Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("protocol error: {0}")]
    Protocol(#[from] Bb84Error),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {name}: {value:?}")]
    Config { name: &'static str, value: String },
}

impl LinkError {
    /// Only protocol-level failures that allow a fresh exchange qualify.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LinkError::Protocol(err) if err.is_recoverable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverability_follows_the_protocol_error() {
        assert!(LinkError::from(Bb84Error::DegenerateSift).is_recoverable());
        assert!(!LinkError::from(Bb84Error::TransportClosedPrematurely { expected: 4, received: 0 }).is_recoverable());
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(!LinkError::from(io).is_recoverable());
    }
}
