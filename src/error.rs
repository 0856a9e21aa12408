//! Definition of errors returned by command log operations.

use std::io;
use thiserror::Error;

/// Different types of error that can happen when operating on a command log.
///
/// None of these are fatal to the log. Every error is scoped to the call that
/// returned it and the log remains usable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("Cannot grow pending command by {0} bytes")]
    AllocationFailure(usize),

    #[error("Command index {index} out of range, ring holds {len} commands")]
    InvalidIndex { index: usize, len: usize },

    #[error("Offset {offset} out of range for command of {len} bytes")]
    InvalidOffset { offset: usize, len: usize },

    #[error("Operation cancelled while waiting for the ring")]
    Cancelled,
}

impl From<RingError> for io::Error {
    fn from(error: RingError) -> Self {
        let kind = match error {
            RingError::AllocationFailure(_) => io::ErrorKind::OutOfMemory,
            RingError::InvalidIndex { .. } | RingError::InvalidOffset { .. } => {
                io::ErrorKind::InvalidInput
            }
            // Not Interrupted, std retries those in read_to_end and write_all.
            RingError::Cancelled => io::ErrorKind::Other,
        };

        io::Error::new(kind, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RingError::AllocationFailure(8), io::ErrorKind::OutOfMemory)]
    #[case(RingError::InvalidIndex { index: 3, len: 2 }, io::ErrorKind::InvalidInput)]
    #[case(RingError::InvalidOffset { offset: 5, len: 5 }, io::ErrorKind::InvalidInput)]
    #[case(RingError::Cancelled, io::ErrorKind::Other)]
    fn io_error_kind(#[case] error: RingError, #[case] kind: io::ErrorKind) {
        let io_error = io::Error::from(error.clone());
        assert_eq!(io_error.kind(), kind);
        assert_eq!(io_error.to_string(), error.to_string());
    }
}
