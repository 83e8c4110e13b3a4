//! Typed error hierarchy for the generation orchestrator.
//!
//! One enum per seam: `GenerationError` for orchestrator operations,
//! `SubmitError` for the job-submission call and `StoreError` for the
//! snapshot store.

use thiserror::Error;

/// Errors from orchestrator operations.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Progress channel is not connected; wait for the connection to establish")]
    ChannelUnavailable,

    #[error("Failed to start generation: {source}")]
    StartRejected {
        #[source]
        source: SubmitError,
    },

    #[error("Orchestrator state lock poisoned")]
    LockPoisoned,
}

/// Errors from submitting a generation job to the producer.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server rejected generation request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

/// Errors from the snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Snapshot store I/O failed at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Snapshot store lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_rejected_carries_submit_error() {
        let err = GenerationError::StartRejected {
            source: SubmitError::Rejected {
                status: 422,
                message: "topic too short".to_string(),
            },
        };
        match &err {
            GenerationError::StartRejected {
                source: SubmitError::Rejected { status, message },
            } => {
                assert_eq!(*status, 422);
                assert_eq!(message, "topic too short");
            }
            _ => panic!("Expected StartRejected(Rejected)"),
        }
        assert!(err.to_string().contains("topic too short"));
    }

    #[test]
    fn store_io_error_carries_path() {
        let path = std::path::PathBuf::from("/state/snapshot.json");
        let err = StoreError::Io {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        match &err {
            StoreError::Io { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected Io"),
        }
        assert!(err.to_string().contains("/state/snapshot.json"));
    }

    #[test]
    fn channel_unavailable_is_matchable() {
        let err = GenerationError::ChannelUnavailable;
        assert!(matches!(err, GenerationError::ChannelUnavailable));
        assert!(err.to_string().contains("not connected"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&GenerationError::LockPoisoned);
        assert_std_error(&SubmitError::InvalidResponse("x".into()));
        assert_std_error(&StoreError::LockPoisoned);
    }
}
