//! Error types for the benchmark harness.
//!
//! Kernel misbehavior (unparseable output, non-zero exit, deadline expiry)
//! is deliberately NOT an error: it is carried as `Measurement::Failed` so
//! a sweep keeps going when a single probe goes wrong. Only resource
//! acquisition and parameter-contract violations propagate through this
//! type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the benchmark harness.
#[derive(Debug, Error)]
pub enum MedirError {
    /// A sweep or workload parameter violated its contract.
    ///
    /// Raised before any external process is invoked: non-positive
    /// dimensions, zero trial count, empty or unordered parameter range.
    #[error("invalid parameter: {reason}")]
    InvalidParameter {
        /// Description of the violated contract
        reason: String,
    },

    /// The scoped temporary input for a probe could not be created or
    /// written. Fatal for the trial, never folded into a sentinel row.
    #[error("failed to stage workload input: {source}")]
    WorkloadStage {
        /// Underlying IO failure
        #[source]
        source: io::Error,
    },

    /// The external kernel executable could not be spawned or waited on.
    #[error("failed to launch probe '{command}': {source}")]
    ProbeLaunch {
        /// The command that failed to start
        command: String,
        /// Underlying IO failure
        #[source]
        source: io::Error,
    },

    /// A rendered artifact could not be written to disk.
    #[error("failed to write artifact {path}: {source}")]
    ArtifactWrite {
        /// Destination path of the artifact
        path: PathBuf,
        /// Underlying IO failure
        #[source]
        source: io::Error,
    },

    /// Wire-protocol text could not be parsed back into a workload.
    #[error("malformed wire input: {reason}")]
    WireParse {
        /// Description of the malformed section
        reason: String,
    },

    /// Result serialization failed.
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MedirError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_display() {
        let err = MedirError::InvalidParameter {
            reason: "trials must be >= 1".to_string(),
        };
        assert_eq!(err.to_string(), "invalid parameter: trials must be >= 1");
    }

    #[test]
    fn test_workload_stage_carries_source() {
        let err = MedirError::WorkloadStage {
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("stage workload input"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_probe_launch_names_command() {
        let err = MedirError::ProbeLaunch {
            command: "./attention".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("./attention"));
    }

    #[test]
    fn test_serialize_from_serde_json() {
        let bad = serde_json::from_str::<serde_json::Value>("not json");
        let err: MedirError = bad.unwrap_err().into();
        assert!(matches!(err, MedirError::Serialize(_)));
    }
}
