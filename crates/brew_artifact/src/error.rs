//! Error types for artifact construction and access.

use crate::artifact::EvalError;

/// Errors raised by [`Artifact`](crate::Artifact) construction and access.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// A lazy artifact was built without its fingerprint or evaluator.
    #[error("lazy artifact '{name}' is missing {missing}")]
    Configuration {
        /// The artifact name.
        name: String,
        /// Which required parts were not supplied.
        missing: String,
    },

    /// A value was assigned to a lazy artifact.
    #[error("cannot set the value of lazy artifact '{name}'")]
    InvalidOperation {
        /// The artifact name.
        name: String,
    },

    /// The evaluator of a lazy artifact failed.
    #[error("evaluating artifact '{name}' failed: {source}")]
    Evaluation {
        /// The artifact name.
        name: String,
        /// The error returned by the evaluator.
        source: EvalError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_display() {
        let err = ArtifactError::Configuration {
            name: "morse##audio_fixed##training".to_string(),
            missing: "a fingerprint".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "lazy artifact 'morse##audio_fixed##training' is missing a fingerprint"
        );
    }

    #[test]
    fn invalid_operation_display() {
        let err = ArtifactError::InvalidOperation {
            name: "x".to_string(),
        };
        assert!(err.to_string().contains("cannot set the value"));
    }

    #[test]
    fn evaluation_display_includes_source() {
        let err = ArtifactError::Evaluation {
            name: "x".to_string(),
            source: "disk on fire".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'x'"));
        assert!(msg.contains("disk on fire"));
    }
}
