//! Error types and result alias.
//!
//! Plexus is a deterministic function of the command log: nothing is retried
//! locally and nothing is recovered in place. Every failure is surfaced
//! through the operation's future (or, for streaming operations, through the
//! stream handler's `error` terminal) and classified here.

use thiserror::Error;

/// Common Plexus error conditions.
#[derive(Debug, Error)]
pub enum PlexusError {
    /// Envelope or payload bytes were malformed, or a sub-kind arrived on a
    /// path that cannot carry it (e.g. a metadata request on the command
    /// path). The consensus layer is expected to treat this as a wire bug,
    /// not a recoverable condition.
    #[error("malformed request: {message}")]
    Decode { message: String },

    /// A streaming query addressed a service that does not exist.
    #[error("unknown service: {name} ({service_type})")]
    UnknownService { name: String, service_type: String },

    /// A create or restore referenced a type tag with no registered factory.
    ///
    /// Fatal: a replica without the type cannot deterministically continue.
    #[error("unknown service type: {type_tag}")]
    UnknownType { type_tag: String },

    /// A primitive's apply failed. Propagated as-is; determinism requires
    /// every replica to see the same failure on the same inputs.
    #[error("service error: {message}")]
    Service { message: String },

    /// Underlying snapshot/restore stream failure. A partial snapshot is
    /// invalid and must be discarded by the consensus layer.
    #[error("snapshot stream error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlexusError {
    /// Create a Decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a Service error.
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }

    /// Create an UnknownService error for the given identity.
    pub fn unknown_service(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self::UnknownService {
            name: name.into(),
            service_type: service_type.into(),
        }
    }

    /// Create an UnknownType error.
    pub fn unknown_type(type_tag: impl Into<String>) -> Self {
        Self::UnknownType {
            type_tag: type_tag.into(),
        }
    }

    /// Check if this error is fatal to the manager.
    ///
    /// An unregistered type is a configuration bug: replicas that lack the
    /// type cannot apply the same log, so the apply loop must halt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownType { .. })
    }
}

impl From<prost::DecodeError> for PlexusError {
    fn from(error: prost::DecodeError) -> Self {
        Self::Decode {
            message: error.to_string(),
        }
    }
}

impl Clone for PlexusError {
    fn clone(&self) -> Self {
        match self {
            Self::Decode { message } => Self::Decode {
                message: message.clone(),
            },
            Self::UnknownService { name, service_type } => Self::UnknownService {
                name: name.clone(),
                service_type: service_type.clone(),
            },
            Self::UnknownType { type_tag } => Self::UnknownType {
                type_tag: type_tag.clone(),
            },
            Self::Service { message } => Self::Service {
                message: message.clone(),
            },
            // io::Error is not Clone; preserve the kind and message.
            Self::Io(error) => Self::Io(std::io::Error::new(error.kind(), error.to_string())),
        }
    }
}

/// Result type using PlexusError.
pub type PlexusResult<T> = Result<T, PlexusError>;
