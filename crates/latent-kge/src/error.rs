use crate::vocab::Kind;
use thiserror::Error;

/// Errors that can occur in latent-kge.
#[derive(Error, Debug)]
pub enum Error {
    /// Identifier absent from the entity or relation vocabulary.
    #[error("Unknown {kind}: {id}")]
    UnknownIdentifier { kind: Kind, id: String },
    /// Identifier already present where a new one was required.
    #[error("Duplicate {kind}: {id}")]
    DuplicateIdentifier { kind: Kind, id: String },
    /// Vector length does not match the table's row width.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    /// Row index beyond the end of an embedding table.
    #[error("{kind} index {index} out of range (table has {len} rows)")]
    IndexOutOfRange { kind: Kind, index: usize, len: usize },
    /// Approximation requested without supporting triples.
    #[error("Insufficient evidence: {0}")]
    InsufficientEvidence(String),
    /// Snapshot missing, corrupt, or incompatible.
    #[error("Persistence error: {0}")]
    Persistence(String),
    /// Model used for inference before `fit`.
    #[error("Model is not fitted")]
    NotFitted,
    /// Malformed caller input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Hyperparameters rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unknown(kind: Kind, id: impl Into<String>) -> Self {
        Self::UnknownIdentifier {
            kind,
            id: id.into(),
        }
    }
}

/// Result type alias for latent-kge.
pub type Result<T> = std::result::Result<T, Error>;
