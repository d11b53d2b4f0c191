//! # Import Errors
//!
//! Every failure of the weight-import pipeline is fatal to the load call and
//! surfaces as an [`ImportError`]. Errors are grouped into three
//! [`ImportErrorKind`]s so callers can tell fetch problems from translation
//! and structure problems.

use crate::import::validate::StructureReport;
use crate::keys::KeyPath;
use thiserror::Error;

/// Coarse classification of an [`ImportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportErrorKind {
    /// The checkpoint could not be located, downloaded, or decoded.
    Fetch,

    /// A checkpoint key could not be translated into the target namespace.
    Translation,

    /// The translated tree disagrees with the model's expected structure.
    Structure,
}

/// Weight import failure.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Network or disk failure while fetching a checkpoint.
    #[error("failed to fetch weights from {location}: {source}")]
    Fetch {
        /// The URL or path being fetched.
        location: String,

        /// The underlying io failure.
        #[source]
        source: std::io::Error,
    },

    /// The default cache root could not be determined.
    #[error("unable to determine a home directory for the weight cache")]
    MissingHomeDir,

    /// A named prefab or pretrained weight set does not exist.
    #[error("unknown pretrained weights: {0}")]
    UnknownPretrained(String),

    /// The checkpoint file could not be decoded.
    #[error("failed to decode checkpoint {location}: {message}")]
    Decode {
        /// The file being decoded.
        location: String,

        /// Decoder message.
        message: String,
    },

    /// Checkpoint keys survived pruning but matched no rename rule.
    #[error("checkpoint keys matched no rename rule: {}", .keys.join(", "))]
    UnmappedKeys {
        /// The unmatched foreign keys, sorted.
        keys: Vec<String>,
    },

    /// Two foreign keys were renamed onto the same target key.
    #[error("checkpoint keys {first:?} and {second:?} both translate to {target}")]
    DuplicateTarget {
        /// The contested target key.
        target: KeyPath,

        /// The first foreign key.
        first: String,

        /// The second foreign key.
        second: String,
    },

    /// A layout transform does not fit the tensor it was attached to.
    #[error("invalid layout transform for {key:?}: {message}")]
    InvalidLayout {
        /// The foreign key of the tensor.
        key: String,

        /// What was wrong.
        message: String,
    },

    /// A declarative rename rule could not be compiled.
    #[error("invalid rename rule: {0}")]
    InvalidRule(String),

    /// The translated parameter tree does not match the expected structure.
    #[error("structural mismatch:\n{0}")]
    StructuralMismatch(StructureReport),
}

impl ImportError {
    /// The coarse kind of this error.
    pub fn kind(&self) -> ImportErrorKind {
        match self {
            ImportError::Fetch { .. }
            | ImportError::MissingHomeDir
            | ImportError::UnknownPretrained(_)
            | ImportError::Decode { .. } => ImportErrorKind::Fetch,
            ImportError::UnmappedKeys { .. }
            | ImportError::DuplicateTarget { .. }
            | ImportError::InvalidLayout { .. }
            | ImportError::InvalidRule(_) => ImportErrorKind::Translation,
            ImportError::StructuralMismatch(_) => ImportErrorKind::Structure,
        }
    }

    /// Build a [`ImportError::Decode`].
    pub fn decode<L: ToString, M: ToString>(
        location: L,
        message: M,
    ) -> Self {
        ImportError::Decode {
            location: location.to_string(),
            message: message.to_string(),
        }
    }

    /// Build a [`ImportError::Fetch`].
    pub fn fetch<L: ToString>(
        location: L,
        source: std::io::Error,
    ) -> Self {
        ImportError::Fetch {
            location: location.to_string(),
            source,
        }
    }
}

/// Result alias for the import pipeline.
pub type ImportResult<T> = Result<T, ImportError>;
