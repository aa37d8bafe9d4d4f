//! Error taxonomy for NetherScene documents.
//!
//! Every failure aborts the surrounding load or save outright; there is no
//! partial-result return and no internal retry. Conditions the format
//! tolerates (unknown attribute semantics, primitives without materials,
//! excess bone influences) never surface here.

use std::io;
use std::path::PathBuf;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AssetError>;

/// Everything that can go wrong while loading or saving a document.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// The manifest is not valid JSON.
    #[error("JSON parse error at byte {offset}: {source}")]
    Parse {
        offset: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The manifest or container violates a structural rule.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A dictionary was asked for an object before its manifest section was
    /// attached.
    #[error("missing section \"{0}\"")]
    MissingSection(&'static str),

    /// A referenced id has no entry in its manifest section.
    #[error("missing object \"{id}\" in \"{section}\"")]
    MissingObject { section: &'static str, id: String },

    /// A dictionary entry exists but is not a JSON object.
    #[error("object \"{id}\" in \"{section}\" is not a JSON object")]
    MalformedObject { section: &'static str, id: String },

    /// Two objects with the same id exist in the document. The id namespace
    /// is global, not per-dictionary.
    #[error("two objects with the same id \"{0}\" exist in the document")]
    DuplicateId(String),

    /// No decoded region with the given id was registered.
    #[error("no decoded region with id \"{0}\"")]
    UnknownRegion(String),

    /// A file could not be opened, read or written.
    #[error("{context} \"{}\": {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Manifest JSON emission failed.
    #[error("failed to serialize manifest: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl AssetError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        AssetError::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        AssetError::InvalidDocument(message.into())
    }
}
