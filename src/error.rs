//! Error types for package decoding.
//!
//! Every failure is terminal for the decode call that raised it. The only
//! conditions that are tolerated (an empty media manifest, a manifest that
//! disagrees with the archive) never reach this type; they are reported
//! through [`MediaReport`](crate::media::MediaReport) instead.

use thiserror::Error;

/// The error type for all decoding operations in this crate.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input does not start with a ZIP signature, or no end-of-central-directory
    /// record could be located.
    #[error("Not a valid ZIP container")]
    NotAContainer,

    /// A named entry was requested that the archive does not contain.
    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),

    /// The ZIP directory or an entry's local data is damaged or uses an unsupported feature.
    #[error("Invalid container: {0}")]
    Container(String),

    /// A Zstandard frame was detected but could not be decompressed.
    #[error("Decompression failed: {0}")]
    DecompressionError(String),

    /// Neither entry names nor store inspection identified a collection.
    #[error("Unrecognized collection: no legacy or modern collection database found")]
    UnrecognizedCollection,

    /// A notetype, field or template configuration blob failed to decode.
    #[error("Malformed {kind} config blob: {reason}")]
    MalformedConfigBlob { kind: &'static str, reason: String },

    /// The media manifest could not be decoded as JSON or protobuf.
    #[error("Malformed media manifest: {0}")]
    MalformedMediaManifest(String),

    /// A legacy note references a model id that is not defined in `col.models`.
    #[error("Note references unknown model {0}")]
    ModelNotFound(String),

    /// A modern note references a notetype id that has no template group.
    #[error("Note references notetype {0} which has no templates")]
    TemplateGroupNotFound(String),

    /// The legacy `col.models` / `col.decks` JSON does not match the expected shape.
    #[error("Invalid legacy model JSON: {0}")]
    InvalidLegacyModelJson(String),

    /// The tabular store failed to open or to run a query.
    #[error("Collection store error: {0}")]
    Store(String),

    /// A media extraction task panicked or was cancelled.
    #[error("Media task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for DecodeError {
    fn from(error: sqlx::Error) -> Self {
        DecodeError::Store(error.to_string())
    }
}

/// A convenience `Result` type alias using the crate's [`DecodeError`].
pub type Result<T> = std::result::Result<T, DecodeError>;
