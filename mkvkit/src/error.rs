//! Error types for EBML/Matroska parsing, writing and editing.
//!
//! Variants follow the container's failure taxonomy: some are fatal to the
//! element being parsed but recoverable at the level-1 scan (see
//! [`MkvError::is_recoverable`]), the rest abort the operation.

use thiserror::Error;

/// Matroska engine error types.
#[derive(Error, Debug)]
pub enum MkvError {
    /// Unreadable variable-length size field.
    #[error("Malformed variable-length integer at offset {offset}: {message}")]
    MalformedVint {
        /// Byte offset of the first byte of the VINT.
        offset: u64,
        /// Description of the problem.
        message: String,
    },

    /// Unreadable element ID.
    #[error("Malformed element ID at offset {offset}: {message}")]
    MalformedId {
        /// Byte offset of the first byte of the ID.
        offset: u64,
        /// Description of the problem.
        message: String,
    },

    /// Element ID not present in the schema.
    #[error("Unknown element ID: 0x{id:X}")]
    UnknownElement {
        /// The unknown element ID value.
        id: u32,
    },

    /// A mandatory element without default value is absent.
    #[error("Missing mandatory element {name} (0x{id:X}) in {parent}")]
    MissingMandatoryElement {
        /// Schema name of the missing element.
        name: &'static str,
        /// ID of the missing element.
        id: u32,
        /// Schema name of the master it is missing from.
        parent: &'static str,
    },

    /// Truncated element or a size that does not fit its parent.
    #[error("Structural corruption at offset {offset}: {message}")]
    StructuralCorruption {
        /// Byte offset where the corruption was detected.
        offset: u64,
        /// Description of the problem.
        message: String,
    },

    /// EBML or document type read-version beyond what is supported.
    #[error("Unsupported {what} version {version} (supported up to {supported})")]
    UnsupportedVersion {
        /// Which version field.
        what: &'static str,
        /// Version found in the file.
        version: u64,
        /// Highest supported version.
        supported: u64,
    },

    /// The file does not start with an EBML head or the document type is foreign.
    #[error("Invalid EBML header: {0}")]
    InvalidEbmlHeader(String),

    /// No Segment element at level 0.
    #[error("No Segment element found")]
    NoSegmentFound,

    /// Track-local codec setup problem.
    #[error("Codec configuration error on track {track_number} ({codec_id}): {message}")]
    CodecConfiguration {
        /// Track number.
        track_number: u64,
        /// Codec ID of the track.
        codec_id: String,
        /// Description of the problem.
        message: String,
    },

    /// Track headers are missing a field the writer cannot default.
    #[error("Track {track_number} header is incomplete: {field} is not set")]
    IncompleteTrackHeader {
        /// Track number.
        track_number: u64,
        /// The missing field.
        field: &'static str,
    },

    /// Invalid block structure.
    #[error("Invalid block at offset {offset}: {message}")]
    InvalidBlock {
        /// Byte offset of the block element.
        offset: u64,
        /// Description of the problem.
        message: String,
    },

    /// Invalid lacing structure.
    #[error("Invalid lacing: {0}")]
    InvalidLacing(String),

    /// Track not found.
    #[error("Track not found: {track_number}")]
    TrackNotFound {
        /// Track number that was not found.
        track_number: u64,
    },

    /// Operation not allowed in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// External timestamp file could not be used.
    #[error("Invalid timestamp file '{file}' (line {line}): {message}")]
    InvalidTimestampFile {
        /// File name.
        file: String,
        /// One-based line number, 0 when not line-specific.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// Unknown property or unparsable property value.
    #[error("Invalid property '{name}': {message}")]
    InvalidProperty {
        /// Property name as given by the user.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// Chapter input could not be parsed.
    #[error("Invalid chapters (line {line}): {message}")]
    InvalidChapters {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// A rendered element does not fit the space reserved for it.
    #[error("Element 0x{id:X} needs {needed} bytes but only {available} are reserved")]
    ElementTooLarge {
        /// Element ID.
        id: u32,
        /// Bytes needed.
        needed: u64,
        /// Bytes available.
        available: u64,
    },

    /// Recursion limit exceeded.
    #[error("Recursion limit exceeded at depth {depth}")]
    RecursionLimit {
        /// Depth at which the limit was hit.
        depth: u32,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the shared core types.
    #[error(transparent)]
    Core(#[from] mkvkit_core::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

/// Result type for Matroska operations.
pub type Result<T> = std::result::Result<T, MkvError>;

impl MkvError {
    /// Whether a scan can continue after this error by skipping to the next
    /// level-1 boundary (or, for codec problems, by dropping one track).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MkvError::UnknownElement { .. }
                | MkvError::StructuralCorruption { .. }
                | MkvError::MalformedVint { .. }
                | MkvError::MalformedId { .. }
                | MkvError::InvalidBlock { .. }
                | MkvError::InvalidLacing(_)
                | MkvError::CodecConfiguration { .. }
        )
    }

    /// Whether the error is an unexpected end of input.
    pub fn is_eof(&self) -> bool {
        matches!(self, MkvError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }

    pub(crate) fn corruption(offset: u64, message: impl Into<String>) -> Self {
        MkvError::StructuralCorruption {
            offset,
            message: message.into(),
        }
    }
}

impl From<String> for MkvError {
    fn from(s: String) -> Self {
        MkvError::Other(s)
    }
}

impl From<&str> for MkvError {
    fn from(s: &str) -> Self {
        MkvError::Other(s.to_string())
    }
}
