//! Error types shared by the mkvkit crates.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A timestamp string could not be parsed.
    #[error("Invalid timestamp '{input}': {message}")]
    InvalidTimestamp {
        /// The offending input.
        input: String,
        /// What was wrong with it.
        message: String,
    },

    /// A packet violates a structural requirement.
    #[error("Invalid packet for track {track_number}: {message}")]
    InvalidPacket {
        /// Track the packet belongs to.
        track_number: u64,
        /// What was wrong with it.
        message: String,
    },

    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the core Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for an [`Error::InvalidTimestamp`].
    pub fn invalid_timestamp(input: &str, message: impl Into<String>) -> Self {
        Error::InvalidTimestamp {
            input: input.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_timestamp("xx", "no digits");
        assert_eq!(err.to_string(), "Invalid timestamp 'xx': no digits");

        let err = Error::InvalidPacket {
            track_number: 3,
            message: "negative timestamp".to_string(),
        };
        assert!(err.to_string().contains("track 3"));
    }
}
