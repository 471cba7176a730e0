//! Collected warnings.
//!
//! Recoverable problems are logged with `tracing::warn!` and also recorded
//! here, so callers can report them or pick an exit code.

use crate::error::MkvError;
use std::fmt;
use tracing::warn;

/// One recoverable problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Byte offset in the input, if the problem is tied to one.
    pub offset: Option<u64>,
    pub track_number: Option<u64>,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(track) = self.track_number {
            write!(f, "track {track}: ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(offset) = self.offset {
            write!(f, " (at offset {offset})")?;
        }
        Ok(())
    }
}

/// Warning channel.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Warning {
            offset: None,
            track_number: None,
            message: message.into(),
        });
    }

    pub fn warn_at(&mut self, offset: u64, message: impl Into<String>) {
        self.push(Warning {
            offset: Some(offset),
            track_number: None,
            message: message.into(),
        });
    }

    pub fn warn_track(&mut self, track_number: u64, message: impl Into<String>) {
        self.push(Warning {
            offset: None,
            track_number: Some(track_number),
            message: message.into(),
        });
    }

    /// Record a recoverable error.
    pub fn error(&mut self, error: &MkvError) {
        let offset = match error {
            MkvError::MalformedVint { offset, .. }
            | MkvError::MalformedId { offset, .. }
            | MkvError::StructuralCorruption { offset, .. }
            | MkvError::InvalidBlock { offset, .. } => Some(*offset),
            _ => None,
        };
        let track_number = match error {
            MkvError::CodecConfiguration { track_number, .. } => Some(*track_number),
            _ => None,
        };
        self.push(Warning {
            offset,
            track_number,
            message: error.to_string(),
        });
    }

    fn push(&mut self, warning: Warning) {
        match (warning.offset, warning.track_number) {
            (Some(offset), _) => warn!(offset, "{}", warning.message),
            (None, Some(track)) => warn!(track, "{}", warning.message),
            (None, None) => warn!("{}", warning.message),
        }
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Move all warnings of `other` into this channel without logging them again.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}
