//! # mkvkit
//!
//! EBML and Matroska/WebM container engine.
//!
//! This crate provides:
//! - **EBML primitives** - variable-length integers, element IDs and typed values
//! - **Element tree** - a schema-aware document model with validation and padded rendering
//! - **Demuxer** - packets, tracks, chapters, tags, attachments and cues from a file
//! - **Muxer** - clusters, lacing, cues, seek head and track statistics
//! - **Merge sessions** - several inputs, appending and timestamp rewriting
//! - **Editor** - in-place changes to level 1 elements of an existing file
//!
//! ## Example: Reading packets
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use mkvkit::MkvDemuxer;
//!
//! let file = BufReader::new(File::open("video.mkv").unwrap());
//! let mut demuxer = MkvDemuxer::open(file).unwrap();
//!
//! for track in &demuxer.tracks {
//!     println!("Track {}: {:?} {}", track.number, track.track_type, track.codec());
//! }
//!
//! while let Some(packet) = demuxer.read_packet().unwrap() {
//!     println!("track={} ts={} size={}", packet.track_number, packet.timestamp, packet.size());
//! }
//! ```
//!
//! ## Example: Changing a title in place
//!
//! ```no_run
//! use std::path::Path;
//! use mkvkit::{ChangeKind, PropEdit};
//!
//! let mut edit = PropEdit::new();
//! edit.change(ChangeKind::Set, "title=New title").unwrap();
//! edit.run(Path::new("movie.mkv")).unwrap();
//! ```
//!
//! ## Matroska Element Structure
//!
//! ```text
//! EBML Header
//! Segment
//! ├── SeekHead (index to other level 1 elements)
//! ├── Info (segment information)
//! ├── Tracks
//! │   └── TrackEntry
//! │       ├── Video
//! │       └── Audio
//! ├── Chapters
//! ├── Attachments
//! ├── Tags
//! ├── Cues (seeking index)
//! └── Cluster (media data)
//!     ├── Timestamp
//!     └── SimpleBlock / BlockGroup
//! ```

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod analyzer;
pub mod attachments;
pub mod block;
pub mod chapters;
pub mod cluster;
pub mod cues;
pub mod demuxer;
pub mod diagnostics;
pub mod ebml;
pub mod elements;
pub mod error;
pub mod extract;
pub mod info;
pub mod muxer;
pub mod packetizer;
pub mod propedit;
pub mod scan;
pub mod schema;
pub mod seekhead;
pub mod session;
pub mod statistics;
pub mod tags;
pub mod timestamps;
pub mod track;
pub mod tree;
pub mod uid;
pub mod webm;

// Re-export main types
pub use analyzer::{Analyzer, EditTarget};
pub use attachments::{AttachedFile, Attachments};
pub use block::{Block, BlockFlags, Lacing};
pub use chapters::{ChapterAtom, ChapterDisplay, Chapters, EditionEntry};
pub use cluster::{ClusterOptions, CueStrategy};
pub use cues::{CuePoint, CueTrackPosition, Cues};
pub use demuxer::MkvDemuxer;
pub use diagnostics::{Diagnostics, Warning};
pub use ebml::{EbmlHeader, ElementHeader};
pub use elements::TrackType;
pub use error::{MkvError, Result};
pub use extract::{cuesheet, extract_tracks, ExtractedTrack, TrackFormat, TrackOutput};
pub use info::SegmentInfo;
pub use muxer::{MkvMuxer, MuxerConfig};
pub use packetizer::{Packetizer, TimestampSync};
pub use propedit::{ChangeKind, EditScope, PropEdit, PropEditReport, TrackSelector};
pub use seekhead::SeekHead;
pub use session::{
    InputConfig, MatroskaSource, MemorySource, MergeConfig, MergeReport, MuxSession, PacketSource,
    TrackOptions,
};
pub use tags::{SimpleTag, Tag, Tags, Targets};
pub use track::{AudioSettings, ContentCompression, TrackEntry, VideoSettings};
pub use tree::{Node, Value};

/// Check if data starts with the EBML header signature.
pub fn is_mkv_signature(data: &[u8]) -> bool {
    data.len() >= 4 && data[0..4] == [0x1A, 0x45, 0xDF, 0xA3]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_mkv_signature() {
        assert!(is_mkv_signature(&[0x1A, 0x45, 0xDF, 0xA3]));
        assert!(is_mkv_signature(&[0x1A, 0x45, 0xDF, 0xA3, 0x01, 0x00]));

        assert!(!is_mkv_signature(&[0x00, 0x00, 0x00, 0x00]));
        assert!(!is_mkv_signature(&[0x1A, 0x45, 0xDF]));
        assert!(!is_mkv_signature(&[]));
    }
}
