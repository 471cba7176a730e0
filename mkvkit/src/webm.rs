//! WebM subset support.
//!
//! WebM is a subset of Matroska that only supports specific codecs:
//! - Video: VP8, VP9, AV1
//! - Audio: Vorbis, Opus
//! - Subtitles: WebVTT
//!
//! Chapters and tags are limited to their basic elements as well.

use crate::elements::{self, *};
use crate::error::{MkvError, Result};
use crate::track::TrackEntry;
use crate::tree::Node;
use tracing::debug;

/// Chapter and tag elements a WebM file must not contain.
const WEBM_UNSUPPORTED: &[u32] = &[
    EDITION_FLAG_HIDDEN,
    EDITION_FLAG_DEFAULT,
    EDITION_FLAG_ORDERED,
    CHAPTER_FLAG_HIDDEN,
    CHAPTER_FLAG_ENABLED,
    CHAPTER_SEGMENT_UID,
    CHAPTER_SEGMENT_EDITION_UID,
    CHAPTER_PHYSICAL_EQUIV,
    CHAPTER_TRACK,
    CHAP_PROCESS,
    TAG_EDITION_UID,
    TAG_CHAPTER_UID,
    TAG_ATTACHMENT_UID,
];

/// Check if a Matroska codec ID is WebM-compatible.
pub fn is_webm_codec_id(codec_id: &str) -> bool {
    elements::is_webm_compatible_codec(codec_id) || codec_id == codec_ids::S_TEXT_WEBVTT
}

/// Whether an element may appear in a WebM file.
pub fn is_webm_element(id: u32) -> bool {
    !WEBM_UNSUPPORTED.contains(&id)
}

/// Validate that a track is WebM-compatible.
pub fn validate_track(track: &TrackEntry) -> Result<()> {
    let codec_id = track.codec();
    if !is_webm_codec_id(codec_id) {
        return Err(MkvError::CodecConfiguration {
            track_number: track.number,
            codec_id: codec_id.to_string(),
            message: "codec is not allowed in WebM files".to_string(),
        });
    }
    if track.compression.is_some() {
        return Err(MkvError::CodecConfiguration {
            track_number: track.number,
            codec_id: codec_id.to_string(),
            message: "content compression is not allowed in WebM files".to_string(),
        });
    }
    Ok(())
}

/// Remove every descendant of `node` that WebM does not allow. Returns the
/// number of removed elements.
pub fn strip_unsupported(node: &mut Node) -> usize {
    let Some(children) = node.children_mut() else {
        return 0;
    };
    let before = children.len();
    children.retain(|child| is_webm_element(child.id));
    let mut removed = before - children.len();
    for child in children.iter_mut() {
        removed += strip_unsupported(child);
    }
    if removed > 0 {
        debug!(id = format_args!("0x{:X}", node.id), removed, "Stripped elements not allowed in WebM");
    }
    removed
}
