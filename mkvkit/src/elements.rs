//! Matroska element IDs, track types and codec IDs.
//!
//! IDs are stored with their VINT marker bits, exactly as they appear in a file.
//! Names, parents and cardinality live in [`crate::schema`].

// EBML header
pub const EBML: u32 = 0x1A45DFA3;
pub const EBML_VERSION: u32 = 0x4286;
pub const EBML_READ_VERSION: u32 = 0x42F7;
pub const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
pub const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
pub const DOC_TYPE: u32 = 0x4282;
pub const DOC_TYPE_VERSION: u32 = 0x4287;
pub const DOC_TYPE_READ_VERSION: u32 = 0x4285;

// Global elements, valid inside any master.
pub const VOID: u32 = 0xEC;
pub const CRC32: u32 = 0xBF;

/// Segment (the root container for all Matroska data).
pub const SEGMENT: u32 = 0x18538067;

// Meta seek information
pub const SEEK_HEAD: u32 = 0x114D9B74;
pub const SEEK: u32 = 0x4DBB;
pub const SEEK_ID: u32 = 0x53AB;
pub const SEEK_POSITION: u32 = 0x53AC;

// Segment information
pub const INFO: u32 = 0x1549A966;
pub const SEGMENT_UID: u32 = 0x73A4;
pub const SEGMENT_FILENAME: u32 = 0x7384;
pub const PREV_UID: u32 = 0x3CB923;
pub const PREV_FILENAME: u32 = 0x3C83AB;
pub const NEXT_UID: u32 = 0x3EB923;
pub const NEXT_FILENAME: u32 = 0x3E83BB;
pub const SEGMENT_FAMILY: u32 = 0x4444;
pub const CHAPTER_TRANSLATE: u32 = 0x6924;
pub const CHAPTER_TRANSLATE_EDITION_UID: u32 = 0x69FC;
pub const CHAPTER_TRANSLATE_CODEC: u32 = 0x69BF;
pub const CHAPTER_TRANSLATE_ID: u32 = 0x69A5;
/// Nanoseconds per timestamp tick, 1 000 000 unless stated otherwise.
pub const TIMESTAMP_SCALE: u32 = 0x2AD7B1;
/// Segment duration in ticks (float).
pub const DURATION: u32 = 0x4489;
/// Nanoseconds since 2001-01-01T00:00:00 UTC.
pub const DATE_UTC: u32 = 0x4461;
pub const TITLE: u32 = 0x7BA9;
pub const MUXING_APP: u32 = 0x4D80;
pub const WRITING_APP: u32 = 0x5741;

// Cluster
pub const CLUSTER: u32 = 0x1F43B675;
pub const TIMESTAMP: u32 = 0xE7;
pub const SILENT_TRACKS: u32 = 0x5854;
pub const SILENT_TRACK_NUMBER: u32 = 0x58D7;
pub const POSITION: u32 = 0xA7;
pub const PREV_SIZE: u32 = 0xAB;
pub const SIMPLE_BLOCK: u32 = 0xA3;
pub const BLOCK_GROUP: u32 = 0xA0;
pub const BLOCK: u32 = 0xA1;
pub const BLOCK_ADDITIONS: u32 = 0x75A1;
pub const BLOCK_MORE: u32 = 0xA6;
pub const BLOCK_ADD_ID: u32 = 0xEE;
pub const BLOCK_ADDITIONAL: u32 = 0xA5;
pub const BLOCK_DURATION: u32 = 0x9B;
pub const REFERENCE_PRIORITY: u32 = 0xFA;
/// Signed offset (in ticks) from the block to a referenced frame.
pub const REFERENCE_BLOCK: u32 = 0xFB;
pub const CODEC_STATE: u32 = 0xA4;
pub const DISCARD_PADDING: u32 = 0x75A2;

// Tracks
pub const TRACKS: u32 = 0x1654AE6B;
pub const TRACK_ENTRY: u32 = 0xAE;
pub const TRACK_NUMBER: u32 = 0xD7;
pub const TRACK_UID: u32 = 0x73C5;
pub const TRACK_TYPE: u32 = 0x83;
pub const FLAG_ENABLED: u32 = 0xB9;
pub const FLAG_DEFAULT: u32 = 0x88;
pub const FLAG_FORCED: u32 = 0x55AA;
pub const FLAG_LACING: u32 = 0x9C;
pub const MIN_CACHE: u32 = 0x6DE7;
pub const MAX_CACHE: u32 = 0x6DF8;
pub const DEFAULT_DURATION: u32 = 0x23E383;
pub const TRACK_TIMESTAMP_SCALE: u32 = 0x23314F;
pub const MAX_BLOCK_ADDITION_ID: u32 = 0x55EE;
pub const NAME: u32 = 0x536E;
pub const LANGUAGE: u32 = 0x22B59C;
pub const CODEC_ID: u32 = 0x86;
pub const CODEC_PRIVATE: u32 = 0x63A2;
pub const CODEC_NAME: u32 = 0x258688;
pub const ATTACHMENT_LINK: u32 = 0x7446;
pub const CODEC_DECODE_ALL: u32 = 0xAA;
pub const TRACK_OVERLAY: u32 = 0x6FAB;
pub const CODEC_DELAY: u32 = 0x56AA;
pub const SEEK_PRE_ROLL: u32 = 0x56BB;

// Video
pub const VIDEO: u32 = 0xE0;
pub const FLAG_INTERLACED: u32 = 0x9A;
pub const FIELD_ORDER: u32 = 0x9D;
pub const STEREO_MODE: u32 = 0x53B8;
pub const ALPHA_MODE: u32 = 0x53C0;
pub const PIXEL_WIDTH: u32 = 0xB0;
pub const PIXEL_HEIGHT: u32 = 0xBA;
pub const PIXEL_CROP_BOTTOM: u32 = 0x54AA;
pub const PIXEL_CROP_TOP: u32 = 0x54BB;
pub const PIXEL_CROP_LEFT: u32 = 0x54CC;
pub const PIXEL_CROP_RIGHT: u32 = 0x54DD;
pub const DISPLAY_WIDTH: u32 = 0x54B0;
pub const DISPLAY_HEIGHT: u32 = 0x54BA;
pub const DISPLAY_UNIT: u32 = 0x54B2;
pub const ASPECT_RATIO_TYPE: u32 = 0x54B3;
pub const COLOUR_SPACE: u32 = 0x2EB524;
pub const COLOUR: u32 = 0x55B0;
pub const MATRIX_COEFFICIENTS: u32 = 0x55B1;
pub const BITS_PER_CHANNEL: u32 = 0x55B2;
pub const CHROMA_SUBSAMPLING_HORZ: u32 = 0x55B3;
pub const CHROMA_SUBSAMPLING_VERT: u32 = 0x55B4;
pub const CB_SUBSAMPLING_HORZ: u32 = 0x55B5;
pub const CB_SUBSAMPLING_VERT: u32 = 0x55B6;
pub const CHROMA_SITING_HORZ: u32 = 0x55B7;
pub const CHROMA_SITING_VERT: u32 = 0x55B8;
pub const RANGE: u32 = 0x55B9;
pub const TRANSFER_CHARACTERISTICS: u32 = 0x55BA;
pub const PRIMARIES: u32 = 0x55BB;
pub const MAX_CLL: u32 = 0x55BC;
pub const MAX_FALL: u32 = 0x55BD;
pub const MASTERING_METADATA: u32 = 0x55D0;
pub const PRIMARY_R_CHROMATICITY_X: u32 = 0x55D1;
pub const PRIMARY_R_CHROMATICITY_Y: u32 = 0x55D2;
pub const PRIMARY_G_CHROMATICITY_X: u32 = 0x55D3;
pub const PRIMARY_G_CHROMATICITY_Y: u32 = 0x55D4;
pub const PRIMARY_B_CHROMATICITY_X: u32 = 0x55D5;
pub const PRIMARY_B_CHROMATICITY_Y: u32 = 0x55D6;
pub const WHITE_POINT_CHROMATICITY_X: u32 = 0x55D7;
pub const WHITE_POINT_CHROMATICITY_Y: u32 = 0x55D8;
pub const LUMINANCE_MAX: u32 = 0x55D9;
pub const LUMINANCE_MIN: u32 = 0x55DA;
pub const PROJECTION: u32 = 0x7670;
pub const PROJECTION_TYPE: u32 = 0x7671;
pub const PROJECTION_PRIVATE: u32 = 0x7672;
pub const PROJECTION_POSE_YAW: u32 = 0x7673;
pub const PROJECTION_POSE_PITCH: u32 = 0x7674;
pub const PROJECTION_POSE_ROLL: u32 = 0x7675;

// Audio
pub const AUDIO: u32 = 0xE1;
pub const SAMPLING_FREQUENCY: u32 = 0xB5;
pub const OUTPUT_SAMPLING_FREQUENCY: u32 = 0x78B5;
pub const CHANNELS: u32 = 0x9F;
pub const BIT_DEPTH: u32 = 0x6264;

// Content encoding
pub const CONTENT_ENCODINGS: u32 = 0x6D80;
pub const CONTENT_ENCODING: u32 = 0x6240;
pub const CONTENT_ENCODING_ORDER: u32 = 0x5031;
pub const CONTENT_ENCODING_SCOPE: u32 = 0x5032;
pub const CONTENT_ENCODING_TYPE: u32 = 0x5033;
pub const CONTENT_COMPRESSION: u32 = 0x5034;
pub const CONTENT_COMP_ALGO: u32 = 0x4254;
pub const CONTENT_COMP_SETTINGS: u32 = 0x4255;
pub const CONTENT_ENCRYPTION: u32 = 0x5035;
pub const CONTENT_ENC_ALGO: u32 = 0x47E1;
pub const CONTENT_ENC_KEY_ID: u32 = 0x47E2;

// Cueing data
pub const CUES: u32 = 0x1C53BB6B;
pub const CUE_POINT: u32 = 0xBB;
pub const CUE_TIME: u32 = 0xB3;
pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
pub const CUE_TRACK: u32 = 0xF7;
pub const CUE_CLUSTER_POSITION: u32 = 0xF1;
pub const CUE_RELATIVE_POSITION: u32 = 0xF0;
pub const CUE_DURATION: u32 = 0xB2;
pub const CUE_BLOCK_NUMBER: u32 = 0x5378;
pub const CUE_CODEC_STATE: u32 = 0xEA;

// Attachments
pub const ATTACHMENTS: u32 = 0x1941A469;
pub const ATTACHED_FILE: u32 = 0x61A7;
pub const FILE_DESCRIPTION: u32 = 0x467E;
pub const FILE_NAME: u32 = 0x466E;
pub const FILE_MEDIA_TYPE: u32 = 0x4660;
pub const FILE_DATA: u32 = 0x465C;
pub const FILE_UID: u32 = 0x46AE;

// Chapters
pub const CHAPTERS: u32 = 0x1043A770;
pub const EDITION_ENTRY: u32 = 0x45B9;
pub const EDITION_UID: u32 = 0x45BC;
pub const EDITION_FLAG_HIDDEN: u32 = 0x45BD;
pub const EDITION_FLAG_DEFAULT: u32 = 0x45DB;
pub const EDITION_FLAG_ORDERED: u32 = 0x45DD;
/// Chapter atom; atoms nest inside atoms.
pub const CHAPTER_ATOM: u32 = 0xB6;
pub const CHAPTER_UID: u32 = 0x73C4;
pub const CHAPTER_STRING_UID: u32 = 0x5654;
pub const CHAPTER_TIME_START: u32 = 0x91;
pub const CHAPTER_TIME_END: u32 = 0x92;
pub const CHAPTER_FLAG_HIDDEN: u32 = 0x98;
pub const CHAPTER_FLAG_ENABLED: u32 = 0x4598;
pub const CHAPTER_SEGMENT_UID: u32 = 0x6E67;
pub const CHAPTER_SEGMENT_EDITION_UID: u32 = 0x6EBC;
pub const CHAPTER_PHYSICAL_EQUIV: u32 = 0x63C3;
pub const CHAPTER_TRACK: u32 = 0x8F;
pub const CHAPTER_TRACK_UID: u32 = 0x89;
pub const CHAPTER_DISPLAY: u32 = 0x80;
pub const CHAP_STRING: u32 = 0x85;
pub const CHAP_LANGUAGE: u32 = 0x437C;
pub const CHAP_COUNTRY: u32 = 0x437E;
pub const CHAP_PROCESS: u32 = 0x6944;
pub const CHAP_PROCESS_CODEC_ID: u32 = 0x6955;
pub const CHAP_PROCESS_PRIVATE: u32 = 0x450D;
pub const CHAP_PROCESS_COMMAND: u32 = 0x6911;
pub const CHAP_PROCESS_TIME: u32 = 0x6922;
pub const CHAP_PROCESS_DATA: u32 = 0x6933;

// Tagging
pub const TAGS: u32 = 0x1254C367;
pub const TAG: u32 = 0x7373;
pub const TARGETS: u32 = 0x63C0;
pub const TARGET_TYPE_VALUE: u32 = 0x68CA;
pub const TARGET_TYPE: u32 = 0x63CA;
pub const TAG_TRACK_UID: u32 = 0x63C5;
pub const TAG_EDITION_UID: u32 = 0x63C9;
pub const TAG_CHAPTER_UID: u32 = 0x63C4;
pub const TAG_ATTACHMENT_UID: u32 = 0x63C6;
/// Simple tag; simple tags nest inside simple tags.
pub const SIMPLE_TAG: u32 = 0x67C8;
pub const TAG_NAME: u32 = 0x45A3;
pub const TAG_LANGUAGE: u32 = 0x447A;
pub const TAG_DEFAULT: u32 = 0x4484;
pub const TAG_STRING: u32 = 0x4487;
pub const TAG_BINARY: u32 = 0x4485;

/// IDs allowed directly under the Segment.
pub const LEVEL1_IDS: [u32; 8] = [
    SEEK_HEAD,
    INFO,
    TRACKS,
    CLUSTER,
    CUES,
    ATTACHMENTS,
    CHAPTERS,
    TAGS,
];

/// Whether `id` is a level-1 (Segment child) element ID.
pub fn is_level1(id: u32) -> bool {
    LEVEL1_IDS.contains(&id)
}

/// Matroska track type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum TrackType {
    Video,
    Audio,
    Complex,
    Logo,
    Subtitle,
    Buttons,
    Control,
    Metadata,
}

impl TrackType {
    /// Value stored in the TrackType element.
    pub fn to_u64(self) -> u64 {
        match self {
            TrackType::Video => 1,
            TrackType::Audio => 2,
            TrackType::Complex => 3,
            TrackType::Logo => 0x10,
            TrackType::Subtitle => 0x11,
            TrackType::Buttons => 0x12,
            TrackType::Control => 0x20,
            TrackType::Metadata => 0x21,
        }
    }

    pub fn from_u64(value: u64) -> Option<Self> {
        Some(match value {
            1 => TrackType::Video,
            2 => TrackType::Audio,
            3 => TrackType::Complex,
            0x10 => TrackType::Logo,
            0x11 => TrackType::Subtitle,
            0x12 => TrackType::Buttons,
            0x20 => TrackType::Control,
            0x21 => TrackType::Metadata,
            _ => return None,
        })
    }

    /// Single-letter selector used by `vN`/`aN`/`sN`/`bN`.
    pub fn selector_char(self) -> Option<char> {
        match self {
            TrackType::Video => Some('v'),
            TrackType::Audio => Some('a'),
            TrackType::Subtitle => Some('s'),
            TrackType::Buttons => Some('b'),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TrackType::Video => "video",
            TrackType::Audio => "audio",
            TrackType::Complex => "complex",
            TrackType::Logo => "logo",
            TrackType::Subtitle => "subtitles",
            TrackType::Buttons => "buttons",
            TrackType::Control => "control",
            TrackType::Metadata => "metadata",
        }
    }
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Common codec ID strings.
pub mod codec_ids {
    pub const V_VP8: &str = "V_VP8";
    pub const V_VP9: &str = "V_VP9";
    pub const V_AV1: &str = "V_AV1";
    pub const V_MPEG4_ISO_AVC: &str = "V_MPEG4/ISO/AVC";

    pub const A_OPUS: &str = "A_OPUS";
    pub const A_VORBIS: &str = "A_VORBIS";
    pub const A_AC3: &str = "A_AC3";
    pub const A_PCM_INT_LIT: &str = "A_PCM/INT/LIT";

    pub const S_TEXT_UTF8: &str = "S_TEXT/UTF8";
    pub const S_TEXT_ASCII: &str = "S_TEXT/ASCII";
    pub const S_TEXT_WEBVTT: &str = "S_TEXT/WEBVTT";

    pub const D_WEBVTT_SUBTITLES: &str = "D_WEBVTT/SUBTITLES";
    pub const D_WEBVTT_CAPTIONS: &str = "D_WEBVTT/CAPTIONS";
    pub const D_WEBVTT_DESCRIPTIONS: &str = "D_WEBVTT/DESCRIPTIONS";
    pub const D_WEBVTT_METADATA: &str = "D_WEBVTT/METADATA";
}

/// Check if a codec ID may appear in a WebM file.
pub fn is_webm_compatible_codec(codec_id: &str) -> bool {
    matches!(
        codec_id,
        codec_ids::V_VP8
            | codec_ids::V_VP9
            | codec_ids::V_AV1
            | codec_ids::A_OPUS
            | codec_ids::A_VORBIS
            | codec_ids::D_WEBVTT_SUBTITLES
            | codec_ids::D_WEBVTT_CAPTIONS
            | codec_ids::D_WEBVTT_DESCRIPTIONS
            | codec_ids::D_WEBVTT_METADATA
    )
}

/// Whether frames of this codec are plain text subtitles.
pub fn is_text_subtitle_codec(codec_id: &str) -> bool {
    matches!(codec_id, codec_ids::S_TEXT_UTF8 | codec_ids::S_TEXT_ASCII)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_type_roundtrip() {
        for value in [1u64, 2, 3, 0x10, 0x11, 0x12, 0x20, 0x21] {
            let tt = TrackType::from_u64(value).unwrap();
            assert_eq!(tt.to_u64(), value);
        }
        assert_eq!(TrackType::from_u64(7), None);
        assert_eq!(TrackType::Subtitle.selector_char(), Some('s'));
        assert_eq!(TrackType::Logo.selector_char(), None);
    }

    #[test]
    fn test_webm_compatible_codecs() {
        assert!(is_webm_compatible_codec(codec_ids::V_VP9));
        assert!(is_webm_compatible_codec(codec_ids::A_OPUS));
        assert!(is_webm_compatible_codec(codec_ids::D_WEBVTT_SUBTITLES));
        assert!(!is_webm_compatible_codec(codec_ids::V_MPEG4_ISO_AVC));
        assert!(!is_webm_compatible_codec(codec_ids::S_TEXT_UTF8));
        for codec in [
            codec_ids::V_VP8,
            codec_ids::V_AV1,
            codec_ids::A_VORBIS,
            codec_ids::D_WEBVTT_CAPTIONS,
            codec_ids::D_WEBVTT_DESCRIPTIONS,
            codec_ids::D_WEBVTT_METADATA,
        ] {
            assert!(is_webm_compatible_codec(codec), "{codec}");
        }
        assert!(is_text_subtitle_codec(codec_ids::S_TEXT_ASCII));
        assert!(!is_text_subtitle_codec(codec_ids::S_TEXT_WEBVTT));
    }

    #[test]
    fn test_level1_ids() {
        assert!(is_level1(CLUSTER));
        assert!(is_level1(SEEK_HEAD));
        assert!(!is_level1(SEGMENT));
        assert!(!is_level1(VOID));
    }
}
