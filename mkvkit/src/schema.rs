//! Static element schema.
//!
//! One row per element: ID, name, allowed parents, value type, cardinality and
//! default. Row order within a parent is the canonical child order used by
//! [`crate::tree::Node::sort_children`]. The index is built once on first use
//! and is read-only afterwards, so lookups need no synchronisation.

use crate::elements::*;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Pseudo parent ID for level-0 elements (EBML head and Segment).
pub const ROOT: u32 = 0;

/// Value type of an element's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Master,
    UInt,
    SInt,
    Float,
    /// Printable ASCII.
    String,
    Utf8,
    /// Signed nanoseconds since 2001-01-01.
    Date,
    Binary,
}

/// Default value of a leaf element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    UInt(u64),
    SInt(i64),
    Float(f64),
    Str(&'static str),
}

/// One schema row.
#[derive(Debug)]
pub struct SchemaEntry {
    pub id: u32,
    pub name: &'static str,
    /// Masters this element may appear in. Empty for global elements.
    pub parents: &'static [u32],
    pub value_type: ValueType,
    pub mandatory: bool,
    pub multiple: bool,
    pub default: Option<DefaultValue>,
}

impl SchemaEntry {
    pub fn is_master(&self) -> bool {
        self.value_type == ValueType::Master
    }

    /// Recursive elements are mandatory only under their first parent.
    pub fn mandatory_in(&self, parent: u32) -> bool {
        self.mandatory && self.parents.first() == Some(&parent)
    }

    pub fn is_global(&self) -> bool {
        self.parents.is_empty()
    }

    /// Position of this row in the table; children sort by it.
    pub fn order(&self) -> usize {
        index().order.get(&self.id).copied().unwrap_or(usize::MAX)
    }
}

use DefaultValue as D;
use ValueType::*;

const M: bool = true;
const O: bool = false;
const MULTI: bool = true;
const ONE: bool = false;

const fn e(
    id: u32,
    name: &'static str,
    parents: &'static [u32],
    value_type: ValueType,
    mandatory: bool,
    multiple: bool,
    default: Option<DefaultValue>,
) -> SchemaEntry {
    SchemaEntry {
        id,
        name,
        parents,
        value_type,
        mandatory,
        multiple,
        default,
    }
}

static TABLE: &[SchemaEntry] = &[
    // Global
    e(CRC32, "CRC-32", &[], Binary, O, ONE, None),
    e(VOID, "EBMLVoid", &[], Binary, O, MULTI, None),
    // EBML head
    e(EBML, "EBML", &[ROOT], Master, M, ONE, None),
    e(EBML_VERSION, "EBMLVersion", &[EBML], UInt, M, ONE, Some(D::UInt(1))),
    e(EBML_READ_VERSION, "EBMLReadVersion", &[EBML], UInt, M, ONE, Some(D::UInt(1))),
    e(EBML_MAX_ID_LENGTH, "EBMLMaxIDLength", &[EBML], UInt, M, ONE, Some(D::UInt(4))),
    e(EBML_MAX_SIZE_LENGTH, "EBMLMaxSizeLength", &[EBML], UInt, M, ONE, Some(D::UInt(8))),
    e(DOC_TYPE, "DocType", &[EBML], String, M, ONE, Some(D::Str("matroska"))),
    e(DOC_TYPE_VERSION, "DocTypeVersion", &[EBML], UInt, M, ONE, Some(D::UInt(1))),
    e(DOC_TYPE_READ_VERSION, "DocTypeReadVersion", &[EBML], UInt, M, ONE, Some(D::UInt(1))),
    // Segment
    e(SEGMENT, "Segment", &[ROOT], Master, M, MULTI, None),
    // SeekHead
    e(SEEK_HEAD, "SeekHead", &[SEGMENT], Master, O, MULTI, None),
    e(SEEK, "Seek", &[SEEK_HEAD], Master, M, MULTI, None),
    e(SEEK_ID, "SeekID", &[SEEK], Binary, M, ONE, None),
    e(SEEK_POSITION, "SeekPosition", &[SEEK], UInt, M, ONE, None),
    // Info
    e(INFO, "Info", &[SEGMENT], Master, M, MULTI, None),
    e(SEGMENT_UID, "SegmentUID", &[INFO], Binary, O, ONE, None),
    e(SEGMENT_FILENAME, "SegmentFilename", &[INFO], Utf8, O, ONE, None),
    e(PREV_UID, "PrevUID", &[INFO], Binary, O, ONE, None),
    e(PREV_FILENAME, "PrevFilename", &[INFO], Utf8, O, ONE, None),
    e(NEXT_UID, "NextUID", &[INFO], Binary, O, ONE, None),
    e(NEXT_FILENAME, "NextFilename", &[INFO], Utf8, O, ONE, None),
    e(SEGMENT_FAMILY, "SegmentFamily", &[INFO], Binary, O, MULTI, None),
    e(CHAPTER_TRANSLATE, "ChapterTranslate", &[INFO], Master, O, MULTI, None),
    e(CHAPTER_TRANSLATE_EDITION_UID, "ChapterTranslateEditionUID", &[CHAPTER_TRANSLATE], UInt, O, MULTI, None),
    e(CHAPTER_TRANSLATE_CODEC, "ChapterTranslateCodec", &[CHAPTER_TRANSLATE], UInt, M, ONE, None),
    e(CHAPTER_TRANSLATE_ID, "ChapterTranslateID", &[CHAPTER_TRANSLATE], Binary, M, ONE, None),
    e(TIMESTAMP_SCALE, "TimestampScale", &[INFO], UInt, M, ONE, Some(D::UInt(1_000_000))),
    e(DURATION, "Duration", &[INFO], Float, O, ONE, None),
    e(DATE_UTC, "DateUTC", &[INFO], Date, O, ONE, None),
    e(TITLE, "Title", &[INFO], Utf8, O, ONE, None),
    e(MUXING_APP, "MuxingApp", &[INFO], Utf8, M, ONE, None),
    e(WRITING_APP, "WritingApp", &[INFO], Utf8, M, ONE, None),
    // Cluster
    e(CLUSTER, "Cluster", &[SEGMENT], Master, O, MULTI, None),
    e(TIMESTAMP, "Timestamp", &[CLUSTER], UInt, M, ONE, None),
    e(SILENT_TRACKS, "SilentTracks", &[CLUSTER], Master, O, ONE, None),
    e(SILENT_TRACK_NUMBER, "SilentTrackNumber", &[SILENT_TRACKS], UInt, O, MULTI, None),
    e(POSITION, "Position", &[CLUSTER], UInt, O, ONE, None),
    e(PREV_SIZE, "PrevSize", &[CLUSTER], UInt, O, ONE, None),
    e(SIMPLE_BLOCK, "SimpleBlock", &[CLUSTER], Binary, O, MULTI, None),
    e(BLOCK_GROUP, "BlockGroup", &[CLUSTER], Master, O, MULTI, None),
    e(BLOCK, "Block", &[BLOCK_GROUP], Binary, M, ONE, None),
    e(BLOCK_ADDITIONS, "BlockAdditions", &[BLOCK_GROUP], Master, O, ONE, None),
    e(BLOCK_MORE, "BlockMore", &[BLOCK_ADDITIONS], Master, M, MULTI, None),
    e(BLOCK_ADD_ID, "BlockAddID", &[BLOCK_MORE], UInt, M, ONE, Some(D::UInt(1))),
    e(BLOCK_ADDITIONAL, "BlockAdditional", &[BLOCK_MORE], Binary, M, ONE, None),
    e(BLOCK_DURATION, "BlockDuration", &[BLOCK_GROUP], UInt, O, ONE, None),
    e(REFERENCE_PRIORITY, "ReferencePriority", &[BLOCK_GROUP], UInt, M, ONE, Some(D::UInt(0))),
    e(REFERENCE_BLOCK, "ReferenceBlock", &[BLOCK_GROUP], SInt, O, MULTI, None),
    e(CODEC_STATE, "CodecState", &[BLOCK_GROUP], Binary, O, ONE, None),
    e(DISCARD_PADDING, "DiscardPadding", &[BLOCK_GROUP], SInt, O, ONE, None),
    // Tracks
    e(TRACKS, "Tracks", &[SEGMENT], Master, O, MULTI, None),
    e(TRACK_ENTRY, "TrackEntry", &[TRACKS], Master, M, MULTI, None),
    e(TRACK_NUMBER, "TrackNumber", &[TRACK_ENTRY], UInt, M, ONE, None),
    e(TRACK_UID, "TrackUID", &[TRACK_ENTRY], UInt, M, ONE, None),
    e(TRACK_TYPE, "TrackType", &[TRACK_ENTRY], UInt, M, ONE, None),
    e(FLAG_ENABLED, "FlagEnabled", &[TRACK_ENTRY], UInt, M, ONE, Some(D::UInt(1))),
    e(FLAG_DEFAULT, "FlagDefault", &[TRACK_ENTRY], UInt, M, ONE, Some(D::UInt(1))),
    e(FLAG_FORCED, "FlagForced", &[TRACK_ENTRY], UInt, M, ONE, Some(D::UInt(0))),
    e(FLAG_LACING, "FlagLacing", &[TRACK_ENTRY], UInt, M, ONE, Some(D::UInt(1))),
    e(MIN_CACHE, "MinCache", &[TRACK_ENTRY], UInt, M, ONE, Some(D::UInt(0))),
    e(MAX_CACHE, "MaxCache", &[TRACK_ENTRY], UInt, O, ONE, None),
    e(DEFAULT_DURATION, "DefaultDuration", &[TRACK_ENTRY], UInt, O, ONE, None),
    e(TRACK_TIMESTAMP_SCALE, "TrackTimestampScale", &[TRACK_ENTRY], Float, O, ONE, Some(D::Float(1.0))),
    e(MAX_BLOCK_ADDITION_ID, "MaxBlockAdditionID", &[TRACK_ENTRY], UInt, M, ONE, Some(D::UInt(0))),
    e(NAME, "Name", &[TRACK_ENTRY], Utf8, O, ONE, None),
    e(LANGUAGE, "Language", &[TRACK_ENTRY], String, O, ONE, Some(D::Str("eng"))),
    e(CODEC_ID, "CodecID", &[TRACK_ENTRY], String, M, ONE, None),
    e(CODEC_PRIVATE, "CodecPrivate", &[TRACK_ENTRY], Binary, O, ONE, None),
    e(CODEC_NAME, "CodecName", &[TRACK_ENTRY], Utf8, O, ONE, None),
    e(ATTACHMENT_LINK, "AttachmentLink", &[TRACK_ENTRY], UInt, O, MULTI, None),
    e(CODEC_DECODE_ALL, "CodecDecodeAll", &[TRACK_ENTRY], UInt, M, ONE, Some(D::UInt(1))),
    e(TRACK_OVERLAY, "TrackOverlay", &[TRACK_ENTRY], UInt, O, MULTI, None),
    e(CODEC_DELAY, "CodecDelay", &[TRACK_ENTRY], UInt, O, ONE, Some(D::UInt(0))),
    e(SEEK_PRE_ROLL, "SeekPreRoll", &[TRACK_ENTRY], UInt, O, ONE, Some(D::UInt(0))),
    // Video
    e(VIDEO, "Video", &[TRACK_ENTRY], Master, O, ONE, None),
    e(FLAG_INTERLACED, "FlagInterlaced", &[VIDEO], UInt, M, ONE, Some(D::UInt(0))),
    e(FIELD_ORDER, "FieldOrder", &[VIDEO], UInt, O, ONE, Some(D::UInt(2))),
    e(STEREO_MODE, "StereoMode", &[VIDEO], UInt, O, ONE, Some(D::UInt(0))),
    e(ALPHA_MODE, "AlphaMode", &[VIDEO], UInt, O, ONE, Some(D::UInt(0))),
    e(PIXEL_WIDTH, "PixelWidth", &[VIDEO], UInt, M, ONE, None),
    e(PIXEL_HEIGHT, "PixelHeight", &[VIDEO], UInt, M, ONE, None),
    e(PIXEL_CROP_BOTTOM, "PixelCropBottom", &[VIDEO], UInt, O, ONE, Some(D::UInt(0))),
    e(PIXEL_CROP_TOP, "PixelCropTop", &[VIDEO], UInt, O, ONE, Some(D::UInt(0))),
    e(PIXEL_CROP_LEFT, "PixelCropLeft", &[VIDEO], UInt, O, ONE, Some(D::UInt(0))),
    e(PIXEL_CROP_RIGHT, "PixelCropRight", &[VIDEO], UInt, O, ONE, Some(D::UInt(0))),
    e(DISPLAY_WIDTH, "DisplayWidth", &[VIDEO], UInt, O, ONE, None),
    e(DISPLAY_HEIGHT, "DisplayHeight", &[VIDEO], UInt, O, ONE, None),
    e(DISPLAY_UNIT, "DisplayUnit", &[VIDEO], UInt, O, ONE, Some(D::UInt(0))),
    e(ASPECT_RATIO_TYPE, "AspectRatioType", &[VIDEO], UInt, O, ONE, Some(D::UInt(0))),
    e(COLOUR_SPACE, "ColourSpace", &[VIDEO], Binary, O, ONE, None),
    e(COLOUR, "Colour", &[VIDEO], Master, O, ONE, None),
    e(MATRIX_COEFFICIENTS, "MatrixCoefficients", &[COLOUR], UInt, O, ONE, Some(D::UInt(2))),
    e(BITS_PER_CHANNEL, "BitsPerChannel", &[COLOUR], UInt, O, ONE, Some(D::UInt(0))),
    e(CHROMA_SUBSAMPLING_HORZ, "ChromaSubsamplingHorz", &[COLOUR], UInt, O, ONE, None),
    e(CHROMA_SUBSAMPLING_VERT, "ChromaSubsamplingVert", &[COLOUR], UInt, O, ONE, None),
    e(CB_SUBSAMPLING_HORZ, "CbSubsamplingHorz", &[COLOUR], UInt, O, ONE, None),
    e(CB_SUBSAMPLING_VERT, "CbSubsamplingVert", &[COLOUR], UInt, O, ONE, None),
    e(CHROMA_SITING_HORZ, "ChromaSitingHorz", &[COLOUR], UInt, O, ONE, Some(D::UInt(0))),
    e(CHROMA_SITING_VERT, "ChromaSitingVert", &[COLOUR], UInt, O, ONE, Some(D::UInt(0))),
    e(RANGE, "Range", &[COLOUR], UInt, O, ONE, Some(D::UInt(0))),
    e(TRANSFER_CHARACTERISTICS, "TransferCharacteristics", &[COLOUR], UInt, O, ONE, Some(D::UInt(2))),
    e(PRIMARIES, "Primaries", &[COLOUR], UInt, O, ONE, Some(D::UInt(2))),
    e(MAX_CLL, "MaxCLL", &[COLOUR], UInt, O, ONE, None),
    e(MAX_FALL, "MaxFALL", &[COLOUR], UInt, O, ONE, None),
    e(MASTERING_METADATA, "MasteringMetadata", &[COLOUR], Master, O, ONE, None),
    e(PRIMARY_R_CHROMATICITY_X, "PrimaryRChromaticityX", &[MASTERING_METADATA], Float, O, ONE, None),
    e(PRIMARY_R_CHROMATICITY_Y, "PrimaryRChromaticityY", &[MASTERING_METADATA], Float, O, ONE, None),
    e(PRIMARY_G_CHROMATICITY_X, "PrimaryGChromaticityX", &[MASTERING_METADATA], Float, O, ONE, None),
    e(PRIMARY_G_CHROMATICITY_Y, "PrimaryGChromaticityY", &[MASTERING_METADATA], Float, O, ONE, None),
    e(PRIMARY_B_CHROMATICITY_X, "PrimaryBChromaticityX", &[MASTERING_METADATA], Float, O, ONE, None),
    e(PRIMARY_B_CHROMATICITY_Y, "PrimaryBChromaticityY", &[MASTERING_METADATA], Float, O, ONE, None),
    e(WHITE_POINT_CHROMATICITY_X, "WhitePointChromaticityX", &[MASTERING_METADATA], Float, O, ONE, None),
    e(WHITE_POINT_CHROMATICITY_Y, "WhitePointChromaticityY", &[MASTERING_METADATA], Float, O, ONE, None),
    e(LUMINANCE_MAX, "LuminanceMax", &[MASTERING_METADATA], Float, O, ONE, None),
    e(LUMINANCE_MIN, "LuminanceMin", &[MASTERING_METADATA], Float, O, ONE, None),
    e(PROJECTION, "Projection", &[VIDEO], Master, O, ONE, None),
    e(PROJECTION_TYPE, "ProjectionType", &[PROJECTION], UInt, M, ONE, Some(D::UInt(0))),
    e(PROJECTION_PRIVATE, "ProjectionPrivate", &[PROJECTION], Binary, O, ONE, None),
    e(PROJECTION_POSE_YAW, "ProjectionPoseYaw", &[PROJECTION], Float, M, ONE, Some(D::Float(0.0))),
    e(PROJECTION_POSE_PITCH, "ProjectionPosePitch", &[PROJECTION], Float, M, ONE, Some(D::Float(0.0))),
    e(PROJECTION_POSE_ROLL, "ProjectionPoseRoll", &[PROJECTION], Float, M, ONE, Some(D::Float(0.0))),
    // Audio
    e(AUDIO, "Audio", &[TRACK_ENTRY], Master, O, ONE, None),
    e(SAMPLING_FREQUENCY, "SamplingFrequency", &[AUDIO], Float, M, ONE, Some(D::Float(8000.0))),
    e(OUTPUT_SAMPLING_FREQUENCY, "OutputSamplingFrequency", &[AUDIO], Float, O, ONE, None),
    e(CHANNELS, "Channels", &[AUDIO], UInt, M, ONE, Some(D::UInt(1))),
    e(BIT_DEPTH, "BitDepth", &[AUDIO], UInt, O, ONE, None),
    // Content encoding
    e(CONTENT_ENCODINGS, "ContentEncodings", &[TRACK_ENTRY], Master, O, ONE, None),
    e(CONTENT_ENCODING, "ContentEncoding", &[CONTENT_ENCODINGS], Master, M, MULTI, None),
    e(CONTENT_ENCODING_ORDER, "ContentEncodingOrder", &[CONTENT_ENCODING], UInt, M, ONE, Some(D::UInt(0))),
    e(CONTENT_ENCODING_SCOPE, "ContentEncodingScope", &[CONTENT_ENCODING], UInt, M, ONE, Some(D::UInt(1))),
    e(CONTENT_ENCODING_TYPE, "ContentEncodingType", &[CONTENT_ENCODING], UInt, M, ONE, Some(D::UInt(0))),
    e(CONTENT_COMPRESSION, "ContentCompression", &[CONTENT_ENCODING], Master, O, ONE, None),
    e(CONTENT_COMP_ALGO, "ContentCompAlgo", &[CONTENT_COMPRESSION], UInt, M, ONE, Some(D::UInt(0))),
    e(CONTENT_COMP_SETTINGS, "ContentCompSettings", &[CONTENT_COMPRESSION], Binary, O, ONE, None),
    e(CONTENT_ENCRYPTION, "ContentEncryption", &[CONTENT_ENCODING], Master, O, ONE, None),
    e(CONTENT_ENC_ALGO, "ContentEncAlgo", &[CONTENT_ENCRYPTION], UInt, O, ONE, Some(D::UInt(0))),
    e(CONTENT_ENC_KEY_ID, "ContentEncKeyID", &[CONTENT_ENCRYPTION], Binary, O, ONE, None),
    // Cues
    e(CUES, "Cues", &[SEGMENT], Master, O, ONE, None),
    e(CUE_POINT, "CuePoint", &[CUES], Master, M, MULTI, None),
    e(CUE_TIME, "CueTime", &[CUE_POINT], UInt, M, ONE, None),
    e(CUE_TRACK_POSITIONS, "CueTrackPositions", &[CUE_POINT], Master, M, MULTI, None),
    e(CUE_TRACK, "CueTrack", &[CUE_TRACK_POSITIONS], UInt, M, ONE, None),
    e(CUE_CLUSTER_POSITION, "CueClusterPosition", &[CUE_TRACK_POSITIONS], UInt, M, ONE, None),
    e(CUE_RELATIVE_POSITION, "CueRelativePosition", &[CUE_TRACK_POSITIONS], UInt, O, ONE, None),
    e(CUE_DURATION, "CueDuration", &[CUE_TRACK_POSITIONS], UInt, O, ONE, None),
    e(CUE_BLOCK_NUMBER, "CueBlockNumber", &[CUE_TRACK_POSITIONS], UInt, O, ONE, None),
    e(CUE_CODEC_STATE, "CueCodecState", &[CUE_TRACK_POSITIONS], UInt, O, ONE, Some(D::UInt(0))),
    // Attachments
    e(ATTACHMENTS, "Attachments", &[SEGMENT], Master, O, ONE, None),
    e(ATTACHED_FILE, "AttachedFile", &[ATTACHMENTS], Master, M, MULTI, None),
    e(FILE_DESCRIPTION, "FileDescription", &[ATTACHED_FILE], Utf8, O, ONE, None),
    e(FILE_NAME, "FileName", &[ATTACHED_FILE], Utf8, M, ONE, None),
    e(FILE_MEDIA_TYPE, "FileMediaType", &[ATTACHED_FILE], String, M, ONE, None),
    e(FILE_DATA, "FileData", &[ATTACHED_FILE], Binary, M, ONE, None),
    e(FILE_UID, "FileUID", &[ATTACHED_FILE], UInt, M, ONE, None),
    // Chapters
    e(CHAPTERS, "Chapters", &[SEGMENT], Master, O, ONE, None),
    e(EDITION_ENTRY, "EditionEntry", &[CHAPTERS], Master, M, MULTI, None),
    e(EDITION_UID, "EditionUID", &[EDITION_ENTRY], UInt, O, ONE, None),
    e(EDITION_FLAG_HIDDEN, "EditionFlagHidden", &[EDITION_ENTRY], UInt, M, ONE, Some(D::UInt(0))),
    e(EDITION_FLAG_DEFAULT, "EditionFlagDefault", &[EDITION_ENTRY], UInt, M, ONE, Some(D::UInt(0))),
    e(EDITION_FLAG_ORDERED, "EditionFlagOrdered", &[EDITION_ENTRY], UInt, O, ONE, Some(D::UInt(0))),
    e(CHAPTER_ATOM, "ChapterAtom", &[EDITION_ENTRY, CHAPTER_ATOM], Master, M, MULTI, None),
    e(CHAPTER_UID, "ChapterUID", &[CHAPTER_ATOM], UInt, M, ONE, None),
    e(CHAPTER_STRING_UID, "ChapterStringUID", &[CHAPTER_ATOM], Utf8, O, ONE, None),
    e(CHAPTER_TIME_START, "ChapterTimeStart", &[CHAPTER_ATOM], UInt, M, ONE, None),
    e(CHAPTER_TIME_END, "ChapterTimeEnd", &[CHAPTER_ATOM], UInt, O, ONE, None),
    e(CHAPTER_FLAG_HIDDEN, "ChapterFlagHidden", &[CHAPTER_ATOM], UInt, M, ONE, Some(D::UInt(0))),
    e(CHAPTER_FLAG_ENABLED, "ChapterFlagEnabled", &[CHAPTER_ATOM], UInt, M, ONE, Some(D::UInt(1))),
    e(CHAPTER_SEGMENT_UID, "ChapterSegmentUID", &[CHAPTER_ATOM], Binary, O, ONE, None),
    e(CHAPTER_SEGMENT_EDITION_UID, "ChapterSegmentEditionUID", &[CHAPTER_ATOM], UInt, O, ONE, None),
    e(CHAPTER_PHYSICAL_EQUIV, "ChapterPhysicalEquiv", &[CHAPTER_ATOM], UInt, O, ONE, None),
    e(CHAPTER_TRACK, "ChapterTrack", &[CHAPTER_ATOM], Master, O, ONE, None),
    e(CHAPTER_TRACK_UID, "ChapterTrackUID", &[CHAPTER_TRACK], UInt, M, MULTI, None),
    e(CHAPTER_DISPLAY, "ChapterDisplay", &[CHAPTER_ATOM], Master, O, MULTI, None),
    e(CHAP_STRING, "ChapString", &[CHAPTER_DISPLAY], Utf8, M, ONE, None),
    e(CHAP_LANGUAGE, "ChapLanguage", &[CHAPTER_DISPLAY], String, M, MULTI, Some(D::Str("eng"))),
    e(CHAP_COUNTRY, "ChapCountry", &[CHAPTER_DISPLAY], String, O, MULTI, None),
    e(CHAP_PROCESS, "ChapProcess", &[CHAPTER_ATOM], Master, O, MULTI, None),
    e(CHAP_PROCESS_CODEC_ID, "ChapProcessCodecID", &[CHAP_PROCESS], UInt, M, ONE, Some(D::UInt(0))),
    e(CHAP_PROCESS_PRIVATE, "ChapProcessPrivate", &[CHAP_PROCESS], Binary, O, ONE, None),
    e(CHAP_PROCESS_COMMAND, "ChapProcessCommand", &[CHAP_PROCESS], Master, O, MULTI, None),
    e(CHAP_PROCESS_TIME, "ChapProcessTime", &[CHAP_PROCESS_COMMAND], UInt, M, ONE, None),
    e(CHAP_PROCESS_DATA, "ChapProcessData", &[CHAP_PROCESS_COMMAND], Binary, M, ONE, None),
    // Tags
    e(TAGS, "Tags", &[SEGMENT], Master, O, MULTI, None),
    e(TAG, "Tag", &[TAGS], Master, M, MULTI, None),
    e(TARGETS, "Targets", &[TAG], Master, M, ONE, None),
    e(TARGET_TYPE_VALUE, "TargetTypeValue", &[TARGETS], UInt, O, ONE, Some(D::UInt(50))),
    e(TARGET_TYPE, "TargetType", &[TARGETS], String, O, ONE, None),
    e(TAG_TRACK_UID, "TagTrackUID", &[TARGETS], UInt, O, MULTI, None),
    e(TAG_EDITION_UID, "TagEditionUID", &[TARGETS], UInt, O, MULTI, None),
    e(TAG_CHAPTER_UID, "TagChapterUID", &[TARGETS], UInt, O, MULTI, None),
    e(TAG_ATTACHMENT_UID, "TagAttachmentUID", &[TARGETS], UInt, O, MULTI, None),
    e(SIMPLE_TAG, "SimpleTag", &[TAG, SIMPLE_TAG], Master, M, MULTI, None),
    e(TAG_NAME, "TagName", &[SIMPLE_TAG], Utf8, M, ONE, None),
    e(TAG_LANGUAGE, "TagLanguage", &[SIMPLE_TAG], String, M, ONE, Some(D::Str("und"))),
    e(TAG_DEFAULT, "TagDefault", &[SIMPLE_TAG], UInt, M, ONE, Some(D::UInt(1))),
    e(TAG_STRING, "TagString", &[SIMPLE_TAG], Utf8, O, ONE, None),
    e(TAG_BINARY, "TagBinary", &[SIMPLE_TAG], Binary, O, ONE, None),
];

struct SchemaIndex {
    by_id: HashMap<u32, &'static SchemaEntry>,
    by_name: HashMap<u32, HashMap<&'static str, &'static SchemaEntry>>,
    children: HashMap<u32, Vec<&'static SchemaEntry>>,
    order: HashMap<u32, usize>,
}

fn index() -> &'static SchemaIndex {
    static INDEX: OnceLock<SchemaIndex> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut index = SchemaIndex {
            by_id: HashMap::with_capacity(TABLE.len()),
            by_name: HashMap::new(),
            children: HashMap::new(),
            order: HashMap::with_capacity(TABLE.len()),
        };
        for (position, entry) in TABLE.iter().enumerate() {
            index.by_id.insert(entry.id, entry);
            index.order.insert(entry.id, position);
            for &parent in entry.parents {
                index
                    .by_name
                    .entry(parent)
                    .or_default()
                    .insert(entry.name, entry);
                index.children.entry(parent).or_default().push(entry);
            }
        }
        index
    })
}

/// Look up an element by ID.
pub fn lookup(id: u32) -> Option<&'static SchemaEntry> {
    index().by_id.get(&id).copied()
}

/// Look up an element by parent ID and name.
///
/// Global elements are found under any parent.
pub fn lookup_by_name(parent: u32, name: &str) -> Option<&'static SchemaEntry> {
    index()
        .by_name
        .get(&parent)
        .and_then(|names| names.get(name).copied())
        .or_else(|| TABLE.iter().find(|e| e.is_global() && e.name == name))
}

/// Schema rows whose parent is `parent`, in canonical order.
pub fn children_of(parent: u32) -> &'static [&'static SchemaEntry] {
    index()
        .children
        .get(&parent)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Element name, or `"Unknown"`.
pub fn name_of(id: u32) -> &'static str {
    lookup(id).map(|e| e.name).unwrap_or("Unknown")
}

/// Whether `id` may appear as a direct child of `parent`.
pub fn is_valid_child(parent: u32, id: u32) -> bool {
    match lookup(id) {
        Some(entry) => entry.is_global() || entry.parents.contains(&parent),
        None => false,
    }
}

/// Whether `id` is a master element.
pub fn is_master(id: u32) -> bool {
    lookup(id).is_some_and(SchemaEntry::is_master)
}

/// Only Segment and Cluster may carry the "unknown size" marker.
pub fn unknown_size_allowed(id: u32) -> bool {
    id == SEGMENT || id == CLUSTER
}

/// Sort key for canonical child order: CRC-32 first, unknown and Void last.
pub fn sort_key(id: u32) -> usize {
    match id {
        CRC32 => 0,
        VOID => usize::MAX,
        _ => lookup(id).map(SchemaEntry::order).unwrap_or(usize::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_id() {
        let entry = lookup(TRACK_NUMBER).unwrap();
        assert_eq!(entry.name, "TrackNumber");
        assert_eq!(entry.value_type, ValueType::UInt);
        assert!(entry.mandatory);
        assert!(!entry.multiple);
        assert!(lookup(0x1234).is_none());
    }

    #[test]
    fn test_lookup_by_name() {
        let entry = lookup_by_name(TRACK_ENTRY, "CodecID").unwrap();
        assert_eq!(entry.id, CODEC_ID);
        assert_eq!(lookup_by_name(INFO, "CodecID").map(|e| e.id), None);
        assert_eq!(lookup_by_name(TAG, "EBMLVoid").map(|e| e.id), Some(VOID));
    }

    #[test]
    fn test_recursive_elements() {
        assert!(is_valid_child(EDITION_ENTRY, CHAPTER_ATOM));
        assert!(is_valid_child(CHAPTER_ATOM, CHAPTER_ATOM));
        assert!(is_valid_child(SIMPLE_TAG, SIMPLE_TAG));
        assert!(!is_valid_child(TAGS, SIMPLE_TAG));
    }

    #[test]
    fn test_global_elements() {
        assert!(is_valid_child(CLUSTER, VOID));
        assert!(is_valid_child(TRACK_ENTRY, CRC32));
        assert_eq!(sort_key(CRC32), 0);
        assert_eq!(sort_key(VOID), usize::MAX);
    }

    #[test]
    fn test_canonical_order() {
        assert!(sort_key(CHAPTER_TIME_START) < sort_key(CHAPTER_DISPLAY));
        assert!(sort_key(TIMESTAMP) < sort_key(SIMPLE_BLOCK));
        let names: Vec<_> = children_of(EBML).iter().map(|e| e.name).collect();
        assert_eq!(names[0], "EBMLVersion");
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn test_unique_ids() {
        let mut ids: Vec<_> = TABLE.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), TABLE.len());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(
            lookup(TIMESTAMP_SCALE).unwrap().default,
            Some(DefaultValue::UInt(1_000_000))
        );
        assert_eq!(lookup(TAG_LANGUAGE).unwrap().default, Some(DefaultValue::Str("und")));
        assert!(unknown_size_allowed(CLUSTER));
        assert!(!unknown_size_allowed(INFO));
    }
}
