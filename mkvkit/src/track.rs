//! Track headers (`TrackEntry`).

use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::tree::Node;
use serde::Serialize;

/// ContentCompAlgo value for header removal.
pub const COMPRESSION_HEADER_REMOVAL: u64 = 3;

/// Video settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoSettings {
    pub pixel_width: u64,
    pub pixel_height: u64,
    pub display_width: Option<u64>,
    pub display_height: Option<u64>,
    pub display_unit: Option<u64>,
    pub interlaced: Option<u64>,
    pub stereo_mode: Option<u64>,
    pub aspect_ratio_type: Option<u64>,
    /// Bottom, top, left, right.
    pub pixel_crop: [u64; 4],
}

impl VideoSettings {
    pub fn new(pixel_width: u64, pixel_height: u64) -> Self {
        Self {
            pixel_width,
            pixel_height,
            ..Default::default()
        }
    }

    fn from_node(node: &Node) -> Self {
        Self {
            pixel_width: node.child_uint(PIXEL_WIDTH).unwrap_or(0),
            pixel_height: node.child_uint(PIXEL_HEIGHT).unwrap_or(0),
            display_width: node.child_uint(DISPLAY_WIDTH),
            display_height: node.child_uint(DISPLAY_HEIGHT),
            display_unit: node.child_uint(DISPLAY_UNIT),
            interlaced: node.child_uint(FLAG_INTERLACED),
            stereo_mode: node.child_uint(STEREO_MODE),
            aspect_ratio_type: node.child_uint(ASPECT_RATIO_TYPE),
            pixel_crop: [
                node.child_uint(PIXEL_CROP_BOTTOM).unwrap_or(0),
                node.child_uint(PIXEL_CROP_TOP).unwrap_or(0),
                node.child_uint(PIXEL_CROP_LEFT).unwrap_or(0),
                node.child_uint(PIXEL_CROP_RIGHT).unwrap_or(0),
            ],
        }
    }

    fn to_node(&self) -> Node {
        let mut node = Node::new_master(VIDEO);
        if let Some(interlaced) = self.interlaced {
            node.push(Node::uint(FLAG_INTERLACED, interlaced));
        }
        if let Some(mode) = self.stereo_mode {
            node.push(Node::uint(STEREO_MODE, mode));
        }
        node.push(Node::uint(PIXEL_WIDTH, self.pixel_width));
        node.push(Node::uint(PIXEL_HEIGHT, self.pixel_height));
        let crop_ids = [PIXEL_CROP_BOTTOM, PIXEL_CROP_TOP, PIXEL_CROP_LEFT, PIXEL_CROP_RIGHT];
        for (id, value) in crop_ids.into_iter().zip(self.pixel_crop) {
            if value != 0 {
                node.push(Node::uint(id, value));
            }
        }
        if let Some(width) = self.display_width {
            node.push(Node::uint(DISPLAY_WIDTH, width));
        }
        if let Some(height) = self.display_height {
            node.push(Node::uint(DISPLAY_HEIGHT, height));
        }
        if let Some(unit) = self.display_unit {
            node.push(Node::uint(DISPLAY_UNIT, unit));
        }
        if let Some(kind) = self.aspect_ratio_type {
            node.push(Node::uint(ASPECT_RATIO_TYPE, kind));
        }
        node
    }
}

/// Audio settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioSettings {
    pub sampling_frequency: f64,
    pub output_sampling_frequency: Option<f64>,
    pub channels: u64,
    pub bit_depth: Option<u64>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sampling_frequency: 8000.0,
            output_sampling_frequency: None,
            channels: 1,
            bit_depth: None,
        }
    }
}

impl AudioSettings {
    pub fn new(sampling_frequency: f64, channels: u64) -> Self {
        Self {
            sampling_frequency,
            channels,
            ..Default::default()
        }
    }

    fn from_node(node: &Node) -> Self {
        Self {
            sampling_frequency: node.child_float_or_default(SAMPLING_FREQUENCY).unwrap_or(8000.0),
            output_sampling_frequency: node.child_float(OUTPUT_SAMPLING_FREQUENCY),
            channels: node.child_uint_or_default(CHANNELS).unwrap_or(1),
            bit_depth: node.child_uint(BIT_DEPTH),
        }
    }

    fn to_node(&self) -> Node {
        let mut node = Node::new_master(AUDIO);
        node.push(Node::float(SAMPLING_FREQUENCY, self.sampling_frequency));
        if let Some(freq) = self.output_sampling_frequency {
            node.push(Node::float(OUTPUT_SAMPLING_FREQUENCY, freq));
        }
        node.push(Node::uint(CHANNELS, self.channels));
        if let Some(depth) = self.bit_depth {
            node.push(Node::uint(BIT_DEPTH, depth));
        }
        node
    }
}

/// Content compression applied to every frame of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentCompression {
    pub algorithm: u64,
    pub settings: Option<Vec<u8>>,
}

impl ContentCompression {
    pub fn header_removal(prefix: Vec<u8>) -> Self {
        Self {
            algorithm: COMPRESSION_HEADER_REMOVAL,
            settings: Some(prefix),
        }
    }
}

/// A track header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEntry {
    pub number: u64,
    pub uid: u64,
    /// Required before headers are written.
    pub track_type: Option<TrackType>,
    /// Required before headers are written.
    pub codec_id: Option<String>,
    pub codec_private: Option<Vec<u8>>,
    pub codec_name: Option<String>,
    pub name: Option<String>,
    pub language: String,
    /// Nanoseconds per frame.
    pub default_duration: Option<u64>,
    pub flag_enabled: bool,
    pub flag_default: bool,
    pub flag_forced: bool,
    pub flag_lacing: bool,
    pub min_cache: u64,
    pub max_cache: Option<u64>,
    pub codec_delay: u64,
    pub seek_pre_roll: u64,
    pub video: Option<VideoSettings>,
    pub audio: Option<AudioSettings>,
    pub compression: Option<ContentCompression>,
}

impl Default for TrackEntry {
    fn default() -> Self {
        Self {
            number: 0,
            uid: 0,
            track_type: None,
            codec_id: None,
            codec_private: None,
            codec_name: None,
            name: None,
            language: "eng".to_string(),
            default_duration: None,
            flag_enabled: true,
            flag_default: true,
            flag_forced: false,
            flag_lacing: true,
            min_cache: 0,
            max_cache: None,
            codec_delay: 0,
            seek_pre_roll: 0,
            video: None,
            audio: None,
            compression: None,
        }
    }
}

impl TrackEntry {
    pub fn new(number: u64, track_type: TrackType, codec_id: impl Into<String>) -> Self {
        Self {
            number,
            track_type: Some(track_type),
            codec_id: Some(codec_id.into()),
            // Lacing is only useful for audio.
            flag_lacing: track_type == TrackType::Audio,
            ..Default::default()
        }
    }

    /// Decode a TrackEntry master.
    ///
    /// A missing or unknown track type or codec ID is a codec configuration
    /// problem of this track only.
    pub fn from_node(node: &Node) -> Result<Self> {
        let number = node.child_uint(TRACK_NUMBER).ok_or_else(|| MkvError::MissingMandatoryElement {
            name: "TrackNumber",
            id: TRACK_NUMBER,
            parent: "TrackEntry",
        })?;
        let codec_id = node.child_str(CODEC_ID).map(str::to_string);
        let raw_type = node.child_uint(TRACK_TYPE);
        let track_type = raw_type.and_then(TrackType::from_u64);

        if track_type.is_none() || codec_id.as_deref().map_or(true, str::is_empty) {
            return Err(MkvError::CodecConfiguration {
                track_number: number,
                codec_id: codec_id.unwrap_or_default(),
                message: match raw_type {
                    Some(value) if track_type.is_none() => format!("unknown track type {value}"),
                    None => "missing track type".to_string(),
                    _ => "missing codec ID".to_string(),
                },
            });
        }

        let compression = node
            .child(CONTENT_ENCODINGS)
            .and_then(|encodings| encodings.child(CONTENT_ENCODING))
            .and_then(|encoding| encoding.child(CONTENT_COMPRESSION))
            .map(|compression| ContentCompression {
                algorithm: compression.child_uint_or_default(CONTENT_COMP_ALGO).unwrap_or(0),
                settings: compression.child_binary(CONTENT_COMP_SETTINGS).map(<[u8]>::to_vec),
            });

        let flag = |id| node.child_uint_or_default(id).unwrap_or(0) != 0;

        Ok(Self {
            number,
            uid: node.child_uint(TRACK_UID).unwrap_or(0),
            track_type,
            codec_id,
            codec_private: node.child_binary(CODEC_PRIVATE).map(<[u8]>::to_vec),
            codec_name: node.child_str(CODEC_NAME).map(str::to_string),
            name: node.child_str(NAME).map(str::to_string),
            language: node.child_str_or_default(LANGUAGE).unwrap_or("eng").to_string(),
            default_duration: node.child_uint(DEFAULT_DURATION).filter(|&d| d > 0),
            flag_enabled: flag(FLAG_ENABLED),
            flag_default: flag(FLAG_DEFAULT),
            flag_forced: flag(FLAG_FORCED),
            flag_lacing: flag(FLAG_LACING),
            min_cache: node.child_uint_or_default(MIN_CACHE).unwrap_or(0),
            max_cache: node.child_uint(MAX_CACHE),
            codec_delay: node.child_uint_or_default(CODEC_DELAY).unwrap_or(0),
            seek_pre_roll: node.child_uint_or_default(SEEK_PRE_ROLL).unwrap_or(0),
            video: node.child(VIDEO).map(VideoSettings::from_node),
            audio: node.child(AUDIO).map(AudioSettings::from_node),
            compression,
        })
    }

    /// Encode as a TrackEntry master.
    ///
    /// Fails with [`MkvError::IncompleteTrackHeader`] when the track type or
    /// codec ID has not been set.
    pub fn to_node(&self) -> Result<Node> {
        let track_type = self.track_type.ok_or(MkvError::IncompleteTrackHeader {
            track_number: self.number,
            field: "track type",
        })?;
        let codec_id = self
            .codec_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(MkvError::IncompleteTrackHeader {
                track_number: self.number,
                field: "codec ID",
            })?;

        let mut node = Node::new_master(TRACK_ENTRY);
        node.push(Node::uint(TRACK_NUMBER, self.number));
        node.push(Node::uint(TRACK_UID, self.uid));
        node.push(Node::uint(TRACK_TYPE, track_type.to_u64()));
        node.push(Node::uint(FLAG_ENABLED, self.flag_enabled as u64));
        node.push(Node::uint(FLAG_DEFAULT, self.flag_default as u64));
        node.push(Node::uint(FLAG_FORCED, self.flag_forced as u64));
        node.push(Node::uint(FLAG_LACING, self.flag_lacing as u64));
        node.push(Node::uint(MIN_CACHE, self.min_cache));
        if let Some(max_cache) = self.max_cache {
            node.push(Node::uint(MAX_CACHE, max_cache));
        }
        if let Some(duration) = self.default_duration {
            node.push(Node::uint(DEFAULT_DURATION, duration));
        }
        if let Some(name) = &self.name {
            node.push(Node::text(NAME, name.as_str()));
        }
        node.push(Node::text(LANGUAGE, self.language.as_str()));
        node.push(Node::text(CODEC_ID, codec_id));
        if let Some(private) = &self.codec_private {
            node.push(Node::binary(CODEC_PRIVATE, private.clone()));
        }
        if let Some(codec_name) = &self.codec_name {
            node.push(Node::text(CODEC_NAME, codec_name.as_str()));
        }
        if self.codec_delay != 0 {
            node.push(Node::uint(CODEC_DELAY, self.codec_delay));
        }
        if self.seek_pre_roll != 0 {
            node.push(Node::uint(SEEK_PRE_ROLL, self.seek_pre_roll));
        }
        if let Some(video) = &self.video {
            node.push(video.to_node());
        }
        if let Some(audio) = &self.audio {
            node.push(audio.to_node());
        }
        if let Some(compression) = &self.compression {
            let mut comp = Node::new_master(CONTENT_COMPRESSION);
            comp.push(Node::uint(CONTENT_COMP_ALGO, compression.algorithm));
            if let Some(settings) = &compression.settings {
                comp.push(Node::binary(CONTENT_COMP_SETTINGS, settings.clone()));
            }
            let encoding = Node::master(
                CONTENT_ENCODING,
                vec![
                    Node::uint(CONTENT_ENCODING_ORDER, 0),
                    Node::uint(CONTENT_ENCODING_SCOPE, 1),
                    Node::uint(CONTENT_ENCODING_TYPE, 0),
                    comp,
                ],
            );
            node.push(Node::master(CONTENT_ENCODINGS, vec![encoding]));
        }
        Ok(node)
    }

    /// Byte prefix stripped from every frame, if header removal is in use.
    pub fn header_removal_prefix(&self) -> Option<&[u8]> {
        self.compression
            .as_ref()
            .filter(|c| c.algorithm == COMPRESSION_HEADER_REMOVAL)
            .and_then(|c| c.settings.as_deref())
    }

    pub fn is_video(&self) -> bool {
        self.track_type == Some(TrackType::Video)
    }

    pub fn is_audio(&self) -> bool {
        self.track_type == Some(TrackType::Audio)
    }

    pub fn is_subtitle(&self) -> bool {
        self.track_type == Some(TrackType::Subtitle)
    }

    pub fn codec(&self) -> &str {
        self.codec_id.as_deref().unwrap_or("")
    }
}

/// Decode every TrackEntry of a Tracks master.
///
/// Tracks whose headers cannot be used are returned separately so callers
/// can disable them and continue with the rest.
pub fn tracks_from_node(node: &Node) -> (Vec<TrackEntry>, Vec<MkvError>) {
    let mut tracks = Vec::new();
    let mut errors = Vec::new();
    for entry in node.children_with(TRACK_ENTRY) {
        match TrackEntry::from_node(entry) {
            Ok(track) => tracks.push(track),
            Err(err) => errors.push(err),
        }
    }
    (tracks, errors)
}

/// Encode a Tracks master.
pub fn tracks_to_node(tracks: &[TrackEntry]) -> Result<Node> {
    let entries = tracks
        .iter()
        .map(TrackEntry::to_node)
        .collect::<Result<Vec<_>>>()?;
    Ok(Node::master(TRACKS, entries))
}
