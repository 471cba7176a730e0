//! MKV/Matroska muxer implementation.
//!
//! Layout of a file written by [`MkvMuxer`]:
//!
//! ```text
//! EBML
//! Segment (size patched at the end)
//!   Void      reserved for the SeekHead
//!   Info      Duration reserved as an 8-byte float
//!   Tracks    followed by a Void for re-rendering
//!   Attachments
//!   Cluster...
//!   Cues
//!   Chapters
//!   Tags
//!   [SeekHead when the reserved space was too small]
//! ```

use crate::attachments::{AttachedFile, Attachments};
use crate::chapters::Chapters;
use crate::cluster::{ClusterHelper, ClusterOptions, CueStrategy, RenderedCluster, TrackLayout};
use crate::cues::{CueTrackPosition, Cues};
use crate::ebml::{self, EbmlHeader, ElementHeader};
use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::info::{now_as_date, SegmentInfo, DEFAULT_TIMESTAMP_SCALE};
use crate::seekhead::SeekHead;
use crate::statistics::TrackStatistics;
use crate::tags::Tags;
use crate::track::{tracks_to_node, TrackEntry};
use crate::tree;
use crate::uid;
use crate::webm;

use chrono::Utc;
use mkvkit_core::Packet;
use std::collections::HashMap;
use std::io::{Seek, SeekFrom, Write};
use tracing::{debug, info};

/// Default space reserved for the SeekHead at the start of the segment.
pub const DEFAULT_SEEK_HEAD_RESERVE: u64 = 200;

/// Default space reserved after Tracks for header updates.
pub const DEFAULT_TRACKS_RESERVE: u64 = 1024;

/// Muxer configuration.
#[derive(Debug, Clone)]
pub struct MuxerConfig {
    /// Document type ("matroska" or "webm").
    pub doc_type: String,
    /// Timestamp scale (nanoseconds per tick).
    pub timestamp_scale: u64,
    /// Segment title.
    pub title: Option<String>,
    /// Muxing application name.
    pub muxing_app: String,
    /// Writing application name.
    pub writing_app: String,
    /// Random when not set.
    pub segment_uid: Option<Vec<u8>>,
    pub segment_filename: Option<String>,
    /// Matroska date; the current time when not set.
    pub date_utc: Option<i64>,
    pub write_date: bool,
    /// Whether to write cues.
    pub write_cues: bool,
    pub clusters: ClusterOptions,
    /// Per-track statistics tags.
    pub track_statistics: bool,
    pub seek_head_reserve: u64,
    pub tracks_reserve: u64,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        let app = format!("mkvkit {}", env!("CARGO_PKG_VERSION"));
        Self {
            doc_type: "matroska".to_string(),
            timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
            title: None,
            muxing_app: app.clone(),
            writing_app: app,
            segment_uid: None,
            segment_filename: None,
            date_utc: None,
            write_date: true,
            write_cues: true,
            clusters: ClusterOptions::default(),
            track_statistics: true,
            seek_head_reserve: DEFAULT_SEEK_HEAD_RESERVE,
            tracks_reserve: DEFAULT_TRACKS_RESERVE,
        }
    }
}

impl MuxerConfig {
    /// Create a WebM muxer config.
    pub fn webm() -> Self {
        Self {
            doc_type: "webm".to_string(),
            track_statistics: false,
            ..Default::default()
        }
    }

    pub fn is_webm(&self) -> bool {
        self.doc_type == "webm"
    }
}

/// MKV muxer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MuxerState {
    /// Tracks and metadata can still be added.
    Initial,
    /// Headers written, accepting packets.
    Writing,
    Finalized,
}

/// Byte ranges recorded while writing, relative to the file start unless
/// noted otherwise.
#[derive(Debug, Default)]
struct Layout {
    segment_size_pos: u64,
    segment_data_start: u64,
    seek_head_pos: u64,
    duration_pos: Option<u64>,
    tracks_pos: u64,
    /// Tracks plus the reserved Void.
    tracks_span: u64,
}

/// MKV muxer.
pub struct MkvMuxer<W: Write + Seek> {
    writer: W,
    config: MuxerConfig,
    state: MuxerState,
    tracks: Vec<TrackEntry>,
    chapters: Chapters,
    tags: Tags,
    attachments: Attachments,
    clusters: ClusterHelper,
    cues: Cues,
    seek_head: SeekHead,
    statistics: HashMap<u64, TrackStatistics>,
    layout: Layout,
    /// End of the latest frame, nanoseconds.
    max_timestamp: i64,
    packets_written: u64,
}

impl<W: Write + Seek> MkvMuxer<W> {
    /// Create a new MKV muxer.
    pub fn new(writer: W, config: MuxerConfig) -> Self {
        let clusters = ClusterHelper::new(config.clusters.clone(), config.timestamp_scale);
        Self {
            writer,
            config,
            state: MuxerState::Initial,
            tracks: Vec::new(),
            chapters: Chapters::default(),
            tags: Tags::default(),
            attachments: Attachments::default(),
            clusters,
            cues: Cues::default(),
            seek_head: SeekHead::default(),
            statistics: HashMap::new(),
            layout: Layout::default(),
            max_timestamp: 0,
            packets_written: 0,
        }
    }

    pub fn config(&self) -> &MuxerConfig {
        &self.config
    }

    pub fn tracks(&self) -> &[TrackEntry] {
        &self.tracks
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    fn ensure_initial(&self, what: &str) -> Result<()> {
        if self.state != MuxerState::Initial {
            return Err(MkvError::InvalidState(format!(
                "cannot add {what} after the headers have been written"
            )));
        }
        Ok(())
    }

    /// Register a track. A zero track number or UID is replaced by a free
    /// one; the final track number is returned.
    pub fn add_track(&mut self, mut track: TrackEntry, cues: Option<CueStrategy>) -> Result<u64> {
        self.ensure_initial("tracks")?;
        if track.number == 0 {
            track.number = self.tracks.iter().map(|t| t.number).max().unwrap_or(0) + 1;
        }
        if self.tracks.iter().any(|t| t.number == track.number) {
            return Err(MkvError::InvalidState(format!(
                "track number {} is used twice",
                track.number
            )));
        }
        if track.uid == 0 || self.tracks.iter().any(|t| t.uid == track.uid) {
            let mut used: Vec<u64> = self.tracks.iter().map(|t| t.uid).collect();
            track.uid = uid::unique_uid(&mut used);
        }

        let strategy = if self.config.write_cues {
            cues.unwrap_or_else(|| CueStrategy::default_for(track.track_type))
        } else {
            CueStrategy::None
        };
        self.clusters.add_track(TrackLayout::from_entry(&track, strategy));
        self.statistics.insert(track.number, TrackStatistics::new(track.uid));
        let number = track.number;
        debug!(track = number, codec = track.codec(), "Added track");
        self.tracks.push(track);
        Ok(number)
    }

    pub fn set_chapters(&mut self, chapters: Chapters) -> Result<()> {
        self.ensure_initial("chapters")?;
        self.chapters = chapters;
        Ok(())
    }

    pub fn set_tags(&mut self, tags: Tags) -> Result<()> {
        self.ensure_initial("tags")?;
        self.tags = tags;
        Ok(())
    }

    pub fn add_attachment(&mut self, mut file: AttachedFile) -> Result<()> {
        self.ensure_initial("attachments")?;
        if file.uid == 0 {
            let mut used: Vec<u64> = self.attachments.files.iter().map(|f| f.uid).collect();
            file.uid = uid::unique_uid(&mut used);
        }
        self.attachments.files.push(file);
        Ok(())
    }

    /// Get the current position in the stream.
    fn position(&mut self) -> Result<u64> {
        Ok(self.writer.stream_position()?)
    }

    fn segment_position(&mut self) -> Result<u64> {
        Ok(self.position()? - self.layout.segment_data_start)
    }

    /// Write everything up to the first cluster.
    ///
    /// Fails if a track lacks its type or codec ID; nothing is written then.
    pub fn write_header(&mut self) -> Result<()> {
        self.ensure_initial("headers")?;
        if self.tracks.is_empty() {
            return Err(MkvError::InvalidState("no tracks to write".to_string()));
        }
        let tracks_node = tracks_to_node(&self.tracks)?;
        if self.config.is_webm() {
            for track in &self.tracks {
                webm::validate_track(track)?;
            }
        }

        let header = if self.config.is_webm() {
            EbmlHeader::webm()
        } else {
            EbmlHeader::default()
        };
        header.to_node().write(&mut self.writer)?;

        ebml::write_element_id(&mut self.writer, SEGMENT)?;
        self.layout.segment_size_pos = self.position()?;
        ebml::write_unknown_size(&mut self.writer, 8)?;
        self.layout.segment_data_start = self.position()?;

        self.layout.seek_head_pos = self.position()?;
        tree::write_void(&mut self.writer, self.config.seek_head_reserve.max(2))?;

        self.write_info()?;

        let tracks_pos = self.segment_position()?;
        self.seek_head.set(TRACKS, tracks_pos);
        self.layout.tracks_pos = self.position()?;
        let written = tracks_node.write(&mut self.writer)?;
        let reserve = match self.config.tracks_reserve {
            0 => 0,
            reserve => reserve.max(2),
        };
        if reserve > 0 {
            tree::write_void(&mut self.writer, reserve)?;
        }
        self.layout.tracks_span = written + reserve;

        if !self.attachments.is_empty() {
            let position = self.segment_position()?;
            self.seek_head.set(ATTACHMENTS, position);
            self.attachments.to_node().write(&mut self.writer)?;
        }

        self.state = MuxerState::Writing;
        info!(
            tracks = self.tracks.len(),
            doc_type = %self.config.doc_type,
            "Wrote Matroska headers"
        );
        Ok(())
    }

    fn write_info(&mut self) -> Result<()> {
        let date = match (self.config.date_utc, self.config.write_date) {
            (Some(date), _) => Some(date),
            (None, true) => Some(now_as_date()),
            (None, false) => None,
        };
        let info = SegmentInfo {
            segment_uid: Some(
                self.config
                    .segment_uid
                    .clone()
                    .unwrap_or_else(uid::random_segment_uid),
            ),
            segment_filename: self.config.segment_filename.clone(),
            timestamp_scale: self.config.timestamp_scale,
            duration: Some(0.0),
            date_utc: date,
            title: self.config.title.clone(),
            muxing_app: Some(self.config.muxing_app.clone()),
            writing_app: Some(self.config.writing_app.clone()),
            ..Default::default()
        };

        let position = self.segment_position()?;
        self.seek_head.set(INFO, position);
        let start = self.position()?;
        let bytes = info.to_node().render()?;
        self.layout.duration_pos = child_payload_offset(&bytes, DURATION)?.map(|at| start + at as u64);
        self.writer.write_all(&bytes)?;
        Ok(())
    }

    /// Replace a track header, e.g. after its minimum cache changed.
    ///
    /// Once the headers are written, Tracks is re-rendered into its reserved
    /// space.
    pub fn update_track(&mut self, track: &TrackEntry) -> Result<()> {
        let slot = self
            .tracks
            .iter_mut()
            .find(|t| t.number == track.number)
            .ok_or(MkvError::TrackNotFound {
                track_number: track.number,
            })?;
        *slot = track.clone();
        self.clusters.update_track(track);

        if self.state != MuxerState::Initial {
            let bytes = tracks_to_node(&self.tracks)?.render_with_padding(self.layout.tracks_span)?;
            let end = self.position()?;
            self.writer.seek(SeekFrom::Start(self.layout.tracks_pos))?;
            self.writer.write_all(&bytes)?;
            self.writer.seek(SeekFrom::Start(end))?;
            debug!(track = track.number, "Re-rendered track headers");
        }
        Ok(())
    }

    /// Write a packet to the muxer.
    ///
    /// Packets must arrive in coding order per track and roughly in
    /// timestamp order across tracks.
    pub fn write_packet(&mut self, packet: Packet) -> Result<()> {
        match self.state {
            MuxerState::Initial => self.write_header()?,
            MuxerState::Finalized => {
                return Err(MkvError::InvalidState("muxer already finalized".to_string()));
            }
            MuxerState::Writing => {}
        }

        let track = self
            .tracks
            .iter()
            .find(|t| t.number == packet.track_number)
            .ok_or(MkvError::TrackNotFound {
                track_number: packet.track_number,
            })?;
        let duration = packet
            .duration
            .or(track.default_duration.map(|d| d as i64));
        if let Some(stats) = self.statistics.get_mut(&packet.track_number) {
            stats.account(packet.timestamp, duration, packet.size());
        }
        self.max_timestamp = self
            .max_timestamp
            .max(packet.timestamp + duration.unwrap_or(0));
        self.packets_written += 1;

        if let Some(cluster) = self.clusters.add(packet)? {
            self.write_cluster(cluster)?;
        }
        Ok(())
    }

    fn write_cluster(&mut self, cluster: RenderedCluster) -> Result<()> {
        let position = self.segment_position()?;
        for cue in &cluster.cues {
            self.cues.add(
                cue.time,
                CueTrackPosition {
                    relative_position: cue.relative_position,
                    duration: cue.duration,
                    ..CueTrackPosition::new(cue.track, position)
                },
            );
        }
        self.writer.write_all(&cluster.bytes)?;
        Ok(())
    }

    /// Finalize the muxer and write trailing data.
    pub fn finalize(&mut self) -> Result<()> {
        match self.state {
            MuxerState::Finalized => return Ok(()),
            MuxerState::Initial => self.write_header()?,
            MuxerState::Writing => {}
        }

        if let Some(cluster) = self.clusters.flush()? {
            self.write_cluster(cluster)?;
        }

        if !self.cues.is_empty() {
            self.cues.sort();
            let position = self.segment_position()?;
            self.seek_head.set(CUES, position);
            self.cues.to_node().write(&mut self.writer)?;
        }

        if !self.chapters.is_empty() {
            let mut node = self.chapters.to_node();
            node.fix_mandatory_elements();
            node.validate()?;
            if self.config.is_webm() {
                webm::strip_unsupported(&mut node);
            }
            let position = self.segment_position()?;
            self.seek_head.set(CHAPTERS, position);
            node.write(&mut self.writer)?;
        }

        if self.config.track_statistics && !self.config.is_webm() {
            let now = Utc::now();
            for track in &self.tracks {
                if let Some(stats) = self.statistics.get(&track.number) {
                    stats.write_tags(&mut self.tags, &self.config.writing_app, Some(now));
                }
            }
        }
        if !self.tags.is_empty() {
            let mut node = self.tags.to_node();
            node.fix_mandatory_elements();
            node.validate()?;
            if self.config.is_webm() {
                webm::strip_unsupported(&mut node);
            }
            let position = self.segment_position()?;
            self.seek_head.set(TAGS, position);
            node.write(&mut self.writer)?;
        }

        self.write_seek_head()?;
        self.patch_duration()?;

        let end = self.position()?;
        let segment_size = end - self.layout.segment_data_start;
        self.writer.seek(SeekFrom::Start(self.layout.segment_size_pos))?;
        self.writer.write_all(&ebml::encode_vint(segment_size, 8)?)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        self.state = MuxerState::Finalized;
        info!(
            packets = self.packets_written,
            clusters = self.clusters.clusters_rendered(),
            size = end,
            "Finalized Matroska file"
        );
        Ok(())
    }

    /// Write the SeekHead into its reserved space, or append it and leave a
    /// pointer to it in the reserved space when it does not fit.
    fn write_seek_head(&mut self) -> Result<()> {
        let reserve = self.config.seek_head_reserve.max(2);
        let bytes = match self.seek_head.render_in(reserve) {
            Ok(bytes) => bytes,
            Err(MkvError::ElementTooLarge { .. }) => {
                let position = self.segment_position()?;
                self.seek_head.to_node().write(&mut self.writer)?;
                debug!(position, "SeekHead did not fit, appended a second one");
                let mut pointer = SeekHead::default();
                pointer.add(SEEK_HEAD, position);
                pointer.render_in(reserve)?
            }
            Err(err) => return Err(err),
        };
        let end = self.position()?;
        self.writer.seek(SeekFrom::Start(self.layout.seek_head_pos))?;
        self.writer.write_all(&bytes)?;
        self.writer.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    fn patch_duration(&mut self) -> Result<()> {
        let Some(pos) = self.layout.duration_pos else {
            return Ok(());
        };
        let ticks = self.max_timestamp as f64 / self.config.timestamp_scale as f64;
        let end = self.position()?;
        self.writer.seek(SeekFrom::Start(pos))?;
        self.writer.write_all(&ebml::encode_float(ticks, 8))?;
        self.writer.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    /// Get the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Offset of the payload of the first direct child `id` inside the encoded
/// master element `element`.
fn child_payload_offset(element: &[u8], id: u32) -> Result<Option<usize>> {
    let header = ElementHeader::decode(element, 0)?;
    let mut pos = header.header_size;
    while pos < element.len() {
        let child = ElementHeader::decode(&element[pos..], pos as u64)?;
        if child.id == id {
            return Ok(Some(pos + child.header_size));
        }
        let size = child
            .size
            .ok_or_else(|| MkvError::corruption(pos as u64, "child with unknown size"))?;
        pos += child.header_size + size as usize;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::codec_ids;
    use crate::track::{AudioSettings, VideoSettings};
    use crate::tree::Node;
    use std::io::Cursor;

    const MS: i64 = 1_000_000;

    fn config() -> MuxerConfig {
        MuxerConfig {
            segment_uid: Some(vec![7; 16]),
            write_date: false,
            ..Default::default()
        }
    }

    fn audio() -> TrackEntry {
        let mut track = TrackEntry::new(1, TrackType::Audio, codec_ids::A_PCM_INT_LIT);
        track.audio = Some(AudioSettings::new(48000.0, 2));
        track
    }

    fn video() -> TrackEntry {
        let mut track = TrackEntry::new(2, TrackType::Video, codec_ids::V_VP9);
        track.video = Some(VideoSettings::new(640, 360));
        track.default_duration = Some(40_000_000);
        track
    }

    fn level1(bytes: &[u8]) -> Vec<Node> {
        let mut pos = 0;
        let mut out = Vec::new();
        while pos < bytes.len() {
            let (node, used) = Node::parse_at(&bytes[pos..], pos as u64, crate::schema::ROOT).unwrap();
            pos += used;
            out.push(node);
        }
        out
    }

    #[test]
    fn test_muxer_creation() {
        let muxer = MkvMuxer::new(Cursor::new(Vec::new()), MuxerConfig::default());
        assert_eq!(muxer.config().doc_type, "matroska");
        assert!(muxer.tracks().is_empty());
        assert!(MuxerConfig::webm().is_webm());
        assert!(!MuxerConfig::webm().track_statistics);
    }

    #[test]
    fn test_add_tracks() {
        let mut muxer = MkvMuxer::new(Cursor::new(Vec::new()), config());
        assert_eq!(muxer.add_track(audio(), None).unwrap(), 1);
        let mut second = video();
        second.number = 0;
        assert_eq!(muxer.add_track(second, None).unwrap(), 2);
        assert!(muxer.add_track(audio(), None).is_err());
        assert!(muxer.tracks().iter().all(|t| t.uid != 0));
    }

    #[test]
    fn test_incomplete_track_is_fatal() {
        let mut muxer = MkvMuxer::new(Cursor::new(Vec::new()), config());
        let mut track = audio();
        track.codec_id = None;
        muxer.add_track(track, None).unwrap();
        assert!(matches!(
            muxer.write_header(),
            Err(MkvError::IncompleteTrackHeader { field: "codec ID", .. })
        ));
        assert!(muxer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn test_webm_codec_validation() {
        let mut muxer = MkvMuxer::new(Cursor::new(Vec::new()), MuxerConfig::webm());
        muxer.add_track(audio(), None).unwrap();
        assert!(matches!(
            muxer.write_header(),
            Err(MkvError::CodecConfiguration { .. })
        ));
    }

    #[test]
    fn test_write_file_layout() {
        let mut muxer = MkvMuxer::new(Cursor::new(Vec::new()), config());
        muxer.add_track(audio(), None).unwrap();
        muxer.add_track(video(), None).unwrap();
        muxer.write_header().unwrap();
        for i in 0..5 {
            muxer
                .write_packet(Packet::new(1, i * 20 * MS, vec![1; 8]).with_duration(20 * MS))
                .unwrap();
            muxer.write_packet(Packet::new(2, i * 40 * MS, vec![2; 16])).unwrap();
        }
        muxer.finalize().unwrap();
        muxer.finalize().unwrap();
        let bytes = muxer.into_inner().into_inner();

        let top = level1(&bytes);
        assert_eq!(top.len(), 2);
        assert_eq!(EbmlHeader::from_node(&top[0]).doc_type, "matroska");
        let segment = &top[1];
        assert_eq!(segment.id, SEGMENT);
        assert!(!segment.has_unknown_size());

        let ids: Vec<u32> = segment
            .children()
            .iter()
            .map(|c| c.id)
            .filter(|id| *id != VOID)
            .collect();
        assert_eq!(ids, vec![SEEK_HEAD, INFO, TRACKS, CLUSTER, CUES, TAGS]);

        let info = SegmentInfo::from_node(segment.child(INFO).unwrap());
        assert_eq!(info.duration_ns(), Some(200 * MS));
        assert_eq!(info.segment_uid, Some(vec![7; 16]));

        // SeekHead positions point at the elements.
        let seek_head = SeekHead::from_node(segment.child(SEEK_HEAD).unwrap());
        let data_start = bytes.len() as u64 - segment.payload_size();
        let cues_pos = seek_head.position_of(CUES).unwrap();
        let header = ElementHeader::decode(&bytes[(data_start + cues_pos) as usize..], 0).unwrap();
        assert_eq!(header.id, CUES);

        let cues = Cues::from_node(segment.child(CUES).unwrap());
        assert_eq!(cues.count_for_track(1), 1);
        assert_eq!(cues.count_for_track(2), 5);

        let tags = Tags::from_node(segment.child(TAGS).unwrap());
        assert_eq!(tags.tags.len(), 2);
        assert_eq!(tags.tags[0].value("NUMBER_OF_FRAMES"), Some("5"));
    }

    #[test]
    fn test_track_header_rewrite() {
        let mut muxer = MkvMuxer::new(Cursor::new(Vec::new()), config());
        muxer.add_track(video(), None).unwrap();
        muxer.write_header().unwrap();
        muxer.write_packet(Packet::new(2, 0, vec![0; 4])).unwrap();

        let mut track = muxer.tracks()[0].clone();
        track.min_cache = 2;
        muxer.update_track(&track).unwrap();
        muxer.finalize().unwrap();

        let bytes = muxer.into_inner().into_inner();
        let segment = &level1(&bytes)[1];
        let tracks = segment.child(TRACKS).unwrap();
        let entry = TrackEntry::from_node(tracks.child(TRACK_ENTRY).unwrap()).unwrap();
        assert_eq!(entry.min_cache, 2);
        // Tracks, Void and one cluster survive the rewrite.
        assert_eq!(segment.children_with(CLUSTER).count(), 1);
    }

    #[test]
    fn test_second_seek_head() {
        let mut muxer = MkvMuxer::new(
            Cursor::new(Vec::new()),
            MuxerConfig {
                seek_head_reserve: 30,
                ..config()
            },
        );
        muxer.add_track(video(), None).unwrap();
        muxer.write_packet(Packet::new(2, 0, vec![0; 4])).unwrap();
        muxer.finalize().unwrap();

        let bytes = muxer.into_inner().into_inner();
        let segment = &level1(&bytes)[1];
        let heads: Vec<SeekHead> = segment.children_with(SEEK_HEAD).map(SeekHead::from_node).collect();
        assert_eq!(heads.len(), 2);
        assert!(heads[0].position_of(SEEK_HEAD).is_some());
        assert!(heads[1].position_of(INFO).is_some());
    }

    #[test]
    fn test_crc32_clusters() {
        let mut muxer = MkvMuxer::new(
            Cursor::new(Vec::new()),
            MuxerConfig {
                clusters: ClusterOptions {
                    crc32: true,
                    ..Default::default()
                },
                ..config()
            },
        );
        muxer.add_track(video(), None).unwrap();
        muxer.write_packet(Packet::new(2, 0, vec![0; 4])).unwrap();
        muxer.finalize().unwrap();

        let bytes = muxer.into_inner().into_inner();
        let segment = &level1(&bytes)[1];
        let cluster = segment.child(CLUSTER).unwrap();
        assert_eq!(cluster.children()[0].id, CRC32);
    }

    #[test]
    fn test_packets_after_finalize() {
        let mut muxer = MkvMuxer::new(Cursor::new(Vec::new()), config());
        muxer.add_track(video(), None).unwrap();
        muxer.finalize().unwrap();
        assert!(muxer.write_packet(Packet::new(2, 0, vec![0])).is_err());
        assert!(matches!(
            MkvMuxer::new(Cursor::new(Vec::new()), config()).write_packet(Packet::new(1, 0, vec![])),
            Err(MkvError::InvalidState(_))
        ));
    }
}
