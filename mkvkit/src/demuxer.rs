//! MKV/Matroska demuxer implementation.
//!
//! The demuxer scans the Segment's level-1 elements in file order, loads all
//! metadata (Info, Tracks, Cues, Chapters, Tags, Attachments, SeekHead) up
//! front and then decodes Clusters lazily, one at a time, into packets.
//!
//! Damage inside a Cluster or a metadata element is reported through
//! [`Diagnostics`] and skipped; only an unreadable EBML header or a missing
//! Segment are fatal.

use crate::attachments::Attachments;
use crate::block::{Block, BlockFlags};
use crate::chapters::Chapters;
use crate::cues::Cues;
use crate::diagnostics::Diagnostics;
use crate::ebml::{self, EbmlHeader, ElementHeader};
use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::info::SegmentInfo;
use crate::scan::{self, Level1Element, SegmentLocation};
use crate::seekhead::SeekHead;
use crate::tags::Tags;
use crate::track::{tracks_from_node, TrackEntry};
use crate::tree::Node;

use mkvkit_core::{Packet, PacketFlags};
use std::collections::{BTreeSet, VecDeque};
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, info};

/// MKV demuxer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxerState {
    /// Initial state, nothing read yet.
    Header,
    /// Metadata loaded, reading clusters (media data).
    Clusters,
    /// End of file reached.
    Eof,
}

/// MKV demuxer.
pub struct MkvDemuxer<R: Read + Seek> {
    reader: R,
    state: DemuxerState,
    /// EBML header.
    pub ebml_header: Option<EbmlHeader>,
    /// Segment info.
    pub segment_info: SegmentInfo,
    /// Usable tracks in header order.
    pub tracks: Vec<TrackEntry>,
    /// Cue points for seeking.
    pub cues: Cues,
    pub chapters: Chapters,
    pub tags: Tags,
    pub attachments: Attachments,
    /// Entries of all SeekHeads.
    pub seek_head: SeekHead,
    segment: Option<SegmentLocation>,
    layout: Vec<Level1Element>,
    clusters: Vec<Level1Element>,
    next_cluster: usize,
    /// Tracks whose headers could not be used.
    disabled: BTreeSet<u64>,
    /// Blocks of unknown tracks are reported once per track.
    unknown_tracks: BTreeSet<u64>,
    /// Frames decoded from the current cluster.
    pending: VecDeque<Packet>,
    diagnostics: Diagnostics,
}

impl<R: Read + Seek> MkvDemuxer<R> {
    /// Create a new MKV demuxer.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: DemuxerState::Header,
            ebml_header: None,
            segment_info: SegmentInfo::default(),
            tracks: Vec::new(),
            cues: Cues::default(),
            chapters: Chapters::default(),
            tags: Tags::default(),
            attachments: Attachments::default(),
            seek_head: SeekHead::default(),
            segment: None,
            layout: Vec::new(),
            clusters: Vec::new(),
            next_cluster: 0,
            disabled: BTreeSet::new(),
            unknown_tracks: BTreeSet::new(),
            pending: VecDeque::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Open a stream and read all metadata.
    pub fn open(reader: R) -> Result<Self> {
        let mut demuxer = Self::new(reader);
        demuxer.read_header()?;
        Ok(demuxer)
    }

    /// Get the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    pub fn state(&self) -> DemuxerState {
        self.state
    }

    /// Warnings collected so far.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    /// Level-1 elements in file order.
    pub fn layout(&self) -> &[Level1Element] {
        &self.layout
    }

    pub fn segment(&self) -> Option<&SegmentLocation> {
        self.segment.as_ref()
    }

    /// Check the EBML header, locate the Segment and load its metadata.
    pub fn read_header(&mut self) -> Result<()> {
        if self.state != DemuxerState::Header {
            return Ok(());
        }
        let segment = scan::locate_segment(&mut self.reader)?;
        let layout = scan::scan_level1(&mut self.reader, &segment, &mut self.diagnostics)?;

        let mut have_info = false;
        let mut have_tracks = false;
        for element in &layout {
            let node = match element.id {
                INFO | TRACKS | CUES | CHAPTERS | TAGS | ATTACHMENTS | SEEK_HEAD => {
                    match element.read_node(&mut self.reader) {
                        Ok(node) => node,
                        Err(err) if err.is_recoverable() => {
                            self.diagnostics.error(&err);
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                }
                _ => continue,
            };

            match element.id {
                INFO if !have_info => {
                    self.segment_info = SegmentInfo::from_node(&node);
                    have_info = true;
                }
                INFO => debug!(position = element.position, "Ignoring additional Info"),
                TRACKS => {
                    self.add_tracks(&node, have_tracks);
                    have_tracks = true;
                }
                CUES => self.cues.points.extend(Cues::from_node(&node).points),
                CHAPTERS => self.chapters.merge(Chapters::from_node(&node)),
                TAGS => self.tags.merge(Tags::from_node(&node)),
                ATTACHMENTS => self.attachments.files.extend(Attachments::from_node(&node).files),
                _ => self.seek_head.entries.extend(SeekHead::from_node(&node).entries),
            }
        }

        if !have_info {
            self.diagnostics.warn("no segment information found, assuming defaults");
        }
        if self.segment_info.timestamp_scale == 0 {
            self.diagnostics.warn("timestamp scale 0 replaced by the default");
            self.segment_info.timestamp_scale = crate::info::DEFAULT_TIMESTAMP_SCALE;
        }
        if !have_tracks {
            self.diagnostics.warn("no track headers found");
        }

        self.clusters = layout.iter().filter(|e| e.id == CLUSTER).copied().collect();
        info!(
            doc_type = %segment.ebml_header.doc_type,
            tracks = self.tracks.len(),
            clusters = self.clusters.len(),
            "Read Matroska headers"
        );
        self.ebml_header = Some(segment.ebml_header.clone());
        self.segment = Some(segment);
        self.layout = layout;
        self.state = DemuxerState::Clusters;
        Ok(())
    }

    fn add_tracks(&mut self, node: &Node, repeated: bool) {
        let (tracks, errors) = tracks_from_node(node);
        for err in errors {
            if let MkvError::CodecConfiguration { track_number, .. } = err {
                self.disabled.insert(track_number);
            }
            self.diagnostics.error(&err);
        }
        for track in tracks {
            if self.tracks.iter().any(|t| t.number == track.number) {
                if !repeated {
                    self.diagnostics
                        .warn_track(track.number, "track number used twice, keeping the first entry");
                }
                continue;
            }
            self.tracks.push(track);
        }
    }

    /// Get a track by number.
    pub fn track(&self, number: u64) -> Option<&TrackEntry> {
        self.tracks.iter().find(|t| t.number == number)
    }

    /// Get the number of tracks.
    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Get the duration of the file in nanoseconds.
    pub fn duration_ns(&self) -> Option<i64> {
        self.segment_info.duration_ns()
    }

    /// Check if this is a WebM file.
    pub fn is_webm(&self) -> bool {
        self.ebml_header.as_ref().is_some_and(EbmlHeader::is_webm)
    }

    /// Read the next packet from the stream.
    ///
    /// Packets come in file order; laced frames are split into separate
    /// packets.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        if self.state == DemuxerState::Header {
            self.read_header()?;
        }

        loop {
            if let Some(packet) = self.pending.pop_front() {
                return Ok(Some(packet));
            }
            if self.state == DemuxerState::Eof || self.next_cluster >= self.clusters.len() {
                self.state = DemuxerState::Eof;
                return Ok(None);
            }
            let cluster = self.clusters[self.next_cluster];
            self.next_cluster += 1;
            self.read_cluster(&cluster)?;
        }
    }

    fn read_cluster(&mut self, cluster: &Level1Element) -> Result<()> {
        self.reader.seek(SeekFrom::Start(cluster.payload_start()))?;
        let mut payload = Vec::new();
        (&mut self.reader).take(cluster.size).read_to_end(&mut payload)?;
        let base = cluster.payload_start();
        debug!(position = cluster.position, size = payload.len(), "Reading cluster");

        let mut cluster_ts: Option<u64> = None;
        let mut pos = 0;
        while pos < payload.len() {
            let offset = base + pos as u64;
            let header = match ElementHeader::decode(&payload[pos..], offset) {
                Ok(header) => header,
                Err(err) => {
                    self.diagnostics.error(&err);
                    break;
                }
            };
            let start = pos + header.header_size;
            let Some(end) = header
                .size
                .and_then(|size| usize::try_from(size).ok())
                .and_then(|size| start.checked_add(size))
                .filter(|&end| end <= payload.len())
            else {
                self.diagnostics
                    .error(&MkvError::corruption(offset, "cluster child is truncated or has unknown size"));
                break;
            };
            let body = &payload[start..end];
            let body_offset = base + start as u64;
            pos = end;

            let result = match header.id {
                TIMESTAMP => {
                    cluster_ts = Some(ebml::read_unsigned_int(body));
                    Ok(())
                }
                SIMPLE_BLOCK | BLOCK_GROUP => {
                    let ts = match cluster_ts {
                        Some(ts) => ts,
                        None => {
                            self.diagnostics
                                .warn_at(offset, "block before the cluster timestamp, assuming 0");
                            cluster_ts = Some(0);
                            0
                        }
                    };
                    if header.id == SIMPLE_BLOCK {
                        Block::parse(body, body_offset).map(|block| self.emit(block, body_offset, ts, None, None))
                    } else {
                        self.read_block_group(body, body_offset, ts)
                    }
                }
                _ => Ok(()),
            };
            match result {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => self.diagnostics.error(&err),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn read_block_group(&mut self, body: &[u8], offset: u64, cluster_ts: u64) -> Result<()> {
        let group = Node::master(BLOCK_GROUP, Node::parse_children(body, offset, BLOCK_GROUP)?);
        let data = group
            .child_binary(BLOCK)
            .ok_or_else(|| MkvError::InvalidBlock {
                offset,
                message: "BlockGroup without Block".to_string(),
            })?;
        let block = Block::parse(data, offset)?;
        let duration = group.child_uint(BLOCK_DURATION);
        let references = group.children_with(REFERENCE_BLOCK).filter_map(Node::as_sint).collect();
        self.emit(block, offset, cluster_ts, duration, Some(references));
        Ok(())
    }

    /// Turn a block into packets. `references` is `None` for SimpleBlocks.
    fn emit(
        &mut self,
        block: Block,
        offset: u64,
        cluster_ts: u64,
        block_duration: Option<u64>,
        references: Option<Vec<i64>>,
    ) {
        let number = block.track_number;
        let Some(track) = self.tracks.iter().find(|t| t.number == number) else {
            if !self.disabled.contains(&number) && self.unknown_tracks.insert(number) {
                self.diagnostics
                    .warn_at(offset, format!("blocks of unknown track {number} are skipped"));
            }
            return;
        };

        let scale = i64::try_from(self.segment_info.timestamp_scale).unwrap_or(i64::MAX);
        let Some(block_ts) = i64::try_from(cluster_ts)
            .ok()
            .and_then(|ts| ts.checked_add(block.relative_timestamp as i64))
            .and_then(|ts| ts.checked_mul(scale))
        else {
            self.diagnostics
                .warn_at(offset, format!("block of track {number} has an out-of-range timestamp"));
            return;
        };
        if block_ts < 0 {
            self.diagnostics
                .warn_at(offset, format!("block of track {number} has a negative timestamp"));
            return;
        }

        let frames = block.frames.len() as i64;
        let total = match block_duration {
            Some(d) => match i64::try_from(d).ok().and_then(|d| d.checked_mul(scale)) {
                Some(total) => Some(total),
                None => {
                    self.diagnostics.warn_at(
                        offset,
                        format!("block of track {number} has an out-of-range duration"),
                    );
                    return;
                }
            },
            None => track
                .default_duration
                .and_then(|d| i64::try_from(d).ok())
                .and_then(|d| d.checked_mul(frames)),
        };
        // Remainders of uneven splits are dropped.
        let per_frame = total.map(|t| t / frames);

        let keyframe = match &references {
            Some(references) => references.is_empty(),
            None => block.is_keyframe(),
        };
        let mut bref = None;
        let mut fref = None;
        for reference in references.iter().flatten() {
            let Some(target) = reference.checked_mul(scale).and_then(|r| block_ts.checked_add(r)) else {
                self.diagnostics.warn_at(
                    offset,
                    format!("block of track {number} has an out-of-range reference"),
                );
                return;
            };
            if *reference <= 0 {
                bref = Some(target);
            } else {
                fref = Some(target);
            }
        }

        let mut flags = PacketFlags::empty();
        if keyframe {
            flags |= PacketFlags::KEYFRAME;
        }
        if block.flags.contains(BlockFlags::DISCARDABLE) && references.is_none() {
            flags |= PacketFlags::DISCARDABLE;
        }
        if block.flags.contains(BlockFlags::INVISIBLE) {
            flags |= PacketFlags::INVISIBLE;
        }
        if block_duration.is_some() {
            flags |= PacketFlags::DURATION_MANDATORY;
        }

        let prefix = track.header_removal_prefix();
        for (i, frame) in block.frames.into_iter().enumerate() {
            let data = match prefix {
                Some(prefix) => [prefix, frame.as_slice()].concat(),
                None => frame,
            };
            let timestamp = per_frame
                .unwrap_or(0)
                .saturating_mul(i as i64)
                .saturating_add(block_ts);
            let mut packet = Packet::new(number, timestamp, data).with_flags(flags);
            packet.duration = per_frame;
            packet.bref = bref;
            packet.fref = fref;
            packet.pos = Some(offset);
            self.pending.push_back(packet);
        }
    }

    /// Seek to the cluster holding `timestamp_ns`.
    ///
    /// Uses the cues when present and falls back to the cluster timestamps
    /// otherwise. The next packet is the first one of that cluster.
    pub fn seek(&mut self, timestamp_ns: i64) -> Result<()> {
        if self.state == DemuxerState::Header {
            self.read_header()?;
        }
        let scale = self.segment_info.timestamp_scale;
        let target = timestamp_ns.max(0) as u64 / scale;
        let data_start = self.segment.as_ref().map_or(0, |s| s.data_start);

        let from_cues = self
            .cues
            .points
            .iter()
            .filter(|point| point.time <= target)
            .max_by_key(|point| point.time)
            .and_then(|point| point.positions.first())
            .and_then(|position| data_start.checked_add(position.cluster_position))
            .and_then(|absolute| self.clusters.iter().position(|c| c.position == absolute));

        let index = match from_cues {
            Some(index) => index,
            None => {
                let mut best = 0;
                for (index, cluster) in self.clusters.clone().iter().enumerate() {
                    match self.cluster_timestamp(cluster)? {
                        Some(ts) if ts <= target => best = index,
                        Some(_) => break,
                        None => {}
                    }
                }
                best
            }
        };

        debug!(timestamp_ns, cluster = index, "Seeking");
        self.next_cluster = index;
        self.pending.clear();
        self.state = DemuxerState::Clusters;
        Ok(())
    }

    /// The Timestamp child of a cluster, in ticks.
    fn cluster_timestamp(&mut self, cluster: &Level1Element) -> Result<Option<u64>> {
        let mut pos = cluster.payload_start();
        while pos < cluster.end() {
            self.reader.seek(SeekFrom::Start(pos))?;
            let header = match ElementHeader::read(&mut self.reader) {
                Ok(header) => header,
                Err(err) if err.is_recoverable() || err.is_eof() => return Ok(None),
                Err(err) => return Err(err),
            };
            let Some(size) = header.size else {
                return Ok(None);
            };
            if header.id == TIMESTAMP {
                if size > 8 {
                    return Ok(None);
                }
                let mut body = [0u8; 8];
                self.reader.read_exact(&mut body[..size as usize])?;
                return Ok(Some(ebml::read_unsigned_int(&body[..size as usize])));
            }
            let Some(next) = pos.checked_add(header.header_size as u64 + size) else {
                return Ok(None);
            };
            pos = next;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::muxer::{MkvMuxer, MuxerConfig};
    use crate::track::{tracks_to_node, AudioSettings, ContentCompression, VideoSettings};
    use std::io::Cursor;

    const MS: i64 = 1_000_000;

    fn build(children: &[Node]) -> Vec<u8> {
        let mut out = EbmlHeader::default().to_node().render().unwrap();
        let segment = Node::master(SEGMENT, children.to_vec());
        out.extend(segment.render().unwrap());
        out
    }

    fn audio_track(number: u64) -> TrackEntry {
        let mut track = TrackEntry::new(number, TrackType::Audio, codec_ids::A_PCM_INT_LIT);
        track.uid = number;
        track.audio = Some(AudioSettings::new(48000.0, 2));
        track.default_duration = Some(10_000_000);
        track
    }

    fn simple_block(track: u64, relative: i16, keyframe: bool, frames: Vec<Vec<u8>>) -> Node {
        let mut block = if frames.len() == 1 {
            Block::new(track, relative, frames.into_iter().next().unwrap())
        } else {
            Block::laced(track, relative, frames)
        };
        if keyframe {
            block.flags |= BlockFlags::KEYFRAME;
        }
        Node::binary(SIMPLE_BLOCK, block.render().unwrap())
    }

    fn headers(tracks: &[TrackEntry]) -> Vec<Node> {
        vec![
            Node::master(INFO, vec![Node::uint(TIMESTAMP_SCALE, 1_000_000)]),
            tracks_to_node(tracks).unwrap(),
        ]
    }

    fn read_all<R: Read + Seek>(demuxer: &mut MkvDemuxer<R>) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Some(packet) = demuxer.read_packet().unwrap() {
            packets.push(packet);
        }
        packets
    }

    #[test]
    fn test_demuxer_creation() {
        let demuxer = MkvDemuxer::new(Cursor::new(Vec::new()));
        assert_eq!(demuxer.state(), DemuxerState::Header);
        assert!(MkvDemuxer::open(Cursor::new(Vec::new())).is_err());
    }

    #[test]
    fn test_laced_simple_block() {
        let mut children = headers(&[audio_track(1)]);
        children.push(Node::master(
            CLUSTER,
            vec![
                Node::uint(TIMESTAMP, 100),
                simple_block(1, 5, true, vec![vec![1; 4], vec![2; 4], vec![3; 4]]),
            ],
        ));
        let mut demuxer = MkvDemuxer::open(Cursor::new(build(&children))).unwrap();
        let packets = read_all(&mut demuxer);

        let timestamps: Vec<i64> = packets.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![105 * MS, 115 * MS, 125 * MS]);
        assert!(packets.iter().all(|p| p.is_keyframe() && p.duration == Some(10 * MS)));
        assert_eq!(packets[2].data(), &[3; 4]);
        assert!(demuxer.diagnostics().is_empty());
        assert_eq!(demuxer.state(), DemuxerState::Eof);
    }

    #[test]
    fn test_block_group_references_and_duration() {
        let mut children = headers(&[audio_track(1)]);
        let block = Block::laced(1, 60, vec![vec![1], vec![2], vec![3]]).render().unwrap();
        children.push(Node::master(
            CLUSTER,
            vec![
                Node::uint(TIMESTAMP, 0),
                Node::master(
                    BLOCK_GROUP,
                    vec![
                        Node::binary(BLOCK, block),
                        Node::uint(BLOCK_DURATION, 10),
                        Node::sint(REFERENCE_BLOCK, 40),
                        Node::sint(REFERENCE_BLOCK, -20),
                    ],
                ),
            ],
        ));
        let mut demuxer = MkvDemuxer::open(Cursor::new(build(&children))).unwrap();
        let packets = read_all(&mut demuxer);

        let timestamps: Vec<i64> = packets.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![60 * MS, 60 * MS + 3_333_333, 60 * MS + 6_666_666]);
        let first = &packets[0];
        assert!(!first.is_keyframe());
        assert_eq!(first.bref, Some(40 * MS));
        assert_eq!(first.fref, Some(100 * MS));
        assert_eq!(first.duration, Some(3_333_333));
        assert!(first.flags.contains(PacketFlags::DURATION_MANDATORY));
    }

    #[test]
    fn test_out_of_range_cluster_timestamp_is_skipped() {
        let mut children = headers(&[audio_track(1)]);
        children.push(Node::master(
            CLUSTER,
            vec![Node::uint(TIMESTAMP, 1 << 62), simple_block(1, 0, true, vec![vec![1]])],
        ));
        children.push(Node::master(
            CLUSTER,
            vec![Node::uint(TIMESTAMP, 10), simple_block(1, 0, true, vec![vec![2]])],
        ));
        let mut demuxer = MkvDemuxer::open(Cursor::new(build(&children))).unwrap();
        let packets = read_all(&mut demuxer);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].timestamp, 10 * MS);
        assert_eq!(demuxer.diagnostics().len(), 1);
        assert!(demuxer.diagnostics().warnings()[0]
            .to_string()
            .contains("out-of-range timestamp"));
    }

    #[test]
    fn test_out_of_range_block_duration_is_skipped() {
        let mut children = headers(&[audio_track(1)]);
        let block = Block::new(1, 0, vec![7]).render().unwrap();
        children.push(Node::master(
            CLUSTER,
            vec![
                Node::uint(TIMESTAMP, 0),
                Node::master(
                    BLOCK_GROUP,
                    vec![Node::binary(BLOCK, block.clone()), Node::uint(BLOCK_DURATION, 1 << 62)],
                ),
                Node::master(
                    BLOCK_GROUP,
                    vec![Node::binary(BLOCK, block), Node::sint(REFERENCE_BLOCK, i64::MIN / 2)],
                ),
                simple_block(1, 20, true, vec![vec![8]]),
            ],
        ));
        let mut demuxer = MkvDemuxer::open(Cursor::new(build(&children))).unwrap();
        let packets = read_all(&mut demuxer);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data(), &[8]);
        let messages: Vec<String> = demuxer
            .diagnostics()
            .warnings()
            .iter()
            .map(|w| w.to_string())
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("out-of-range duration"));
        assert!(messages[1].contains("out-of-range reference"));
    }

    #[test]
    fn test_header_removal_restored() {
        let mut track = audio_track(1);
        track.compression = Some(ContentCompression::header_removal(vec![0xAA, 0xBB]));
        let mut children = headers(&[track]);
        children.push(Node::master(
            CLUSTER,
            vec![Node::uint(TIMESTAMP, 0), simple_block(1, 0, true, vec![vec![1, 2]])],
        ));
        let mut demuxer = MkvDemuxer::open(Cursor::new(build(&children))).unwrap();
        let packet = demuxer.read_packet().unwrap().unwrap();
        assert_eq!(packet.data(), &[0xAA, 0xBB, 1, 2]);
    }

    #[test]
    fn test_unknown_track_skipped_once() {
        let mut children = headers(&[audio_track(1)]);
        children.push(Node::master(
            CLUSTER,
            vec![
                Node::uint(TIMESTAMP, 0),
                simple_block(9, 0, true, vec![vec![0]]),
                simple_block(1, 0, true, vec![vec![1]]),
                simple_block(9, 10, true, vec![vec![0]]),
            ],
        ));
        let mut demuxer = MkvDemuxer::open(Cursor::new(build(&children))).unwrap();
        let packets = read_all(&mut demuxer);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].track_number, 1);
        assert_eq!(demuxer.diagnostics().len(), 1);
    }

    #[test]
    fn test_track_with_codec_problem_disabled() {
        let broken = Node::master(
            TRACK_ENTRY,
            vec![Node::uint(TRACK_NUMBER, 2), Node::uint(TRACK_UID, 2), Node::uint(TRACK_TYPE, 2)],
        );
        let mut tracks = tracks_to_node(&[audio_track(1)]).unwrap();
        tracks.push(broken);
        let children = vec![
            Node::master(INFO, vec![Node::uint(TIMESTAMP_SCALE, 1_000_000)]),
            tracks,
            Node::master(
                CLUSTER,
                vec![
                    Node::uint(TIMESTAMP, 0),
                    simple_block(2, 0, true, vec![vec![0]]),
                    simple_block(1, 0, true, vec![vec![1]]),
                ],
            ),
        ];
        let mut demuxer = MkvDemuxer::open(Cursor::new(build(&children))).unwrap();
        assert_eq!(demuxer.num_tracks(), 1);
        let packets = read_all(&mut demuxer);
        assert_eq!(packets.len(), 1);
        // Only the codec problem is reported, not every skipped block.
        assert_eq!(demuxer.diagnostics().len(), 1);
    }

    #[test]
    fn test_corrupt_cluster_recovery() {
        let mut children = headers(&[audio_track(1)]);
        children.push(Node::master(
            CLUSTER,
            vec![Node::uint(TIMESTAMP, 0), simple_block(1, 0, true, vec![vec![1]])],
        ));
        children.push(Node::master(
            CLUSTER,
            vec![Node::uint(TIMESTAMP, 50), simple_block(1, 0, true, vec![vec![2]])],
        ));
        let mut data = build(&children);

        // Damage the first cluster's SimpleBlock size so it overruns the
        // cluster payload.
        let first_cluster = data
            .windows(4)
            .position(|w| w == [0x1F, 0x43, 0xB6, 0x75])
            .unwrap();
        let block_at = data[first_cluster..].iter().position(|&b| b == 0xA3).unwrap() + first_cluster;
        data[block_at + 1] = 0x8F;

        let mut demuxer = MkvDemuxer::open(Cursor::new(data)).unwrap();
        let packets = read_all(&mut demuxer);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].timestamp, 50 * MS);
        assert_eq!(demuxer.diagnostics().len(), 1);
    }

    fn muxed_video(write_cues: bool) -> Vec<u8> {
        let mut muxer = MkvMuxer::new(
            Cursor::new(Vec::new()),
            MuxerConfig {
                write_cues,
                write_date: false,
                ..Default::default()
            },
        );
        let mut track = TrackEntry::new(1, TrackType::Video, codec_ids::V_VP9);
        track.video = Some(VideoSettings::new(320, 240));
        track.default_duration = Some(40_000_000);
        muxer.add_track(track, None).unwrap();
        for i in 0..200 {
            muxer.write_packet(Packet::new(1, i * 40 * MS, vec![i as u8; 8])).unwrap();
        }
        muxer.finalize().unwrap();
        muxer.into_inner().into_inner()
    }

    #[test]
    fn test_muxer_roundtrip() {
        let mut demuxer = MkvDemuxer::open(Cursor::new(muxed_video(true))).unwrap();
        assert_eq!(demuxer.duration_ns(), Some(8_000 * MS));
        assert_eq!(demuxer.track(1).unwrap().codec(), codec_ids::V_VP9);
        assert_eq!(demuxer.cues.count_for_track(1), 200);
        assert!(demuxer.seek_head.position_of(TRACKS).is_some());

        let packets = read_all(&mut demuxer);
        assert_eq!(packets.len(), 200);
        for (i, packet) in packets.iter().enumerate() {
            assert_eq!(packet.timestamp, i as i64 * 40 * MS);
            assert_eq!(packet.data(), &[i as u8; 8]);
        }
    }

    #[test]
    fn test_seek_with_and_without_cues() {
        for write_cues in [true, false] {
            let mut demuxer = MkvDemuxer::open(Cursor::new(muxed_video(write_cues))).unwrap();
            demuxer.seek(4_100 * MS).unwrap();
            let packet = demuxer.read_packet().unwrap().unwrap();
            assert_eq!(packet.timestamp, 4_000 * MS, "cues: {write_cues}");

            demuxer.seek(0).unwrap();
            assert_eq!(demuxer.read_packet().unwrap().unwrap().timestamp, 0);
        }
    }
}
