//! Grouping packets into clusters.
//!
//! The [`ClusterHelper`] receives packets in final (coding) order from all
//! tracks, decides where clusters start, picks SimpleBlock, BlockGroup or a
//! laced block for each packet and marks the blocks that get cue entries.
//! Clusters are rendered completely in memory, so their size is always known.

use crate::block::{Block, BlockFlags};
use crate::elements::*;
use crate::ebml::ElementHeader;
use crate::error::{MkvError, Result};
use crate::track::TrackEntry;
use crate::tree::Node;
use mkvkit_core::{Packet, PacketFlags};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_MAX_CLUSTER_DURATION: i64 = 5_000_000_000;
pub const DEFAULT_MAX_CLUSTER_BLOCKS: usize = 65_535;
pub const DEFAULT_MAX_CLUSTER_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_AUDIO_CUE_INTERVAL: i64 = 2_000_000_000;

/// Most frames put into one laced block.
pub const MAX_FRAMES_PER_LACE: usize = 8;

const CLUSTER_CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Size of a CRC-32 element: ID, one-byte size and four bytes of checksum.
const CRC_ELEMENT_SIZE: u64 = 6;

/// Which blocks of a track get cue entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueStrategy {
    None,
    /// Every keyframe.
    Keyframes,
    /// At most one cue per audio cue interval.
    Sparse,
    All,
}

impl CueStrategy {
    pub fn default_for(track_type: Option<TrackType>) -> Self {
        match track_type {
            Some(TrackType::Video | TrackType::Subtitle) => CueStrategy::Keyframes,
            Some(TrackType::Audio) => CueStrategy::Sparse,
            _ => CueStrategy::None,
        }
    }
}

/// Cluster limits and encoding options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    /// Nanoseconds.
    pub max_duration: i64,
    pub max_blocks: usize,
    pub max_bytes: usize,
    /// A video keyframe starts a new cluster once the current one is at
    /// least this old (nanoseconds).
    pub keyframe_alignment: Option<i64>,
    /// Write a CRC-32 element as the first child of every cluster.
    pub crc32: bool,
    pub lacing: bool,
    /// Nanoseconds between sparse cues.
    pub audio_cue_interval: i64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            max_duration: DEFAULT_MAX_CLUSTER_DURATION,
            max_blocks: DEFAULT_MAX_CLUSTER_BLOCKS,
            max_bytes: DEFAULT_MAX_CLUSTER_BYTES,
            keyframe_alignment: Some(2_000_000_000),
            crc32: false,
            lacing: true,
            audio_cue_interval: DEFAULT_AUDIO_CUE_INTERVAL,
        }
    }
}

/// What the cluster helper needs to know about a track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLayout {
    pub number: u64,
    pub track_type: Option<TrackType>,
    /// Nanoseconds.
    pub default_duration: Option<i64>,
    pub lacing: bool,
    pub cues: CueStrategy,
}

impl TrackLayout {
    pub fn from_entry(entry: &TrackEntry, cues: CueStrategy) -> Self {
        Self {
            number: entry.number,
            track_type: entry.track_type,
            default_duration: entry.default_duration.map(|d| d as i64),
            lacing: entry.flag_lacing,
            cues,
        }
    }
}

/// A cue entry produced while rendering a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterCue {
    pub track: u64,
    /// Ticks.
    pub time: u64,
    /// Offset of the block inside the cluster payload.
    pub relative_position: Option<u64>,
    /// Ticks.
    pub duration: Option<u64>,
}

/// An encoded cluster.
#[derive(Debug, Clone)]
pub struct RenderedCluster {
    /// Complete Cluster element.
    pub bytes: Vec<u8>,
    /// Ticks.
    pub timestamp: u64,
    pub block_count: usize,
    pub cues: Vec<ClusterCue>,
}

/// Buffers the packets of the current cluster.
#[derive(Debug)]
pub struct ClusterHelper {
    options: ClusterOptions,
    timestamp_scale: i64,
    tracks: HashMap<u64, TrackLayout>,
    packets: Vec<Packet>,
    bytes: usize,
    /// Nanoseconds, of the packets in the current cluster.
    first_timestamp: i64,
    min_timestamp: i64,
    max_timestamp: i64,
    /// Ticks.
    last_cluster_timestamp: Option<i64>,
    last_cue: HashMap<u64, i64>,
    clusters: u64,
}

impl ClusterHelper {
    pub fn new(options: ClusterOptions, timestamp_scale: u64) -> Self {
        Self {
            options,
            timestamp_scale: timestamp_scale.max(1) as i64,
            tracks: HashMap::new(),
            packets: Vec::new(),
            bytes: 0,
            first_timestamp: 0,
            min_timestamp: 0,
            max_timestamp: 0,
            last_cluster_timestamp: None,
            last_cue: HashMap::new(),
            clusters: 0,
        }
    }

    pub fn add_track(&mut self, layout: TrackLayout) {
        self.tracks.insert(layout.number, layout);
    }

    pub fn update_track(&mut self, entry: &TrackEntry) {
        if let Some(layout) = self.tracks.get_mut(&entry.number) {
            layout.default_duration = entry.default_duration.map(|d| d as i64);
            layout.lacing = entry.flag_lacing;
        }
    }

    pub fn clusters_rendered(&self) -> u64 {
        self.clusters
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Nanoseconds to ticks, rounded.
    pub fn to_ticks(&self, ns: i64) -> i64 {
        (ns + self.timestamp_scale / 2).div_euclid(self.timestamp_scale)
    }

    /// Queue a packet. Returns the previous cluster if this packet starts a
    /// new one.
    pub fn add(&mut self, packet: Packet) -> Result<Option<RenderedCluster>> {
        let layout = self
            .tracks
            .get(&packet.track_number)
            .ok_or(MkvError::TrackNotFound {
                track_number: packet.track_number,
            })?;
        if packet.timestamp < 0 {
            return Err(MkvError::InvalidState(format!(
                "track {}: negative timestamp {} reached the cluster helper",
                packet.track_number, packet.timestamp
            )));
        }

        let rendered = if self.needs_new_cluster(&packet, layout) {
            self.render()?
        } else {
            None
        };

        if self.packets.is_empty() {
            self.first_timestamp = packet.timestamp;
            self.min_timestamp = packet.timestamp;
            self.max_timestamp = packet.timestamp;
        } else {
            self.min_timestamp = self.min_timestamp.min(packet.timestamp);
            self.max_timestamp = self.max_timestamp.max(packet.timestamp);
        }
        self.bytes += packet.size();
        self.packets.push(packet);
        Ok(rendered)
    }

    /// Render whatever is buffered.
    pub fn flush(&mut self) -> Result<Option<RenderedCluster>> {
        self.render()
    }

    fn needs_new_cluster(&self, packet: &Packet, layout: &TrackLayout) -> bool {
        if self.packets.is_empty() {
            return false;
        }
        let age = packet.timestamp - self.first_timestamp;
        if self.packets.len() >= self.options.max_blocks
            || self.bytes + packet.size() > self.options.max_bytes
            || age > self.options.max_duration
        {
            return true;
        }

        let lowest = self.to_ticks(self.min_timestamp.min(packet.timestamp));
        let highest = self.to_ticks(self.max_timestamp.max(packet.timestamp));
        let base = self.cluster_base(lowest);
        if highest - base > i16::MAX as i64 || lowest - base < i16::MIN as i64 {
            return true;
        }

        layout.track_type == Some(TrackType::Video)
            && packet.is_keyframe()
            && self.options.keyframe_alignment.is_some_and(|limit| age >= limit)
    }

    /// Cluster timestamps never go backwards.
    fn cluster_base(&self, lowest: i64) -> i64 {
        self.last_cluster_timestamp.map_or(lowest, |last| lowest.max(last))
    }

    fn render(&mut self) -> Result<Option<RenderedCluster>> {
        if self.packets.is_empty() {
            return Ok(None);
        }
        let packets = std::mem::take(&mut self.packets);
        self.bytes = 0;

        let timestamp = self.cluster_base(self.to_ticks(self.min_timestamp));
        let mut payload = Vec::new();
        Node::uint(TIMESTAMP, timestamp as u64).write(&mut payload)?;

        let mut cues = Vec::new();
        let mut block_count = 0;
        let mut index = 0;
        while index < packets.len() {
            let run = self.lace_run(&packets[index..]);
            let group = &packets[index..index + run];
            let first = &group[0];
            let layout = self
                .tracks
                .get(&first.track_number)
                .cloned()
                .ok_or(MkvError::TrackNotFound {
                    track_number: first.track_number,
                })?;

            let relative = i16::try_from(self.to_ticks(first.timestamp) - timestamp).map_err(|_| {
                MkvError::InvalidState(format!(
                    "track {}: block timestamp does not fit the cluster",
                    first.track_number
                ))
            })?;
            let position = payload.len() as u64;
            let duration = self.block_duration(group, &layout);

            if first.has_references() || duration.is_some() {
                self.write_block_group(&mut payload, group, relative, duration)?;
            } else {
                let mut block = self.block_for(group, relative);
                if first.is_keyframe() {
                    block.flags |= BlockFlags::KEYFRAME;
                }
                if first.flags.contains(PacketFlags::DISCARDABLE) {
                    block.flags |= BlockFlags::DISCARDABLE;
                }
                Node::binary(SIMPLE_BLOCK, block.render()?).write(&mut payload)?;
            }

            if self.wants_cue(first, &layout) {
                let subtitle = layout.track_type == Some(TrackType::Subtitle);
                cues.push(ClusterCue {
                    track: first.track_number,
                    time: self.to_ticks(first.timestamp) as u64,
                    relative_position: subtitle.then_some(position),
                    duration: if subtitle {
                        first.duration.map(|d| self.to_ticks(d) as u64)
                    } else {
                        None
                    },
                });
            }

            block_count += 1;
            index += run;
        }

        if self.options.crc32 {
            let checksum = CLUSTER_CRC.checksum(&payload);
            let mut with_crc = Vec::with_capacity(payload.len() + CRC_ELEMENT_SIZE as usize);
            Node::binary(CRC32, checksum.to_le_bytes().to_vec()).write(&mut with_crc)?;
            with_crc.extend_from_slice(&payload);
            payload = with_crc;
            for cue in &mut cues {
                cue.relative_position = cue.relative_position.map(|p| p + CRC_ELEMENT_SIZE);
            }
        }

        let mut bytes = Vec::with_capacity(payload.len() + 12);
        ElementHeader::new(CLUSTER, payload.len() as u64).write(&mut bytes)?;
        bytes.extend_from_slice(&payload);

        self.last_cluster_timestamp = Some(timestamp);
        self.clusters += 1;
        debug!(
            timestamp,
            blocks = block_count,
            size = bytes.len(),
            "Rendered cluster"
        );
        Ok(Some(RenderedCluster {
            bytes,
            timestamp: timestamp as u64,
            block_count,
            cues,
        }))
    }

    /// Number of packets starting at `packets[0]` that go into one block.
    fn lace_run(&self, packets: &[Packet]) -> usize {
        let Some(first) = packets.first() else {
            return 0;
        };
        let Some(layout) = self.tracks.get(&first.track_number) else {
            return 1;
        };
        let Some(default_duration) = layout.default_duration.filter(|d| *d > 0) else {
            return 1;
        };
        if !self.options.lacing || !layout.lacing || layout.track_type != Some(TrackType::Audio) {
            return 1;
        }
        let lacable = |packet: &Packet| {
            packet.is_keyframe()
                && !packet.has_references()
                && !packet.flags.contains(PacketFlags::DURATION_MANDATORY)
                && packet.duration.map_or(true, |d| d == default_duration)
        };
        if !lacable(first) {
            return 1;
        }

        let mut run = 1;
        while run < packets.len().min(MAX_FRAMES_PER_LACE) {
            let (previous, next) = (&packets[run - 1], &packets[run]);
            if next.track_number != first.track_number
                || next.timestamp != previous.timestamp + default_duration
                || !lacable(next)
            {
                break;
            }
            run += 1;
        }
        run
    }

    fn block_for(&self, group: &[Packet], relative: i16) -> Block {
        let first = &group[0];
        let mut block = if group.len() == 1 {
            Block::new(first.track_number, relative, first.data().to_vec())
        } else {
            let frames = group.iter().map(|p| p.data().to_vec()).collect();
            Block::laced(first.track_number, relative, frames)
        };
        if first.flags.contains(PacketFlags::INVISIBLE) {
            block.flags |= BlockFlags::INVISIBLE;
        }
        block
    }

    /// BlockDuration in ticks, when the block needs one.
    fn block_duration(&self, group: &[Packet], layout: &TrackLayout) -> Option<u64> {
        let first = &group[0];
        let duration = first.duration?;
        let forced = first.flags.contains(PacketFlags::DURATION_MANDATORY)
            || layout.track_type == Some(TrackType::Subtitle);
        let differs = layout
            .default_duration
            .is_some_and(|default| self.to_ticks(default) != self.to_ticks(duration));
        (forced || differs).then(|| self.to_ticks(duration) as u64)
    }

    fn write_block_group(
        &self,
        payload: &mut Vec<u8>,
        group: &[Packet],
        relative: i16,
        duration: Option<u64>,
    ) -> Result<()> {
        let first = &group[0];
        let block = self.block_for(group, relative);
        let mut node = Node::new_master(BLOCK_GROUP);
        node.push(Node::binary(BLOCK, block.render()?));
        if let Some(duration) = duration {
            node.push(Node::uint(BLOCK_DURATION, duration));
        }
        let own = self.to_ticks(first.timestamp);
        for reference in [first.bref, first.fref].into_iter().flatten() {
            node.push(Node::sint(REFERENCE_BLOCK, self.to_ticks(reference) - own));
        }
        node.write(payload)?;
        Ok(())
    }

    fn wants_cue(&mut self, packet: &Packet, layout: &TrackLayout) -> bool {
        let wanted = match layout.cues {
            CueStrategy::None => false,
            CueStrategy::All => true,
            CueStrategy::Keyframes => packet.is_keyframe() && !packet.has_references(),
            CueStrategy::Sparse => self
                .last_cue
                .get(&packet.track_number)
                .map_or(true, |last| packet.timestamp - last >= self.options.audio_cue_interval),
        };
        if wanted {
            self.last_cue.insert(packet.track_number, packet.timestamp);
        }
        wanted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml;
    use crate::elements::codec_ids;

    const MS: i64 = 1_000_000;

    fn helper(options: ClusterOptions) -> ClusterHelper {
        let mut helper = ClusterHelper::new(options, 1_000_000);
        let mut audio = TrackEntry::new(1, TrackType::Audio, codec_ids::A_PCM_INT_LIT);
        audio.default_duration = Some(20_000_000);
        helper.add_track(TrackLayout::from_entry(&audio, CueStrategy::Sparse));
        let video = TrackEntry::new(2, TrackType::Video, codec_ids::V_MPEG4_ISO_AVC);
        helper.add_track(TrackLayout::from_entry(&video, CueStrategy::Keyframes));
        let subs = TrackEntry::new(3, TrackType::Subtitle, codec_ids::S_TEXT_UTF8);
        helper.add_track(TrackLayout::from_entry(&subs, CueStrategy::Keyframes));
        helper
    }

    fn children(cluster: &RenderedCluster) -> Vec<Node> {
        let node = Node::parse(&cluster.bytes, SEGMENT).unwrap();
        node.children().to_vec()
    }

    #[test]
    fn test_simple_blocks_and_cues() {
        let mut helper = helper(ClusterOptions {
            lacing: false,
            ..Default::default()
        });
        assert!(helper.add(Packet::new(2, 0, vec![1, 2, 3])).unwrap().is_none());
        assert!(helper
            .add(Packet::new(2, 40 * MS, vec![4]).with_bref(0))
            .unwrap()
            .is_none());
        let cluster = helper.flush().unwrap().unwrap();
        assert_eq!(cluster.timestamp, 0);
        assert_eq!(cluster.block_count, 2);
        assert_eq!(cluster.cues.len(), 1);

        let children = children(&cluster);
        assert_eq!(children[0].id, TIMESTAMP);
        assert_eq!(children[1].id, SIMPLE_BLOCK);
        assert_eq!(children[2].id, BLOCK_GROUP);
        let block = Block::parse(children[1].as_binary().unwrap(), 0).unwrap();
        assert!(block.is_keyframe());
        assert_eq!(block.frames, vec![vec![1, 2, 3]]);
        assert_eq!(children[2].child_sint(REFERENCE_BLOCK), Some(-40));
        assert!(helper.flush().unwrap().is_none());
    }

    #[test]
    fn test_duration_limit_starts_new_cluster() {
        let mut helper = helper(ClusterOptions {
            max_duration: 100 * MS,
            lacing: false,
            ..Default::default()
        });
        let mut rendered = Vec::new();
        for i in 0..10 {
            if let Some(cluster) = helper.add(Packet::new(1, i * 20 * MS, vec![0; 4])).unwrap() {
                rendered.push(cluster);
            }
        }
        rendered.extend(helper.flush().unwrap());
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].block_count, 6);
        assert_eq!(rendered[1].timestamp, 120);
        // Sparse audio cues: only the first block.
        assert_eq!(rendered.iter().map(|c| c.cues.len()).sum::<usize>(), 1);
    }

    #[test]
    fn test_block_limit() {
        let mut helper = helper(ClusterOptions {
            max_blocks: 3,
            lacing: false,
            ..Default::default()
        });
        let mut count = 0;
        for i in 0..7 {
            if helper.add(Packet::new(1, i * MS, vec![0])).unwrap().is_some() {
                count += 1;
            }
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_relative_timestamp_range() {
        let mut helper = helper(ClusterOptions {
            max_duration: i64::MAX,
            keyframe_alignment: None,
            ..Default::default()
        });
        helper.add(Packet::new(3, 0, vec![0])).unwrap();
        let rendered = helper.add(Packet::new(3, 40_000 * MS, vec![0])).unwrap();
        assert!(rendered.is_some());
    }

    #[test]
    fn test_keyframe_alignment() {
        let mut helper = helper(ClusterOptions {
            keyframe_alignment: Some(100 * MS),
            ..Default::default()
        });
        helper.add(Packet::new(2, 0, vec![0])).unwrap();
        assert!(helper.add(Packet::new(2, 50 * MS, vec![0])).unwrap().is_none());
        assert!(helper.add(Packet::new(2, 100 * MS, vec![0])).unwrap().is_some());
    }

    #[test]
    fn test_audio_lacing() {
        let mut helper = helper(ClusterOptions::default());
        for i in 0..10 {
            helper
                .add(Packet::new(1, i * 20 * MS, vec![i as u8; 5]).with_duration(20 * MS))
                .unwrap();
        }
        let cluster = helper.flush().unwrap().unwrap();
        assert_eq!(cluster.block_count, 2);

        let children = children(&cluster);
        let first = Block::parse(children[1].as_binary().unwrap(), 0).unwrap();
        assert_eq!(first.frame_count(), MAX_FRAMES_PER_LACE);
        assert_eq!(first.frames[3], vec![3; 5]);
        let second = Block::parse(children[2].as_binary().unwrap(), 0).unwrap();
        assert_eq!(second.frame_count(), 2);
        assert_eq!(second.relative_timestamp, 160);
    }

    #[test]
    fn test_subtitle_block_group_and_cue() {
        let mut helper = helper(ClusterOptions {
            crc32: true,
            ..Default::default()
        });
        helper
            .add(Packet::new(3, 1000 * MS, b"hello".to_vec()).with_duration(1500 * MS))
            .unwrap();
        let cluster = helper.flush().unwrap().unwrap();

        let children = children(&cluster);
        assert_eq!(children[0].id, CRC32);
        assert_eq!(children[2].id, BLOCK_GROUP);
        assert_eq!(children[2].child_uint(BLOCK_DURATION), Some(1500));

        let cue = cluster.cues[0];
        assert_eq!(cue.time, 1000);
        assert_eq!(cue.duration, Some(1500));

        // The relative position points at the BlockGroup inside the payload.
        let header = ebml::ElementHeader::decode(&cluster.bytes, 0).unwrap();
        let payload = &cluster.bytes[header.header_size..];
        let at = cue.relative_position.unwrap() as usize;
        assert_eq!(payload[at], 0xA0);

        let checksum = u32::from_le_bytes(payload[2..6].try_into().unwrap());
        assert_eq!(checksum, CLUSTER_CRC.checksum(&payload[6..]));
    }

    #[test]
    fn test_unknown_track() {
        let mut helper = helper(ClusterOptions::default());
        assert!(matches!(
            helper.add(Packet::new(9, 0, vec![0])),
            Err(MkvError::TrackNotFound { track_number: 9 })
        ));
    }
}
