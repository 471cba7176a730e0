//! Per-track packet queue between a packet source and the writer.
//!
//! A [`Packetizer`] owns one output track. It applies timestamp sync,
//! header-removal compression and the track's [`TimestampFactory`], and
//! releases packets in coding order once their final timestamps are known.
//!
//! When the factory runs depends on the [`FactoryMode`]:
//!
//! * `Immediate`: every packet as soon as it arrives.
//! * `ShortQueueing`: a packet waits until a later packet with a timestamp at
//!   or above its own shows up; the packets in between are assigned first.
//! * `FullQueueing`: a whole group from one keyframe up to the next one is
//!   held and assigned in presentation order.

use crate::diagnostics::Diagnostics;
use crate::elements::TrackType;
use crate::error::{MkvError, Result};
use crate::timestamps::TimestampFactory;
use crate::track::TrackEntry;
use mkvkit_core::{format_timestamp, Packet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::str::FromStr;
use tracing::debug;

/// Number of pre-factory to assigned timestamp mappings kept for resolving
/// references.
const REFERENCE_MEMORY: usize = 512;

/// When the timestamp factory is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryMode {
    Immediate,
    ShortQueueing,
    FullQueueing,
}

impl FactoryMode {
    pub fn default_for(track_type: Option<TrackType>, has_factory: bool) -> Self {
        match track_type {
            Some(TrackType::Video) => FactoryMode::FullQueueing,
            Some(TrackType::Subtitle | TrackType::Buttons) => FactoryMode::Immediate,
            _ if has_factory => FactoryMode::FullQueueing,
            _ => FactoryMode::Immediate,
        }
    }
}

/// Linear timestamp correction: `t * numerator / denominator + displacement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampSync {
    /// Nanoseconds.
    pub displacement: i64,
    pub numerator: i64,
    pub denominator: i64,
}

impl Default for TimestampSync {
    fn default() -> Self {
        Self {
            displacement: 0,
            numerator: 1,
            denominator: 1,
        }
    }
}

impl TimestampSync {
    pub fn new(displacement: i64) -> Self {
        Self {
            displacement,
            ..Default::default()
        }
    }

    pub fn is_identity(&self) -> bool {
        self.displacement == 0 && self.numerator == self.denominator
    }

    /// Apply the ratio only (used for durations).
    pub fn scale(&self, value: i64) -> i64 {
        (value as i128 * self.numerator as i128 / self.denominator as i128) as i64
    }

    pub fn apply(&self, timestamp: i64) -> i64 {
        self.scale(timestamp) + self.displacement
    }
}

/// Parses `ms[,num/den]`, e.g. `-200` or `0,25/24`.
impl FromStr for TimestampSync {
    type Err = MkvError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |message: &str| MkvError::InvalidProperty {
            name: "sync".to_string(),
            message: format!("'{s}': {message}"),
        };

        let (delay, ratio) = match s.split_once(',') {
            Some((delay, ratio)) => (delay, Some(ratio)),
            None => (s, None),
        };
        let delay_ms: f64 = delay
            .trim()
            .parse()
            .map_err(|_| invalid("the delay must be a number of milliseconds"))?;

        let mut sync = TimestampSync::new((delay_ms * 1_000_000.0).round() as i64);
        if let Some(ratio) = ratio {
            let (num, den) = match ratio.split_once('/') {
                Some((num, den)) => (num.trim().parse::<f64>(), den.trim().parse::<f64>()),
                None => (ratio.trim().parse::<f64>(), Ok(1.0)),
            };
            let (num, den) = match (num, den) {
                (Ok(num), Ok(den)) if num > 0.0 && den > 0.0 => (num, den),
                _ => return Err(invalid("the ratio must look like 'num/den' with positive values")),
            };
            // Three decimal places.
            sync.numerator = (num * 1000.0).round() as i64;
            sync.denominator = (den * 1000.0).round() as i64;
        }
        Ok(sync)
    }
}

#[derive(Debug)]
struct QueuedPacket {
    packet: Packet,
    /// Timestamp after sync, before the factory ran.
    before_factory: i64,
    applied: bool,
}

/// Timestamp and ordering state of one output track.
#[derive(Debug)]
pub struct Packetizer {
    track: TrackEntry,
    mode: FactoryMode,
    factory: Option<Box<dyn TimestampFactory>>,
    sync: TimestampSync,
    queue: VecDeque<QueuedPacket>,
    flushed: bool,
    correction_offset: i64,
    append_offset: i64,
    /// End (timestamp plus duration) of the previous packet.
    last_end: Option<i64>,
    max_timestamp_seen: i64,
    /// Pre-factory timestamp to assigned timestamp.
    assigned: BTreeMap<i64, i64>,
    headers_changed: bool,
    packets_added: u64,
}

impl Packetizer {
    pub fn new(track: TrackEntry) -> Self {
        let mode = FactoryMode::default_for(track.track_type, false);
        Self {
            track,
            mode,
            factory: None,
            sync: TimestampSync::default(),
            queue: VecDeque::new(),
            flushed: false,
            correction_offset: 0,
            append_offset: 0,
            last_end: None,
            max_timestamp_seen: 0,
            assigned: BTreeMap::new(),
            headers_changed: false,
            packets_added: 0,
        }
    }

    /// Use `factory` for timestamps. Resets the mode to the track type's default.
    pub fn with_factory(mut self, factory: Box<dyn TimestampFactory>) -> Self {
        if let (None, Some(duration)) = (self.track.default_duration, factory.default_duration()) {
            self.track.default_duration = Some(duration as u64);
        }
        self.factory = Some(factory);
        self.mode = FactoryMode::default_for(self.track.track_type, true);
        self
    }

    pub fn with_mode(mut self, mode: FactoryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sync(mut self, sync: TimestampSync) -> Self {
        self.sync = sync;
        self
    }

    pub fn track(&self) -> &TrackEntry {
        &self.track
    }

    pub fn track_mut(&mut self) -> &mut TrackEntry {
        &mut self.track
    }

    pub fn track_number(&self) -> u64 {
        self.track.number
    }

    pub fn mode(&self) -> FactoryMode {
        self.mode
    }

    /// Largest end timestamp assigned so far.
    pub fn max_timestamp_seen(&self) -> i64 {
        self.max_timestamp_seen
    }

    pub fn packets_added(&self) -> u64 {
        self.packets_added
    }

    /// Packets waiting, assigned or not.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Flushed and nothing left to hand out.
    pub fn is_drained(&self) -> bool {
        self.flushed && self.queue.is_empty()
    }

    /// Whether the track header changed since the last call.
    pub fn take_headers_changed(&mut self) -> bool {
        std::mem::take(&mut self.headers_changed)
    }

    /// Continue the timeline of `predecessor`, e.g. for appended files.
    ///
    /// The track header (number, UID, codec setup) and the timestamp factory
    /// are taken over; timestamps are offset by `offset`, or by the end of
    /// the predecessor's last packet.
    pub fn connect(&mut self, predecessor: &mut Packetizer, offset: Option<i64>) -> Result<()> {
        if self.track.track_type != predecessor.track.track_type
            || self.track.codec_id != predecessor.track.codec_id
        {
            return Err(MkvError::InvalidState(format!(
                "cannot append track with codec {} to track {} with codec {}",
                self.track.codec(),
                predecessor.track.number,
                predecessor.track.codec()
            )));
        }
        if self.track.codec_private != predecessor.track.codec_private {
            debug!(
                track = predecessor.track.number,
                "Appended track has different codec private data"
            );
        }

        self.track = predecessor.track.clone();
        if self.factory.is_none() {
            self.factory = predecessor.factory.take();
        }
        self.mode = predecessor.mode;
        self.correction_offset = 0;
        self.append_offset = offset.unwrap_or(predecessor.max_timestamp_seen);
        self.max_timestamp_seen = predecessor.max_timestamp_seen;
        debug!(
            track = self.track.number,
            offset = self.append_offset,
            "Connected appended track"
        );
        Ok(())
    }

    /// Queue a packet in coding order.
    pub fn add_packet(&mut self, mut packet: Packet, diagnostics: &mut Diagnostics) -> Result<()> {
        if self.flushed {
            return Err(MkvError::InvalidState(format!(
                "track {} has already been flushed",
                self.track.number
            )));
        }
        packet.track_number = self.track.number;
        self.strip_header(&mut packet)?;

        // A single reference is always the backward one.
        if packet.bref.is_none() && packet.fref.is_some() {
            std::mem::swap(&mut packet.bref, &mut packet.fref);
        }

        let offset = self.correction_offset + self.append_offset;
        let sync = self.sync;
        packet.timestamp = sync.apply(packet.timestamp + offset);
        packet.bref = packet.bref.map(|t| sync.apply(t + offset));
        packet.fref = packet.fref.map(|t| sync.apply(t + offset));
        packet.duration = packet.duration.map(|d| sync.scale(d));

        self.raise_min_cache(&packet);

        if packet.timestamp < 0 {
            diagnostics.warn_track(
                self.track.number,
                format!(
                    "dropping frame with negative timestamp -{}",
                    format_timestamp(-packet.timestamp)
                ),
            );
            return Ok(());
        }

        if self.track.is_audio() && packet.fref.is_none() {
            if let Some(last_end) = self.last_end.filter(|end| packet.timestamp < *end) {
                let needed = last_end - packet.timestamp;
                self.correction_offset += needed;
                packet.timestamp += needed;
                packet.bref = packet.bref.map(|t| t + needed);
                diagnostics.warn_track(
                    self.track.number,
                    format!(
                        "audio timestamps went backwards by {}; shifting the following frames",
                        format_timestamp(needed)
                    ),
                );
            }
        }
        let duration = packet.duration.or(self.default_duration()).unwrap_or(0);
        self.last_end = Some(packet.timestamp + duration);

        self.packets_added += 1;
        self.queue.push_back(QueuedPacket {
            before_factory: packet.timestamp,
            packet,
            applied: false,
        });

        if self.factory.is_none() || self.mode == FactoryMode::Immediate {
            let index = self.queue.len() - 1;
            self.apply_once(index, diagnostics);
        } else {
            self.apply_factory(diagnostics);
        }
        Ok(())
    }

    /// End of stream: assign everything still queued.
    pub fn flush(&mut self, diagnostics: &mut Diagnostics) {
        if self.flushed {
            return;
        }
        self.flushed = true;
        self.apply_factory(diagnostics);
        debug!(
            track = self.track.number,
            packets = self.packets_added,
            "Flushed packetizer"
        );
    }

    /// Timestamp of the next packet [`Packetizer::next_packet`] would return.
    pub fn peek_timestamp(&self) -> Option<i64> {
        self.queue
            .front()
            .filter(|q| q.applied)
            .map(|q| q.packet.timestamp)
    }

    /// Next packet in coding order, once its timestamp is final.
    ///
    /// References are rewritten to the assigned timestamps of the frames
    /// they point to.
    pub fn next_packet(&mut self) -> Option<Packet> {
        if !self.queue.front()?.applied {
            return None;
        }
        let mut packet = self.queue.pop_front()?.packet;
        if !self.assigned.is_empty() {
            packet.bref = packet.bref.map(|t| self.resolve(t));
            packet.fref = packet.fref.map(|t| self.resolve(t));
        }
        Some(packet)
    }

    fn resolve(&self, timestamp: i64) -> i64 {
        self.assigned.get(&timestamp).copied().unwrap_or(timestamp)
    }

    fn default_duration(&self) -> Option<i64> {
        self.track.default_duration.map(|d| d as i64)
    }

    fn strip_header(&self, packet: &mut Packet) -> Result<()> {
        let Some(prefix) = self.track.header_removal_prefix() else {
            return Ok(());
        };
        if !packet.data().starts_with(prefix) {
            return Err(MkvError::CodecConfiguration {
                track_number: self.track.number,
                codec_id: self.track.codec().to_string(),
                message: "header removal compression is not possible: a frame does not start with the bytes to remove"
                    .to_string(),
            });
        }
        let data = packet.data()[prefix.len()..].to_vec();
        packet.set_data(data);
        Ok(())
    }

    fn raise_min_cache(&mut self, packet: &Packet) {
        let needed = if packet.fref.is_some() {
            2
        } else if packet.bref.is_some() {
            1
        } else {
            0
        };
        if needed > self.track.min_cache {
            debug!(track = self.track.number, min_cache = needed, "Raising minimum cache");
            self.track.min_cache = needed;
            self.headers_changed = true;
        }
    }

    fn apply_factory(&mut self, diagnostics: &mut Diagnostics) {
        let Some(start) = self.queue.iter().position(|q| !q.applied) else {
            return;
        };
        match self.mode {
            FactoryMode::ShortQueueing => self.apply_short_queueing(start, diagnostics),
            _ => self.apply_full_queueing(start, diagnostics),
        }
    }

    fn apply_short_queueing(&mut self, mut start: usize, diagnostics: &mut Diagnostics) {
        while start < self.queue.len() {
            let start_timestamp = self.queue[start].before_factory;
            let mut end = start + 1;
            while end < self.queue.len() && self.queue[end].before_factory < start_timestamp {
                end += 1;
            }
            if end == self.queue.len() && !self.flushed {
                return;
            }
            for index in start + 1..end {
                self.apply_once(index, diagnostics);
            }
            self.apply_once(start, diagnostics);
            start = end;
        }
    }

    fn apply_full_queueing(&mut self, mut start: usize, diagnostics: &mut Diagnostics) {
        while start < self.queue.len() {
            let mut end = start + 1;
            while end < self.queue.len() && !self.queue[end].packet.is_keyframe() {
                end += 1;
            }
            if end == self.queue.len() && !self.flushed {
                return;
            }
            let mut order: Vec<usize> = (start..end).collect();
            order.sort_by_key(|&index| self.queue[index].before_factory);
            for index in order {
                self.apply_once(index, diagnostics);
            }
            start = end;
        }
    }

    fn apply_once(&mut self, index: usize, diagnostics: &mut Diagnostics) {
        let default_duration = self.default_duration();
        let Some(entry) = self.queue.get_mut(index) else {
            return;
        };
        if entry.applied {
            return;
        }
        if let Some(factory) = self.factory.as_mut() {
            if factory.next(&mut entry.packet, diagnostics) {
                debug!(track = self.track.number, "Gap before frame");
            }
        }
        entry.applied = true;

        let (before, after) = (entry.before_factory, entry.packet.timestamp);
        let end = after + entry.packet.duration.or(default_duration).unwrap_or(0);
        self.max_timestamp_seen = self.max_timestamp_seen.max(end);
        if before != after {
            self.assigned.insert(before, after);
            if self.assigned.len() > REFERENCE_MEMORY {
                self.assigned.pop_first();
            }
        }
    }
}
