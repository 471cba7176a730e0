//! Merge sessions.
//!
//! A [`MuxSession`] owns everything one merge run needs: the packet sources,
//! one [`Packetizer`] per output track, the track number counter and the
//! warning channel. Nothing survives between sessions.
//!
//! The merge loop is pull based. As long as some output track has no packet
//! with a final timestamp, its source is asked for more data, choosing the
//! track that is furthest behind. Otherwise the ready packet with the lowest
//! timestamp goes to the muxer.

use crate::attachments::AttachedFile;
use crate::chapters::Chapters;
use crate::cluster::{ClusterOptions, CueStrategy};
use crate::demuxer::MkvDemuxer;
use crate::diagnostics::{Diagnostics, Warning};
use crate::elements::TrackType;
use crate::error::{MkvError, Result};
use crate::muxer::{MkvMuxer, MuxerConfig};
use crate::packetizer::{Packetizer, TimestampSync};
use crate::tags::Tags;
use crate::timestamps;
use crate::track::{ContentCompression, TrackEntry};

use mkvkit_core::Packet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Something that produces packets for one or more tracks.
///
/// Track numbers used by a source are local to it; the session assigns the
/// output numbers.
pub trait PacketSource {
    /// Name used in messages, usually the file name.
    fn name(&self) -> &str;

    fn tracks(&self) -> &[TrackEntry];

    /// Next packet in coding order per track, or `None` at the end of input.
    fn read_packet(&mut self) -> Result<Option<Packet>>;

    fn chapters(&self) -> Option<&Chapters> {
        None
    }

    fn tags(&self) -> Option<&Tags> {
        None
    }

    fn attachments(&self) -> &[AttachedFile] {
        &[]
    }

    /// Warnings collected since the last call.
    fn take_diagnostics(&mut self) -> Diagnostics {
        Diagnostics::default()
    }
}

/// Matroska or WebM file as a packet source.
pub struct MatroskaSource<R: Read + Seek> {
    name: String,
    demuxer: MkvDemuxer<R>,
}

impl MatroskaSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(path.display().to_string(), BufReader::new(file))
    }
}

impl<R: Read + Seek> MatroskaSource<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            demuxer: MkvDemuxer::open(reader)?,
        })
    }
}

impl<R: Read + Seek> PacketSource for MatroskaSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn tracks(&self) -> &[TrackEntry] {
        &self.demuxer.tracks
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        self.demuxer.read_packet()
    }

    fn chapters(&self) -> Option<&Chapters> {
        Some(&self.demuxer.chapters).filter(|c| !c.is_empty())
    }

    fn tags(&self) -> Option<&Tags> {
        Some(&self.demuxer.tags).filter(|t| !t.is_empty())
    }

    fn attachments(&self) -> &[AttachedFile] {
        &self.demuxer.attachments.files
    }

    fn take_diagnostics(&mut self) -> Diagnostics {
        self.demuxer.take_diagnostics()
    }
}

/// Packets supplied by the caller, e.g. from an elementary stream reader.
#[derive(Debug, Default)]
pub struct MemorySource {
    name: String,
    tracks: Vec<TrackEntry>,
    packets: VecDeque<Packet>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, tracks: Vec<TrackEntry>) -> Self {
        Self {
            name: name.into(),
            tracks,
            packets: VecDeque::new(),
        }
    }

    pub fn push(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }

    pub fn with_packets(mut self, packets: impl IntoIterator<Item = Packet>) -> Self {
        self.packets.extend(packets);
        self
    }
}

impl PacketSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn tracks(&self) -> &[TrackEntry] {
        &self.tracks
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        Ok(self.packets.pop_front())
    }
}

/// Content compression override for an output track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackCompression {
    None,
    /// Strip this prefix from every frame.
    HeaderRemoval(Vec<u8>),
}

/// Parses `none` or `header_removal:<hex bytes>`.
impl FromStr for TrackCompression {
    type Err = MkvError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |message: String| MkvError::InvalidProperty {
            name: "compression".to_string(),
            message,
        };
        if s.eq_ignore_ascii_case("none") {
            return Ok(TrackCompression::None);
        }
        let hex = s
            .strip_prefix("header_removal:")
            .ok_or_else(|| invalid(format!("'{s}' is neither 'none' nor 'header_removal:<hex>'")))?;
        let digits: Vec<char> = hex.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(invalid(format!("'{hex}' is not a list of hex bytes")));
        }
        digits
            .chunks(2)
            .map(|pair| {
                let byte: String = pair.iter().collect();
                u8::from_str_radix(&byte, 16).map_err(|_| invalid(format!("'{byte}' is not a hex byte")))
            })
            .collect::<Result<Vec<u8>>>()
            .map(TrackCompression::HeaderRemoval)
    }
}

/// Overrides for one source track.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackOptions {
    pub language: Option<String>,
    pub name: Option<String>,
    pub default: Option<bool>,
    pub forced: Option<bool>,
    pub sync: Option<TimestampSync>,
    /// External timestamp file.
    pub timestamps: Option<PathBuf>,
    /// Nanoseconds; also assigns constant frame rate timestamps.
    pub default_duration: Option<i64>,
    pub compression: Option<TrackCompression>,
    pub cues: Option<CueStrategy>,
}

/// One input file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: PathBuf,
    /// Continue the tracks of the previous input instead of adding new ones.
    pub append: bool,
    /// Source track numbers to use; all when empty.
    pub tracks: Vec<u64>,
    /// Keyed by source track number.
    pub track_options: BTreeMap<u64, TrackOptions>,
    pub no_chapters: bool,
    pub no_tags: bool,
    pub no_attachments: bool,
}

impl InputConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn selects(&self, track_number: u64) -> bool {
        self.tracks.is_empty() || self.tracks.contains(&track_number)
    }

    pub fn options_mut(&mut self, track_number: u64) -> &mut TrackOptions {
        self.track_options.entry(track_number).or_default()
    }
}

/// Static configuration of a merge run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub output: PathBuf,
    pub inputs: Vec<InputConfig>,
    pub title: Option<String>,
    pub webm: bool,
    /// Chapter file (simple text or JSON) replacing the inputs' chapters.
    pub chapters: Option<PathBuf>,
    pub chapter_language: String,
    pub attachments: Vec<PathBuf>,
    pub clusters: ClusterOptions,
    pub cues: bool,
    pub track_statistics: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::new(),
            inputs: Vec::new(),
            title: None,
            webm: false,
            chapters: None,
            chapter_language: "eng".to_string(),
            attachments: Vec::new(),
            clusters: ClusterOptions::default(),
            cues: true,
            track_statistics: true,
        }
    }
}

impl MergeConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| MkvError::Other(format!("invalid merge options: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn muxer_config(&self) -> MuxerConfig {
        let base = if self.webm {
            MuxerConfig::webm()
        } else {
            MuxerConfig::default()
        };
        MuxerConfig {
            title: self.title.clone(),
            segment_filename: self
                .output
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            write_cues: self.cues,
            clusters: self.clusters.clone(),
            track_statistics: self.track_statistics && !self.webm,
            ..base
        }
    }
}

/// Outcome of a merge run.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub tracks: usize,
    pub packets: u64,
    pub warnings: Vec<Warning>,
}

struct Input {
    source: Box<dyn PacketSource>,
    config: InputConfig,
    /// Source track number to output index.
    routes: HashMap<u64, usize>,
    append_to: Option<usize>,
    active: bool,
    finished: bool,
}

struct Output {
    packetizer: Packetizer,
    input: usize,
    source_track: u64,
    /// Output this one continues.
    predecessor: Option<usize>,
    explicit_default: bool,
    cues: Option<CueStrategy>,
    failed: bool,
}

/// State of one merge run.
pub struct MuxSession {
    config: MergeConfig,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    next_track_number: u64,
    diagnostics: Diagnostics,
}

impl MuxSession {
    pub fn new(config: MergeConfig) -> Self {
        Self {
            config,
            inputs: Vec::new(),
            outputs: Vec::new(),
            next_track_number: 1,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Open every input of `config` as a Matroska file.
    pub fn open(config: MergeConfig) -> Result<Self> {
        let inputs = config.inputs.clone();
        let mut session = Self::new(config);
        for input in inputs {
            let source = MatroskaSource::open(&input.path)?;
            session.add_source(Box::new(source), input)?;
        }
        Ok(session)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Output tracks registered so far.
    pub fn tracks(&self) -> impl Iterator<Item = &TrackEntry> {
        self.outputs
            .iter()
            .filter(|o| o.predecessor.is_none())
            .map(|o| o.packetizer.track())
    }

    /// Register a source. Output track numbers are handed out in order of
    /// registration.
    pub fn add_source(&mut self, mut source: Box<dyn PacketSource>, input: InputConfig) -> Result<()> {
        let index = self.inputs.len();
        let append_to = match (input.append, index) {
            (false, _) => None,
            (true, 0) => {
                return Err(MkvError::InvalidState(format!(
                    "'{}' cannot be appended: it is the first input",
                    source.name()
                )));
            }
            (true, index) => Some(index - 1),
        };
        self.diagnostics.absorb(source.take_diagnostics());

        let mut routes = HashMap::new();
        for track in source.tracks().iter().filter(|t| input.selects(t.number)) {
            let options = input.track_options.get(&track.number).cloned().unwrap_or_default();

            let predecessor = match append_to {
                Some(previous) => {
                    let found = self
                        .outputs
                        .iter()
                        .position(|o| o.input == previous && o.source_track == track.number);
                    if found.is_none() {
                        self.diagnostics.warn(format!(
                            "track {} of '{}' has no track to be appended to and is skipped",
                            track.number,
                            source.name()
                        ));
                        continue;
                    }
                    found
                }
                None => None,
            };

            let mut entry = track.clone();
            apply_options(&mut entry, &options);
            if predecessor.is_none() {
                entry.number = self.next_track_number;
                self.next_track_number += 1;
            }

            let mut packetizer = Packetizer::new(entry);
            if let Some(path) = &options.timestamps {
                let factory = timestamps::load(path, false, &mut self.diagnostics)?;
                packetizer = packetizer.with_factory(factory);
            } else if let Some(duration) = options.default_duration {
                packetizer = packetizer.with_factory(timestamps::fps_factory(duration)?);
            }
            if let Some(sync) = options.sync {
                packetizer = packetizer.with_sync(sync);
            }

            debug!(
                source = source.name(),
                source_track = track.number,
                track = packetizer.track_number(),
                mode = ?packetizer.mode(),
                "Registered output track"
            );
            routes.insert(track.number, self.outputs.len());
            self.outputs.push(Output {
                packetizer,
                input: index,
                source_track: track.number,
                predecessor,
                explicit_default: options.default.is_some(),
                cues: options.cues,
                failed: false,
            });
        }

        self.inputs.push(Input {
            source,
            config: input,
            routes,
            append_to,
            active: false,
            finished: false,
        });
        Ok(())
    }

    /// Keep one default track per type unless set explicitly.
    fn assign_default_flags(&mut self) {
        let mut seen: BTreeSet<TrackType> = BTreeSet::new();
        for output in self.outputs.iter_mut().filter(|o| o.predecessor.is_none()) {
            let explicit = output.explicit_default;
            let track = output.packetizer.track_mut();
            let Some(track_type) = track.track_type else {
                continue;
            };
            if explicit {
                if track.flag_default {
                    seen.insert(track_type);
                }
                continue;
            }
            if track.flag_default && !seen.insert(track_type) {
                track.flag_default = false;
            }
        }
    }

    fn collect_metadata(&mut self) -> Result<(Chapters, Tags, Vec<AttachedFile>)> {
        let mut chapters = Chapters::default();
        let mut tags = Tags::default();
        let mut attachments = Vec::new();

        for input in self.inputs.iter().filter(|i| i.append_to.is_none()) {
            if self.config.chapters.is_none() && !input.config.no_chapters {
                if let Some(source_chapters) = input.source.chapters() {
                    chapters.merge(source_chapters.clone());
                }
            }
            if !input.config.no_tags {
                if let Some(source_tags) = input.source.tags() {
                    tags.merge(source_tags.clone());
                }
            }
            if !input.config.no_attachments {
                attachments.extend(input.source.attachments().iter().cloned());
            }
        }

        if let Some(path) = &self.config.chapters {
            let text = std::fs::read_to_string(path)?;
            chapters = Chapters::parse_any(&text, &self.config.chapter_language)?;
        }
        for path in &self.config.attachments {
            attachments.push(AttachedFile::from_path(path)?);
        }
        Ok((chapters, tags, attachments))
    }

    /// Merge everything into `path`.
    pub fn run_to_file(self, path: &Path) -> Result<MergeReport> {
        let file = File::create(path)?;
        self.run(BufWriter::new(file))
    }

    /// Merge everything into `writer`.
    pub fn run<W: Write + Seek>(mut self, writer: W) -> Result<MergeReport> {
        self.assign_default_flags();
        let mut muxer = MkvMuxer::new(writer, self.config.muxer_config());
        for output in self.outputs.iter().filter(|o| o.predecessor.is_none()) {
            muxer.add_track(output.packetizer.track().clone(), output.cues)?;
        }

        let (chapters, tags, attachments) = self.collect_metadata()?;
        muxer.set_chapters(chapters)?;
        muxer.set_tags(tags)?;
        for file in attachments {
            muxer.add_attachment(file)?;
        }
        muxer.write_header()?;

        for input in self.inputs.iter_mut().filter(|i| i.append_to.is_none()) {
            input.active = true;
        }

        loop {
            if let Some(output) = self.most_behind() {
                self.pump(self.outputs[output].input)?;
                continue;
            }
            let Some(output) = self.next_ready() else {
                break;
            };
            let Some(packet) = self.outputs[output].packetizer.next_packet() else {
                continue;
            };
            muxer.write_packet(packet)?;
            if self.outputs[output].packetizer.take_headers_changed() {
                muxer.update_track(self.outputs[output].packetizer.track())?;
            }
        }

        let unfinished: Vec<String> = self
            .inputs
            .iter()
            .filter(|i| !i.active)
            .map(|i| i.source.name().to_string())
            .collect();
        if !unfinished.is_empty() {
            self.diagnostics
                .warn(format!("inputs never read: {}", unfinished.join(", ")));
        }

        muxer.finalize()?;
        let report = MergeReport {
            tracks: muxer.tracks().len(),
            packets: muxer.packets_written(),
            warnings: self.diagnostics.take(),
        };
        info!(
            tracks = report.tracks,
            packets = report.packets,
            warnings = report.warnings.len(),
            "Merge finished"
        );
        Ok(report)
    }

    fn is_live(&self, output: &Output) -> bool {
        !output.failed && self.inputs[output.input].active
    }

    /// A live output that needs more input, preferring the one whose
    /// timestamps are furthest behind.
    fn most_behind(&self) -> Option<usize> {
        self.outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| self.is_live(o) && !self.inputs[o.input].finished)
            .filter(|(_, o)| o.packetizer.peek_timestamp().is_none() && !o.packetizer.is_drained())
            .min_by_key(|(_, o)| o.packetizer.max_timestamp_seen())
            .map(|(index, _)| index)
    }

    /// The live output whose next packet has the lowest timestamp.
    fn next_ready(&self) -> Option<usize> {
        self.outputs
            .iter()
            .enumerate()
            .filter(|(_, o)| self.is_live(o))
            .filter_map(|(index, o)| o.packetizer.peek_timestamp().map(|ts| (ts, index)))
            .min()
            .map(|(_, index)| index)
    }

    /// Read one packet from an input.
    fn pump(&mut self, input_index: usize) -> Result<()> {
        let input = &mut self.inputs[input_index];
        let Some(packet) = input.source.read_packet()? else {
            return self.finish_input(input_index);
        };
        let Some(&output_index) = input.routes.get(&packet.track_number) else {
            return Ok(());
        };

        let output = &mut self.outputs[output_index];
        if output.failed {
            return Ok(());
        }
        match output.packetizer.add_packet(packet, &mut self.diagnostics) {
            Ok(()) => Ok(()),
            Err(err @ MkvError::CodecConfiguration { .. }) => {
                self.diagnostics.error(&err);
                output.failed = true;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// End of an input: flush its tracks and start inputs appended to it.
    fn finish_input(&mut self, input_index: usize) -> Result<()> {
        let input = &mut self.inputs[input_index];
        input.finished = true;
        let warnings = input.source.take_diagnostics();
        debug!(source = input.source.name(), "Input finished");
        self.diagnostics.absorb(warnings);

        for output in self.outputs.iter_mut().filter(|o| o.input == input_index) {
            output.packetizer.flush(&mut self.diagnostics);
        }

        let successors: Vec<usize> = self
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, i)| i.append_to == Some(input_index))
            .map(|(index, _)| index)
            .collect();
        for successor in successors {
            for index in 0..self.outputs.len() {
                let Some(predecessor) = self.outputs[index].predecessor else {
                    continue;
                };
                if self.outputs[index].input != successor {
                    continue;
                }
                let (before, rest) = self.outputs.split_at_mut(index);
                rest[0].packetizer.connect(&mut before[predecessor].packetizer, None)?;
            }
            self.inputs[successor].active = true;
            debug!(source = self.inputs[successor].source.name(), "Appending input");
        }
        Ok(())
    }
}

fn apply_options(track: &mut TrackEntry, options: &TrackOptions) {
    if let Some(language) = &options.language {
        track.language = language.clone();
    }
    if let Some(name) = &options.name {
        track.name = Some(name.clone());
    }
    if let Some(default) = options.default {
        track.flag_default = default;
    }
    if let Some(forced) = options.forced {
        track.flag_forced = forced;
    }
    if let Some(duration) = options.default_duration {
        track.default_duration = u64::try_from(duration).ok().filter(|&d| d > 0);
    }
    match &options.compression {
        Some(TrackCompression::None) => track.compression = None,
        Some(TrackCompression::HeaderRemoval(prefix)) => {
            track.compression = Some(ContentCompression::header_removal(prefix.clone()));
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demuxer::MkvDemuxer;
    use crate::elements::codec_ids;
    use crate::track::{AudioSettings, VideoSettings};
    use std::io::Cursor;

    const MS: i64 = 1_000_000;

    fn audio(number: u64) -> TrackEntry {
        let mut track = TrackEntry::new(number, TrackType::Audio, codec_ids::A_PCM_INT_LIT);
        track.audio = Some(AudioSettings::new(48000.0, 2));
        track
    }

    fn video(number: u64) -> TrackEntry {
        let mut track = TrackEntry::new(number, TrackType::Video, codec_ids::V_VP9);
        track.video = Some(VideoSettings::new(320, 240));
        track.default_duration = Some(40_000_000);
        track
    }

    fn audio_source(name: &str, number: u64, count: i64) -> MemorySource {
        MemorySource::new(name, vec![audio(number)]).with_packets(
            (0..count).map(|i| Packet::new(number, i * 20 * MS, vec![i as u8; 4]).with_duration(20 * MS)),
        )
    }

    fn config() -> MergeConfig {
        MergeConfig {
            track_statistics: false,
            ..Default::default()
        }
    }

    fn demux(bytes: Vec<u8>) -> (MkvDemuxer<Cursor<Vec<u8>>>, Vec<Packet>) {
        let mut demuxer = MkvDemuxer::open(Cursor::new(bytes)).unwrap();
        let mut packets = Vec::new();
        while let Some(packet) = demuxer.read_packet().unwrap() {
            packets.push(packet);
        }
        (demuxer, packets)
    }

    fn run(session: MuxSession) -> (MergeReport, Vec<u8>) {
        let mut out = Cursor::new(Vec::new());
        let report = session.run(&mut out).unwrap();
        (report, out.into_inner())
    }

    #[test]
    fn test_track_numbers_in_registration_order() {
        let mut session = MuxSession::new(config());
        let video_source = MemorySource::new("video", vec![video(7)])
            .with_packets((0..5).map(|i| Packet::new(7, i * 40 * MS, vec![1; 10])));
        session
            .add_source(Box::new(audio_source("audio", 3, 10)), InputConfig::default())
            .unwrap();
        session
            .add_source(Box::new(video_source), InputConfig::default())
            .unwrap();
        let numbers: Vec<u64> = session.tracks().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1, 2]);

        let (report, bytes) = run(session);
        assert_eq!(report.tracks, 2);
        assert_eq!(report.packets, 15);
        assert!(report.warnings.is_empty());

        let (demuxer, packets) = demux(bytes);
        assert!(demuxer.track(1).unwrap().is_audio());
        assert!(demuxer.track(2).unwrap().is_video());
        assert_eq!(packets.iter().filter(|p| p.track_number == 2).count(), 5);
    }

    #[test]
    fn test_selection_and_overrides() {
        let source = MemorySource::new("two", vec![audio(1), audio(2)]).with_packets(vec![
            Packet::new(1, 0, vec![1]),
            Packet::new(2, 0, vec![2]),
        ]);
        let mut input = InputConfig::default();
        input.tracks = vec![2];
        input.options_mut(2).language = Some("ger".to_string());
        input.options_mut(2).name = Some("Commentary".to_string());

        let mut session = MuxSession::new(config());
        session.add_source(Box::new(source), input).unwrap();
        let (_, bytes) = run(session);

        let (demuxer, packets) = demux(bytes);
        assert_eq!(demuxer.num_tracks(), 1);
        let track = demuxer.track(1).unwrap();
        assert_eq!(track.language, "ger");
        assert_eq!(track.name.as_deref(), Some("Commentary"));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data(), &[2]);
    }

    #[test]
    fn test_one_default_track_per_type() {
        let mut session = MuxSession::new(config());
        for name in ["a", "b"] {
            session
                .add_source(Box::new(audio_source(name, 1, 1)), InputConfig::default())
                .unwrap();
        }
        let mut forced_default = InputConfig::default();
        forced_default.options_mut(1).default = Some(true);
        session
            .add_source(Box::new(audio_source("c", 1, 1)), forced_default)
            .unwrap();
        let (_, bytes) = run(session);

        let (demuxer, _) = demux(bytes);
        let flags: Vec<bool> = demuxer.tracks.iter().map(|t| t.flag_default).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn test_append_continues_timeline() {
        let mut session = MuxSession::new(config());
        session
            .add_source(Box::new(audio_source("first", 1, 5)), InputConfig::default())
            .unwrap();
        let appended = InputConfig {
            append: true,
            ..Default::default()
        };
        session
            .add_source(Box::new(audio_source("second", 1, 5)), appended)
            .unwrap();
        assert_eq!(session.tracks().count(), 1);

        let (report, bytes) = run(session);
        assert_eq!(report.packets, 10);
        let (_, packets) = demux(bytes);
        let timestamps: Vec<i64> = packets.iter().map(|p| p.timestamp / MS).collect();
        assert_eq!(timestamps, vec![0, 20, 40, 60, 80, 100, 120, 140, 160, 180]);
    }

    #[test]
    fn test_append_to_nothing() {
        let mut session = MuxSession::new(config());
        let input = InputConfig {
            append: true,
            ..Default::default()
        };
        assert!(session.add_source(Box::new(audio_source("x", 1, 1)), input).is_err());
    }

    #[test]
    fn test_codec_problem_stops_one_track() {
        let mut input = InputConfig::default();
        input.options_mut(1).compression = Some(TrackCompression::HeaderRemoval(vec![0xFF]));
        let mut session = MuxSession::new(config());
        session
            .add_source(Box::new(audio_source("broken", 1, 3)), input)
            .unwrap();
        session
            .add_source(Box::new(audio_source("fine", 1, 3)), InputConfig::default())
            .unwrap();

        let (report, bytes) = run(session);
        assert_eq!(report.packets, 3);
        assert_eq!(report.warnings.len(), 1);
        let (_, packets) = demux(bytes);
        assert!(packets.iter().all(|p| p.track_number == 2));
    }

    #[test]
    fn test_sync_and_interleaving() {
        let mut input = InputConfig::default();
        input.options_mut(1).sync = Some("100".parse().unwrap());
        let mut session = MuxSession::new(config());
        session
            .add_source(Box::new(audio_source("delayed", 1, 3)), input)
            .unwrap();
        session
            .add_source(Box::new(audio_source("plain", 1, 10)), InputConfig::default())
            .unwrap();
        let (_, bytes) = run(session);

        let (_, packets) = demux(bytes);
        let delayed: Vec<i64> = packets
            .iter()
            .filter(|p| p.track_number == 1)
            .map(|p| p.timestamp / MS)
            .collect();
        assert_eq!(delayed, vec![100, 120, 140]);
    }

    #[test]
    fn test_compression_option_parse() {
        assert_eq!("none".parse::<TrackCompression>().unwrap(), TrackCompression::None);
        assert_eq!(
            "header_removal:00 0001".parse::<TrackCompression>().unwrap(),
            TrackCompression::HeaderRemoval(vec![0, 0, 1])
        );
        assert!("header_removal:0".parse::<TrackCompression>().is_err());
        assert!("zlib".parse::<TrackCompression>().is_err());
    }

    #[test]
    fn test_merge_config_json() {
        let config = MergeConfig::from_json(
            r#"{
                "output": "out.mkv",
                "title": "Movie",
                "clusters": { "crc32": true },
                "inputs": [
                    { "path": "a.mkv", "tracks": [1, 2],
                      "track_options": { "2": { "language": "fre", "sync": { "displacement": 5 } } } },
                    { "path": "b.mkv", "append": true }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.title.as_deref(), Some("Movie"));
        assert!(config.clusters.crc32);
        assert!(config.clusters.lacing);
        assert!(config.cues);
        assert_eq!(config.inputs.len(), 2);
        let options = &config.inputs[0].track_options[&2];
        assert_eq!(options.language.as_deref(), Some("fre"));
        assert_eq!(options.sync.unwrap().displacement, 5);
        assert_eq!(options.sync.unwrap().denominator, 1);
        assert!(config.inputs[1].append);
        assert_eq!(config.muxer_config().segment_filename.as_deref(), Some("out.mkv"));
        assert!(MergeConfig::from_json("{ \"bogus\": [").is_err());
    }
}
