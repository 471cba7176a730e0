//! Extraction of tracks, timestamps and metadata.
//!
//! Track extraction makes a single pass over the clusters and feeds every
//! selected track into its own sink. Text subtitles become SRT; everything
//! else is written as the raw frames with header removal undone.

use crate::attachments::{AttachedFile, Attachments};
use crate::chapters::{ChapterAtom, Chapters};
use crate::demuxer::MkvDemuxer;
use crate::elements::is_text_subtitle_codec;
use crate::error::{MkvError, Result};
use crate::tags::{Tag, Tags};
use crate::track::TrackEntry;

use mkvkit_core::timestamp::format_timestamp_with_precision;
use mkvkit_core::Packet;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How frames of a track are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    Raw,
    Srt,
    /// Timestamp file format v2, one line per frame.
    TimestampsV2,
}

impl TrackFormat {
    /// The natural format for a track's frames.
    pub fn for_track(track: &TrackEntry) -> Self {
        if is_text_subtitle_codec(track.codec()) {
            TrackFormat::Srt
        } else {
            TrackFormat::Raw
        }
    }
}

/// One extraction target.
pub struct TrackOutput {
    pub track: u64,
    pub format: Option<TrackFormat>,
    pub writer: Box<dyn Write>,
}

impl TrackOutput {
    pub fn new(track: u64, writer: impl Write + 'static) -> Self {
        Self {
            track,
            format: None,
            writer: Box::new(writer),
        }
    }

    pub fn with_format(mut self, format: TrackFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn create(track: u64, path: &Path) -> Result<Self> {
        Ok(Self::new(track, BufWriter::new(File::create(path)?)))
    }
}

/// What was written for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTrack {
    pub track: u64,
    pub format: TrackFormat,
    pub frames: u64,
    pub bytes: u64,
}

trait FrameSink {
    fn frame(&mut self, packet: &Packet, default_duration: Option<i64>) -> Result<u64>;

    fn finish(&mut self) -> Result<()>;
}

struct RawSink {
    out: Box<dyn Write>,
}

impl FrameSink for RawSink {
    fn frame(&mut self, packet: &Packet, _default_duration: Option<i64>) -> Result<u64> {
        self.out.write_all(packet.data())?;
        Ok(packet.data().len() as u64)
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

struct SrtSink {
    out: Box<dyn Write>,
    entries: usize,
}

fn srt_time(ns: i64) -> String {
    format_timestamp_with_precision(ns.max(0), 3).replace('.', ",")
}

impl FrameSink for SrtSink {
    fn frame(&mut self, packet: &Packet, default_duration: Option<i64>) -> Result<u64> {
        let text = String::from_utf8_lossy(packet.data());
        let text = text.replace("\r\n", "\n");
        let text = text.trim_end_matches(['\n', '\0']);
        let duration = packet.duration.or(default_duration).unwrap_or(0);

        self.entries += 1;
        let entry = format!(
            "{}\n{} --> {}\n{}\n\n",
            self.entries,
            srt_time(packet.timestamp),
            srt_time(packet.timestamp + duration),
            text
        );
        self.out.write_all(entry.as_bytes())?;
        Ok(entry.len() as u64)
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Collects timestamps; they are written sorted once the track ends.
struct TimestampSink {
    out: Box<dyn Write>,
    timestamps: Vec<i64>,
}

/// Milliseconds with up to six decimals, trailing zeros dropped.
fn format_ms(ns: i64) -> String {
    let text = format!("{}.{:06}", ns / 1_000_000, (ns % 1_000_000).abs());
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

impl FrameSink for TimestampSink {
    fn frame(&mut self, packet: &Packet, _default_duration: Option<i64>) -> Result<u64> {
        self.timestamps.push(packet.timestamp);
        Ok(0)
    }

    fn finish(&mut self) -> Result<()> {
        self.timestamps.sort_unstable();
        let mut text = String::from("# timestamp format v2\n");
        for &timestamp in &self.timestamps {
            let _ = writeln!(text, "{}", format_ms(timestamp));
        }
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

struct Target {
    sink: Box<dyn FrameSink>,
    default_duration: Option<i64>,
    report: ExtractedTrack,
}

/// Extract several tracks in one pass.
pub fn extract_tracks<R: Read + Seek>(
    demuxer: &mut MkvDemuxer<R>,
    outputs: Vec<TrackOutput>,
) -> Result<Vec<ExtractedTrack>> {
    let mut targets: BTreeMap<u64, Target> = BTreeMap::new();
    for output in outputs {
        let track = demuxer
            .track(output.track)
            .ok_or(MkvError::TrackNotFound {
                track_number: output.track,
            })?;
        let format = output.format.unwrap_or_else(|| TrackFormat::for_track(track));
        let sink: Box<dyn FrameSink> = match format {
            TrackFormat::Raw => Box::new(RawSink { out: output.writer }),
            TrackFormat::Srt => Box::new(SrtSink {
                out: output.writer,
                entries: 0,
            }),
            TrackFormat::TimestampsV2 => Box::new(TimestampSink {
                out: output.writer,
                timestamps: Vec::new(),
            }),
        };
        debug!(track = output.track, codec = track.codec(), ?format, "Extracting track");
        targets.insert(
            output.track,
            Target {
                sink,
                default_duration: track.default_duration.map(|d| d as i64),
                report: ExtractedTrack {
                    track: output.track,
                    format,
                    frames: 0,
                    bytes: 0,
                },
            },
        );
    }

    while let Some(packet) = demuxer.read_packet()? {
        let Some(target) = targets.get_mut(&packet.track_number) else {
            continue;
        };
        target.report.bytes += target.sink.frame(&packet, target.default_duration)?;
        target.report.frames += 1;
    }

    let mut reports = Vec::with_capacity(targets.len());
    for (_, mut target) in targets {
        target.sink.finish()?;
        info!(
            track = target.report.track,
            frames = target.report.frames,
            "Extracted track"
        );
        reports.push(target.report);
    }
    Ok(reports)
}

/// Simple chapter text, or JSON.
pub fn chapters_text(chapters: &Chapters, json: bool) -> Result<String> {
    if json {
        chapters.to_json()
    } else {
        Ok(chapters.to_simple(1))
    }
}

pub fn tags_json(tags: &Tags) -> Result<String> {
    tags.to_json()
}

/// Start of the sub-chapter named `INDEX nn`.
fn cue_index(atom: &ChapterAtom, index: usize) -> Option<u64> {
    let name = format!("INDEX {index:02}");
    atom.children
        .iter()
        .find(|child| child.name() == Some(name.as_str()))
        .map(|child| child.start)
}

/// `mm:ss:ff` with 75 frames per second.
fn cue_time(ns: u64) -> String {
    let seconds = ns / 1_000_000_000;
    let frames = ((ns % 1_000_000_000) as f64 * 75.0 / 1_000_000_000.0).round() as u64;
    format!("{:02}:{:02}:{:02}", seconds / 60, seconds % 60, frames)
}

/// Tag of the `part`th chapter (1-based), matched by chapter UID or by a
/// `PART_NUMBER` simple tag.
fn tag_for_part<'a>(tags: &'a Tags, part: usize, chapter_uid: u64) -> Option<&'a Tag> {
    let part = part.to_string();
    tags.tags.iter().find(|tag| {
        let targets = &tag.targets;
        let uid_matches = targets.chapter_uids.contains(&chapter_uid);
        let part_matches = tag.value("PART_NUMBER") == Some(part.as_str())
            && (targets.chapter_uids.is_empty() || uid_matches);
        uid_matches || part_matches
    })
}

fn global_tag(tags: &Tags) -> Option<&Tag> {
    tags.tags
        .iter()
        .find(|tag| tag.targets.chapter_uids.is_empty() && tag.value("PART_NUMBER").is_none())
}

fn first_value<'a>(tag: Option<&'a Tag>, names: &[&str]) -> Option<&'a str> {
    let tag = tag?;
    names.iter().find_map(|name| tag.value(name))
}

fn comments<'a>(tag: &'a Tag) -> impl Iterator<Item = &'a str> {
    tag.simple_tags
        .iter()
        .filter(|t| t.name == "COMMENT" || t.name == "COMMENTS")
        .filter_map(|t| t.string.as_deref())
}

/// A CUE sheet for an audio file split into chapters.
///
/// Top-level chapters become tracks; their `INDEX nn` sub-chapters become
/// index points. Titles and performers come from the tags.
pub fn cuesheet(chapters: &Chapters, tags: &Tags, file_name: &str) -> String {
    let atoms: Vec<&ChapterAtom> = chapters.editions.iter().flat_map(|e| &e.atoms).collect();
    let mut out = String::new();
    if atoms.is_empty() {
        return out;
    }

    let global = global_tag(tags);
    let global_value = |name: &str| global.and_then(|tag| tag.value(name));
    if let Some(catalog) = first_value(global, &["CATALOG_NUMBER", "CATALOG"]) {
        let _ = writeln!(out, "CATALOG {catalog}");
    }
    if let Some(artist) = global_value("ARTIST") {
        let _ = writeln!(out, "PERFORMER \"{artist}\"");
    }
    if let Some(title) = global_value("TITLE") {
        let _ = writeln!(out, "TITLE \"{title}\"");
    }
    if let Some(date) = first_value(global, &["DATE_RELEASED", "DATE"]) {
        let _ = writeln!(out, "REM DATE \"{date}\"");
    }
    if let Some(disc_id) = global_value("DISCID") {
        let _ = writeln!(out, "REM DISCID {disc_id}");
    }
    if let Some(tag) = global {
        for comment in comments(tag) {
            let _ = writeln!(out, "REM \"{comment}\"");
        }
    }
    let _ = writeln!(out, "FILE \"{file_name}\" WAVE");

    for (i, atom) in atoms.iter().enumerate() {
        let _ = writeln!(out, "  TRACK {:02} AUDIO", i + 1);
        let Some(tag) = tag_for_part(tags, i + 1, atom.uid) else {
            continue;
        };
        // Only values that differ from the global ones.
        let own = |name: &str| tag.value(name).filter(|v| Some(*v) != global_value(name));

        if let Some(title) = own("TITLE") {
            let _ = writeln!(out, "    TITLE \"{title}\"");
        }
        if let Some(artist) = own("ARTIST") {
            let _ = writeln!(out, "    PERFORMER \"{artist}\"");
        }
        if let Some(isrc) = own("ISRC") {
            let _ = writeln!(out, "    ISRC {isrc}");
        }
        if let Some(flags) = own("CDAUDIO_TRACK_FLAGS") {
            let _ = writeln!(out, "    FLAGS {flags}");
        }
        for index in 0..100 {
            if let Some(start) = cue_index(atom, index) {
                let _ = writeln!(out, "    INDEX {index:02} {}", cue_time(start));
            }
        }
        if let Some(date) = own("DATE_RELEASED").or_else(|| own("DATE")) {
            let _ = writeln!(out, "    REM DATE \"{date}\"");
        }
        if let Some(genre) = own("GENRE") {
            let _ = writeln!(out, "    REM GENRE \"{genre}\"");
        }
        for comment in comments(tag) {
            let _ = writeln!(out, "    REM \"{comment}\"");
        }
    }
    out
}

/// Select an attachment by 1-based index, `=UID` or file name.
pub fn find_attachment<'a>(attachments: &'a Attachments, selector: &str) -> Option<&'a AttachedFile> {
    if let Some(uid) = selector.strip_prefix('=') {
        return attachments.by_uid(uid.parse().ok()?);
    }
    match selector.parse::<usize>() {
        Ok(index) => attachments.by_index(index),
        Err(_) => attachments.files.iter().find(|f| f.name == selector),
    }
}

/// Write selected attachments; a missing output path uses the file name.
pub fn extract_attachments(
    attachments: &Attachments,
    selections: &[(String, Option<PathBuf>)],
    directory: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(selections.len());
    for (selector, path) in selections {
        let Some(file) = find_attachment(attachments, selector) else {
            warn!(selector = selector.as_str(), "No attachment matches the selector");
            return Err(MkvError::InvalidProperty {
                name: "attachment".to_string(),
                message: format!("no attachment matches '{selector}'"),
            });
        };
        let path = path.clone().unwrap_or_else(|| directory.join(&file.name));
        std::fs::write(&path, &file.data)?;
        debug!(name = file.name.as_str(), bytes = file.data.len(), "Extracted attachment");
        written.push(path);
    }
    Ok(written)
}
