//! External timestamp files.
//!
//! A [`TimestampFactory`] decides which timestamp (and duration) each frame
//! of a track gets. Factories are built from text files whose first line is
//! `# timestamp format vN` (or the older `# timecode format vN`):
//!
//! * v1: `assume <fps>` followed by `start,end,fps` frame ranges
//! * v2: one timestamp in milliseconds per line, ordered
//! * v3: `assume <fps>` followed by `duration[,fps]` and `gap,duration` lines
//! * v4: like v2 without the ordering requirement

use crate::diagnostics::Diagnostics;
use crate::error::{MkvError, Result};
use mkvkit_core::Packet;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const NS_PER_SECOND: f64 = 1_000_000_000.0;

/// Assigns timestamps to frames in presentation order.
pub trait TimestampFactory: Send + std::fmt::Debug {
    /// Assign the timestamp (and, unless preserved, the duration) of the next
    /// frame. Returns `true` when a gap precedes this frame.
    fn next(&mut self, packet: &mut Packet, diagnostics: &mut Diagnostics) -> bool;

    /// Default frame duration in nanoseconds, if the factory implies one.
    fn default_duration(&self) -> Option<i64> {
        None
    }
}

fn should_set_duration(preserve: bool, packet: &Packet) -> bool {
    !preserve || !matches!(packet.duration, Some(d) if d > 0)
}

/// Parse a timestamp file.
///
/// `source` names the file in error messages. Lines that can be skipped are
/// reported to `diagnostics`.
pub fn parse(
    text: &str,
    source: &str,
    preserve_duration: bool,
    diagnostics: &mut Diagnostics,
) -> Result<Box<dyn TimestampFactory>> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));
    let (_, header) = lines.next().ok_or_else(|| file_error(source, 1, "empty file"))?;
    let version = parse_header(header.trim_start_matches('\u{feff}'))
        .ok_or_else(|| file_error(source, 1, "the first line must look like '# timestamp format v2'"))?;

    let body: Vec<(usize, &str)> = lines.collect();
    let factory: Box<dyn TimestampFactory> = match version {
        1 => Box::new(V1Factory::parse(&body, source, preserve_duration, diagnostics)?),
        2 | 4 => Box::new(V2Factory::parse(&body, source, version, preserve_duration)?),
        3 => Box::new(V3Factory::parse(&body, source, preserve_duration, diagnostics)?),
        other => {
            return Err(file_error(source, 1, format!("unsupported format version {other}")));
        }
    };
    debug!(source, version, "Parsed timestamp file");
    Ok(factory)
}

/// Read and parse a timestamp file from disk.
pub fn load(
    path: &Path,
    preserve_duration: bool,
    diagnostics: &mut Diagnostics,
) -> Result<Box<dyn TimestampFactory>> {
    let text = std::fs::read_to_string(path)?;
    parse(&text, &path.display().to_string(), preserve_duration, diagnostics)
}

/// Constant frame rate factory for a track's default duration.
pub fn fps_factory(default_duration: i64) -> Result<Box<dyn TimestampFactory>> {
    if default_duration <= 0 {
        return Err(MkvError::InvalidState(format!(
            "default duration must be positive, got {default_duration}"
        )));
    }
    Ok(Box::new(V1Factory::with_ranges(
        NS_PER_SECOND / default_duration as f64,
        Vec::new(),
        false,
    )))
}

fn parse_header(line: &str) -> Option<u32> {
    let lower = line.trim().to_ascii_lowercase();
    let rest = lower
        .strip_prefix("# timestamp format v")
        .or_else(|| lower.strip_prefix("# timecode format v"))?;
    rest.trim().parse().ok()
}

fn file_error(source: &str, line: usize, message: impl Into<String>) -> MkvError {
    MkvError::InvalidTimestampFile {
        file: source.to_string(),
        line,
        message: message.into(),
    }
}

fn is_comment(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

/// Skip comments and parse the mandatory `assume <fps>` line.
fn parse_assume<'a, I>(lines: &mut I, source: &str) -> Result<f64>
where
    I: Iterator<Item = &'a (usize, &'a str)>,
{
    for &(line_no, raw) in lines.by_ref() {
        let line = raw.trim();
        if is_comment(line) {
            continue;
        }
        let lower = line.to_ascii_lowercase();
        return lower
            .strip_prefix("assume ")
            .and_then(|fps| fps.trim().parse::<f64>().ok())
            .filter(|fps| *fps > 0.0)
            .ok_or_else(|| file_error(source, line_no, "expected a valid 'assume <fps>' line"));
    }
    Err(file_error(source, 0, "missing 'assume <fps>' line"))
}

// -------------------------------------------------------------------------
// v1
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct FrameRange {
    start_frame: u64,
    end_frame: u64,
    fps: f64,
    base: f64,
}

/// Frame-rate ranges.
#[derive(Debug)]
pub struct V1Factory {
    ranges: Vec<FrameRange>,
    frame: u64,
    current: usize,
    preserve_duration: bool,
}

impl V1Factory {
    fn parse(
        body: &[(usize, &str)],
        source: &str,
        preserve_duration: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let mut lines = body.iter();
        let default_fps = parse_assume(&mut lines, source)?;

        let mut ranges = Vec::new();
        for &(line_no, raw) in lines {
            let line = raw.trim();
            if is_comment(line) {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let parsed = match fields.as_slice() {
                [start, end, fps] => match (start.parse::<i64>(), end.parse::<i64>(), fps.parse::<f64>()) {
                    (Ok(s), Ok(e), Ok(f)) => Some((s, e, f)),
                    _ => None,
                },
                _ => None,
            };
            let Some((start, end, fps)) = parsed else {
                diagnostics.warn(format!("{source}: line {line_no} could not be parsed"));
                continue;
            };
            if fps <= 0.0 || start < 0 || end < start {
                diagnostics.warn(format!("{source}: line {line_no} contains inconsistent data"));
                continue;
            }
            ranges.push(FrameRange {
                start_frame: start as u64,
                end_frame: end as u64,
                fps,
                base: 0.0,
            });
        }
        Ok(Self::with_ranges(default_fps, ranges, preserve_duration))
    }

    fn with_ranges(default_fps: f64, mut ranges: Vec<FrameRange>, preserve_duration: bool) -> Self {
        let filler = |start_frame, end_frame| FrameRange {
            start_frame,
            end_frame,
            fps: default_fps,
            base: 0.0,
        };

        ranges.sort_by_key(|r| r.start_frame);
        let mut filled: Vec<FrameRange> = Vec::with_capacity(ranges.len() * 2 + 2);
        for range in ranges {
            let next_free = filled.last().map_or(0, |r: &FrameRange| r.end_frame + 1);
            if range.start_frame > next_free {
                filled.push(filler(next_free, range.start_frame - 1));
            }
            filled.push(range);
        }
        let tail_start = filled.last().map_or(0, |r| r.end_frame + 1);
        filled.push(filler(tail_start, u64::MAX));

        for i in 1..filled.len() {
            let previous = &filled[i - 1];
            let frames = (previous.end_frame - previous.start_frame + 1) as f64;
            let base = previous.base + frames * NS_PER_SECOND / previous.fps;
            filled[i].base = base;
        }

        Self {
            ranges: filled,
            frame: 0,
            current: 0,
            preserve_duration,
        }
    }

    fn timestamp_at(&self, frame: u64) -> i64 {
        let mut range = &self.ranges[self.current];
        if frame > range.end_frame && self.current + 1 < self.ranges.len() {
            range = &self.ranges[self.current + 1];
        }
        (range.base + NS_PER_SECOND * (frame - range.start_frame) as f64 / range.fps) as i64
    }
}

impl TimestampFactory for V1Factory {
    fn next(&mut self, packet: &mut Packet, _: &mut Diagnostics) -> bool {
        packet.timestamp = self.timestamp_at(self.frame);
        if should_set_duration(self.preserve_duration, packet) {
            packet.duration = Some(self.timestamp_at(self.frame + 1) - packet.timestamp);
        }
        self.frame += 1;
        if self.frame > self.ranges[self.current].end_frame && self.current + 1 < self.ranges.len() {
            self.current += 1;
        }
        false
    }

    fn default_duration(&self) -> Option<i64> {
        self.ranges
            .last()
            .map(|r| (NS_PER_SECOND / r.fps) as i64)
    }
}

// -------------------------------------------------------------------------
// v2 / v4
// -------------------------------------------------------------------------

/// One timestamp per frame.
#[derive(Debug)]
pub struct V2Factory {
    timestamps: Vec<i64>,
    durations: Vec<i64>,
    default_duration: Option<i64>,
    frame: usize,
    warned: bool,
    preserve_duration: bool,
}

impl V2Factory {
    fn parse(body: &[(usize, &str)], source: &str, version: u32, preserve_duration: bool) -> Result<Self> {
        let mut timestamps: Vec<i64> = Vec::new();
        let mut durations = Vec::new();
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        let mut previous = f64::MIN;

        for &(line_no, raw) in body {
            let line = raw.trim();
            if is_comment(line) {
                continue;
            }
            let ms: f64 = line
                .parse()
                .map_err(|_| file_error(source, line_no, "not a valid floating point number"))?;
            if version == 2 && ms < previous {
                return Err(file_error(
                    source,
                    line_no,
                    "timestamps are not ordered; use format v4 for unordered timestamps",
                ));
            }
            previous = ms;
            let ns = (ms * 1_000_000.0) as i64;
            if let Some(&last) = timestamps.last() {
                let duration = ns - last;
                *counts.entry(duration).or_default() += 1;
                durations.push(duration);
            }
            timestamps.push(ns);
        }

        if timestamps.is_empty() {
            return Err(file_error(source, 0, "no valid entries"));
        }

        // Most common difference; ties resolve to the smallest.
        let mut most_common: Option<(i64, usize)> = None;
        for (&duration, &count) in &counts {
            if most_common.map_or(true, |(_, best)| count > best) {
                most_common = Some((duration, count));
            }
        }
        let default_duration = most_common.map(|(d, _)| d).filter(|&d| d > 0);
        durations.push(default_duration.unwrap_or(0));

        Ok(Self {
            timestamps,
            durations,
            default_duration,
            frame: 0,
            warned: false,
            preserve_duration,
        })
    }
}

impl TimestampFactory for V2Factory {
    fn next(&mut self, packet: &mut Packet, diagnostics: &mut Diagnostics) -> bool {
        let index = if self.frame < self.timestamps.len() {
            self.frame
        } else {
            if !self.warned {
                diagnostics.warn_track(
                    packet.track_number,
                    format!(
                        "only {} external timestamps for more frames; reusing the last one",
                        self.timestamps.len()
                    ),
                );
                self.warned = true;
            }
            self.timestamps.len() - 1
        };

        packet.timestamp = self.timestamps[index];
        if should_set_duration(self.preserve_duration, packet) {
            packet.duration = Some(self.durations[index.min(self.durations.len() - 1)]);
        }
        self.frame += 1;
        false
    }

    fn default_duration(&self) -> Option<i64> {
        self.default_duration
    }
}

// -------------------------------------------------------------------------
// v3
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct DurationEntry {
    is_gap: bool,
    duration: i64,
    fps: f64,
}

/// Durations with frame rates and gaps.
#[derive(Debug)]
pub struct V3Factory {
    entries: Vec<DurationEntry>,
    current: usize,
    offset: i64,
    position: i64,
    preserve_duration: bool,
}

impl V3Factory {
    fn parse(
        body: &[(usize, &str)],
        source: &str,
        preserve_duration: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let mut lines = body.iter();
        let default_fps = parse_assume(&mut lines, source)?;

        let mut entries = Vec::new();
        for &(line_no, raw) in lines {
            let line = raw.trim();
            if is_comment(line) {
                continue;
            }
            let lower = line.to_ascii_lowercase();
            let entry = if let Some(gap) = lower.strip_prefix("gap,") {
                let seconds: f64 = gap
                    .trim()
                    .parse()
                    .map_err(|_| file_error(source, line_no, "invalid gap duration"))?;
                DurationEntry {
                    is_gap: true,
                    duration: (seconds * NS_PER_SECOND) as i64,
                    fps: default_fps,
                }
            } else {
                let mut fields = line.split(',').map(str::trim);
                let duration = fields.next().and_then(|d| d.parse::<f64>().ok());
                let fps = match fields.next() {
                    Some(f) => f.parse::<f64>().ok(),
                    None => Some(default_fps),
                };
                match (duration, fps) {
                    (Some(d), Some(f)) => DurationEntry {
                        is_gap: false,
                        duration: (d * NS_PER_SECOND) as i64,
                        fps: f,
                    },
                    _ => {
                        diagnostics.warn(format!("{source}: line {line_no} could not be parsed"));
                        continue;
                    }
                }
            };
            if entry.fps < 0.0 || entry.duration <= 0 {
                diagnostics.warn(format!("{source}: line {line_no} contains inconsistent data"));
                continue;
            }
            entries.push(entry);
        }

        if entries.is_empty() {
            diagnostics.warn(format!("{source}: no valid entries"));
        }
        entries.push(DurationEntry {
            is_gap: false,
            duration: i64::MAX,
            fps: default_fps,
        });

        Ok(Self {
            entries,
            current: 0,
            offset: 0,
            position: 0,
            preserve_duration,
        })
    }
}

impl TimestampFactory for V3Factory {
    fn next(&mut self, packet: &mut Packet, _: &mut Diagnostics) -> bool {
        let mut gap = false;
        while self.entries[self.current].is_gap || self.entries[self.current].duration == 0 {
            self.offset += self.entries[self.current].duration;
            self.current += 1;
            gap = true;
        }

        packet.timestamp = self.offset + self.position;
        let entry = &self.entries[self.current];
        if entry.fps > 0.0 && should_set_duration(self.preserve_duration, packet) {
            packet.duration = Some((NS_PER_SECOND / entry.fps) as i64);
        }

        self.position += packet.duration.unwrap_or(0);
        if self.position >= entry.duration {
            self.offset += entry.duration;
            self.position = 0;
            self.current += 1;
        }
        gap
    }

    fn default_duration(&self) -> Option<i64> {
        self.entries
            .last()
            .filter(|e| e.fps > 0.0)
            .map(|e| (NS_PER_SECOND / e.fps) as i64)
    }
}
