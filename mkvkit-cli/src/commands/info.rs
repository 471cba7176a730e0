//! Matroska file inspection command.

use super::{format_size, open_demuxer, report_warnings};
use clap::Args;
use console::style;
use mkvkit::{AttachedFile, MkvDemuxer, SegmentInfo, TrackEntry};
use mkvkit_core::timestamp::format_timestamp_with_precision;
use serde::Serialize;
use std::io::{Read, Seek};
use std::path::PathBuf;

/// One level 1 element.
#[derive(Debug, Clone, Serialize)]
pub struct ElementInfo {
    pub name: &'static str,
    pub id: String,
    pub position: u64,
    pub size: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unknown_size: bool,
}

/// Everything `info` reports about a file.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo<'a> {
    pub file: String,
    pub size_bytes: u64,
    pub doc_type: String,
    pub doc_type_version: Option<u64>,
    pub layout: Vec<ElementInfo>,
    pub segment_info: &'a SegmentInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ns: Option<i64>,
    pub tracks: &'a [TrackEntry],
    pub chapters: usize,
    pub tags: usize,
    pub cue_points: usize,
    pub attachments: &'a [AttachedFile],
    pub warnings: Vec<String>,
}

impl<'a> FileInfo<'a> {
    pub fn collect<R: Read + Seek>(file: String, size_bytes: u64, demuxer: &'a MkvDemuxer<R>) -> Self {
        let header = demuxer.ebml_header.as_ref();
        FileInfo {
            file,
            size_bytes,
            doc_type: header.map_or_else(|| "matroska".to_string(), |h| h.doc_type.clone()),
            doc_type_version: header.map(|h| h.doc_type_version),
            layout: demuxer
                .layout()
                .iter()
                .map(|e| ElementInfo {
                    name: e.name(),
                    id: format!("0x{:X}", e.id),
                    position: e.position,
                    size: e.total_size(),
                    unknown_size: e.unknown_size,
                })
                .collect(),
            segment_info: &demuxer.segment_info,
            duration_ns: demuxer.duration_ns(),
            tracks: &demuxer.tracks,
            chapters: demuxer.chapters.atoms().len(),
            tags: demuxer.tags.tags.len(),
            cue_points: demuxer.cues.points.len(),
            attachments: &demuxer.attachments.files,
            warnings: demuxer.diagnostics().warnings().iter().map(|w| w.to_string()).collect(),
        }
    }
}

/// Inspect a Matroska file.
#[derive(Args, Debug)]
pub struct CmdInfo {
    /// Path to the file.
    pub file: PathBuf,

    /// Output in JSON format.
    #[arg(long)]
    pub json: bool,

    /// List every level 1 element, clusters included.
    #[arg(long)]
    pub all: bool,
}

impl CmdInfo {
    /// Execute the info command.
    pub fn run(&self) -> anyhow::Result<usize> {
        if !self.file.exists() {
            anyhow::bail!("File not found: {}", self.file.display());
        }
        let size_bytes = std::fs::metadata(&self.file)?.len();
        let demuxer = open_demuxer(&self.file)?;
        let info = FileInfo::collect(self.file.display().to_string(), size_bytes, &demuxer);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(info.warnings.len())
        } else {
            self.print(&info);
            Ok(report_warnings(demuxer.diagnostics().warnings()))
        }
    }

    fn print(&self, info: &FileInfo<'_>) {
        println!();
        println!("{}", style("File Information").cyan().bold());
        println!();
        println!("  {:<16} {}", style("File:").white(), info.file);
        println!("  {:<16} {}", style("Size:").white(), format_size(info.size_bytes));
        match info.doc_type_version {
            Some(version) => println!("  {:<16} {} v{}", style("Format:").white(), info.doc_type, version),
            None => println!("  {:<16} {}", style("Format:").white(), info.doc_type),
        }
        let segment = info.segment_info;
        if let Some(title) = &segment.title {
            println!("  {:<16} {}", style("Title:").white(), title);
        }
        if let Some(duration) = info.duration_ns {
            println!(
                "  {:<16} {}",
                style("Duration:").white(),
                format_timestamp_with_precision(duration, 3)
            );
        }
        println!("  {:<16} {} ns", style("Timestamp scale:").white(), segment.timestamp_scale);
        if let Some(app) = &segment.muxing_app {
            println!("  {:<16} {}", style("Muxing app:").white(), app);
        }
        if let Some(app) = &segment.writing_app {
            println!("  {:<16} {}", style("Writing app:").white(), app);
        }

        println!();
        println!("{}", style("Layout:").cyan().bold());
        let mut clusters = 0usize;
        for element in &info.layout {
            if element.name == "Cluster" && !self.all {
                clusters += 1;
                continue;
            }
            let size = if element.unknown_size {
                "unknown size".to_string()
            } else {
                format_size(element.size)
            };
            println!(
                "  {:>12}  {:<12} {:<10} {}",
                element.position,
                element.name,
                style(&element.id).dim(),
                size
            );
        }
        if clusters > 0 {
            println!("  {:>12}  {} cluster(s)", "", clusters);
        }

        if !info.tracks.is_empty() {
            println!();
            println!("{}", style("Tracks:").cyan().bold());
            for track in info.tracks {
                print_track(track);
            }
        }

        println!();
        println!(
            "  {:<16} {} chapter(s), {} tag(s), {} cue point(s), {} attachment(s)",
            style("Metadata:").white(),
            info.chapters,
            info.tags,
            info.cue_points,
            info.attachments.len()
        );
        for (index, file) in info.attachments.iter().enumerate() {
            println!(
                "    {:>2}. {} ({}, {})",
                index + 1,
                file.name,
                file.media_type,
                format_size(file.size() as u64)
            );
        }
        println!();
    }
}

fn print_track(track: &TrackEntry) {
    let kind = track
        .track_type
        .map_or_else(|| "unknown".to_string(), |t| t.to_string());
    println!();
    println!(
        "  {} #{} ({}) uid {}",
        style("Track").white(),
        track.number,
        style(kind).yellow(),
        track.uid
    );
    println!("    {:<14} {}", style("Codec:").dim(), track.codec());
    println!("    {:<14} {}", style("Language:").dim(), track.language);
    if let Some(name) = &track.name {
        println!("    {:<14} {}", style("Name:").dim(), name);
    }
    let mut flags = Vec::new();
    if track.flag_default {
        flags.push("default");
    }
    if track.flag_forced {
        flags.push("forced");
    }
    if !track.flag_enabled {
        flags.push("disabled");
    }
    if !flags.is_empty() {
        println!("    {:<14} {}", style("Flags:").dim(), flags.join(", "));
    }
    if let Some(duration) = track.default_duration {
        println!(
            "    {:<14} {:.3} ms ({:.3} fps)",
            style("Frame length:").dim(),
            duration as f64 / 1e6,
            1e9 / duration as f64
        );
    }
    if let Some(video) = &track.video {
        println!("    {:<14} {}x{}", style("Resolution:").dim(), video.pixel_width, video.pixel_height);
        if let (Some(w), Some(h)) = (video.display_width, video.display_height) {
            println!("    {:<14} {}x{}", style("Display:").dim(), w, h);
        }
    }
    if let Some(audio) = &track.audio {
        println!("    {:<14} {} Hz", style("Sample Rate:").dim(), audio.sampling_frequency);
        let channels = match audio.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            6 => "5.1".to_string(),
            8 => "7.1".to_string(),
            n => format!("{} channels", n),
        };
        println!("    {:<14} {}", style("Channels:").dim(), channels);
        if let Some(depth) = audio.bit_depth {
            println!("    {:<14} {}", style("Bit depth:").dim(), depth);
        }
    }
    if let Some(prefix) = track.header_removal_prefix() {
        println!("    {:<14} header removal ({} bytes)", style("Compression:").dim(), prefix.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mkvkit::elements::codec_ids;
    use mkvkit::{AudioSettings, MkvMuxer, MuxerConfig, TrackType};
    use mkvkit_core::Packet;
    use std::io::Cursor;

    fn sample() -> Vec<u8> {
        let config = MuxerConfig {
            title: Some("Info test".to_string()),
            ..Default::default()
        };
        let mut muxer = MkvMuxer::new(Cursor::new(Vec::new()), config);
        let mut track = TrackEntry::new(1, TrackType::Audio, codec_ids::A_PCM_INT_LIT);
        track.audio = Some(AudioSettings::new(8000.0, 1));
        muxer.add_track(track, None).unwrap();
        for i in 0..10 {
            muxer
                .write_packet(Packet::new(1, i * 20_000_000, vec![0; 16]).with_duration(20_000_000))
                .unwrap();
        }
        muxer.finalize().unwrap();
        muxer.into_inner().into_inner()
    }

    #[test]
    fn test_collect_file_info() {
        let bytes = sample();
        let size = bytes.len() as u64;
        let demuxer = MkvDemuxer::open(Cursor::new(bytes)).unwrap();
        let info = FileInfo::collect("test.mkv".to_string(), size, &demuxer);

        assert_eq!(info.doc_type, "matroska");
        assert_eq!(info.tracks.len(), 1);
        assert_eq!(info.segment_info.title.as_deref(), Some("Info test"));
        assert!(info.layout.iter().any(|e| e.name == "Info"));
        assert!(info.layout.iter().any(|e| e.name == "Cluster"));
        assert!(info.warnings.is_empty());

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"file\":\"test.mkv\""));
        assert!(json.contains("\"doc_type\":\"matroska\""));
    }
}
