//! Extract command: tracks, timestamps, chapters, tags, CUE sheets and attachments.

use super::{open_demuxer, report_warnings};
use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use console::style;
use mkvkit::extract::{chapters_text, extract_attachments, tags_json};
use mkvkit::{cuesheet, extract_tracks, TrackFormat, TrackOutput};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Extract content from a Matroska file.
#[derive(Args, Debug)]
pub struct CmdExtract {
    #[command(subcommand)]
    pub what: ExtractWhat,
}

#[derive(Subcommand, Debug)]
pub enum ExtractWhat {
    /// Write track frames to files: `TID:OUTPUT`.
    Tracks {
        file: PathBuf,
        #[arg(required = true, value_name = "TID:OUTPUT")]
        targets: Vec<String>,
        /// Write text subtitles as raw frames instead of SRT.
        #[arg(long)]
        raw: bool,
    },
    /// Write v2 timestamp files: `TID:OUTPUT`.
    #[command(name = "timestamps_v2", alias = "timestamps-v2")]
    TimestampsV2 {
        file: PathBuf,
        #[arg(required = true, value_name = "TID:OUTPUT")]
        targets: Vec<String>,
    },
    /// Print or write the chapters.
    Chapters {
        file: PathBuf,
        /// JSON instead of simple chapter text.
        #[arg(long)]
        json: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print or write the tags as JSON.
    Tags {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print or write a CUE sheet built from chapters and tags.
    Cuesheet {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write attachments: `SELECTOR[:OUTPUT]`, where the selector is a
    /// 1-based index, `=UID` or a file name.
    Attachments {
        file: PathBuf,
        #[arg(required = true, value_name = "SELECTOR[:OUTPUT]")]
        selections: Vec<String>,
        /// Directory for attachments written under their own name.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

impl CmdExtract {
    /// Execute the extract command.
    pub fn run(&self) -> anyhow::Result<usize> {
        match &self.what {
            ExtractWhat::Tracks { file, targets, raw } => {
                let format = raw.then_some(TrackFormat::Raw);
                extract_frames(file, targets, format)
            }
            ExtractWhat::TimestampsV2 { file, targets } => {
                extract_frames(file, targets, Some(TrackFormat::TimestampsV2))
            }
            ExtractWhat::Chapters { file, json, output } => {
                let demuxer = open_demuxer(file)?;
                if demuxer.chapters.is_empty() {
                    eprintln!("{} {} has no chapters", style("Note:").dim(), file.display());
                } else {
                    write_text(output.as_deref(), &chapters_text(&demuxer.chapters, *json)?)?;
                }
                Ok(report_warnings(demuxer.diagnostics().warnings()))
            }
            ExtractWhat::Tags { file, output } => {
                let demuxer = open_demuxer(file)?;
                write_text(output.as_deref(), &tags_json(&demuxer.tags)?)?;
                Ok(report_warnings(demuxer.diagnostics().warnings()))
            }
            ExtractWhat::Cuesheet { file, output } => {
                let demuxer = open_demuxer(file)?;
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let sheet = cuesheet(&demuxer.chapters, &demuxer.tags, &name);
                if sheet.is_empty() {
                    bail!("{} has no chapters to build a CUE sheet from", file.display());
                }
                write_text(output.as_deref(), &sheet)?;
                Ok(report_warnings(demuxer.diagnostics().warnings()))
            }
            ExtractWhat::Attachments {
                file,
                selections,
                dir,
            } => {
                let demuxer = open_demuxer(file)?;
                let selections: Vec<(String, Option<PathBuf>)> = selections
                    .iter()
                    .map(|s| match s.split_once(':') {
                        Some((selector, path)) => (selector.to_string(), Some(PathBuf::from(path))),
                        None => (s.clone(), None),
                    })
                    .collect();
                for path in extract_attachments(&demuxer.attachments, &selections, dir)? {
                    println!("{} {}", style("Wrote").green().bold(), path.display());
                }
                Ok(report_warnings(demuxer.diagnostics().warnings()))
            }
        }
    }
}

/// Split `TID:OUTPUT`.
pub(crate) fn parse_target(spec: &str) -> anyhow::Result<(u64, PathBuf)> {
    let (track, path) = spec
        .split_once(':')
        .with_context(|| format!("'{spec}' must look like TID:OUTPUT"))?;
    let track = track
        .trim()
        .parse()
        .with_context(|| format!("'{track}' is not a track number"))?;
    if path.is_empty() {
        bail!("missing output file in '{spec}'");
    }
    Ok((track, PathBuf::from(path)))
}

fn extract_frames(file: &Path, targets: &[String], format: Option<TrackFormat>) -> anyhow::Result<usize> {
    let mut demuxer = open_demuxer(file)?;
    let mut outputs = Vec::with_capacity(targets.len());
    for spec in targets {
        let (track, path) = parse_target(spec)?;
        let mut output = TrackOutput::create(track, &path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        if let Some(format) = format {
            output = output.with_format(format);
        }
        outputs.push(output);
    }

    for extracted in extract_tracks(&mut demuxer, outputs)? {
        println!(
            "{} track {} ({:?}): {} frames, {} bytes",
            style("Extracted").green().bold(),
            extracted.track,
            extracted.format,
            extracted.frames,
            extracted.bytes
        );
    }
    Ok(report_warnings(demuxer.diagnostics().warnings()))
}

/// Write to a file, or to stdout without one.
fn write_text(path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("2:out.srt").unwrap(), (2, PathBuf::from("out.srt")));
        assert_eq!(parse_target("1:C:\\out.bin").unwrap(), (1, PathBuf::from("C:\\out.bin")));
        assert!(parse_target("out.srt").is_err());
        assert!(parse_target("a:out.srt").is_err());
        assert!(parse_target("3:").is_err());
    }

    #[test]
    fn test_write_text_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapters.txt");
        write_text(Some(&path), "CHAPTER01=00:00:00.000\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "CHAPTER01=00:00:00.000\n");
    }
}
