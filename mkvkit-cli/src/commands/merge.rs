//! Merge command: multiplex tracks of one or more Matroska files into a new file.

use anyhow::{bail, Context};
use clap::Args;
use console::style;
use mkvkit::session::TrackCompression;
use mkvkit::{CueStrategy, InputConfig, MergeConfig, MuxSession, TimestampSync, TrackOptions};
use mkvkit_core::parse_timestamp;
use std::path::PathBuf;
use tracing::{debug, info};

/// Merge tracks from several files into one.
///
/// Per-track options take a track ID of the form `TRACK` or `FILE:TRACK`,
/// where `FILE` is the 0-based position of the input on the command line
/// (default 0) and `TRACK` the track number inside that file.
#[derive(Args, Debug, Default)]
pub struct CmdMerge {
    /// Input files; a leading `+` appends the file to the previous one.
    pub inputs: Vec<String>,

    /// Output file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON file with merge options; command line flags are applied on top.
    #[arg(long, value_name = "FILE")]
    pub options_file: Option<PathBuf>,

    /// Segment title.
    #[arg(long)]
    pub title: Option<String>,

    /// Write a WebM file.
    #[arg(long)]
    pub webm: bool,

    /// Chapter file (simple text or JSON) replacing the inputs' chapters.
    #[arg(long, value_name = "FILE")]
    pub chapters: Option<PathBuf>,

    /// Language for chapters read from simple chapter files.
    #[arg(long, value_name = "LANG")]
    pub chapter_language: Option<String>,

    /// Attach a file.
    #[arg(long = "attach-file", value_name = "FILE")]
    pub attach_files: Vec<PathBuf>,

    /// Tracks to copy from an input: `[FILE:]N[,N...]`.
    #[arg(long, value_name = "[FILE:]LIST")]
    pub tracks: Vec<String>,

    /// Track language: `TID:LANG`.
    #[arg(long, value_name = "TID:LANG")]
    pub language: Vec<String>,

    /// Track name: `TID:NAME`.
    #[arg(long, value_name = "TID:NAME")]
    pub track_name: Vec<String>,

    /// Default flag: `TID:0|1`.
    #[arg(long, value_name = "TID:BOOL")]
    pub default_track: Vec<String>,

    /// Forced flag: `TID:0|1`.
    #[arg(long, value_name = "TID:BOOL")]
    pub forced_track: Vec<String>,

    /// Timestamp sync: `TID:DELAY_MS[,NUM/DEN]`.
    #[arg(long, value_name = "TID:SYNC")]
    pub sync: Vec<String>,

    /// External timestamp file: `TID:FILE`.
    #[arg(long, value_name = "TID:FILE")]
    pub timestamps: Vec<String>,

    /// Default duration, e.g. `TID:25fps`, `TID:50i` or `TID:40ms`.
    #[arg(long, value_name = "TID:DURATION")]
    pub default_duration: Vec<String>,

    /// Content compression: `TID:none` or `TID:header_removal:<hex>`.
    #[arg(long, value_name = "TID:COMPRESSION")]
    pub compression: Vec<String>,

    /// Cue entries: `TID:none|keyframes|sparse|all`.
    #[arg(long, value_name = "TID:STRATEGY")]
    pub cues: Vec<String>,

    /// Do not copy chapters from the input at this position.
    #[arg(long, value_name = "FILE")]
    pub no_chapters: Vec<usize>,

    /// Do not copy tags from the input at this position.
    #[arg(long, value_name = "FILE")]
    pub no_tags: Vec<usize>,

    /// Do not copy attachments from the input at this position.
    #[arg(long, value_name = "FILE")]
    pub no_attachments: Vec<usize>,

    /// Maximum cluster duration in milliseconds.
    #[arg(long, value_name = "MS")]
    pub cluster_length: Option<u64>,

    /// Write a CRC-32 element into every cluster.
    #[arg(long)]
    pub clusters_crc32: bool,

    /// Never lace audio frames.
    #[arg(long)]
    pub no_lacing: bool,

    /// Do not write a Cues index.
    #[arg(long)]
    pub no_cues: bool,

    /// Do not write track statistics tags.
    #[arg(long)]
    pub disable_track_statistics_tags: bool,
}

impl CmdMerge {
    /// Execute the merge command.
    pub fn run(&self) -> anyhow::Result<usize> {
        let config = self.build_config()?;
        info!(
            output = %config.output.display(),
            inputs = config.inputs.len(),
            "Merging"
        );

        let output = config.output.clone();
        let session = MuxSession::open(config)?;
        let report = session
            .run_to_file(&output)
            .with_context(|| format!("cannot write {}", output.display()))?;

        println!(
            "{} {} ({} tracks, {} packets)",
            style("Wrote").green().bold(),
            output.display(),
            report.tracks,
            report.packets
        );
        Ok(super::report_warnings(&report.warnings))
    }

    /// Combine the options file and the command line into one configuration.
    pub fn build_config(&self) -> anyhow::Result<MergeConfig> {
        let mut config = match &self.options_file {
            Some(path) => MergeConfig::load(path)
                .with_context(|| format!("cannot read options file {}", path.display()))?,
            None => MergeConfig::default(),
        };

        for input in &self.inputs {
            let input_config = match input.strip_prefix('+') {
                Some(path) => {
                    let mut appended = InputConfig::new(path);
                    appended.append = true;
                    appended
                }
                None => InputConfig::new(input),
            };
            config.inputs.push(input_config);
        }
        if config.inputs.is_empty() {
            bail!("no input files");
        }
        if config.inputs[0].append {
            bail!("the first input cannot be appended to anything");
        }

        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if config.output.as_os_str().is_empty() {
            bail!("no output file given");
        }
        if self.title.is_some() {
            config.title = self.title.clone();
        }
        config.webm |= self.webm;
        if self.chapters.is_some() {
            config.chapters = self.chapters.clone();
        }
        if let Some(language) = &self.chapter_language {
            config.chapter_language = language.clone();
        }
        config.attachments.extend(self.attach_files.iter().cloned());

        if let Some(ms) = self.cluster_length {
            config.clusters.max_duration = ms as i64 * 1_000_000;
        }
        config.clusters.crc32 |= self.clusters_crc32;
        if self.no_lacing {
            config.clusters.lacing = false;
        }
        if self.no_cues {
            config.cues = false;
        }
        if self.disable_track_statistics_tags {
            config.track_statistics = false;
        }

        for spec in &self.tracks {
            let (file, list) = match spec.split_once(':') {
                Some((file, list)) => (parse_file_index(file)?, list),
                None => (0, spec.as_str()),
            };
            let tracks = list
                .split(',')
                .map(|n| n.trim().parse::<u64>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("invalid track list '{spec}'"))?;
            input_at(&mut config, file)?.tracks = tracks;
        }
        for &file in &self.no_chapters {
            input_at(&mut config, file)?.no_chapters = true;
        }
        for &file in &self.no_tags {
            input_at(&mut config, file)?.no_tags = true;
        }
        for &file in &self.no_attachments {
            input_at(&mut config, file)?.no_attachments = true;
        }

        apply(&mut config, &self.language, |options, value| {
            options.language = Some(value.to_string());
            Ok(())
        })?;
        apply(&mut config, &self.track_name, |options, value| {
            options.name = Some(value.to_string());
            Ok(())
        })?;
        apply(&mut config, &self.default_track, |options, value| {
            options.default = Some(parse_bool(value)?);
            Ok(())
        })?;
        apply(&mut config, &self.forced_track, |options, value| {
            options.forced = Some(parse_bool(value)?);
            Ok(())
        })?;
        apply(&mut config, &self.sync, |options, value| {
            options.sync = Some(value.parse::<TimestampSync>()?);
            Ok(())
        })?;
        apply(&mut config, &self.timestamps, |options, value| {
            options.timestamps = Some(PathBuf::from(value));
            Ok(())
        })?;
        apply(&mut config, &self.default_duration, |options, value| {
            options.default_duration = Some(parse_default_duration(value)?);
            Ok(())
        })?;
        apply(&mut config, &self.compression, |options, value| {
            options.compression = Some(value.parse::<TrackCompression>()?);
            Ok(())
        })?;
        apply(&mut config, &self.cues, |options, value| {
            options.cues = Some(parse_cue_strategy(value)?);
            Ok(())
        })?;

        debug!(?config, "Merge configuration");
        Ok(config)
    }
}

fn input_at(config: &mut MergeConfig, file: usize) -> anyhow::Result<&mut InputConfig> {
    let count = config.inputs.len();
    config
        .inputs
        .get_mut(file)
        .with_context(|| format!("input {file} does not exist ({count} inputs given)"))
}

/// Apply every `TID:value` argument of one option.
fn apply<F>(config: &mut MergeConfig, specs: &[String], mut set: F) -> anyhow::Result<()>
where
    F: FnMut(&mut TrackOptions, &str) -> anyhow::Result<()>,
{
    for spec in specs {
        let (file, track, value) = parse_track_arg(spec)?;
        let input = input_at(config, file)?;
        set(input.options_mut(track), value).with_context(|| format!("invalid argument '{spec}'"))?;
    }
    Ok(())
}

fn parse_file_index(s: &str) -> anyhow::Result<usize> {
    s.trim()
        .parse()
        .with_context(|| format!("'{s}' is not an input position"))
}

/// Split `[FILE:]TRACK:VALUE` into its parts.
pub(crate) fn parse_track_arg(spec: &str) -> anyhow::Result<(usize, u64, &str)> {
    let mut parts = spec.splitn(3, ':');
    let first = parts.next().unwrap_or_default();
    let Some(second) = parts.next() else {
        bail!("'{spec}' must look like TID:VALUE");
    };
    let Ok(first_number) = first.trim().parse::<u64>() else {
        bail!("'{first}' is not a track ID in '{spec}'");
    };

    if let (Some(rest), Ok(track)) = (parts.next(), second.trim().parse::<u64>()) {
        let file = usize::try_from(first_number)?;
        return Ok((file, track, rest));
    }
    let value = &spec[first.len() + 1..];
    Ok((0, first_number, value))
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" => Ok(true),
        "0" | "no" | "false" => Ok(false),
        other => bail!("'{other}' is not a boolean"),
    }
}

fn parse_cue_strategy(value: &str) -> anyhow::Result<CueStrategy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "none" => Ok(CueStrategy::None),
        "keyframes" | "iframes" => Ok(CueStrategy::Keyframes),
        "sparse" => Ok(CueStrategy::Sparse),
        "all" => Ok(CueStrategy::All),
        other => bail!("unknown cue strategy '{other}'"),
    }
}

/// Parse a frame duration given as a rate (`25fps`, `24000/1001p`, `50i`)
/// or as a time (`40ms`, `0.04s`), in nanoseconds.
pub(crate) fn parse_default_duration(value: &str) -> anyhow::Result<i64> {
    let value = value.trim();
    let rate = |number: &str| -> anyhow::Result<f64> {
        let rate = match number.split_once('/') {
            Some((num, den)) => num.trim().parse::<f64>()? / den.trim().parse::<f64>()?,
            None => number.trim().parse::<f64>()?,
        };
        if !rate.is_finite() || rate <= 0.0 {
            bail!("'{value}' is not a positive rate");
        }
        Ok(rate)
    };

    let duration = if let Some(number) = value.strip_suffix("fps").or_else(|| value.strip_suffix('p')) {
        (1e9 / rate(number)?).round() as i64
    } else if let Some(number) = value.strip_suffix('i') {
        (2e9 / rate(number)?).round() as i64
    } else {
        parse_timestamp(value)?
    };
    if duration <= 0 {
        bail!("default duration '{value}' must be positive");
    }
    Ok(duration)
}
