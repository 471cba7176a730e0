//! mkvkit CLI - merge, extract and edit Matroska files.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CmdExtract, CmdInfo, CmdMerge, CmdPropedit};
use console::style;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code for a run that completed with warnings.
const EXIT_WARNINGS: u8 = 1;
/// Exit code for a run that failed.
const EXIT_ERROR: u8 = 2;

/// Command-line arguments for the mkvkit tool.
#[derive(Parser, Debug)]
#[command(name = "mkvkit")]
#[command(version)]
#[command(about = "Create, inspect, extract from and edit Matroska and WebM files")]
#[command(long_about = "mkvkit multiplexes tracks into Matroska/WebM files, extracts their \n\
    content and edits their headers in place.\n\n\
    EXAMPLES:\n    \
    mkvkit merge -o out.mkv video.mkv audio.mka +audio-part2.mka\n    \
    mkvkit merge -o out.mkv --language 1:ger --sync 2:-200 in.mkv\n    \
    mkvkit extract tracks in.mkv 1:video.vp9 3:subs.srt\n    \
    mkvkit extract chapters in.mkv --json\n    \
    mkvkit propedit in.mkv --edit info --set title=Movie --edit track:a1 --set language=fre\n    \
    mkvkit info in.mkv --json\n\n\
    EXIT STATUS:\n    \
    0 success, 1 completed with warnings, 2 error")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Quiet mode (no log output)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Multiplex tracks from several files into a new file.
    Merge(CmdMerge),
    /// Extract tracks, timestamps, chapters, tags, CUE sheets or attachments.
    Extract(CmdExtract),
    /// Change properties of an existing file in place.
    Propedit(CmdPropedit),
    /// Show the structure, tracks and metadata of a file.
    Info(CmdInfo),
}

impl Commands {
    fn run(&self) -> anyhow::Result<usize> {
        match self {
            Commands::Merge(cmd) => cmd.run(),
            Commands::Extract(cmd) => cmd.run(),
            Commands::Propedit(cmd) => cmd.run(),
            Commands::Info(cmd) => cmd.run(),
        }
    }
}

fn init_logging(cli: &Cli) {
    if cli.quiet {
        return;
    }
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command.run() {
        Ok(0) => ExitCode::SUCCESS,
        Ok(warnings) => {
            eprintln!(
                "{} completed with {} warning(s)",
                style("Done:").yellow().bold(),
                warnings
            );
            ExitCode::from(EXIT_WARNINGS)
        }
        Err(err) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), err);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_propedit_operations() {
        let cli = Cli::try_parse_from([
            "mkvkit", "propedit", "movie.mkv", "--edit", "track:v1", "--set", "name=Main",
        ])
        .unwrap();
        let Commands::Propedit(cmd) = cli.command else {
            panic!("expected propedit");
        };
        assert_eq!(cmd.operations, vec!["--edit", "track:v1", "--set", "name=Main"]);
    }

    #[test]
    fn test_parse_merge() {
        let cli = Cli::try_parse_from([
            "mkvkit", "-q", "merge", "-o", "out.mkv", "a.mkv", "+b.mkv", "--language", "1:ger",
        ])
        .unwrap();
        assert!(cli.quiet);
        let Commands::Merge(cmd) = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(cmd.inputs, vec!["a.mkv", "+b.mkv"]);
        assert_eq!(cmd.language, vec!["1:ger"]);
    }

    #[test]
    fn test_parse_extract_timestamps() {
        let cli = Cli::try_parse_from(["mkvkit", "extract", "timestamps_v2", "in.mkv", "1:t.txt"]).unwrap();
        assert!(matches!(cli.command, Commands::Extract(_)));
    }
}
