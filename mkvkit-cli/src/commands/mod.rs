//! CLI subcommand implementations.
//!
//! Every command returns the number of warnings it encountered so `main`
//! can pick the exit code.

pub mod extract;
pub mod info;
pub mod merge;
pub mod propedit;

pub use extract::CmdExtract;
pub use info::CmdInfo;
pub use merge::CmdMerge;
pub use propedit::CmdPropedit;

use anyhow::Context;
use console::style;
use mkvkit::{MkvDemuxer, Warning};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Open a Matroska file for reading.
pub(crate) fn open_demuxer(path: &Path) -> anyhow::Result<MkvDemuxer<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    MkvDemuxer::open(BufReader::new(file))
        .with_context(|| format!("{} is not a readable Matroska file", path.display()))
}

/// Print collected warnings to stderr and return how many there were.
pub(crate) fn report_warnings(warnings: &[Warning]) -> usize {
    for warning in warnings {
        eprintln!("{} {}", style("Warning:").yellow().bold(), warning);
    }
    warnings.len()
}

pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_open_missing_file() {
        let Err(err) = open_demuxer(Path::new("/nonexistent/file.mkv")) else {
            panic!("opened a missing file");
        };
        assert!(err.to_string().contains("cannot open"));
    }
}
