//! Propedit command: change properties of an existing file in place.

use anyhow::{bail, Context};
use clap::Args;
use console::style;
use mkvkit::PropEdit;
use std::path::PathBuf;

/// Edit segment info, track headers, chapters, tags and attachments in place.
///
/// Operations are applied in order: `--edit info|track:N|track:vN|track:aN|track:sN|track:@N|track:=UID`
/// selects a scope; `--set`, `--add` and `--delete` change properties of it.
/// `--chapters FILE`, `--tags all:FILE`, `--add-attachment FILE` and
/// `--delete-attachment SELECTOR` replace level 1 elements.
#[derive(Args, Debug)]
pub struct CmdPropedit {
    /// The file to modify.
    pub file: PathBuf,

    /// Edit operations.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "OPERATIONS")]
    pub operations: Vec<String>,
}

impl CmdPropedit {
    /// Execute the propedit command.
    pub fn run(&self) -> anyhow::Result<usize> {
        let edit = self.parse()?;
        if edit.is_empty() {
            bail!("nothing to do");
        }
        let report = edit
            .run(&self.file)
            .with_context(|| format!("cannot edit {}", self.file.display()))?;

        println!(
            "{} {} change(s) in {}",
            style("Applied").green().bold(),
            report.changes,
            self.file.display()
        );
        if !report.updated.is_empty() {
            println!("  {:<10} {}", style("Updated:").dim(), report.updated.join(", "));
        }
        if !report.removed.is_empty() {
            println!("  {:<10} {}", style("Removed:").dim(), report.removed.join(", "));
        }
        Ok(0)
    }

    pub fn parse(&self) -> anyhow::Result<PropEdit> {
        Ok(PropEdit::from_args(&self.operations)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(operations: &[&str]) -> CmdPropedit {
        CmdPropedit {
            file: PathBuf::from("movie.mkv"),
            operations: operations.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_operations() {
        let edit = command(&["--edit", "track:a1", "--set", "language=ger", "--delete", "name"])
            .parse()
            .unwrap();
        assert_eq!(edit.edits.len(), 1);
        assert_eq!(edit.edits[0].changes.len(), 2);
    }

    #[test]
    fn test_parse_rejects_unknown_option() {
        assert!(command(&["--frobnicate"]).parse().is_err());
    }

    #[test]
    fn test_empty_edit_is_rejected() {
        let err = command(&[]).run().unwrap_err();
        assert!(err.to_string().contains("nothing to do"));
    }
}
