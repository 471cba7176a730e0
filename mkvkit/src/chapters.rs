//! Chapters: typed model, simple OGM-style text and JSON.
//!
//! Simple chapter files look like
//!
//! ```text
//! CHAPTER01=00:00:00.000
//! CHAPTER01NAME=Intro
//! CHAPTER02=00:02:30.500
//! CHAPTER02NAME=Part 1
//! ```

use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::tree::Node;
use crate::uid;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// All editions of a segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chapters {
    pub editions: Vec<EditionEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditionEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub ordered: bool,
    pub atoms: Vec<ChapterAtom>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterAtom {
    #[serde(default)]
    pub uid: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_uid: Option<String>,
    /// Start in nanoseconds.
    pub start: u64,
    /// End in nanoseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_uid: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub track_uids: Vec<u64>,
    #[serde(default)]
    pub displays: Vec<ChapterDisplay>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChapterAtom>,
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterDisplay {
    pub string: String,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

impl ChapterDisplay {
    pub fn new(string: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            string: string.into(),
            languages: vec![language.into()],
            countries: Vec::new(),
        }
    }
}

impl ChapterAtom {
    pub fn new(start: u64, name: impl Into<String>, language: &str) -> Self {
        Self {
            uid: 0,
            string_uid: None,
            start,
            end: None,
            hidden: false,
            enabled: true,
            segment_uid: None,
            track_uids: Vec::new(),
            displays: vec![ChapterDisplay::new(name, language)],
            children: Vec::new(),
        }
    }

    /// The first display string.
    pub fn name(&self) -> Option<&str> {
        self.displays.first().map(|d| d.string.as_str())
    }

    fn from_node(node: &Node) -> Self {
        let displays = node
            .children_with(CHAPTER_DISPLAY)
            .map(|display| ChapterDisplay {
                string: display.child_str(CHAP_STRING).unwrap_or_default().to_string(),
                languages: {
                    let languages: Vec<String> = display
                        .children_with(CHAP_LANGUAGE)
                        .filter_map(Node::as_str)
                        .map(str::to_string)
                        .collect();
                    if languages.is_empty() {
                        default_languages()
                    } else {
                        languages
                    }
                },
                countries: display
                    .children_with(CHAP_COUNTRY)
                    .filter_map(Node::as_str)
                    .map(str::to_string)
                    .collect(),
            })
            .collect();

        Self {
            uid: node.child_uint(CHAPTER_UID).unwrap_or(0),
            string_uid: node.child_str(CHAPTER_STRING_UID).map(str::to_string),
            start: node.child_uint(CHAPTER_TIME_START).unwrap_or(0),
            end: node.child_uint(CHAPTER_TIME_END),
            hidden: node.child_uint_or_default(CHAPTER_FLAG_HIDDEN).unwrap_or(0) != 0,
            enabled: node.child_uint_or_default(CHAPTER_FLAG_ENABLED).unwrap_or(1) != 0,
            segment_uid: node.child_binary(CHAPTER_SEGMENT_UID).map(<[u8]>::to_vec),
            track_uids: node
                .child(CHAPTER_TRACK)
                .map(|track| track.children_with(CHAPTER_TRACK_UID).filter_map(Node::as_uint).collect())
                .unwrap_or_default(),
            displays,
            children: node.children_with(CHAPTER_ATOM).map(Self::from_node).collect(),
        }
    }

    fn to_node(&self) -> Node {
        let mut node = Node::new_master(CHAPTER_ATOM);
        node.push(Node::uint(CHAPTER_UID, self.uid));
        if let Some(string_uid) = &self.string_uid {
            node.push(Node::text(CHAPTER_STRING_UID, string_uid.as_str()));
        }
        node.push(Node::uint(CHAPTER_TIME_START, self.start));
        if let Some(end) = self.end {
            node.push(Node::uint(CHAPTER_TIME_END, end));
        }
        node.push(Node::uint(CHAPTER_FLAG_HIDDEN, self.hidden as u64));
        node.push(Node::uint(CHAPTER_FLAG_ENABLED, self.enabled as u64));
        if let Some(segment_uid) = &self.segment_uid {
            node.push(Node::binary(CHAPTER_SEGMENT_UID, segment_uid.clone()));
        }
        if !self.track_uids.is_empty() {
            let uids = self.track_uids.iter().map(|&u| Node::uint(CHAPTER_TRACK_UID, u)).collect();
            node.push(Node::master(CHAPTER_TRACK, uids));
        }
        for display in &self.displays {
            let mut display_node = Node::new_master(CHAPTER_DISPLAY);
            display_node.push(Node::text(CHAP_STRING, display.string.as_str()));
            for language in &display.languages {
                display_node.push(Node::text(CHAP_LANGUAGE, language.as_str()));
            }
            for country in &display.countries {
                display_node.push(Node::text(CHAP_COUNTRY, country.as_str()));
            }
            node.push(display_node);
        }
        for child in &self.children {
            node.push(child.to_node());
        }
        node
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a ChapterAtom>) {
        out.push(self);
        for child in &self.children {
            child.visit(out);
        }
    }

    fn visit_mut(&mut self, f: &mut impl FnMut(&mut ChapterAtom)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }
}

impl Chapters {
    pub fn from_node(node: &Node) -> Self {
        let editions = node
            .children_with(EDITION_ENTRY)
            .map(|edition| EditionEntry {
                uid: edition.child_uint(EDITION_UID),
                hidden: edition.child_uint_or_default(EDITION_FLAG_HIDDEN).unwrap_or(0) != 0,
                default: edition.child_uint_or_default(EDITION_FLAG_DEFAULT).unwrap_or(0) != 0,
                ordered: edition.child_uint_or_default(EDITION_FLAG_ORDERED).unwrap_or(0) != 0,
                atoms: edition.children_with(CHAPTER_ATOM).map(ChapterAtom::from_node).collect(),
            })
            .collect();
        Self { editions }
    }

    pub fn to_node(&self) -> Node {
        let mut node = Node::new_master(CHAPTERS);
        for edition in &self.editions {
            let mut edition_node = Node::new_master(EDITION_ENTRY);
            if let Some(uid) = edition.uid {
                edition_node.push(Node::uint(EDITION_UID, uid));
            }
            edition_node.push(Node::uint(EDITION_FLAG_HIDDEN, edition.hidden as u64));
            edition_node.push(Node::uint(EDITION_FLAG_DEFAULT, edition.default as u64));
            if edition.ordered {
                edition_node.push(Node::uint(EDITION_FLAG_ORDERED, 1));
            }
            for atom in &edition.atoms {
                edition_node.push(atom.to_node());
            }
            node.push(edition_node);
        }
        node
    }

    pub fn is_empty(&self) -> bool {
        self.editions.iter().all(|e| e.atoms.is_empty())
    }

    /// Every atom of every edition, depth first.
    pub fn atoms(&self) -> Vec<&ChapterAtom> {
        let mut out = Vec::new();
        for edition in &self.editions {
            for atom in &edition.atoms {
                atom.visit(&mut out);
            }
        }
        out
    }

    /// Give every edition and atom without a UID a fresh random one.
    pub fn assign_missing_uids(&mut self) {
        let mut used: Vec<u64> = self.atoms().iter().map(|a| a.uid).filter(|&u| u != 0).collect();
        for edition in &mut self.editions {
            if matches!(edition.uid, None | Some(0)) {
                edition.uid = Some(uid::random_uid());
            }
            for atom in &mut edition.atoms {
                atom.visit_mut(&mut |a| {
                    if a.uid == 0 {
                        a.uid = uid::unique_uid(&mut used);
                    }
                });
            }
        }
    }

    /// Shift every start and end time by `offset` nanoseconds, dropping
    /// atoms that would start before zero.
    pub fn shift(&mut self, offset: i64) {
        fn shift_atoms(atoms: &mut Vec<ChapterAtom>, offset: i64) {
            atoms.retain(|a| a.start as i64 + offset >= 0);
            for atom in atoms.iter_mut() {
                atom.start = (atom.start as i64 + offset) as u64;
                atom.end = atom.end.map(|end| (end as i64 + offset).max(0) as u64);
                shift_atoms(&mut atom.children, offset);
            }
        }
        for edition in &mut self.editions {
            shift_atoms(&mut edition.atoms, offset);
        }
    }

    /// Append the editions of `other`.
    pub fn merge(&mut self, other: Chapters) {
        self.editions.extend(other.editions);
    }

    /// Parse simple `CHAPTERnn=` / `CHAPTERnnNAME=` text.
    ///
    /// Every timestamp line must be followed by its name line. Chapters
    /// land in a single edition; UIDs are assigned randomly.
    pub fn parse_simple(text: &str, language: &str) -> Result<Self> {
        let mut atoms = Vec::new();
        let mut pending: Option<(usize, String, u64)> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim_start_matches('\u{feff}').trim();
            if line.is_empty() {
                continue;
            }
            let err = |message: String| MkvError::InvalidChapters { line: line_no, message };

            let rest = line
                .strip_prefix("CHAPTER")
                .ok_or_else(|| err(format!("expected a CHAPTER line, found '{line}'")))?;
            let (key, value) = rest
                .split_once('=')
                .ok_or_else(|| err("missing '='".to_string()))?;

            match (key.strip_suffix("NAME"), pending.take()) {
                (None, None) => {
                    let start = mkvkit_core::parse_timestamp(value.trim())
                        .map_err(|e| err(e.to_string()))?;
                    if start < 0 {
                        return Err(err("negative chapter start".to_string()));
                    }
                    pending = Some((line_no, key.to_string(), start as u64));
                }
                (Some(name_key), Some((_, number, start))) if name_key == number => {
                    atoms.push(ChapterAtom::new(start, value, language));
                }
                (Some(name_key), Some((_, number, _))) => {
                    return Err(err(format!(
                        "CHAPTER{name_key}NAME does not match CHAPTER{number}"
                    )));
                }
                (Some(_), None) => {
                    return Err(err("chapter name without a preceding timestamp".to_string()));
                }
                (None, Some((start_line, number, _))) => {
                    return Err(MkvError::InvalidChapters {
                        line: start_line,
                        message: format!("CHAPTER{number} has no name line"),
                    });
                }
            }
        }

        if let Some((line, number, _)) = pending {
            return Err(MkvError::InvalidChapters {
                line,
                message: format!("CHAPTER{number} has no name line"),
            });
        }

        let mut chapters = Chapters {
            editions: vec![EditionEntry {
                atoms,
                ..Default::default()
            }],
        };
        chapters.assign_missing_uids();
        Ok(chapters)
    }

    /// Render as simple chapter text, numbering from `first_number`.
    pub fn to_simple(&self, first_number: usize) -> String {
        let mut out = String::new();
        for (i, atom) in self.atoms().into_iter().enumerate() {
            let number = first_number + i;
            let ms = atom.start / 1_000_000;
            let _ = writeln!(
                out,
                "CHAPTER{number:02}={:02}:{:02}:{:02}.{:03}",
                ms / 3_600_000,
                (ms / 60_000) % 60,
                (ms / 1000) % 60,
                ms % 1000
            );
            let _ = writeln!(out, "CHAPTER{number:02}NAME={}", atom.name().unwrap_or_default());
        }
        out
    }

    /// Load chapters from a file's contents: JSON if it looks like JSON,
    /// simple chapter text otherwise.
    pub fn parse_any(text: &str, language: &str) -> Result<Self> {
        let trimmed = text.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('{') {
            let mut chapters: Chapters = serde_json::from_str(trimmed).map_err(|e| {
                MkvError::InvalidChapters {
                    line: e.line(),
                    message: e.to_string(),
                }
            })?;
            chapters.assign_missing_uids();
            Ok(chapters)
        } else {
            Self::parse_simple(text, language)
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| MkvError::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "CHAPTER01=00:00:00.000\nCHAPTER01NAME=Intro\n\
                          CHAPTER02=00:02:30.500\nCHAPTER02NAME=Part 1\n";

    #[test]
    fn test_parse_simple() {
        let chapters = Chapters::parse_simple(SIMPLE, "ger").unwrap();
        let atoms = chapters.atoms();
        assert_eq!(atoms.len(), 2);
        assert_eq!(atoms[0].name(), Some("Intro"));
        assert_eq!(atoms[1].start, 150_500_000_000);
        assert_eq!(atoms[1].displays[0].languages, vec!["ger".to_string()]);
        assert!(atoms.iter().all(|a| a.uid != 0));
        assert_ne!(atoms[0].uid, atoms[1].uid);
    }

    #[test]
    fn test_simple_roundtrip() {
        let chapters = Chapters::parse_simple(SIMPLE, "eng").unwrap();
        assert_eq!(chapters.to_simple(1), SIMPLE);
    }

    #[test]
    fn test_parse_simple_errors() {
        let err = Chapters::parse_simple("CHAPTER01=00:00:01.000\n", "eng").unwrap_err();
        assert!(matches!(err, MkvError::InvalidChapters { line: 1, .. }));

        let err = Chapters::parse_simple("CHAPTER01NAME=x\n", "eng").unwrap_err();
        assert!(matches!(err, MkvError::InvalidChapters { line: 1, .. }));

        let text = "CHAPTER01=00:00:01.000\nCHAPTER02NAME=x\n";
        let err = Chapters::parse_simple(text, "eng").unwrap_err();
        assert!(matches!(err, MkvError::InvalidChapters { line: 2, .. }));

        let err = Chapters::parse_simple("garbage\n", "eng").unwrap_err();
        assert!(matches!(err, MkvError::InvalidChapters { line: 1, .. }));
    }

    #[test]
    fn test_node_roundtrip() {
        let mut chapters = Chapters::parse_simple(SIMPLE, "eng").unwrap();
        chapters.editions[0].atoms[0].children.push(ChapterAtom {
            uid: 99,
            end: Some(10),
            track_uids: vec![5],
            ..ChapterAtom::new(1, "Nested", "fre")
        });
        let node = chapters.to_node();
        assert!(node.validate().is_ok());
        assert_eq!(Chapters::from_node(&node), chapters);
        assert_eq!(chapters.atoms().len(), 3);
    }

    #[test]
    fn test_json_roundtrip() {
        let chapters = Chapters::parse_simple(SIMPLE, "eng").unwrap();
        let json = chapters.to_json().unwrap();
        assert_eq!(Chapters::parse_any(&json, "eng").unwrap(), chapters);
    }

    #[test]
    fn test_shift() {
        let mut chapters = Chapters::parse_simple(SIMPLE, "eng").unwrap();
        chapters.shift(-1_000_000_000);
        let atoms = chapters.atoms();
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].start, 149_500_000_000);
    }
}
