//! Property editing of existing files.
//!
//! Changes are collected into a [`PropEdit`], usually from command line
//! arguments in the order they were given:
//!
//! ```text
//! --edit info --set title=Movie --delete date
//! --edit track:a1 --set language=ger --set flag-default=0
//! --chapters chapters.txt --delete-tags --add-attachment cover.jpg
//! ```
//!
//! [`PropEdit::apply`] prepares and validates every element first and only
//! then hands them to the [`Analyzer`].

use crate::analyzer::{Analyzer, EditTarget};
use crate::attachments::{AttachedFile, Attachments};
use crate::chapters::Chapters;
use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::info::utc_to_date;
use crate::schema::{self, ValueType};
use crate::tags::Tags;
use crate::tree::Node;
use crate::uid;

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Which master a property belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Info,
    Track,
}

/// An editable element.
#[derive(Debug)]
pub struct Property {
    pub name: &'static str,
    pub id: u32,
    /// Master holding the element (Info, TrackEntry, Video or Audio).
    pub parent: u32,
    pub section: Section,
    pub description: &'static str,
}

impl Property {
    pub fn value_type(&self) -> ValueType {
        schema::lookup(self.id).map_or(ValueType::Binary, |e| e.value_type)
    }

    fn is_flag(&self) -> bool {
        self.name.starts_with("flag-")
    }

    fn is_multiple(&self) -> bool {
        schema::lookup(self.id).is_some_and(|e| e.multiple)
    }

    /// Required byte length of binary values.
    fn binary_len(&self) -> Option<usize> {
        matches!(self.id, SEGMENT_UID | PREV_UID | NEXT_UID).then_some(16)
    }
}

const fn info_property(name: &'static str, id: u32, description: &'static str) -> Property {
    Property {
        name,
        id,
        parent: INFO,
        section: Section::Info,
        description,
    }
}

const fn track_property(name: &'static str, id: u32, parent: u32, description: &'static str) -> Property {
    Property {
        name,
        id,
        parent,
        section: Section::Track,
        description,
    }
}

/// Every property that can be edited.
pub static PROPERTIES: &[Property] = &[
    info_property("title", TITLE, "Title of the segment"),
    info_property("date", DATE_UTC, "Date of the muxing (RFC 3339 or Unix seconds)"),
    info_property("segment-filename", SEGMENT_FILENAME, "File name of this segment"),
    info_property("prev-filename", PREV_FILENAME, "File name of the previous segment"),
    info_property("next-filename", NEXT_FILENAME, "File name of the next segment"),
    info_property("segment-uid", SEGMENT_UID, "UID of this segment (16 hex bytes)"),
    info_property("prev-uid", PREV_UID, "UID of the previous segment"),
    info_property("next-uid", NEXT_UID, "UID of the next segment"),
    info_property("muxing-application", MUXING_APP, "Library used to write the file"),
    info_property("writing-application", WRITING_APP, "Application used to write the file"),
    track_property("track-number", TRACK_NUMBER, TRACK_ENTRY, "Number used in blocks"),
    track_property("track-uid", TRACK_UID, TRACK_ENTRY, "Unique track ID"),
    track_property("flag-default", FLAG_DEFAULT, TRACK_ENTRY, "Default track flag"),
    track_property("flag-enabled", FLAG_ENABLED, TRACK_ENTRY, "Enabled track flag"),
    track_property("flag-forced", FLAG_FORCED, TRACK_ENTRY, "Forced track flag"),
    track_property("flag-lacing", FLAG_LACING, TRACK_ENTRY, "Track may use lacing"),
    track_property("min-cache", MIN_CACHE, TRACK_ENTRY, "Minimum number of cached frames"),
    track_property("max-cache", MAX_CACHE, TRACK_ENTRY, "Maximum number of cached frames"),
    track_property("default-duration", DEFAULT_DURATION, TRACK_ENTRY, "Frame duration in nanoseconds"),
    track_property("name", NAME, TRACK_ENTRY, "Track name"),
    track_property("language", LANGUAGE, TRACK_ENTRY, "ISO 639-2 language code"),
    track_property("codec-id", CODEC_ID, TRACK_ENTRY, "Codec ID"),
    track_property("codec-name", CODEC_NAME, TRACK_ENTRY, "Human-readable codec name"),
    track_property("codec-delay", CODEC_DELAY, TRACK_ENTRY, "Codec delay in nanoseconds"),
    track_property("interlaced", FLAG_INTERLACED, VIDEO, "Interlacing (0 unknown, 1 yes, 2 no)"),
    track_property("pixel-width", PIXEL_WIDTH, VIDEO, "Width of the encoded picture"),
    track_property("pixel-height", PIXEL_HEIGHT, VIDEO, "Height of the encoded picture"),
    track_property("display-width", DISPLAY_WIDTH, VIDEO, "Display width"),
    track_property("display-height", DISPLAY_HEIGHT, VIDEO, "Display height"),
    track_property("display-unit", DISPLAY_UNIT, VIDEO, "Unit of the display size"),
    track_property("pixel-crop-left", PIXEL_CROP_LEFT, VIDEO, "Pixels to crop on the left"),
    track_property("pixel-crop-top", PIXEL_CROP_TOP, VIDEO, "Pixels to crop at the top"),
    track_property("pixel-crop-right", PIXEL_CROP_RIGHT, VIDEO, "Pixels to crop on the right"),
    track_property("pixel-crop-bottom", PIXEL_CROP_BOTTOM, VIDEO, "Pixels to crop at the bottom"),
    track_property("aspect-ratio-type", ASPECT_RATIO_TYPE, VIDEO, "Aspect ratio handling"),
    track_property("stereo-mode", STEREO_MODE, VIDEO, "Stereo 3D layout"),
    track_property("sampling-frequency", SAMPLING_FREQUENCY, AUDIO, "Sampling frequency in Hz"),
    track_property(
        "output-sampling-frequency",
        OUTPUT_SAMPLING_FREQUENCY,
        AUDIO,
        "Output sampling frequency in Hz",
    ),
    track_property("channels", CHANNELS, AUDIO, "Number of channels"),
    track_property("bit-depth", BIT_DEPTH, AUDIO, "Bits per sample"),
];

pub fn lookup_property(section: Section, name: &str) -> Option<&'static Property> {
    PROPERTIES
        .iter()
        .find(|p| p.section == section && p.name.eq_ignore_ascii_case(name))
}

/// Selects one track of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSelector {
    /// The Nth track, counting from 1.
    Position(usize),
    /// The Nth track of a type, counting from 1.
    OfType(TrackType, usize),
    /// The track with this track number.
    Number(u64),
    /// The track with this UID.
    Uid(u64),
}

impl FromStr for TrackSelector {
    type Err = MkvError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || MkvError::InvalidProperty {
            name: "track".to_string(),
            message: format!("'{s}' is not a track selector (N, vN, aN, sN, bN, @N or =UID)"),
        };
        let number = |digits: &str| digits.parse::<u64>().map_err(|_| invalid());

        if let Some(rest) = s.strip_prefix('@') {
            return Ok(TrackSelector::Number(number(rest)?));
        }
        if let Some(rest) = s.strip_prefix('=') {
            return Ok(TrackSelector::Uid(number(rest)?));
        }
        let track_type = match s.chars().next() {
            Some('v') => Some(TrackType::Video),
            Some('a') => Some(TrackType::Audio),
            Some('s') => Some(TrackType::Subtitle),
            Some('b') => Some(TrackType::Buttons),
            _ => None,
        };
        let (digits, track_type) = match track_type {
            Some(track_type) => (&s[1..], Some(track_type)),
            None => (s, None),
        };
        let n = number(digits)? as usize;
        if n == 0 {
            return Err(invalid());
        }
        Ok(match track_type {
            Some(track_type) => TrackSelector::OfType(track_type, n),
            None => TrackSelector::Position(n),
        })
    }
}

impl fmt::Display for TrackSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSelector::Position(n) => write!(f, "{n}"),
            TrackSelector::OfType(track_type, n) => {
                write!(f, "{}{n}", track_type.selector_char().unwrap_or('?'))
            }
            TrackSelector::Number(n) => write!(f, "@{n}"),
            TrackSelector::Uid(uid) => write!(f, "={uid}"),
        }
    }
}

impl TrackSelector {
    /// Index into `tracks.children()` of the selected TrackEntry.
    pub fn select(&self, tracks: &Node) -> Option<usize> {
        let mut entries = tracks
            .children()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.id == TRACK_ENTRY);
        let found = match *self {
            TrackSelector::Position(n) => entries.nth(n.checked_sub(1)?),
            TrackSelector::OfType(track_type, n) => entries
                .filter(|(_, e)| e.child_uint(TRACK_TYPE) == Some(track_type.to_u64()))
                .nth(n.checked_sub(1)?),
            TrackSelector::Number(number) => entries.find(|(_, e)| e.child_uint(TRACK_NUMBER) == Some(number)),
            TrackSelector::Uid(uid) => entries.find(|(_, e)| e.child_uint(TRACK_UID) == Some(uid)),
        };
        found.map(|(index, _)| index)
    }
}

/// What is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditScope {
    Info,
    Track(TrackSelector),
}

impl EditScope {
    pub fn section(&self) -> Section {
        match self {
            EditScope::Info => Section::Info,
            EditScope::Track(_) => Section::Track,
        }
    }
}

/// Parses `info`, `segment_info`, or `track:<selector>`.
impl FromStr for EditScope {
    type Err = MkvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "info" | "segment_info" | "segmentinfo" => Ok(EditScope::Info),
            _ => match s.strip_prefix("track:") {
                Some(selector) => Ok(EditScope::Track(selector.parse()?)),
                None => Err(MkvError::InvalidProperty {
                    name: "edit".to_string(),
                    message: format!("'{s}' is neither 'info' nor 'track:<selector>'"),
                }),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Set,
    Delete,
}

/// One property change with its parsed value.
#[derive(Debug, Clone)]
pub struct Change {
    pub kind: ChangeKind,
    pub property: &'static Property,
    value: Option<Node>,
}

impl Change {
    /// Parse `name=value`, or `name` for deletions.
    pub fn parse(kind: ChangeKind, section: Section, spec: &str) -> Result<Self> {
        let (name, raw) = match (kind, spec.split_once('=')) {
            (ChangeKind::Delete, _) => (spec.trim(), None),
            (_, Some((name, value))) => (name.trim(), Some(value)),
            (_, None) => {
                return Err(MkvError::InvalidProperty {
                    name: spec.to_string(),
                    message: "expected 'name=value'".to_string(),
                });
            }
        };
        let property = lookup_property(section, name).ok_or_else(|| MkvError::InvalidProperty {
            name: name.to_string(),
            message: "unknown property".to_string(),
        })?;
        let value = raw.map(|raw| parse_value(property, raw)).transpose()?;
        Ok(Self {
            kind,
            property,
            value,
        })
    }

    /// Apply to an Info or TrackEntry master.
    fn apply(&self, target: &mut Node) -> Result<()> {
        let property = self.property;
        let holder = if property.parent == target.id {
            target
        } else {
            if target.child(property.parent).is_none() {
                if self.kind == ChangeKind::Delete {
                    return Ok(());
                }
                target.set_child(Node::new_master(property.parent));
            }
            target
                .child_mut(property.parent)
                .ok_or_else(|| MkvError::Other(format!("missing {}", schema::name_of(property.parent))))?
        };

        match (self.kind, &self.value) {
            (ChangeKind::Delete, _) => {
                holder.remove_children(property.id);
            }
            (ChangeKind::Add, Some(value)) => {
                if !property.is_multiple() && holder.child(property.id).is_some() {
                    return Err(MkvError::InvalidProperty {
                        name: property.name.to_string(),
                        message: "is already present; use --set to change it".to_string(),
                    });
                }
                holder.set_child(value.clone());
            }
            (ChangeKind::Set, Some(value)) => holder.set_child(value.clone()),
            (_, None) => {}
        }
        Ok(())
    }
}

fn parse_value(property: &Property, raw: &str) -> Result<Node> {
    let invalid = |message: String| MkvError::InvalidProperty {
        name: property.name.to_string(),
        message,
    };
    let id = property.id;
    let raw_trimmed = raw.trim();

    match property.value_type() {
        ValueType::UInt if property.is_flag() => {
            let flag = match raw_trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => 1,
                "0" | "false" | "no" => 0,
                _ => return Err(invalid(format!("'{raw}' is not a boolean"))),
            };
            Ok(Node::uint(id, flag))
        }
        ValueType::UInt => raw_trimmed
            .parse()
            .map(|v| Node::uint(id, v))
            .map_err(|_| invalid(format!("'{raw}' is not an unsigned integer"))),
        ValueType::SInt => raw_trimmed
            .parse()
            .map(|v| Node::sint(id, v))
            .map_err(|_| invalid(format!("'{raw}' is not an integer"))),
        ValueType::Float => raw_trimmed
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| Node::float(id, v))
            .ok_or_else(|| invalid(format!("'{raw}' is not a number"))),
        ValueType::String if !raw.is_ascii() => Err(invalid(format!("'{raw}' is not ASCII"))),
        ValueType::String | ValueType::Utf8 => Ok(Node::text(id, raw)),
        ValueType::Date => parse_date(raw_trimmed)
            .map(|date| Node::date(id, date))
            .ok_or_else(|| invalid(format!("'{raw}' is neither RFC 3339 nor Unix seconds"))),
        ValueType::Binary => {
            let bytes = parse_hex(raw_trimmed).ok_or_else(|| invalid(format!("'{raw}' is not hex")))?;
            match property.binary_len() {
                Some(len) if bytes.len() != len => {
                    Err(invalid(format!("expected {len} bytes, got {}", bytes.len())))
                }
                _ => Ok(Node::binary(id, bytes)),
            }
        }
        ValueType::Master => Err(invalid("masters cannot be set".to_string())),
    }
}

/// RFC 3339 or Unix seconds, as a Matroska date.
fn parse_date(text: &str) -> Option<i64> {
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(utc_to_date(time.with_timezone(&Utc)));
    }
    let seconds: i64 = text.parse().ok()?;
    DateTime::from_timestamp(seconds, 0).map(utc_to_date)
}

/// Hex bytes, optionally prefixed with `0x` and separated by spaces.
fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text
        .split_whitespace()
        .map(|part| part.trim_start_matches("0x"))
        .flat_map(str::bytes)
        .collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

/// Property changes for one scope.
#[derive(Debug, Clone)]
pub struct Edit {
    pub scope: EditScope,
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChaptersAction {
    /// Replace all chapters with a simple text or JSON chapter file.
    Replace(PathBuf),
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagsAction {
    /// Replace all tags with a JSON tag file.
    ReplaceAll(PathBuf),
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentAction {
    Add(PathBuf),
    /// Remove by 1-based index, `=UID` or file name.
    Delete(String),
}

/// Summary of an applied [`PropEdit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropEditReport {
    pub changes: usize,
    pub updated: Vec<&'static str>,
    pub removed: Vec<&'static str>,
}

/// A set of edits applied to one file.
#[derive(Debug, Clone)]
pub struct PropEdit {
    pub edits: Vec<Edit>,
    pub chapters: Option<ChaptersAction>,
    pub tags: Option<TagsAction>,
    pub attachments: Vec<AttachmentAction>,
    /// Language of chapters read from simple chapter files.
    pub chapter_language: String,
}

impl Default for PropEdit {
    fn default() -> Self {
        Self {
            edits: Vec::new(),
            chapters: None,
            tags: None,
            attachments: Vec::new(),
            chapter_language: "eng".to_string(),
        }
    }
}

impl PropEdit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse edit operations in command line order.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut edit = Self::new();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            let mut value = |option: &str| {
                args.next()
                    .map(|v| v.as_ref().to_string())
                    .ok_or_else(|| MkvError::InvalidProperty {
                        name: option.to_string(),
                        message: "missing argument".to_string(),
                    })
            };
            match arg {
                "-e" | "--edit" => {
                    let scope = value(arg)?.parse()?;
                    edit.edit(scope);
                }
                "-s" | "--set" => edit.change(ChangeKind::Set, &value(arg)?)?,
                "-a" | "--add" => edit.change(ChangeKind::Add, &value(arg)?)?,
                "-d" | "--delete" => edit.change(ChangeKind::Delete, &value(arg)?)?,
                "-c" | "--chapters" => {
                    let path = value(arg)?;
                    edit.chapters = Some(match path.as_str() {
                        "" => ChaptersAction::Delete,
                        _ => ChaptersAction::Replace(path.into()),
                    });
                }
                "--delete-chapters" => edit.chapters = Some(ChaptersAction::Delete),
                "--chapter-language" => edit.chapter_language = value(arg)?,
                "-t" | "--tags" => {
                    let spec = value(arg)?;
                    let path = spec.strip_prefix("all:").ok_or_else(|| MkvError::InvalidProperty {
                        name: arg.to_string(),
                        message: format!("'{spec}' must look like 'all:<file>'"),
                    })?;
                    edit.tags = Some(match path {
                        "" => TagsAction::Delete,
                        _ => TagsAction::ReplaceAll(path.into()),
                    });
                }
                "--delete-tags" => edit.tags = Some(TagsAction::Delete),
                "--add-attachment" => {
                    let path = value(arg)?;
                    edit.attachments.push(AttachmentAction::Add(path.into()));
                }
                "--delete-attachment" => {
                    let selector = value(arg)?;
                    edit.attachments.push(AttachmentAction::Delete(selector));
                }
                other => {
                    return Err(MkvError::InvalidProperty {
                        name: other.to_string(),
                        message: "unknown option".to_string(),
                    });
                }
            }
        }
        Ok(edit)
    }

    /// Start editing a new scope; later changes apply to it.
    pub fn edit(&mut self, scope: EditScope) -> &mut Self {
        self.edits.push(Edit {
            scope,
            changes: Vec::new(),
        });
        self
    }

    /// Add a change to the current scope (`Info` if none was selected).
    pub fn change(&mut self, kind: ChangeKind, spec: &str) -> Result<()> {
        if self.edits.is_empty() {
            self.edit(EditScope::Info);
        }
        let Some(edit) = self.edits.last_mut() else {
            return Ok(());
        };
        edit.changes.push(Change::parse(kind, edit.scope.section(), spec)?);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.edits.iter().all(|e| e.changes.is_empty())
            && self.chapters.is_none()
            && self.tags.is_none()
            && self.attachments.is_empty()
    }

    /// Apply everything to a file on disk.
    pub fn run(&self, path: &Path) -> Result<PropEditReport> {
        let mut analyzer = Analyzer::open(path)?;
        self.apply(&mut analyzer)
    }

    /// Apply everything.
    ///
    /// All elements are read, edited and validated before the file is
    /// modified; an invalid edit leaves it untouched.
    pub fn apply<F: EditTarget>(&self, analyzer: &mut Analyzer<F>) -> Result<PropEditReport> {
        if analyzer.segment().is_none() {
            analyzer.process()?;
        }
        let mut report = PropEditReport::default();
        let mut updates: Vec<Node> = Vec::new();
        let mut removals: Vec<u32> = Vec::new();

        let edits_info = self
            .edits
            .iter()
            .any(|e| e.scope == EditScope::Info && !e.changes.is_empty());
        if edits_info {
            let mut info = analyzer
                .read_all(INFO)?
                .ok_or_else(|| MkvError::InvalidState("the file has no segment info".to_string()))?;
            for edit in self.edits.iter().filter(|e| e.scope == EditScope::Info) {
                for change in &edit.changes {
                    change.apply(&mut info)?;
                    report.changes += 1;
                }
            }
            updates.push(info);
        }

        let edits_tracks = self
            .edits
            .iter()
            .any(|e| matches!(e.scope, EditScope::Track(_)) && !e.changes.is_empty());
        if edits_tracks {
            let mut tracks = analyzer
                .read_all(TRACKS)?
                .ok_or_else(|| MkvError::InvalidState("the file has no tracks".to_string()))?;
            for edit in &self.edits {
                let EditScope::Track(selector) = edit.scope else {
                    continue;
                };
                let index = selector.select(&tracks).ok_or_else(|| MkvError::InvalidProperty {
                    name: "track".to_string(),
                    message: format!("no track matches '{selector}'"),
                })?;
                let Some(entry) = tracks.children_mut().and_then(|c| c.get_mut(index)) else {
                    continue;
                };
                for change in &edit.changes {
                    change.apply(entry)?;
                    report.changes += 1;
                }
                debug!(selector = %selector, changes = edit.changes.len(), "Edited track");
            }
            updates.push(tracks);
        }

        match &self.chapters {
            Some(ChaptersAction::Replace(path)) => {
                let text = std::fs::read_to_string(path)?;
                let mut chapters = Chapters::parse_any(&text, &self.chapter_language)?;
                if chapters.is_empty() {
                    removals.push(CHAPTERS);
                } else {
                    chapters.assign_missing_uids();
                    updates.push(chapters.to_node());
                }
            }
            Some(ChaptersAction::Delete) => removals.push(CHAPTERS),
            None => {}
        }

        match &self.tags {
            Some(TagsAction::ReplaceAll(path)) => {
                let tags = Tags::from_json(&std::fs::read_to_string(path)?)?;
                if tags.is_empty() {
                    removals.push(TAGS);
                } else {
                    updates.push(tags.to_node());
                }
            }
            Some(TagsAction::Delete) => removals.push(TAGS),
            None => {}
        }

        if !self.attachments.is_empty() {
            let mut attachments = analyzer
                .read_all(ATTACHMENTS)?
                .map(|node| Attachments::from_node(&node))
                .unwrap_or_default();
            for action in &self.attachments {
                match action {
                    AttachmentAction::Add(path) => {
                        let mut file = AttachedFile::from_path(path)?;
                        let mut used: Vec<u64> = attachments.files.iter().map(|f| f.uid).collect();
                        file.uid = uid::unique_uid(&mut used);
                        attachments.files.push(file);
                    }
                    AttachmentAction::Delete(selector) => {
                        attachments
                            .remove(selector)
                            .ok_or_else(|| MkvError::InvalidProperty {
                                name: "attachment".to_string(),
                                message: format!("no attachment matches '{selector}'"),
                            })?;
                    }
                }
            }
            if attachments.is_empty() {
                removals.push(ATTACHMENTS);
            } else {
                updates.push(attachments.to_node());
            }
        }

        for node in &mut updates {
            node.fix_mandatory_elements();
            node.validate()?;
        }

        for id in removals {
            if analyzer.remove_elements(id)? > 0 {
                report.removed.push(schema::name_of(id));
            }
        }
        for node in updates {
            let name = schema::name_of(node.id);
            analyzer.update_element(node)?;
            report.updated.push(name);
        }
        info!(
            changes = report.changes,
            updated = report.updated.len(),
            removed = report.removed.len(),
            "Applied property edits"
        );
        Ok(report)
    }
}
