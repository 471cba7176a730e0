//! Tags: typed model and JSON.

use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::tree::Node;
use serde::{Deserialize, Serialize};

/// Target type value of a whole movie/album.
pub const TARGET_ALBUM: u64 = 50;
/// Target type value of a track/song/chapter.
pub const TARGET_TRACK: u64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tags {
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub targets: Targets,
    pub simple_tags: Vec<SimpleTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    #[serde(default = "default_target_type_value")]
    pub target_type_value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub track_uids: Vec<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edition_uids: Vec<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chapter_uids: Vec<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachment_uids: Vec<u64>,
}

fn default_target_type_value() -> u64 {
    TARGET_ALBUM
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            target_type_value: TARGET_ALBUM,
            target_type: None,
            track_uids: Vec::new(),
            edition_uids: Vec::new(),
            chapter_uids: Vec::new(),
            attachment_uids: Vec::new(),
        }
    }
}

impl Targets {
    /// Targets of a single track.
    pub fn track(uid: u64) -> Self {
        Self {
            track_uids: vec![uid],
            ..Default::default()
        }
    }

    /// No explicit target: the tag applies to the whole segment.
    pub fn is_global(&self) -> bool {
        self.track_uids.is_empty()
            && self.edition_uids.is_empty()
            && self.chapter_uids.is_empty()
            && self.attachment_uids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleTag {
    pub name: String,
    #[serde(default = "default_tag_language")]
    pub language: String,
    #[serde(default = "default_true")]
    pub default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SimpleTag>,
}

fn default_tag_language() -> String {
    "und".to_string()
}

fn default_true() -> bool {
    true
}

impl SimpleTag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: default_tag_language(),
            default: true,
            string: Some(value.into()),
            binary: None,
            children: Vec::new(),
        }
    }

    fn from_node(node: &Node) -> Self {
        Self {
            name: node.child_str(TAG_NAME).unwrap_or_default().to_string(),
            language: node.child_str_or_default(TAG_LANGUAGE).unwrap_or("und").to_string(),
            default: node.child_uint_or_default(TAG_DEFAULT).unwrap_or(1) != 0,
            string: node.child_str(TAG_STRING).map(str::to_string),
            binary: node.child_binary(TAG_BINARY).map(<[u8]>::to_vec),
            children: node.children_with(SIMPLE_TAG).map(Self::from_node).collect(),
        }
    }

    fn to_node(&self) -> Node {
        let mut node = Node::new_master(SIMPLE_TAG);
        node.push(Node::text(TAG_NAME, self.name.as_str()));
        node.push(Node::text(TAG_LANGUAGE, self.language.as_str()));
        node.push(Node::uint(TAG_DEFAULT, self.default as u64));
        if let Some(string) = &self.string {
            node.push(Node::text(TAG_STRING, string.as_str()));
        }
        if let Some(binary) = &self.binary {
            node.push(Node::binary(TAG_BINARY, binary.clone()));
        }
        for child in &self.children {
            node.push(child.to_node());
        }
        node
    }
}

impl Tag {
    pub fn new(targets: Targets, simple_tags: Vec<SimpleTag>) -> Self {
        Self { targets, simple_tags }
    }

    /// String value of the first top-level simple tag called `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.simple_tags
            .iter()
            .find(|t| t.name == name)
            .and_then(|t| t.string.as_deref())
    }

    /// Set (or add) a top-level string simple tag.
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) {
        match self.simple_tags.iter_mut().find(|t| t.name == name) {
            Some(tag) => tag.string = Some(value.into()),
            None => self.simple_tags.push(SimpleTag::new(name, value)),
        }
    }

    fn from_node(node: &Node) -> Self {
        let targets = node
            .child(TARGETS)
            .map(|t| {
                let uids = |id| t.children_with(id).filter_map(Node::as_uint).collect();
                Targets {
                    target_type_value: t.child_uint_or_default(TARGET_TYPE_VALUE).unwrap_or(TARGET_ALBUM),
                    target_type: t.child_str(TARGET_TYPE).map(str::to_string),
                    track_uids: uids(TAG_TRACK_UID),
                    edition_uids: uids(TAG_EDITION_UID),
                    chapter_uids: uids(TAG_CHAPTER_UID),
                    attachment_uids: uids(TAG_ATTACHMENT_UID),
                }
            })
            .unwrap_or_default();
        Self {
            targets,
            simple_tags: node.children_with(SIMPLE_TAG).map(SimpleTag::from_node).collect(),
        }
    }

    fn to_node(&self) -> Node {
        let t = &self.targets;
        let mut targets = Node::new_master(TARGETS);
        if t.target_type_value != TARGET_ALBUM {
            targets.push(Node::uint(TARGET_TYPE_VALUE, t.target_type_value));
        }
        if let Some(kind) = &t.target_type {
            targets.push(Node::text(TARGET_TYPE, kind.as_str()));
        }
        for (id, uids) in [
            (TAG_TRACK_UID, &t.track_uids),
            (TAG_EDITION_UID, &t.edition_uids),
            (TAG_CHAPTER_UID, &t.chapter_uids),
            (TAG_ATTACHMENT_UID, &t.attachment_uids),
        ] {
            for &uid in uids {
                targets.push(Node::uint(id, uid));
            }
        }

        let mut node = Node::new_master(TAG);
        node.push(targets);
        for simple in &self.simple_tags {
            node.push(simple.to_node());
        }
        node
    }
}

impl Tags {
    pub fn from_node(node: &Node) -> Self {
        Self {
            tags: node.children_with(TAG).map(Tag::from_node).collect(),
        }
    }

    pub fn to_node(&self) -> Node {
        Node::master(TAGS, self.tags.iter().map(Tag::to_node).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags without explicit targets.
    pub fn global(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|t| t.targets.is_global())
    }

    /// Tags targeting the given track UID.
    pub fn for_track(&self, uid: u64) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(move |t| t.targets.track_uids.contains(&uid))
    }

    /// Tags targeting the given chapter UID.
    pub fn for_chapter(&self, uid: u64) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(move |t| t.targets.chapter_uids.contains(&uid))
    }

    /// Remove every tag targeting exactly this one track.
    pub fn remove_track_tags(&mut self, uid: u64) {
        self.tags.retain(|t| t.targets.track_uids != [uid]);
    }

    pub fn merge(&mut self, other: Tags) {
        self.tags.extend(other.tags);
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| MkvError::Other(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text.trim_start_matches('\u{feff}'))
            .map_err(|e| MkvError::Other(format!("invalid tags JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tags {
        let mut title = SimpleTag::new("TITLE", "Album");
        title.children.push(SimpleTag::new("SORT_WITH", "Album, The"));
        Tags {
            tags: vec![
                Tag::new(Targets::default(), vec![title, SimpleTag::new("ARTIST", "Someone")]),
                Tag::new(
                    Targets {
                        target_type_value: TARGET_TRACK,
                        ..Targets::track(1234)
                    },
                    vec![SimpleTag::new("BPS", "128000")],
                ),
            ],
        }
    }

    #[test]
    fn test_node_roundtrip() {
        let tags = sample();
        let node = tags.to_node();
        assert!(node.validate().is_ok());
        assert_eq!(Tags::from_node(&node), tags);
    }

    #[test]
    fn test_json_roundtrip() {
        let tags = sample();
        let json = tags.to_json().unwrap();
        assert_eq!(Tags::from_json(&json).unwrap(), tags);
        assert!(Tags::from_json("{").is_err());
    }

    #[test]
    fn test_lookups() {
        let mut tags = sample();
        assert_eq!(tags.global().count(), 1);
        assert_eq!(tags.global().next().unwrap().value("ARTIST"), Some("Someone"));
        assert_eq!(tags.for_track(1234).count(), 1);
        tags.remove_track_tags(1234);
        assert_eq!(tags.tags.len(), 1);
    }

    #[test]
    fn test_set_value() {
        let mut tag = Tag::default();
        tag.set_value("TITLE", "a");
        tag.set_value("TITLE", "b");
        assert_eq!(tag.simple_tags.len(), 1);
        assert_eq!(tag.value("TITLE"), Some("b"));
    }
}
