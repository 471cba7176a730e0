//! SeekHead: level-1 element positions.
//!
//! Positions are relative to the start of the Segment payload.

use crate::ebml;
use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::tree::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekEntry {
    pub id: u32,
    pub position: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeekHead {
    pub entries: Vec<SeekEntry>,
}

impl SeekHead {
    /// Entries with unreadable IDs are skipped.
    pub fn from_node(node: &Node) -> Self {
        let entries = node
            .children_with(SEEK)
            .filter_map(|seek| {
                let id_bytes = seek.child_binary(SEEK_ID)?;
                let (id, _) = ebml::decode_element_id(id_bytes, 0).ok()?;
                let position = seek.child_uint(SEEK_POSITION)?;
                Some(SeekEntry { id, position })
            })
            .collect();
        Self { entries }
    }

    pub fn to_node(&self) -> Node {
        let seeks = self
            .entries
            .iter()
            .map(|entry| {
                Node::master(
                    SEEK,
                    vec![
                        Node::binary(SEEK_ID, ebml::encode_element_id(entry.id)),
                        Node::uint(SEEK_POSITION, entry.position),
                    ],
                )
            })
            .collect();
        Node::master(SEEK_HEAD, seeks)
    }

    pub fn add(&mut self, id: u32, position: u64) {
        self.entries.push(SeekEntry { id, position });
    }

    /// Replace the position of the first entry for `id`, or add one.
    pub fn set(&mut self, id: u32, position: u64) {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => entry.position = position,
            None => self.add(id, position),
        }
    }

    pub fn remove(&mut self, id: u32) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before - self.entries.len()
    }

    pub fn position_of(&self, id: u32) -> Option<u64> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.position)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add `delta` to every position at or beyond `from`.
    pub fn relocate(&mut self, from: u64, delta: i64) {
        for entry in &mut self.entries {
            if entry.position >= from {
                entry.position = (entry.position as i64 + delta) as u64;
            }
        }
    }

    /// Render into exactly `available` bytes, padding with Void.
    pub fn render_in(&self, available: u64) -> Result<Vec<u8>> {
        self.to_node().render_with_padding(available).map_err(|err| match err {
            MkvError::ElementTooLarge { needed, available, .. } => MkvError::ElementTooLarge {
                id: SEEK_HEAD,
                needed,
                available,
            },
            other => other,
        })
    }
}
