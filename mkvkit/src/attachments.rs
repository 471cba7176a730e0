//! Attached files.

use crate::elements::*;
use crate::error::Result;
use crate::tree::Node;
use crate::uid;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachedFile {
    pub uid: u64,
    pub name: String,
    pub media_type: String,
    pub description: Option<String>,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl AttachedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            uid: uid::random_uid(),
            name: name.into(),
            media_type: media_type.into(),
            description: None,
            data,
        }
    }

    /// Read a file from disk, guessing its media type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, guess_media_type(path), data))
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn from_node(node: &Node) -> Self {
        Self {
            uid: node.child_uint(FILE_UID).unwrap_or(0),
            name: node.child_str(FILE_NAME).unwrap_or_default().to_string(),
            media_type: node.child_str(FILE_MEDIA_TYPE).unwrap_or_default().to_string(),
            description: node.child_str(FILE_DESCRIPTION).map(str::to_string),
            data: node.child_binary(FILE_DATA).map(<[u8]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn to_node(&self) -> Node {
        let mut node = Node::new_master(ATTACHED_FILE);
        if let Some(description) = &self.description {
            node.push(Node::text(FILE_DESCRIPTION, description.as_str()));
        }
        node.push(Node::text(FILE_NAME, self.name.as_str()));
        node.push(Node::text(FILE_MEDIA_TYPE, self.media_type.as_str()));
        node.push(Node::binary(FILE_DATA, self.data.clone()));
        node.push(Node::uint(FILE_UID, self.uid));
        node
    }
}

/// Media type for a file name, `application/octet-stream` when unknown.
pub fn guess_media_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" | "nfo" => "text/plain",
        "xml" => "application/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attachments {
    pub files: Vec<AttachedFile>,
}

impl Attachments {
    pub fn from_node(node: &Node) -> Self {
        Self {
            files: node.children_with(ATTACHED_FILE).map(AttachedFile::from_node).collect(),
        }
    }

    pub fn to_node(&self) -> Node {
        Node::master(ATTACHMENTS, self.files.iter().map(AttachedFile::to_node).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Look up by 1-based position.
    pub fn by_index(&self, index: usize) -> Option<&AttachedFile> {
        index.checked_sub(1).and_then(|i| self.files.get(i))
    }

    pub fn by_uid(&self, uid: u64) -> Option<&AttachedFile> {
        self.files.iter().find(|f| f.uid == uid)
    }

    /// Remove by 1-based position, `=UID` or name; returns the removed file.
    pub fn remove(&mut self, selector: &str) -> Option<AttachedFile> {
        let position = if let Some(uid) = selector.strip_prefix('=') {
            let uid: u64 = uid.parse().ok()?;
            self.files.iter().position(|f| f.uid == uid)
        } else if let Ok(index) = selector.parse::<usize>() {
            index.checked_sub(1).filter(|&i| i < self.files.len())
        } else {
            self.files.iter().position(|f| f.name == selector)
        }?;
        Some(self.files.remove(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_node_roundtrip() {
        let mut file = AttachedFile::new("cover.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]);
        file.description = Some("Cover".to_string());
        let attachments = Attachments { files: vec![file] };
        let node = attachments.to_node();
        assert!(node.validate().is_ok());
        assert_eq!(Attachments::from_node(&node), attachments);
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Font.TTF");
        std::fs::File::create(&path).unwrap().write_all(b"font").unwrap();

        let file = AttachedFile::from_path(&path).unwrap();
        assert_eq!(file.name, "Font.TTF");
        assert_eq!(file.media_type, "font/ttf");
        assert_eq!(file.size(), 4);
        assert_ne!(file.uid, 0);
    }

    #[test]
    fn test_remove() {
        let mut attachments = Attachments {
            files: vec![
                AttachedFile::new("a.txt", "text/plain", vec![]),
                AttachedFile::new("b.txt", "text/plain", vec![]),
                AttachedFile::new("c.txt", "text/plain", vec![]),
            ],
        };
        let uid = attachments.files[2].uid;
        assert_eq!(attachments.remove(&format!("={uid}")).unwrap().name, "c.txt");
        assert_eq!(attachments.remove("1").unwrap().name, "a.txt");
        assert_eq!(attachments.remove("b.txt").unwrap().name, "b.txt");
        assert!(attachments.remove("1").is_none());
        assert_eq!(guess_media_type(Path::new("x.bin")), "application/octet-stream");
    }
}
