//! Editing level-1 elements of existing files.
//!
//! The [`Analyzer`] lists the Segment's children by ID and byte range
//! without touching Cluster payloads, and rewrites individual elements:
//!
//! - If the new rendering fits into the old element plus any Void elements
//!   directly behind it, it is written in place and padded with a Void.
//! - Otherwise everything behind it is shifted. SeekHead and Cue positions
//!   are recomputed and re-rendered until the layout no longer changes, and
//!   the Segment size is patched.
//!
//! Every edit is validated and fully laid out before the first byte is
//! written.

use crate::cues::Cues;
use crate::diagnostics::Diagnostics;
use crate::ebml;
use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::scan::{self, Level1Element, SegmentLocation};
use crate::schema;
use crate::seekhead::SeekHead;
use crate::tree::{self, Node};

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info};

/// Upper bound on relayout passes before giving up.
const MAX_LAYOUT_PASSES: usize = 16;

/// Storage that can be edited in place.
pub trait EditTarget: Read + Write + Seek {
    /// Truncate or extend to exactly `len` bytes.
    fn set_len(&mut self, len: u64) -> Result<()>;
}

impl EditTarget for File {
    fn set_len(&mut self, len: u64) -> Result<()> {
        File::set_len(self, len)?;
        Ok(())
    }
}

impl EditTarget for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> Result<()> {
        self.get_mut().resize(len as usize, 0);
        Ok(())
    }
}

/// What a byte range turns into.
#[derive(Debug)]
enum Content {
    /// Unchanged bytes.
    Copy,
    Element(Node),
    Void,
    SeekHead { head: SeekHead, primary: bool },
    Cues(Cues),
}

#[derive(Debug)]
struct Piece {
    start: u64,
    end: u64,
    content: Content,
}

impl Piece {
    fn new(start: u64, end: u64, content: Content) -> Self {
        Self { start, end, content }
    }

    fn reserved(&self) -> u64 {
        self.end - self.start
    }
}

/// The file behind the Segment header as a sequence of pieces.
struct Plan {
    pieces: Vec<Piece>,
    /// Element whose SeekHead entry must point at the edited piece.
    edited_id: Option<u32>,
}

impl Plan {
    fn new(mut special: Vec<Piece>, from: u64, to: u64, edited_id: Option<u32>) -> Self {
        special.sort_by_key(|p| p.start);
        let mut pieces = Vec::with_capacity(special.len() * 2 + 1);
        let mut cursor = from;
        for piece in special {
            if piece.start > cursor {
                pieces.push(Piece::new(cursor, piece.start, Content::Copy));
            }
            cursor = cursor.max(piece.end);
            pieces.push(piece);
        }
        if to > cursor {
            pieces.push(Piece::new(cursor, to, Content::Copy));
        }
        Self { pieces, edited_id }
    }

    fn edited_index(&self) -> Option<usize> {
        self.pieces
            .iter()
            .position(|p| matches!(p.content, Content::Element(_)))
    }
}

/// Result of laying out a plan.
struct Layout {
    starts: Vec<u64>,
    rendered: Vec<Option<Vec<u8>>>,
    old_end: u64,
    new_end: u64,
}

impl Layout {
    /// New absolute offset of a byte that was at `pos`.
    fn map(&self, pieces: &[Piece], pos: u64) -> u64 {
        let index = pieces.partition_point(|p| p.end <= pos);
        match pieces.get(index) {
            Some(piece) if piece.start <= pos => match piece.content {
                Content::Copy => self.starts[index] + (pos - piece.start),
                _ => self.starts[index],
            },
            _ => (pos as i64 + self.new_end as i64 - self.old_end as i64) as u64,
        }
    }

    fn is_unchanged(&self, pieces: &[Piece]) -> bool {
        self.new_end == self.old_end && pieces.iter().zip(&self.starts).all(|(p, s)| p.start == *s)
    }
}

/// Level-1 editor for one file.
pub struct Analyzer<F> {
    file: F,
    segment: Option<SegmentLocation>,
    elements: Vec<Level1Element>,
    file_len: u64,
    diagnostics: Diagnostics,
}

impl Analyzer<File> {
    /// Open a file for reading and writing.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::options().read(true).write(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<F: EditTarget> Analyzer<F> {
    pub fn new(file: F) -> Self {
        Self {
            file,
            segment: None,
            elements: Vec::new(),
            file_len: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Locate the Segment and list its level-1 elements.
    pub fn process(&mut self) -> Result<&[Level1Element]> {
        self.file_len = scan::stream_len(&mut self.file)?;
        let segment = scan::locate_segment(&mut self.file)?;
        self.elements = scan::scan_level1(&mut self.file, &segment, &mut self.diagnostics)?;
        debug!(
            elements = self.elements.len(),
            data_start = segment.data_start,
            "Analyzed file"
        );
        self.segment = Some(segment);
        Ok(&self.elements)
    }

    pub fn elements(&self) -> &[Level1Element] {
        &self.elements
    }

    pub fn segment(&self) -> Option<&SegmentLocation> {
        self.segment.as_ref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn into_inner(self) -> F {
        self.file
    }

    fn located(&self) -> Result<&SegmentLocation> {
        self.segment
            .as_ref()
            .ok_or_else(|| MkvError::InvalidState("the file has not been analyzed".to_string()))
    }

    /// Indices of all level-1 elements with `id`.
    pub fn find(&self, id: u32) -> impl Iterator<Item = usize> + '_ {
        self.elements
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.id == id)
            .map(|(index, _)| index)
    }

    pub fn read_element(&mut self, index: usize) -> Result<Node> {
        let element = *self
            .elements
            .get(index)
            .ok_or_else(|| MkvError::InvalidState(format!("no level-1 element #{index}")))?;
        element.read_node(&mut self.file)
    }

    /// All instances of a level-1 master merged into one.
    pub fn read_all(&mut self, id: u32) -> Result<Option<Node>> {
        let instances: Vec<Level1Element> = self.elements.iter().filter(|e| e.id == id).copied().collect();
        let mut merged: Option<Node> = None;
        for element in instances {
            let mut node = element.read_node(&mut self.file)?;
            match merged.as_mut() {
                None => merged = Some(node),
                Some(target) => {
                    if let (Some(into), Some(from)) = (target.children_mut(), node.children_mut()) {
                        into.append(from);
                    }
                }
            }
        }
        Ok(merged)
    }

    /// Replace every instance of `node.id` by `node`.
    ///
    /// Missing mandatory children with defaults are added first; if others
    /// are still missing the file is left untouched.
    pub fn update_element(&mut self, mut node: Node) -> Result<()> {
        let id = node.id;
        if !is_level1(id) || matches!(id, CLUSTER | SEEK_HEAD | CUES) {
            return Err(MkvError::InvalidState(format!(
                "{} cannot be replaced",
                schema::name_of(id)
            )));
        }
        node.fix_mandatory_elements();
        node.validate()?;

        let segment = self.located()?.clone();
        let mut special = Vec::new();
        let instances: Vec<usize> = self.find(id).collect();
        match instances.split_first() {
            Some((&first, rest)) => {
                let start = self.elements[first].position;
                let end = self.end_with_voids(first);
                special.push(Piece::new(start, end, Content::Element(node)));
                for &index in rest {
                    let element = &self.elements[index];
                    special.push(Piece::new(element.position, element.end(), Content::Void));
                }
            }
            None => {
                let void = self
                    .elements
                    .iter()
                    .filter(|e| e.id == VOID && node.render_with_padding(e.total_size()).is_ok())
                    .max_by_key(|e| e.size)
                    .copied();
                let (start, end) = match void {
                    Some(void) => (void.position, void.end()),
                    None => (segment.end, segment.end),
                };
                special.push(Piece::new(start, end, Content::Element(node)));
            }
        }
        let taken: Vec<u64> = special.iter().map(|p| p.start).collect();
        special.extend(self.index_pieces(Some(id), &taken)?);

        let plan = Plan::new(special, segment.data_start, self.file_len, Some(id));
        info!(element = schema::name_of(id), "Updating element");
        self.apply(plan, &segment)
    }

    /// Overwrite every instance of `id` with Void and drop its SeekHead
    /// entries. Returns the number of removed elements.
    pub fn remove_elements(&mut self, id: u32) -> Result<usize> {
        if matches!(id, CLUSTER | SEEK_HEAD | SEGMENT) {
            return Err(MkvError::InvalidState(format!(
                "{} cannot be removed",
                schema::name_of(id)
            )));
        }
        let segment = self.located()?.clone();
        let instances: Vec<Level1Element> = self.elements.iter().filter(|e| e.id == id).copied().collect();
        if instances.is_empty() {
            return Ok(0);
        }

        let taken: Vec<u64> = instances.iter().map(|e| e.position).collect();
        let mut special = self.index_pieces(Some(id), &taken)?;
        special.retain(|p| !taken.contains(&p.start));
        special.extend(
            instances
                .iter()
                .map(|e| Piece::new(e.position, e.end(), Content::Void)),
        );

        let plan = Plan::new(special, segment.data_start, self.file_len, None);
        info!(element = schema::name_of(id), count = instances.len(), "Removing elements");
        self.apply(plan, &segment)?;
        Ok(instances.len())
    }

    /// End of element `index` including the Void elements directly behind
    /// it, skipping those starting at a position in `taken`.
    fn end_with_voids_except(&self, index: usize, taken: &[u64]) -> u64 {
        let mut end = self.elements[index].end();
        for next in &self.elements[index + 1..] {
            if next.id != VOID || next.position != end || taken.contains(&next.position) {
                break;
            }
            end = next.end();
        }
        end
    }

    fn end_with_voids(&self, index: usize) -> u64 {
        self.end_with_voids_except(index, &[])
    }

    /// SeekHead and Cues pieces. SeekHeads take the Voids behind them along
    /// unless those are in `taken`; their entries for `drop_id` are removed.
    fn index_pieces(&mut self, drop_id: Option<u32>, taken: &[u64]) -> Result<Vec<Piece>> {
        let index: Vec<(Level1Element, u64)> = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e.id, SEEK_HEAD | CUES))
            .map(|(i, e)| {
                let end = match e.id {
                    SEEK_HEAD => self.end_with_voids_except(i, taken),
                    _ => e.end(),
                };
                (*e, end)
            })
            .collect();
        let mut pieces = Vec::with_capacity(index.len());
        let mut primary = true;
        for (element, end) in index {
            let node = element.read_node(&mut self.file)?;
            let content = if element.id == SEEK_HEAD {
                let mut head = SeekHead::from_node(&node);
                if let Some(id) = drop_id {
                    head.remove(id);
                }
                let content = Content::SeekHead { head, primary };
                primary = false;
                content
            } else {
                Content::Cues(Cues::from_node(&node))
            };
            pieces.push(Piece::new(element.position, end, content));
        }
        Ok(pieces)
    }

    /// Render every piece until sizes stop changing.
    fn settle(&self, plan: &Plan, data_start: u64) -> Result<Layout> {
        let edited = plan.edited_index();
        let old_end = plan.pieces.last().map_or(data_start, |p| p.end);
        let mut sizes: Vec<u64> = plan.pieces.iter().map(Piece::reserved).collect();

        for pass in 0..MAX_LAYOUT_PASSES {
            let mut starts = Vec::with_capacity(sizes.len());
            let mut cursor = plan.pieces.first().map_or(data_start, |p| p.start);
            for size in &sizes {
                starts.push(cursor);
                cursor += size;
            }
            let mut layout = Layout {
                starts,
                rendered: Vec::new(),
                old_end,
                new_end: cursor,
            };

            let mut rendered = Vec::with_capacity(plan.pieces.len());
            for piece in &plan.pieces {
                let bytes = match &piece.content {
                    Content::Copy => None,
                    Content::Void => Some(tree::void_bytes(piece.reserved())?),
                    Content::Element(node) => Some(fit(node, piece.reserved())?),
                    Content::SeekHead { head, primary } => {
                        let mut head = head.clone();
                        for entry in &mut head.entries {
                            entry.position = layout.map(&plan.pieces, data_start + entry.position) - data_start;
                        }
                        if let (true, Some(id), Some(index)) = (*primary, plan.edited_id, edited) {
                            head.set(id, layout.starts[index] - data_start);
                        }
                        Some(fit(&head.to_node(), piece.reserved())?)
                    }
                    Content::Cues(cues) => {
                        let mut cues = cues.clone();
                        for position in cues.points.iter_mut().flat_map(|p| &mut p.positions) {
                            position.cluster_position =
                                layout.map(&plan.pieces, data_start + position.cluster_position) - data_start;
                        }
                        Some(fit(&cues.to_node(), piece.reserved())?)
                    }
                };
                rendered.push(bytes);
            }

            let new_sizes: Vec<u64> = plan
                .pieces
                .iter()
                .zip(&rendered)
                .map(|(piece, bytes)| bytes.as_ref().map_or(piece.reserved(), |b| b.len() as u64))
                .collect();
            if new_sizes == sizes {
                debug!(passes = pass + 1, new_end = layout.new_end, "Layout settled");
                layout.rendered = rendered;
                return Ok(layout);
            }
            sizes = new_sizes;
        }
        Err(MkvError::Other(format!(
            "layout did not settle after {MAX_LAYOUT_PASSES} passes"
        )))
    }

    fn apply(&mut self, plan: Plan, segment: &SegmentLocation) -> Result<()> {
        let layout = self.settle(&plan, segment.data_start)?;

        if layout.is_unchanged(&plan.pieces) {
            for (piece, bytes) in plan.pieces.iter().zip(&layout.rendered) {
                // Cue positions are unchanged when nothing moves.
                if matches!(piece.content, Content::Cues(_)) {
                    continue;
                }
                if let Some(bytes) = bytes {
                    self.file.seek(SeekFrom::Start(piece.start))?;
                    self.file.write_all(bytes)?;
                }
            }
            self.file.flush()?;
            debug!("Edited in place");
            self.process()?;
            return Ok(());
        }

        let segment_size = match segment.size {
            Some(size) => {
                let delta = layout.map(&plan.pieces, segment.end) as i64 - segment.end as i64;
                let new_size = (size as i64 + delta) as u64;
                Some(ebml::encode_vint(new_size, segment.size_length)?)
            }
            None => None,
        };

        let first = plan
            .pieces
            .iter()
            .position(|p| !matches!(p.content, Content::Copy))
            .unwrap_or(0);
        let mut spool = tempfile::tempfile()?;
        for (piece, bytes) in plan.pieces[first..].iter().zip(&layout.rendered[first..]) {
            match bytes {
                Some(bytes) => spool.write_all(bytes)?,
                None => {
                    self.file.seek(SeekFrom::Start(piece.start))?;
                    let copied = io::copy(&mut (&mut self.file).take(piece.reserved()), &mut spool)?;
                    if copied != piece.reserved() {
                        return Err(MkvError::corruption(piece.start, "file shrank while being edited"));
                    }
                }
            }
        }

        spool.seek(SeekFrom::Start(0))?;
        self.file.seek(SeekFrom::Start(layout.starts[first]))?;
        io::copy(&mut spool, &mut self.file)?;
        self.file.set_len(layout.new_end)?;
        if let Some(size) = segment_size {
            self.file.seek(SeekFrom::Start(segment.size_pos))?;
            self.file.write_all(&size)?;
        }
        self.file.flush()?;
        info!(
            old_len = layout.old_end,
            new_len = layout.new_end,
            "Rewrote file"
        );
        self.process()?;
        Ok(())
    }
}

/// Render `node` padded to `reserved` bytes when possible.
fn fit(node: &Node, reserved: u64) -> Result<Vec<u8>> {
    let bytes = node.render()?;
    if (bytes.len() as u64) < reserved {
        if let Ok(padded) = node.render_with_padding(reserved) {
            return Ok(padded);
        }
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::{ChapterAtom, Chapters, EditionEntry};
    use crate::demuxer::MkvDemuxer;
    use crate::elements::codec_ids;
    use crate::muxer::{MkvMuxer, MuxerConfig};
    use crate::track::{AudioSettings, TrackEntry, VideoSettings};
    use mkvkit_core::Packet;

    const MS: i64 = 1_000_000;

    fn sample_file() -> Vec<u8> {
        let config = MuxerConfig {
            segment_uid: Some(vec![3; 16]),
            write_date: false,
            ..Default::default()
        };
        let mut muxer = MkvMuxer::new(Cursor::new(Vec::new()), config);
        let mut audio = TrackEntry::new(1, TrackType::Audio, codec_ids::A_PCM_INT_LIT);
        audio.audio = Some(AudioSettings::new(48000.0, 2));
        let mut video = TrackEntry::new(2, TrackType::Video, codec_ids::V_VP9);
        video.video = Some(VideoSettings::new(320, 240));
        muxer.add_track(audio, None).unwrap();
        muxer.add_track(video, None).unwrap();
        for i in 0..150 {
            muxer
                .write_packet(Packet::new(1, i * 20 * MS, vec![1; 64]).with_duration(20 * MS))
                .unwrap();
            if i % 2 == 0 {
                muxer.write_packet(Packet::new(2, i * 20 * MS, vec![2; 256])).unwrap();
            }
        }
        muxer.finalize().unwrap();
        muxer.into_inner().into_inner()
    }

    fn analyzer(bytes: Vec<u8>) -> Analyzer<Cursor<Vec<u8>>> {
        let mut analyzer = Analyzer::new(Cursor::new(bytes));
        analyzer.process().unwrap();
        analyzer
    }

    fn packet_count(bytes: Vec<u8>) -> usize {
        let mut demuxer = MkvDemuxer::open(Cursor::new(bytes)).unwrap();
        let mut count = 0;
        while demuxer.read_packet().unwrap().is_some() {
            count += 1;
        }
        assert!(demuxer.diagnostics().is_empty());
        count
    }

    /// Every SeekHead and Cue position points at an element of the right kind.
    fn assert_index_consistent(analyzer: &mut Analyzer<Cursor<Vec<u8>>>) {
        let data_start = analyzer.segment().unwrap().data_start;
        let head = SeekHead::from_node(&analyzer.read_all(SEEK_HEAD).unwrap().unwrap());
        for entry in &head.entries {
            let found = analyzer
                .elements()
                .iter()
                .find(|e| e.position == data_start + entry.position)
                .unwrap();
            assert_eq!(found.id, entry.id);
        }
        let cues = Cues::from_node(&analyzer.read_all(CUES).unwrap().unwrap());
        assert!(!cues.is_empty());
        for position in cues.points.iter().flat_map(|p| &p.positions) {
            let found = analyzer
                .elements()
                .iter()
                .find(|e| e.position == data_start + position.cluster_position)
                .unwrap();
            assert_eq!(found.id, CLUSTER);
        }
    }

    #[test]
    fn test_process_lists_elements() {
        let mut analyzer = analyzer(sample_file());
        let ids: Vec<u32> = analyzer
            .elements()
            .iter()
            .map(|e| e.id)
            .filter(|id| !matches!(*id, VOID | CLUSTER))
            .collect();
        assert_eq!(ids, vec![SEEK_HEAD, INFO, TRACKS, CUES, TAGS]);
        assert!(analyzer.find(CLUSTER).count() >= 1);

        let index = analyzer.find(INFO).next().unwrap();
        let info = analyzer.read_element(index).unwrap();
        assert_eq!(info.child_uint(TIMESTAMP_SCALE), Some(1_000_000));
        assert!(analyzer.read_all(CHAPTERS).unwrap().is_none());
        assert_index_consistent(&mut analyzer);
    }

    #[test]
    fn test_requires_process() {
        let mut analyzer = Analyzer::new(Cursor::new(sample_file()));
        assert!(analyzer.remove_elements(TAGS).is_err());
    }

    #[test]
    fn test_update_in_place() {
        let original = sample_file();
        let len = original.len();
        let mut analyzer = analyzer(original);

        let mut tracks = analyzer.read_all(TRACKS).unwrap().unwrap();
        let entry = tracks.child_mut(TRACK_ENTRY).unwrap();
        entry.set_text(LANGUAGE, "ger");
        entry.set_text(NAME, "Deutsch");
        analyzer.update_element(tracks).unwrap();

        let bytes = analyzer.into_inner().into_inner();
        assert_eq!(bytes.len(), len);
        let demuxer = MkvDemuxer::open(Cursor::new(bytes.clone())).unwrap();
        assert_eq!(demuxer.track(1).unwrap().language, "ger");
        assert_eq!(demuxer.track(1).unwrap().name.as_deref(), Some("Deutsch"));
        assert_eq!(packet_count(bytes), 225);
    }

    #[test]
    fn test_update_shifts_tail() {
        let original = sample_file();
        let len = original.len();
        let mut analyzer = analyzer(original);

        let mut info = analyzer.read_all(INFO).unwrap().unwrap();
        let title = "A rather long title ".repeat(40);
        info.set_text(TITLE, title.clone());
        analyzer.update_element(info).unwrap();

        assert_index_consistent(&mut analyzer);
        let segment = analyzer.segment().unwrap().clone();
        let bytes = analyzer.into_inner().into_inner();
        assert!(bytes.len() > len + 700);
        assert_eq!(segment.size, Some(bytes.len() as u64 - segment.data_start));

        let demuxer = MkvDemuxer::open(Cursor::new(bytes.clone())).unwrap();
        assert_eq!(demuxer.segment_info.title.as_deref(), Some(title.as_str()));
        assert_eq!(packet_count(bytes), 225);
    }

    #[test]
    fn test_add_element_into_void() {
        let original = sample_file();
        let len = original.len();
        let mut analyzer = analyzer(original);

        let chapters = Chapters {
            editions: vec![EditionEntry {
                uid: Some(1),
                atoms: vec![ChapterAtom::new(0, "Start", "eng")],
                ..Default::default()
            }],
        };
        analyzer.update_element(chapters.to_node()).unwrap();
        assert_eq!(analyzer.find(CHAPTERS).count(), 1);
        assert_index_consistent(&mut analyzer);

        let bytes = analyzer.into_inner().into_inner();
        assert_eq!(bytes.len(), len);
        let demuxer = MkvDemuxer::open(Cursor::new(bytes)).unwrap();
        assert_eq!(demuxer.chapters.atoms()[0].name(), Some("Start"));
    }

    #[test]
    fn test_remove_elements() {
        let mut analyzer = analyzer(sample_file());
        assert_eq!(analyzer.remove_elements(TAGS).unwrap(), 1);
        assert_eq!(analyzer.find(TAGS).count(), 0);
        assert_eq!(analyzer.remove_elements(TAGS).unwrap(), 0);

        let head = SeekHead::from_node(&analyzer.read_all(SEEK_HEAD).unwrap().unwrap());
        assert!(head.position_of(TAGS).is_none());
        assert!(head.position_of(INFO).is_some());
        assert!(analyzer.remove_elements(CLUSTER).is_err());
    }

    #[test]
    fn test_invalid_edit_leaves_file_untouched() {
        let original = sample_file();
        let mut analyzer = analyzer(original.clone());

        let mut info = analyzer.read_all(INFO).unwrap().unwrap();
        info.remove_children(WRITING_APP);
        assert!(matches!(
            analyzer.update_element(info),
            Err(MkvError::MissingMandatoryElement { name: "WritingApp", .. })
        ));
        assert!(analyzer.update_element(Node::new_master(CLUSTER)).is_err());
        assert_eq!(analyzer.into_inner().into_inner(), original);
    }

    #[test]
    fn test_edit_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edit.mkv");
        std::fs::write(&path, sample_file()).unwrap();

        let mut analyzer = Analyzer::open(&path).unwrap();
        analyzer.process().unwrap();
        let mut info = analyzer.read_all(INFO).unwrap().unwrap();
        info.set_text(TITLE, "x".repeat(2000));
        analyzer.update_element(info).unwrap();
        drop(analyzer);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(packet_count(bytes), 225);
    }
}
