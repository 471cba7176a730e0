//! Level-1 layout scanning.
//!
//! Used by both the demuxer and the analyzer: locate the Segment behind the
//! EBML header, then list its children in file order by ID and byte range
//! without decoding Clusters.

use crate::diagnostics::Diagnostics;
use crate::ebml::{EbmlHeader, ElementHeader};
use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::schema;
use crate::tree::{self, Node};

use serde::Serialize;
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

/// Bytes read per step while searching for a resync point.
const RESYNC_CHUNK: usize = 64 * 1024;

/// Position of the Segment in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLocation {
    pub ebml_header: EbmlHeader,
    /// Offset of the Segment ID.
    pub header_pos: u64,
    /// Offset of the size field.
    pub size_pos: u64,
    pub size_length: usize,
    /// First byte of the Segment payload; all SeekHead and Cue positions
    /// are relative to it.
    pub data_start: u64,
    /// Declared payload size, `None` for unknown size.
    pub size: Option<u64>,
    /// End of the usable payload (clamped to the end of the file).
    pub end: u64,
}

/// One level-1 element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Level1Element {
    pub id: u32,
    /// Absolute offset of the element ID.
    pub position: u64,
    pub header_size: usize,
    /// Payload size; measured for unknown-size Clusters.
    pub size: u64,
    pub unknown_size: bool,
}

impl Level1Element {
    pub fn payload_start(&self) -> u64 {
        self.position + self.header_size as u64
    }

    pub fn end(&self) -> u64 {
        self.payload_start() + self.size
    }

    pub fn total_size(&self) -> u64 {
        self.header_size as u64 + self.size
    }

    pub fn name(&self) -> &'static str {
        schema::name_of(self.id)
    }

    /// Load the whole element as a tree.
    pub fn read_node<R: Read + Seek>(&self, reader: &mut R) -> Result<Node> {
        reader.seek(SeekFrom::Start(self.position))?;
        Node::read(reader, SEGMENT)
    }
}

/// Length of a stream in bytes.
pub fn stream_len<R: Seek>(reader: &mut R) -> Result<u64> {
    let current = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(current))?;
    Ok(len)
}

/// Check the EBML header and find the first Segment.
///
/// A missing or unsupported header is fatal, as is anything but filler
/// between the header and the Segment.
pub fn locate_segment<R: Read + Seek>(reader: &mut R) -> Result<SegmentLocation> {
    let file_len = stream_len(reader)?;
    reader.seek(SeekFrom::Start(0))?;

    match ElementHeader::read(reader) {
        Ok(header) if header.id == EBML => {}
        Ok(header) => {
            return Err(MkvError::InvalidEbmlHeader(format!(
                "file starts with element 0x{:X} instead of the EBML header",
                header.id
            )));
        }
        Err(err) => {
            return Err(MkvError::InvalidEbmlHeader(format!("unreadable EBML header: {err}")));
        }
    }
    reader.seek(SeekFrom::Start(0))?;
    let ebml_header = EbmlHeader::from_node(&Node::read(reader, schema::ROOT)?);
    ebml_header.check_supported()?;

    loop {
        let header_pos = reader.stream_position()?;
        let header = match ElementHeader::read(reader) {
            Ok(header) => header,
            Err(err) if err.is_eof() || err.is_recoverable() => return Err(MkvError::NoSegmentFound),
            Err(err) => return Err(err),
        };

        if header.id == SEGMENT {
            let data_start = header_pos + header.header_size as u64;
            let end = header
                .size
                .map_or(file_len, |size| (data_start + size).min(file_len));
            if header.size.is_some_and(|size| data_start + size > file_len) {
                debug!(data_start, file_len, "Segment extends beyond the end of the file");
            }
            return Ok(SegmentLocation {
                ebml_header,
                header_pos,
                size_pos: header_pos + (header.header_size - header.size_length) as u64,
                size_length: header.size_length,
                data_start,
                size: header.size,
                end,
            });
        }

        match (tree::is_filler(header.id), header.size) {
            (true, Some(size)) => {
                reader.seek(SeekFrom::Current(size as i64))?;
            }
            _ => return Err(MkvError::NoSegmentFound),
        }
    }
}

/// List the Segment's children in file order.
///
/// Corrupt regions are reported to `diagnostics` and skipped by searching
/// for the next level-1 ID. Elements truncated by the end of the file are
/// kept with the size that is actually present.
pub fn scan_level1<R: Read + Seek>(
    reader: &mut R,
    segment: &SegmentLocation,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Level1Element>> {
    let mut elements = Vec::new();
    let mut pos = segment.data_start;

    while pos < segment.end {
        reader.seek(SeekFrom::Start(pos))?;
        let header = match ElementHeader::read(reader) {
            Ok(header) => header,
            Err(err) if err.is_eof() => break,
            Err(err) if err.is_recoverable() => {
                diagnostics.error(&err);
                match resync(reader, pos + 1, segment.end)? {
                    Some(next) => {
                        pos = next;
                        continue;
                    }
                    None => break,
                }
            }
            Err(err) => return Err(err),
        };
        let payload_start = pos + header.header_size as u64;

        let (size, unknown_size) = match header.size {
            Some(size) => (size, false),
            None if schema::unknown_size_allowed(header.id) => {
                let end = unknown_size_end(reader, payload_start, segment.end)?;
                (end - payload_start, true)
            }
            None => {
                diagnostics.error(&MkvError::corruption(
                    pos,
                    format!("{} has unknown size", schema::name_of(header.id)),
                ));
                match resync(reader, pos + 1, segment.end)? {
                    Some(next) => {
                        pos = next;
                        continue;
                    }
                    None => break,
                }
            }
        };

        let known = is_level1(header.id) || tree::is_filler(header.id);
        if !known && schema::lookup(header.id).is_some() {
            // A known element ID that does not belong at this level points
            // at garbage rather than a future extension.
            diagnostics.error(&MkvError::corruption(
                pos,
                format!("{} found at level 1", schema::name_of(header.id)),
            ));
            match resync(reader, pos + 1, segment.end)? {
                Some(next) => {
                    pos = next;
                    continue;
                }
                None => break,
            }
        }

        let available = segment.end - payload_start.min(segment.end);
        let size = if size > available {
            if !known {
                diagnostics.error(&MkvError::corruption(
                    pos,
                    format!("element 0x{:X} extends beyond the segment", header.id),
                ));
                match resync(reader, pos + 1, segment.end)? {
                    Some(next) => {
                        pos = next;
                        continue;
                    }
                    None => break,
                }
            }
            diagnostics.warn_at(
                pos,
                format!(
                    "{} is truncated: {} of {} bytes present",
                    schema::name_of(header.id),
                    available,
                    size
                ),
            );
            available
        } else {
            size
        };

        if !known {
            debug!(id = format_args!("0x{:X}", header.id), pos, "Unknown level-1 element kept");
        }
        elements.push(Level1Element {
            id: header.id,
            position: pos,
            header_size: header.header_size,
            size,
            unknown_size,
        });
        pos = payload_start + size;
    }

    debug!(count = elements.len(), "Scanned level-1 elements");
    Ok(elements)
}

/// End of an unknown-size master starting at `payload_start`: the first
/// level-1 or level-0 ID, or the end of the segment.
pub fn unknown_size_end<R: Read + Seek>(reader: &mut R, payload_start: u64, limit: u64) -> Result<u64> {
    let mut pos = payload_start;
    while pos < limit {
        reader.seek(SeekFrom::Start(pos))?;
        let header = match ElementHeader::read(reader) {
            Ok(header) => header,
            Err(err) if err.is_eof() => return Ok(limit),
            Err(err) if err.is_recoverable() => return Ok(pos),
            Err(err) => return Err(err),
        };
        if is_level1(header.id) || header.id == EBML || header.id == SEGMENT {
            return Ok(pos);
        }
        match header.size {
            Some(size) => pos += header.header_size as u64 + size,
            None => return Ok(pos),
        }
    }
    Ok(limit)
}

/// Search forward from `from` for the next plausible level-1 element.
///
/// A candidate must carry a level-1 ID followed by a size that fits before
/// `end`, or an unknown size on a Cluster.
pub fn resync<R: Read + Seek>(reader: &mut R, from: u64, end: u64) -> Result<Option<u64>> {
    let mut start = from;
    let mut buf = vec![0u8; RESYNC_CHUNK];

    while start < end {
        reader.seek(SeekFrom::Start(start))?;
        let want = ((end - start) as usize).min(RESYNC_CHUNK);
        let read = read_fully(reader, &mut buf[..want])?;
        if read < 4 {
            break;
        }

        for i in 0..=read - 4 {
            let id = u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
            if !is_level1(id) {
                continue;
            }
            let candidate = start + i as u64;
            reader.seek(SeekFrom::Start(candidate))?;
            let plausible = match ElementHeader::read(reader) {
                Ok(header) => match header.size {
                    Some(size) => candidate + header.header_size as u64 + size <= end,
                    None => header.id == CLUSTER,
                },
                Err(_) => false,
            };
            if plausible {
                debug!(from, candidate, "Resynchronised on level-1 element");
                return Ok(Some(candidate));
            }
        }

        if read < want {
            break;
        }
        start += (read - 3) as u64;
    }
    Ok(None)
}

fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml;
    use std::io::Cursor;

    fn file(segment_children: &[Node], unknown_size: bool) -> Vec<u8> {
        let mut out = EbmlHeader::default().to_node().render().unwrap();
        let mut payload = Vec::new();
        for child in segment_children {
            payload.extend(child.render().unwrap());
        }
        out.extend(ebml::encode_element_id(SEGMENT));
        if unknown_size {
            out.extend(ebml::unknown_size_bytes(8).unwrap());
        } else {
            out.extend(ebml::encode_vint(payload.len() as u64, 8).unwrap());
        }
        out.extend(payload);
        out
    }

    fn cluster(ts: u64) -> Node {
        Node::master(CLUSTER, vec![Node::uint(TIMESTAMP, ts), Node::binary(SIMPLE_BLOCK, vec![0x81, 0, 0, 0x80, 1])])
    }

    #[test]
    fn test_locate_segment() {
        let data = file(&[Node::master(INFO, vec![Node::uint(TIMESTAMP_SCALE, 1_000_000)])], false);
        let segment = locate_segment(&mut Cursor::new(&data)).unwrap();
        assert_eq!(segment.ebml_header.doc_type, "matroska");
        assert_eq!(segment.size_length, 8);
        assert_eq!(segment.end, data.len() as u64);
        assert_eq!(segment.size, Some(data.len() as u64 - segment.data_start));
    }

    #[test]
    fn test_missing_header_and_segment() {
        let err = locate_segment(&mut Cursor::new(vec![0x1A, 0x45])).unwrap_err();
        assert!(matches!(err, MkvError::InvalidEbmlHeader(_)));

        let mut data = EbmlHeader::default().to_node().render().unwrap();
        data.extend(Node::master(INFO, Vec::new()).render().unwrap());
        assert!(matches!(
            locate_segment(&mut Cursor::new(data)),
            Err(MkvError::NoSegmentFound)
        ));

        let data = EbmlHeader::default().to_node().render().unwrap();
        assert!(matches!(
            locate_segment(&mut Cursor::new(data)),
            Err(MkvError::NoSegmentFound)
        ));
    }

    #[test]
    fn test_unsupported_read_version() {
        let mut header = EbmlHeader::default();
        header.doc_type_read_version = 9;
        let data = header.to_node().render().unwrap();
        assert!(matches!(
            locate_segment(&mut Cursor::new(data)),
            Err(MkvError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_scan_in_file_order() {
        let children = [
            cluster(0),
            Node::master(TRACKS, Vec::new()),
            Node::master(INFO, vec![Node::uint(TIMESTAMP_SCALE, 1_000_000)]),
            cluster(100),
        ];
        let data = file(&children, false);
        let mut reader = Cursor::new(&data);
        let segment = locate_segment(&mut reader).unwrap();
        let mut diagnostics = Diagnostics::new();
        let elements = scan_level1(&mut reader, &segment, &mut diagnostics).unwrap();
        let ids: Vec<u32> = elements.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![CLUSTER, TRACKS, INFO, CLUSTER]);
        assert!(diagnostics.is_empty());
        assert_eq!(elements[3].end(), data.len() as u64);

        let info = elements[2].read_node(&mut reader).unwrap();
        assert_eq!(info.child_uint(TIMESTAMP_SCALE), Some(1_000_000));
    }

    #[test]
    fn test_unknown_size_cluster() {
        let mut data = file(&[], true);
        data.extend(ebml::encode_element_id(CLUSTER));
        data.extend(ebml::unknown_size_bytes(8).unwrap());
        data.extend(Node::uint(TIMESTAMP, 0).render().unwrap());
        let cues_at = data.len() as u64;
        data.extend(Node::master(CUES, Vec::new()).render().unwrap());

        let mut reader = Cursor::new(&data);
        let segment = locate_segment(&mut reader).unwrap();
        let elements = scan_level1(&mut reader, &segment, &mut Diagnostics::new()).unwrap();
        assert_eq!(elements.len(), 2);
        assert!(elements[0].unknown_size);
        assert_eq!(elements[0].end(), cues_at);
        assert_eq!(elements[1].id, CUES);
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut payload = cluster(0).render().unwrap();
        payload.extend([0x00, 0x00, 0x00]);
        let second_at = payload.len();
        payload.extend(cluster(50).render().unwrap());

        let mut data = EbmlHeader::default().to_node().render().unwrap();
        data.extend(ebml::encode_element_id(SEGMENT));
        data.extend(ebml::encode_vint(payload.len() as u64, 8).unwrap());
        let data_start = data.len() as u64;
        data.extend(payload);

        let mut reader = Cursor::new(&data);
        let segment = locate_segment(&mut reader).unwrap();
        let mut diagnostics = Diagnostics::new();
        let elements = scan_level1(&mut reader, &segment, &mut diagnostics).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[1].position, data_start + second_at as u64);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_truncated_cluster_kept() {
        let mut data = file(&[cluster(0)], false);
        data.truncate(data.len() - 2);
        let mut reader = Cursor::new(&data);
        let segment = locate_segment(&mut reader).unwrap();
        let mut diagnostics = Diagnostics::new();
        let elements = scan_level1(&mut reader, &segment, &mut diagnostics).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].end(), data.len() as u64);
        assert_eq!(diagnostics.len(), 1);
    }
}
