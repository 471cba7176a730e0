//! EBML (Extensible Binary Meta Language) primitives.
//!
//! EBML is the binary format underlying Matroska/WebM. It uses variable-length
//! integers (VINTs) for both element IDs and sizes. Sizes have their length
//! marker stripped; IDs keep it, so `0x1A45DFA3` is read back as `0x1A45DFA3`.

use crate::elements::*;
use crate::error::{MkvError, Result};
use crate::tree::Node;
use byteorder::{BigEndian, ByteOrder};
use std::io::{ErrorKind, Read, Seek, Write};

/// Maximum recursion depth for nested elements.
pub const MAX_RECURSION_DEPTH: u32 = 64;

/// Maximum VINT length in bytes.
pub const MAX_VINT_LENGTH: usize = 8;

/// Maximum element ID length in bytes.
pub const MAX_ID_LENGTH: usize = 4;

/// Largest value representable by an 8-byte size VINT (all-ones is reserved).
pub const MAX_VINT_VALUE: u64 = (1u64 << 56) - 2;

/// A decoded size VINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vint {
    /// Value with the length marker removed.
    pub value: u64,
    /// Encoded length in bytes (1-8).
    pub length: usize,
    /// All data bits set: the "unknown size" marker.
    pub unknown: bool,
}

/// All-ones value for a VINT of `length` bytes.
fn all_ones(length: usize) -> u64 {
    (1u64 << (7 * length)) - 1
}

/// Decode a size VINT from the start of `data`.
///
/// `offset` is the absolute position of `data[0]` and only feeds error messages.
///
/// - 1xxxxxxx: 1 byte (7 bits of data)
/// - 01xxxxxx xxxxxxxx: 2 bytes (14 bits)
/// - 001xxxxx xxxxxxxx xxxxxxxx: 3 bytes (21 bits)
/// - and so on up to 8 bytes.
pub fn decode_vint(data: &[u8], offset: u64) -> Result<Vint> {
    let first = *data.first().ok_or_else(|| MkvError::MalformedVint {
        offset,
        message: "unexpected end of data".to_string(),
    })?;

    if first == 0 {
        return Err(MkvError::MalformedVint {
            offset,
            message: "size too large (first byte is 0x00)".to_string(),
        });
    }

    let length = first.leading_zeros() as usize + 1;
    if data.len() < length {
        return Err(MkvError::MalformedVint {
            offset,
            message: format!("truncated {length}-byte VINT"),
        });
    }

    let mask = (0xFFu16 >> length) as u8;
    let value = data[1..length]
        .iter()
        .fold((first & mask) as u64, |acc, &b| (acc << 8) | b as u64);

    Ok(Vint {
        value,
        length,
        unknown: value == all_ones(length),
    })
}

/// Read a size VINT from a stream.
///
/// End of stream before the first byte is reported as an I/O `UnexpectedEof`
/// (a clean end of input); end of stream inside the VINT is `MalformedVint`.
pub fn read_vint<R: Read + Seek>(reader: &mut R) -> Result<Vint> {
    let offset = reader.stream_position()?;
    let mut buf = [0u8; MAX_VINT_LENGTH];
    reader.read_exact(&mut buf[..1])?;

    let length = buf[0].leading_zeros() as usize + 1;
    if length > 1 && length <= MAX_VINT_LENGTH {
        read_rest(reader, &mut buf[1..length], offset, false)?;
    }

    decode_vint(&buf[..length.min(MAX_VINT_LENGTH)], offset)
}

fn read_rest<R: Read>(reader: &mut R, buf: &mut [u8], offset: u64, is_id: bool) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            let message = "unexpected end of file".to_string();
            if is_id {
                MkvError::MalformedId { offset, message }
            } else {
                MkvError::MalformedVint { offset, message }
            }
        } else {
            MkvError::Io(e)
        }
    })
}

/// Decode an element ID from the start of `data`, keeping its marker bits.
pub fn decode_element_id(data: &[u8], offset: u64) -> Result<(u32, usize)> {
    let first = *data.first().ok_or_else(|| MkvError::MalformedId {
        offset,
        message: "unexpected end of data".to_string(),
    })?;

    if first == 0 {
        return Err(MkvError::MalformedId {
            offset,
            message: "first byte is 0x00".to_string(),
        });
    }

    let length = first.leading_zeros() as usize + 1;
    if length > MAX_ID_LENGTH {
        return Err(MkvError::MalformedId {
            offset,
            message: format!("{length}-byte IDs are not supported"),
        });
    }
    if data.len() < length {
        return Err(MkvError::MalformedId {
            offset,
            message: format!("truncated {length}-byte ID"),
        });
    }

    let id = data[..length]
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32);

    let marker = 1u64 << (7 * length);
    if (id as u64) ^ marker == all_ones(length) {
        return Err(MkvError::MalformedId {
            offset,
            message: format!("reserved ID 0x{id:X}"),
        });
    }

    Ok((id, length))
}

/// Read an element ID from a stream.
pub fn read_element_id<R: Read + Seek>(reader: &mut R) -> Result<(u32, usize)> {
    let offset = reader.stream_position()?;
    let mut buf = [0u8; MAX_ID_LENGTH];
    reader.read_exact(&mut buf[..1])?;

    let length = buf[0].leading_zeros() as usize + 1;
    if length > 1 && length <= MAX_ID_LENGTH {
        read_rest(reader, &mut buf[1..length], offset, true)?;
    }

    decode_element_id(&buf[..length.min(MAX_ID_LENGTH)], offset)
}

/// Minimum number of bytes needed to encode a value as a size VINT.
///
/// The all-ones pattern of each length is reserved, so 127 needs two bytes.
pub fn vint_length(value: u64) -> usize {
    (1..=MAX_VINT_LENGTH)
        .find(|&len| value < all_ones(len))
        .unwrap_or(MAX_VINT_LENGTH + 1)
}

/// Encode a size VINT using at least `min_length` bytes.
pub fn encode_vint(value: u64, min_length: usize) -> Result<Vec<u8>> {
    let length = vint_length(value).max(min_length.max(1));
    if length > MAX_VINT_LENGTH || value >= all_ones(length) {
        return Err(MkvError::Other(format!(
            "value {value} does not fit a {length}-byte VINT"
        )));
    }

    let mut bytes = value.to_be_bytes()[8 - length..].to_vec();
    bytes[0] |= 0x80 >> (length - 1);
    Ok(bytes)
}

/// Write a size VINT using at least `min_length` bytes.
pub fn write_vint<W: Write>(writer: &mut W, value: u64, min_length: usize) -> Result<usize> {
    let bytes = encode_vint(value, min_length)?;
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

/// The "unknown size" marker of the given length.
pub fn unknown_size_bytes(length: usize) -> Result<Vec<u8>> {
    if !(1..=MAX_VINT_LENGTH).contains(&length) {
        return Err(MkvError::Other(format!("invalid VINT length {length}")));
    }
    let mut bytes = vec![0xFFu8; length];
    bytes[0] = 0xFF >> (length - 1);
    Ok(bytes)
}

/// Write an unknown size marker (streaming mode).
pub fn write_unknown_size<W: Write>(writer: &mut W, length: usize) -> Result<usize> {
    let bytes = unknown_size_bytes(length)?;
    writer.write_all(&bytes)?;
    Ok(length)
}

/// Encoded length of an element ID.
pub fn id_length(id: u32) -> usize {
    match id {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Encode an element ID (marker bits are part of the value).
pub fn encode_element_id(id: u32) -> Vec<u8> {
    id.to_be_bytes()[4 - id_length(id)..].to_vec()
}

/// Write an element ID.
pub fn write_element_id<W: Write>(writer: &mut W, id: u32) -> Result<usize> {
    let bytes = encode_element_id(id);
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Signed VINT bias for EBML lacing: `2^(7*len - 1) - 1`.
fn signed_bias(length: usize) -> i64 {
    (1i64 << (7 * length - 1)) - 1
}

/// Decode a signed VINT (EBML lace size delta).
pub fn decode_signed_vint(data: &[u8], offset: u64) -> Result<(i64, usize)> {
    let vint = decode_vint(data, offset)?;
    Ok((vint.value as i64 - signed_bias(vint.length), vint.length))
}

/// Encode a signed VINT in the smallest length whose range holds `value`.
pub fn encode_signed_vint(value: i64) -> Result<Vec<u8>> {
    for length in 1..=MAX_VINT_LENGTH {
        let bias = signed_bias(length);
        if value >= -bias && value <= bias {
            return encode_vint((value + bias) as u64, length);
        }
    }
    Err(MkvError::InvalidLacing(format!(
        "lace size delta {value} out of range"
    )))
}

/// An EBML element header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// The element ID.
    pub id: u32,
    /// The element size (None for unknown size).
    pub size: Option<u64>,
    /// Total header size in bytes.
    pub header_size: usize,
    /// Length of the size field alone.
    pub size_length: usize,
}

impl ElementHeader {
    /// Read an element header from a stream.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let (id, id_len) = read_element_id(reader)?;
        let size = read_vint(reader)?;
        Ok(Self::from_parts(id, id_len, size))
    }

    /// Decode an element header from the start of `data`.
    pub fn decode(data: &[u8], offset: u64) -> Result<Self> {
        let (id, id_len) = decode_element_id(data, offset)?;
        let size = decode_vint(&data[id_len..], offset + id_len as u64)?;
        Ok(Self::from_parts(id, id_len, size))
    }

    fn from_parts(id: u32, id_len: usize, size: Vint) -> Self {
        Self {
            id,
            size: (!size.unknown).then_some(size.value),
            header_size: id_len + size.length,
            size_length: size.length,
        }
    }

    /// Build a header for a known-size element, using the minimal size field.
    pub fn new(id: u32, size: u64) -> Self {
        let size_length = vint_length(size);
        Self {
            id,
            size: Some(size),
            header_size: id_length(id) + size_length,
            size_length,
        }
    }

    /// Write an element header to a writer.
    ///
    /// The size field uses at least `size_length` bytes; unknown sizes are
    /// written with exactly `size_length` bytes (8 when unset).
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let id_len = write_element_id(writer, self.id)?;
        let size_len = match self.size {
            Some(size) => write_vint(writer, size, self.size_length)?,
            None => {
                let length = if self.size_length == 0 {
                    MAX_VINT_LENGTH
                } else {
                    self.size_length
                };
                write_unknown_size(writer, length)?
            }
        };
        Ok(id_len + size_len)
    }

    /// Get the total size of this element (header + content).
    pub fn total_size(&self) -> Option<u64> {
        self.size.map(|s| s + self.header_size as u64)
    }
}

/// EBML document header information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbmlHeader {
    /// EBML version.
    pub version: u64,
    /// EBML read version.
    pub read_version: u64,
    /// Maximum ID length.
    pub max_id_length: u64,
    /// Maximum size length.
    pub max_size_length: u64,
    /// Document type (e.g., "matroska" or "webm").
    pub doc_type: String,
    /// Document type version.
    pub doc_type_version: u64,
    /// Document type read version.
    pub doc_type_read_version: u64,
}

/// Highest EBMLReadVersion this crate reads.
pub const SUPPORTED_EBML_READ_VERSION: u64 = 1;

/// Highest DocTypeReadVersion this crate reads.
pub const SUPPORTED_DOC_TYPE_READ_VERSION: u64 = 4;

impl Default for EbmlHeader {
    fn default() -> Self {
        Self {
            version: 1,
            read_version: 1,
            max_id_length: 4,
            max_size_length: 8,
            doc_type: "matroska".to_string(),
            doc_type_version: 4,
            doc_type_read_version: 2,
        }
    }
}

impl EbmlHeader {
    /// Create a WebM header.
    pub fn webm() -> Self {
        Self {
            doc_type: "webm".to_string(),
            ..Default::default()
        }
    }

    /// Check if this is a WebM document.
    pub fn is_webm(&self) -> bool {
        self.doc_type == "webm"
    }

    /// Check if this is a Matroska document.
    pub fn is_matroska(&self) -> bool {
        self.doc_type == "matroska"
    }

    /// Decode an EBML master; missing fields keep their defaults.
    pub fn from_node(node: &Node) -> Self {
        let defaults = Self::default();
        Self {
            version: node.child_uint(EBML_VERSION).unwrap_or(defaults.version),
            read_version: node.child_uint(EBML_READ_VERSION).unwrap_or(defaults.read_version),
            max_id_length: node
                .child_uint(EBML_MAX_ID_LENGTH)
                .unwrap_or(defaults.max_id_length),
            max_size_length: node
                .child_uint(EBML_MAX_SIZE_LENGTH)
                .unwrap_or(defaults.max_size_length),
            doc_type: node
                .child_str(DOC_TYPE)
                .map(str::to_string)
                .unwrap_or(defaults.doc_type),
            doc_type_version: node.child_uint(DOC_TYPE_VERSION).unwrap_or(1),
            doc_type_read_version: node.child_uint(DOC_TYPE_READ_VERSION).unwrap_or(1),
        }
    }

    pub fn to_node(&self) -> Node {
        Node::master(
            EBML,
            vec![
                Node::uint(EBML_VERSION, self.version),
                Node::uint(EBML_READ_VERSION, self.read_version),
                Node::uint(EBML_MAX_ID_LENGTH, self.max_id_length),
                Node::uint(EBML_MAX_SIZE_LENGTH, self.max_size_length),
                Node::text(DOC_TYPE, self.doc_type.clone()),
                Node::uint(DOC_TYPE_VERSION, self.doc_type_version),
                Node::uint(DOC_TYPE_READ_VERSION, self.doc_type_read_version),
            ],
        )
    }

    /// Reject documents this crate cannot interpret.
    pub fn check_supported(&self) -> Result<()> {
        if self.read_version > SUPPORTED_EBML_READ_VERSION {
            return Err(MkvError::UnsupportedVersion {
                what: "EBMLReadVersion",
                version: self.read_version,
                supported: SUPPORTED_EBML_READ_VERSION,
            });
        }
        if !self.is_matroska() && !self.is_webm() {
            return Err(MkvError::InvalidEbmlHeader(format!(
                "unsupported DocType '{}'",
                self.doc_type
            )));
        }
        if self.doc_type_read_version > SUPPORTED_DOC_TYPE_READ_VERSION {
            return Err(MkvError::UnsupportedVersion {
                what: "DocTypeReadVersion",
                version: self.doc_type_read_version,
                supported: SUPPORTED_DOC_TYPE_READ_VERSION,
            });
        }
        Ok(())
    }
}

/// Read a signed integer from EBML data.
pub fn read_signed_int(data: &[u8]) -> i64 {
    match data.first() {
        None => 0,
        Some(&first) => {
            let init = if first & 0x80 != 0 { -1i64 } else { 0 };
            data.iter().fold(init, |acc, &b| (acc << 8) | b as i64)
        }
    }
}

/// Read an unsigned integer from EBML data.
pub fn read_unsigned_int(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Read a float from EBML data (0, 4 or 8 bytes).
pub fn read_float(data: &[u8], offset: u64) -> Result<f64> {
    match data.len() {
        0 => Ok(0.0),
        4 => Ok(BigEndian::read_f32(data) as f64),
        8 => Ok(BigEndian::read_f64(data)),
        n => Err(MkvError::corruption(
            offset,
            format!("float element with {n} bytes"),
        )),
    }
}

/// Read a string from EBML data, stopping at the first NUL.
pub fn read_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// Encode an unsigned integer using at least `min_len` bytes.
pub fn encode_unsigned_int(value: u64, min_len: usize) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let significant = 8 - (value.leading_zeros() as usize / 8).min(7);
    let len = significant.max(min_len).min(8);
    bytes[8 - len..].to_vec()
}

/// Encode a signed integer in two's complement using at least `min_len` bytes.
pub fn encode_signed_int(value: i64, min_len: usize) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut len = 8;
    while len > 1 {
        let candidate = &bytes[8 - len + 1..];
        if read_signed_int(candidate) != value {
            break;
        }
        len -= 1;
    }
    let len = len.max(min_len).min(8);
    bytes[8 - len..].to_vec()
}

/// Encode a float; a 4-byte width is kept only when requested.
pub fn encode_float(value: f64, width: usize) -> Vec<u8> {
    if width == 4 {
        (value as f32).to_be_bytes().to_vec()
    } else {
        value.to_be_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_vint_1byte() {
        let mut cursor = Cursor::new(vec![0x81]);
        let vint = read_vint(&mut cursor).unwrap();
        assert_eq!(vint.value, 1);
        assert_eq!(vint.length, 1);
        assert!(!vint.unknown);
    }

    #[test]
    fn test_read_vint_2byte() {
        let mut cursor = Cursor::new(vec![0x40, 0x81]);
        let vint = read_vint(&mut cursor).unwrap();
        assert_eq!(vint.value, 129);
        assert_eq!(vint.length, 2);
    }

    #[test]
    fn test_decode_vint_8byte() {
        let bytes = encode_vint(5, 8).unwrap();
        assert_eq!(bytes, vec![0x01, 0, 0, 0, 0, 0, 0, 0x05]);
        let vint = decode_vint(&bytes, 0).unwrap();
        assert_eq!(vint.value, 5);
        assert_eq!(vint.length, 8);
        assert!(!vint.unknown);

        let max = decode_vint(&encode_vint(MAX_VINT_VALUE, 8).unwrap(), 0).unwrap();
        assert_eq!(max.value, MAX_VINT_VALUE);
        assert!(!max.unknown);
    }

    #[test]
    fn test_decode_vint_8byte_unknown_size() {
        let bytes = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let vint = decode_vint(&bytes, 0).unwrap();
        assert!(vint.unknown);
        assert_eq!(vint.length, 8);
        assert_eq!(unknown_size_bytes(8).unwrap(), bytes.to_vec());
    }

    #[test]
    fn test_read_vint_zero_first_byte() {
        let mut cursor = Cursor::new(vec![0x00, 0x01]);
        assert!(matches!(
            read_vint(&mut cursor),
            Err(MkvError::MalformedVint { offset: 0, .. })
        ));
    }

    #[test]
    fn test_read_vint_truncated() {
        let mut cursor = Cursor::new(vec![0x20, 0x40]);
        assert!(matches!(
            read_vint(&mut cursor),
            Err(MkvError::MalformedVint { .. })
        ));
    }

    #[test]
    fn test_read_vint_clean_eof() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_vint(&mut cursor).unwrap_err().is_eof());
    }

    #[test]
    fn test_read_unknown_size() {
        for bytes in [vec![0xFF], vec![0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]] {
            let vint = decode_vint(&bytes, 0).unwrap();
            assert!(vint.unknown);
            assert_eq!(vint.length, bytes.len());
        }
    }

    #[test]
    fn test_read_element_id_keeps_marker() {
        let mut cursor = Cursor::new(vec![0x1A, 0x45, 0xDF, 0xA3]);
        let (id, len) = read_element_id(&mut cursor).unwrap();
        assert_eq!(id, 0x1A45DFA3);
        assert_eq!(len, 4);

        let (id, len) = decode_element_id(&[0xEC], 0).unwrap();
        assert_eq!(id, 0xEC);
        assert_eq!(len, 1);
    }

    #[test]
    fn test_read_element_id_rejects_invalid() {
        assert!(matches!(
            decode_element_id(&[0x08, 0, 0, 0, 0], 7),
            Err(MkvError::MalformedId { offset: 7, .. })
        ));
        assert!(matches!(
            decode_element_id(&[0xFF], 0),
            Err(MkvError::MalformedId { .. })
        ));
        assert!(matches!(
            decode_element_id(&[0x00], 0),
            Err(MkvError::MalformedId { .. })
        ));
    }

    #[test]
    fn test_encode_vint() {
        assert_eq!(encode_vint(1, 1).unwrap(), vec![0x81]);
        assert_eq!(encode_vint(129, 1).unwrap(), vec![0x40, 0x81]);
        // 127 is the 1-byte unknown marker
        assert_eq!(encode_vint(127, 1).unwrap(), vec![0x40, 0x7F]);
        assert_eq!(encode_vint(5, 4).unwrap(), vec![0x10, 0x00, 0x00, 0x05]);
        assert!(encode_vint(MAX_VINT_VALUE + 1, 1).is_err());
    }

    #[test]
    fn test_vint_roundtrip() {
        for value in [0, 1, 126, 127, 128, 16382, 16383, 16384, 1_000_000, MAX_VINT_VALUE] {
            let encoded = encode_vint(value, 1).unwrap();
            let decoded = decode_vint(&encoded, 0).unwrap();
            assert_eq!(decoded.value, value);
            assert_eq!(decoded.length, encoded.len());
            assert!(!decoded.unknown);
        }
    }

    #[test]
    fn test_signed_vint() {
        assert_eq!(encode_signed_vint(0).unwrap(), vec![0xBF]);
        assert_eq!(encode_signed_vint(-1).unwrap(), vec![0xBE]);
        assert_eq!(encode_signed_vint(64).unwrap().len(), 2);
        for value in [0i64, 1, -1, 63, -63, 64, -64, 8191, -8191, 100_000] {
            let bytes = encode_signed_vint(value).unwrap();
            assert_eq!(decode_signed_vint(&bytes, 0).unwrap(), (value, bytes.len()));
        }
    }

    #[test]
    fn test_unknown_size_bytes() {
        assert_eq!(unknown_size_bytes(1).unwrap(), vec![0xFF]);
        assert_eq!(unknown_size_bytes(2).unwrap(), vec![0x7F, 0xFF]);
        assert!(unknown_size_bytes(9).is_err());
    }

    #[test]
    fn test_read_signed_int() {
        assert_eq!(read_signed_int(&[0x00]), 0);
        assert_eq!(read_signed_int(&[0x01]), 1);
        assert_eq!(read_signed_int(&[0xFF]), -1);
        assert_eq!(read_signed_int(&[0x00, 0x80]), 128);
        assert_eq!(read_signed_int(&[0xFF, 0x7F]), -129);
    }

    #[test]
    fn test_encode_integers() {
        assert_eq!(encode_unsigned_int(0, 1), vec![0x00]);
        assert_eq!(encode_unsigned_int(256, 1), vec![0x01, 0x00]);
        assert_eq!(encode_unsigned_int(5, 2), vec![0x00, 0x05]);
        assert_eq!(encode_signed_int(-1, 1), vec![0xFF]);
        assert_eq!(encode_signed_int(128, 1), vec![0x00, 0x80]);
        assert_eq!(encode_signed_int(-129, 1), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_read_float() {
        assert_eq!(read_float(&1.5f32.to_be_bytes(), 0).unwrap(), 1.5);
        assert_eq!(read_float(&1.5f64.to_be_bytes(), 0).unwrap(), 1.5);
        assert!(read_float(&[0, 0, 0], 0).is_err());
    }

    #[test]
    fn test_read_string() {
        assert_eq!(read_string(b"hello\x00world"), "hello");
        assert_eq!(read_string(b"hello"), "hello");
    }

    #[test]
    fn test_element_header_roundtrip() {
        let header = ElementHeader::new(0x1A45DFA3, 100);
        let mut buffer = Vec::new();
        let written = header.write(&mut buffer).unwrap();

        let mut cursor = Cursor::new(&buffer);
        let read_header = ElementHeader::read(&mut cursor).unwrap();

        assert_eq!(read_header, header);
        assert_eq!(written, read_header.header_size);
    }

    #[test]
    fn test_ebml_header_version_checks() {
        assert!(EbmlHeader::default().check_supported().is_ok());
        assert!(EbmlHeader::webm().is_webm());

        let header = EbmlHeader {
            read_version: 2,
            ..Default::default()
        };
        assert!(matches!(
            header.check_supported(),
            Err(MkvError::UnsupportedVersion { version: 2, .. })
        ));

        let header = EbmlHeader {
            doc_type: "avi".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            header.check_supported(),
            Err(MkvError::InvalidEbmlHeader(_))
        ));
    }

    #[test]
    fn test_ebml_header_node() {
        let header = EbmlHeader::webm();
        let node = header.to_node();
        assert!(node.validate().is_ok());
        let bytes = node.render().unwrap();
        assert_eq!(&bytes[..4], &[0x1A, 0x45, 0xDF, 0xA3]);

        let parsed = Node::parse(&bytes, crate::schema::ROOT).unwrap();
        assert_eq!(EbmlHeader::from_node(&parsed), header);
    }
}
