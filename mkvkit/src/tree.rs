//! In-memory EBML element tree.
//!
//! A [`Node`] is either a master owning its children or a typed leaf. Leaves
//! remember the width they were read with and masters the width of their size
//! field, so an unmodified parse re-renders byte for byte. Elements missing
//! from the schema are kept as opaque binary leaves.

use crate::ebml::{self, ElementHeader, MAX_RECURSION_DEPTH, MAX_VINT_LENGTH};
use crate::elements::{CRC32, VOID};
use crate::error::{MkvError, Result};
use crate::schema::{self, DefaultValue, SchemaEntry, ValueType};
use std::borrow::Cow;
use std::io::{self, Read, Seek, Write};
use tracing::debug;

/// Payload of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Master(Vec<Node>),
    UInt(u64),
    SInt(i64),
    Float(f64),
    Str(String),
    Utf8(String),
    /// Nanoseconds since 2001-01-01T00:00:00 UTC.
    Date(i64),
    Binary(Vec<u8>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Master(_) => ValueType::Master,
            Value::UInt(_) => ValueType::UInt,
            Value::SInt(_) => ValueType::SInt,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::String,
            Value::Utf8(_) => ValueType::Utf8,
            Value::Date(_) => ValueType::Date,
            Value::Binary(_) => ValueType::Binary,
        }
    }

    fn from_default(default: DefaultValue, value_type: ValueType) -> Self {
        match (default, value_type) {
            (DefaultValue::UInt(v), _) => Value::UInt(v),
            (DefaultValue::SInt(v), _) => Value::SInt(v),
            (DefaultValue::Float(v), _) => Value::Float(v),
            (DefaultValue::Str(s), ValueType::Utf8) => Value::Utf8(s.to_string()),
            (DefaultValue::Str(s), _) => Value::Str(s.to_string()),
        }
    }
}

/// One element of an EBML document.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: u32,
    pub value: Value,
    /// Payload width as read; new leaves use minimal widths.
    raw_len: Option<u64>,
    /// Size field width as read.
    size_len: Option<usize>,
    unknown_size: bool,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.value == other.value
    }
}

impl Node {
    fn with_value(id: u32, value: Value) -> Self {
        Self {
            id,
            value,
            raw_len: None,
            size_len: None,
            unknown_size: false,
        }
    }

    /// An empty master.
    pub fn new_master(id: u32) -> Self {
        Self::with_value(id, Value::Master(Vec::new()))
    }

    pub fn master(id: u32, children: Vec<Node>) -> Self {
        Self::with_value(id, Value::Master(children))
    }

    pub fn uint(id: u32, value: u64) -> Self {
        Self::with_value(id, Value::UInt(value))
    }

    pub fn sint(id: u32, value: i64) -> Self {
        Self::with_value(id, Value::SInt(value))
    }

    pub fn float(id: u32, value: f64) -> Self {
        Self::with_value(id, Value::Float(value))
    }

    /// A string leaf; ASCII or UTF-8 according to the schema.
    pub fn text(id: u32, value: impl Into<String>) -> Self {
        let value = value.into();
        match schema::lookup(id).map(|e| e.value_type) {
            Some(ValueType::String) => Self::with_value(id, Value::Str(value)),
            _ => Self::with_value(id, Value::Utf8(value)),
        }
    }

    pub fn date(id: u32, value: i64) -> Self {
        Self::with_value(id, Value::Date(value))
    }

    pub fn binary(id: u32, value: impl Into<Vec<u8>>) -> Self {
        Self::with_value(id, Value::Binary(value.into()))
    }

    /// A node holding the schema default of `entry`, or an empty master.
    pub fn from_schema_default(entry: &SchemaEntry) -> Option<Self> {
        if entry.is_master() {
            return Some(Self::new_master(entry.id));
        }
        entry
            .default
            .map(|d| Self::with_value(entry.id, Value::from_default(d, entry.value_type)))
    }

    /// Replace the value, dropping remembered encoding widths.
    pub fn set_value(&mut self, value: Value) {
        self.value = value;
        self.raw_len = None;
    }

    pub fn name(&self) -> &'static str {
        schema::name_of(self.id)
    }

    pub fn is_master(&self) -> bool {
        matches!(self.value, Value::Master(_))
    }

    /// Whether the element was read with the "unknown size" marker.
    pub fn has_unknown_size(&self) -> bool {
        self.unknown_size
    }

    // ---------------------------------------------------------------------
    // Leaf accessors
    // ---------------------------------------------------------------------

    pub fn as_uint(&self) -> Option<u64> {
        match self.value {
            Value::UInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_sint(&self) -> Option<i64> {
        match self.value {
            Value::SInt(v) => Some(v),
            Value::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.value {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::Str(s) | Value::Utf8(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<i64> {
        match self.value {
            Value::Date(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match &self.value {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    // ---------------------------------------------------------------------
    // Children
    // ---------------------------------------------------------------------

    /// Children of a master; empty for leaves.
    pub fn children(&self) -> &[Node] {
        match &self.value {
            Value::Master(children) => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.value {
            Value::Master(children) => Some(children),
            _ => None,
        }
    }

    /// First child with the given ID.
    pub fn child(&self, id: u32) -> Option<&Node> {
        self.children().iter().find(|c| c.id == id)
    }

    pub fn child_mut(&mut self, id: u32) -> Option<&mut Node> {
        self.children_mut()?.iter_mut().find(|c| c.id == id)
    }

    /// All children with the given ID, in order.
    pub fn children_with(&self, id: u32) -> impl Iterator<Item = &Node> {
        self.children().iter().filter(move |c| c.id == id)
    }

    pub fn child_uint(&self, id: u32) -> Option<u64> {
        self.child(id).and_then(Node::as_uint)
    }

    /// Child value, falling back to the schema default.
    pub fn child_uint_or_default(&self, id: u32) -> Option<u64> {
        self.child_uint(id).or_else(|| match schema::lookup(id)?.default? {
            DefaultValue::UInt(v) => Some(v),
            _ => None,
        })
    }

    pub fn child_sint(&self, id: u32) -> Option<i64> {
        self.child(id).and_then(Node::as_sint)
    }

    pub fn child_float(&self, id: u32) -> Option<f64> {
        self.child(id).and_then(Node::as_float)
    }

    pub fn child_float_or_default(&self, id: u32) -> Option<f64> {
        self.child_float(id).or_else(|| match schema::lookup(id)?.default? {
            DefaultValue::Float(v) => Some(v),
            _ => None,
        })
    }

    pub fn child_str(&self, id: u32) -> Option<&str> {
        self.child(id).and_then(Node::as_str)
    }

    pub fn child_str_or_default(&self, id: u32) -> Option<&str> {
        self.child_str(id).or_else(|| match schema::lookup(id)?.default? {
            DefaultValue::Str(s) => Some(s),
            _ => None,
        })
    }

    pub fn child_binary(&self, id: u32) -> Option<&[u8]> {
        self.child(id).and_then(Node::as_binary)
    }

    pub fn child_date(&self, id: u32) -> Option<i64> {
        self.child(id).and_then(Node::as_date)
    }

    /// Append a child. No-op on leaves.
    pub fn push(&mut self, child: Node) {
        if let Some(children) = self.children_mut() {
            children.push(child);
        }
    }

    /// Replace the first child with the same ID, or insert it at its
    /// canonical position.
    pub fn set_child(&mut self, child: Node) {
        let Some(children) = self.children_mut() else {
            return;
        };
        if let Some(existing) = children.iter_mut().find(|c| c.id == child.id) {
            *existing = child;
            return;
        }
        let key = schema::sort_key(child.id);
        let at = children
            .iter()
            .position(|c| schema::sort_key(c.id) > key)
            .unwrap_or(children.len());
        children.insert(at, child);
    }

    pub fn set_uint(&mut self, id: u32, value: u64) {
        self.set_child(Node::uint(id, value));
    }

    pub fn set_float(&mut self, id: u32, value: f64) {
        self.set_child(Node::float(id, value));
    }

    pub fn set_text(&mut self, id: u32, value: impl Into<String>) {
        self.set_child(Node::text(id, value));
    }

    pub fn set_binary(&mut self, id: u32, value: impl Into<Vec<u8>>) {
        self.set_child(Node::binary(id, value));
    }

    /// Remove every child with the given ID; returns how many were removed.
    pub fn remove_children(&mut self, id: u32) -> usize {
        match self.children_mut() {
            Some(children) => {
                let before = children.len();
                children.retain(|c| c.id != id);
                before - children.len()
            }
            None => 0,
        }
    }

    // ---------------------------------------------------------------------
    // Index paths
    // ---------------------------------------------------------------------

    /// Descendant addressed by child indices from this node.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, &index| node.children().get(index))
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let mut node = self;
        for &index in path {
            node = node.children_mut()?.get_mut(index)?;
        }
        Some(node)
    }

    /// Index path of the first descendant (depth first) with the given ID.
    pub fn find_path(&self, id: u32) -> Option<Vec<usize>> {
        for (index, child) in self.children().iter().enumerate() {
            if child.id == id {
                return Some(vec![index]);
            }
            if let Some(mut path) = child.find_path(id) {
                path.insert(0, index);
                return Some(path);
            }
        }
        None
    }

    /// ID of the master owning the node at `path`.
    pub fn parent_id(&self, path: &[usize]) -> Option<u32> {
        match path.split_last() {
            Some((_, parent)) => self.node_at(parent).map(|n| n.id),
            None => None,
        }
    }

    // ---------------------------------------------------------------------
    // Schema rules
    // ---------------------------------------------------------------------

    /// Insert every missing unique mandatory child that has a default, and
    /// empty masters for missing unique mandatory masters, recursively.
    ///
    /// Running it twice yields the same tree as running it once.
    pub fn fix_mandatory_elements(&mut self) {
        let id = self.id;
        let Some(children) = self.children_mut() else {
            return;
        };
        for entry in schema::children_of(id) {
            if !entry.mandatory_in(id) || entry.multiple || children.iter().any(|c| c.id == entry.id) {
                continue;
            }
            if let Some(node) = Node::from_schema_default(entry) {
                debug!(element = entry.name, parent = schema::name_of(id), "Adding mandatory element");
                let key = schema::sort_key(entry.id);
                let at = children
                    .iter()
                    .position(|c| schema::sort_key(c.id) > key)
                    .unwrap_or(children.len());
                children.insert(at, node);
            }
        }
        for child in children.iter_mut() {
            child.fix_mandatory_elements();
        }
    }

    /// Check that every mandatory element is present (or has a default).
    pub fn validate(&self) -> Result<()> {
        if !self.is_master() {
            return Ok(());
        }
        for entry in schema::children_of(self.id) {
            if !entry.mandatory_in(self.id) || (!entry.is_master() && entry.default.is_some()) {
                continue;
            }
            if self.child(entry.id).is_none() {
                return Err(MkvError::MissingMandatoryElement {
                    name: entry.name,
                    id: entry.id,
                    parent: schema::name_of(self.id),
                });
            }
        }
        self.children().iter().try_for_each(Node::validate)
    }

    /// Stable-sort direct children into canonical schema order.
    pub fn sort_children(&mut self) {
        self.sort_children_by_key(|child| schema::sort_key(child.id));
    }

    /// Stable-sort direct children by a caller-supplied key.
    pub fn sort_children_by_key<K: Ord, F: FnMut(&Node) -> K>(&mut self, key: F) {
        if let Some(children) = self.children_mut() {
            children.sort_by_key(key);
        }
    }

    /// Canonical order at every level.
    pub fn sort_recursive(&mut self) {
        self.sort_children();
        if let Some(children) = self.children_mut() {
            children.iter_mut().for_each(Node::sort_recursive);
        }
    }

    // ---------------------------------------------------------------------
    // Parsing
    // ---------------------------------------------------------------------

    /// Parse the single element at the start of `data`.
    pub fn parse(data: &[u8], parent: u32) -> Result<Node> {
        Ok(Self::parse_at(data, 0, parent)?.0)
    }

    /// Parse the element at the start of `data`, whose first byte lives at
    /// absolute file offset `base`. Returns the node and bytes consumed.
    pub fn parse_at(data: &[u8], base: u64, parent: u32) -> Result<(Node, usize)> {
        parse_element(data, 0, base, parent, 0)
    }

    /// Parse a run of sibling elements filling `data` exactly.
    pub fn parse_children(data: &[u8], base: u64, parent: u32) -> Result<Vec<Node>> {
        parse_children(data, base, parent, 0)
    }

    /// Read one element from a stream, loading its payload into memory.
    ///
    /// Unknown-size elements cannot be read this way; walk their children
    /// with [`ElementHeader::read`] instead.
    pub fn read<R: Read + Seek>(reader: &mut R, parent: u32) -> Result<Node> {
        let offset = reader.stream_position()?;
        let header = ElementHeader::read(reader)?;
        let size = header.size.ok_or_else(|| {
            MkvError::corruption(
                offset,
                format!("{} has unknown size", schema::name_of(header.id)),
            )
        })?;
        let payload = read_payload(reader, size, offset)?;
        if schema::lookup(header.id).is_some() && !schema::is_valid_child(parent, header.id) {
            debug!(id = format_args!("0x{:X}", header.id), offset, "Element outside its schema context");
        }
        let value = decode_value(&header, &payload, offset + header.header_size as u64, 0)?;
        Ok(Node {
            id: header.id,
            value,
            raw_len: Some(size),
            size_len: Some(header.size_length),
            unknown_size: false,
        })
    }

    // ---------------------------------------------------------------------
    // Rendering
    // ---------------------------------------------------------------------

    /// Encoded leaf payload.
    fn leaf_payload(&self) -> Cow<'_, [u8]> {
        let width = self.raw_len.map(|l| l as usize);
        match &self.value {
            Value::Master(_) => Cow::Borrowed(&[]),
            Value::UInt(v) => match width {
                Some(0) if *v == 0 => Cow::Borrowed(&[]),
                w => Cow::Owned(ebml::encode_unsigned_int(*v, w.unwrap_or(1))),
            },
            Value::SInt(v) => match width {
                Some(0) if *v == 0 => Cow::Borrowed(&[]),
                w => Cow::Owned(ebml::encode_signed_int(*v, w.unwrap_or(1))),
            },
            Value::Float(v) => match width {
                Some(0) if *v == 0.0 => Cow::Borrowed(&[]),
                w => Cow::Owned(ebml::encode_float(*v, w.unwrap_or(8))),
            },
            Value::Date(v) => match width {
                Some(0) if *v == 0 => Cow::Borrowed(&[]),
                _ => Cow::Owned(v.to_be_bytes().to_vec()),
            },
            Value::Str(s) | Value::Utf8(s) => match width {
                Some(w) if w > s.len() => {
                    let mut bytes = s.as_bytes().to_vec();
                    bytes.resize(w, 0);
                    Cow::Owned(bytes)
                }
                _ => Cow::Borrowed(s.as_bytes()),
            },
            Value::Binary(b) => Cow::Borrowed(b),
        }
    }

    fn size_width(&self, payload: u64) -> usize {
        ebml::vint_length(payload).max(self.size_len.unwrap_or(1))
    }

    fn header_len(&self, payload: u64) -> usize {
        let size_len = if self.unknown_size {
            self.size_len.unwrap_or(MAX_VINT_LENGTH)
        } else {
            self.size_width(payload)
        };
        ebml::id_length(self.id) + size_len
    }

    fn write_header(&self, payload: u64, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&ebml::encode_element_id(self.id));
        if self.unknown_size {
            out.extend_from_slice(&ebml::unknown_size_bytes(
                self.size_len.unwrap_or(MAX_VINT_LENGTH),
            )?);
        } else {
            out.extend_from_slice(&ebml::encode_vint(payload, self.size_width(payload))?);
        }
        Ok(())
    }

    /// First pass: record payload sizes in pre-order, return total size.
    fn measure(&self, sizes: &mut Vec<u64>) -> u64 {
        let slot = sizes.len();
        sizes.push(0);
        let payload = match &self.value {
            Value::Master(children) => children.iter().map(|c| c.measure(sizes)).sum(),
            _ => self.leaf_payload().len() as u64,
        };
        sizes[slot] = payload;
        self.header_len(payload) as u64 + payload
    }

    /// Second pass: emit headers and payloads using the measured sizes.
    fn emit(&self, sizes: &[u64], cursor: &mut usize, out: &mut Vec<u8>) -> Result<()> {
        let payload = sizes[*cursor];
        *cursor += 1;
        self.write_header(payload, out)?;
        match &self.value {
            Value::Master(children) => {
                for child in children {
                    child.emit(sizes, cursor, out)?;
                }
            }
            _ => out.extend_from_slice(&self.leaf_payload()),
        }
        Ok(())
    }

    /// Payload size in bytes.
    pub fn payload_size(&self) -> u64 {
        let mut sizes = Vec::new();
        self.measure(&mut sizes);
        sizes[0]
    }

    /// Encoded size including the header.
    pub fn total_size(&self) -> u64 {
        self.measure(&mut Vec::new())
    }

    /// Encode the element.
    pub fn render(&self) -> Result<Vec<u8>> {
        let mut sizes = Vec::new();
        let total = self.measure(&mut sizes);
        let mut out = Vec::with_capacity(total as usize);
        self.emit(&sizes, &mut 0, &mut out)?;
        Ok(out)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let bytes = self.render()?;
        writer.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Encode the element into exactly `available` bytes.
    ///
    /// Leftover space of two or more bytes becomes a trailing Void; a single
    /// leftover byte is absorbed by widening this element's size field.
    pub fn render_with_padding(&self, available: u64) -> Result<Vec<u8>> {
        let bytes = self.render()?;
        let needed = bytes.len() as u64;
        if needed > available {
            return Err(MkvError::ElementTooLarge {
                id: self.id,
                needed,
                available,
            });
        }

        match available - needed {
            0 => Ok(bytes),
            1 => {
                let payload = self.payload_size();
                let header_len = self.header_len(payload);
                let width = header_len - ebml::id_length(self.id);
                if self.unknown_size || width >= MAX_VINT_LENGTH {
                    return Err(MkvError::ElementTooLarge {
                        id: self.id,
                        needed: available + 1,
                        available,
                    });
                }
                let mut out = ebml::encode_element_id(self.id);
                out.extend_from_slice(&ebml::encode_vint(payload, width + 1)?);
                out.extend_from_slice(&bytes[header_len..]);
                Ok(out)
            }
            gap => {
                let mut out = bytes;
                out.extend_from_slice(&void_bytes(gap)?);
                Ok(out)
            }
        }
    }
}

/// Header of a Void element spanning exactly `total` bytes (at least 2).
fn void_header(total: u64) -> Result<Vec<u8>> {
    for size_len in 1..=MAX_VINT_LENGTH {
        let overhead = 1 + size_len as u64;
        if total < overhead {
            break;
        }
        let payload = total - overhead;
        if ebml::vint_length(payload) <= size_len {
            let mut header = vec![VOID as u8];
            header.extend_from_slice(&ebml::encode_vint(payload, size_len)?);
            return Ok(header);
        }
    }
    Err(MkvError::Other(format!(
        "cannot build a {total}-byte Void element"
    )))
}

/// A zero-filled Void element spanning exactly `total` bytes (at least 2).
pub fn void_bytes(total: u64) -> Result<Vec<u8>> {
    let mut out = void_header(total)?;
    out.resize(total as usize, 0);
    Ok(out)
}

/// Stream a zero-filled Void element spanning exactly `total` bytes.
pub fn write_void<W: Write>(writer: &mut W, total: u64) -> Result<()> {
    let header = void_header(total)?;
    writer.write_all(&header)?;
    io::copy(
        &mut io::repeat(0).take(total - header.len() as u64),
        writer,
    )?;
    Ok(())
}

fn read_payload<R: Read>(reader: &mut R, size: u64, offset: u64) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    let read = reader.take(size).read_to_end(&mut payload)?;
    if (read as u64) < size {
        return Err(MkvError::corruption(
            offset,
            format!("element truncated: expected {size} bytes, found {read}"),
        ));
    }
    Ok(payload)
}

fn parse_children(data: &[u8], base: u64, parent: u32, depth: u32) -> Result<Vec<Node>> {
    let mut children = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (child, used) = parse_element(data, pos, base, parent, depth)?;
        children.push(child);
        pos += used;
    }
    Ok(children)
}

fn parse_element(
    data: &[u8],
    pos: usize,
    base: u64,
    parent: u32,
    depth: u32,
) -> Result<(Node, usize)> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(MkvError::RecursionLimit { depth });
    }

    let offset = base + pos as u64;
    let header = ElementHeader::decode(&data[pos..], offset)?;
    let payload_start = pos + header.header_size;

    if schema::lookup(header.id).is_some() && !schema::is_valid_child(parent, header.id) {
        debug!(
            id = format_args!("0x{:X}", header.id),
            parent = schema::name_of(parent),
            offset,
            "Element outside its schema context"
        );
    }

    let Some(size) = header.size else {
        if !schema::unknown_size_allowed(header.id) {
            return Err(MkvError::corruption(
                offset,
                format!("{} may not have an unknown size", schema::name_of(header.id)),
            ));
        }
        // Read children until an element that cannot belong to this master.
        let mut children = Vec::new();
        let mut cursor = payload_start;
        while cursor < data.len() {
            let (id, _) = ebml::decode_element_id(&data[cursor..], base + cursor as u64)?;
            if schema::lookup(id).is_some() && !schema::is_valid_child(header.id, id) {
                break;
            }
            let (child, used) = parse_element(data, cursor, base, header.id, depth + 1)?;
            children.push(child);
            cursor += used;
        }
        let node = Node {
            id: header.id,
            value: Value::Master(children),
            raw_len: None,
            size_len: Some(header.size_length),
            unknown_size: true,
        };
        return Ok((node, cursor - pos));
    };

    let end = usize::try_from(size)
        .ok()
        .and_then(|s| payload_start.checked_add(s))
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            MkvError::corruption(
                offset,
                format!(
                    "{} (0x{:X}) of size {size} exceeds the {} bytes available",
                    schema::name_of(header.id),
                    header.id,
                    data.len() - payload_start
                ),
            )
        })?;

    let value = decode_value(
        &header,
        &data[payload_start..end],
        base + payload_start as u64,
        depth,
    )?;
    let node = Node {
        id: header.id,
        value,
        raw_len: Some(size),
        size_len: Some(header.size_length),
        unknown_size: false,
    };
    Ok((node, end - pos))
}

fn decode_value(header: &ElementHeader, payload: &[u8], offset: u64, depth: u32) -> Result<Value> {
    let Some(entry) = schema::lookup(header.id) else {
        debug!(id = format_args!("0x{:X}", header.id), offset, "Keeping unknown element as binary");
        return Ok(Value::Binary(payload.to_vec()));
    };

    let too_long = |what: &str| {
        MkvError::corruption(
            offset,
            format!("{} {what} with {} bytes", entry.name, payload.len()),
        )
    };

    Ok(match entry.value_type {
        ValueType::Master => {
            Value::Master(parse_children(payload, offset, header.id, depth + 1)?)
        }
        ValueType::UInt if payload.len() > 8 => return Err(too_long("integer")),
        ValueType::UInt => Value::UInt(ebml::read_unsigned_int(payload)),
        ValueType::SInt if payload.len() > 8 => return Err(too_long("integer")),
        ValueType::SInt => Value::SInt(ebml::read_signed_int(payload)),
        ValueType::Date if payload.len() > 8 => return Err(too_long("date")),
        ValueType::Date => Value::Date(ebml::read_signed_int(payload)),
        ValueType::Float => Value::Float(ebml::read_float(payload, offset)?),
        ValueType::String => Value::Str(ebml::read_string(payload)),
        ValueType::Utf8 => Value::Utf8(ebml::read_string(payload)),
        ValueType::Binary => Value::Binary(payload.to_vec()),
    })
}

/// Whether `id` is an element that only carries padding or a checksum.
pub fn is_filler(id: u32) -> bool {
    id == VOID || id == CRC32
}
