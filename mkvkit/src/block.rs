//! Block and SimpleBlock payloads, including lacing.
//!
//! ```text
//! +--------------+-----------+-------+-----------------------+--------+
//! | track (VINT) | ts (i16)  | flags | [count-1, lace sizes] | frames |
//! +--------------+-----------+-------+-----------------------+--------+
//! ```

use crate::ebml;
use crate::error::{MkvError, Result};
use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder};

/// Most frames a single laced block can hold.
pub const MAX_LACED_FRAMES: usize = 256;

bitflags! {
    /// Flag byte of a Block/SimpleBlock header (lacing bits excluded).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlockFlags: u8 {
        /// SimpleBlock only.
        const KEYFRAME = 0x80;
        const INVISIBLE = 0x08;
        /// SimpleBlock only.
        const DISCARDABLE = 0x01;
    }
}

const LACING_MASK: u8 = 0x06;

/// Lacing scheme of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lacing {
    None,
    Xiph,
    Fixed,
    Ebml,
}

impl Lacing {
    fn from_bits(flags: u8) -> Self {
        match (flags & LACING_MASK) >> 1 {
            0 => Lacing::None,
            1 => Lacing::Xiph,
            2 => Lacing::Fixed,
            _ => Lacing::Ebml,
        }
    }

    fn bits(self) -> u8 {
        let value = match self {
            Lacing::None => 0,
            Lacing::Xiph => 1,
            Lacing::Fixed => 2,
            Lacing::Ebml => 3,
        };
        value << 1
    }
}

/// A decoded block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub track_number: u64,
    /// Timestamp relative to the cluster, in ticks.
    pub relative_timestamp: i16,
    pub flags: BlockFlags,
    pub lacing: Lacing,
    pub frames: Vec<Vec<u8>>,
}

impl Block {
    /// A single-frame block.
    pub fn new(track_number: u64, relative_timestamp: i16, data: Vec<u8>) -> Self {
        Self {
            track_number,
            relative_timestamp,
            flags: BlockFlags::empty(),
            lacing: Lacing::None,
            frames: vec![data],
        }
    }

    /// A laced block using the smallest lacing for the given frames.
    pub fn laced(track_number: u64, relative_timestamp: i16, frames: Vec<Vec<u8>>) -> Self {
        let lacing = best_lacing(&frames);
        Self {
            track_number,
            relative_timestamp,
            flags: BlockFlags::empty(),
            lacing,
            frames,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(BlockFlags::KEYFRAME)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Decode a Block or SimpleBlock payload starting at file offset `offset`.
    pub fn parse(data: &[u8], offset: u64) -> Result<Self> {
        let track = ebml::decode_vint(data, offset).map_err(|_| MkvError::InvalidBlock {
            offset,
            message: "unreadable track number".to_string(),
        })?;
        let pos = track.length;
        if data.len() < pos + 3 {
            return Err(MkvError::InvalidBlock {
                offset,
                message: format!("block header needs {} bytes, found {}", pos + 3, data.len()),
            });
        }

        let relative_timestamp = BigEndian::read_i16(&data[pos..pos + 2]);
        let raw_flags = data[pos + 2];
        let lacing = Lacing::from_bits(raw_flags);
        let flags = BlockFlags::from_bits_truncate(raw_flags);
        let body = &data[pos + 3..];

        let frames = match lacing {
            Lacing::None => vec![body.to_vec()],
            _ => decode_lacing(lacing, body)?,
        };

        Ok(Self {
            track_number: track.value,
            relative_timestamp,
            flags,
            lacing,
            frames,
        })
    }

    /// Encode the block payload.
    pub fn render(&self) -> Result<Vec<u8>> {
        if self.frames.is_empty() {
            return Err(MkvError::InvalidLacing("block without frames".to_string()));
        }
        let lacing = if self.frames.len() == 1 {
            Lacing::None
        } else {
            self.lacing
        };
        if lacing == Lacing::None && self.frames.len() > 1 {
            return Err(MkvError::InvalidLacing(format!(
                "{} frames without lacing",
                self.frames.len()
            )));
        }

        let mut out = ebml::encode_vint(self.track_number, 1)?;
        let mut ts = [0u8; 2];
        BigEndian::write_i16(&mut ts, self.relative_timestamp);
        out.extend_from_slice(&ts);
        out.push(self.flags.bits() | lacing.bits());
        if lacing != Lacing::None {
            out.extend_from_slice(&encode_lacing_header(lacing, &self.frames)?);
        }
        for frame in &self.frames {
            out.extend_from_slice(frame);
        }
        Ok(out)
    }
}

fn lacing_error(message: impl Into<String>) -> MkvError {
    MkvError::InvalidLacing(message.into())
}

/// Split a laced body (starting at the frame count byte) into frames.
pub fn decode_lacing(lacing: Lacing, body: &[u8]) -> Result<Vec<Vec<u8>>> {
    let count = *body
        .first()
        .ok_or_else(|| lacing_error("missing frame count"))? as usize
        + 1;
    let mut pos = 1;
    let mut sizes = Vec::with_capacity(count);

    match lacing {
        Lacing::None => return Ok(vec![body.to_vec()]),
        Lacing::Xiph => {
            for _ in 0..count - 1 {
                let mut size = 0usize;
                loop {
                    let byte = *body
                        .get(pos)
                        .ok_or_else(|| lacing_error("Xiph lacing: unexpected end of data"))?;
                    pos += 1;
                    size += byte as usize;
                    if byte < 255 {
                        break;
                    }
                }
                sizes.push(size);
            }
        }
        Lacing::Ebml => {
            if count > 1 {
                let first = ebml::decode_vint(&body[pos..], 0)
                    .map_err(|_| lacing_error("EBML lacing: unreadable first size"))?;
                pos += first.length;
                sizes.push(first.value as usize);
                let mut previous = first.value as i64;
                for _ in 1..count - 1 {
                    let (delta, len) = ebml::decode_signed_vint(&body[pos..], 0)
                        .map_err(|_| lacing_error("EBML lacing: unreadable size delta"))?;
                    pos += len;
                    previous = previous
                        .checked_add(delta)
                        .ok_or_else(|| lacing_error("lace sizes exceed block size"))?;
                    if previous < 0 {
                        return Err(lacing_error("EBML lacing: negative frame size"));
                    }
                    sizes.push(previous as usize);
                }
            }
        }
        Lacing::Fixed => {
            let data_len = body.len() - pos;
            if data_len % count != 0 {
                return Err(lacing_error(format!(
                    "fixed lacing: {data_len} bytes not divisible by {count} frames"
                )));
            }
            sizes.resize(count - 1, data_len / count);
        }
    }

    let last = sizes
        .iter()
        .try_fold(pos, |acc, &size| acc.checked_add(size))
        .and_then(|end| body.len().checked_sub(end))
        .ok_or_else(|| lacing_error("lace sizes exceed block size"))?;
    sizes.push(last);

    let mut frames = Vec::with_capacity(count);
    for size in sizes {
        frames.push(body[pos..pos + size].to_vec());
        pos += size;
    }
    Ok(frames)
}

/// Encode the lacing header (frame count and sizes) for `frames`.
pub fn encode_lacing_header(lacing: Lacing, frames: &[Vec<u8>]) -> Result<Vec<u8>> {
    if frames.len() < 2 || frames.len() > MAX_LACED_FRAMES {
        return Err(lacing_error(format!("cannot lace {} frames", frames.len())));
    }
    let mut out = vec![(frames.len() - 1) as u8];
    let leading = &frames[..frames.len() - 1];

    match lacing {
        Lacing::None => return Err(lacing_error("lacing header requested for unlaced block")),
        Lacing::Xiph => {
            for frame in leading {
                let mut size = frame.len();
                while size >= 255 {
                    out.push(255);
                    size -= 255;
                }
                out.push(size as u8);
            }
        }
        Lacing::Ebml => {
            out.extend_from_slice(&ebml::encode_vint(frames[0].len() as u64, 1)?);
            for pair in leading.windows(2) {
                let delta = pair[1].len() as i64 - pair[0].len() as i64;
                out.extend_from_slice(&ebml::encode_signed_vint(delta)?);
            }
        }
        Lacing::Fixed => {
            if frames.iter().any(|f| f.len() != frames[0].len()) {
                return Err(lacing_error("fixed lacing needs equally sized frames"));
            }
        }
    }
    Ok(out)
}

/// The lacing with the smallest header for `frames`.
pub fn best_lacing(frames: &[Vec<u8>]) -> Lacing {
    if frames.len() < 2 {
        return Lacing::None;
    }
    [Lacing::Fixed, Lacing::Xiph, Lacing::Ebml]
        .into_iter()
        .filter_map(|lacing| {
            encode_lacing_header(lacing, frames)
                .ok()
                .map(|header| (header.len(), lacing))
        })
        .min_by_key(|(len, _)| *len)
        .map(|(_, lacing)| lacing)
        .unwrap_or(Lacing::None)
}
