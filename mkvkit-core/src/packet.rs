//! Packet abstraction for the data exchanged with the container engine.
//!
//! A packet is one encoded frame of one track. All timestamps are in
//! nanoseconds. `bref`/`fref` hold the *absolute* timestamps of the frames
//! this one depends on, which is how the Matroska `ReferenceBlock` values are
//! resolved by the reader and re-derived by the writer.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Flags for packet properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PacketFlags: u32 {
        /// The packet can be decoded without any other packet.
        const KEYFRAME = 0x0001;
        /// The packet may be dropped by a player under load.
        const DISCARDABLE = 0x0002;
        /// The frame is decoded but not displayed.
        const INVISIBLE = 0x0004;
        /// The duration must be written even if it matches the default.
        const DURATION_MANDATORY = 0x0008;
    }
}

/// An encoded media packet.
#[derive(Clone, PartialEq)]
pub struct Packet {
    /// The packet data.
    data: Vec<u8>,
    /// Track this packet belongs to.
    pub track_number: u64,
    /// Timestamp in nanoseconds. May be negative before sync is applied.
    pub timestamp: i64,
    /// Duration in nanoseconds, if known.
    pub duration: Option<i64>,
    /// Timestamp of the frame referenced backwards.
    pub bref: Option<i64>,
    /// Timestamp of the frame referenced forwards.
    pub fref: Option<i64>,
    /// Packet flags.
    pub flags: PacketFlags,
    /// Byte position of the containing block in the source, if any.
    pub pos: Option<u64>,
}

impl Packet {
    /// Create a new key frame packet.
    pub fn new(track_number: u64, timestamp: i64, data: Vec<u8>) -> Self {
        Self {
            data,
            track_number,
            timestamp,
            duration: None,
            bref: None,
            fref: None,
            flags: PacketFlags::KEYFRAME,
            pos: None,
        }
    }

    /// Get the packet data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the packet data.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// Consume the packet and return its data.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the size of the packet data.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check if this packet is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if this is a keyframe packet.
    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(PacketFlags::KEYFRAME)
    }

    /// Set the keyframe flag.
    pub fn set_keyframe(&mut self, keyframe: bool) {
        self.flags.set(PacketFlags::KEYFRAME, keyframe);
    }

    /// Whether this packet references other frames.
    pub fn has_references(&self) -> bool {
        self.bref.is_some() || self.fref.is_some()
    }

    /// End of the packet on the timeline, if the duration is known.
    pub fn end_timestamp(&self) -> Option<i64> {
        self.duration.map(|d| self.timestamp + d)
    }

    /// Attach a backward reference. The packet stops being a key frame.
    pub fn with_bref(mut self, bref: i64) -> Self {
        self.bref = Some(bref);
        self.set_keyframe(false);
        self
    }

    /// Attach a forward reference. The packet stops being a key frame.
    pub fn with_fref(mut self, fref: i64) -> Self {
        self.fref = Some(fref);
        self.set_keyframe(false);
        self
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Replace the flags.
    pub fn with_flags(mut self, flags: PacketFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("track_number", &self.track_number)
            .field("size", &self.size())
            .field("timestamp", &self.timestamp)
            .field("duration", &self.duration)
            .field("bref", &self.bref)
            .field("fref", &self.fref)
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_packet_is_keyframe() {
        let packet = Packet::new(1, 0, vec![1, 2, 3]);
        assert!(packet.is_keyframe());
        assert!(!packet.has_references());
        assert_eq!(packet.size(), 3);
    }

    #[test]
    fn test_references_clear_keyframe() {
        let packet = Packet::new(2, 120_000_000, vec![0]).with_bref(0);
        assert!(!packet.is_keyframe());
        assert_eq!(packet.bref, Some(0));

        let packet = Packet::new(2, 40_000_000, vec![0])
            .with_bref(0)
            .with_fref(120_000_000);
        assert!(packet.has_references());
        assert_eq!(packet.fref, Some(120_000_000));
    }

    #[test]
    fn test_end_timestamp() {
        let packet = Packet::new(1, 1_000, vec![]).with_duration(500);
        assert_eq!(packet.end_timestamp(), Some(1_500));
        assert!(packet.is_empty());
    }

    #[test]
    fn test_flags() {
        let mut packet = Packet::new(1, 0, vec![]);
        packet.flags.insert(PacketFlags::DISCARDABLE);
        packet.set_keyframe(false);
        assert_eq!(packet.flags, PacketFlags::DISCARDABLE);
    }
}
