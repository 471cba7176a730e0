//! # mkvkit core
//!
//! Value types shared between the Matroska engine and the components that
//! produce or consume its packets:
//! - Error handling types
//! - Packets with reference (bref/fref) information
//! - Nanosecond timestamp formatting and parsing

pub mod error;
pub mod packet;
pub mod timestamp;

pub use error::{Error, Result};
pub use packet::{Packet, PacketFlags};
pub use timestamp::{format_timestamp, parse_timestamp};
