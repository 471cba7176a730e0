//! Segment information (the `Info` element).

use crate::elements::*;
use crate::tree::Node;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default timestamp scale (1 millisecond in nanoseconds).
pub const DEFAULT_TIMESTAMP_SCALE: u64 = 1_000_000;

/// Unix time of the Matroska date epoch, 2001-01-01T00:00:00 UTC.
const MATROSKA_EPOCH_UNIX: i64 = 978_307_200;

/// Segment information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentInfo {
    pub segment_uid: Option<Vec<u8>>,
    pub segment_filename: Option<String>,
    pub prev_uid: Option<Vec<u8>>,
    pub prev_filename: Option<String>,
    pub next_uid: Option<Vec<u8>>,
    pub next_filename: Option<String>,
    /// Nanoseconds per tick.
    pub timestamp_scale: u64,
    /// Duration in ticks.
    pub duration: Option<f64>,
    /// Nanoseconds since 2001-01-01.
    pub date_utc: Option<i64>,
    pub title: Option<String>,
    pub muxing_app: Option<String>,
    pub writing_app: Option<String>,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            segment_uid: None,
            segment_filename: None,
            prev_uid: None,
            prev_filename: None,
            next_uid: None,
            next_filename: None,
            timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
            duration: None,
            date_utc: None,
            title: None,
            muxing_app: None,
            writing_app: None,
        }
    }
}

impl SegmentInfo {
    pub fn from_node(node: &Node) -> Self {
        let string = |id| node.child_str(id).map(str::to_string);
        let binary = |id| node.child_binary(id).map(<[u8]>::to_vec);
        Self {
            segment_uid: binary(SEGMENT_UID),
            segment_filename: string(SEGMENT_FILENAME),
            prev_uid: binary(PREV_UID),
            prev_filename: string(PREV_FILENAME),
            next_uid: binary(NEXT_UID),
            next_filename: string(NEXT_FILENAME),
            timestamp_scale: node
                .child_uint(TIMESTAMP_SCALE)
                .filter(|&scale| scale > 0)
                .unwrap_or(DEFAULT_TIMESTAMP_SCALE),
            duration: node.child_float(DURATION),
            date_utc: node.child_date(DATE_UTC),
            title: string(TITLE),
            muxing_app: string(MUXING_APP),
            writing_app: string(WRITING_APP),
        }
    }

    pub fn to_node(&self) -> Node {
        let mut node = Node::new_master(INFO);
        if let Some(uid) = &self.segment_uid {
            node.push(Node::binary(SEGMENT_UID, uid.clone()));
        }
        if let Some(name) = &self.segment_filename {
            node.push(Node::text(SEGMENT_FILENAME, name.as_str()));
        }
        if let Some(uid) = &self.prev_uid {
            node.push(Node::binary(PREV_UID, uid.clone()));
        }
        if let Some(name) = &self.prev_filename {
            node.push(Node::text(PREV_FILENAME, name.as_str()));
        }
        if let Some(uid) = &self.next_uid {
            node.push(Node::binary(NEXT_UID, uid.clone()));
        }
        if let Some(name) = &self.next_filename {
            node.push(Node::text(NEXT_FILENAME, name.as_str()));
        }
        node.push(Node::uint(TIMESTAMP_SCALE, self.timestamp_scale));
        if let Some(duration) = self.duration {
            node.push(Node::float(DURATION, duration));
        }
        if let Some(date) = self.date_utc {
            node.push(Node::date(DATE_UTC, date));
        }
        if let Some(title) = &self.title {
            node.push(Node::text(TITLE, title.as_str()));
        }
        node.push(Node::text(MUXING_APP, self.muxing_app.clone().unwrap_or_default()));
        node.push(Node::text(WRITING_APP, self.writing_app.clone().unwrap_or_default()));
        node
    }

    /// Duration in nanoseconds.
    pub fn duration_ns(&self) -> Option<i64> {
        self.duration
            .map(|ticks| (ticks * self.timestamp_scale as f64).round() as i64)
    }
}

/// Convert a Matroska date to a UTC timestamp.
pub fn date_to_utc(date: i64) -> Option<DateTime<Utc>> {
    let secs = date.div_euclid(1_000_000_000) + MATROSKA_EPOCH_UNIX;
    let nanos = date.rem_euclid(1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nanos)
}

/// Convert a UTC timestamp to a Matroska date.
pub fn utc_to_date(time: DateTime<Utc>) -> i64 {
    (time.timestamp() - MATROSKA_EPOCH_UNIX) * 1_000_000_000
        + time.timestamp_subsec_nanos() as i64
}

/// The current time as a Matroska date, truncated to whole seconds.
pub fn now_as_date() -> i64 {
    utc_to_date(Utc::now()) / 1_000_000_000 * 1_000_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_info_roundtrip() {
        let info = SegmentInfo {
            segment_uid: Some(vec![7; 16]),
            title: Some("Title".to_string()),
            duration: Some(2500.0),
            date_utc: Some(0),
            muxing_app: Some("libmkvkit".to_string()),
            writing_app: Some("mkvkit".to_string()),
            ..Default::default()
        };
        let node = info.to_node();
        assert!(node.validate().is_ok());
        assert_eq!(SegmentInfo::from_node(&node), info);
        assert_eq!(info.duration_ns(), Some(2_500_000_000));
    }

    #[test]
    fn test_missing_scale_uses_default() {
        let info = SegmentInfo::from_node(&Node::new_master(INFO));
        assert_eq!(info.timestamp_scale, DEFAULT_TIMESTAMP_SCALE);
        assert_eq!(info.duration_ns(), None);
    }

    #[test]
    fn test_date_conversion() {
        let epoch = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(utc_to_date(epoch), 0);
        assert_eq!(date_to_utc(0), Some(epoch));

        let before = Utc.with_ymd_and_hms(2000, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(utc_to_date(before), -1_000_000_000);
        assert_eq!(date_to_utc(-1_000_000_000), Some(before));
    }
}
