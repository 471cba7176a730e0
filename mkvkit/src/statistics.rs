//! Per-track statistics written as tags.

use crate::tags::{Tag, Tags, Targets, TARGET_ALBUM};
use chrono::{DateTime, Utc};
use mkvkit_core::format_timestamp;

const STATISTICS_NAMES: [&str; 4] = ["BPS", "DURATION", "NUMBER_OF_FRAMES", "NUMBER_OF_BYTES"];

/// Frame and byte counters of one track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackStatistics {
    pub track_uid: u64,
    pub frames: u64,
    pub bytes: u64,
    pub first_timestamp: Option<i64>,
    /// End of the last frame (timestamp plus duration).
    pub last_timestamp: Option<i64>,
}

impl TrackStatistics {
    pub fn new(track_uid: u64) -> Self {
        Self {
            track_uid,
            ..Default::default()
        }
    }

    pub fn account(&mut self, timestamp: i64, duration: Option<i64>, bytes: usize) {
        self.frames += 1;
        self.bytes += bytes as u64;
        let end = timestamp + duration.unwrap_or(0);
        self.first_timestamp = Some(self.first_timestamp.map_or(timestamp, |t| t.min(timestamp)));
        self.last_timestamp = Some(self.last_timestamp.map_or(end, |t| t.max(end)));
    }

    /// Nanoseconds between the first frame start and the last frame end.
    pub fn duration(&self) -> Option<i64> {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) if last > first => Some(last - first),
            _ => None,
        }
    }

    pub fn bits_per_second(&self) -> Option<u64> {
        self.duration()
            .map(|d| ((self.bytes as u128 * 8 * 1_000_000_000) / d as u128) as u64)
    }

    /// Replace this track's statistics tags in `tags`.
    pub fn write_tags(&self, tags: &mut Tags, writing_app: &str, writing_date: Option<DateTime<Utc>>) {
        let date = writing_date
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "1970-01-01 00:00:00".to_string());

        for tag in tags.tags.iter_mut().filter(|t| t.targets.track_uids == [self.track_uid]) {
            tag.simple_tags.retain(|s| !STATISTICS_NAMES.contains(&s.name.as_str()));
        }

        let index = match tags.tags.iter().position(|t| {
            t.targets.track_uids == [self.track_uid] && t.targets.target_type_value == TARGET_ALBUM
        }) {
            Some(index) => index,
            None => {
                tags.tags.push(Tag::new(Targets::track(self.track_uid), Vec::new()));
                tags.tags.len() - 1
            }
        };
        let tag = &mut tags.tags[index];
        tag.targets.target_type = Some("MOVIE".to_string());

        tag.set_value("BPS", self.bits_per_second().unwrap_or(0).to_string());
        tag.set_value("DURATION", format_timestamp(self.duration().unwrap_or(0)));
        tag.set_value("NUMBER_OF_FRAMES", self.frames.to_string());
        tag.set_value("NUMBER_OF_BYTES", self.bytes.to_string());
        tag.set_value("_STATISTICS_WRITING_APP", writing_app);
        tag.set_value("_STATISTICS_WRITING_DATE_UTC", date);
        tag.set_value("_STATISTICS_TAGS", STATISTICS_NAMES.join(" "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_accounting() {
        let mut stats = TrackStatistics::new(7);
        for i in 0..25 {
            stats.account(i * 40_000_000, Some(40_000_000), 1000);
        }
        assert_eq!(stats.frames, 25);
        assert_eq!(stats.bytes, 25_000);
        assert_eq!(stats.duration(), Some(1_000_000_000));
        assert_eq!(stats.bits_per_second(), Some(200_000));
    }

    #[test]
    fn test_write_tags() {
        let mut stats = TrackStatistics::new(7);
        stats.account(0, Some(500_000_000), 10);

        let mut tags = Tags::default();
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        stats.write_tags(&mut tags, "mkvkit", Some(date));
        stats.write_tags(&mut tags, "mkvkit", Some(date));

        assert_eq!(tags.tags.len(), 1);
        let tag = &tags.tags[0];
        assert_eq!(tag.targets.track_uids, vec![7]);
        assert_eq!(tag.value("NUMBER_OF_FRAMES"), Some("1"));
        assert_eq!(tag.value("BPS"), Some("160"));
        assert_eq!(tag.value("DURATION"), Some("00:00:00.500000000"));
        assert_eq!(tag.value("_STATISTICS_WRITING_DATE_UTC"), Some("2024-05-01 12:00:00"));
        assert_eq!(tag.simple_tags.len(), 7);
    }
}
