//! Property-based tests for timestamp formatting and parsing.

use mkvkit_core::timestamp::{format_timestamp, format_timestamp_with_precision, parse_timestamp};
use proptest::prelude::*;

// =============================================================================
// Formatting round-trips
// =============================================================================

proptest! {
    #[test]
    fn roundtrip_full_precision(ns in -360_000_000_000_000i64..360_000_000_000_000i64) {
        let text = format_timestamp(ns);
        prop_assert_eq!(parse_timestamp(&text).unwrap(), ns);
    }

    #[test]
    fn millisecond_precision_truncates(ns in 0i64..360_000_000_000_000i64) {
        let text = format_timestamp_with_precision(ns, 3);
        let parsed = parse_timestamp(&text).unwrap();
        prop_assert!(parsed <= ns);
        prop_assert!(ns - parsed < 1_000_000);
    }

    #[test]
    fn millisecond_unit_scales(ms in 0i64..10_000_000i64) {
        let parsed = parse_timestamp(&format!("{ms}ms")).unwrap();
        prop_assert_eq!(parsed, ms * 1_000_000);
    }
}
