//! Marker encoding and parsing.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<prefix>[^_\s]+)_(?P<date>\d{4}-\d{2}-\d{2})_(?P<time>\d{2}:\d{2}:\d{2})_(?P<worker>[^_]+)(?:_(?P<feature>.+))?$",
    )
    .expect("marker pattern is valid")
});

/// A parsed exclusive marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusiveMarker {
    pub prefix: String,
    pub timestamp: DateTime<FixedOffset>,
    pub worker_id: String,
    pub feature: Option<String>,
}

impl ExclusiveMarker {
    /// Marker stamped at `now`, rendered in `offset`.
    pub fn new(
        prefix: impl Into<String>,
        worker_id: impl Into<String>,
        feature: Option<&str>,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            // Whole seconds only, so encode/parse is lossless.
            timestamp: offset
                .timestamp_opt(now.timestamp(), 0)
                .single()
                .unwrap_or_else(|| now.with_timezone(&offset)),
            worker_id: worker_id.into(),
            feature: feature.map(single_line).filter(|f| !f.is_empty()),
        }
    }

    /// Render as `prefix_YYYY-MM-DD_HH:MM:SS_workerId[_feature]`.
    pub fn encode(&self) -> String {
        let mut out = format!(
            "{}_{}_{}",
            self.prefix,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.worker_id
        );
        if let Some(ref feature) = self.feature {
            out.push('_');
            out.push_str(feature);
        }
        out
    }

    /// Parse a marker whose timestamp was written in `offset`.
    ///
    /// Returns `None` for anything lacking the structured timestamp.
    pub fn parse(text: &str, offset: FixedOffset) -> Option<Self> {
        let caps = MARKER.captures(text.trim())?;
        let stamp = format!("{}_{}", &caps["date"], &caps["time"]);
        let naive = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).ok()?;
        let timestamp = offset.from_local_datetime(&naive).single()?;
        Some(Self {
            prefix: caps["prefix"].to_string(),
            timestamp,
            worker_id: caps["worker"].to_string(),
            feature: caps.name("feature").map(|m| m.as_str().to_string()),
        })
    }

    /// Time elapsed since the marker was written; zero for future stamps.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp.with_timezone(&Utc))
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Collapse whitespace runs, line breaks included, to single spaces.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_encode_applies_offset() {
        let marker = ExclusiveMarker::new("PROCESSING", "pc1", None, at("2026-01-31T20:30:05Z"), jst());
        assert_eq!(marker.encode(), "PROCESSING_2026-02-01_05:30:05_pc1");
    }

    #[test]
    fn test_encode_with_feature() {
        let marker = ExclusiveMarker::new(
            "PROCESSING",
            "pc1",
            Some("Deep Research"),
            at("2026-01-01T00:00:00Z"),
            jst(),
        );
        assert_eq!(marker.encode(), "PROCESSING_2026-01-01_09:00:00_pc1_Deep Research");
    }

    #[test]
    fn test_feature_is_one_line() {
        let marker = ExclusiveMarker::new(
            "PROCESSING",
            "pc1",
            Some(" Deep\r\n  Research "),
            at("2026-01-01T00:00:00Z"),
            jst(),
        );
        assert_eq!(marker.feature.as_deref(), Some("Deep Research"));
        assert_eq!(marker.encode().lines().count(), 1);
    }

    #[test]
    fn test_parse_roundtrip() {
        let marker = ExclusiveMarker::new(
            "PROCESSING",
            "w1a2b3c4",
            Some("Agent"),
            at("2026-03-04T05:06:07Z"),
            jst(),
        );
        let parsed = ExclusiveMarker::parse(&marker.encode(), jst()).unwrap();
        assert_eq!(parsed, marker);
    }

    #[test]
    fn test_parse_rejects_unstructured() {
        assert!(ExclusiveMarker::parse("PROCESSING", jst()).is_none());
        assert!(ExclusiveMarker::parse("PROCESSING_pc1", jst()).is_none());
        assert!(ExclusiveMarker::parse("PROCESSING_2026-13-01_00:00:00_pc1", jst()).is_none());
        assert!(ExclusiveMarker::parse("---------- ChatGPT ----------", jst()).is_none());
    }

    #[test]
    fn test_age() {
        let marker = ExclusiveMarker::new("P", "pc1", None, at("2026-01-01T00:00:00Z"), jst());
        assert_eq!(marker.age(at("2026-01-01T00:10:00Z")), Duration::from_secs(600));
        assert_eq!(marker.age(at("2025-12-31T23:00:00Z")), Duration::ZERO);
    }
}
