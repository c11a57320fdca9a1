//! Typed view of the metrics stream wire format.
//!
//! Each text frame on the socket is one JSON object describing a single
//! analytics sample for one site. Field names are camelCase on the wire.
//! Frames missing required fields fail deserialization and are dropped by
//! the socket loop — they never affect connection state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decoded analytics sample from the metrics stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsFrame {
    /// Sample timestamp (ISO-8601 on the wire).
    pub timestamp: DateTime<Utc>,

    /// Stable site identifier, e.g. `"site_1"`.
    pub site_id: String,

    /// Human-readable site name.
    pub site_name: String,

    /// Core traffic counters for this sample.
    #[serde(flatten)]
    pub traffic: TrafficCounters,

    /// Page performance timings.
    #[serde(default)]
    pub performance: PerfTimings,

    /// Most-visited paths with view counts (small fixed-size list).
    #[serde(default, rename = "topPages")]
    pub top_paths: Vec<PathCount>,

    /// Directed navigation transitions between paths.
    #[serde(default)]
    pub transitions: Vec<PathTransition>,
}

/// Core traffic counters, flattened into the frame object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficCounters {
    pub page_views: u64,
    pub unique_visitors: u64,
    /// Fraction of single-page sessions. Should be in [0, 1]; the domain
    /// conversion clamps out-of-range values from misbehaving producers.
    pub bounce_rate: f64,
    /// Average session duration in seconds.
    pub avg_session_duration: f64,
}

/// Page performance sub-metrics, all in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfTimings {
    #[serde(default)]
    pub load_time: f64,
    #[serde(default)]
    pub first_contentful_paint: f64,
    #[serde(default)]
    pub largest_contentful_paint: f64,
    #[serde(default)]
    pub time_to_first_byte: f64,
}

/// A path and its view count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathCount {
    pub path: String,
    pub views: u64,
}

/// A directed transition count between two paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathTransition {
    pub from: String,
    pub to: String,
    pub count: u64,
}

impl MetricsFrame {
    /// Parse one text frame. Errors mean "drop the frame", not "drop the
    /// connection".
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn full_frame_json() -> serde_json::Value {
        serde_json::json!({
            "timestamp": "2026-02-10T12:00:00Z",
            "siteId": "site_1",
            "siteName": "Marketing Site",
            "pageViews": 128,
            "uniqueVisitors": 44,
            "bounceRate": 0.37,
            "avgSessionDuration": 182.5,
            "performance": {
                "loadTime": 1240.0,
                "firstContentfulPaint": 810.0,
                "largestContentfulPaint": 1510.0,
                "timeToFirstByte": 120.0
            },
            "topPages": [
                { "path": "/", "views": 61 },
                { "path": "/pricing", "views": 23 }
            ],
            "transitions": [
                { "from": "/", "to": "/pricing", "count": 12 }
            ]
        })
    }

    #[test]
    fn parse_full_frame() {
        let frame = MetricsFrame::parse(&full_frame_json().to_string()).unwrap();
        assert_eq!(frame.site_id, "site_1");
        assert_eq!(frame.site_name, "Marketing Site");
        assert_eq!(frame.traffic.page_views, 128);
        assert_eq!(frame.traffic.unique_visitors, 44);
        assert!((frame.traffic.bounce_rate - 0.37).abs() < f64::EPSILON);
        assert!((frame.performance.load_time - 1240.0).abs() < f64::EPSILON);
        assert_eq!(frame.top_paths.len(), 2);
        assert_eq!(frame.top_paths[0].path, "/");
        assert_eq!(frame.transitions[0].count, 12);
    }

    #[test]
    fn parse_minimal_frame_defaults_optional_sections() {
        let json = serde_json::json!({
            "timestamp": "2026-02-10T12:00:00Z",
            "siteId": "site_2",
            "siteName": "Docs",
            "pageViews": 5,
            "uniqueVisitors": 3,
            "bounceRate": 0.5,
            "avgSessionDuration": 20.0
        });
        let frame = MetricsFrame::parse(&json.to_string()).unwrap();
        assert!(frame.top_paths.is_empty());
        assert!(frame.transitions.is_empty());
        assert!((frame.performance.load_time - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_rejects_missing_site_id() {
        let mut json = full_frame_json();
        json.as_object_mut().unwrap().remove("siteId");
        assert!(MetricsFrame::parse(&json.to_string()).is_err());
    }

    #[test]
    fn parse_rejects_bad_timestamp() {
        let mut json = full_frame_json();
        json["timestamp"] = serde_json::json!("not-a-timestamp");
        assert!(MetricsFrame::parse(&json.to_string()).is_err());
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(MetricsFrame::parse("not json at all").is_err());
    }
}
