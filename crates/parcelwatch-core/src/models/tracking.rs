use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Live tracking data for one package.
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub history: Vec<TrackingEvent>,
    /// Carrier the server detected or used for the lookup
    #[serde(default)]
    pub carrier: Option<String>,
    /// Carrier lookup failure reported inside a 200 response. The client
    /// turns this into `ApiError::CarrierUnavailable`.
    #[serde(default, skip_serializing)]
    pub error: Option<String>,
}

impl TrackingInfo {
    /// History ordered newest first.
    pub fn sorted_history(&self) -> Vec<TrackingEvent> {
        sorted_history(&self.history)
    }
}

/// One carrier-reported status update.
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub timestamp: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl TrackingEvent {
    /// Parse the timestamp. Offset-aware values are converted to UTC;
    /// naive values are taken as they are.
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        let raw = self.timestamp.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(dt);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    /// "Jan 15, 2024 09:45", or the raw timestamp if it cannot be parsed.
    pub fn formatted_timestamp(&self) -> String {
        match self.parsed_timestamp() {
            Some(dt) => dt.format("%b %d, %Y %H:%M").to_string(),
            None => self.timestamp.clone(),
        }
    }
}

/// Newest first. Unparseable timestamps sort after all parseable ones.
fn newest_first(a: &TrackingEvent, b: &TrackingEvent) -> Ordering {
    match (a.parsed_timestamp(), b.parsed_timestamp()) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort events in place, newest first.
///
/// The sort is stable, so events with equal timestamps keep their server
/// order and sorting an already sorted history changes nothing.
pub fn sort_history(events: &mut [TrackingEvent]) {
    events.sort_by(newest_first);
}

pub fn sorted_history(events: &[TrackingEvent]) -> Vec<TrackingEvent> {
    let mut sorted = events.to_vec();
    sort_history(&mut sorted);
    sorted
}
