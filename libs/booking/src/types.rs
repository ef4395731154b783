//! Wire types and probe descriptions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Local date-time format used in outbound requests.
pub const LOCAL_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Status tag for a fully available item.
pub const STATUS_AVAILABLE: &str = "BOOKINGSAVAILABILITYSTATUS_AVAILABLE";

/// Status tag for an item with a number of free slots.
pub const STATUS_SLOTS_AVAILABLE: &str = "BOOKINGSAVAILABILITYSTATUS_SLOTS_AVAILABLE";

/// Status tag for an unavailable item.
pub const STATUS_UNAVAILABLE: &str = "BOOKINGSAVAILABILITYSTATUS_UNAVAILABLE";

// =============================================================================
// Probe descriptions
// =============================================================================

/// A configured (service, staff) pair to monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub service_id: String,
    pub staff_ids: Vec<String>,
}

/// Error parsing a [`ProbeTarget`] from `service:staff[,staff...]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetParseError {
    #[error("missing ':' between service and staff ids in {0:?}")]
    MissingSeparator(String),

    #[error("empty service id in {0:?}")]
    EmptyService(String),

    #[error("no staff ids in {0:?}")]
    NoStaff(String),
}

impl FromStr for ProbeTarget {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((service, staff)) = s.split_once(':') else {
            return Err(TargetParseError::MissingSeparator(s.to_string()));
        };

        let service_id = service.trim();
        if service_id.is_empty() {
            return Err(TargetParseError::EmptyService(s.to_string()));
        }

        let staff_ids: Vec<String> = staff
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if staff_ids.is_empty() {
            return Err(TargetParseError::NoStaff(s.to_string()));
        }

        Ok(Self {
            service_id: service_id.to_string(),
            staff_ids,
        })
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service_id, self.staff_ids.join(","))
    }
}

/// Half-open local time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ProbeWindow {
    /// Window from midnight of `today` through `months` months later.
    ///
    /// Month arithmetic clamps to the last day of shorter months.
    pub fn starting(today: NaiveDate, months: u32) -> Self {
        let start = today.and_time(chrono::NaiveTime::MIN);
        let end = start
            .checked_add_months(Months::new(months))
            .unwrap_or(NaiveDateTime::MAX);
        Self { start, end }
    }
}

/// One thing to check: a service, its staff, and a window in a named zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub service_id: String,
    pub staff_ids: Vec<String>,
    pub window: ProbeWindow,
    pub time_zone: String,
}

impl ProbeSpec {
    pub fn new(target: &ProbeTarget, window: ProbeWindow, time_zone: impl Into<String>) -> Self {
        Self {
            service_id: target.service_id.clone(),
            staff_ids: target.staff_ids.clone(),
            window,
            time_zone: time_zone.into(),
        }
    }

    /// Build the outbound request body.
    pub fn to_request(&self) -> AvailabilityRequest {
        AvailabilityRequest {
            service_id: self.service_id.clone(),
            staff_ids: self.staff_ids.clone(),
            start_date_time: ZonedDateTime::local(self.window.start, &self.time_zone),
            end_date_time: ZonedDateTime::local(self.window.end, &self.time_zone),
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// A date-time string paired with a time-zone label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZonedDateTime {
    pub date_time: String,
    pub time_zone: String,
}

impl ZonedDateTime {
    fn local(at: NaiveDateTime, time_zone: &str) -> Self {
        Self {
            date_time: at.format(LOCAL_DATE_TIME_FORMAT).to_string(),
            time_zone: time_zone.to_string(),
        }
    }

    /// Resolve to an instant.
    ///
    /// RFC 3339 strings carry their own offset. Offset-less strings are only
    /// accepted when the zone label names UTC, since other labels cannot be
    /// resolved without a zone database.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        if let Ok(at) = DateTime::parse_from_rfc3339(&self.date_time) {
            return Some(at.with_timezone(&Utc));
        }

        if !is_utc_label(&self.time_zone) {
            return None;
        }

        NaiveDateTime::parse_from_str(&self.date_time, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

fn is_utc_label(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_uppercase().as_str(),
        "UTC" | "ETC/UTC" | "Z" | "GMT" | "COORDINATED UNIVERSAL TIME"
    )
}

/// Outbound availability query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub service_id: String,
    pub staff_ids: Vec<String>,
    pub start_date_time: ZonedDateTime,
    pub end_date_time: ZonedDateTime,
}

/// Availability status of a returned item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SlotStatus {
    Available,
    SlotsAvailable,
    Unavailable,
    Other(String),
}

impl SlotStatus {
    /// Whether this tag is one of the two "available" tags.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Available | Self::SlotsAvailable)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => STATUS_AVAILABLE,
            Self::SlotsAvailable => STATUS_SLOTS_AVAILABLE,
            Self::Unavailable => STATUS_UNAVAILABLE,
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for SlotStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            STATUS_AVAILABLE => Self::Available,
            STATUS_SLOTS_AVAILABLE => Self::SlotsAvailable,
            STATUS_UNAVAILABLE => Self::Unavailable,
            _ => Self::Other(raw),
        }
    }
}

impl From<SlotStatus> for String {
    fn from(status: SlotStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A single returned availability item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCandidate {
    pub status: SlotStatus,
    pub start_date_time: ZonedDateTime,
    pub end_date_time: ZonedDateTime,
    #[serde(default)]
    pub available_count: i64,
}

impl SlotCandidate {
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.start_date_time.to_utc()
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.end_date_time.to_utc()
    }

    /// Open status, at least one free unit, and a start strictly after `now`.
    ///
    /// Items whose start cannot be resolved are never eligible.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open()
            && self.available_count > 0
            && self.starts_at().is_some_and(|start| start > now)
    }
}

/// Availability of a single staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffAvailability {
    pub staff_id: String,
    #[serde(default)]
    pub availability_items: Vec<SlotCandidate>,
}

/// Inbound availability response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    #[serde(default)]
    pub staff_availability_response: Vec<StaffAvailability>,
}

impl AvailabilityResponse {
    /// First eligible item in scan order (staff entries, then their items).
    pub fn first_eligible(&self, now: DateTime<Utc>) -> Option<&SlotCandidate> {
        self.staff_availability_response
            .iter()
            .flat_map(|staff| staff.availability_items.iter())
            .find(|item| item.is_eligible(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn candidate(status: &str, start: DateTime<Utc>, count: i64) -> SlotCandidate {
        SlotCandidate {
            status: SlotStatus::from(status.to_string()),
            start_date_time: ZonedDateTime {
                date_time: start.to_rfc3339(),
                time_zone: "UTC".to_string(),
            },
            end_date_time: ZonedDateTime {
                date_time: (start + Duration::minutes(30)).to_rfc3339(),
                time_zone: "UTC".to_string(),
            },
            available_count: count,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[rstest]
    #[case::zero_count(STATUS_AVAILABLE, 1, 0, false)]
    #[case::past_start(STATUS_AVAILABLE, -1, 3, false)]
    #[case::future_single(STATUS_AVAILABLE, 1, 1, true)]
    #[case::slots_available(STATUS_SLOTS_AVAILABLE, 2, 4, true)]
    #[case::unavailable(STATUS_UNAVAILABLE, 1, 5, false)]
    #[case::busy("BOOKINGSAVAILABILITYSTATUS_BUSY", 1, 5, false)]
    #[case::starts_now(STATUS_AVAILABLE, 0, 1, false)]
    fn test_eligibility(
        #[case] status: &str,
        #[case] offset_hours: i64,
        #[case] count: i64,
        #[case] expected: bool,
    ) {
        let item = candidate(status, now() + Duration::hours(offset_hours), count);
        assert_eq!(item.is_eligible(now()), expected);
    }

    #[test]
    fn test_unparseable_start_is_not_eligible() {
        let mut item = candidate(STATUS_AVAILABLE, now() + Duration::hours(1), 1);
        item.start_date_time = ZonedDateTime {
            date_time: "2025-03-11T09:00:00".to_string(),
            time_zone: "FLE Standard Time".to_string(),
        };
        assert!(!item.is_eligible(now()));
    }

    #[test]
    fn test_naive_utc_start_is_resolved() {
        let zoned = ZonedDateTime {
            date_time: "2025-03-11T09:00:00.0000000".to_string(),
            time_zone: "UTC".to_string(),
        };
        assert_eq!(
            zoned.to_utc(),
            Some(Utc.with_ymd_and_hms(2025, 3, 11, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_status_round_trips_unknown_tags() {
        let status: SlotStatus = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(status, SlotStatus::Other("SOMETHING_NEW".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"SOMETHING_NEW\"");
        assert!(!status.is_open());
    }

    #[test]
    fn test_window_spans_two_months_from_midnight() {
        let today = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let window = ProbeWindow::starting(today, 2);
        assert_eq!(window.start.to_string(), "2025-12-31 00:00:00");
        // February clamps to its last day.
        assert_eq!(window.end.to_string(), "2026-02-28 00:00:00");
    }

    #[test]
    fn test_request_serialization() {
        let target: ProbeTarget = "svc-1:staff-a,staff-b".parse().unwrap();
        let window = ProbeWindow::starting(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), 2);
        let spec = ProbeSpec::new(&target, window, "FLE Standard Time");

        let json = serde_json::to_value(spec.to_request()).unwrap();
        assert_eq!(json["serviceId"], "svc-1");
        assert_eq!(json["staffIds"], serde_json::json!(["staff-a", "staff-b"]));
        assert_eq!(json["startDateTime"]["dateTime"], "2025-03-10T00:00:00");
        assert_eq!(json["endDateTime"]["dateTime"], "2025-05-10T00:00:00");
        assert_eq!(json["endDateTime"]["timeZone"], "FLE Standard Time");
    }

    #[rstest]
    #[case("svc", TargetParseError::MissingSeparator("svc".to_string()))]
    #[case(":a", TargetParseError::EmptyService(":a".to_string()))]
    #[case("svc: , ", TargetParseError::NoStaff("svc: ,".to_string()))]
    fn test_target_parse_errors(#[case] input: &str, #[case] expected: TargetParseError) {
        assert_eq!(input.parse::<ProbeTarget>().unwrap_err(), expected);
    }

    #[test]
    fn test_first_eligible_uses_scan_order() {
        let later = candidate(STATUS_AVAILABLE, now() + Duration::days(3), 1);
        let earlier = candidate(STATUS_SLOTS_AVAILABLE, now() + Duration::days(1), 2);
        let response = AvailabilityResponse {
            staff_availability_response: vec![
                StaffAvailability {
                    staff_id: "a".to_string(),
                    availability_items: vec![
                        candidate(STATUS_UNAVAILABLE, now() + Duration::hours(1), 0),
                        later.clone(),
                    ],
                },
                StaffAvailability {
                    staff_id: "b".to_string(),
                    availability_items: vec![earlier],
                },
            ],
        };

        assert_eq!(response.first_eligible(now()), Some(&later));
    }
}
