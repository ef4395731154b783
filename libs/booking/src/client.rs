//! HTTP client for the scheduling source.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::ProbeError;
use crate::types::{AvailabilityResponse, ProbeSpec, SlotCandidate};

/// Outcome of one combined check across every configured spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedCheck {
    /// OR of the per-spec results.
    pub available: bool,

    /// Earliest eligible candidate across all specs, if any.
    pub slot: Option<SlotCandidate>,

    pub checked_at: DateTime<Utc>,
}

impl CombinedCheck {
    /// A check that found nothing.
    pub fn unavailable(checked_at: DateTime<Utc>) -> Self {
        Self {
            available: false,
            slot: None,
            checked_at,
        }
    }

    /// Reduce per-spec probe results.
    ///
    /// When several specs report a slot the one starting first wins; ties keep
    /// the earlier spec's slot.
    pub fn reduce<I>(results: I, checked_at: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = Option<SlotCandidate>>,
    {
        let mut slot: Option<SlotCandidate> = None;
        for candidate in results.into_iter().flatten() {
            let replace = match &slot {
                None => true,
                Some(current) => candidate.starts_at() < current.starts_at(),
            };
            if replace {
                slot = Some(candidate);
            }
        }

        Self {
            available: slot.is_some(),
            slot,
            checked_at,
        }
    }
}

/// Scheduling source client.
#[derive(Debug, Clone)]
pub struct BookingClient {
    client: reqwest::Client,
    endpoint: String,
}

impl BookingClient {
    /// Create a client for `endpoint`; every request is bounded by `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Probe a single spec.
    ///
    /// Returns the first eligible candidate in scan order, or `None` if no
    /// candidate qualifies.
    pub async fn probe(&self, spec: &ProbeSpec) -> Result<Option<SlotCandidate>, ProbeError> {
        self.probe_at(spec, Utc::now()).await
    }

    /// Probe a single spec, judging eligibility against `now`.
    pub async fn probe_at(
        &self,
        spec: &ProbeSpec,
        now: DateTime<Utc>,
    ) -> Result<Option<SlotCandidate>, ProbeError> {
        let started = Instant::now();
        debug!(service_id = %spec.service_id, "Probing scheduling source");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&spec.to_request())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                service_id = %spec.service_id,
                status = status.as_u16(),
                "Scheduling source returned error status"
            );
            return Err(ProbeError::BadStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: AvailabilityResponse = serde_json::from_slice(&body)?;

        let slot = parsed.first_eligible(now).cloned();
        match &slot {
            Some(found) => info!(
                service_id = %spec.service_id,
                start = %found.start_date_time.date_time,
                available_count = found.available_count,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Found available slot"
            ),
            None => debug!(
                service_id = %spec.service_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "No available slots found"
            ),
        }

        Ok(slot)
    }

    /// Run every spec in order and OR-reduce the results.
    ///
    /// The first failing probe fails the whole check.
    pub async fn check_all(&self, specs: &[ProbeSpec]) -> Result<CombinedCheck, ProbeError> {
        let started = Instant::now();
        let now = Utc::now();

        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            results.push(self.probe_at(spec, now).await?);
        }

        let check = CombinedCheck::reduce(results, now);
        debug!(
            spec_count = specs.len(),
            available = check.available,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Combined check complete"
        );
        Ok(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SlotStatus, ZonedDateTime};
    use chrono::TimeZone;

    fn slot_at(hour: u32) -> SlotCandidate {
        let at = Utc.with_ymd_and_hms(2025, 3, 12, hour, 0, 0).unwrap();
        SlotCandidate {
            status: SlotStatus::Available,
            start_date_time: ZonedDateTime {
                date_time: at.to_rfc3339(),
                time_zone: "UTC".to_string(),
            },
            end_date_time: ZonedDateTime {
                date_time: at.to_rfc3339(),
                time_zone: "UTC".to_string(),
            },
            available_count: 1,
        }
    }

    #[test]
    fn test_reduce_nothing_found() {
        let now = Utc::now();
        let check = CombinedCheck::reduce([None, None], now);
        assert!(!check.available);
        assert!(check.slot.is_none());
        assert_eq!(check.checked_at, now);
    }

    #[test]
    fn test_reduce_second_spec_only() {
        let check = CombinedCheck::reduce([None, Some(slot_at(9))], Utc::now());
        assert!(check.available);
        assert_eq!(check.slot, Some(slot_at(9)));
    }

    #[test]
    fn test_reduce_picks_earliest() {
        let check = CombinedCheck::reduce([Some(slot_at(14)), Some(slot_at(9))], Utc::now());
        assert_eq!(check.slot, Some(slot_at(9)));
    }

    #[test]
    fn test_reduce_no_specs() {
        let check = CombinedCheck::reduce(Vec::new(), Utc::now());
        assert_eq!(check, CombinedCheck::unavailable(check.checked_at));
    }
}
