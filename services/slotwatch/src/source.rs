//! Availability source interface and implementations.
//!
//! The reconciler, the digest loop, and ad-hoc checks all go through
//! [`AvailabilitySource`]. None of them share a mutable "last slot" through
//! it: each call returns a fresh [`CombinedCheck`] value.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, Utc};
use slotwatch_booking::{
    BookingClient, CombinedCheck, ProbeError, ProbeSpec, ProbeTarget, ProbeWindow, SlotCandidate,
};

use crate::config::Config;

/// Something that can run a combined availability check.
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    async fn check(&self) -> Result<CombinedCheck, ProbeError>;
}

/// Combined check against the scheduling source over HTTP.
pub struct BookingSource {
    client: BookingClient,
    targets: Vec<ProbeTarget>,
    time_zone: String,
    window_months: u32,
}

impl BookingSource {
    pub fn new(
        client: BookingClient,
        targets: Vec<ProbeTarget>,
        time_zone: impl Into<String>,
        window_months: u32,
    ) -> Self {
        Self {
            client,
            targets,
            time_zone: time_zone.into(),
            window_months,
        }
    }

    /// Build a source from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ProbeError> {
        let client = BookingClient::new(config.endpoint.clone(), config.http_timeout())?;
        Ok(Self::new(
            client,
            config.targets.clone(),
            config.time_zone.clone(),
            config.window_months,
        ))
    }

    /// Probe specs for a window starting at midnight of `today`.
    pub fn specs_for(&self, today: NaiveDate) -> Vec<ProbeSpec> {
        let window = ProbeWindow::starting(today, self.window_months);
        self.targets
            .iter()
            .map(|target| ProbeSpec::new(target, window, self.time_zone.clone()))
            .collect()
    }
}

#[async_trait]
impl AvailabilitySource for BookingSource {
    async fn check(&self) -> Result<CombinedCheck, ProbeError> {
        let specs = self.specs_for(Local::now().date_naive());
        self.client.check_all(&specs).await
    }
}

/// Scripted source for tests and local development.
///
/// Returns queued results in order; once the queue is empty every call
/// reports "unavailable".
#[derive(Default)]
pub struct MockSource {
    script: Mutex<VecDeque<Result<CombinedCheck, ProbeError>>>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful check.
    pub fn push_ok(&self, slot: Option<SlotCandidate>) {
        let check = CombinedCheck::reduce([slot], Utc::now());
        self.push(Ok(check));
    }

    /// Queue a failed check.
    pub fn push_err(&self, err: ProbeError) {
        self.push(Err(err));
    }

    pub fn push(&self, result: Result<CombinedCheck, ProbeError>) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(result);
    }

    /// Number of checks run so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvailabilitySource for MockSource {
    async fn check(&self) -> Result<CombinedCheck, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        next.unwrap_or_else(|| Ok(CombinedCheck::unavailable(Utc::now())))
    }
}
