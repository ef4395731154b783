//! Periodic availability reconciliation.
//!
//! The reconciler:
//! - Runs a combined check on a fixed interval
//! - Folds each successful result into the authoritative [`AvailabilityState`]
//! - Emits a [`Transition`] to the notifier when the flag flips
//!
//! It owns the state outright and runs on a single task, so two checks can
//! never overlap. Ticks that come due while a check is still running are
//! dropped, not queued.

use std::sync::Arc;
use std::time::Duration;

use slotwatch_booking::ProbeError;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::source::AvailabilitySource;
use crate::state::{AvailabilityState, Transition};

/// Failures in a row before logging escalates to error.
const FAILURE_ESCALATION_THRESHOLD: u32 = 3;

/// Reconciliation loop configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Interval between checks.
    pub check_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerPhase {
    Idle,
    Checking,
}

/// Owner of the availability state.
pub struct Reconciler {
    source: Arc<dyn AvailabilitySource>,
    state: AvailabilityState,
    phase: ReconcilerPhase,
    transitions: mpsc::Sender<Transition>,
    config: ReconcilerConfig,

    /// Checks attempted since start.
    checks: u64,
    consecutive_failures: u32,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn AvailabilitySource>,
        transitions: mpsc::Sender<Transition>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            source,
            state: AvailabilityState::default(),
            phase: ReconcilerPhase::Idle,
            transitions,
            config,
            checks: 0,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self) -> &AvailabilityState {
        &self.state
    }

    pub fn phase(&self) -> ReconcilerPhase {
        self.phase
    }

    pub fn checks(&self) -> u64 {
        self.checks
    }

    /// Run checks until shutdown. The first check runs immediately.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            check_interval_secs = self.config.check_interval.as_secs(),
            "Starting reconciliation loop"
        );

        let mut interval = tokio::time::interval(self.config.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Errors are logged inside tick.
                    let _ = self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(checks = self.checks, "Reconciler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run one check and apply it.
    ///
    /// On failure the state is left untouched and no transition is emitted.
    pub async fn tick(&mut self) -> Result<Option<Transition>, ProbeError> {
        self.phase = ReconcilerPhase::Checking;
        self.checks += 1;
        let check_number = self.checks;

        info!(check_number, "Running availability check");
        let result = self.source.check().await;
        self.phase = ReconcilerPhase::Idle;

        let check = match result {
            Ok(check) => check,
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= FAILURE_ESCALATION_THRESHOLD {
                    error!(
                        check_number,
                        error = %e,
                        consecutive_failures = self.consecutive_failures,
                        "Availability check failed repeatedly"
                    );
                } else {
                    warn!(
                        check_number,
                        error = %e,
                        consecutive_failures = self.consecutive_failures,
                        "Availability check failed, will retry"
                    );
                }
                return Err(e);
            }
        };

        if self.consecutive_failures > 0 {
            info!(
                previous_failures = self.consecutive_failures,
                "Availability check recovered"
            );
            self.consecutive_failures = 0;
        }

        let Some(transition) = self.state.apply(&check) else {
            debug!(
                check_number,
                available = check.available,
                "Availability unchanged"
            );
            return Ok(None);
        };

        info!(
            check_number,
            from = transition.from,
            to = transition.to,
            "Availability changed"
        );
        if self.transitions.send(transition.clone()).await.is_err() {
            warn!("Transition receiver dropped; change will not be delivered");
        }

        Ok(Some(transition))
    }
}
