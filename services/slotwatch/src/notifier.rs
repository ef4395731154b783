//! Notification fan-out.
//!
//! The notifier:
//! - Broadcasts transition events to every known subscriber
//! - Runs its own combined check on each digest tick and sends the result
//!   to digest subscribers
//!
//! Recipients are taken from a registry snapshot. A failed delivery is
//! logged and skipped; the rest of the batch still goes out and nothing is
//! retried until the next cycle.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use slotwatch_booking::ProbeError;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::message::{Notice, NoticeKind};
use crate::registry::{ChatId, Registry};
use crate::source::AvailabilitySource;
use crate::state::Transition;
use crate::transport::{OutboundMessage, Transport};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Sends availability notices to subscribers.
pub struct Notifier {
    registry: Arc<Registry>,
    source: Arc<dyn AvailabilitySource>,
    transport: Arc<dyn Transport>,
    booking_url: String,
}

impl Notifier {
    pub fn new(
        registry: Arc<Registry>,
        source: Arc<dyn AvailabilitySource>,
        transport: Arc<dyn Transport>,
        booking_url: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            source,
            transport,
            booking_url: booking_url.into(),
        }
    }

    /// Send a change notice to every known subscriber.
    pub async fn on_transition(&self, transition: &Transition) -> DeliveryReport {
        let recipients = self.registry.snapshot_known().await;
        let notice = Notice::from_transition(transition, &self.booking_url);

        let report = self.broadcast(&recipients, &notice).await;
        info!(
            from = transition.from,
            to = transition.to,
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Availability change delivered"
        );
        report
    }

    /// Run one combined check and send the digest to opted-in subscribers.
    ///
    /// The check is independent of the reconciler's state.
    pub async fn digest_once(&self) -> Result<DeliveryReport, ProbeError> {
        let check = self.source.check().await?;
        let recipients = self.registry.snapshot_digest().await;
        let notice = Notice::from_check(NoticeKind::Digest, &check, &self.booking_url);

        let report = self.broadcast(&recipients, &notice).await;
        info!(
            available = check.available,
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Digest delivered"
        );
        Ok(report)
    }

    /// Deliver transitions from the reconciler until the channel closes or
    /// shutdown is signalled.
    pub async fn run_transitions(
        &self,
        mut transitions: mpsc::Receiver<Transition>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting transition delivery");

        loop {
            tokio::select! {
                transition = transitions.recv() => {
                    let Some(transition) = transition else {
                        info!("Transition channel closed");
                        break;
                    };
                    self.on_transition(&transition).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Transition delivery shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Send a digest every `interval` until shutdown. The first digest goes
    /// out one full interval after start.
    pub async fn run_digest(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "Starting digest loop");

        let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Err(e) = self.digest_once().await {
                        error!(error = %e, "Digest check failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Digest loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn broadcast(&self, recipients: &BTreeSet<ChatId>, notice: &Notice) -> DeliveryReport {
        let message = OutboundMessage::with_keyboard(notice.render());
        let mut report = DeliveryReport {
            attempted: recipients.len(),
            ..DeliveryReport::default()
        };

        for chat in recipients {
            match self.transport.send(*chat, &message).await {
                Ok(()) => {
                    report.delivered += 1;
                    debug!(chat_id = %chat, "Notice delivered");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(chat_id = %chat, error = %e, "Failed to deliver notice");
                }
            }
        }

        report
    }
}
