//! Message rendering.
//!
//! The core hands over a [`Notice`] (availability flag, slot fields and the
//! framing); this module turns it into chat text.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, Utc};
use slotwatch_booking::{CombinedCheck, SlotCandidate};

use crate::state::Transition;

/// Why a notice is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Reply to an ad-hoc check.
    Manual,
    /// Broadcast after a transition.
    Change,
    /// Periodic digest.
    Digest,
}

/// Slot fields shown to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSummary {
    pub starts_at: DateTime<FixedOffset>,
    pub available_count: i64,
}

impl SlotSummary {
    /// Summarise a candidate, keeping the source's UTC offset when it has one.
    pub fn from_candidate(slot: &SlotCandidate) -> Option<Self> {
        let starts_at = DateTime::parse_from_rfc3339(&slot.start_date_time.date_time)
            .ok()
            .or_else(|| slot.starts_at().map(|at| at.fixed_offset()))?;

        Some(Self {
            starts_at,
            available_count: slot.available_count,
        })
    }

    /// e.g. "Monday, March 10, 2025".
    pub fn date(&self) -> String {
        self.starts_at.format("%A, %B %-d, %Y").to_string()
    }

    /// e.g. "09:30".
    pub fn time(&self) -> String {
        self.starts_at.format("%H:%M").to_string()
    }
}

/// Everything needed to render an availability message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub available: bool,
    pub slot: Option<SlotSummary>,
    pub booking_url: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn from_check(kind: NoticeKind, check: &CombinedCheck, booking_url: &str) -> Self {
        Self {
            kind,
            available: check.available,
            slot: check.slot.as_ref().and_then(SlotSummary::from_candidate),
            booking_url: booking_url.to_string(),
            at: check.checked_at,
        }
    }

    pub fn from_transition(transition: &Transition, booking_url: &str) -> Self {
        Self {
            kind: NoticeKind::Change,
            available: transition.to,
            slot: transition.slot.as_ref().and_then(SlotSummary::from_candidate),
            booking_url: booking_url.to_string(),
            at: transition.at,
        }
    }

    pub fn render(&self) -> String {
        let body = if self.available {
            self.render_available()
        } else {
            let at = self.at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
            match self.kind {
                NoticeKind::Change => format!("❌ Appointments are no longer available (as of {at})"),
                NoticeKind::Manual | NoticeKind::Digest => {
                    format!("❌ No appointments available (checked at {at})")
                }
            }
        };

        match self.kind {
            NoticeKind::Digest => format!("📬 Periodic status update\n\n{body}"),
            NoticeKind::Manual | NoticeKind::Change => body,
        }
    }

    fn render_available(&self) -> String {
        match &self.slot {
            Some(slot) => format!(
                "🎉 Appointments are available!\n\nNext available appointment:\nDate: {}\nTime: {}\nAvailable slots: {}\n\nBooking website: {}",
                slot.date(),
                slot.time(),
                slot.available_count,
                self.booking_url
            ),
            None => format!(
                "🎉 Appointments are available!\n\nBooking website: {}",
                self.booking_url
            ),
        }
    }
}

/// Plain-text result for one-shot mode.
pub fn render_one_shot(check: &CombinedCheck, booking_url: &str) -> String {
    if !check.available {
        return "❌ No appointments available at the moment.".to_string();
    }

    let headline = match check.slot.as_ref().and_then(SlotSummary::from_candidate) {
        Some(slot) => format!(
            "🎉 Appointments are available!\nNext available slot: {}\nAvailable count: {}",
            slot.starts_at.format("%Y-%m-%d %H:%M"),
            slot.available_count
        ),
        None => "🎉 Appointments are available!".to_string(),
    };
    format!("{headline}\n\nBooking website: {booking_url}")
}

/// Human-readable digest cadence, e.g. "30 minutes".
pub fn cadence(interval: Duration) -> String {
    let minutes = interval.as_secs() / 60;
    match minutes {
        0 => format!("{} seconds", interval.as_secs()),
        1 => "minute".to_string(),
        60 => "hour".to_string(),
        m => format!("{m} minutes"),
    }
}

pub fn help_text(digest_interval: Duration) -> String {
    format!(
        "👋 Welcome! I'll notify you when appointment availability changes.\n\n\
Available commands:\n\
🔍 Check Availability - Check current appointment availability\n\
📊 Status - Show your notification settings\n\
⏰ Enable Status Updates - Get a status update every {}\n\
⏳ Disable Status Updates - Only get notifications when availability changes",
        cadence(digest_interval)
    )
}

pub const CHECKING_TEXT: &str = "🔍 Checking appointment availability...";

pub fn digest_enabled_text(digest_interval: Duration) -> String {
    format!(
        "⏰ Status updates enabled! You'll receive availability updates every {}.",
        cadence(digest_interval)
    )
}

pub const DIGEST_DISABLED_TEXT: &str =
    "⏳ Status updates disabled. You'll only be notified when appointment availability changes.";

pub fn status_text(wants_digest: bool, digest_interval: Duration) -> String {
    if wants_digest {
        format!(
            "🟢 You will receive availability updates every {}.",
            cadence(digest_interval)
        )
    } else {
        "🔵 You will be notified only when appointment availability changes.".to_string()
    }
}

pub fn check_failed_text(err: &impl std::fmt::Display) -> String {
    format!("❌ Error checking availability: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotwatch_booking::{SlotStatus, ZonedDateTime};

    const URL: &str = "https://example.test/book";

    fn slot() -> SlotCandidate {
        SlotCandidate {
            status: SlotStatus::SlotsAvailable,
            start_date_time: ZonedDateTime {
                date_time: "2030-03-11T09:30:00+02:00".to_string(),
                time_zone: "FLE Standard Time".to_string(),
            },
            end_date_time: ZonedDateTime {
                date_time: "2030-03-11T10:00:00+02:00".to_string(),
                time_zone: "FLE Standard Time".to_string(),
            },
            available_count: 3,
        }
    }

    fn check(available: bool) -> CombinedCheck {
        CombinedCheck::reduce([available.then(slot)], Utc::now())
    }

    #[test]
    fn test_available_with_slot() {
        let text = Notice::from_check(NoticeKind::Manual, &check(true), URL).render();
        assert!(text.starts_with("🎉 Appointments are available!"));
        assert!(text.contains("Date: Monday, March 11, 2030"));
        assert!(text.contains("Time: 09:30"));
        assert!(text.contains("Available slots: 3"));
        assert!(text.ends_with(URL));
    }

    #[test]
    fn test_unavailable_framing() {
        let manual = Notice::from_check(NoticeKind::Manual, &check(false), URL).render();
        assert!(manual.starts_with("❌ No appointments available (checked at "));

        let transition = Transition {
            from: true,
            to: false,
            slot: Some(slot()),
            at: Utc::now(),
        };
        let change = Notice::from_transition(&transition, URL).render();
        assert!(change.starts_with("❌ Appointments are no longer available (as of "));
        assert!(!change.contains("Available slots"));
    }

    #[test]
    fn test_digest_is_labelled() {
        let digest = Notice::from_check(NoticeKind::Digest, &check(true), URL).render();
        assert!(digest.starts_with("📬 Periodic status update"));
        assert!(digest.contains("Available slots: 3"));
    }

    #[test]
    fn test_one_shot() {
        let text = render_one_shot(&check(true), URL);
        assert!(text.contains("Next available slot: 2030-03-11 09:30"));
        assert!(text.contains("Available count: 3"));

        assert_eq!(
            render_one_shot(&check(false), URL),
            "❌ No appointments available at the moment."
        );
    }

    #[test]
    fn test_status_text() {
        let every_half_hour = Duration::from_secs(30 * 60);
        assert_eq!(
            status_text(true, every_half_hour),
            "🟢 You will receive availability updates every 30 minutes."
        );
        assert!(status_text(false, every_half_hour).starts_with("🔵"));
    }

    #[test]
    fn test_cadence() {
        assert_eq!(cadence(Duration::from_secs(45)), "45 seconds");
        assert_eq!(cadence(Duration::from_secs(60)), "minute");
        assert_eq!(cadence(Duration::from_secs(3600)), "hour");
        assert_eq!(cadence(Duration::from_secs(1800)), "30 minutes");
    }
}
