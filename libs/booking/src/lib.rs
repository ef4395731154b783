//! # slotwatch-booking
//!
//! Client for the appointment scheduling source.
//!
//! ## Overview
//!
//! A probe asks the scheduling source for the availability of one service
//! across one or more staff members within a time window. The raw response
//! is reduced to "is there a future open slot" plus the first qualifying
//! slot found.
//!
//! ```text
//! ProbeSpec ──▶ AvailabilityRequest ──POST──▶ scheduling source
//!                                                  │
//!     Option<SlotCandidate> ◀── eligibility scan ◀─┘
//! ```
//!
//! A combined check runs every configured spec and OR-reduces the results.
//! Any single probe failure fails the whole check; a failed check carries no
//! information about availability.

mod client;
mod error;
mod types;

pub use client::{BookingClient, CombinedCheck};
pub use error::ProbeError;
pub use types::*;
