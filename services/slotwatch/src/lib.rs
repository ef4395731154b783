//! slotwatch
//!
//! Watches an appointment scheduling source and tells chat subscribers when
//! bookable slots appear or disappear.
//!
//! ## Architecture
//!
//! - **Reconciler**: Periodic combined check; sole owner of the availability state
//! - **Notifier**: Broadcasts transitions to every subscriber and sends the
//!   periodic digest to those who opted in
//! - **Command handler**: Registers senders and answers check/status/digest commands
//! - **Registry**: Concurrent subscriber map handing out snapshots
//! - **Transport**: Chat delivery and inbound messages (Telegram, or in-memory for tests)

pub mod commands;
pub mod config;
pub mod error;
pub mod message;
pub mod notifier;
pub mod reconciler;
pub mod registry;
pub mod source;
pub mod state;
pub mod transport;

pub use commands::{Command, CommandHandler};
pub use config::{Config, LogFormat};
pub use error::{ConfigError, DeliveryError};
pub use notifier::{DeliveryReport, Notifier};
pub use reconciler::{Reconciler, ReconcilerConfig, ReconcilerPhase};
pub use registry::{ChatId, Registry, SubscriberFlags};
pub use source::{AvailabilitySource, BookingSource, MockSource};
pub use state::{AvailabilityState, Transition};
