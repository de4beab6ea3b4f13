//! AccessPulse event bus and notification infrastructure.
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`] — the canonical domain event envelope.
//! - [`EventPersistence`] — background service that durably writes every
//!   event to the `events` table.
//! - [`NotificationDispatcher`] — background service that emails completion
//!   reports and nullifies stored recipient addresses afterwards.
//! - [`delivery`] — the SMTP delivery channel.

pub mod bus;
pub mod delivery;
pub mod notifier;
pub mod persistence;

pub use bus::{EventBus, PlatformEvent};
pub use delivery::email::{EmailConfig, EmailDelivery};
pub use notifier::NotificationDispatcher;
pub use persistence::EventPersistence;
