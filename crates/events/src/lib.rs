//! Session events and user notifications.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub for [`SessionEvent`]s,
//!   backed by `tokio::sync::broadcast`. UIs observe login state through it.
//! - [`Notifier`] -- the presentation-layer contract, with a tracing-backed
//!   default and a webhook implementation in [`delivery`].
//! - [`NotificationDispatcher`] -- turns newly stored access entries into one
//!   notification each.

pub mod bus;
pub mod delivery;
pub mod dispatcher;
pub mod notifier;

pub use bus::{AgentEvent, EventBus, SessionEvent};
pub use delivery::webhook::{WebhookDelivery, WebhookNotifier};
pub use dispatcher::NotificationDispatcher;
pub use notifier::{Notification, Notifier, NotifyError, TracingNotifier};
