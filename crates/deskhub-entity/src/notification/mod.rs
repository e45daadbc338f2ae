//! Notification domain entities.

pub mod model;

pub use model::{NewNotification, Notification, NotificationRecipient};
