//! Deviation alert delivery.
//!
//! When a destination leaves (or returns to) its scheduled Primary source,
//! the correlator raises a structured notification. This module owns the
//! envelope, its builder, and parallel delivery to the notifier services.

mod builder;
mod client;
mod models;

pub use builder::{MessageType, NotificationBuilder};
pub use client::{AutoDiscoveryConfig, ManualTarget, Notifier, NotifyError};
pub use models::{
    Basic, Classification, Context, Detailed, Details, Detector, Message, Notification, Origin,
    Unique,
};
