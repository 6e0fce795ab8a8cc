//! Notification envelope sent to the notifier services.

use serde::{Deserialize, Serialize};

/// One notification as posted to `/api/-/notify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub message: Message,
    pub unique: Unique,
    pub classification: Classification,
    pub origin: Origin,
    pub context: Context,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub body: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unique {
    pub uid: String,
    pub expiry: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub severity: String,
    pub priority: u8,
    pub category: String,
    pub category_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Origin {
    pub detector: Detector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detector {
    pub host: String,
    pub app: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    pub basic: Vec<Basic>,
    pub detailed: Vec<Detailed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basic {
    #[serde(rename = "type")]
    pub kind: String,
    pub details: Details,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detailed {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Transition context carried in the basic block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Details {
    pub status: String,
    pub end: String,
    pub trigger: String,
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub source: String,
    pub busname: String,
    pub start: String,
}
