//! Notification construction.

use uuid::Uuid;

use super::models::{
    Basic, Classification, Context, Detailed, Details, Detector, Message, Notification, Origin,
    Unique,
};

/// Which route-validation transition a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// A destination left its scheduled Primary source.
    RouteValidationError,
    /// A destination returned to its scheduled Primary source.
    RouteValidationCorrection,
}

impl MessageType {
    fn context_type(&self) -> &'static str {
        match self {
            MessageType::RouteValidationError => "Event - Status Changed",
            MessageType::RouteValidationCorrection => "Event - Status Reverted",
        }
    }
}

// Static envelope defaults; only the message, context details, and context
// types vary between notifications.
const DEFAULT_EXPIRY_SECONDS: i32 = -1;
const DEFAULT_SEVERITY: &str = "critical";
const DEFAULT_PRIORITY: u8 = 1;
const DEFAULT_CATEGORY: &str = "category-3";
const DEFAULT_CATEGORY_LABEL: &str = "Routing & Signal Health";
const DEFAULT_DETECTOR_APP: &str = "routewatch";
const DEFAULT_VERSION: &str = "2.0";

/// Chainable constructor for [`Notification`] values.
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    n: Notification,
}

impl NotificationBuilder {
    /// Start a builder with the static defaults and a fresh unique id.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            n: Notification {
                message: Message::default(),
                unique: Unique {
                    uid: Uuid::new_v4().to_string(),
                    expiry: DEFAULT_EXPIRY_SECONDS,
                },
                classification: Classification {
                    severity: DEFAULT_SEVERITY.to_string(),
                    priority: DEFAULT_PRIORITY,
                    category: DEFAULT_CATEGORY.to_string(),
                    category_label: DEFAULT_CATEGORY_LABEL.to_string(),
                },
                origin: Origin {
                    detector: Detector {
                        host: host.into(),
                        app: DEFAULT_DETECTOR_APP.to_string(),
                    },
                },
                context: Context::default(),
                version: DEFAULT_VERSION.to_string(),
            },
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.n.message.body = body.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.n.message.summary = summary.into();
        self
    }

    /// Set the fixed body and summary for a transition type.
    pub fn with_message_by_type(mut self, message_type: MessageType) -> Self {
        match message_type {
            MessageType::RouteValidationError => {
                self.n.message.body =
                    "Route validation transition status from primary to another status".to_string();
                self.n.message.summary =
                    "[Route Validation Error] Route validation transition from Primary".to_string();
            }
            MessageType::RouteValidationCorrection => {
                self.n.message.body =
                    "Route validation transition status to primary from another status".to_string();
                self.n.message.summary =
                    "[Route Validation Correction] Route validation transition to Primary"
                        .to_string();
            }
        }

        self
    }

    /// Append a basic context entry (with its detailed mirror) for a
    /// transition type.
    pub fn add_details(mut self, message_type: MessageType, details: Details) -> Self {
        let kind = message_type.context_type().to_string();

        self.n.context.basic.push(Basic {
            kind: kind.clone(),
            details,
        });
        self.n.context.detailed.push(Detailed { kind });

        self
    }

    pub fn build(self) -> Notification {
        self.n
    }
}
