//! User-facing notifications.

use serde::{Deserialize, Serialize};

use crate::error::SearcherError;

pub const TOAST_TIMER_MS: u64 = 1000;
pub const DELETION_STARTED: &str = "The documents are being deleted. Check the progress by searching again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Blocks until dismissed.
    Alert { message: String },
    /// Disappears on its own after `timer_ms`.
    Toast { title: String, timer_ms: u64 },
    Warning { title: String, text: String },
    Info { message: String },
}

impl Notification {
    pub fn alert(message: &str) -> Self {
        Notification::Alert { message: message.to_string() }
    }
    pub fn info(message: &str) -> Self {
        Notification::Info { message: message.to_string() }
    }
    /// Errors the user caused get a blocking alert, the rest a warning.
    pub fn from_error(error: &SearcherError) -> Self {
        match error {
            SearcherError::NoFieldSelected | SearcherError::InvalidValue { .. } => Self::alert(&error.to_string()),
            other => Notification::Warning {
                title: "An error occurred!".to_string(),
                text: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Model,
    Datasets,
    Resources,
}

impl Resource {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Resource::Model => "update_model",
            Resource::Datasets => "update_dataset",
            Resource::Resources => "update",
        }
    }
    fn updated_title(&self) -> &'static str {
        match self {
            Resource::Model => "Model updated!",
            Resource::Datasets => "Datasets updated!",
            Resource::Resources => "Resources updated!",
        }
    }
    fn failure_text(&self) -> &'static str {
        match self {
            Resource::Model => "An error occurred during Model update!",
            Resource::Datasets => "An error occurred during Dataset update!",
            Resource::Resources => "An error occurred during resource update!",
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    status: String,
}

/// A `{"status": "success"}` payload is a toast; anything else, including an
/// unparseable body, is a warning.
pub fn resource_update_outcome(resource: Resource, body: &str) -> Notification {
    match serde_json::from_str::<StatusPayload>(body) {
        Ok(payload) if payload.status == "success" => Notification::Toast {
            title: resource.updated_title().to_string(),
            timer_ms: TOAST_TIMER_MS,
        },
        _ => Notification::Warning {
            title: "An error occurred!".to_string(),
            text: resource.failure_text().to_string(),
        },
    }
}
