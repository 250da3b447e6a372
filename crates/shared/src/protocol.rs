use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::domain::Group;

pub const GROUP_ALREADY_EXISTS: &str = "groups.already_exists";
pub const GROUP_CREATED_SUCCESS: &str = "groups.created.success";
pub const GROUP_CREATED_ERROR: &str = "groups.created.error";
pub const GROUP_RENAMED_SUCCESS: &str = "groups.renamed.success";
pub const GROUP_RENAMED_ERROR: &str = "groups.renamed.error";
pub const GROUP_REMOVED: &str = "groups.removed";
pub const GROUP_REMOVED_ERROR: &str = "groups.removed.error";
pub const GROUP_REMOVE_PENDING: &str = "groups.removed.pending";
pub const GROUP_REMOVE_CANCELED: &str = "groups.remove_canceled";
pub const GROUP_REMOVE_CANCELED_ERROR: &str = "groups.remove_canceled.error";
pub const CANCEL_BUTTON: &str = "cancel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

/// Something the UI can offer next to a notice. Dispatching it is up to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum NoticeAction {
    CancelDelete { group: Group },
}

impl NoticeAction {
    pub fn button_label_key(&self) -> &'static str {
        match self {
            Self::CancelDelete { .. } => CANCEL_BUTTON,
        }
    }
}

/// A user-facing message, identified by a translation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub key: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<NoticeAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Notice {
    fn new(level: NoticeLevel, key: impl Into<String>) -> Self {
        Self {
            level,
            key: key.into(),
            params: BTreeMap::new(),
            action: None,
            duration_ms: None,
        }
    }

    pub fn success(key: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, key)
    }

    pub fn error(key: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, key)
    }

    pub fn info(key: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, key)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.params.insert("name".to_string(), name.into());
        self
    }

    pub fn with_action(mut self, action: NoticeAction, duration: Duration) -> Self {
        self.action = Some(action);
        self.duration_ms = Some(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.params.get("name").map(String::as_str)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }
}
