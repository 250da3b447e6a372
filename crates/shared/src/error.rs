use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{domain::GroupId, protocol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOperation {
    Create,
    Rename,
    Remove,
    CancelRemove,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("a group named {name:?} already exists")]
    AlreadyExists { name: String },
    #[error("group {id} not found")]
    NotFound { id: GroupId },
    #[error("group {id} is already pending deletion")]
    AlreadyPending { id: GroupId },
    #[error("{operation:?} failed: {message}")]
    Persistence {
        operation: GroupOperation,
        message: String,
    },
}

impl GroupError {
    pub fn persistence(operation: GroupOperation, message: impl Into<String>) -> Self {
        Self::Persistence {
            operation,
            message: message.into(),
        }
    }

    /// Translation key of the notice shown for this failure.
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::AlreadyExists { .. } => protocol::GROUP_ALREADY_EXISTS,
            Self::NotFound { .. } => protocol::GROUP_RENAMED_ERROR,
            Self::AlreadyPending { .. } => protocol::GROUP_REMOVE_PENDING,
            Self::Persistence { operation, .. } => match operation {
                GroupOperation::Create => protocol::GROUP_CREATED_ERROR,
                GroupOperation::Rename => protocol::GROUP_RENAMED_ERROR,
                GroupOperation::Remove => protocol::GROUP_REMOVED_ERROR,
                GroupOperation::CancelRemove => protocol::GROUP_REMOVE_CANCELED_ERROR,
            },
        }
    }
}
