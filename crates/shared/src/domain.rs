use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Translation key of the label shown for the "no group" selection.
pub const DEFAULT_SELECTED_GROUP_LABEL_KEY: &str = "filter.all-contacts";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A persisted contact group record.
///
/// Fields the lifecycle does not understand are kept in `extra` and written back
/// untouched on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub trashed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Group {
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            trashed: false,
            extra: Map::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.trashed
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn flagged_trashed(&self) -> Self {
        Self {
            trashed: true,
            ..self.clone()
        }
    }

    pub fn restored(&self) -> Self {
        Self {
            trashed: false,
            ..self.clone()
        }
    }
}

impl From<String> for GroupId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A group that has not been persisted yet; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupDraft {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GroupDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "group", rename_all = "snake_case")]
pub enum SelectedGroup {
    /// No particular group; the UI shows every contact.
    #[default]
    Default,
    Group(Group),
}

impl SelectedGroup {
    pub fn group_id(&self) -> Option<&GroupId> {
        match self {
            Self::Default => None,
            Self::Group(group) => Some(&group.id),
        }
    }

    pub fn is(&self, id: &GroupId) -> bool {
        self.group_id() == Some(id)
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }

    pub fn label_key(&self) -> Option<&'static str> {
        match self {
            Self::Default => Some(DEFAULT_SELECTED_GROUP_LABEL_KEY),
            Self::Group(_) => None,
        }
    }
}
