use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{Group, GroupDraft},
    protocol::Notice,
};
use storage::Storage;

pub mod lifecycle;
pub mod machine;
pub mod menu;
mod pending;
pub mod selection;
pub mod validator;

pub use lifecycle::{GroupLifecycle, LifecycleConfig, DEFAULT_UNDO_WINDOW};
pub use menu::GroupsMenuState;
pub use selection::SelectionCoordinator;

/// Persistence of group records, as seen by the lifecycle.
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn create(&self, draft: &GroupDraft) -> Result<Group>;
    /// Full replacement of the group's mutable fields.
    async fn update(&self, group: &Group) -> Result<Group>;
    /// Purges every trashed group, not only the one whose undo window elapsed.
    async fn clean_trashed_groups(&self) -> Result<()>;
    async fn list_groups(&self) -> Result<Vec<Group>>;
}

pub struct MissingGroupStore;

#[async_trait]
impl GroupStore for MissingGroupStore {
    async fn create(&self, draft: &GroupDraft) -> Result<Group> {
        Err(anyhow!(
            "group store unavailable; cannot create '{}'",
            draft.name
        ))
    }

    async fn update(&self, group: &Group) -> Result<Group> {
        Err(anyhow!(
            "group store unavailable; cannot update group {}",
            group.id
        ))
    }

    async fn clean_trashed_groups(&self) -> Result<()> {
        Err(anyhow!("group store unavailable; cannot sweep trashed groups"))
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        Err(anyhow!("group store unavailable; cannot list groups"))
    }
}

#[async_trait]
impl GroupStore for Storage {
    async fn create(&self, draft: &GroupDraft) -> Result<Group> {
        self.create_group(draft).await
    }

    async fn update(&self, group: &Group) -> Result<Group> {
        self.update_group(group).await
    }

    async fn clean_trashed_groups(&self) -> Result<()> {
        let purged = Storage::clean_trashed_groups(self).await?;
        tracing::debug!(purged, "purged trashed groups");
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        Storage::list_groups(self).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupEvent {
    Notice(Notice),
    /// A group was persisted by a create intent.
    Created(Group),
    /// The trash sweep ran; trashed groups are gone from the store.
    Swept,
}
