//! The group currently focused by the surrounding UI.

use shared::domain::{Group, GroupId, SelectedGroup};
use tokio::sync::watch;
use tracing::debug;

/// Sole writer of the selected group. Everything else reads it or subscribes.
pub struct SelectionCoordinator {
    selected: watch::Sender<SelectedGroup>,
}

impl Default for SelectionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionCoordinator {
    pub fn new() -> Self {
        Self::with_selection(SelectedGroup::Default)
    }

    pub fn with_selection(selection: SelectedGroup) -> Self {
        let (selected, _) = watch::channel(selection);
        Self { selected }
    }

    pub fn selected_group(&self) -> SelectedGroup {
        self.selected.borrow().clone()
    }

    pub fn set_selected_group(&self, selection: SelectedGroup) {
        debug!(group_id = ?selection.group_id(), "selection changed");
        self.selected.send_replace(selection);
    }

    pub fn is_selected(&self, id: &GroupId) -> bool {
        self.selected.borrow().is(id)
    }

    /// Swaps in a fresher record of the selected group. Returns false, leaving the
    /// selection untouched, when `group` is not the one selected.
    pub fn refresh_selected_group(&self, group: &Group) -> bool {
        self.selected.send_if_modified(|selected| {
            if selected.is(&group.id) {
                *selected = SelectedGroup::Group(group.clone());
                true
            } else {
                false
            }
        })
    }

    /// Falls back to the default selection if `id` is selected.
    pub fn deselect(&self, id: &GroupId) -> bool {
        let changed = self.selected.send_if_modified(|selected| {
            if selected.is(id) {
                *selected = SelectedGroup::Default;
                true
            } else {
                false
            }
        });
        if changed {
            debug!(group_id = %id, "selection reset to default");
        }
        changed
    }

    /// Session teardown.
    pub fn reset(&self) {
        self.set_selected_group(SelectedGroup::Default);
    }

    pub fn subscribe(&self) -> watch::Receiver<SelectedGroup> {
        self.selected.subscribe()
    }
}
