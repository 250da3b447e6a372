//! Open/closed state of the groups menu and which group is being edited inline.

use shared::domain::GroupId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupsMenuState {
    pub menu_open: bool,
    pub edited_group_id: Option<GroupId>,
}

impl GroupsMenuState {
    pub fn toggle_menu(&mut self) {
        self.menu_open = !self.menu_open;
        if !self.menu_open {
            self.edited_group_id = None;
        }
    }

    pub fn force_menu_open(&mut self) {
        self.menu_open = true;
    }

    /// Starts inline editing of `id`; only one group is edited at a time.
    pub fn set_edited_group(&mut self, id: GroupId) {
        self.edited_group_id = Some(id);
    }

    pub fn finish_editing(&mut self) -> Option<GroupId> {
        self.edited_group_id.take()
    }

    pub fn is_edited(&self, id: &GroupId) -> bool {
        self.edited_group_id.as_ref() == Some(id)
    }
}
