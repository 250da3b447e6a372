//! Name collision checks run before any group mutation.

use shared::domain::{Group, GroupId};

/// True when an active group already uses exactly `candidate_name`.
///
/// Trashed groups never collide: their names are free again as soon as they are
/// flagged, even before the sweep purges them.
pub fn is_existing_group<'a>(
    groups: impl IntoIterator<Item = &'a Group>,
    candidate_name: &str,
) -> bool {
    groups
        .into_iter()
        .any(|group| group.is_active() && group.name == candidate_name)
}

/// Same check as [`is_existing_group`], ignoring the group being renamed.
pub fn is_name_taken_by_other(all_groups: &[Group], id: &GroupId, candidate_name: &str) -> bool {
    is_existing_group(
        all_groups.iter().filter(|group| &group.id != id),
        candidate_name,
    )
}
