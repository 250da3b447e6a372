use std::collections::HashMap;

use shared::domain::GroupId;
use tokio::task::JoinHandle;
use tracing::debug;

/// Undo timers keyed by group id; holding at most one task per group.
#[derive(Default)]
pub(crate) struct PendingDeletions {
    timers: HashMap<GroupId, JoinHandle<()>>,
}

impl PendingDeletions {
    pub(crate) fn arm(&mut self, group_id: GroupId, timer: JoinHandle<()>) {
        if let Some(previous) = self.timers.insert(group_id.clone(), timer) {
            debug!(%group_id, "replaced a stale undo timer");
            previous.abort();
        }
    }

    pub(crate) fn abort(&mut self, group_id: &GroupId) -> bool {
        match self.timers.remove(group_id) {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    /// Drops the handle of a timer that already fired, without aborting it.
    pub(crate) fn forget(&mut self, group_id: &GroupId) {
        self.timers.remove(group_id);
    }

    pub(crate) fn abort_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for PendingDeletions {
    fn drop(&mut self) {
        self.abort_all();
    }
}
