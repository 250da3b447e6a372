use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use shared::{
    domain::{Group, GroupDraft, GroupId, SelectedGroup},
    error::{GroupError, GroupOperation},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    machine::{Effect, Event, GroupMachine, Outcome, StoreCall, Transition},
    menu::GroupsMenuState,
    pending::PendingDeletions,
    selection::SelectionCoordinator,
    GroupEvent, GroupStore,
};

pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_millis(3_000);
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub undo_window: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            undo_window: DEFAULT_UNDO_WINDOW,
        }
    }
}

struct LifecycleState {
    machine: GroupMachine,
    undo_timers: PendingDeletions,
    menu: GroupsMenuState,
}

/// Runs group intents against a [`GroupStore`].
///
/// Transitions and their synchronous effects (timers, selection, notices) are
/// applied under one lock, so observers never see a trashed group that is still
/// selected or a notice without its timer. Store calls run outside the lock and
/// only suspend the intent that issued them.
pub struct GroupLifecycle {
    store: Arc<dyn GroupStore>,
    selection: Arc<SelectionCoordinator>,
    config: LifecycleConfig,
    state: Mutex<LifecycleState>,
    events: broadcast::Sender<GroupEvent>,
}

impl GroupLifecycle {
    pub fn new(
        store: Arc<dyn GroupStore>,
        selection: Arc<SelectionCoordinator>,
        config: LifecycleConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            store,
            selection,
            config,
            state: Mutex::new(LifecycleState {
                machine: GroupMachine::new(config.undo_window),
                undo_timers: PendingDeletions::default(),
                menu: GroupsMenuState::default(),
            }),
            events,
        })
    }

    pub fn config(&self) -> LifecycleConfig {
        self.config
    }

    pub fn selection(&self) -> &Arc<SelectionCoordinator> {
        &self.selection
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<GroupEvent> {
        self.events.subscribe()
    }

    pub async fn create_group(
        self: &Arc<Self>,
        all_groups: &[Group],
        draft: GroupDraft,
    ) -> Result<Group, GroupError> {
        let outcome = self
            .drive(Event::CreateRequested { all_groups, draft })
            .await;
        into_result(outcome, GroupOperation::Create)
    }

    pub async fn rename_group(
        self: &Arc<Self>,
        all_groups: &[Group],
        id: &GroupId,
        new_name: impl Into<String>,
    ) -> Result<Group, GroupError> {
        let outcome = self
            .drive(Event::RenameRequested {
                all_groups,
                id,
                new_name: new_name.into(),
            })
            .await;
        into_result(outcome, GroupOperation::Rename)
    }

    /// Flags `group` trashed and starts its undo window.
    ///
    /// Returns the flagged record. If the deletion was cancelled while the trash
    /// update was in flight, returns the restored record instead.
    pub async fn delete_group(self: &Arc<Self>, group: &Group) -> Result<Group, GroupError> {
        let selected = self.selection.selected_group();
        let outcome = self
            .drive(Event::DeleteRequested {
                group,
                selected: &selected,
            })
            .await;
        into_result(outcome, GroupOperation::Remove)
    }

    /// Restores a group whose undo window is still open.
    ///
    /// Returns `Ok(None)` when there was nothing to restore, or when the trash
    /// update is still in flight; in that case the deleting intent restores the
    /// group as soon as the update lands.
    pub async fn cancel_delete(
        self: &Arc<Self>,
        group: &Group,
    ) -> Result<Option<Group>, GroupError> {
        match self.drive(Event::CancelDeleteRequested { group }).await {
            Outcome::Done(restored) => Ok(Some(restored)),
            Outcome::Failed(err) => Err(err),
            Outcome::Ignored => {
                debug!(group_id = %group.id, "no undo window to cancel");
                Ok(None)
            }
        }
    }

    pub async fn menu(&self) -> GroupsMenuState {
        self.state.lock().await.menu.clone()
    }

    pub async fn toggle_menu(&self) {
        self.state.lock().await.menu.toggle_menu();
    }

    /// Opens the menu with `id` in inline edit mode. A completed rename of `id`
    /// ends the edit.
    pub async fn edit_group(&self, id: GroupId) {
        let mut state = self.state.lock().await;
        state.menu.force_menu_open();
        state.menu.set_edited_group(id);
    }

    pub async fn is_pending_deletion(&self, id: &GroupId) -> bool {
        self.state.lock().await.machine.pending_phase(id).is_some()
    }

    pub async fn pending_deletions(&self) -> Vec<GroupId> {
        let state = self.state.lock().await;
        let mut ids: Vec<GroupId> = state.machine.pending_ids().cloned().collect();
        ids.sort();
        ids
    }

    /// Session teardown: drops every undo window without sweeping and resets the
    /// selection. Groups already trashed stay trashed for the next sweep, as do
    /// groups whose trash update lands after this call.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let dropped = state.undo_timers.len();
        state.undo_timers.abort_all();
        state.machine.shut_down();
        state.menu = GroupsMenuState::default();
        self.selection.reset();
        info!(dropped, "group lifecycle shut down");
    }

    async fn drive(self: &Arc<Self>, event: Event<'_>) -> Outcome {
        let step = self.apply(event).await;
        if step.deferred.is_none() {
            return step.outcome.unwrap_or(Outcome::Ignored);
        }
        // Store calls and their feedback run on their own task, so a dropped
        // intent still lands its transition.
        let lifecycle = Arc::clone(self);
        match tokio::spawn(async move { lifecycle.finish(step).await }).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "group store task ended without a result");
                Outcome::Ignored
            }
        }
    }

    async fn finish(self: Arc<Self>, mut step: Step) -> Outcome {
        loop {
            match step.deferred {
                Some(Effect::Persist(call)) => {
                    let result = self.persist(&call).await;
                    step = self.apply(Event::Persisted { call, result }).await;
                }
                Some(Effect::Sweep) => {
                    self.sweep().await;
                    return step.outcome.unwrap_or(Outcome::Ignored);
                }
                _ => return step.outcome.unwrap_or(Outcome::Ignored),
            }
        }
    }

    async fn apply(self: &Arc<Self>, event: Event<'_>) -> Step {
        let mut state = self.state.lock().await;
        let Transition { effects, outcome } = state.machine.transition(event);
        let mut deferred = None;
        for effect in effects {
            if effect.is_async() {
                deferred = Some(effect);
                continue;
            }
            self.perform(&mut state, effect);
        }
        Step { deferred, outcome }
    }

    fn perform(self: &Arc<Self>, state: &mut LifecycleState, effect: Effect) {
        match effect {
            Effect::Notify(notice) => {
                debug!(key = %notice.key, level = ?notice.level, "group notice");
                let _ = self.events.send(GroupEvent::Notice(notice));
            }
            Effect::GroupCreated(group) => {
                let _ = self.events.send(GroupEvent::Created(group));
            }
            Effect::RefreshSelection(group) => {
                if self.selection.refresh_selected_group(&group) {
                    debug!(group_id = %group.id, "selected group refreshed after rename");
                }
            }
            Effect::FinishEditing { group_id } => {
                if state.menu.is_edited(&group_id) {
                    state.menu.finish_editing();
                }
            }
            Effect::Deselect {
                group_id,
                was_selected,
            } => {
                if was_selected {
                    self.selection.set_selected_group(SelectedGroup::Default);
                } else {
                    self.selection.deselect(&group_id);
                }
            }
            Effect::ArmUndoTimer { group_id } => {
                let timer = self.spawn_undo_timer(group_id.clone());
                state.undo_timers.arm(group_id.clone(), timer);
                info!(
                    %group_id,
                    window_ms = u64::try_from(self.config.undo_window.as_millis())
                        .unwrap_or(u64::MAX),
                    "undo window opened"
                );
            }
            Effect::AbortUndoTimer { group_id } => {
                if state.undo_timers.abort(&group_id) {
                    info!(%group_id, "undo window cancelled");
                }
            }
            Effect::ForgetUndoTimer { group_id } => state.undo_timers.forget(&group_id),
            Effect::Persist(_) | Effect::Sweep => {
                warn!("suspending effect reached the synchronous executor");
            }
        }
    }

    fn spawn_undo_timer(self: &Arc<Self>, group_id: GroupId) -> tokio::task::JoinHandle<()> {
        let lifecycle: Weak<Self> = Arc::downgrade(self);
        let window = self.config.undo_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let Some(lifecycle) = lifecycle.upgrade() else {
                return;
            };
            info!(%group_id, "undo window elapsed");
            lifecycle
                .drive(Event::UndoWindowElapsed { group_id })
                .await;
        })
    }

    async fn persist(&self, call: &StoreCall) -> Result<Group, String> {
        let result = match call {
            StoreCall::Create(draft) => self.store.create(draft).await,
            StoreCall::Rename(group)
            | StoreCall::Trash { group, .. }
            | StoreCall::Restore(group) => self.store.update(group).await,
        };
        let operation = call.operation();
        match result {
            Ok(group) => {
                info!(?operation, group_id = %group.id, "group persisted");
                Ok(group)
            }
            Err(err) => {
                warn!(?operation, error = %format!("{err:#}"), "group store call failed");
                Err(format!("{err:#}"))
            }
        }
    }

    async fn sweep(&self) {
        match self.store.clean_trashed_groups().await {
            Ok(()) => {
                info!("trashed groups swept");
                let _ = self.events.send(GroupEvent::Swept);
            }
            Err(err) => error!(error = %format!("{err:#}"), "failed to sweep trashed groups"),
        }
    }
}

struct Step {
    deferred: Option<Effect>,
    outcome: Option<Outcome>,
}

fn into_result(outcome: Outcome, operation: GroupOperation) -> Result<Group, GroupError> {
    match outcome {
        Outcome::Done(group) => Ok(group),
        Outcome::Failed(err) => Err(err),
        Outcome::Ignored => Err(GroupError::persistence(
            operation,
            "request ended without a store result",
        )),
    }
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
