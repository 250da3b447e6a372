//! Group lifecycle transitions, free of I/O.
//!
//! [`GroupMachine::transition`] consumes one [`Event`] and answers with the
//! [`Effect`]s to perform. User intents and store outcomes are both events, so an
//! intent that needs the store is two transitions: the request, which ends in a
//! [`Effect::Persist`], and the matching [`Event::Persisted`].

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use shared::{
    domain::{Group, GroupDraft, GroupId, SelectedGroup},
    error::{GroupError, GroupOperation},
    protocol::{self, Notice, NoticeAction},
};

use crate::validator::{is_existing_group, is_name_taken_by_other};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Create(GroupDraft),
    Rename(Group),
    Trash { group: Group, was_selected: bool },
    Restore(Group),
}

impl StoreCall {
    pub fn operation(&self) -> GroupOperation {
        match self {
            Self::Create(_) => GroupOperation::Create,
            Self::Rename(_) => GroupOperation::Rename,
            Self::Trash { .. } => GroupOperation::Remove,
            Self::Restore(_) => GroupOperation::CancelRemove,
        }
    }
}

#[derive(Debug)]
pub enum Event<'a> {
    CreateRequested {
        all_groups: &'a [Group],
        draft: GroupDraft,
    },
    RenameRequested {
        all_groups: &'a [Group],
        id: &'a GroupId,
        new_name: String,
    },
    DeleteRequested {
        group: &'a Group,
        selected: &'a SelectedGroup,
    },
    CancelDeleteRequested {
        group: &'a Group,
    },
    Persisted {
        call: StoreCall,
        result: Result<Group, String>,
    },
    UndoWindowElapsed {
        group_id: GroupId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify(Notice),
    GroupCreated(Group),
    RefreshSelection(Group),
    FinishEditing { group_id: GroupId },
    Deselect { group_id: GroupId, was_selected: bool },
    ArmUndoTimer { group_id: GroupId },
    AbortUndoTimer { group_id: GroupId },
    ForgetUndoTimer { group_id: GroupId },
    /// Ends the transition; the runner feeds the result back as [`Event::Persisted`].
    Persist(StoreCall),
    Sweep,
}

impl Effect {
    /// Effects that suspend. A transition emits at most one, always last.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Persist(_) | Self::Sweep)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done(Group),
    Failed(GroupError),
    /// Nothing to do, or the work continues under another intent.
    Ignored,
}

#[derive(Debug, Default, PartialEq)]
pub struct Transition {
    pub effects: Vec<Effect>,
    pub outcome: Option<Outcome>,
}

impl Transition {
    fn pending(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            outcome: None,
        }
    }

    fn finished(effects: Vec<Effect>, outcome: Outcome) -> Self {
        Self {
            effects,
            outcome: Some(outcome),
        }
    }

    fn rejected(error: GroupError, notice: Notice) -> Self {
        Self::finished(vec![Effect::Notify(notice)], Outcome::Failed(error))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPhase {
    /// The trash update is in flight.
    Trashing { cancel_requested: bool },
    /// Trashed, undo timer running.
    Armed,
    /// The restore update is in flight.
    Restoring,
}

#[derive(Debug)]
struct PendingDeletion {
    phase: PendingPhase,
    /// Last trashed record seen for the group; restores are built from it.
    record: Group,
}

#[derive(Debug)]
pub struct GroupMachine {
    undo_window: Duration,
    pending: HashMap<GroupId, PendingDeletion>,
    /// Names claimed by create or rename calls still in flight.
    names_in_flight: HashSet<String>,
    /// Active names written by this machine, newer than any caller snapshot.
    written_names: HashMap<GroupId, String>,
    shut_down: bool,
}

impl GroupMachine {
    pub fn new(undo_window: Duration) -> Self {
        Self {
            undo_window,
            pending: HashMap::new(),
            names_in_flight: HashSet::new(),
            written_names: HashMap::new(),
            shut_down: false,
        }
    }

    pub fn undo_window(&self) -> Duration {
        self.undo_window
    }

    pub fn pending_phase(&self, id: &GroupId) -> Option<PendingPhase> {
        self.pending.get(id).map(|pending| pending.phase)
    }

    pub fn pending_ids(&self) -> impl Iterator<Item = &GroupId> {
        self.pending.keys()
    }

    /// Drops every pending deletion. Trash updates that land afterwards leave
    /// the group trashed without an undo window.
    pub fn shut_down(&mut self) {
        self.pending.clear();
        self.shut_down = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn transition(&mut self, event: Event<'_>) -> Transition {
        match event {
            Event::CreateRequested { all_groups, draft } => {
                self.create_requested(all_groups, draft)
            }
            Event::RenameRequested {
                all_groups,
                id,
                new_name,
            } => self.rename_requested(all_groups, id, new_name),
            Event::DeleteRequested { group, selected } => self.delete_requested(group, selected),
            Event::CancelDeleteRequested { group } => self.cancel_requested(group),
            Event::Persisted { call, result } => self.persisted(call, result),
            Event::UndoWindowElapsed { group_id } => self.undo_window_elapsed(group_id),
        }
    }

    fn create_requested(&mut self, all_groups: &[Group], draft: GroupDraft) -> Transition {
        if is_existing_group(all_groups, &draft.name) || self.is_name_claimed(None, &draft.name) {
            let notice = Notice::error(protocol::GROUP_ALREADY_EXISTS).with_name(&draft.name);
            return Transition::rejected(GroupError::AlreadyExists { name: draft.name }, notice);
        }
        self.names_in_flight.insert(draft.name.clone());
        Transition::pending(vec![Effect::Persist(StoreCall::Create(draft))])
    }

    fn rename_requested(
        &mut self,
        all_groups: &[Group],
        id: &GroupId,
        new_name: String,
    ) -> Transition {
        let Some(group) = all_groups.iter().find(|group| &group.id == id) else {
            return Transition::rejected(
                GroupError::NotFound { id: id.clone() },
                Notice::error(protocol::GROUP_RENAMED_ERROR).with_name(new_name),
            );
        };
        if is_name_taken_by_other(all_groups, id, &new_name)
            || self.is_name_claimed(Some(id), &new_name)
        {
            let notice = Notice::error(protocol::GROUP_ALREADY_EXISTS).with_name(&new_name);
            return Transition::rejected(GroupError::AlreadyExists { name: new_name }, notice);
        }
        self.names_in_flight.insert(new_name.clone());
        Transition::pending(vec![Effect::Persist(StoreCall::Rename(
            group.renamed(new_name),
        ))])
    }

    /// Whether `name` is taken by an in-flight call or by a group this machine
    /// wrote, other than `except`.
    fn is_name_claimed(&self, except: Option<&GroupId>, name: &str) -> bool {
        self.names_in_flight.contains(name)
            || self
                .written_names
                .iter()
                .any(|(id, written)| written == name && Some(id) != except)
    }

    fn delete_requested(&mut self, group: &Group, selected: &SelectedGroup) -> Transition {
        if self.pending.contains_key(&group.id) {
            return Transition::rejected(
                GroupError::AlreadyPending {
                    id: group.id.clone(),
                },
                Notice::error(protocol::GROUP_REMOVE_PENDING).with_name(&group.name),
            );
        }
        // Captured before the store call so a selection change during the call
        // cannot hide that this group was the selected one.
        let was_selected = selected.is(&group.id);
        let flagged = group.flagged_trashed();
        self.pending.insert(
            group.id.clone(),
            PendingDeletion {
                phase: PendingPhase::Trashing {
                    cancel_requested: false,
                },
                record: flagged.clone(),
            },
        );
        Transition::pending(vec![Effect::Persist(StoreCall::Trash {
            group: flagged,
            was_selected,
        })])
    }

    fn cancel_requested(&mut self, group: &Group) -> Transition {
        let Some(pending) = self.pending.get_mut(&group.id) else {
            return Transition::finished(Vec::new(), Outcome::Ignored);
        };
        match pending.phase {
            PendingPhase::Armed => {
                pending.phase = PendingPhase::Restoring;
                Transition::pending(vec![
                    Effect::AbortUndoTimer {
                        group_id: group.id.clone(),
                    },
                    Effect::Persist(StoreCall::Restore(pending.record.restored())),
                ])
            }
            PendingPhase::Trashing { .. } => {
                pending.phase = PendingPhase::Trashing {
                    cancel_requested: true,
                };
                Transition::finished(Vec::new(), Outcome::Ignored)
            }
            PendingPhase::Restoring => Transition::finished(Vec::new(), Outcome::Ignored),
        }
    }

    fn persisted(&mut self, call: StoreCall, result: Result<Group, String>) -> Transition {
        let operation = call.operation();
        match &call {
            StoreCall::Create(draft) => {
                self.names_in_flight.remove(&draft.name);
            }
            StoreCall::Rename(group) => {
                self.names_in_flight.remove(&group.name);
            }
            StoreCall::Trash { .. } | StoreCall::Restore(_) => {}
        }
        match (call, result) {
            (StoreCall::Create(_), Ok(created)) => {
                self.written_names
                    .insert(created.id.clone(), created.name.clone());
                Transition::finished(
                    vec![
                        Effect::GroupCreated(created.clone()),
                        Effect::Notify(Notice::success(protocol::GROUP_CREATED_SUCCESS)),
                    ],
                    Outcome::Done(created),
                )
            }
            (StoreCall::Rename(_), Ok(renamed)) => {
                self.written_names
                    .insert(renamed.id.clone(), renamed.name.clone());
                Transition::finished(
                    vec![
                        Effect::RefreshSelection(renamed.clone()),
                        Effect::FinishEditing {
                            group_id: renamed.id.clone(),
                        },
                        Effect::Notify(Notice::success(protocol::GROUP_RENAMED_SUCCESS)),
                    ],
                    Outcome::Done(renamed),
                )
            }
            (StoreCall::Trash { was_selected, .. }, Ok(flagged)) => {
                self.trashed(flagged, was_selected)
            }
            (StoreCall::Restore(_), Ok(restored)) => {
                self.pending.remove(&restored.id);
                self.written_names
                    .insert(restored.id.clone(), restored.name.clone());
                Transition::finished(
                    vec![Effect::Notify(
                        Notice::info(protocol::GROUP_REMOVE_CANCELED).with_name(&restored.name),
                    )],
                    Outcome::Done(restored),
                )
            }
            (StoreCall::Create(draft), Err(message)) => persistence_failure(
                operation,
                message,
                Notice::error(protocol::GROUP_CREATED_ERROR).with_name(draft.name),
            ),
            (StoreCall::Rename(group), Err(message)) => {
                let mut failed = persistence_failure(
                    operation,
                    message,
                    Notice::error(protocol::GROUP_RENAMED_ERROR).with_name(&group.name),
                );
                failed
                    .effects
                    .insert(0, Effect::FinishEditing { group_id: group.id });
                failed
            }
            (StoreCall::Trash { group, .. }, Err(message)) => {
                self.pending.remove(&group.id);
                persistence_failure(
                    operation,
                    message,
                    Notice::error(protocol::GROUP_REMOVED_ERROR).with_name(group.name),
                )
            }
            (StoreCall::Restore(group), Err(message)) => {
                // The group stays trashed without a timer; the next sweep purges it.
                self.pending.remove(&group.id);
                persistence_failure(
                    operation,
                    message,
                    Notice::error(protocol::GROUP_REMOVE_CANCELED_ERROR).with_name(group.name),
                )
            }
        }
    }

    fn trashed(&mut self, flagged: Group, was_selected: bool) -> Transition {
        let deselect = Effect::Deselect {
            group_id: flagged.id.clone(),
            was_selected,
        };
        let removed = Notice::info(protocol::GROUP_REMOVED).with_name(&flagged.name);
        self.written_names.remove(&flagged.id);

        if self.shut_down {
            self.pending.remove(&flagged.id);
            return Transition::finished(
                vec![deselect, Effect::Notify(removed)],
                Outcome::Done(flagged),
            );
        }

        let cancel_requested = matches!(
            self.pending_phase(&flagged.id),
            Some(PendingPhase::Trashing {
                cancel_requested: true
            })
        );
        let phase = if cancel_requested {
            PendingPhase::Restoring
        } else {
            PendingPhase::Armed
        };
        self.pending.insert(
            flagged.id.clone(),
            PendingDeletion {
                phase,
                record: flagged.clone(),
            },
        );
        if cancel_requested {
            return Transition::pending(vec![
                deselect,
                Effect::Notify(removed),
                Effect::Persist(StoreCall::Restore(flagged.restored())),
            ]);
        }

        let action = NoticeAction::CancelDelete {
            group: flagged.clone(),
        };
        Transition::finished(
            vec![
                Effect::ArmUndoTimer {
                    group_id: flagged.id.clone(),
                },
                deselect,
                Effect::Notify(removed.with_action(action, self.undo_window)),
            ],
            Outcome::Done(flagged),
        )
    }

    fn undo_window_elapsed(&mut self, group_id: GroupId) -> Transition {
        if self.pending_phase(&group_id) != Some(PendingPhase::Armed) {
            return Transition::finished(Vec::new(), Outcome::Ignored);
        }
        self.pending.remove(&group_id);
        Transition::finished(
            vec![Effect::ForgetUndoTimer { group_id }, Effect::Sweep],
            Outcome::Ignored,
        )
    }
}

fn persistence_failure(operation: GroupOperation, message: String, notice: Notice) -> Transition {
    Transition::rejected(GroupError::persistence(operation, message), notice)
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
