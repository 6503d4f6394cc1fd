//! Planner state container and the async session that drives it.
//!
//! Every fetch is tagged with a generation number. A result whose generation is
//! no longer current (the user picked another date, or a newer refresh started)
//! is dropped instead of overwriting the list.

use std::sync::Arc;

use chrono::NaiveDate;
use shared::{
    domain::{Activity, ActivityFields, ActivityId},
    error::{StoreError, StoreErrorKind},
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    reorder::{DropOutcome, ReorderController},
    store::ActivityStoreClient,
    ActivityStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Editor {
    #[default]
    Closed,
    Creating(ActivityFields),
    Editing {
        id: ActivityId,
        fields: ActivityFields,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(ActivityId),
    Updated(ActivityId),
    /// Missing title or date; nothing was sent and the editor stays open.
    Invalid,
    NothingToSave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Create,
    Update,
    Delete,
    Reorder,
}

impl WriteAction {
    fn verb(self) -> &'static str {
        match self {
            WriteAction::Create => "save",
            WriteAction::Update => "update",
            WriteAction::Delete => "delete",
            WriteAction::Reorder => "reorder",
        }
    }
}

#[derive(Debug, Error)]
pub enum PlannerError {
    /// A store write failed; the UI shows this as a blocking alert.
    #[error("failed to {} activity: {}", .action.verb(), .source)]
    Write {
        action: WriteAction,
        #[source]
        source: StoreError,
    },
}

impl PlannerError {
    fn write(action: WriteAction, source: StoreError) -> Self {
        PlannerError::Write { action, source }
    }

    pub fn kind(&self) -> StoreErrorKind {
        match self {
            PlannerError::Write { source, .. } => source.kind(),
        }
    }

    pub fn action(&self) -> WriteAction {
        match self {
            PlannerError::Write { action, .. } => *action,
        }
    }

    pub fn alert_message(&self) -> String {
        match self {
            PlannerError::Write { action, source } => {
                format!("Could not {} the activity: {}", action.verb(), source.message)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlannerState {
    selected_date: Option<NaiveDate>,
    activities: Vec<Activity>,
    loading: bool,
    generation: u64,
    editor: Editor,
    pending_delete: Option<ActivityId>,
    reorder: ReorderController,
}

impl PlannerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn activity_ids(&self) -> Vec<ActivityId> {
        self.activities.iter().map(|a| a.id).collect()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn pending_delete(&self) -> Option<ActivityId> {
        self.pending_delete
    }

    pub fn reorder(&self) -> &ReorderController {
        &self.reorder
    }

    pub fn reorder_mut(&mut self) -> &mut ReorderController {
        &mut self.reorder
    }

    /// Switches the day and returns the ticket its fetch must present.
    pub fn select_date(&mut self, date: NaiveDate) -> FetchTicket {
        self.selected_date = Some(date);
        self.reorder.cancel();
        self.issue_ticket(date)
    }

    /// Ticket for re-reading the current day, `None` when no day is selected.
    pub fn refresh_ticket(&mut self) -> Option<FetchTicket> {
        let date = self.selected_date?;
        Some(self.issue_ticket(date))
    }

    fn issue_ticket(&mut self, date: NaiveDate) -> FetchTicket {
        self.generation += 1;
        self.loading = true;
        FetchTicket {
            generation: self.generation,
            date,
        }
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.generation == self.generation && self.selected_date == Some(ticket.date)
    }

    /// Installs fetched activities unless a newer fetch has been issued since.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, activities: Vec<Activity>) -> bool {
        if !self.is_current(ticket) {
            debug!(
                date = %ticket.date,
                generation = ticket.generation,
                current = self.generation,
                "discarding stale fetch result"
            );
            return false;
        }
        self.activities = activities;
        self.loading = false;
        self.reorder.cancel();
        if let Some(id) = self.pending_delete {
            if !self.activities.iter().any(|a| a.id == id) {
                self.pending_delete = None;
            }
        }
        true
    }

    pub fn open_create(&mut self) {
        self.editor = Editor::Creating(ActivityFields::default());
    }

    /// Opens the editor prefilled with `id`'s fields.
    pub fn open_edit(&mut self, id: ActivityId) -> bool {
        match self.activities.iter().find(|a| a.id == id) {
            Some(activity) => {
                self.editor = Editor::Editing {
                    id,
                    fields: activity.fields.clone(),
                };
                true
            }
            None => false,
        }
    }

    pub fn editor_fields_mut(&mut self) -> Option<&mut ActivityFields> {
        match &mut self.editor {
            Editor::Closed => None,
            Editor::Creating(fields) | Editor::Editing { fields, .. } => Some(fields),
        }
    }

    pub fn close_editor(&mut self) {
        self.editor = Editor::Closed;
    }

    /// First step of deletion; nothing is removed until confirmed.
    pub fn request_delete(&mut self, id: ActivityId) -> bool {
        if self.activities.iter().any(|a| a.id == id) {
            self.pending_delete = Some(id);
            true
        } else {
            false
        }
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn take_pending_delete(&mut self) -> Option<ActivityId> {
        self.pending_delete.take()
    }

    /// Applies a finished drag to the in-memory list only.
    pub fn apply_drop(&mut self, outcome: DropOutcome) -> bool {
        outcome.apply(&mut self.activities)
    }
}

/// Couples a store client with the planner state it keeps up to date.
pub struct PlannerSession<S> {
    client: Arc<ActivityStoreClient<S>>,
    state: Arc<Mutex<PlannerState>>,
}

impl<S> Clone for PlannerSession<S> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: ActivityStore> PlannerSession<S> {
    pub fn new(client: ActivityStoreClient<S>) -> Self {
        Self {
            client: Arc::new(client),
            state: Arc::new(Mutex::new(PlannerState::new())),
        }
    }

    pub fn client(&self) -> &ActivityStoreClient<S> {
        &self.client
    }

    pub async fn snapshot(&self) -> PlannerState {
        self.state.lock().await.clone()
    }

    pub async fn update_state<R>(&self, f: impl FnOnce(&mut PlannerState) -> R) -> R {
        let mut guard = self.state.lock().await;
        f(&mut guard)
    }

    /// Selects `date` and loads it. Returns `false` when the result arrived
    /// after a newer selection and was discarded.
    pub async fn select_date(&self, date: NaiveDate) -> bool {
        let ticket = self.state.lock().await.select_date(date);
        info!(%date, generation = ticket.generation, "date selected");
        self.run_fetch(ticket).await
    }

    pub async fn refresh(&self) -> bool {
        let ticket = self.state.lock().await.refresh_ticket();
        match ticket {
            Some(ticket) => self.run_fetch(ticket).await,
            None => false,
        }
    }

    async fn run_fetch(&self, ticket: FetchTicket) -> bool {
        let activities = self.client.fetch_for_date(ticket.date).await;
        self.state.lock().await.apply_fetch(ticket, activities)
    }

    /// Saves the open editor, then reloads the day on success.
    pub async fn save_editor(&self) -> Result<SaveOutcome, PlannerError> {
        let (editor, date) = {
            let state = self.state.lock().await;
            (state.editor.clone(), state.selected_date)
        };

        let outcome = match editor {
            Editor::Closed => return Ok(SaveOutcome::NothingToSave),
            Editor::Creating(fields) => {
                if !fields.has_title() || date.is_none() {
                    return Ok(SaveOutcome::Invalid);
                }
                let created = self
                    .client
                    .create(date, fields)
                    .await
                    .map_err(|err| self.write_failed(WriteAction::Create, err))?;
                SaveOutcome::Created(created.id)
            }
            Editor::Editing { id, fields } => {
                if !fields.has_title() {
                    return Ok(SaveOutcome::Invalid);
                }
                self.client
                    .update(id, fields)
                    .await
                    .map_err(|err| self.write_failed(WriteAction::Update, err))?;
                SaveOutcome::Updated(id)
            }
        };

        self.state.lock().await.close_editor();
        self.refresh().await;
        Ok(outcome)
    }

    /// Deletes the activity awaiting confirmation, if any.
    pub async fn confirm_delete(&self) -> Result<Option<ActivityId>, PlannerError> {
        let Some(id) = self.state.lock().await.take_pending_delete() else {
            return Ok(None);
        };
        self.client
            .remove(id)
            .await
            .map_err(|err| self.write_failed(WriteAction::Delete, err))?;
        self.refresh().await;
        Ok(Some(id))
    }

    /// Applies a drop locally; in rank ordering mode the new order is also stored.
    pub async fn handle_drop(&self, outcome: DropOutcome) -> Result<bool, PlannerError> {
        let reordered = {
            let mut state = self.state.lock().await;
            if !state.apply_drop(outcome) {
                return Ok(false);
            }
            state.activities.clone()
        };

        if self.client.ordering().persists_drops() {
            let persisted = self.client.persist_order(&reordered).await;
            // Some ranks may have been written; show whatever the store now holds.
            self.refresh().await;
            persisted.map_err(|err| self.write_failed(WriteAction::Reorder, err))?;
        }
        Ok(true)
    }

    fn write_failed(&self, action: WriteAction, err: StoreError) -> PlannerError {
        warn!(action = ?action, kind = ?err.kind(), error = %err, "activity write failed");
        PlannerError::write(action, err)
    }
}

#[cfg(test)]
#[path = "tests/planner_tests.rs"]
mod tests;
