//! The sync hook: an owner-scoped mirror of the record store
//!
//! [`HabitSync`] loads every record set for the current owner, exposes it to
//! the presentation layer, and routes every mutation through the store before
//! patching the mirror. Nothing is applied optimistically: a failed write
//! leaves the mirror untouched and queues an error [`Notice`].
//!
//! Mutations take `&mut self`, so one `HabitSync` never has two writes in
//! flight. Writes from other clients are not observed until the next
//! [`HabitSync::load`]; the store itself is last-writer-wins.

use chrono::{Local, NaiveDate};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::error::Error;
use crate::metrics::{self, Summary};
use crate::models::*;
use crate::notice::Notice;
use crate::session::Session;
use crate::store::RecordStore;

/// The mirrored record sets of one owner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerState {
    /// Habits in creation order, each with its completion set
    pub habits: Vec<Habit>,
    /// Sleep entries ordered by date, at most one per date
    pub sleep_entries: Vec<SleepEntry>,
    /// Tasks in load order, new tasks appended
    pub tasks: Vec<Task>,
    /// Notes newest first
    pub notes: Vec<Note>,
}

impl TrackerState {
    pub fn is_empty(&self) -> bool {
        self.habits.is_empty()
            && self.sleep_entries.is_empty()
            && self.tasks.is_empty()
            && self.notes.is_empty()
    }

    /// Build the mirror from freshly fetched rows.
    ///
    /// Completions are grouped by habit once, then attached to their habit.
    pub fn from_rows(
        habits: Vec<HabitRow>,
        completions: Vec<HabitCompletion>,
        sleep_entries: Vec<SleepEntry>,
        tasks: Vec<Task>,
        notes: Vec<Note>,
    ) -> Self {
        let mut by_habit = group_completions(completions);
        let habits = habits
            .into_iter()
            .map(|row| {
                let days = by_habit.remove(&row.id).unwrap_or_default();
                Habit::from_row(row, days)
            })
            .collect();

        Self {
            habits,
            sleep_entries,
            tasks,
            notes,
        }
    }
}

/// Map each habit id to the ordered, duplicate-free set of its completion dates
pub fn group_completions(
    completions: Vec<HabitCompletion>,
) -> HashMap<Uuid, BTreeSet<NaiveDate>> {
    let mut grouped: HashMap<Uuid, BTreeSet<NaiveDate>> = HashMap::new();
    for completion in completions {
        grouped
            .entry(completion.habit_id)
            .or_default()
            .insert(completion.date);
    }
    grouped
}

/// Owner-scoped mirror of the record store
pub struct HabitSync<S: RecordStore> {
    store: S,
    session: Option<Session>,
    state: TrackerState,
    notices: Vec<Notice>,
}

impl<S: RecordStore> HabitSync<S> {
    /// Create a hook with no owner and an empty mirror
    pub fn new(store: S) -> Self {
        Self {
            store,
            session: None,
            state: TrackerState::default(),
            notices: Vec::new(),
        }
    }

    /// Create a hook already bound to a session
    pub fn with_session(store: S, session: Session) -> Self {
        let mut sync = Self::new(store);
        sync.session = Some(session);
        sync
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Replace the session handle.
    ///
    /// A different owner (including signing out) drops the mirror and any
    /// pending notices. A refreshed token for the same owner keeps them.
    pub fn set_session(&mut self, session: Option<Session>) {
        let same_owner = match (&self.session, &session) {
            (Some(current), Some(next)) => current.same_owner(next),
            (None, None) => true,
            _ => false,
        };
        if !same_owner {
            log::info!(
                "owner changed to {}, clearing local state",
                session
                    .as_ref()
                    .map(|s| s.owner_id.to_string())
                    .unwrap_or_else(|| "none".to_string())
            );
            self.state = TrackerState::default();
            self.notices.clear();
        }
        self.session = session;
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn habits(&self) -> &[Habit] {
        &self.state.habits
    }

    pub fn habit(&self, id: Uuid) -> Option<&Habit> {
        self.state.habits.iter().find(|h| h.id == id)
    }

    pub fn sleep_entries(&self) -> &[SleepEntry] {
        &self.state.sleep_entries
    }

    pub fn sleep_on(&self, date: NaiveDate) -> Option<&SleepEntry> {
        self.state.sleep_entries.iter().find(|e| e.date == date)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn tasks_on(&self, date: NaiveDate) -> impl Iterator<Item = &Task> + '_ {
        self.state.tasks.iter().filter(move |t| t.date == date)
    }

    pub fn notes(&self) -> &[Note] {
        &self.state.notes
    }

    /// Notices queued since the last call; the queue is emptied
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Statistics for `today`
    pub fn summary(&self, today: NaiveDate) -> Summary {
        metrics::summarize(&self.state.habits, &self.state.sleep_entries, today)
    }

    /// Statistics for the local calendar date
    pub fn summary_today(&self) -> Summary {
        self.summary(Local::now().date_naive())
    }

    /// The session to act for, or `None` for the silent no-op path
    fn active_session(&self, action: &str) -> Option<Session> {
        if self.session.is_none() {
            log::debug!("{}: no authenticated owner, skipping", action);
        }
        self.session.clone()
    }

    /// Log and surface a failure, handing the error back to the caller
    fn fail(&mut self, action: &str, err: Error) -> Error {
        log::error!("{} failed: {}", action, err);
        self.notices.push(Notice::error(format!("Failed to {}", action)));
        err
    }

    /// Reload every record set for the current owner.
    ///
    /// With no owner the mirror is emptied without contacting the store. On
    /// failure the previous snapshot is kept.
    pub async fn load(&mut self) -> Result<(), Error> {
        let Some(session) = self.active_session("load") else {
            self.state = TrackerState::default();
            return Ok(());
        };

        let fetched = tokio::try_join!(
            self.store.fetch_habits(&session),
            self.store.fetch_completions(&session),
            self.store.fetch_sleep_entries(&session),
            self.store.fetch_tasks(&session),
            self.store.fetch_notes(&session),
        );

        match fetched {
            Ok((habits, completions, sleep_entries, tasks, notes)) => {
                self.state =
                    TrackerState::from_rows(habits, completions, sleep_entries, tasks, notes);
                log::info!(
                    "loaded {} habits, {} sleep entries, {} tasks, {} notes for {}",
                    self.state.habits.len(),
                    self.state.sleep_entries.len(),
                    self.state.tasks.len(),
                    self.state.notes.len(),
                    session.owner_id
                );
                Ok(())
            }
            Err(err) => Err(self.fail("load data", err)),
        }
    }

    pub async fn add_habit(&mut self, name: &str, color: &str) -> Result<(), Error> {
        let Some(session) = self.active_session("add habit") else {
            return Ok(());
        };
        let new_habit = NewHabit {
            user_id: session.owner_id,
            name: name.to_string(),
            color: color.to_string(),
        };

        match self.store.insert_habit(&session, &new_habit).await {
            Ok(row) => {
                log::debug!("added habit {}", row.id);
                self.state.habits.push(Habit::from_row(row, BTreeSet::new()));
                self.notices.push(Notice::info("Habit added"));
                Ok(())
            }
            Err(err) => Err(self.fail("add habit", err)),
        }
    }

    /// Rename and/or recolor a habit. Completions and creation time are untouched.
    pub async fn update_habit(
        &mut self,
        id: Uuid,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<(), Error> {
        let Some(session) = self.active_session("update habit") else {
            return Ok(());
        };
        let patch = HabitPatch {
            name: name.map(str::to_string),
            color: color.map(str::to_string),
        };
        if patch.is_empty() {
            return Ok(());
        }

        match self.store.update_habit(&session, id, &patch).await {
            Ok(row) => {
                if let Some(habit) = self.state.habits.iter_mut().find(|h| h.id == id) {
                    habit.name = row.name;
                    habit.color = row.color;
                }
                Ok(())
            }
            Err(err) => Err(self.fail("update habit", err)),
        }
    }

    /// Delete a habit; the store drops its completions with it
    pub async fn delete_habit(&mut self, id: Uuid) -> Result<(), Error> {
        let Some(session) = self.active_session("delete habit") else {
            return Ok(());
        };

        match self.store.delete_habit(&session, id).await {
            Ok(()) => {
                self.state.habits.retain(|h| h.id != id);
                Ok(())
            }
            Err(err) => Err(self.fail("delete habit", err)),
        }
    }

    /// Flip whether `habit_id` was completed on `date`.
    ///
    /// The mirror changes only after the store accepted the insert or delete.
    pub async fn toggle_habit_day(&mut self, habit_id: Uuid, date: NaiveDate) -> Result<(), Error> {
        let Some(session) = self.active_session("toggle habit") else {
            return Ok(());
        };
        let Some(completed) = self.habit(habit_id).map(|h| h.is_completed_on(date)) else {
            let err = Error::not_found(format!("habit {}", habit_id));
            return Err(self.fail("update habit progress", err));
        };

        let result = if completed {
            self.store
                .delete_completion(&session, habit_id, date)
                .await
        } else {
            let completion = NewCompletion {
                habit_id,
                user_id: session.owner_id,
                date,
            };
            self.store
                .insert_completion(&session, &completion)
                .await
                .map(|_| ())
        };

        match result {
            Ok(()) => {
                if let Some(habit) = self.state.habits.iter_mut().find(|h| h.id == habit_id) {
                    if completed {
                        habit.completed_days.remove(&date);
                    } else {
                        habit.completed_days.insert(date);
                    }
                }
                Ok(())
            }
            Err(err) => Err(self.fail("update habit progress", err)),
        }
    }

    /// Record the hours slept on `date`, replacing any earlier entry for that date.
    ///
    /// Hours are clamped to `[0, 24]` and rounded to one decimal.
    pub async fn add_sleep_entry(&mut self, date: NaiveDate, hours: f64) -> Result<(), Error> {
        let Some(session) = self.active_session("add sleep entry") else {
            return Ok(());
        };
        let hours = match normalize_sleep_hours(hours) {
            Ok(hours) => hours,
            Err(err) => return Err(self.fail("save sleep entry", err)),
        };
        let entry = NewSleepEntry {
            user_id: session.owner_id,
            date,
            hours,
        };

        match self.store.upsert_sleep_entry(&session, &entry).await {
            Ok(row) => {
                let entries = &mut self.state.sleep_entries;
                match entries.iter_mut().find(|e| e.date == row.date) {
                    Some(existing) => *existing = row,
                    None => {
                        let at = entries.partition_point(|e| e.date < row.date);
                        entries.insert(at, row);
                    }
                }
                self.notices.push(Notice::info("Sleep entry saved"));
                Ok(())
            }
            Err(err) => Err(self.fail("save sleep entry", err)),
        }
    }

    pub async fn delete_sleep_entry(&mut self, id: Uuid) -> Result<(), Error> {
        let Some(session) = self.active_session("delete sleep entry") else {
            return Ok(());
        };

        match self.store.delete_sleep_entry(&session, id).await {
            Ok(()) => {
                self.state.sleep_entries.retain(|e| e.id != id);
                Ok(())
            }
            Err(err) => Err(self.fail("delete sleep entry", err)),
        }
    }

    pub async fn add_task(
        &mut self,
        title: &str,
        date: NaiveDate,
        color: Option<&str>,
    ) -> Result<(), Error> {
        let Some(session) = self.active_session("add task") else {
            return Ok(());
        };
        let task = NewTask {
            user_id: session.owner_id,
            title: title.to_string(),
            date,
            completed: false,
            color: color.map(str::to_string),
        };

        match self.store.insert_task(&session, &task).await {
            Ok(row) => {
                self.state.tasks.push(row);
                self.notices.push(Notice::info("Task added"));
                Ok(())
            }
            Err(err) => Err(self.fail("add task", err)),
        }
    }

    pub async fn update_task(&mut self, id: Uuid, patch: TaskPatch) -> Result<(), Error> {
        let Some(session) = self.active_session("update task") else {
            return Ok(());
        };
        if patch.is_empty() {
            return Ok(());
        }

        match self.store.update_task(&session, id, &patch).await {
            Ok(row) => {
                if let Some(task) = self.state.tasks.iter_mut().find(|t| t.id == id) {
                    *task = row;
                }
                Ok(())
            }
            Err(err) => Err(self.fail("update task", err)),
        }
    }

    /// Flip a task's completed flag
    pub async fn toggle_task(&mut self, id: Uuid) -> Result<(), Error> {
        if self.session.is_none() {
            return Ok(());
        }
        let current = self.state.tasks.iter().find(|t| t.id == id);
        let Some(completed) = current.map(|t| t.completed) else {
            let err = Error::not_found(format!("task {}", id));
            return Err(self.fail("update task", err));
        };
        let patch = TaskPatch {
            completed: Some(!completed),
            ..TaskPatch::default()
        };
        self.update_task(id, patch).await
    }

    pub async fn delete_task(&mut self, id: Uuid) -> Result<(), Error> {
        let Some(session) = self.active_session("delete task") else {
            return Ok(());
        };

        match self.store.delete_task(&session, id).await {
            Ok(()) => {
                self.state.tasks.retain(|t| t.id != id);
                Ok(())
            }
            Err(err) => Err(self.fail("delete task", err)),
        }
    }

    /// Create a note; it goes to the front of the list
    pub async fn add_note(&mut self, content: &str, date: NaiveDate) -> Result<(), Error> {
        let Some(session) = self.active_session("add note") else {
            return Ok(());
        };
        let note = NewNote {
            user_id: session.owner_id,
            content: content.to_string(),
            date,
        };

        match self.store.insert_note(&session, &note).await {
            Ok(row) => {
                self.state.notes.insert(0, row);
                self.notices.push(Notice::info("Note added"));
                Ok(())
            }
            Err(err) => Err(self.fail("add note", err)),
        }
    }

    pub async fn update_note(&mut self, id: Uuid, patch: NotePatch) -> Result<(), Error> {
        let Some(session) = self.active_session("update note") else {
            return Ok(());
        };
        if patch.is_empty() {
            return Ok(());
        }

        match self.store.update_note(&session, id, &patch).await {
            Ok(row) => {
                if let Some(note) = self.state.notes.iter_mut().find(|n| n.id == id) {
                    *note = row;
                }
                Ok(())
            }
            Err(err) => Err(self.fail("update note", err)),
        }
    }

    pub async fn delete_note(&mut self, id: Uuid) -> Result<(), Error> {
        let Some(session) = self.active_session("delete note") else {
            return Ok(());
        };

        match self.store.delete_note(&session, id).await {
            Ok(()) => {
                self.state.notes.retain(|n| n.id != id);
                Ok(())
            }
            Err(err) => Err(self.fail("delete note", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn completion(habit_id: Uuid, date: NaiveDate) -> HabitCompletion {
        HabitCompletion {
            id: Uuid::new_v4(),
            habit_id,
            user_id: Uuid::nil(),
            date,
            created_at: Utc::now(),
        }
    }

    fn habit_row(name: &str) -> HabitRow {
        HabitRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.to_string(),
            color: "#10b981".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_group_completions_dedupes_and_orders() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let grouped = group_completions(vec![
            completion(a, day(3)),
            completion(b, day(1)),
            completion(a, day(1)),
            completion(a, day(3)),
        ]);

        let a_days: Vec<_> = grouped[&a].iter().copied().collect();
        assert_eq!(a_days, vec![day(1), day(3)]);
        assert_eq!(grouped[&b].len(), 1);
    }

    #[test]
    fn test_from_rows_joins_completions_onto_habits() {
        let read = habit_row("Read");
        let run = habit_row("Run");
        let stray = Uuid::new_v4();
        let state = TrackerState::from_rows(
            vec![read.clone(), run.clone()],
            vec![completion(read.id, day(2)), completion(stray, day(2))],
            vec![],
            vec![],
            vec![],
        );

        assert_eq!(state.habits.len(), 2);
        assert_eq!(state.habits[0].name, "Read");
        assert!(state.habits[0].is_completed_on(day(2)));
        assert!(state.habits[1].completed_days.is_empty());
    }
}
