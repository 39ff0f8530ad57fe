use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::StatusCode;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::*;
use crate::error::ApiErrorDetails;

#[derive(Debug, Default)]
struct Tables {
    habits: Vec<HabitRow>,
    completions: Vec<HabitCompletion>,
    sleep_entries: Vec<SleepEntry>,
    tasks: Vec<Task>,
    notes: Vec<Note>,
}

/// In-process [`RecordStore`].
///
/// Enforces what the database enforces for the hosted store: the
/// `auth.uid() = user_id` policies, token expiry, the unique keys on
/// (habit_id, date) and (user_id, date), the habit foreign key and its cascade.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn jwt_expired() -> Error {
    Error::api(
        StatusCode::UNAUTHORIZED,
        ApiErrorDetails::new("PGRST301", "JWT expired"),
    )
}

fn policy_violation(table: &str) -> Error {
    Error::api(
        StatusCode::FORBIDDEN,
        ApiErrorDetails::new(
            "42501",
            format!("new row violates row-level security policy for table \"{}\"", table),
        ),
    )
}

fn unique_violation(constraint: &str) -> Error {
    Error::api(
        StatusCode::CONFLICT,
        ApiErrorDetails::new(
            "23505",
            format!("duplicate key value violates unique constraint \"{}\"", constraint),
        ),
    )
}

fn foreign_key_violation(constraint: &str) -> Error {
    Error::api(
        StatusCode::CONFLICT,
        ApiErrorDetails::new(
            "23503",
            format!("insert or update violates foreign key constraint \"{}\"", constraint),
        ),
    )
}

/// Rows visible to `owner`, the way the select policy filters them
fn visible<T: Clone>(rows: &[T], owner: Uuid, user_id: impl Fn(&T) -> Uuid) -> Vec<T> {
    rows.iter().filter(|row| user_id(row) == owner).cloned().collect()
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the tables on behalf of a session, rejecting expired tokens
    fn tables(&self, session: &Session) -> Result<MutexGuard<'_, Tables>, Error> {
        if session.is_expired() {
            return Err(jwt_expired());
        }
        self.tables
            .lock()
            .map_err(|_| Error::general("memory store lock poisoned"))
    }

    /// Number of completion rows for a habit, regardless of owner
    pub fn completion_count(&self, habit_id: Uuid) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.completions.iter().filter(|c| c.habit_id == habit_id).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_habits(&self, session: &Session) -> Result<Vec<HabitRow>, Error> {
        let tables = self.tables(session)?;
        let mut rows = visible(&tables.habits, session.owner_id, |r| r.user_id);
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn fetch_completions(&self, session: &Session) -> Result<Vec<HabitCompletion>, Error> {
        let tables = self.tables(session)?;
        let mut rows = visible(&tables.completions, session.owner_id, |r| r.user_id);
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }

    async fn fetch_sleep_entries(&self, session: &Session) -> Result<Vec<SleepEntry>, Error> {
        let tables = self.tables(session)?;
        let mut rows = visible(&tables.sleep_entries, session.owner_id, |r| r.user_id);
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }

    async fn fetch_tasks(&self, session: &Session) -> Result<Vec<Task>, Error> {
        let tables = self.tables(session)?;
        let mut rows = visible(&tables.tasks, session.owner_id, |r| r.user_id);
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }

    async fn fetch_notes(&self, session: &Session) -> Result<Vec<Note>, Error> {
        let tables = self.tables(session)?;
        let mut rows = visible(&tables.notes, session.owner_id, |r| r.user_id);
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_habit(&self, session: &Session, habit: &NewHabit) -> Result<HabitRow, Error> {
        let mut tables = self.tables(session)?;
        if habit.user_id != session.owner_id {
            return Err(policy_violation(HABITS_TABLE));
        }
        let row = HabitRow {
            id: Uuid::new_v4(),
            user_id: habit.user_id,
            name: habit.name.clone(),
            color: habit.color.clone(),
            created_at: Utc::now(),
        };
        tables.habits.push(row.clone());
        Ok(row)
    }

    async fn update_habit(
        &self,
        session: &Session,
        id: Uuid,
        patch: &HabitPatch,
    ) -> Result<HabitRow, Error> {
        let mut tables = self.tables(session)?;
        let row = tables
            .habits
            .iter_mut()
            .find(|r| r.id == id && r.user_id == session.owner_id)
            .ok_or_else(|| Error::not_found(format!("{} {}", HABITS_TABLE, id)))?;
        if let Some(name) = &patch.name {
            row.name = name.clone();
        }
        if let Some(color) = &patch.color {
            row.color = color.clone();
        }
        Ok(row.clone())
    }

    async fn delete_habit(&self, session: &Session, id: Uuid) -> Result<(), Error> {
        let mut tables = self.tables(session)?;
        let owner = session.owner_id;
        let before = tables.habits.len();
        tables.habits.retain(|r| !(r.id == id && r.user_id == owner));
        if tables.habits.len() < before {
            // ON DELETE CASCADE
            tables.completions.retain(|c| c.habit_id != id);
        }
        Ok(())
    }

    async fn insert_completion(
        &self,
        session: &Session,
        completion: &NewCompletion,
    ) -> Result<HabitCompletion, Error> {
        let mut tables = self.tables(session)?;
        if completion.user_id != session.owner_id {
            return Err(policy_violation(HABIT_COMPLETIONS_TABLE));
        }
        if !tables.habits.iter().any(|h| h.id == completion.habit_id) {
            return Err(foreign_key_violation("habit_completions_habit_id_fkey"));
        }
        if tables
            .completions
            .iter()
            .any(|c| c.habit_id == completion.habit_id && c.date == completion.date)
        {
            return Err(unique_violation("habit_completions_habit_id_date_key"));
        }
        let row = HabitCompletion {
            id: Uuid::new_v4(),
            habit_id: completion.habit_id,
            user_id: completion.user_id,
            date: completion.date,
            created_at: Utc::now(),
        };
        tables.completions.push(row.clone());
        Ok(row)
    }

    async fn delete_completion(
        &self,
        session: &Session,
        habit_id: Uuid,
        date: NaiveDate,
    ) -> Result<(), Error> {
        let mut tables = self.tables(session)?;
        let owner = session.owner_id;
        tables
            .completions
            .retain(|c| !(c.habit_id == habit_id && c.date == date && c.user_id == owner));
        Ok(())
    }

    async fn upsert_sleep_entry(
        &self,
        session: &Session,
        entry: &NewSleepEntry,
    ) -> Result<SleepEntry, Error> {
        let mut tables = self.tables(session)?;
        if entry.user_id != session.owner_id {
            return Err(policy_violation(SLEEP_ENTRIES_TABLE));
        }
        if let Some(existing) = tables
            .sleep_entries
            .iter_mut()
            .find(|e| e.user_id == entry.user_id && e.date == entry.date)
        {
            existing.hours = entry.hours;
            return Ok(existing.clone());
        }
        let row = SleepEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            date: entry.date,
            hours: entry.hours,
            created_at: Utc::now(),
        };
        tables.sleep_entries.push(row.clone());
        Ok(row)
    }

    async fn delete_sleep_entry(&self, session: &Session, id: Uuid) -> Result<(), Error> {
        let mut tables = self.tables(session)?;
        let owner = session.owner_id;
        tables
            .sleep_entries
            .retain(|e| !(e.id == id && e.user_id == owner));
        Ok(())
    }

    async fn insert_task(&self, session: &Session, task: &NewTask) -> Result<Task, Error> {
        let mut tables = self.tables(session)?;
        if task.user_id != session.owner_id {
            return Err(policy_violation(TASKS_TABLE));
        }
        let row = Task {
            id: Uuid::new_v4(),
            user_id: task.user_id,
            title: task.title.clone(),
            date: task.date,
            completed: task.completed,
            color: task.color.clone(),
            created_at: Utc::now(),
        };
        tables.tasks.push(row.clone());
        Ok(row)
    }

    async fn update_task(
        &self,
        session: &Session,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Task, Error> {
        let mut tables = self.tables(session)?;
        let row = tables
            .tasks
            .iter_mut()
            .find(|r| r.id == id && r.user_id == session.owner_id)
            .ok_or_else(|| Error::not_found(format!("{} {}", TASKS_TABLE, id)))?;
        patch.apply(row);
        Ok(row.clone())
    }

    async fn delete_task(&self, session: &Session, id: Uuid) -> Result<(), Error> {
        let mut tables = self.tables(session)?;
        let owner = session.owner_id;
        tables.tasks.retain(|t| !(t.id == id && t.user_id == owner));
        Ok(())
    }

    async fn insert_note(&self, session: &Session, note: &NewNote) -> Result<Note, Error> {
        let mut tables = self.tables(session)?;
        if note.user_id != session.owner_id {
            return Err(policy_violation(NOTES_TABLE));
        }
        let row = Note {
            id: Uuid::new_v4(),
            user_id: note.user_id,
            content: note.content.clone(),
            date: note.date,
            created_at: Utc::now(),
        };
        tables.notes.push(row.clone());
        Ok(row)
    }

    async fn update_note(
        &self,
        session: &Session,
        id: Uuid,
        patch: &NotePatch,
    ) -> Result<Note, Error> {
        let mut tables = self.tables(session)?;
        let row = tables
            .notes
            .iter_mut()
            .find(|r| r.id == id && r.user_id == session.owner_id)
            .ok_or_else(|| Error::not_found(format!("{} {}", NOTES_TABLE, id)))?;
        patch.apply(row);
        Ok(row.clone())
    }

    async fn delete_note(&self, session: &Session, id: Uuid) -> Result<(), Error> {
        let mut tables = self.tables(session)?;
        let owner = session.owner_id;
        tables.notes.retain(|n| !(n.id == id && n.user_id == owner));
        Ok(())
    }
}
