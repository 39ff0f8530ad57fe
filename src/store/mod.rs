//! Remote record store seam
//!
//! [`RecordStore`] is everything the sync hook needs from the durable store.
//! [`RestStore`] talks to PostgREST; [`MemoryStore`] keeps the same
//! guarantees in process.

mod memory;
mod rest;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Error;
use crate::models::*;
use crate::session::Session;

pub use memory::MemoryStore;
pub use rest::RestStore;

pub const HABITS_TABLE: &str = "habits";
pub const HABIT_COMPLETIONS_TABLE: &str = "habit_completions";
pub const SLEEP_ENTRIES_TABLE: &str = "sleep_entries";
pub const TASKS_TABLE: &str = "tasks";
pub const NOTES_TABLE: &str = "notes";

/// Unique key a sleep entry upsert merges on
pub const SLEEP_CONFLICT_TARGET: &str = "user_id,date";

/// Owner-scoped operations on the record store.
///
/// Every call is made on behalf of `session.owner_id`; reads return only that
/// owner's rows and writes touch only that owner's rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Habits ordered by creation time
    async fn fetch_habits(&self, session: &Session) -> Result<Vec<HabitRow>, Error>;

    async fn fetch_completions(&self, session: &Session) -> Result<Vec<HabitCompletion>, Error>;

    /// Sleep entries ordered by date
    async fn fetch_sleep_entries(&self, session: &Session) -> Result<Vec<SleepEntry>, Error>;

    /// Tasks ordered by date
    async fn fetch_tasks(&self, session: &Session) -> Result<Vec<Task>, Error>;

    /// Notes, newest first
    async fn fetch_notes(&self, session: &Session) -> Result<Vec<Note>, Error>;

    async fn insert_habit(&self, session: &Session, habit: &NewHabit) -> Result<HabitRow, Error>;

    async fn update_habit(
        &self,
        session: &Session,
        id: Uuid,
        patch: &HabitPatch,
    ) -> Result<HabitRow, Error>;

    /// Delete a habit; its completions go with it
    async fn delete_habit(&self, session: &Session, id: Uuid) -> Result<(), Error>;

    async fn insert_completion(
        &self,
        session: &Session,
        completion: &NewCompletion,
    ) -> Result<HabitCompletion, Error>;

    async fn delete_completion(
        &self,
        session: &Session,
        habit_id: Uuid,
        date: NaiveDate,
    ) -> Result<(), Error>;

    /// Insert, or replace the hours of the entry with the same (owner, date)
    async fn upsert_sleep_entry(
        &self,
        session: &Session,
        entry: &NewSleepEntry,
    ) -> Result<SleepEntry, Error>;

    async fn delete_sleep_entry(&self, session: &Session, id: Uuid) -> Result<(), Error>;

    async fn insert_task(&self, session: &Session, task: &NewTask) -> Result<Task, Error>;

    async fn update_task(&self, session: &Session, id: Uuid, patch: &TaskPatch)
        -> Result<Task, Error>;

    async fn delete_task(&self, session: &Session, id: Uuid) -> Result<(), Error>;

    async fn insert_note(&self, session: &Session, note: &NewNote) -> Result<Note, Error>;

    async fn update_note(&self, session: &Session, id: Uuid, patch: &NotePatch)
        -> Result<Note, Error>;

    async fn delete_note(&self, session: &Session, id: Uuid) -> Result<(), Error>;
}
