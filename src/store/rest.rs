use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use super::*;
use crate::config::TrackerConfig;
use crate::postgrest::TableClient;

/// [`RecordStore`] backed by the project's PostgREST endpoint
#[derive(Debug, Clone)]
pub struct RestStore {
    url: String,
    key: String,
    schema: String,
    client_info: String,
    client: Client,
}

impl RestStore {
    /// Create a store sharing an existing HTTP client
    pub fn new(config: &TrackerConfig, client: Client) -> Self {
        Self {
            url: config.base_url(),
            key: config.anon_key.clone(),
            schema: config.options.db_schema.clone(),
            client_info: config.options.client_info.clone(),
            client,
        }
    }

    /// Table client authorized as the session's owner
    pub fn from(&self, table: &str, session: &Session) -> TableClient {
        TableClient::new(&self.url, &self.key, table, self.client.clone(), &self.client_info)
            .with_schema(&self.schema)
            .with_auth(&session.access_token)
    }

    async fn fetch_owned<T: DeserializeOwned>(
        &self,
        table: &str,
        session: &Session,
        order: &str,
        ascending: bool,
    ) -> Result<Vec<T>, Error> {
        let client = self.from(table, session);
        let mut query = client.select("*");
        query.eq("user_id", session.owner_id).order(order, ascending);
        query.execute::<T>().await
    }

    async fn insert_one<P, T>(&self, table: &str, session: &Session, values: &P) -> Result<T, Error>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let client = self.from(table, session);
        let rows = client.insert(values).execute::<T>().await?;
        first_row(rows, table)
    }

    async fn update_one<P, T>(
        &self,
        table: &str,
        session: &Session,
        id: Uuid,
        patch: &P,
    ) -> Result<T, Error>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let client = self.from(table, session);
        let mut update = client.update(patch);
        update.eq("id", id).eq("user_id", session.owner_id);
        let rows = update.execute::<T>().await?;
        first_row(rows, table).map_err(|_| Error::not_found(format!("{} {}", table, id)))
    }

    async fn delete_by_id(&self, table: &str, session: &Session, id: Uuid) -> Result<(), Error> {
        let client = self.from(table, session);
        let mut delete = client.delete();
        delete.eq("id", id).eq("user_id", session.owner_id);
        delete.execute().await
    }
}

fn first_row<T>(rows: Vec<T>, table: &str) -> Result<T, Error> {
    rows.into_iter()
        .next()
        .ok_or_else(|| Error::general(format!("{} write returned no rows", table)))
}

#[async_trait]
impl RecordStore for RestStore {
    async fn fetch_habits(&self, session: &Session) -> Result<Vec<HabitRow>, Error> {
        self.fetch_owned(HABITS_TABLE, session, "created_at", true).await
    }

    async fn fetch_completions(&self, session: &Session) -> Result<Vec<HabitCompletion>, Error> {
        self.fetch_owned(HABIT_COMPLETIONS_TABLE, session, "date", true)
            .await
    }

    async fn fetch_sleep_entries(&self, session: &Session) -> Result<Vec<SleepEntry>, Error> {
        self.fetch_owned(SLEEP_ENTRIES_TABLE, session, "date", true)
            .await
    }

    async fn fetch_tasks(&self, session: &Session) -> Result<Vec<Task>, Error> {
        self.fetch_owned(TASKS_TABLE, session, "date", true).await
    }

    async fn fetch_notes(&self, session: &Session) -> Result<Vec<Note>, Error> {
        self.fetch_owned(NOTES_TABLE, session, "created_at", false)
            .await
    }

    async fn insert_habit(&self, session: &Session, habit: &NewHabit) -> Result<HabitRow, Error> {
        self.insert_one(HABITS_TABLE, session, habit).await
    }

    async fn update_habit(
        &self,
        session: &Session,
        id: Uuid,
        patch: &HabitPatch,
    ) -> Result<HabitRow, Error> {
        self.update_one(HABITS_TABLE, session, id, patch).await
    }

    async fn delete_habit(&self, session: &Session, id: Uuid) -> Result<(), Error> {
        // completions are removed by the ON DELETE CASCADE foreign key
        self.delete_by_id(HABITS_TABLE, session, id).await
    }

    async fn insert_completion(
        &self,
        session: &Session,
        completion: &NewCompletion,
    ) -> Result<HabitCompletion, Error> {
        self.insert_one(HABIT_COMPLETIONS_TABLE, session, completion)
            .await
    }

    async fn delete_completion(
        &self,
        session: &Session,
        habit_id: Uuid,
        date: NaiveDate,
    ) -> Result<(), Error> {
        let client = self.from(HABIT_COMPLETIONS_TABLE, session);
        let mut delete = client.delete();
        delete
            .eq("habit_id", habit_id)
            .eq("date", date)
            .eq("user_id", session.owner_id);
        delete.execute().await
    }

    async fn upsert_sleep_entry(
        &self,
        session: &Session,
        entry: &NewSleepEntry,
    ) -> Result<SleepEntry, Error> {
        let client = self.from(SLEEP_ENTRIES_TABLE, session);
        let mut upsert = client.upsert(entry);
        upsert.on_conflict(SLEEP_CONFLICT_TARGET);
        let rows = upsert.execute::<SleepEntry>().await?;
        first_row(rows, SLEEP_ENTRIES_TABLE)
    }

    async fn delete_sleep_entry(&self, session: &Session, id: Uuid) -> Result<(), Error> {
        self.delete_by_id(SLEEP_ENTRIES_TABLE, session, id).await
    }

    async fn insert_task(&self, session: &Session, task: &NewTask) -> Result<Task, Error> {
        self.insert_one(TASKS_TABLE, session, task).await
    }

    async fn update_task(
        &self,
        session: &Session,
        id: Uuid,
        patch: &TaskPatch,
    ) -> Result<Task, Error> {
        self.update_one(TASKS_TABLE, session, id, patch).await
    }

    async fn delete_task(&self, session: &Session, id: Uuid) -> Result<(), Error> {
        self.delete_by_id(TASKS_TABLE, session, id).await
    }

    async fn insert_note(&self, session: &Session, note: &NewNote) -> Result<Note, Error> {
        self.insert_one(NOTES_TABLE, session, note).await
    }

    async fn update_note(
        &self,
        session: &Session,
        id: Uuid,
        patch: &NotePatch,
    ) -> Result<Note, Error> {
        self.update_one(NOTES_TABLE, session, id, patch).await
    }

    async fn delete_note(&self, session: &Session, id: Uuid) -> Result<(), Error> {
        self.delete_by_id(NOTES_TABLE, session, id).await
    }
}
