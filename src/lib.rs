//! Habit Sync
//!
//! Client-side data layer for a personal habit, sleep, task and notes tracker
//! backed by a Supabase project. Records live in PostgREST tables guarded by
//! `auth.uid() = user_id` row-level-security policies; [`sync::HabitSync`]
//! mirrors one owner's records in memory and [`metrics`] derives streaks and
//! completion rates from that mirror.

pub mod config;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod models;
pub mod notice;
pub mod postgrest;
pub mod session;
pub mod store;
pub mod sync;

use reqwest::Client;

use crate::config::TrackerConfig;
use crate::error::Error;
use crate::postgrest::TableClient;
use crate::session::Session;
use crate::store::RestStore;
use crate::sync::HabitSync;

/// The main entry point for talking to the tracker's Supabase project
pub struct Tracker {
    /// Connection settings
    pub config: TrackerConfig,
    /// HTTP client used for requests
    pub http_client: Client,
}

impl Tracker {
    /// Create a new tracker client
    ///
    /// # Example
    ///
    /// ```
    /// use habit_sync::{config::TrackerConfig, Tracker};
    ///
    /// let config =
    ///     TrackerConfig::new("https://your-project-url.supabase.co", "your-anon-key").unwrap();
    /// let tracker = Tracker::new(config).unwrap();
    /// ```
    pub fn new(config: TrackerConfig) -> Result<Self, Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Create a tracker client from `SUPABASE_URL` / `SUPABASE_ANON_KEY`
    pub fn from_env() -> Result<Self, Error> {
        Self::new(TrackerConfig::from_env()?)
    }

    /// Table client for ad-hoc queries, authorized as the session's owner
    pub fn from(&self, table: &str, session: &Session) -> TableClient {
        self.store().from(table, session)
    }

    /// Record store backed by the project's REST endpoint
    pub fn store(&self) -> RestStore {
        RestStore::new(&self.config, self.http_client.clone())
    }

    /// Sync hook bound to `session`, or unbound when `None`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use habit_sync::{session::Session, Tracker};
    ///
    /// # async fn run(access_token: &str) -> Result<(), habit_sync::error::Error> {
    /// let tracker = Tracker::from_env()?;
    /// let mut sync = tracker.sync(Some(Session::from_access_token(access_token)?));
    /// sync.load().await?;
    /// println!("streak: {}", sync.summary_today().streak);
    /// # Ok(())
    /// # }
    /// ```
    pub fn sync(&self, session: Option<Session>) -> HabitSync<RestStore> {
        let mut sync = HabitSync::new(self.store());
        sync.set_session(session);
        sync
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::{TrackerConfig, TrackerOptions};
    pub use crate::error::Error;
    pub use crate::metrics::Summary;
    pub use crate::models::*;
    pub use crate::notice::{Notice, NoticeLevel};
    pub use crate::session::Session;
    pub use crate::store::{MemoryStore, RecordStore, RestStore};
    pub use crate::sync::{HabitSync, TrackerState};
    pub use crate::Tracker;
}
