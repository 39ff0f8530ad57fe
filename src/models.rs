//! Records mirrored from the store, and the payloads written to it

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::Error;

/// Upper bound for a night's sleep
pub const MAX_SLEEP_HOURS: f64 = 24.0;

/// A row of the `habits` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

/// A habit joined with the dates it was completed on
#[derive(Debug, Clone, PartialEq)]
pub struct Habit {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub completed_days: BTreeSet<NaiveDate>,
}

impl Habit {
    /// Join a habit row with its completion dates
    pub fn from_row(row: HabitRow, completed_days: BTreeSet<NaiveDate>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color: row.color,
            created_at: row.created_at,
            completed_days,
        }
    }

    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.completed_days.contains(&date)
    }
}

/// A row of the `habit_completions` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitCompletion {
    pub id: Uuid,
    pub habit_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A row of the `sleep_entries` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub hours: f64,
    pub created_at: DateTime<Utc>,
}

/// A row of the `tasks` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub completed: bool,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row of the `notes` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a habit; id and created_at come from the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewHabit {
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
}

/// Fields of a habit that may change after creation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HabitPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl HabitPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCompletion {
    pub habit_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
}

/// Upsert payload for a night of sleep, keyed on (user_id, date)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSleepEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTask {
    pub user_id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub completed: bool,
    pub color: Option<String>,
}

/// Fields of a task that may change after creation.
///
/// `color: Some(None)` clears the color.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Option<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.date.is_none()
            && self.completed.is_none()
            && self.color.is_none()
    }

    /// Apply the patch to a local copy
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(date) = self.date {
            task.date = date;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(color) = &self.color {
            task.color = color.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNote {
    pub user_id: Uuid,
    pub content: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl NotePatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.date.is_none()
    }

    pub fn apply(&self, note: &mut Note) {
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(date) = self.date {
            note.date = date;
        }
    }
}

/// Clamp hours to `[0, 24]` and round to one decimal place
pub fn normalize_sleep_hours(hours: f64) -> Result<f64, Error> {
    if !hours.is_finite() {
        return Err(Error::invalid_input(format!("sleep hours must be a number, got {}", hours)));
    }
    let clamped = hours.clamp(0.0, MAX_SLEEP_HOURS);
    Ok((clamped * 10.0).round() / 10.0)
}
