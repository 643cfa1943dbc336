use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

/// What a task looks like to someone viewing it at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Completed,
    Pending,
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(AppError::Validation(format!("Invalid latitude: {}", self.lat)));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(AppError::Validation(format!("Invalid longitude: {}", self.lng)));
        }
        Ok(())
    }
}

/// A unit of assigned work, stored under `task:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Kept free of duplicates; mirrored by each user's `user_tasks:<id>` entry.
    #[serde(default)]
    pub assigned_users: Vec<String>,
    pub work_area: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assigned_users.iter().any(|u| u == user_id)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.end_date < now
    }

    pub fn state(&self, now: DateTime<Utc>) -> TaskState {
        if self.completed {
            TaskState::Completed
        } else if self.is_overdue(now) {
            TaskState::Overdue
        } else {
            TaskState::Pending
        }
    }
}

/// Body of `POST /tasks`. Required fields are optional here so that their
/// absence is reported as a validation error instead of a decode failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub location: Option<Location>,
    pub assigned_users: Option<Vec<String>>,
    pub work_area: Option<String>,
    pub priority: Option<Priority>,
}

/// Accepts RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` / `YYYY-MM-DD`
/// which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
    Overdue,
}

impl StatusFilter {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "all" => Ok(StatusFilter::All),
            "pending" => Ok(StatusFilter::Pending),
            "completed" => Ok(StatusFilter::Completed),
            "overdue" => Ok(StatusFilter::Overdue),
            other => Err(AppError::Validation(format!("Unknown status filter: {}", other))),
        }
    }
}

/// Query string of `GET /tasks`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    pub status: Option<String>,
    pub work_area: Option<String>,
    pub search: Option<String>,
}

impl TaskFilter {
    /// Applies the filter to an already role-scoped task list.
    pub fn apply(&self, tasks: Vec<Task>, now: DateTime<Utc>) -> Result<Vec<Task>, AppError> {
        let status = match self.status.as_deref() {
            Some(raw) => StatusFilter::parse(raw)?,
            None => StatusFilter::All,
        };
        let work_area = self.work_area.as_deref().filter(|w| *w != "all");
        let needle = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        Ok(tasks
            .into_iter()
            .filter(|task| match status {
                StatusFilter::All => true,
                StatusFilter::Completed => task.completed,
                // pending here means "not completed", overdue ones included
                StatusFilter::Pending => !task.completed,
                StatusFilter::Overdue => task.is_overdue(now),
            })
            .filter(|task| work_area.map_or(true, |w| task.work_area == w))
            .filter(|task| {
                needle.as_ref().map_or(true, |n| {
                    task.title.to_lowercase().contains(n)
                        || task.description.to_lowercase().contains(n)
                })
            })
            .collect())
    }
}
