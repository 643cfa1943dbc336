// src/registry.rs

use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::auth_gateway::AuthGateway;
use crate::error::{AppError, AppResult};
use crate::kv_store::KeyValueStore;
use crate::models::{parse_timestamp, CreateTaskRequest, Task, TaskStatus, User};

pub const TASK_PREFIX: &str = "task:";
pub const USER_TASKS_PREFIX: &str = "user_tasks:";

pub fn task_key(task_id: &str) -> String {
    format!("{}{}", TASK_PREFIX, task_id)
}

pub fn user_tasks_key(user_id: &str) -> String {
    format!("{}{}", USER_TASKS_PREFIX, user_id)
}

/// Task records plus the per-user reverse index of assigned task IDs.
///
/// Every mutation is a sequence of independent store writes. A failure part
/// way through a fan-out is logged and returned; earlier writes are kept.
#[derive(Clone)]
pub struct TaskRegistry {
    store: Arc<dyn KeyValueStore>,
    gateway: Arc<dyn AuthGateway>,
}

impl TaskRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, gateway: Arc<dyn AuthGateway>) -> Self {
        Self { store, gateway }
    }

    pub async fn create_task(&self, input: CreateTaskRequest, creator: &User) -> AppResult<Task> {
        require_admin(creator)?;

        let title = required_text(input.title, "title")?;
        let description = required_text(input.description, "description")?;
        let start_raw = required_text(input.start_date, "startDate")?;
        let end_raw = required_text(input.end_date, "endDate")?;
        let start_date = parse_timestamp(&start_raw)
            .ok_or_else(|| AppError::Validation(format!("Invalid startDate: {}", start_raw)))?;
        let end_date = parse_timestamp(&end_raw)
            .ok_or_else(|| AppError::Validation(format!("Invalid endDate: {}", end_raw)))?;
        if end_date <= start_date {
            return Err(AppError::Validation(
                "End date must be after start date".to_string(),
            ));
        }
        if let Some(location) = &input.location {
            location.validate()?;
        }

        let mut assigned_users: Vec<String> = Vec::new();
        for user_id in input.assigned_users.unwrap_or_default() {
            let user_id = user_id.trim().to_string();
            if !user_id.is_empty() && !assigned_users.contains(&user_id) {
                assigned_users.push(user_id);
            }
        }

        let work_area = input
            .work_area
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .unwrap_or_else(|| "general".to_string());

        let task = Task {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            start_date,
            end_date,
            location: input.location,
            assigned_users,
            work_area,
            priority: input.priority.unwrap_or_default(),
            status: TaskStatus::Pending,
            completed: false,
            completed_at: None,
            completed_by: None,
            created_by: creator.id.clone(),
            created_at: Utc::now(),
        };

        self.save_task(&task).await?;

        for user_id in &task.assigned_users {
            let mut task_ids = self.load_user_tasks(user_id).await.inspect_err(|e| {
                error!("Failed to read task index of {} for {}: {}", user_id, task.id, e)
            })?;
            task_ids.push(task.id.clone());
            self.save_user_tasks(user_id, &task_ids).await.inspect_err(|e| {
                error!("Failed to index task {} for user {}: {}", task.id, user_id, e)
            })?;
        }

        info!(
            "Task created: {} by {} ({} assignees)",
            task.id,
            creator.id,
            task.assigned_users.len()
        );
        Ok(task)
    }

    /// Admins see every task; everyone else sees what their reverse index
    /// resolves to, skipping IDs whose record is gone.
    pub async fn list_tasks(&self, requester: &User) -> AppResult<Vec<Task>> {
        if requester.is_admin() {
            let values = self.store.get_by_prefix(TASK_PREFIX).await?;
            return Ok(values.into_iter().filter_map(decode_task).collect());
        }

        let mut tasks = Vec::new();
        for task_id in self.load_user_tasks(&requester.id).await? {
            match self.load_task(&task_id).await? {
                Some(task) => tasks.push(task),
                None => warn!("Dangling task {} in index of {}", task_id, requester.id),
            }
        }
        Ok(tasks)
    }

    pub async fn get_task(&self, task_id: &str, requester: &User) -> AppResult<Task> {
        let task = self.require_task(task_id).await?;
        require_admin_or_assignee(&task, requester)?;
        Ok(task)
    }

    /// Marks a task completed. Completing twice re-stamps the metadata.
    pub async fn complete_task(&self, task_id: &str, requester: &User) -> AppResult<Task> {
        let mut task = self.require_task(task_id).await?;
        require_admin_or_assignee(&task, requester)?;

        task.completed = true;
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        task.completed_by = Some(requester.id.clone());
        self.save_task(&task).await?;

        info!("Task completed: {} by {}", task.id, requester.id);
        Ok(task)
    }

    pub async fn delete_task(&self, task_id: &str, requester: &User) -> AppResult<()> {
        require_admin(requester)?;
        let task = self.require_task(task_id).await?;

        for user_id in &task.assigned_users {
            let task_ids: Vec<String> = self
                .load_user_tasks(user_id)
                .await
                .inspect_err(|e| {
                    error!("Failed to read task index of {} for {}: {}", user_id, task_id, e)
                })?
                .into_iter()
                .filter(|id| id != task_id)
                .collect();
            self.save_user_tasks(user_id, &task_ids).await.inspect_err(|e| {
                error!("Failed to unindex task {} for user {}: {}", task_id, user_id, e)
            })?;
        }

        self.store.delete(&task_key(task_id)).await?;
        info!("Task deleted: {} by {}", task_id, requester.id);
        Ok(())
    }

    /// Removes `user_id` from every task they hold, drops their index entry
    /// and finally deletes the account itself.
    pub async fn delete_user_cascade(&self, user_id: &str, requester: &User) -> AppResult<()> {
        require_admin(requester)?;
        if user_id == requester.id {
            return Err(AppError::Conflict("Cannot delete your own account".to_string()));
        }
        if self.gateway.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        for task_id in self.load_user_tasks(user_id).await? {
            let Some(mut task) = self.load_task(&task_id).await? else {
                continue;
            };
            task.assigned_users.retain(|id| id != user_id);
            self.save_task(&task).await.inspect_err(|e| {
                error!("Failed to unassign {} from task {}: {}", user_id, task_id, e)
            })?;
        }

        self.store
            .delete(&user_tasks_key(user_id))
            .await
            .inspect_err(|e| error!("Failed to drop task index of {}: {}", user_id, e))?;

        if !self.gateway.delete_user(user_id).await? {
            warn!("Account {} vanished before it could be deleted", user_id);
        }
        info!("User deleted: {} by {}", user_id, requester.id);
        Ok(())
    }

    async fn require_task(&self, task_id: &str) -> AppResult<Task> {
        self.load_task(task_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
    }

    async fn load_task(&self, task_id: &str) -> AppResult<Option<Task>> {
        match self.store.get(&task_key(task_id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save_task(&self, task: &Task) -> AppResult<()> {
        self.store.set(&task_key(&task.id), serde_json::to_value(task)?).await
    }

    async fn load_user_tasks(&self, user_id: &str) -> AppResult<Vec<String>> {
        match self.store.get(&user_tasks_key(user_id)).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_user_tasks(&self, user_id: &str, task_ids: &[String]) -> AppResult<()> {
        self.store
            .set(&user_tasks_key(user_id), serde_json::to_value(task_ids)?)
            .await
    }
}

fn decode_task(value: Value) -> Option<Task> {
    match serde_json::from_value::<Task>(value) {
        Ok(task) => Some(task),
        Err(e) => {
            warn!("Skipping malformed task record: {}", e);
            None
        }
    }
}

fn required_text(value: Option<String>, field: &str) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!(
            "Title, description, start date, and end date are required (missing {})",
            field
        ))),
    }
}

pub fn require_admin(user: &User) -> AppResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "Unauthorized - Admin access required".to_string(),
        ))
    }
}

fn require_admin_or_assignee(task: &Task, user: &User) -> AppResult<()> {
    if user.is_admin() || task.is_assigned_to(&user.id) {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "Unauthorized - Not assigned to this task".to_string(),
        ))
    }
}
