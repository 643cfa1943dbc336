// src/dashboard_data.rs

use std::collections::BTreeMap;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::auth_gateway::AuthGateway;
use crate::error::AppResult;
use crate::models::{Task, TaskState, User};

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// Not completed and not yet past their end date.
    pub pending_tasks: usize,
    pub overdue_tasks: usize,
    pub tasks_with_location: usize,
    pub tasks_this_week: usize,
    /// Whole percent; 0 when there are no tasks.
    pub completion_rate: u32,
    pub by_work_area: BTreeMap<String, usize>,
    pub top_work_area: Option<String>,
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: usize,
    pub admin_users: usize,
    pub regular_users: usize,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    #[serde(flatten)]
    pub tasks: TaskStats,
    #[serde(flatten)]
    pub users: Option<UserStats>,
}

pub fn task_stats(tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    let mut stats = TaskStats {
        total_tasks: tasks.len(),
        ..Default::default()
    };

    // Sunday-to-Saturday week containing `now`
    let today = now.date_naive();
    let week_start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
    let week_end = week_start + Duration::days(6);

    for task in tasks {
        match task.state(now) {
            TaskState::Completed => stats.completed_tasks += 1,
            TaskState::Pending => stats.pending_tasks += 1,
            TaskState::Overdue => stats.overdue_tasks += 1,
        }
        if task.location.is_some() {
            stats.tasks_with_location += 1;
        }
        let start = task.start_date.date_naive();
        if week_start <= start && start <= week_end {
            stats.tasks_this_week += 1;
        }
        *stats.by_work_area.entry(task.work_area.clone()).or_insert(0) += 1;
    }

    if stats.total_tasks > 0 {
        stats.completion_rate =
            ((stats.completed_tasks as f64 / stats.total_tasks as f64) * 100.0).round() as u32;
    }
    stats.top_work_area = stats
        .by_work_area
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(area, _)| area.clone());
    stats
}

pub fn user_stats(users: &[User]) -> UserStats {
    let admin_users = users.iter().filter(|u| u.is_admin()).count();
    UserStats {
        total_users: users.len(),
        admin_users,
        regular_users: users.len() - admin_users,
    }
}

pub async fn get_stats(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let tasks = data.registry.list_tasks(&user).await?;
    let users = if user.is_admin() {
        Some(user_stats(&data.gateway.list_users().await?))
    } else {
        None
    };
    Ok(HttpResponse::Ok().json(DashboardStats {
        tasks: task_stats(&tasks, Utc::now()),
        users,
    }))
}
