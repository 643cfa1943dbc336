use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{Task, TaskState};

#[derive(Debug, Serialize)]
pub struct MapMarker {
    pub task: Task,
    pub state: TaskState,
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapTotals {
    pub with_location: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
}

#[derive(Debug, Serialize)]
pub struct MapView {
    pub markers: Vec<MapMarker>,
    pub totals: MapTotals,
}

/// Pins for every task carrying a location.
pub fn build(tasks: Vec<Task>, now: DateTime<Utc>) -> MapView {
    let mut totals = MapTotals::default();
    let markers: Vec<MapMarker> = tasks
        .into_iter()
        .filter(|t| t.location.is_some())
        .map(|task| {
            let state = task.state(now);
            match state {
                TaskState::Completed => totals.completed += 1,
                TaskState::Pending => totals.pending += 1,
                TaskState::Overdue => totals.overdue += 1,
            }
            MapMarker { task, state }
        })
        .collect();
    totals.with_location = markers.len();
    MapView { markers, totals }
}

pub async fn get_map(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let tasks = data.registry.list_tasks(&user).await?;
    Ok(HttpResponse::Ok().json(build(tasks, Utc::now())))
}
