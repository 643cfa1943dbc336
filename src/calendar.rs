use actix_web::{web, HttpResponse};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::Task;

#[derive(Debug, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Buckets tasks into every day of the month. A task lands on each UTC day
/// from the day of its start to the day of its end, inclusive.
pub fn month_view(tasks: &[Task], year: i32, month: u32) -> AppResult<CalendarMonth> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::Validation(format!("Invalid month: {}-{}", year, month)))?;

    let days = first
        .iter_days()
        .take_while(|d| d.month() == month)
        .map(|date| CalendarDay {
            date,
            tasks: tasks
                .iter()
                .filter(|t| t.start_date.date_naive() <= date && date <= t.end_date.date_naive())
                .cloned()
                .collect(),
        })
        .collect();

    Ok(CalendarMonth { year, month, days })
}

pub async fn get_calendar(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
    query: web::Query<CalendarQuery>,
) -> AppResult<HttpResponse> {
    let today = Utc::now().date_naive();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());

    let tasks = data.registry.list_tasks(&user).await?;
    let view = month_view(&tasks, year, month)?;
    Ok(HttpResponse::Ok().json(view))
}
