// src/work_area.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::{info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::kv_store::KeyValueStore;
use crate::models::{is_hex_color, CreateWorkAreaRequest, User, WorkArea, DEFAULT_COLOR};
use crate::registry::require_admin;

pub const WORK_AREA_PREFIX: &str = "work_area:";

fn work_area_key(id: &str) -> String {
    format!("{}{}", WORK_AREA_PREFIX, id)
}

pub async fn create(
    store: &dyn KeyValueStore,
    input: CreateWorkAreaRequest,
    creator: &User,
) -> AppResult<WorkArea> {
    require_admin(creator)?;

    let name = input
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("Work area name is required".to_string()))?;
    let color = input.color.unwrap_or_else(|| DEFAULT_COLOR.to_string());
    if !is_hex_color(&color) {
        return Err(AppError::Validation(format!("Invalid color: {}", color)));
    }

    let area = WorkArea {
        id: Uuid::new_v4().to_string(),
        name,
        description: input.description.unwrap_or_default().trim().to_string(),
        area_type: input.area_type.unwrap_or_default(),
        color,
        created_by: creator.id.clone(),
        created_at: Utc::now(),
    };
    store
        .set(&work_area_key(&area.id), serde_json::to_value(&area)?)
        .await?;
    info!("Work area created: {} ({})", area.id, area.name);
    Ok(area)
}

/// All work areas, sorted by name.
pub async fn list(store: &dyn KeyValueStore) -> AppResult<Vec<WorkArea>> {
    let mut areas: Vec<WorkArea> = store
        .get_by_prefix(WORK_AREA_PREFIX)
        .await?
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(area) => Some(area),
            Err(e) => {
                warn!("Skipping malformed work area record: {}", e);
                None
            }
        })
        .collect();
    areas.sort_by_key(|a: &WorkArea| a.name.to_lowercase());
    Ok(areas)
}

/// Tasks tagged with the area keep their tag.
pub async fn delete(store: &dyn KeyValueStore, id: &str, requester: &User) -> AppResult<()> {
    require_admin(requester)?;
    if !store.delete(&work_area_key(id)).await? {
        return Err(AppError::NotFound("Work area not found".to_string()));
    }
    info!("Work area deleted: {} by {}", id, requester.id);
    Ok(())
}

pub async fn create_work_area(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
    payload: web::Json<CreateWorkAreaRequest>,
) -> AppResult<HttpResponse> {
    let area = create(data.store.as_ref(), payload.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(json!({ "workArea": area })))
}

pub async fn list_work_areas(
    AuthUser(_user): AuthUser,
    data: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let areas = list(data.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "workAreas": areas })))
}

pub async fn delete_work_area(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    delete(data.store.as_ref(), &path, &user).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Work area deleted successfully" })))
}
