use actix_web::{web, HttpResponse};
use log::info;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::auth_gateway::AuthGateway;
use crate::error::AppResult;
use crate::registry::require_admin;

pub async fn list_users(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    require_admin(&user)?;
    let users = data.gateway.list_users().await?;
    Ok(HttpResponse::Ok().json(json!({ "users": users })))
}

pub async fn delete_user(
    AuthUser(user): AuthUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let target = path.into_inner();
    info!("Admin {} deleting user {}", user.id, target);
    data.registry.delete_user_cascade(&target, &user).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "User deleted successfully" })))
}
