// src/routes.rs

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::auth::{login, profile, signup};
use crate::calendar::get_calendar;
use crate::dashboard_data::get_stats;
use crate::error::AppError;
use crate::map_view::get_map;
use crate::task::{complete_task, create_task, delete_task, get_task, list_tasks};
use crate::user_management::{delete_user, list_users};
use crate::work_area::{create_work_area, delete_work_area, list_work_areas};

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Full route table. Extractor failures are reported as JSON validation errors.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("Invalid request body: {}", err)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("Invalid query string: {}", err)).into()
    }))
    .route("/health", web::get().to(health))
    .route("/signup", web::post().to(signup))
    .route("/login", web::post().to(login))
    .route("/profile", web::get().to(profile))
    .route("/stats", web::get().to(get_stats))
    // TASKS
    .service(
        web::scope("/tasks")
            .service(
                web::resource("")
                    .route(web::post().to(create_task))
                    .route(web::get().to(list_tasks)),
            )
            // fixed segments before "/{task_id}"
            .route("/calendar", web::get().to(get_calendar))
            .route("/map", web::get().to(get_map))
            .service(
                web::resource("/{task_id}")
                    .route(web::get().to(get_task))
                    .route(web::delete().to(delete_task)),
            )
            .route("/{task_id}/complete", web::put().to(complete_task)),
    )
    // USERS
    .service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("/{user_id}", web::delete().to(delete_user)),
    )
    // WORK AREAS
    .service(
        web::scope("/work-areas")
            .service(
                web::resource("")
                    .route(web::post().to(create_work_area))
                    .route(web::get().to(list_work_areas)),
            )
            .route("/{area_id}", web::delete().to(delete_work_area)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;

    use crate::app_state::AppState;
    use crate::auth::Authentication;
    use crate::auth_gateway::{MemoryAuthGateway, TokenIssuer};
    use crate::kv_store::MemoryKvStore;

    fn state() -> AppState {
        let tokens = TokenIssuer::new("test-secret", 1);
        AppState::new(
            Arc::new(MemoryKvStore::new()),
            Arc::new(MemoryAuthGateway::new(tokens)),
        )
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(state()))
                    .wrap(Authentication)
                    .configure(configure),
            )
            .await
        };
    }

    macro_rules! send {
        ($app:expr, $req:expr) => {{
            let resp = test::call_service(&$app, $req.to_request()).await;
            let status = resp.status();
            let body: Value = test::read_body_json(resp).await;
            (status, body)
        }};
    }

    macro_rules! account {
        ($app:expr, $email:expr, $role:expr) => {{
            let (status, body) = send!(
                $app,
                test::TestRequest::post().uri("/signup").set_json(json!({
                    "email": $email,
                    "password": "s3cret-pass",
                    "name": $email,
                    "role": $role,
                }))
            );
            assert_eq!(status, StatusCode::OK, "{}", body);
            let (status, session) = send!(
                $app,
                test::TestRequest::post()
                    .uri("/login")
                    .set_json(json!({ "email": $email, "password": "s3cret-pass" }))
            );
            assert_eq!(status, StatusCode::OK, "{}", session);
            (
                session["user"]["id"].as_str().unwrap().to_string(),
                format!("Bearer {}", session["token"].as_str().unwrap()),
            )
        }};
    }

    #[actix_web::test]
    async fn health_needs_no_token() {
        let app = app!();
        let (status, body) = send!(app, test::TestRequest::get().uri("/health"));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[actix_web::test]
    async fn missing_and_invalid_tokens_are_rejected() {
        let app = app!();
        let (status, body) = send!(app, test::TestRequest::get().uri("/profile"));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, body) = send!(
            app,
            test::TestRequest::get()
                .uri("/tasks")
                .insert_header(("Authorization", "Bearer not-a-jwt"))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("Invalid token"));
    }

    #[actix_web::test]
    async fn signup_validates_input() {
        let app = app!();
        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/signup")
                .set_json(json!({ "email": "a@example.com", "password": "x" }))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email, password, and name are required");

        let (status, _) = send!(
            app,
            test::TestRequest::post().uri("/signup").set_json(json!({
                "email": "a@example.com", "password": "x", "name": "A", "role": "root"
            }))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/signup")
                .insert_header(("Content-Type", "application/json"))
                .set_payload("{not json")
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn profile_returns_identity_without_credentials() {
        let app = app!();
        let (id, token) = account!(app, "ana@example.com", "user");
        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/profile").insert_header(("Authorization", token))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], id.as_str());
        assert_eq!(body["user"]["role"], "user");
        assert!(body["user"].get("passwordHash").is_none());
        assert!(body["user"].get("password_hash").is_none());
    }

    #[actix_web::test]
    async fn task_lifecycle_for_an_assignee() {
        let app = app!();
        let (_, admin) = account!(app, "admin@example.com", "admin");
        let (u1, u1_token) = account!(app, "u1@example.com", "user");
        let (_, other_token) = account!(app, "u2@example.com", "user");

        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/tasks")
                .insert_header(("Authorization", admin.clone()))
                .set_json(json!({
                    "title": "Inspect pipes",
                    "description": "Main line on Av. Mitre",
                    "startDate": "2025-01-01T08:00",
                    "endDate": "2025-01-01T10:00",
                    "assignedUsers": [u1],
                    "location": { "lat": -27.3676, "lng": -55.8967, "address": "Posadas" },
                }))
        );
        assert_eq!(status, StatusCode::OK, "{}", body);
        let task_id = body["task"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["task"]["priority"], "medium");
        assert_eq!(body["task"]["workArea"], "general");
        assert_eq!(body["task"]["status"], "pending");

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/tasks").insert_header(("Authorization", u1_token.clone()))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tasks"].as_array().unwrap().len(), 1);
        assert_eq!(body["tasks"][0]["completed"], false);

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/tasks").insert_header(("Authorization", other_token.clone()))
        );
        assert_eq!(status, StatusCode::OK);
        assert!(body["tasks"].as_array().unwrap().is_empty());

        let complete_uri = format!("/tasks/{}/complete", task_id);
        let (status, _) = send!(
            app,
            test::TestRequest::put()
                .uri(&complete_uri)
                .insert_header(("Authorization", other_token))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send!(
            app,
            test::TestRequest::put()
                .uri(&complete_uri)
                .insert_header(("Authorization", u1_token.clone()))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"]["completed"], true);
        assert_eq!(body["task"]["completedBy"], u1.as_str());
        assert_eq!(body["task"]["status"], "completed");

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/tasks/map").insert_header(("Authorization", u1_token.clone()))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totals"]["withLocation"], 1);
        assert_eq!(body["markers"][0]["state"], "completed");

        let (status, body) = send!(
            app,
            test::TestRequest::get()
                .uri("/tasks/calendar?year=2025&month=1")
                .insert_header(("Authorization", u1_token.clone()))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["days"].as_array().unwrap().len(), 31);
        assert_eq!(body["days"][0]["tasks"][0]["id"], task_id.as_str());

        let task_uri = format!("/tasks/{}", task_id);
        let (status, _) = send!(
            app,
            test::TestRequest::delete().uri(&task_uri).insert_header(("Authorization", u1_token.clone()))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send!(
            app,
            test::TestRequest::delete().uri(&task_uri).insert_header(("Authorization", admin.clone()))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Task deleted successfully");

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/tasks").insert_header(("Authorization", u1_token))
        );
        assert_eq!(status, StatusCode::OK);
        assert!(body["tasks"].as_array().unwrap().is_empty());

        let (status, body) = send!(
            app,
            test::TestRequest::delete().uri(&task_uri).insert_header(("Authorization", admin))
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Task not found");
    }

    #[actix_web::test]
    async fn inverted_dates_and_non_admin_creation_fail() {
        let app = app!();
        let (_, admin) = account!(app, "admin@example.com", "admin");
        let (_, user) = account!(app, "u1@example.com", "user");
        let body = json!({
            "title": "Paint",
            "description": "Mural",
            "startDate": "2025-01-02T08:00",
            "endDate": "2025-01-01T08:00",
        });

        let (status, _) = send!(
            app,
            test::TestRequest::post()
                .uri("/tasks")
                .insert_header(("Authorization", admin))
                .set_json(body.clone())
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/tasks")
                .insert_header(("Authorization", user))
                .set_json(body)
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized - Admin access required");
    }

    #[actix_web::test]
    async fn user_deletion_cascades_and_refuses_self() {
        let app = app!();
        let (admin_id, admin) = account!(app, "admin@example.com", "admin");
        let (u1, _) = account!(app, "u1@example.com", "user");
        let (u2, _) = account!(app, "u2@example.com", "user");

        let (_, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/tasks")
                .insert_header(("Authorization", admin.clone()))
                .set_json(json!({
                    "title": "Sweep plaza",
                    "description": "Plaza 9 de Julio",
                    "startDate": "2025-02-01T08:00:00Z",
                    "endDate": "2025-02-01T12:00:00Z",
                    "assignedUsers": [u1, u2],
                    "priority": "high",
                }))
        );
        let task_uri = format!("/tasks/{}", body["task"]["id"].as_str().unwrap());

        let (status, body) = send!(
            app,
            test::TestRequest::delete()
                .uri(&format!("/users/{}", admin_id))
                .insert_header(("Authorization", admin.clone()))
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Cannot delete your own account");

        let (status, _) = send!(
            app,
            test::TestRequest::delete()
                .uri(&format!("/users/{}", u1))
                .insert_header(("Authorization", admin.clone()))
        );
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send!(
            app,
            test::TestRequest::get().uri(&task_uri).insert_header(("Authorization", admin.clone()))
        );
        assert_eq!(body["task"]["assignedUsers"], json!([u2]));

        let (_, body) = send!(
            app,
            test::TestRequest::get().uri("/users").insert_header(("Authorization", admin.clone()))
        );
        assert_eq!(body["users"].as_array().unwrap().len(), 2);

        let (status, _) = send!(
            app,
            test::TestRequest::delete()
                .uri("/users/nobody")
                .insert_header(("Authorization", admin))
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn stats_and_work_areas() {
        let app = app!();
        let (_, admin) = account!(app, "admin@example.com", "admin");
        let (_, user) = account!(app, "u1@example.com", "user");

        let (status, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/work-areas")
                .insert_header(("Authorization", admin.clone()))
                .set_json(json!({ "name": "Centro", "type": "sector" }))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["workArea"]["type"], "sector");
        assert_eq!(body["workArea"]["color"], "#10B981");

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/work-areas").insert_header(("Authorization", user.clone()))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["workAreas"][0]["name"], "Centro");

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/stats").insert_header(("Authorization", admin))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalTasks"], 0);
        assert_eq!(body["totalUsers"], 2);
        assert_eq!(body["adminUsers"], 1);

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/stats").insert_header(("Authorization", user))
        );
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("totalUsers").is_none());
    }

    #[actix_web::test]
    async fn login_with_bad_credentials_is_unauthorized() {
        let app = app!();
        account!(app, "ana@example.com", "user");

        for (email, password) in [("ana@example.com", "wrong"), ("nobody@example.com", "s3cret-pass")] {
            let (status, body) = send!(
                app,
                test::TestRequest::post()
                    .uri("/login")
                    .set_json(json!({ "email": email, "password": password }))
            );
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "Invalid login credentials");
        }
    }

    #[actix_web::test]
    async fn single_task_and_calendar_are_scoped_to_assignees() {
        let app = app!();
        let (_, admin) = account!(app, "admin@example.com", "admin");
        let (u1, u1_token) = account!(app, "u1@example.com", "user");
        let (_, outsider) = account!(app, "u2@example.com", "user");

        let (_, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/tasks")
                .insert_header(("Authorization", admin.clone()))
                .set_json(json!({
                    "title": "Fix streetlight",
                    "description": "Corner of Bolivar and Colon",
                    "startDate": "2025-03-10T18:00",
                    "endDate": "2025-03-10T20:00",
                    "assignedUsers": [u1],
                }))
        );
        let task_id = body["task"]["id"].as_str().unwrap().to_string();
        let task_uri = format!("/tasks/{}", task_id);

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri(&task_uri).insert_header(("Authorization", u1_token.clone()))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"]["id"], task_id.as_str());

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri(&task_uri).insert_header(("Authorization", outsider.clone()))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized - Not assigned to this task");

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri("/tasks/missing").insert_header(("Authorization", u1_token.clone()))
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Task not found");

        let calendar = "/tasks/calendar?year=2025&month=3";
        let (status, body) = send!(
            app,
            test::TestRequest::get().uri(calendar).insert_header(("Authorization", u1_token))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["days"][9]["tasks"][0]["id"], task_id.as_str());

        let (status, body) = send!(
            app,
            test::TestRequest::get().uri(calendar).insert_header(("Authorization", outsider))
        );
        assert_eq!(status, StatusCode::OK);
        let days = body["days"].as_array().unwrap();
        assert_eq!(days.len(), 31);
        assert!(days.iter().all(|day| day["tasks"].as_array().unwrap().is_empty()));
    }

    #[actix_web::test]
    async fn work_area_deletion_is_admin_only_and_not_found_twice() {
        let app = app!();
        let (_, admin) = account!(app, "admin@example.com", "admin");
        let (_, user) = account!(app, "u1@example.com", "user");

        let (_, body) = send!(
            app,
            test::TestRequest::post()
                .uri("/work-areas")
                .insert_header(("Authorization", admin.clone()))
                .set_json(json!({ "name": "Villa Cabello" }))
        );
        let area_uri = format!("/work-areas/{}", body["workArea"]["id"].as_str().unwrap());

        let (status, _) = send!(
            app,
            test::TestRequest::delete().uri(&area_uri).insert_header(("Authorization", user.clone()))
        );
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send!(
            app,
            test::TestRequest::delete().uri(&area_uri).insert_header(("Authorization", admin.clone()))
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Work area deleted successfully");

        let (_, body) = send!(
            app,
            test::TestRequest::get().uri("/work-areas").insert_header(("Authorization", user))
        );
        assert!(body["workAreas"].as_array().unwrap().is_empty());

        let (status, body) = send!(
            app,
            test::TestRequest::delete().uri(&area_uri).insert_header(("Authorization", admin))
        );
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Work area not found");
    }
}
