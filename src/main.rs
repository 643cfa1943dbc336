// src/main.rs

mod app_state;
mod auth;
mod auth_gateway;
mod calendar;
mod config;
mod dashboard_data;
mod db;
mod error;
mod kv_store;
mod map_view;
mod models;
mod registry;
mod routes;
mod task;
mod user_management;
mod work_area;

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};

use crate::app_state::AppState;
use crate::auth::Authentication;
use crate::auth_gateway::{AuthGateway, MemoryAuthGateway, MongoAuthGateway, TokenIssuer};
use crate::config::Config;
use crate::db::MongoDB;
use crate::error::AppError;
use crate::kv_store::{KeyValueStore, MemoryKvStore, MongoKvStore};

async fn build_state(config: &Config) -> Result<AppState, AppError> {
    let tokens = TokenIssuer::new(&config.jwt_secret, config.token_ttl_hours);

    if config.uses_memory_backend() {
        warn!("Using in-memory store and accounts; nothing will be persisted");
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
        let gateway: Arc<dyn AuthGateway> = Arc::new(MemoryAuthGateway::new(tokens));
        return Ok(AppState::new(store, gateway));
    }

    let mongodb = MongoDB::init(&config.mongo_uri, &config.database_name).await?;
    let store: Arc<dyn KeyValueStore> = Arc::new(MongoKvStore::new(&mongodb, &config.kv_collection));
    let gateway: Arc<dyn AuthGateway> = Arc::new(MongoAuthGateway::new(&mongodb, tokens).await?);
    Ok(AppState::new(store, gateway))
}

fn cors(frontend_origin: &str) -> Cors {
    let cors = if frontend_origin == "*" {
        Cors::default().allow_any_origin()
    } else {
        Cors::default()
            .allowed_origin(frontend_origin)
            .supports_credentials()
    };
    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            http::header::CONTENT_TYPE,
            http::header::ACCEPT,
            http::header::AUTHORIZATION,
        ])
        .expose_headers(vec![http::header::CONTENT_LENGTH])
        .max_age(600)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| {
        error!("{}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let bind_address = config.bind_address.clone();
    let frontend_origin = config.frontend_origin.clone();

    let state = build_state(&config).await.map_err(|e| {
        error!("Startup failed: {}", e);
        io::Error::new(io::ErrorKind::Other, e.to_string())
    })?;

    info!("Server running at http://{}", bind_address);
    info!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        App::new()
            .wrap(Authentication)
            .wrap(cors(&frontend_origin))
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(bind_address)?
    .run()
    .await
}
