use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http, web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError,
};
use futures::future::{err, ok, Ready};
use log::warn;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth_gateway::{AuthGateway, NewAccount};
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};

#[derive(Deserialize)]
pub struct SignupInfo {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginInfo {
    pub email: String,
    pub password: String,
}

/// Resolves `Authorization: Bearer <token>` through the auth gateway and
/// stores the resulting [`User`] in the request extensions.
///
/// Requests without a bearer token pass through untouched; handlers that need
/// an identity reject them through [`AuthUser`].
#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            if let Some(token) = bearer_token(&req) {
                let resolved = match req.app_data::<web::Data<AppState>>() {
                    Some(state) => state.gateway.verify_token(&token).await,
                    None => Err(AppError::Config("application state missing".to_string())),
                };
                match resolved {
                    Ok(user) => {
                        req.extensions_mut().insert(user);
                    }
                    Err(e) => {
                        warn!("Rejected bearer token on {}: {}", req.path(), e);
                        let (req_parts, _payload) = req.into_parts();
                        let resp = e.error_response();
                        return Ok(ServiceResponse::new(req_parts, resp));
                    }
                }
            }

            let res = service.call(req).await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let auth_str = req
        .headers()
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = auth_str.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// The authenticated caller, as placed in the request by [`Authentication`].
pub struct AuthUser(pub User);

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<User>() {
            Some(user) => ok(AuthUser(user.clone())),
            None => err(AppError::Authentication(
                "No access token provided".to_string(),
            )),
        }
    }
}

// Signup Endpoint
pub async fn signup(
    data: web::Data<AppState>,
    signup_info: web::Json<SignupInfo>,
) -> AppResult<HttpResponse> {
    let info = signup_info.into_inner();
    let (email, password, name) = match (non_blank(info.email), non_blank(info.password), non_blank(info.name)) {
        (Some(email), Some(password), Some(name)) => (email, password, name),
        _ => {
            return Err(AppError::Validation(
                "Email, password, and name are required".to_string(),
            ))
        }
    };
    let role = match info.role.as_deref() {
        None => Role::User,
        Some(raw) => Role::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("Unknown role: {}", raw)))?,
    };

    let user = data
        .gateway
        .sign_up(NewAccount {
            email,
            password,
            name,
            role,
        })
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

// Login Endpoint
pub async fn login(
    data: web::Data<AppState>,
    login_info: web::Json<LoginInfo>,
) -> AppResult<HttpResponse> {
    let session = data
        .gateway
        .sign_in(&login_info.email, &login_info.password)
        .await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn profile(AuthUser(user): AuthUser) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
