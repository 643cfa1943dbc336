// src/auth_gateway.rs

use std::collections::HashMap;

use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use futures_util::TryStreamExt;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{bson::doc, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::MongoDB;
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

/// Input for account creation; already validated by the signup handler.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Identity provider: accounts, credentials, bearer tokens and roles.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_up(&self, account: NewAccount) -> AppResult<User>;

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session>;

    /// Resolves a bearer token to the current account. The role is read from
    /// the account record, not from the token.
    async fn verify_token(&self, token: &str) -> AppResult<User>;

    async fn get_user(&self, user_id: &str) -> AppResult<Option<User>>;

    async fn list_users(&self) -> AppResult<Vec<User>>;

    /// Returns whether an account was removed.
    async fn delete_user(&self, user_id: &str) -> AppResult<bool>;
}

/// HS256 token issuing and validation.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    ttl_hours: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            secret: secret.to_string(),
            ttl_hours,
        }
    }

    /// Unix timestamp `ttl_hours` from now. Lifetimes that are not positive
    /// or overflow the clock are refused.
    fn expiry(&self) -> AppResult<usize> {
        Duration::try_hours(self.ttl_hours)
            .filter(|ttl| *ttl > Duration::zero())
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .and_then(|expiration| usize::try_from(expiration.timestamp()).ok())
            .ok_or_else(|| {
                AppError::Upstream(format!(
                    "Token lifetime of {} hours is out of range",
                    self.ttl_hours
                ))
            })
    }

    pub fn create_jwt(&self, user: &User) -> AppResult<String> {
        let claims = Claims {
            sub: user.id.clone(),
            role: user.role,
            exp: self.expiry()?,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| AppError::Upstream(format!("Error issuing token: {}", e)))?;
        Ok(token)
    }

    pub fn validate_jwt(&self, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

/// Account record as persisted; the only place a password hash lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    #[serde(rename = "_id")]
    id: String,
    email: String,
    name: String,
    role: Role,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn new(account: &NewAccount, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: normalize_email(&account.email),
            name: account.name.trim().to_string(),
            role: account.role,
            password_hash,
            created_at: Utc::now(),
        }
    }

    fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> AppError {
    AppError::Authentication("Invalid login credentials".to_string())
}

fn duplicate_email() -> AppError {
    AppError::Conflict("A user with this email address has already been registered".to_string())
}

/// Server code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == DUPLICATE_KEY
    )
}

/// Gateway backed by a MongoDB `users` collection.
pub struct MongoAuthGateway {
    users: Collection<UserRecord>,
    tokens: TokenIssuer,
}

impl MongoAuthGateway {
    /// Opens the `users` collection and makes sure `email` is uniquely indexed.
    pub async fn new(mongodb: &MongoDB, tokens: TokenIssuer) -> AppResult<Self> {
        let users = mongodb.db.collection::<UserRecord>("users");
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        users.create_index(unique_email).await?;
        Ok(Self { users, tokens })
    }
}

#[async_trait]
impl AuthGateway for MongoAuthGateway {
    async fn sign_up(&self, account: NewAccount) -> AppResult<User> {
        let email = normalize_email(&account.email);
        if self.users.find_one(doc! { "email": &email }).await?.is_some() {
            return Err(duplicate_email());
        }

        let record = UserRecord::new(&account, hash(&account.password, DEFAULT_COST)?);
        self.users.insert_one(&record).await.map_err(|e| {
            if is_duplicate_key(&e) {
                duplicate_email()
            } else {
                AppError::from(e)
            }
        })?;
        info!("Account created: {} ({:?})", record.id, record.role);
        Ok(record.to_user())
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let record = self
            .users
            .find_one(doc! { "email": normalize_email(email) })
            .await?
            .ok_or_else(invalid_credentials)?;
        if !verify(password, &record.password_hash).unwrap_or(false) {
            warn!("Failed login for {}", record.id);
            return Err(invalid_credentials());
        }
        let user = record.to_user();
        let token = self.tokens.create_jwt(&user)?;
        Ok(Session { token, user })
    }

    async fn verify_token(&self, token: &str) -> AppResult<User> {
        let claims = self.tokens.validate_jwt(token)?;
        self.get_user(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Authentication("Unauthorized".to_string()))
    }

    async fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        let record = self.users.find_one(doc! { "_id": user_id }).await?;
        Ok(record.map(|r| r.to_user()))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let records: Vec<UserRecord> = self
            .users
            .find(doc! {})
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(records.iter().map(UserRecord::to_user).collect())
    }

    async fn delete_user(&self, user_id: &str) -> AppResult<bool> {
        let res = self.users.delete_one(doc! { "_id": user_id }).await?;
        Ok(res.deleted_count > 0)
    }
}

/// bcrypt's lowest accepted cost; hashing at the default cost is too slow
/// for an in-process gateway.
const MEMORY_HASH_COST: u32 = 4;

/// In-process gateway for local runs and tests.
pub struct MemoryAuthGateway {
    users: Mutex<HashMap<String, UserRecord>>,
    tokens: TokenIssuer,
}

impl MemoryAuthGateway {
    pub fn new(tokens: TokenIssuer) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            tokens,
        }
    }
}

#[async_trait]
impl AuthGateway for MemoryAuthGateway {
    async fn sign_up(&self, account: NewAccount) -> AppResult<User> {
        let email = normalize_email(&account.email);
        let mut users = self.users.lock().await;
        if users.values().any(|r| r.email == email) {
            return Err(duplicate_email());
        }
        let record = UserRecord::new(&account, hash(&account.password, MEMORY_HASH_COST)?);
        let user = record.to_user();
        users.insert(record.id.clone(), record);
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let email = normalize_email(email);
        let user = {
            let users = self.users.lock().await;
            let record = users
                .values()
                .find(|r| r.email == email)
                .ok_or_else(invalid_credentials)?;
            if !verify(password, &record.password_hash).unwrap_or(false) {
                return Err(invalid_credentials());
            }
            record.to_user()
        };
        let token = self.tokens.create_jwt(&user)?;
        Ok(Session { token, user })
    }

    async fn verify_token(&self, token: &str) -> AppResult<User> {
        let claims = self.tokens.validate_jwt(token)?;
        self.get_user(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Authentication("Unauthorized".to_string()))
    }

    async fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        Ok(self.users.lock().await.get(user_id).map(UserRecord::to_user))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .await
            .values()
            .map(UserRecord::to_user)
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn delete_user(&self, user_id: &str) -> AppResult<bool> {
        Ok(self.users.lock().await.remove(user_id).is_some())
    }
}
