//! Authentication port.
//!
//! Credentials are never stored on a shared client. Every call that needs them takes a
//! [`RequestContext`] carrying the caller's bearer token.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

/// Email address accepted by [`InMemoryAuthService`].
pub const DEMO_EMAIL: &str = "demo@example.com";
/// Password accepted by [`InMemoryAuthService`].
pub const DEMO_PASSWORD: &str = "password";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// A signed-in user and the token that identifies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

impl Session {
    pub fn context(&self) -> RequestContext {
        RequestContext::with_token(self.token.clone())
    }
}

/// Per-request credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    token: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Value for an `Authorization` header, if the context carries a token.
    pub fn authorization(&self) -> Option<String> {
        self.token().map(|t| format!("Bearer {t}"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Unexpected response status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub trait AuthService: Clone + Send + Sync + 'static {
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send;

    fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, AuthError>> + Send;

    /// The user the context's token belongs to, or `None` for anonymous or unknown tokens.
    fn current_user(
        &self,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<Option<User>, AuthError>> + Send;
}

/// In-memory auth for tests and offline use. Only the demo account can log in; anyone can
/// register.
#[derive(Clone, Default)]
pub struct InMemoryAuthService {
    sessions: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryAuthService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the session behind `ctx`. Returns whether one existed.
    pub fn logout(&self, ctx: &RequestContext) -> bool {
        let Some(token) = ctx.token() else {
            return false;
        };
        self.sessions
            .write()
            .expect("lock poisoned")
            .remove(token)
            .is_some()
    }

    fn open_session(&self, user: User) -> Session {
        let token = format!("mock-jwt-token-{}", user.id);
        self.sessions
            .write()
            .expect("lock poisoned")
            .insert(token.clone(), user.clone());
        Session { user, token }
    }

    fn next_user_id(&self) -> String {
        let sessions = self.sessions.read().expect("lock poisoned");
        let mut id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        while sessions.values().any(|u| u.id == id.to_string()) {
            id += 1;
        }
        id.to_string()
    }
}

impl AuthService for InMemoryAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        if email != DEMO_EMAIL || password != DEMO_PASSWORD {
            debug!(email, "rejected login");
            return Err(AuthError::InvalidCredentials);
        }
        let user = User {
            id: "1".to_owned(),
            name: "Demo User".to_owned(),
            email: email.to_owned(),
        };
        info!(user_id = %user.id, "logged in");
        Ok(self.open_session(user))
    }

    async fn register(&self, name: &str, email: &str, _password: &str) -> Result<Session, AuthError> {
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(AuthError::Registration("name and email are required".to_owned()));
        }
        let user = User {
            id: self.next_user_id(),
            name: name.trim().to_owned(),
            email: email.trim().to_owned(),
        };
        info!(user_id = %user.id, "registered");
        Ok(self.open_session(user))
    }

    async fn current_user(&self, ctx: &RequestContext) -> Result<Option<User>, AuthError> {
        let Some(token) = ctx.token() else {
            return Ok(None);
        };
        Ok(self
            .sessions
            .read()
            .expect("lock poisoned")
            .get(token)
            .cloned())
    }
}

/// Auth backed by a REST API exposing `/auth/login`, `/auth/register` and `/auth/me`.
#[derive(Clone)]
pub struct HttpAuthService {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpAuthService {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// The `message` field of an error body, or an empty string.
async fn error_message(response: reqwest::Response) -> String {
    match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => String::new(),
    }
}

async fn status_error(response: reqwest::Response) -> AuthError {
    let status = response.status().as_u16();
    let message = error_message(response).await;
    AuthError::Status { status, message }
}

impl AuthService for HttpAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED => Err(AuthError::InvalidCredentials),
            _ => Err(status_error(response).await),
        }
    }

    async fn register(&self, name: &str, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": password }))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(response.json().await?),
            StatusCode::BAD_REQUEST => Err(AuthError::Registration(error_message(response).await)),
            _ => Err(status_error(response).await),
        }
    }

    async fn current_user(&self, ctx: &RequestContext) -> Result<Option<User>, AuthError> {
        let Some(authorization) = ctx.authorization() else {
            return Ok(None);
        };
        let response = self
            .client
            .get(self.url("/auth/me"))
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(Some(response.json().await?)),
            StatusCode::UNAUTHORIZED => Ok(None),
            _ => Err(status_error(response).await),
        }
    }
}
