//! Generation history port.
//!
//! [`HistoryStore`] is injected into the generator. [`InMemoryHistoryStore`] keeps records in
//! process for tests and offline use; [`HttpHistoryStore`] talks to a REST backend.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{AuthService, InMemoryAuthService, RequestContext};
use crate::color::Color;
use crate::render::{to_data_url, ModuleRenderer, QrRenderer, RenderOptions};

/// Owner assigned to records saved without a resolvable user.
pub const FALLBACK_USER_ID: &str = "1";

/// A stored generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub color: Color,
    pub size: u32,
    pub created_at: DateTime<Utc>,
    /// PNG data URL of the code, empty if it could not be rendered.
    #[serde(default)]
    pub image_url: String,
}

/// A generation to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryRecord {
    pub content: String,
    pub color: Color,
    pub size: u32,
    pub created_at: DateTime<Utc>,
}

impl NewHistoryRecord {
    pub fn new(content: impl Into<String>, color: Color, size: u32) -> Self {
        Self {
            content: content.into(),
            color,
            size,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Unexpected response status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub trait HistoryStore: Clone + Send + Sync + 'static {
    fn save(
        &self,
        ctx: &RequestContext,
        record: NewHistoryRecord,
    ) -> impl Future<Output = Result<HistoryRecord, HistoryError>> + Send;

    /// Stored records, most recent first.
    fn list(
        &self,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<Vec<HistoryRecord>, HistoryError>> + Send;

    /// Removes a record. Returns `false` if no such record existed.
    fn delete(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> impl Future<Output = Result<bool, HistoryError>> + Send;
}

/// In-memory history. Ids are sequential, starting at `"1"`.
///
/// Records are scoped to the user behind the request's token when an auth service is attached
/// with [`InMemoryHistoryStore::with_auth`]; callers it does not recognise own nothing.
/// Without one, everything belongs to [`FALLBACK_USER_ID`].
#[derive(Clone)]
pub struct InMemoryHistoryStore {
    records: Arc<RwLock<Vec<HistoryRecord>>>,
    next_id: Arc<AtomicU64>,
    auth: Option<InMemoryAuthService>,
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self {
            records: Arc::default(),
            next_id: Arc::new(AtomicU64::new(1)),
            auth: None,
        }
    }
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth(auth: InMemoryAuthService) -> Self {
        Self {
            auth: Some(auth),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The user records are filed under. Without an attached auth service every record belongs
    /// to [`FALLBACK_USER_ID`]; with one, a context that resolves to no user owns nothing.
    async fn owner(&self, ctx: &RequestContext) -> Option<String> {
        match &self.auth {
            Some(auth) => auth.current_user(ctx).await.ok().flatten().map(|u| u.id),
            None => Some(FALLBACK_USER_ID.to_owned()),
        }
    }
}

/// Data URL preview stored with a record: dark `color` on white, one module of margin.
fn preview_url(record: &NewHistoryRecord) -> String {
    let options = RenderOptions {
        width: record.size,
        margin_modules: 1,
        foreground: record.color,
        background: Color::WHITE,
    };
    match ModuleRenderer
        .render(&record.content, &options)
        .and_then(|img| to_data_url(&img))
    {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "failed to render history preview");
            String::new()
        }
    }
}

impl HistoryStore for InMemoryHistoryStore {
    async fn save(
        &self,
        ctx: &RequestContext,
        record: NewHistoryRecord,
    ) -> Result<HistoryRecord, HistoryError> {
        let user_id = self.owner(ctx).await.ok_or(HistoryError::Unauthenticated)?;
        let image_url = preview_url(&record);
        let stored = HistoryRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            user_id,
            content: record.content,
            color: record.color,
            size: record.size,
            created_at: record.created_at,
            image_url,
        };

        self.records
            .write()
            .expect("lock poisoned")
            .push(stored.clone());
        info!(id = %stored.id, user_id = %stored.user_id, "saved history record");
        Ok(stored)
    }

    async fn list(&self, ctx: &RequestContext) -> Result<Vec<HistoryRecord>, HistoryError> {
        let Some(user_id) = self.owner(ctx).await else {
            return Ok(Vec::new());
        };
        let records = self.records.read().expect("lock poisoned");
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<bool, HistoryError> {
        let Some(user_id) = self.owner(ctx).await else {
            return Ok(false);
        };
        let mut records = self.records.write().expect("lock poisoned");
        let before = records.len();
        records.retain(|r| !(r.id == id && r.user_id == user_id));
        Ok(records.len() != before)
    }
}

/// History backed by a REST API under `{base_url}/qrcodes`.
#[derive(Clone)]
pub struct HttpHistoryStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpHistoryStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    fn request(
        &self,
        ctx: &RequestContext,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, HistoryError> {
        let authorization = ctx.authorization().ok_or(HistoryError::Unauthenticated)?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, authorization))
    }
}

async fn status_error(response: reqwest::Response) -> HistoryError {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return HistoryError::Unauthenticated;
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.message)
        .unwrap_or_default();
    HistoryError::Status {
        status: status.as_u16(),
        message,
    }
}

impl HistoryStore for HttpHistoryStore {
    async fn save(
        &self,
        ctx: &RequestContext,
        record: NewHistoryRecord,
    ) -> Result<HistoryRecord, HistoryError> {
        let response = self
            .request(ctx, reqwest::Method::POST, "/qrcodes")?
            .json(&record)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn list(&self, ctx: &RequestContext) -> Result<Vec<HistoryRecord>, HistoryError> {
        let response = self
            .request(ctx, reqwest::Method::GET, "/qrcodes")?
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<bool, HistoryError> {
        let path = format!("/qrcodes/{}", urlencoding::encode(id));
        let response = self
            .request(ctx, reqwest::Method::DELETE, &path)?
            .send()
            .await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response).await),
        }
    }
}
