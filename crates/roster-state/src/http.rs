//! REST client for the academy backend.
//!
//! Implements [`RosterStore`] over `reqwest`. Any non-success status becomes
//! [`StoreError::Rejected`] carrying the response body as message; a request
//! that never produced a response becomes [`StoreError::Unreachable`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::StoreError;
use crate::schema::{
    Group, PromotionPayload, PromotionStatus, PromotionStatusUpdate, StudentGroupRow, StudentId,
};
use crate::store::{RosterStore, StoreResult};

const STUDENT_GROUPS_ACTIVE: &str = "/student-groups/active";
const GROUPS_ACTIVE: &str = "/groups/active";
const BULK_PROMOTION_STATUS: &str = "/users/detail/bulk-promotion-status";
const PROMOTE_STUDENTS: &str = "/student-groups/promote";

/// Connection settings for the academy backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the academy service, e.g. `https://api.school.test/academy`
    pub base_url: String,
    /// Bearer token (optional for unauthenticated deployments)
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: std::env::var("PROMOTION_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080/academy".to_string()),
            token: std::env::var("PROMOTION_API_TOKEN").ok(),
            timeout_secs: std::env::var("PROMOTION_API_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl ApiConfig {
    /// Create a new config from environment variables
    ///
    /// Reads:
    /// - PROMOTION_API_URL (optional, default: "http://localhost:8080/academy")
    /// - PROMOTION_API_TOKEN (optional)
    /// - PROMOTION_API_TIMEOUT_SECS (optional, default: 30)
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific base URL
    pub fn new(base_url: &str) -> Self {
        ApiConfig {
            base_url: base_url.to_string(),
            token: None,
            timeout_secs: 30,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set per-request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// The promote endpoint answers with either bare ids or student records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AppliedStudent {
    Id(StudentId),
    Record { id: StudentId },
}

impl AppliedStudent {
    fn id(&self) -> StudentId {
        match self {
            AppliedStudent::Id(id) | AppliedStudent::Record { id } => *id,
        }
    }
}

/// HTTP-backed roster store
pub struct HttpRosterStore {
    config: ApiConfig,
    http_client: reqwest::Client,
}

impl HttpRosterStore {
    /// Create a new store client
    pub fn new(config: ApiConfig) -> StoreResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(StoreError::Config("base_url must not be empty".to_string()));
        }
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("roster-state/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpRosterStore {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> StoreResult<Self> {
        Self::new(ApiConfig::from_env())
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http_client.request(method, self.config.url(path));
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Turn a non-success response into `Rejected`, keeping the body text.
    async fn check(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body
        };
        warn!(status = status.as_u16(), "backend rejected request");
        Err(StoreError::rejected(status.as_u16(), message))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> StoreResult<T> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl RosterStore for HttpRosterStore {
    #[instrument(skip(self), fields(base_url = %self.config.base_url))]
    async fn students_by_group(&self) -> StoreResult<Vec<StudentGroupRow>> {
        let rows: Vec<StudentGroupRow> = self.get_json(STUDENT_GROUPS_ACTIVE).await?;
        debug!(rows = rows.len(), "fetched roster rows");
        Ok(rows)
    }

    #[instrument(skip(self), fields(base_url = %self.config.base_url))]
    async fn active_groups(&self) -> StoreResult<Vec<Group>> {
        let groups: Vec<Group> = self.get_json(GROUPS_ACTIVE).await?;
        debug!(groups = groups.len(), "fetched active groups");
        Ok(groups)
    }

    #[instrument(skip(self), fields(student_id = %student_id, status = %status))]
    async fn update_promotion_status(
        &self,
        student_id: StudentId,
        status: PromotionStatus,
    ) -> StoreResult<()> {
        let path = format!("/users/detail/{student_id}/promotion-status");
        let response = self
            .request(reqwest::Method::PATCH, &path)
            .query(&[("promotionStatus", status.code())])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self, updates), fields(count = updates.len()))]
    async fn bulk_update_promotion_status(
        &self,
        updates: &[PromotionStatusUpdate],
    ) -> StoreResult<()> {
        let response = self
            .request(reqwest::Method::PATCH, BULK_PROMOTION_STATUS)
            .json(updates)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(
        skip(self, payload),
        fields(target_group_id = %payload.target_group_id, count = payload.student_ids.len())
    )]
    async fn promote_students(&self, payload: &PromotionPayload) -> StoreResult<Vec<StudentId>> {
        let response = self
            .request(reqwest::Method::POST, PROMOTE_STUDENTS)
            .json(payload)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        Ok(applied_ids(&bytes, &payload.student_ids))
    }
}

/// Ids named by a successful promote response.
///
/// The move is already applied once the backend answers 2xx, so an empty or
/// unreadable body counts as the whole payload.
fn applied_ids(body: &[u8], requested: &[StudentId]) -> Vec<StudentId> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return requested.to_vec();
    }
    match serde_json::from_slice::<Vec<AppliedStudent>>(body) {
        Ok(applied) => applied.iter().map(AppliedStudent::id).collect(),
        Err(e) => {
            warn!(error = %e, "unreadable promote response, assuming full payload applied");
            requested.to_vec()
        }
    }
}
