//! Typed HTTP access to the Civix API.

use std::fmt::{Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use log::{debug, trace};
use reqwest::{header, Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::dashboard::normalize::{
    FeedbackView, NotificationView, OfficialActionView, PetitionView, PollView, RawFeedback,
    RawNotification, RawOfficialAction, RawPetition, RawPoll,
};
use crate::error::ErrorBody;
use crate::model::api::{
    analytics::PetitionAnalytics,
    auth::{Credentials, Session},
    settings::SettingsDesc,
    user::UserProfile,
};

/// Cloneable so that one failed fetch can be reported to every caller sharing it.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(Arc<reqwest::Error>),
    /// The caller must log in (again).
    #[error("not logged in, or the session has expired")]
    Unauthorized,
    #[error("server returned {code}: {message}")]
    Status { code: u16, message: String },
    #[error("unexpected response body: {0}")]
    Decode(Arc<serde_json::Error>),
    #[error("{0}")]
    Io(Arc<std::io::Error>),
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(Arc::new(e))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(Arc::new(e))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

/// Everything the dashboard fetches, one entry per cached query.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Petitions,
    Polls,
    Notifications,
    MyFeedback,
    Settings,
    OfficialActions,
    Analytics,
}

impl Resource {
    pub const ALL: &'static [Self] = &[
        Self::Petitions,
        Self::Polls,
        Self::Notifications,
        Self::MyFeedback,
        Self::Settings,
        Self::OfficialActions,
        Self::Analytics,
    ];

    /// Path below the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Petitions => "petitions",
            Self::Polls => "polls",
            Self::Notifications => "admin-logs/notifications",
            Self::MyFeedback => "feedback/my-feedback",
            Self::Settings => "settings",
            Self::OfficialActions => "admin-logs/official-actions/recent",
            Self::Analytics => "petitions/analytics",
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// A normalised copy of one resource, as last fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "resource", content = "data", rename_all = "camelCase")]
pub enum Snapshot {
    Petitions(Vec<PetitionView>),
    Polls(Vec<PollView>),
    Notifications(Vec<NotificationView>),
    MyFeedback(Vec<FeedbackView>),
    Settings(SettingsDesc),
    OfficialActions(Vec<OfficialActionView>),
    Analytics(PetitionAnalytics),
}

impl Snapshot {
    pub fn resource(&self) -> Resource {
        match self {
            Self::Petitions(_) => Resource::Petitions,
            Self::Polls(_) => Resource::Polls,
            Self::Notifications(_) => Resource::Notifications,
            Self::MyFeedback(_) => Resource::MyFeedback,
            Self::Settings(_) => Resource::Settings,
            Self::OfficialActions(_) => Resource::OfficialActions,
            Self::Analytics(_) => Resource::Analytics,
        }
    }
}

/// Anything that can produce snapshots.
#[rocket::async_trait]
pub trait Source: Send + Sync + 'static {
    async fn fetch(&self, resource: Resource) -> Result<Snapshot, ClientError>;
}

/// Thin client over the REST API. Authenticates with the bearer token if
/// one is set, and with whatever auth cookie the server has issued.
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        // A trailing slash makes `join` append rather than replace the last segment.
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|_| ClientError::InvalidUrl(base_url.to_string()))?;
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Use (or stop using) a bearer token for subsequent requests.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|_| ClientError::InvalidUrl(format!("{}{path}", self.base)))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let mut request = self.http.request(method, self.url(path)?);
        let token = self.token.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = token.as_deref() {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request)
    }

    /// Send a request and decode a JSON response.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        self.send_as(request, Caller::Session).await
    }

    async fn send_as<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        caller: Caller,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        trace!("{} {}", status.as_u16(), response.url());
        let body = response.bytes().await?;
        if let Some(e) = failure(status, &body, caller) {
            return Err(e);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.request(Method::GET, path)?).await
    }

    /// Log in, remembering the returned token for later requests.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ClientError> {
        let request = self.request(Method::POST, "auth/login")?.json(credentials);
        let session: Session = self.send_as(request, Caller::LoggingIn).await?;
        self.set_token(Some(session.token.clone()));
        debug!("Logged in as {}", session.user.email);
        Ok(session)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let response = self
            .request(Method::DELETE, "auth/logout")?
            .send()
            .await?;
        self.set_token(None);
        response.error_for_status()?;
        Ok(())
    }

    pub async fn profile(&self) -> Result<UserProfile, ClientError> {
        self.get("users/profile").await
    }

    pub async fn petitions(&self) -> Result<Vec<PetitionView>, ClientError> {
        let raw: Vec<RawPetition> = self.get(Resource::Petitions.path()).await?;
        let now = Utc::now();
        Ok(raw.into_iter().map(|p| PetitionView::from_raw(p, now)).collect())
    }

    pub async fn polls(&self) -> Result<Vec<PollView>, ClientError> {
        let raw: Vec<RawPoll> = self.get(Resource::Polls.path()).await?;
        let now = Utc::now();
        Ok(raw.into_iter().map(|p| PollView::from_raw(p, now)).collect())
    }

    pub async fn notifications(&self) -> Result<Vec<NotificationView>, ClientError> {
        let raw: Vec<RawNotification> = self.get(Resource::Notifications.path()).await?;
        let now = Utc::now();
        Ok(raw
            .into_iter()
            .map(|n| NotificationView::from_raw(n, now))
            .collect())
    }

    pub async fn my_feedback(&self) -> Result<Vec<FeedbackView>, ClientError> {
        let raw: Vec<RawFeedback> = self.get(Resource::MyFeedback.path()).await?;
        let now = Utc::now();
        Ok(raw.into_iter().map(|f| FeedbackView::from_raw(f, now)).collect())
    }

    pub async fn settings(&self) -> Result<SettingsDesc, ClientError> {
        self.get(Resource::Settings.path()).await
    }

    pub async fn official_actions(&self) -> Result<Vec<OfficialActionView>, ClientError> {
        let raw: Vec<RawOfficialAction> = self.get(Resource::OfficialActions.path()).await?;
        let now = Utc::now();
        Ok(raw
            .into_iter()
            .map(|a| OfficialActionView::from_raw(a, now))
            .collect())
    }

    pub async fn analytics(&self) -> Result<PetitionAnalytics, ClientError> {
        self.get(Resource::Analytics.path()).await
    }

    pub async fn sign_petition(&self, petition_id: &str) -> Result<PetitionView, ClientError> {
        let request = self.request(Method::POST, &format!("petitions/{petition_id}/sign"))?;
        let raw: RawPetition = self.send(request).await?;
        Ok(PetitionView::from_raw(raw, Utc::now()))
    }

    pub async fn vote(&self, poll_id: &str, option: u32) -> Result<PollView, ClientError> {
        let request = self
            .request(Method::POST, &format!("polls/{poll_id}/vote"))?
            .json(&json!({ "option": option }));
        let raw: RawPoll = self.send(request).await?;
        Ok(PollView::from_raw(raw, Utc::now()))
    }

    pub async fn mark_read(&self, notification_id: &str) -> Result<(), ClientError> {
        let path = format!("admin-logs/notifications/{notification_id}/read");
        let response = self.request(Method::PATCH, &path)?.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        match failure(status, &body, Caller::Session) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Who is asking, which decides what a 401 means.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Caller {
    /// A request made with the saved session: a 401 means it has expired.
    Session,
    /// A login attempt: a 401 means the credentials were wrong.
    LoggingIn,
}

/// The error for an unsuccessful response, using the server's message
/// when the body carries one.
fn failure(status: StatusCode, body: &[u8], caller: Caller) -> Option<ClientError> {
    if status.is_success() {
        return None;
    }
    if status == StatusCode::UNAUTHORIZED && caller == Caller::Session {
        return Some(ClientError::Unauthorized);
    }
    let message = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(error) => error.message,
        Err(_) if body.is_empty() => status.canonical_reason().unwrap_or_default().to_string(),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    };
    Some(ClientError::Status {
        code: status.as_u16(),
        message,
    })
}

#[rocket::async_trait]
impl Source for ApiClient {
    async fn fetch(&self, resource: Resource) -> Result<Snapshot, ClientError> {
        debug!("Fetching {resource}");
        Ok(match resource {
            Resource::Petitions => Snapshot::Petitions(self.petitions().await?),
            Resource::Polls => Snapshot::Polls(self.polls().await?),
            Resource::Notifications => Snapshot::Notifications(self.notifications().await?),
            Resource::MyFeedback => Snapshot::MyFeedback(self.my_feedback().await?),
            Resource::Settings => Snapshot::Settings(self.settings().await?),
            Resource::OfficialActions => {
                Snapshot::OfficialActions(self.official_actions().await?)
            }
            Resource::Analytics => Snapshot::Analytics(self.analytics().await?),
        })
    }
}
