use std::sync::Arc;

use reqwest::{header::AUTHORIZATION, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult, ErrorBody};
use crate::models::{
    AuthResponse, DashboardStats, LoginRequest, RefreshRequest, RefreshResponse,
    RegisterRequest, Session, User,
};
use crate::resources::Resource;

const LOGIN_PATH: &str = "user/login";
const REGISTER_PATH: &str = "user/register";
const REFRESH_PATH: &str = "user/refresh-token";

/// Requests to these paths never trigger a token refresh.
fn is_auth_path(path: &str) -> bool {
    matches!(path, LOGIN_PATH | REGISTER_PATH | REFRESH_PATH)
}

/// HTTP client for the restaurant API. Cloning shares the session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<RwLock<Option<Session>>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http_client(http, base_url))
    }

    pub fn with_http_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Reuse tokens obtained earlier, e.g. loaded from disk.
    pub async fn restore_session(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    pub async fn logout(&self) {
        *self.session.write().await = None;
    }

    pub async fn login(
        &self,
        phone: impl Into<String>,
        password: impl Into<String>,
    ) -> ClientResult<Session> {
        let request = LoginRequest {
            phone: phone.into(),
            password: password.into(),
        };
        let response: AuthResponse = self
            .send(Method::POST, LOGIN_PATH, Vec::new(), Some(serde_json::to_value(&request)?))
            .await?;
        Ok(self.store(response).await)
    }

    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<Session> {
        let response: AuthResponse = self
            .send(Method::POST, REGISTER_PATH, Vec::new(), Some(serde_json::to_value(request)?))
            .await?;
        Ok(self.store(response).await)
    }

    async fn store(&self, response: AuthResponse) -> Session {
        let session = Session::from(response);
        debug!(user_id = %session.user.id, role = %session.user.role, "session stored");
        *self.session.write().await = Some(session.clone());
        session
    }

    pub fn users(&self) -> Resource<'_> {
        Resource::new(self, "user")
    }

    pub fn restaurants(&self) -> Resource<'_> {
        Resource::new(self, "restaraunt")
    }

    pub fn products(&self) -> Resource<'_> {
        Resource::new(self, "product")
    }

    pub fn categories(&self) -> Resource<'_> {
        Resource::new(self, "category")
    }

    pub fn orders(&self) -> Resource<'_> {
        Resource::new(self, "order")
    }

    pub fn debts(&self) -> Resource<'_> {
        Resource::new(self, "debt")
    }

    pub fn regions(&self) -> Resource<'_> {
        Resource::new(self, "region")
    }

    pub fn withdraws(&self) -> Resource<'_> {
        Resource::new(self, "withdraw")
    }

    pub async fn update_role_to_admin(&self, id: Uuid) -> ClientResult<User> {
        self.send(Method::PATCH, &format!("user/{id}/role"), Vec::new(), None)
            .await
    }

    pub async fn dashboard_stats(&self) -> ClientResult<DashboardStats> {
        self.send(Method::GET, "dashboard/stats", Vec::new(), None)
            .await
    }

    /// Send a request with the current access token. A 401 from a non-auth
    /// path refreshes the token and replays the request once.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> ClientResult<T> {
        let token = self.access_token().await;
        let response = self
            .dispatch(method.clone(), path, &query, body.as_ref(), token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || is_auth_path(path) {
            return decode(response).await;
        }

        debug!(path, "access token rejected, refreshing");
        self.refresh_session().await?;
        let token = self.access_token().await;
        let response = self
            .dispatch(method, path, &query, body.as_ref(), token.as_deref())
            .await?;
        decode(response).await
    }

    async fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> ClientResult<Response> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request.send().await?)
    }

    async fn refresh_session(&self) -> ClientResult<()> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.refresh_token.clone());

        let Some(refresh_token) = refresh_token else {
            self.logout().await;
            return Err(ClientError::SessionExpired);
        };

        match self.request_access_token(&refresh_token).await {
            Ok(access_token) => {
                if let Some(session) = self.session.write().await.as_mut() {
                    session.access_token = access_token;
                }
                debug!("access token refreshed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, clearing session");
                self.logout().await;
                Err(ClientError::SessionExpired)
            }
        }
    }

    async fn request_access_token(&self, refresh_token: &str) -> ClientResult<String> {
        let body = serde_json::to_value(RefreshRequest { refresh_token })?;
        let response = self
            .dispatch(Method::PATCH, REFRESH_PATH, &[], Some(&body), None)
            .await?;
        let refreshed: RefreshResponse = decode(response).await?;
        Ok(refreshed.access_token)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if status.is_success() {
        return Ok(serde_json::from_slice(&bytes)?);
    }
    let body = serde_json::from_slice::<ErrorBody>(&bytes)
        .unwrap_or_else(|_| ErrorBody::from_status(status.as_u16()));
    Err(ClientError::from_status(status.as_u16(), body))
}

/// Flatten a serializable filter struct or map into query pairs. `null`
/// fields are dropped.
pub(crate) fn query_pairs<Q: Serialize + ?Sized>(query: &Q) -> ClientResult<Vec<(String, String)>> {
    match serde_json::to_value(query)? {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(text) => Some((key, text)),
                other => Some((key, other.to_string())),
            })
            .collect()),
        other => Err(ClientError::InvalidRequest(format!(
            "query must be an object, got {other}"
        ))),
    }
}
