//! Network collaborators used by [`crate::Session`].

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;

use crate::config::ClientConfig;
use crate::error::DocumentError;

pub const OML_CONTENT_TYPE: &str = "application/x-yaml";

/// What a transport hands back for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
    /// Value of the permission header, if the server sent one.
    pub permission: Option<String>,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            permission: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_read_only(&self) -> bool {
        self.permission
            .as_deref()
            .is_some_and(|p| p.trim().eq_ignore_ascii_case("read"))
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, authorization: Option<&str>) -> Result<Response, DocumentError>;

    async fn post(&self, url: &Url, body: String, authorization: Option<&str>) -> Result<Response, DocumentError>;
}

/// Supplies the `Authorization` header value for a URL.
#[async_trait]
pub trait Authorize: Send + Sync {
    async fn authorization(&self, url: &Url) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthorization;

#[async_trait]
impl Authorize for NoAuthorization {
    async fn authorization(&self, _url: &Url) -> Option<String> {
        None
    }
}

/// The same header value for every request.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn bearer(token: &str) -> Self {
        Self(format!("Bearer {token}"))
    }
}

#[async_trait]
impl Authorize for StaticToken {
    async fn authorization(&self, _url: &Url) -> Option<String> {
        Some(self.0.clone())
    }
}

/// [`Transport`] over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    permission_header: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, DocumentError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(|e| DocumentError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            permission_header: config.permission_header.clone(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder, authorization: Option<&str>) -> Result<Response, DocumentError> {
        let request = match authorization {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| DocumentError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let permission = response
            .headers()
            .get(self.permission_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| DocumentError::Transport(e.to_string()))?;
        Ok(Response {
            status,
            body,
            permission,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url, authorization: Option<&str>) -> Result<Response, DocumentError> {
        self.send(self.client.get(url.clone()), authorization).await
    }

    async fn post(&self, url: &Url, body: String, authorization: Option<&str>) -> Result<Response, DocumentError> {
        let request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, OML_CONTENT_TYPE)
            .body(body);
        self.send(request, authorization).await
    }
}
