//! Profile and admin lookups against the backend

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use carelink_session::{BackendSettings, Result, SessionError};

/// Profile of the user the access token belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub role: String,
    /// Remaining profile fields, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Admin-check response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStatus {
    pub is_superuser: bool,
}

/// Backend lookups the route guard relies on
#[async_trait]
pub trait ProfileService: Send + Sync {
    /// Fetch the profile for a bearer access token
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile>;

    /// Ask whether the bearer is a superuser
    async fn fetch_admin_status(&self, access_token: &str) -> Result<AdminStatus>;
}

/// [`ProfileService`] over HTTP
pub struct HttpProfileClient {
    client: Client,
    profile_url: Url,
    admin_check_url: Url,
}

impl HttpProfileClient {
    /// Create a client for the configured backend
    pub fn new(backend: &BackendSettings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = backend.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| SessionError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            profile_url: backend.profile_url()?,
            admin_check_url: backend.admin_check_url()?,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url, access_token: &str) -> Result<T> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::NonOkResponse(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SessionError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ProfileService for HttpProfileClient {
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile> {
        self.get_json(&self.profile_url, access_token).await
    }

    async fn fetch_admin_status(&self, access_token: &str) -> Result<AdminStatus> {
        self.get_json(&self.admin_check_url, access_token).await
    }
}
