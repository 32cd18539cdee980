//! HTTP transport to the lock server.
//!
//! [`LockTransport`] is the seam between the job-lock lifecycle and the wire.
//! [`HttpTransport`] is the reqwest-backed implementation:
//!
//! - `POST {base}/{jobName}` acquires (or reuses) a lock
//! - `PUT {base}/{jobName}/{lockId}/finish` and `.../interrupt` release it
//!
//! Failures are surfaced as [`TransportError`] and never retried here.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use secrecy::ExposeSecret;

use cronyx_core::{parse_lock_grant_bytes, LockGrant, LockRequest};

use crate::config::{ClientConfig, Credentials};
use crate::error::{ConfigError, ReleaseKind, TransportError};

/// The two requests the lock server understands.
#[async_trait]
pub trait LockTransport: Send + Sync {
    /// Requests a lock for one interval of `job_name`.
    ///
    /// `Ok(None)` means the server declined: the job is not eligible to run now.
    async fn acquire(
        &self,
        job_name: &str,
        request: &LockRequest,
    ) -> Result<Option<LockGrant>, TransportError>;

    /// Marks the lock finished or interrupted.
    async fn release(
        &self,
        job_name: &str,
        lock_id: &str,
        kind: ReleaseKind,
    ) -> Result<(), TransportError>;
}

/// Headers attached to every request.
///
/// Always `Content-Type: application/json`; `Authorization: Basic ...` when
/// credentials are given.
pub fn request_headers(credentials: Option<&Credentials>) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(credentials) = credentials {
        let decoded = format!(
            "{}:{}",
            credentials.username,
            credentials.password.expose_secret()
        );
        let mut value = HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(decoded)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

/// reqwest-backed [`LockTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .default_headers(request_headers(config.credentials.as_ref())?)
            .user_agent(concat!("cronyx-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpTransport {
            http,
            base_url: config.url.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base address.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        if let Some(segment) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(TransportError::InvalidPath {
                reason: format!("'{}' is not a valid path segment", segment),
            });
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidPath {
                reason: format!("base url '{}' cannot carry path segments", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: &'static str,
        url: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|source| TransportError::Request {
                method,
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        tracing::debug!(%method, %url, %status, "lock server responded");
        if status != StatusCode::OK {
            return Err(TransportError::Status {
                method,
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LockTransport for HttpTransport {
    async fn acquire(
        &self,
        job_name: &str,
        request: &LockRequest,
    ) -> Result<Option<LockGrant>, TransportError> {
        request.validate().map_err(TransportError::InvalidRequest)?;
        let body = request.to_json().map_err(TransportError::InvalidRequest)?;
        let url = self.endpoint(&[job_name])?;

        let response = self
            .send("post", &url, self.http.post(url.clone()).json(&body))
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request {
                method: "post",
                url: url.to_string(),
                source,
            })?;

        parse_lock_grant_bytes(&bytes).map_err(|source| TransportError::InvalidResponse {
            url: url.to_string(),
            source,
        })
    }

    async fn release(
        &self,
        job_name: &str,
        lock_id: &str,
        kind: ReleaseKind,
    ) -> Result<(), TransportError> {
        let url = self.endpoint(&[job_name, lock_id, kind.as_str()])?;
        self.send("put", &url, self.http.put(url.clone())).await?;
        Ok(())
    }
}
