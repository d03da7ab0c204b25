//! Authenticated REST client for Azure DevOps.
//!
//! This module provides [`RestClient`], the thin transport every
//! resource call flows through. It owns the normalized organization URL
//! and an [`AuthProvider`], injects the `Authorization` header on each
//! request, and classifies responses into the shared error taxonomy:
//! 2xx passes, 404 becomes [`RuntimeError::NotFound`], other statuses
//! become [`RuntimeError::Remote`] with a body excerpt, and I/O
//! failures become [`RuntimeError::Transport`].

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use azdo_provider_core::{AuthProvider, normalize_org_url};

use crate::error::RuntimeError;

/// Longest remote body excerpt carried in errors.
const BODY_SNIPPET_LEN: usize = 256;

/// Authenticated client bound to one Azure DevOps organization.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<AuthProvider>,
}

impl RestClient {
    /// Create a client for an organization.
    ///
    /// The URL is normalized the same way configuration validation
    /// normalizes it, so both paths agree on the base.
    pub fn new(http: reqwest::Client, org_url: &str, auth: Arc<AuthProvider>) -> Self {
        Self {
            http,
            base_url: normalize_org_url(org_url),
            auth,
        }
    }

    /// The normalized organization base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an `_apis` URL, optionally scoped to a project.
    pub fn api_url(&self, project: Option<&str>, route: &str) -> String {
        let route = route.trim_matches('/');
        match project {
            Some(project) => format!("{}/{}/_apis/{}", self.base_url, project, route),
            None => format!("{}/_apis/{}", self.base_url, route),
        }
    }

    /// GET a JSON document.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<T, RuntimeError> {
        let body = self
            .send(Method::GET, url, query, None::<&()>, cancel)
            .await?;
        parse_json(&body)
    }

    /// Send a JSON body and parse a JSON response.
    pub async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T, RuntimeError> {
        let body = self.send(method, url, query, Some(body), cancel).await?;
        parse_json(&body)
    }

    /// Send a request expecting no meaningful response body.
    pub async fn send_no_content(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        self.send(method, url, query, None::<&()>, cancel).await?;
        Ok(())
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<String, RuntimeError> {
        let authorization = self.auth.authorization_header(cancel).await?;

        debug!(%method, url, "Sending Azure DevOps request");
        let mut request = self
            .http
            .request(method, url)
            .header("Authorization", authorization)
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            result = request.send() => result.map_err(|e| RuntimeError::Transport {
                message: e.to_string(),
            })?,
        };

        let status = response.status();
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            result = response.text() => result.map_err(|e| RuntimeError::Transport {
                message: e.to_string(),
            })?,
        };

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RuntimeError::NotFound {
                what: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(RuntimeError::Remote {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }
        Ok(body)
    }
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, RuntimeError> {
    serde_json::from_str(body).map_err(|e| RuntimeError::Protocol {
        message: format!("unparseable response body: {}", e),
    })
}

fn snippet(body: &str) -> String {
    if body.len() > BODY_SNIPPET_LEN {
        let mut end = BODY_SNIPPET_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
