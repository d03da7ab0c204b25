//! Federated identity assertion fetchers.
//!
//! This module provides:
//! - [`AssertionSource`] - Where an assertion JWT comes from (literal,
//!   file, or HTTP token exchange)
//! - [`TokenExchange`] - The Github Actions / Azure Pipelines style
//!   exchange endpoint client
//! - [`AssertionError`] - Failure taxonomy for assertion fetching
//!
//! An assertion is fetched fresh on every token request; caching belongs
//! to the layers above, never here. File sources are re-read per call so
//! workload-identity token rotation is picked up transparently.

use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::ErrorKind;
use crate::secret::Secret;

/// Default audience requested from the token-exchange endpoint when the
/// request URL does not already carry one.
pub const DEFAULT_EXCHANGE_AUDIENCE: &str = "api://AzureADTokenExchange";

/// Longest remote body excerpt carried in errors.
const BODY_SNIPPET_LEN: usize = 256;

/// Error type for assertion fetching.
#[derive(Debug, Error)]
pub enum AssertionError {
    /// A required input is missing or empty.
    #[error("missing assertion input: {field}")]
    MissingInput { field: &'static str },

    /// The assertion file could not be read.
    #[error("failed to read assertion file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The exchange endpoint returned a non-2xx status.
    #[error("token exchange returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// The exchange response violated the expected shape.
    #[error("token exchange response malformed: {message}")]
    Protocol { message: String },

    /// Network failure reaching the exchange endpoint.
    #[error("network error during token exchange: {message}")]
    Transport { message: String },

    /// The request URL could not be parsed.
    #[error("invalid token exchange URL: {message}")]
    InvalidUrl { message: String },

    /// The caller cancelled the fetch.
    #[error("assertion fetch cancelled")]
    Cancelled,
}

impl AssertionError {
    /// Classify the error for the host runtime.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingInput { .. } | Self::Io { .. } | Self::InvalidUrl { .. } => {
                ErrorKind::Config
            }
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// HTTP token-exchange endpoint producing an assertion JWT.
///
/// Github Actions exposes this as `ACTIONS_ID_TOKEN_REQUEST_URL` +
/// `ACTIONS_ID_TOKEN_REQUEST_TOKEN`; Azure Pipelines uses the same shape
/// with a service connection id routed through the query string.
#[derive(Debug, Clone)]
pub struct TokenExchange {
    http: reqwest::Client,
    request_url: String,
    request_token: Secret,
    audience: Option<String>,
    service_connection_id: Option<String>,
}

impl TokenExchange {
    /// Create a new exchange client.
    pub fn new(
        http: reqwest::Client,
        request_url: impl Into<String>,
        request_token: Secret,
    ) -> Result<Self, AssertionError> {
        let request_url = request_url.into();
        if request_url.trim().is_empty() {
            return Err(AssertionError::MissingInput {
                field: "oidc_request_url",
            });
        }
        if request_token.is_empty() {
            return Err(AssertionError::MissingInput {
                field: "oidc_request_token",
            });
        }
        Ok(Self {
            http,
            request_url,
            request_token,
            audience: None,
            service_connection_id: None,
        })
    }

    /// Override the audience added to the request URL.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Route the exchange to the Azure Pipelines flow for the given
    /// service connection.
    pub fn with_service_connection(mut self, id: impl Into<String>) -> Self {
        self.service_connection_id = Some(id.into());
        self
    }

    /// Assemble the request URL, adding the audience when absent.
    fn build_url(&self) -> Result<Url, AssertionError> {
        let mut url = Url::parse(&self.request_url).map_err(|e| AssertionError::InvalidUrl {
            message: e.to_string(),
        })?;

        let has_audience = url.query_pairs().any(|(k, _)| k == "audience");
        if !has_audience {
            let audience = self
                .audience
                .as_deref()
                .unwrap_or(DEFAULT_EXCHANGE_AUDIENCE);
            url.query_pairs_mut().append_pair("audience", audience);
        }
        if let Some(id) = &self.service_connection_id {
            url.query_pairs_mut().append_pair("serviceConnectionId", id);
        }
        Ok(url)
    }

    /// Fetch a fresh assertion from the exchange endpoint.
    async fn fetch(&self, cancel: &CancellationToken) -> Result<String, AssertionError> {
        let url = self.build_url()?;
        debug!(url = %redact_query(&url), "Requesting federated assertion");

        let request = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", self.request_token.expose()))
            .header("Accept", "application/json")
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(AssertionError::Cancelled),
            result = request => result.map_err(|e| AssertionError::Transport {
                message: e.to_string(),
            })?,
        };

        let status = response.status();
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(AssertionError::Cancelled),
            result = response.text() => result.map_err(|e| AssertionError::Transport {
                message: e.to_string(),
            })?,
        };

        if !status.is_success() {
            return Err(AssertionError::Remote {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        parse_exchange_body(&body)
    }
}

#[derive(serde::Deserialize)]
struct ExchangeResponse {
    value: Option<String>,
    #[serde(rename = "oidcToken")]
    oidc_token: Option<String>,
}

/// Extract the assertion from an exchange response body.
///
/// Github returns `{"value": "<jwt>"}`; the pipelines endpoint returns
/// `{"oidcToken": "<jwt>"}`. A missing, null, or empty token is a
/// protocol violation, not an empty success.
fn parse_exchange_body(body: &str) -> Result<String, AssertionError> {
    let parsed: ExchangeResponse =
        serde_json::from_str(body).map_err(|e| AssertionError::Protocol {
            message: format!("unparseable exchange response: {}", e),
        })?;

    let token = parsed
        .value
        .or(parsed.oidc_token)
        .filter(|t| !t.trim().is_empty());
    token.ok_or_else(|| AssertionError::Protocol {
        message: "exchange response carried no token value".to_string(),
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

fn redact_query(url: &Url) -> String {
    let mut clone = url.clone();
    clone.set_query(None);
    clone.to_string()
}

/// Where an assertion JWT comes from.
#[derive(Debug, Clone)]
pub enum AssertionSource {
    /// A literal JWT supplied in configuration.
    Value(Secret),

    /// A file re-read on each fetch, trimmed of surrounding whitespace.
    File(PathBuf),

    /// An HTTP token-exchange endpoint.
    Exchange(TokenExchange),
}

impl AssertionSource {
    /// Produce a fresh assertion string.
    ///
    /// Called once per token request; nothing is cached here.
    pub async fn fetch(&self, cancel: &CancellationToken) -> Result<String, AssertionError> {
        match self {
            Self::Value(secret) => {
                if secret.is_empty() {
                    return Err(AssertionError::MissingInput { field: "oidc_token" });
                }
                Ok(secret.expose().to_string())
            }
            Self::File(path) => {
                let contents = tokio::fs::read_to_string(path).await.map_err(|source| {
                    AssertionError::Io {
                        path: path.clone(),
                        source,
                    }
                })?;
                let trimmed = contents.trim();
                if trimmed.is_empty() {
                    return Err(AssertionError::MissingInput {
                        field: "oidc_token_file_path",
                    });
                }
                Ok(trimmed.to_string())
            }
            Self::Exchange(exchange) => exchange.fetch(cancel).await,
        }
    }
}
