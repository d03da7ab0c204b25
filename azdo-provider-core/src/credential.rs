//! Azure AD token credentials.
//!
//! This module provides:
//! - [`TokenCredential`] - The trait every credential implements
//! - [`AccessToken`] - A bearer token with its expiry instant
//! - [`ClientSecretCredential`] - Service principal with a shared secret
//! - [`ClientCertificateCredential`] - Service principal with a PEM
//!   certificate bundle, signing its own client assertion
//! - [`ClientAssertionCredential`] - Federated identity, exchanging an
//!   externally supplied assertion for a token
//! - [`ManagedIdentityCredential`] - IMDS-based managed identity
//! - [`AzureCliCredential`] - Delegates to a logged-in `az` CLI
//!
//! Credentials are stateless: every `fetch_token` call performs a fresh
//! acquisition. Caching lives in [`crate::auth::AuthProvider`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::assertion::{AssertionError, AssertionSource};
use crate::error::ErrorKind;
use crate::secret::Secret;

/// Default Azure AD authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// IMDS token endpoint for managed identity.
const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// IMDS api-version understood by all current Azure hosts.
const IMDS_API_VERSION: &str = "2018-02-01";

/// Lifetime of self-signed client assertions.
const CLIENT_ASSERTION_LIFETIME: Duration = Duration::from_secs(600);

/// Longest remote body excerpt carried in errors.
const BODY_SNIPPET_LEN: usize = 256;

/// Error type for credential construction and token acquisition.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Invalid or unusable credential material.
    #[error("credential configuration error: {message}")]
    Config { message: String },

    /// Network failure reaching the token endpoint, or a local process
    /// failure for the CLI credential.
    #[error("network error during token acquisition: {message}")]
    Transport { message: String },

    /// The token endpoint returned a non-2xx status.
    #[error("token endpoint returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// The token response violated the expected shape.
    #[error("token response malformed: {message}")]
    Protocol { message: String },

    /// Fetching the underlying assertion failed.
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    /// Every link in a credential chain failed.
    #[error("{}", chain_summary(failures))]
    ChainExhausted {
        failures: Vec<(String, Box<CredentialError>)>,
    },

    /// The caller cancelled the acquisition.
    #[error("token acquisition cancelled")]
    Cancelled,
}

fn chain_summary(failures: &[(String, Box<CredentialError>)]) -> String {
    let parts: Vec<String> = failures
        .iter()
        .map(|(label, error)| format!("{}: {}", label, error))
        .collect();
    format!("all credentials in the chain failed ({})", parts.join("; "))
}

impl CredentialError {
    /// Classify the error for the host runtime.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Assertion(e) => e.kind(),
            // The chain's classification follows its last attempt.
            Self::ChainExhausted { failures } => failures
                .last()
                .map(|(_, e)| e.kind())
                .unwrap_or(ErrorKind::Config),
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// A bearer token with its expiry instant.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The raw bearer token.
    pub token: Secret,
    /// When the token stops being valid.
    pub expires_on: DateTime<Utc>,
}

/// A source of Azure AD access tokens.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Acquire a token for the given scopes.
    async fn fetch_token(
        &self,
        scopes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<AccessToken, CredentialError>;
}

#[derive(Deserialize)]
struct AadTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct AadErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// POST a client-credentials form to the v2.0 token endpoint.
async fn post_token_form(
    http: &reqwest::Client,
    authority_host: &str,
    tenant_id: &str,
    form: &[(&str, &str)],
    cancel: &CancellationToken,
) -> Result<AccessToken, CredentialError> {
    let endpoint = token_endpoint(authority_host, tenant_id);
    debug!(tenant_id, "Requesting token from Azure AD");

    let request = http.post(&endpoint).form(form).send();
    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(CredentialError::Cancelled),
        result = request => result.map_err(|e| CredentialError::Transport {
            message: e.to_string(),
        })?,
    };

    let status = response.status();
    let body = tokio::select! {
        _ = cancel.cancelled() => return Err(CredentialError::Cancelled),
        result = response.text() => result.map_err(|e| CredentialError::Transport {
            message: e.to_string(),
        })?,
    };

    if !status.is_success() {
        return Err(CredentialError::Remote {
            status: status.as_u16(),
            body: aad_error_summary(&body),
        });
    }

    let parsed: AadTokenResponse =
        serde_json::from_str(&body).map_err(|e| CredentialError::Protocol {
            message: format!("unparseable token response: {}", e),
        })?;
    if parsed.access_token.is_empty() {
        return Err(CredentialError::Protocol {
            message: "token response carried an empty access_token".to_string(),
        });
    }

    Ok(AccessToken {
        token: Secret::new(parsed.access_token),
        expires_on: Utc::now() + chrono::Duration::seconds(parsed.expires_in as i64),
    })
}

fn token_endpoint(authority_host: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/'),
        tenant_id
    )
}

/// Prefer the structured AAD error fields over a raw body dump.
fn aad_error_summary(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<AadErrorResponse>(body) {
        match (parsed.error, parsed.error_description) {
            (Some(code), Some(description)) => {
                return format!("{}: {}", code, snippet(&description));
            }
            (Some(code), None) => return code,
            _ => {}
        }
    }
    snippet(body)
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

/// Derive the AAD v1 resource from a v2 scope.
///
/// IMDS and the `az` CLI speak resource URIs rather than scopes; the
/// conventional mapping strips a trailing `/.default`.
fn scope_to_resource(scopes: &[&str]) -> Result<String, CredentialError> {
    let scope = scopes.first().ok_or_else(|| CredentialError::Config {
        message: "no scope requested".to_string(),
    })?;
    Ok(scope.trim_end_matches("/.default").to_string())
}

/// Service principal authenticating with a shared secret.
#[derive(Debug, Clone)]
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: Secret,
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Secret,
    ) -> Result<Self, CredentialError> {
        if client_secret.is_empty() {
            return Err(CredentialError::Config {
                message: "client secret is empty".to_string(),
            });
        }
        Ok(Self {
            http,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret,
        })
    }

    /// Override the authority host (used by tests).
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn fetch_token(
        &self,
        scopes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<AccessToken, CredentialError> {
        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose()),
            ("scope", scope.as_str()),
        ];
        post_token_form(&self.http, &self.authority_host, &self.tenant_id, &form, cancel).await
    }
}

/// The signing half of a parsed PEM certificate bundle.
struct CertificateMaterial {
    key: EncodingKey,
    /// Base64url SHA-256 thumbprint of the leaf certificate DER.
    thumbprint: String,
}

impl std::fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("thumbprint", &self.thumbprint)
            .finish_non_exhaustive()
    }
}

/// Parse a PEM bundle holding a private key and at least one certificate.
fn parse_certificate_bundle(
    bundle: &[u8],
    password: Option<&Secret>,
) -> Result<CertificateMaterial, CredentialError> {
    let blocks = pem::parse_many(bundle).map_err(|e| CredentialError::Config {
        message: format!("invalid PEM certificate bundle: {}", e),
    })?;

    let mut key_block = None;
    let mut cert_block = None;
    for block in &blocks {
        match block.tag() {
            "CERTIFICATE" if cert_block.is_none() => cert_block = Some(block),
            "PRIVATE KEY" | "RSA PRIVATE KEY" if key_block.is_none() => key_block = Some(block),
            "ENCRYPTED PRIVATE KEY" => {
                return Err(CredentialError::Config {
                    message: "encrypted private keys are not supported; provide an \
                              unencrypted PEM bundle"
                        .to_string(),
                });
            }
            _ => {}
        }
    }
    if password.is_some_and(|p| !p.is_empty()) {
        return Err(CredentialError::Config {
            message: "certificate passwords are only meaningful for encrypted bundles, \
                      which are not supported"
                .to_string(),
        });
    }

    let key_block = key_block.ok_or_else(|| CredentialError::Config {
        message: "certificate bundle contains no private key".to_string(),
    })?;
    let cert_block = cert_block.ok_or_else(|| CredentialError::Config {
        message: "certificate bundle contains no certificate".to_string(),
    })?;

    let key_pem = pem::encode(key_block);
    let key = EncodingKey::from_rsa_pem(key_pem.as_bytes()).map_err(|e| {
        CredentialError::Config {
            message: format!("unusable private key in certificate bundle: {}", e),
        }
    })?;

    let digest = Sha256::digest(cert_block.contents());
    let thumbprint = URL_SAFE_NO_PAD.encode(digest);

    Ok(CertificateMaterial { key, thumbprint })
}

#[derive(serde::Serialize)]
struct AssertionClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    jti: String,
    nbf: i64,
    iat: i64,
    exp: i64,
}

/// Service principal authenticating with a certificate.
///
/// The certificate never leaves the process: a short-lived RS256 client
/// assertion is signed locally and sent in place of a secret.
pub struct ClientCertificateCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    material: CertificateMaterial,
}

impl ClientCertificateCredential {
    /// Build from raw PEM bundle bytes.
    pub fn new(
        http: reqwest::Client,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        bundle: &[u8],
        password: Option<&Secret>,
    ) -> Result<Self, CredentialError> {
        let material = parse_certificate_bundle(bundle, password)?;
        Ok(Self {
            http,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            material,
        })
    }

    /// Build from a PEM bundle on disk.
    pub fn from_file(
        http: reqwest::Client,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        path: &PathBuf,
        password: Option<&Secret>,
    ) -> Result<Self, CredentialError> {
        let bundle = std::fs::read(path).map_err(|e| CredentialError::Config {
            message: format!("failed to read certificate bundle {}: {}", path.display(), e),
        })?;
        Self::new(http, tenant_id, client_id, &bundle, password)
    }

    /// Override the authority host (used by tests).
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    fn sign_assertion(&self) -> Result<String, CredentialError> {
        let now = Utc::now();
        let endpoint = token_endpoint(&self.authority_host, &self.tenant_id);
        let claims = AssertionClaims {
            aud: &endpoint,
            iss: &self.client_id,
            sub: &self.client_id,
            jti: Uuid::new_v4().to_string(),
            nbf: now.timestamp(),
            iat: now.timestamp(),
            exp: (now + CLIENT_ASSERTION_LIFETIME).timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.x5t_s256 = Some(self.material.thumbprint.clone());

        jsonwebtoken::encode(&header, &claims, &self.material.key).map_err(|e| {
            CredentialError::Config {
                message: format!("failed to sign client assertion: {}", e),
            }
        })
    }
}

#[async_trait]
impl TokenCredential for ClientCertificateCredential {
    async fn fetch_token(
        &self,
        scopes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<AccessToken, CredentialError> {
        let assertion = self.sign_assertion()?;
        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            (
                "client_assertion_type",
                "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
            ),
            ("client_assertion", assertion.as_str()),
            ("scope", scope.as_str()),
        ];
        post_token_form(&self.http, &self.authority_host, &self.tenant_id, &form, cancel).await
    }
}

/// Federated identity credential.
///
/// Fetches a fresh assertion from its source on every request, so
/// rotated workload-identity tokens are picked up without restarts.
pub struct ClientAssertionCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    source: AssertionSource,
}

impl ClientAssertionCredential {
    pub fn new(
        http: reqwest::Client,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        source: AssertionSource,
    ) -> Self {
        Self {
            http,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            source,
        }
    }

    /// Override the authority host (used by tests).
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }
}

#[async_trait]
impl TokenCredential for ClientAssertionCredential {
    async fn fetch_token(
        &self,
        scopes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<AccessToken, CredentialError> {
        let assertion = self.source.fetch(cancel).await?;
        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            (
                "client_assertion_type",
                "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
            ),
            ("client_assertion", assertion.as_str()),
            ("scope", scope.as_str()),
        ];
        post_token_form(&self.http, &self.authority_host, &self.tenant_id, &form, cancel).await
    }
}

#[derive(Deserialize)]
struct ImdsTokenResponse {
    access_token: String,
    /// Unix timestamp as a string.
    expires_on: String,
}

/// Managed identity via the Azure instance metadata service.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    endpoint: String,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(http: reqwest::Client, client_id: Option<String>) -> Self {
        Self {
            http,
            endpoint: IMDS_TOKEN_ENDPOINT.to_string(),
            client_id,
        }
    }

    /// Override the IMDS endpoint (used by tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn fetch_token(
        &self,
        scopes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<AccessToken, CredentialError> {
        let resource = scope_to_resource(scopes)?;
        debug!("Requesting token from IMDS");

        let mut request = self
            .http
            .get(&self.endpoint)
            .header("Metadata", "true")
            .query(&[("api-version", IMDS_API_VERSION), ("resource", &resource)]);
        if let Some(client_id) = &self.client_id {
            request = request.query(&[("client_id", client_id.as_str())]);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(CredentialError::Cancelled),
            result = request.send() => result.map_err(|e| CredentialError::Transport {
                message: e.to_string(),
            })?,
        };

        let status = response.status();
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(CredentialError::Cancelled),
            result = response.text() => result.map_err(|e| CredentialError::Transport {
                message: e.to_string(),
            })?,
        };

        if !status.is_success() {
            return Err(CredentialError::Remote {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let parsed: ImdsTokenResponse =
            serde_json::from_str(&body).map_err(|e| CredentialError::Protocol {
                message: format!("unparseable IMDS response: {}", e),
            })?;
        let expires_on: i64 = parsed.expires_on.parse().map_err(|_| {
            CredentialError::Protocol {
                message: format!("non-numeric IMDS expires_on: {}", parsed.expires_on),
            }
        })?;
        let expires_on = Utc
            .timestamp_opt(expires_on, 0)
            .single()
            .ok_or_else(|| CredentialError::Protocol {
                message: "IMDS expires_on out of range".to_string(),
            })?;

        Ok(AccessToken {
            token: Secret::new(parsed.access_token),
            expires_on,
        })
    }
}

#[derive(Deserialize)]
struct CliTokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Unix timestamp; present on current CLI versions.
    expires_on: Option<i64>,
    /// Local timestamp string; the legacy field.
    #[serde(rename = "expiresOn")]
    expires_on_local: Option<String>,
}

/// Developer credential delegating to a logged-in `az` CLI.
#[derive(Debug, Clone, Default)]
pub struct AzureCliCredential;

impl AzureCliCredential {
    pub fn new() -> Self {
        Self
    }

    fn parse_output(body: &str) -> Result<AccessToken, CredentialError> {
        let parsed: CliTokenResponse =
            serde_json::from_str(body).map_err(|e| CredentialError::Protocol {
                message: format!("unparseable az CLI output: {}", e),
            })?;

        let expires_on = match (parsed.expires_on, parsed.expires_on_local) {
            (Some(unix), _) => Utc
                .timestamp_opt(unix, 0)
                .single()
                .ok_or_else(|| CredentialError::Protocol {
                    message: "az CLI expires_on out of range".to_string(),
                })?,
            (None, Some(local)) => {
                let naive =
                    chrono::NaiveDateTime::parse_from_str(&local, "%Y-%m-%d %H:%M:%S%.f")
                        .map_err(|e| CredentialError::Protocol {
                            message: format!("unparseable az CLI expiresOn: {}", e),
                        })?;
                match chrono::Local.from_local_datetime(&naive) {
                    chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
                        dt.with_timezone(&Utc)
                    }
                    chrono::LocalResult::None => {
                        return Err(CredentialError::Protocol {
                            message: "az CLI expiresOn does not map to a local instant"
                                .to_string(),
                        });
                    }
                }
            }
            (None, None) => {
                return Err(CredentialError::Protocol {
                    message: "az CLI output carried no expiry".to_string(),
                });
            }
        };

        Ok(AccessToken {
            token: Secret::new(parsed.access_token),
            expires_on,
        })
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn fetch_token(
        &self,
        scopes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<AccessToken, CredentialError> {
        let resource = scope_to_resource(scopes)?;
        debug!("Requesting token from az CLI");

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(CredentialError::Cancelled),
            result = tokio::process::Command::new("az")
                .args(["account", "get-access-token", "--output", "json", "--resource"])
                .arg(&resource)
                .output() => result.map_err(|e| CredentialError::Transport {
                    message: format!("failed to run az CLI: {}", e),
                })?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CredentialError::Transport {
                message: format!("az CLI exited with {}: {}", output.status, snippet(&stderr)),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_to_resource_strips_default_suffix() {
        let resource =
            scope_to_resource(&["499b84ac-1321-427f-aa17-267ca6975798/.default"]).unwrap();
        assert_eq!(resource, "499b84ac-1321-427f-aa17-267ca6975798");
    }

    #[test]
    fn test_scope_to_resource_empty_scopes() {
        let err = scope_to_resource(&[]).unwrap_err();
        assert!(matches!(err, CredentialError::Config { .. }));
    }

    #[test]
    fn test_token_endpoint_shape() {
        assert_eq!(
            token_endpoint("https://login.microsoftonline.com/", "tenant-a"),
            "https://login.microsoftonline.com/tenant-a/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_client_secret_rejects_empty_secret() {
        let err = ClientSecretCredential::new(
            reqwest::Client::new(),
            "tenant",
            "client",
            Secret::new(""),
        )
        .unwrap_err();
        assert!(matches!(err, CredentialError::Config { .. }));
    }

    #[test]
    fn test_aad_error_summary_prefers_structured_fields() {
        let body = r#"{"error":"invalid_client","error_description":"AADSTS7000215: bad secret"}"#;
        let summary = aad_error_summary(body);
        assert!(summary.starts_with("invalid_client:"));
        assert!(summary.contains("AADSTS7000215"));
    }

    #[test]
    fn test_aad_error_summary_falls_back_to_snippet() {
        assert_eq!(aad_error_summary("plain text failure"), "plain text failure");
    }

    #[test]
    fn test_parse_certificate_bundle_rejects_garbage() {
        let err = parse_certificate_bundle(b"not pem at all \x00", None).unwrap_err();
        assert!(matches!(err, CredentialError::Config { .. }));
    }

    #[test]
    fn test_parse_certificate_bundle_requires_key_and_cert() {
        // A certificate alone is not enough to sign an assertion.
        let cert_only = pem::encode(&pem::Pem::new("CERTIFICATE", vec![1, 2, 3]));
        let err = parse_certificate_bundle(cert_only.as_bytes(), None).unwrap_err();
        assert!(matches!(err, CredentialError::Config { .. }));
    }

    #[test]
    fn test_parse_certificate_bundle_rejects_encrypted_key() {
        let bundle = pem::encode_many(&[
            pem::Pem::new("CERTIFICATE", vec![1, 2, 3]),
            pem::Pem::new("ENCRYPTED PRIVATE KEY", vec![4, 5, 6]),
        ]);
        let err = parse_certificate_bundle(bundle.as_bytes(), None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("encrypted"));
    }

    #[test]
    fn test_parse_certificate_bundle_rejects_password() {
        let bundle = pem::encode_many(&[
            pem::Pem::new("CERTIFICATE", vec![1, 2, 3]),
            pem::Pem::new("PRIVATE KEY", vec![4, 5, 6]),
        ]);
        let password = Secret::new("hunter2");
        let err = parse_certificate_bundle(bundle.as_bytes(), Some(&password)).unwrap_err();
        assert!(matches!(err, CredentialError::Config { .. }));
    }

    #[test]
    fn test_cli_output_unix_expiry() {
        let token = AzureCliCredential::parse_output(
            r#"{"accessToken":"tok","expires_on":1700000000,"expiresOn":"2023-11-14 14:13:20.000000"}"#,
        )
        .unwrap();
        assert_eq!(token.token.expose(), "tok");
        assert_eq!(token.expires_on.timestamp(), 1700000000);
    }

    #[test]
    fn test_cli_output_missing_expiry_is_protocol_error() {
        let err = AzureCliCredential::parse_output(r#"{"accessToken":"tok"}"#).unwrap_err();
        assert!(matches!(err, CredentialError::Protocol { .. }));
    }
}
