//! Declarative provider configuration.
//!
//! This module provides:
//! - [`ProviderConfig`] - The closed record of recognized configuration keys
//! - [`ConfigError`] - Validation failures surfaced to the host runtime
//! - Material resolution helpers that enforce the inline-vs-file rules
//!
//! The record is read once per plugin lifecycle. Two forms of the same
//! credential material (inline value and file path) may coexist only if
//! they are byte-equal after trimming; otherwise validation fails rather
//! than silently picking one.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::secret::Secret;

/// Environment fallback for `org_service_url`.
pub const ENV_ORG_SERVICE_URL: &str = "AZDO_ORG_SERVICE_URL";

/// Environment fallback for `personal_access_token`.
pub const ENV_PERSONAL_ACCESS_TOKEN: &str = "AZDO_PERSONAL_ACCESS_TOKEN";

/// Error type for configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field is missing or empty.
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    /// Inline and file forms of the same material disagree.
    #[error("conflicting values for {field}: inline value and file contents differ")]
    Conflict { field: &'static str },

    /// A field value is malformed.
    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    /// A file-backed field could not be read.
    #[error("failed to read {field} from {path}: {source}")]
    Io {
        field: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The declarative authentication configuration for one provider session.
///
/// All fields are optional at the record level; which combination is
/// required depends on the selected authentication path and is enforced
/// by [`resolve_auth_provider`](crate::resolve::resolve_auth_provider).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the Azure DevOps organization.
    pub org_service_url: Option<String>,

    /// Personal access token; selects PAT auth and is terminal.
    pub personal_access_token: Option<Secret>,

    /// AAD tenant the application lives in.
    pub tenant_id: Option<String>,

    /// AAD application (client) id; also selects the user-assigned
    /// identity when `use_msi` is set.
    pub client_id: Option<String>,

    /// Client secret, inline.
    pub client_secret: Option<Secret>,

    /// Client secret, read from a file.
    pub client_secret_path: Option<PathBuf>,

    /// Certificate bundle (PEM with certificate and private key),
    /// base64-encoded inline.
    pub client_certificate: Option<String>,

    /// Certificate bundle, read from a file.
    pub client_certificate_path: Option<PathBuf>,

    /// Password for encrypted certificate bundles. Accepted for input
    /// compatibility; encrypted bundles are rejected during credential
    /// construction.
    pub client_certificate_password: Option<Secret>,

    /// Enable assertion-based (workload identity / OIDC) auth.
    pub use_oidc: bool,

    /// A literal assertion JWT.
    pub oidc_token: Option<Secret>,

    /// Path to a file holding the assertion JWT; re-read on each refresh.
    pub oidc_token_file_path: Option<PathBuf>,

    /// Token-exchange endpoint (Github Actions style).
    pub oidc_request_url: Option<String>,

    /// Bearer token presented to the token-exchange endpoint.
    pub oidc_request_token: Option<Secret>,

    /// Audience override for the token exchange.
    pub oidc_audience: Option<String>,

    /// Azure Pipelines service connection id; routes the exchange to the
    /// pipelines flow instead of the Github one.
    pub oidc_azure_service_connection_id: Option<String>,

    /// Enable managed-identity auth.
    pub use_msi: bool,
}

impl ProviderConfig {
    /// Resolve the organization base URL.
    ///
    /// Falls back to `AZDO_ORG_SERVICE_URL`, then normalizes: trailing
    /// slashes trimmed, lower-cased. Empty results are a hard error so
    /// no request is ever issued against a malformed base.
    pub fn org_url(&self) -> Result<String, ConfigError> {
        let raw = match &self.org_service_url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => std::env::var(ENV_ORG_SERVICE_URL).unwrap_or_default(),
        };
        let normalized = normalize_org_url(&raw);
        if normalized.is_empty() {
            return Err(ConfigError::MissingField {
                field: "org_service_url",
            });
        }
        Ok(normalized)
    }

    /// Resolve the personal access token, falling back to
    /// `AZDO_PERSONAL_ACCESS_TOKEN`.
    pub fn personal_access_token(&self) -> Option<Secret> {
        match &self.personal_access_token {
            Some(pat) if !pat.is_empty() => Some(pat.clone()),
            _ => match std::env::var(ENV_PERSONAL_ACCESS_TOKEN) {
                Ok(v) if !v.trim().is_empty() => Some(Secret::new(v)),
                _ => None,
            },
        }
    }

    /// Resolve the client secret from its inline or file form.
    ///
    /// Returns `Ok(None)` when neither form is set. When both are set,
    /// the trimmed contents must agree.
    pub fn client_secret_material(&self) -> Result<Option<Secret>, ConfigError> {
        let inline = self
            .client_secret
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s.expose().trim().to_string());
        let from_file = self
            .client_secret_path
            .as_deref()
            .map(|path| read_trimmed("client_secret_path", path))
            .transpose()?
            .filter(|s| !s.is_empty());

        merge_material("client_secret", inline, from_file)
            .map(|opt| opt.map(Secret::new))
    }

    /// Resolve the certificate bundle (PEM bytes) from its inline base64
    /// or file form, enforcing the same agreement rule.
    pub fn client_certificate_material(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let inline = match self.client_certificate.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => {
                let decoded =
                    BASE64
                        .decode(encoded)
                        .map_err(|e| ConfigError::Invalid {
                            field: "client_certificate",
                            message: format!("not valid base64: {}", e),
                        })?;
                Some(String::from_utf8(decoded).map_err(|_| ConfigError::Invalid {
                    field: "client_certificate",
                    message: "decoded bundle is not valid PEM text".to_string(),
                })?)
            }
            _ => None,
        };
        let from_file = self
            .client_certificate_path
            .as_deref()
            .map(|path| read_trimmed("client_certificate_path", path))
            .transpose()?
            .filter(|s| !s.is_empty());

        let merged = merge_material(
            "client_certificate",
            inline.map(|s| s.trim().to_string()),
            from_file,
        )?;
        Ok(merged.map(String::into_bytes))
    }

    /// Resolve the literal assertion token, if both the inline and the
    /// file form are present, enforcing the agreement rule.
    ///
    /// Note the file form is normally consumed by the file-backed
    /// credential directly (so rotation is picked up per refresh); this
    /// helper exists for the conflict check and the inline path.
    pub fn oidc_token_material(&self) -> Result<Option<Secret>, ConfigError> {
        let inline = self
            .oidc_token
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s.expose().trim().to_string());
        let from_file = self
            .oidc_token_file_path
            .as_deref()
            .map(|path| read_trimmed("oidc_token_file_path", path))
            .transpose()?
            .filter(|s| !s.is_empty());

        merge_material("oidc_token", inline, from_file).map(|opt| opt.map(Secret::new))
    }

    /// The AAD tenant id, or a `MissingField` error naming it.
    pub fn require_tenant_id(&self) -> Result<&str, ConfigError> {
        require_field("tenant_id", self.tenant_id.as_deref())
    }

    /// The AAD client id, or a `MissingField` error naming it.
    pub fn require_client_id(&self) -> Result<&str, ConfigError> {
        require_field("client_id", self.client_id.as_deref())
    }
}

fn require_field<'a>(
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingField { field }),
    }
}

fn read_trimmed(field: &'static str, path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| ConfigError::Io {
            field,
            path: path.to_path_buf(),
            source,
        })
}

/// Merge the inline and file forms of one material.
///
/// Both present and unequal is a conflict, never a silent pick.
fn merge_material(
    field: &'static str,
    inline: Option<String>,
    from_file: Option<String>,
) -> Result<Option<String>, ConfigError> {
    match (inline, from_file) {
        (Some(a), Some(b)) if a == b => Ok(Some(a)),
        (Some(_), Some(_)) => Err(ConfigError::Conflict { field }),
        (Some(a), None) => Ok(Some(a)),
        (None, Some(b)) => Ok(Some(b)),
        (None, None) => Ok(None),
    }
}

/// Normalize an organization base URL: trailing slashes trimmed,
/// lower-cased.
pub fn normalize_org_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_org_url_trims_and_lowercases() {
        assert_eq!(
            normalize_org_url("https://Dev.Azure.com/MyOrg/"),
            "https://dev.azure.com/myorg"
        );
        assert_eq!(
            normalize_org_url("https://dev.azure.com/org///"),
            "https://dev.azure.com/org"
        );
        assert_eq!(normalize_org_url("  "), "");
    }

    #[test]
    fn test_org_url_missing_is_error() {
        let config = ProviderConfig {
            org_service_url: Some("   ".to_string()),
            ..Default::default()
        };
        // Only meaningful when the env fallback is unset; skip otherwise.
        if std::env::var(ENV_ORG_SERVICE_URL).is_err() {
            assert!(matches!(
                config.org_url(),
                Err(ConfigError::MissingField { field: "org_service_url" })
            ));
        }
    }

    #[test]
    fn test_client_secret_inline_only() {
        let config = ProviderConfig {
            client_secret: Some(Secret::new("  s3cret \n")),
            ..Default::default()
        };
        let material = config.client_secret_material().unwrap().unwrap();
        assert_eq!(material.expose(), "s3cret");
    }

    #[test]
    fn test_client_secret_inline_and_file_agree() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s3cret").unwrap();

        let config = ProviderConfig {
            client_secret: Some(Secret::new("s3cret")),
            client_secret_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let material = config.client_secret_material().unwrap().unwrap();
        assert_eq!(material.expose(), "s3cret");
    }

    #[test]
    fn test_client_secret_inline_and_file_conflict() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "other").unwrap();

        let config = ProviderConfig {
            client_secret: Some(Secret::new("s3cret")),
            client_secret_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            config.client_secret_material(),
            Err(ConfigError::Conflict { field: "client_secret" })
        ));
    }

    #[test]
    fn test_client_certificate_invalid_base64() {
        let config = ProviderConfig {
            client_certificate: Some("%%% not base64 %%%".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.client_certificate_material(),
            Err(ConfigError::Invalid { field: "client_certificate", .. })
        ));
    }

    #[test]
    fn test_client_certificate_file_read_failure() {
        let config = ProviderConfig {
            client_certificate_path: Some(PathBuf::from("/definitely/not/here.pem")),
            ..Default::default()
        };
        assert!(matches!(
            config.client_certificate_material(),
            Err(ConfigError::Io { field: "client_certificate_path", .. })
        ));
    }

    #[test]
    fn test_require_fields_name_the_field() {
        let config = ProviderConfig::default();
        assert!(matches!(
            config.require_tenant_id(),
            Err(ConfigError::MissingField { field: "tenant_id" })
        ));
        assert!(matches!(
            config.require_client_id(),
            Err(ConfigError::MissingField { field: "client_id" })
        ));
    }
}
