//! Configuration-to-provider routing.
//!
//! This module turns a validated [`ProviderConfig`] into an
//! [`AuthProvider`]:
//! - A personal access token is terminal: it selects Basic auth and no
//!   other mechanism is considered.
//! - Otherwise the configured AAD mechanisms are assembled into an
//!   ordered [`ChainedCredential`]: OIDC token, OIDC token file, OIDC
//!   exchange, client certificate, client secret, managed identity, and
//!   finally the `az` CLI as the developer fallback.
//!
//! A mechanism is included only when its distinguishing input is set;
//! once that input is present, the mechanism's remaining requirements
//! are hard errors rather than silent fall-through.

use std::sync::Arc;

use tracing::debug;

use crate::assertion::{AssertionSource, TokenExchange};
use crate::auth::AuthProvider;
use crate::chain::ChainedCredential;
use crate::config::ProviderConfig;
use crate::credential::{
    AzureCliCredential, ClientAssertionCredential, ClientCertificateCredential,
    ClientSecretCredential, ManagedIdentityCredential, TokenCredential,
};
use crate::error::CoreError;

/// Resolve the configured authentication mechanism.
pub fn resolve_auth_provider(
    config: &ProviderConfig,
    http: &reqwest::Client,
) -> Result<AuthProvider, CoreError> {
    if let Some(pat) = config.personal_access_token() {
        debug!("Using personal access token authentication");
        return Ok(AuthProvider::pat(pat));
    }

    let chain = resolve_credential_chain(config, http)?;
    debug!(credentials = ?chain.labels(), "Using Azure AD authentication");
    Ok(AuthProvider::aad(Box::new(chain)))
}

/// Assemble the ordered AAD credential chain for a PAT-less config.
pub fn resolve_credential_chain(
    config: &ProviderConfig,
    http: &reqwest::Client,
) -> Result<ChainedCredential, CoreError> {
    let mut links: Vec<(String, Arc<dyn TokenCredential>)> = Vec::new();

    let has_inline_token = config.oidc_token.as_ref().is_some_and(|t| !t.is_empty());
    let has_token_file = config.oidc_token_file_path.is_some();
    let has_exchange = config.oidc_request_url.is_some() || config.oidc_request_token.is_some();

    if config.use_oidc || has_inline_token || has_token_file || has_exchange {
        let tenant_id = config.require_tenant_id()?;
        let client_id = config.require_client_id()?;

        if has_inline_token && has_token_file {
            // Both forms set: enforce the agreement rule up front.
            config.oidc_token_material()?;
        }

        if let Some(token) = config.oidc_token.as_ref().filter(|t| !t.is_empty()) {
            links.push((
                "oidc_token".to_string(),
                Arc::new(ClientAssertionCredential::new(
                    http.clone(),
                    tenant_id,
                    client_id,
                    AssertionSource::Value(token.clone()),
                )),
            ));
        }
        if let Some(path) = &config.oidc_token_file_path {
            links.push((
                "oidc_token_file".to_string(),
                Arc::new(ClientAssertionCredential::new(
                    http.clone(),
                    tenant_id,
                    client_id,
                    AssertionSource::File(path.clone()),
                )),
            ));
        }
        if has_exchange {
            let request_url = config.oidc_request_url.clone().unwrap_or_default();
            let request_token = config.oidc_request_token.clone().unwrap_or_default();
            let mut exchange = TokenExchange::new(http.clone(), request_url, request_token)?;
            if let Some(audience) = &config.oidc_audience {
                exchange = exchange.with_audience(audience);
            }
            if let Some(id) = &config.oidc_azure_service_connection_id {
                exchange = exchange.with_service_connection(id);
            }
            links.push((
                "oidc_exchange".to_string(),
                Arc::new(ClientAssertionCredential::new(
                    http.clone(),
                    tenant_id,
                    client_id,
                    AssertionSource::Exchange(exchange),
                )),
            ));
        }
    }

    if let Some(bundle) = config.client_certificate_material()? {
        let tenant_id = config.require_tenant_id()?;
        let client_id = config.require_client_id()?;
        let credential = ClientCertificateCredential::new(
            http.clone(),
            tenant_id,
            client_id,
            &bundle,
            config.client_certificate_password.as_ref(),
        )?;
        links.push(("client_certificate".to_string(), Arc::new(credential)));
    }

    if let Some(secret) = config.client_secret_material()? {
        let tenant_id = config.require_tenant_id()?;
        let client_id = config.require_client_id()?;
        let credential = ClientSecretCredential::new(http.clone(), tenant_id, client_id, secret)?;
        links.push(("client_secret".to_string(), Arc::new(credential)));
    }

    if config.use_msi {
        links.push((
            "managed_identity".to_string(),
            Arc::new(ManagedIdentityCredential::new(
                http.clone(),
                config.client_id.clone(),
            )),
        ));
    }

    // Developer fallback: a logged-in az CLI session.
    links.push(("azure_cli".to_string(), Arc::new(AzureCliCredential::new())));

    Ok(ChainedCredential::new(links)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::config::ConfigError;
    use crate::secret::Secret;

    fn aad_base() -> ProviderConfig {
        ProviderConfig {
            tenant_id: Some("tenant".to_string()),
            client_id: Some("client".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_pat_is_terminal() {
        let config = ProviderConfig {
            personal_access_token: Some(Secret::new("pat")),
            // Other mechanisms configured but ignored.
            use_msi: true,
            ..aad_base()
        };
        let provider = resolve_auth_provider(&config, &reqwest::Client::new()).unwrap();
        assert!(matches!(provider, AuthProvider::Pat { .. }));
    }

    #[test]
    fn test_chain_order_with_everything_configured() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "header.payload.sig").unwrap();

        let config = ProviderConfig {
            oidc_token: Some(Secret::new("header.payload.sig")),
            oidc_token_file_path: Some(file.path().to_path_buf()),
            oidc_request_url: Some("https://token.example/get".to_string()),
            oidc_request_token: Some(Secret::new("req")),
            client_secret: Some(Secret::new("s3cret")),
            use_msi: true,
            ..aad_base()
        };
        let chain = resolve_credential_chain(&config, &reqwest::Client::new()).unwrap();
        assert_eq!(
            chain.labels(),
            vec![
                "oidc_token",
                "oidc_token_file",
                "oidc_exchange",
                "client_secret",
                "managed_identity",
                "azure_cli",
            ]
        );
    }

    #[test]
    fn test_bare_config_falls_back_to_cli() {
        let chain =
            resolve_credential_chain(&ProviderConfig::default(), &reqwest::Client::new()).unwrap();
        assert_eq!(chain.labels(), vec!["azure_cli"]);
    }

    #[test]
    fn test_oidc_requires_tenant_and_client() {
        let config = ProviderConfig {
            use_oidc: true,
            oidc_token: Some(Secret::new("jwt")),
            ..Default::default()
        };
        let err = resolve_credential_chain(&config, &reqwest::Client::new()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::MissingField { field: "tenant_id" })
        ));
    }

    #[test]
    fn test_oidc_token_conflict_is_hard_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "a-different-token").unwrap();

        let config = ProviderConfig {
            oidc_token: Some(Secret::new("inline-token")),
            oidc_token_file_path: Some(file.path().to_path_buf()),
            ..aad_base()
        };
        let err = resolve_credential_chain(&config, &reqwest::Client::new()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::Conflict { field: "oidc_token" })
        ));
    }

    #[test]
    fn test_exchange_url_without_token_is_error() {
        let config = ProviderConfig {
            oidc_request_url: Some("https://token.example/get".to_string()),
            ..aad_base()
        };
        let err = resolve_credential_chain(&config, &reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, CoreError::Assertion(_)));
    }

    #[test]
    fn test_bad_certificate_material_is_hard_error() {
        let config = ProviderConfig {
            client_certificate_path: Some({
                let mut file = tempfile::NamedTempFile::new().unwrap();
                write!(file, "not a pem bundle").unwrap();
                let (_, path) = file.keep().unwrap();
                path
            }),
            ..aad_base()
        };
        let err = resolve_credential_chain(&config, &reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, CoreError::Credential(_)));
    }
}
