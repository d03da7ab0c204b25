//! Authorization header production.
//!
//! This module provides [`AuthProvider`], the single seam between
//! credential resolution and the HTTP transport. A provider is either a
//! personal access token (Basic auth) or an Azure AD credential (Bearer
//! auth with a cached token refreshed ahead of expiry).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::credential::{AccessToken, CredentialError, TokenCredential};
use crate::secret::Secret;

/// OAuth scope of the Azure DevOps first-party application.
pub const AZDO_APP_DEFAULT_SCOPE: &str = "499b84ac-1321-427f-aa17-267ca6975798/.default";

/// Tokens are refreshed once they are within this margin of expiry.
const REFRESH_MARGIN_SECS: i64 = 300;

/// Produces `Authorization` header values for Azure DevOps requests.
pub enum AuthProvider {
    /// Personal access token, sent as HTTP Basic with an `_` username.
    Pat { token: Secret },
    /// Azure AD credential, sent as Bearer with a cached access token.
    Aad {
        credential: Box<dyn TokenCredential>,
        scopes: Vec<String>,
        cached: RwLock<Option<AccessToken>>,
    },
}

impl AuthProvider {
    /// Build a PAT provider.
    pub fn pat(token: Secret) -> Self {
        Self::Pat { token }
    }

    /// Build an AAD provider over any credential, requesting the Azure
    /// DevOps first-party scope.
    pub fn aad(credential: Box<dyn TokenCredential>) -> Self {
        Self::Aad {
            credential,
            scopes: vec![AZDO_APP_DEFAULT_SCOPE.to_string()],
            cached: RwLock::new(None),
        }
    }

    /// Build an AAD provider with explicit scopes.
    pub fn aad_with_scopes(credential: Box<dyn TokenCredential>, scopes: Vec<String>) -> Self {
        Self::Aad {
            credential,
            scopes,
            cached: RwLock::new(None),
        }
    }

    /// Produce the `Authorization` header value for the next request.
    pub async fn authorization_header(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String, CredentialError> {
        match self {
            Self::Pat { token } => {
                let encoded = STANDARD.encode(format!("_:{}", token.expose()));
                Ok(format!("Basic {}", encoded))
            }
            Self::Aad {
                credential,
                scopes,
                cached,
            } => {
                let token = self
                    .cached_or_fetch(credential.as_ref(), scopes, cached, cancel)
                    .await?;
                Ok(format!("Bearer {}", token.expose()))
            }
        }
    }

    async fn cached_or_fetch(
        &self,
        credential: &dyn TokenCredential,
        scopes: &[String],
        cached: &RwLock<Option<AccessToken>>,
        cancel: &CancellationToken,
    ) -> Result<Secret, CredentialError> {
        {
            let guard = cached.read().await;
            if let Some(token) = guard.as_ref() {
                if is_fresh(token) {
                    return Ok(token.token.clone());
                }
            }
        }

        // Re-check under the write lock: another request may have
        // refreshed the token while we waited.
        let mut guard = cached.write().await;
        if let Some(token) = guard.as_ref() {
            if is_fresh(token) {
                return Ok(token.token.clone());
            }
        }

        debug!("Access token absent or near expiry, fetching");
        let scope_refs: Vec<&str> = scopes.iter().map(String::as_str).collect();
        let token = credential.fetch_token(&scope_refs, cancel).await?;
        let secret = token.token.clone();
        *guard = Some(token);
        Ok(secret)
    }
}

fn is_fresh(token: &AccessToken) -> bool {
    token.expires_on - Utc::now() > Duration::seconds(REFRESH_MARGIN_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;

    struct CountingCredential {
        calls: Arc<AtomicUsize>,
        expires_on: DateTime<Utc>,
    }

    #[async_trait]
    impl TokenCredential for CountingCredential {
        async fn fetch_token(
            &self,
            _scopes: &[&str],
            _cancel: &CancellationToken,
        ) -> Result<AccessToken, CredentialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken {
                token: Secret::new(format!("token-{}", n)),
                expires_on: self.expires_on,
            })
        }
    }

    #[tokio::test]
    async fn test_pat_header_is_basic_with_underscore_user() {
        let provider = AuthProvider::pat(Secret::new("my-pat"));
        let header = provider
            .authorization_header(&CancellationToken::new())
            .await
            .unwrap();
        // base64("_:my-pat")
        assert_eq!(header, format!("Basic {}", STANDARD.encode("_:my-pat")));
    }

    #[tokio::test]
    async fn test_aad_header_caches_fresh_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = AuthProvider::aad(Box::new(CountingCredential {
            calls: calls.clone(),
            expires_on: Utc::now() + Duration::hours(1),
        }));

        let cancel = CancellationToken::new();
        let first = provider.authorization_header(&cancel).await.unwrap();
        let second = provider.authorization_header(&cancel).await.unwrap();
        assert_eq!(first, "Bearer token-0");
        assert_eq!(second, "Bearer token-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_aad_header_refreshes_near_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Expires inside the refresh margin, so every call refetches.
        let provider = AuthProvider::aad(Box::new(CountingCredential {
            calls: calls.clone(),
            expires_on: Utc::now() + Duration::seconds(60),
        }));

        let cancel = CancellationToken::new();
        provider.authorization_header(&cancel).await.unwrap();
        let second = provider.authorization_header(&cancel).await.unwrap();
        assert_eq!(second, "Bearer token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_default_scope_is_azure_devops_app() {
        struct ScopeCheck;

        #[async_trait]
        impl TokenCredential for ScopeCheck {
            async fn fetch_token(
                &self,
                scopes: &[&str],
                _cancel: &CancellationToken,
            ) -> Result<AccessToken, CredentialError> {
                assert_eq!(scopes, [AZDO_APP_DEFAULT_SCOPE]);
                Ok(AccessToken {
                    token: Secret::new("t"),
                    expires_on: Utc::now() + Duration::hours(1),
                })
            }
        }

        let provider = AuthProvider::aad(Box::new(ScopeCheck));
        provider
            .authorization_header(&CancellationToken::new())
            .await
            .unwrap();
    }
}
