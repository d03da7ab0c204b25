//! Ordered credential chain.
//!
//! This module provides [`ChainedCredential`], which tries a fixed list
//! of labelled credentials in order and returns the first token that any
//! of them produces. Each link failure is logged at warn level with its
//! label; the chain only fails once every link has failed, and its error
//! enumerates every link's failure exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::credential::{AccessToken, CredentialError, TokenCredential};

/// A labelled sequence of credentials tried in order.
pub struct ChainedCredential {
    links: Vec<(String, Arc<dyn TokenCredential>)>,
}

impl ChainedCredential {
    /// Build a chain from labelled links.
    ///
    /// An empty chain is a configuration error: it means no credential
    /// mechanism could be constructed from the given inputs.
    pub fn new(links: Vec<(String, Arc<dyn TokenCredential>)>) -> Result<Self, CredentialError> {
        if links.is_empty() {
            return Err(CredentialError::Config {
                message: "no usable credential mechanism configured".to_string(),
            });
        }
        Ok(Self { links })
    }

    /// Labels of the links, in trial order.
    pub fn labels(&self) -> Vec<&str> {
        self.links.iter().map(|(label, _)| label.as_str()).collect()
    }
}

impl std::fmt::Debug for ChainedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainedCredential")
            .field("labels", &self.labels())
            .finish()
    }
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    async fn fetch_token(
        &self,
        scopes: &[&str],
        cancel: &CancellationToken,
    ) -> Result<AccessToken, CredentialError> {
        let mut failures = Vec::new();
        for (label, credential) in &self.links {
            if cancel.is_cancelled() {
                return Err(CredentialError::Cancelled);
            }
            match credential.fetch_token(scopes, cancel).await {
                Ok(token) => {
                    debug!(credential = %label, "Credential chain succeeded");
                    return Ok(token);
                }
                Err(CredentialError::Cancelled) => return Err(CredentialError::Cancelled),
                Err(e) => {
                    warn!(credential = %label, error = %e, "Credential failed, trying next");
                    failures.push((label.clone(), Box::new(e)));
                }
            }
        }
        Err(CredentialError::ChainExhausted { failures })
    }
}
