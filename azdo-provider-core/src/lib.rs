//! # Azure DevOps Provider Core
//!
//! Credential resolution and authentication primitives for the Azure
//! DevOps provider.
//!
//! This crate provides:
//! - A declarative configuration record and its validation rules
//! - Token credentials for every supported Azure AD mechanism, plus an
//!   ordered first-success chain over them
//! - An authorization provider producing `Basic` (PAT) or cached
//!   `Bearer` (AAD) headers
//! - bcrypt memos for detecting secret drift without storing secrets
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use azdo_provider_core::{ProviderConfig, resolve_auth_provider};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn header(config: &ProviderConfig) -> Result<String, Box<dyn std::error::Error>> {
//!     let http = reqwest::Client::new();
//!     let provider = resolve_auth_provider(config, &http)?;
//!     Ok(provider.authorization_header(&CancellationToken::new()).await?)
//! }
//! ```

pub mod assertion;
pub mod auth;
pub mod chain;
pub mod config;
pub mod credential;
pub mod error;
pub mod memo;
pub mod resolve;
pub mod secret;

// Re-export commonly used types at crate root
pub use assertion::{
    AssertionError,
    AssertionSource,
    TokenExchange,
    DEFAULT_EXCHANGE_AUDIENCE,
};

pub use auth::{
    AuthProvider,
    AZDO_APP_DEFAULT_SCOPE,
};

pub use chain::ChainedCredential;

pub use config::{
    ConfigError,
    ProviderConfig,
    normalize_org_url,
};

pub use credential::{
    AccessToken,
    AzureCliCredential,
    ClientAssertionCredential,
    ClientCertificateCredential,
    ClientSecretCredential,
    CredentialError,
    ManagedIdentityCredential,
    TokenCredential,
};

pub use error::{
    CoreError,
    ErrorKind,
};

pub use memo::{
    MemoError,
    MemoOutcome,
    compare_and_update,
    is_valid_memo,
    make_memo,
    memo_attribute_description,
    memo_attribute_name,
};

pub use resolve::{
    resolve_auth_provider,
    resolve_credential_chain,
};

pub use secret::Secret;
