//! # Azure DevOps Provider Runtime
//!
//! Reconciliation-side plumbing for the Azure DevOps provider.
//!
//! This crate provides:
//! - An authenticated REST client bound to one organization
//! - The long-running operation waiter with its polling seam
//! - The resource-timeout wrapper enforcing per-callback deadlines
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use azdo_provider_core::{ProviderConfig, resolve_auth_provider};
//! use azdo_provider_runtime::RestClient;
//!
//! fn build_client(config: &ProviderConfig) -> Result<RestClient, Box<dyn std::error::Error>> {
//!     let http = reqwest::Client::new();
//!     let auth = Arc::new(resolve_auth_provider(config, &http)?);
//!     Ok(RestClient::new(http, &config.org_url()?, auth))
//! }
//! ```

pub mod client;
pub mod error;
pub mod operations;
pub mod resource;

// Re-export commonly used types at crate root
pub use client::RestClient;

pub use error::RuntimeError;

pub use operations::{
    OperationReference,
    OperationResult,
    OperationStatus,
    OperationsApi,
    OperationsClient,
    wait_for_operation,
};

pub use resource::{
    DEFAULT_CALLBACK_TIMEOUT,
    Importer,
    OperationContext,
    ReadOutcome,
    Resource,
    ResourceTimeouts,
    SchemaAttribute,
    TimedResource,
    TimeoutOverrides,
    Validator,
};
