//! Resource callbacks under deadlines.
//!
//! This module provides:
//! - [`Resource`] - The async CRUD trait resources implement
//! - [`ResourceTimeouts`] / [`TimeoutOverrides`] - Per-callback
//!   defaults and per-instance overrides
//! - [`OperationContext`] - Cancellation token plus effective deadline,
//!   handed to every callback
//! - [`TimedResource`] - The wrapper enforcing deadlines, classifying
//!   expiry as `Timeout`, and injecting the timeout schema fields
//!
//! A read that reports `NotFound` is mapped to [`ReadOutcome::Absent`]:
//! a vanished remote entity removes state, it does not fail a refresh.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use azdo_provider_core::ErrorKind;

use crate::error::RuntimeError;

/// Fallback for callbacks whose resource declares no default.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Per-callback timeout defaults, declared by the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTimeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_CALLBACK_TIMEOUT,
            read: DEFAULT_CALLBACK_TIMEOUT,
            update: DEFAULT_CALLBACK_TIMEOUT,
            delete: DEFAULT_CALLBACK_TIMEOUT,
        }
    }
}

/// Per-instance timeout overrides; unset fields fall back to the
/// resource's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutOverrides {
    pub create: Option<Duration>,
    pub read: Option<Duration>,
    pub update: Option<Duration>,
    pub delete: Option<Duration>,
}

impl TimeoutOverrides {
    /// Resolve against defaults: `override ?? default`, per callback.
    pub fn effective(&self, defaults: &ResourceTimeouts) -> ResourceTimeouts {
        ResourceTimeouts {
            create: self.create.unwrap_or(defaults.create),
            read: self.read.unwrap_or(defaults.read),
            update: self.update.unwrap_or(defaults.update),
            delete: self.delete.unwrap_or(defaults.delete),
        }
    }
}

/// Context handed to every resource callback.
///
/// The token observes both the per-callback deadline and any outer
/// host cancellation; callbacks pass it down to every transport call.
#[derive(Debug, Clone)]
pub struct OperationContext {
    cancel: CancellationToken,
    deadline: Duration,
}

impl OperationContext {
    pub fn new(cancel: CancellationToken, deadline: Duration) -> Self {
        Self { cancel, deadline }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// What a read observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The remote entity exists; state was refreshed.
    Present,
    /// The remote entity is gone; state must be removed.
    Absent,
}

/// Optional import support.
#[async_trait]
pub trait Importer: Send + Sync {
    async fn import(&self, id: &str, ctx: &OperationContext) -> Result<(), RuntimeError>;
}

/// Optional pre-apply validation.
pub trait Validator: Send + Sync {
    fn validate(&self) -> Result<(), RuntimeError>;
}

/// An Azure DevOps resource with deadline-aware CRUD callbacks.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The declared resource type name, e.g. `azuredevops_project`.
    fn type_name(&self) -> &str;

    /// Per-callback defaults; the wrapper falls back to 5 minutes each.
    fn default_timeouts(&self) -> ResourceTimeouts {
        ResourceTimeouts::default()
    }

    async fn create(&self, ctx: &OperationContext) -> Result<(), RuntimeError>;
    async fn read(&self, ctx: &OperationContext) -> Result<ReadOutcome, RuntimeError>;
    async fn update(&self, ctx: &OperationContext) -> Result<(), RuntimeError>;
    async fn delete(&self, ctx: &OperationContext) -> Result<(), RuntimeError>;

    /// Import support, when the resource opts in.
    fn importer(&self) -> Option<&dyn Importer> {
        None
    }

    /// Pre-apply validation, when the resource opts in.
    fn validator(&self) -> Option<&dyn Validator> {
        None
    }
}

/// One attribute contributed to a declared schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaAttribute {
    pub name: &'static str,
    pub description: String,
    pub optional: bool,
}

/// Deadline-enforcing wrapper around a [`Resource`].
pub struct TimedResource {
    inner: Arc<dyn Resource>,
    overrides: TimeoutOverrides,
}

impl TimedResource {
    /// Wrap a resource with per-instance overrides.
    ///
    /// An empty type name means the resource was registered without its
    /// metadata; that is a programming error, not a runtime condition.
    pub fn new(inner: Arc<dyn Resource>, overrides: TimeoutOverrides) -> Self {
        debug_assert!(
            !inner.type_name().trim().is_empty(),
            "resource registered without a type name"
        );
        Self { inner, overrides }
    }

    /// The wrapped resource's type name.
    pub fn type_name(&self) -> &str {
        self.inner.type_name()
    }

    fn effective(&self) -> ResourceTimeouts {
        self.overrides.effective(&self.inner.default_timeouts())
    }

    /// The four optional timeout attributes for the declared schema.
    pub fn timeout_schema(&self) -> Vec<SchemaAttribute> {
        let defaults = self.inner.default_timeouts();
        let entry = |name, default, verb| SchemaAttribute {
            name,
            description: format!(
                "(Defaults to {}) Used when {} this resource.",
                humanize(default),
                verb
            ),
            optional: true,
        };
        vec![
            entry("timeout_create", defaults.create, "creating"),
            entry("timeout_read", defaults.read, "reading"),
            entry("timeout_update", defaults.update, "updating"),
            entry("timeout_delete", defaults.delete, "deleting"),
        ]
    }

    pub async fn create(&self, cancel: &CancellationToken) -> Result<(), RuntimeError> {
        let after = self.effective().create;
        let ctx = OperationContext::new(cancel.child_token(), after);
        match tokio::time::timeout(after, self.inner.create(&ctx)).await {
            Ok(result) => result,
            Err(_) => Err(self.expired(&ctx, "create", after)),
        }
    }

    pub async fn read(&self, cancel: &CancellationToken) -> Result<ReadOutcome, RuntimeError> {
        let after = self.effective().read;
        let ctx = OperationContext::new(cancel.child_token(), after);
        match tokio::time::timeout(after, self.inner.read(&ctx)).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                debug!(resource = self.type_name(), "Remote entity gone, removing state");
                Ok(ReadOutcome::Absent)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(self.expired(&ctx, "read", after)),
        }
    }

    pub async fn update(&self, cancel: &CancellationToken) -> Result<(), RuntimeError> {
        let after = self.effective().update;
        let ctx = OperationContext::new(cancel.child_token(), after);
        match tokio::time::timeout(after, self.inner.update(&ctx)).await {
            Ok(result) => result,
            Err(_) => Err(self.expired(&ctx, "update", after)),
        }
    }

    pub async fn delete(&self, cancel: &CancellationToken) -> Result<(), RuntimeError> {
        let after = self.effective().delete;
        let ctx = OperationContext::new(cancel.child_token(), after);
        match tokio::time::timeout(after, self.inner.delete(&ctx)).await {
            Ok(result) => result,
            Err(_) => Err(self.expired(&ctx, "delete", after)),
        }
    }

    /// Import under the read deadline; a no-op for resources without
    /// import support.
    pub async fn import(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let Some(importer) = self.inner.importer() else {
            return Ok(());
        };
        let after = self.effective().read;
        let ctx = OperationContext::new(cancel.child_token(), after);
        match tokio::time::timeout(after, importer.import(id, &ctx)).await {
            Ok(result) => result,
            Err(_) => Err(self.expired(&ctx, "import", after)),
        }
    }

    /// Validate when the resource opts in; a no-op otherwise.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        match self.inner.validator() {
            Some(validator) => validator.validate(),
            None => Ok(()),
        }
    }

    fn expired(&self, ctx: &OperationContext, verb: &str, after: Duration) -> RuntimeError {
        // Make sure anything the dropped future spawned stops too.
        ctx.cancel_token().cancel();
        warn!(resource = self.type_name(), verb, ?after, "Callback deadline expired");
        RuntimeError::Timeout {
            operation: format!("{} {}", verb, self.type_name()),
            after,
        }
    }
}

/// Render a duration the way the schema descriptions expect: `5m`,
/// `2h`, `90s`.
fn humanize(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
