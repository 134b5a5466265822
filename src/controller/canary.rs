//! Canary reconcile loop
//!
//! Thin glue between the kube runtime controller and the router: each
//! reconcile pass keeps the HTTPProxy shape in sync and stamps the initial
//! status. Weight progression belongs to the rollout loop, not here.

use crate::crd::canary::{Canary, CanaryPhase, CanaryStatus};
use crate::router::{ContourRouter, KubeProxyStore, ProxyStore, RouterError};
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Requeue interval after a successful reconcile
const DEFAULT_REQUEUE_SECONDS: u64 = 60;

/// Requeue delay after a retryable error (conflict with a concurrent writer)
const RETRYABLE_REQUEUE_SECONDS: u64 = 5;

/// Requeue delay after other errors
const ERROR_REQUEUE_SECONDS: u64 = 30;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Canary missing namespace")]
    MissingNamespace,

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),
}

pub struct Context {
    pub client: kube::Client,
    pub store: Arc<dyn ProxyStore>,
    pub requeue_interval: Duration,
}

impl Context {
    /// Create a Context backed by the cluster's HTTPProxy API
    pub fn new(client: kube::Client) -> Self {
        let store: Arc<dyn ProxyStore> = Arc::new(KubeProxyStore::new(client.clone()));
        Context {
            client,
            store,
            requeue_interval: Duration::from_secs(DEFAULT_REQUEUE_SECONDS),
        }
    }

    pub fn with_requeue_interval(mut self, interval: Duration) -> Self {
        self.requeue_interval = interval;
        self
    }
}

/// Reconcile a Canary resource
///
/// Keeps the target's HTTPProxy in sync with the Canary description and
/// marks the resource Initialized once the proxy exists. Safe to call
/// repeatedly: the router only writes when the non-weight shape drifted.
pub async fn reconcile(canary: Arc<Canary>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let namespace = canary.namespace().ok_or(ReconcileError::MissingNamespace)?;
    let name = canary.name_any();

    info!(canary = ?name, namespace = ?namespace, "Reconciling Canary");

    let router = ContourRouter::new(ctx.store.clone());
    router.reconcile(&canary).await?;

    // Stamp the initial status once the proxy is in place. Later phases
    // belong to the rollout loop.
    if canary.status.is_none() {
        let status = CanaryStatus {
            phase: Some(CanaryPhase::Initialized),
            canary_weight: Some(0),
            message: Some("HTTPProxy reconciled".to_string()),
        };

        let canary_api: Api<Canary> = Api::namespaced(ctx.client.clone(), &namespace);
        canary_api
            .patch_status(
                &name,
                &PatchParams::default(),
                &Patch::Merge(&serde_json::json!({ "status": status })),
            )
            .await?;

        info!(canary = ?name, "Canary marked Initialized");
    }

    Ok(Action::requeue(ctx.requeue_interval))
}

/// Error policy for the controller
///
/// Retryable router errors (update conflicts) requeue quickly; everything
/// else backs off longer. Uses `warn!` since reconciliation errors are
/// expected and trigger retries.
pub fn error_policy(_canary: Arc<Canary>, error: &ReconcileError, _ctx: Arc<Context>) -> Action {
    warn!("Reconcile error (will retry): {:?}", error);
    Action::requeue(requeue_delay(error))
}

/// Requeue delay for a failed reconcile
pub fn requeue_delay(error: &ReconcileError) -> Duration {
    match error {
        ReconcileError::Router(router_error) if router_error.is_retryable() => {
            Duration::from_secs(RETRYABLE_REQUEUE_SECONDS)
        }
        _ => Duration::from_secs(ERROR_REQUEUE_SECONDS),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "canary_test.rs"]
mod tests;
