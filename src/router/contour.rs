//! ContourRouter: create/diff/update protocol and the weight accessor pair
//!
//! Reconcile keeps the HTTPProxy shape in sync with the Canary without
//! touching weights; GetRoutes/SetRoutes are the accessor pair the rollout
//! loop drives. Every operation is at most one read and one write against
//! the store; conflicts from concurrent writers surface as retryable errors
//! and are never retried here.

use crate::crd::canary::Canary;
use crate::crd::httpproxy::{HTTPProxy, HTTPProxyStatus};
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::spec::{compose_spec, specs_match_ignoring_weights, INITIAL_CANARY_WEIGHT, INITIAL_PRIMARY_WEIGHT};
use super::store::{ProxyStore, StoreError};

/// Errors returned by the router; every variant carries the proxy identity
/// so the caller can log and act without further context
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("HTTPProxy {name}.{namespace} not found")]
    NotFound { name: String, namespace: String },

    #[error("HTTPProxy {name}.{namespace} query error: {source}")]
    Query {
        name: String,
        namespace: String,
        source: StoreError,
    },

    #[error("HTTPProxy {name}.{namespace} create error: {source}")]
    Create {
        name: String,
        namespace: String,
        source: StoreError,
    },

    #[error("HTTPProxy {name}.{namespace} update error: {source}")]
    Update {
        name: String,
        namespace: String,
        source: StoreError,
    },

    #[error("HTTPProxy {name}.{namespace} update conflict")]
    Conflict { name: String, namespace: String },

    #[error("HTTPProxy {name}.{namespace} update failed: no valid weights")]
    NoValidWeights { name: String, namespace: String },

    #[error("HTTPProxy {name}.{namespace} services not found")]
    ServicesNotFound { name: String, namespace: String },

    #[error("Canary missing namespace")]
    MissingNamespace,
}

impl RouterError {
    /// Whether the caller should retry the operation
    ///
    /// Conflicts mean a concurrent writer won the versioned update; the
    /// next reconcile or rollout tick re-reads and tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RouterError::Conflict { .. })
    }
}

/// ContourRouter manages HTTPProxy objects for Canary resources
pub struct ContourRouter {
    store: Arc<dyn ProxyStore>,
}

impl ContourRouter {
    pub fn new(store: Arc<dyn ProxyStore>) -> Self {
        ContourRouter { store }
    }

    /// Create the HTTPProxy, or update it when its non-weight shape drifted
    ///
    /// The desired spec is composed at the initial 100/0 split, but a stored
    /// proxy whose shape already matches is left completely untouched, so
    /// repeated reconciles never disturb an in-flight weight shift. A shape
    /// change does overwrite weights back to 100/0: a changed configuration
    /// means the canary is not mid-rollout under this shape.
    pub async fn reconcile(&self, canary: &Canary) -> Result<(), RouterError> {
        let namespace = canary.namespace().ok_or(RouterError::MissingNamespace)?;
        let target = canary.target_name().to_string();
        let desired = compose_spec(canary, INITIAL_PRIMARY_WEIGHT, INITIAL_CANARY_WEIGHT);

        match self.store.get(&namespace, &target).await {
            Err(StoreError::NotFound) => {
                let proxy = HTTPProxy {
                    metadata: ObjectMeta {
                        name: Some(target.clone()),
                        namespace: Some(namespace.clone()),
                        owner_references: canary.controller_owner_ref(&()).map(|r| vec![r]),
                        ..Default::default()
                    },
                    spec: desired,
                    status: Some(HTTPProxyStatus::valid()),
                };
                self.store
                    .create(&namespace, &proxy)
                    .await
                    .map_err(|source| RouterError::Create {
                        name: target.clone(),
                        namespace: namespace.clone(),
                        source,
                    })?;
                info!(
                    canary = %format!("{}.{}", canary.name_any(), namespace),
                    proxy = %target,
                    "HTTPProxy created"
                );
                Ok(())
            }
            Err(source) => Err(RouterError::Query {
                name: target,
                namespace,
                source,
            }),
            Ok(current) => {
                if specs_match_ignoring_weights(&desired, &current.spec) {
                    return Ok(());
                }
                let mut updated = current.clone();
                updated.spec = desired;
                self.store
                    .update(&namespace, &updated)
                    .await
                    .map_err(|source| match source {
                        StoreError::Conflict => RouterError::Conflict {
                            name: target.clone(),
                            namespace: namespace.clone(),
                        },
                        source => RouterError::Update {
                            name: target.clone(),
                            namespace: namespace.clone(),
                            source,
                        },
                    })?;
                info!(
                    canary = %format!("{}.{}", canary.name_any(), namespace),
                    proxy = %target,
                    "HTTPProxy updated"
                );
                Ok(())
            }
        }
    }

    /// Read the current primary/canary weight split
    ///
    /// The canary weight is derived as the complement of the primary weight;
    /// the two entries are complementary by construction. The mirrored flag
    /// exists for interface symmetry with set_routes and is always false:
    /// traffic mirroring is not implemented by this router.
    pub async fn get_routes(&self, canary: &Canary) -> Result<(u32, u32, bool), RouterError> {
        let namespace = canary.namespace().ok_or(RouterError::MissingNamespace)?;
        let target = canary.target_name().to_string();
        let primary_name = canary.primary_service_name();

        let proxy = match self.store.get(&namespace, &target).await {
            Ok(proxy) => proxy,
            Err(StoreError::NotFound) => {
                return Err(RouterError::NotFound {
                    name: target,
                    namespace,
                })
            }
            Err(source) => {
                return Err(RouterError::Query {
                    name: target,
                    namespace,
                    source,
                })
            }
        };

        // A proxy with no routes or a single-service first route was never
        // shaped by this router (e.g. hand-edited).
        let first_route = proxy
            .spec
            .routes
            .first()
            .filter(|route| route.services.len() >= 2)
            .ok_or(RouterError::ServicesNotFound {
                name: target,
                namespace,
            })?;

        for service in &first_route.services {
            if service.name == primary_name {
                let primary_weight = service.weight;
                let canary_weight = 100u32.saturating_sub(primary_weight);
                return Ok((primary_weight, canary_weight, false));
            }
        }

        // No primary-named entry: report a zero split rather than failing.
        Ok((0, 0, false))
    }

    /// Write a new weight split, re-deriving the rest of the spec
    ///
    /// No diffing here: the whole point of this call is to change weights,
    /// so a write is always warranted. The mirrored flag is accepted but not
    /// persisted.
    pub async fn set_routes(
        &self,
        canary: &Canary,
        primary_weight: u32,
        canary_weight: u32,
        _mirrored: bool,
    ) -> Result<(), RouterError> {
        let namespace = canary.namespace().ok_or(RouterError::MissingNamespace)?;
        let target = canary.target_name().to_string();

        if primary_weight == 0 && canary_weight == 0 {
            return Err(RouterError::NoValidWeights {
                name: target,
                namespace,
            });
        }

        let proxy = match self.store.get(&namespace, &target).await {
            Ok(proxy) => proxy,
            Err(StoreError::NotFound) => {
                return Err(RouterError::NotFound {
                    name: target,
                    namespace,
                })
            }
            Err(source) => {
                return Err(RouterError::Query {
                    name: target,
                    namespace,
                    source,
                })
            }
        };

        let mut updated = proxy.clone();
        updated.spec = compose_spec(canary, primary_weight, canary_weight);

        self.store
            .update(&namespace, &updated)
            .await
            .map_err(|source| match source {
                StoreError::Conflict => RouterError::Conflict {
                    name: target.clone(),
                    namespace: namespace.clone(),
                },
                source => RouterError::Update {
                    name: target.clone(),
                    namespace: namespace.clone(),
                    source,
                },
            })?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "contour_test.rs"]
mod tests;
