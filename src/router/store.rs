//! Store abstraction for HTTPProxy resources
//!
//! The router never talks to the cluster directly; it goes through the
//! ProxyStore trait so the reconciliation logic can be exercised against an
//! in-memory spy in tests. KubeProxyStore is the production implementation
//! over the Kubernetes API, which also supplies the optimistic-concurrency
//! semantics (a replace fails with a conflict when the stored resource
//! changed since it was fetched).

use crate::crd::httpproxy::HTTPProxy;
use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// Errors surfaced by a ProxyStore
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource not found")]
    NotFound,

    #[error("resource changed since it was fetched")]
    Conflict,

    #[error("api error: {0}")]
    Api(String),
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref response) if response.code == 404 => StoreError::NotFound,
            kube::Error::Api(ref response) if response.code == 409 => StoreError::Conflict,
            other => StoreError::Api(other.to_string()),
        }
    }
}

/// Key-value store of HTTPProxy resources addressed by namespace + name
#[async_trait]
pub trait ProxyStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<HTTPProxy, StoreError>;

    async fn create(&self, namespace: &str, proxy: &HTTPProxy) -> Result<HTTPProxy, StoreError>;

    /// Versioned replace; concurrent modification surfaces as Conflict
    async fn update(&self, namespace: &str, proxy: &HTTPProxy) -> Result<HTTPProxy, StoreError>;
}

/// Production store backed by the Kubernetes API
pub struct KubeProxyStore {
    client: kube::Client,
}

impl KubeProxyStore {
    pub fn new(client: kube::Client) -> Self {
        KubeProxyStore { client }
    }

    fn api(&self, namespace: &str) -> Api<HTTPProxy> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ProxyStore for KubeProxyStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<HTTPProxy, StoreError> {
        Ok(self.api(namespace).get(name).await?)
    }

    async fn create(&self, namespace: &str, proxy: &HTTPProxy) -> Result<HTTPProxy, StoreError> {
        Ok(self
            .api(namespace)
            .create(&PostParams::default(), proxy)
            .await?)
    }

    async fn update(&self, namespace: &str, proxy: &HTTPProxy) -> Result<HTTPProxy, StoreError> {
        Ok(self
            .api(namespace)
            .replace(&proxy.name_any(), &PostParams::default(), proxy)
            .await?)
    }
}

/// In-memory spy store for tests
///
/// Records every call so tests can assert on write counts (e.g. that a
/// repeated reconcile performs no second write, or that a rejected
/// SetRoutes never reaches the store). Failure injection covers the read
/// and conflict paths.
#[derive(Default)]
pub struct MemoryProxyStore {
    objects: Mutex<BTreeMap<(String, String), HTTPProxy>>,
    get_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    fail_reads: AtomicBool,
    conflict_on_update: AtomicBool,
}

impl MemoryProxyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.get_calls() + self.create_calls() + self.update_calls()
    }

    /// Make every subsequent get fail with an Api error
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent update fail with Conflict
    pub fn conflict_on_update(&self) {
        self.conflict_on_update.store(true, Ordering::SeqCst);
    }

    /// Fetch a stored object without going through the counted get path
    pub fn stored(&self, namespace: &str, name: &str) -> Option<HTTPProxy> {
        self.objects
            .lock()
            .expect("store lock poisoned")
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Mutate a stored object in place, bypassing the counted update path
    ///
    /// Stands in for an out-of-band writer such as the rollout loop
    /// shifting weights between reconciles.
    pub fn mutate<F>(&self, namespace: &str, name: &str, f: F)
    where
        F: FnOnce(&mut HTTPProxy),
    {
        let mut objects = self.objects.lock().expect("store lock poisoned");
        if let Some(proxy) = objects.get_mut(&(namespace.to_string(), name.to_string())) {
            f(proxy);
        }
    }
}

#[async_trait]
impl ProxyStore for MemoryProxyStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<HTTPProxy, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Api("injected read failure".to_string()));
        }
        self.objects
            .lock()
            .expect("store lock poisoned")
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, namespace: &str, proxy: &HTTPProxy) -> Result<HTTPProxy, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let key = (namespace.to_string(), proxy.name_any());
        let mut objects = self.objects.lock().expect("store lock poisoned");
        if objects.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        objects.insert(key, proxy.clone());
        Ok(proxy.clone())
    }

    async fn update(&self, namespace: &str, proxy: &HTTPProxy) -> Result<HTTPProxy, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.conflict_on_update.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict);
        }
        let key = (namespace.to_string(), proxy.name_any());
        let mut objects = self.objects.lock().expect("store lock poisoned");
        if !objects.contains_key(&key) {
            return Err(StoreError::NotFound);
        }
        objects.insert(key, proxy.clone());
        Ok(proxy.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Tests can use unwrap/expect for brevity
#[path = "store_test.rs"]
mod tests;
