//! Repository: one store plus its federation resolver
//!
//! A `Repository` owns the [`Store`] and hands out [`Connection`]s that
//! borrow it. Connections register their id in a set kept here so shutdown
//! can report what is still open; the repository never owns a connection.

use crate::connection::Connection;
use crate::error::{ApiError, Result};
use crate::local_service::LocalStoreService;
use parking_lot::{Mutex, RwLock};
use quadstore_core::{ChangeValidator, Store, StoreConfig};
use quadstore_query::{FederatedServiceResolver, QueryOptions};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub struct Repository {
    store: Store,
    resolver: Arc<FederatedServiceResolver>,
    query_options: RwLock<QueryOptions>,
    connections: Mutex<BTreeSet<u64>>,
    next_connection: AtomicU64,
    shut_down: AtomicBool,
}

impl Repository {
    /// Open (or create) the store described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Store::open(config)?;
        Ok(Self {
            store,
            resolver: Arc::new(FederatedServiceResolver::new()),
            query_options: RwLock::new(QueryOptions::default()),
            connections: Mutex::new(BTreeSet::new()),
            next_connection: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Resolver used by SERVICE operators of this repository's evaluations
    pub fn resolver(&self) -> &Arc<FederatedServiceResolver> {
        &self.resolver
    }

    pub fn query_options(&self) -> QueryOptions {
        self.query_options.read().clone()
    }

    pub fn set_query_options(&self, options: QueryOptions) {
        *self.query_options.write() = options;
    }

    /// Install or remove the commit validation hook
    pub fn set_validator(&self, validator: Option<Arc<dyn ChangeValidator>>) {
        self.store.set_validator(validator);
    }

    /// Serve `other`'s latest committed state as SERVICE `endpoint`.
    ///
    /// `other` is held weakly and may be this repository itself; once it is
    /// dropped the endpoint fails like an unreachable remote.
    pub fn register_local_service(&self, endpoint: impl Into<String>, other: &Arc<Repository>) {
        let endpoint = endpoint.into();
        let service = LocalStoreService::new(endpoint.clone(), other);
        self.resolver.register_service(endpoint, Arc::new(service));
    }

    pub fn connection(&self) -> Result<Connection<'_>> {
        if self.is_shut_down() {
            return Err(ApiError::RepositoryClosed);
        }
        let id = self.next_connection.fetch_add(1, Ordering::SeqCst);
        self.connections.lock().insert(id);
        tracing::debug!(connection = id, "connection opened");
        Ok(Connection::new(self, id))
    }

    /// Ids of connections not yet closed
    pub fn open_connections(&self) -> Vec<u64> {
        self.connections.lock().iter().copied().collect()
    }

    pub(crate) fn release(&self, id: u64) {
        self.connections.lock().remove(&id);
        tracing::debug!(connection = id, "connection closed");
    }

    /// Shut down federation handles and close the store. Idempotent.
    ///
    /// Connections still open afterwards fail on their next store access.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let open = self.open_connections();
        if !open.is_empty() {
            tracing::warn!(connections = ?open, "repository shut down with open connections");
        }
        self.resolver.shutdown();
        self.store.close()?;
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
