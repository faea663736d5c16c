//! Federation member backed by another repository
//!
//! Evaluates the delegated subtree against the repository's latest
//! committed snapshot. Results are collected before returning so the
//! snapshot is released immediately.
//!
//! The service holds the repository weakly: a repository that serves itself
//! through its own resolver is not kept alive by it.

use crate::repository::Repository;
use quadstore_query::{
    execute_seeded, Algebra, ExecutionContext, FederatedService, QueryError, Result,
    ServiceResults, Solution,
};
use std::sync::{Arc, Weak};

pub struct LocalStoreService {
    endpoint: String,
    repository: Weak<Repository>,
}

impl LocalStoreService {
    pub fn new(endpoint: impl Into<String>, repository: &Arc<Repository>) -> Self {
        Self {
            endpoint: endpoint.into(),
            repository: Arc::downgrade(repository),
        }
    }

    fn repository(&self) -> Result<Arc<Repository>> {
        match self.repository.upgrade() {
            Some(repository) if !repository.is_shut_down() => Ok(repository),
            Some(_) => Err(self.failure("repository is shut down")),
            None => Err(self.failure("repository dropped")),
        }
    }

    fn failure(&self, err: impl std::fmt::Display) -> QueryError {
        QueryError::resolver(&self.endpoint, err.to_string())
    }
}

impl FederatedService for LocalStoreService {
    fn initialize(&self) -> Result<()> {
        self.repository().map(|_| ())
    }

    fn evaluate(&self, algebra: &Algebra, bindings: &Solution) -> Result<ServiceResults> {
        let repository = self.repository()?;
        let read = repository
            .store()
            .begin_read()
            .map_err(|e| self.failure(e))?;
        let ctx = ExecutionContext::new(Arc::new(read))
            .with_resolver(repository.resolver().clone())
            .with_options(repository.query_options());
        let rows = execute_seeded(algebra, bindings.clone(), ctx)
            .and_then(|results| results.collect::<Result<Vec<_>>>())
            .map_err(|e| self.failure(e))?;
        tracing::trace!(endpoint = %self.endpoint, rows = rows.len(), "local service evaluated");
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}
