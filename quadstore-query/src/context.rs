//! Execution context for query operators
//!
//! The `ExecutionContext` provides access to the read view, the federation
//! resolver and configuration needed by operators during execution. It is
//! cheap to clone (every field is shared).

use crate::error::{QueryError, Result};
use crate::federation::FederatedServiceResolver;
use crate::options::QueryOptions;
use quadstore_core::StatementSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Execution context shared by every operator of one evaluation
///
/// # Lifetime Bounds
///
/// `'a` is the lifetime of the read view (a snapshot or a write transaction
/// borrowed from its store).
#[derive(Clone)]
pub struct ExecutionContext<'a> {
    source: Arc<dyn StatementSource + 'a>,
    resolver: Option<Arc<FederatedServiceResolver>>,
    options: QueryOptions,
    cancelled: Arc<AtomicBool>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(source: Arc<dyn StatementSource + 'a>) -> Self {
        Self {
            source,
            resolver: None,
            options: QueryOptions::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<FederatedServiceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &Arc<dyn StatementSource + 'a> {
        &self.source
    }

    pub fn resolver(&self) -> Option<&Arc<FederatedServiceResolver>> {
        self.resolver.as_ref()
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Keys per scan chunk
    pub fn scan_batch_size(&self) -> usize {
        self.options
            .scan_batch_size
            .unwrap_or_else(|| self.source.scan_batch_size())
    }

    /// Request cancellation; operators stop at their next pull.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        Ok(())
    }

    /// Handle that cancels this evaluation from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancelled.clone())
    }
}

/// Cancels an evaluation; cheap to clone and `Send`
#[derive(Clone, Debug)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
