//! Federation resolver
//!
//! Maps SERVICE endpoint ids to [`FederatedService`] handles. Handles are
//! created on first use by the factory registered for the endpoint (or the
//! default factory), initialized once, and cached until [`shutdown`].
//!
//! [`shutdown`]: FederatedServiceResolver::shutdown

use crate::algebra::Algebra;
use crate::binding::Solution;
use crate::error::{QueryError, Result};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Lazily produced results of a delegated evaluation
pub type ServiceResults = Box<dyn Iterator<Item = Result<Solution>> + Send>;

/// A federation member: a local store, a remote endpoint or a custom handler
pub trait FederatedService: Send + Sync {
    /// Called once, before the first evaluation
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Evaluate `algebra` with `bindings` as the inherited solution.
    fn evaluate(&self, algebra: &Algebra, bindings: &Solution) -> Result<ServiceResults>;

    /// Release the handle's resources
    fn shutdown(&self) {}
}

/// Creates the service handle for an endpoint id
pub trait ServiceFactory: Send + Sync {
    fn create(&self, endpoint: &str) -> Result<Arc<dyn FederatedService>>;
}

impl<F> ServiceFactory for F
where
    F: Fn(&str) -> Result<Arc<dyn FederatedService>> + Send + Sync,
{
    fn create(&self, endpoint: &str) -> Result<Arc<dyn FederatedService>> {
        self(endpoint)
    }
}

/// Cache cell for one endpoint; its lock is held while the handle is created
type Slot = Arc<Mutex<Option<Arc<dyn FederatedService>>>>;

#[derive(Default)]
struct ResolverState {
    slots: FxHashMap<String, Slot>,
    shut_down: bool,
}

/// Registry and cache of federation members
///
/// The resolver-wide lock is only held to look up an endpoint's slot. A
/// handle is created and initialized under its own slot's lock, so a slow
/// endpoint blocks only callers of that endpoint, and a factory may resolve
/// other endpoints on the same resolver.
#[derive(Default)]
pub struct FederatedServiceResolver {
    factories: RwLock<FxHashMap<String, Arc<dyn ServiceFactory>>>,
    default_factory: RwLock<Option<Arc<dyn ServiceFactory>>>,
    state: Mutex<ResolverState>,
}

impl fmt::Debug for FederatedServiceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FederatedServiceResolver")
            .field("endpoints", &self.factories.read().keys().collect::<Vec<_>>())
            .field("slots", &state.slots.len())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}

impl FederatedServiceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for one endpoint id, replacing any previous one.
    ///
    /// A handle already cached for the endpoint stays in use.
    pub fn register(&self, endpoint: impl Into<String>, factory: impl ServiceFactory + 'static) {
        let endpoint = endpoint.into();
        tracing::debug!(endpoint = %endpoint, "service factory registered");
        self.factories.write().insert(endpoint, Arc::new(factory));
    }

    /// Factory for endpoints without a specific registration
    pub fn register_default(&self, factory: impl ServiceFactory + 'static) {
        *self.default_factory.write() = Some(Arc::new(factory));
    }

    /// Register an existing handle for `endpoint`
    pub fn register_service(&self, endpoint: impl Into<String>, service: Arc<dyn FederatedService>) {
        self.register(
            endpoint,
            move |_: &str| -> Result<Arc<dyn FederatedService>> { Ok(service.clone()) },
        );
    }

    fn slot(&self, endpoint: &str) -> Result<Slot> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(QueryError::resolver(endpoint, "resolver is shut down"));
        }
        Ok(state.slots.entry(endpoint.to_string()).or_default().clone())
    }

    /// Handle for `endpoint`; created and initialized on first call, then cached.
    ///
    /// Concurrent first calls for the same endpoint wait for one creation.
    /// A failed creation caches nothing, so the next call retries.
    pub fn resolve(&self, endpoint: &str) -> Result<Arc<dyn FederatedService>> {
        let slot = self.slot(endpoint)?;
        let mut cell = slot.lock();
        if let Some(handle) = cell.as_ref() {
            return Ok(handle.clone());
        }

        let factory = self
            .factories
            .read()
            .get(endpoint)
            .cloned()
            .or_else(|| self.default_factory.read().clone())
            .ok_or_else(|| QueryError::resolver(endpoint, "no service registered"))?;
        let handle = factory.create(endpoint)?;
        handle.initialize()?;

        // shutdown may have drained the slots while the handle was built
        if self.is_shut_down() {
            handle.shutdown();
            return Err(QueryError::resolver(endpoint, "resolver is shut down"));
        }
        tracing::debug!(endpoint, "service handle created");
        *cell = Some(handle.clone());
        Ok(handle)
    }

    /// Number of cached handles
    pub fn cached(&self) -> usize {
        let slots: Vec<Slot> = self.state.lock().slots.values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    /// Close every cached handle. Later `resolve` calls fail. Idempotent.
    pub fn shutdown(&self) {
        let slots = {
            let mut state = self.state.lock();
            state.shut_down = true;
            std::mem::take(&mut state.slots)
        };
        for (endpoint, slot) in slots {
            if let Some(handle) = slot.lock().take() {
                tracing::debug!(endpoint = %endpoint, "service handle shut down");
                handle.shutdown();
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        initialized: AtomicUsize,
        closed: AtomicUsize,
    }

    impl FederatedService for Counting {
        fn initialize(&self) -> Result<()> {
            self.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn evaluate(&self, _algebra: &Algebra, bindings: &Solution) -> Result<ServiceResults> {
            Ok(Box::new(std::iter::once(Ok(bindings.clone()))))
        }

        fn shutdown(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_resolve_is_cached_and_initialized_once() {
        let service = Arc::new(Counting::default());
        let resolver = FederatedServiceResolver::new();
        resolver.register_service("ex:a", service.clone());

        let first = resolver.resolve("ex:a").unwrap();
        let second = resolver.resolve("ex:a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(service.initialized.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn test_unknown_endpoint_fails() {
        let resolver = FederatedServiceResolver::new();
        let err = resolver.resolve("ex:missing").err().unwrap();
        assert!(matches!(err, QueryError::Resolver { .. }));
    }

    #[test]
    fn test_default_factory() {
        let resolver = FederatedServiceResolver::new();
        resolver.register_default(|_: &str| -> Result<Arc<dyn FederatedService>> {
            Ok(Arc::new(Counting::default()))
        });
        assert!(resolver.resolve("ex:anything").is_ok());
        assert!(resolver.resolve("ex:other").is_ok());
        assert_eq!(resolver.cached(), 2);
    }

    #[test]
    fn test_factory_may_resolve_other_endpoints() {
        let service = Arc::new(Counting::default());
        let resolver = Arc::new(FederatedServiceResolver::new());
        resolver.register_service("ex:a", service.clone());
        let weak = Arc::downgrade(&resolver);
        resolver.register(
            "ex:alias",
            move |_: &str| -> Result<Arc<dyn FederatedService>> {
                let resolver = weak
                    .upgrade()
                    .ok_or_else(|| QueryError::resolver("ex:alias", "resolver dropped"))?;
                resolver.resolve("ex:a")
            },
        );

        let alias = resolver.resolve("ex:alias").unwrap();
        let direct = resolver.resolve("ex:a").unwrap();
        assert!(Arc::ptr_eq(&alias, &direct));
        // each cache entry initializes its handle once
        assert_eq!(service.initialized.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached(), 2);
    }

    #[test]
    fn test_slow_endpoint_does_not_block_others() {
        use std::sync::Barrier;

        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let resolver = FederatedServiceResolver::new();
        {
            let (entered, release) = (entered.clone(), release.clone());
            resolver.register(
                "ex:slow",
                move |_: &str| -> Result<Arc<dyn FederatedService>> {
                    entered.wait();
                    release.wait();
                    Ok(Arc::new(Counting::default()))
                },
            );
        }
        resolver.register_service("ex:fast", Arc::new(Counting::default()));

        std::thread::scope(|scope| {
            let slow = scope.spawn(|| resolver.resolve("ex:slow").is_ok());
            entered.wait();
            assert!(resolver.resolve("ex:fast").is_ok());
            release.wait();
            assert!(slow.join().unwrap());
        });
        assert_eq!(resolver.cached(), 2);
    }

    #[test]
    fn test_failed_creation_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let resolver = FederatedServiceResolver::new();
        {
            let attempts = attempts.clone();
            resolver.register("ex:flaky", move |endpoint: &str| -> Result<Arc<dyn FederatedService>> {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(QueryError::resolver(endpoint, "connection refused"));
                }
                Ok(Arc::new(Counting::default()))
            });
        }
        assert!(resolver.resolve("ex:flaky").is_err());
        assert_eq!(resolver.cached(), 0);
        assert!(resolver.resolve("ex:flaky").is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shutdown_closes_handles() {
        let service = Arc::new(Counting::default());
        let resolver = FederatedServiceResolver::new();
        resolver.register_service("ex:a", service.clone());
        resolver.resolve("ex:a").unwrap();

        resolver.shutdown();
        resolver.shutdown();
        assert_eq!(service.closed.load(Ordering::SeqCst), 1);
        assert!(resolver.is_shut_down());
        assert!(resolver.resolve("ex:a").is_err());
    }
}
