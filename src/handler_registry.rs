//! Fan-out of host/periodic-task notifications to registered observers.
//!
//! Grounded on the upstream `HandlerRegistry` (`handler_registry.h`/`.cc`):
//! a mutex-guarded list per handler kind, register/deregister, and a
//! guarded iteration helper that calls every registered handler in turn.
//! The upstream deregisters by raw pointer identity; the idiomatic Rust
//! counterpart (spec §9 Design Notes) is `Arc::ptr_eq` against
//! `Arc<dyn Trait>` handles the caller keeps ownership of.
//!
//! Matching `for_host_handler`/`for_periodic_task_handler` in
//! `handler_registry.cc`, and spec §4.5 ("fan-out holds the registry's
//! lock for the duration of the iteration"), fan-out here holds the
//! underlying mutex for the whole iteration rather than cloning a
//! snapshot first. `parking_lot::Mutex` is non-reentrant, exactly like
//! upstream's `std::mutex`, so a callback must not call back into
//! `register_*`/`deregister_*`/`for_*` on the same registry -- doing so
//! deadlocks in both implementations.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::handler::{HostHandler, PeriodicTaskHandler};

/// Registry of observers, shared by every [`crate::host_controller::HostController`]
/// and the [`crate::scheduler::PeriodicTasksScheduler`].
#[derive(Default)]
pub struct HandlerRegistry {
    host_handlers: Mutex<Vec<Arc<dyn HostHandler>>>,
    periodic_handlers: Mutex<Vec<Arc<dyn PeriodicTaskHandler>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a [`HostHandler`]. The same handler may be registered
    /// more than once; it will be called once per registration.
    pub fn register_host_handler(&self, handler: Arc<dyn HostHandler>) {
        self.host_handlers.lock().push(handler);
    }

    /// Removes every registration matching `handler` by pointer identity.
    pub fn deregister_host_handler(&self, handler: &Arc<dyn HostHandler>) {
        self.host_handlers
            .lock()
            .retain(|registered| !Arc::ptr_eq(registered, handler));
    }

    /// Registers a [`PeriodicTaskHandler`].
    pub fn register_periodic_handler(&self, handler: Arc<dyn PeriodicTaskHandler>) {
        self.periodic_handlers.lock().push(handler);
    }

    /// Removes every registration matching `handler` by pointer identity.
    pub fn deregister_periodic_handler(&self, handler: &Arc<dyn PeriodicTaskHandler>) {
        self.periodic_handlers
            .lock()
            .retain(|registered| !Arc::ptr_eq(registered, handler));
    }

    /// Calls `f` once for each registered [`HostHandler`].
    ///
    /// Holds the registry's lock for the duration of the iteration (spec
    /// §4.5); `f` must not call back into this registry's
    /// register/deregister/fan-out methods, or it will deadlock.
    pub fn for_each_host_handler(&self, mut f: impl FnMut(&Arc<dyn HostHandler>)) {
        let handlers = self.host_handlers.lock();
        for handler in handlers.iter() {
            f(handler);
        }
    }

    /// Calls `f` once for each registered [`PeriodicTaskHandler`], with
    /// the same locked-iteration contract as [`HandlerRegistry::for_each_host_handler`].
    pub fn for_each_periodic_handler(&self, mut f: impl FnMut(&Arc<dyn PeriodicTaskHandler>)) {
        let handlers = self.periodic_handlers.lock();
        for handler in handlers.iter() {
            f(handler);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HostId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);

    impl HostHandler for CountingHandler {
        fn on_host_connected(&self, _host: HostId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn registered_handler_is_invoked() {
        let registry = HandlerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handler: Arc<dyn HostHandler> = Arc::new(CountingHandler(count.clone()));
        registry.register_host_handler(handler.clone());
        registry.for_each_host_handler(|h| h.on_host_connected(HostId::new("h1")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deregistered_handler_is_not_invoked() {
        let registry = HandlerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handler: Arc<dyn HostHandler> = Arc::new(CountingHandler(count.clone()));
        registry.register_host_handler(handler.clone());
        registry.deregister_host_handler(&handler);
        registry.for_each_host_handler(|h| h.on_host_connected(HostId::new("h1")));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn distinct_handlers_with_same_type_are_independent() {
        let registry = HandlerRegistry::new();
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        let handler_a: Arc<dyn HostHandler> = Arc::new(CountingHandler(count_a.clone()));
        let handler_b: Arc<dyn HostHandler> = Arc::new(CountingHandler(count_b.clone()));
        registry.register_host_handler(handler_a.clone());
        registry.register_host_handler(handler_b);
        registry.deregister_host_handler(&handler_a);
        registry.for_each_host_handler(|h| h.on_host_connected(HostId::new("h1")));
        assert_eq!(count_a.load(Ordering::SeqCst), 0);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }
}
