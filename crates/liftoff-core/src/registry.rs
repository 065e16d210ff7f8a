//! Run-scoped activation registry.
//!
//! # Overview
//!
//! The registry is the only mutable state shared during a run. It owns:
//!
//! - **Instances**: one per [`ModuleId`], created lazily through the
//!   [`ModuleActivator`] and cached.
//! - **Invocation ledger**: the `(module, phase)` pairs already invoked,
//!   used for duplicate suppression.
//! - **Activation decisions**: each module's CanActivate answer, asked once
//!   per run.
//! - **Notification bus**: observers subscribed under a module id.
//!
//! # Concurrency
//!
//! Every structure is a [`DashMap`]/[`DashSet`], so check-and-set operations
//! are atomic per entry and the registry is `Send + Sync`. Hosts may call
//! into it from several threads; the default orchestration path is
//! sequential.
//!
//! Activators and observers are always called with no shard lock held, so a
//! collaborator may call back into the registry.

use std::fmt;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tracing::{debug, trace};

use crate::catalog::ModuleActivator;
use crate::context::ActivationContext;
use crate::error::Result;
use crate::module::{InvocationObserver, Module, ModuleId, ModuleObserver};
use crate::phase::Phase;

// ---------------------------------------------------------------------------
// NotificationBus
// ---------------------------------------------------------------------------

/// Observers keyed by the module they are subscribed under.
///
/// A subscription under X receives events for X's direct dependencies.
#[derive(Default)]
pub struct NotificationBus {
    observers: DashMap<ModuleId, Vec<Arc<dyn InvocationObserver>>>,
}

impl NotificationBus {
    pub fn subscribe(&self, subscriber: ModuleId, observer: Arc<dyn InvocationObserver>) {
        trace!(module = %subscriber, "observer subscribed");
        self.observers.entry(subscriber).or_default().push(observer);
    }

    /// Snapshot of the observers under `subscriber`, cloned out so callers
    /// can run them without holding a lock.
    #[must_use]
    pub fn observers(&self, subscriber: &ModuleId) -> Vec<Arc<dyn InvocationObserver>> {
        self.observers
            .get(subscriber)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_observers(&self, subscriber: &ModuleId) -> bool {
        self.observers
            .get(subscriber)
            .is_some_and(|entry| !entry.is_empty())
    }
}

impl fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.observers.iter().map(|e| (e.key().clone(), e.value().len())))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ActivationRegistry
// ---------------------------------------------------------------------------

/// Instances, ledger, decisions and observers for one orchestrator.
pub struct ActivationRegistry {
    activator: Arc<dyn ModuleActivator>,
    instances: DashMap<ModuleId, Arc<dyn Module>>,
    ledger: DashSet<(ModuleId, Phase)>,
    invocations: DashMap<(ModuleId, Phase), usize>,
    decisions: DashMap<ModuleId, bool>,
    bus: NotificationBus,
}

impl ActivationRegistry {
    #[must_use]
    pub fn new(activator: Arc<dyn ModuleActivator>) -> Self {
        Self {
            activator,
            instances: DashMap::new(),
            ledger: DashSet::new(),
            invocations: DashMap::new(),
            decisions: DashMap::new(),
            bus: NotificationBus::default(),
        }
    }

    /// The cached instance for `id`, activating it on first use.
    ///
    /// If two callers race on the same id, both activate but only the first
    /// stored instance is kept and returned to both. A module that
    /// [observes its dependencies](Module::observes_dependencies) is
    /// subscribed to the bus when its instance is stored.
    ///
    /// # Errors
    ///
    /// Propagates the activator's error unchanged.
    pub fn get_or_create(&self, id: &ModuleId) -> Result<Arc<dyn Module>> {
        if let Some(existing) = self.instances.get(id) {
            return Ok(Arc::clone(existing.value()));
        }

        let created = self.activator.activate(id)?;
        let mut stored_now = false;
        let instance = Arc::clone(
            self.instances
                .entry(id.clone())
                .or_insert_with(|| {
                    stored_now = true;
                    created
                })
                .value(),
        );

        if stored_now {
            debug!(module = %id, "module activated");
            if instance.observes_dependencies() {
                self.bus
                    .subscribe(id.clone(), Arc::new(ModuleObserver(Arc::clone(&instance))));
            }
        }

        Ok(instance)
    }

    /// The cached instance for `id`, without activating it.
    #[must_use]
    pub fn get(&self, id: &ModuleId) -> Option<Arc<dyn Module>> {
        self.instances.get(id).map(|e| Arc::clone(e.value()))
    }

    /// Atomically record `(id, phase)` in the ledger.
    ///
    /// Returns `false`, leaving the ledger untouched, if the pair was
    /// already present.
    pub fn try_mark_invoked(&self, id: &ModuleId, phase: Phase) -> bool {
        self.ledger.insert((id.clone(), phase))
    }

    /// Take `(id, phase)` back out of the ledger so a later run retries it.
    ///
    /// Returns whether the pair was present.
    pub fn unmark(&self, id: &ModuleId, phase: Phase) -> bool {
        self.ledger.remove(&(id.clone(), phase)).is_some()
    }

    #[must_use]
    pub fn is_invoked(&self, id: &ModuleId, phase: Phase) -> bool {
        self.ledger.contains(&(id.clone(), phase))
    }

    /// Count one completed hook call.
    pub fn record_invocation(&self, id: &ModuleId, phase: Phase) {
        *self.invocations.entry((id.clone(), phase)).or_insert(0) += 1;
    }

    /// Completed hook calls for `(id, phase)` over the registry's lifetime.
    /// Not cleared by [`ActivationRegistry::reset`].
    #[must_use]
    pub fn invocation_count(&self, id: &ModuleId, phase: Phase) -> usize {
        self.invocations
            .get(&(id.clone(), phase))
            .map_or(0, |count| *count.value())
    }

    /// The module's CanActivate answer, asked at most once until the next
    /// [`reset`](ActivationRegistry::reset).
    ///
    /// # Errors
    ///
    /// Activation errors from instantiating the module.
    pub fn can_activate(&self, id: &ModuleId, ctx: &ActivationContext) -> Result<bool> {
        if let Some(decision) = self.decisions.get(id) {
            return Ok(*decision.value());
        }

        let instance = self.get_or_create(id)?;
        let answer = instance.can_activate(ctx);
        if !answer {
            debug!(module = %id, "module declined activation");
        }
        Ok(*self.decisions.entry(id.clone()).or_insert(answer).value())
    }

    /// The cached CanActivate answer, if one was taken this run.
    #[must_use]
    pub fn decision(&self, id: &ModuleId) -> Option<bool> {
        self.decisions.get(id).map(|d| *d.value())
    }

    /// Subscribe an external observer under `subscriber`.
    pub fn subscribe(&self, subscriber: ModuleId, observer: Arc<dyn InvocationObserver>) {
        self.bus.subscribe(subscriber, observer);
    }

    #[must_use]
    pub const fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    /// Start a fresh run: forget the ledger and the CanActivate answers.
    ///
    /// Instances, subscriptions and lifetime invocation counts are kept.
    /// Never call this in the middle of a run.
    pub fn reset(&self) {
        debug!(entries = self.ledger.len(), "invocation ledger cleared");
        self.ledger.clear();
        self.decisions.clear();
    }
}

impl fmt::Debug for ActivationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationRegistry")
            .field("instances", &self.instances.len())
            .field("ledger", &self.ledger.len())
            .field("decisions", &self.decisions.len())
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModuleCatalog;
    use crate::module::InvocationEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct Plain;
    impl Module for Plain {}

    struct Gated;
    impl Module for Gated {
        fn can_activate(&self, ctx: &ActivationContext) -> bool {
            ctx.is_truthy("gate.open")
        }
    }

    struct Watcher;
    impl Module for Watcher {
        fn observes_dependencies(&self) -> bool {
            true
        }
    }

    fn registry_with(catalog: ModuleCatalog) -> ActivationRegistry {
        ActivationRegistry::new(Arc::new(catalog))
    }

    #[test]
    fn get_or_create_caches_instances() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut catalog = ModuleCatalog::new();
        catalog.register("m", &[], move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Plain
        });
        let registry = registry_with(catalog);

        let a = registry.get_or_create(&"m".into()).expect("first");
        let b = registry.get_or_create(&"m".into()).expect("second");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(registry.instance_count(), 1);
    }

    #[test]
    fn unknown_module_fails_activation() {
        let registry = registry_with(ModuleCatalog::new());
        assert!(registry.get_or_create(&"ghost".into()).is_err());
        assert!(registry.get(&"ghost".into()).is_none());
    }

    #[test]
    fn try_mark_invoked_is_check_and_set() {
        let registry = registry_with(ModuleCatalog::new());
        let id = ModuleId::from("m");
        assert!(registry.try_mark_invoked(&id, Phase::Configure));
        assert!(!registry.try_mark_invoked(&id, Phase::Configure));
        assert!(registry.try_mark_invoked(&id, Phase::Initialize));
        assert_eq!(registry.ledger_len(), 2);
        assert!(registry.is_invoked(&id, Phase::Configure));

        assert!(registry.unmark(&id, Phase::Configure));
        assert!(!registry.unmark(&id, Phase::Configure));
        assert!(!registry.is_invoked(&id, Phase::Configure));
        assert!(registry.try_mark_invoked(&id, Phase::Configure));
    }

    #[test]
    fn concurrent_marks_admit_exactly_one_winner() {
        let registry = Arc::new(registry_with(ModuleCatalog::new()));
        let wins = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let wins = Arc::clone(&wins);
                thread::spawn(move || {
                    if registry.try_mark_invoked(&ModuleId::from("m"), Phase::Configure) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }
        assert_eq!(wins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_clears_ledger_and_decisions_only() {
        let mut catalog = ModuleCatalog::new();
        catalog.register("m", &[], || Plain);
        let registry = registry_with(catalog);
        let id = ModuleId::from("m");

        registry.get_or_create(&id).expect("activate");
        registry.try_mark_invoked(&id, Phase::Configure);
        registry.record_invocation(&id, Phase::Configure);
        registry
            .can_activate(&id, &ActivationContext::default())
            .expect("decide");

        registry.reset();
        assert_eq!(registry.ledger_len(), 0);
        assert_eq!(registry.decision(&id), None);
        assert_eq!(registry.instance_count(), 1);
        assert_eq!(registry.invocation_count(&id, Phase::Configure), 1);
    }

    #[test]
    fn can_activate_is_asked_once_per_run() {
        let mut catalog = ModuleCatalog::new();
        catalog.register("g", &[], || Gated);
        let registry = registry_with(catalog);
        let id = ModuleId::from("g");

        let mut ctx = ActivationContext::default();
        assert!(!registry.can_activate(&id, &ctx).expect("decide"));

        // The cached answer wins until reset.
        ctx.set("gate.open", true).expect("set");
        assert!(!registry.can_activate(&id, &ctx).expect("cached"));

        registry.reset();
        assert!(registry.can_activate(&id, &ctx).expect("fresh"));
    }

    #[test]
    fn observing_modules_subscribe_on_creation() {
        let mut catalog = ModuleCatalog::new();
        catalog.register("w", &[], || Watcher).register("p", &[], || Plain);
        let registry = registry_with(catalog);

        registry.get_or_create(&"w".into()).expect("w");
        registry.get_or_create(&"p".into()).expect("p");
        assert!(registry.bus().has_observers(&"w".into()));
        assert!(!registry.bus().has_observers(&"p".into()));

        // A second lookup must not subscribe twice.
        registry.get_or_create(&"w".into()).expect("w again");
        assert_eq!(registry.bus().observers(&"w".into()).len(), 1);
    }

    #[test]
    fn external_observers_receive_events() {
        struct Counter(AtomicUsize);
        impl InvocationObserver for Counter {
            fn on_invoked(
                &self,
                _event: &InvocationEvent,
                _ctx: &ActivationContext,
            ) -> anyhow::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let registry = registry_with(ModuleCatalog::new());
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        registry.subscribe("app".into(), Arc::clone(&counter) as Arc<dyn InvocationObserver>);

        let event = InvocationEvent {
            module: "db".into(),
            phase: Phase::Configure,
        };
        for observer in registry.bus().observers(&"app".into()) {
            observer
                .on_invoked(&event, &ActivationContext::default())
                .expect("deliver");
        }
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
