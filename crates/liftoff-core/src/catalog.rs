//! Dependency declarations and module activation.
//!
//! The orchestrator depends on two narrow collaborators:
//!
//! - [`DependencySource`] — `ModuleId → [ModuleId]` lookup of direct
//!   dependencies. How they are declared does not matter to the core.
//! - [`ModuleActivator`] — `ModuleId → instance`. Constructor wiring and
//!   option injection happen behind it.
//!
//! [`ModuleCatalog`] is the in-memory implementation of both, filled by
//! explicit registration.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use crate::error::{LiftoffError, Result};
use crate::module::{DeclaredModule, Module, ModuleId};

/// Supplies the ordered direct dependencies of a module.
pub trait DependencySource: Send + Sync {
    /// # Errors
    ///
    /// [`LiftoffError::UnknownModule`] when `id` was never declared.
    fn dependencies_of(&self, id: &ModuleId) -> Result<Vec<ModuleId>>;
}

/// Creates module instances.
pub trait ModuleActivator: Send + Sync {
    /// # Errors
    ///
    /// [`LiftoffError::UnknownModule`] for undeclared ids; constructor
    /// failures come back as [`LiftoffError::Activation`].
    fn activate(&self, id: &ModuleId) -> Result<Arc<dyn Module>>;
}

type Factory = Box<dyn Fn() -> anyhow::Result<Arc<dyn Module>> + Send + Sync>;

struct Registration {
    depends_on: Vec<ModuleId>,
    factory: Factory,
}

/// Registration-based module catalog.
#[derive(Default)]
pub struct ModuleCatalog {
    modules: IndexMap<ModuleId, Registration>,
}

impl ModuleCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module built by `factory` each time it is activated.
    pub fn register<M, F>(
        &mut self,
        id: impl Into<ModuleId>,
        depends_on: &[&str],
        factory: F,
    ) -> &mut Self
    where
        M: Module + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        let factory: Factory = Box::new(move || Ok(Arc::new(factory()) as Arc<dyn Module>));
        self.insert(id.into(), to_ids(depends_on), factory)
    }

    /// Register a module whose construction can fail.
    pub fn register_fallible<F>(
        &mut self,
        id: impl Into<ModuleId>,
        depends_on: &[&str],
        factory: F,
    ) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn Module>> + Send + Sync + 'static,
    {
        self.insert(id.into(), to_ids(depends_on), Box::new(factory))
    }

    /// Register an existing instance. Every activation hands out the same
    /// `Arc`, so the caller keeps a handle on the module.
    pub fn register_shared(
        &mut self,
        id: impl Into<ModuleId>,
        depends_on: &[&str],
        instance: Arc<dyn Module>,
    ) -> &mut Self {
        let factory: Factory = Box::new(move || Ok(Arc::clone(&instance)));
        self.insert(id.into(), to_ids(depends_on), factory)
    }

    /// Register a module type that declares its own id and dependencies.
    pub fn register_module<M: DeclaredModule>(&mut self) -> &mut Self {
        let factory: Factory = Box::new(|| Ok(Arc::new(M::create()) as Arc<dyn Module>));
        self.insert(M::id(), M::depends_on(), factory)
    }

    fn insert(&mut self, id: ModuleId, depends_on: Vec<ModuleId>, factory: Factory) -> &mut Self {
        let registration = Registration {
            depends_on,
            factory,
        };
        if self.modules.insert(id.clone(), registration).is_some() {
            warn!(module = %id, "module registered twice; the later registration wins");
        }
        self
    }

    #[must_use]
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.modules.iter().map(|(id, r)| (id, &r.depends_on)))
            .finish()
    }
}

impl DependencySource for ModuleCatalog {
    fn dependencies_of(&self, id: &ModuleId) -> Result<Vec<ModuleId>> {
        self.modules
            .get(id)
            .map(|r| r.depends_on.clone())
            .ok_or_else(|| LiftoffError::UnknownModule(id.clone()))
    }
}

impl ModuleActivator for ModuleCatalog {
    fn activate(&self, id: &ModuleId) -> Result<Arc<dyn Module>> {
        let registration = self
            .modules
            .get(id)
            .ok_or_else(|| LiftoffError::UnknownModule(id.clone()))?;
        Ok((registration.factory)()?)
    }
}

fn to_ids(ids: &[&str]) -> Vec<ModuleId> {
    ids.iter().map(|id| ModuleId::from(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Plain;
    impl Module for Plain {}

    struct Declared;
    impl Module for Declared {}
    impl DeclaredModule for Declared {
        fn id() -> ModuleId {
            ModuleId::from("declared")
        }
        fn depends_on() -> Vec<ModuleId> {
            vec![ModuleId::from("plain")]
        }
        fn create() -> Self {
            Self
        }
    }

    #[test]
    fn dependencies_keep_declaration_order() {
        let mut catalog = ModuleCatalog::new();
        catalog.register("app", &["db", "cache", "http"], || Plain);
        let deps = catalog.dependencies_of(&"app".into()).expect("known");
        let names: Vec<&str> = deps.iter().map(ModuleId::as_str).collect();
        assert_eq!(names, vec!["db", "cache", "http"]);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let catalog = ModuleCatalog::new();
        let err = catalog.dependencies_of(&"ghost".into()).expect_err("unknown");
        assert!(matches!(err, LiftoffError::UnknownModule(ref id) if id.as_str() == "ghost"));
        assert!(catalog.activate(&"ghost".into()).is_err());
    }

    #[test]
    fn factories_run_per_activation() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut catalog = ModuleCatalog::new();
        catalog.register("m", &[], move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Plain
        });
        catalog.activate(&"m".into()).expect("first");
        catalog.activate(&"m".into()).expect("second");
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shared_instances_are_the_same_arc() {
        let instance: Arc<dyn Module> = Arc::new(Plain);
        let mut catalog = ModuleCatalog::new();
        catalog.register_shared("m", &[], Arc::clone(&instance));
        let a = catalog.activate(&"m".into()).expect("activate");
        assert!(Arc::ptr_eq(&a, &instance));
    }

    #[test]
    fn fallible_factory_errors_become_activation_errors() {
        let mut catalog = ModuleCatalog::new();
        catalog.register_fallible("m", &[], || anyhow::bail!("no credentials"));
        let err = catalog.activate(&"m".into()).err().expect("fails");
        assert!(matches!(err, LiftoffError::Activation(_)));
        assert_eq!(err.to_string(), "no credentials");
    }

    #[test]
    fn declared_modules_register_themselves() {
        let mut catalog = ModuleCatalog::new();
        catalog.register("plain", &[], || Plain).register_module::<Declared>();
        assert_eq!(catalog.len(), 2);
        let deps = catalog.dependencies_of(&Declared::id()).expect("known");
        assert_eq!(deps, vec![ModuleId::from("plain")]);
    }
}
