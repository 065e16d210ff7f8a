//! Module identity and the lifecycle surface every module implements.
//!
//! A module is a unit with declared dependencies and a handful of lifecycle
//! hooks. The orchestrator never inspects a module beyond this trait: it asks
//! whether the module may activate, calls one hook per phase, and forwards
//! dependency notifications to modules that opted in.
//!
//! # Declaring dependencies
//!
//! Dependencies are declared explicitly, either through a
//! [`crate::catalog::ModuleCatalog::register`] call or by implementing
//! [`DeclaredModule`] so the type itself names its id and dependencies.
//!
//! ```rust,ignore
//! struct Http;
//!
//! impl Module for Http {
//!     fn configure(&self, ctx: &mut ActivationContext) -> anyhow::Result<()> {
//!         ctx.set("http.port", 8080)?;
//!         Ok(())
//!     }
//! }
//!
//! impl DeclaredModule for Http {
//!     fn id() -> ModuleId { ModuleId::from("http") }
//!     fn depends_on() -> Vec<ModuleId> { vec![ModuleId::from("logging")] }
//!     fn create() -> Self { Self }
//! }
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::ActivationContext;
use crate::phase::Phase;

// ---------------------------------------------------------------------------
// ModuleId
// ---------------------------------------------------------------------------

/// Opaque, comparable module identity.
///
/// Cloning is cheap (shared string). Ids are compared by value, so two ids
/// built from the same name are the same module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the id is empty or whitespace-only, which every entry
    /// point rejects.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for ModuleId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Published after a module completes a phase hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationEvent {
    /// The module whose hook just ran.
    pub module: ModuleId,
    /// The phase that ran.
    pub phase: Phase,
}

/// Receives [`InvocationEvent`]s for the direct dependencies of the module it
/// is subscribed under.
pub trait InvocationObserver: Send + Sync {
    /// Called synchronously, right after the dependency's hook returned.
    ///
    /// # Errors
    ///
    /// An error aborts the run like a failing lifecycle hook.
    fn on_invoked(&self, event: &InvocationEvent, ctx: &ActivationContext) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Lifecycle hooks of a module. Every hook defaults to a no-op.
///
/// Hooks take `&self`; modules that keep state across phases use interior
/// mutability. Each phase maps to exactly one hook, see [`Phase::invoke`].
#[allow(unused_variables)]
pub trait Module: Send + Sync {
    /// Whether this module takes part in the current run.
    ///
    /// Consulted once per run, before the first phase touches the module.
    fn can_activate(&self, ctx: &ActivationContext) -> bool {
        true
    }

    fn pre_configure(&self, ctx: &mut ActivationContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn configure(&self, ctx: &mut ActivationContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn post_configure(&self, ctx: &mut ActivationContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn initialize(&self, ctx: &mut ActivationContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn post_initialize(&self, ctx: &mut ActivationContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn shutdown(&self, ctx: &mut ActivationContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Opt in to [`Module::on_dependency_invoked`] callbacks.
    fn observes_dependencies(&self) -> bool {
        false
    }

    /// Called after one of this module's direct dependencies completed a
    /// phase. Only delivered when [`Module::observes_dependencies`] is true.
    fn on_dependency_invoked(
        &self,
        event: &InvocationEvent,
        ctx: &ActivationContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A module type that declares its own identity and dependencies.
pub trait DeclaredModule: Module + Sized + 'static {
    fn id() -> ModuleId;

    /// Direct dependencies, in declaration order.
    fn depends_on() -> Vec<ModuleId> {
        Vec::new()
    }

    fn create() -> Self;
}

/// Adapts a module instance into a bus observer.
pub(crate) struct ModuleObserver(pub(crate) Arc<dyn Module>);

impl InvocationObserver for ModuleObserver {
    fn on_invoked(&self, event: &InvocationEvent, ctx: &ActivationContext) -> anyhow::Result<()> {
        self.0.on_dependency_invoked(event, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_compare_by_value() {
        let a = ModuleId::from("db");
        let b = ModuleId::from(String::from("db"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "db");
        assert_eq!(a.to_string(), "db");
    }

    #[test]
    fn blank_ids_are_detected() {
        assert!(ModuleId::from("").is_blank());
        assert!(ModuleId::from("   ").is_blank());
        assert!(!ModuleId::from("x").is_blank());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ModuleId::from("cache");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"cache\"");
        let back: ModuleId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }
}
