#![forbid(unsafe_code)]
//! liftoff-core library.
//!
//! Dependency-ordered, phased startup of in-process modules.
//!
//! # Conventions
//!
//! - **Errors**: [`LiftoffError`] for the library surface; module hooks
//!   return `anyhow::Result` and their errors pass through unchanged.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//!
//! # Example
//!
//! ```rust
//! use liftoff_core::{LifecycleOrchestrator, Module, ModuleCatalog, OrchestratorConfig, Phase};
//!
//! struct Database;
//! impl Module for Database {}
//!
//! struct App;
//! impl Module for App {
//!     fn configure(&self, ctx: &mut liftoff_core::ActivationContext) -> anyhow::Result<()> {
//!         ctx.set("app.configured", true)?;
//!         Ok(())
//!     }
//! }
//!
//! let mut catalog = ModuleCatalog::new();
//! catalog
//!     .register("app", &["db"], || App)
//!     .register("db", &[], || Database);
//!
//! let orchestrator = LifecycleOrchestrator::from_catalog(catalog);
//! let mut ctx = LifecycleOrchestrator::context(OrchestratorConfig::default());
//! let report = orchestrator
//!     .start(&"app".into(), &mut ctx, &[Phase::PreConfigure, Phase::Configure])
//!     .expect("startup");
//!
//! assert_eq!(report.invocations.len(), 4);
//! assert!(ctx.is_truthy("app.configured"));
//! ```

pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod module;
pub mod orchestrator;
pub mod phase;
pub mod registry;

pub use catalog::{DependencySource, ModuleActivator, ModuleCatalog};
pub use config::OrchestratorConfig;
pub use context::ActivationContext;
pub use error::{ErrorCode, LiftoffError};
pub use module::{DeclaredModule, InvocationEvent, InvocationObserver, Module, ModuleId};
pub use orchestrator::{ExecutionPlan, InvocationRecord, LifecycleOrchestrator, RunReport, RunState};
pub use phase::{Phase, Sweep};
pub use registry::ActivationRegistry;
