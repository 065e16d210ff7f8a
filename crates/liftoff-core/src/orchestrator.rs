//! Phased lifecycle orchestration.
//!
//! # Overview
//!
//! Given a root module and an ordered phase list, the orchestrator:
//!
//! 1. Resolves every module reachable from the root into a
//!    [`DependencyMap`] (breadth-first, via the [`DependencySource`]).
//! 2. Rejects the run with [`LiftoffError::CircularDependency`] if the map
//!    has a cycle. Nothing has been instantiated at that point.
//! 3. Sorts the map leaf-first.
//! 4. Instantiates every module leaf-first and asks each one's CanActivate
//!    once.
//! 5. Runs each phase over the sorted order: even-indexed phases root-first,
//!    odd-indexed phases leaf-first (see [`Sweep`]).
//! 6. After every hook call, notifies the observers subscribed under the
//!    module's direct dependents.
//!
//! # Run states
//!
//! ```text
//! Initialized → GraphBuilt → Sorted → Running{i} → … → Done
//!                   └──────→ Rejected (cycle)
//!                            Running{i} → Aborted (hook/observer error)
//! ```
//!
//! # Failure semantics
//!
//! Fail fast. An empty phase list is rejected before the graph is touched.
//! A failing hook, observer or activator stops the run where it is; hooks
//! that already ran keep their side effects.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{DependencySource, ModuleActivator, ModuleCatalog};
use crate::config::OrchestratorConfig;
use crate::context::ActivationContext;
use crate::error::{LiftoffError, Result};
use crate::graph::{CyclePath, DependencyIndex, DependencyMap, find_cycle, has_cycle, topological_sort};
use crate::module::{InvocationEvent, ModuleId};
use crate::phase::{Phase, Sweep};
use crate::registry::ActivationRegistry;

// ---------------------------------------------------------------------------
// Plan and report types
// ---------------------------------------------------------------------------

/// Lifecycle of the orchestrator's most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum RunState {
    Initialized,
    GraphBuilt,
    Sorted,
    Running { index: usize, phase: Phase },
    Done,
    Rejected,
    Aborted,
}

/// The immutable graph products of one run.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub root: ModuleId,
    pub map: DependencyMap<ModuleId>,
    pub index: DependencyIndex<ModuleId>,
    /// Leaf-first order.
    pub order: Vec<ModuleId>,
}

impl ExecutionPlan {
    /// Modules in the order a phase with the given sweep visits them.
    pub fn sweep(&self, sweep: Sweep) -> Box<dyn Iterator<Item = &ModuleId> + '_> {
        match sweep {
            Sweep::Descending => Box::new(self.order.iter().rev()),
            Sweep::Ascending => Box::new(self.order.iter()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// One hook call, as recorded in a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationRecord {
    pub module: ModuleId,
    pub phase: Phase,
}

/// What a call to [`LifecycleOrchestrator::start`] did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Leaf-first module order.
    pub order: Vec<ModuleId>,
    pub phases: Vec<Phase>,
    /// Hook calls in execution order.
    pub invocations: Vec<InvocationRecord>,
    /// Calls skipped because the ledger already had the pair.
    pub suppressed: Vec<InvocationRecord>,
    /// Modules whose CanActivate returned false.
    pub declined: Vec<ModuleId>,
    /// Observer callbacks delivered.
    pub notifications: usize,
}

impl RunReport {
    /// Modules invoked for `phase`, in invocation order.
    #[must_use]
    pub fn phase_order(&self, phase: Phase) -> Vec<&ModuleId> {
        self.invocations
            .iter()
            .filter(|r| r.phase == phase)
            .map(|r| &r.module)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// LifecycleOrchestrator
// ---------------------------------------------------------------------------

/// Drives module activation for a root module and a phase list.
pub struct LifecycleOrchestrator {
    source: Arc<dyn DependencySource>,
    registry: ActivationRegistry,
    state: Mutex<RunState>,
}

impl LifecycleOrchestrator {
    #[must_use]
    pub fn new(source: Arc<dyn DependencySource>, activator: Arc<dyn ModuleActivator>) -> Self {
        Self {
            source,
            registry: ActivationRegistry::new(activator),
            state: Mutex::new(RunState::Initialized),
        }
    }

    /// Use one catalog as both dependency source and activator.
    #[must_use]
    pub fn from_catalog(catalog: ModuleCatalog) -> Self {
        let catalog = Arc::new(catalog);
        Self::new(Arc::clone(&catalog) as Arc<dyn DependencySource>, catalog)
    }

    #[must_use]
    pub const fn registry(&self) -> &ActivationRegistry {
        &self.registry
    }

    /// State of the most recent run.
    ///
    /// There is one state slot per orchestrator. When several threads call
    /// [`start`](Self::start) at once, this is the last step any of them
    /// wrote, not the progress of one particular run.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: RunState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = ?*state, to = ?next, "run state");
        *state = next;
    }

    /// Collect every module reachable from `root` with its direct
    /// dependencies. Keys are in breadth-first discovery order, root first.
    ///
    /// # Errors
    ///
    /// - [`LiftoffError::InvalidArgument`] for a blank root or dependency id.
    /// - [`LiftoffError::UnknownModule`] for an id the source does not know.
    #[instrument(skip_all, fields(root = %root))]
    pub fn build_dependency_map(&self, root: &ModuleId) -> Result<DependencyMap<ModuleId>> {
        ensure_id(root, "root module id")?;

        let mut map = DependencyMap::new();
        let mut queued: HashSet<ModuleId> = HashSet::from([root.clone()]);
        let mut queue: VecDeque<ModuleId> = VecDeque::from([root.clone()]);

        while let Some(current) = queue.pop_front() {
            let deps = self.source.dependencies_of(&current)?;
            for dep in &deps {
                ensure_id(dep, "dependency id")?;
                if queued.insert(dep.clone()) {
                    queue.push_back(dep.clone());
                }
            }
            map.insert(current, deps);
        }

        debug!(modules = map.len(), edges = map.edge_count(), "dependency map built");
        Ok(map)
    }

    /// Leaf-first order of `map`.
    #[must_use]
    pub fn sort(map: &DependencyMap<ModuleId>) -> Vec<ModuleId> {
        topological_sort(map)
    }

    /// Build, check and sort the graph under `root`.
    ///
    /// # Errors
    ///
    /// Everything [`build_dependency_map`](Self::build_dependency_map)
    /// returns, plus [`LiftoffError::CircularDependency`].
    pub fn plan(&self, root: &ModuleId) -> Result<ExecutionPlan> {
        self.set_state(RunState::Initialized);
        let map = self.build_dependency_map(root)?;
        self.set_state(RunState::GraphBuilt);

        if has_cycle(&map) {
            self.set_state(RunState::Rejected);
            let err = cycle_error(root, find_cycle(&map));
            warn!(root = %root, error = %err, "run rejected");
            return Err(err);
        }

        let order = Self::sort(&map);
        let index = DependencyIndex::build(&map);
        self.set_state(RunState::Sorted);

        Ok(ExecutionPlan {
            root: root.clone(),
            map,
            index,
            order,
        })
    }

    /// Run `phases` over every module reachable from `root`.
    ///
    /// Duplicate suppression follows `ctx.config().suppress_duplicates`.
    ///
    /// # Errors
    ///
    /// - [`LiftoffError::InvalidArgument`] for an empty phase list or blank
    ///   ids, raised before anything runs.
    /// - [`LiftoffError::CircularDependency`] before any module is touched.
    /// - [`LiftoffError::Activation`] from the first failing activator, hook
    ///   or observer; the rest of the run is abandoned.
    #[instrument(skip_all, fields(root = %root, phases = phases.len()))]
    pub fn start(
        &self,
        root: &ModuleId,
        ctx: &mut ActivationContext,
        phases: &[Phase],
    ) -> Result<RunReport> {
        if phases.is_empty() {
            return Err(LiftoffError::invalid("phase list must not be empty"));
        }
        let plan = self.plan(root)?;
        self.run_plan(&plan, ctx, phases)
    }

    /// [`start`](Self::start) with the phase list from the context's config.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub fn start_configured(&self, root: &ModuleId, ctx: &mut ActivationContext) -> Result<RunReport> {
        let phases = ctx.config().phases.clone();
        self.start(root, ctx, &phases)
    }

    /// Execute an already built plan.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start), minus graph errors.
    pub fn run_plan(
        &self,
        plan: &ExecutionPlan,
        ctx: &mut ActivationContext,
        phases: &[Phase],
    ) -> Result<RunReport> {
        if phases.is_empty() {
            return Err(LiftoffError::invalid("phase list must not be empty"));
        }

        let result = self.execute(plan, ctx, phases);
        self.set_state(if result.is_ok() {
            RunState::Done
        } else {
            RunState::Aborted
        });
        result
    }

    fn execute(
        &self,
        plan: &ExecutionPlan,
        ctx: &mut ActivationContext,
        phases: &[Phase],
    ) -> Result<RunReport> {
        let mut report = RunReport {
            order: plan.order.clone(),
            phases: phases.to_vec(),
            ..RunReport::default()
        };

        for id in &plan.order {
            if !self.registry.can_activate(id, ctx)? {
                report.declined.push(id.clone());
            }
        }

        for (index, &phase) in phases.iter().enumerate() {
            self.set_state(RunState::Running { index, phase });
            let sweep = Sweep::for_index(index);
            info!(%phase, ?sweep, "phase started");

            for id in plan.sweep(sweep) {
                if !self.registry.can_activate(id, ctx)? {
                    continue;
                }
                let record = InvocationRecord {
                    module: id.clone(),
                    phase,
                };
                if self.invoke_method(id, phase, ctx)? {
                    report.notifications += self.notify_invocation(plan, id, phase, ctx)?;
                    report.invocations.push(record);
                } else {
                    report.suppressed.push(record);
                }
            }
        }

        info!(
            invoked = report.invocations.len(),
            suppressed = report.suppressed.len(),
            declined = report.declined.len(),
            "run finished"
        );
        Ok(report)
    }

    /// Invoke one module's hook for `phase`, honouring the ledger.
    ///
    /// Returns `false` when the pair was already in the ledger and duplicate
    /// suppression is on. With suppression off the hook always runs and the
    /// ledger is still updated. A hook that fails is taken back out of the
    /// ledger. Does not consult CanActivate.
    ///
    /// # Errors
    ///
    /// Activator and hook errors, unchanged.
    pub fn invoke_method(
        &self,
        module: &ModuleId,
        phase: Phase,
        ctx: &mut ActivationContext,
    ) -> Result<bool> {
        ensure_id(module, "module id")?;
        let instance = self.registry.get_or_create(module)?;

        let fresh = self.registry.try_mark_invoked(module, phase);
        if !fresh && ctx.config().suppress_duplicates {
            debug!(%module, %phase, "already invoked, suppressed");
            return Ok(false);
        }

        debug!(%module, %phase, "invoking");
        if let Err(err) = phase.invoke(instance.as_ref(), ctx) {
            // Not invoked: the next start retries it before its dependents.
            if fresh {
                self.registry.unmark(module, phase);
            }
            return Err(err.into());
        }
        self.registry.record_invocation(module, phase);
        Ok(true)
    }

    /// Tell the observers of `module`'s direct dependents that it completed
    /// `phase`. Dependents whose CanActivate was false are skipped.
    ///
    /// A dependent that lists `module` more than once in its dependencies
    /// appears that many times in the index and hears each event that many
    /// times.
    ///
    /// Returns the number of callbacks delivered.
    ///
    /// # Errors
    ///
    /// The first observer error, unchanged.
    pub fn notify_invocation(
        &self,
        plan: &ExecutionPlan,
        module: &ModuleId,
        phase: Phase,
        ctx: &ActivationContext,
    ) -> Result<usize> {
        let event = InvocationEvent {
            module: module.clone(),
            phase,
        };
        let mut delivered = 0;

        for ancestor in plan.index.ancestors(module) {
            if self.registry.decision(ancestor) == Some(false) {
                continue;
            }
            for observer in self.registry.bus().observers(ancestor) {
                observer.on_invoked(&event, ctx)?;
                delivered += 1;
            }
        }

        if delivered > 0 {
            debug!(%module, %phase, delivered, "dependents notified");
        }
        Ok(delivered)
    }

    /// Begin a fresh run on the same instances.
    pub fn reset(&self) {
        self.registry.reset();
        self.set_state(RunState::Initialized);
    }

    /// A context bound to `config`.
    #[must_use]
    pub fn context(config: OrchestratorConfig) -> ActivationContext {
        ActivationContext::new(Arc::new(config))
    }
}

impl fmt::Debug for LifecycleOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleOrchestrator")
            .field("state", &self.state())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn ensure_id(id: &ModuleId, what: &str) -> Result<()> {
    if id.is_blank() {
        return Err(LiftoffError::invalid(format!("{what} must not be empty")));
    }
    Ok(())
}

fn cycle_error(root: &ModuleId, cycle: Option<CyclePath<ModuleId>>) -> LiftoffError {
    match cycle {
        Some(cycle) => LiftoffError::CircularDependency {
            path: cycle.path.iter().map(ToString::to_string).collect(),
            from: cycle.edge_from,
            to: cycle.edge_to,
        },
        None => LiftoffError::CircularDependency {
            from: root.clone(),
            to: root.clone(),
            path: vec![root.to_string()],
        },
    }
}
