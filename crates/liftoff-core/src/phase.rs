//! Lifecycle phases and sweep direction.
//!
//! A run invokes an ordered list of phases. Each phase is a closed enum
//! variant bound to one [`Module`] hook; string names exist only at the
//! config and CLI boundary (`pre-configure`, `configure`, ...).
//!
//! # Direction
//!
//! The phase's position in the run list decides the sweep direction:
//!
//! | index | sweep | order |
//! |---|---|---|
//! | even | [`Sweep::Descending`] | root first, dependents before dependencies |
//! | odd  | [`Sweep::Ascending`]  | leaf first, dependencies before dependents |
//!
//! Early phases configure top-down, later phases finalize bottom-up, so a
//! pair of phases brackets the graph like enter/exit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::ActivationContext;
use crate::error::LiftoffError;
use crate::module::Module;

/// One lifecycle hook invoked across every module of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    PreConfigure,
    Configure,
    PostConfigure,
    Initialize,
    PostInitialize,
    Shutdown,
}

impl Phase {
    /// Every phase, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::PreConfigure,
        Self::Configure,
        Self::PostConfigure,
        Self::Initialize,
        Self::PostInitialize,
        Self::Shutdown,
    ];

    /// The startup sequence used when no phase list is configured.
    pub const STARTUP: [Self; 5] = [
        Self::PreConfigure,
        Self::Configure,
        Self::PostConfigure,
        Self::Initialize,
        Self::PostInitialize,
    ];

    /// Stable kebab-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PreConfigure => "pre-configure",
            Self::Configure => "configure",
            Self::PostConfigure => "post-configure",
            Self::Initialize => "initialize",
            Self::PostInitialize => "post-initialize",
            Self::Shutdown => "shutdown",
        }
    }

    /// Call the hook this phase is bound to.
    ///
    /// # Errors
    ///
    /// Whatever the module's hook returns, unchanged.
    pub fn invoke(self, module: &dyn Module, ctx: &mut ActivationContext) -> anyhow::Result<()> {
        match self {
            Self::PreConfigure => module.pre_configure(ctx),
            Self::Configure => module.configure(ctx),
            Self::PostConfigure => module.post_configure(ctx),
            Self::Initialize => module.initialize(ctx),
            Self::PostInitialize => module.post_initialize(ctx),
            Self::Shutdown => module.shutdown(ctx),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = LiftoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LiftoffError::invalid("phase name must not be empty"));
        }
        let normalized = trimmed.to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|phase| phase.name() == normalized)
            .ok_or_else(|| {
                LiftoffError::invalid(format!(
                    "unknown phase '{trimmed}' (expected one of: {})",
                    Self::ALL.map(Self::name).join(", ")
                ))
            })
    }
}

/// Parse a comma-separated phase list such as `"pre-configure,configure"`.
///
/// # Errors
///
/// Returns [`LiftoffError::InvalidArgument`] if the list is empty or any
/// entry is empty or unknown.
pub fn parse_phase_list(raw: &str) -> Result<Vec<Phase>, LiftoffError> {
    let phases = raw
        .split(',')
        .map(str::parse)
        .collect::<Result<Vec<Phase>, _>>()?;
    if phases.is_empty() {
        return Err(LiftoffError::invalid("phase list must not be empty"));
    }
    Ok(phases)
}

/// Direction a phase walks the sorted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sweep {
    /// Reverse sorted order: root first.
    Descending,
    /// Sorted order: leaves first.
    Ascending,
}

impl Sweep {
    /// Sweep for the phase at `index` in the run's phase list.
    #[must_use]
    pub const fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Self::Descending
        } else {
            Self::Ascending
        }
    }
}
