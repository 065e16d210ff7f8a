//! Module manifest: the TOML file the CLI reads its module graph from.
//!
//! ```toml
//! [orchestrator]
//! suppress_duplicates = true
//! phases = ["pre-configure", "configure", "initialize"]
//!
//! [[module]]
//! id = "app"
//! depends_on = ["db", "cache"]
//!
//! [[module]]
//! id = "cache"
//! enabled_when = "feature.cache"
//! ```
//!
//! Every `[[module]]` becomes a [`DryRunModule`] in a [`ModuleCatalog`]: its
//! hooks only log, so `liftoff run` shows what a real startup would do.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context as _;
use liftoff_core::graph::DependencyMap;
use liftoff_core::{
    ActivationContext, InvocationEvent, Module, ModuleCatalog, ModuleId, OrchestratorConfig, Phase,
};
use serde::Deserialize;
use tracing::{debug, info};

/// Parsed manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleSpec>,
}

/// One `[[module]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSpec {
    pub id: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// `false` makes CanActivate answer no.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Context property that must be truthy for CanActivate to answer yes.
    #[serde(default)]
    pub enabled_when: Option<String>,
    /// Log `on_dependency_invoked` callbacks for direct dependencies.
    #[serde(default)]
    pub observe: bool,
}

const fn default_true() -> bool {
    true
}

/// Read and validate the manifest at `path`.
///
/// # Errors
///
/// Fails if the file cannot be read, is not valid TOML, or declares a blank
/// or duplicate module id.
pub fn load_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    parse_manifest(&content).with_context(|| format!("invalid manifest {}", path.display()))
}

/// Parse and validate manifest text.
///
/// # Errors
///
/// Same as [`load_manifest`], minus I/O.
pub fn parse_manifest(content: &str) -> anyhow::Result<Manifest> {
    let manifest: Manifest = toml::from_str(content)?;

    let mut seen = HashSet::new();
    for spec in &manifest.modules {
        if spec.id.trim().is_empty() {
            anyhow::bail!("module id must not be empty");
        }
        if !seen.insert(spec.id.as_str()) {
            anyhow::bail!("module '{}' is declared twice", spec.id);
        }
        if let Some(dep) = spec.depends_on.iter().find(|d| d.trim().is_empty()) {
            anyhow::bail!("module '{}' has an empty dependency id {dep:?}", spec.id);
        }
        let mut deps = HashSet::new();
        if let Some(dep) = spec.depends_on.iter().find(|d| !deps.insert(d.as_str())) {
            anyhow::bail!("module '{}' lists dependency '{dep}' more than once", spec.id);
        }
    }

    debug!(modules = manifest.modules.len(), "manifest parsed");
    Ok(manifest)
}

impl Manifest {
    /// `explicit` if given, otherwise the first declared module.
    ///
    /// # Errors
    ///
    /// Fails when nothing is given and the manifest declares no module.
    pub fn root(&self, explicit: Option<&str>) -> anyhow::Result<ModuleId> {
        match explicit {
            Some(id) => Ok(ModuleId::from(id)),
            None => self
                .modules
                .first()
                .map(|spec| ModuleId::from(spec.id.as_str()))
                .context("manifest declares no modules; add a [[module]] entry or pass --root"),
        }
    }

    /// Every declared module with its dependencies, in manifest order.
    pub fn dependency_map(&self) -> DependencyMap<ModuleId> {
        self.modules
            .iter()
            .map(|spec| (ModuleId::from(spec.id.as_str()), ids(&spec.depends_on)))
            .collect()
    }

    /// `(module, dependency)` pairs whose dependency has no `[[module]]`.
    pub fn undeclared(&self) -> Vec<(ModuleId, ModuleId)> {
        let declared: HashSet<&str> = self.modules.iter().map(|s| s.id.as_str()).collect();
        self.modules
            .iter()
            .flat_map(|spec| {
                spec.depends_on
                    .iter()
                    .filter(|dep| !declared.contains(dep.as_str()))
                    .map(|dep| (ModuleId::from(spec.id.as_str()), ModuleId::from(dep.as_str())))
            })
            .collect()
    }

    /// A catalog of [`DryRunModule`]s, one per `[[module]]`.
    pub fn catalog(&self) -> ModuleCatalog {
        let mut catalog = ModuleCatalog::new();
        for spec in &self.modules {
            let deps: Vec<&str> = spec.depends_on.iter().map(String::as_str).collect();
            let template = spec.clone();
            catalog.register(spec.id.as_str(), &deps, move || DryRunModule::from(&template));
        }
        catalog
    }
}

fn ids(raw: &[String]) -> Vec<ModuleId> {
    raw.iter().map(|id| ModuleId::from(id.as_str())).collect()
}

// ---------------------------------------------------------------------------
// DryRunModule
// ---------------------------------------------------------------------------

/// A module whose hooks log and do nothing else.
#[derive(Debug)]
pub struct DryRunModule {
    id: ModuleId,
    enabled: bool,
    enabled_when: Option<String>,
    observe: bool,
}

impl From<&ModuleSpec> for DryRunModule {
    fn from(spec: &ModuleSpec) -> Self {
        Self {
            id: ModuleId::from(spec.id.as_str()),
            enabled: spec.enabled,
            enabled_when: spec.enabled_when.clone(),
            observe: spec.observe,
        }
    }
}

impl DryRunModule {
    fn hook(&self, phase: Phase) -> anyhow::Result<()> {
        info!(module = %self.id, %phase, "hook");
        Ok(())
    }
}

impl Module for DryRunModule {
    fn can_activate(&self, ctx: &ActivationContext) -> bool {
        self.enabled
            && self
                .enabled_when
                .as_deref()
                .is_none_or(|key| ctx.is_truthy(key))
    }

    fn pre_configure(&self, _ctx: &mut ActivationContext) -> anyhow::Result<()> {
        self.hook(Phase::PreConfigure)
    }

    fn configure(&self, _ctx: &mut ActivationContext) -> anyhow::Result<()> {
        self.hook(Phase::Configure)
    }

    fn post_configure(&self, _ctx: &mut ActivationContext) -> anyhow::Result<()> {
        self.hook(Phase::PostConfigure)
    }

    fn initialize(&self, _ctx: &mut ActivationContext) -> anyhow::Result<()> {
        self.hook(Phase::Initialize)
    }

    fn post_initialize(&self, _ctx: &mut ActivationContext) -> anyhow::Result<()> {
        self.hook(Phase::PostInitialize)
    }

    fn shutdown(&self, _ctx: &mut ActivationContext) -> anyhow::Result<()> {
        self.hook(Phase::Shutdown)
    }

    fn observes_dependencies(&self) -> bool {
        self.observe
    }

    fn on_dependency_invoked(
        &self,
        event: &InvocationEvent,
        _ctx: &ActivationContext,
    ) -> anyhow::Result<()> {
        info!(module = %self.id, dependency = %event.module, phase = %event.phase, "dependency finished");
        Ok(())
    }
}
