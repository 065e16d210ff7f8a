//! `liftoff check` — validate the whole manifest graph.
//!
//! Reports dependencies without a `[[module]]` entry and the first circular
//! dependency found. Exits non-zero when either exists.

use std::io::Write;
use std::path::Path;

use clap::Args;
use liftoff_core::ModuleId;
use liftoff_core::graph::find_cycle;
use serde::Serialize;
use tracing::warn;

use crate::output::{OutputMode, render};

/// Arguments for `liftoff check`.
#[derive(Args, Debug, Default)]
pub struct CheckArgs {}

#[derive(Debug, Serialize)]
struct MissingDependency {
    module: ModuleId,
    dependency: ModuleId,
}

#[derive(Debug, Serialize)]
struct CheckOutput {
    ok: bool,
    modules: usize,
    edges: usize,
    undeclared: Vec<MissingDependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cycle: Option<Vec<ModuleId>>,
}

/// Execute `liftoff check`.
pub fn run_check(_args: &CheckArgs, output: OutputMode, manifest_path: &Path) -> anyhow::Result<()> {
    let manifest = super::load(manifest_path, output)?;
    let map = manifest.dependency_map();

    let undeclared: Vec<MissingDependency> = manifest
        .undeclared()
        .into_iter()
        .map(|(module, dependency)| MissingDependency { module, dependency })
        .collect();
    let cycle = find_cycle(&map).map(|c| c.path);

    let payload = CheckOutput {
        ok: undeclared.is_empty() && cycle.is_none(),
        modules: manifest.modules.len(),
        edges: map.edge_count(),
        undeclared,
        cycle,
    };

    render(output, &payload, render_check_text)?;

    if !payload.ok {
        warn!(
            undeclared = payload.undeclared.len(),
            cycle = payload.cycle.is_some(),
            "manifest check failed"
        );
        anyhow::bail!("manifest check failed");
    }
    Ok(())
}

fn render_check_text(payload: &CheckOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for missing in &payload.undeclared {
        writeln!(
            w,
            "undeclared: '{}' depends on '{}', which has no [[module]] entry",
            missing.module, missing.dependency
        )?;
    }

    if let Some(cycle) = &payload.cycle {
        let path: Vec<&str> = cycle.iter().map(ModuleId::as_str).collect();
        writeln!(w, "cycle: {}", path.join(" → "))?;
    }

    if payload.ok {
        writeln!(
            w,
            "ok: {} modules, {} dependencies, no cycles",
            payload.modules, payload.edges
        )?;
    }
    Ok(())
}
