//! `liftoff order` — print the leaf-first activation order under a root.

use std::io::Write;
use std::path::Path;

use clap::Args;
use liftoff_core::{LifecycleOrchestrator, ModuleId};
use serde::Serialize;

use crate::output::{OutputMode, fail, render};

/// Arguments for `liftoff order`.
#[derive(Args, Debug, Default)]
pub struct OrderArgs {
    /// Root module. Defaults to the first `[[module]]` in the manifest.
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrderOutput {
    root: ModuleId,
    order: Vec<ModuleId>,
}

/// Execute `liftoff order`.
pub fn run_order(args: &OrderArgs, output: OutputMode, manifest_path: &Path) -> anyhow::Result<()> {
    let manifest = super::load(manifest_path, output)?;
    let root = manifest.root(args.root.as_deref())?;

    let orchestrator = LifecycleOrchestrator::from_catalog(manifest.catalog());
    let plan = orchestrator.plan(&root).map_err(|e| fail(output, e))?;

    let payload = OrderOutput {
        root,
        order: plan.order,
    };
    render(output, &payload, render_order_text)
}

fn render_order_text(payload: &OrderOutput, w: &mut dyn Write) -> std::io::Result<()> {
    for (position, id) in payload.order.iter().enumerate() {
        writeln!(w, "{:>3}. {id}", position + 1)?;
    }
    Ok(())
}
