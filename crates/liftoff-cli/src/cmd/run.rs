//! `liftoff run` — dry run of a startup over the manifest's modules.
//!
//! Every module is a logging stand-in, so the output is exactly the
//! sequence of hook calls a real startup would make. Settings resolve as
//! manifest `[orchestrator]` → `LIFTOFF_*` env → flags.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use clap::Args;
use liftoff_core::config::apply_env_overrides;
use liftoff_core::phase::parse_phase_list;
use liftoff_core::{LifecycleOrchestrator, ModuleId, OrchestratorConfig, Phase, RunReport};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::output::{OutputMode, fail, render, text_kv};

/// Arguments for `liftoff run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Root module. Defaults to the first `[[module]]` in the manifest.
    #[arg(long)]
    pub root: Option<String>,

    /// Comma-separated phases, e.g. `pre-configure,configure`.
    #[arg(long)]
    pub phases: Option<String>,

    /// Context property visible to CanActivate (`enabled_when`). The value
    /// is read as JSON when it parses, as a string otherwise.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_property)]
    pub set: Vec<(String, Value)>,

    /// Run the phase list this many times on the same instances.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,

    /// Call hooks again even when they already ran.
    #[arg(long)]
    pub no_suppress: bool,
}

#[derive(Debug, Serialize)]
struct RunOutput {
    root: ModuleId,
    phases: Vec<Phase>,
    suppress_duplicates: bool,
    passes: Vec<RunReport>,
    properties: BTreeMap<String, Value>,
}

fn parse_property(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("property key must not be empty".to_string());
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn resolve_config(base: OrchestratorConfig, args: &RunArgs) -> liftoff_core::error::Result<OrchestratorConfig> {
    let mut config = apply_env_overrides(base)?;
    if let Some(raw) = args.phases.as_deref() {
        config.phases = parse_phase_list(raw)?;
    }
    if args.no_suppress {
        config.suppress_duplicates = false;
    }
    Ok(config)
}

/// Execute `liftoff run`.
pub fn run_run(args: &RunArgs, output: OutputMode, manifest_path: &Path) -> anyhow::Result<()> {
    let manifest = super::load(manifest_path, output)?;
    let root = manifest.root(args.root.as_deref())?;
    let config = resolve_config(manifest.orchestrator.clone(), args).map_err(|e| fail(output, e))?;
    debug!(?config, "run config resolved");

    let orchestrator = LifecycleOrchestrator::from_catalog(manifest.catalog());
    let mut ctx = LifecycleOrchestrator::context(config.clone());
    for (key, value) in &args.set {
        ctx.set_value(key.clone(), value.clone());
    }

    let mut passes = Vec::new();
    for _ in 0..args.repeat {
        let report = orchestrator
            .start(&root, &mut ctx, &config.phases)
            .map_err(|e| fail(output, e))?;
        passes.push(report);
    }

    let payload = RunOutput {
        root,
        phases: config.phases,
        suppress_duplicates: config.suppress_duplicates,
        passes,
        properties: ctx.properties().clone(),
    };
    render(output, &payload, render_run_text)
}

fn render_run_text(payload: &RunOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let phases: Vec<&str> = payload.phases.iter().map(|p| p.name()).collect();
    text_kv(w, "root", payload.root.as_str())?;
    text_kv(w, "phases", phases.join(", "))?;

    for (number, pass) in payload.passes.iter().enumerate() {
        if payload.passes.len() > 1 {
            writeln!(w, "pass {}", number + 1)?;
        }
        for record in &pass.invocations {
            writeln!(w, "  {:<16} {}", record.phase.name(), record.module)?;
        }
        if !pass.declined.is_empty() {
            let declined: Vec<&str> = pass.declined.iter().map(ModuleId::as_str).collect();
            text_kv(w, "declined", declined.join(", "))?;
        }
        if !pass.suppressed.is_empty() {
            text_kv(w, "suppressed", pass.suppressed.len().to_string())?;
        }
        if pass.notifications > 0 {
            text_kv(w, "notifications", pass.notifications.to_string())?;
        }
    }
    Ok(())
}
