//! `liftoff graph` — dependency relations of the manifest's modules.
//!
//! - `liftoff graph` lists every module with its direct edge counts.
//! - `liftoff graph <id>` shows one module's dependencies and dependents,
//!   direct and transitive (`--all` keeps every path's repeat visits).
//! - `liftoff graph --dot` prints the whole graph in Graphviz DOT.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use clap::Args;
use liftoff_core::graph::{DependencyIndex, DependencyMap};
use liftoff_core::{LiftoffError, ModuleId};
use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use serde::Serialize;

use crate::output::{OutputMode, fail, render, text_kv};

/// Arguments for `liftoff graph`.
#[derive(Args, Debug, Default)]
pub struct GraphArgs {
    /// Module to inspect. Omit for a summary of every module.
    pub id: Option<String>,

    /// Keep repeat visits in transitive lists (one entry per path).
    #[arg(long)]
    pub all: bool,

    /// Print Graphviz DOT instead of text or JSON.
    #[arg(long, conflicts_with = "id")]
    pub dot: bool,
}

#[derive(Debug, Serialize)]
struct ModuleRelations {
    id: ModuleId,
    depends_on: Vec<ModuleId>,
    dependents: Vec<ModuleId>,
    descendants: Vec<ModuleId>,
    ancestors: Vec<ModuleId>,
}

#[derive(Debug, Serialize)]
struct NodeSummary {
    id: ModuleId,
    depends_on: usize,
    dependents: usize,
}

#[derive(Debug, Serialize)]
struct GraphSummary {
    modules: Vec<NodeSummary>,
}

/// Execute `liftoff graph`.
pub fn run_graph(args: &GraphArgs, output: OutputMode, manifest_path: &Path) -> anyhow::Result<()> {
    let manifest = super::load(manifest_path, output)?;
    let map = manifest.dependency_map();

    if args.dot {
        print!("{}", to_dot(&map));
        return Ok(());
    }

    let index = DependencyIndex::build(&map);
    match args.id.as_deref() {
        Some(raw) => {
            let id = ModuleId::from(raw);
            if !index.contains(&id) {
                return Err(fail(output, LiftoffError::UnknownModule(id)));
            }
            let payload = relations(&index, id, args.all);
            render(output, &payload, render_relations_text)
        }
        None => {
            let payload = GraphSummary {
                modules: index
                    .nodes()
                    .map(|id| NodeSummary {
                        id: id.clone(),
                        depends_on: index.descendants(id).len(),
                        dependents: index.ancestors(id).len(),
                    })
                    .collect(),
            };
            render(output, &payload, render_summary_text)
        }
    }
}

fn relations(index: &DependencyIndex<ModuleId>, id: ModuleId, all: bool) -> ModuleRelations {
    let (descendants, ancestors) = if all {
        (index.find_all_descendants(&id), index.find_all_ancestors(&id))
    } else {
        (index.find_descendants(&id), index.find_ancestors(&id))
    };
    ModuleRelations {
        depends_on: index.descendants(&id).to_vec(),
        dependents: index.ancestors(&id).to_vec(),
        descendants,
        ancestors,
        id,
    }
}

/// Dependent → dependency edges, one node per module.
fn to_dot(map: &DependencyMap<ModuleId>) -> String {
    let mut graph: DiGraph<String, &str> = DiGraph::new();
    let mut nodes = HashMap::new();
    for id in map.nodes() {
        let idx = graph.add_node(id.to_string());
        nodes.insert(id, idx);
    }
    for (id, deps) in map {
        for dep in deps {
            if let (Some(&from), Some(&to)) = (nodes.get(id), nodes.get(dep)) {
                graph.add_edge(from, to, "");
            }
        }
    }
    format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}

fn join(ids: &[ModuleId]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter().map(ModuleId::as_str).collect::<Vec<_>>().join(", ")
}

fn render_relations_text(payload: &ModuleRelations, w: &mut dyn Write) -> std::io::Result<()> {
    text_kv(w, "module", payload.id.as_str())?;
    text_kv(w, "depends on", join(&payload.depends_on))?;
    text_kv(w, "dependents", join(&payload.dependents))?;
    text_kv(w, "descendants", join(&payload.descendants))?;
    text_kv(w, "ancestors", join(&payload.ancestors))
}

fn render_summary_text(payload: &GraphSummary, w: &mut dyn Write) -> std::io::Result<()> {
    if payload.modules.is_empty() {
        writeln!(w, "No modules declared.")?;
        return Ok(());
    }
    for node in &payload.modules {
        writeln!(
            w,
            "{:<24} deps={:<3} dependents={}",
            node.id.as_str(),
            node.depends_on,
            node.dependents
        )?;
    }
    Ok(())
}
