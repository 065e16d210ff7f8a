#![forbid(unsafe_code)]

mod cmd;
mod manifest;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "liftoff: dependency-ordered, phased module startup",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Module manifest to read.
    #[arg(long, global = true, default_value = "liftoff.toml")]
    manifest: PathBuf,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags and `LIFTOFF_FORMAT`.
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Print the activation order",
        long_about = "Resolve every module reachable from the root and print them leaf-first.",
        after_help = "EXAMPLES:\n    # Order under the first declared module\n    liftoff order\n\n    # Order under a chosen root, as JSON\n    liftoff order --root app --format json"
    )]
    Order(cmd::order::OrderArgs),

    #[command(
        about = "Validate the manifest graph",
        long_about = "Report undeclared dependencies and circular dependencies. Exits non-zero on either.",
        after_help = "EXAMPLES:\n    # Check liftoff.toml\n    liftoff check\n\n    # Check another manifest\n    liftoff --manifest services.toml check"
    )]
    Check(cmd::check::CheckArgs),

    #[command(
        about = "Show dependency relations",
        long_about = "Summarize the graph, inspect one module's dependencies and dependents, or emit Graphviz DOT.",
        after_help = "EXAMPLES:\n    # Summary of every module\n    liftoff graph\n\n    # Relations of one module\n    liftoff graph db\n\n    # Render with Graphviz\n    liftoff graph --dot | dot -Tsvg > modules.svg"
    )]
    Graph(cmd::graph::GraphArgs),

    #[command(
        about = "Dry-run the startup phases",
        long_about = "Run the phase list over logging stand-ins for every module and print each hook call in order.",
        after_help = "EXAMPLES:\n    # Run the manifest's phases\n    liftoff run\n\n    # Choose phases and enable a conditional module\n    liftoff run --phases pre-configure,configure --set feature.cache=true"
    )]
    Run(cmd::run::RunArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LIFTOFF_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "liftoff=debug,info"
        } else {
            "liftoff=info,warn"
        })
    });

    let format = env::var("LIFTOFF_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = cli.output_mode();
    let manifest = cli.manifest.as_path();

    match cli.command {
        Commands::Order(ref args) => cmd::order::run_order(args, output, manifest),
        Commands::Check(ref args) => cmd::check::run_check(args, output, manifest),
        Commands::Graph(ref args) => cmd::graph::run_graph(args, output, manifest),
        Commands::Run(ref args) => cmd::run::run_run(args, output, manifest),
    }
}
