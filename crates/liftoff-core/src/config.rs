use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LiftoffError, Result};
use crate::phase::{Phase, parse_phase_list};

/// Orchestrator settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Skip `(module, phase)` pairs already in the invocation ledger.
    #[serde(default = "default_true")]
    pub suppress_duplicates: bool,
    /// Phase list used by callers that do not pass their own.
    #[serde(default = "default_phases")]
    pub phases: Vec<Phase>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            suppress_duplicates: default_true(),
            phases: default_phases(),
        }
    }
}

/// On-disk layout: settings live under an `[orchestrator]` table so the file
/// can share space with other tables (the CLI keeps `[[module]]` entries
/// next to it).
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    orchestrator: OrchestratorConfig,
}

/// Parse an `[orchestrator]` table out of TOML text.
///
/// # Errors
///
/// Returns [`LiftoffError::Config`] when the text is not valid TOML or a
/// field has the wrong shape (including unknown phase names).
pub fn parse_config(content: &str) -> Result<OrchestratorConfig> {
    toml::from_str::<ConfigFile>(content)
        .map(|file| file.orchestrator)
        .map_err(|e| LiftoffError::Config(e.to_string()))
}

/// Load the config at `path`. A missing file yields the defaults.
///
/// # Errors
///
/// Returns [`LiftoffError::Config`] if the file exists but cannot be read
/// or parsed.
pub fn load_config(path: &Path) -> Result<OrchestratorConfig> {
    if !path.exists() {
        return Ok(OrchestratorConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| LiftoffError::Config(format!("failed to read {}: {e}", path.display())))?;

    parse_config(&content).map_err(|e| match e {
        LiftoffError::Config(msg) => {
            LiftoffError::Config(format!("failed to parse {}: {msg}", path.display()))
        }
        other => other,
    })
}

/// Apply `LIFTOFF_SUPPRESS_DUPLICATES` and `LIFTOFF_PHASES` on top of
/// `config`.
///
/// # Errors
///
/// Returns [`LiftoffError::InvalidArgument`] if `LIFTOFF_PHASES` names an
/// unknown phase.
pub fn apply_env_overrides(config: OrchestratorConfig) -> Result<OrchestratorConfig> {
    let suppress = env::var("LIFTOFF_SUPPRESS_DUPLICATES").ok();
    let phases = env::var("LIFTOFF_PHASES").ok();
    apply_overrides(config, suppress.as_deref(), phases.as_deref())
}

fn apply_overrides(
    mut config: OrchestratorConfig,
    suppress: Option<&str>,
    phases: Option<&str>,
) -> Result<OrchestratorConfig> {
    if let Some(value) = suppress {
        config.suppress_duplicates = is_truthy(value);
    }
    if let Some(value) = phases {
        config.phases = parse_phase_list(value)?;
    }
    Ok(config)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

const fn default_true() -> bool {
    true
}

fn default_phases() -> Vec<Phase> {
    Phase::STARTUP.to_vec()
}
