pub mod check;
pub mod graph;
pub mod order;
pub mod run;

use std::path::Path;

use crate::manifest::{Manifest, load_manifest};
use crate::output::{CliError, OutputMode, render_error};

/// Load the manifest, reporting failures in the requested output mode.
pub(crate) fn load(path: &Path, output: OutputMode) -> anyhow::Result<Manifest> {
    match load_manifest(path) {
        Ok(manifest) => Ok(manifest),
        Err(err) => {
            render_error(
                output,
                &CliError::with_details(
                    format!("{err:#}"),
                    "pass --manifest <path> or create liftoff.toml with [[module]] entries",
                    "manifest_invalid",
                ),
            )?;
            Err(err)
        }
    }
}
