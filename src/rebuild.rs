use tracing::{info, warn};

use crate::config::Config;
use crate::error::RunError;
use crate::runner::Invocation;

/// Cleans the workspace and rebuilds every executable with the build tool.
///
/// A failing `clean` is only reported; a failing build aborts the run.
pub fn rebuild(config: &Config) -> Result<(), RunError> {
    info!(tool = %config.make, "Cleaning workspace...");
    if let Err(e) = Invocation::new(&config.make).arg("clean").run_checked(None) {
        warn!(error = %e, "clean step failed, continuing");
    }

    info!(target = %config.build_target, "Building executables...");
    Invocation::new(&config.make)
        .arg(&config.build_target)
        .run_checked(None)
        .map_err(|e| RunError::Build {
            step: format!("{} {}", config.make, config.build_target),
            source: Box::new(e),
        })?;
    Ok(())
}
