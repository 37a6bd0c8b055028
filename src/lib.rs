#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod clean;
pub mod config;
mod error;
mod serve;
pub mod task;
pub mod transform;
mod watch;

use console::style;

pub use crate::config::{BasePath, EnvConfig, Environment};
pub use crate::error::*;
use crate::task::{Chain, Task, run_concurrent};

/// The fixed pipeline: one chain per asset class, tasks within a chain in
/// dependency order. Adding an asset class is a data change here, not a
/// control-flow change.
pub fn pipeline() -> Vec<Chain> {
    vec![
        Chain::new("styles")
            .then(Task::new("scss", transform::styles::compile))
            .then(Task::new("cssmin", transform::styles::minify)),
        Chain::new("templates")
            .then(Task::new("render", transform::templates::render))
            .then(Task::new("fragments", transform::templates::fragments)),
        Chain::new("scripts")
            .then(Task::new("bundle", transform::scripts::bundle))
            .then(Task::new("jsmin", transform::scripts::minify)),
        Chain::new("data").then(Task::new("jsonmin", transform::data::minify)),
        Chain::new("images").then(Task::new("imagemin", transform::images::compress)),
        Chain::new("webp").then(Task::new("webp", transform::images::webp)),
    ]
}

/// The `build` entry point: clean the output root, then run every chain
/// once. Fails if the clean fails or any chain did not complete.
pub fn build(config: &EnvConfig) -> Result<(), PipelineError> {
    banner("build", config);

    clean::clear_output(config)?;

    let chains = pipeline();
    let refs: Vec<&Chain> = chains.iter().collect();
    let report = run_concurrent(&refs, config);

    if report.is_success() {
        Ok(())
    } else {
        Err(PipelineError::Build {
            failed: report.failures().count(),
            total: report.total(),
        })
    }
}

/// The default entry point: build once (no clean, so a later watch rebuild
/// stays incremental and non-destructive), then serve the output root and
/// watch the sources until the process is killed.
pub fn serve(config: &EnvConfig) -> Result<(), PipelineError> {
    banner("serve", config);

    let chains = pipeline();
    let refs: Vec<&Chain> = chains.iter().collect();
    let report = run_concurrent(&refs, config);

    if !report.is_success() {
        tracing::warn!(
            "Initial build completed with failures; fix the source and save to rebuild."
        );
    }

    let http = serve::start(config);
    watch::watch(&chains, config)?;

    http.join().expect("http server thread panicked")?;

    Ok(())
}

fn banner(mode: &str, config: &EnvConfig) {
    eprintln!(
        "Running {} in {} mode ({}).",
        style("sitepipe").red(),
        style(mode).blue(),
        config.environment,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_chain_names_unique() {
        let chains = pipeline();
        let mut names: Vec<_> = chains.iter().map(|c| c.name).collect();
        names.sort_unstable();
        names.dedup();

        assert_eq!(names.len(), chains.len());
    }
}
