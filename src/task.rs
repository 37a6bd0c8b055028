//! The task and chain composer.
//!
//! A [`Task`] is a named unit of work, a [`Chain`] is an ordered sequence of
//! tasks where each later task reads what an earlier one wrote to disk, and
//! [`run_concurrent`] fans independent chains out over the rayon pool. The
//! whole pipeline is declared as data in [`crate::pipeline`]; this module is
//! the generic interpreter.
//!
//! Ordering contract: within a chain, a task starts only after the previous
//! one has fully completed; across chains there is no ordering guarantee,
//! only that [`run_concurrent`] returns after every chain has finished. A
//! task failure halts the remainder of its own chain and nothing else.

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::config::EnvConfig;
use crate::error::TransformError;

type ActionFn = Box<dyn Fn(&EnvConfig) -> anyhow::Result<()> + Send + Sync>;

/// A named unit of work: read a source glob, apply one transformation, write
/// under the environment's output root. Stateless between invocations.
pub struct Task {
    pub name: &'static str,
    action: ActionFn,
}

impl Task {
    pub fn new<F>(name: &'static str, action: F) -> Self
    where
        F: Fn(&EnvConfig) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name,
            action: Box::new(action),
        }
    }

    fn run(&self, config: &EnvConfig) -> Result<(), TransformError> {
        (self.action)(config).map_err(|source| TransformError {
            task: self.name,
            source,
        })
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({})", self.name)
    }
}

/// An ordered sequence of dependent tasks.
#[derive(Debug)]
pub struct Chain {
    pub name: &'static str,
    tasks: Vec<Task>,
}

impl Chain {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tasks: Vec::new(),
        }
    }

    pub fn then(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Run every task strictly in order. The first failure aborts the
    /// remainder of the chain.
    pub fn run(&self, config: &EnvConfig) -> Result<(), TransformError> {
        for task in &self.tasks {
            task.run(config)?;
        }

        Ok(())
    }
}

/// Per-chain outcome of one pipeline run.
#[derive(Debug)]
pub struct ChainOutcome {
    pub chain: &'static str,
    pub result: Result<(), TransformError>,
}

/// Summary of a full concurrent run; one outcome per chain, in no
/// particular order.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub outcomes: Vec<ChainOutcome>,
}

impl BuildReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChainOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn any_succeeded(&self) -> bool {
        self.outcomes.iter().any(|o| o.result.is_ok())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Start all chains without waiting on each other and collect every
/// outcome. A failing chain is reported and contained; it never aborts a
/// sibling chain.
pub fn run_concurrent(chains: &[&Chain], config: &EnvConfig) -> BuildReport {
    let s = Instant::now();

    let bar = ProgressBar::new(chains.len() as u64).with_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("Error setting progress bar template")
            .progress_chars("#>-"),
    );

    let active = Arc::new(Mutex::new(HashSet::new()));

    let outcomes = chains
        .par_iter()
        .map(|chain| {
            {
                let mut active = active.lock().unwrap();
                active.insert(chain.name);
                bar.set_message(format_active(&active));
            }

            let result = chain.run(config);

            if let Err(err) = &result {
                tracing::error!("Chain '{}' halted. {err}", chain.name);
            }

            {
                let mut active = active.lock().unwrap();
                active.remove(chain.name);
                bar.set_message(format_active(&active));
                bar.inc(1);
            }

            ChainOutcome {
                chain: chain.name,
                result,
            }
        })
        .collect();

    bar.finish_with_message(format!("Finished chains {}", crate::clean::as_overhead(s)));

    let report = BuildReport { outcomes };

    for outcome in report.failures() {
        eprintln!(
            "{} chain '{}' did not complete",
            style("Error:").red(),
            style(outcome.chain).yellow(),
        );
    }

    report
}

fn format_active(active: &HashSet<&'static str>) -> String {
    let mut names: Vec<_> = active.iter().copied().collect();
    names.sort_unstable();
    names.join(", ")
}
