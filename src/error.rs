use std::sync::mpsc::SendError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unrecognized environment '{0}', expected 'development' or 'production'")]
    UnknownEnvironment(String),
}

/// An external tool rejected its input, or a task failed to read or write
/// its files. Contained to the chain the task belongs to.
#[derive(Debug, Error)]
#[error("Task '{task}':\n{source}")]
pub struct TransformError {
    pub task: &'static str,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("Couldn't remove the output directory.\n{0}")]
    Remove(std::io::Error),

    #[error("Couldn't recreate the output directory.\n{0}")]
    Create(std::io::Error),
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Couldn't bind the HTTP listener.\n{0}")]
    Bind(std::io::Error),

    #[error("Failed to build runtime")]
    Runtime(#[from] tokio::io::Error),

    #[error(transparent)]
    Io(std::io::Error),
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Couldn't bind the live-reload listener.\n{0}")]
    Bind(std::io::Error),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Send(#[from] SendError<()>),
}

/// Top-level error for an entry-point invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Error while clearing the output directory:\n{0}")]
    Clean(#[from] CleanError),

    #[error("{failed} of {total} chains failed")]
    Build { failed: usize, total: usize },

    #[error("Error while serving the output directory:\n{0}")]
    Serve(#[from] ServeError),

    #[error("Error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),
}
