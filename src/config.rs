//! Build environment selection and per-environment output configuration.
//!
//! The environment is resolved exactly once at process start, from the CLI
//! flag, then the `SITEPIPE_ENV` process variable, then the `development`
//! default. An unrecognized value at either source is rejected up front
//! instead of surfacing later as a missing-config fault deep inside a task.

use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;

use crate::error::ConfigError;

/// Process variable consulted when no `--env` flag is given.
pub const ENV_VAR: &str = "SITEPIPE_ENV";

/// The build target context. Selected once at startup and immutable for the
/// process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Resolve the environment from the CLI flag, falling back to the
    /// process variable, falling back to `Development`.
    pub fn resolve(flag: Option<&str>, fallback: Option<&str>) -> Result<Self, ConfigError> {
        match flag.or(fallback) {
            Some(value) => value.parse(),
            None => Ok(Environment::Development),
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Look up the configuration record for this environment. Total; every
    /// variant has exactly one record, and the output roots never overlap.
    pub fn config(self) -> EnvConfig {
        match self {
            Environment::Development => EnvConfig {
                environment: self,
                output_root: Utf8PathBuf::from("dist"),
                base_path: BasePath {
                    absolute: String::from("http://localhost:3000"),
                    relative: Utf8PathBuf::from("/"),
                },
            },
            Environment::Production => EnvConfig {
                environment: self,
                output_root: Utf8PathBuf::from("prod"),
                base_path: BasePath {
                    absolute: String::from("http://localhost:3000"),
                    relative: Utf8PathBuf::from("/"),
                },
            },
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Base URL paths made available to template rendering.
#[derive(Debug, Clone)]
pub struct BasePath {
    pub absolute: String,
    pub relative: Utf8PathBuf,
}

/// The per-environment configuration record, constructed once in `main` and
/// passed by reference into every task, the cleaner, the server and the
/// watcher.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub environment: Environment,
    /// Root directory every task writes under.
    pub output_root: Utf8PathBuf,
    pub base_path: BasePath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_roots_disjoint() {
        let dev = Environment::Development.config();
        let prod = Environment::Production.config();

        assert_ne!(dev.output_root, prod.output_root);
        assert!(!dev.output_root.starts_with(&prod.output_root));
        assert!(!prod.output_root.starts_with(&dev.output_root));
    }

    #[test]
    fn test_resolve_precedence() {
        // Flag wins over the process variable.
        assert_eq!(
            Environment::resolve(Some("production"), Some("development")).unwrap(),
            Environment::Production,
        );

        // Process variable fills in for a missing flag.
        assert_eq!(
            Environment::resolve(None, Some("production")).unwrap(),
            Environment::Production,
        );

        // Neither present defaults to development.
        assert_eq!(
            Environment::resolve(None, None).unwrap(),
            Environment::Development,
        );
    }

    #[test]
    fn test_resolve_rejects_unknown() {
        let err = Environment::resolve(Some("staging"), None).unwrap_err();
        assert!(err.to_string().contains("staging"));

        // An unrecognized fallback is just as fatal as an unrecognized flag.
        assert!(Environment::resolve(None, Some("prod")).is_err());
    }
}
