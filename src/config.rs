//! Dispatcher configuration.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;

/// Overrides the script directory.
pub const ROOT_ENV: &str = "MULTICALL_ROOT";

/// `tracing` filter directives for the binary, e.g. `multicall=debug`.
pub const LOG_ENV: &str = "MULTICALL_LOG";

pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory the registry resolves script names in.
    pub root: PathBuf,
}

impl Config {
    /// Resolve the configuration from the process environment.
    ///
    /// The root is taken from `root_flag`, then `$MULTICALL_ROOT`, then the
    /// directory holding the running executable.
    pub fn load(root_flag: Option<PathBuf>) -> Result<Self> {
        Self::from_sources(root_flag, std::env::var_os(ROOT_ENV), || {
            std::env::current_exe().context("can't locate the running executable")
        })
    }

    pub fn from_sources(
        root_flag: Option<PathBuf>,
        root_env: Option<OsString>,
        current_exe: impl FnOnce() -> Result<PathBuf>,
    ) -> Result<Self> {
        let root = match (root_flag, root_env) {
            (Some(flag), _) => flag,
            (None, Some(env)) if !env.is_empty() => PathBuf::from(env),
            _ => {
                let exe = current_exe()?;
                exe.parent()
                    .map(PathBuf::from)
                    .with_context(|| format!("{} has no parent directory", exe.display()))?
            }
        };
        Ok(Self { root })
    }
}

/// Filter directives from `$MULTICALL_LOG`, or [`DEFAULT_LOG_FILTER`].
pub fn log_filter() -> String {
    std::env::var(LOG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_exe() -> Result<PathBuf> {
        anyhow::bail!("executable lookup should not happen")
    }

    #[test]
    fn flag_wins_over_env() {
        let cfg = Config::from_sources(
            Some(PathBuf::from("/from/flag")),
            Some(OsString::from("/from/env")),
            no_exe,
        )
        .unwrap();
        assert_eq!(cfg.root, PathBuf::from("/from/flag"));
    }

    #[test]
    fn env_used_without_flag() {
        let cfg = Config::from_sources(None, Some(OsString::from("/from/env")), no_exe).unwrap();
        assert_eq!(cfg.root, PathBuf::from("/from/env"));
    }

    #[test]
    fn falls_back_to_executable_directory() {
        let cfg = Config::from_sources(None, Some(OsString::new()), || {
            Ok(PathBuf::from("/opt/tools/multicall"))
        })
        .unwrap();
        assert_eq!(cfg.root, PathBuf::from("/opt/tools"));
    }

    #[test]
    fn executable_lookup_failure_propagates() {
        let err = Config::from_sources(None, None, || anyhow::bail!("no exe")).unwrap_err();
        assert!(err.to_string().contains("no exe"));
    }
}
