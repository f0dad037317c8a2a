use crate::io_adapters::Redirect;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

/// Process configuration applied to every child spawned by a
/// [`ProcessUnit`](crate::ProcessUnit).
///
/// The default inherits everything from the dispatcher: working directory,
/// environment and standard streams.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Working directory for the child. `None` inherits the current one.
    pub current_dir: Option<PathBuf>,
    /// Variables added to (or overriding) the child's environment.
    pub vars: HashMap<OsString, OsString>,
    /// Start the child from an empty environment before applying `vars`.
    pub clear_env: bool,
    pub stdin: Redirect,
    pub stdout: Redirect,
    pub stderr: Redirect,
}

impl LaunchOptions {
    /// Options that inherit everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set or override one environment variable.
    pub fn var(mut self, key: impl Into<OsString>, val: impl Into<OsString>) -> Self {
        self.vars.insert(key.into(), val.into());
        self
    }

    pub fn clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    pub fn stdin(mut self, redirect: Redirect) -> Self {
        self.stdin = redirect;
        self
    }

    pub fn stdout(mut self, redirect: Redirect) -> Self {
        self.stdout = redirect;
        self
    }

    pub fn stderr(mut self, redirect: Redirect) -> Self {
        self.stderr = redirect;
        self
    }

    /// Apply these options to `cmd`.
    ///
    /// Redirect targets are opened here, so a missing input file fails the
    /// spawn rather than the child.
    pub(crate) fn apply(&self, cmd: &mut Command) -> std::io::Result<()> {
        if self.clear_env {
            cmd.env_clear();
        }
        cmd.envs(&self.vars);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(self.stdin.to_stdio()?)
            .stdout(self.stdout.to_stdio()?)
            .stderr(self.stderr.to_stdio()?);
        Ok(())
    }
}
