use crate::argv::fix_argv;
use crate::classify::ScriptKind;
use crate::env::LaunchOptions;
use crate::error::{DispatchError, Result};
use crate::unit::{ExitCode, Invokable};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::sync::Arc;

/// Wraps external scripts as [`ProcessUnit`]s sharing one set of
/// [`LaunchOptions`].
#[derive(Debug, Clone, Default)]
pub struct ExternalLauncher {
    options: LaunchOptions,
}

impl ExternalLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    /// Options every wrapped unit is launched with.
    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Wrap the script at `path`. Nothing is spawned until the unit is invoked.
    pub fn wrap(&self, path: impl Into<PathBuf>) -> Arc<ProcessUnit> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Arc::new(ProcessUnit {
            name,
            path,
            options: self.options.clone(),
        })
    }
}

/// A script that runs as a separate OS process.
///
/// The script file itself is the executable image of the child, independent
/// of whatever the caller puts in `argv[0]`.
#[derive(Debug)]
pub struct ProcessUnit {
    name: String,
    path: PathBuf,
    options: LaunchOptions,
}

impl ProcessUnit {
    /// Start the script without waiting for it.
    pub fn spawn(&self, argv: &[OsString]) -> Result<Child> {
        let argv = fix_argv(Some(argv), &self.path);
        let mut cmd = Command::new(&self.path);
        set_arg0(&mut cmd, argv.program());
        cmd.args(argv.args());
        self.options.apply(&mut cmd).map_err(|source| self.spawn_error(source))?;

        tracing::debug!(path = %self.path.display(), argv = ?&*argv, "spawning external script");
        cmd.spawn().map_err(|source| self.spawn_error(source))
    }

    fn spawn_error(&self, source: std::io::Error) -> DispatchError {
        DispatchError::Spawn {
            path: self.path.clone(),
            source,
        }
    }
}

impl Invokable for ProcessUnit {
    fn invoke(&self, argv: &[OsString]) -> Result<ExitCode> {
        let mut child = self.spawn(argv)?;
        let exit_status = child.wait().map_err(|source| self.spawn_error(source))?;
        let code = match exit_status.code() {
            Some(x) => x,
            None => terminated_by_signal(exit_status),
        };
        tracing::debug!(path = %self.path.display(), code, "external script exited");
        Ok(code)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> ScriptKind {
        ScriptKind::External
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(unix)]
fn set_arg0(cmd: &mut Command, arg0: &std::ffi::OsStr) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(arg0);
}

// Only Unix lets argv[0] differ from the program path.
#[cfg(not(unix))]
fn set_arg0(_cmd: &mut Command, _arg0: &std::ffi::OsStr) {}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> ExitCode {
    -1
}
