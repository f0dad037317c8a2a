use crate::classify::ScriptKind;
use crate::error::Result;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// In-process entry points and child processes both report through it.
pub type ExitCode = i32;

/// Object-safe trait for anything the dispatcher can run with an argv.
///
/// Implemented by [`InProcessUnit`](crate::InProcessUnit) for scripts loaded
/// into the embedded runtime and by [`ProcessUnit`](crate::ProcessUnit) for
/// scripts spawned as child processes. Callers never need to know which one
/// they hold.
pub trait Invokable: Send + Sync {
    /// Runs the unit and blocks until it finishes.
    ///
    /// `argv` is normalized first (see [`fix_argv`](crate::fix_argv)), so an
    /// empty slice or an empty `argv[0]` is replaced with the unit's path.
    fn invoke(&self, argv: &[OsString]) -> Result<ExitCode>;

    /// Absolute path of the script backing this unit.
    fn path(&self) -> &Path;

    /// Which execution model backs this unit.
    fn kind(&self) -> ScriptKind;

    /// Name the unit was registered under.
    fn name(&self) -> &str;
}

/// Shared handle to a resolved unit. Identity is stable for the life of the
/// registry that produced it.
pub type Unit = Arc<dyn Invokable>;
