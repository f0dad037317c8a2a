//! A multi-call script dispatcher.
//!
//! Given a flat directory of scripts, this crate resolves a script by name and
//! invokes it the way an operating system would invoke a program: with an
//! argument vector whose first element names the program. Scripts written for
//! the embedded [Rhai](https://rhai.rs) runtime (shebang naming `rhai`) are
//! compiled and run inside the current process; everything else is spawned as
//! a child process with the script file as the executable image.
//!
//! The main entry point is [`ScriptRegistry`], which hands out cached
//! [`Unit`]s implementing [`Invokable`]. The public modules expose the
//! building blocks: [`classify`](mod@classify) for the marker-line check, [`argv`] for
//! argument normalization, [`external`] and [`loader`] for the two execution
//! models.

pub mod argv;
pub mod classify;
pub mod config;
pub mod env;
pub mod error;
pub mod external;
pub mod io_adapters;
pub mod loader;
mod once_map;
pub mod registry;
pub mod unit;

pub use argv::{NormalizedArgv, fix_argv};
pub use classify::{ScriptKind, classify};
pub use error::{DispatchError, Result};
pub use external::{ExternalLauncher, ProcessUnit};
pub use loader::{InProcessLoader, InProcessUnit};
pub use registry::{ScriptDescriptor, ScriptRegistry};
pub use unit::{ExitCode, Invokable, Unit};
