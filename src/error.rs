use std::io;
use std::path::PathBuf;

/// Errors surfaced by resolution, loading and invocation.
///
/// A non-zero exit status of an external script is not an error: it is
/// returned as a plain [`ExitCode`](crate::ExitCode).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("script not found: {name}")]
    NotFound { name: String },

    #[error("failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("{name} ({}) has no main(argv) entry point", path.display())]
    NoEntryPoint { name: String, path: PathBuf },

    #[error("{name}: {message}")]
    Script { name: String, message: String },

    #[error("failed to spawn {}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
