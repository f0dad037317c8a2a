//! Marker-line classification of scripts.

use crate::error::{DispatchError, Result};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Interpreter-directive prefix.
const MARKER: &[u8] = b"#!";

/// Substring identifying the embedded runtime on the marker line.
pub const NATIVE_RUNTIME: &str = "rhai";

/// Pre-1.0 interpreter series. Its scripts predate the `main(argv)`
/// convention and always run out of process.
pub const LEGACY_RUNTIME: &str = "rhai0";

/// Upper bound on how much of the file is read, matching the kernel's
/// interpreter line limit.
const MAX_MARKER_LEN: u64 = 256;

/// How a script is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Compiled and run inside the dispatcher by the embedded runtime.
    NativeRuntime,
    /// Spawned as a separate OS process.
    External,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScriptKind::NativeRuntime => "native",
            ScriptKind::External => "external",
        })
    }
}

/// Classify the script at `path` by its first line.
///
/// Only the first line (bounded by [`MAX_MARKER_LEN`] bytes) is read. The
/// content is treated as raw bytes, so binary files classify as
/// [`ScriptKind::External`] rather than failing.
pub fn classify(path: &Path) -> Result<ScriptKind> {
    if !is_regular_file(path) {
        return Err(DispatchError::NotFound {
            name: display_name(path),
        });
    }

    let line = read_first_line(path).map_err(|source| DispatchError::Io {
        path: path.to_owned(),
        source,
    })?;
    let kind = classify_line(&line);
    tracing::debug!(path = %path.display(), %kind, "classified script");
    Ok(kind)
}

/// Classify a marker line that has already been read.
pub fn classify_line(line: &[u8]) -> ScriptKind {
    if !line.starts_with(MARKER) {
        return ScriptKind::External;
    }
    let text = String::from_utf8_lossy(line);
    if text.contains(NATIVE_RUNTIME) && !text.contains(LEGACY_RUNTIME) {
        ScriptKind::NativeRuntime
    } else {
        ScriptKind::External
    }
}

pub(crate) fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

fn read_first_line(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file).take(MAX_MARKER_LEN);
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    Ok(line)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
