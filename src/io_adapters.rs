use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

/// How a file target is opened for a redirected stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Read the stream from the file (`<`).
    Input,
    /// Write the stream to the file, truncating it (`>`).
    Output,
    /// Write the stream to the file, appending (`>>`).
    Append,
}

/// Where a child's standard stream is connected.
#[derive(Debug, Clone, Default)]
pub enum Redirect {
    /// Share the dispatcher's stream.
    #[default]
    Inherit,
    /// Connect to the null device.
    Null,
    File { path: PathBuf, kind: RedirectKind },
}

impl Redirect {
    pub fn input(path: impl Into<PathBuf>) -> Self {
        Redirect::File {
            path: path.into(),
            kind: RedirectKind::Input,
        }
    }

    pub fn output(path: impl Into<PathBuf>) -> Self {
        Redirect::File {
            path: path.into(),
            kind: RedirectKind::Output,
        }
    }

    pub fn append(path: impl Into<PathBuf>) -> Self {
        Redirect::File {
            path: path.into(),
            kind: RedirectKind::Append,
        }
    }

    /// Open the target and convert it into a [`Stdio`] for `Command`.
    ///
    /// A fresh handle is produced on every call since a `Stdio` is consumed
    /// by the spawn it is passed to.
    pub fn to_stdio(&self) -> io::Result<Stdio> {
        Ok(match self {
            Redirect::Inherit => Stdio::inherit(),
            Redirect::Null => Stdio::null(),
            Redirect::File { path, kind } => {
                let file = match kind {
                    RedirectKind::Input => File::open(path)?,
                    RedirectKind::Output => File::create(path)?,
                    RedirectKind::Append => {
                        OpenOptions::new().create(true).append(true).open(path)?
                    }
                };
                Stdio::from(file)
            }
        })
    }
}

/// Destination for output produced by in-process scripts (`print` and
/// `debug` in the embedded runtime).
#[derive(Debug, Clone, Default)]
pub enum OutputSink {
    /// `print` goes to stdout, `debug` to stderr.
    #[default]
    Inherit,
    /// Everything is collected in memory.
    Buffer(SharedBuffer),
}

impl OutputSink {
    /// Create a buffered sink and return it with a handle to its contents.
    pub fn buffer() -> (Self, SharedBuffer) {
        let buf = SharedBuffer::default();
        (OutputSink::Buffer(buf.clone()), buf)
    }

    pub(crate) fn print(&self, line: &str) {
        match self {
            OutputSink::Inherit => println!("{line}"),
            OutputSink::Buffer(buf) => buf.push_line(line),
        }
    }

    pub(crate) fn debug(&self, line: &str) {
        match self {
            OutputSink::Inherit => eprintln!("{line}"),
            OutputSink::Buffer(buf) => buf.push_line(line),
        }
    }
}

/// Memory-backed writer shared between the runtime and whoever reads the
/// output back.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    fn push_line(&self, line: &str) {
        let mut buf = self.lock();
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.buf.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
