use crate::classify::{ScriptKind, classify, is_regular_file};
use crate::error::{DispatchError, Result};
use crate::external::ExternalLauncher;
use crate::loader::InProcessLoader;
use crate::once_map::OnceMap;
use crate::unit::Unit;
use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// A script found in the registry's root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDescriptor {
    /// File name, also the name the script is resolved by.
    pub name: String,
    pub path: PathBuf,
    pub kind: ScriptKind,
}

/// Resolves script names in a flat directory to cached [`Unit`]s.
///
/// Native-runtime scripts go through the [`InProcessLoader`]; everything else
/// is wrapped by the [`ExternalLauncher`]. Each name is materialized at most
/// once per registry, even with concurrent callers.
///
/// Example
/// ```no_run
/// use multicall::ScriptRegistry;
/// use std::ffi::OsString;
/// let registry = ScriptRegistry::new("/opt/scripts")?;
/// let unit = registry.resolve("hello")?;
/// let code = unit.invoke(&[OsString::from("hello"), OsString::from("world")])?;
/// println!("hello exited with {code}");
/// # Ok::<(), multicall::DispatchError>(())
/// ```
pub struct ScriptRegistry {
    root: PathBuf,
    loader: InProcessLoader,
    launcher: ExternalLauncher,
    cache: OnceMap<String, Unit>,
}

impl ScriptRegistry {
    /// Registry over `root` with a default loader and launcher.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_parts(root, InProcessLoader::default(), ExternalLauncher::default())
    }

    /// Registry over `root` using the given loader and launcher. `root` is
    /// made absolute against the current directory.
    pub fn with_parts(
        root: impl AsRef<Path>,
        loader: InProcessLoader,
        launcher: ExternalLauncher,
    ) -> Result<Self> {
        let root = root.as_ref();
        let root = std::path::absolute(root).map_err(|source| DispatchError::Io {
            path: root.to_owned(),
            source,
        })?;
        Ok(Self {
            root,
            loader,
            launcher,
            cache: OnceMap::default(),
        })
    }

    /// Absolute script directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every candidate script in the root, sorted by name.
    ///
    /// Candidates are direct children whose name has no `.` (which also
    /// excludes hidden files) and that are not directories.
    pub fn find_all(&self) -> Result<Vec<ScriptDescriptor>> {
        let entries = fs::read_dir(&self.root).map_err(|source| self.io_error(source))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| self.io_error(source))?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(name = %raw.to_string_lossy(), "skipping entry whose name is not valid UTF-8");
                    continue;
                }
            };
            if name.contains('.') || entry.path().is_dir() {
                continue;
            }
            names.push(name);
        }
        names.sort();

        let mut scripts = Vec::with_capacity(names.len());
        for name in names {
            let path = self.root.join(&name);
            match classify(&path) {
                Ok(kind) => scripts.push(ScriptDescriptor { name, path, kind }),
                Err(DispatchError::NotFound { .. }) => {
                    tracing::warn!(path = %path.display(), "skipping entry that is not a regular file");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(scripts)
    }

    /// Native-runtime scripts with no line starting with a `fn main(`
    /// declaration. Only used for auditing, never for dispatch.
    pub fn find_without_entry_point(&self) -> Result<Vec<ScriptDescriptor>> {
        let mut missing = Vec::new();
        for script in self.find_all()? {
            if script.kind != ScriptKind::NativeRuntime {
                continue;
            }
            let source = fs::read(&script.path).map_err(|source| DispatchError::Io {
                path: script.path.clone(),
                source,
            })?;
            if !declares_entry_point(&String::from_utf8_lossy(&source)) {
                missing.push(script);
            }
        }
        Ok(missing)
    }

    /// Resolve `name` to a unit, loading or wrapping it on first use.
    pub fn resolve(&self, name: &str) -> Result<Unit> {
        let path = self.script_path(name)?;
        self.cache.get_or_try_init(name.to_owned(), || -> Result<Unit> {
            let unit = match classify(&path)? {
                ScriptKind::NativeRuntime => self.loader.load(&path, None)? as Unit,
                ScriptKind::External => self.launcher.wrap(path.clone()) as Unit,
            };
            tracing::debug!(name, kind = %unit.kind(), cached = self.cache.len(), "resolved script");
            Ok(unit)
        })
    }

    /// Unit already resolved under `name`, without loading anything.
    pub fn cached(&self, name: &str) -> Option<Unit> {
        self.cache.get(&name.to_owned())
    }

    fn script_path(&self, name: &str) -> Result<PathBuf> {
        let not_found = || DispatchError::NotFound {
            name: name.to_owned(),
        };
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(not_found()),
        }
        let path = self.root.join(name);
        if is_regular_file(&path) {
            Ok(path)
        } else {
            Err(not_found())
        }
    }

    fn io_error(&self, source: std::io::Error) -> DispatchError {
        DispatchError::Io {
            path: self.root.clone(),
            source,
        }
    }
}

fn declares_entry_point(source: &str) -> bool {
    static ENTRY_DECL: OnceLock<Regex> = OnceLock::new();
    ENTRY_DECL
        .get_or_init(|| Regex::new(r"(?m)^fn\s+main\s*\(").expect("valid entry point regex"))
        .is_match(source)
}
