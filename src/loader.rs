//! In-process loading of native-runtime scripts.
//!
//! A script is compiled by the embedded Rhai engine and its top-level
//! statements run once in a fresh [`Scope`]. The resulting
//! [`InProcessUnit`] keeps the compiled [`AST`] and that scope alive for the
//! life of the loader, and calls the script's `main(argv)` function on every
//! invoke.

use crate::argv::fix_argv;
use crate::classify::ScriptKind;
use crate::error::{DispatchError, Result};
use crate::io_adapters::OutputSink;
use crate::once_map::OnceMap;
use crate::unit::{ExitCode, Invokable};
use rhai::{AST, Array, CallFnOptions, Dynamic, Engine, Scope};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Name of the designated entry point.
pub const ENTRY_POINT: &str = "main";

/// Constant holding the script's absolute path, visible to top-level code.
pub const SCRIPT_PATH_CONST: &str = "SCRIPT_PATH";

/// Constant holding the unit name, visible to top-level code.
pub const SCRIPT_NAME_CONST: &str = "SCRIPT_NAME";

/// Loads native-runtime scripts and keeps every loaded unit by absolute path.
pub struct InProcessLoader {
    engine: Arc<Engine>,
    units: OnceMap<PathBuf, Arc<InProcessUnit>>,
}

impl Default for InProcessLoader {
    fn default() -> Self {
        Self::new(OutputSink::default())
    }
}

impl InProcessLoader {
    /// Create a loader whose scripts write `print`/`debug` output to `sink`.
    pub fn new(sink: OutputSink) -> Self {
        let mut engine = Engine::new();
        let print_sink = sink.clone();
        engine.on_print(move |text| print_sink.print(text));
        engine.on_debug(move |text, source, pos| match source {
            Some(source) => sink.debug(&format!("{source} @ {pos:?} | {text}")),
            None => sink.debug(&format!("{pos:?} | {text}")),
        });
        Self {
            engine: Arc::new(engine),
            units: OnceMap::default(),
        }
    }

    /// Load the script at `path`, registering it as `name` (or a name
    /// derived from the file name).
    ///
    /// If the file was already loaded the existing unit is returned as is,
    /// under the name it was first registered with; the source is not read
    /// or executed again. Distinct files never share a unit, even when their
    /// derived names are equal.
    pub fn load(&self, path: &Path, name: Option<&str>) -> Result<Arc<InProcessUnit>> {
        let path = absolute_path(path)?;
        let name = match name {
            Some(name) => name.to_owned(),
            None => unit_name(&path),
        };
        self.units
            .get_or_try_init(path.clone(), || self.materialize(name, path))
    }

    /// Unit previously loaded from `path`, if any.
    pub fn loaded(&self, path: &Path) -> Option<Arc<InProcessUnit>> {
        self.units.get(&absolute_path(path).ok()?)
    }

    fn materialize(&self, name: String, path: PathBuf) -> Result<Arc<InProcessUnit>> {
        let load_error = |message: String| DispatchError::Load {
            path: path.clone(),
            message,
        };

        let bytes = fs::read(&path).map_err(|e| load_error(e.to_string()))?;
        let source = String::from_utf8(bytes)
            .map_err(|e| load_error(format!("source is not valid UTF-8: {e}")))?;
        let mut ast = self
            .engine
            .compile(strip_shebang(&source))
            .map_err(|e| load_error(e.to_string()))?;
        ast.set_source(path.to_string_lossy().into_owned());

        let mut scope = Scope::new();
        scope.push_constant(SCRIPT_PATH_CONST, path.to_string_lossy().into_owned());
        scope.push_constant(SCRIPT_NAME_CONST, name.clone());
        self.engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| load_error(e.to_string()))?;

        let entry = ast
            .iter_functions()
            .any(|f| f.name == ENTRY_POINT && f.params.len() == 1)
            .then(|| ENTRY_POINT.to_owned());
        if entry.is_none() {
            tracing::info!(%name, path = %path.display(), "script loaded without an entry point");
        } else {
            tracing::debug!(%name, path = %path.display(), "script loaded");
        }

        Ok(Arc::new(InProcessUnit {
            name,
            path,
            engine: Arc::clone(&self.engine),
            ast,
            scope: Mutex::new(scope),
            entry,
        }))
    }
}

/// A native-runtime script loaded into this process.
pub struct InProcessUnit {
    name: String,
    path: PathBuf,
    engine: Arc<Engine>,
    ast: AST,
    scope: Mutex<Scope<'static>>,
    entry: Option<String>,
}

impl InProcessUnit {
    /// Whether the script defines a one-argument `main`.
    pub fn has_entry_point(&self) -> bool {
        self.entry.is_some()
    }

    /// Read a top-level variable or constant left by the script's load.
    pub fn global(&self, name: &str) -> Option<Dynamic> {
        let scope = self.scope.lock().unwrap_or_else(|e| e.into_inner());
        scope.get_value::<Dynamic>(name)
    }
}

impl std::fmt::Debug for InProcessUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessUnit")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl Invokable for InProcessUnit {
    fn invoke(&self, argv: &[OsString]) -> Result<ExitCode> {
        let Some(entry) = &self.entry else {
            return Err(DispatchError::NoEntryPoint {
                name: self.name.clone(),
                path: self.path.clone(),
            });
        };

        let argv: Array = fix_argv(Some(argv), &self.path)
            .to_string_lossy()
            .into_iter()
            .map(Dynamic::from)
            .collect();

        let mut scope = self.scope.lock().unwrap_or_else(|e| e.into_inner());
        let options = CallFnOptions::new().eval_ast(false);
        let result = self
            .engine
            .call_fn_with_options::<Dynamic>(options, &mut *scope, &self.ast, entry, (argv,))
            .map_err(|e| DispatchError::Script {
                name: self.name.clone(),
                message: e.to_string(),
            })?;
        Ok(exit_code(&result))
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> ScriptKind {
        ScriptKind::NativeRuntime
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Derive a unit name from the file name: anything that is not an ASCII
/// alphanumeric or `_` becomes `_`, and a leading digit gets a `_` prefix.
pub fn unit_name(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| DispatchError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Integer results are exit codes; anything else means success.
fn exit_code(result: &Dynamic) -> ExitCode {
    match result.as_int() {
        Ok(code) => code.clamp(ExitCode::MIN.into(), ExitCode::MAX.into()) as ExitCode,
        Err(_) => 0,
    }
}

/// Blank out a leading `#!` line, keeping its newline so positions in error
/// messages still match the file.
fn strip_shebang(source: &str) -> &str {
    if !source.starts_with("#!") {
        return source;
    }
    match source.find('\n') {
        Some(n) => &source[n..],
        None => "",
    }
}
