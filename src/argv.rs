//! Argument vector normalization.
//!
//! Consumers of an argv (the executable-name slot of a child process, or a
//! script's own argument parsing) assume `argv[0]` names the program. Callers
//! often pass only flags, or a placeholder, so every invocation goes through
//! [`fix_argv`] first.

use std::ffi::{OsStr, OsString};
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// An argument vector with at least one element and a non-empty `argv[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedArgv(Vec<OsString>);

impl NormalizedArgv {
    /// The program slot, `argv[0]`.
    pub fn program(&self) -> &OsStr {
        &self.0[0]
    }

    /// Everything after `argv[0]`.
    pub fn args(&self) -> &[OsString] {
        &self.0[1..]
    }

    /// Take the normalized vector, `argv[0]` included.
    pub fn into_vec(self) -> Vec<OsString> {
        self.0
    }

    /// Lossy UTF-8 view, for runtimes that only deal in strings.
    pub fn to_string_lossy(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl Deref for NormalizedArgv {
    type Target = [OsString];

    fn deref(&self) -> &[OsString] {
        &self.0
    }
}

/// A value that can occupy an argv slot. `None` models an absent slot.
pub trait IntoArg {
    fn into_arg(self) -> Option<OsString>;
}

impl IntoArg for OsString {
    fn into_arg(self) -> Option<OsString> {
        Some(self)
    }
}

impl IntoArg for &OsString {
    fn into_arg(self) -> Option<OsString> {
        Some(self.clone())
    }
}

impl IntoArg for &OsStr {
    fn into_arg(self) -> Option<OsString> {
        Some(self.to_owned())
    }
}

impl IntoArg for String {
    fn into_arg(self) -> Option<OsString> {
        Some(self.into())
    }
}

impl IntoArg for &String {
    fn into_arg(self) -> Option<OsString> {
        Some(self.into())
    }
}

impl IntoArg for &str {
    fn into_arg(self) -> Option<OsString> {
        Some(self.into())
    }
}

impl IntoArg for PathBuf {
    fn into_arg(self) -> Option<OsString> {
        Some(self.into_os_string())
    }
}

impl IntoArg for &Path {
    fn into_arg(self) -> Option<OsString> {
        Some(self.as_os_str().to_owned())
    }
}

impl<T: IntoArg> IntoArg for Option<T> {
    fn into_arg(self) -> Option<OsString> {
        self.and_then(IntoArg::into_arg)
    }
}

/// Normalize `argv` so that `argv[0]` is never empty.
///
/// - an absent or empty `argv` becomes a single empty slot;
/// - elements are copied, the caller's sequence is left untouched;
/// - absent elements after position 0 become empty strings;
/// - an absent or empty `argv[0]` is replaced with `fallback`.
pub fn fix_argv<I>(argv: Option<I>, fallback: &Path) -> NormalizedArgv
where
    I: IntoIterator,
    I::Item: IntoArg,
{
    let mut slots: Vec<Option<OsString>> = argv
        .into_iter()
        .flatten()
        .map(IntoArg::into_arg)
        .collect();
    if slots.is_empty() {
        slots.push(None);
    }

    let mut out: Vec<OsString> = Vec::with_capacity(slots.len());
    let mut slots = slots.into_iter();
    let program = slots
        .next()
        .flatten()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| fallback.as_os_str().to_owned());
    out.push(program);
    out.extend(slots.map(Option::unwrap_or_default));
    NormalizedArgv(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: &str = "/opt/scripts/hello";

    fn fallback() -> &'static Path {
        Path::new(FALLBACK)
    }

    #[test]
    fn absent_argv_becomes_fallback() {
        let argv = fix_argv(None::<Vec<&str>>, fallback());
        assert_eq!(argv.into_vec(), vec![OsString::from(FALLBACK)]);
    }

    #[test]
    fn empty_argv_becomes_fallback() {
        let argv = fix_argv(Some(Vec::<String>::new()), fallback());
        assert_eq!(argv.len(), 1);
        assert_eq!(argv.program(), OsStr::new(FALLBACK));
        assert!(argv.args().is_empty());
    }

    #[test]
    fn non_empty_program_is_preserved() {
        let argv = fix_argv(Some(["x"]), fallback());
        assert_eq!(argv.into_vec(), vec![OsString::from("x")]);
    }

    #[test]
    fn empty_program_is_replaced_and_rest_kept() {
        let argv = fix_argv(Some(["", "a"]), fallback());
        assert_eq!(argv.program(), OsStr::new(FALLBACK));
        assert_eq!(argv.args(), &[OsString::from("a")]);
    }

    #[test]
    fn absent_program_is_replaced() {
        let argv = fix_argv(Some(vec![None, Some("a")]), fallback());
        assert_eq!(argv.to_string_lossy(), vec![FALLBACK, "a"]);
    }

    #[test]
    fn absent_trailing_slot_becomes_empty() {
        let argv = fix_argv(Some(vec![Some("p"), None, Some("b")]), fallback());
        assert_eq!(argv.to_string_lossy(), vec!["p", "", "b"]);
    }

    #[test]
    fn normalization_is_total() {
        let cases: Vec<Option<Vec<Option<&str>>>> = vec![
            None,
            Some(vec![]),
            Some(vec![Some("x")]),
            Some(vec![Some(""), Some("a")]),
            Some(vec![None, Some("a")]),
        ];
        for case in cases {
            let argv = fix_argv(case.clone(), fallback());
            assert!(!argv.is_empty(), "{case:?}");
            assert!(!argv.program().is_empty(), "{case:?}");
        }
    }

    #[test]
    fn caller_sequence_is_not_mutated() {
        let original = vec![String::new(), "--flag".to_string()];
        let argv = fix_argv(Some(&original), fallback());
        assert_eq!(argv.program(), OsStr::new(FALLBACK));
        assert_eq!(original, vec![String::new(), "--flag".to_string()]);
    }
}
