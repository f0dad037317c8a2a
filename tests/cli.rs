use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::{Mutex, MutexGuard};

// Scripts are written and exec'd by parallel tests; keep forks out of the
// window where a script is still open for writing.
fn lock_scripts() -> MutexGuard<'static, ()> {
    static MUTEX: Mutex<()> = Mutex::new(());
    MUTEX.lock().unwrap_or_else(|e| e.into_inner())
}

fn write_script(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    fs::write(&path, content).expect("write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }
}

fn fixture() -> tempfile::TempDir {
    let _lock = lock_scripts();
    let dir = tempfile::tempdir().unwrap();
    write_script(
        dir.path(),
        "greet",
        "#!/usr/bin/env rhai\nfn main(argv) { print(\"hello \" + argv[1]); 4 }\n",
    );
    write_script(dir.path(), "library", "#!/usr/bin/env rhai\nfn helper(x) { x }\n");
    write_script(dir.path(), "shell", "#!/bin/sh\necho \"shell $1\"\nexit 6\n");
    dir
}

fn multicall(root: &Path, args: &[&str]) -> Output {
    let _lock = lock_scripts();
    Command::new(env!("CARGO_BIN_EXE_multicall"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("MULTICALL_LOG")
        .output()
        .expect("run multicall")
}

#[test]
fn no_script_prints_usage_and_exits_2() {
    let dir = fixture();
    let out = multicall(dir.path(), &[]);
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage:"));
}

#[test]
fn no_main_lists_scripts_without_entry_point() {
    let dir = fixture();
    let out = multicall(dir.path(), &["--no-main"]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "library\n");
}

#[test]
fn native_script_status_becomes_exit_code() {
    let dir = fixture();
    let out = multicall(dir.path(), &["greet", "world"]);
    assert_eq!(out.status.code(), Some(4));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "hello world\n");
}

#[cfg(unix)]
#[test]
fn external_script_status_becomes_exit_code() {
    let dir = fixture();
    let out = multicall(dir.path(), &["shell", "--verbose"]);
    assert_eq!(out.status.code(), Some(6));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "shell --verbose\n");
}

#[test]
fn unknown_script_exits_non_zero_without_stdout() {
    let dir = fixture();
    let out = multicall(dir.path(), &["does-not-exist"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("script not found: does-not-exist"), "{stderr}");
    assert!(!stderr.contains("panicked"), "{stderr}");
}

#[test]
fn invoking_script_without_entry_point_fails() {
    let dir = fixture();
    let out = multicall(dir.path(), &["library"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no main(argv) entry point"));
}

#[cfg(unix)]
#[test]
fn spawn_failure_reports_os_error_once() {
    let dir = fixture();
    fs::write(dir.path().join("noexec"), "#!/bin/sh\nexit 0\n").unwrap();
    let out = multicall(dir.path(), &["noexec"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("failed to spawn"), "{stderr}");
    assert_eq!(stderr.matches("os error").count(), 1, "{stderr}");
}
