use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use multicall::config::{self, Config};
use multicall::{ExitCode, ScriptRegistry};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(FromArgs)]
/// Run a script from the dispatcher's script directory. Options must come
/// before the script name; everything after it is passed to the script.
struct Cli {
    #[argh(switch)]
    /// list native-runtime scripts that have no main(argv) entry point.
    no_main: bool,

    #[argh(option)]
    /// directory holding the scripts. Defaults to $MULTICALL_ROOT, then the
    /// directory of this executable.
    root: Option<PathBuf>,
}

/// Outcome of parsing the dispatcher's own flags.
enum Parsed {
    Run {
        cli: Cli,
        script: Option<(OsString, Vec<OsString>)>,
    },
    Exit(ExitCode),
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config::log_filter()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args_os();
    let prog = args
        .next()
        .map(|p| program_name(&p))
        .unwrap_or_else(|| "multicall".to_string());
    let args: Vec<OsString> = args.collect();

    let code = match run(&prog, &args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{prog}: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(prog: &str, args: &[OsString]) -> Result<ExitCode> {
    let (cli, script) = match parse(prog, args)? {
        Parsed::Run { cli, script } => (cli, script),
        Parsed::Exit(code) => return Ok(code),
    };

    if !cli.no_main && script.is_none() {
        eprintln!("Usage: {prog} [--root <dir>] [--no-main] script [args]");
        return Ok(2);
    }

    let config = Config::load(cli.root)?;
    tracing::debug!(root = %config.root.display(), "using script directory");
    let registry = ScriptRegistry::new(&config.root)?;

    let Some((name, rest)) = script.filter(|_| !cli.no_main) else {
        for script in registry.find_without_entry_point()? {
            println!("{}", script.name);
        }
        return Ok(0);
    };
    let name_str = name
        .to_str()
        .with_context(|| format!("script name is not valid UTF-8: {}", name.to_string_lossy()))?;

    let unit = registry.resolve(name_str)?;
    let mut argv = Vec::with_capacity(rest.len() + 1);
    argv.push(name);
    argv.extend(rest);
    Ok(unit.invoke(&argv)?)
}

/// Split `args` into the dispatcher's flags and the script invocation, then
/// parse the flags with argh.
fn parse(prog: &str, args: &[OsString]) -> Result<Parsed> {
    let split = split_at_script(args);
    let flags = args[..split]
        .iter()
        .map(|a| {
            a.to_str()
                .with_context(|| format!("invalid argument: {}", a.to_string_lossy()))
        })
        .collect::<Result<Vec<&str>>>()?;

    let cli = match Cli::from_args(&[prog], &flags) {
        Ok(cli) => cli,
        Err(EarlyExit { output, status }) => {
            return Ok(Parsed::Exit(match status {
                Ok(()) => {
                    println!("{output}");
                    0
                }
                Err(()) => {
                    eprintln!("{output}");
                    2
                }
            }));
        }
    };

    let script = args
        .get(split)
        .map(|name| (name.clone(), args[split + 1..].to_vec()));
    Ok(Parsed::Run { cli, script })
}

/// Index of the first argument that is not a dispatcher flag.
fn split_at_script(args: &[OsString]) -> usize {
    let mut i = 0;
    while let Some(arg) = args.get(i) {
        let arg = arg.to_string_lossy();
        if arg == "--root" {
            i += 2;
        } else if arg.starts_with('-') && arg != "-" {
            i += 1;
        } else {
            break;
        }
    }
    i.min(args.len())
}

fn program_name(arg0: &OsString) -> String {
    Path::new(arg0)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| arg0.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn split_stops_at_first_positional() {
        assert_eq!(split_at_script(&os(&["hello", "--flag"])), 0);
        assert_eq!(split_at_script(&os(&["--no-main"])), 1);
        assert_eq!(split_at_script(&os(&["--root", "/x", "hello", "-v"])), 2);
        assert_eq!(split_at_script(&os(&["--root"])), 1);
        assert_eq!(split_at_script(&os(&[])), 0);
    }

    #[test]
    fn script_args_are_forwarded_verbatim() {
        let args = os(&["--root", "/srv", "tool", "--root", "other", "-x"]);
        let Parsed::Run { cli, script } = parse("multicall", &args).unwrap() else {
            panic!("expected a run");
        };
        assert_eq!(cli.root, Some(PathBuf::from("/srv")));
        assert!(!cli.no_main);
        let (name, rest) = script.unwrap();
        assert_eq!(name, OsString::from("tool"));
        assert_eq!(rest, os(&["--root", "other", "-x"]));
    }

    #[test]
    fn unknown_flag_exits_with_usage_error() {
        let parsed = parse("multicall", &os(&["--bogus"])).unwrap();
        assert!(matches!(parsed, Parsed::Exit(2)));
    }

    #[test]
    fn no_script_name_yields_none() {
        let Parsed::Run { script, .. } = parse("multicall", &os(&["--no-main"])).unwrap() else {
            panic!("expected a run");
        };
        assert!(script.is_none());
    }

    #[test]
    fn program_name_is_basename() {
        assert_eq!(program_name(&OsString::from("/usr/local/bin/multicall")), "multicall");
    }
}
