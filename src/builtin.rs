//! Built-in commands, executed by the shell itself rather than by forking
//! an external program.

use std::fs;
use std::io::Write;
use std::mem;
use std::path::PathBuf;

use anyhow::Result;

use crate::env::{self, Environment};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// The shape every builtin shares: arguments (without the command name), a
/// writer standing in for stdout, and the environment to read or mutate.
/// Diagnostics go to stderr directly; the returned code follows shell
/// conventions.
pub type BuiltinFn = fn(&[String], &mut dyn Write, &mut Environment) -> Result<ExitCode>;

/// Look a builtin up by its exact, case-sensitive name.
pub fn lookup(name: &str) -> Option<BuiltinFn> {
    match name {
        "cd" => Some(cd),
        "echo" => Some(echo),
        "env" => Some(env_builtin),
        "exit" => Some(exit),
        "export" => Some(export),
        "pwd" => Some(pwd),
        "unset" => Some(unset),
        _ => None,
    }
}

/// Change the current working directory.
///
/// With no argument or `~` the target is `$HOME`; `-` goes back to
/// `$OLDPWD` and echoes the new directory. On success both `OLDPWD` and
/// `PWD` are updated and the process itself is moved, so children inherit
/// the new directory.
fn cd(args: &[String], out: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
    if args.len() > 1 {
        eprintln!("minishell: cd: too many arguments");
        return Ok(1);
    }

    let mut echo_target = false;
    let target = match args.first().map(String::as_str) {
        None | Some("~") => match env.get_var("HOME") {
            Some(home) => PathBuf::from(home),
            None => {
                eprintln!("minishell: cd: HOME not set");
                return Ok(1);
            }
        },
        Some("-") => match env.get_var("OLDPWD") {
            Some(oldpwd) => {
                echo_target = true;
                PathBuf::from(oldpwd)
            }
            None => {
                eprintln!("minishell: cd: OLDPWD not set");
                return Ok(1);
            }
        },
        Some(path) => PathBuf::from(path),
    };

    let new_dir = if target.is_absolute() {
        target
    } else {
        env.current_dir.join(target)
    };

    let canonical = match fs::canonicalize(&new_dir) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("minishell: cd: {}: {}", new_dir.display(), os_error(&err));
            return Ok(1);
        }
    };
    if let Err(err) = std::env::set_current_dir(&canonical) {
        eprintln!("minishell: cd: {}: {}", canonical.display(), os_error(&err));
        return Ok(1);
    }

    let previous = mem::replace(&mut env.current_dir, canonical.clone());
    env.set_var("OLDPWD", previous.to_string_lossy());
    env.set_var("PWD", canonical.to_string_lossy());

    if echo_target {
        writeln!(out, "{}", canonical.display())?;
    }
    Ok(0)
}

/// Write the arguments to standard output, separated by spaces.
///
/// A leading run of `-n` flags (strictly `-` followed by one or more `n`s,
/// so `-n`, `-nn`, `-n -nnn` all count) suppresses the trailing newline.
fn echo(args: &[String], out: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
    let mut newline = true;
    let mut rest = args;
    while let Some(first) = rest.first() {
        if is_n_flag(first) {
            newline = false;
            rest = &rest[1..];
        } else {
            break;
        }
    }

    let joined = rest.join(" ");
    if newline {
        writeln!(out, "{joined}")?;
    } else {
        write!(out, "{joined}")?;
    }
    Ok(0)
}

fn is_n_flag(arg: &str) -> bool {
    let mut chars = arg.chars();
    chars.next() == Some('-') && {
        let rest = chars.as_str();
        !rest.is_empty() && rest.chars().all(|c| c == 'n')
    }
}

/// Print every exported variable as `NAME=VALUE`, one per line.
fn env_builtin(_args: &[String], out: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
    let mut pairs = env.exported_pairs();
    pairs.sort();
    for pair in pairs {
        writeln!(out, "{pair}")?;
    }
    Ok(0)
}

/// Leave the shell, with the given status or `$?`.
///
/// The request is recorded in the environment rather than exiting here, so
/// the REPL and any open descriptors unwind normally. In a pipeline stage
/// the surrounding fork turns the request into that child's exit status.
fn exit(args: &[String], _out: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
    let Some(first) = args.first() else {
        env.pending_exit = Some(env.last_status);
        return Ok(env.last_status);
    };

    // the numeric check comes before the arity check, as in other shells:
    // `exit foo bar` still exits with 255
    let Some(code) = parse_exit_code(first) else {
        eprintln!("minishell: exit: {first}: numeric argument required");
        env.pending_exit = Some(255);
        return Ok(255);
    };
    if args.len() > 1 {
        eprintln!("minishell: exit: too many arguments");
        return Ok(1);
    }
    env.pending_exit = Some(code);
    Ok(code)
}

/// Exit statuses live in [0,255]; out-of-range arguments wrap, so `exit
/// 258` exits with 2 and `exit -1` with 255.
fn parse_exit_code(arg: &str) -> Option<i32> {
    arg.trim().parse::<i64>().ok().map(|n| n.rem_euclid(256) as i32)
}

/// Mark variables for export, assigning values where given; with no
/// arguments, list every variable in `declare -x` form.
fn export(args: &[String], out: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
    if args.is_empty() {
        let mut names: Vec<&String> = env.vars.keys().collect();
        names.sort();
        for name in names {
            writeln!(out, "declare -x {}=\"{}\"", name, env.vars[name].value)?;
        }
        return Ok(0);
    }

    let mut status = 0;
    for arg in args {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (arg.as_str(), None),
        };
        if !env::is_valid_name(name) {
            eprintln!("minishell: export: `{arg}': not a valid identifier");
            status = 1;
            continue;
        }
        env.export_var(name, value);
    }
    Ok(status)
}

/// Print the current working directory.
fn pwd(_args: &[String], out: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
    writeln!(out, "{}", env.current_dir.display())?;
    Ok(0)
}

/// Remove variables from the environment.
fn unset(args: &[String], _out: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
    let mut status = 0;
    for arg in args {
        if env::is_valid_name(arg) {
            env.unset_var(arg);
        } else {
            eprintln!("minishell: unset: `{arg}': not a valid identifier");
            status = 1;
        }
    }
    Ok(status)
}

fn os_error(err: &std::io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => nix::errno::Errno::from_i32(code).desc().to_string(),
        None => err.to_string(),
    }
}
