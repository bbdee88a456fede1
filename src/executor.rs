//! Pipeline execution: pipes, forks, redirections, command dispatch and
//! status propagation.
//!
//! A lone builtin runs in the shell process with its redirections applied to
//! duplicated descriptors, so the shell's own stdio survives. Everything
//! else (external commands and every multi-stage pipeline) is forked, one
//! child per stage, with the children's fds 0 and 1 wired to the
//! neighbouring pipes before the per-stage redirections are applied.

use std::ffi::CString;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::process;

use anyhow::{anyhow, Context, Result};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sys::signal::Signal;
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup, dup2, execve, fork, pipe, write, ForkResult, Pid};

use crate::builtin::{self, BuiltinFn, ExitCode};
use crate::env::Environment;
use crate::expander::{ExpandedCommand, IoRedirect};
use crate::external::{self, Resolution};
use crate::signals::{self, SignalContext};

/// Execute an expanded pipeline and store its status in `env.last_status`.
///
/// Heredoc bodies must already be collected. An `Err` here means the
/// pipeline could not be set up at all (pipe or dup failure); per-command
/// failures are ordinary exit statuses.
pub fn execute_pipeline(commands: &[ExpandedCommand], env: &mut Environment) -> Result<()> {
    if commands.is_empty() {
        return Ok(());
    }

    if commands.len() == 1 {
        let command = &commands[0];
        if command.argv.is_empty() {
            env.last_status = run_in_parent(command, None, env)?;
            return Ok(());
        }
        if let Some(builtin) = builtin::lookup(&command.argv[0]) {
            env.last_status = run_in_parent(command, Some(builtin), env)?;
            return Ok(());
        }
    }

    env.last_status = run_forked(commands, env)?;
    Ok(())
}

/// Run a single stage in the shell process: a builtin, or nothing but the
/// side effects of its redirections when `builtin` is `None`.
fn run_in_parent(
    command: &ExpandedCommand,
    builtin: Option<BuiltinFn>,
    env: &mut Environment,
) -> Result<ExitCode> {
    let saved_stdin = dup(0).context("dup")?;
    let saved_stdout = dup(1).context("dup")?;

    let status = match apply_redirections(&command.redirects) {
        Ok(()) => match builtin {
            Some(builtin) => {
                let mut stdout = std::io::stdout();
                let status = match builtin(&command.argv[1..], &mut stdout, env) {
                    Ok(code) => code,
                    Err(err) => {
                        eprintln!("minishell: {}: {err}", command.argv[0]);
                        1
                    }
                };
                let _ = stdout.flush();
                status
            }
            None => 0,
        },
        Err(err) => {
            eprintln!("minishell: {err}");
            1
        }
    };

    let _ = dup2(saved_stdin, 0);
    let _ = dup2(saved_stdout, 1);
    let _ = close(saved_stdin);
    let _ = close(saved_stdout);
    Ok(status)
}

/// Fork one child per stage, wire the pipes, reap everything, and report
/// the status of the rightmost stage.
fn run_forked(commands: &[ExpandedCommand], env: &mut Environment) -> Result<ExitCode> {
    let mut pipes: Vec<(RawFd, RawFd)> = Vec::with_capacity(commands.len() - 1);
    for _ in 1..commands.len() {
        match pipe() {
            Ok(ends) => pipes.push(ends),
            Err(err) => {
                close_pipes(&pipes);
                return Err(anyhow!("pipe: {}", err.desc()));
            }
        }
    }

    // children take SIGINT with default disposition; the parent sits it out
    // and learns of the termination from waitpid
    signals::ignore_sigint();

    let mut pids: Vec<Pid> = Vec::with_capacity(commands.len());
    let mut fork_failed = false;
    for (index, command) in commands.iter().enumerate() {
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                signals::install(SignalContext::Child);
                run_stage(command, index, commands.len(), &pipes, env);
            }
            Ok(ForkResult::Parent { child }) => pids.push(child),
            Err(err) => {
                eprintln!("minishell: fork: {}", err.desc());
                fork_failed = true;
                break;
            }
        }
    }

    // unclosed parent ends would keep every reader blocked forever
    close_pipes(&pipes);

    let mut status = if fork_failed { 1 } else { 0 };
    for (index, pid) in pids.iter().enumerate() {
        let reaped = waitpid(*pid, None);
        if fork_failed || index + 1 != pids.len() {
            continue;
        }
        status = match reaped {
            Ok(WaitStatus::Exited(_, code)) => code,
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                if signal == Signal::SIGINT {
                    // resume the prompt on a fresh line
                    println!();
                }
                128 + signal as i32
            }
            _ => 1,
        };
    }

    signals::install(SignalContext::Interactive);
    Ok(status)
}

/// The child side of one pipeline stage. Never returns: every path ends in
/// `execve` or `exit`.
fn run_stage(
    command: &ExpandedCommand,
    index: usize,
    stages: usize,
    pipes: &[(RawFd, RawFd)],
    env: &Environment,
) -> ! {
    if index > 0 {
        let (read_end, _) = pipes[index - 1];
        if dup2(read_end, 0).is_err() {
            process::exit(1);
        }
    }
    if index + 1 < stages {
        let (_, write_end) = pipes[index];
        if dup2(write_end, 1).is_err() {
            process::exit(1);
        }
    }
    for (read_end, write_end) in pipes {
        let _ = close(*read_end);
        let _ = close(*write_end);
    }

    if let Err(err) = apply_redirections(&command.redirects) {
        eprintln!("minishell: {err}");
        process::exit(1);
    }

    if command.argv.is_empty() {
        process::exit(0);
    }

    if let Some(builtin) = builtin::lookup(&command.argv[0]) {
        // mutations die with this child, which is exactly what a builtin in
        // a pipeline stage is supposed to do
        let mut child_env = env.clone();
        let mut stdout = std::io::stdout();
        let status = match builtin(&command.argv[1..], &mut stdout, &mut child_env) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("minishell: {}: {err}", command.argv[0]);
                1
            }
        };
        let _ = stdout.flush();
        process::exit(child_env.pending_exit.unwrap_or(status));
    }

    exec_external(&command.argv, env)
}

/// Resolve and exec an external command. Only returns through `exit`.
fn exec_external(argv: &[String], env: &Environment) -> ! {
    let name = &argv[0];
    let path = match external::resolve(name, env) {
        Resolution::Found(path) => path,
        Resolution::NotExecutable(_) => {
            eprintln!("minishell: {name}: permission denied");
            process::exit(126);
        }
        Resolution::NotFound => {
            eprintln!("minishell: {name}: command not found");
            process::exit(127);
        }
    };

    let program = CString::new(path.as_os_str().as_bytes()).ok();
    let args: Option<Vec<CString>> = argv
        .iter()
        .map(|arg| CString::new(arg.as_bytes()).ok())
        .collect();
    let envp: Option<Vec<CString>> = env
        .exported_pairs()
        .into_iter()
        .map(|pair| CString::new(pair).ok())
        .collect();
    let (Some(program), Some(args), Some(envp)) = (program, args, envp) else {
        eprintln!("minishell: {name}: invalid argument");
        process::exit(1);
    };

    let err = match execve(&program, &args, &envp) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    eprintln!("minishell: {name}: {}", err.desc());
    process::exit(1);
}

/// Apply redirections in written order onto fds 0 and 1. Later ones win,
/// but every file is still opened (and created or truncated) on the way.
fn apply_redirections(redirects: &[IoRedirect]) -> Result<()> {
    for redirect in redirects {
        match redirect {
            IoRedirect::Input(path) => redirect_file(path, OFlag::O_RDONLY, 0)?,
            IoRedirect::Output(path) => redirect_file(
                path,
                OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
                1,
            )?,
            IoRedirect::Append(path) => redirect_file(
                path,
                OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND,
                1,
            )?,
            IoRedirect::Heredoc { body, .. } => feed_heredoc(body)?,
        }
    }
    Ok(())
}

fn redirect_file(path: &str, flags: OFlag, target_fd: RawFd) -> Result<()> {
    let fd = open(Path::new(path), flags, Mode::from_bits_truncate(0o644))
        .map_err(|err| anyhow!("{}: {}", path, err.desc()))?;
    let duplicated = dup2(fd, target_fd);
    let _ = close(fd);
    duplicated.map_err(|err| anyhow!("{}: {}", path, err.desc()))?;
    Ok(())
}

/// Stage a heredoc body on fd 0 through a pipe.
fn feed_heredoc(body: &str) -> Result<()> {
    let (read_end, write_end) = pipe().map_err(|err| anyhow!("pipe: {}", err.desc()))?;
    let written = write_all(write_end, body.as_bytes());
    let _ = close(write_end);
    if let Err(err) = written {
        let _ = close(read_end);
        return Err(anyhow!("heredoc: {}", err.desc()));
    }
    let duplicated = dup2(read_end, 0);
    let _ = close(read_end);
    duplicated.map_err(|err| anyhow!("heredoc: {}", err.desc()))?;
    Ok(())
}

fn write_all(fd: RawFd, mut bytes: &[u8]) -> nix::Result<()> {
    while !bytes.is_empty() {
        match write(fd, bytes) {
            Ok(0) => return Err(Errno::EIO),
            Ok(n) => bytes = &bytes[n..],
            Err(Errno::EINTR) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn close_pipes(pipes: &[(RawFd, RawFd)]) {
    for (read_end, write_end) in pipes {
        let _ = close(*read_end);
        let _ = close(*write_end);
    }
}
