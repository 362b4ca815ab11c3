//! Process spawning and pipe plumbing
//!
//! One pipeline stage is one forked child. Pipes alternate through a
//! single carried read end: a stage that feeds the next one creates its
//! outbound pipe before forking, the parent closes the write end right
//! after the fork and carries the read end to the following stage, so no
//! array of N pipes is ever needed. Stdio wiring in the child happens
//! strictly before `execvp`.

#![allow(unsafe_code)]

use crate::exec::ExitStatus;
use crate::shell::Shell;
use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, fork, ForkResult, Pid};
use std::ffi::CString;
use std::io;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};

/// Pipe bookkeeping scoped to one pipeline's lifetime.
#[derive(Default)]
pub(crate) struct PipeState {
    /// Read end produced by the previous stage, feeding this stage's
    /// stdin.
    carry: Option<OwnedFd>,
}

/// Fork and exec one pipeline stage, wiring its stdio to the surrounding
/// pipes. Foreground stages are waited for (terminal handed over and
/// reclaimed); background stages are recorded in the job table and
/// return immediately.
pub(crate) fn run_stage(
    argv: &[String],
    pipes: &mut PipeState,
    pipe_in: bool,
    pipe_out: bool,
    background: bool,
    shell: &mut Shell,
) -> ExitStatus {
    let cargs: Vec<CString> = match argv
        .iter()
        .map(|a| CString::new(a.as_str()))
        .collect::<Result<_, _>>()
    {
        Ok(v) => v,
        Err(_) => {
            eprintln!("vsh: argument contains an interior NUL byte");
            return ExitStatus::FAILURE;
        }
    };

    let inbound: Option<OwnedFd> = if pipe_in { pipes.carry.take() } else { None };
    let outbound: Option<(OwnedFd, OwnedFd)> = if pipe_out {
        match unistd::pipe() {
            Ok(pair) => Some(pair),
            Err(e) => {
                eprintln!("vsh: pipe: {e}");
                return ExitStatus::FAILURE;
            }
        }
    } else {
        None
    };

    tracing::debug!(cmd = %argv[0], pipe_in, pipe_out, background, "spawning stage");

    // fork() is async-signal-safety territory; the child only calls
    // dup2/setpgid/execvp before replacing itself
    match unsafe { fork() } {
        Ok(ForkResult::Child) => child_exec(&cargs, inbound, outbound),
        Ok(ForkResult::Parent { child }) => {
            // mirror the child's setpgid to close the race
            let _ = unistd::setpgid(child, child);

            // the parent is done with this stage's pipe ends
            drop(inbound);
            if let Some((read, write)) = outbound {
                drop(write);
                pipes.carry = Some(read);
            }

            if background {
                let id = shell.jobs.add(child, argv.join(" "));
                eprintln!("[{id}] {child}");
                return ExitStatus::SUCCESS;
            }

            let _ = unistd::tcsetpgrp(io::stdin().as_fd(), child);
            shell.foreground = Some(child);
            let status = wait_for(child);
            shell.foreground = None;
            let _ = unistd::tcsetpgrp(io::stdin().as_fd(), unistd::getpgrp());
            status
        }
        Err(e) => {
            eprintln!("vsh: fork: {e}");
            ExitStatus::FAILURE
        }
    }
}

/// Block until the foreground child changes state, retrying transparently
/// on `EINTR`. Any other wait failure is reported and mapped to failure.
fn wait_for(child: Pid) -> ExitStatus {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => return ExitStatus::from_raw(code),
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                return ExitStatus::from_raw(128 + sig as i32)
            }
            Ok(WaitStatus::Stopped(_, sig)) => return ExitStatus::from_raw(128 + sig as i32),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => {
                eprintln!("vsh: waitpid: {e}");
                return ExitStatus::FAILURE;
            }
        }
    }
}

/// Child-side setup: default signal dispositions, own process group,
/// pipe wiring, then `execvp`. Never returns.
fn child_exec(
    cargs: &[CString],
    inbound: Option<OwnedFd>,
    outbound: Option<(OwnedFd, OwnedFd)>,
) -> ! {
    for sig in [
        Signal::SIGINT,
        Signal::SIGQUIT,
        Signal::SIGTERM,
        Signal::SIGTSTP,
    ] {
        let _ = unsafe { signal::signal(sig, SigHandler::SigDfl) };
    }
    let _ = unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0));

    if let Some(read) = &inbound {
        let _ = unistd::dup2(read.as_raw_fd(), libc::STDIN_FILENO);
    }
    if let Some((_, write)) = &outbound {
        let _ = unistd::dup2(write.as_raw_fd(), libc::STDOUT_FILENO);
    }
    drop(inbound);
    drop(outbound);

    if let Err(e) = unistd::execvp(&cargs[0], cargs) {
        // stderr still points at the terminal (or the redirect target)
        eprintln!("vsh: {}: {e}", cargs[0].to_string_lossy());
    }
    unsafe { libc::_exit(127) }
}
