//! Statement-level redirection setup and teardown
//!
//! Before the first stage of a redirected statement runs, the target file
//! is opened and duplicated over the affected descriptors, with the
//! originals saved. The guard restores every saved descriptor exactly
//! once no matter which exit path the program takes.

use crate::ast::{Redirect, RedirectMode};
use crate::error::VshResult;
use nix::unistd;
use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, RawFd};

/// Saved-descriptor bookkeeping for one redirected statement.
pub(crate) struct RedirectGuard {
    saved: Vec<(RawFd, RawFd)>, // (original target fd, saved duplicate)
    restored: bool,
}

impl RedirectGuard {
    /// Open the target and splice it over the descriptors the mode names.
    pub(crate) fn apply(redirect: &Redirect) -> VshResult<Self> {
        let file = open_target(redirect)?;
        let mut guard = Self {
            saved: Vec::new(),
            restored: false,
        };

        for target_fd in target_fds(redirect.mode) {
            let saved = unistd::dup(target_fd)?;
            unistd::dup2(file.as_raw_fd(), target_fd)?;
            guard.saved.push((target_fd, saved));
        }
        // `file` drops here; the dup2'd descriptors keep the open file

        tracing::debug!(path = %redirect.target, mode = ?redirect.mode, "redirection applied");
        Ok(guard)
    }

    /// Put the saved descriptors back. Idempotent: the first call wins.
    pub(crate) fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        for (target_fd, saved) in self.saved.drain(..) {
            let _ = unistd::dup2(saved, target_fd);
            let _ = unistd::close(saved);
        }
    }
}

impl Drop for RedirectGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

fn open_target(redirect: &Redirect) -> VshResult<File> {
    let mut options = OpenOptions::new();
    match redirect.mode {
        RedirectMode::In | RedirectMode::InAppend => {
            options.read(true);
        }
        RedirectMode::Out | RedirectMode::Err | RedirectMode::Both => {
            options.write(true).create(true).truncate(true);
        }
        RedirectMode::OutAppend | RedirectMode::ErrAppend | RedirectMode::BothAppend => {
            options.write(true).create(true).append(true);
        }
    }
    Ok(options.open(&redirect.target)?)
}

/// Which inherited descriptors a redirection mode replaces.
fn target_fds(mode: RedirectMode) -> Vec<RawFd> {
    match mode {
        RedirectMode::In | RedirectMode::InAppend => vec![libc::STDIN_FILENO],
        RedirectMode::Out | RedirectMode::OutAppend => vec![libc::STDOUT_FILENO],
        RedirectMode::Err | RedirectMode::ErrAppend => vec![libc::STDERR_FILENO],
        RedirectMode::Both | RedirectMode::BothAppend => {
            vec![libc::STDOUT_FILENO, libc::STDERR_FILENO]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let redirect = Redirect {
            mode: RedirectMode::Out,
            target: path.to_string_lossy().into_owned(),
        };

        let mut guard = RedirectGuard::apply(&redirect).unwrap();
        guard.restore();
        guard.restore(); // second call must be a no-op
        drop(guard); // and the drop too
    }

    #[test]
    fn missing_input_target_is_an_error() {
        let redirect = Redirect {
            mode: RedirectMode::In,
            target: "/nonexistent/vsh-input".to_string(),
        };
        assert!(RedirectGuard::apply(&redirect).is_err());
    }
}
