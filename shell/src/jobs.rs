//! Background job tracking
//!
//! Background pipelines are recorded as `{job-number, pid}` and their
//! completion is observed opportunistically: a non-blocking `waitpid`
//! sweep runs at the start of every top-level command.

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

#[derive(Debug)]
pub struct Job {
    pub id: usize,
    pub pid: Pid,
    pub command: String,
}

#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: usize,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, pid: Pid, command: String) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(job = id, %pid, "background job started");
        self.jobs.push(Job { id, pid, command });
        id
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Non-blocking sweep for exited children. Returns the finished jobs
    /// so the caller can report them.
    pub fn reap(&mut self) -> Vec<Job> {
        let mut finished = Vec::new();
        if self.jobs.is_empty() {
            return finished;
        }

        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => break,
                Ok(WaitStatus::Exited(pid, _)) | Ok(WaitStatus::Signaled(pid, _, _)) => {
                    if let Some(pos) = self.jobs.iter().position(|j| j.pid == pid) {
                        finished.push(self.jobs.remove(pos));
                    }
                }
                Ok(_) => continue,
                Err(Errno::ECHILD) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "job reap failed");
                    break;
                }
            }
        }
        finished
    }
}
