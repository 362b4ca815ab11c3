//! Shell state and the one-line execution surface
//!
//! [`Shell`] ties the stages together: it owns the variable store, the
//! job table, and the builtin registry, and recovers from every failure
//! at the boundary of one input line; nothing below ever terminates the
//! hosting process.

use crate::error::VshResult;
use crate::exec::{self, ExitStatus};
use crate::expand::Env;
use crate::jobs::JobTable;
use crate::{lexer, parser};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::sync::Arc;

/// A registered builtin: receives the expanded argv, returns its status.
pub type BuiltinFn = Arc<dyn Fn(&[String], &mut Env) -> ExitStatus>;

pub struct Shell {
    pub env: Env,
    pub jobs: JobTable,
    pub last_status: ExitStatus,
    /// Pid of the currently running foreground child, if any.
    pub foreground: Option<Pid>,
    builtins: HashMap<String, BuiltinFn>,
}

impl Shell {
    pub fn new() -> Self {
        Self {
            env: Env::new(),
            jobs: JobTable::new(),
            last_status: ExitStatus::SUCCESS,
            foreground: None,
            builtins: HashMap::new(),
        }
    }

    /// Register a builtin command under `name`.
    pub fn register_builtin(
        &mut self,
        name: &str,
        handler: impl Fn(&[String], &mut Env) -> ExitStatus + 'static,
    ) {
        self.builtins.insert(name.to_string(), Arc::new(handler));
    }

    /// Dispatch to a registered builtin. `None` means "not a builtin,
    /// spawn a process".
    pub fn try_builtin(&mut self, argv: &[String]) -> Option<ExitStatus> {
        let handler = self.builtins.get(argv.first()?)?.clone();
        Some(handler(&argv[1..], &mut self.env))
    }

    /// Execute one interactive line.
    ///
    /// The lexer degrades silently (empty sequence means nothing to do);
    /// parse errors abort the line; execution failures surface only as
    /// the returned status.
    pub fn execute(&mut self, input: &str) -> VshResult<ExitStatus> {
        self.report_finished_jobs();

        let lexemes = lexer::lex(input);
        if lexemes.is_empty() {
            return Ok(ExitStatus::SUCCESS);
        }

        let prog = parser::parse(&lexemes, &mut self.env)?;
        let status = exec::run(&prog, self);
        self.last_status = status;
        Ok(status)
    }

    /// Execute a pre-split argv array (noninteractive mode).
    pub fn execute_args(&mut self, args: &[String]) -> VshResult<ExitStatus> {
        self.report_finished_jobs();

        let lexemes = lexer::lex_args(args);
        if lexemes.is_empty() {
            return Ok(ExitStatus::SUCCESS);
        }

        let prog = parser::parse(&lexemes, &mut self.env)?;
        let status = exec::run(&prog, self);
        self.last_status = status;
        Ok(status)
    }

    /// Forward a received signal to the current foreground child. The
    /// embedder owns handler installation; this is the delivery half.
    pub fn forward_signal(&self, signal: Signal) {
        if let Some(pid) = self.foreground {
            let _ = kill(pid, signal);
        }
    }

    fn report_finished_jobs(&mut self) {
        for job in self.jobs.reap() {
            eprintln!("[{}] Done    {}", job.id, job.command);
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}
