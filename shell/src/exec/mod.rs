//! Execution engine for vsh
//!
//! A tree-walking, status-driven state machine: after every stage exits,
//! [`Vm::advance`] decides which chain node runs next. Traversal splits
//! into two rule sets selected by the program shape: plain chain walking
//! with AND/OR short-circuiting for `NORMAL` lines, and statement-kind
//! dispatch with conditions short-circuiting and loop jumps for control
//! flow. The driver in [`run`] owns the side effects: in-process math and
//! comparison evaluation, builtin dispatch, process spawning, pipe wiring,
//! and redirection setup/teardown.

mod compare;
mod process;
mod redirect;

use crate::arith;
use crate::ast::{ChainNode, Program, ProgramShape, StatementKind, StmtId};
use crate::error::VshResult;
use crate::expand::Expander;
use crate::lexer::Opcode;
use crate::shell::Shell;

pub(crate) use redirect::RedirectGuard;

/// Exit status of one stage or one whole program.
///
/// Negative values are shell-internal sentinels; real child statuses are
/// always non-negative. [`ExitStatus::BENIGN`] marks a benign failure that
/// must not terminate the interactive shell, the outcome of a failed
/// condition or short-circuited chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(i32);

impl ExitStatus {
    pub const SUCCESS: Self = Self(0);
    pub const FAILURE: Self = Self(1);
    pub const BENIGN: Self = Self(-1);

    pub fn from_raw(code: i32) -> Self {
        Self(code)
    }

    /// The status as presented to the user (`$?`-style): sentinels map to
    /// a plain failure code.
    pub fn code(self) -> i32 {
        if self.0 < 0 {
            1
        } else {
            self.0
        }
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    pub fn is_benign(self) -> bool {
        self.0 == Self::BENIGN.0
    }
}

/// Engine state, keyed by where in the statement tree execution stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Normal,
    InConditions,
    InIfStatements,
    InElifStatements,
    InElseStatements,
    InLoopConditions,
    InLoopStatements,
}

/// Position of the next chain node to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef {
    pub stmt: StmtId,
    pub node: usize,
}

/// The traversal cursor over one program. Pure: all side effects live in
/// the driver, which feeds observed statuses back through [`Vm::observe`].
pub struct Vm<'p> {
    prog: &'p Program,
    cur: StmtId,
    node_idx: usize,
    state: VmState,
    last_status: ExitStatus,
    started: bool,
    done: bool,
    cond_failed_exit: bool,
}

impl<'p> Vm<'p> {
    pub fn new(prog: &'p Program) -> Self {
        Self {
            prog,
            cur: prog.head,
            node_idx: 0,
            state: VmState::Normal,
            last_status: ExitStatus::SUCCESS,
            started: false,
            done: false,
            cond_failed_exit: false,
        }
    }

    /// Report the status of the node most recently returned by `advance`.
    pub fn observe(&mut self, status: ExitStatus) {
        self.last_status = status;
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    /// Status of the whole program once `advance` has returned `None`:
    /// the benign sentinel if execution ended on a failed condition,
    /// otherwise the last observed status.
    pub fn final_status(&self) -> ExitStatus {
        if self.cond_failed_exit {
            ExitStatus::BENIGN
        } else {
            self.last_status
        }
    }

    /// Produce the next pipeline stage to execute, or `None` when the
    /// program is exhausted.
    pub fn advance(&mut self) -> Option<NodeRef> {
        if self.done || self.prog.is_empty() {
            self.done = true;
            return None;
        }

        if !self.started {
            self.started = true;
            self.cur = self.prog.head;
            self.state = match self.prog.shape {
                ProgramShape::Normal => VmState::Normal,
                ProgramShape::While | ProgramShape::For => VmState::InLoopConditions,
                _ => VmState::InConditions,
            };
            return self.enter_statement(self.cur);
        }

        match self.prog.shape {
            ProgramShape::Normal => self.advance_normal(),
            _ => self.advance_control(),
        }
    }

    fn emit(&mut self, idx: usize) -> Option<NodeRef> {
        self.node_idx = idx;
        Some(NodeRef {
            stmt: self.cur,
            node: idx,
        })
    }

    fn finish(&mut self) -> Option<NodeRef> {
        self.done = true;
        None
    }

    /// Start a statement at its first node, skipping over empty chains
    /// (assignment-only statements) in the normal shape.
    fn enter_statement(&mut self, id: StmtId) -> Option<NodeRef> {
        self.cur = id;
        if self.prog.stmt(id).chain.is_empty() {
            if self.prog.shape == ProgramShape::Normal {
                return self.move_right();
            }
            return self.finish();
        }
        if self.prog.stmt(id).chain.nodes[0].is_jump() {
            return self.follow_jump();
        }
        self.emit(0)
    }

    // ---- normal shape -----------------------------------------------------

    fn advance_normal(&mut self) -> Option<NodeRef> {
        let stmt = self.prog.stmt(self.cur);
        let next = self.node_idx + 1;
        if let Some(node) = stmt.chain.node(next) {
            match node.prev_op {
                // a decided guard skips the node and ends the chain walk
                crate::ast::ChainOp::And if !self.last_status.is_success() => self.move_right(),
                crate::ast::ChainOp::Or if self.last_status.is_success() => self.move_right(),
                _ => self.emit(next),
            }
        } else {
            self.move_right()
        }
    }

    fn move_right(&mut self) -> Option<NodeRef> {
        let mut cur = self.cur;
        loop {
            match self.prog.stmt(cur).right {
                Some(r) => {
                    if self.prog.stmt(r).chain.is_empty() {
                        cur = r;
                        self.cur = r;
                        continue;
                    }
                    self.cur = r;
                    return self.emit(0);
                }
                None => return self.finish(),
            }
        }
    }

    // ---- control-flow shapes ----------------------------------------------

    fn advance_control(&mut self) -> Option<NodeRef> {
        let kind = self.prog.stmt(self.cur).kind;
        match kind {
            k if k.is_conditions() => self.advance_conditions(),
            StatementKind::ForInit | StatementKind::ForIncrement => self.leave_loop_plumbing(),
            _ => self.advance_body(),
        }
    }

    /// While inside a conditions chain, combine the observed status with
    /// the next node's joining operator to decide where to go.
    fn advance_conditions(&mut self) -> Option<NodeRef> {
        let stmt = self.prog.stmt(self.cur);
        let next = self.node_idx + 1;
        if let Some(node) = stmt.chain.node(next) {
            match node.prev_op {
                crate::ast::ChainOp::And => {
                    if self.last_status.is_success() {
                        self.emit(next)
                    } else {
                        self.conditions_failed()
                    }
                }
                crate::ast::ChainOp::Or => {
                    if !self.last_status.is_success() || or_keeps_evaluating(node) {
                        // a true/constant head under OR keeps evaluating
                        // instead of short-circuiting into the body
                        self.emit(next)
                    } else {
                        self.enter_body()
                    }
                }
                _ => self.emit(next),
            }
        } else if self.last_status.is_success() {
            self.enter_body()
        } else {
            self.conditions_failed()
        }
    }

    /// The conditions chain decided failure: chase the alternate branch,
    /// or end the program (loop exit, or `if` without `else`).
    fn conditions_failed(&mut self) -> Option<NodeRef> {
        let stmt = self.prog.stmt(self.cur);
        match stmt.kind {
            StatementKind::IfConditions | StatementKind::ElifConditions => match stmt.left {
                Some(alt) => match self.prog.stmt(alt).kind {
                    StatementKind::ElifConditions => {
                        self.cur = alt;
                        self.state = VmState::InConditions;
                        self.emit(0)
                    }
                    StatementKind::Else => {
                        self.cur = alt;
                        self.state = VmState::InElseStatements;
                        self.emit(0)
                    }
                    _ => self.finish(),
                },
                None => {
                    self.cond_failed_exit = true;
                    self.finish()
                }
            },
            _ => {
                // loop conditions: the loop is over
                self.cond_failed_exit = true;
                self.finish()
            }
        }
    }

    /// Conditions decided success: fall into the owned body via `right`.
    fn enter_body(&mut self) -> Option<NodeRef> {
        let stmt = self.prog.stmt(self.cur);
        match stmt.right {
            Some(body) => {
                self.state = match self.prog.stmt(body).kind {
                    StatementKind::If => VmState::InIfStatements,
                    StatementKind::Elif => VmState::InElifStatements,
                    StatementKind::Else => VmState::InElseStatements,
                    StatementKind::While | StatementKind::For => VmState::InLoopStatements,
                    _ => self.state,
                };
                self.enter_statement(body)
            }
            None => self.finish(),
        }
    }

    fn advance_body(&mut self) -> Option<NodeRef> {
        let stmt = self.prog.stmt(self.cur);
        let next = self.node_idx + 1;
        if let Some(node) = stmt.chain.node(next) {
            if node.is_jump() {
                return self.follow_jump();
            }
            match node.prev_op {
                crate::ast::ChainOp::And if !self.last_status.is_success() => {
                    self.body_guard_stop()
                }
                crate::ast::ChainOp::Or if self.last_status.is_success() => self.body_guard_stop(),
                _ => self.emit(next),
            }
        } else {
            // bodies do not fall through to siblings
            self.finish()
        }
    }

    /// A decided AND/OR guard inside a body ends the chain walk. Loop
    /// bodies still have to re-enter their conditions; branch bodies end
    /// the program.
    fn body_guard_stop(&mut self) -> Option<NodeRef> {
        let kind = self.prog.stmt(self.cur).kind;
        if kind.is_loop() {
            self.follow_jump()
        } else {
            self.finish()
        }
    }

    /// The jump pseudo-command: re-enter the loop via the body's `right`
    /// link (the conditions node, or the increment for C-style `for`).
    fn follow_jump(&mut self) -> Option<NodeRef> {
        let stmt = self.prog.stmt(self.cur);
        match stmt.right {
            Some(r) => {
                self.state = match self.prog.stmt(r).kind {
                    StatementKind::ForIncrement => VmState::InLoopStatements,
                    _ => VmState::InLoopConditions,
                };
                self.cur = r;
                self.emit(0)
            }
            None => self.finish(),
        }
    }

    /// `ForInit`/`ForIncrement` exhausted: their `right` is always the
    /// loop conditions node.
    fn leave_loop_plumbing(&mut self) -> Option<NodeRef> {
        let stmt = self.prog.stmt(self.cur);
        let next = self.node_idx + 1;
        if stmt.chain.node(next).is_some() {
            return self.emit(next);
        }
        match stmt.right {
            Some(r) => {
                self.state = VmState::InLoopConditions;
                self.cur = r;
                self.emit(0)
            }
            None => self.finish(),
        }
    }
}

/// The documented quirk: under `OR`, a next condition whose head is
/// `true` or a bare constant is treated as still-evaluating rather than
/// short-circuit.
fn or_keeps_evaluating(node: &ChainNode) -> bool {
    node.head()
        .is_some_and(|a| matches!(a.op, Opcode::True | Opcode::Constant))
}

// ---- driver ---------------------------------------------------------------

/// Execute a parsed program to completion and return its status.
///
/// Errors inside stages (spawn failures, bad math) are reported and
/// mapped to failure statuses; nothing here terminates the hosting
/// process.
pub fn run(prog: &Program, shell: &mut Shell) -> ExitStatus {
    if prog.is_empty() {
        return ExitStatus::SUCCESS;
    }

    let _redirect = match &prog.redirect {
        Some(redirect) => match RedirectGuard::apply(redirect) {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::warn!(error = %e, path = %redirect.target, "redirection failed");
                eprintln!("vsh: {}: {e}", redirect.target);
                return ExitStatus::FAILURE;
            }
        },
        None => None,
    };

    let mut vm = Vm::new(prog);
    let mut pipes = process::PipeState::default();
    let mut for_cursor = 0usize;

    while let Some(nref) = vm.advance() {
        let status = execute_node(prog, nref, shell, &mut pipes, &mut for_cursor);
        vm.observe(status);
    }

    vm.final_status()
}

fn execute_node(
    prog: &Program,
    nref: NodeRef,
    shell: &mut Shell,
    pipes: &mut process::PipeState,
    for_cursor: &mut usize,
) -> ExitStatus {
    let stmt = prog.stmt(nref.stmt);
    let node = &stmt.chain.nodes[nref.node];

    match stmt.kind {
        StatementKind::ForInit => execute_for_init(node, shell, for_cursor),
        StatementKind::ForConditions => execute_for_conditions(prog, nref, shell, for_cursor),
        StatementKind::ForIncrement => execute_for_increment(node, shell, for_cursor),
        _ => execute_stage(prog, nref, node, shell, pipes),
    }
}

fn execute_for_init(node: &ChainNode, shell: &mut Shell, for_cursor: &mut usize) -> ExitStatus {
    if is_math_node(node) {
        return run_math(&node.args[0].value, shell, false);
    }
    *for_cursor = 0;
    ExitStatus::SUCCESS
}

/// For-each conditions assign the loop variable from the item list held
/// by the `ForInit` statement; C-style conditions evaluate their math
/// expression. Failure here is the loop's normal exit.
fn execute_for_conditions(
    prog: &Program,
    nref: NodeRef,
    shell: &mut Shell,
    for_cursor: &mut usize,
) -> ExitStatus {
    let stmt = prog.stmt(nref.stmt);
    let node = &stmt.chain.nodes[nref.node];
    if is_math_node(node) {
        return run_math(&node.args[0].value, shell, true);
    }

    let Some(init_id) = stmt.prev else {
        return ExitStatus::FAILURE;
    };
    let init = prog.stmt(init_id);
    let Some(init_node) = init.chain.node(0) else {
        return ExitStatus::FAILURE;
    };
    let Some(var) = init_node.args.first() else {
        return ExitStatus::FAILURE;
    };
    let items = &init_node.args[1..];

    if *for_cursor < items.len() {
        shell
            .env
            .assign_variable(&var.value, &items[*for_cursor].value);
        ExitStatus::SUCCESS
    } else {
        ExitStatus::FAILURE
    }
}

fn execute_for_increment(
    node: &ChainNode,
    shell: &mut Shell,
    for_cursor: &mut usize,
) -> ExitStatus {
    if is_math_node(node) {
        return run_math(&node.args[0].value, shell, false);
    }
    *for_cursor += 1;
    ExitStatus::SUCCESS
}

fn is_math_node(node: &ChainNode) -> bool {
    node.args.len() == 1 && node.args[0].op == Opcode::Math
}

fn run_math(expr: &str, shell: &mut Shell, as_condition: bool) -> ExitStatus {
    match arith::eval(expr, &mut shell.env) {
        Ok(value) => {
            if as_condition && value == 0 {
                ExitStatus::FAILURE
            } else {
                ExitStatus::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("vsh: {e}");
            ExitStatus::FAILURE
        }
    }
}

/// Run one general chain node: constant heads and comparisons in-process,
/// then the builtin dispatcher, then a real child process.
fn execute_stage(
    prog: &Program,
    nref: NodeRef,
    node: &ChainNode,
    shell: &mut Shell,
    pipes: &mut process::PipeState,
) -> ExitStatus {
    match node.head().map(|a| a.op) {
        Some(Opcode::True) => return ExitStatus::SUCCESS,
        Some(Opcode::False) => return ExitStatus::FAILURE,
        _ => {}
    }

    if is_math_node(node) {
        return run_math(&node.args[0].value, shell, true);
    }

    if compare::is_compare_node(node) {
        return compare::eval(node, &shell.env);
    }

    let argv = match build_argv(node, &mut shell.env) {
        Ok(argv) => argv,
        Err(e) => {
            eprintln!("vsh: {e}");
            return ExitStatus::FAILURE;
        }
    };
    if argv.is_empty() {
        return ExitStatus::SUCCESS;
    }

    if let Some(status) = shell.try_builtin(&argv) {
        return status;
    }

    let stmt = prog.stmt(nref.stmt);
    let pipe_in = node.prev_op == crate::ast::ChainOp::Pipe;
    let pipe_out = stmt
        .chain
        .node(nref.node + 1)
        .is_some_and(|n| n.prev_op == crate::ast::ChainOp::Pipe);

    process::run_stage(&argv, pipes, pipe_in, pipe_out, prog.background, shell)
}

/// Build the final argv for a stage: variables and math expressions are
/// the two deferred expansions resolved here.
fn build_argv(node: &ChainNode, env: &mut dyn Expander) -> VshResult<Vec<String>> {
    let mut argv = Vec::with_capacity(node.args.len());
    for arg in &node.args {
        match arg.op {
            Opcode::Variable => {
                // unset variables expand to nothing, like the shell
                if let Some(value) = env.expand_variable(&arg.value) {
                    if !value.is_empty() {
                        argv.push(value);
                    }
                }
            }
            Opcode::Math => argv.push(arith::eval(&arg.value, env)?.to_string()),
            Opcode::Jump => {}
            _ => argv.push(arg.value.clone()),
        }
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StatementKind;
    use crate::expand::Env;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn program(input: &str) -> Program {
        let lexemes = lex(input);
        let mut env = Env::new();
        parse(&lexemes, &mut env).unwrap()
    }

    /// Drive the VM with a fixed status per emitted node, recording the
    /// statement kind each node came from.
    fn drive(prog: &Program, statuses: &[ExitStatus]) -> Vec<(StatementKind, usize)> {
        let mut vm = Vm::new(prog);
        let mut emitted = Vec::new();
        let mut i = 0;
        while let Some(nref) = vm.advance() {
            emitted.push((prog.stmt(nref.stmt).kind, nref.node));
            let status = statuses.get(i).copied().unwrap_or(ExitStatus::SUCCESS);
            vm.observe(status);
            i += 1;
            assert!(i < 1000, "vm did not terminate");
        }
        emitted
    }

    #[test]
    fn and_short_circuit_skips_second_stage() {
        let prog = program("false && true");
        let emitted = drive(&prog, &[ExitStatus::FAILURE]);
        assert_eq!(emitted.len(), 1);
    }

    #[test]
    fn or_short_circuit_skips_second_stage() {
        let prog = program("true || false");
        let emitted = drive(&prog, &[ExitStatus::SUCCESS]);
        assert_eq!(emitted.len(), 1);
    }

    #[test]
    fn failed_or_runs_second_stage() {
        let prog = program("false || echo rescued");
        let emitted = drive(&prog, &[ExitStatus::FAILURE, ExitStatus::SUCCESS]);
        assert_eq!(emitted.len(), 2);
    }

    #[test]
    fn pipeline_emits_every_stage() {
        let prog = program("ls | sort | wc -c");
        let emitted = drive(
            &prog,
            &[ExitStatus::SUCCESS, ExitStatus::SUCCESS, ExitStatus::SUCCESS],
        );
        assert_eq!(emitted.len(), 3);
        assert_eq!(
            emitted.iter().map(|(_, n)| *n).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn sequential_statements_run_in_order() {
        let prog = program("echo one; echo two");
        let emitted = drive(&prog, &[ExitStatus::SUCCESS, ExitStatus::SUCCESS]);
        assert_eq!(emitted.len(), 2);
    }

    #[test]
    fn if_true_selects_the_body() {
        let prog = program("if probe; then body; fi");
        let emitted = drive(&prog, &[ExitStatus::SUCCESS, ExitStatus::SUCCESS]);
        let kinds: Vec<StatementKind> = emitted.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![StatementKind::IfConditions, StatementKind::If]
        );
    }

    #[test]
    fn if_false_without_else_is_benign() {
        let prog = program("if probe; then body; fi");
        let mut vm = Vm::new(&prog);
        assert!(vm.advance().is_some());
        vm.observe(ExitStatus::FAILURE);
        assert!(vm.advance().is_none());
        assert!(vm.final_status().is_benign());
    }

    #[test]
    fn if_elif_else_is_exclusive() {
        let prog = program("if a; then b; elif c; then d; else e; fi");

        // enumerate every success/failure assignment of the two conditions
        for (a_ok, c_ok) in [(true, true), (true, false), (false, true), (false, false)] {
            let mut vm = Vm::new(&prog);
            let mut bodies = Vec::new();
            while let Some(nref) = vm.advance() {
                let kind = prog.stmt(nref.stmt).kind;
                let status = match kind {
                    StatementKind::IfConditions => {
                        if a_ok {
                            ExitStatus::SUCCESS
                        } else {
                            ExitStatus::FAILURE
                        }
                    }
                    StatementKind::ElifConditions => {
                        if c_ok {
                            ExitStatus::SUCCESS
                        } else {
                            ExitStatus::FAILURE
                        }
                    }
                    _ => {
                        bodies.push(kind);
                        ExitStatus::SUCCESS
                    }
                };
                vm.observe(status);
            }

            assert_eq!(bodies.len(), 1, "exactly one body for ({a_ok}, {c_ok})");
            let expected = if a_ok {
                StatementKind::If
            } else if c_ok {
                StatementKind::Elif
            } else {
                StatementKind::Else
            };
            assert_eq!(bodies[0], expected);
        }
    }

    #[test]
    fn or_with_constant_head_keeps_evaluating() {
        // the preserved quirk: after a succeeding condition, an OR-joined
        // node with a bare-constant head is still evaluated
        let prog = program("if probe || other; then body; fi");
        let emitted = drive(
            &prog,
            &[ExitStatus::SUCCESS, ExitStatus::SUCCESS, ExitStatus::SUCCESS],
        );
        let kinds: Vec<StatementKind> = emitted.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                StatementKind::IfConditions,
                StatementKind::IfConditions,
                StatementKind::If
            ]
        );
    }

    #[test]
    fn or_with_false_head_short_circuits_into_the_body() {
        let prog = program("if probe || false; then body; fi");
        let emitted = drive(&prog, &[ExitStatus::SUCCESS, ExitStatus::SUCCESS]);
        let kinds: Vec<StatementKind> = emitted.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![StatementKind::IfConditions, StatementKind::If]
        );
    }

    #[test]
    fn while_loop_revisits_conditions_until_failure() {
        let prog = program("while probe; do work; done");
        let mut vm = Vm::new(&prog);
        let mut cond_visits = 0;
        let mut body_visits = 0;
        while let Some(nref) = vm.advance() {
            match prog.stmt(nref.stmt).kind {
                StatementKind::WhileConditions => {
                    cond_visits += 1;
                    // succeed twice, then stop the loop
                    vm.observe(if cond_visits <= 2 {
                        ExitStatus::SUCCESS
                    } else {
                        ExitStatus::FAILURE
                    });
                }
                _ => {
                    body_visits += 1;
                    vm.observe(ExitStatus::SUCCESS);
                }
            }
            assert!(cond_visits < 10);
        }
        assert_eq!(cond_visits, 3);
        assert_eq!(body_visits, 2);
        assert!(vm.final_status().is_benign());
    }

    #[test]
    fn c_style_for_visits_body_exactly_five_times() {
        let prog = program("for ((i=1;i<=5;i++)); do work; done");
        let mut vm = Vm::new(&prog);
        let mut shell = Shell::new();
        let mut body_visits = 0;
        let mut for_cursor = 0usize;
        let mut pipes = process::PipeState::default();

        while let Some(nref) = vm.advance() {
            let kind = prog.stmt(nref.stmt).kind;
            let status = match kind {
                StatementKind::ForInit
                | StatementKind::ForConditions
                | StatementKind::ForIncrement => {
                    execute_node(&prog, nref, &mut shell, &mut pipes, &mut for_cursor)
                }
                _ => {
                    body_visits += 1;
                    ExitStatus::SUCCESS
                }
            };
            vm.observe(status);
            assert!(body_visits <= 6, "loop did not terminate");
        }

        assert_eq!(body_visits, 5);
        assert_eq!(shell.env.get("i"), Some("6"));
    }

    #[test]
    fn for_each_assigns_every_item() {
        let prog = program("for f in one two three; do work; done");
        let mut vm = Vm::new(&prog);
        let mut shell = Shell::new();
        let mut body_visits = 0;
        let mut for_cursor = 0usize;
        let mut pipes = process::PipeState::default();
        let mut seen = Vec::new();

        while let Some(nref) = vm.advance() {
            let kind = prog.stmt(nref.stmt).kind;
            let status = match kind {
                StatementKind::ForInit
                | StatementKind::ForConditions
                | StatementKind::ForIncrement => {
                    execute_node(&prog, nref, &mut shell, &mut pipes, &mut for_cursor)
                }
                _ => {
                    body_visits += 1;
                    seen.push(shell.env.get("f").unwrap_or_default().to_string());
                    ExitStatus::SUCCESS
                }
            };
            vm.observe(status);
            assert!(body_visits <= 4, "loop did not terminate");
        }

        assert_eq!(body_visits, 3);
        assert_eq!(seen, vec!["one", "two", "three"]);
    }

    #[test]
    fn build_argv_expands_deferred_values() {
        let mut env = Env::new();
        env.assign_variable("NAME", "world");
        let mut node = ChainNode::new(crate::ast::ChainOp::None);
        node.args.push(crate::ast::Arg::new("echo", Opcode::Constant));
        node.args.push(crate::ast::Arg::new("NAME", Opcode::Variable));
        node.args.push(crate::ast::Arg::new("1+2", Opcode::Math));
        let argv = build_argv(&node, &mut env).unwrap();
        assert_eq!(argv, vec!["echo", "world", "3"]);
    }

    #[test]
    fn unset_variable_drops_out_of_argv() {
        let mut env = Env::new();
        let mut node = ChainNode::new(crate::ast::ChainOp::None);
        node.args.push(crate::ast::Arg::new("echo", Opcode::Constant));
        node.args
            .push(crate::ast::Arg::new("VSH_UNSET_XYZ", Opcode::Variable));
        let argv = build_argv(&node, &mut env).unwrap();
        assert_eq!(argv, vec!["echo"]);
    }
}
