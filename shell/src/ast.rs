//! Statement tree and command chains for vsh
//!
//! This module defines the structures the parser builds and the execution
//! engine walks: per-statement command chains (pipeline stages) and the
//! `left`/`right`/`prev`-linked statement tree encoding control flow.
//! Statements live in a per-program arena and refer to each other through
//! typed optional indices, so the tree carries no owning pointers and no
//! reference counting.

use crate::lexer::Opcode;
use serde::{Deserialize, Serialize};

/// Hard upper bound on the argv of a single pipeline stage. The argv
/// starts small and grows geometrically; crossing this bound is a parse
/// failure, not a reallocation.
pub const ARGV_HARD_CAP: usize = 256;

/// Initial argv capacity of a chain node.
pub(crate) const ARGV_INITIAL_CAP: usize = 8;

/// Arena index of a statement within its [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StmtId(u32);

impl StmtId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Operator that joined a chain node to its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChainOp {
    #[default]
    None,
    Pipe,
    And,
    Or,
}

/// One argv entry: the value plus the classification it carried out of
/// parsing (constant, variable reference, glob result, operator, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    pub value: String,
    pub op: Opcode,
}

impl Arg {
    pub fn new(value: impl Into<String>, op: Opcode) -> Self {
        Self {
            value: value.into(),
            op,
        }
    }
}

/// One pipeline stage: an annotated argv and the operator that joined it
/// to the previous stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainNode {
    pub args: Vec<Arg>,
    pub prev_op: ChainOp,
}

impl ChainNode {
    pub fn new(prev_op: ChainOp) -> Self {
        Self {
            args: Vec::with_capacity(ARGV_INITIAL_CAP),
            prev_op,
        }
    }

    /// Append an argument, failing once the hard cap is crossed.
    pub fn push_arg(&mut self, arg: Arg) -> Result<(), ()> {
        if self.args.len() >= ARGV_HARD_CAP {
            return Err(());
        }
        self.args.push(arg);
        Ok(())
    }

    pub fn head(&self) -> Option<&Arg> {
        self.args.first()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// True for the synthetic loop re-entry marker.
    pub fn is_jump(&self) -> bool {
        self.head().is_some_and(|a| a.op == Opcode::Jump)
    }

    pub(crate) fn jump() -> Self {
        let mut node = Self::new(ChainOp::None);
        node.args.push(Arg::new("jump", Opcode::Jump));
        node
    }
}

/// The ordered pipeline stages belonging to one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandChain {
    pub nodes: Vec<ChainNode>,
}

impl CommandChain {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> Option<&ChainNode> {
        self.nodes.get(index)
    }
}

/// Role of a statement in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Normal,
    IfConditions,
    If,
    ElifConditions,
    Elif,
    Else,
    WhileConditions,
    While,
    ForInit,
    ForConditions,
    ForIncrement,
    For,
}

impl StatementKind {
    /// True for the statement kinds the engine evaluates as conditions.
    pub fn is_conditions(self) -> bool {
        matches!(
            self,
            StatementKind::IfConditions
                | StatementKind::ElifConditions
                | StatementKind::WhileConditions
                | StatementKind::ForConditions
        )
    }

    /// True for loop-owned statement kinds.
    pub fn is_loop(self) -> bool {
        matches!(
            self,
            StatementKind::WhileConditions
                | StatementKind::While
                | StatementKind::ForInit
                | StatementKind::ForConditions
                | StatementKind::ForIncrement
                | StatementKind::For
        )
    }
}

/// A node in the statement tree.
///
/// `right` leads to the sequential successor, `left` to the alternate
/// branch (`else`/`elif` chains), and `prev` to the statement that created
/// this one (used to find the owning conditions node from inside a body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub chain: CommandChain,
    pub right: Option<StmtId>,
    pub left: Option<StmtId>,
    pub prev: Option<StmtId>,
}

impl Statement {
    pub(crate) fn new(kind: StatementKind, prev: Option<StmtId>) -> Self {
        Self {
            kind,
            chain: CommandChain::default(),
            right: None,
            left: None,
            prev,
        }
    }
}

/// Overall shape of a parsed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramShape {
    Normal,
    If,
    IfElse,
    IfElif,
    IfElifElse,
    While,
    For,
}

/// Where a statement's stdio should be connected instead of the inherited
/// descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectMode {
    Out,
    OutAppend,
    In,
    InAppend,
    Err,
    ErrAppend,
    Both,
    BothAppend,
}

impl RedirectMode {
    /// Map a redirection opcode to its mode.
    pub fn from_opcode(op: Opcode) -> Option<Self> {
        Some(match op {
            Opcode::RedirOut => RedirectMode::Out,
            Opcode::RedirOutAppend => RedirectMode::OutAppend,
            Opcode::RedirIn => RedirectMode::In,
            Opcode::RedirInAppend => RedirectMode::InAppend,
            Opcode::RedirErr => RedirectMode::Err,
            Opcode::RedirErrAppend => RedirectMode::ErrAppend,
            Opcode::RedirBoth => RedirectMode::Both,
            Opcode::RedirBothAppend => RedirectMode::BothAppend,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redirect {
    pub mode: RedirectMode,
    pub target: String,
}

/// The root of one parsed line: the statement arena plus the line-level
/// attributes the engine needs before the first stage runs.
///
/// Invariant: a successfully parsed program always has a valid `head`,
/// and `head` is a conditions/init statement whenever `shape` is not
/// [`ProgramShape::Normal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    stmts: Vec<Statement>,
    pub head: StmtId,
    pub shape: ProgramShape,
    pub pipes_count: usize,
    pub background: bool,
    pub redirect: Option<Redirect>,
}

impl Program {
    pub(crate) fn new() -> Self {
        Self {
            stmts: Vec::new(),
            head: StmtId::new(0),
            shape: ProgramShape::Normal,
            pipes_count: 0,
            background: false,
            redirect: None,
        }
    }

    pub(crate) fn alloc(&mut self, kind: StatementKind, prev: Option<StmtId>) -> StmtId {
        let id = StmtId::new(self.stmts.len());
        self.stmts.push(Statement::new(kind, prev));
        id
    }

    pub fn stmt(&self, id: StmtId) -> &Statement {
        &self.stmts[id.index()]
    }

    pub(crate) fn stmt_mut(&mut self, id: StmtId) -> &mut Statement {
        &mut self.stmts[id.index()]
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}
