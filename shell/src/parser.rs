//! Parser for vsh
//!
//! Consumes the lexeme sequence and builds the statement tree plus the
//! per-statement command chains. Recursive descent with explicit
//! lookahead: one function per grammar production (`conditions` are the
//! shared commands loop, then `if`/`elif`/`else`, `while`, and both `for`
//! forms). Home and glob expansion happen here through the [`Expander`]
//! collaborator; variable references and math expressions stay deferred
//! for the execution engine. Any syntax error aborts the whole line.

use crate::ast::{
    Arg, ChainNode, ChainOp, CommandChain, Program, ProgramShape, Redirect, RedirectMode,
    Statement, StatementKind, StmtId,
};
use crate::error::{VshError, VshResult};
use crate::expand::Expander;
use crate::lexer::{Lexeme, Opcode};

/// Parse one line's lexemes into a program.
///
/// An empty lexeme sequence (the lexer's degradation result) parses to an
/// empty program, which the engine treats as "nothing to do".
pub fn parse(lexemes: &[Lexeme<'_>], expander: &mut dyn Expander) -> VshResult<Program> {
    Parser {
        lexemes,
        pos: 0,
        expander,
        prog: Program::new(),
    }
    .parse_program()
}

struct Parser<'a, 'e> {
    lexemes: &'a [Lexeme<'a>],
    pos: usize,
    expander: &'e mut dyn Expander,
    prog: Program,
}

impl<'a> Parser<'a, '_> {
    fn parse_program(mut self) -> VshResult<Program> {
        self.skip_semicolons();
        match self.peek_op() {
            None => return Ok(self.prog),
            Some(Opcode::If) => self.parse_if()?,
            Some(Opcode::While) => self.parse_while()?,
            Some(Opcode::For) => self.parse_for()?,
            Some(_) => self.parse_normal()?,
        }

        self.skip_semicolons();
        if let Some(lex) = self.peek() {
            return Err(VshError::InvalidStatement(format!(
                "unexpected '{}' after statement",
                lex.text
            )));
        }

        if !self.prog.is_empty() {
            self.prog.pipes_count = self.prog.stmt(self.prog.head).chain.len();
        }
        Ok(self.prog)
    }

    // ---- lookahead helpers ----------------------------------------------

    fn peek(&self) -> Option<Lexeme<'a>> {
        self.lexemes.get(self.pos).copied()
    }

    fn peek_op(&self) -> Option<Opcode> {
        self.peek().map(|l| l.op)
    }

    fn consume(&mut self) -> Option<Lexeme<'a>> {
        let lex = self.peek();
        if lex.is_some() {
            self.pos += 1;
        }
        lex
    }

    fn eat(&mut self, op: Opcode) -> bool {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: Opcode, what: &str) -> VshResult<()> {
        if self.eat(op) {
            Ok(())
        } else {
            Err(VshError::MissingToken(format!("'{what}'")))
        }
    }

    fn skip_semicolons(&mut self) {
        while self.eat(Opcode::Semicolon) {}
    }

    // ---- ordinary pipelines ---------------------------------------------

    /// Sequential `NORMAL` statements separated by `;`, linked via `right`.
    fn parse_normal(&mut self) -> VshResult<()> {
        let mut prev: Option<StmtId> = None;
        loop {
            if self.peek().is_none() {
                break;
            }
            let id = self.prog.alloc(StatementKind::Normal, prev);
            if let Some(p) = prev {
                self.prog.stmt_mut(p).right = Some(id);
            } else {
                self.prog.head = id;
            }

            // an assignment-only segment leaves the chain empty, which is
            // a valid statement with nothing to run
            let (chain, background) = self.parse_commands(&[Opcode::Semicolon])?;
            self.prog.stmt_mut(id).chain = chain;
            if background {
                self.prog.background = true;
            }
            prev = Some(id);

            self.skip_semicolons();
        }
        Ok(())
    }

    /// The commands loop: classify each lexeme into the chain, with the
    /// operator side effects described by the grammar. An assignment-only
    /// segment yields an empty chain.
    fn parse_commands(&mut self, terminators: &[Opcode]) -> VshResult<(CommandChain, bool)> {
        let mut chain = CommandChain::default();
        let mut cur = ChainNode::new(ChainOp::None);
        let mut background = false;
        let mut first_token = true;

        while let Some(lex) = self.peek() {
            if terminators.contains(&lex.op) {
                break;
            }
            match lex.op {
                Opcode::Pipe | Opcode::And | Opcode::Or => {
                    let join = match lex.op {
                        Opcode::Pipe => ChainOp::Pipe,
                        Opcode::And => ChainOp::And,
                        _ => ChainOp::Or,
                    };
                    if cur.is_empty() {
                        return Err(VshError::InvalidStatement(format!(
                            "'{}' without a preceding command",
                            lex.text
                        )));
                    }
                    self.consume();
                    match self.peek() {
                        Some(next) if !terminators.contains(&next.op) && next.op.is_value() => {}
                        _ => {
                            return Err(VshError::InvalidStatement(format!(
                                "'{}' without a following command",
                                lex.text
                            )))
                        }
                    }
                    chain.nodes.push(std::mem::replace(&mut cur, ChainNode::new(join)));
                }

                Opcode::Background => {
                    self.consume();
                    if self.peek().is_some() {
                        return Err(VshError::InvalidStatement(
                            "'&' is only valid at the end of a command".to_string(),
                        ));
                    }
                    background = true;
                }

                op if op.is_redirect() => {
                    if first_token {
                        return Err(VshError::InvalidStatement(
                            "redirection without a command".to_string(),
                        ));
                    }
                    self.consume();
                    let target = match self.peek() {
                        Some(t) if t.op.is_value() => {
                            self.consume();
                            t
                        }
                        _ => return Err(VshError::MissingToken("redirection target".to_string())),
                    };
                    let mode = RedirectMode::from_opcode(op).ok_or_else(|| {
                        VshError::InvalidStatement("bad redirection operator".to_string())
                    })?;
                    let target = self.resolve_word(target);
                    self.prog.redirect = Some(Redirect { mode, target });
                }

                Opcode::Assign => {
                    self.consume();
                    let name = match cur.args.last() {
                        Some(arg) if arg.op == Opcode::Constant => arg.value.clone(),
                        _ => {
                            return Err(VshError::InvalidStatement(
                                "assignment without a variable name".to_string(),
                            ))
                        }
                    };
                    let value = match self.peek() {
                        Some(v) if v.op.is_value() => {
                            self.consume();
                            v
                        }
                        _ => {
                            return Err(VshError::InvalidStatement(
                                "assignment without a value".to_string(),
                            ))
                        }
                    };
                    cur.args.pop();
                    let value = self.resolve_word(value);
                    self.expander.assign_variable(&name, &value);
                }

                Opcode::Home => {
                    self.consume();
                    let expanded = self.expander.expand_home(lex.text);
                    push_arg(&mut cur, Arg::new(expanded, Opcode::Constant))?;
                }

                Opcode::Glob => {
                    self.consume();
                    let matches = self.expander.expand_glob(lex.text);
                    if matches.is_empty() {
                        push_arg(&mut cur, Arg::new(lex.text, Opcode::Constant))?;
                    } else {
                        for m in matches {
                            push_arg(&mut cur, Arg::new(m, Opcode::Glob))?;
                        }
                    }
                }

                Opcode::Variable => {
                    self.consume();
                    let name = lex.text.trim_start_matches('$');
                    push_arg(&mut cur, Arg::new(name, Opcode::Variable))?;
                }

                Opcode::If
                | Opcode::Then
                | Opcode::Else
                | Opcode::Elif
                | Opcode::Fi
                | Opcode::While
                | Opcode::For
                | Opcode::Do
                | Opcode::Done
                | Opcode::In
                | Opcode::Jump => {
                    return Err(VshError::InvalidStatement(format!(
                        "unexpected '{}'",
                        lex.text
                    )));
                }

                _ => {
                    self.consume();
                    push_arg(&mut cur, Arg::new(lex.text, lex.op))?;
                }
            }
            first_token = false;
        }

        if !cur.is_empty() {
            chain.nodes.push(cur);
        } else if !chain.nodes.is_empty() {
            // a join operator promised a following command that an
            // assignment then swallowed
            return Err(VshError::InvalidStatement("empty command".to_string()));
        }

        Ok((chain, background))
    }

    /// Fold a value-shaped lexeme to a plain string (used for redirection
    /// targets and assignment values, where expansion happens eagerly).
    fn resolve_word(&mut self, lex: Lexeme<'_>) -> String {
        match lex.op {
            Opcode::Home => self.expander.expand_home(lex.text),
            Opcode::Variable => {
                let name = lex.text.trim_start_matches('$');
                self.expander
                    .expand_variable(name)
                    .unwrap_or_default()
            }
            Opcode::Glob => self
                .expander
                .expand_glob(lex.text)
                .into_iter()
                .next()
                .unwrap_or_else(|| lex.text.to_string()),
            _ => lex.text.to_string(),
        }
    }

    fn require_nonempty(&self, chain: &CommandChain, what: &str) -> VshResult<()> {
        if chain.is_empty() {
            Err(VshError::InvalidStatement(format!("empty {what}")))
        } else {
            Ok(())
        }
    }

    // ---- control-flow productions ---------------------------------------

    fn parse_conditions(&mut self, kind: StatementKind, prev: Option<StmtId>) -> VshResult<StmtId> {
        let id = self.prog.alloc(kind, prev);
        let (chain, _) = self.parse_commands(&[Opcode::Semicolon, Opcode::Then, Opcode::Do])?;
        self.require_nonempty(&chain, "condition")?;
        self.prog.stmt_mut(id).chain = chain;
        Ok(id)
    }

    fn parse_body(
        &mut self,
        kind: StatementKind,
        prev: StmtId,
        terminators: &[Opcode],
    ) -> VshResult<StmtId> {
        let id = self.prog.alloc(kind, Some(prev));
        let (chain, _) = self.parse_commands(terminators)?;
        self.require_nonempty(&chain, "body")?;
        self.prog.stmt_mut(id).chain = chain;
        Ok(id)
    }

    fn parse_if(&mut self) -> VshResult<()> {
        self.consume(); // 'if'
        let cond = self.parse_conditions(StatementKind::IfConditions, None)?;
        self.prog.head = cond;
        self.skip_semicolons();
        self.expect(Opcode::Then, "then")?;

        let body = self.parse_body(
            StatementKind::If,
            cond,
            &[Opcode::Semicolon, Opcode::Fi, Opcode::Else, Opcode::Elif],
        )?;
        self.prog.stmt_mut(cond).right = Some(body);
        self.skip_semicolons();

        match self.peek_op() {
            Some(Opcode::Fi) => {
                self.consume();
                self.prog.shape = ProgramShape::If;
                Ok(())
            }
            Some(Opcode::Else) => {
                self.consume();
                let els = self.parse_body(
                    StatementKind::Else,
                    cond,
                    &[Opcode::Semicolon, Opcode::Fi],
                )?;
                self.prog.stmt_mut(cond).left = Some(els);
                self.skip_semicolons();
                self.expect(Opcode::Fi, "fi")?;
                self.prog.shape = ProgramShape::IfElse;
                Ok(())
            }
            Some(Opcode::Elif) => {
                let has_else = self.parse_elif(cond)?;
                self.prog.shape = if has_else {
                    ProgramShape::IfElifElse
                } else {
                    ProgramShape::IfElif
                };
                Ok(())
            }
            _ => Err(VshError::MissingToken("'fi'".to_string())),
        }
    }

    /// One `elif` arm; self-recursive for chained `elif`. The new
    /// conditions statement hangs off the previous conditions' `left`.
    fn parse_elif(&mut self, prev_cond: StmtId) -> VshResult<bool> {
        self.consume(); // 'elif'
        let cond = self.parse_conditions(StatementKind::ElifConditions, Some(prev_cond))?;
        self.prog.stmt_mut(prev_cond).left = Some(cond);
        self.skip_semicolons();
        self.expect(Opcode::Then, "then")?;

        let body = self.parse_body(
            StatementKind::Elif,
            cond,
            &[Opcode::Semicolon, Opcode::Fi, Opcode::Else, Opcode::Elif],
        )?;
        self.prog.stmt_mut(cond).right = Some(body);
        self.skip_semicolons();

        match self.peek_op() {
            Some(Opcode::Fi) => {
                self.consume();
                Ok(false)
            }
            Some(Opcode::Elif) => self.parse_elif(cond),
            Some(Opcode::Else) => {
                self.consume();
                let els = self.parse_body(
                    StatementKind::Else,
                    cond,
                    &[Opcode::Semicolon, Opcode::Fi],
                )?;
                self.prog.stmt_mut(cond).left = Some(els);
                self.skip_semicolons();
                self.expect(Opcode::Fi, "fi")?;
                Ok(true)
            }
            _ => Err(VshError::MissingToken("'fi'".to_string())),
        }
    }

    fn parse_while(&mut self) -> VshResult<()> {
        self.consume(); // 'while'
        let cond = self.parse_conditions(StatementKind::WhileConditions, None)?;
        self.prog.head = cond;
        self.skip_semicolons();
        self.expect(Opcode::Do, "do")?;

        let body = self.parse_body(
            StatementKind::While,
            cond,
            &[Opcode::Semicolon, Opcode::Done],
        )?;
        self.prog.stmt_mut(body).chain.nodes.push(ChainNode::jump());
        self.prog.stmt_mut(cond).right = Some(body);
        // the body's sequential successor is the conditions node itself:
        // the jump pseudo-command sends the engine back there
        self.prog.stmt_mut(body).right = Some(cond);
        self.skip_semicolons();
        self.expect(Opcode::Done, "done")?;
        self.prog.shape = ProgramShape::While;
        Ok(())
    }

    fn parse_for(&mut self) -> VshResult<()> {
        self.consume(); // 'for'
        match self.peek_op() {
            Some(Opcode::Math) => self.parse_for_c_style(),
            Some(Opcode::Constant) => self.parse_for_each(),
            _ => Err(VshError::InvalidStatement(
                "malformed for statement".to_string(),
            )),
        }
    }

    /// `for ((init;condition;increment)); do body; done`
    fn parse_for_c_style(&mut self) -> VshResult<()> {
        let header = match self.consume() {
            Some(h) => h,
            None => return Err(VshError::InvalidStatement("malformed for header".to_string())),
        };
        let parts: Vec<&str> = header.text.split(';').collect();
        if parts.len() != 3 {
            return Err(VshError::InvalidStatement(
                "for (( )) requires init;condition;increment".to_string(),
            ));
        }

        let init = self.prog.alloc(StatementKind::ForInit, None);
        self.prog.head = init;
        set_math_chain(self.prog.stmt_mut(init), parts[0]);

        let cond = self.prog.alloc(StatementKind::ForConditions, Some(init));
        set_math_chain(self.prog.stmt_mut(cond), parts[1]);
        self.prog.stmt_mut(init).right = Some(cond);

        self.skip_semicolons();
        self.expect(Opcode::Do, "do")?;
        let body = self.parse_body(
            StatementKind::For,
            cond,
            &[Opcode::Semicolon, Opcode::Done],
        )?;
        self.prog.stmt_mut(body).chain.nodes.push(ChainNode::jump());
        self.prog.stmt_mut(cond).right = Some(body);

        let incr = self.prog.alloc(StatementKind::ForIncrement, Some(body));
        set_math_chain(self.prog.stmt_mut(incr), parts[2]);
        self.prog.stmt_mut(body).right = Some(incr);
        self.prog.stmt_mut(incr).right = Some(cond);

        self.skip_semicolons();
        self.expect(Opcode::Done, "done")?;
        self.prog.shape = ProgramShape::For;
        Ok(())
    }

    /// `for NAME in item...; do body; done`
    ///
    /// The item list is expanded here and stored in the `ForInit` chain
    /// after the loop variable; the engine drives iteration with its own
    /// cursor.
    fn parse_for_each(&mut self) -> VshResult<()> {
        let var = match self.consume() {
            Some(v) => v.text.to_string(),
            None => return Err(VshError::InvalidStatement("malformed for statement".to_string())),
        };
        self.expect(Opcode::In, "in")?;

        let mut items: Vec<String> = Vec::new();
        while let Some(lex) = self.peek() {
            match lex.op {
                Opcode::Semicolon | Opcode::Do => break,
                Opcode::Home => {
                    self.consume();
                    items.push(self.expander.expand_home(lex.text));
                }
                Opcode::Glob => {
                    self.consume();
                    let matches = self.expander.expand_glob(lex.text);
                    if matches.is_empty() {
                        items.push(lex.text.to_string());
                    } else {
                        items.extend(matches);
                    }
                }
                Opcode::Variable => {
                    self.consume();
                    let name = lex.text.trim_start_matches('$');
                    if let Some(value) = self.expander.expand_variable(name) {
                        items.extend(value.split_whitespace().map(str::to_string));
                    }
                }
                op if op.is_value() => {
                    self.consume();
                    items.push(lex.text.to_string());
                }
                _ => {
                    return Err(VshError::InvalidStatement(format!(
                        "unexpected '{}' in for items",
                        lex.text
                    )))
                }
            }
        }

        let init = self.prog.alloc(StatementKind::ForInit, None);
        self.prog.head = init;
        {
            let mut node = ChainNode::new(ChainOp::None);
            node.push_arg(Arg::new(var.clone(), Opcode::Variable))
                .map_err(|()| VshError::InvalidStatement("too many arguments".to_string()))?;
            for item in items {
                node.push_arg(Arg::new(item, Opcode::Constant))
                    .map_err(|()| VshError::InvalidStatement("too many for items".to_string()))?;
            }
            self.prog.stmt_mut(init).chain.nodes.push(node);
        }

        let cond = self.prog.alloc(StatementKind::ForConditions, Some(init));
        set_var_chain(self.prog.stmt_mut(cond), &var);
        self.prog.stmt_mut(init).right = Some(cond);

        self.skip_semicolons();
        self.expect(Opcode::Do, "do")?;
        let body = self.parse_body(
            StatementKind::For,
            cond,
            &[Opcode::Semicolon, Opcode::Done],
        )?;
        self.prog.stmt_mut(body).chain.nodes.push(ChainNode::jump());
        self.prog.stmt_mut(cond).right = Some(body);

        let incr = self.prog.alloc(StatementKind::ForIncrement, Some(body));
        set_var_chain(self.prog.stmt_mut(incr), &var);
        self.prog.stmt_mut(body).right = Some(incr);
        self.prog.stmt_mut(incr).right = Some(cond);

        self.skip_semicolons();
        self.expect(Opcode::Done, "done")?;
        self.prog.shape = ProgramShape::For;
        Ok(())
    }
}

fn push_arg(node: &mut ChainNode, arg: Arg) -> VshResult<()> {
    node.push_arg(arg)
        .map_err(|()| VshError::InvalidStatement("too many arguments in command".to_string()))
}

fn set_math_chain(stmt: &mut Statement, expr: &str) {
    let mut node = ChainNode::new(ChainOp::None);
    node.args.push(Arg::new(expr.trim(), Opcode::Math));
    stmt.chain.nodes.push(node);
}

fn set_var_chain(stmt: &mut Statement, var: &str) {
    let mut node = ChainNode::new(ChainOp::None);
    node.args.push(Arg::new(var, Opcode::Variable));
    stmt.chain.nodes.push(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use std::collections::HashMap;

    /// Deterministic expansion services for parser tests.
    #[derive(Default)]
    struct FakeExpander {
        vars: HashMap<String, String>,
        globs: HashMap<String, Vec<String>>,
    }

    impl Expander for FakeExpander {
        fn expand_variable(&self, name: &str) -> Option<String> {
            self.vars.get(name).cloned()
        }
        fn assign_variable(&mut self, name: &str, value: &str) {
            self.vars.insert(name.to_string(), value.to_string());
        }
        fn expand_glob(&self, pattern: &str) -> Vec<String> {
            self.globs.get(pattern).cloned().unwrap_or_default()
        }
        fn expand_home(&self, path: &str) -> String {
            path.replacen('~', "/home/test", 1)
        }
    }

    fn parse_str(input: &str) -> VshResult<Program> {
        let lexemes = lex(input);
        let mut exp = FakeExpander::default();
        parse(&lexemes, &mut exp)
    }

    fn parse_with(input: &str, exp: &mut FakeExpander) -> VshResult<Program> {
        let lexemes = lex(input);
        parse(&lexemes, exp)
    }

    #[test]
    fn pipeline_round_trip_structure() {
        let prog = parse_str("ls | sort | wc -c").unwrap();
        assert_eq!(prog.shape, ProgramShape::Normal);
        assert_eq!(prog.pipes_count, 3);

        let chain = &prog.stmt(prog.head).chain;
        assert_eq!(chain.len(), 3);
        let joins: Vec<ChainOp> = chain.nodes.iter().map(|n| n.prev_op).collect();
        assert_eq!(joins, vec![ChainOp::None, ChainOp::Pipe, ChainOp::Pipe]);
        assert_eq!(chain.nodes[2].args[0].value, "wc");
        assert_eq!(chain.nodes[2].args[1].value, "-c");
    }

    #[test]
    fn and_or_joins() {
        let prog = parse_str("false && true || echo done-val").unwrap();
        let chain = &prog.stmt(prog.head).chain;
        let joins: Vec<ChainOp> = chain.nodes.iter().map(|n| n.prev_op).collect();
        assert_eq!(joins, vec![ChainOp::None, ChainOp::And, ChainOp::Or]);
    }

    #[test]
    fn pipe_at_edges_is_an_error() {
        assert!(matches!(
            parse_str("| ls"),
            Err(VshError::InvalidStatement(_))
        ));
        assert!(matches!(
            parse_str("ls |"),
            Err(VshError::InvalidStatement(_))
        ));
        assert!(matches!(
            parse_str("ls && "),
            Err(VshError::InvalidStatement(_))
        ));
    }

    #[test]
    fn background_flag() {
        let prog = parse_str("sleep 5 &").unwrap();
        assert!(prog.background);

        assert!(matches!(
            parse_str("sleep 5 & echo hi"),
            Err(VshError::InvalidStatement(_))
        ));
    }

    #[test]
    fn redirection_lands_on_the_root() {
        let prog = parse_str("echo hi > out.txt").unwrap();
        let redirect = prog.redirect.as_ref().unwrap();
        assert_eq!(redirect.mode, RedirectMode::Out);
        assert_eq!(redirect.target, "out.txt");
        // the operator and filename never reach the argv
        assert_eq!(prog.stmt(prog.head).chain.nodes[0].args.len(), 2);

        let prog = parse_str("cat 2>> err.log").unwrap();
        assert_eq!(prog.redirect.unwrap().mode, RedirectMode::ErrAppend);
    }

    #[test]
    fn redirection_errors() {
        assert!(matches!(
            parse_str("echo hi >"),
            Err(VshError::MissingToken(_))
        ));
        assert!(matches!(
            parse_str("> file"),
            Err(VshError::InvalidStatement(_))
        ));
    }

    #[test]
    fn assignment_resolves_through_the_expander() {
        let mut exp = FakeExpander::default();
        let prog = parse_with("x=5", &mut exp).unwrap();
        assert_eq!(exp.vars.get("x").map(String::as_str), Some("5"));
        // assignments never appear in the chain
        assert!(prog.stmt(prog.head).chain.is_empty());
        assert_eq!(prog.pipes_count, 0);
    }

    #[test]
    fn glob_expansion_substitutes_constants() {
        let mut exp = FakeExpander::default();
        exp.globs.insert(
            "*.rs".to_string(),
            vec!["a.rs".to_string(), "b.rs".to_string()],
        );
        let prog = parse_with("ls *.rs", &mut exp).unwrap();
        let args = &prog.stmt(prog.head).chain.nodes[0].args;
        assert_eq!(args.len(), 3);
        assert_eq!(args[1].value, "a.rs");
        assert_eq!(args[2].value, "b.rs");
        assert_eq!(args[1].op, Opcode::Glob);
    }

    #[test]
    fn unmatched_glob_keeps_the_literal() {
        let prog = parse_str("ls *.none").unwrap();
        let args = &prog.stmt(prog.head).chain.nodes[0].args;
        assert_eq!(args[1].value, "*.none");
        assert_eq!(args[1].op, Opcode::Constant);
    }

    #[test]
    fn home_expansion_substitutes_at_parse_time() {
        let prog = parse_str("ls ~/src").unwrap();
        let args = &prog.stmt(prog.head).chain.nodes[0].args;
        assert_eq!(args[1].value, "/home/test/src");
    }

    #[test]
    fn variables_stay_deferred() {
        let prog = parse_str("echo $NAME").unwrap();
        let args = &prog.stmt(prog.head).chain.nodes[0].args;
        assert_eq!(args[1].op, Opcode::Variable);
        assert_eq!(args[1].value, "NAME");
    }

    #[test]
    fn if_shape_and_links() {
        let prog = parse_str("if true; then echo yes; fi").unwrap();
        assert_eq!(prog.shape, ProgramShape::If);

        let cond = prog.stmt(prog.head);
        assert_eq!(cond.kind, StatementKind::IfConditions);
        let body_id = cond.right.unwrap();
        let body = prog.stmt(body_id);
        assert_eq!(body.kind, StatementKind::If);
        assert_eq!(body.prev, Some(prog.head));
        assert!(cond.left.is_none());
    }

    #[test]
    fn if_else_shape() {
        let prog = parse_str("if true; then echo a; else echo b; fi").unwrap();
        assert_eq!(prog.shape, ProgramShape::IfElse);
        let cond = prog.stmt(prog.head);
        let els = prog.stmt(cond.left.unwrap());
        assert_eq!(els.kind, StatementKind::Else);
        assert_eq!(els.prev, Some(prog.head));
    }

    #[test]
    fn elif_chain_links_through_left() {
        let prog = parse_str(
            "if true; then echo a; elif false; then echo b; elif true; then echo c; else echo d; fi",
        )
        .unwrap();
        assert_eq!(prog.shape, ProgramShape::IfElifElse);

        let cond = prog.stmt(prog.head);
        let elif1 = prog.stmt(cond.left.unwrap());
        assert_eq!(elif1.kind, StatementKind::ElifConditions);
        let elif2 = prog.stmt(elif1.left.unwrap());
        assert_eq!(elif2.kind, StatementKind::ElifConditions);
        let els = prog.stmt(elif2.left.unwrap());
        assert_eq!(els.kind, StatementKind::Else);
    }

    #[test]
    fn while_loop_desugars_with_a_jump() {
        let prog = parse_str("while true; do echo tick; done").unwrap();
        assert_eq!(prog.shape, ProgramShape::While);

        let cond = prog.stmt(prog.head);
        assert_eq!(cond.kind, StatementKind::WhileConditions);
        let body_id = cond.right.unwrap();
        let body = prog.stmt(body_id);
        assert_eq!(body.kind, StatementKind::While);
        // body chain ends in the jump pseudo-command and loops back
        assert!(body.chain.nodes.last().unwrap().is_jump());
        assert_eq!(body.right, Some(prog.head));
    }

    #[test]
    fn c_style_for_threads_an_increment() {
        let prog = parse_str("for ((i=1;i<=5;i++)); do echo hi; done").unwrap();
        assert_eq!(prog.shape, ProgramShape::For);

        let init = prog.stmt(prog.head);
        assert_eq!(init.kind, StatementKind::ForInit);
        assert_eq!(init.chain.nodes[0].args[0].value, "i=1");
        assert_eq!(init.chain.nodes[0].args[0].op, Opcode::Math);

        let cond_id = init.right.unwrap();
        let cond = prog.stmt(cond_id);
        assert_eq!(cond.kind, StatementKind::ForConditions);
        assert_eq!(cond.chain.nodes[0].args[0].value, "i<=5");

        let body = prog.stmt(cond.right.unwrap());
        assert!(body.chain.nodes.last().unwrap().is_jump());

        let incr = prog.stmt(body.right.unwrap());
        assert_eq!(incr.kind, StatementKind::ForIncrement);
        assert_eq!(incr.chain.nodes[0].args[0].value, "i++");
        assert_eq!(incr.right, Some(cond_id));
    }

    #[test]
    fn for_each_stores_items_in_init() {
        let prog = parse_str("for f in a b c; do echo hi; done").unwrap();
        let init = prog.stmt(prog.head);
        let args = &init.chain.nodes[0].args;
        assert_eq!(args[0].value, "f");
        assert_eq!(args[0].op, Opcode::Variable);
        let items: Vec<&str> = args[1..].iter().map(|a| a.value.as_str()).collect();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_keywords_are_structured_errors() {
        assert!(matches!(
            parse_str("if true; echo hi; fi"),
            Err(VshError::MissingToken(_))
        ));
        assert!(matches!(
            parse_str("if true; then echo hi"),
            Err(VshError::MissingToken(_))
        ));
        assert!(matches!(
            parse_str("while true; echo hi; done"),
            Err(VshError::MissingToken(_))
        ));
        assert!(matches!(
            parse_str("while true; do echo hi"),
            Err(VshError::MissingToken(_))
        ));
        assert!(matches!(
            parse_str("for f in a b; do echo hi"),
            Err(VshError::MissingToken(_))
        ));
    }

    #[test]
    fn misplaced_keywords_are_errors() {
        assert!(matches!(
            parse_str("echo then"),
            Err(VshError::InvalidStatement(_))
        ));
        assert!(matches!(
            parse_str("done"),
            Err(VshError::InvalidStatement(_))
        ));
    }

    #[test]
    fn sequential_statements_link_right() {
        let prog = parse_str("echo one; echo two").unwrap();
        let first = prog.stmt(prog.head);
        let second = prog.stmt(first.right.unwrap());
        assert_eq!(second.kind, StatementKind::Normal);
        assert_eq!(second.chain.nodes[0].args[1].value, "two");
        assert!(second.right.is_none());
    }

    #[test]
    fn empty_input_is_an_empty_program() {
        let prog = parse_str("").unwrap();
        assert!(prog.is_empty());
    }
}
