//! In-process numeric comparison conditions
//!
//! Condition nodes shaped like `[ $a -eq 5 ]` never fork: both operands
//! are parsed as integers and compared directly. `-eq/-lt/-le/-gt/-ge`
//! are supported; any other comparison operator is a reported, non-fatal
//! error that evaluates to failure.

use crate::ast::ChainNode;
use crate::exec::ExitStatus;
use crate::expand::Expander;
use crate::lexer::Opcode;

/// True when the node carries a comparison operator in any position.
pub(crate) fn is_compare_node(node: &ChainNode) -> bool {
    node.args.iter().any(|a| a.op.is_comparison())
}

/// Evaluate a comparison node. Bracket and `test` dressing around the
/// operands is ignored; operands that do not parse as integers count as 0.
pub(crate) fn eval(node: &ChainNode, env: &dyn Expander) -> ExitStatus {
    let operands: Vec<(String, Opcode)> = node
        .args
        .iter()
        .filter(|a| !matches!(a.value.as_str(), "[" | "]" | "test"))
        .map(|a| {
            let value = if a.op == Opcode::Variable {
                env.expand_variable(&a.value).unwrap_or_default()
            } else {
                a.value.clone()
            };
            (value, a.op)
        })
        .collect();

    let [(lhs, _), (op_text, op), (rhs, _)] = operands.as_slice() else {
        eprintln!("vsh: malformed comparison");
        return ExitStatus::FAILURE;
    };

    let a: i64 = lhs.trim().parse().unwrap_or(0);
    let b: i64 = rhs.trim().parse().unwrap_or(0);

    let result = match op {
        Opcode::CmpEq => a == b,
        Opcode::CmpLt => a < b,
        Opcode::CmpLe => a <= b,
        Opcode::CmpGt => a > b,
        Opcode::CmpGe => a >= b,
        _ => {
            // -ne and friends are recognized but not supported
            tracing::warn!(op = %op_text, "unsupported comparison operator");
            eprintln!("vsh: unsupported comparison operator: {op_text}");
            return ExitStatus::FAILURE;
        }
    };

    if result {
        ExitStatus::SUCCESS
    } else {
        ExitStatus::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Arg, ChainOp};
    use crate::expand::Env;

    fn node(parts: &[(&str, Opcode)]) -> ChainNode {
        let mut node = ChainNode::new(ChainOp::None);
        for (value, op) in parts {
            node.args.push(Arg::new(*value, *op));
        }
        node
    }

    #[test]
    fn detects_comparison_nodes() {
        let n = node(&[
            ("[", Opcode::Glob),
            ("1", Opcode::Number),
            ("-eq", Opcode::CmpEq),
            ("1", Opcode::Number),
            ("]", Opcode::Constant),
        ]);
        assert!(is_compare_node(&n));

        let plain = node(&[("echo", Opcode::Constant), ("hi", Opcode::Constant)]);
        assert!(!is_compare_node(&plain));
    }

    #[test]
    fn supported_operators() {
        let env = Env::new();
        let cases = [
            ("1", Opcode::CmpEq, "1", true),
            ("1", Opcode::CmpEq, "2", false),
            ("1", Opcode::CmpLt, "2", true),
            ("2", Opcode::CmpLe, "2", true),
            ("3", Opcode::CmpGt, "2", true),
            ("1", Opcode::CmpGe, "2", false),
        ];
        for (lhs, op, rhs, expect) in cases {
            let n = node(&[
                (lhs, Opcode::Number),
                ("-op", op),
                (rhs, Opcode::Number),
            ]);
            assert_eq!(eval(&n, &env).is_success(), expect, "{lhs} {op:?} {rhs}");
        }
    }

    #[test]
    fn brackets_are_ignored() {
        let mut env = Env::new();
        env.assign_variable("count", "5");
        let n = node(&[
            ("[", Opcode::Glob),
            ("count", Opcode::Variable),
            ("-ge", Opcode::CmpGe),
            ("3", Opcode::Number),
            ("]", Opcode::Constant),
        ]);
        assert!(eval(&n, &env).is_success());
    }

    #[test]
    fn unsupported_operator_fails_without_panicking() {
        let env = Env::new();
        let n = node(&[
            ("1", Opcode::Number),
            ("-ne", Opcode::CmpNe),
            ("2", Opcode::Number),
        ]);
        assert!(!eval(&n, &env).is_success());
    }

    #[test]
    fn non_numeric_operands_compare_as_zero() {
        let env = Env::new();
        let n = node(&[
            ("junk", Opcode::Constant),
            ("-eq", Opcode::CmpEq),
            ("0", Opcode::Number),
        ]);
        assert!(eval(&n, &env).is_success());
    }
}
