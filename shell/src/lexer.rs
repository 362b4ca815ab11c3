//! Lexer for vsh
//!
//! Tokenizes shell input into a stream of classified lexemes in a single
//! left-to-right scan. The scanner keeps its quoting/expansion state in a
//! local bitmask and never fails hard: oversized input yields an empty
//! sequence, and unbalanced quotes or dangling expansion markers degrade
//! to literal text.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Longest accepted input line, in bytes.
pub const MAX_INPUT_LEN: usize = 4096;
/// Most lexemes a single line may produce.
pub const MAX_LEXEMES: usize = 512;

/// Classification attached to each lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    /// Bare word, quoted span, or anything that matched no other class
    Constant,
    /// Integer literal (optional leading minus)
    Number,

    // Operators
    Pipe,       // |
    Background, // &
    And,        // &&
    Or,         // ||
    Semicolon,  // ;

    // Redirections
    RedirOut,        // >
    RedirOutAppend,  // >>
    RedirIn,         // <
    RedirInAppend,   // <<
    RedirErr,        // 2>
    RedirErrAppend,  // 2>>
    RedirBoth,       // &>
    RedirBothAppend, // &>>

    // Assignment
    Assign, // =

    // Math operators (standalone words; math expressions keep their
    // interior as text and are evaluated in-process)
    Plus,    // +
    Minus,   // -
    Percent, // %
    Power,   // **

    // Comparisons
    CmpEq, // -eq, ==
    CmpNe, // -ne
    CmpLt, // -lt
    CmpLe, // -le
    CmpGt, // -gt
    CmpGe, // -ge

    // Keywords
    If,
    Then,
    Elif,
    Else,
    Fi,
    While,
    For,
    Do,
    Done,
    In,
    True,
    False,

    // Expansion markers
    Variable, // $NAME
    Home,     // ~ or ~/path
    Glob,     // word containing * ? [
    Math,     // $(expr), ((expr))

    /// Synthetic loop re-entry marker; never produced by the lexer,
    /// appended to loop body chains by the parser.
    Jump,
}

impl Opcode {
    /// True for the eight redirection operators.
    pub fn is_redirect(self) -> bool {
        matches!(
            self,
            Opcode::RedirOut
                | Opcode::RedirOutAppend
                | Opcode::RedirIn
                | Opcode::RedirInAppend
                | Opcode::RedirErr
                | Opcode::RedirErrAppend
                | Opcode::RedirBoth
                | Opcode::RedirBothAppend
        )
    }

    /// True for `-eq`-family and `==` comparison operators.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Opcode::CmpEq
                | Opcode::CmpNe
                | Opcode::CmpLt
                | Opcode::CmpLe
                | Opcode::CmpGt
                | Opcode::CmpGe
        )
    }

    /// True for lexemes that can stand in an argv position.
    pub fn is_value(self) -> bool {
        matches!(
            self,
            Opcode::Constant
                | Opcode::Number
                | Opcode::Variable
                | Opcode::Home
                | Opcode::Glob
                | Opcode::Math
                | Opcode::True
                | Opcode::False
        )
    }
}

/// One classified token: opcode plus the input slice it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme<'a> {
    pub op: Opcode,
    pub text: &'a str,
}

impl<'a> Lexeme<'a> {
    fn new(op: Opcode, text: &'a str) -> Self {
        Self { op, text }
    }
}

bitflags! {
    /// Scanner state, local to one `lex` call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct LexState: u16 {
        const SINGLE_QUOTE   = 1 << 0;
        const DOUBLE_QUOTE   = 1 << 1;
        const BACKTICK       = 1 << 2;
        const MATH_EXPR      = 1 << 3;
        const ASSIGNMENT     = 1 << 4;
        const HOME_EXPANSION = 1 << 5;
        const GLOB_EXPANSION = 1 << 6;
        const COMMENT        = 1 << 7;
        const DOLLAR         = 1 << 8;
    }
}

/// Lex one line of input.
///
/// Returns an empty sequence for empty/whitespace-only input, input longer
/// than [`MAX_INPUT_LEN`], or input producing more than [`MAX_LEXEMES`]
/// tokens. Never panics on malformed input.
pub fn lex(input: &str) -> Vec<Lexeme<'_>> {
    if input.len() > MAX_INPUT_LEN {
        tracing::debug!(len = input.len(), "input over length limit, dropping");
        return Vec::new();
    }
    if input.trim().is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    if scan(input, &mut out) {
        out
    } else {
        tracing::debug!("input over lexeme limit, dropping");
        Vec::new()
    }
}

/// Lex a pre-split argv array (noninteractive mode).
///
/// Each element is lexed independently and the sequences are concatenated,
/// under the same overall limits as [`lex`].
pub fn lex_args(args: &[String]) -> Vec<Lexeme<'_>> {
    let total: usize = args.iter().map(String::len).sum();
    if total > MAX_INPUT_LEN {
        return Vec::new();
    }

    let mut out = Vec::new();
    for arg in args {
        if !scan(arg, &mut out) {
            return Vec::new();
        }
    }
    out
}

/// Single left-to-right scan. Returns false if the lexeme budget is
/// exhausted; `out` holds everything lexed so far in that case.
fn scan<'a>(input: &'a str, out: &mut Vec<Lexeme<'a>>) -> bool {
    let bytes = input.as_bytes();
    let mut state = LexState::empty();
    let mut i = 0usize;
    let mut start = 0usize;

    macro_rules! flush_word {
        () => {
            if start < i {
                let op = classify(&input[start..i], state);
                out.push(Lexeme::new(op, &input[start..i]));
                if out.len() > MAX_LEXEMES {
                    return false;
                }
            }
            state.remove(
                LexState::DOLLAR
                    | LexState::HOME_EXPANSION
                    | LexState::GLOB_EXPANSION
                    | LexState::ASSIGNMENT,
            );
        };
    }

    macro_rules! push_op {
        ($op:expr, $from:expr, $len:expr) => {
            out.push(Lexeme::new($op, &input[$from..$from + $len]));
            if out.len() > MAX_LEXEMES {
                return false;
            }
        };
    }

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' => {
                flush_word!();
                i += 1;
                start = i;
            }

            // Comment runs to end of input; only at a word boundary.
            b'#' if start == i => {
                state.insert(LexState::COMMENT);
                break;
            }

            // Quoted spans become a single constant lexeme. An unbalanced
            // quote degrades: the quote char joins the surrounding word.
            b'\'' | b'"' | b'`' if start == i => {
                let flag = match c {
                    b'\'' => LexState::SINGLE_QUOTE,
                    b'"' => LexState::DOUBLE_QUOTE,
                    _ => LexState::BACKTICK,
                };
                state.insert(flag);
                if let Some(off) = bytes[i + 1..].iter().position(|&b| b == c) {
                    let inner = &input[i + 1..i + 1 + off];
                    out.push(Lexeme::new(Opcode::Constant, inner));
                    if out.len() > MAX_LEXEMES {
                        return false;
                    }
                    i += off + 2;
                    start = i;
                } else {
                    i += 1;
                }
                state.remove(flag);
            }

            b'|' => {
                flush_word!();
                if bytes.get(i + 1) == Some(&b'|') {
                    push_op!(Opcode::Or, i, 2);
                    i += 2;
                } else {
                    push_op!(Opcode::Pipe, i, 1);
                    i += 1;
                }
                start = i;
            }

            b'&' => {
                flush_word!();
                match (bytes.get(i + 1), bytes.get(i + 2)) {
                    (Some(&b'&'), _) => {
                        push_op!(Opcode::And, i, 2);
                        i += 2;
                    }
                    (Some(&b'>'), Some(&b'>')) => {
                        push_op!(Opcode::RedirBothAppend, i, 3);
                        i += 3;
                    }
                    (Some(&b'>'), _) => {
                        push_op!(Opcode::RedirBoth, i, 2);
                        i += 2;
                    }
                    _ => {
                        push_op!(Opcode::Background, i, 1);
                        i += 1;
                    }
                }
                start = i;
            }

            b'>' => {
                // A pending bare "2" merges into the stderr redirections.
                let err = &input[start..i] == "2";
                let from = if err { start } else { i };
                if !err {
                    flush_word!();
                }
                if bytes.get(i + 1) == Some(&b'>') {
                    push_op!(
                        if err {
                            Opcode::RedirErrAppend
                        } else {
                            Opcode::RedirOutAppend
                        },
                        from,
                        if err { 3 } else { 2 }
                    );
                    i += 2;
                } else {
                    push_op!(
                        if err { Opcode::RedirErr } else { Opcode::RedirOut },
                        from,
                        if err { 2 } else { 1 }
                    );
                    i += 1;
                }
                start = i;
            }

            b'<' => {
                flush_word!();
                if bytes.get(i + 1) == Some(&b'<') {
                    push_op!(Opcode::RedirInAppend, i, 2);
                    i += 2;
                } else {
                    push_op!(Opcode::RedirIn, i, 1);
                    i += 1;
                }
                start = i;
            }

            b';' => {
                flush_word!();
                push_op!(Opcode::Semicolon, i, 1);
                i += 1;
                start = i;
            }

            b'=' => {
                flush_word!();
                if bytes.get(i + 1) == Some(&b'=') {
                    push_op!(Opcode::CmpEq, i, 2);
                    i += 2;
                } else {
                    state.insert(LexState::ASSIGNMENT);
                    push_op!(Opcode::Assign, i, 1);
                    i += 1;
                }
                start = i;
            }

            // $( expr ) and (( expr )) capture their balanced interior as
            // one math lexeme; unbalanced parens degrade to literal text.
            b'$' if bytes.get(i + 1) == Some(&b'(') => {
                flush_word!();
                state.insert(LexState::MATH_EXPR);
                if let Some((end, inner)) = capture_math(input, i + 1) {
                    out.push(Lexeme::new(Opcode::Math, inner));
                    if out.len() > MAX_LEXEMES {
                        return false;
                    }
                    i = end;
                } else {
                    // unbalanced: the dollar degrades to literal text
                    i += 1;
                }
                start = i;
                state.remove(LexState::MATH_EXPR);
            }

            b'(' => {
                flush_word!();
                if bytes.get(i + 1) == Some(&b'(') {
                    state.insert(LexState::MATH_EXPR);
                    if let Some((end, inner)) = capture_math(input, i) {
                        out.push(Lexeme::new(Opcode::Math, inner));
                        if out.len() > MAX_LEXEMES {
                            return false;
                        }
                        i = end;
                        start = i;
                    } else {
                        push_op!(Opcode::Constant, i, 1);
                        i += 1;
                        start = i;
                    }
                    state.remove(LexState::MATH_EXPR);
                } else {
                    push_op!(Opcode::Constant, i, 1);
                    i += 1;
                    start = i;
                }
            }

            b')' => {
                flush_word!();
                push_op!(Opcode::Constant, i, 1);
                i += 1;
                start = i;
            }

            _ => {
                if start == i {
                    match c {
                        b'$' => state.insert(LexState::DOLLAR),
                        b'~' => state.insert(LexState::HOME_EXPANSION),
                        _ => {}
                    }
                }
                if matches!(c, b'*' | b'?' | b'[') {
                    state.insert(LexState::GLOB_EXPANSION);
                }
                i += 1;
            }
        }
    }

    if !state.contains(LexState::COMMENT) {
        flush_word!();
    }
    true
}

/// Capture a balanced-paren span starting at `open_idx` (which must point
/// at `(`). Returns the index past the closing paren and the interior with
/// one wrapping paren layer stripped.
fn capture_math(input: &str, open_idx: usize) -> Option<(usize, &str)> {
    let bytes = input.as_bytes();
    let mut depth = 0usize;
    let mut j = open_idx;
    while j < bytes.len() {
        match bytes[j] {
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let inner = &input[open_idx + 1..j];
                    return Some((j + 1, strip_wrapping_parens(inner)));
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

/// Strip one layer of parens if the first paren matches the last.
fn strip_wrapping_parens(s: &str) -> &str {
    let t = s.trim();
    if !t.starts_with('(') || !t.ends_with(')') || t.len() < 2 {
        return t;
    }
    let mut depth = 0usize;
    for (idx, b) in t.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && idx != t.len() - 1 {
                    return t; // first paren closes early
                }
            }
            _ => {}
        }
    }
    t[1..t.len() - 1].trim()
}

/// Classify an accumulated word. Variable references are detected before
/// the length-based operator/keyword dispatch; the two- and three-char
/// tables are scanned linearly.
fn classify(text: &str, state: LexState) -> Opcode {
    if text.len() > 2 && text.starts_with('$') && is_name(&text[1..]) {
        return Opcode::Variable;
    }

    const TABLE_2: [(&str, Opcode); 5] = [
        ("if", Opcode::If),
        ("fi", Opcode::Fi),
        ("do", Opcode::Do),
        ("in", Opcode::In),
        ("**", Opcode::Power),
    ];
    const TABLE_3: [(&str, Opcode); 7] = [
        ("-eq", Opcode::CmpEq),
        ("-ne", Opcode::CmpNe),
        ("-lt", Opcode::CmpLt),
        ("-le", Opcode::CmpLe),
        ("-gt", Opcode::CmpGt),
        ("-ge", Opcode::CmpGe),
        ("for", Opcode::For),
    ];
    const KEYWORDS_4_5: [(&str, Opcode); 7] = [
        ("then", Opcode::Then),
        ("else", Opcode::Else),
        ("done", Opcode::Done),
        ("true", Opcode::True),
        ("elif", Opcode::Elif),
        ("while", Opcode::While),
        ("false", Opcode::False),
    ];

    match text.len() {
        1 => match text.as_bytes()[0] {
            b'+' => return Opcode::Plus,
            b'-' => return Opcode::Minus,
            b'%' => return Opcode::Percent,
            b'*' | b'?' | b'[' => return Opcode::Glob,
            b'~' => return Opcode::Home,
            _ => {}
        },
        2 => {
            for (lit, op) in TABLE_2 {
                if text == lit {
                    return op;
                }
            }
        }
        3 => {
            for (lit, op) in TABLE_3 {
                if text == lit {
                    return op;
                }
            }
        }
        4 | 5 => {
            for (lit, op) in KEYWORDS_4_5 {
                if text == lit {
                    return op;
                }
            }
        }
        _ => {}
    }

    if is_number(text) {
        Opcode::Number
    } else if state.contains(LexState::HOME_EXPANSION) || text.starts_with('~') {
        Opcode::Home
    } else if state.contains(LexState::GLOB_EXPANSION) || contains_glob(text) {
        Opcode::Glob
    } else {
        Opcode::Constant
    }
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn is_number(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn contains_glob(s: &str) -> bool {
    s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
}
