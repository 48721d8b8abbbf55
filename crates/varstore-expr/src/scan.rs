//! Lexical pre-pass run before an expression reaches the parser.
//!
//! The parser and interpreter both recurse over the tree, so source that would
//! build a very deep tree is rejected here as a compile error instead of being
//! allowed to exhaust the stack. The pass also collects the names bound by
//! comprehension macros (`list.map(x, ...)`), which are not free variables.

use crate::CompileError;

/// Deepest bracket nesting, and longest run of prefix `-`/`!`, accepted.
pub const MAX_NESTING: usize = 64;

/// Most binary operators, member selections and index operations accepted.
pub const MAX_OPERATORS: usize = 256;

const MACROS: &[&str] = &["all", "exists", "exists_one", "filter", "map"];

#[derive(Debug, Default)]
pub(crate) struct Scan {
    /// Identifiers introduced by comprehension macros.
    pub bound: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    /// Start of input, after `(`, `[`, `{` or `,`.
    Open,
    /// After an operator, where a following `-` is unary.
    Operator,
    /// After `.`
    Dot,
    /// After an operand: literal, identifier or closing bracket.
    Operand,
}

pub(crate) fn scan(source: &str) -> Result<Scan, CompileError> {
    let bytes = source.as_bytes();
    let mut out = Scan::default();
    let mut prev = Prev::Open;
    let mut depth = 0usize;
    let mut unary_run = 0usize;
    let mut operators = 0usize;
    // Set once `.map` is seen; the identifier after its `(` is bound.
    let mut macro_call = false;
    let mut expect_bound = false;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c == b'"' || c == b'\'' {
            i = skip_string(bytes, i);
            unary_run = 0;
            prev = Prev::Operand;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let word = &source[start..i];
            if word == "in" {
                operators = count(operators, source, start)?;
                prev = Prev::Operator;
                continue;
            }
            if expect_bound {
                out.bound.push(word.to_string());
                expect_bound = false;
            }
            macro_call = prev == Prev::Dot && MACROS.contains(&word);
            unary_run = 0;
            prev = Prev::Operand;
            continue;
        }

        if c.is_ascii_digit() {
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_')
            {
                i += 1;
            }
            unary_run = 0;
            prev = Prev::Operand;
            continue;
        }

        i += 1;
        let next = bytes.get(i).copied();
        match c {
            b'(' | b'[' | b'{' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(too_complex(
                        source,
                        start,
                        format!("nesting deeper than {MAX_NESTING}"),
                    ));
                }
                if c == b'[' && prev == Prev::Operand {
                    operators = count(operators, source, start)?;
                }
                expect_bound = c == b'(' && macro_call;
                macro_call = false;
                prev = Prev::Open;
            }
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                unary_run = 0;
                prev = Prev::Operand;
            }
            b',' => prev = Prev::Open,
            b'.' => {
                operators = count(operators, source, start)?;
                prev = Prev::Dot;
            }
            b'-' | b'!' if next != Some(b'=') && prev != Prev::Operand => {
                unary_run += 1;
                if unary_run > MAX_NESTING {
                    return Err(too_complex(
                        source,
                        start,
                        format!("more than {MAX_NESTING} consecutive unary operators"),
                    ));
                }
                prev = Prev::Operator;
            }
            b':' => prev = Prev::Operator,
            _ => {
                // Two-character operators consume their second half.
                if matches!(
                    (c, next),
                    (b'=', Some(b'=')) | (b'!', Some(b'=')) | (b'<', Some(b'='))
                        | (b'>', Some(b'=')) | (b'&', Some(b'&')) | (b'|', Some(b'|'))
                ) {
                    i += 1;
                }
                operators = count(operators, source, start)?;
                prev = Prev::Operator;
            }
        }
    }

    Ok(out)
}

fn count(operators: usize, source: &str, offset: usize) -> Result<usize, CompileError> {
    let operators = operators + 1;
    if operators > MAX_OPERATORS {
        return Err(too_complex(
            source,
            offset,
            format!("more than {MAX_OPERATORS} operators"),
        ));
    }
    Ok(operators)
}

/// Index just past the string literal opening at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let triple = bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => {
                if !triple {
                    return i + 1;
                }
                if bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote) {
                    return i + 3;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

fn too_complex(source: &str, offset: usize, reason: String) -> CompileError {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let col = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    CompileError::TooComplex { line, col, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_expressions_pass() {
        for source in [
            "base + 5",
            "-x",
            "!(a && b)",
            "a != -b",
            "[1, 2, 3][0] - 1",
            "'a-b' + \"(((\"",
            "x in [1, 2]",
            "1e-5 * 2.0",
        ] {
            assert!(scan(source).is_ok(), "{source}");
        }
    }

    #[test]
    fn long_unary_chain_is_rejected() {
        let source = format!("{}1", "-".repeat(10_000));
        let err = scan(&source).unwrap_err();
        assert!(
            matches!(err, CompileError::TooComplex { line: 1, col: 65, .. }),
            "{err}"
        );
    }

    #[test]
    fn deep_brackets_are_rejected() {
        let source = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        assert!(matches!(scan(&source), Err(CompileError::TooComplex { .. })));

        let lists = format!("{}{}", "[".repeat(100), "]".repeat(100));
        assert!(matches!(scan(&lists), Err(CompileError::TooComplex { .. })));
    }

    #[test]
    fn nesting_at_the_limit_is_accepted() {
        let source = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(scan(&source).is_ok());
    }

    #[test]
    fn long_operator_chains_are_rejected() {
        let source = vec!["1"; 1_000].join(" + ");
        assert!(matches!(scan(&source), Err(CompileError::TooComplex { .. })));

        let selects = format!("a{}", ".b".repeat(1_000));
        assert!(matches!(scan(&selects), Err(CompileError::TooComplex { .. })));
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        let source = format!("'{}'", "(".repeat(1_000));
        assert!(scan(&source).is_ok());
        let triple = format!("'''{}'''", "-".repeat(1_000));
        assert!(scan(&triple).is_ok());
    }

    #[test]
    fn error_position_counts_lines() {
        let source = format!("1 +\n  {}2", "!".repeat(100));
        match scan(&source).unwrap_err() {
            CompileError::TooComplex { line, col, .. } => {
                assert_eq!(line, 2);
                assert_eq!(col, 3 + MAX_NESTING);
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn comprehension_variables_are_collected() {
        let scan = scan("items.map(x, x * 2).filter(y, y > 1) + [z]").unwrap();
        assert_eq!(scan.bound, ["x", "y"]);
    }
}
