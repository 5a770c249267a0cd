//! Per-line language classification.
//!
//! Every logical line is assigned exactly one [`Classification`].  The
//! decision is heuristic: it looks at the first meaningful token of the line,
//! the names collected in the [`ClassifierContext`], and whether the line is
//! an assignment.  Anything that shows no sign of being Python is treated as
//! a shell command.
//!
//! Order of checks for one line:
//!
//! 1. `#`, `"""` or `'''` at the start of the stripped line → [`Comment`].
//! 2. The line is split into parts by [`split_parts`].
//! 3. The first part is a decorator, a Python keyword, a known variable or
//!    proxy, an import, a function, or a builtin called with `(` →
//!    provisionally Python.
//! 4. Otherwise, if the line is `targets = value` with plain identifier
//!    targets and a non-empty value, the targets become known variables
//!    and the line is Python.
//! 5. Python lines holding an inline substitution are [`Blended`].
//! 6. Lines starting with `source` are [`Directive`]; everything else is
//!    [`Shell`].
//!
//! [`Comment`]: Classification::Comment
//! [`Blended`]: Classification::Blended
//! [`Directive`]: Classification::Directive
//! [`Shell`]: Classification::Shell

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use crate::context::ClassifierContext;
use crate::normalize::{column_to_byte, InlineSpan};

/// Python keywords that can open a statement.
///
/// The soft keywords `match`, `case` and `type` are left out: `case` and
/// `type` are far more common as shell words.
pub const HOST_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Builtin functions; these only count when immediately called.
pub const HOST_BUILTINS: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "breakpoint", "bytearray", "bytes",
    "callable", "chr", "classmethod", "compile", "complex", "delattr", "dict", "dir",
    "divmod", "enumerate", "eval", "exec", "exit", "filter", "float", "format", "frozenset",
    "getattr", "globals", "hasattr", "hash", "help", "hex", "id", "input", "int",
    "isinstance", "issubclass", "iter", "len", "list", "locals", "map", "max", "memoryview",
    "min", "next", "object", "oct", "open", "ord", "pow", "print", "property", "quit",
    "range", "repr", "reversed", "round", "set", "setattr", "slice", "sorted",
    "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
];

/// Stands in for an inline substitution while looking for `=`.
const SPAN_PLACEHOLDER: &str = "\u{FFFC}";

// ── Classification ────────────────────────────────────────────────────────────

/// The language a logical line is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Comment,
    /// Python.
    Host,
    /// A shell command.
    Shell,
    /// Python containing an inline shell substitution.
    Blended,
    /// `source` directive.
    Directive,
}

impl Classification {
    /// Tag shown by the explainer.
    pub fn label(self) -> &'static str {
        match self {
            Classification::Comment => "COMMENT",
            Classification::Host => "PYTHON",
            Classification::Shell => "SHELL",
            Classification::Blended => "MIX",
            Classification::Directive => "SOURCE",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Line classification ───────────────────────────────────────────────────────

/// Classify `lines` in order.
///
/// `spans` holds the inline substitutions of the whole file; each line only
/// looks at the spans whose `line` matches its index.  `ctx` grows as
/// assignments are seen.
pub fn classify(
    lines: &[&str],
    spans: &[InlineSpan],
    ctx: &mut ClassifierContext,
) -> Vec<Classification> {
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let line_spans: Vec<InlineSpan> =
                spans.iter().filter(|s| s.line == idx).copied().collect();
            let class = classify_line(line, &line_spans, ctx);
            trace!(line = idx + 1, class = %class, "classified");
            class
        })
        .collect()
}

/// Classify a single logical line.
///
/// `spans` must be the inline substitutions located on this line.
pub fn classify_line(
    line: &str,
    spans: &[InlineSpan],
    ctx: &mut ClassifierContext,
) -> Classification {
    let stripped = line.trim_start();
    if stripped.is_empty()
        || stripped.starts_with('#')
        || stripped.starts_with("\"\"\"")
        || stripped.starts_with("'''")
    {
        return Classification::Comment;
    }

    let has_span = !spans.is_empty();
    let parts = split_parts(stripped);

    if starts_with_host_name(&parts, ctx) {
        return if has_span {
            Classification::Blended
        } else {
            Classification::Host
        };
    }

    let masked = mask_spans(line, spans);
    if let Some((lhs, rhs)) = masked.split_once('=') {
        if let Some(targets) = assignment_targets(lhs).filter(|_| !rhs.trim().is_empty()) {
            for name in targets {
                ctx.variables.insert(name);
            }
            return if has_span {
                Classification::Blended
            } else {
                Classification::Host
            };
        }
    }

    if is_directive(stripped) {
        Classification::Directive
    } else {
        Classification::Shell
    }
}

/// `source` followed by whitespace or `(`.
pub fn is_directive(stripped: &str) -> bool {
    stripped
        .strip_prefix("source")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_whitespace() || c == '(')
}

fn starts_with_host_name(parts: &[&str], ctx: &ClassifierContext) -> bool {
    let Some(first) = parts.first() else { return false };
    // A decorator is never a shell command.
    if let Some(name) = first.strip_prefix('@') {
        return name.starts_with(|c: char| c.is_alphabetic() || c == '_');
    }
    let name = *first;

    HOST_KEYWORDS.contains(&name)
        || ctx.variables.contains(name)
        || ctx.imports.contains(name)
        || ctx.functions.contains(name)
        || (HOST_BUILTINS.contains(&name) && parts.get(1).is_some_and(|p| p.starts_with('(')))
}

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\(?\s*([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*,?\s*\)?\s*$")
            .expect("assignment regex is valid")
    })
}

/// Identifiers on the left of an assignment, or `None` if `lhs` is not a
/// plain (optionally parenthesized) comma list of names.
fn assignment_targets(lhs: &str) -> Option<Vec<&str>> {
    let caps = assignment_re().captures(lhs)?;
    let list = caps.get(1)?.as_str();
    Some(list.split(',').map(str::trim).collect())
}

/// `line` with every inline substitution replaced by a placeholder.
fn mask_spans(line: &str, spans: &[InlineSpan]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pos = 0;
    for span in spans {
        let Some(start) = column_to_byte(line, span.start) else { continue };
        let end = span
            .end
            .and_then(|end| column_to_byte(line, end))
            .unwrap_or(line.len());
        if start < pos {
            continue;
        }
        out.push_str(&line[pos..start]);
        out.push_str(SPAN_PLACEHOLDER);
        pos = end;
    }
    out.push_str(&line[pos..]);
    out
}

// ── Part splitter ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokState {
    Between,
    Word { start: usize },
    /// Inside a bracketed run; `quote` is an open string within it.
    Group { start: usize, depth: usize, quote: Option<char> },
    Quoted { start: usize, quote: char },
}

fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || ch == '.' || ch == ':'
}

fn is_opener(ch: char) -> bool {
    matches!(ch, '(' | '[' | '{')
}

fn is_closer(ch: char) -> bool {
    matches!(ch, ')' | ']' | '}')
}

/// Split a line into parts on whitespace, `.` and `:`.
///
/// A bracketed run (`(...)`, `[...]`, `{...}`) or a quoted string is kept as
/// one part even when it contains separators, and always starts a new part:
///
/// ```
/// use calligraphy::classify::split_parts;
///
/// assert_eq!(split_parts("os.path.join(a, b)"), vec!["os", "path", "join", "(a, b)"]);
/// assert_eq!(split_parts("else:"), vec!["else"]);
/// ```
pub fn split_parts(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut state = TokState::Between;
    let mut escaped = false;

    for (i, ch) in line.char_indices() {
        let was_escaped = std::mem::take(&mut escaped);
        state = match state {
            TokState::Between | TokState::Word { .. } => {
                let word_start = match state {
                    TokState::Word { start } => Some(start),
                    _ => None,
                };
                let starts_new_part = is_separator(ch) || is_opener(ch) || ch == '"' || ch == '\'';
                if starts_new_part {
                    if let Some(start) = word_start {
                        parts.push(&line[start..i]);
                    }
                }
                if is_separator(ch) {
                    TokState::Between
                } else if is_opener(ch) {
                    TokState::Group { start: i, depth: 1, quote: None }
                } else if ch == '"' || ch == '\'' {
                    TokState::Quoted { start: i, quote: ch }
                } else {
                    TokState::Word { start: word_start.unwrap_or(i) }
                }
            }
            TokState::Group { start, depth, quote: Some(q) } => {
                if ch == '\\' && !was_escaped {
                    escaped = true;
                    state
                } else if ch == q && !was_escaped {
                    TokState::Group { start, depth, quote: None }
                } else {
                    state
                }
            }
            TokState::Group { start, depth, quote: None } => {
                if ch == '"' || ch == '\'' {
                    TokState::Group { start, depth, quote: Some(ch) }
                } else if is_opener(ch) {
                    TokState::Group { start, depth: depth + 1, quote: None }
                } else if is_closer(ch) && depth == 1 {
                    parts.push(&line[start..i + ch.len_utf8()]);
                    TokState::Between
                } else if is_closer(ch) {
                    TokState::Group { start, depth: depth - 1, quote: None }
                } else {
                    state
                }
            }
            TokState::Quoted { start, quote } => {
                if ch == '\\' && !was_escaped {
                    escaped = true;
                    state
                } else if ch == quote && !was_escaped {
                    parts.push(&line[start..i + ch.len_utf8()]);
                    TokState::Between
                } else {
                    state
                }
            }
        };
    }

    match state {
        TokState::Between => {}
        TokState::Word { start }
        | TokState::Group { start, .. }
        | TokState::Quoted { start, .. } => parts.push(&line[start..]),
    }
    parts
}

// ── Tests ─────────────────────────────────────────────────────────────────────
