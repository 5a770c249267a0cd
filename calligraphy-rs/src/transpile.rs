//! Rewrite classified lines into plain Python.
//!
//! | Classification | Output |
//! |----------------|--------|
//! | `Comment`   | the line, unchanged |
//! | `Host`      | the line with `$?` → `RC` and `$N` → `sys.argv[N]` |
//! | `Shell`     | `shell("<base64 command>", format_dict=locals())` |
//! | `Blended`   | each `$(…)` replaced by a `shell(…)` call returning stdout or the exit code |
//! | `Directive` | an expanded `source(…)` call passes through; anything else runs as shell |
//!
//! Commands are base64 encoded so that quoting in the shell text can never
//! break the Python string literal around it; the runtime decodes them.
//! Masked newlines are turned back into real ones only in the finished text
//! (and in each command just before it is encoded), never earlier.

use std::sync::OnceLock;

use base64::{engine::general_purpose, Engine as _};
use regex::{Captures, Regex};
use tracing::debug;

use crate::classify::Classification;
use crate::error::CompileError;
use crate::normalize::{column_to_byte, restore, InlineSpan};

/// Environment variable holding the last exit code, as seen by shell text.
pub const RC_ENV_VAR: &str = "CALLIGRAPHY_RC";

/// Python name of the last exit code.
pub const RC_NAME: &str = "RC";

/// Keywords that make an inline substitution yield its exit code.
const CONDITION_KEYWORDS: &[&str] = &["if", "elif", "while"];

// ── Entry point ───────────────────────────────────────────────────────────────

/// Transpile classified logical lines into Python source.
///
/// `lines`, `classes` and the `line` field of each span all use the same
/// logical-line indices.  Fails if any substitution is unterminated, even on a
/// line that would not use it, so that malformed input never produces output.
pub fn transpile(
    lines: &[&str],
    classes: &[Classification],
    spans: &[InlineSpan],
) -> Result<String, CompileError> {
    if let Some(open) = spans.iter().find(|s| !s.is_terminated()) {
        return Err(CompileError::UnterminatedSubstitution {
            line: open.line + 1,
            column: open.start,
        });
    }

    let mut out = String::new();
    for (idx, (line, class)) in lines.iter().zip(classes).enumerate() {
        let emitted = match class {
            Classification::Comment => (*line).to_owned(),
            Classification::Host => rewrite_host(line),
            Classification::Shell => shell_statement(line),
            Classification::Blended => {
                let line_spans: Vec<&InlineSpan> = spans.iter().filter(|s| s.line == idx).collect();
                rewrite_blended(idx, line, &line_spans)?
            }
            Classification::Directive => {
                if line.trim_start().starts_with("source(") {
                    (*line).to_owned()
                } else {
                    shell_statement(line)
                }
            }
        };
        out.push_str(&emitted);
        out.push('\n');
    }

    debug!(lines = lines.len(), "transpiled");
    Ok(restore(&out))
}

// ── Host lines ────────────────────────────────────────────────────────────────

fn host_rc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\?").expect("rc regex is valid"))
}

fn positional_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(\d+)").expect("positional regex is valid"))
}

/// Apply the `$?` and `$N` shorthands to a Python line.
pub fn rewrite_host(line: &str) -> String {
    let line = host_rc_re().replace_all(line, RC_NAME);
    positional_re()
        .replace_all(&line, |caps: &Captures| format!("sys.argv[{}]", &caps[1]))
        .into_owned()
}

// ── Shell lines ───────────────────────────────────────────────────────────────

fn env_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(^|[^\w./])env\.(\w+)").expect("env regex is valid"))
}

/// Prepare shell text for the runtime: `env.NAME` becomes `${NAME}`, `$?`
/// outside single quotes reads [`RC_ENV_VAR`], and masked newlines are
/// restored.
pub fn shell_command(text: &str) -> String {
    let text = env_re().replace_all(text, |caps: &Captures| format!("{}${{{}}}", &caps[1], &caps[2]));
    restore(&replace_shell_rc(&text))
}

/// `base64` of `cmd`, ready to drop into a Python string literal.
pub fn encode_command(cmd: &str) -> String {
    general_purpose::STANDARD.encode(cmd.as_bytes())
}

fn shell_statement(line: &str) -> String {
    let command = line.trim_start();
    let indent = &line[..line.len() - command.len()];
    let encoded = encode_command(&shell_command(command));
    format!("{indent}shell(\"{encoded}\", format_dict=locals())")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Unquoted,
    Single,
    Double,
}

/// Replace `$?` with `${CALLIGRAPHY_RC}` except inside single quotes.
fn replace_shell_rc(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = QuoteState::Unquoted;
    let mut escaped = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        let was_escaped = std::mem::take(&mut escaped);
        match (state, ch) {
            (QuoteState::Single, '\'') => state = QuoteState::Unquoted,
            (QuoteState::Single, _) => {}
            (_, '\\') if !was_escaped => escaped = true,
            (QuoteState::Unquoted, '\'') if !was_escaped => state = QuoteState::Single,
            (QuoteState::Unquoted, '"') if !was_escaped => state = QuoteState::Double,
            (QuoteState::Double, '"') if !was_escaped => state = QuoteState::Unquoted,
            (_, '$') if !was_escaped && chars.peek() == Some(&'?') => {
                chars.next();
                out.push_str("${");
                out.push_str(RC_ENV_VAR);
                out.push('}');
                continue;
            }
            _ => {}
        }
        out.push(ch);
    }
    out
}

// ── Blended lines ─────────────────────────────────────────────────────────────

/// Replace every substitution on a mixed line with a `shell(…)` call.
///
/// Spans are rewritten right to left so earlier column offsets stay valid.
fn rewrite_blended(idx: usize, line: &str, spans: &[&InlineSpan]) -> Result<String, CompileError> {
    let missing = || CompileError::MissingSubstitution { line: idx + 1 };
    if spans.is_empty() {
        return Err(missing());
    }

    let mut ordered: Vec<&InlineSpan> = spans.to_vec();
    ordered.sort_by_key(|s| std::cmp::Reverse(s.start));

    let mut out = line.to_owned();
    for span in ordered {
        let end_col = span.end.ok_or(CompileError::UnterminatedSubstitution {
            line: idx + 1,
            column: span.start,
        })?;
        let start = column_to_byte(line, span.start).ok_or_else(missing)?;
        let end = column_to_byte(line, end_col).ok_or_else(missing)?;
        // Prefix character plus `(`, and the closing `)`.
        if end < start + 3 {
            return Err(missing());
        }

        let inner = &line[start + 2..end - 1];
        let wants_rc = line[..start]
            .split_whitespace()
            .any(|tok| CONDITION_KEYWORDS.contains(&tok));
        let call = format!(
            "shell(\"{}\", {}=True, silent={}, format_dict=locals())",
            encode_command(&shell_command(inner)),
            if wants_rc { "get_rc" } else { "get_stdout" },
            if span.kind.is_silent() { "True" } else { "False" },
        );
        out.replace_range(start..end, &call);
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
