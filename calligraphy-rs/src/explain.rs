//! Annotated listing of how each logical line was classified.
//!
//! ```text
//! PYTHON  | x = 5
//! SHELL   | echo hi
//! MIX     | name = $(whoami)
//! ```
//!
//! With [`ExplainStyle::Ansi`] labels and text are colored per language and
//! the substitutions on `MIX` rows are picked out in the shell color.

use std::fmt::Write as _;

use crossterm::style::{Color, Stylize};

use crate::classify::Classification;
use crate::normalize::{column_to_byte, restore, InlineSpan};

/// Width of the label column (`COMMENT` is the longest label).
const LABEL_WIDTH: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainStyle {
    Ansi,
    Plain,
}

fn color_of(class: Classification) -> Color {
    match class {
        Classification::Comment => Color::DarkGrey,
        Classification::Host => Color::Green,
        Classification::Shell => Color::Blue,
        Classification::Blended => Color::Cyan,
        Classification::Directive => Color::Magenta,
    }
}

/// Render one row per logical line.
///
/// Never fails: unterminated substitutions are shown running to the end of
/// their line.
pub fn explain(
    lines: &[&str],
    classes: &[Classification],
    spans: &[InlineSpan],
    style: ExplainStyle,
) -> String {
    let mut out = String::new();
    for (idx, (line, class)) in lines.iter().zip(classes).enumerate() {
        let label = format!("{:<LABEL_WIDTH$}", class.label());
        let text = match class {
            Classification::Blended => {
                let line_spans: Vec<&InlineSpan> = spans.iter().filter(|s| s.line == idx).collect();
                blended_text(line, &line_spans, style)
            }
            _ => paint(line, color_of(*class), style),
        };
        let _ = writeln!(out, "{} | {text}", paint(&label, color_of(*class), style));
    }
    restore(&out)
}

fn paint(text: &str, color: Color, style: ExplainStyle) -> String {
    match style {
        ExplainStyle::Plain => text.to_owned(),
        ExplainStyle::Ansi => text.with(color).to_string(),
    }
}

/// Host text in the host color, each substitution in the shell color.
fn blended_text(line: &str, spans: &[&InlineSpan], style: ExplainStyle) -> String {
    let host = color_of(Classification::Host);
    let shell = color_of(Classification::Shell);

    let mut out = String::with_capacity(line.len());
    let mut pos = 0;
    for span in spans {
        let Some(start) = column_to_byte(line, span.start) else { continue };
        let end = span
            .end
            .and_then(|end| column_to_byte(line, end))
            .unwrap_or(line.len());
        if start < pos || end < start {
            continue;
        }
        out.push_str(&paint(&line[pos..start], host, style));
        out.push_str(&paint(&line[start..end], shell, style));
        pos = end;
    }
    out.push_str(&paint(&line[pos..], host, style));
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
