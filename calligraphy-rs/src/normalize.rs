//! Newline normalization and inline-substitution discovery.
//!
//! A Calligraphy script is split into *logical lines* before anything else
//! looks at it.  A physical newline is only a logical-line boundary when it
//! sits outside every open bracket, outside a double-quoted string and is not
//! escaped by a trailing backslash.  Every other newline is replaced by
//! [`SENTINEL`] so that a plain `split('\n')` yields whole statements:
//!
//! ```text
//! values = [            values = [<NL>    1,<NL>    2,<NL>]
//!     1,          →
//!     2,
//! ]
//! ```
//!
//! While scanning, the normalizer also records where each inline shell
//! substitution (`$(...)`, `?(...)`, `!(...)`) starts and ends, in
//! logical-line coordinates.  Columns count code points from the start of the
//! logical line; a masked newline counts as a single column, exactly like the
//! character it replaced.
//!
//! The scanner is an explicit state machine ([`ScanState`]) with an escape
//! flag and three bracket-depth counters layered on top.

use std::fmt;

use tracing::{debug, warn};

/// Marker substituted for "soft" newlines.
///
/// Built from private-use code points so it cannot collide with ordinary
/// script text.
pub const SENTINEL: &str = "\u{E000}CALLIGRAPHY_NEWLINE\u{E001}";

// ── Public types ──────────────────────────────────────────────────────────────

/// Which prefix introduced an inline substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// `$(cmd)`: run and echo output.
    Dollar,
    /// `?(cmd)`: run without echoing output.
    Quiet,
    /// `!(cmd)`: same as `$(cmd)`.
    Bang,
}

impl SpanKind {
    fn from_prefix(ch: char) -> Option<Self> {
        match ch {
            '$' => Some(SpanKind::Dollar),
            '?' => Some(SpanKind::Quiet),
            '!' => Some(SpanKind::Bang),
            _ => None,
        }
    }

    /// The prefix character (`$`, `?` or `!`).
    pub fn prefix(self) -> char {
        match self {
            SpanKind::Dollar => '$',
            SpanKind::Quiet => '?',
            SpanKind::Bang => '!',
        }
    }

    /// Whether the runtime should suppress echoing the command's output.
    pub fn is_silent(self) -> bool {
        self == SpanKind::Quiet
    }
}

/// Location of one inline substitution within its logical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineSpan {
    /// Index of the logical line (blank lines are not counted).
    pub line: usize,
    /// Column of the prefix character.
    pub start: usize,
    /// Column just past the closing `)`; `None` if the input ended first.
    pub end: Option<usize>,
    pub kind: SpanKind,
}

impl InlineSpan {
    pub fn is_terminated(&self) -> bool {
        self.end.is_some()
    }
}

/// Non-fatal findings from the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A closing bracket with no matching opener.  The depth counter is left
    /// at zero.
    UnbalancedCloser { line: usize, column: usize, ch: char },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnbalancedCloser { line, column, ch } => write!(
                f,
                "line {}: unmatched '{ch}' at column {column}",
                line + 1
            ),
        }
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Source text with soft newlines replaced by [`SENTINEL`].
    pub text: String,
    /// Inline substitutions in order of their opening prefix.
    pub spans: Vec<InlineSpan>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Normalized {
    /// The non-blank logical lines, in order.
    pub fn lines(&self) -> Vec<&str> {
        logical_lines(&self.text)
    }

    /// Spans recorded on logical line `line`.
    pub fn spans_on(&self, line: usize) -> impl Iterator<Item = &InlineSpan> {
        self.spans.iter().filter(move |s| s.line == line)
    }

    /// The first span that never saw its closing `)`.
    pub fn unterminated(&self) -> Option<&InlineSpan> {
        self.spans.iter().find(|s| !s.is_terminated())
    }
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Mask soft newlines in `text` and locate inline substitutions.
pub fn normalize(text: &str) -> Normalized {
    let mut scanner = Scanner::new(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        scanner.step(ch, chars.peek().copied());
    }
    let out = scanner.finish();
    debug!(
        lines = out.lines().len(),
        spans = out.spans.len(),
        diagnostics = out.diagnostics.len(),
        "normalized source"
    );
    out
}

/// Turn every sentinel back into a real newline.
pub fn restore(text: &str) -> String {
    text.replace(SENTINEL, "\n")
}

/// Split normalized text into logical lines, dropping blank ones.
pub fn logical_lines(text: &str) -> Vec<&str> {
    text.split('\n').filter(|l| !l.trim().is_empty()).collect()
}

/// Byte offset of column `col` in a normalized logical line.
///
/// Each [`SENTINEL`] occupies one column.  Returns `None` when `col` is past
/// the end of the line; `col` equal to the column count maps to `line.len()`.
pub fn column_to_byte(line: &str, col: usize) -> Option<usize> {
    let mut byte = 0;
    for _ in 0..col {
        let rest = &line[byte..];
        if rest.starts_with(SENTINEL) {
            byte += SENTINEL.len();
        } else {
            byte += rest.chars().next()?.len_utf8();
        }
    }
    Some(byte)
}

// ── Scanner ───────────────────────────────────────────────────────────────────

/// Lexical context of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Code,
    SingleQuoted,
    DoubleQuoted,
    /// From a word-initial `#` to the end of the physical line.
    Comment,
}

#[derive(Debug, Default)]
struct Depths {
    paren: usize,
    brace: usize,
    bracket: usize,
}

impl Depths {
    fn any_open(&self) -> bool {
        self.paren > 0 || self.brace > 0 || self.bracket > 0
    }
}

/// The substitution currently being read.
#[derive(Debug)]
struct ActiveSpan {
    index: usize,
    /// Paren depth before the substitution's own `(`.
    depth: usize,
}

struct Scanner {
    state: ScanState,
    escaped: bool,
    depths: Depths,
    line: usize,
    column: usize,
    line_has_content: bool,
    prev: Option<char>,
    active: Option<ActiveSpan>,
    out: Normalized,
}

impl Scanner {
    fn new(capacity: usize) -> Self {
        Self {
            state: ScanState::Code,
            escaped: false,
            depths: Depths::default(),
            line: 0,
            column: 0,
            line_has_content: false,
            prev: None,
            active: None,
            out: Normalized {
                text: String::with_capacity(capacity),
                ..Normalized::default()
            },
        }
    }

    fn step(&mut self, ch: char, next: Option<char>) {
        let escaped = std::mem::take(&mut self.escaped);
        if ch == '\n' {
            self.newline(escaped);
            return;
        }

        match self.state {
            ScanState::Comment => {}
            ScanState::SingleQuoted => match ch {
                '\\' if !escaped => self.escaped = true,
                '\'' if !escaped => self.state = ScanState::Code,
                _ => {}
            },
            ScanState::DoubleQuoted => match ch {
                '\\' if !escaped => self.escaped = true,
                '"' if !escaped => self.state = ScanState::Code,
                _ => {}
            },
            ScanState::Code if escaped => {}
            ScanState::Code => self.code(ch, next),
        }

        self.out.text.push(ch);
        self.column += 1;
        if !ch.is_whitespace() {
            self.line_has_content = true;
        }
        self.prev = Some(ch);
    }

    fn code(&mut self, ch: char, next: Option<char>) {
        match ch {
            '\\' => self.escaped = true,
            '\'' => self.state = ScanState::SingleQuoted,
            '"' => self.state = ScanState::DoubleQuoted,
            '#' if self.prev.map_or(true, char::is_whitespace) => self.state = ScanState::Comment,
            '$' | '?' | '!' if next == Some('(') && self.active.is_none() => {
                if let Some(kind) = SpanKind::from_prefix(ch) {
                    self.active = Some(ActiveSpan {
                        index: self.out.spans.len(),
                        depth: self.depths.paren,
                    });
                    self.out.spans.push(InlineSpan {
                        line: self.line,
                        start: self.column,
                        end: None,
                        kind,
                    });
                }
            }
            '(' => self.depths.paren += 1,
            '{' => self.depths.brace += 1,
            '[' => self.depths.bracket += 1,
            ')' => {
                if self.close(ch) {
                    self.finish_span();
                }
            }
            '}' | ']' => {
                self.close(ch);
            }
            _ => {}
        }
    }

    /// Decrement the counter for closer `ch`; `false` if it was already zero.
    fn close(&mut self, ch: char) -> bool {
        let counter = match ch {
            ')' => &mut self.depths.paren,
            '}' => &mut self.depths.brace,
            _ => &mut self.depths.bracket,
        };
        if *counter == 0 {
            warn!(line = self.line + 1, column = self.column, "unmatched '{ch}'");
            self.out.diagnostics.push(Diagnostic::UnbalancedCloser {
                line: self.line,
                column: self.column,
                ch,
            });
            return false;
        }
        *counter -= 1;
        true
    }

    fn finish_span(&mut self) {
        let Some(active) = &self.active else { return };
        if self.depths.paren != active.depth {
            return;
        }
        self.out.spans[active.index].end = Some(self.column + 1);
        self.active = None;
    }

    fn newline(&mut self, escaped: bool) {
        if self.state == ScanState::Comment {
            self.state = ScanState::Code;
        }

        let soft = escaped || self.depths.any_open() || self.state == ScanState::DoubleQuoted;
        if soft {
            self.out.text.push_str(SENTINEL);
            self.column += 1;
        } else {
            // An unterminated single quote does not carry over a hard break.
            self.state = ScanState::Code;
            self.out.text.push('\n');
            if self.line_has_content {
                self.line += 1;
            }
            self.column = 0;
            self.line_has_content = false;
        }
        self.prev = Some('\n');
    }

    fn finish(self) -> Normalized {
        self.out
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
