//! The Python runtime preamble, embedded in the binary.
//!
//! `data/header.py` is baked in with `include_str!()` so compiled programs
//! need nothing installed beside a Python interpreter.  It defines `env`,
//! `options`, `shell()`, `source()` and the `RC` variable that generated
//! code relies on.
//!
//! The preamble contains one argument-initialization line,
//! `sys.argv = "PROGRAM_ARGS"`.  [`preamble`] fills it in for a top-level
//! program; [`import_preamble`] drops it for `source`d artifacts, which must
//! not clobber the importing program's arguments.

/// The preamble source, exactly as shipped.
pub static HEADER: &str = include_str!("../data/header.py");

/// Quoted placeholder replaced by the program's argument list.
pub const ARGS_PLACEHOLDER: &str = "\"PROGRAM_ARGS\"";

/// Preamble with `sys.argv` set to `[script, args...]`.
pub fn preamble(script: &str, args: &[String]) -> String {
    let list = std::iter::once(script)
        .chain(args.iter().map(String::as_str))
        .map(python_repr)
        .collect::<Vec<_>>()
        .join(", ");
    HEADER.replacen(ARGS_PLACEHOLDER, &format!("[{list}]"), 1)
}

/// Preamble without the argument-initialization line.
pub fn import_preamble() -> String {
    HEADER
        .lines()
        .filter(|line| !line.contains(ARGS_PLACEHOLDER))
        .map(|line| format!("{line}\n"))
        .collect()
}

/// Full program text: preamble, a blank line, then the compiled body.
pub fn program(script: &str, args: &[String], body: &str) -> String {
    format!("{}\n\n{body}", preamble(script, args))
}

/// A single-quoted Python string literal.
fn python_repr(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
