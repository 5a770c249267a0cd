//! `source` directive expansion.
//!
//! A directive names another calligraphy script:
//!
//! ```text
//! source lib/util.script
//! source lib/util.script as u
//! ```
//!
//! The referenced script is compiled through the whole pipeline, the result is
//! written next to it as a hidden artifact (`lib/.util.py`), and the directive
//! line is replaced by a call to the runtime's `source()` primitive, which
//! loads the artifact and binds it as a namespace:
//!
//! ```text
//! source("/abs/lib/.util.py", "u")
//! ```
//!
//! A trailing `# comment` is allowed and dropped.
//!
//! Lines that start with `source` but do not name a `<name>.<ext>` file
//! (`source ~/.bashrc`, `source venv/bin/activate`) are left untouched and
//! later run as shell commands.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::CompileError;
use crate::runtime;

/// Extension given to generated artifacts.
pub const ARTIFACT_EXT: &str = "py";

/// One recognised directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive<'a> {
    pub indent: &'a str,
    /// Script path exactly as written.
    pub path: &'a str,
    pub alias: Option<&'a str>,
}

impl Directive<'_> {
    /// Name the loaded namespace is bound to: the alias, else the file stem.
    pub fn bound_name(&self) -> &str {
        if let Some(alias) = self.alias {
            return alias;
        }
        let file = self.path.rsplit('/').next().unwrap_or(self.path);
        file.split_once('.').map_or(file, |(stem, _)| stem)
    }
}

/// Result of [`expand`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expanded {
    pub text: String,
    /// Every name bound by a rewritten directive, in source order.
    pub bound_names: Vec<String>,
    /// Artifacts written while expanding.
    pub artifacts: Vec<PathBuf>,
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^([ \t]*)source[ \t]+((?:[\w.~-]+/)*[A-Za-z0-9_-][\w-]*\.\w+)(?:[ \t]+as[ \t]+([A-Za-z_]\w*))?(?:[ \t]+#.*)?[ \t]*$",
        )
        .expect("directive regex is valid")
    })
}

/// Parse a directive from one logical line.
pub fn parse_directive(line: &str) -> Option<Directive<'_>> {
    let caps = directive_re().captures(line)?;
    Some(Directive {
        indent: caps.get(1).map_or("", |m| m.as_str()),
        path: caps.get(2)?.as_str(),
        alias: caps.get(3).map(|m| m.as_str()),
    })
}

/// Artifact path for a script: same directory, hidden, `.py` extension.
pub fn artifact_path(script: &Path) -> PathBuf {
    let stem = script
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    script.with_file_name(format!(".{stem}.{ARTIFACT_EXT}"))
}

/// Expand every directive in normalized `text`.
///
/// Relative paths are resolved against `base_dir`.  `compile_import` is given
/// the resolved script path and returns its compiled body; the artifact is
/// that body behind the import preamble.  Only directive lines change, so
/// logical-line indices are the same before and after.
pub fn expand<F>(text: &str, base_dir: &Path, mut compile_import: F) -> Result<Expanded, CompileError>
where
    F: FnMut(&Path) -> Result<String, CompileError>,
{
    let mut out = Expanded {
        text: String::with_capacity(text.len()),
        ..Expanded::default()
    };

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.text.push('\n');
        }
        let Some(directive) = parse_directive(line) else {
            out.text.push_str(line);
            continue;
        };

        let script = base_dir.join(directive.path);
        let body = compile_import(&script)?;
        let artifact = artifact_path(&script);
        let contents = format!("{}\n\n{body}", runtime::import_preamble());
        std::fs::write(&artifact, contents).map_err(|e| CompileError::io(&artifact, e))?;
        debug!(script = %script.display(), artifact = %artifact.display(), "wrote artifact");

        let name = directive.bound_name();
        out.text.push_str(&format!(
            "{}source({}, {})",
            directive.indent,
            python_str(&artifact.to_string_lossy()),
            python_str(name),
        ));
        out.bound_names.push(name.to_owned());
        out.artifacts.push(artifact);
    }

    Ok(out)
}

/// A double-quoted Python string literal holding `s`.
fn python_str(s: &str) -> String {
    let mut lit = String::with_capacity(s.len() + 2);
    lit.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => lit.push_str("\\\\"),
            '"' => lit.push_str("\\\""),
            '\n' => lit.push_str("\\n"),
            c => lit.push(c),
        }
    }
    lit.push('"');
    lit
}

// ── Tests ─────────────────────────────────────────────────────────────────────
