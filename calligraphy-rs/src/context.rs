//! Name tables consulted by the language classifier.
//!
//! Three sets decide whether a line "starts in Python":
//!
//! * imported module names and aliases, collected from the whole file up front;
//! * function and class names, also collected from the whole file up front;
//! * variable names, which grow line by line as assignments are classified.
//!
//! The variable set is seeded with the runtime proxy objects (`env`,
//! `options`) and never shrinks.  Because it only grows while lines are
//! classified in order, a variable first assigned on line 50 does not affect
//! line 10, whereas a function defined on line 50 does.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Identifiers the runtime preamble defines before user code runs.
pub const PROXY_NAMES: &[&str] = &["env", "options"];

/// An insertion-only set of identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSet {
    names: BTreeSet<String>,
}

impl NameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name.  Returns `true` if it was not already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = NameSet::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

/// Running classification state threaded through every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierContext {
    pub imports: NameSet,
    pub functions: NameSet,
    pub variables: NameSet,
}

impl Default for ClassifierContext {
    fn default() -> Self {
        Self {
            imports: NameSet::new(),
            functions: NameSet::new(),
            variables: PROXY_NAMES.iter().copied().collect(),
        }
    }
}

impl ClassifierContext {
    /// Empty context with only the proxy names known.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context primed with every import and function found in `source`.
    ///
    /// `source` should be the raw file text so that names defined further
    /// down the file are already known when earlier lines are classified.
    pub fn from_source(source: &str) -> Self {
        Self {
            imports: collect_imports(source).into_iter().collect(),
            functions: collect_functions(source).into_iter().collect(),
            ..Self::default()
        }
    }
}

// ── Pre-pass collectors ───────────────────────────────────────────────────────

fn import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*import[ \t]+([^#\n]+)").expect("import regex is valid"))
}

fn from_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*from[ \t]+[\w.]+[ \t]+import[ \t]+(?:\(([^)]*)\)|([^#\n]+))")
            .expect("from-import regex is valid")
    })
}

fn def_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)[ \t]*\(")
            .expect("def regex is valid")
    })
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*class[ \t]+([A-Za-z_]\w*)").expect("class regex is valid"))
}

/// Names bound by `import` statements anywhere in `source`.
///
/// `import a.b` binds `a`; `import a as b` and `from m import a as b` bind
/// `b`; `from m import a` binds `a`.  Star imports bind nothing.
pub fn collect_imports(source: &str) -> Vec<String> {
    let mut names = Vec::new();

    for caps in import_re().captures_iter(source) {
        for item in split_items(&caps[1]) {
            let name = bound_name(item, true);
            if !name.is_empty() {
                names.push(name.to_owned());
            }
        }
    }

    for caps in from_import_re().captures_iter(source) {
        let Some(list) = caps.get(1).or_else(|| caps.get(2)) else { continue };
        for item in split_items(list.as_str()) {
            let name = bound_name(item, false);
            if !name.is_empty() && name != "*" {
                names.push(name.to_owned());
            }
        }
    }

    names
}

/// Function and class names defined anywhere in `source`.
pub fn collect_functions(source: &str) -> Vec<String> {
    def_re()
        .captures_iter(source)
        .chain(class_re().captures_iter(source))
        .map(|caps| caps[1].to_owned())
        .collect()
}

fn split_items(list: &str) -> impl Iterator<Item = &str> {
    list.split(',')
        .map(|item| item.trim().trim_end_matches('\\').trim())
        .filter(|item| !item.is_empty())
}

/// The identifier an import item binds in the importing namespace.
fn bound_name(item: &str, dotted_binds_root: bool) -> &str {
    let words: Vec<&str> = item.split_whitespace().collect();
    match words.as_slice() {
        [_, "as", alias, ..] => *alias,
        [target, ..] if dotted_binds_root => target.split('.').next().unwrap_or(*target),
        [target, ..] => *target,
        [] => "",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxies_are_seeded() {
        let ctx = ClassifierContext::new();
        assert!(ctx.variables.contains("env"));
        assert!(ctx.variables.contains("options"));
        assert!(ctx.imports.is_empty());
    }

    #[test]
    fn name_set_insert_reports_novelty() {
        let mut set = NameSet::new();
        assert!(set.insert("x"));
        assert!(!set.insert("x"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn plain_and_aliased_imports() {
        let src = "import os\nimport numpy as np\nimport os.path, json\n";
        assert_eq!(collect_imports(src), vec!["os", "np", "os", "json"]);
    }

    #[test]
    fn from_imports() {
        let src = "from pathlib import Path\nfrom a.b import c as d, e\nfrom x import *\n";
        assert_eq!(collect_imports(src), vec!["Path", "d", "e"]);
    }

    #[test]
    fn parenthesized_from_import_spans_lines() {
        let src = "from typing import (\n    List,\n    Dict as D,\n)\n";
        assert_eq!(collect_imports(src), vec!["List", "D"]);
    }

    #[test]
    fn import_comment_is_ignored() {
        assert_eq!(collect_imports("import sys  # for argv\n"), vec!["sys"]);
    }

    #[test]
    fn functions_and_classes() {
        let src = "def greet(name):\n    pass\n  async def fetch():\n    pass\nclass Point:\n    pass\n";
        assert_eq!(collect_functions(src), vec!["greet", "fetch", "Point"]);
    }

    #[test]
    fn from_source_collects_whole_file() {
        let ctx = ClassifierContext::from_source("helper()\ndef helper():\n    pass\n");
        assert!(ctx.functions.contains("helper"));
    }
}
