//! The whole pipeline: normalize → expand → classify → transpile.
//!
//! [`Compiler`] owns the only state that outlives a single file: the stack
//! of scripts currently being compiled, which guards `source` directives
//! against cycles and runaway nesting.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::classify::{classify, Classification};
use crate::config::{Config, DEFAULT_MAX_IMPORT_DEPTH};
use crate::context::ClassifierContext;
use crate::directive::expand;
use crate::error::CompileError;
use crate::explain::{explain, ExplainStyle};
use crate::normalize::{logical_lines, normalize};
use crate::transpile::transpile;

#[derive(Debug)]
pub struct Compiler {
    max_import_depth: usize,
    /// Canonical paths of the files being compiled, outermost first.
    stack: Vec<PathBuf>,
    /// How many of `stack` were reached through a directive.
    depth: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_max_import_depth(DEFAULT_MAX_IMPORT_DEPTH)
    }

    pub fn with_max_import_depth(max_import_depth: usize) -> Self {
        Self {
            max_import_depth,
            stack: Vec::new(),
            depth: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_max_import_depth(config.max_import_depth)
    }

    /// Compile script text to a Python body (no preamble).
    ///
    /// `base_dir` resolves relative `source` paths.
    pub fn compile_str(&mut self, source: &str, base_dir: &Path) -> Result<String, CompileError> {
        let normalized = normalize(source);
        let expanded = expand(&normalized.text, base_dir, |script| self.compile_import(script))?;

        let mut ctx = ClassifierContext::from_source(source);
        for name in &expanded.bound_names {
            ctx.imports.insert(name.as_str());
        }

        let lines = logical_lines(&expanded.text);
        let classes = classify(&lines, &normalized.spans, &mut ctx);
        debug!(
            lines = lines.len(),
            shell = count(&classes, Classification::Shell),
            blended = count(&classes, Classification::Blended),
            imports = expanded.bound_names.len(),
            "classified"
        );
        transpile(&lines, &classes, &normalized.spans)
    }

    /// Compile the script at `path`.
    pub fn compile_file(&mut self, path: &Path) -> Result<String, CompileError> {
        self.compile_path(path)
    }

    /// Compile `source`, already read from the script at `path`.
    ///
    /// `path` goes on the import stack like [`compile_file`](Self::compile_file)
    /// does, and relative directives resolve against its directory.
    pub fn compile_source(&mut self, source: &str, path: &Path) -> Result<String, CompileError> {
        let canonical = self.enter(path)?;
        self.compile_at(canonical, source)
    }

    /// Classification listing of `source`; never touches the filesystem.
    pub fn explain_str(&self, source: &str, style: ExplainStyle) -> String {
        let normalized = normalize(source);
        let lines = normalized.lines();
        let mut ctx = ClassifierContext::from_source(source);
        let classes = classify(&lines, &normalized.spans, &mut ctx);
        explain(&lines, &classes, &normalized.spans, style)
    }

    fn compile_import(&mut self, script: &Path) -> Result<String, CompileError> {
        if self.depth >= self.max_import_depth {
            return Err(CompileError::ImportDepthExceeded {
                depth: self.max_import_depth,
                path: script.to_path_buf(),
            });
        }
        self.depth += 1;
        let result = self.compile_path(script);
        self.depth -= 1;
        result
    }

    fn compile_path(&mut self, path: &Path) -> Result<String, CompileError> {
        let canonical = self.enter(path)?;
        let source = std::fs::read_to_string(&canonical).map_err(|e| CompileError::io(path, e))?;
        self.compile_at(canonical, &source)
    }

    /// Canonical form of `path`, unless it is already being compiled.
    fn enter(&self, path: &Path) -> Result<PathBuf, CompileError> {
        let canonical = path.canonicalize().map_err(|e| CompileError::io(path, e))?;
        if self.stack.contains(&canonical) {
            let mut chain = self.stack.clone();
            chain.push(canonical);
            return Err(CompileError::CyclicImport { chain });
        }
        Ok(canonical)
    }

    fn compile_at(&mut self, canonical: PathBuf, source: &str) -> Result<String, CompileError> {
        let base_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        info!(path = %canonical.display(), depth = self.depth, "compiling");

        self.stack.push(canonical);
        let result = self.compile_str(source, &base_dir);
        self.stack.pop();
        result
    }
}

fn count(classes: &[Classification], which: Classification) -> usize {
    classes.iter().filter(|&&c| c == which).count()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
