//! `.calligraphyrc` configuration file parser.
//!
//! One setting per line:
//!
//! | Key | Value | Default |
//! |-----|-------|---------|
//! | `python` | interpreter used to run compiled programs | `python3` |
//! | `shell` | shell the runtime invokes | `bash` |
//! | `max_import_depth` | nesting limit for `source` directives | `32` |
//! | `color` | `auto`, `always` or `never` for `--explain` | `auto` |
//!
//! Lines starting with `#` are comments.  Unknown keys and malformed values
//! are reported but do not stop the rest of the file from loading.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Overrides the interpreter from any config file.
pub const PYTHON_ENV: &str = "CALLIGRAPHY_PYTHON";
/// Names a config file to load instead of searching.
pub const CONFIG_ENV: &str = "CALLIGRAPHY_CONFIG";

/// Default limit on nested `source` directives.
pub const DEFAULT_MAX_IMPORT_DEPTH: usize = 32;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// When `--explain` output is colored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Only when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(ColorMode::Auto),
            "always" | "on" | "yes" | "true" => Some(ColorMode::Always),
            "never" | "off" | "no" | "false" => Some(ColorMode::Never),
            _ => None,
        }
    }

    /// Resolve against whether stdout is a terminal.
    pub fn enabled(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub python: String,
    pub shell: String,
    pub max_import_depth: usize,
    pub color: ColorMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            python: "python3".to_owned(),
            shell: "bash".to_owned(),
            max_import_depth: DEFAULT_MAX_IMPORT_DEPTH,
            color: ColorMode::Auto,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string on top of the defaults.
    ///
    /// Returns the config and a list of any errors on individual lines.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let errors = config.apply_str(s);
        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Apply every `key = value` line of `s` to `self`.
    pub fn apply_str(&mut self, s: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Err(message) = self.set(line) {
                errors.push(ConfigError { line: i + 1, message });
            }
        }

        errors
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(python) = std::env::var(PYTHON_ENV) {
            if !python.is_empty() {
                self.python = python;
            }
        }
    }

    fn set(&mut self, line: &str) -> Result<(), String> {
        let Some((key, value)) = line.split_once('=') else {
            return Err(format!("expected `key = value`, got `{line}`"));
        };
        let key = key.trim();
        let value = unquote(value.trim());

        match key {
            "python" | "shell" if value.is_empty() => {
                return Err(format!("`{key}` needs a value"));
            }
            "python" => self.python = value.to_owned(),
            "shell" => self.shell = value.to_owned(),
            "max_import_depth" => {
                self.max_import_depth = value
                    .parse::<usize>()
                    .ok()
                    .filter(|&d| d > 0)
                    .ok_or_else(|| format!("max_import_depth must be a positive integer, got `{value}`"))?;
            }
            "color" => {
                self.color = ColorMode::parse(value)
                    .ok_or_else(|| format!("color must be auto, always or never, got `{value}`"))?;
            }
            _ => return Err(format!("unknown key `{key}`")),
        }
        Ok(())
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Config file to load, if any.
///
/// `$CALLIGRAPHY_CONFIG` wins; otherwise `./.calligraphyrc`, then
/// `calligraphyrc` in the OS config dir (`~/.config/calligraphy/` on Linux).
pub fn find_config() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let local = PathBuf::from(".calligraphyrc");
    if local.is_file() {
        return Some(local);
    }

    directories::ProjectDirs::from("", "", "calligraphy")
        .map(|dirs| dirs.config_dir().join("calligraphyrc"))
        .filter(|p| p.is_file())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::new();
        assert_eq!(c.python, "python3");
        assert_eq!(c.shell, "bash");
        assert_eq!(c.max_import_depth, 32);
        assert_eq!(c.color, ColorMode::Auto);
    }

    #[test]
    fn keys_and_comments() {
        let (c, errs) = Config::load_str(
            "# local overrides\n\npython = /usr/bin/python3.12\nshell=\"zsh\"\nmax_import_depth = 4\ncolor = never\n",
        );
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(c.python, "/usr/bin/python3.12");
        assert_eq!(c.shell, "zsh");
        assert_eq!(c.max_import_depth, 4);
        assert_eq!(c.color, ColorMode::Never);
    }

    #[test]
    fn errors_carry_line_numbers_and_do_not_stop_loading() {
        let (c, errs) = Config::load_str("bogus = 1\nmax_import_depth = zero\nno equals\npython = py\n");
        assert_eq!(c.python, "py");
        assert_eq!(c.max_import_depth, DEFAULT_MAX_IMPORT_DEPTH);
        let lines: Vec<usize> = errs.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        assert_eq!(errs[0].to_string(), "line 1: unknown key `bogus`");
    }

    #[test]
    fn zero_depth_is_rejected() {
        let (_, errs) = Config::load_str("max_import_depth = 0");
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn color_mode_resolution() {
        assert!(ColorMode::Auto.enabled(true));
        assert!(!ColorMode::Auto.enabled(false));
        assert!(ColorMode::Always.enabled(false));
        assert!(!ColorMode::Never.enabled(true));
    }

    #[test]
    fn load_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".calligraphyrc");
        std::fs::write(&path, "color = always\n").unwrap();
        let (c, errs) = Config::load_file(&path).unwrap();
        assert!(errs.is_empty());
        assert_eq!(c.color, ColorMode::Always);
    }
}
