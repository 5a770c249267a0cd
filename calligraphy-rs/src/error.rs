//! Compile-time error type shared by the pipeline stages.
//!
//! Classification never fails (unrecognised lines fall back to shell), so
//! every variant here is either an I/O failure while following a `source`
//! directive or a problem the author has to fix in the script itself.

use std::path::PathBuf;

use thiserror::Error;

/// An error that aborts a compile.
///
/// Line numbers are 1-based logical lines; columns are 0-based code-point
/// offsets within that logical line.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: unterminated inline substitution starting at column {column}")]
    UnterminatedSubstitution { line: usize, column: usize },

    #[error("line {line}: no inline substitution recorded for a mixed line")]
    MissingSubstitution { line: usize },

    #[error("cyclic import: {}", format_chain(chain))]
    CyclicImport { chain: Vec<PathBuf> },

    #[error("import depth limit ({depth}) exceeded while sourcing {}", path.display())]
    ImportDepthExceeded { depth: usize, path: PathBuf },
}

impl CompileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompileError::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
