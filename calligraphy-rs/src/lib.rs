//! Calligraphy: compile scripts that mix Python and shell into plain Python.
//!
//! ```
//! use std::path::Path;
//! use calligraphy::Compiler;
//!
//! let body = Compiler::new().compile_str("x = 1\nls -la\n", Path::new(".")).unwrap();
//! assert_eq!(body, "x = 1\nshell(\"bHMgLWxh\", format_dict=locals())\n");
//! ```

pub mod classify;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod explain;
pub mod normalize;
pub mod runner;
pub mod runtime;
pub mod transpile;

pub use classify::Classification;
pub use compiler::Compiler;
pub use error::CompileError;
pub use explain::ExplainStyle;
