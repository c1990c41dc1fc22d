//! CLI support: the error type shared by the binary and the
//! script-execution pipeline in [`run`].

mod run;

pub use run::{execute_script, RunOptions};

use std::io;

use thiserror::Error;

use crate::evaluator::EvalError;
use crate::parser::ParseError;

/// Errors surfaced by the CLI layer. Everything exits 1 except flag-parse
/// errors, which keep the CLI framework's own exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Flag parsing failed; defer to clap for rendering and exit code.
    #[error(transparent)]
    Flag(#[from] clap::Error),

    #[error("{0}")]
    Usage(String),
}
