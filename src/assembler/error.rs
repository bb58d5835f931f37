//! Errors that indicate a bug in the assembler rather than a problem in the
//! source. Problems in the source are reported as diagnostics.
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("line {line}: operand `{name}` reached the encoder unresolved")]
    Unresolved { line: usize, name: String },

    #[error("line {line}: value {value} does not fit in a word")]
    Overflow { line: usize, value: i64 },

    #[error("entry label `{0}` has no address")]
    NoEntryPoint(String),
}
