//! Parse errors following panic-free policy.

use thiserror::Error;

/// Errors produced while parsing a dice expression.
///
/// Every variant names the offending token so the message can be
/// returned to the caller as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input contained no recognizable term.
    #[error("empty dice expression")]
    EmptyExpression,

    /// A token that is neither a dice term nor an integer modifier.
    #[error("unrecognized token '{0}' in dice expression")]
    UnrecognizedToken(String),

    /// A die with fewer than two faces (e.g. `d0`, `3d1`).
    #[error("invalid die size {sides} in '{term}' (a die needs at least 2 sides)")]
    InvalidDieSize {
        /// The rejected face count
        sides: u32,
        /// The token it appeared in
        term: String,
    },

    /// A dice count outside the accepted range.
    #[error("invalid die count {count} in '{term}' (must be between 1 and {max})")]
    InvalidDieCount {
        /// The rejected count
        count: u32,
        /// The token it appeared in
        term: String,
        /// Upper bound on dice per term
        max: u32,
    },
}
