//! Roll Core - dice engine shared by the daemon and its clients
//!
//! This crate provides the pure (no I/O, no async) parts of the dice
//! roller: notation parsing, roll evaluation, and history entry types.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod expr;
pub mod history;
pub mod parse;
pub mod roll;

// Re-exports for convenience
pub use error::ParseError;
pub use expr::{DiceTerm, FlatModifier, ParsedExpression, Sign, Term, MAX_DICE_PER_TERM};
pub use history::{render_history, HistoryEntry, EMPTY_HISTORY_PLACEHOLDER};
pub use parse::parse;
pub use roll::{evaluate, DiceSource, RollMode, RollOutcome, TermOutcome};
