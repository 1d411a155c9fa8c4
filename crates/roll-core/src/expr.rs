//! Parsed dice expression model.
//!
//! A `ParsedExpression` is an ordered list of signed terms, either
//! dice groups (`3d6`) or flat modifiers (`+2`). Instances are only
//! produced by [`crate::parse::parse`], which enforces the term
//! invariants, so evaluation never rechecks them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on dice in a single term, to bound evaluator work.
pub const MAX_DICE_PER_TERM: u32 = 1000;

/// Sign of a term, inherited from the operator preceding it.
///
/// The leading term of an expression defaults to [`Sign::Plus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    #[default]
    Plus,
    Minus,
}

impl Sign {
    /// Returns the multiplicative factor for this sign (+1 or -1).
    pub fn factor(self) -> i64 {
        match self {
            Sign::Plus => 1,
            Sign::Minus => -1,
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sign::Plus => write!(f, "+"),
            Sign::Minus => write!(f, "-"),
        }
    }
}

/// A group of identical dice, e.g. `3d6`.
///
/// Invariants (enforced by the parser):
/// `1 <= count <= MAX_DICE_PER_TERM`, `sides >= 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceTerm {
    /// Number of dice rolled for this term (`d6` means 1).
    pub count: u32,
    /// Face count of each die.
    pub sides: u32,
    /// Sign applied to the summed rolls.
    pub sign: Sign,
}

/// A constant integer term with a sign, e.g. `+12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatModifier {
    /// Magnitude of the modifier.
    pub value: u32,
    /// Sign applied to the value.
    pub sign: Sign,
}

/// One parsed unit of a dice expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Term {
    /// A dice group.
    Dice(DiceTerm),
    /// A flat modifier.
    Flat(FlatModifier),
}

impl Term {
    /// Returns the sign of this term.
    pub fn sign(&self) -> Sign {
        match self {
            Term::Dice(d) => d.sign,
            Term::Flat(m) => m.sign,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Dice(d) => write!(f, "{}d{}", d.count, d.sides),
            Term::Flat(m) => write!(f, "{}", m.value),
        }
    }
}

/// A fully parsed dice expression.
///
/// Holds at least one term; left-to-right order matches the source
/// string. The stored source is the normalized form (trimmed,
/// lowercased) used for display and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedExpression {
    terms: Vec<Term>,
    source: String,
}

impl ParsedExpression {
    /// Creates an expression from parser output.
    ///
    /// Crate-private: only the parser may construct expressions, so
    /// the non-empty and per-term invariants always hold.
    pub(crate) fn new(terms: Vec<Term>, source: String) -> Self {
        Self { terms, source }
    }

    /// The terms in source order.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// The normalized source string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Finds the primary check term: the first d20 dice group.
    ///
    /// Fortune and misfortune apply only to this term. Returns `None`
    /// when the expression has no d20 group.
    pub fn primary_check_index(&self) -> Option<usize> {
        self.terms
            .iter()
            .position(|t| matches!(t, Term::Dice(d) if d.sides == 20))
    }

    /// Total number of dice across all terms.
    pub fn dice_count(&self) -> u32 {
        self.terms
            .iter()
            .map(|t| match t {
                Term::Dice(d) => d.count,
                Term::Flat(_) => 0,
            })
            .sum()
    }
}

impl fmt::Display for ParsedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
