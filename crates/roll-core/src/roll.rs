//! Roll evaluation.
//!
//! Executes a [`ParsedExpression`] against a randomness source,
//! applying the fortune/misfortune policy, and produces a total plus a
//! per-term breakdown for display.

use crate::expr::{ParsedExpression, Term};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Special roll mode for the primary check die.
///
/// Exactly one mode is supplied per roll; there is no hidden mode
/// state in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollMode {
    /// Every die is drawn once.
    #[default]
    Normal,
    /// The primary check die is drawn twice, keeping the higher.
    Fortune,
    /// The primary check die is drawn twice, keeping the lower.
    Misfortune,
}

impl fmt::Display for RollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollMode::Normal => write!(f, "normal"),
            RollMode::Fortune => write!(f, "fortune"),
            RollMode::Misfortune => write!(f, "misfortune"),
        }
    }
}

/// Source of individual die draws.
///
/// Every call is one fresh independent sample in `[1, sides]`. The
/// blanket impl covers any `rand::Rng`; tests substitute scripted
/// sources to force or count draws.
pub trait DiceSource {
    /// Draws one die with the given number of faces.
    fn roll_die(&mut self, sides: u32) -> u32;
}

impl<R: Rng> DiceSource for R {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.gen_range(1..=sides)
    }
}

/// Result of evaluating a single term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermOutcome {
    /// The term this outcome belongs to.
    pub term: Term,
    /// Every raw draw made for this term, in draw order. Empty for
    /// flat modifiers. Under fortune/misfortune the primary term
    /// records both draws for its first die.
    pub rolls: Vec<u32>,
    /// The draws that actually count toward the total.
    pub kept: Vec<u32>,
    /// Signed contribution of this term to the total.
    pub contribution: i64,
}

/// Immutable result of evaluating an expression under a mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    /// Normalized source of the evaluated expression.
    pub expression: String,
    /// Mode the roll was made under.
    pub mode: RollMode,
    /// Per-term outcomes in source order.
    pub terms: Vec<TermOutcome>,
    /// Signed sum across all terms.
    pub total: i64,
}

/// Evaluates a parsed expression under the given mode.
///
/// Never fails: the parser guarantees the term invariants, and the
/// randomness source is infallible by contract.
///
/// Fortune and misfortune apply only to the first d20 dice group (the
/// primary check term), and within it only to the first die: that die
/// is drawn twice and the higher (fortune) or lower (misfortune) draw
/// is kept. Expressions without a d20 group evaluate identically in
/// all modes.
pub fn evaluate<S: DiceSource>(
    expr: &ParsedExpression,
    mode: RollMode,
    source: &mut S,
) -> RollOutcome {
    let check_index = match mode {
        RollMode::Normal => None,
        RollMode::Fortune | RollMode::Misfortune => expr.primary_check_index(),
    };

    let mut terms = Vec::with_capacity(expr.terms().len());
    let mut total: i64 = 0;

    for (index, term) in expr.terms().iter().enumerate() {
        let outcome = match term {
            Term::Dice(dice) => {
                let mut rolls = Vec::new();
                let mut kept = Vec::new();

                if check_index == Some(index) {
                    let first = source.roll_die(dice.sides);
                    let second = source.roll_die(dice.sides);
                    let chosen = match mode {
                        RollMode::Fortune => first.max(second),
                        RollMode::Misfortune => first.min(second),
                        RollMode::Normal => first,
                    };
                    rolls.push(first);
                    rolls.push(second);
                    kept.push(chosen);
                } else {
                    let first = source.roll_die(dice.sides);
                    rolls.push(first);
                    kept.push(first);
                }

                for _ in 1..dice.count {
                    let draw = source.roll_die(dice.sides);
                    rolls.push(draw);
                    kept.push(draw);
                }

                let subtotal: i64 = kept.iter().map(|&v| i64::from(v)).sum();
                TermOutcome {
                    term: *term,
                    rolls,
                    kept,
                    contribution: dice.sign.factor() * subtotal,
                }
            }
            Term::Flat(modifier) => TermOutcome {
                term: *term,
                rolls: Vec::new(),
                kept: Vec::new(),
                contribution: modifier.sign.factor() * i64::from(modifier.value),
            },
        };

        total += outcome.contribution;
        terms.push(outcome);
    }

    RollOutcome {
        expression: expr.source().to_string(),
        mode,
        terms,
        total,
    }
}

impl RollOutcome {
    /// Renders the roll as a single stable display line, e.g.
    /// `3d6+2 = 14 [4,6,2]+2` or `d20+3 = 20 [(5),17]+3 (fortune)`.
    ///
    /// Dropped fortune/misfortune draws appear in parentheses. The
    /// line never contains a newline; newlines delimit history
    /// entries.
    pub fn formatted(&self) -> String {
        let mut breakdown = String::new();

        for (index, outcome) in self.terms.iter().enumerate() {
            let sign = outcome.term.sign();
            if index > 0 || sign == crate::expr::Sign::Minus {
                breakdown.push_str(&sign.to_string());
            }

            match &outcome.term {
                Term::Dice(_) => {
                    breakdown.push('[');
                    // With a dropped draw, the first two rolls are the
                    // fortune pair and the kept value identifies which
                    // of them was chosen. On a tied pair the first draw
                    // counts as kept.
                    let dropped_index = if outcome.rolls.len() > outcome.kept.len() {
                        if outcome.kept.first() == outcome.rolls.first() {
                            Some(1)
                        } else {
                            Some(0)
                        }
                    } else {
                        None
                    };
                    for (i, &roll) in outcome.rolls.iter().enumerate() {
                        if i > 0 {
                            breakdown.push(',');
                        }
                        if dropped_index == Some(i) {
                            breakdown.push('(');
                            breakdown.push_str(&roll.to_string());
                            breakdown.push(')');
                        } else {
                            breakdown.push_str(&roll.to_string());
                        }
                    }
                    breakdown.push(']');
                }
                Term::Flat(modifier) => {
                    breakdown.push_str(&modifier.value.to_string());
                }
            }
        }

        let mode_suffix = match self.mode {
            RollMode::Normal => String::new(),
            mode => format!(" ({mode})"),
        };

        format!(
            "{} = {} {}{}",
            self.expression, self.total, breakdown, mode_suffix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    /// Scripted dice source returning a fixed sequence of values and
    /// counting how many draws were made.
    struct FixedSource {
        values: Vec<u32>,
        next: usize,
    }

    impl FixedSource {
        fn new(values: &[u32]) -> Self {
            Self {
                values: values.to_vec(),
                next: 0,
            }
        }

        fn draws(&self) -> usize {
            self.next
        }
    }

    impl DiceSource for FixedSource {
        fn roll_die(&mut self, _sides: u32) -> u32 {
            let value = self.values.get(self.next).copied().unwrap_or(1);
            self.next += 1;
            value
        }
    }

    #[test]
    fn test_evaluate_fixed_scenario() {
        // 5d6+12 with forced dice [3,1,4,1,5] totals 14+12 = 26
        let expr = parse("5d6+12").unwrap();
        let mut source = FixedSource::new(&[3, 1, 4, 1, 5]);
        let outcome = evaluate(&expr, RollMode::Normal, &mut source);
        assert_eq!(outcome.total, 26);
        assert_eq!(source.draws(), 5);
        assert_eq!(
            outcome.terms.first().map(|t| t.kept.clone()),
            Some(vec![3, 1, 4, 1, 5])
        );
    }

    #[test]
    fn test_evaluate_negative_terms() {
        // 1d20-2d4-1 with forced [15, 3, 2] = 15 - 5 - 1 = 9
        let expr = parse("1d20-2d4-1").unwrap();
        let mut source = FixedSource::new(&[15, 3, 2]);
        let outcome = evaluate(&expr, RollMode::Normal, &mut source);
        assert_eq!(outcome.total, 9);
    }

    #[test]
    fn test_fortune_keeps_higher() {
        let expr = parse("d20").unwrap();
        let mut source = FixedSource::new(&[5, 17]);
        let outcome = evaluate(&expr, RollMode::Fortune, &mut source);
        assert_eq!(outcome.total, 17);
        assert_eq!(source.draws(), 2);
        let check = outcome.terms.first().unwrap();
        assert_eq!(check.rolls, vec![5, 17]);
        assert_eq!(check.kept, vec![17]);
    }

    #[test]
    fn test_misfortune_keeps_lower() {
        let expr = parse("d20").unwrap();
        let mut source = FixedSource::new(&[5, 17]);
        let outcome = evaluate(&expr, RollMode::Misfortune, &mut source);
        assert_eq!(outcome.total, 5);
        assert_eq!(source.draws(), 2);
    }

    #[test]
    fn test_normal_draws_once() {
        let expr = parse("d20").unwrap();
        let mut source = FixedSource::new(&[5, 17]);
        let outcome = evaluate(&expr, RollMode::Normal, &mut source);
        assert_eq!(outcome.total, 5);
        assert_eq!(source.draws(), 1);
    }

    #[test]
    fn test_fortune_without_d20_is_inert() {
        let expr = parse("3d6+2").unwrap();
        let mut source = FixedSource::new(&[4, 6, 2]);
        let outcome = evaluate(&expr, RollMode::Fortune, &mut source);
        assert_eq!(outcome.total, 14);
        // No extra draw was consumed
        assert_eq!(source.draws(), 3);
    }

    #[test]
    fn test_fortune_applies_to_first_d20_term_only() {
        // Two d20 groups: only the first is the check term
        let expr = parse("1d20+1d20").unwrap();
        let mut source = FixedSource::new(&[5, 17, 9]);
        let outcome = evaluate(&expr, RollMode::Fortune, &mut source);
        // 17 (kept from pair) + 9
        assert_eq!(outcome.total, 26);
        assert_eq!(source.draws(), 3);
    }

    #[test]
    fn test_fortune_first_die_of_multi_die_check_term() {
        // 2d20 under fortune: pair replaces only the first die
        let expr = parse("2d20").unwrap();
        let mut source = FixedSource::new(&[5, 17, 9]);
        let outcome = evaluate(&expr, RollMode::Fortune, &mut source);
        assert_eq!(outcome.total, 17 + 9);
        assert_eq!(source.draws(), 3);
    }

    #[test]
    fn test_flat_modifier_consumes_no_randomness() {
        let expr = parse("7").unwrap();
        let mut source = FixedSource::new(&[]);
        let outcome = evaluate(&expr, RollMode::Normal, &mut source);
        assert_eq!(outcome.total, 7);
        assert_eq!(source.draws(), 0);
    }

    #[test]
    fn test_evaluate_range_with_thread_rng() {
        // 2d6+3 is always within [5, 15]
        let expr = parse("2d6+3").unwrap();
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let outcome = evaluate(&expr, RollMode::Normal, &mut rng);
            assert!((5..=15).contains(&outcome.total), "total {}", outcome.total);
        }
    }

    #[test]
    fn test_formatted_normal() {
        let expr = parse("3d6+2").unwrap();
        let mut source = FixedSource::new(&[4, 6, 2]);
        let outcome = evaluate(&expr, RollMode::Normal, &mut source);
        assert_eq!(outcome.formatted(), "3d6+2 = 14 [4,6,2]+2");
    }

    #[test]
    fn test_formatted_fortune_marks_dropped_draw() {
        let expr = parse("d20+3").unwrap();
        let mut source = FixedSource::new(&[5, 17]);
        let outcome = evaluate(&expr, RollMode::Fortune, &mut source);
        assert_eq!(outcome.formatted(), "d20+3 = 20 [(5),17]+3 (fortune)");
    }

    #[test]
    fn test_formatted_tied_pair_marks_one_draw_kept() {
        let expr = parse("d20").unwrap();
        let mut source = FixedSource::new(&[8, 8]);
        let outcome = evaluate(&expr, RollMode::Misfortune, &mut source);
        assert_eq!(outcome.total, 8);
        assert_eq!(outcome.formatted(), "d20 = 8 [8,(8)] (misfortune)");
    }

    #[test]
    fn test_formatted_marks_pair_draw_not_later_duplicate() {
        // The dropped 5 is in the pair; the third die also shows 5 and
        // must stay unmarked
        let expr = parse("2d20").unwrap();
        let mut source = FixedSource::new(&[17, 5, 5]);
        let outcome = evaluate(&expr, RollMode::Fortune, &mut source);
        assert_eq!(outcome.formatted(), "2d20 = 22 [17,(5),5] (fortune)");
    }

    #[test]
    fn test_formatted_negative_terms() {
        let expr = parse("1d20-2d4-1").unwrap();
        let mut source = FixedSource::new(&[15, 3, 2]);
        let outcome = evaluate(&expr, RollMode::Normal, &mut source);
        assert_eq!(outcome.formatted(), "1d20-2d4-1 = 9 [15]-[3,2]-1");
    }

    #[test]
    fn test_formatted_never_contains_newline() {
        let expr = parse("3d6+2d8-4").unwrap();
        let mut rng = rand::thread_rng();
        let outcome = evaluate(&expr, RollMode::Fortune, &mut rng);
        assert!(!outcome.formatted().contains('\n'));
    }
}
