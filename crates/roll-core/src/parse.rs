//! Dice notation parser.
//!
//! The grammar is intentionally regular (no precedence, no grouping),
//! so a single left-to-right scan suffices: characters accumulate into
//! a token until a sign operator is hit, then the token is classified
//! as a dice group or a flat modifier.
//!
//! ```text
//! expression := term (sign term)*
//! sign       := '+' | '-'
//! term       := [integer] 'd' integer | integer
//! ```

use crate::error::ParseError;
use crate::expr::{DiceTerm, FlatModifier, ParsedExpression, Sign, Term, MAX_DICE_PER_TERM};

/// Parses a dice notation string like `3d6+2` or `d20-1`.
///
/// The die marker is case-insensitive and whitespace between tokens is
/// ignored. An omitted leading count defaults to 1 (`d6` == `1d6`),
/// and the first term carries an implicit `+`.
///
/// # Errors
///
/// - [`ParseError::EmptyExpression`] when no term is present
/// - [`ParseError::UnrecognizedToken`] for malformed tokens (`3d`, `x5`)
/// - [`ParseError::InvalidDieSize`] for dice with fewer than 2 sides
/// - [`ParseError::InvalidDieCount`] for counts of 0 or above
///   [`MAX_DICE_PER_TERM`]
pub fn parse(input: &str) -> Result<ParsedExpression, ParseError> {
    let normalized = input.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(ParseError::EmptyExpression);
    }

    let mut terms = Vec::new();
    let mut current = String::new();
    let mut sign = Sign::Plus;
    let mut source = String::new();

    for ch in normalized.chars() {
        match ch {
            '+' | '-' => {
                if current.is_empty() {
                    // A sign with no term before it: only the very
                    // first sign of the expression is allowed here.
                    if !terms.is_empty() || !source.is_empty() {
                        return Err(ParseError::UnrecognizedToken(ch.to_string()));
                    }
                } else {
                    terms.push(parse_term(&current, sign)?);
                    source.push_str(&current);
                    current.clear();
                }
                sign = if ch == '+' { Sign::Plus } else { Sign::Minus };
                source.push(ch);
            }
            c if c.is_whitespace() => continue,
            _ => current.push(ch),
        }
    }

    if current.is_empty() {
        // Input was only signs/whitespace, or ended on a dangling sign.
        if terms.is_empty() {
            return Err(ParseError::EmptyExpression);
        }
        return Err(ParseError::UnrecognizedToken(sign.to_string()));
    }

    terms.push(parse_term(&current, sign)?);
    source.push_str(&current);

    Ok(ParsedExpression::new(terms, source))
}

/// Classifies a single token as a dice group or flat modifier.
fn parse_term(token: &str, sign: Sign) -> Result<Term, ParseError> {
    if let Some(d_pos) = token.find('d') {
        let count_str = &token[..d_pos];
        let sides_str = &token[d_pos + 1..];

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| ParseError::UnrecognizedToken(token.to_string()))?
        };

        let sides: u32 = sides_str
            .parse()
            .map_err(|_| ParseError::UnrecognizedToken(token.to_string()))?;

        if sides < 2 {
            return Err(ParseError::InvalidDieSize {
                sides,
                term: token.to_string(),
            });
        }

        if count < 1 || count > MAX_DICE_PER_TERM {
            return Err(ParseError::InvalidDieCount {
                count,
                term: token.to_string(),
                max: MAX_DICE_PER_TERM,
            });
        }

        Ok(Term::Dice(DiceTerm { count, sides, sign }))
    } else {
        let value: u32 = token
            .parse()
            .map_err(|_| ParseError::UnrecognizedToken(token.to_string()))?;

        Ok(Term::Flat(FlatModifier { value, sign }))
    }
}
