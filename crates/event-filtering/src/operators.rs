//! This module contains the relational operators recognized in filter
//! expressions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Enum of all relational operators a filter expression can start with.
///
/// `LowerEqual` and `GreaterEqual` are never stored inside a filter:
/// applying them expands to an equality insertion plus a threshold
/// update (see [`crate::NumericFilter`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Lower,
    Greater,
    LowerEqual,
    GreaterEqual,
}

impl Operator {
    /// Maps an expression token to its operator.
    ///
    /// Unrecognized tokens map to `None` and are rejected by the caller;
    /// they never fall back to a default operator.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Operator::Equal),
            "!=" => Some(Operator::NotEqual),
            "<" => Some(Operator::Lower),
            ">" => Some(Operator::Greater),
            "<=" => Some(Operator::LowerEqual),
            ">=" => Some(Operator::GreaterEqual),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let token = match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Lower => "<",
            Operator::Greater => ">",
            Operator::LowerEqual => "<=",
            Operator::GreaterEqual => ">=",
        };
        write!(f, "{token}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_mapping() {
        assert_eq!(Operator::from_token("="), Some(Operator::Equal));
        assert_eq!(Operator::from_token("!="), Some(Operator::NotEqual));
        assert_eq!(Operator::from_token("<"), Some(Operator::Lower));
        assert_eq!(Operator::from_token(">"), Some(Operator::Greater));
        assert_eq!(Operator::from_token("<="), Some(Operator::LowerEqual));
        assert_eq!(Operator::from_token(">="), Some(Operator::GreaterEqual));
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        for token in ["", "==", "~", "!", "=>", "in"] {
            assert_eq!(Operator::from_token(token), None, "token {token:?}");
        }
    }
}
