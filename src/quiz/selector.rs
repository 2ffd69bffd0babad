//! Typed answer selector carried behind quiz buttons.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QuizError;

/// Prefix of every selector token.
const TOKEN_PREFIX: &str = "q:";

/// A (question, option) pair. Encoded as `q:<question>:<option>` in callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selector {
    pub question: usize,
    pub option: usize,
}

impl Selector {
    pub fn new(question: usize, option: usize) -> Self {
        Self { question, option }
    }

    /// Encode as an opaque callback token.
    pub fn token(&self) -> String {
        self.to_string()
    }

    /// Whether a raw token looks like a selector (it may still fail to parse).
    pub fn is_token(raw: &str) -> bool {
        raw.starts_with(TOKEN_PREFIX)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TOKEN_PREFIX}{}:{}", self.question, self.option)
    }
}

impl FromStr for Selector {
    type Err = QuizError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || QuizError::InvalidSelector(raw.to_string());
        let rest = raw.strip_prefix(TOKEN_PREFIX).ok_or_else(invalid)?;
        let (question, option) = rest.split_once(':').ok_or_else(invalid)?;
        let question = question.parse().map_err(|_| invalid())?;
        let option = option.parse().map_err(|_| invalid())?;
        Ok(Self { question, option })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_format() {
        assert_eq!(Selector::new(3, 1).token(), "q:3:1");
        assert_eq!(Selector::new(12, 0).token(), "q:12:0");
    }

    #[test]
    fn parse_valid() {
        assert_eq!("q:0:2".parse::<Selector>().unwrap(), Selector::new(0, 2));
        assert_eq!("q:10:11".parse::<Selector>().unwrap(), Selector::new(10, 11));
    }

    #[test]
    fn parse_rejects_malformed() {
        for raw in ["", "q", "q:", "q:1", "q:1:", "q:a:1", "q:1:-1", "x:1:1", "q:1:2:3", "q01"] {
            assert!(
                matches!(raw.parse::<Selector>(), Err(QuizError::InvalidSelector(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn is_token_checks_prefix() {
        assert!(Selector::is_token("q:1:1"));
        assert!(Selector::is_token("q:garbage"));
        assert!(!Selector::is_token("retry"));
    }
}
