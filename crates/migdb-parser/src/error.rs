//! Parser-core error types.

use thiserror::Error;

/// Hard errors raised by the parser core.
///
/// An ordinary grammar mismatch is not an error: parsers report it by
/// returning `None`. Only character input that no lexer rule covers ends up
/// here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The lexer could not turn the input at `offset` into any token.
    #[error("syntax error at offset {offset}: unexpected {found:?}")]
    Syntax {
        /// Character offset of the first unlexable character.
        offset: usize,
        /// The rest of the input from that point (truncated).
        found: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_syntax_display() {
        let err = ParseError::Syntax {
            offset: 4,
            found: "$$".into(),
        };
        assert_eq!(err.to_string(), "syntax error at offset 4: unexpected \"$$\"");
    }
}
