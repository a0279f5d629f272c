use migdb_parser::ParseError;
use thiserror::Error;

/// Errors raised while turning an output line into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiError {
    #[error("unlexable MI output: {0}")]
    Lex(#[from] ParseError),

    #[error("line does not match any MI record: {0:?}")]
    NoMatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = MiError::NoMatch("^".into());
        assert_eq!(err.to_string(), "line does not match any MI record: \"^\"");

        let err: MiError = ParseError::Syntax {
            offset: 0,
            found: "$".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "unlexable MI output: syntax error at offset 0: unexpected \"$\""
        );
    }
}
