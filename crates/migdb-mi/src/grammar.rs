//! The MI output grammar.
//!
//! ```text
//! line    := (async | stream | result | "(gdb)") EOL
//! async   := token? ("*" | "=" | "+") ident ("," results)?
//! stream  := ("~" | "@" | "&") c-string
//! result  := token? "^" ident ("," results)?
//! results := ident "=" value ("," ident "=" value)*
//! value   := c-string | "{" results? "}" | "[" (values | results)? "]"
//! ```

use std::sync::{Arc, OnceLock};

use migdb_parser::{
    delimited_list, kind, optional, parse_all, BoxedParser, Forward, Lexeme, Lexer, Parser,
};

use crate::error::MiError;
use crate::lexer::{mi_lexer, TokenKind};
use crate::record::{AsyncKind, Record, RecordVisitor, StreamChannel};
use crate::value::{Fields, List, Value};

type Tok = Lexeme<TokenKind>;

/// Stateless line parser for MI output.
///
/// Parsing never mutates the grammar. The recursive value grammar is built
/// once per process and shared by every instance.
pub struct MiGrammar {
    lexer: Lexer<TokenKind>,
    line: BoxedParser<Tok, Record>,
}

impl MiGrammar {
    pub fn new() -> Self {
        static LINE: OnceLock<BoxedParser<Tok, Record>> = OnceLock::new();
        Self {
            lexer: mi_lexer(),
            line: Arc::clone(LINE.get_or_init(line_parser)),
        }
    }

    /// Parse one line of output. A missing line terminator is supplied.
    pub fn parse_line(&self, line: &str) -> Result<Record, MiError> {
        let lexemes = if line.ends_with('\n') || line.ends_with('\r') {
            self.lexer.lex(line)?
        } else {
            self.lexer.lex(&format!("{line}\n"))?
        };
        parse_all(&self.line, lexemes).ok_or_else(|| MiError::NoMatch(line.trim_end().to_string()))
    }

    /// Parse one line and hand the record to `visitor`.
    pub fn visit_line<V: RecordVisitor + ?Sized>(
        &self,
        line: &str,
        visitor: &mut V,
    ) -> Result<(), MiError> {
        let record = self.parse_line(line)?;
        record.accept(visitor);
        Ok(())
    }
}

impl Default for MiGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MiGrammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiGrammar").finish_non_exhaustive()
    }
}

/// Digits of an optional command token.
fn token() -> impl Parser<Tok, Output = Option<String>> + Clone {
    optional(kind(TokenKind::Number))
}

/// Tokens too large for `u64` were not issued by us; the record is kept
/// without one.
fn token_number(digits: Option<String>) -> Option<u64> {
    let digits = digits?;
    match digits.parse::<u64>() {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::warn!("dropping token {}: {}", digits, e);
            None
        }
    }
}

fn trailing_results(
    results: &BoxedParser<Tok, Vec<(String, Value)>>,
) -> impl Parser<Tok, Output = Fields> + Clone {
    optional(kind(TokenKind::Comma).skip_then(results.clone()))
        .map(|found| found.unwrap_or_default().into_iter().collect::<Fields>())
}

fn line_parser() -> BoxedParser<Tok, Record> {
    let value: Forward<Tok, Value> = Forward::new();

    let result = kind(TokenKind::Ident)
        .then_skip(kind(TokenKind::Eq))
        .then(value.clone());
    let results: BoxedParser<Tok, Vec<(String, Value)>> =
        delimited_list(result, kind(TokenKind::Comma)).boxed();
    let values = delimited_list(value.clone(), kind(TokenKind::Comma));

    let string = kind(TokenKind::CString).map(Value::Str);
    let tuple = kind(TokenKind::LBrace)
        .skip_then(optional(results.clone()))
        .then_skip(kind(TokenKind::RBrace))
        .map(|found| Value::Tuple(found.unwrap_or_default().into_iter().collect()));
    // Bare values are tried first; a named result cannot start a value.
    let list = kind(TokenKind::LBracket)
        .skip_then(optional(
            values.map(List::Values).or(results.clone().map(List::Results)),
        ))
        .then_skip(kind(TokenKind::RBracket))
        .map(|found| Value::List(found.unwrap_or_default()));
    value.define(string.or(tuple).or(list));

    let async_kind = kind(TokenKind::Star)
        .map(|_| AsyncKind::Exec)
        .or(kind(TokenKind::Eq).map(|_| AsyncKind::Notify))
        .or(kind(TokenKind::Plus).map(|_| AsyncKind::Status));
    let async_record = token()
        .then(async_kind)
        .then(kind(TokenKind::Ident))
        .then(trailing_results(&results))
        .map(|(((token, kind), class), fields)| Record::Async {
            kind,
            token: token_number(token),
            class,
            fields,
        });

    let channel = kind(TokenKind::Tilde)
        .map(|_| StreamChannel::Console)
        .or(kind(TokenKind::At).map(|_| StreamChannel::Target))
        .or(kind(TokenKind::Ampersand).map(|_| StreamChannel::Log));
    let stream_record = channel
        .then(kind(TokenKind::CString))
        .map(|(channel, text)| Record::Stream { channel, text });

    let result_record = token()
        .then_skip(kind(TokenKind::Caret))
        .then(kind(TokenKind::Ident))
        .then(trailing_results(&results))
        .map(|((token, class), fields)| Record::Result {
            token: token_number(token),
            class,
            fields,
        });

    let prompt = kind(TokenKind::Stop).map(|_| Record::Prompt);

    async_record
        .or(stream_record)
        .or(result_record)
        .or(prompt)
        .then_skip(kind(TokenKind::Eol))
        .boxed()
}
