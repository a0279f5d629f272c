//! Backtracking parser combinators.
//!
//! Parsers run over a [`TokenStream`] that can be rewound to any earlier
//! savepoint. A failed attempt never consumes input. A [`Lexer`] built from
//! the same combinators turns characters into typed [`Lexeme`]s.

pub mod combinator;
pub mod error;
pub mod lexer;
pub mod stream;

pub use combinator::{
    delimited_list, just, literal, none_of, one_of, one_or_more, optional, optional_or,
    parse_all, satisfy, word, zero_or_more, BoxedParser, Forward, Parsed, Parser,
};
pub use error::ParseError;
pub use lexer::{kind, Lexeme, Lexer};
pub use stream::TokenStream;
