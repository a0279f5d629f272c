//! GDB/MI output grammar.
//!
//! Turns one line of debugger output into exactly one [`Record`], either
//! returned directly or delivered to a [`RecordVisitor`].

pub mod error;
pub mod grammar;
pub mod lexer;
pub mod record;
pub mod value;

pub use error::MiError;
pub use grammar::MiGrammar;
pub use lexer::{mi_lexer, TokenKind};
pub use record::{AsyncKind, Record, RecordVisitor, StreamChannel};
pub use value::{Fields, List, Value};
