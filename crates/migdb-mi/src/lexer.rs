//! Token definitions for GDB/MI output lines.

use migdb_parser::{just, literal, none_of, one_of, satisfy, word, zero_or_more, Lexer, Parser};

const LETTERS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const OCTAL_DIGITS: &str = "01234567";

/// Kinds of lexeme produced by [`mi_lexer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eq,
    Star,
    Plus,
    Tilde,
    At,
    Caret,
    Ampersand,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    /// The `(gdb)` prompt.
    Stop,
    /// A line terminator.
    Eol,
    /// A double-quoted C string; the lexeme text is already unescaped.
    CString,
    /// A decimal command token.
    Number,
    Ident,
}

/// Build the MI lexer.
///
/// Multi-character literals that share a prefix with a shorter one
/// (`"\r\n"` before `"\r"`) are registered first.
pub fn mi_lexer() -> Lexer<TokenKind> {
    Lexer::new()
        .literal(TokenKind::Stop, "(gdb)")
        .literal(TokenKind::Eol, "\r\n")
        .literal(TokenKind::Eol, "\n")
        .literal(TokenKind::Eol, "\r")
        .literal(TokenKind::Eq, "=")
        .literal(TokenKind::Star, "*")
        .literal(TokenKind::Plus, "+")
        .literal(TokenKind::Tilde, "~")
        .literal(TokenKind::At, "@")
        .literal(TokenKind::Caret, "^")
        .literal(TokenKind::Ampersand, "&")
        .literal(TokenKind::LBrace, "{")
        .literal(TokenKind::RBrace, "}")
        .literal(TokenKind::LBracket, "[")
        .literal(TokenKind::RBracket, "]")
        .literal(TokenKind::Comma, ",")
        .pattern(TokenKind::CString, c_string())
        .pattern(TokenKind::Number, word(DIGITS))
        .pattern(TokenKind::Ident, identifier())
        .skip(one_of(" \t"))
}

fn identifier() -> impl Parser<char, Output = String> + Send + Sync + 'static {
    let head = one_of(&format!("{LETTERS}_"));
    let tail = one_of(&format!("{LETTERS}{DIGITS}_-"));
    head.then(zero_or_more(tail)).map(|(first, rest)| {
        let mut ident = String::with_capacity(rest.len() + 1);
        ident.push(first);
        ident.extend(rest);
        ident
    })
}

/// A double-quoted string with C escapes decoded.
///
/// GDB writes non-ASCII bytes as octal escapes, so pieces are collected as
/// bytes and decoded as UTF-8 once the closing quote is reached.
fn c_string() -> impl Parser<char, Output = String> + Send + Sync + 'static {
    let octal = just('\\')
        .skip_then(one_of(OCTAL_DIGITS).repeat(1, Some(3)))
        .map(|digits| {
            let code = digits
                .iter()
                .filter_map(|d| d.to_digit(8))
                .fold(0u32, |acc, d| acc * 8 + d);
            vec![(code & 0xff) as u8]
        });
    let escaped = just('\\')
        .skip_then(satisfy(|_: &char| true))
        .map(|c| {
            let decoded = match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                'a' => '\x07',
                'b' => '\x08',
                'f' => '\x0c',
                'v' => '\x0b',
                'e' => '\x1b',
                other => other,
            };
            decoded.to_string().into_bytes()
        });
    let plain = none_of("\"\\").map(|c| c.to_string().into_bytes());

    just('"')
        .skip_then(zero_or_more(octal.or(escaped).or(plain)))
        .then_skip(just('"'))
        .map(|pieces| String::from_utf8_lossy(&pieces.concat()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<TokenKind> {
        mi_lexer()
            .lex(line)
            .unwrap()
            .into_iter()
            .map(|l| l.kind)
            .collect()
    }

    #[test]
    fn lexer_result_record() {
        assert_eq!(
            kinds("12^done,value=\"1\"\n"),
            vec![
                TokenKind::Number,
                TokenKind::Caret,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Ident,
                TokenKind::Eq,
                TokenKind::CString,
                TokenKind::Eol,
            ]
        );
    }

    #[test]
    fn lexer_prompt_with_trailing_space() {
        assert_eq!(kinds("(gdb) \r\n"), vec![TokenKind::Stop, TokenKind::Eol]);
    }

    #[test]
    fn lexer_hyphenated_identifier() {
        let lexemes = mi_lexer().lex("thread-id").unwrap();
        assert_eq!(lexemes.len(), 1);
        assert_eq!(lexemes[0].text, "thread-id");
    }

    #[test]
    fn lexer_decodes_escapes() {
        let lexemes = mi_lexer()
            .lex(r#""say \"hi\"\n\\ \t\101""#)
            .unwrap();
        assert_eq!(lexemes[0].kind, TokenKind::CString);
        assert_eq!(lexemes[0].text, "say \"hi\"\n\\ \tA");
    }

    #[test]
    fn lexer_decodes_octal_utf8_sequence() {
        // "é" as two octal-escaped bytes
        let lexemes = mi_lexer().lex(r#""\303\251""#).unwrap();
        assert_eq!(lexemes[0].text, "é");
    }

    #[test]
    fn lexer_rejects_unterminated_string() {
        assert!(mi_lexer().lex("~\"abc").is_err());
    }
}
