//! Character-level lexer built from parser combinators.
//!
//! A [`Lexer`] holds two ordered rule lists. Literal rules are tried before
//! pattern rules, and within each list the first rule that matches wins.
//! Skip rules consume input without producing a lexeme.

use crate::combinator::{literal, satisfy, BoxedParser, Parser};
use crate::error::ParseError;
use crate::stream::TokenStream;

/// Characters of unmatched input quoted in a [`ParseError`].
const ERROR_CONTEXT_CHARS: usize = 16;

/// A classified piece of input.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme<K> {
    pub kind: K,
    /// Value produced by the matching rule. For literals this is the literal
    /// text; pattern rules may decode their input.
    pub text: String,
    /// Character offset of the lexeme in the input.
    pub offset: usize,
}

struct Rule<K> {
    /// `None` marks a skip rule.
    kind: Option<K>,
    matcher: BoxedParser<char, String>,
}

/// Ordered set of literal, pattern and skip rules.
pub struct Lexer<K> {
    literals: Vec<Rule<K>>,
    patterns: Vec<Rule<K>>,
}

impl<K: Clone> Lexer<K> {
    pub fn new() -> Self {
        Self {
            literals: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Add a fixed-text rule.
    pub fn literal(mut self, kind: K, text: &str) -> Self {
        self.literals.push(Rule {
            kind: Some(kind),
            matcher: literal(text).boxed(),
        });
        self
    }

    /// Add a rule whose value is whatever `parser` produces.
    pub fn pattern<P>(mut self, kind: K, parser: P) -> Self
    where
        P: Parser<char, Output = String> + Send + Sync + 'static,
    {
        self.patterns.push(Rule {
            kind: Some(kind),
            matcher: parser.boxed(),
        });
        self
    }

    /// Add a rule that consumes input silently.
    pub fn skip<P>(mut self, parser: P) -> Self
    where
        P: Parser<char> + Send + Sync + 'static,
    {
        let matcher = parser
            .map_result(|tokens: &[char], _| tokens.iter().collect::<String>())
            .boxed();
        self.patterns.push(Rule {
            kind: None,
            matcher,
        });
        self
    }

    /// Split `input` into lexemes.
    ///
    /// Fails at the first position where no rule consumes at least one
    /// character.
    pub fn lex(&self, input: &str) -> Result<Vec<Lexeme<K>>, ParseError> {
        let mut stream = TokenStream::new(input.chars());
        let mut lexemes = Vec::new();

        while !stream.is_eos() {
            let offset = stream.savepoint();
            let matched = self
                .literals
                .iter()
                .chain(self.patterns.iter())
                .find_map(|rule| match rule.matcher.try_parse(&mut stream) {
                    Some(parsed) if !parsed.tokens.is_empty() => Some((rule, parsed.value)),
                    Some(_) => {
                        stream.backtrack(offset);
                        None
                    }
                    None => None,
                });

            let Some((rule, text)) = matched else {
                return Err(ParseError::Syntax {
                    offset,
                    found: input.chars().skip(offset).take(ERROR_CONTEXT_CHARS).collect(),
                });
            };
            if let Some(kind) = &rule.kind {
                lexemes.push(Lexeme {
                    kind: kind.clone(),
                    text,
                    offset,
                });
            }
        }

        Ok(lexemes)
    }
}

impl<K: Clone> Default for Lexer<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> std::fmt::Debug for Lexer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("literals", &self.literals.len())
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

/// Match one lexeme of the given kind, yielding its text.
pub fn kind<K>(expected: K) -> impl Parser<Lexeme<K>, Output = String> + Clone
where
    K: Clone + PartialEq,
{
    satisfy(move |lexeme: &Lexeme<K>| lexeme.kind == expected).map(|lexeme: Lexeme<K>| lexeme.text)
}
