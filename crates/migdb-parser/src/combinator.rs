//! Parser trait and combinators.
//!
//! Every parser is tried through [`Parser::try_parse`], which rewinds the
//! stream to where it started whenever the attempt fails. Combinators call
//! `try_parse` on their children, so backtracking holds at every level.

use std::sync::{Arc, OnceLock};

use crate::stream::TokenStream;

/// A successful parse: the tokens consumed and the value produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T, O> {
    /// Tokens consumed by the parser, in input order.
    pub tokens: Vec<T>,
    /// The value built from those tokens.
    pub value: O,
}

/// Shared, type-erased parser handle.
pub type BoxedParser<T, O> = Arc<dyn Parser<T, Output = O> + Send + Sync>;

/// A recognizer over a stream of `T` tokens.
pub trait Parser<T> {
    /// The value produced on success.
    type Output;

    /// Run the parser once. May leave the stream partially consumed on
    /// failure; callers should go through [`try_parse`](Self::try_parse).
    fn attempt(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, Self::Output>>;

    /// Run the parser, rewinding to the starting position on failure.
    fn try_parse(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, Self::Output>> {
        let savepoint = stream.savepoint();
        let result = self.attempt(stream);
        if result.is_none() {
            stream.backtrack(savepoint);
        }
        result
    }

    /// Match `self` then `next`, producing both values.
    fn then<P>(self, next: P) -> Then<Self, P>
    where
        Self: Sized,
        P: Parser<T>,
    {
        Then {
            first: self,
            second: next,
        }
    }

    /// Match `self` then `next`, keeping only the value of `self`.
    #[allow(clippy::type_complexity)]
    fn then_skip<P>(
        self,
        next: P,
    ) -> Map<Then<Self, P>, fn((Self::Output, P::Output)) -> Self::Output>
    where
        Self: Sized,
        T: Clone,
        P: Parser<T>,
    {
        let keep_first: fn((Self::Output, P::Output)) -> Self::Output = |(kept, _)| kept;
        self.then(next).map(keep_first)
    }

    /// Match `self` then `next`, keeping only the value of `next`.
    #[allow(clippy::type_complexity)]
    fn skip_then<P>(self, next: P) -> Map<Then<Self, P>, fn((Self::Output, P::Output)) -> P::Output>
    where
        Self: Sized,
        T: Clone,
        P: Parser<T>,
    {
        let keep_second: fn((Self::Output, P::Output)) -> P::Output = |(_, kept)| kept;
        self.then(next).map(keep_second)
    }

    /// Ordered choice: try `self`, and only if it fails try `alternative`.
    fn or<P>(self, alternative: P) -> Or<Self, P>
    where
        Self: Sized,
        P: Parser<T, Output = Self::Output>,
    {
        Or {
            first: self,
            second: alternative,
        }
    }

    /// Match `self` between `min` and `max` (inclusive) times.
    fn repeat(self, min: usize, max: Option<usize>) -> Repeat<Self>
    where
        Self: Sized,
    {
        Repeat {
            inner: self,
            min,
            max,
        }
    }

    /// Attach a result transform that sees the consumed tokens and the value.
    ///
    /// Transforms compose: attaching another one wraps this one.
    fn map_result<F, U>(self, transform: F) -> MapResult<Self, F>
    where
        Self: Sized,
        F: Fn(&[T], Self::Output) -> U,
    {
        MapResult {
            inner: self,
            transform,
        }
    }

    /// Attach a transform of the value alone.
    fn map<F, U>(self, transform: F) -> Map<Self, F>
    where
        Self: Sized,
        F: Fn(Self::Output) -> U,
    {
        Map {
            inner: self,
            transform,
        }
    }

    /// Match as usual but discard the value.
    fn ignore(self) -> Map<Self, fn(Self::Output)>
    where
        Self: Sized,
    {
        let discard: fn(Self::Output) = |_| ();
        self.map(discard)
    }

    /// Erase the parser type behind a shared handle.
    fn boxed(self) -> BoxedParser<T, Self::Output>
    where
        Self: Sized + Send + Sync + 'static,
    {
        Arc::new(self)
    }
}

impl<T, P: Parser<T> + ?Sized> Parser<T> for Arc<P> {
    type Output = P::Output;

    fn attempt(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, Self::Output>> {
        (**self).attempt(stream)
    }
}

/// Sequencing, see [`Parser::then`].
#[derive(Debug, Clone)]
pub struct Then<A, B> {
    first: A,
    second: B,
}

impl<T: Clone, A: Parser<T>, B: Parser<T>> Parser<T> for Then<A, B> {
    type Output = (A::Output, B::Output);

    fn attempt(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, Self::Output>> {
        let first = self.first.try_parse(stream)?;
        let second = self.second.try_parse(stream)?;
        let mut tokens = first.tokens;
        tokens.extend(second.tokens);
        Some(Parsed {
            tokens,
            value: (first.value, second.value),
        })
    }
}

/// Ordered choice, see [`Parser::or`].
#[derive(Debug, Clone)]
pub struct Or<A, B> {
    first: A,
    second: B,
}

impl<T: Clone, A: Parser<T>, B: Parser<T, Output = A::Output>> Parser<T> for Or<A, B> {
    type Output = A::Output;

    fn attempt(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, Self::Output>> {
        self.first
            .try_parse(stream)
            .or_else(|| self.second.try_parse(stream))
    }
}

/// Bounded repetition, see [`Parser::repeat`].
#[derive(Debug, Clone)]
pub struct Repeat<P> {
    inner: P,
    min: usize,
    max: Option<usize>,
}

impl<T: Clone, P: Parser<T>> Parser<T> for Repeat<P> {
    type Output = Vec<P::Output>;

    fn attempt(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, Self::Output>> {
        let mut tokens = Vec::new();
        let mut values = Vec::new();
        while self.max.map_or(true, |max| values.len() < max) {
            let before = stream.savepoint();
            let Some(parsed) = self.inner.try_parse(stream) else {
                break;
            };
            let consumed = stream.savepoint() != before;
            tokens.extend(parsed.tokens);
            values.push(parsed.value);
            // A match that consumed nothing would repeat forever.
            if !consumed {
                break;
            }
        }
        if values.len() < self.min {
            return None;
        }
        Some(Parsed {
            tokens,
            value: values,
        })
    }
}

/// Result transform over tokens and value, see [`Parser::map_result`].
#[derive(Debug, Clone)]
pub struct MapResult<P, F> {
    inner: P,
    transform: F,
}

impl<T, P, F, U> Parser<T> for MapResult<P, F>
where
    T: Clone,
    P: Parser<T>,
    F: Fn(&[T], P::Output) -> U,
{
    type Output = U;

    fn attempt(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, U>> {
        let parsed = self.inner.try_parse(stream)?;
        let value = (self.transform)(&parsed.tokens, parsed.value);
        Some(Parsed {
            tokens: parsed.tokens,
            value,
        })
    }
}

/// Value transform, see [`Parser::map`].
#[derive(Debug, Clone)]
pub struct Map<P, F> {
    inner: P,
    transform: F,
}

impl<T, P, F, U> Parser<T> for Map<P, F>
where
    T: Clone,
    P: Parser<T>,
    F: Fn(P::Output) -> U,
{
    type Output = U;

    fn attempt(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, U>> {
        let parsed = self.inner.try_parse(stream)?;
        Some(Parsed {
            tokens: parsed.tokens,
            value: (self.transform)(parsed.value),
        })
    }
}

/// Matches exactly one token equal to the expected one.
#[derive(Debug, Clone)]
pub struct Just<T> {
    expected: T,
}

impl<T: Clone + PartialEq> Parser<T> for Just<T> {
    type Output = T;

    fn attempt(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, T>> {
        let tok = stream.consume()?;
        (tok == self.expected).then(|| Parsed {
            tokens: vec![tok.clone()],
            value: tok,
        })
    }
}

/// Terminal matcher for a single token.
pub fn just<T: Clone + PartialEq>(expected: T) -> Just<T> {
    Just { expected }
}

/// Matches one token accepted by a predicate.
#[derive(Debug, Clone)]
pub struct Satisfy<F> {
    predicate: F,
}

impl<T: Clone, F: Fn(&T) -> bool> Parser<T> for Satisfy<F> {
    type Output = T;

    fn attempt(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, T>> {
        let tok = stream.consume()?;
        (self.predicate)(&tok).then(|| Parsed {
            tokens: vec![tok.clone()],
            value: tok,
        })
    }
}

/// Predicate matcher for a single token.
pub fn satisfy<T, F>(predicate: F) -> Satisfy<F>
where
    F: Fn(&T) -> bool,
{
    Satisfy { predicate }
}

/// Matches one character from a set (or, when `exclude` is set, outside it).
#[derive(Debug, Clone)]
pub struct CharClass {
    set: Vec<char>,
    exclude: bool,
}

impl Parser<char> for CharClass {
    type Output = char;

    fn attempt(&self, stream: &mut TokenStream<'_, char>) -> Option<Parsed<char, char>> {
        let c = stream.consume()?;
        (self.set.contains(&c) != self.exclude).then(|| Parsed {
            tokens: vec![c],
            value: c,
        })
    }
}

/// Any one character contained in `chars`.
pub fn one_of(chars: &str) -> CharClass {
    CharClass {
        set: chars.chars().collect(),
        exclude: false,
    }
}

/// Any one character not contained in `chars`.
pub fn none_of(chars: &str) -> CharClass {
    CharClass {
        set: chars.chars().collect(),
        exclude: true,
    }
}

/// Matches a fixed character sequence.
#[derive(Debug, Clone)]
pub struct Literal {
    text: Vec<char>,
}

impl Parser<char> for Literal {
    type Output = String;

    fn attempt(&self, stream: &mut TokenStream<'_, char>) -> Option<Parsed<char, String>> {
        for expected in &self.text {
            if stream.consume()? != *expected {
                return None;
            }
        }
        Some(Parsed {
            tokens: self.text.clone(),
            value: self.text.iter().collect(),
        })
    }
}

/// A literal string of characters.
pub fn literal(text: &str) -> Literal {
    Literal {
        text: text.chars().collect(),
    }
}

/// One or more characters from `chars`, collected into a string.
pub fn word(chars: &str) -> Map<Repeat<CharClass>, fn(Vec<char>) -> String> {
    let collect: fn(Vec<char>) -> String = |cs| cs.into_iter().collect();
    one_of(chars).repeat(1, None).map(collect)
}

/// Zero or more repetitions.
pub fn zero_or_more<T: Clone, P: Parser<T>>(inner: P) -> Repeat<P> {
    inner.repeat(0, None)
}

/// One or more repetitions.
pub fn one_or_more<T: Clone, P: Parser<T>>(inner: P) -> Repeat<P> {
    inner.repeat(1, None)
}

/// Zero or one match; never fails.
#[allow(clippy::type_complexity)]
pub fn optional<T: Clone, P: Parser<T>>(
    inner: P,
) -> Map<Repeat<P>, fn(Vec<P::Output>) -> Option<P::Output>> {
    let first: fn(Vec<P::Output>) -> Option<P::Output> = |mut found| found.pop();
    inner.repeat(0, Some(1)).map(first)
}

/// Zero or one match, yielding `default` when the inner parser fails.
pub fn optional_or<T, P>(inner: P, default: P::Output) -> impl Parser<T, Output = P::Output>
where
    T: Clone,
    P: Parser<T>,
    P::Output: Clone,
{
    optional(inner).map(move |found| found.unwrap_or_else(|| default.clone()))
}

/// `item (sep item)*`, keeping only the items.
pub fn delimited_list<T, P, S>(item: P, sep: S) -> impl Parser<T, Output = Vec<P::Output>> + Clone
where
    T: Clone,
    P: Parser<T> + Clone,
    S: Parser<T> + Clone,
{
    item.clone()
        .then(zero_or_more(sep.skip_then(item)))
        .map(|(head, tail)| {
            let mut items = Vec::with_capacity(tail.len() + 1);
            items.push(head);
            items.extend(tail);
            items
        })
}

/// A parser defined after construction, for recursive grammars.
///
/// Clones share the same slot, so a grammar can refer to a `Forward`
/// before [`define`](Self::define) fills it in.
///
/// A definition that refers back to its own `Forward` holds a clone of
/// it, so the slot and the parser keep each other alive and are never
/// freed. Build a recursive grammar once and share it, e.g. from a
/// `static OnceLock`.
pub struct Forward<T, O> {
    slot: Arc<OnceLock<BoxedParser<T, O>>>,
}

impl<T, O> Forward<T, O> {
    /// Create an undefined forward reference.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(OnceLock::new()),
        }
    }

    /// Fill in the parser. Only the first definition takes effect.
    pub fn define<P>(&self, parser: P)
    where
        P: Parser<T, Output = O> + Send + Sync + 'static,
    {
        if self.slot.set(Arc::new(parser)).is_err() {
            tracing::warn!("forward parser defined twice; keeping the first definition");
        }
    }

    /// Whether [`define`](Self::define) has been called.
    pub fn is_defined(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl<T, O> Clone for Forward<T, O> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T, O> Default for Forward<T, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, O> Parser<T> for Forward<T, O> {
    type Output = O;

    fn attempt(&self, stream: &mut TokenStream<'_, T>) -> Option<Parsed<T, O>> {
        match self.slot.get() {
            Some(parser) => parser.try_parse(stream),
            None => {
                tracing::error!("forward parser used before being defined");
                None
            }
        }
    }
}

/// Parse the whole input with `parser`, failing unless every token is consumed.
pub fn parse_all<T, P, I>(parser: &P, input: I) -> Option<P::Output>
where
    T: Clone,
    P: Parser<T>,
    I: IntoIterator<Item = T>,
{
    let mut stream = TokenStream::new(input);
    let parsed = parser.try_parse(&mut stream)?;
    stream.is_eos().then_some(parsed.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit() -> CharClass {
        one_of("0123456789")
    }

    #[test]
    fn failed_sequence_leaves_position_unchanged() {
        let p = literal("ab").then(literal("cd"));
        let mut s = TokenStream::new("abce".chars());
        s.consume();
        let before = s.savepoint();
        // "bce" does not start with "ab"
        assert!(p.try_parse(&mut s).is_none());
        assert_eq!(s.savepoint(), before);

        let mut s = TokenStream::new("abce".chars());
        assert!(p.try_parse(&mut s).is_none());
        assert_eq!(s.savepoint(), 0);
    }

    #[test]
    fn failed_repeat_below_minimum_rewinds() {
        let p = digit().repeat(3, None);
        let mut s = TokenStream::new("12x".chars());
        assert!(p.try_parse(&mut s).is_none());
        assert_eq!(s.savepoint(), 0);
    }

    #[test]
    fn sequence_collects_tokens_and_values() {
        let p = literal("ab").then(digit());
        let mut s = TokenStream::new("ab7".chars());
        let parsed = p.try_parse(&mut s).unwrap();
        assert_eq!(parsed.tokens, vec!['a', 'b', '7']);
        assert_eq!(parsed.value, ("ab".to_string(), '7'));
    }

    #[test]
    fn or_takes_first_success_not_longest() {
        let p = literal("a").or(literal("ab"));
        let mut s = TokenStream::new("ab".chars());
        let parsed = p.try_parse(&mut s).unwrap();
        assert_eq!(parsed.value, "a");
        assert_eq!(s.savepoint(), 1);
    }

    #[test]
    fn or_falls_through_after_partial_match() {
        let p = literal("abc").or(literal("abd"));
        let mut s = TokenStream::new("abd".chars());
        assert_eq!(p.try_parse(&mut s).unwrap().value, "abd");
    }

    #[test]
    fn repeat_respects_maximum() {
        let p = digit().repeat(1, Some(2));
        let mut s = TokenStream::new("12345".chars());
        let parsed = p.try_parse(&mut s).unwrap();
        assert_eq!(parsed.value, vec!['1', '2']);
        assert_eq!(s.savepoint(), 2);
    }

    #[test]
    fn zero_or_more_accepts_nothing() {
        let p = zero_or_more(digit());
        let mut s = TokenStream::new("x".chars());
        let parsed = p.try_parse(&mut s).unwrap();
        assert!(parsed.value.is_empty());
        assert_eq!(s.savepoint(), 0);
    }

    #[test]
    fn repeat_of_empty_match_terminates() {
        let p = optional(digit()).repeat(0, None);
        let mut s = TokenStream::new("x".chars());
        assert!(p.try_parse(&mut s).is_some());
    }

    #[test]
    fn optional_never_fails() {
        let p = optional(literal("zz"));
        let mut s = TokenStream::new("za".chars());
        let parsed = p.try_parse(&mut s).unwrap();
        assert_eq!(parsed.value, None);
        assert_eq!(s.savepoint(), 0);
    }

    #[test]
    fn optional_or_yields_default() {
        let p = optional_or(literal("x"), "none".to_string());
        let mut s = TokenStream::new("y".chars());
        assert_eq!(p.try_parse(&mut s).unwrap().value, "none");
        let mut s = TokenStream::new("x".chars());
        assert_eq!(p.try_parse(&mut s).unwrap().value, "x");
    }

    #[test]
    fn transforms_compose_in_order() {
        let p = word("0123456789")
            .map_result(|toks, v| {
                assert_eq!(toks.len(), v.len());
                v.parse::<i64>().unwrap_or(0)
            })
            .map(|n| n * 2)
            .map_result(|_, n| n + 1);
        assert_eq!(parse_all(&p, "21".chars()), Some(43));
    }

    #[test]
    fn ignore_discards_value() {
        let p = literal("skip").ignore().skip_then(digit());
        assert_eq!(parse_all(&p, "skip5".chars()), Some('5'));
    }

    #[test]
    fn skip_combinators_over_integer_tokens() {
        let header = just(0u8).skip_then(satisfy(|n: &u8| *n > 0)).then_skip(just(0u8));
        assert_eq!(parse_all(&header, vec![0, 7, 0]), Some(7));
        assert_eq!(parse_all(&header, vec![0, 0, 0]), None);
    }

    #[test]
    fn then_skip_keeps_left() {
        let p = digit().then_skip(literal(";"));
        assert_eq!(parse_all(&p, "4;".chars()), Some('4'));
    }

    #[test]
    fn delimited_list_parses_items() {
        let p = delimited_list(word("abc"), just(','));
        assert_eq!(
            parse_all(&p, "ab,c,cba".chars()),
            Some(vec!["ab".into(), "c".into(), "cba".into()])
        );
    }

    #[test]
    fn delimited_list_does_not_eat_trailing_separator() {
        let p = delimited_list(word("abc"), just(','));
        let mut s = TokenStream::new("a,b,".chars());
        let parsed = p.try_parse(&mut s).unwrap();
        assert_eq!(parsed.value.len(), 2);
        assert_eq!(s.savepoint(), 3);
    }

    #[test]
    fn none_of_excludes_characters() {
        let p = none_of("\"").repeat(0, None);
        let mut s = TokenStream::new("ab\"".chars());
        assert_eq!(p.try_parse(&mut s).unwrap().value, vec!['a', 'b']);
    }

    #[test]
    fn satisfy_on_integers() {
        let even = satisfy(|n: &u32| n % 2 == 0);
        assert_eq!(parse_all(&even.repeat(1, None), vec![2, 4, 6]), Some(vec![2, 4, 6]));
        assert_eq!(parse_all(&just(3u32), vec![4]), None);
    }

    #[test]
    fn forward_supports_recursion() {
        // nested := '(' nested ')' | 'x'
        let nested: Forward<char, usize> = Forward::new();
        let inner = just('(')
            .skip_then(nested.clone())
            .then_skip(just(')'))
            .map(|depth| depth + 1)
            .or(just('x').map(|_| 0));
        nested.define(inner);
        assert!(nested.is_defined());
        assert_eq!(parse_all(&nested, "((x))".chars()), Some(2));
        assert_eq!(parse_all(&nested, "((x)".chars()), None);
    }

    #[test]
    fn undefined_forward_fails() {
        let p: Forward<char, ()> = Forward::new();
        let mut s = TokenStream::new("a".chars());
        assert!(p.try_parse(&mut s).is_none());
        assert_eq!(s.savepoint(), 0);
    }

    #[test]
    fn parse_all_requires_full_consumption() {
        assert_eq!(parse_all(&literal("ab"), "abc".chars()), None);
        assert_eq!(parse_all(&literal("ab"), "ab".chars()), Some("ab".into()));
    }

    #[test]
    fn boxed_parsers_are_shareable() {
        let p = word("ab").boxed();
        let q = p.clone().then(just('!'));
        assert_eq!(parse_all(&q, "ab!".chars()), Some(("ab".into(), '!')));
        assert_eq!(parse_all(&p, "ba".chars()), Some("ba".into()));
    }
}
