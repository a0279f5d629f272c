//! Rewindable token streams.

/// A lazily-pulled token stream with checkpoint/rewind.
///
/// Tokens are pulled from the source iterator on demand and kept in a
/// buffer, so any position handed out by [`savepoint`](Self::savepoint) can
/// be restored later with [`backtrack`](Self::backtrack).
pub struct TokenStream<'a, T> {
    source: Box<dyn Iterator<Item = T> + 'a>,
    buffer: Vec<T>,
    position: usize,
    exhausted: bool,
}

impl<'a, T> TokenStream<'a, T> {
    /// Create a stream over any iterable source.
    pub fn new<I>(source: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
    {
        Self {
            source: Box::new(source.into_iter()),
            buffer: Vec::new(),
            position: 0,
            exhausted: false,
        }
    }

    /// Current read position, usable with [`backtrack`](Self::backtrack).
    pub fn savepoint(&self) -> usize {
        self.position
    }

    /// Rewind (or fast-forward) to a position previously returned by
    /// [`savepoint`](Self::savepoint).
    pub fn backtrack(&mut self, savepoint: usize) {
        debug_assert!(savepoint <= self.buffer.len());
        self.position = savepoint;
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Option<&T> {
        if self.fill_to(self.position) {
            self.buffer.get(self.position)
        } else {
            None
        }
    }

    /// True when every token has been consumed.
    pub fn is_eos(&mut self) -> bool {
        !self.fill_to(self.position)
    }

    /// Make sure `buffer[index]` exists, pulling from the source as needed.
    fn fill_to(&mut self, index: usize) -> bool {
        while self.buffer.len() <= index {
            if self.exhausted {
                return false;
            }
            match self.source.next() {
                Some(tok) => self.buffer.push(tok),
                None => self.exhausted = true,
            }
        }
        true
    }
}

impl<T: Clone> TokenStream<'_, T> {
    /// Consume and return the next token, or `None` at end of stream.
    pub fn consume(&mut self) -> Option<T> {
        if !self.fill_to(self.position) {
            return None;
        }
        let tok = self.buffer[self.position].clone();
        self.position += 1;
        Some(tok)
    }
}

impl<T> std::fmt::Debug for TokenStream<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStream")
            .field("position", &self.position)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_consume_in_order() {
        let mut s = TokenStream::new("abc".chars());
        assert_eq!(s.consume(), Some('a'));
        assert_eq!(s.consume(), Some('b'));
        assert_eq!(s.consume(), Some('c'));
        assert_eq!(s.consume(), None);
        assert!(s.is_eos());
    }

    #[test]
    fn stream_backtrack_replays_tokens() {
        let mut s = TokenStream::new(vec![1, 2, 3]);
        let sp = s.savepoint();
        assert_eq!(s.consume(), Some(1));
        assert_eq!(s.consume(), Some(2));
        s.backtrack(sp);
        assert_eq!(s.consume(), Some(1));
        assert_eq!(s.savepoint(), 1);
    }

    #[test]
    fn stream_peek_does_not_consume() {
        let mut s = TokenStream::new("xy".chars());
        assert_eq!(s.peek(), Some(&'x'));
        assert_eq!(s.savepoint(), 0);
        assert_eq!(s.consume(), Some('x'));
    }

    #[test]
    fn stream_consume_past_end_keeps_position() {
        let mut s = TokenStream::new("a".chars());
        s.consume();
        assert_eq!(s.consume(), None);
        assert_eq!(s.savepoint(), 1);
    }

    #[test]
    fn stream_empty_is_eos() {
        let mut s = TokenStream::new(Vec::<char>::new());
        assert!(s.is_eos());
    }
}
