use super::frontend::Token;

/// Pull-based cursor over a translation unit's tokens with a single pushback
/// slot.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    tokens: &'a [Token],
    position: usize,
    pending: Option<&'a Token>,
}

impl<'a> Tokens<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            position: 0,
            pending: None,
        }
    }

    /// Push `token` back so the next call to [`Iterator::next`] returns it.
    ///
    /// # Panics
    ///
    /// Panics if a token is already pending. Two pushbacks without a `next`
    /// in between would silently lose a token.
    pub fn unget(&mut self, token: &'a Token) {
        assert!(
            self.pending.is_none(),
            "Tokens::unget called with a token already pending ({:?})",
            self.pending.map(|t| &t.spelling)
        );
        self.pending = Some(token);
    }

    /// The next token without consuming it.
    pub fn peek(&mut self) -> Option<&'a Token> {
        let token = self.next()?;
        self.unget(token);
        Some(token)
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<&'a Token> {
        if let Some(token) = self.pending.take() {
            return Some(token);
        }
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }
}
