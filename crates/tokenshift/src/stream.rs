//! The pull-stream contract.

use crate::{error::StreamError, path::TokenPath, token::Token, value::TokenValue};

/// A consumable, single-owner cursor over a well-nested token sequence.
///
/// A stream is created positioned before its first token, consumed strictly
/// left to right, and never rewound. It is not safe to share across threads
/// and is driven entirely by the consumer.
pub trait TokenStream {
    /// Nesting information for the current position.
    ///
    /// The returned path is the stream's own live instance: it mutates as the
    /// stream advances. Clone it for a stable snapshot.
    fn path(&self) -> &TokenPath;

    /// The tag of the next unit, without consuming it. Idempotent.
    ///
    /// # Errors
    ///
    /// [`StreamError::Exhausted`] when no tokens remain.
    fn peek(&mut self) -> Result<Token, StreamError>;

    /// Consume one unit, optionally coercing it to `coerce_to`.
    ///
    /// Scalars return their (possibly coerced) payload; structural tokens
    /// return themselves and push or pop a path level.
    ///
    /// # Errors
    ///
    /// [`StreamError::Exhausted`] past the end, or [`StreamError::Coercion`]
    /// when the value cannot represent the requested tag.
    fn poll(&mut self, coerce_to: Option<Token>) -> Result<TokenValue, StreamError>;

    /// Whether any token remains.
    fn has_next(&mut self) -> bool;

    /// Consume and discard one whole value, scalar or entire subtree.
    ///
    /// Position and path end up exactly as if the value had been fully
    /// polled. Implementations override this when they can discard cheaper
    /// than token-by-token.
    ///
    /// # Errors
    ///
    /// Propagates any underlying consumption error.
    fn skip_value(&mut self) -> Result<(), StreamError> {
        let mut depth = 0i32;
        loop {
            let value = self.poll(None)?;
            depth += value.token().delta();
            // `depth > 0`, not `depth != 0`: a leading closing bracket must
            // terminate the loop, not run it away.
            if depth <= 0 {
                return Ok(());
            }
        }
    }
}

impl<S: TokenStream + ?Sized> TokenStream for &mut S {
    fn path(&self) -> &TokenPath {
        (**self).path()
    }

    fn peek(&mut self) -> Result<Token, StreamError> {
        (**self).peek()
    }

    fn poll(&mut self, coerce_to: Option<Token>) -> Result<TokenValue, StreamError> {
        (**self).poll(coerce_to)
    }

    fn has_next(&mut self) -> bool {
        (**self).has_next()
    }

    fn skip_value(&mut self) -> Result<(), StreamError> {
        (**self).skip_value()
    }
}

impl<S: TokenStream + ?Sized> TokenStream for Box<S> {
    fn path(&self) -> &TokenPath {
        (**self).path()
    }

    fn peek(&mut self) -> Result<Token, StreamError> {
        (**self).peek()
    }

    fn poll(&mut self, coerce_to: Option<Token>) -> Result<TokenValue, StreamError> {
        (**self).poll(coerce_to)
    }

    fn has_next(&mut self) -> bool {
        (**self).has_next()
    }

    fn skip_value(&mut self) -> Result<(), StreamError> {
        (**self).skip_value()
    }
}
