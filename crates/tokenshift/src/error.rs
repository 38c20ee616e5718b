//! Data-shape errors.
//!
//! These report malformed input relative to a stream's or transform's
//! structural contract. They are never retried; a stream that returned one is
//! unusable afterwards. Programming mistakes (supplying without announcing,
//! re-entering a transform in an impossible state) panic instead.

use thiserror::Error;

use crate::{path::TokenPath, token::Token};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StreamError {
    #[error("value {value} cannot be coerced to {target:?} at {path}")]
    Coercion {
        value: String,
        target: Token,
        path: String,
    },

    #[error("required key {key} was not found at {path}")]
    MissingKey { key: String, path: String },

    #[error("duplicate key {key} at {path}")]
    DuplicateKey { key: String, path: String },

    #[error("unexpected token {token:?}, nesting problem at {path}")]
    UnexpectedNesting { token: Token, path: String },

    #[error("expected {expected}, but was {found:?} at {path}")]
    UnexpectedToken {
        expected: &'static str,
        found: Token,
        path: String,
    },

    #[error("no more tokens")]
    Exhausted,
}

impl StreamError {
    /// Fill in the location, for errors raised where the path was not at
    /// hand. Leaves an already-reported location untouched.
    pub(crate) fn at(mut self, at: &TokenPath) -> Self {
        match &mut self {
            StreamError::Coercion { path, .. }
            | StreamError::MissingKey { path, .. }
            | StreamError::DuplicateKey { path, .. }
            | StreamError::UnexpectedNesting { path, .. }
            | StreamError::UnexpectedToken { path, .. }
                if path.is_empty() =>
            {
                *path = at.to_string();
            }
            _ => {}
        }
        self
    }
}
