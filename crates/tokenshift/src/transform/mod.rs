//! Structural transforms: [`TokenStream`] decorators that rewrite a stream's
//! shape inside a matched path region and are fully transparent outside it.

mod associate;
mod dissociate;
mod inline;
mod outline;

pub use associate::Associate;
pub use dissociate::Dissociate;
pub use inline::Inline;
pub use outline::Outline;

use crate::{
    error::StreamError,
    path::{Segment, TokenPath},
    stream::TokenStream,
    token::Token,
    value::TokenValue,
};

/// A predicate over one path segment.
pub enum SegmentPredicate {
    /// Matches any segment.
    Any,
    /// Matches a dictionary level whose key equals the given scalar.
    Key(TokenValue),
    /// Matches a sequence level at the given index.
    Index(usize),
    /// An arbitrary predicate.
    Custom(Box<dyn Fn(&Segment) -> bool>),
}

impl SegmentPredicate {
    fn test(&self, segment: &Segment) -> bool {
        match self {
            SegmentPredicate::Any => true,
            SegmentPredicate::Key(v) => segment.as_name() == Some(v),
            SegmentPredicate::Index(i) => segment.as_index() == Some(*i),
            SegmentPredicate::Custom(f) => f(segment),
        }
    }
}

/// Ordered segment predicates selecting the region a transform rewrites: the
/// container whose path has exactly `matcher.len()` segments, all satisfied
/// in order. Fixed length means a region can never contain another match of
/// the same matcher.
pub type PathMatcher = Vec<SegmentPredicate>;

/// How [`Inline`] handles a key present in both the outer dictionary and the
/// flattened sub-dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Report a [`StreamError::DuplicateKey`]. Use when every mapping in the
    /// stream must be preserved.
    Fail,
    /// Let the sub-dictionary's mapping win.
    Replace,
}

/// Where an entry's name and value live within one entry of an
/// association-list shape.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKeys {
    /// Entries are dictionaries `{name_key: name, value_key: value}`.
    Named { name: TokenValue, value: TokenValue },
    /// Entries are 2-tuples; `name_first` tells which element is the name.
    Positional { name_first: bool },
}

impl EntryKeys {
    /// Entry dictionaries keyed by the two given scalar keys.
    ///
    /// # Panics
    ///
    /// If the keys are equal or either is a structural token (that is a
    /// configuration bug, not malformed data).
    #[must_use]
    pub fn named(name: impl Into<TokenValue>, value: impl Into<TokenValue>) -> Self {
        let name = name.into();
        let value = value.into();
        assert!(!name.is_control(), "name key must be a scalar");
        assert!(!value.is_control(), "value key must be a scalar");
        assert!(name != value, "name and value keys must differ");
        EntryKeys::Named { name, value }
    }

    /// Entry 2-tuples with the name at `name_index` and the value at
    /// `value_index`.
    ///
    /// # Panics
    ///
    /// Unless `{name_index, value_index}` is exactly `{0, 1}`.
    #[must_use]
    pub fn positional(name_index: usize, value_index: usize) -> Self {
        assert!(
            (name_index == 0 && value_index == 1) || (name_index == 1 && value_index == 0),
            "entry tuples have exactly two elements",
        );
        EntryKeys::Positional {
            name_first: name_index == 0,
        }
    }

    pub(crate) fn begin_wrap(&self) -> Token {
        match self {
            EntryKeys::Named { .. } => Token::BeginDictionary,
            EntryKeys::Positional { .. } => Token::BeginSequence,
        }
    }

    pub(crate) fn end_wrap(&self) -> Token {
        match self {
            EntryKeys::Named { .. } => Token::EndDictionary,
            EntryKeys::Positional { .. } => Token::EndSequence,
        }
    }

    /// `Some(order)` for positional entries, `None` when the name must be
    /// searched for by key.
    pub(crate) fn name_first(&self) -> Option<bool> {
        match self {
            EntryKeys::Named { .. } => None,
            EntryKeys::Positional { name_first } => Some(*name_first),
        }
    }
}

/// Shared plumbing of every transform: the upstream stream, the region
/// matcher, and the diverged path copy that is live only while the transform
/// is rewriting inside its region.
pub(crate) struct TransformCore<S> {
    pub(crate) source: S,
    pub(crate) matcher: PathMatcher,
    pub(crate) path: Option<TokenPath>,
}

impl<S: TokenStream> TransformCore<S> {
    pub(crate) fn new(source: S, matcher: PathMatcher) -> Self {
        TransformCore {
            source,
            matcher,
            path: None,
        }
    }

    /// Whether the upstream cursor sits exactly `plus_nesting` levels below
    /// the matcher, with every matcher predicate satisfied.
    pub(crate) fn matches(&self, plus_nesting: usize) -> bool {
        let path = self.source.path();
        path.len() == self.matcher.len() + plus_nesting
            && self
                .matcher
                .iter()
                .zip(path.segments())
                .all(|(predicate, segment)| predicate.test(segment))
    }

    pub(crate) fn visible_path(&self) -> &TokenPath {
        match &self.path {
            Some(diverged) => diverged,
            None => self.source.path(),
        }
    }

    pub(crate) fn own_path(&mut self) -> &mut TokenPath {
        self.path.as_mut().expect("not inside a rewritten region")
    }
}

/// Read one whole value from `source` into `buffer` as a flat, replayable
/// token list, `first` being its already-polled first token.
pub(crate) fn buffer_bracket_sequence<S: TokenStream>(
    source: &mut S,
    buffer: &mut Vec<TokenValue>,
    first: TokenValue,
) -> Result<(), StreamError> {
    match first.token() {
        Token::BeginSequence => {
            buffer.push(first);
            loop {
                let next = source.poll(None)?;
                if next == TokenValue::EndSequence {
                    break;
                }
                buffer_bracket_sequence(source, buffer, next)?;
            }
            buffer.push(TokenValue::EndSequence);
            Ok(())
        }
        Token::BeginDictionary => {
            buffer.push(first);
            loop {
                let next = source.poll(None)?;
                if next == TokenValue::EndDictionary {
                    break;
                }
                buffer_bracket_sequence(source, buffer, next)?;
            }
            buffer.push(TokenValue::EndDictionary);
            Ok(())
        }
        token @ (Token::EndSequence | Token::EndDictionary) => {
            Err(StreamError::UnexpectedNesting {
                token,
                path: source.path().to_string(),
            })
        }
        _ => {
            buffer.push(first);
            Ok(())
        }
    }
}

/// Poll and buffer one whole value.
pub(crate) fn buffer_value<S: TokenStream>(
    source: &mut S,
    buffer: &mut Vec<TokenValue>,
) -> Result<(), StreamError> {
    let first = source.poll(None)?;
    buffer_bracket_sequence(source, buffer, first)
}

/// Dictionary names must be scalars.
pub(crate) fn check_name(value: TokenValue, at: &TokenPath) -> Result<TokenValue, StreamError> {
    if value.is_control() {
        Err(StreamError::UnexpectedNesting {
            token: value.token(),
            path: at.to_string(),
        })
    } else {
        Ok(value)
    }
}

/// The trait-default balanced skip, callable from `skip_value` overrides that
/// only sometimes need it.
pub(crate) fn skip_balanced<S: TokenStream + ?Sized>(stream: &mut S) -> Result<(), StreamError> {
    let mut depth = 0i32;
    loop {
        let value = stream.poll(None)?;
        depth += value.token().delta();
        if depth <= 0 {
            return Ok(());
        }
    }
}

/// Adaptor constructors for chaining transforms onto any stream.
pub trait TokenStreamExt: TokenStream + Sized {
    /// Rewrite a sequence of entries at the matched region into a single
    /// dictionary.
    fn associate(self, matcher: PathMatcher, keys: EntryKeys) -> Associate<Self> {
        Associate::new(self, matcher, keys)
    }

    /// Rewrite a dictionary at the matched region into a sequence of entries.
    fn dissociate(self, matcher: PathMatcher, keys: EntryKeys) -> Dissociate<Self> {
        Dissociate::new(self, matcher, keys)
    }

    /// Flatten the sub-dictionary selected by `is_victim` into its parent at
    /// the matched region, renaming its keys.
    fn inline<V, R>(
        self,
        matcher: PathMatcher,
        is_victim: V,
        rename: R,
        merge: MergePolicy,
    ) -> Inline<Self, V, R>
    where
        V: Fn(&TokenValue) -> bool,
        R: Fn(TokenValue) -> TokenValue,
    {
        Inline::new(self, matcher, is_victim, rename, merge)
    }

    /// Extract the keys selected by `what` out of the dictionary at the
    /// matched region into a synthesized sub-dictionary named `dest_name`,
    /// renaming them on the way in.
    fn outline<W, R>(
        self,
        matcher: PathMatcher,
        what: W,
        dest_name: impl Into<TokenValue>,
        rename: R,
    ) -> Outline<Self, W, R>
    where
        W: Fn(&TokenValue) -> bool,
        R: Fn(TokenValue) -> TokenValue,
    {
        Outline::new(self, matcher, what, dest_name.into(), rename)
    }
}

impl<S: TokenStream> TokenStreamExt for S {}
