//! Location tracking for token streams.
//!
//! A [`TokenPath`] describes the logical position of the current token as a
//! sequence of dictionary keys and sequence indices, one segment per open
//! nesting level. Streams update it incrementally; its length always equals
//! the current nesting depth.
//!
//! The path instance is shared and mutable: callers that need a stable
//! snapshot must clone it before consuming further.

use core::fmt;

use crate::{token::Token, value::TokenValue};

/// One nesting level of a [`TokenPath`].
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// A dictionary level. `None` until the key has been read, or when the
    /// key was skipped.
    Name(Option<TokenValue>),
    /// A sequence level, bumped after each element.
    Index(usize),
}

impl Segment {
    #[must_use]
    pub fn as_name(&self) -> Option<&TokenValue> {
        if let Segment::Name(Some(v)) = self {
            Some(v)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        if let Segment::Index(i) = self {
            Some(*i)
        } else {
            None
        }
    }
}

#[doc(hidden)]
pub trait SegmentFrom<T> {
    fn from_segment(value: T) -> Segment;
}

macro_rules! impl_index_as_segment {
    ($($t:ty),+) => {
        $(
            impl SegmentFrom<$t> for Segment {
                fn from_segment(value: $t) -> Self {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    Segment::Index(value as usize)
                }
            }
        )+
    };
}
impl_index_as_segment!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl SegmentFrom<&str> for Segment {
    fn from_segment(value: &str) -> Segment {
        Segment::Name(Some(TokenValue::Str(value.to_owned())))
    }
}

impl SegmentFrom<TokenValue> for Segment {
    fn from_segment(value: TokenValue) -> Segment {
        Segment::Name(Some(value))
    }
}

/// A name-tracing cursor over the open nesting levels.
///
/// Alongside the visible segments it tracks, per level, whether the next
/// consumed unit is a dictionary name or a value, so that plain `after_token`
/// calls are enough to keep keys and indices straight.
#[derive(Debug, Clone, Default)]
pub struct TokenPath {
    segments: Vec<Segment>,
    // None for a sequence level, Some(true) when a dictionary level expects a
    // name next, Some(false) when it expects a value.
    expecting_name: Vec<Option<bool>>,
}

impl PartialEq for TokenPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl PartialEq<[Segment]> for TokenPath {
    fn eq(&self, other: &[Segment]) -> bool {
        self.segments == other
    }
}

impl PartialEq<Vec<Segment>> for TokenPath {
    fn eq(&self, other: &Vec<Segment>) -> bool {
        &self.segments == other
    }
}

impl TokenPath {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Account for one consumed unit.
    ///
    /// # Panics
    ///
    /// On producer bugs: a structural token in name position, an unbalanced
    /// bracket, or a dangling name at `EndDictionary`.
    pub fn after_token(&mut self, value: &TokenValue) {
        match value {
            TokenValue::BeginSequence => {
                assert!(
                    self.expecting_name.last() != Some(&Some(true)),
                    "names of type '{:?}' are not supported",
                    Token::BeginSequence,
                );
                self.segments.push(Segment::Index(0));
                self.expecting_name.push(None);
            }
            TokenValue::EndSequence => {
                match self.segments.pop() {
                    Some(Segment::Index(_)) => {}
                    seg => panic!("unbalanced {:?}, was at {seg:?}", Token::EndSequence),
                }
                self.bump_index();
                assert_eq!(self.expecting_name.pop(), Some(None));
                self.flip_expect_name();
            }
            TokenValue::BeginDictionary => {
                assert!(
                    self.expecting_name.last() != Some(&Some(true)),
                    "names of type '{:?}' are not supported",
                    Token::BeginDictionary,
                );
                self.segments.push(Segment::Name(None));
                self.expecting_name.push(Some(true));
            }
            TokenValue::EndDictionary => {
                match self.segments.pop() {
                    Some(Segment::Name(_)) => {}
                    seg => panic!("unbalanced {:?}, was at {seg:?}", Token::EndDictionary),
                }
                self.bump_index();
                assert_eq!(
                    self.expecting_name.pop(),
                    Some(Some(true)),
                    "dangling name: expected a value but was '{:?}'",
                    Token::EndDictionary,
                );
                self.flip_expect_name();
            }
            scalar => self.after_scalar(Some(scalar.clone())),
        }
    }

    /// Account for one skipped unit (name unknown).
    pub fn skip(&mut self) {
        self.after_scalar(None);
    }

    fn after_scalar(&mut self, value: Option<TokenValue>) {
        match self.expecting_name.last().copied() {
            // at the root element, nothing to do here
            None => {}
            Some(None) => self.bump_index(),
            Some(Some(expecting)) => {
                if expecting {
                    self.set_name(value);
                } else {
                    self.bump_index();
                }
                *self.expecting_name.last_mut().unwrap() = Some(!expecting);
            }
        }
    }

    fn flip_expect_name(&mut self) {
        if let Some(Some(b)) = self.expecting_name.last_mut() {
            *b = !*b;
        }
    }

    /// Set the name of the innermost dictionary level.
    pub(crate) fn set_name(&mut self, name: Option<TokenValue>) {
        let last = self
            .segments
            .last_mut()
            .expect("no open dictionary to name");
        *last = Segment::Name(name);
    }

    /// Bump the innermost index, if the innermost level is a sequence.
    pub(crate) fn bump_index(&mut self) {
        if let Some(Segment::Index(i)) = self.segments.last_mut() {
            *i += 1;
        }
    }

    pub(crate) fn pop_segment(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    pub(crate) fn push_expect_name(&mut self, expecting: Option<bool>) {
        self.expecting_name.push(expecting);
    }

    /// Whether the next consumed unit would be a dictionary name.
    pub(crate) fn awaiting_name(&self) -> bool {
        self.expecting_name.last() == Some(&Some(true))
    }

    /// A transform's diverged copy: same visible segments, no expectation
    /// state for the levels outside the region being rewritten.
    pub(crate) fn diverged(&self) -> TokenPath {
        TokenPath {
            segments: self.segments.clone(),
            expecting_name: Vec::new(),
        }
    }
}

impl fmt::Display for TokenPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                Segment::Index(i) => write!(f, "[{i}]")?,
                Segment::Name(Some(TokenValue::Str(s))) => {
                    write!(f, "['{}']", s.replace('\\', "\\\\").replace('\'', "\\'"))?;
                }
                Segment::Name(Some(v)) => write!(f, "[{v}]")?,
                Segment::Name(None) => f.write_str("[null]")?,
            }
        }
        Ok(())
    }
}
