//! Pull-based token streams over hierarchical data — scalars, sequences, and
//! keyed dictionaries — produced lazily, consumed incrementally, and rewritten
//! in-flight without ever materializing a full document.
//!
//! The crate sits between a structured type system (the [`DataType`]
//! boundary) and concrete wire formats (which are external consumers of the
//! [`TokenStream`] contract). Its pieces:
//!
//! - [`Token`] / [`TokenValue`]: the closed tag and value sets, with per-tag
//!   coercion rules applied at consumption time.
//! - [`TokenStream`]: the pull contract — `peek`, `poll` with optional
//!   coercion, cheap `skip_value`, and a live [`TokenPath`] for diagnostics.
//! - [`tokens`]: the push→pull generator bridge, letting a producer be
//!   written as ordered emit calls while the consumer pulls at its own pace
//!   and skipped values are never computed.
//! - [`TokenStreamExt`]: composable structural transforms — entries ⇄
//!   dictionary ([`Associate`]/[`Dissociate`]) and flatten ⇄ nest of a named
//!   sub-dictionary ([`Inline`]/[`Outline`]) — each rewriting only inside a
//!   matched path region and transparent everywhere else.
//!
//! ```
//! use tokenshift::{EntryKeys, TokenStream, TokenStreamExt, TokenValue, tokens};
//!
//! // [["a", 1], ["b", 2]]  ->  {"a": 1, "b": 2}
//! let entries = tokens(|scope| {
//!     scope.emit_sequence(|scope| {
//!         for (name, value) in [("a", 1), ("b", 2)] {
//!             scope.emit_sequence(move |scope| {
//!                 scope.emit_str(move || name.to_owned());
//!                 scope.emit_i32(move || value);
//!             });
//!         }
//!     });
//! });
//! let mut dictionary = entries.associate(vec![], EntryKeys::positional(0, 1));
//! assert_eq!(dictionary.poll(None), Ok(TokenValue::BeginDictionary));
//! assert_eq!(dictionary.poll(None), Ok(TokenValue::Str("a".into())));
//! assert_eq!(dictionary.poll(None), Ok(TokenValue::I32(1)));
//! ```

mod error;
mod generate;
mod path;
mod stream;
mod token;
mod transform;
mod typed;
mod value;

#[cfg(test)]
mod tests;

pub use error::StreamError;
pub use generate::{GeneratorStream, Scope, tokens};
pub use path::{Segment, SegmentFrom, TokenPath};
pub use stream::TokenStream;
pub use token::Token;
pub use transform::{
    Associate, Dissociate, EntryKeys, Inline, MergePolicy, Outline, PathMatcher,
    SegmentPredicate, TokenStreamExt,
};
pub use typed::{
    BlobType, BoolType, Collect, DataType, F32Type, F64Type, I32Type, I64Type, Nullable, Record,
    RecordType, StrType, ValuesOf, read_as, read_list_of, tokens_from, values_of,
};
pub use value::TokenValue;

/// Build a `Vec<Segment>` from a heterogeneous list of keys and indices.
///
/// ```
/// use tokenshift::{Segment, TokenValue, path};
///
/// let p = path![0, "foo", 2];
/// assert_eq!(
///     p,
///     vec![
///         Segment::Index(0),
///         Segment::Name(Some(TokenValue::Str("foo".into()))),
///         Segment::Index(2),
///     ]
/// );
/// ```
#[macro_export]
macro_rules! path {
    ( $( $elem:expr ),* $(,)? ) => {{
        #[allow(unused_imports)]
        use $crate::SegmentFrom;
        vec![$($crate::Segment::from_segment($elem)),*]
    }};
}
