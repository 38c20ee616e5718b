//! Flatten a named sub-dictionary into its parent.
//!
//! Upstream presents a dictionary containing a victim sub-dictionary;
//! downstream sees a single flat dictionary with the victim's keys renamed
//! and merged among the parent's. The victim may appear anywhere among the
//! parent's keys and the flattened order is not upstream's order, so the
//! entire parent is buffered before anything is emitted.

use indexmap::IndexMap;

use crate::{
    error::StreamError,
    path::TokenPath,
    stream::TokenStream,
    token::{Token, coerce_opt},
    transform::{MergePolicy, PathMatcher, TransformCore, buffer_value, check_name, skip_balanced},
    value::{NameKey, TokenValue},
};

/// Replay position within the buffered flat dictionary.
#[derive(Debug, Clone, Copy)]
enum EmitStep {
    /// About to emit the entry's key.
    Key,
    /// About to emit the entry's value, at the given token index.
    Value(usize),
}

/// The flattening transform. See [`TokenStreamExt::inline`].
///
/// [`TokenStreamExt::inline`]: crate::TokenStreamExt::inline
pub struct Inline<S, V, R> {
    core: TransformCore<S>,
    is_victim: V,
    rename: R,
    merge: MergePolicy,
    buffer: IndexMap<NameKey, Vec<TokenValue>>,
    emitting: Option<(usize, EmitStep)>,
}

impl<S, V, R> Inline<S, V, R>
where
    S: TokenStream,
    V: Fn(&TokenValue) -> bool,
    R: Fn(TokenValue) -> TokenValue,
{
    pub(crate) fn new(
        source: S,
        matcher: PathMatcher,
        is_victim: V,
        rename: R,
        merge: MergePolicy,
    ) -> Self {
        Inline {
            core: TransformCore::new(source, matcher),
            is_victim,
            rename,
            merge,
            buffer: IndexMap::new(),
            emitting: None,
        }
    }

    /// Buffer the whole parent dictionary: non-victim entries keyed in
    /// upstream order, victim entries renamed and merged in afterwards.
    /// Leaves the parent's closing bracket in upstream.
    fn gather(&mut self) -> Result<(), StreamError> {
        debug_assert!(self.buffer.is_empty() && self.emitting.is_none());

        let mut to_inline: Vec<(TokenValue, Vec<TokenValue>)> = Vec::new();
        while self.core.source.peek()? != Token::EndDictionary {
            let polled = self.core.source.poll(None)?;
            let name = check_name(polled, self.core.source.path())?;
            if (self.is_victim)(&name) {
                self.core.source.poll(Some(Token::BeginDictionary))?;
                loop {
                    let inline_name = self.core.source.poll(None)?;
                    if inline_name.is_control() {
                        if inline_name == TokenValue::EndDictionary {
                            break;
                        }
                        return Err(StreamError::UnexpectedNesting {
                            token: inline_name.token(),
                            path: self.core.source.path().to_string(),
                        });
                    }
                    let renamed = (self.rename)(inline_name);
                    let mut value = Vec::new();
                    buffer_value(&mut self.core.source, &mut value)?;
                    to_inline.push((renamed, value));
                }
            } else {
                let mut value = Vec::new();
                buffer_value(&mut self.core.source, &mut value)?;
                if self
                    .buffer
                    .insert(NameKey(name.clone()), value)
                    .is_some()
                {
                    return Err(StreamError::DuplicateKey {
                        key: name.to_string(),
                        path: self.core.source.path().to_string(),
                    });
                }
            }
        }

        for (key, value) in to_inline {
            if self.merge == MergePolicy::Fail && self.buffer.contains_key(&NameKey(key.clone())) {
                return Err(StreamError::DuplicateKey {
                    key: key.to_string(),
                    path: self.core.source.path().to_string(),
                });
            }
            self.buffer.insert(NameKey(key), value);
        }

        if !self.buffer.is_empty() {
            self.emitting = Some((0, EmitStep::Key));
        }
        Ok(())
    }
}

impl<S, V, R> TokenStream for Inline<S, V, R>
where
    S: TokenStream,
    V: Fn(&TokenValue) -> bool,
    R: Fn(TokenValue) -> TokenValue,
{
    fn path(&self) -> &TokenPath {
        self.core.visible_path()
    }

    fn peek(&mut self) -> Result<Token, StreamError> {
        match self.emitting {
            Some((entry, EmitStep::Key)) => {
                let (key, _) = self.buffer.get_index(entry).unwrap();
                Ok(key.0.token())
            }
            Some((entry, EmitStep::Value(index))) => {
                let (_, value) = self.buffer.get_index(entry).unwrap();
                Ok(value[index].token())
            }
            None => self.core.source.peek(),
        }
    }

    fn poll(&mut self, coerce_to: Option<Token>) -> Result<TokenValue, StreamError> {
        match self.emitting {
            Some((entry, EmitStep::Key)) => {
                let (name, _) = self.buffer.get_index(entry).unwrap();
                let key = name.0.clone();
                self.emitting = Some((entry, EmitStep::Value(0)));
                self.core.own_path().set_name(Some(key.clone()));
                coerce_opt(coerce_to, key).map_err(|e| e.at(self.core.visible_path()))
            }
            Some((entry, EmitStep::Value(index))) => {
                let tokens = self.buffer.get_index_mut(entry).unwrap().1;
                let value = core::mem::replace(&mut tokens[index], TokenValue::Null);
                let last = index + 1 == tokens.len();
                self.core.own_path().after_token(&value);
                if !last {
                    self.emitting = Some((entry, EmitStep::Value(index + 1)));
                } else if entry + 1 < self.buffer.len() {
                    self.emitting = Some((entry + 1, EmitStep::Key));
                } else {
                    // all mappings given out; the parent's closing bracket
                    // still comes from upstream
                    self.emitting = None;
                    self.buffer.clear();
                }
                coerce_opt(coerce_to, value).map_err(|e| e.at(self.core.visible_path()))
            }
            None => {
                let value = self.core.source.poll(coerce_to)?;
                // after a region is done, upstream still remembers the name
                // of the dictionary we flattened away; never show it
                self.core.path = None;
                if value == TokenValue::BeginDictionary && self.core.matches(1) {
                    self.core.path = Some(self.core.source.path().diverged());
                    self.gather()?;
                }
                Ok(value)
            }
        }
    }

    fn has_next(&mut self) -> bool {
        self.emitting.is_some() || self.core.source.has_next()
    }

    fn skip_value(&mut self) -> Result<(), StreamError> {
        if self.emitting.is_none() {
            self.core.path = None;
            self.core.source.skip_value()
        } else {
            // already parsed and in memory, just traverse it
            skip_balanced(self)
        }
    }
}
