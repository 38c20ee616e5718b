//! Extract keys into a synthesized sub-dictionary.
//!
//! The inverse of [`Inline`](crate::Inline): upstream presents a flat
//! dictionary, and the keys matching a predicate are gathered (renamed) into
//! a new sub-dictionary emitted under `dest_name`. Keys that do not match
//! pass through in place while matching ones accumulate; the synthesized
//! sub-dictionary surfaces where the upstream dictionary ends, and is emitted
//! even when empty.

use crate::{
    error::StreamError,
    path::TokenPath,
    stream::TokenStream,
    token::{Token, coerce_opt},
    transform::{PathMatcher, TransformCore, buffer_value, check_name, skip_balanced},
    value::TokenValue,
};

/// Where in the rewritten dictionary the cursor currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Outside the region; everything passes through.
    Pass,
    /// Inside the region, interleaving pass-through keys with accumulation.
    Gathering,
    /// Upstream is exhausted at this level; `dest_name` is due next.
    EmitDestName,
    /// Replaying the gathered sub-dictionary, at the given buffer index.
    Replaying(usize),
}

/// The grouping transform. See [`TokenStreamExt::outline`].
///
/// [`TokenStreamExt::outline`]: crate::TokenStreamExt::outline
pub struct Outline<S, W, R> {
    core: TransformCore<S>,
    what: W,
    dest_name: TokenValue,
    rename: R,
    state: State,
    /// A non-matching key consumed while scanning, not yet shown downstream.
    next_name: Option<TokenValue>,
    expecting_name: bool,
    buffer: Vec<TokenValue>,
}

impl<S, W, R> Outline<S, W, R>
where
    S: TokenStream,
    W: Fn(&TokenValue) -> bool,
    R: Fn(TokenValue) -> TokenValue,
{
    pub(crate) fn new(
        source: S,
        matcher: PathMatcher,
        what: W,
        dest_name: TokenValue,
        rename: R,
    ) -> Self {
        assert!(!dest_name.is_control(), "destination name must be a scalar");
        Outline {
            core: TransformCore::new(source, matcher),
            what,
            dest_name,
            rename,
            state: State::Pass,
            next_name: None,
            expecting_name: false,
            buffer: Vec::new(),
        }
    }

    /// Whether upstream stands at the region's own dictionary level, with no
    /// additional nesting.
    fn at_region_level(&self) -> bool {
        self.core.source.path().len() == self.core.matcher.len() + 1
    }

    /// Scan forward: accumulate matching keys (with their whole values) into
    /// the buffer, stopping at the first non-matching key or at the end of
    /// the upstream dictionary.
    fn scan(&mut self) -> Result<(), StreamError> {
        if self.buffer.is_empty() {
            self.buffer.push(TokenValue::BeginDictionary);
        }
        loop {
            if self.core.source.peek()? == Token::EndDictionary {
                self.buffer.push(TokenValue::EndDictionary);
                return Ok(());
            }
            let polled = self.core.source.poll(None)?;
            let name = check_name(polled, self.core.source.path())?;
            if (self.what)(&name) {
                self.buffer.push((self.rename)(name));
                buffer_value(&mut self.core.source, &mut self.buffer)?;
            } else {
                self.next_name = Some(name);
                return Ok(());
            }
        }
    }

    /// Begin replaying the gathered sub-dictionary; the visible path diverges
    /// to show it under `dest_name`.
    fn start_replay(&mut self) {
        self.state = State::Replaying(0);
        let mut path = self.core.source.path().diverged();
        path.push_expect_name(Some(true));
        path.after_token(&self.dest_name);
        self.core.path = Some(path);
    }
}

impl<S, W, R> TokenStream for Outline<S, W, R>
where
    S: TokenStream,
    W: Fn(&TokenValue) -> bool,
    R: Fn(TokenValue) -> TokenValue,
{
    fn path(&self) -> &TokenPath {
        self.core.visible_path()
    }

    fn peek(&mut self) -> Result<Token, StreamError> {
        match self.state {
            State::Pass => self.core.source.peek(),
            State::Gathering => {
                if self.expecting_name && self.at_region_level() {
                    if self.next_name.is_none() {
                        self.scan()?;
                    }
                    if let Some(name) = &self.next_name {
                        Ok(name.token())
                    } else {
                        // upstream dictionary done; the synthesized one is next
                        self.state = State::EmitDestName;
                        Ok(self.dest_name.token())
                    }
                } else {
                    self.core.source.peek()
                }
            }
            State::EmitDestName => Ok(self.dest_name.token()),
            State::Replaying(index) => Ok(self.buffer[index].token()),
        }
    }

    fn poll(&mut self, coerce_to: Option<Token>) -> Result<TokenValue, StreamError> {
        match self.state {
            State::Pass => {
                let value = self.core.source.poll(coerce_to)?;
                if value == TokenValue::BeginDictionary && self.core.matches(1) {
                    self.state = State::Gathering;
                    self.expecting_name = true;
                } else {
                    self.core.path = None;
                }
                Ok(value)
            }
            State::Gathering => {
                let expecting_name = self.expecting_name;
                let at_level = self.at_region_level();
                if at_level {
                    self.expecting_name = !expecting_name;
                }
                if expecting_name && at_level {
                    if self.next_name.is_none() {
                        self.scan()?;
                    }
                    if let Some(name) = self.next_name.take() {
                        return coerce_opt(coerce_to, name)
                            .map_err(|e| e.at(self.core.visible_path()));
                    }
                    // upstream dictionary done: emit the synthetic name
                    self.start_replay();
                    coerce_opt(coerce_to, self.dest_name.clone())
                        .map_err(|e| e.at(self.core.visible_path()))
                } else {
                    self.core.source.poll(coerce_to)
                }
            }
            State::EmitDestName => {
                self.start_replay();
                coerce_opt(coerce_to, self.dest_name.clone())
                    .map_err(|e| e.at(self.core.visible_path()))
            }
            State::Replaying(index) => {
                let value = core::mem::replace(&mut self.buffer[index], TokenValue::Null);
                if index + 1 == self.buffer.len() {
                    self.buffer.clear();
                    self.state = State::Pass;
                } else {
                    self.state = State::Replaying(index + 1);
                }
                self.core.own_path().after_token(&value);
                coerce_opt(coerce_to, value).map_err(|e| e.at(self.core.visible_path()))
            }
        }
    }

    fn has_next(&mut self) -> bool {
        match self.state {
            State::Pass => self.core.source.has_next(),
            _ => true,
        }
    }

    fn skip_value(&mut self) -> Result<(), StreamError> {
        match self.state {
            State::Pass => {
                self.core.source.skip_value()?;
                self.core.path = None;
                Ok(())
            }
            State::Gathering => {
                let expecting_name = self.expecting_name;
                let at_level = self.at_region_level();
                if at_level {
                    self.expecting_name = !expecting_name;
                }
                if expecting_name && at_level {
                    if self.next_name.is_none() {
                        self.scan()?;
                    }
                    if self.next_name.take().is_some() {
                        return Ok(());
                    }
                    // they skipped the synthetic name, the buffer still follows
                    self.start_replay();
                    Ok(())
                } else {
                    self.core.source.skip_value()
                }
            }
            State::EmitDestName => {
                self.start_replay();
                Ok(())
            }
            State::Replaying(0) => {
                // the whole synthesized sub-dictionary goes at once
                self.buffer.clear();
                self.state = State::Pass;
                Ok(())
            }
            State::Replaying(_) => skip_balanced(self),
        }
    }
}
