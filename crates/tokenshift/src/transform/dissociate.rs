//! Dictionary → entries.
//!
//! The inverse of [`Associate`](crate::Associate): for each entry of the
//! dictionary at the matched region, synthesize an entry wrapper — a 2-tuple
//! or a small dictionary — emitting synthetic brackets and key tokens around
//! the real key and value. When the entry shape puts the value first, the
//! real key (a scalar) is held pending while the value streams through.

use crate::{
    error::StreamError,
    path::{Segment, TokenPath},
    stream::TokenStream,
    token::{Token, coerce_opt},
    transform::{EntryKeys, PathMatcher, TransformCore, check_name},
    value::TokenValue,
};

/// Where in the synthesized entry sequence the cursor currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Outside the region, or before its opening bracket.
    Idle,
    /// About to emit an entry's opening bracket.
    EntryStart,
    /// About to emit the synthetic name key (named entries).
    NameKey,
    /// About to emit the real name, straight from upstream.
    Name,
    /// About to emit the synthetic value key (named entries).
    ValueKey,
    /// The value streams from upstream.
    Value,
    /// About to emit the held-back real name (value-first entries).
    PendingName,
    /// About to emit the entry's closing bracket.
    EntryEnd,
    /// All entries emitted; a synthetic `EndSequence` is due.
    AtEnd,
}

/// The dictionary → entries transform. See [`TokenStreamExt::dissociate`].
///
/// [`TokenStreamExt::dissociate`]: crate::TokenStreamExt::dissociate
pub struct Dissociate<S> {
    core: TransformCore<S>,
    keys: EntryKeys,
    state: State,
    pending_name: Option<TokenValue>,
}

impl<S: TokenStream> Dissociate<S> {
    pub(crate) fn new(source: S, matcher: PathMatcher, keys: EntryKeys) -> Self {
        Dissociate {
            core: TransformCore::new(source, matcher),
            keys,
            state: State::Idle,
            pending_name: None,
        }
    }

    fn name_key(&self) -> TokenValue {
        match &self.keys {
            EntryKeys::Named { name, .. } => name.clone(),
            EntryKeys::Positional { .. } => unreachable!("positional entries have no name key"),
        }
    }

    fn value_key(&self) -> TokenValue {
        match &self.keys {
            EntryKeys::Named { value, .. } => value.clone(),
            EntryKeys::Positional { .. } => unreachable!("positional entries have no value key"),
        }
    }

    fn state_after_entry_start(&self) -> State {
        match self.keys.name_first() {
            Some(true) => State::Name,
            Some(false) => State::Value,
            None => State::NameKey,
        }
    }

    fn state_after_name(&self) -> State {
        match self.keys.name_first() {
            Some(true) => State::Value,
            Some(false) => unreachable!("a value-first name is emitted from the pending slot"),
            None => State::ValueKey,
        }
    }

    fn state_after_value(&self) -> State {
        if self.pending_name.is_some() {
            State::PendingName
        } else {
            State::EntryEnd
        }
    }

    /// Hold the entry's real name back so the value can go out first.
    fn capture_name(&mut self) -> Result<(), StreamError> {
        let polled = self.core.source.poll(None)?;
        self.pending_name = Some(check_name(polled, self.core.source.path())?);
        Ok(())
    }

    /// Position on the next entry, or on the synthetic end of the sequence.
    fn advance_entry(&mut self) -> Result<(), StreamError> {
        if self.core.source.peek()? == Token::EndDictionary {
            self.core.source.poll(None)?;
            self.state = State::AtEnd;
        } else {
            self.state = State::EntryStart;
        }
        Ok(())
    }

    /// Enter the region: drop the dictionary level from the visible path and
    /// show a sequence level instead.
    fn diverge_path(&mut self) {
        let mut path = self.core.source.path().diverged();
        match path.pop_segment() {
            Some(Segment::Name(_)) => {}
            segment => panic!("expected a dictionary level, was at {segment:?}"),
        }
        path.after_token(&TokenValue::BeginSequence);
        self.core.path = Some(path);
    }
}

impl<S: TokenStream> TokenStream for Dissociate<S> {
    fn path(&self) -> &TokenPath {
        self.core.visible_path()
    }

    fn peek(&mut self) -> Result<Token, StreamError> {
        match self.state {
            State::Idle => {
                let token = self.core.source.peek()?;
                if token == Token::BeginDictionary && self.core.matches(0) {
                    Ok(Token::BeginSequence)
                } else {
                    Ok(token)
                }
            }
            State::EntryStart => Ok(self.keys.begin_wrap()),
            State::NameKey => Ok(self.name_key().token()),
            State::Name | State::Value => self.core.source.peek(),
            State::ValueKey => Ok(self.value_key().token()),
            State::PendingName => Ok(self.pending_name.as_ref().unwrap().token()),
            State::EntryEnd => Ok(self.keys.end_wrap()),
            State::AtEnd => Ok(Token::EndSequence),
        }
    }

    fn poll(&mut self, coerce_to: Option<Token>) -> Result<TokenValue, StreamError> {
        match self.state {
            State::Idle => {
                // we present the dictionary as a sequence, so ask upstream
                // for a dictionary when a sequence is requested
                let mapped = match coerce_to {
                    Some(Token::BeginSequence) => Some(Token::BeginDictionary),
                    other => other,
                };
                let value = self.core.source.poll(mapped)?;
                if value == TokenValue::BeginDictionary && self.core.matches(1) {
                    self.diverge_path();
                    self.advance_entry()?;
                    Ok(TokenValue::BeginSequence)
                } else {
                    Ok(value)
                }
            }
            State::EntryStart => {
                let wrap = TokenValue::control(self.keys.begin_wrap());
                let value =
                    coerce_opt(coerce_to, wrap).map_err(|e| e.at(self.core.visible_path()))?;
                self.core.own_path().after_token(&value);
                if self.keys.name_first() == Some(false) {
                    self.capture_name()?;
                }
                self.state = self.state_after_entry_start();
                Ok(value)
            }
            State::NameKey => {
                let key = self.name_key();
                self.core.own_path().after_token(&key);
                self.state = State::Name;
                coerce_opt(coerce_to, key).map_err(|e| e.at(self.core.visible_path()))
            }
            State::Name => {
                let value = self.core.source.poll(coerce_to)?;
                if value.is_control() {
                    return Err(StreamError::UnexpectedNesting {
                        token: value.token(),
                        path: self.core.source.path().to_string(),
                    });
                }
                self.core.own_path().after_token(&value);
                self.state = self.state_after_name();
                Ok(value)
            }
            State::ValueKey => {
                let key = self.value_key();
                self.core.own_path().after_token(&key);
                self.state = State::Value;
                coerce_opt(coerce_to, key).map_err(|e| e.at(self.core.visible_path()))
            }
            State::Value => {
                let entry_level = self.core.matcher.len() + 2;
                let value = self.core.source.poll(coerce_to)?;
                let own = self.core.own_path();
                own.after_token(&value);
                // back at the entry level means the value is complete
                if own.len() == entry_level {
                    self.state = self.state_after_value();
                }
                Ok(value)
            }
            State::PendingName => {
                let name = self.pending_name.take().unwrap();
                self.core.own_path().after_token(&name);
                self.state = State::EntryEnd;
                coerce_opt(coerce_to, name).map_err(|e| e.at(self.core.visible_path()))
            }
            State::EntryEnd => {
                let wrap = TokenValue::control(self.keys.end_wrap());
                let value =
                    coerce_opt(coerce_to, wrap).map_err(|e| e.at(self.core.visible_path()))?;
                self.core.own_path().after_token(&value);
                self.advance_entry()?;
                Ok(value)
            }
            State::AtEnd => {
                self.state = State::Idle;
                self.core.path = None;
                coerce_opt(coerce_to, TokenValue::EndSequence)
            }
        }
    }

    fn has_next(&mut self) -> bool {
        match self.state {
            State::Idle => self.core.source.has_next(),
            _ => true,
        }
    }

    fn skip_value(&mut self) -> Result<(), StreamError> {
        match self.state {
            State::Idle => self.core.source.skip_value(),
            State::EntryStart => {
                // the whole entry goes at once: its name, then its value
                self.core.source.skip_value()?;
                self.core.source.skip_value()?;
                self.core.own_path().skip();
                self.advance_entry()
            }
            State::NameKey => {
                self.core.own_path().skip();
                self.state = State::Name;
                Ok(())
            }
            State::Name => {
                self.core.source.skip_value()?;
                self.core.own_path().skip();
                self.state = self.state_after_name();
                Ok(())
            }
            State::ValueKey => {
                self.core.own_path().skip();
                self.state = State::Value;
                Ok(())
            }
            State::Value => {
                let entry_level = self.core.matcher.len() + 2;
                let token = self.core.source.peek()?;
                self.core.source.skip_value()?;
                let own = self.core.own_path();
                if token.delta() < 0 {
                    own.after_token(&TokenValue::control(token));
                } else {
                    own.skip();
                }
                if own.len() == entry_level {
                    self.state = self.state_after_value();
                }
                Ok(())
            }
            State::PendingName => {
                self.pending_name = None;
                self.core.own_path().skip();
                self.state = State::EntryEnd;
                Ok(())
            }
            State::EntryEnd => {
                self.core
                    .own_path()
                    .after_token(&TokenValue::control(self.keys.end_wrap()));
                self.advance_entry()
            }
            State::AtEnd => {
                self.state = State::Idle;
                self.core.path = None;
                Ok(())
            }
        }
    }
}
