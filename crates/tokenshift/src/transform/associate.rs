//! Entries → dictionary.
//!
//! Upstream presents a sequence of entries at the matched region — 2-tuples,
//! or small dictionaries each holding a name key and a value key. Downstream
//! sees a single dictionary merging all entries. When the value arrives
//! before the name within an entry, the whole value is buffered as a flat
//! token list and replayed once the name is known.

use crate::{
    error::StreamError,
    path::{Segment, TokenPath},
    stream::TokenStream,
    token::{Token, coerce_opt},
    transform::{
        EntryKeys, PathMatcher, TransformCore, buffer_value, skip_balanced,
    },
    value::TokenValue,
};

/// Where in the rewritten dictionary the cursor currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Outside the region, or before its opening bracket.
    Idle,
    /// Inside an entry, before the name has been located.
    BeforeName,
    /// Upstream is positioned right at the entry's name.
    AtName,
    /// Name consumed; the value still needs to be located.
    BeforeValue,
    /// The value streams straight from upstream.
    AtValue,
    /// Replaying a buffered value, at the given buffer index.
    Replaying(usize),
    /// All entries consumed; a synthetic `EndDictionary` is due.
    AtEnd,
}

/// The entries → dictionary transform. See [`TokenStreamExt::associate`].
///
/// [`TokenStreamExt::associate`]: crate::TokenStreamExt::associate
pub struct Associate<S> {
    core: TransformCore<S>,
    keys: EntryKeys,
    state: State,
    value_buffer: Vec<TokenValue>,
}

impl<S: TokenStream> Associate<S> {
    pub(crate) fn new(source: S, matcher: PathMatcher, keys: EntryKeys) -> Self {
        Associate {
            core: TransformCore::new(source, matcher),
            keys,
            state: State::Idle,
            value_buffer: Vec::new(),
        }
    }

    fn first_entry_state(&self) -> State {
        match self.keys.name_first() {
            Some(true) => State::AtName,
            _ => State::BeforeName,
        }
    }

    /// Consume the entry's opening bracket and position on its contents.
    fn enter_entry(&mut self) -> Result<(), StreamError> {
        self.core.source.poll(Some(self.keys.begin_wrap()))?;
        self.state = self.first_entry_state();
        Ok(())
    }

    /// Advance upstream until it stands right at the entry's name, buffering
    /// the value if it comes first.
    fn approach_name(&mut self) -> Result<(), StreamError> {
        self.state = State::AtName;
        match self.keys.clone() {
            EntryKeys::Positional { name_first: true } => unreachable!(),
            EntryKeys::Positional { name_first: false } => {
                buffer_value(&mut self.core.source, &mut self.value_buffer)
            }
            EntryKeys::Named { name, value } => loop {
                let key = self.core.source.poll(None)?;
                match key.token() {
                    Token::EndDictionary => {
                        return Err(StreamError::MissingKey {
                            key: name.to_string(),
                            path: self.core.source.path().to_string(),
                        });
                    }
                    token if token.is_control() => {
                        return Err(StreamError::UnexpectedNesting {
                            token,
                            path: self.core.source.path().to_string(),
                        });
                    }
                    _ => {}
                }
                if key == name {
                    return Ok(());
                }
                if key == value {
                    buffer_value(&mut self.core.source, &mut self.value_buffer)?;
                } else {
                    self.core.source.skip_value()?;
                }
            },
        }
    }

    /// Advance upstream until it stands right at the entry's value.
    fn approach_value(&mut self) -> Result<(), StreamError> {
        self.state = State::AtValue;
        let EntryKeys::Named { value, .. } = self.keys.clone() else {
            unreachable!("positional values never need searching");
        };
        loop {
            let key = self.core.source.poll(None)?;
            match key.token() {
                Token::EndDictionary => {
                    return Err(StreamError::MissingKey {
                        key: value.to_string(),
                        path: self.core.source.path().to_string(),
                    });
                }
                token if token.is_control() => {
                    return Err(StreamError::UnexpectedNesting {
                        token,
                        path: self.core.source.path().to_string(),
                    });
                }
                _ => {}
            }
            if key == value {
                return Ok(());
            }
            self.core.source.skip_value()?;
        }
    }

    /// After a name, the entry's value comes either from the buffer or
    /// straight from upstream.
    fn state_after_name(&self) -> State {
        match self.keys.name_first() {
            Some(true) => State::AtValue,
            Some(false) => State::Replaying(0),
            None => {
                if self.value_buffer.is_empty() {
                    State::BeforeValue
                } else {
                    State::Replaying(0)
                }
            }
        }
    }

    /// Drain the rest of the current entry and position on the next one, or
    /// on the synthetic end of the dictionary.
    fn exit_entry(&mut self) -> Result<(), StreamError> {
        self.value_buffer.clear();

        let end_wrap = self.keys.end_wrap();
        loop {
            let next = self.core.source.poll(None)?;
            if next.token() == end_wrap {
                break;
            }
            if next.is_control() {
                return Err(StreamError::UnexpectedNesting {
                    token: next.token(),
                    path: self.core.source.path().to_string(),
                });
            }
            if self.keys.name_first().is_none() {
                // skipped a stray name, skip the value that goes with it
                self.core.source.skip_value()?;
            }
        }

        let next = self.core.source.poll(None)?;
        if next.token() == self.keys.begin_wrap() {
            self.state = self.first_entry_state();
            Ok(())
        } else if next == TokenValue::EndSequence {
            self.state = State::AtEnd;
            Ok(())
        } else {
            Err(StreamError::UnexpectedToken {
                expected: "an entry or the end of the entry sequence",
                found: next.token(),
                path: self.core.source.path().to_string(),
            })
        }
    }

    /// Enter the region: drop the sequence level from the visible path and
    /// show a dictionary level instead.
    fn diverge_path(&mut self) {
        let mut path = self.core.source.path().diverged();
        match path.pop_segment() {
            Some(Segment::Index(_)) => {}
            segment => panic!("expected a sequence level, was at {segment:?}"),
        }
        path.after_token(&TokenValue::BeginDictionary);
        self.core.path = Some(path);
    }
}

impl<S: TokenStream> TokenStream for Associate<S> {
    fn path(&self) -> &TokenPath {
        self.core.visible_path()
    }

    fn peek(&mut self) -> Result<Token, StreamError> {
        match self.state {
            State::Idle => {
                let token = self.core.source.peek()?;
                if token == Token::BeginSequence && self.core.matches(0) {
                    Ok(Token::BeginDictionary)
                } else {
                    Ok(token)
                }
            }
            State::BeforeName => {
                self.approach_name()?;
                self.core.source.peek()
            }
            State::AtName | State::AtValue => self.core.source.peek(),
            State::BeforeValue => {
                self.approach_value()?;
                self.core.source.peek()
            }
            State::Replaying(index) => Ok(self.value_buffer[index].token()),
            State::AtEnd => Ok(Token::EndDictionary),
        }
    }

    fn poll(&mut self, coerce_to: Option<Token>) -> Result<TokenValue, StreamError> {
        match self.state {
            State::Idle => {
                // we present the sequence as a dictionary, so ask upstream
                // for a sequence when a dictionary is requested
                let mapped = match coerce_to {
                    Some(Token::BeginDictionary) => Some(Token::BeginSequence),
                    other => other,
                };
                let value = self.core.source.poll(mapped)?;
                if value == TokenValue::BeginSequence && self.core.matches(1) {
                    self.diverge_path();
                    if self.core.source.peek()? == Token::EndSequence {
                        self.core.source.poll(None)?;
                        self.state = State::AtEnd;
                    } else {
                        self.enter_entry()?;
                    }
                    Ok(TokenValue::BeginDictionary)
                } else {
                    Ok(value)
                }
            }
            State::BeforeName => {
                self.approach_name()?;
                self.poll(coerce_to)
            }
            State::AtName => {
                let value = self.core.source.poll(coerce_to)?;
                self.core.own_path().after_token(&value);
                self.state = self.state_after_name();
                Ok(value)
            }
            State::BeforeValue => {
                self.approach_value()?;
                self.poll(coerce_to)
            }
            State::AtValue => {
                let dictionary_level = self.core.matcher.len() + 1;
                let value = self.core.source.poll(coerce_to)?;
                let own = self.core.own_path();
                own.after_token(&value);
                // back at the dictionary level means the value is complete
                if own.len() == dictionary_level
                    && (!value.is_control() || value.token().delta() < 0)
                {
                    self.exit_entry()?;
                }
                Ok(value)
            }
            State::Replaying(index) => {
                let value =
                    core::mem::replace(&mut self.value_buffer[index], TokenValue::Null);
                self.core.own_path().after_token(&value);
                if index + 1 == self.value_buffer.len() {
                    self.exit_entry()?;
                } else {
                    self.state = State::Replaying(index + 1);
                }
                coerce_opt(coerce_to, value).map_err(|e| e.at(self.core.visible_path()))
            }
            State::AtEnd => {
                self.state = State::Idle;
                self.core.path = None;
                coerce_opt(coerce_to, TokenValue::EndDictionary)
            }
        }
    }

    fn has_next(&mut self) -> bool {
        match self.state {
            State::Idle => self.core.source.has_next(),
            // an open region always owes at least its closing bracket
            _ => true,
        }
    }

    fn skip_value(&mut self) -> Result<(), StreamError> {
        match self.state {
            State::Idle => self.core.source.skip_value(),
            State::BeforeName => {
                self.approach_name()?;
                self.core.source.skip_value()?;
                self.core.own_path().skip();
                self.state = self.state_after_name();
                Ok(())
            }
            State::AtName => {
                self.core.source.skip_value()?;
                self.core.own_path().skip();
                self.state = self.state_after_name();
                Ok(())
            }
            State::BeforeValue => {
                self.approach_value()?;
                self.skip_value()
            }
            State::AtValue => {
                let dictionary_level = self.core.matcher.len() + 1;
                let token = self.core.source.peek()?;
                self.core.source.skip_value()?;
                let own = self.core.own_path();
                if token.delta() < 0 {
                    own.after_token(&TokenValue::control(token));
                } else {
                    own.skip();
                }
                if own.len() == dictionary_level {
                    self.exit_entry()?;
                }
                Ok(())
            }
            State::Replaying(index) => {
                if index == 0 {
                    // the whole buffered value goes at once
                    self.core.own_path().skip();
                    self.exit_entry()
                } else {
                    skip_balanced(self)
                }
            }
            State::AtEnd => {
                self.state = State::Idle;
                self.core.path = None;
                Ok(())
            }
        }
    }
}
