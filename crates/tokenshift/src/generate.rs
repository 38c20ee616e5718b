//! The push→pull generator bridge.
//!
//! A producer wants to say "next comes a string, here is its value, next
//! comes the end of this dictionary" in program order; a consumer wants to
//! pull at its own pace, possibly skipping or requesting a coercion before a
//! value is even computed. The bridge resolves this with a two-phase
//! handshake per unit: the producer *announces* a tag, and only a consumer
//! pull that actually wants the value makes the producer *supply* it.
//!
//! Here the handshake is an explicit instruction machine rather than a
//! coroutine: announcing enqueues a tagged instruction, supplying invokes its
//! boxed value closure. A skipped scalar never runs its closure, and a
//! skipped container never runs the closure that would have produced its
//! contents, which is what makes [`TokenStream::skip_value`] on unconsumed
//! substructure cheap. Container contents expand lazily, one level at a time,
//! when the consumer enters them.
//!
//! ```
//! use tokenshift::{Token, TokenValue, TokenStream, tokens};
//!
//! let mut stream = tokens(|scope| {
//!     scope.emit_sequence(|scope| {
//!         scope.emit_i32(|| 1);
//!         scope.emit_str(|| "two".to_owned());
//!     });
//! });
//! assert_eq!(stream.peek(), Ok(Token::BeginSequence));
//! assert_eq!(stream.poll(None), Ok(TokenValue::BeginSequence));
//! assert_eq!(stream.poll(Some(Token::I64)), Ok(TokenValue::I64(1)));
//! ```

use std::collections::VecDeque;

use crate::{
    error::StreamError,
    path::TokenPath,
    stream::TokenStream,
    token::{Token, coerce_opt},
    value::TokenValue,
};

type Supply = Box<dyn FnOnce() -> TokenValue>;
type Fill = Box<dyn FnOnce(&mut Scope)>;

enum Instr {
    Scalar { token: Token, supply: Supply },
    Begin { token: Token, fill: Fill },
    End { token: Token },
    Splice { inner: Box<dyn TokenStream>, mode: SpliceMode },
}

enum SpliceMode {
    /// Embed the whole stream until it runs dry.
    All,
    /// Embed exactly one (possibly nested) value.
    Value { depth: i32, started: bool },
}

/// Producer-side surface of the bridge: each `emit_*` call announces a unit.
#[derive(Default)]
pub struct Scope {
    instrs: Vec<Instr>,
}

impl Scope {
    fn scalar(&mut self, token: Token, supply: Supply) {
        self.instrs.push(Instr::Scalar { token, supply });
    }

    /// Announce a `null` value.
    pub fn emit_null(&mut self) {
        self.scalar(Token::Null, Box::new(|| TokenValue::Null));
    }

    /// Announce a boolean; `compute` runs only if the consumer wants it.
    pub fn emit_bool(&mut self, compute: impl FnOnce() -> bool + 'static) {
        self.scalar(Token::Bool, Box::new(move || TokenValue::Bool(compute())));
    }

    /// Announce a 32-bit integer; `compute` runs only if the consumer wants it.
    pub fn emit_i32(&mut self, compute: impl FnOnce() -> i32 + 'static) {
        self.scalar(Token::I32, Box::new(move || TokenValue::I32(compute())));
    }

    /// Announce a 64-bit integer; `compute` runs only if the consumer wants it.
    pub fn emit_i64(&mut self, compute: impl FnOnce() -> i64 + 'static) {
        self.scalar(Token::I64, Box::new(move || TokenValue::I64(compute())));
    }

    /// Announce a 32-bit float; `compute` runs only if the consumer wants it.
    pub fn emit_f32(&mut self, compute: impl FnOnce() -> f32 + 'static) {
        self.scalar(Token::F32, Box::new(move || TokenValue::F32(compute())));
    }

    /// Announce a 64-bit float; `compute` runs only if the consumer wants it.
    pub fn emit_f64(&mut self, compute: impl FnOnce() -> f64 + 'static) {
        self.scalar(Token::F64, Box::new(move || TokenValue::F64(compute())));
    }

    /// Announce a string; `compute` runs only if the consumer wants it.
    pub fn emit_str(&mut self, compute: impl FnOnce() -> String + 'static) {
        self.scalar(Token::Str, Box::new(move || TokenValue::Str(compute())));
    }

    /// Announce a byte blob; `compute` runs only if the consumer wants it.
    pub fn emit_blob(&mut self, compute: impl FnOnce() -> Vec<u8> + 'static) {
        self.scalar(Token::Blob, Box::new(move || TokenValue::Blob(compute())));
    }

    /// Announce a sequence. `fill` produces its contents, and runs only when
    /// the consumer actually enters the sequence; the matching close bracket
    /// is announced automatically.
    pub fn emit_sequence(&mut self, fill: impl FnOnce(&mut Scope) + 'static) {
        self.instrs.push(Instr::Begin {
            token: Token::BeginSequence,
            fill: Box::new(fill),
        });
    }

    /// Announce a dictionary, a sequence of name/value pairs. Keeping the
    /// pair count even and the names scalar is up to the producer.
    pub fn emit_dictionary(&mut self, fill: impl FnOnce(&mut Scope) + 'static) {
        self.instrs.push(Instr::Begin {
            token: Token::BeginDictionary,
            fill: Box::new(fill),
        });
    }

    /// Embed exactly one whole value from `source`, brackets included. The
    /// rest of `source` is dropped.
    pub fn splice_value(&mut self, source: impl TokenStream + 'static) {
        self.instrs.push(Instr::Splice {
            inner: Box::new(source),
            mode: SpliceMode::Value {
                depth: 0,
                started: false,
            },
        });
    }

    /// Embed the whole of `source` until it runs dry.
    pub fn splice_all(&mut self, source: impl TokenStream + 'static) {
        self.instrs.push(Instr::Splice {
            inner: Box::new(source),
            mode: SpliceMode::All,
        });
    }
}

/// Create a [`TokenStream`] from a producer written as ordered emit calls.
///
/// Producing a valid stream is up to the caller: dictionaries must announce
/// an even number of units, and non-scalar names are unsupported by the
/// transforms.
pub fn tokens(producer: impl FnOnce(&mut Scope) + 'static) -> GeneratorStream {
    GeneratorStream {
        pending_root: Some(Box::new(producer)),
        queue: VecDeque::new(),
        path: TokenPath::new(),
    }
}

/// Pull side of the generator bridge. Created by [`tokens`].
pub struct GeneratorStream {
    pending_root: Option<Fill>,
    queue: VecDeque<Instr>,
    path: TokenPath,
}

impl GeneratorStream {
    /// Run the root producer if it has not run yet and drop drained splices,
    /// so that the queue front, if any, is a consumable instruction.
    fn settle(&mut self) -> bool {
        if let Some(fill) = self.pending_root.take() {
            let mut scope = Scope::default();
            fill(&mut scope);
            self.queue.extend(scope.instrs);
        }
        loop {
            let drained = match self.queue.front_mut() {
                None => return false,
                Some(Instr::Splice { inner, mode }) => match mode {
                    SpliceMode::All => !inner.has_next(),
                    SpliceMode::Value { depth, started } => *started && *depth <= 0,
                },
                Some(_) => false,
            };
            if drained {
                self.queue.pop_front();
            } else {
                return true;
            }
        }
    }
}

fn control_value(token: Token) -> TokenValue {
    TokenValue::control(token)
}

fn matching_end(token: Token) -> Token {
    match token {
        Token::BeginSequence => Token::EndSequence,
        Token::BeginDictionary => Token::EndDictionary,
        _ => unreachable!("not an opening token: {token:?}"),
    }
}

impl TokenStream for GeneratorStream {
    fn path(&self) -> &TokenPath {
        &self.path
    }

    fn peek(&mut self) -> Result<Token, StreamError> {
        if !self.settle() {
            return Err(StreamError::Exhausted);
        }
        match self.queue.front_mut().unwrap() {
            Instr::Scalar { token, .. } | Instr::Begin { token, .. } | Instr::End { token } => {
                Ok(*token)
            }
            Instr::Splice { inner, .. } => inner.peek(),
        }
    }

    fn poll(&mut self, coerce_to: Option<Token>) -> Result<TokenValue, StreamError> {
        if !self.settle() {
            return Err(StreamError::Exhausted);
        }

        if let Some(Instr::Splice { inner, mode }) = self.queue.front_mut() {
            let value = inner.poll(coerce_to)?;
            if let SpliceMode::Value { depth, started } = mode {
                if !*started && value.token().delta() < 0 {
                    return Err(StreamError::UnexpectedNesting {
                        token: value.token(),
                        path: self.path.to_string(),
                    });
                }
                *started = true;
                *depth += value.token().delta();
            }
            self.path.after_token(&value);
            return Ok(value);
        }

        match self.queue.pop_front().unwrap() {
            Instr::Scalar { supply, .. } => {
                let value = coerce_opt(coerce_to, supply()).map_err(|e| e.at(&self.path))?;
                self.path.after_token(&value);
                Ok(value)
            }
            Instr::Begin { token, fill } => {
                let value =
                    coerce_opt(coerce_to, control_value(token)).map_err(|e| e.at(&self.path))?;
                let mut scope = Scope::default();
                fill(&mut scope);
                self.queue.push_front(Instr::End {
                    token: matching_end(token),
                });
                for instr in scope.instrs.into_iter().rev() {
                    self.queue.push_front(instr);
                }
                self.path.after_token(&value);
                Ok(value)
            }
            Instr::End { token } => {
                let value =
                    coerce_opt(coerce_to, control_value(token)).map_err(|e| e.at(&self.path))?;
                self.path.after_token(&value);
                Ok(value)
            }
            // A front-of-queue Splice is consumed by the guarded branch above.
            Instr::Splice { .. } => unreachable!("splice handled before pop"),
        }
    }

    fn has_next(&mut self) -> bool {
        self.settle()
    }

    fn skip_value(&mut self) -> Result<(), StreamError> {
        if !self.settle() {
            return Err(StreamError::Exhausted);
        }

        if let Some(Instr::Splice { inner, mode }) = self.queue.front_mut() {
            let skipped = inner.peek()?;
            inner.skip_value()?;
            if let SpliceMode::Value { depth, started } = mode {
                *started = true;
                *depth += skipped.delta().min(0);
            }
            if skipped.delta() < 0 {
                self.path.after_token(&control_value(skipped));
            } else {
                self.path.skip();
            }
            return Ok(());
        }

        match self.queue.pop_front().unwrap() {
            // The value closure is dropped unevaluated.
            Instr::Scalar { .. } => {
                self.path.skip();
                Ok(())
            }
            // The whole subtree is discarded without ever generating it.
            Instr::Begin { .. } => {
                self.path.skip();
                Ok(())
            }
            Instr::End { token } => {
                self.path.after_token(&control_value(token));
                Ok(())
            }
            // A front-of-queue Splice is consumed by the guarded branch above.
            Instr::Splice { .. } => unreachable!("splice handled before pop"),
        }
    }
}
