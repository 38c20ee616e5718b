//! The boundary between the token protocol and a structured type system.
//!
//! A [`DataType`] describes how one domain value decodes/encodes into stream
//! primitives: which emit calls produce it and which coercions read it back.
//! Everything here is defined purely in terms of the [`Token`] /
//! [`TokenStream`] / generator-bridge contracts; nothing below knows about
//! concrete wire formats.

use crate::{
    error::StreamError,
    generate::{GeneratorStream, Scope, tokens},
    path::TokenPath,
    stream::TokenStream,
    token::Token,
    value::TokenValue,
};

/// How a domain value maps onto the token protocol.
pub trait DataType {
    /// The domain value this descriptor encodes and decodes.
    type Value;

    /// Emit `value` into `scope`.
    fn emit(&self, value: Self::Value, scope: &mut Scope);

    /// Read one value of this type from `stream`.
    ///
    /// # Errors
    ///
    /// Any [`StreamError`] from the underlying stream, including coercion
    /// failures when the stream's shape does not fit this type.
    fn read<S: TokenStream + ?Sized>(&self, stream: &mut S) -> Result<Self::Value, StreamError>;
}

macro_rules! scalar_types {
    ($($(#[$doc:meta])* $name:ident => $value:ty, $token:ident, $variant:ident, $emit:ident;)+) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $name;

            impl DataType for $name {
                type Value = $value;

                fn emit(&self, value: Self::Value, scope: &mut Scope) {
                    scope.$emit(move || value);
                }

                fn read<S: TokenStream + ?Sized>(
                    &self,
                    stream: &mut S,
                ) -> Result<Self::Value, StreamError> {
                    match stream.poll(Some(Token::$token))? {
                        TokenValue::$variant(v) => Ok(v),
                        _ => unreachable!("coercion to {:?} returned a foreign variant", Token::$token),
                    }
                }
            }
        )+
    };
}

scalar_types! {
    /// A boolean.
    BoolType => bool, Bool, Bool, emit_bool;
    /// A 32-bit integer.
    I32Type => i32, I32, I32, emit_i32;
    /// A 64-bit integer.
    I64Type => i64, I64, I64, emit_i64;
    /// A 32-bit float.
    F32Type => f32, F32, F32, emit_f32;
    /// A 64-bit float.
    F64Type => f64, F64, F64, emit_f64;
    /// A string.
    StrType => String, Str, Str, emit_str;
    /// A byte blob.
    BlobType => Vec<u8>, Blob, Blob, emit_blob;
}

/// `Option<T>`, encoded as the inner type or a `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nullable<T>(pub T);

impl<T: DataType> DataType for Nullable<T> {
    type Value = Option<T::Value>;

    fn emit(&self, value: Self::Value, scope: &mut Scope) {
        match value {
            None => scope.emit_null(),
            Some(inner) => self.0.emit(inner, scope),
        }
    }

    fn read<S: TokenStream + ?Sized>(&self, stream: &mut S) -> Result<Self::Value, StreamError> {
        if stream.peek()? == Token::Null {
            stream.poll(Some(Token::Null))?;
            Ok(None)
        } else {
            self.0.read(stream).map(Some)
        }
    }
}

/// `Vec<T>`, encoded as a sequence of the element type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collect<T>(pub T);

impl<T> DataType for Collect<T>
where
    T: DataType + Copy + 'static,
    T::Value: 'static,
{
    type Value = Vec<T::Value>;

    fn emit(&self, value: Self::Value, scope: &mut Scope) {
        let element = self.0;
        scope.emit_sequence(move |scope| {
            for item in value {
                element.emit(item, scope);
            }
        });
    }

    fn read<S: TokenStream + ?Sized>(&self, stream: &mut S) -> Result<Self::Value, StreamError> {
        read_list_of(&self.0, stream)
    }
}

/// A record with named fields, encoded as a dictionary.
///
/// The protocol needs only this from a record: enumerate its present fields
/// as name/value pairs on the way out, and accept fields by name (in any
/// order, skipping unknown names) on the way in.
pub trait Record: Sized + 'static {
    /// Partially-read state accumulated while fields arrive.
    type Builder: Default;

    /// Emit the present fields as name/value pairs.
    fn emit_fields(self, scope: &mut Scope);

    /// Read the field named `name` into `builder`. Returns `false` when the
    /// name is unknown, in which case the caller skips its value.
    ///
    /// # Errors
    ///
    /// Any [`StreamError`] from reading the field's value.
    fn read_field<S: TokenStream + ?Sized>(
        builder: &mut Self::Builder,
        name: &str,
        stream: &mut S,
    ) -> Result<bool, StreamError>;

    /// Assemble the record once the dictionary is exhausted.
    ///
    /// # Errors
    ///
    /// [`StreamError::MissingKey`] when a required field never arrived.
    fn finish(builder: Self::Builder, at: &TokenPath) -> Result<Self, StreamError>;
}

/// Descriptor adapter for a [`Record`] implementation.
#[derive(Debug)]
pub struct RecordType<T>(core::marker::PhantomData<T>);

// Manual impls: the descriptor is copyable whether or not the record is.
impl<T> Clone for RecordType<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RecordType<T> {}

impl<T> Default for RecordType<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordType<T> {
    #[must_use]
    pub fn new() -> Self {
        RecordType(core::marker::PhantomData)
    }
}

impl<T: Record> DataType for RecordType<T> {
    type Value = T;

    fn emit(&self, value: Self::Value, scope: &mut Scope) {
        scope.emit_dictionary(move |scope| value.emit_fields(scope));
    }

    fn read<S: TokenStream + ?Sized>(&self, stream: &mut S) -> Result<Self::Value, StreamError> {
        stream.poll(Some(Token::BeginDictionary))?;
        let mut builder = T::Builder::default();
        while stream.peek()? != Token::EndDictionary {
            let TokenValue::Str(name) = stream.poll(Some(Token::Str))? else {
                unreachable!("coercion to Str returned a foreign variant");
            };
            if !T::read_field(&mut builder, &name, stream)? {
                // unsupported field
                stream.skip_value()?;
            }
        }
        stream.poll(Some(Token::EndDictionary))?;
        T::finish(builder, stream.path())
    }
}

/// Build a [`TokenStream`] producing `value` as described by `ty`.
pub fn tokens_from<T>(ty: T, value: T::Value) -> GeneratorStream
where
    T: DataType + 'static,
    T::Value: 'static,
{
    tokens(move |scope| ty.emit(value, scope))
}

/// Read one `ty`-shaped value out of `stream`.
///
/// # Errors
///
/// Any [`StreamError`] from the underlying stream.
pub fn read_as<T: DataType, S: TokenStream + ?Sized>(
    ty: &T,
    stream: &mut S,
) -> Result<T::Value, StreamError> {
    ty.read(stream)
}

/// Collect a whole bracketed sequence of `ty`-shaped values into a `Vec`.
///
/// # Errors
///
/// Any [`StreamError`] from the underlying stream.
pub fn read_list_of<T: DataType, S: TokenStream + ?Sized>(
    ty: &T,
    stream: &mut S,
) -> Result<Vec<T::Value>, StreamError> {
    stream.poll(Some(Token::BeginSequence))?;
    let mut out = Vec::new();
    while stream.peek()? != Token::EndSequence {
        out.push(ty.read(stream)?);
    }
    stream.poll(Some(Token::EndSequence))?;
    Ok(out)
}

enum IterState {
    Fresh,
    Active,
    Done,
}

/// A view on a stream's next bracketed sequence as an iterator of `ty`-shaped
/// values. Created by [`values_of`].
pub struct ValuesOf<'s, T, S: TokenStream + ?Sized> {
    ty: T,
    stream: &'s mut S,
    state: IterState,
}

/// Iterate the stream's next bracketed sequence one value at a time, without
/// collecting it. The closing bracket is consumed by the last `next()` call.
pub fn values_of<T: DataType, S: TokenStream + ?Sized>(
    ty: T,
    stream: &mut S,
) -> ValuesOf<'_, T, S> {
    ValuesOf {
        ty,
        stream,
        state: IterState::Fresh,
    }
}

impl<T: DataType, S: TokenStream + ?Sized> Iterator for ValuesOf<'_, T, S> {
    type Item = Result<T::Value, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, IterState::Fresh) {
            if let Err(e) = self.stream.poll(Some(Token::BeginSequence)) {
                self.state = IterState::Done;
                return Some(Err(e));
            }
            self.state = IterState::Active;
        }
        if matches!(self.state, IterState::Done) {
            return None;
        }
        match self.stream.peek() {
            Ok(Token::EndSequence) => {
                self.state = IterState::Done;
                match self.stream.poll(None) {
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                }
            }
            Ok(_) => {
                let result = self.ty.read(self.stream);
                if result.is_err() {
                    self.state = IterState::Done;
                }
                Some(result)
            }
            Err(e) => {
                self.state = IterState::Done;
                Some(Err(e))
            }
        }
    }
}
