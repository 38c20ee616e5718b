//! Token tags of the abstract serialization protocol.
//!
//! A [`Token`] names the shape of the next stream unit: a scalar kind, or a
//! structural open/close bracket. Tags also own the coercion table used by
//! [`TokenStream::poll`](crate::TokenStream::poll) to convert a value to a
//! requested representation at consumption time.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::{error::StreamError, value::TokenValue};

/// Token type in the abstract serialization protocol.
///
/// `Begin*`/`End*` tags always occur in matched, non-interleaved pairs per
/// nesting level; every other tag carries exactly one value on `poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Null,
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Str,
    Blob,
    BeginSequence,
    EndSequence,
    BeginDictionary,
    EndDictionary,
}

impl Token {
    /// Nesting depth change caused by consuming a unit with this tag.
    #[must_use]
    pub fn delta(self) -> i32 {
        match self {
            Token::BeginSequence | Token::BeginDictionary => 1,
            Token::EndSequence | Token::EndDictionary => -1,
            _ => 0,
        }
    }

    /// Whether this tag is a structural open/close bracket.
    #[must_use]
    pub fn is_control(self) -> bool {
        self.delta() != 0
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, Token::I8 | Token::I16 | Token::I32 | Token::I64)
    }

    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Token::F32 | Token::F64)
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Convert `value` to this tag's representation.
    ///
    /// Integer tags widen/narrow with a range check and never wrap; floats
    /// never silently truncate to integers, and neither do fractional
    /// strings. `Str` accepts booleans and numbers via their canonical
    /// rendering and blobs as base64; `Blob` accepts base64 strings.
    /// Structural tags accept only themselves.
    ///
    /// # Errors
    ///
    /// [`StreamError::Coercion`] when `value` cannot represent this tag.
    pub fn coerce(self, value: TokenValue) -> Result<TokenValue, StreamError> {
        use TokenValue as V;
        match self {
            Token::Null => match value {
                V::Null => Ok(V::Null),
                v => Err(cannot(self, &v)),
            },
            Token::Bool => match value {
                V::Bool(b) => Ok(V::Bool(b)),
                v => Err(cannot(self, &v)),
            },
            Token::Str => match value {
                V::Bool(b) => Ok(V::Str(b.to_string())),
                V::I8(n) => Ok(V::Str(n.to_string())),
                V::I16(n) => Ok(V::Str(n.to_string())),
                V::I32(n) => Ok(V::Str(n.to_string())),
                V::I64(n) => Ok(V::Str(n.to_string())),
                V::F32(n) => Ok(V::Str(n.to_string())),
                V::F64(n) => Ok(V::Str(n.to_string())),
                V::Str(s) => Ok(V::Str(s)),
                V::Blob(b) => Ok(V::Str(BASE64.encode(&b))),
                v => Err(cannot(self, &v)),
            },
            Token::Blob => match value {
                V::Str(s) => match BASE64.decode(s.as_bytes()) {
                    Ok(b) => Ok(V::Blob(b)),
                    Err(_) => Err(cannot(self, &V::Str(s))),
                },
                V::Blob(b) => Ok(V::Blob(b)),
                v => Err(cannot(self, &v)),
            },
            t if t.is_numeric() => coerce_numeric(t, value),
            t => {
                // Structural targets: the value must be exactly that bracket.
                if value.token() == t {
                    Ok(value)
                } else {
                    Err(cannot(self, &value))
                }
            }
        }
    }
}

/// Apply an optional coercion; `None` passes the value through untouched.
pub(crate) fn coerce_opt(
    coerce_to: Option<Token>,
    value: TokenValue,
) -> Result<TokenValue, StreamError> {
    match coerce_to {
        None => Ok(value),
        Some(t) => t.coerce(value),
    }
}

fn coerce_numeric(target: Token, value: TokenValue) -> Result<TokenValue, StreamError> {
    use TokenValue as V;
    match value {
        V::I8(n) => int_to(target, i64::from(n)),
        V::I16(n) => int_to(target, i64::from(n)),
        V::I32(n) => int_to(target, i64::from(n)),
        V::I64(n) => int_to(target, n),
        V::F32(f) => match target {
            Token::F32 => Ok(V::F32(f)),
            Token::F64 => Ok(V::F64(f64::from(f))),
            _ => Err(cannot(target, &V::F32(f))),
        },
        V::F64(f) => match target {
            #[allow(clippy::cast_possible_truncation)]
            Token::F32 => Ok(V::F32(f as f32)),
            Token::F64 => Ok(V::F64(f)),
            _ => Err(cannot(target, &V::F64(f))),
        },
        V::Str(s) => match has_fraction(&s) {
            // never coerce fractionals to ints
            Some(true) => match target {
                Token::F32 => s
                    .parse::<f32>()
                    .map(V::F32)
                    .map_err(|_| cannot(target, &V::Str(s.clone()))),
                Token::F64 => s
                    .parse::<f64>()
                    .map(V::F64)
                    .map_err(|_| cannot(target, &V::Str(s.clone()))),
                _ => Err(cannot(target, &V::Str(s))),
            },
            Some(false) => match s.parse::<i64>() {
                Ok(n) => int_to(target, n),
                Err(_) => Err(cannot(target, &V::Str(s))),
            },
            None => Err(cannot(target, &V::Str(s))),
        },
        v => Err(cannot(target, &v)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn int_to(target: Token, n: i64) -> Result<TokenValue, StreamError> {
    use TokenValue as V;
    match target {
        Token::I8 => i8::try_from(n)
            .map(V::I8)
            .map_err(|_| cannot(target, &V::I64(n))),
        Token::I16 => i16::try_from(n)
            .map(V::I16)
            .map_err(|_| cannot(target, &V::I64(n))),
        Token::I32 => i32::try_from(n)
            .map(V::I32)
            .map_err(|_| cannot(target, &V::I64(n))),
        Token::I64 => Ok(V::I64(n)),
        Token::F32 => Ok(V::F32(n as f32)),
        Token::F64 => Ok(V::F64(n as f64)),
        _ => Err(cannot(target, &V::I64(n))),
    }
}

fn cannot(target: Token, value: &TokenValue) -> StreamError {
    StreamError::Coercion {
        value: value.to_string(),
        target,
        path: String::new(),
    }
}

/// Whether a numeric literal has a meaningful fractional part.
///
/// Trailing fraction zeros do not count (`"1.00"` is integral) and a positive
/// exponent shifts digits out of the fraction (`"1.34e+3"` is `1340`).
/// Returns `None` for a malformed literal.
fn has_fraction(literal: &str) -> Option<bool> {
    let Some(dot) = literal.find('.') else {
        return Some(false);
    };
    let frac = &literal[dot + 1..];
    let mut meaningful: i32 = 0;
    let mut count: i32 = 0;
    let mut exponent: i32 = 0;
    for (off, c) in frac.char_indices() {
        match c {
            '0' => count += 1,
            '1'..='9' => {
                count += 1;
                meaningful = count;
            }
            'e' | 'E' => {
                exponent = frac[off + 1..].parse().ok()?;
                break;
            }
            _ => return None,
        }
    }
    Some(meaningful - exponent > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_detection() {
        assert_eq!(has_fraction("9000"), Some(false));
        assert_eq!(has_fraction("3.14"), Some(true));
        assert_eq!(has_fraction("1.00"), Some(false));
        assert_eq!(has_fraction("1.00001000"), Some(true));
        assert_eq!(has_fraction("1.34e+3"), Some(false));
        assert_eq!(has_fraction("1.5e-2"), Some(true));
        assert_eq!(has_fraction("1.x"), None);
    }

    #[test]
    fn integer_widening() {
        assert_eq!(
            Token::I64.coerce(TokenValue::I32(5)),
            Ok(TokenValue::I64(5))
        );
        assert_eq!(
            Token::F64.coerce(TokenValue::I32(5)),
            Ok(TokenValue::F64(5.0))
        );
        assert!(Token::I8.coerce(TokenValue::I32(300)).is_err());
    }

    #[test]
    fn float_never_truncates() {
        assert!(Token::I32.coerce(TokenValue::F64(3.0)).is_err());
        assert_eq!(
            Token::F32.coerce(TokenValue::F64(0.5)),
            Ok(TokenValue::F32(0.5))
        );
    }

    #[test]
    fn string_to_number() {
        assert_eq!(
            Token::I32.coerce(TokenValue::Str("9000".into())),
            Ok(TokenValue::I32(9000))
        );
        assert!(Token::I32.coerce(TokenValue::Str("3.14".into())).is_err());
        assert_eq!(
            Token::F64.coerce(TokenValue::Str("3.14".into())),
            Ok(TokenValue::F64(3.14))
        );
    }

    #[test]
    fn stringification() {
        assert_eq!(
            Token::Str.coerce(TokenValue::F64(3.14)),
            Ok(TokenValue::Str("3.14".into()))
        );
        assert_eq!(
            Token::Str.coerce(TokenValue::Bool(true)),
            Ok(TokenValue::Str("true".into()))
        );
    }

    #[test]
    fn blob_roundtrips_through_base64() {
        let blob = TokenValue::Blob(vec![1, 0, 0, 5, 0, 0]);
        let s = Token::Str.coerce(blob.clone()).unwrap();
        assert_eq!(s, TokenValue::Str("AQAABQAA".into()));
        assert_eq!(Token::Blob.coerce(s), Ok(blob));
    }

    #[test]
    fn control_tokens_only_coerce_to_themselves() {
        assert_eq!(
            Token::BeginSequence.coerce(TokenValue::BeginSequence),
            Ok(TokenValue::BeginSequence)
        );
        assert!(
            Token::BeginDictionary
                .coerce(TokenValue::BeginSequence)
                .is_err()
        );
        assert!(Token::EndSequence.coerce(TokenValue::I32(1)).is_err());
    }
}
