//! The full generator-bridge walk: announce/supply, skipping, splicing, and
//! path tracking, exercised step by step.

use crate::{Segment, StreamError, Token, TokenStream, TokenValue, path, tokens};

#[test]
fn generate() {
    let mut delegate = tokens(|scope| {
        scope.emit_sequence(|scope| {
            scope.emit_str(String::new);
            scope.emit_dictionary(|scope| {
                scope.emit_str(|| -> String { panic!("skipped name must not be computed") });
                scope.emit_blob(|| vec![1, 0, 0, 5, 0, 0]);
            });
        });
    });
    delegate.poll(Some(Token::BeginSequence)).unwrap();
    delegate.poll(Some(Token::Str)).unwrap();

    let mut stream = tokens(move |scope| {
        scope.emit_sequence(move |scope| {
            scope.emit_i32(|| 1);
            scope.emit_str(String::new);
            scope.emit_dictionary(|scope| {
                scope.emit_str(|| "a".to_owned());
                scope.emit_str(|| "cool".to_owned());
                scope.emit_str(|| "b".to_owned());
                scope.emit_sequence(|scope| {
                    scope.emit_i32(|| 1);
                });
            });
            scope.emit_dictionary(|_| panic!("skipped dictionary must not be generated"));
            scope.emit_sequence(|_| panic!("skipped sequence must not be generated"));
            scope.splice_all(tokens(|_| {}));
            scope.emit_sequence(|scope| {
                scope.emit_str(|| "goodbye".to_owned());
            });
            scope.splice_all(tokens(|_| {}));
            scope.splice_all(tokens(|_| {}));
            scope.splice_all(tokens(|_| {}));
            scope.splice_all(tokens(|scope| {
                scope.emit_str(|| "sub".to_owned());
            }));
            scope.splice_value(delegate);
        });
    });

    assert_eq!(stream.peek(), Ok(Token::BeginSequence));
    assert!(stream.path().is_empty());
    assert_eq!(stream.poll(None), Ok(TokenValue::BeginSequence));

    assert_eq!(stream.peek(), Ok(Token::I32));
    assert_eq!(*stream.path(), path![0]);
    assert_eq!(stream.poll(None), Ok(TokenValue::I32(1)));

    assert_eq!(stream.peek(), Ok(Token::Str));
    assert_eq!(*stream.path(), path![1]);
    assert_eq!(stream.poll(None), Ok(TokenValue::Str(String::new())));

    assert_eq!(stream.peek(), Ok(Token::BeginDictionary));
    assert_eq!(*stream.path(), path![2]);
    assert_eq!(stream.poll(None), Ok(TokenValue::BeginDictionary));

    assert_eq!(stream.peek(), Ok(Token::Str));
    assert_eq!(
        stream.path().segments(),
        &[Segment::Index(2), Segment::Name(None)]
    );
    assert_eq!(stream.poll(None), Ok(TokenValue::Str("a".into())));
    assert_eq!(stream.peek(), Ok(Token::Str));
    assert_eq!(*stream.path(), path![2, "a"]);
    assert_eq!(stream.poll(None), Ok(TokenValue::Str("cool".into())));

    assert_eq!(stream.peek(), Ok(Token::Str));
    assert_eq!(*stream.path(), path![2, "a"]);
    assert_eq!(stream.poll(None), Ok(TokenValue::Str("b".into())));
    assert_eq!(stream.peek(), Ok(Token::BeginSequence));
    assert_eq!(*stream.path(), path![2, "b"]);
    assert_eq!(stream.poll(None), Ok(TokenValue::BeginSequence));
    assert_eq!(stream.peek(), Ok(Token::I32));
    assert_eq!(*stream.path(), path![2, "b", 0]);
    assert_eq!(stream.poll(None), Ok(TokenValue::I32(1)));
    assert_eq!(stream.peek(), Ok(Token::EndSequence));
    assert_eq!(*stream.path(), path![2, "b", 1]);
    assert_eq!(stream.poll(None), Ok(TokenValue::EndSequence));
    assert_eq!(stream.peek(), Ok(Token::EndDictionary));
    assert_eq!(*stream.path(), path![2, "b"]);
    stream.skip_value().unwrap();

    assert_eq!(stream.peek(), Ok(Token::BeginDictionary));
    assert_eq!(*stream.path(), path![3]);
    stream.skip_value().unwrap();

    assert_eq!(stream.peek(), Ok(Token::BeginSequence));
    assert_eq!(*stream.path(), path![4]);
    stream.skip_value().unwrap();

    assert_eq!(stream.peek(), Ok(Token::BeginSequence));
    assert_eq!(*stream.path(), path![5]);
    assert_eq!(stream.poll(None), Ok(TokenValue::BeginSequence));

    assert_eq!(stream.peek(), Ok(Token::Str));
    assert_eq!(*stream.path(), path![5, 0]);
    assert_eq!(stream.poll(None), Ok(TokenValue::Str("goodbye".into())));

    assert_eq!(stream.peek(), Ok(Token::EndSequence));
    assert_eq!(*stream.path(), path![5, 1]);
    stream.skip_value().unwrap();

    assert_eq!(stream.peek(), Ok(Token::Str));
    assert_eq!(*stream.path(), path![6]);
    assert_eq!(stream.poll(None), Ok(TokenValue::Str("sub".into())));

    assert_eq!(*stream.path(), path![7]);
    stream.poll(Some(Token::BeginDictionary)).unwrap();
    stream.skip_value().unwrap();
    assert_eq!(
        stream.poll(Some(Token::Str)),
        Ok(TokenValue::Str("AQAABQAA".into()))
    );
    assert_eq!(stream.poll(None), Ok(TokenValue::EndDictionary));

    assert_eq!(stream.peek(), Ok(Token::EndSequence));
    assert_eq!(*stream.path(), path![8]);
    assert_eq!(stream.poll(None), Ok(TokenValue::EndSequence));

    assert!(!stream.has_next());
    assert_eq!(stream.peek(), Err(StreamError::Exhausted));
}

#[test]
fn coercions() {
    let mut stream = tokens(|scope| scope.emit_str(|| "9000".to_owned()));
    assert_eq!(stream.poll(Some(Token::I32)), Ok(TokenValue::I32(9000)));
}

#[test]
fn skipping_never_computes_values() {
    let mut stream = tokens(|scope| {
        scope.emit_sequence(|scope| {
            scope.emit_sequence(|scope| {
                scope.emit_dictionary(|_| panic!("must not be generated"));
                scope.emit_str(|| -> String { panic!("must not be computed") });
            });
            scope.emit_i32(|| 1);
        });
    });
    stream.poll(None).unwrap();
    // the nested sequence goes away without running any producer code
    stream.skip_value().unwrap();
    assert_eq!(stream.poll(None), Ok(TokenValue::I32(1)));
    assert_eq!(stream.poll(None), Ok(TokenValue::EndSequence));
    assert!(!stream.has_next());
}

#[test]
fn lazy_root_runs_on_first_access() {
    let mut stream = tokens(|scope| {
        scope.emit_bool(|| true);
    });
    assert!(stream.has_next());
    assert_eq!(stream.poll(Some(Token::Bool)), Ok(TokenValue::Bool(true)));
    assert!(!stream.has_next());
}

#[test]
fn splice_value_takes_exactly_one_value() {
    let mut inner = tokens(|scope| {
        scope.emit_sequence(|scope| {
            scope.emit_i32(|| 1);
            scope.emit_i32(|| 2);
        });
    });
    inner.poll(Some(Token::BeginSequence)).unwrap();
    // `inner` now stands at 1; splicing one value embeds just that scalar
    let mut stream = tokens(move |scope| {
        scope.emit_sequence(move |scope| {
            scope.splice_value(inner);
            scope.emit_i32(|| 3);
        });
    });
    assert_eq!(stream.poll(None), Ok(TokenValue::BeginSequence));
    assert_eq!(stream.poll(None), Ok(TokenValue::I32(1)));
    assert_eq!(stream.poll(None), Ok(TokenValue::I32(3)));
    assert_eq!(stream.poll(None), Ok(TokenValue::EndSequence));
    assert!(!stream.has_next());
}
