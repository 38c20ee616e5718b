//! The typed construction boundary: round trips through `tokens_from` /
//! `read_as` for scalars, options, vectors, and records.

use crate::{
    BlobType, BoolType, Collect, DataType, F64Type, I32Type, I64Type, Nullable, Record,
    RecordType, Scope, StrType, StreamError, Token, TokenPath, TokenStream, TokenValue, read_as,
    read_list_of, tokens, tokens_from, values_of,
};

fn round_trip<T>(ty: T, value: T::Value) -> T::Value
where
    T: DataType + Copy + 'static,
    T::Value: 'static,
{
    let mut stream = tokens_from(ty, value);
    let out = read_as(&ty, &mut stream).unwrap();
    assert!(!stream.has_next());
    out
}

#[test]
fn scalar_round_trips() {
    assert!(round_trip(BoolType, true));
    assert_eq!(round_trip(I32Type, -7), -7);
    assert_eq!(round_trip(I64Type, 1 << 40), 1 << 40);
    assert_eq!(round_trip(F64Type, 3.14), 3.14);
    assert_eq!(round_trip(StrType, "hi".to_owned()), "hi");
    assert_eq!(round_trip(BlobType, vec![1, 0, 5]), vec![1, 0, 5]);
}

#[test]
fn nullable_round_trips() {
    assert_eq!(round_trip(Nullable(I32Type), Some(5)), Some(5));
    assert_eq!(round_trip(Nullable(I32Type), None), None);
}

#[test]
fn collect_round_trips() {
    assert_eq!(
        round_trip(Collect(I32Type), vec![1, 2, 3]),
        vec![1, 2, 3]
    );
    assert_eq!(round_trip(Collect(I32Type), Vec::new()), Vec::<i32>::new());
    assert_eq!(
        round_trip(Collect(Nullable(StrType)), vec![Some("a".to_owned()), None]),
        vec![Some("a".to_owned()), None]
    );
}

#[test]
fn integers_widen_on_read() {
    let mut stream = tokens_from(I32Type, 5);
    assert_eq!(read_as(&I64Type, &mut stream), Ok(5i64));
}

#[derive(Debug, Clone, PartialEq)]
struct Track {
    id: i64,
    title: String,
    rating: Option<f64>,
    tags: Vec<String>,
}

#[derive(Default)]
struct TrackBuilder {
    id: Option<i64>,
    title: Option<String>,
    rating: Option<f64>,
    tags: Vec<String>,
}

impl Record for Track {
    type Builder = TrackBuilder;

    fn emit_fields(self, scope: &mut Scope) {
        let Track {
            id,
            title,
            rating,
            tags,
        } = self;
        scope.emit_str(|| "id".to_owned());
        I64Type.emit(id, scope);
        scope.emit_str(|| "title".to_owned());
        StrType.emit(title, scope);
        scope.emit_str(|| "rating".to_owned());
        Nullable(F64Type).emit(rating, scope);
        scope.emit_str(|| "tags".to_owned());
        Collect(StrType).emit(tags, scope);
    }

    fn read_field<S: TokenStream + ?Sized>(
        builder: &mut Self::Builder,
        name: &str,
        stream: &mut S,
    ) -> Result<bool, StreamError> {
        match name {
            "id" => builder.id = Some(I64Type.read(stream)?),
            "title" => builder.title = Some(StrType.read(stream)?),
            "rating" => builder.rating = Nullable(F64Type).read(stream)?,
            "tags" => builder.tags = Collect(StrType).read(stream)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn finish(builder: Self::Builder, at: &TokenPath) -> Result<Self, StreamError> {
        let missing = |key: &str| StreamError::MissingKey {
            key: format!("{key:?}"),
            path: at.to_string(),
        };
        Ok(Track {
            id: builder.id.ok_or_else(|| missing("id"))?,
            title: builder.title.ok_or_else(|| missing("title"))?,
            rating: builder.rating,
            tags: builder.tags,
        })
    }
}

fn track() -> Track {
    Track {
        id: 42,
        title: "abc".to_owned(),
        rating: Some(4.5),
        tags: vec!["x".to_owned(), "y".to_owned()],
    }
}

#[test]
fn record_round_trips() {
    let ty = RecordType::<Track>::new();
    let mut stream = tokens_from(ty, track());
    assert_eq!(read_as(&ty, &mut stream), Ok(track()));
    assert!(!stream.has_next());
}

#[test]
fn unknown_record_fields_are_skipped_unread() {
    let mut stream = tokens(|scope| {
        scope.emit_dictionary(|scope| {
            scope.emit_str(|| "junk".to_owned());
            scope.emit_sequence(|_| panic!("a skipped field must not be generated"));
            scope.emit_str(|| "id".to_owned());
            scope.emit_i64(|| 1);
            scope.emit_str(|| "title".to_owned());
            scope.emit_str(|| "t".to_owned());
        });
    });
    let got = read_as(&RecordType::<Track>::new(), &mut stream).unwrap();
    assert_eq!(
        got,
        Track {
            id: 1,
            title: "t".to_owned(),
            rating: None,
            tags: Vec::new(),
        }
    );
}

#[test]
fn missing_required_field_is_reported() {
    let mut stream = tokens(|scope| {
        scope.emit_dictionary(|scope| {
            scope.emit_str(|| "title".to_owned());
            scope.emit_str(|| "t".to_owned());
        });
    });
    match read_as(&RecordType::<Track>::new(), &mut stream) {
        Err(StreamError::MissingKey { key, .. }) => assert_eq!(key, "\"id\""),
        other => panic!("expected a missing-key error, got {other:?}"),
    }
}

#[test]
fn record_list_round_trips() {
    let ty = RecordType::<Track>::new();
    let mut stream = tokens_from(Collect(ty), vec![track(), track()]);
    assert_eq!(
        read_list_of(&ty, &mut stream),
        Ok(vec![track(), track()])
    );
}

#[test]
fn values_of_iterates_without_collecting() {
    let mut stream = tokens(|scope| {
        scope.emit_sequence(|scope| {
            scope.emit_i32(|| 1);
            scope.emit_i32(|| 2);
        });
        scope.emit_str(|| "after".to_owned());
    });
    let values: Vec<_> = values_of(I32Type, &mut stream).collect();
    assert_eq!(values, vec![Ok(1), Ok(2)]);
    // the closing bracket was consumed by the last `next()`
    assert_eq!(stream.poll(Some(Token::Str)), Ok(TokenValue::Str("after".into())));
    assert!(!stream.has_next());
}

#[test]
fn values_of_empty_sequence() {
    let mut stream = tokens(|scope| scope.emit_sequence(|_| {}));
    let values: Vec<Result<i32, _>> = values_of(I32Type, &mut stream).collect();
    assert!(values.is_empty());
    assert!(!stream.has_next());
}
