// tests/resolver_tests.rs

use chrono::{DateTime, Datelike, Timelike};
use dsio::entity::{GeoPoint, Key, KeyId, Property, TypedValue};
use dsio::reader::yaml;
use dsio::resolver::{ResolveError, Resolver};
use dsio::schema::{DataType, KindData};
use dsio::value::RawValue;
use pretty_assertions::assert_eq;

fn resolve(document: &str) -> Result<Vec<dsio::Entity>, ResolveError> {
    let data = yaml::parse_str(document).unwrap();
    Resolver::new(&data.scheme)?.resolve_all(&data)
}

fn resolve_one(document: &str) -> dsio::Entity {
    let mut entities = resolve(document).unwrap();
    assert_eq!(entities.len(), 1);
    entities.remove(0)
}

fn root_cause(err: ResolveError) -> ResolveError {
    match err {
        ResolveError::Entity { source, .. } => *source,
        other => other,
    }
}

// ============================================================================
// Keys
// ============================================================================

#[test]
fn test_key_chain() {
    let entity = resolve_one(
        "scheme:\n  kind: Book\n\
         entities:\n  - __key__: [Author, Huxley, Book, 1234]\n",
    );

    let parent = Key::named("Author", "Huxley", None);
    assert_eq!(entity.key, Key::id("Book", 1234, Some(parent)));
}

#[test]
fn test_odd_key_path_is_incomplete() {
    let entity = resolve_one(
        "scheme:\n  kind: Book\n\
         entities:\n  - __key__: [Author, Huxley, Book]\n",
    );

    assert_eq!(entity.key.kind, "Book");
    assert_eq!(entity.key.id, KeyId::Incomplete);
    assert_eq!(
        entity.key.parent().map(|p| p.id.clone()),
        Some(KeyId::Name("Huxley".to_string()))
    );
}

#[test]
fn test_scalar_keys_and_namespace() {
    let entities = resolve(
        "scheme:\n  kind: Book\n  namespace: lib\n\
         entities:\n  - __key__: 7\n  - __key__: brave\n  - title: untitled\n",
    )
    .unwrap();

    assert_eq!(entities[0].key.id, KeyId::Id(7));
    assert_eq!(entities[1].key.id, KeyId::Name("brave".to_string()));
    assert_eq!(entities[2].key.id, KeyId::Incomplete);
    assert!(
        entities
            .iter()
            .all(|e| e.key.namespace.as_deref() == Some("lib"))
    );
}

#[test]
fn test_scheme_key_property() {
    let entity = resolve_one(
        "scheme:\n  kind: Book\n  key: isbn\n\
         entities:\n  - isbn: '978-0060850524'\n    title: Brave New World\n",
    );

    assert_eq!(entity.key.id, KeyId::Name("978-0060850524".to_string()));
    assert_eq!(
        entity.get("isbn"),
        Some(&TypedValue::String("978-0060850524".to_string()))
    );
}

#[test]
fn test_invalid_key_id() {
    let err = resolve("scheme:\n  kind: Book\nentities:\n  - __key__: [Author, true]\n").unwrap_err();
    assert!(matches!(root_cause(err), ResolveError::KeyFormat(_)));
}

// ============================================================================
// Inference
// ============================================================================

#[test]
fn test_inferred_scalars() {
    let entity = resolve_one(
        "scheme:\n  kind: K\n\
         entities:\n  - n: 12\n    f: 1.5\n    b: true\n    s: hello\n    z: null\n",
    );

    assert_eq!(entity.get("n"), Some(&TypedValue::Integer(12)));
    assert_eq!(entity.get("f"), Some(&TypedValue::Float(1.5)));
    assert_eq!(entity.get("b"), Some(&TypedValue::Boolean(true)));
    assert_eq!(entity.get("s"), Some(&TypedValue::String("hello".to_string())));
    assert_eq!(entity.get("z"), Some(&TypedValue::Null));
}

#[test]
fn test_datetime_detection() {
    let entity = resolve_one(
        "scheme:\n  kind: K\n\
         entities:\n  - date: '2020-01-02'\n    stamp: '2020-01-02T03:04:05.25+09:00'\n    \
         bad: '2020-02-30'\n    near: '2020-01-02 03:04:05'\n",
    );

    match entity.get("date") {
        Some(TypedValue::Datetime(t)) => {
            assert_eq!((t.year(), t.month(), t.day(), t.hour()), (2020, 1, 2, 0));
            assert_eq!(t.offset().local_minus_utc(), 0);
        }
        other => panic!("expected datetime, got {:?}", other),
    }
    assert_eq!(
        entity.get("stamp"),
        Some(&TypedValue::Datetime(
            DateTime::parse_from_rfc3339("2020-01-02T03:04:05.25+09:00").unwrap()
        ))
    );
    assert_eq!(entity.get("bad"), Some(&TypedValue::String("2020-02-30".to_string())));
    assert_eq!(
        entity.get("near"),
        Some(&TypedValue::String("2020-01-02 03:04:05".to_string()))
    );
}

#[test]
fn test_invalid_date_with_declared_type_fails() {
    let err = resolve(
        "scheme:\n  kind: K\n  properties:\n    d: datetime\n\
         entities:\n  - d: '2020-02-30'\n",
    )
    .unwrap_err();
    assert!(matches!(
        root_cause(err),
        ResolveError::Coercion { ref property, .. } if property == "d"
    ));
}

#[test]
fn test_array_and_embedded() {
    let entity = resolve_one(
        "scheme:\n  kind: K\n\
         entities:\n  - tags: [a, 1, '2020-01-02T00:00:00Z']\n    \
         address:\n      city: Tokyo\n      zip: {__string__: 100, __noindex__: true}\n",
    );

    match entity.get("tags") {
        Some(TypedValue::Array(items)) => {
            assert_eq!(items[0], TypedValue::String("a".to_string()));
            assert_eq!(items[1], TypedValue::Integer(1));
            assert!(matches!(items[2], TypedValue::Datetime(_)));
        }
        other => panic!("expected array, got {:?}", other),
    }

    assert_eq!(
        entity.get("address"),
        Some(&TypedValue::Embedded(vec![
            Property::new("city", TypedValue::String("Tokyo".to_string())),
            Property::new("zip", TypedValue::String("100".to_string())).no_index(true),
        ]))
    );
}

// ============================================================================
// Declared types
// ============================================================================

#[test]
fn test_declared_types_coerce() {
    let entity = resolve_one(
        "scheme:\n  kind: K\n  properties:\n    \
         count: integer\n    ratio: float\n    done: bool\n    memo: [string, noindex]\n    \
         where: geo\n    data: blob\n    owner: key\n    gone: null\n\
         entities:\n  - count: '42'\n    ratio: 3\n    done: 'T'\n    memo: 12\n    \
         where: '[35.5, 139.7]'\n    data: aGVsbG8=\n    owner: [User, alice]\n    gone: anything\n",
    );

    assert_eq!(entity.get("count"), Some(&TypedValue::Integer(42)));
    assert_eq!(entity.get("ratio"), Some(&TypedValue::Float(3.0)));
    assert_eq!(entity.get("done"), Some(&TypedValue::Boolean(true)));
    assert_eq!(entity.get("memo"), Some(&TypedValue::String("12".to_string())));
    assert!(entity.property("memo").unwrap().no_index);
    assert_eq!(
        entity.get("where"),
        Some(&TypedValue::Geo(GeoPoint {
            lat: 35.5,
            lng: 139.7
        }))
    );
    assert_eq!(entity.get("data"), Some(&TypedValue::Blob(b"hello".to_vec())));
    assert_eq!(
        entity.get("owner"),
        Some(&TypedValue::Key(Key::named("User", "alice", None)))
    );
    assert_eq!(entity.get("gone"), Some(&TypedValue::Null));
}

#[test]
fn test_empty_values_for_declared_types() {
    let entity = resolve_one(
        "scheme:\n  kind: K\n  properties:\n    n: integer\n    d: datetime\n    e: embed\n\
         entities:\n  - n: ''\n    d: ''\n    e: ''\n",
    );

    assert_eq!(entity.get("n"), Some(&TypedValue::Integer(0)));
    assert_eq!(entity.get("d"), Some(&TypedValue::Null));
    assert_eq!(entity.get("e"), Some(&TypedValue::Null));
}

#[test]
fn test_time_format_and_locale() {
    let entity = resolve_one(
        "scheme:\n  kind: K\n  time-format: '%Y/%m/%d %H:%M'\n  time-locale: '+09:00'\n  \
         properties:\n    at: datetime\n\
         entities:\n  - at: 2021/04/05 06:07\n",
    );

    assert_eq!(
        entity.get("at"),
        Some(&TypedValue::Datetime(
            DateTime::parse_from_rfc3339("2021-04-05T06:07:00+09:00").unwrap()
        ))
    );
}

#[test]
fn test_named_time_zone() {
    let entities = resolve(
        "scheme:\n  kind: K\n  time-format: '%Y/%m/%d %H:%M'\n  time-locale: America/New_York\n  \
         properties:\n    at: datetime\n\
         entities:\n  - at: 2021/01/15 12:00\n  - at: 2021/07/15 12:00\n",
    )
    .unwrap();

    // standard time in winter, daylight saving time in summer
    assert_eq!(
        entities[0].get("at"),
        Some(&TypedValue::Datetime(
            DateTime::parse_from_rfc3339("2021-01-15T12:00:00-05:00").unwrap()
        ))
    );
    assert_eq!(
        entities[1].get("at"),
        Some(&TypedValue::Datetime(
            DateTime::parse_from_rfc3339("2021-07-15T12:00:00-04:00").unwrap()
        ))
    );
}

#[test]
fn test_unknown_time_zone() {
    let err = resolve("scheme:\n  kind: K\n  time-locale: Mars/Olympus\nentities:\n  - a: 1\n")
        .unwrap_err();
    assert!(matches!(err, ResolveError::Schema(_)));
}

#[test]
fn test_current_datetime() {
    let entity = resolve_one(
        "scheme:\n  kind: K\n  properties:\n    at: datetime\n\
         entities:\n  - at: __current__\n",
    );
    assert!(matches!(entity.get("at"), Some(TypedValue::Datetime(_))));
}

#[test]
fn test_current_default_is_evaluated_per_record() {
    let entities = resolve(
        "scheme:\n  kind: K\n  properties:\n    at: datetime\n\
         default:\n  at: __current__\n  seen: {__datetime__: __current__}\n\
         entities:\n  - a: 1\n  - a: 2\n  - a: 3\n",
    )
    .unwrap();

    let stamps = |name: &str| {
        entities
            .iter()
            .map(|e| match e.get(name) {
                Some(TypedValue::Datetime(t)) => *t,
                other => panic!("expected datetime for {}, got {:?}", name, other),
            })
            .collect::<Vec<_>>()
    };

    for name in ["at", "seen"] {
        let stamps = stamps(name);
        assert_eq!(stamps.len(), 3);
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]), "{:?}", stamps);
    }
}

#[test]
fn test_whole_float_as_integer() {
    let entity = resolve_one(
        "scheme:\n  kind: K\n  properties:\n    n: integer\n\
         entities:\n  - n: 3.0\n",
    );
    assert_eq!(entity.get("n"), Some(&TypedValue::Integer(3)));

    let err = resolve(
        "scheme:\n  kind: K\n  properties:\n    n: integer\n\
         entities:\n  - n: 2.5\n",
    )
    .unwrap_err();
    assert!(matches!(
        root_cause(err),
        ResolveError::Coercion { data_type: DataType::Integer, .. }
    ));
}

#[test]
fn test_key_coercion_error_names_property() {
    for document in [
        "scheme:\n  kind: K\n  properties:\n    owner: key\n\
         entities:\n  - owner: [User, true]\n",
        "scheme:\n  kind: K\n\
         entities:\n  - owner: {__key__: [User, true]}\n",
    ] {
        let err = root_cause(resolve(document).unwrap_err());
        match err {
            ResolveError::Coercion {
                ref property,
                data_type,
                ..
            } => {
                assert_eq!(property, "owner");
                assert_eq!(data_type, DataType::Key);
            }
            other => panic!("expected coercion error, got {:?}", other),
        }
    }
}

#[test]
fn test_coercion_error_names_property() {
    let err = resolve(
        "scheme:\n  kind: K\n  properties:\n    count: integer\n\
         entities:\n  - count: 1\n  - count: many\n",
    )
    .unwrap_err();

    let ResolveError::Entity { index, source } = err else {
        panic!("expected entity error");
    };
    assert_eq!(index, 1);
    let message = source.to_string();
    assert!(message.contains("'many'"), "{}", message);
    assert!(message.contains("'count'"), "{}", message);
}

// ============================================================================
// Direct markers
// ============================================================================

#[test]
fn test_direct_markers() {
    let entity = resolve_one(
        "scheme:\n  kind: K\n\
         entities:\n  - a: {__int__: '12'}\n    b: {__datetime__: '2020-01-02T03:04:05Z', __noindex__: true}\n    \
         c: {__key__: [Author, 1]}\n",
    );

    assert_eq!(entity.get("a"), Some(&TypedValue::Integer(12)));
    assert!(matches!(entity.get("b"), Some(TypedValue::Datetime(_))));
    assert!(entity.property("b").unwrap().no_index);
    assert_eq!(
        entity.get("c"),
        Some(&TypedValue::Key(Key::id("Author", 1, None)))
    );
}

#[test]
fn test_marker_wins_over_declared_type() {
    let entity = resolve_one(
        "scheme:\n  kind: K\n  properties:\n    a: string\n\
         entities:\n  - a: {__integer__: 5}\n",
    );
    assert_eq!(entity.get("a"), Some(&TypedValue::Integer(5)));
}

#[test]
fn test_bad_markers() {
    let cases = [
        "{__integer__: 1, __string__: a}",
        "{__integer__: 1, other: 2}",
        "{__integer__: 1, __noindex__: 'yes'}",
        "{x: 1, __noindex__: true}",
    ];

    for case in cases {
        let document = format!("scheme:\n  kind: K\nentities:\n  - a: {}\n", case);
        let err = resolve(&document).unwrap_err();
        assert!(
            matches!(root_cause(err), ResolveError::Schema(_)),
            "Expected schema error for: {}",
            case
        );
    }
}

// ============================================================================
// Records
// ============================================================================

#[test]
fn test_defaults_fill_missing_properties() {
    let entities = resolve(
        "scheme:\n  kind: K\n\
         default:\n  read: false\n  shelf: A\n\
         entities:\n  - read: true\n  - {}\n",
    )
    .unwrap();

    assert_eq!(entities[0].get("read"), Some(&TypedValue::Boolean(true)));
    assert_eq!(entities[0].get("shelf"), Some(&TypedValue::String("A".to_string())));
    assert_eq!(entities[1].get("read"), Some(&TypedValue::Boolean(false)));
}

#[test]
fn test_key_default_is_rejected() {
    let err = resolve("scheme:\n  kind: K\ndefault:\n  __key__: 1\nentities:\n  - a: 1\n").unwrap_err();
    assert!(matches!(root_cause(err), ResolveError::Schema(_)));
}

#[test]
fn test_duplicate_property_is_rejected() {
    let data = KindData {
        scheme: dsio::Scheme {
            kind: Some("K".to_string()),
            ..Default::default()
        },
        defaults: vec![],
        entities: vec![vec![
            ("a".to_string(), RawValue::Integer(1)),
            ("a".to_string(), RawValue::Integer(2)),
        ]],
    };
    let err = Resolver::new(&data.scheme)
        .unwrap()
        .resolve_all(&data)
        .unwrap_err();
    assert!(matches!(root_cause(err), ResolveError::Schema(_)));
}

#[test]
fn test_missing_kind() {
    let data = yaml::parse_str("entities:\n  - a: 1\n").unwrap();
    assert!(Resolver::new(&data.scheme).is_err());
}

#[test]
fn test_resolution_is_deterministic() {
    let document = "scheme:\n  kind: K\n\
                    entities:\n  - __key__: [P, 1, K, x]\n    a: '2020-01-02'\n    b: [1, {c: 2}]\n";
    assert_eq!(resolve(document).unwrap(), resolve(document).unwrap());
}
