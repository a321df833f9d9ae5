// tests/output_tests.rs

use chrono::DateTime;
use dsio::entity::{Entity, GeoPoint, Key, Property, TypedValue};
use dsio::output::{
    ColumnSet, Encoder, Exporter, PropertyInfo, TypeStyle, collect_columns, exporter,
};
use dsio::reader::{self, Format};
use dsio::resolver::Resolver;
use dsio::schema::DataType;
use dsio::value::RawValue;
use pretty_assertions::assert_eq;

fn every_primitive() -> Entity {
    let author = Key::named("Author", "Huxley", None);
    Entity::new(
        Key::id("Book", 1234, Some(author.clone())),
        vec![
            Property::new("title", TypedValue::String("Brave New World".to_string())),
            Property::new("pages", TypedValue::Integer(311)),
            Property::new("rating", TypedValue::Float(4.5)),
            Property::new("read", TypedValue::Boolean(false)),
            Property::new(
                "published",
                TypedValue::Datetime(DateTime::parse_from_rfc3339("1932-01-01T00:00:00Z").unwrap()),
            ),
            Property::new("author", TypedValue::Key(author)),
            Property::new(
                "printed",
                TypedValue::Geo(GeoPoint {
                    lat: 51.5,
                    lng: -0.125,
                }),
            ),
            Property::new("cover", TypedValue::Blob(vec![0, 159, 146, 150])),
            Property::new(
                "tags",
                TypedValue::Array(vec![
                    TypedValue::String("dystopia".to_string()),
                    TypedValue::Integer(1),
                ]),
            ),
            Property::new(
                "publisher",
                TypedValue::Embedded(vec![
                    Property::new("name", TypedValue::String("Chatto & Windus".to_string())),
                    Property::new("city", TypedValue::String("London".to_string())),
                ]),
            ),
            Property::new("memo", TypedValue::String("first edition".to_string())).no_index(true),
            Property::new("isbn", TypedValue::String("2020-01-02".to_string())),
            Property::new("lost", TypedValue::Null),
        ],
    )
}

fn export(entities: &[Entity], format: Format, style: TypeStyle) -> String {
    let mut buffer = Vec::new();
    {
        let mut exporter = exporter(&mut buffer, format, style, None, Some("Book"));
        exporter.dump_scheme(entities).unwrap();
        exporter.dump_entities(entities).unwrap();
    }
    String::from_utf8(buffer).unwrap()
}

fn reimport(text: &str, format: Format) -> Vec<Entity> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.out");
    std::fs::write(&path, text).unwrap();

    let mut data = reader::read_file(&path, Some(format)).unwrap();
    data.scheme.reconcile(Some("Book"), None).unwrap();
    Resolver::new(&data.scheme)
        .unwrap()
        .resolve_all(&data)
        .unwrap()
}

/// Properties by name; tabular files order them by column.
fn by_name(mut entities: Vec<Entity>) -> Vec<Entity> {
    for entity in &mut entities {
        entity.properties.sort_by(|a, b| a.name.cmp(&b.name));
    }
    entities
}

fn info(name: &str, data_type: DataType) -> PropertyInfo {
    PropertyInfo {
        name: name.to_string(),
        data_type,
        no_index: false,
    }
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_yaml_round_trip_in_every_style() {
    let original = vec![every_primitive()];

    for style in [TypeStyle::Scheme, TypeStyle::Direct] {
        let text = export(&original, Format::Yaml, style);
        let restored = reimport(&text, Format::Yaml);
        assert_eq!(restored, original, "Failed for style: {}\n{}", style, text);
    }
}

#[test]
fn test_auto_style_keeps_values_but_drops_no_index() {
    let original = vec![every_primitive()];
    let text = export(&original, Format::Yaml, TypeStyle::Auto);
    let restored = reimport(&text, Format::Yaml);

    let memo = restored[0].property("memo").unwrap();
    assert_eq!(memo.value, TypedValue::String("first edition".to_string()));
    assert!(!memo.no_index);
    assert_eq!(restored[0].get("author"), original[0].get("author"));
    assert_eq!(restored[0].get("cover"), original[0].get("cover"));
}

#[test]
fn test_csv_round_trip() {
    let mut entity = every_primitive();
    // null cells read back as absent
    entity.properties.retain(|p| p.name != "lost");
    let original = vec![entity];

    let text = export(&original, Format::Csv, TypeStyle::Scheme);
    let restored = reimport(&text, Format::Csv);
    assert_eq!(by_name(restored), by_name(original), "{}", text);
}

fn mixed_columns() -> Vec<Entity> {
    vec![
        Entity::new(
            Key::id("Book", 1, None),
            vec![
                Property::new("m", TypedValue::Null),
                Property::new("n", TypedValue::Integer(1)),
            ],
        ),
        Entity::new(
            Key::id("Book", 2, None),
            vec![
                Property::new("m", TypedValue::Integer(5)),
                Property::new("n", TypedValue::Float(2.5)),
            ],
        ),
        Entity::new(
            Key::id("Book", 3, None),
            vec![
                Property::new("m", TypedValue::String("2020-01-02".to_string())),
                Property::new("n", TypedValue::String("3".to_string())).no_index(true),
            ],
        ),
    ]
}

#[test]
fn test_csv_round_trip_with_mixed_columns() {
    let original = mixed_columns();

    for style in [TypeStyle::Scheme, TypeStyle::Direct, TypeStyle::Auto] {
        let mut expected = original.clone();
        if style != TypeStyle::Direct {
            // bare nulls are empty cells
            for entity in &mut expected {
                entity.properties.retain(|p| p.value != TypedValue::Null);
            }
        }

        let text = export(&original, Format::Csv, style);
        let restored = reimport(&text, Format::Csv);
        assert_eq!(
            by_name(restored),
            by_name(expected),
            "Failed for style: {}\n{}",
            style,
            text
        );
    }
}

#[test]
fn test_csv_marks_values_off_their_column() {
    let entities = vec![
        Entity::new(
            Key::id("Book", 1, None),
            vec![Property::new("n", TypedValue::Null)],
        ),
        Entity::new(
            Key::id("Book", 2, None),
            vec![Property::new("n", TypedValue::Integer(5))],
        ),
    ];

    let text = export(&entities, Format::Csv, TypeStyle::Scheme);
    assert_eq!(
        text,
        "__key__,n\n\
         key,\n\
         \"[\"\"Book\"\",1]\",\n\
         \"[\"\"Book\"\",2]\",\"{\"\"__integer__\"\":5}\"\n"
    );

    let restored = reimport(&text, Format::Csv);
    assert!(restored[0].get("n").is_none());
    assert_eq!(restored[1].get("n"), Some(&TypedValue::Integer(5)));
}

#[test]
fn test_csv_direct_style_marks_every_value() {
    let entities = vec![Entity::new(
        Key::id("Book", 1, None),
        vec![Property::new("n", TypedValue::Integer(5))],
    )];

    let text = export(&entities, Format::Csv, TypeStyle::Direct);
    assert!(text.ends_with(",\"{\"\"__integer__\"\":5}\"\n"), "{}", text);
    assert_eq!(reimport(&text, Format::Csv), entities);
}

#[test]
fn test_csv_string_shaped_like_a_marker() {
    let entities = vec![Entity::new(
        Key::id("Book", 1, None),
        vec![Property::new(
            "note",
            TypedValue::String(r#"{"__integer__":5}"#.to_string()),
        )],
    )];

    let text = export(&entities, Format::Csv, TypeStyle::Scheme);
    assert_eq!(reimport(&text, Format::Csv), entities);
}

// ============================================================================
// Scheme style
// ============================================================================

#[test]
fn test_scheme_section() {
    let text = export(&[every_primitive()], Format::Yaml, TypeStyle::Scheme);
    let document: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();

    let scheme = &document["scheme"];
    assert_eq!(scheme["kind"].as_str(), Some("Book"));
    assert_eq!(scheme["properties"]["pages"].as_str(), Some("integer"));
    assert_eq!(
        scheme["properties"]["memo"],
        serde_yaml::Value::Sequence(vec!["string".into(), "noindex".into()])
    );

    let first = &document["entities"][0];
    assert_eq!(first["pages"].as_i64(), Some(311));
    // declared string column, so no marker needed
    assert_eq!(first["isbn"].as_str(), Some("2020-01-02"));
    assert_eq!(first["author"][0].as_str(), Some("Author"));
}

#[test]
fn test_scheme_style_tags_mismatched_values() {
    let entities = vec![
        Entity::new(
            Key::id("Book", 1, None),
            vec![Property::new("n", TypedValue::Integer(1))],
        ),
        Entity::new(
            Key::id("Book", 2, None),
            vec![Property::new("n", TypedValue::String("one".to_string()))],
        ),
    ];

    let mut encoder = Encoder::new(TypeStyle::Scheme);
    encoder.set_scheme(&collect_columns(&entities));

    assert_eq!(
        encoder.encode_property(&entities[0].properties[0]),
        RawValue::Integer(1)
    );
    assert_eq!(
        encoder.encode_property(&entities[1].properties[0]),
        RawValue::Mapping(vec![("__string__".to_string(), RawValue::string("one"))])
    );
}

#[test]
fn test_direct_style_record() {
    let encoder = Encoder::new(TypeStyle::Direct);
    let entity = Entity::new(
        Key::named("Book", "brave", None),
        vec![Property::new("read", TypedValue::Boolean(true))],
    );

    assert_eq!(
        encoder.encode_entity(&entity),
        RawValue::Mapping(vec![
            ("__key__".to_string(), RawValue::string("brave")),
            (
                "read".to_string(),
                RawValue::Mapping(vec![("__boolean__".to_string(), RawValue::Boolean(true))])
            ),
        ])
    );
}

#[test]
fn test_child_key_is_written_as_path() {
    let encoder = Encoder::new(TypeStyle::Auto);
    let entity = Entity::new(
        Key::id("Book", 1234, Some(Key::named("Author", "Huxley", None))),
        vec![],
    );

    assert_eq!(
        encoder.encode_entity(&entity),
        RawValue::Mapping(vec![(
            "__key__".to_string(),
            RawValue::Sequence(vec![
                RawValue::string("Author"),
                RawValue::string("Huxley"),
                RawValue::string("Book"),
                RawValue::Integer(1234),
            ])
        )])
    );
}

// ============================================================================
// Columns
// ============================================================================

#[test]
fn test_columns_grow_in_first_seen_order() {
    let mut set = ColumnSet::new();
    set.extend(vec![info("a", DataType::String), info("b", DataType::String)]);
    set.extend(vec![info("b", DataType::Integer), info("c", DataType::String)]);
    set.extend(vec![info("a", DataType::String), info("d", DataType::String)]);

    assert_eq!(set.names(), vec!["a", "b", "c", "d"]);
    assert_eq!(set.get("b").map(|c| c.data_type), Some(DataType::String));
}

#[test]
fn test_collect_columns_sorted_first_type_wins() {
    let entities = vec![
        Entity::new(
            Key::id("K", 1, None),
            vec![
                Property::new("z", TypedValue::Integer(1)),
                Property::new("a", TypedValue::Null),
            ],
        ),
        Entity::new(
            Key::id("K", 2, None),
            vec![Property::new("z", TypedValue::String("x".to_string()))],
        ),
    ];

    assert_eq!(
        collect_columns(&entities),
        vec![info("a", DataType::Null), info("z", DataType::Integer)]
    );
}

#[test]
fn test_csv_header_reemitted_when_columns_grow() {
    let page = |id: i64, name: &str| {
        vec![Entity::new(
            Key::id("K", id, None),
            vec![Property::new(name, TypedValue::Integer(id))],
        )]
    };

    let mut buffer = Vec::new();
    {
        let mut exporter = exporter(&mut buffer, Format::Csv, TypeStyle::Scheme, None, Some("K"));
        exporter.dump_scheme(&page(1, "a")).unwrap();
        exporter.dump_entities(&page(1, "a")).unwrap();
        exporter.dump_entities(&page(2, "a")).unwrap();
        exporter.dump_entities(&page(3, "b")).unwrap();
    }
    let text = String::from_utf8(buffer).unwrap();

    assert_eq!(
        text,
        "__key__,a\n\
         key,integer\n\
         \"[\"\"K\"\",1]\",1\n\
         \"[\"\"K\"\",2]\",2\n\
         __key__,a,b\n\
         key,integer,integer\n\
         \"[\"\"K\"\",3]\",,3\n"
    );

    let data = reader::csv::parse_str(&text, b',').unwrap();
    assert_eq!(data.entities.len(), 3);
}

#[test]
fn test_tsv_uses_tabs() {
    let entities = vec![Entity::new(
        Key::id("K", 1, None),
        vec![Property::new("a", TypedValue::Boolean(true))],
    )];
    let text = export(&entities, Format::Tsv, TypeStyle::Scheme);
    assert_eq!(
        text,
        "__key__\ta\nkey\tboolean\n\"[\"\"K\"\",1]\"\ttrue\n"
    );
}
