use chrono::{NaiveDate, TimeZone, Utc};
use rstest::rstest;
use uuid::Uuid;

use killrvideo_bulk::codec::{
    decode_field, decode_row, encode_header, encode_row, CsvDialect, NoHints, Row,
};
use killrvideo_bulk::data_types::{MapValue, Record, Value};
use killrvideo_bulk::schema::{ColumnType, MapValueType, SchemaRegistry, TableSchema};

fn single_column(column_type: ColumnType) -> TableSchema {
    TableSchema::try_new("t", [("value", column_type)]).unwrap()
}

/// Record -> Row -> line -> Row -> Record with the declared schema.
fn through_line(record: &Record, schema: &TableSchema) -> Record {
    let dialect = CsvDialect::dsbulk();
    let line = encode_row(record, schema).unwrap().to_line(&dialect).unwrap();
    let row = Row::from_line(&line, &dialect).unwrap();
    decode_row(&schema.column_names(), &row, schema)
}

#[rstest]
#[case(ColumnType::Uuid, Value::Uuid(Uuid::parse_str("5a1b7c1e-6f0a-4e2b-9a54-0c6fb4a0d0aa").unwrap()))]
#[case(ColumnType::TimeUuid, Value::Uuid(Uuid::parse_str("d2177dd0-eaa2-11de-a572-001b779c76e3").unwrap()))]
#[case(ColumnType::Timestamp, Value::Timestamp(Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()))]
#[case(ColumnType::Date, Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))]
#[case(ColumnType::Boolean, Value::Boolean(true))]
#[case(ColumnType::Boolean, Value::Boolean(false))]
#[case(ColumnType::Int, Value::Int(-42))]
#[case(ColumnType::Counter, Value::Counter(1_000_000))]
#[case(ColumnType::Float, Value::Float(0.1))]
#[case(ColumnType::Double, Value::Float(-12345.678))]
#[case(ColumnType::Text, Value::text(r"commas, and C:\backslashes\ kept"))]
#[case(ColumnType::Set, Value::set(["comedy", "with \"quotes\"", "back\\slash"]))]
#[case(ColumnType::Map(MapValueType::Float), Value::float_map([("cassandra", 0.8), ("rust", 1.0)]))]
fn test_round_trip_declared(#[case] column_type: ColumnType, #[case] value: Value) {
    let schema = single_column(column_type);
    let record = Record::new().with("value", value.clone());
    assert_eq!(through_line(&record, &schema).get("value"), Some(&value));
}

#[test]
fn test_round_trip_text_map() {
    let schema = single_column(ColumnType::Map(MapValueType::Text));
    let value = Value::Map(
        [("theme".to_string(), MapValue::Text("dark, \"solarized\"".to_string()))]
            .into_iter()
            .collect(),
    );
    let record = Record::new().with("value", value.clone());
    assert_eq!(through_line(&record, &schema).get("value"), Some(&value));
}

#[test]
fn test_round_trip_embedding_vector() {
    let registry = SchemaRegistry::killrvideo();
    let schema = registry.get("videos").unwrap();
    let embedding: Vec<f32> = (0..384).map(|i| (i as f32 - 192.0) / 97.0).collect();
    let record = Record::new()
        .with("name", Value::text("Intro"))
        .with("content_features", Value::Vector(embedding.clone()));

    let line = encode_row(&record, schema)
        .unwrap()
        .to_line(&CsvDialect::dsbulk())
        .unwrap();
    let vector_field = Row::from_line(&line, &CsvDialect::dsbulk())
        .unwrap()
        .get(8)
        .unwrap()
        .to_string();
    assert_eq!(vector_field.matches(", ").count(), 383);

    match through_line(&record, schema).get("content_features") {
        Some(Value::Vector(decoded)) => {
            assert_eq!(decoded.len(), 384);
            for (a, b) in decoded.iter().zip(&embedding) {
                assert!((a - b).abs() < 1e-6, "{a} != {b}");
            }
        }
        other => panic!("expected a vector, got {other:?}"),
    }
}

#[rstest]
#[case(ColumnType::Uuid)]
#[case(ColumnType::Timestamp)]
#[case(ColumnType::Date)]
#[case(ColumnType::Boolean)]
#[case(ColumnType::Int)]
#[case(ColumnType::Counter)]
#[case(ColumnType::Double)]
#[case(ColumnType::Text)]
#[case(ColumnType::Vector(3))]
fn test_null_idempotence(#[case] column_type: ColumnType) {
    let schema = single_column(column_type);
    let decoded = through_line(&Record::new().with_null("value"), &schema);
    assert!(decoded.contains("value"));
    assert_eq!(decoded.get("value"), None);
}

#[rstest]
#[case(ColumnType::Set, Value::set(Vec::<String>::new()))]
#[case(ColumnType::Map(MapValueType::Float), Value::float_map(Vec::<(String, f64)>::new()))]
fn test_null_collections_read_back_empty(#[case] column_type: ColumnType, #[case] empty: Value) {
    let schema = single_column(column_type);
    let decoded = through_line(&Record::new().with_null("value"), &schema);
    assert_eq!(decoded.get("value"), Some(&empty));
}

#[test]
fn test_header_and_rows_follow_schema_order() {
    let registry = SchemaRegistry::killrvideo();
    let schema = registry.get("comments").unwrap();
    // Deliberately built in a different order from the declaration
    let record = Record::new()
        .with("userid", Value::text("11111111-1111-4111-8111-111111111111"))
        .with("comment", Value::text("nice"))
        .with("extra", Value::Int(1));

    let header = encode_header(schema);
    assert_eq!(
        header.fields(),
        ["videoid", "commentid", "comment", "userid", "sentiment_score"]
    );

    let row = encode_row(&record, schema).unwrap();
    assert_eq!(
        row.fields(),
        ["", "", "nice", "11111111-1111-4111-8111-111111111111", ""]
    );
}

#[rstest]
#[case("videoid", "5a1b7c1e-6f0a-4e2b-9a54-0c6fb4a0d0aa", "uuid")]
#[case("name", "5a1b7c1e-6f0a-4e2b-9a54-0c6fb4a0d0aa", "uuid")]
#[case("added_date", "2024-01-02T03:04:05Z", "timestamp")]
#[case("userid", "not-a-uuid", "text")]
#[case("tags", r#"["a","b"]"#, "set")]
#[case("embedding", "[0.1, 0.2]", "vector")]
#[case("prefs", r#"{"a":0.5}"#, "map")]
#[case("prefs", "{}", "map")]
#[case("legacy_tags", r#"{"a","b"}"#, "set")]
#[case("flag", "TRUE", "boolean")]
#[case("views", "12", "int")]
#[case("score", "4.5", "float")]
#[case("title", "12 angry men", "text")]
fn test_sniffing_without_schema(#[case] column: &str, #[case] raw: &str, #[case] kind: &str) {
    let value = decode_field(column, raw, None).unwrap();
    assert_eq!(value.kind(), kind, "{column}={raw:?} decoded as {value:?}");
}

#[test]
fn test_decode_row_without_hints_is_total() {
    let columns = vec!["videoid".to_string(), "rating".to_string(), "tags".to_string()];
    let row = Row::from(vec!["NULL", "{broken", "[1, \"mixed\"]"]);
    let record = decode_row(&columns, &row, &NoHints);

    assert_eq!(record.get("videoid"), None);
    assert_eq!(record.get("rating"), Some(&Value::text("{broken")));
    assert_eq!(record.get("tags"), Some(&Value::text("[1, \"mixed\"]")));
}
