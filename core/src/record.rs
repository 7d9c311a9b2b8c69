//! Mapping raw JSON payloads into typed records.
//!
//! # Design
//! Each record type declares its wire fields in `Record::SCHEMA` and
//! provides a validating constructor `from_payload` that reads them through
//! a [`PayloadReader`]. The reader looks every key up in the schema, so a
//! read whose kind or optionality disagrees with the declaration is
//! rejected. A record value only exists once every coercion has succeeded:
//! timestamps are already `DateTime<Utc>`, never strings.
//!
//! A missing key and an explicit `null` are treated alike. Both are fine for
//! optional fields and a parsing error for required ones. Keys not in the
//! schema are ignored.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serializer;
use serde_json::{Map, Value};
use tracing::error;

use crate::error::{OdkError, Result};

/// Untyped JSON object as received from the server.
pub type RawPayload = Map<String, Value>;

/// Format of every timestamp the server emits, e.g. `2021-01-01T00:00:00.000Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

const TIMESTAMP_WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text,
    Boolean,
    Timestamp,
}

/// One declared field of a record: wire key, semantic type, optionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub optional: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, optional: false }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, optional: true }
    }
}

/// A typed view of one server resource.
pub trait Record: Sized {
    /// Human-readable record name used in error messages.
    const NAME: &'static str;

    /// Wire fields in declaration order.
    const SCHEMA: &'static [FieldSpec];

    /// Build a fully coerced record or fail without a partial value.
    fn from_payload(raw: &RawPayload) -> Result<Self>;
}

/// Map a single JSON object into `T`.
pub fn map_one<T: Record>(value: &Value) -> Result<T> {
    let result = match value.as_object() {
        Some(raw) => T::from_payload(raw),
        None => Err(OdkError::Parsing(format!(
            "{}: expected a JSON object, got {}",
            T::NAME,
            kind_of(value)
        ))),
    };
    result.inspect_err(|err| error!(error = %err, record = T::NAME, "record mapping failed"))
}

/// Map a JSON array into `Vec<T>`, preserving server order.
///
/// The first malformed element fails the whole batch; the error names its index.
pub fn map_all<T: Record>(value: &Value) -> Result<Vec<T>> {
    let result = match value.as_array() {
        Some(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item.as_object() {
                Some(raw) => T::from_payload(raw).map_err(|e| match e {
                    OdkError::Parsing(msg) => OdkError::Parsing(format!("element {index}: {msg}")),
                    other => other,
                }),
                None => Err(OdkError::Parsing(format!(
                    "element {index}: {}: expected a JSON object, got {}",
                    T::NAME,
                    kind_of(item)
                ))),
            })
            .collect(),
        None => Err(OdkError::Parsing(format!(
            "{} listing: expected a JSON array, got {}",
            T::NAME,
            kind_of(value)
        ))),
    };
    result.inspect_err(|err| error!(error = %err, record = T::NAME, "record mapping failed"))
}

/// Field-by-field coercion over a raw payload, checked against a record's schema.
pub struct PayloadReader<'a> {
    record: &'static str,
    schema: &'static [FieldSpec],
    raw: &'a RawPayload,
}

impl<'a> PayloadReader<'a> {
    pub fn of<T: Record>(raw: &'a RawPayload) -> Self {
        Self {
            record: T::NAME,
            schema: T::SCHEMA,
            raw,
        }
    }

    /// Look `key` up in the schema and check it is declared as read.
    fn declared(&self, key: &str, kind: FieldKind, optional: bool) -> Result<()> {
        match self.schema.iter().find(|f| f.name == key) {
            Some(f) if f.kind == kind && f.optional == optional => Ok(()),
            Some(f) => Err(OdkError::Parsing(format!(
                "{}.{key}: declared as {:?} (optional: {}), read as {kind:?} (optional: {optional})",
                self.record, f.kind, f.optional
            ))),
            None => Err(OdkError::Parsing(format!("{}.{key}: field is not declared", self.record))),
        }
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.raw.get(key).filter(|v| !v.is_null())
    }

    fn missing(&self, key: &str) -> OdkError {
        OdkError::Parsing(format!("{}.{key}: required field is missing or null", self.record))
    }

    fn mismatch(&self, key: &str, expected: &str, got: &Value) -> OdkError {
        OdkError::Parsing(format!("{}.{key}: expected {expected}, got {got}", self.record))
    }

    pub fn integer(&self, key: &str) -> Result<u64> {
        self.declared(key, FieldKind::Integer, false)?;
        self.integer_value(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn opt_integer(&self, key: &str) -> Result<Option<u64>> {
        self.declared(key, FieldKind::Integer, true)?;
        self.integer_value(key)
    }

    pub fn text(&self, key: &str) -> Result<String> {
        self.declared(key, FieldKind::Text, false)?;
        self.text_value(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn opt_text(&self, key: &str) -> Result<Option<String>> {
        self.declared(key, FieldKind::Text, true)?;
        self.text_value(key)
    }

    pub fn boolean(&self, key: &str) -> Result<bool> {
        self.declared(key, FieldKind::Boolean, false)?;
        self.present(key)
            .map(|v| v.as_bool().ok_or_else(|| self.mismatch(key, "a boolean", v)))
            .transpose()?
            .ok_or_else(|| self.missing(key))
    }

    pub fn timestamp(&self, key: &str) -> Result<DateTime<Utc>> {
        self.declared(key, FieldKind::Timestamp, false)?;
        self.timestamp_value(key)?.ok_or_else(|| self.missing(key))
    }

    pub fn opt_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        self.declared(key, FieldKind::Timestamp, true)?;
        self.timestamp_value(key)
    }

    fn integer_value(&self, key: &str) -> Result<Option<u64>> {
        self.present(key)
            .map(|v| v.as_u64().ok_or_else(|| self.mismatch(key, "a non-negative integer", v)))
            .transpose()
    }

    fn text_value(&self, key: &str) -> Result<Option<String>> {
        self.present(key)
            .map(|v| v.as_str().map(str::to_string).ok_or_else(|| self.mismatch(key, "a string", v)))
            .transpose()
    }

    fn timestamp_value(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        self.present(key)
            .map(|v| {
                let s = v.as_str().ok_or_else(|| self.mismatch(key, "a timestamp string", v))?;
                parse_timestamp(s).map_err(|e| {
                    OdkError::Parsing(format!("{}.{key}: invalid timestamp {s:?}: {e}", self.record))
                })
            })
            .transpose()
    }
}

pub fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_WRITE_FORMAT).to_string()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `serialize_with` helpers writing timestamps back in wire format.
pub(crate) mod wire_time {
    use super::*;

    pub fn required<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn optional<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_str(&format_timestamp(ts)),
            None => serializer.serialize_none(),
        }
    }
}

/// Checks that `T::from_payload` follows `T::SCHEMA` key by key, starting
/// from a payload where every declared field holds a valid value.
#[cfg(test)]
pub(crate) fn assert_schema_enforced<T: Record + std::fmt::Debug>(full: &Value) {
    let full = full.as_object().expect("full payload must be an object");
    T::from_payload(full).expect("full payload must map");
    for field in T::SCHEMA {
        assert!(full.contains_key(field.name), "{}.{} missing from full payload", T::NAME, field.name);

        let mut without = full.clone();
        without.remove(field.name);
        let outcome = T::from_payload(&without);
        if field.optional {
            assert!(outcome.is_ok(), "{}.{} is optional: {outcome:?}", T::NAME, field.name);
        } else {
            let expected = format!("{}.{}", T::NAME, field.name);
            assert!(
                matches!(outcome, Err(OdkError::Parsing(ref msg)) if msg.contains(&expected)),
                "{expected} is required: {outcome:?}"
            );
        }

        let wrong = match field.kind {
            FieldKind::Integer => Value::from("x"),
            FieldKind::Text => Value::from(5),
            FieldKind::Boolean => Value::from("x"),
            FieldKind::Timestamp => Value::from("not a time"),
        };
        let mut mistyped = full.clone();
        mistyped.insert(field.name.to_string(), wrong);
        let outcome = T::from_payload(&mistyped);
        assert!(
            matches!(outcome, Err(OdkError::Parsing(_))),
            "{}.{} should reject a mistyped value: {outcome:?}",
            T::NAME,
            field.name
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sample {
        id: u64,
        label: Option<String>,
        at: DateTime<Utc>,
    }

    impl Record for Sample {
        const NAME: &'static str = "Sample";
        const SCHEMA: &'static [FieldSpec] = &[
            FieldSpec::required("id", FieldKind::Integer),
            FieldSpec::optional("label", FieldKind::Text),
            FieldSpec::required("at", FieldKind::Timestamp),
        ];

        fn from_payload(raw: &RawPayload) -> Result<Self> {
            let r = PayloadReader::of::<Self>(raw);
            Ok(Self {
                id: r.integer("id")?,
                label: r.opt_text("label")?,
                at: r.timestamp("at")?,
            })
        }
    }

    #[test]
    fn timestamp_parses_with_and_without_fraction() {
        let expected = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2021-01-01T00:00:00.000Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2021-01-01T00:00:00Z").unwrap(), expected);
        let micros = parse_timestamp("2021-01-01T00:00:00.123456Z").unwrap();
        assert_eq!(micros.timestamp_subsec_micros(), 123456);
    }

    #[test]
    fn timestamp_without_zulu_suffix_is_rejected() {
        assert!(parse_timestamp("2021-01-01T00:00:00.000+01:00").is_err());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn format_writes_milliseconds() {
        let ts = Utc.with_ymd_and_hms(2022, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(&ts), "2022-05-06T07:08:09.000Z");
    }

    #[test]
    fn unknown_keys_are_ignored_and_missing_optionals_are_none() {
        let sample: Sample = map_one(&json!({"id": 3, "at": "2021-01-01T00:00:00.000Z", "extra": [1]})).unwrap();
        assert_eq!(sample.id, 3);
        assert_eq!(sample.label, None);
    }

    #[test]
    fn explicit_null_optional_is_none() {
        let sample: Sample = map_one(&json!({"id": 3, "label": null, "at": "2021-01-01T00:00:00Z"})).unwrap();
        assert_eq!(sample.label, None);
    }

    #[test]
    fn missing_required_field_is_a_parsing_error() {
        let err = map_one::<Sample>(&json!({"id": 3})).unwrap_err();
        assert!(matches!(err, OdkError::Parsing(ref msg) if msg.contains("Sample.at")));
    }

    #[test]
    fn wrong_shape_is_a_parsing_error() {
        let err = map_one::<Sample>(&json!({"id": "three", "at": "2021-01-01T00:00:00Z"})).unwrap_err();
        assert!(matches!(err, OdkError::Parsing(ref msg) if msg.contains("Sample.id")));
        let err = map_one::<Sample>(&json!({"id": 1, "at": "not a date"})).unwrap_err();
        assert!(matches!(err, OdkError::Parsing(ref msg) if msg.contains("invalid timestamp")));
    }

    #[test]
    fn map_all_preserves_order() {
        let samples: Vec<Sample> = map_all(&json!([
            {"id": 9, "at": "2021-01-01T00:00:00Z"},
            {"id": 2, "at": "2021-01-02T00:00:00Z"},
            {"id": 5, "at": "2021-01-03T00:00:00Z"},
        ]))
        .unwrap();
        let ids: Vec<u64> = samples.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![9, 2, 5]);
    }

    #[test]
    fn one_bad_element_fails_the_batch_and_names_its_index() {
        let err = map_all::<Sample>(&json!([
            {"id": 1, "at": "2021-01-01T00:00:00Z"},
            {"id": 2, "at": "garbage"},
        ]))
        .unwrap_err();
        assert!(matches!(err, OdkError::Parsing(ref msg) if msg.starts_with("element 1:")));
    }

    #[test]
    fn map_all_rejects_non_array() {
        let err = map_all::<Sample>(&json!({"id": 1})).unwrap_err();
        assert!(matches!(err, OdkError::Parsing(_)));
    }

    #[test]
    fn map_one_rejects_non_object() {
        let err = map_one::<Sample>(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, OdkError::Parsing(ref msg) if msg.contains("an array")));
    }

    struct Drifted;

    impl Record for Drifted {
        const NAME: &'static str = "Drifted";
        const SCHEMA: &'static [FieldSpec] = &[FieldSpec::optional("id", FieldKind::Integer)];

        fn from_payload(raw: &RawPayload) -> Result<Self> {
            let r = PayloadReader::of::<Self>(raw);
            r.integer("id")?;
            r.opt_text("label")?;
            Ok(Self)
        }
    }

    #[test]
    fn read_disagreeing_with_schema_is_rejected() {
        let err = map_one::<Drifted>(&json!({"id": 1})).err().unwrap();
        assert!(matches!(err, OdkError::Parsing(ref msg) if msg.contains("Drifted.id: declared as Integer (optional: true)")));
    }

    #[test]
    fn read_of_undeclared_key_is_rejected() {
        let raw = json!({"label": "x"});
        let r = PayloadReader::of::<Drifted>(raw.as_object().unwrap());
        let err = r.opt_text("label").unwrap_err();
        assert!(matches!(err, OdkError::Parsing(ref msg) if msg.contains("Drifted.label: field is not declared")));
    }

    #[test]
    fn sample_follows_its_schema() {
        assert_schema_enforced::<Sample>(&json!({"id": 1, "label": "l", "at": "2021-01-01T00:00:00Z"}));
    }
}
