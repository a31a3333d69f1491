//! ドキュメントのフィールド値と Firestore REST 表現の相互変換

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value as Json};

use super::StoreError;

/// ドキュメントのフィールド集合
pub type Fields = BTreeMap<String, Value>;

/// ドキュメントのフィールド値
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
    Map(Fields),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// 整数として解釈（数値文字列も許容）
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Double(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// API レスポンス用の素の JSON
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => json!(b),
            Value::Integer(n) => json!(n),
            Value::Double(f) => json!(f),
            Value::String(s) => json!(s),
            Value::Timestamp(ts) => json!(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(fields) => fields_to_json(fields),
        }
    }

    /// Firestore REST の Value 表現にエンコード
    pub fn encode(&self) -> Json {
        match self {
            Value::Null => json!({ "nullValue": null }),
            Value::Bool(b) => json!({ "booleanValue": b }),
            Value::Integer(n) => json!({ "integerValue": n.to_string() }),
            Value::Double(f) => json!({ "doubleValue": f }),
            Value::String(s) => json!({ "stringValue": s }),
            Value::Timestamp(ts) => {
                json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
            }
            Value::Array(items) => {
                json!({ "arrayValue": { "values": items.iter().map(Value::encode).collect::<Vec<_>>() } })
            }
            Value::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
        }
    }

    /// Firestore REST の Value 表現からデコード
    pub fn decode(raw: &Json) -> Result<Self, StoreError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| StoreError::Decode(format!("value is not an object: {}", raw)))?;
        let (kind, inner) = obj
            .iter()
            .next()
            .ok_or_else(|| StoreError::Decode("empty value object".into()))?;

        let value = match kind.as_str() {
            "nullValue" => Value::Null,
            "booleanValue" => Value::Bool(inner.as_bool().unwrap_or_default()),
            "integerValue" => {
                let n = match inner {
                    Json::String(s) => s.parse().ok(),
                    other => other.as_i64(),
                };
                Value::Integer(
                    n.ok_or_else(|| StoreError::Decode(format!("bad integerValue: {}", inner)))?,
                )
            }
            "doubleValue" => Value::Double(inner.as_f64().unwrap_or_default()),
            "stringValue" | "referenceValue" | "bytesValue" => {
                Value::String(inner.as_str().unwrap_or_default().to_string())
            }
            "timestampValue" => {
                let text = inner.as_str().unwrap_or_default();
                let ts = DateTime::parse_from_rfc3339(text)
                    .map_err(|e| StoreError::Decode(format!("bad timestampValue {}: {}", text, e)))?;
                Value::Timestamp(ts.with_timezone(&Utc))
            }
            "arrayValue" => {
                let items = match inner.get("values").and_then(Json::as_array) {
                    Some(values) => values.iter().map(Value::decode).collect::<Result<_, _>>()?,
                    None => Vec::new(),
                };
                Value::Array(items)
            }
            "mapValue" => Value::Map(match inner.get("fields") {
                Some(fields) => decode_fields(fields)?,
                None => Fields::new(),
            }),
            "geoPointValue" => {
                let mut fields = Fields::new();
                for key in ["latitude", "longitude"] {
                    if let Some(v) = inner.get(key).and_then(Json::as_f64) {
                        fields.insert(key.to_string(), Value::Double(v));
                    }
                }
                Value::Map(fields)
            }
            other => return Err(StoreError::Decode(format!("unknown value type: {}", other))),
        };
        Ok(value)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// (名前, 値) の列からフィールド集合を作る
pub fn fields<K, V, I>(entries: I) -> Fields
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

pub fn fields_to_json(fields: &Fields) -> Json {
    let map: Map<String, Json> = fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    Json::Object(map)
}

pub fn encode_fields(fields: &Fields) -> Json {
    let map: Map<String, Json> = fields
        .iter()
        .map(|(k, v)| (k.clone(), v.encode()))
        .collect();
    Json::Object(map)
}

pub fn decode_fields(raw: &Json) -> Result<Fields, StoreError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| StoreError::Decode("fields is not an object".into()))?;
    obj.iter()
        .map(|(k, v)| Ok((k.clone(), Value::decode(v)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encode_integer_as_string() {
        assert_eq!(
            Value::Integer(2003).encode(),
            json!({ "integerValue": "2003" })
        );
    }

    #[test]
    fn test_decode_user_document_fields() {
        let raw = json!({
            "first_name": { "stringValue": "ASHTYN" },
            "birth_month": { "integerValue": "7" },
            "voter_parish": { "nullValue": null },
            "voter_info_updated_at": { "timestampValue": "2025-10-01T12:30:00.123456Z" },
            "tags": { "arrayValue": { "values": [ { "stringValue": "a" } ] } },
            "empty": { "arrayValue": {} }
        });

        let fields = decode_fields(&raw).unwrap();
        assert_eq!(fields["first_name"], Value::from("ASHTYN"));
        assert_eq!(fields["birth_month"].as_i64(), Some(7));
        assert!(fields["voter_parish"].is_null());
        assert_eq!(fields["tags"], Value::Array(vec![Value::from("a")]));
        assert_eq!(fields["empty"], Value::Array(vec![]));
        match &fields["voter_info_updated_at"] {
            Value::Timestamp(ts) => assert_eq!(ts.timestamp(), 1759321800),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn test_nested_map_survives_encoding() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 15, 6, 0, 0).unwrap();
        let original = fields([
            ("title", Value::from("Proposition No. 1")),
            ("scraped_at", Value::from(ts)),
            (
                "meta",
                Value::Map(fields([("ok", Value::Bool(true)), ("n", Value::Double(1.5))])),
            ),
        ]);

        let decoded = decode_fields(&encode_fields(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let err = Value::decode(&json!({ "weirdValue": 1 })).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn test_as_i64_accepts_numeric_strings() {
        assert_eq!(Value::from(" 12 ").as_i64(), Some(12));
        assert_eq!(Value::Double(7.0).as_i64(), Some(7));
        assert_eq!(Value::Double(7.5).as_i64(), None);
        assert_eq!(Value::from("July").as_i64(), None);
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<String> = None;
        assert!(Value::from(none).is_null());
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }
}
