//! ドキュメントストア
//!
//! - `FirestoreStore`: Firestore REST API クライアント
//! - `MemoryStore`: プロセス内ストア（テスト・ドライラン用）

mod firestore;
mod memory;
mod value;

use async_trait::async_trait;
use thiserror::Error;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use value::{decode_fields, encode_fields, fields, fields_to_json, Fields, Value};

/// コレクション名
pub const USERS: &str = "users";
pub const BALLOT_PROPOSITIONS: &str = "ballot_propositions";
pub const SCRAPER_LOG: &str = "scraper_log";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("document not found: {0}")]
    NotFound(String),
}

/// ストア内の1ドキュメント
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// フィールドが存在し null でない
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_null())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 1件取得（存在しなければ None）
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// コレクション全件
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// ID順のページ取得。`start_after` のIDより後ろから最大 `limit` 件
    async fn list_page(
        &self,
        collection: &str,
        limit: usize,
        start_after: Option<&str>,
    ) -> Result<Vec<Document>, StoreError>;

    /// `field == value` のドキュメントを最大 `limit` 件
    async fn find(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError>;

    /// 全体を上書き（存在しなければ作成）
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// 指定フィールドのみ更新。ドキュメントが無ければ NotFound
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// 自動IDで追加し、そのIDを返す
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_accessors() {
        let doc = Document::new(
            "u1",
            fields([
                ("zip_code", Value::from("70817")),
                ("birth_year", Value::from(2003)),
                ("voter_parish", Value::Null),
            ]),
        );

        assert_eq!(doc.get_str("zip_code"), Some("70817"));
        assert_eq!(doc.get_i64("birth_year"), Some(2003));
        assert!(doc.has("zip_code"));
        assert!(!doc.has("voter_parish"));
        assert!(!doc.has("birth_month"));
    }
}
