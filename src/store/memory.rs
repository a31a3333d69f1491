use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Document, DocumentStore, Fields, StoreError, Value};

/// プロセス内ドキュメントストア
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Fields>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// コレクション内の件数
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_page(
        &self,
        collection: &str,
        limit: usize,
        start_after: Option<&str>,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(id, _)| start_after.map_or(true, |after| id.as_str() > after))
            .take(limit)
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect())
    }

    async fn find(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, fields)| fields.get(field) == Some(value))
            .take(limit)
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect())
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
        existing.extend(fields);
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = format!("auto{:016}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.set(collection, &id, fields).await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fields;

    #[tokio::test]
    async fn test_update_merges_and_requires_existing() {
        let store = MemoryStore::new();
        store
            .set("users", "u1", fields([("first_name", "ASHTYN"), ("zip_code", "70817")]))
            .await
            .unwrap();

        store
            .update("users", "u1", fields([("voter_parish", "East Baton Rouge")]))
            .await
            .unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.get_str("first_name"), Some("ASHTYN"));
        assert_eq!(doc.get_str("voter_parish"), Some("East Baton Rouge"));

        let err = store
            .update("users", "missing", fields([("a", "b")]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_set_overwrites_whole_document() {
        let store = MemoryStore::new();
        store
            .set("ballot_propositions", "p1", fields([("title", "Old"), ("extra", "x")]))
            .await
            .unwrap();
        store
            .set("ballot_propositions", "p1", fields([("title", "New")]))
            .await
            .unwrap();

        let doc = store.get("ballot_propositions", "p1").await.unwrap().unwrap();
        assert_eq!(doc.get_str("title"), Some("New"));
        assert!(!doc.has("extra"));
        assert_eq!(store.len("ballot_propositions").await, 1);
    }

    #[tokio::test]
    async fn test_find_and_paging() {
        let store = MemoryStore::new();
        for (id, parish) in [("a", "ORLEANS - 36"), ("b", "CADDO - 09"), ("c", "ORLEANS - 36")] {
            store
                .set("ballot_propositions", id, fields([("parish", parish)]))
                .await
                .unwrap();
        }

        let found = store
            .find("ballot_propositions", "parish", &Value::from("ORLEANS - 36"), 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        let limited = store
            .find("ballot_propositions", "parish", &Value::from("ORLEANS - 36"), 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        let first = store.list_page("ballot_propositions", 2, None).await.unwrap();
        assert_eq!(first.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
        let rest = store
            .list_page("ballot_propositions", 2, Some("b"))
            .await
            .unwrap();
        assert_eq!(rest.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), ["c"]);
    }

    #[tokio::test]
    async fn test_add_generates_distinct_ids() {
        let store = MemoryStore::new();
        let a = store.add("scraper_log", fields([("status", "completed")])).await.unwrap();
        let b = store.add("scraper_log", fields([("status", "failed")])).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.list("scraper_log").await.unwrap().len(), 2);
        assert!(store.is_empty("users").await);
    }
}
