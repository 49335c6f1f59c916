//! In-process document store.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

use super::{
    merge_set, new_id, with_id, Collection, DeleteResult, Document, DocumentStore, Filter,
    InsertOneResult, StoreError, UpdateResult, ID_FIELD,
};

/// Documents held in memory, in insertion order per collection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<(String, Document)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Check `doc` against the unique fields of `collection`, ignoring the entry `skip_id`.
fn check_unique(
    collection: Collection,
    entries: &[(String, Document)],
    doc: &Document,
    skip_id: Option<&str>,
) -> Result<(), StoreError> {
    for &field in collection.unique_fields() {
        let value = match doc.get(field) {
            Some(Value::Null) | None => continue,
            Some(value) => value,
        };
        let taken = entries
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != skip_id)
            .any(|(_, other)| other.get(field) == Some(value));
        if taken {
            return Err(StoreError::Conflict { collection, field });
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_all(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read();
        Ok(collections
            .get(&collection)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(id, doc)| filter.matches(id, doc))
                    .map(|(id, doc)| with_id(id, doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read();
        Ok(collections.get(&collection).and_then(|entries| {
            entries
                .iter()
                .find(|(id, doc)| filter.matches(id, doc))
                .map(|(id, doc)| with_id(id, doc.clone()))
        }))
    }

    async fn insert_one(
        &self,
        collection: Collection,
        mut doc: Document,
    ) -> Result<InsertOneResult, StoreError> {
        doc.remove(ID_FIELD);

        let mut collections = self.collections.write();
        let entries = collections.entry(collection).or_default();
        check_unique(collection, entries, &doc, None)?;

        let id = new_id();
        entries.push((id.clone(), doc));
        Ok(InsertOneResult::new(id))
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        set: Document,
    ) -> Result<UpdateResult, StoreError> {
        let mut collections = self.collections.write();
        let entries = collections.entry(collection).or_default();

        let Some(index) = entries.iter().position(|(id, doc)| filter.matches(id, doc)) else {
            return Ok(UpdateResult::new(0, 0));
        };

        let mut updated = entries[index].1.clone();
        if !merge_set(&mut updated, set) {
            return Ok(UpdateResult::new(1, 0));
        }

        let id = entries[index].0.clone();
        check_unique(collection, entries, &updated, Some(&id))?;
        entries[index].1 = updated;
        Ok(UpdateResult::new(1, 1))
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<DeleteResult, StoreError> {
        let mut collections = self.collections.write();
        let Some(entries) = collections.get_mut(&collection) else {
            return Ok(DeleteResult::new(0));
        };

        match entries.iter().position(|(id, doc)| filter.matches(id, doc)) {
            Some(index) => {
                entries.remove(index);
                Ok(DeleteResult::new(1))
            }
            None => Ok(DeleteResult::new(0)),
        }
    }
}
