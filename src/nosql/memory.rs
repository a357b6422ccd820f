//! In-memory datastore driver.
//!
//! Serves `memory://` endpoints. Collections live as long as the
//! [`MemoryConnector`] (and its clones) that created them, so reconnecting
//! through the same connector sees the same documents, the way a restarted
//! process sees a real server.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::config::CollectionConfig;
use crate::nosql::driver::{CollectionStore, Connection, Connector, Document, IndexModel};
use crate::nosql::error::{NoSqlError, NoSqlResult};

/// (endpoint, database, collection)
type CollectionKey = (String, String, String);

/// Connector for `memory://` endpoints. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    collections: Arc<DashMap<CollectionKey, Arc<MemoryCollection>>>,
    open: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connections opened and not yet disconnected.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Direct access to a collection's store, bypassing connections.
    pub fn store(&self, config: &CollectionConfig) -> Arc<MemoryCollection> {
        self.collections
            .entry(key_of(config))
            .or_insert_with(|| Arc::new(MemoryCollection::new(&config.collection)))
            .clone()
    }
}

fn key_of(config: &CollectionConfig) -> CollectionKey {
    (
        config.endpoint.clone(),
        config.database.clone(),
        config.collection.clone(),
    )
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, config: &CollectionConfig) -> NoSqlResult<Arc<dyn Connection>> {
        if !config.endpoint.starts_with("memory://") {
            return Err(NoSqlError::Config(format!(
                "memory connector cannot open '{}'",
                config.endpoint
            )));
        }
        let store = self.store(config);
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryConnection {
            store,
            open: self.open.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug)]
struct MemoryConnection {
    store: Arc<MemoryCollection>,
    open: Arc<AtomicUsize>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for MemoryConnection {
    fn collection(&self) -> Arc<dyn CollectionStore> {
        self.store.clone()
    }

    async fn disconnect(&self) -> NoSqlResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CollectionData {
    documents: Vec<Document>,
    indexes: Vec<IndexModel>,
}

/// A single in-memory collection.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    data: RwLock<CollectionData>,
}

impl MemoryCollection {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: RwLock::new(CollectionData::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CollectionData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CollectionData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| document.get(field) == Some(expected))
}

/// Values of the index fields, `Null` for missing ones.
fn index_key(document: &Document, index: &IndexModel) -> Vec<Value> {
    index
        .keys
        .iter()
        .map(|(field, _)| document.get(field).cloned().unwrap_or(Value::Null))
        .collect()
}

#[async_trait]
impl CollectionStore for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, filter: Document) -> NoSqlResult<Option<Document>> {
        Ok(self
            .read()
            .documents
            .iter()
            .find(|doc| matches(doc, &filter))
            .cloned())
    }

    async fn find(&self, filter: Document) -> NoSqlResult<Vec<Document>> {
        Ok(self
            .read()
            .documents
            .iter()
            .filter(|doc| matches(doc, &filter))
            .cloned()
            .collect())
    }

    async fn insert_one(&self, document: Document) -> NoSqlResult<()> {
        let mut data = self.write();
        for index in data.indexes.iter().filter(|i| i.unique) {
            let key = index_key(&document, index);
            if data.documents.iter().any(|doc| index_key(doc, index) == key) {
                return Err(NoSqlError::DuplicateKey {
                    collection: self.name.clone(),
                    index: index.name.clone(),
                });
            }
        }
        data.documents.push(document);
        Ok(())
    }

    async fn delete_many(&self, filter: Document) -> NoSqlResult<u64> {
        let mut data = self.write();
        let before = data.documents.len();
        data.documents.retain(|doc| !matches(doc, &filter));
        Ok((before - data.documents.len()) as u64)
    }

    async fn count_documents(&self, filter: Document) -> NoSqlResult<u64> {
        Ok(self
            .read()
            .documents
            .iter()
            .filter(|doc| matches(doc, &filter))
            .count() as u64)
    }

    async fn create_index(&self, index: IndexModel) -> NoSqlResult<()> {
        let mut data = self.write();
        if let Some(existing) = data.indexes.iter().find(|i| i.name == index.name) {
            if *existing == index {
                return Ok(());
            }
            return Err(NoSqlError::operation(
                &self.name,
                "create_index",
                format!("index '{}' exists with different options", index.name),
            ));
        }
        if index.unique {
            let mut seen = BTreeSet::new();
            for doc in &data.documents {
                let key = serde_json::to_string(&index_key(doc, &index))
                    .map_err(|e| NoSqlError::operation(&self.name, "create_index", e))?;
                if !seen.insert(key) {
                    return Err(NoSqlError::DuplicateKey {
                        collection: self.name.clone(),
                        index: index.name.clone(),
                    });
                }
            }
        }
        data.indexes.push(index);
        Ok(())
    }

    async fn list_index_names(&self) -> NoSqlResult<Vec<String>> {
        Ok(self.read().indexes.iter().map(|i| i.name.clone()).collect())
    }
}
