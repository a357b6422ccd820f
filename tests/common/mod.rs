//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use globalstay_service::config::{CollectionConfig, ServiceConfig};
use globalstay_service::lifecycle::Shutdown;
use globalstay_service::migrations::Mutation;
use globalstay_service::nosql::{
    CollectionAccessor, CollectionStore, Connection, Connector, Document, IndexModel,
    MemoryConnector, NoSqlError, NoSqlResult,
};

/// Something the connector observed, by collection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect(String),
    Disconnect(String),
}

/// Injected failures, by collection name.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    pub fail_connect: Option<String>,
    pub fail_disconnect: Option<String>,
    pub fail_insert: Option<String>,
    pub fail_index: Option<String>,
}

#[derive(Default)]
struct Shared {
    faults: Mutex<Faults>,
    events: Mutex<Vec<Event>>,
    writes: Mutex<HashMap<String, usize>>,
    trigger: Mutex<Option<(String, Shutdown)>>,
}

impl Shared {
    fn fault(&self, pick: impl Fn(&Faults) -> &Option<String>, collection: &str) -> bool {
        pick(&self.faults.lock().unwrap()).as_deref() == Some(collection)
    }

    fn log(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn count_write(&self, collection: &str) {
        *self.writes.lock().unwrap().entry(collection.to_string()).or_default() += 1;
    }
}

/// Memory-backed connector that records calls and injects failures.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    inner: MemoryConnector,
    shared: Arc<Shared>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.shared.faults.lock().unwrap() = faults;
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared.events.lock().unwrap().clone()
    }

    /// Trigger `shutdown` once `collection` has connected.
    pub fn trigger_shutdown_after(&self, collection: &str, shutdown: &Shutdown) {
        *self.shared.trigger.lock().unwrap() = Some((collection.to_string(), shutdown.clone()));
    }

    pub fn clear_events(&self) {
        self.shared.events.lock().unwrap().clear();
    }

    /// Successful writes (inserts, deletes, index creations) on `collection`.
    pub fn writes(&self, collection: &str) -> usize {
        self.shared
            .writes
            .lock()
            .unwrap()
            .get(collection)
            .copied()
            .unwrap_or(0)
    }

    pub fn open_connections(&self) -> usize {
        self.inner.open_connections()
    }

    pub fn memory(&self) -> &MemoryConnector {
        &self.inner
    }

    /// Collection names of connect events, in order.
    pub fn connected(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Connect(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Collection names of disconnect events, in order.
    pub fn disconnected(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Disconnect(name) => Some(name),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(&self, config: &CollectionConfig) -> NoSqlResult<Arc<dyn Connection>> {
        let name = config.collection.clone();
        if self.shared.fault(|f| &f.fail_connect, &name) {
            return Err(NoSqlError::Connection {
                collection: name,
                message: "injected connect failure".into(),
            });
        }
        let inner = self.inner.connect(config).await?;
        self.shared.log(Event::Connect(name.clone()));
        if let Some((after, shutdown)) = self.shared.trigger.lock().unwrap().as_ref() {
            if *after == name {
                shutdown.trigger();
            }
        }
        Ok(Arc::new(RecordingConnection {
            name,
            inner,
            shared: self.shared.clone(),
        }))
    }
}

struct RecordingConnection {
    name: String,
    inner: Arc<dyn Connection>,
    shared: Arc<Shared>,
}

impl fmt::Debug for RecordingConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingConnection").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn collection(&self) -> Arc<dyn CollectionStore> {
        Arc::new(RecordingStore {
            inner: self.inner.collection(),
            shared: self.shared.clone(),
        })
    }

    async fn disconnect(&self) -> NoSqlResult<()> {
        self.shared.log(Event::Disconnect(self.name.clone()));
        let result = self.inner.disconnect().await;
        if self.shared.fault(|f| &f.fail_disconnect, &self.name) {
            return Err(NoSqlError::Disconnect {
                collection: self.name.clone(),
                message: "injected disconnect failure".into(),
            });
        }
        result
    }
}

struct RecordingStore {
    inner: Arc<dyn CollectionStore>,
    shared: Arc<Shared>,
}

#[async_trait]
impl CollectionStore for RecordingStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find_one(&self, filter: Document) -> NoSqlResult<Option<Document>> {
        self.inner.find_one(filter).await
    }

    async fn find(&self, filter: Document) -> NoSqlResult<Vec<Document>> {
        self.inner.find(filter).await
    }

    async fn insert_one(&self, document: Document) -> NoSqlResult<()> {
        if self.shared.fault(|f| &f.fail_insert, self.name()) {
            return Err(NoSqlError::operation(self.name(), "insert_one", "injected failure"));
        }
        self.inner.insert_one(document).await?;
        self.shared.count_write(self.name());
        Ok(())
    }

    async fn delete_many(&self, filter: Document) -> NoSqlResult<u64> {
        let deleted = self.inner.delete_many(filter).await?;
        self.shared.count_write(self.name());
        Ok(deleted)
    }

    async fn count_documents(&self, filter: Document) -> NoSqlResult<u64> {
        self.inner.count_documents(filter).await
    }

    async fn create_index(&self, index: IndexModel) -> NoSqlResult<()> {
        if self.shared.fault(|f| &f.fail_index, self.name()) {
            return Err(NoSqlError::operation(self.name(), "create_index", "injected failure"));
        }
        self.inner.create_index(index).await?;
        self.shared.count_write(self.name());
        Ok(())
    }

    async fn list_index_names(&self) -> NoSqlResult<Vec<String>> {
        self.inner.list_index_names().await
    }
}

/// Mutation that only counts its applications.
#[derive(Clone, Default)]
pub struct CountingMutation {
    pub count: Arc<AtomicUsize>,
}

impl CountingMutation {
    pub fn applied(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mutation for CountingMutation {
    async fn apply(&self, _target: &CollectionAccessor) -> NoSqlResult<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mutation that panics when applied.
#[derive(Clone, Default)]
pub struct PanickingMutation;

#[async_trait]
impl Mutation for PanickingMutation {
    async fn apply(&self, _target: &CollectionAccessor) -> NoSqlResult<()> {
        panic!("mutation blew up");
    }
}

/// Default configuration bound to loopback on an ephemeral port.
pub fn local_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.scope = "test".into();
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config
}
