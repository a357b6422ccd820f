//! Client registry: one connection per logical collection.
//!
//! # Responsibilities
//! - Open a connection for a collection config (validated first)
//! - Track the per-collection lifecycle state
//! - Hand out read-only collection accessors, never raw connections
//! - Release the connection, tolerating repeated or premature calls
//!
//! # State Machine
//! ```text
//! Unconnected → Connecting → Connected → Migrated (optional) → InUse → Disconnected
//! ```
//! `Connecting` is held by exactly one caller and falls back to `Unconnected`
//! when the attempt fails. `Disconnected` is terminal: a handle is never
//! reconnected.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::validation::validate_collection;
use crate::config::CollectionConfig;
use crate::nosql::driver::{CollectionStore, Connection, Connector, Document, IndexModel};
use crate::nosql::error::{NoSqlError, NoSqlResult};

/// Lifecycle state of a [`ClientHandle`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unconnected = 0,
    Connected = 1,
    Migrated = 2,
    InUse = 3,
    Disconnected = 4,
    Connecting = 5,
}

impl From<u8> for ClientState {
    fn from(val: u8) -> Self {
        match val {
            1 => ClientState::Connected,
            2 => ClientState::Migrated,
            3 => ClientState::InUse,
            4 => ClientState::Disconnected,
            5 => ClientState::Connecting,
            _ => ClientState::Unconnected,
        }
    }
}

impl ClientState {
    /// True while a connection is held.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            ClientState::Connected | ClientState::Migrated | ClientState::InUse
        )
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientState::Unconnected => "unconnected",
            ClientState::Connected => "connected",
            ClientState::Migrated => "migrated",
            ClientState::InUse => "in_use",
            ClientState::Disconnected => "disconnected",
            ClientState::Connecting => "connecting",
        };
        f.write_str(s)
    }
}

/// A live (or not yet / no longer live) connection to one collection.
pub struct ClientHandle {
    /// Logical name, e.g. "hotels".
    key: String,
    config: CollectionConfig,
    state: AtomicU8,
    connection: Mutex<Option<Arc<dyn Connection>>>,
}

impl ClientHandle {
    /// Create an unconnected handle.
    pub fn new(key: impl Into<String>, config: CollectionConfig) -> Self {
        Self {
            key: key.into(),
            config,
            state: AtomicU8::new(ClientState::Unconnected as u8),
            connection: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn state(&self) -> ClientState {
        ClientState::from(self.state.load(Ordering::Acquire))
    }

    /// Open the connection. Only valid on an `Unconnected` handle; of two
    /// concurrent calls, one connects and the other gets a precondition
    /// error.
    pub async fn connect(&self, connector: &dyn Connector) -> NoSqlResult<()> {
        if let Err(actual) = self.state.compare_exchange(
            ClientState::Unconnected as u8,
            ClientState::Connecting as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(NoSqlError::Precondition(format!(
                "cannot connect '{}' in state {}",
                self.key,
                ClientState::from(actual)
            )));
        }

        let connection = match self.open(connector).await {
            Ok(connection) => connection,
            Err(error) => {
                let _ = self.state.compare_exchange(
                    ClientState::Connecting as u8,
                    ClientState::Unconnected as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                return Err(error);
            }
        };

        *self.slot() = Some(connection);
        if let Err(actual) = self.state.compare_exchange(
            ClientState::Connecting as u8,
            ClientState::Connected as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            // Disconnected while connecting: release what we just opened.
            let orphan = self.slot().take();
            if let Some(connection) = orphan {
                connection.disconnect().await?;
            }
            return Err(NoSqlError::Precondition(format!(
                "'{}' moved to {} while connecting",
                self.key,
                ClientState::from(actual)
            )));
        }

        tracing::debug!(
            collection = %self.key,
            database = %self.config.database,
            "Collection connected"
        );
        Ok(())
    }

    async fn open(&self, connector: &dyn Connector) -> NoSqlResult<Arc<dyn Connection>> {
        validate_collection(&self.key, &self.config).map_err(|errors| {
            NoSqlError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;

        let secs = self.config.connect_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), connector.connect(&self.config)).await
        {
            Ok(result) => result,
            Err(_) => Err(NoSqlError::Timeout {
                collection: self.key.clone(),
                secs,
            }),
        }
    }

    /// Accessor for the bound collection.
    ///
    /// Fails with a precondition error unless the handle is live.
    pub fn collection(&self) -> NoSqlResult<CollectionAccessor> {
        let state = self.state();
        if !state.is_live() {
            return Err(NoSqlError::Precondition(format!(
                "collection '{}' requested in state {}",
                self.key, state
            )));
        }
        let slot = self.slot();
        let connection = slot.as_ref().ok_or_else(|| {
            NoSqlError::Precondition(format!("collection '{}' has no connection", self.key))
        })?;
        Ok(CollectionAccessor::new(connection.collection()))
    }

    /// `Connected → Migrated`.
    pub fn mark_migrated(&self) -> NoSqlResult<()> {
        self.advance(&[ClientState::Connected], ClientState::Migrated)
    }

    /// `Connected | Migrated → InUse`.
    pub fn mark_in_use(&self) -> NoSqlResult<()> {
        self.advance(
            &[ClientState::Connected, ClientState::Migrated],
            ClientState::InUse,
        )
    }

    fn advance(&self, from: &[ClientState], to: ClientState) -> NoSqlResult<()> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let state = ClientState::from(current);
            if state == to {
                return Ok(());
            }
            if !from.contains(&state) {
                return Err(NoSqlError::Precondition(format!(
                    "'{}' cannot move from {} to {}",
                    self.key, state, to
                )));
            }
            match self.state.compare_exchange_weak(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Release the connection.
    ///
    /// A handle that never connected, or that is already disconnected, is a
    /// success. The handle is `Disconnected` afterwards even when the driver
    /// reports a failure.
    pub async fn disconnect(&self) -> NoSqlResult<()> {
        let previous =
            ClientState::from(self.state.swap(ClientState::Disconnected as u8, Ordering::AcqRel));
        let connection = self.slot().take();

        match connection {
            Some(connection) => {
                tracing::debug!(collection = %self.key, from = %previous, "Disconnecting collection");
                connection.disconnect().await
            }
            None => {
                tracing::trace!(collection = %self.key, from = %previous, "Nothing to disconnect");
                Ok(())
            }
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn Connection>>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("key", &self.key)
            .field("collection", &self.config.collection)
            .field("state", &self.state())
            .finish()
    }
}

/// Factory for [`ClientHandle`]s over a shared connector.
#[derive(Clone)]
pub struct ClientRegistry {
    connector: Arc<dyn Connector>,
}

impl ClientRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Open a connection for `config`, registered under the logical `key`.
    pub async fn connect(
        &self,
        key: &str,
        config: &CollectionConfig,
    ) -> NoSqlResult<Arc<ClientHandle>> {
        let handle = Arc::new(ClientHandle::new(key, config.clone()));
        handle.connect(self.connector.as_ref()).await?;
        Ok(handle)
    }

    pub async fn disconnect(&self, handle: &ClientHandle) -> NoSqlResult<()> {
        handle.disconnect().await
    }

    pub fn get_collection(&self, handle: &ClientHandle) -> NoSqlResult<CollectionAccessor> {
        handle.collection()
    }
}

/// Typed accessor handed to repositories: collection name plus query/write
/// surface. Cheap to clone.
#[derive(Clone)]
pub struct CollectionAccessor {
    store: Arc<dyn CollectionStore>,
}

impl CollectionAccessor {
    /// Wrap any store, e.g. an in-memory substitute in tests.
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self { store }
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub async fn find_one(&self, filter: Document) -> NoSqlResult<Option<Document>> {
        self.store.find_one(filter).await
    }

    pub async fn find(&self, filter: Document) -> NoSqlResult<Vec<Document>> {
        self.store.find(filter).await
    }

    pub async fn insert_one(&self, document: Document) -> NoSqlResult<()> {
        self.store.insert_one(document).await
    }

    pub async fn delete_many(&self, filter: Document) -> NoSqlResult<u64> {
        self.store.delete_many(filter).await
    }

    pub async fn count_documents(&self, filter: Document) -> NoSqlResult<u64> {
        self.store.count_documents(filter).await
    }

    pub async fn create_index(&self, index: IndexModel) -> NoSqlResult<()> {
        self.store.create_index(index).await
    }

    pub async fn list_index_names(&self) -> NoSqlResult<Vec<String>> {
        self.store.list_index_names().await
    }
}

impl fmt::Debug for CollectionAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionAccessor")
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nosql::memory::MemoryConnector;
    use async_trait::async_trait;

    /// Memory connector that takes a moment to connect.
    struct SlowConnector(MemoryConnector);

    #[async_trait]
    impl Connector for SlowConnector {
        async fn connect(&self, config: &CollectionConfig) -> NoSqlResult<Arc<dyn Connection>> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.connect(config).await
        }
    }

    fn registry() -> (ClientRegistry, MemoryConnector) {
        let connector = MemoryConnector::new();
        (ClientRegistry::new(Arc::new(connector.clone())), connector)
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (registry, _) = registry();
        let handle = registry
            .connect("hotels", &CollectionConfig::memory("hotels"))
            .await
            .unwrap();
        assert_eq!(handle.state(), ClientState::Connected);

        handle.mark_migrated().unwrap();
        assert_eq!(handle.state(), ClientState::Migrated);
        handle.mark_in_use().unwrap();
        assert_eq!(handle.state(), ClientState::InUse);
        // Re-entering the current state is fine, going back is not.
        handle.mark_in_use().unwrap();
        assert!(handle.mark_migrated().is_err());

        handle.disconnect().await.unwrap();
        assert_eq!(handle.state(), ClientState::Disconnected);
        assert!(handle.mark_in_use().is_err());
    }

    #[tokio::test]
    async fn test_collection_before_connect_is_precondition_error() {
        let handle = ClientHandle::new("hotels", CollectionConfig::memory("hotels"));
        let err = handle.collection().unwrap_err();
        assert!(matches!(err, NoSqlError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_disconnect_is_tolerant() {
        let (registry, connector) = registry();

        // Never connected.
        let idle = ClientHandle::new("idle", CollectionConfig::memory("idle"));
        idle.disconnect().await.unwrap();
        assert_eq!(idle.state(), ClientState::Disconnected);

        let handle = registry
            .connect("hotels", &CollectionConfig::memory("hotels"))
            .await
            .unwrap();
        registry.disconnect(&handle).await.unwrap();
        registry.disconnect(&handle).await.unwrap();
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_is_terminal() {
        let (registry, connector) = registry();
        let handle = registry
            .connect("hotels", &CollectionConfig::memory("hotels"))
            .await
            .unwrap();
        handle.disconnect().await.unwrap();

        let err = handle.connect(&connector).await.unwrap_err();
        assert!(matches!(err, NoSqlError::Precondition(_)));
        assert!(registry.get_collection(&handle).is_err());
    }

    #[tokio::test]
    async fn test_malformed_config_is_config_error() {
        let (registry, connector) = registry();
        let mut config = CollectionConfig::memory("hotels");
        config.database = String::new();

        let err = registry.connect("hotels", &config).await.unwrap_err();
        assert!(matches!(err, NoSqlError::Config(_)));
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_accessor_is_bound_to_collection() {
        let (registry, _) = registry();
        let handle = registry
            .connect("hotels", &CollectionConfig::memory("hotels"))
            .await
            .unwrap();
        let accessor = registry.get_collection(&handle).unwrap();
        assert_eq!(accessor.name(), "hotels");

        accessor
            .insert_one(crate::nosql::document(serde_json::json!({"name": "Alvear"})))
            .await
            .unwrap();
        assert_eq!(accessor.count_documents(Document::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_connect_opens_one_connection() {
        let memory = MemoryConnector::new();
        let connector = SlowConnector(memory.clone());
        let handle = ClientHandle::new("hotels", CollectionConfig::memory("hotels"));

        let (first, second) = tokio::join!(handle.connect(&connector), handle.connect(&connector));

        assert!(first.is_ok() != second.is_ok());
        let err = first.err().or(second.err()).unwrap();
        assert!(matches!(err, NoSqlError::Precondition(_)));
        assert_eq!(handle.state(), ClientState::Connected);
        assert_eq!(memory.open_connections(), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_returns_to_unconnected() {
        let memory = MemoryConnector::new();
        let mut config = CollectionConfig::memory("hotels");
        config.database = String::new();
        let handle = ClientHandle::new("hotels", config);

        assert!(handle.connect(&memory).await.is_err());
        assert_eq!(handle.state(), ClientState::Unconnected);
    }
}
