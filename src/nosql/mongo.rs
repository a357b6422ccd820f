//! MongoDB driver for `mongodb://` and `mongodb+srv://` endpoints.
//!
//! # Responsibilities
//! - Build client options from a collection config (credentials, timeouts)
//! - Verify connectivity with a `ping` before handing out the connection
//! - Translate JSON documents to BSON and back
//!
//! # Design Decisions
//! - One `mongodb::Client` per logical collection, as the service opens them
//! - The driver pools internally, so the connection is shared by all requests

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{self, doc, Bson};
use mongodb::options::{ClientOptions, Credential, IndexOptions};
use mongodb::{Client, Collection};

use crate::config::CollectionConfig;
use crate::nosql::driver::{CollectionStore, Connection, Connector, Document, IndexModel};
use crate::nosql::error::{NoSqlError, NoSqlResult};

/// Connector backed by the official MongoDB driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self, config: &CollectionConfig) -> NoSqlResult<Arc<dyn Connection>> {
        let connection_error = |e: mongodb::error::Error| NoSqlError::Connection {
            collection: config.collection.clone(),
            message: e.to_string(),
        };

        let mut options = ClientOptions::parse(&config.endpoint)
            .await
            .map_err(|e| NoSqlError::Config(format!("{}: {}", config.endpoint, e)))?;
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        if let Some(credentials) = &config.credentials {
            options.credential = Some(
                Credential::builder()
                    .username(credentials.username.clone())
                    .password(credentials.password.clone())
                    .build(),
            );
        }

        let client = Client::with_options(options).map_err(connection_error)?;
        let database = client.database(&config.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(connection_error)?;

        let collection = database.collection::<bson::Document>(&config.collection);
        Ok(Arc::new(MongoConnection {
            client,
            store: Arc::new(MongoCollection {
                name: config.collection.clone(),
                inner: collection,
            }),
        }))
    }
}

struct MongoConnection {
    client: Client,
    store: Arc<MongoCollection>,
}

impl fmt::Debug for MongoConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConnection")
            .field("collection", &self.store.name)
            .finish()
    }
}

#[async_trait]
impl Connection for MongoConnection {
    fn collection(&self) -> Arc<dyn CollectionStore> {
        self.store.clone()
    }

    async fn disconnect(&self) -> NoSqlResult<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

struct MongoCollection {
    name: String,
    inner: Collection<bson::Document>,
}

impl MongoCollection {
    fn to_bson(&self, operation: &'static str, document: &Document) -> NoSqlResult<bson::Document> {
        to_bson(&self.name, operation, document)
    }

    fn from_bson(&self, operation: &'static str, document: bson::Document) -> NoSqlResult<Document> {
        from_bson(&self.name, operation, document)
    }
}

fn to_bson(
    collection: &str,
    operation: &'static str,
    document: &Document,
) -> NoSqlResult<bson::Document> {
    bson::to_document(document).map_err(|e| NoSqlError::operation(collection, operation, e))
}

fn from_bson(
    collection: &str,
    operation: &'static str,
    document: bson::Document,
) -> NoSqlResult<Document> {
    match bson::from_bson::<serde_json::Value>(Bson::Document(document)) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(NoSqlError::operation(
            collection,
            operation,
            format!("expected a document, got {}", other),
        )),
        Err(e) => Err(NoSqlError::operation(collection, operation, e)),
    }
}

#[async_trait]
impl CollectionStore for MongoCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, filter: Document) -> NoSqlResult<Option<Document>> {
        let filter = self.to_bson("find_one", &filter)?;
        let found = self
            .inner
            .find_one(filter)
            .await
            .map_err(|e| NoSqlError::operation(&self.name, "find_one", e))?;
        found.map(|d| self.from_bson("find_one", d)).transpose()
    }

    async fn find(&self, filter: Document) -> NoSqlResult<Vec<Document>> {
        let filter = self.to_bson("find", &filter)?;
        let op_error = |e: mongodb::error::Error| NoSqlError::operation(&self.name, "find", e);
        let mut cursor = self.inner.find(filter).await.map_err(op_error)?;
        let mut documents = Vec::new();
        while cursor.advance().await.map_err(op_error)? {
            let current = cursor.deserialize_current().map_err(op_error)?;
            documents.push(self.from_bson("find", current)?);
        }
        Ok(documents)
    }

    async fn insert_one(&self, document: Document) -> NoSqlResult<()> {
        let document = self.to_bson("insert_one", &document)?;
        self.inner.insert_one(document).await.map_err(|e| {
            if is_duplicate_key(&e) {
                NoSqlError::DuplicateKey {
                    collection: self.name.clone(),
                    index: "unknown".to_string(),
                }
            } else {
                NoSqlError::operation(&self.name, "insert_one", e)
            }
        })?;
        Ok(())
    }

    async fn delete_many(&self, filter: Document) -> NoSqlResult<u64> {
        let filter = self.to_bson("delete_many", &filter)?;
        let result = self
            .inner
            .delete_many(filter)
            .await
            .map_err(|e| NoSqlError::operation(&self.name, "delete_many", e))?;
        Ok(result.deleted_count)
    }

    async fn count_documents(&self, filter: Document) -> NoSqlResult<u64> {
        let filter = self.to_bson("count_documents", &filter)?;
        self.inner
            .count_documents(filter)
            .await
            .map_err(|e| NoSqlError::operation(&self.name, "count_documents", e))
    }

    async fn create_index(&self, index: IndexModel) -> NoSqlResult<()> {
        let mut keys = bson::Document::new();
        for (field, order) in &index.keys {
            keys.insert(field.clone(), order.as_i32());
        }
        let model = mongodb::IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(index.name.clone())
                    .unique(index.unique)
                    .build(),
            )
            .build();
        self.inner
            .create_index(model)
            .await
            .map_err(|e| NoSqlError::operation(&self.name, "create_index", e))?;
        Ok(())
    }

    async fn list_index_names(&self) -> NoSqlResult<Vec<String>> {
        self.inner
            .list_index_names()
            .await
            .map_err(|e| NoSqlError::operation(&self.name, "list_index_names", e))
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == 11000
    )
}
