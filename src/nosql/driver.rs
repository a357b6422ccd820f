//! Driver seam between the client registry and concrete datastores.
//!
//! A [`Connector`] opens one [`Connection`] per collection config. The
//! connection exposes exactly one [`CollectionStore`] and knows how to
//! release itself. Everything above this module talks to these traits only,
//! which is what lets tests substitute a recording or failing driver.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::CollectionConfig;
use crate::nosql::error::NoSqlResult;

/// A stored document: a JSON object.
pub type Document = Map<String, Value>;

/// Build a [`Document`] from a `serde_json::json!` object literal.
///
/// Non-object values produce an empty document.
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// Index sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrder {
    Ascending,
    Descending,
}

impl IndexOrder {
    pub fn as_i32(self) -> i32 {
        match self {
            IndexOrder::Ascending => 1,
            IndexOrder::Descending => -1,
        }
    }
}

/// Description of an index to create on a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    /// Index name. Creating an index whose name already exists is a no-op.
    pub name: String,
    /// Indexed fields with their order.
    pub keys: Vec<(String, IndexOrder)>,
    pub unique: bool,
}

impl IndexModel {
    /// Single ascending field index named `<field>_1`.
    pub fn ascending(field: &str) -> Self {
        Self {
            name: format!("{}_1", field),
            keys: vec![(field.to_string(), IndexOrder::Ascending)],
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Opens connections for collection configs.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &CollectionConfig) -> NoSqlResult<Arc<dyn Connection>>;
}

/// One live connection bound to a single collection.
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// The collection this connection is bound to.
    fn collection(&self) -> Arc<dyn CollectionStore>;

    /// Release the underlying network resources.
    async fn disconnect(&self) -> NoSqlResult<()>;
}

/// Query and write surface of a collection.
///
/// Filters are equality matches on top-level fields; an empty filter
/// matches every document.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    fn name(&self) -> &str;

    async fn find_one(&self, filter: Document) -> NoSqlResult<Option<Document>>;

    async fn find(&self, filter: Document) -> NoSqlResult<Vec<Document>>;

    async fn insert_one(&self, document: Document) -> NoSqlResult<()>;

    /// Returns the number of deleted documents.
    async fn delete_many(&self, filter: Document) -> NoSqlResult<u64>;

    async fn count_documents(&self, filter: Document) -> NoSqlResult<u64>;

    async fn create_index(&self, index: IndexModel) -> NoSqlResult<()>;

    async fn list_index_names(&self) -> NoSqlResult<Vec<String>>;
}
