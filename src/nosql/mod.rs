//! NoSQL datastore subsystem (client registry).
//!
//! # Data Flow
//! ```text
//! CollectionConfig
//!     → client.rs (ClientRegistry::connect → ClientHandle)
//!     → connector.rs (scheme dispatch)
//!     → memory.rs / mongo.rs (driver opens the Connection)
//!     → ClientHandle::collection() → CollectionAccessor
//!     → repositories / migration runner
//! ```
//!
//! # Design Decisions
//! - One connection per logical collection
//! - Dependents only ever see a `CollectionAccessor`, never the connection
//! - The driver seam is a set of object-safe traits (driver.rs)

pub mod client;
pub mod connector;
pub mod driver;
pub mod error;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;

pub use client::{ClientHandle, ClientRegistry, ClientState, CollectionAccessor};
pub use connector::SchemeConnector;
pub use driver::{
    document, CollectionStore, Connection, Connector, Document, IndexModel, IndexOrder,
};
pub use error::{NoSqlError, NoSqlResult};
pub use memory::{MemoryCollection, MemoryConnector};
