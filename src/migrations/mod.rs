//! Schema and data migrations.
//!
//! # Data Flow
//! ```text
//! hotels.rs (ordered step list per collection)
//!     → runner.rs (lookup record → apply mutation → write record)
//!     → tracking collection (one MigrationRecord per applied step)
//! ```
//!
//! # Design Decisions
//! - Forward-only: there is no down migration
//! - Step ids are append-only history
//! - Each collection's step set is migrated independently; a failure in one
//!   collection does not roll back another

pub mod hotels;
pub mod runner;
pub mod step;

pub use runner::{MigrationError, MigrationReport, MigrationRunner};
pub use step::{CreateIndex, InsertDocuments, MigrationId, MigrationRecord, MigrationStep, Mutation};

/// Steps for the logical collection `key`, targeting the physical
/// collection `collection`. Collections without migrations get none.
pub fn steps_for(key: &str, collection: &str) -> Vec<MigrationStep> {
    match key {
        "hotels" => hotels::hotel_migrations(collection),
        _ => Vec::new(),
    }
}
