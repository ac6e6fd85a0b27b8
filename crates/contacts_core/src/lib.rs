//! Contact data-access layer over a document collection.
//!
//! The repository owns query and payload shaping only; durability, indexing
//! and write isolation belong to the injected `ContactCollection` backend.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;

pub use config::{NameSearch, RepositoryConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingStatus};
pub use model::contact::{coerce_favorite, Contact, ContactFields, ContactPayload};
pub use model::id::ContactId;
pub use repo::contact_repo::{ContactRepository, RepoError, RepoResult};
#[cfg(feature = "mongodb")]
pub use store::MongoContactCollection;
pub use store::{
    ContactCollection, ContactFilter, SqliteContactCollection, StoreError, StoreErrorKind,
    StoreResult, UpdateOptions,
};

