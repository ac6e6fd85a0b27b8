//! Document-collection seam used by the contact repository.
//!
//! # Responsibility
//! - Define the minimal collection surface the repository depends on.
//! - Describe queries as a closed `ContactFilter` enum instead of raw
//!   store-specific filter documents.
//! - Classify backend failures into a typed `StoreErrorKind`.
//!
//! # Invariants
//! - Every trait method is exactly one round trip to the backend.
//! - Backends classify failures from their typed error surface only.

use crate::model::contact::{Contact, ContactFields};
use crate::model::id::ContactId;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod sqlite;

#[cfg(feature = "mongodb")]
pub use mongo::MongoContactCollection;
pub use sqlite::SqliteContactCollection;

pub type StoreResult<T> = Result<T, StoreError>;

/// Query filter over one contact collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactFilter {
    /// Matches every document.
    All,
    /// Matches nothing. Used in place of malformed identifiers.
    NoMatch,
    /// Matches the document with this identifier.
    Id(ContactId),
    /// Exact text-content equality over name, email, address and phone.
    /// An attribute absent here must be absent on the document. `favorite`
    /// is ignored.
    Content(ContactFields),
    /// Regular-expression match against `name`.
    NamePattern {
        pattern: String,
        case_insensitive: bool,
    },
    /// Matches documents whose `favorite` equals this value.
    Favorite(bool),
}

impl ContactFilter {
    /// Equality fields a newly upserted document is seeded with.
    pub fn upsert_seed(&self) -> (Option<ContactId>, ContactFields) {
        match self {
            Self::Id(id) => (Some(*id), ContactFields::default()),
            Self::Content(fields) => (None, fields.content_key()),
            Self::Favorite(favorite) => (
                None,
                ContactFields {
                    favorite: Some(*favorite),
                    ..ContactFields::default()
                },
            ),
            Self::All | Self::NoMatch | Self::NamePattern { .. } => {
                (None, ContactFields::default())
            }
        }
    }

    /// Short label for log events; never includes field values.
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::NoMatch => "no_match",
            Self::Id(_) => "id",
            Self::Content(_) => "content",
            Self::NamePattern { .. } => "name_pattern",
            Self::Favorite(_) => "favorite",
        }
    }
}

/// Options for `find_one_and_update`.
///
/// The returned document always reflects the post-update state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert a new document seeded from the filter when nothing matches.
    pub upsert: bool,
    /// Upper bound on execution time of the request.
    pub max_time: Option<Duration>,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        Self {
            upsert: true,
            max_time: None,
        }
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }
}

/// Connected handle to one named contact collection.
#[async_trait]
pub trait ContactCollection: Send + Sync {
    /// Returns every document matching `filter`, in backend order.
    async fn find(&self, filter: &ContactFilter) -> StoreResult<Vec<Contact>>;

    /// Returns the first document matching `filter`.
    async fn find_one(&self, filter: &ContactFilter) -> StoreResult<Option<Contact>>;

    /// Applies `set` to the first match and returns it after the write.
    async fn find_one_and_update(
        &self,
        filter: &ContactFilter,
        set: &ContactFields,
        options: UpdateOptions,
    ) -> StoreResult<Option<Contact>>;

    /// Removes the first match and returns it.
    async fn find_one_and_delete(&self, filter: &ContactFilter) -> StoreResult<Option<Contact>>;

    /// Removes every match and returns how many were removed.
    async fn delete_many(&self, filter: &ContactFilter) -> StoreResult<u64>;
}

/// Failure category of a backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Name resolution failed or the store could not be reached.
    Connection,
    /// The request exceeded its execution time budget.
    Timeout,
    /// The name pattern could not be compiled.
    InvalidPattern,
    /// A stored document could not be decoded.
    Corrupt,
    /// Any other backend failure.
    Backend,
}

impl StoreErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Timeout => "timeout",
            Self::InvalidPattern => "invalid_pattern",
            Self::Corrupt => "corrupt",
            Self::Backend => "backend",
        }
    }
}

/// Backend failure with its classified kind and original cause.
#[derive(Debug)]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: StoreErrorKind,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::{ContactFilter, StoreError, StoreErrorKind};
    use crate::model::contact::ContactFields;
    use crate::model::id::ContactId;

    #[test]
    fn content_seed_drops_favorite() {
        let filter = ContactFilter::Content(ContactFields {
            name: Some("Ann".to_string()),
            favorite: Some(true),
            ..ContactFields::default()
        });
        let (id, seed) = filter.upsert_seed();
        assert_eq!(id, None);
        assert_eq!(seed.name.as_deref(), Some("Ann"));
        assert_eq!(seed.favorite, None);
    }

    #[test]
    fn id_seed_keeps_identifier() {
        let target = ContactId::new();
        let (id, seed) = ContactFilter::Id(target).upsert_seed();
        assert_eq!(id, Some(target));
        assert!(seed.is_empty());
    }

    #[test]
    fn store_error_display_includes_kind() {
        let err = StoreError::new(StoreErrorKind::Connection, "dns lookup failed");
        assert_eq!(err.kind(), StoreErrorKind::Connection);
        assert_eq!(err.to_string(), "connection error: dns lookup failed");
    }
}
