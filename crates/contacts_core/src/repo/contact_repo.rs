//! Contact repository.
//!
//! # Responsibility
//! - Provide create/find/update/delete over an injected `ContactCollection`.
//! - Normalize every write through `extract_contact_fields`.
//!
//! # Invariants
//! - `create` is find-or-insert keyed on exact text content; duplicate
//!   content collapses to one document.
//! - `favorite` is written as a literal boolean on every create.
//! - Each public call issues exactly one store request.

use crate::config::RepositoryConfig;
use crate::model::contact::{Contact, ContactFields, ContactPayload};
use crate::model::id::ContactId;
use crate::store::{ContactCollection, ContactFilter, StoreError, StoreErrorKind, UpdateOptions};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Semantic error for contact repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Malformed identifier or nothing to write.
    InvalidArgument(String),
    /// `update` targeted an identifier with no document.
    NotFound(ContactId),
    /// The store could not be reached during `update`.
    Connection(StoreError),
    /// Any other store failure, unchanged.
    Store(StoreError),
    /// The store acknowledged a write but returned no document.
    InconsistentState(&'static str),
}

impl RepoError {
    /// Whether a caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Store(err) => err.kind() == StoreErrorKind::Timeout,
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::NotFound(id) => write!(f, "contact not found: {id}"),
            Self::Connection(err) => write!(f, "contact store connection error: {err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent contact state: {details}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connection(err) | Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Contact data access over one injected collection handle.
pub struct ContactRepository<C: ContactCollection> {
    collection: C,
    config: RepositoryConfig,
}

impl<C: ContactCollection> ContactRepository<C> {
    /// Creates a repository with default configuration.
    pub fn new(collection: C) -> Self {
        Self::with_config(collection, RepositoryConfig::default())
    }

    pub fn with_config(collection: C, config: RepositoryConfig) -> Self {
        Self { collection, config }
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Projects `payload` onto the recognized attributes, dropping absent ones.
    pub fn extract_contact_fields(payload: &ContactPayload) -> ContactFields {
        ContactFields::from_payload(payload)
    }

    /// Finds the contact with exactly this text content or inserts it, then
    /// writes the coerced `favorite` flag.
    ///
    /// # Errors
    /// - `Store` for backend failures.
    /// - `InconsistentState` when the upsert returns no document.
    pub async fn create(&self, payload: &ContactPayload) -> RepoResult<Contact> {
        let fields = Self::extract_contact_fields(payload);
        let set = ContactFields {
            favorite: Some(fields.favorite == Some(true)),
            ..ContactFields::default()
        };

        let stored = self
            .collection
            .find_one_and_update(
                &ContactFilter::Content(fields.content_key()),
                &set,
                UpdateOptions::upsert(),
            )
            .await
            .map_err(|err| log_failure("create", err))?
            .ok_or(RepoError::InconsistentState(
                "upserted contact missing from store response",
            ))?;

        debug!("event=contact_create module=repo status=ok");
        Ok(stored)
    }

    /// Returns every contact matching `filter`.
    pub async fn find(&self, filter: &ContactFilter) -> RepoResult<Vec<Contact>> {
        let contacts = self
            .collection
            .find(filter)
            .await
            .map_err(|err| log_failure("find", err))?;
        debug!(
            "event=contact_find module=repo status=ok filter={} count={}",
            filter.label(),
            contacts.len()
        );
        Ok(contacts)
    }

    /// Case-insensitive match of `name` against the name attribute.
    ///
    /// By default `name` is a regular-expression source; see `NameSearch`.
    pub async fn find_by_name(&self, name: &str) -> RepoResult<Vec<Contact>> {
        self.find(&ContactFilter::NamePattern {
            pattern: self.config.name_pattern(name),
            case_insensitive: true,
        })
        .await
    }

    /// Returns the contact with this identifier; malformed ids find nothing.
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Contact>> {
        self.collection
            .find_one(&id_filter(id))
            .await
            .map_err(|err| log_failure("find_by_id", err))
    }

    /// Applies a partial update and returns the post-update contact.
    ///
    /// # Errors
    /// - `InvalidArgument` for an empty or malformed `id`, or a payload with
    ///   no recognized fields.
    /// - `NotFound` when no contact has this identifier.
    /// - `Connection` when the store cannot be reached.
    /// - `Store` for any other backend failure.
    pub async fn update(&self, id: &str, payload: &ContactPayload) -> RepoResult<Contact> {
        if id.is_empty() {
            return Err(RepoError::InvalidArgument("contact id is required".to_string()));
        }
        let contact_id = ContactId::parse(id).ok_or_else(|| {
            RepoError::InvalidArgument(format!("invalid contact id format `{id}`"))
        })?;

        let set = Self::extract_contact_fields(payload);
        if set.is_empty() {
            return Err(RepoError::InvalidArgument(
                "no valid fields to update".to_string(),
            ));
        }

        let options = UpdateOptions::default().with_max_time(self.config.update_max_time);
        let updated = self
            .collection
            .find_one_and_update(&ContactFilter::Id(contact_id), &set, options)
            .await
            .map_err(|err| match err.kind() {
                StoreErrorKind::Connection => {
                    warn!("event=contact_update module=repo status=error error_kind=connection");
                    RepoError::Connection(err)
                }
                _ => log_failure("update", err),
            })?
            .ok_or(RepoError::NotFound(contact_id))?;

        debug!(
            "event=contact_update module=repo status=ok fields={}",
            set.len()
        );
        Ok(updated)
    }

    /// Removes and returns the contact with this identifier.
    pub async fn delete(&self, id: &str) -> RepoResult<Option<Contact>> {
        let removed = self
            .collection
            .find_one_and_delete(&id_filter(id))
            .await
            .map_err(|err| log_failure("delete", err))?;
        debug!(
            "event=contact_delete module=repo status=ok removed={}",
            removed.is_some()
        );
        Ok(removed)
    }

    /// Removes every contact and returns how many were removed.
    pub async fn delete_all(&self) -> RepoResult<u64> {
        let removed = self
            .collection
            .delete_many(&ContactFilter::All)
            .await
            .map_err(|err| log_failure("delete_all", err))?;
        debug!("event=contact_delete_all module=repo status=ok removed={removed}");
        Ok(removed)
    }

    /// Contacts whose `favorite` is `true`.
    pub async fn find_favorite(&self) -> RepoResult<Vec<Contact>> {
        self.find(&ContactFilter::Favorite(true)).await
    }
}

/// Identifier lookup filter; malformed text becomes a filter matching nothing.
fn id_filter(id: &str) -> ContactFilter {
    ContactId::parse(id).map_or(ContactFilter::NoMatch, ContactFilter::Id)
}

fn log_failure(operation: &'static str, err: StoreError) -> RepoError {
    warn!(
        "event=contact_{operation} module=repo status=error error_kind={}",
        err.kind().as_str()
    );
    RepoError::Store(err)
}
