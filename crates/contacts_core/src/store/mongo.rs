//! MongoDB-backed contact collection (`mongodb` feature).
//!
//! # Responsibility
//! - Translate `ContactFilter`/`ContactFields` into BSON filter and `$set`
//!   documents for an already-connected `mongodb::Collection`.
//! - Classify driver errors by `ErrorKind`.
//!
//! # Invariants
//! - Connection lifecycle is owned by the caller.
//! - `_id` is always an `ObjectId`.

use super::{
    ContactCollection, ContactFilter, StoreError, StoreErrorKind, StoreResult, UpdateOptions,
};
use crate::model::contact::{Contact, ContactFields};
use crate::model::id::ContactId;
use async_trait::async_trait;
use futures::TryStreamExt;
use log::warn;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};

/// Server error code for an exceeded `maxTimeMS`.
const MAX_TIME_MS_EXPIRED: i32 = 50;

/// Contact collection stored in MongoDB.
#[derive(Clone)]
pub struct MongoContactCollection {
    inner: Collection<Document>,
}

impl MongoContactCollection {
    pub fn new(inner: Collection<Document>) -> Self {
        Self { inner }
    }

    pub fn from_database(database: &Database, collection: &str) -> Self {
        Self::new(database.collection::<Document>(collection))
    }
}

#[async_trait]
impl ContactCollection for MongoContactCollection {
    async fn find(&self, filter: &ContactFilter) -> StoreResult<Vec<Contact>> {
        let cursor = self
            .inner
            .find(filter_document(filter))
            .await
            .map_err(classify)?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(classify)?;
        documents.into_iter().map(contact_from_document).collect()
    }

    async fn find_one(&self, filter: &ContactFilter) -> StoreResult<Option<Contact>> {
        self.inner
            .find_one(filter_document(filter))
            .await
            .map_err(classify)?
            .map(contact_from_document)
            .transpose()
    }

    async fn find_one_and_update(
        &self,
        filter: &ContactFilter,
        set: &ContactFields,
        options: UpdateOptions,
    ) -> StoreResult<Option<Contact>> {
        // An empty `$set` is rejected by the server.
        if set.is_empty() && !options.upsert {
            return self.find_one(filter).await;
        }

        let mut driver_options = FindOneAndUpdateOptions::default();
        driver_options.return_document = Some(ReturnDocument::After);
        driver_options.upsert = Some(options.upsert);
        driver_options.max_time = options.max_time;

        self.inner
            .find_one_and_update(
                filter_document(filter),
                doc! { "$set": fields_document(set) },
            )
            .with_options(driver_options)
            .await
            .map_err(classify)?
            .map(contact_from_document)
            .transpose()
    }

    async fn find_one_and_delete(&self, filter: &ContactFilter) -> StoreResult<Option<Contact>> {
        self.inner
            .find_one_and_delete(filter_document(filter))
            .await
            .map_err(classify)?
            .map(contact_from_document)
            .transpose()
    }

    async fn delete_many(&self, filter: &ContactFilter) -> StoreResult<u64> {
        let result = self
            .inner
            .delete_many(filter_document(filter))
            .await
            .map_err(classify)?;
        Ok(result.deleted_count)
    }
}

fn filter_document(filter: &ContactFilter) -> Document {
    match filter {
        ContactFilter::All => Document::new(),
        ContactFilter::NoMatch => doc! { "_id": Bson::Null },
        ContactFilter::Id(id) => doc! { "_id": id.as_object_id() },
        ContactFilter::Content(fields) => {
            let mut document = Document::new();
            for (key, value) in [
                ("name", &fields.name),
                ("email", &fields.email),
                ("address", &fields.address),
                ("phone", &fields.phone),
            ] {
                match value {
                    Some(text) => document.insert(key, text.as_str()),
                    None => document.insert(key, doc! { "$exists": false }),
                };
            }
            document
        }
        ContactFilter::NamePattern {
            pattern,
            case_insensitive,
        } => {
            let options = if *case_insensitive { "i" } else { "" };
            doc! { "name": { "$regex": pattern.as_str(), "$options": options } }
        }
        ContactFilter::Favorite(favorite) => doc! { "favorite": *favorite },
    }
}

fn fields_document(fields: &ContactFields) -> Document {
    let mut document = Document::new();
    for (key, value) in [
        ("name", &fields.name),
        ("email", &fields.email),
        ("address", &fields.address),
        ("phone", &fields.phone),
    ] {
        if let Some(text) = value {
            document.insert(key, text.as_str());
        }
    }
    if let Some(favorite) = fields.favorite {
        document.insert("favorite", favorite);
    }
    document
}

fn contact_from_document(document: Document) -> StoreResult<Contact> {
    let id = document.get_object_id("_id").map_err(|err| {
        StoreError::new(
            StoreErrorKind::Corrupt,
            format!("contact document without ObjectId `_id`: {err}"),
        )
    })?;
    let text = |key: &str| document.get_str(key).ok().map(str::to_owned);

    Ok(Contact {
        id: ContactId::from(id),
        name: text("name"),
        email: text("email"),
        address: text("address"),
        phone: text("phone"),
        favorite: document.get_bool("favorite").unwrap_or(false),
    })
}

fn classify(err: mongodb::error::Error) -> StoreError {
    let kind = match err.kind.as_ref() {
        ErrorKind::DnsResolve { .. } | ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
            StoreErrorKind::Connection
        }
        ErrorKind::Command(command) if command.code == MAX_TIME_MS_EXPIRED => {
            StoreErrorKind::Timeout
        }
        _ => StoreErrorKind::Backend,
    };
    if kind == StoreErrorKind::Connection {
        warn!("event=store_request module=store backend=mongodb status=error error_kind=connection");
    }
    StoreError::with_source(kind, err)
}

#[cfg(test)]
mod tests {
    use super::{classify, fields_document, filter_document, MAX_TIME_MS_EXPIRED};
    use crate::model::contact::ContactFields;
    use crate::store::{ContactFilter, StoreErrorKind};
    use mongodb::bson::{doc, Bson, Document};
    use mongodb::error::{CommandError, Error, ErrorKind};
    use mongodb::options::ClientOptions;
    use mongodb::Client;

    #[test]
    fn content_filter_requires_absent_fields_to_be_missing() {
        let filter = filter_document(&ContactFilter::Content(ContactFields {
            name: Some("Ann".to_string()),
            favorite: Some(true),
            ..ContactFields::default()
        }));
        assert_eq!(filter.get_str("name").unwrap(), "Ann");
        assert_eq!(
            filter.get_document("email").unwrap(),
            &doc! { "$exists": false }
        );
        assert!(!filter.contains_key("favorite"));
    }

    #[test]
    fn no_match_filter_targets_null_id() {
        let filter = filter_document(&ContactFilter::NoMatch);
        assert_eq!(filter.get("_id"), Some(&Bson::Null));
    }

    #[test]
    fn set_document_contains_only_supplied_fields() {
        let set = fields_document(&ContactFields {
            phone: Some("555".to_string()),
            ..ContactFields::default()
        });
        assert_eq!(set, doc! { "phone": "555" });
    }

    fn command_error(code: i32) -> Error {
        let command: CommandError = mongodb::bson::from_document(doc! {
            "code": code,
            "codeName": "MaxTimeMSExpired",
            "errmsg": "operation exceeded time limit",
        })
        .unwrap();
        Error::from(ErrorKind::Command(command))
    }

    #[test]
    fn exceeded_max_time_is_a_timeout() {
        let err = classify(command_error(MAX_TIME_MS_EXPIRED));
        assert_eq!(err.kind(), StoreErrorKind::Timeout);

        let err = classify(command_error(11000));
        assert_eq!(err.kind(), StoreErrorKind::Backend);
    }

    #[test]
    fn io_failure_is_a_connection_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = classify(Error::from(io));
        assert_eq!(err.kind(), StoreErrorKind::Connection);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        let client = Client::with_uri_str(
            "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=100&connectTimeoutMS=100",
        )
        .await
        .unwrap();
        let err = client
            .database("contacts")
            .collection::<Document>("contacts")
            .find_one(doc! {})
            .await
            .unwrap_err();

        assert!(matches!(*err.kind, ErrorKind::ServerSelection { .. }), "got {err}");
        assert_eq!(classify(err).kind(), StoreErrorKind::Connection);
    }

    #[tokio::test]
    async fn unresolvable_srv_host_is_a_connection_error() {
        let err = ClientOptions::parse("mongodb+srv://contacts.example.invalid")
            .await
            .unwrap_err();

        assert!(matches!(*err.kind, ErrorKind::DnsResolve { .. }), "got {err}");
        assert_eq!(classify(err).kind(), StoreErrorKind::Connection);
    }
}
