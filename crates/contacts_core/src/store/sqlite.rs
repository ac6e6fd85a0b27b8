//! SQLite-backed document collection.
//!
//! # Responsibility
//! - Store contacts as JSON bodies in the shared `documents` table.
//! - Translate `ContactFilter` into SQL, evaluating name patterns in process.
//!
//! # Invariants
//! - Every document query is scoped to this collection's name.
//! - Read-modify-write operations run inside one immediate transaction.
//! - Iteration order is insertion order.

use super::{
    ContactCollection, ContactFilter, StoreError, StoreErrorKind, StoreResult, UpdateOptions,
};
use crate::db::{classify_sqlite, open_db};
use crate::model::contact::{Contact, ContactFields};
use crate::model::id::ContactId;
use async_trait::async_trait;
use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Compiled-program size cap for caller-supplied name patterns.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Contact collection stored in a SQLite document table.
///
/// Requests run on tokio's blocking pool, so a runtime with the blocking
/// pool is required; no timer driver is used. An `UpdateOptions::max_time`
/// budget is checked after the connection lock is acquired and again before
/// commit. A request past its budget fails with `StoreErrorKind::Timeout`
/// and leaves the collection unchanged. The wait for the lock itself is not
/// interrupted.
#[derive(Clone)]
pub struct SqliteContactCollection {
    conn: Arc<Mutex<Connection>>,
    name: String,
}

impl SqliteContactCollection {
    /// Wraps a migrated connection (see `db::open_db`).
    pub fn new(conn: Connection, collection: impl Into<String>) -> Self {
        Self::from_shared(Arc::new(Mutex::new(conn)), collection)
    }

    /// Opens (or creates) the document database at `path` and binds `collection`.
    ///
    /// Bootstrap failures carry the same kinds as request failures: an
    /// unopenable path is `Connection`, a non-database file is `Corrupt`.
    pub fn open(path: impl AsRef<Path>, collection: impl Into<String>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?, collection))
    }

    /// Shares one connection between several collections.
    pub fn from_shared(conn: Arc<Mutex<Connection>>, collection: impl Into<String>) -> Self {
        Self {
            conn,
            name: collection.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of documents currently stored in this collection.
    pub async fn count(&self) -> StoreResult<u64> {
        self.run("count", |conn, collection| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1;",
                [collection],
                |row| row.get(0),
            )?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
        .await
    }

    /// Runs `op` against the connection on tokio's blocking pool.
    async fn run<T, F>(&self, op: &'static str, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> StoreResult<T> + Send + 'static,
    {
        let started_at = Instant::now();
        let conn = Arc::clone(&self.conn);
        let collection = self.name.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| {
                StoreError::new(StoreErrorKind::Backend, "sqlite connection lock poisoned")
            })?;
            f(&mut *guard, &collection)
        })
        .await
        .map_err(|err| StoreError::with_source(StoreErrorKind::Backend, err))
        .and_then(|inner| inner);

        match &result {
            Ok(_) => debug!(
                "event=store_{op} module=store backend=sqlite status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=store_{op} module=store backend=sqlite status=error error_kind={} duration_ms={}",
                err.kind().as_str(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }
}

#[async_trait]
impl ContactCollection for SqliteContactCollection {
    async fn find(&self, filter: &ContactFilter) -> StoreResult<Vec<Contact>> {
        let query = CompiledFilter::compile(filter)?;
        self.run("find", move |conn, collection| {
            select_contacts(conn, collection, &query, None)
        })
        .await
    }

    async fn find_one(&self, filter: &ContactFilter) -> StoreResult<Option<Contact>> {
        let query = CompiledFilter::compile(filter)?;
        self.run("find_one", move |conn, collection| {
            Ok(select_contacts(conn, collection, &query, Some(1))?
                .into_iter()
                .next())
        })
        .await
    }

    async fn find_one_and_update(
        &self,
        filter: &ContactFilter,
        set: &ContactFields,
        options: UpdateOptions,
    ) -> StoreResult<Option<Contact>> {
        let query = CompiledFilter::compile(filter)?;
        let (seed_id, seed) = filter.upsert_seed();
        let set = set.clone();
        let deadline = options.max_time.map(Deadline::after);
        self.run("find_one_and_update", move |conn, collection| {
            check_deadline(deadline)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let existing = select_contacts(&tx, collection, &query, Some(1))?
                .into_iter()
                .next();

            let updated = match existing {
                Some(mut contact) => {
                    set.apply_to(&mut contact);
                    write_body(&tx, collection, &contact)?;
                    Some(contact)
                }
                None if options.upsert => {
                    let mut contact =
                        Contact::from_fields(seed_id.unwrap_or_else(ContactId::new), &seed);
                    set.apply_to(&mut contact);
                    insert_contact(&tx, collection, &contact)?;
                    Some(contact)
                }
                None => None,
            };

            // Dropping `tx` on a missed deadline rolls the write back.
            check_deadline(deadline)?;
            tx.commit()?;
            Ok(updated)
        })
        .await
    }

    async fn find_one_and_delete(&self, filter: &ContactFilter) -> StoreResult<Option<Contact>> {
        let query = CompiledFilter::compile(filter)?;
        self.run("find_one_and_delete", move |conn, collection| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let removed = select_contacts(&tx, collection, &query, Some(1))?
                .into_iter()
                .next();
            if let Some(contact) = &removed {
                delete_by_id(&tx, collection, contact.id)?;
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn delete_many(&self, filter: &ContactFilter) -> StoreResult<u64> {
        let query = CompiledFilter::compile(filter)?;
        self.run("delete_many", move |conn, collection| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let removed = if query.pattern.is_some() {
                let mut count = 0;
                for contact in select_contacts(&tx, collection, &query, None)? {
                    count += delete_by_id(&tx, collection, contact.id)?;
                }
                count
            } else {
                let mut bind_values = vec![Value::Text(collection.to_string())];
                bind_values.extend(query.bind_values.iter().cloned());
                tx.execute(
                    &format!(
                        "DELETE FROM documents WHERE collection = ? AND ({});",
                        query.where_sql
                    ),
                    params_from_iter(bind_values),
                )? as u64
            };
            tx.commit()?;
            Ok(removed)
        })
        .await
    }
}

/// Execution budget of one request, fixed when the request is issued.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    budget: Duration,
    expires_at: Instant,
}

impl Deadline {
    fn after(budget: Duration) -> Self {
        Self {
            budget,
            expires_at: Instant::now() + budget,
        }
    }
}

fn check_deadline(deadline: Option<Deadline>) -> StoreResult<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline.expires_at => Err(StoreError::new(
            StoreErrorKind::Timeout,
            format!("update exceeded {}ms", deadline.budget.as_millis()),
        )),
        _ => Ok(()),
    }
}

/// SQL translation of one `ContactFilter`.
struct CompiledFilter {
    where_sql: String,
    bind_values: Vec<Value>,
    /// Name pattern applied to rows after the SQL predicate.
    pattern: Option<Regex>,
}

impl CompiledFilter {
    fn compile(filter: &ContactFilter) -> StoreResult<Self> {
        let mut compiled = Self {
            where_sql: "1 = 1".to_string(),
            bind_values: Vec::new(),
            pattern: None,
        };

        match filter {
            ContactFilter::All => {}
            ContactFilter::NoMatch => compiled.where_sql = "0 = 1".to_string(),
            ContactFilter::Id(id) => {
                compiled.where_sql = "id = ?".to_string();
                compiled.bind_values.push(Value::Text(id.to_hex()));
            }
            ContactFilter::Content(fields) => {
                let columns = [
                    ("$.name", &fields.name),
                    ("$.email", &fields.email),
                    ("$.address", &fields.address),
                    ("$.phone", &fields.phone),
                ];
                compiled.where_sql = columns
                    .iter()
                    .map(|(path, _)| format!("json_extract(body, '{path}') IS ?"))
                    .collect::<Vec<_>>()
                    .join(" AND ");
                compiled.bind_values = columns
                    .iter()
                    .map(|(_, value)| match value {
                        Some(text) => Value::Text(text.clone()),
                        None => Value::Null,
                    })
                    .collect();
            }
            ContactFilter::NamePattern {
                pattern,
                case_insensitive,
            } => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(*case_insensitive)
                    .size_limit(PATTERN_SIZE_LIMIT)
                    .build()
                    .map_err(|err| StoreError::with_source(StoreErrorKind::InvalidPattern, err))?;
                compiled.where_sql = "json_type(body, '$.name') = 'text'".to_string();
                compiled.pattern = Some(regex);
            }
            ContactFilter::Favorite(favorite) => {
                compiled.where_sql = "json_extract(body, '$.favorite') = ?".to_string();
                compiled.bind_values.push(Value::Integer(i64::from(*favorite)));
            }
        }

        Ok(compiled)
    }

    fn accepts(&self, contact: &Contact) -> bool {
        match &self.pattern {
            Some(regex) => contact
                .name
                .as_deref()
                .is_some_and(|name| regex.is_match(name)),
            None => true,
        }
    }
}

fn select_contacts(
    conn: &Connection,
    collection: &str,
    query: &CompiledFilter,
    limit: Option<usize>,
) -> StoreResult<Vec<Contact>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, body FROM documents
         WHERE collection = ? AND ({})
         ORDER BY rowid ASC;",
        query.where_sql
    ))?;

    let mut bind_values = vec![Value::Text(collection.to_string())];
    bind_values.extend(query.bind_values.iter().cloned());

    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut contacts = Vec::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get("id")?;
        let body: String = row.get("body")?;
        let contact = decode_contact(&id, &body)?;
        if !query.accepts(&contact) {
            continue;
        }
        contacts.push(contact);
        if limit.is_some_and(|max| contacts.len() >= max) {
            break;
        }
    }
    Ok(contacts)
}

fn insert_contact(conn: &Connection, collection: &str, contact: &Contact) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3);",
        params![collection, contact.id.to_hex(), encode_body(contact)?],
    )?;
    Ok(())
}

fn write_body(conn: &Connection, collection: &str, contact: &Contact) -> StoreResult<()> {
    conn.execute(
        "UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2;",
        params![collection, contact.id.to_hex(), encode_body(contact)?],
    )?;
    Ok(())
}

fn delete_by_id(conn: &Connection, collection: &str, id: ContactId) -> StoreResult<u64> {
    let removed = conn.execute(
        "DELETE FROM documents WHERE collection = ?1 AND id = ?2;",
        params![collection, id.to_hex()],
    )?;
    Ok(removed as u64)
}

fn encode_body(contact: &Contact) -> StoreResult<String> {
    serde_json::to_string(&contact.fields())
        .map_err(|err| StoreError::with_source(StoreErrorKind::Corrupt, err))
}

fn decode_contact(id: &str, body: &str) -> StoreResult<Contact> {
    let id = ContactId::parse(id).ok_or_else(|| {
        StoreError::new(
            StoreErrorKind::Corrupt,
            format!("invalid document id `{id}` in documents.id"),
        )
    })?;
    let fields: ContactFields = serde_json::from_str(body)
        .map_err(|err| StoreError::with_source(StoreErrorKind::Corrupt, err))?;
    Ok(Contact::from_fields(id, &fields))
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::with_source(classify_sqlite(&value), value)
    }
}

#[cfg(test)]
mod tests {
    use super::{check_deadline, CompiledFilter, Deadline, SqliteContactCollection};
    use crate::model::contact::ContactFields;
    use crate::store::{ContactFilter, StoreError, StoreErrorKind};
    use std::time::Duration;

    #[test]
    fn unopenable_path_maps_to_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("contacts.db");

        let err = rusqlite::Connection::open(&path).err().unwrap();
        assert_eq!(StoreError::from(err).kind(), StoreErrorKind::Connection);

        let err = SqliteContactCollection::open(&path, "contacts").err().unwrap();
        assert_eq!(err.kind(), StoreErrorKind::Connection);
    }

    #[test]
    fn non_database_file_maps_to_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-db.txt");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let err = SqliteContactCollection::open(&path, "contacts").err().unwrap();
        assert_eq!(err.kind(), StoreErrorKind::Corrupt);
    }

    #[test]
    fn expired_deadline_is_a_timeout() {
        assert!(check_deadline(None).is_ok());
        assert!(check_deadline(Some(Deadline::after(Duration::from_secs(60)))).is_ok());

        let err = check_deadline(Some(Deadline::after(Duration::ZERO))).unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Timeout);
        assert_eq!(err.message(), "update exceeded 0ms");
    }

    #[test]
    fn content_filter_binds_absent_fields_as_null() {
        let compiled = CompiledFilter::compile(&ContactFilter::Content(ContactFields {
            name: Some("Ann".to_string()),
            ..ContactFields::default()
        }))
        .unwrap();
        assert_eq!(compiled.bind_values.len(), 4);
        assert_eq!(compiled.where_sql.matches("IS ?").count(), 4);
        assert!(compiled.pattern.is_none());
    }

    #[test]
    fn invalid_name_pattern_is_classified() {
        let err = CompiledFilter::compile(&ContactFilter::NamePattern {
            pattern: "(unclosed".to_string(),
            case_insensitive: true,
        })
        .err()
        .unwrap();
        assert_eq!(err.kind(), StoreErrorKind::InvalidPattern);
    }
}
