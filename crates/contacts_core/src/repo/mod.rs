//! Repository layer over one contact collection.
//!
//! # Responsibility
//! - Shape contact payloads and queries for the document store.
//! - Translate store results into semantic outcomes (`NotFound`,
//!   `InvalidArgument`, `Connection`).
//!
//! # Invariants
//! - Malformed identifiers never reach the store as keys.
//! - Record absence is a normal return value except for `update`.

pub mod contact_repo;
