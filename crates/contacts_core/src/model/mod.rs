//! Contact domain model.
//!
//! # Responsibility
//! - Define the stored `Contact` shape and its opaque `ContactId`.
//! - Define the untrusted input shape (`ContactPayload`) and the sparse
//!   field record (`ContactFields`) every write path is normalized into.
//!
//! # Invariants
//! - Identifiers are generated by the store and never reused.
//! - A stored contact always carries a literal boolean `favorite`.

pub mod contact;
pub mod id;
