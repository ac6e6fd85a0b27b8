//! Opaque contact identifier.
//!
//! # Invariants
//! - The textual form is exactly 24 hex characters (12 raw bytes).
//! - Validation never panics; malformed text is reported, not thrown.

use bson::oid::ObjectId;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

/// Store-assigned identifier of one contact document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(ObjectId);

impl ContactId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// Returns whether `value` is a well-formed identifier.
    pub fn is_valid(value: &str) -> bool {
        Self::parse(value).is_some()
    }

    /// Parses a textual identifier, returning `None` when malformed.
    pub fn parse(value: &str) -> Option<Self> {
        ObjectId::parse_str(value).ok().map(Self)
    }

    /// Lowercase hex rendering used for storage keys and serialization.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    pub fn as_object_id(&self) -> ObjectId {
        self.0
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ObjectId> for ContactId {
    fn from(value: ObjectId) -> Self {
        Self(value)
    }
}

impl Display for ContactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl Serialize for ContactId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContactId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| D::Error::custom(format!("invalid contact id `{text}`")))
    }
}
