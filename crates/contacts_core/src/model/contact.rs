//! Contact record, input payload and sparse field set.
//!
//! # Responsibility
//! - Project untrusted input onto the five recognized attributes.
//! - Keep absent attributes absent instead of storing empty values.
//!
//! # Invariants
//! - `favorite` coerces to `true` only from a literal JSON `true`.
//! - Unrecognized input fields never reach the store.

use super::id::ContactId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untrusted contact input as received from an API layer.
///
/// Every attribute is optional. `favorite` keeps the raw JSON value so that
/// truthy non-boolean input can be told apart from a real `true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub favorite: Option<Value>,
}

impl ContactPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into());
        self
    }

    pub fn email(mut self, value: impl Into<String>) -> Self {
        self.email = Some(value.into());
        self
    }

    pub fn address(mut self, value: impl Into<String>) -> Self {
        self.address = Some(value.into());
        self
    }

    pub fn phone(mut self, value: impl Into<String>) -> Self {
        self.phone = Some(value.into());
        self
    }

    pub fn favorite(mut self, value: impl Into<Value>) -> Self {
        self.favorite = Some(value.into());
        self
    }
}

/// Sparse contact record: only supplied attributes are `Some`.
///
/// Used as the normalized write shape (create/update) and as the exact
/// content key for find-or-insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
}

impl ContactFields {
    /// Projects a payload onto the recognized attributes.
    pub fn from_payload(payload: &ContactPayload) -> Self {
        Self {
            name: payload.name.clone(),
            email: payload.email.clone(),
            address: payload.address.clone(),
            phone: payload.phone.clone(),
            favorite: payload.favorite.as_ref().map(coerce_favorite),
        }
    }

    /// Number of supplied attributes.
    pub fn len(&self) -> usize {
        [
            self.name.is_some(),
            self.email.is_some(),
            self.address.is_some(),
            self.phone.is_some(),
            self.favorite.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The four text attributes only; `favorite` is never part of the
    /// content identity of a contact.
    pub fn content_key(&self) -> Self {
        Self {
            favorite: None,
            ..self.clone()
        }
    }

    /// Returns whether `contact` carries exactly these text attributes,
    /// where an absent attribute here must also be absent on the contact.
    pub fn same_content_as(&self, contact: &Contact) -> bool {
        self.name == contact.name
            && self.email == contact.email
            && self.address == contact.address
            && self.phone == contact.phone
    }

    /// Overwrites the supplied attributes on `contact`, leaving others untouched.
    pub fn apply_to(&self, contact: &mut Contact) {
        if let Some(name) = &self.name {
            contact.name = Some(name.clone());
        }
        if let Some(email) = &self.email {
            contact.email = Some(email.clone());
        }
        if let Some(address) = &self.address {
            contact.address = Some(address.clone());
        }
        if let Some(phone) = &self.phone {
            contact.phone = Some(phone.clone());
        }
        if let Some(favorite) = self.favorite {
            contact.favorite = favorite;
        }
    }
}

impl From<&ContactPayload> for ContactFields {
    fn from(value: &ContactPayload) -> Self {
        Self::from_payload(value)
    }
}

/// Stored contact document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub favorite: bool,
}

impl Contact {
    /// Builds a contact from sparse fields; a missing favorite is `false`.
    pub fn from_fields(id: ContactId, fields: &ContactFields) -> Self {
        Self {
            id,
            name: fields.name.clone(),
            email: fields.email.clone(),
            address: fields.address.clone(),
            phone: fields.phone.clone(),
            favorite: fields.favorite.unwrap_or(false),
        }
    }

    /// Full field set of this contact (favorite always present).
    pub fn fields(&self) -> ContactFields {
        ContactFields {
            name: self.name.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            favorite: Some(self.favorite),
        }
    }
}

/// Strict boolean coercion: only JSON `true` counts as a favorite.
pub fn coerce_favorite(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}
