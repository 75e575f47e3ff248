//! Client entity
//!
//! A client is the third-party organization that owns API keys. Clients are
//! soft-deleted so that their keys stay auditable; the validation pipeline
//! treats keys of a deactivated or deleted client as inactive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Client identifier, generated at creation time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::invalid_id("client id cannot be empty"));
        }
        Ok(Self(id))
    }

    /// Generate a fresh unique ID
    pub fn generate() -> Self {
        Self(format!("client-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier
    id: ClientId,
    /// Display name, unique among non-deleted clients
    name: String,
    /// Contact email for the owning organization
    contact_email: String,
    /// Optional contact phone
    contact_phone: Option<String>,
    /// Whether the client may authenticate
    active: bool,
    /// Soft-delete marker; deleted clients are invisible to listings
    deleted: bool,
    /// Creation timestamp
    created_at: DateTime<Utc>,
    /// Last update timestamp
    updated_at: DateTime<Utc>,
}

impl Client {
    /// Create a new active client
    pub fn new(id: ClientId, name: impl Into<String>, contact_email: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id,
            name: name.into(),
            contact_email: contact_email.into(),
            contact_phone: None,
            active: true,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_contact_phone(mut self, phone: impl Into<String>) -> Self {
        self.contact_phone = Some(phone.into());
        self
    }

    // Getters

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact_email(&self) -> &str {
        &self.contact_email
    }

    pub fn contact_phone(&self) -> Option<&str> {
        self.contact_phone.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Whether keys owned by this client may validate
    pub fn is_usable(&self) -> bool {
        self.active && !self.deleted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Mutators

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn set_contact_email(&mut self, email: impl Into<String>) {
        self.contact_email = email.into();
        self.touch();
    }

    pub fn set_contact_phone(&mut self, phone: Option<String>) {
        self.contact_phone = phone;
        self.touch();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.touch();
    }

    pub fn activate(&mut self) {
        if !self.deleted {
            self.active = true;
            self.touch();
        }
    }

    /// Soft-delete; keys are not cascade-deleted but stop validating
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.active = false;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
