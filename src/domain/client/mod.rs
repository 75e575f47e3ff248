//! Client domain
//!
//! Third-party organizations that own API keys.

mod entity;
mod repository;
mod validation;

pub use entity::{Client, ClientId};
pub use repository::ClientRepository;
pub use validation::{validate_client_name, validate_contact_email, ClientValidationError};
