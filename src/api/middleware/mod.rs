//! Request middleware

mod auth;

pub use auth::{require_scope, AuthContext, ScopedAuth};
