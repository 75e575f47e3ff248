//! Scope capability tokens
//!
//! A scope is a string of the form `resource:action`, with the wildcard
//! forms `resource:*` and `*`. An endpoint requires exactly one scope;
//! AND/OR composition of required scopes is deliberately unsupported.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing a scope string
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeParseError {
    #[error("scope cannot be empty")]
    Empty,

    #[error("scope must be 'resource:action', 'resource:*' or '*'")]
    MissingSeparator,

    #[error("scope resource cannot be empty")]
    EmptyResource,

    #[error("scope action cannot be empty")]
    EmptyAction,

    #[error("scope contains invalid character: '{0}'")]
    InvalidCharacter(char),

    #[error("scope exceeds maximum length of {0} characters")]
    TooLong(usize),
}

const MAX_SCOPE_LENGTH: usize = 100;
const GLOBAL_WILDCARD: &str = "*";

/// A validated scope string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope(String);

impl Scope {
    pub fn new(scope: impl Into<String>) -> Result<Self, ScopeParseError> {
        let scope = scope.into();
        validate_scope(&scope)?;
        Ok(Self(scope))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the global `*` wildcard
    pub fn is_global_wildcard(&self) -> bool {
        self.0 == GLOBAL_WILDCARD
    }

    /// The resource part, or `*` for the global wildcard
    pub fn resource(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    /// Whether this granted scope covers the required scope
    ///
    /// True iff it equals the required scope verbatim, is `resource:*` for
    /// the same resource, or is the global `*`.
    pub fn grants(&self, required: &Scope) -> bool {
        if self.is_global_wildcard() {
            return true;
        }

        if self.0 == required.0 {
            return true;
        }

        match self.0.split_once(':') {
            Some((resource, "*")) => resource == required.resource(),
            _ => false,
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = ScopeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.0
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a granted scope set permits the required scope
pub fn scope_set_allows(granted: &[Scope], required: &Scope) -> bool {
    granted.iter().any(|scope| scope.grants(required))
}

fn validate_scope(scope: &str) -> Result<(), ScopeParseError> {
    if scope.is_empty() {
        return Err(ScopeParseError::Empty);
    }

    if scope.len() > MAX_SCOPE_LENGTH {
        return Err(ScopeParseError::TooLong(MAX_SCOPE_LENGTH));
    }

    if scope == GLOBAL_WILDCARD {
        return Ok(());
    }

    let (resource, action) = scope
        .split_once(':')
        .ok_or(ScopeParseError::MissingSeparator)?;

    if resource.is_empty() {
        return Err(ScopeParseError::EmptyResource);
    }

    if action.is_empty() {
        return Err(ScopeParseError::EmptyAction);
    }

    for part in [resource, action] {
        if part == "*" {
            continue;
        }

        for c in part.chars() {
            if !c.is_ascii_alphanumeric() && c != '-' && c != '_' {
                return Err(ScopeParseError::InvalidCharacter(c));
            }
        }
    }

    Ok(())
}
