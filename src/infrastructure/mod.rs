//! Infrastructure layer - concrete implementations of the domain contracts

pub mod api_key;
pub mod auth;
pub mod client;
pub mod logging;
pub mod storage;
pub mod usage;
