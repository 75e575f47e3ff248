//! Client infrastructure: storage and management

mod repository;
mod service;

pub use repository::InMemoryClientRepository;
pub use service::{ClientService, CreateClient, UpdateClient};
