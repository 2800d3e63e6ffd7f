//! API key domain

mod entity;
mod repository;

pub use entity::{ApiKeyId, ApiKeyRecord};
pub use repository::ApiKeyRepository;
