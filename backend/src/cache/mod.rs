//! Key-value cache collaborator.
//!
//! The pipeline only needs get/set-with-ttl/delete; anything that offers
//! that contract (an in-process map, Redis, ...) can sit behind [`Cache`].

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

pub use memory::InMemoryCache;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration);

    async fn delete(&self, key: &str);
}
