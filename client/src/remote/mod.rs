//! The remote profile table.

mod http;

pub use http::{HttpRemoteStore, RetryPolicy};

use crate::error::RemoteError;
use async_trait::async_trait;
use lumina_engine::RemoteRecord;

/// A hosted table of profile records keyed by profile id.
///
/// Implementations must be safe to call concurrently; the coordinator
/// upserts every profile of a document at once.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert or replace the record with the same id.
    async fn upsert(&self, record: &RemoteRecord) -> Result<(), RemoteError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<RemoteRecord>, RemoteError>;

    /// Records whose profile PIN matches.
    async fn get_by_pin(&self, pin: &str) -> Result<Vec<RemoteRecord>, RemoteError>;

    async fn get_all(&self) -> Result<Vec<RemoteRecord>, RemoteError>;
}
