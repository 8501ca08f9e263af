use async_trait::async_trait;
use common::types::Record;

use crate::errors::ServiceError;

/// Trait abstraction for record persistence.
/// Implementations serialize their own operations; callers never lock.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one record, assigning `_id` when absent, and return it as stored.
    async fn insert(&self, record: Record) -> Result<Record, ServiceError>;

    /// Records whose top-level fields equal every entry of `filter`, in insertion order.
    async fn find(&self, filter: &Record) -> Result<Vec<Record>, ServiceError>;

    /// Every stored record, in insertion order.
    async fn find_all(&self) -> Result<Vec<Record>, ServiceError> {
        self.find(&Record::new()).await
    }

    async fn count(&self) -> Result<usize, ServiceError>;
}
