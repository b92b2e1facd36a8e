use async_trait::async_trait;

use crate::destination::{Destination, DestinationId, NewDestination};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no destination with id {0}")]
    NotFound(DestinationId),
    #[error("invalid destination: {0}")]
    Invalid(String),
    #[error("store backend failed: {0}")]
    Backend(String),
}

/// The narrow view of destination storage that the tracking core needs.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// All destinations, ordered by id.
    async fn list(&self) -> Result<Vec<Destination>, StoreError>;

    /// Destinations whose tracked flag is set, ordered by id.
    async fn list_tracked(&self) -> Result<Vec<Destination>, StoreError> {
        let mut destinations = self.list().await?;
        destinations.retain(|dest| dest.is_tracked);
        Ok(destinations)
    }

    async fn set_tracked(&self, id: DestinationId, is_tracked: bool) -> Result<(), StoreError>;

    async fn delete(&self, id: DestinationId) -> Result<(), StoreError>;

    async fn insert(&self, destination: NewDestination) -> Result<Destination, StoreError>;
}
