use naptrap_lib::{destination::DestinationId, store::StoreError};

pub mod database;
mod data_manager;

pub use data_manager::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_FILE: &str = "naptrap.db";

#[derive(Debug, thiserror::Error)]
pub enum DataManagerError {
    #[error("database error: {0}")]
    Database(String),
    #[error("data directory error: {0}")]
    DataDir(String),
    #[error("no destination with id {0}")]
    NotFound(DestinationId),
    #[error("invalid destination: {0}")]
    Validation(String),
}

impl From<DataManagerError> for StoreError {
    fn from(err: DataManagerError) -> Self {
        match err {
            DataManagerError::NotFound(id) => StoreError::NotFound(id),
            DataManagerError::Validation(msg) => StoreError::Invalid(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}
