use std::path::{Path, PathBuf};

use async_trait::async_trait;
use naptrap_lib::{destination::{valid_coordinates, Destination, DestinationId, NewDestination}, store::{DestinationStore, StoreError}};

use crate::{database::db::DestinationDatabase, DataManagerError, DATABASE_FILE, DATA_DIR};

#[derive(Clone)]
pub struct DataManager {
    pub(crate) database: DestinationDatabase,
}

/// The public interface for all destination data management.
impl DataManager {
    /// Opens the database in the project's default data directory.
    pub async fn start() -> Result<Self, DataManagerError> {
        let root: PathBuf = project_root::get_project_root()
            .map_err(|e| DataManagerError::DataDir(format!("Failed to locate project root: {e}")))?;
        Self::start_in(&root.join(DATA_DIR)).await
    }

    pub async fn start_in(data_dir: &Path) -> Result<Self, DataManagerError> {
        // Create data dir if it doesn't exist
        if !data_dir.exists() {
            tokio::fs::create_dir_all(data_dir).await
                .map_err(|e| DataManagerError::DataDir(format!("Failed to create data directory {:?}: {e}", data_dir)))?;
        }

        let database = DestinationDatabase::connect(&data_dir.join(DATABASE_FILE)).await?;

        tracing::debug!("Destination store opened in {:?}", data_dir);

        Ok(DataManager {
            database,
        })
    }

    pub async fn in_memory() -> Result<Self, DataManagerError> {
        Ok(DataManager {
            database: DestinationDatabase::connect_in_memory().await?,
        })
    }

    pub async fn add_destination(&self, destination: NewDestination) -> Result<Destination, DataManagerError> {
        let destination = validate(destination)?;
        let destination = self.database.insert_destination(destination).await?;
        tracing::info!("Added destination {} ({})", destination.id, destination.name);
        Ok(destination)
    }

    pub async fn update_destination(&self, id: DestinationId, destination: NewDestination) -> Result<Destination, DataManagerError> {
        let destination = validate(destination)?;
        self.database.update_destination(id, &destination).await?;
        self.database.get_destination(id).await
    }

    pub async fn rename_destination(&self, id: DestinationId, name: String) -> Result<Destination, DataManagerError> {
        let current = self.database.get_destination(id).await?;
        self.update_destination(id, NewDestination::new(name, current.latitude, current.longitude)).await
    }

    pub async fn get_destination(&self, id: DestinationId) -> Result<Destination, DataManagerError> {
        self.database.get_destination(id).await
    }

    pub async fn get_destinations(&self) -> Result<Vec<Destination>, DataManagerError> {
        self.database.get_destinations().await
    }

    pub async fn get_tracked_destinations(&self) -> Result<Vec<Destination>, DataManagerError> {
        self.database.get_tracked_destinations().await
    }

    pub async fn set_tracked(&self, id: DestinationId, is_tracked: bool) -> Result<(), DataManagerError> {
        self.database.set_tracked(id, is_tracked).await
    }

    pub async fn remove_destination(&self, id: DestinationId) -> Result<(), DataManagerError> {
        self.database.delete_destination(id).await?;
        tracing::info!("Removed destination {}", id);
        Ok(())
    }
}

/// Trims the name and checks that it is non-empty and that the coordinates are on the globe.
fn validate(mut destination: NewDestination) -> Result<NewDestination, DataManagerError> {
    destination.name = destination.name.trim().to_string();

    if destination.name.is_empty() {
        return Err(DataManagerError::Validation("name must not be empty".into()));
    }
    if !valid_coordinates(destination.latitude, destination.longitude) {
        return Err(DataManagerError::Validation(format!(
            "coordinates ({}, {}) are out of range",
            destination.latitude, destination.longitude
        )));
    }

    Ok(destination)
}

#[async_trait]
impl DestinationStore for DataManager {
    async fn list(&self) -> Result<Vec<Destination>, StoreError> {
        Ok(self.get_destinations().await?)
    }

    async fn list_tracked(&self) -> Result<Vec<Destination>, StoreError> {
        Ok(self.get_tracked_destinations().await?)
    }

    async fn set_tracked(&self, id: DestinationId, is_tracked: bool) -> Result<(), StoreError> {
        Ok(DataManager::set_tracked(self, id, is_tracked).await?)
    }

    async fn delete(&self, id: DestinationId) -> Result<(), StoreError> {
        Ok(self.remove_destination(id).await?)
    }

    async fn insert(&self, destination: NewDestination) -> Result<Destination, StoreError> {
        Ok(self.add_destination(destination).await?)
    }
}
