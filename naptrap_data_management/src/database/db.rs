use std::{path::Path, str::FromStr};

use const_format::concatcp;
use naptrap_lib::destination::{Destination, DestinationId, NewDestination};
use sqlx::{query, query_as, sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Executor, Pool, Sqlite, SqlitePool};

use crate::DataManagerError;

use super::constants::*;

const SELECT_DESTINATIONS: &str = concatcp!("SELECT ", ID, ", ", NAME, ", ", LATITUDE, ", ", LONGITUDE, ", ", IS_TRACKED, " FROM ", DESTINATIONS_TABLE_NAME);

#[derive(Clone)]
pub struct DestinationDatabase {
    pool: Pool<Sqlite>,
}

impl DestinationDatabase {
    pub async fn connect(path: &Path) -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await
            .map_err(|e| DataManagerError::Database(format!("Failed to connect to database {:?}: {e}", path)))?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    /// A private database that lives as long as this handle. Used by tests and dry runs.
    pub async fn connect_in_memory() -> Result<Self, DataManagerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DataManagerError::Database(format!("Invalid in-memory options: {e}")))?;

        // Every connection to :memory: gets its own database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options).await
            .map_err(|e| DataManagerError::Database(format!("Failed to open in-memory database: {e}")))?;

        let db = Self {
            pool
        };

        db.init().await?;

        Ok(db)
    }

    pub async fn init(&self) -> Result<(), DataManagerError> {
        self.pool.execute(concatcp!("
            CREATE TABLE IF NOT EXISTS ", DESTINATIONS_TABLE_NAME, "(",
                ID,         " INTEGER PRIMARY KEY AUTOINCREMENT,",
                NAME,       " TEXT NOT NULL,",
                LATITUDE,   " REAL NOT NULL,",
                LONGITUDE,  " REAL NOT NULL,",
                IS_TRACKED, " BOOLEAN NOT NULL DEFAULT 0
            )")).await
            .map_err(|e| DataManagerError::Database(format!("Failed to create tables: {e}")))
            .map(|_| ())
    }

    pub async fn insert_destination(&self, destination: NewDestination) -> Result<Destination, DataManagerError> {
        let id = query_as::<_, (i64,)>(concatcp!("
            INSERT INTO ", DESTINATIONS_TABLE_NAME, "(",
            ID, ", ", NAME, ", ", LATITUDE, ", ", LONGITUDE, ", ", IS_TRACKED, ")
            VALUES (NULL, ?1, ?2, ?3, 0) RETURNING ", ID))
                .bind(&destination.name)
                .bind(destination.latitude)
                .bind(destination.longitude)
                .fetch_one(&self.pool).await
                .map_err(|e| DataManagerError::Database(format!("Failed to insert destination: {e}")))
                .map(|row| row.0)?;

        Ok(destination.into_destination(id))
    }

    pub async fn get_destinations(&self) -> Result<Vec<Destination>, DataManagerError> {
        query_as::<_, Destination>(concatcp!(SELECT_DESTINATIONS, " ORDER BY ", ID))
            .fetch_all(&self.pool).await
            .map_err(|e| DataManagerError::Database(format!("Failed to get destinations: {e}")))
    }

    pub async fn get_tracked_destinations(&self) -> Result<Vec<Destination>, DataManagerError> {
        query_as::<_, Destination>(concatcp!(SELECT_DESTINATIONS, " WHERE ", IS_TRACKED, " = 1 ORDER BY ", ID))
            .fetch_all(&self.pool).await
            .map_err(|e| DataManagerError::Database(format!("Failed to get tracked destinations: {e}")))
    }

    pub async fn get_destination(&self, id: DestinationId) -> Result<Destination, DataManagerError> {
        query_as::<_, Destination>(concatcp!(SELECT_DESTINATIONS, " WHERE ", ID, " = ?1"))
            .bind(id)
            .fetch_optional(&self.pool).await
            .map_err(|e| DataManagerError::Database(format!("Failed to get destination {id}: {e}")))?
            .ok_or(DataManagerError::NotFound(id))
    }

    pub async fn set_tracked(&self, id: DestinationId, is_tracked: bool) -> Result<(), DataManagerError> {
        let result = query(concatcp!("UPDATE ", DESTINATIONS_TABLE_NAME, " SET ", IS_TRACKED, " = ?1 WHERE ", ID, " = ?2"))
            .bind(is_tracked)
            .bind(id)
            .execute(&self.pool).await
            .map_err(|e| DataManagerError::Database(format!("Failed to set tracking for {id}: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(DataManagerError::NotFound(id));
        }
        Ok(())
    }

    pub async fn update_destination(&self, id: DestinationId, destination: &NewDestination) -> Result<(), DataManagerError> {
        let result = query(concatcp!("UPDATE ", DESTINATIONS_TABLE_NAME, " SET ", NAME, " = ?1, ", LATITUDE, " = ?2, ", LONGITUDE, " = ?3 WHERE ", ID, " = ?4"))
            .bind(&destination.name)
            .bind(destination.latitude)
            .bind(destination.longitude)
            .bind(id)
            .execute(&self.pool).await
            .map_err(|e| DataManagerError::Database(format!("Failed to update destination {id}: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(DataManagerError::NotFound(id));
        }
        Ok(())
    }

    pub async fn delete_destination(&self, id: DestinationId) -> Result<(), DataManagerError> {
        let result = query(concatcp!("DELETE FROM ", DESTINATIONS_TABLE_NAME, " WHERE ", ID, " = ?1"))
            .bind(id)
            .execute(&self.pool).await
            .map_err(|e| DataManagerError::Database(format!("Failed to delete destination {id}: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(DataManagerError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_list() {
        let db = DestinationDatabase::connect_in_memory().await.unwrap();

        let home = db.insert_destination(NewDestination::new("Home", 55.6761, 12.5683)).await.unwrap();
        let work = db.insert_destination(NewDestination::new("Work", 55.7, 12.6)).await.unwrap();

        assert_ne!(home.id, work.id);
        assert!(!home.is_tracked);

        let all = db.get_destinations().await.unwrap();
        assert_eq!(all, vec![home.clone(), work]);
        assert_eq!(db.get_destination(home.id).await.unwrap(), home);
    }

    #[tokio::test]
    async fn tracking_flag() {
        let db = DestinationDatabase::connect_in_memory().await.unwrap();
        let a = db.insert_destination(NewDestination::new("A", 1., 1.)).await.unwrap();
        let b = db.insert_destination(NewDestination::new("B", 2., 2.)).await.unwrap();

        db.set_tracked(b.id, true).await.unwrap();

        let tracked = db.get_tracked_destinations().await.unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].id, b.id);
        assert!(tracked[0].is_tracked);

        db.set_tracked(b.id, false).await.unwrap();
        assert!(db.get_tracked_destinations().await.unwrap().is_empty());
        assert!(!db.get_destination(a.id).await.unwrap().is_tracked);
    }

    #[tokio::test]
    async fn unknown_ids() {
        let db = DestinationDatabase::connect_in_memory().await.unwrap();

        assert!(matches!(db.set_tracked(42, true).await, Err(DataManagerError::NotFound(42))));
        assert!(matches!(db.delete_destination(42).await, Err(DataManagerError::NotFound(42))));
        assert!(matches!(db.get_destination(42).await, Err(DataManagerError::NotFound(42))));
    }

    #[tokio::test]
    async fn update_and_delete() {
        let db = DestinationDatabase::connect_in_memory().await.unwrap();
        let dest = db.insert_destination(NewDestination::new("Old", 1., 1.)).await.unwrap();

        db.update_destination(dest.id, &NewDestination::new("New", 3., 4.)).await.unwrap();
        let updated = db.get_destination(dest.id).await.unwrap();
        assert_eq!((updated.name.as_str(), updated.latitude, updated.longitude), ("New", 3., 4.));

        db.delete_destination(dest.id).await.unwrap();
        assert!(db.get_destinations().await.unwrap().is_empty());
    }
}
