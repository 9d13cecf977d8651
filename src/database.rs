// src/database.rs
mod models;

use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{error, info};

use crate::{
    config::DatabaseConfig,
    errors::TrackerError,
    models::{Plate, PositionReport, SeedVehicle, VehicleRecord},
};
use models::VehicleRow;

const SELECT_COLUMNS: &str =
    "id, plat_nomor, driver_name, latitude, longitude, speed, last_update";

/// Vehicle position storage backed by SQLite
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create the database file and apply migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, TrackerError> {
        config.validate()?;

        info!(
            "Opening database: path={}, max_connections={}, busy_timeout={:?}",
            config.path.display(),
            config.max_connections,
            config.busy_timeout
        );

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to open database: {}", e);
                e
            })?;

        Self::new(pool).await
    }

    /// Wrap an existing pool, applying migrations
    pub async fn new(pool: SqlitePool) -> Result<Self, TrackerError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert a vehicle or overwrite its position, speed and timestamp.
    ///
    /// The driver name of an existing vehicle is left untouched. Concurrent
    /// upserts for the same plate resolve to whichever statement commits last.
    pub async fn upsert(
        &self,
        plate: &Plate,
        latitude: f64,
        longitude: f64,
        speed: f64,
    ) -> Result<VehicleRecord, TrackerError> {
        let query = format!(
            "INSERT INTO vehicles (plat_nomor, latitude, longitude, speed, last_update)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(plat_nomor) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                speed = excluded.speed,
                last_update = excluded.last_update
            RETURNING {SELECT_COLUMNS}"
        );

        let row: VehicleRow = sqlx::query_as(&query)
            .bind(plate.as_str())
            .bind(latitude)
            .bind(longitude)
            .bind(speed)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(VehicleRecord::try_from(row)?)
    }

    /// All stored vehicles, ordered by id
    pub async fn list_all(&self) -> Result<Vec<VehicleRecord>, TrackerError> {
        let rows: Vec<VehicleRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM vehicles ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;

        let records = rows
            .into_iter()
            .map(VehicleRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Insert sample vehicles whose plates are not yet stored.
    ///
    /// Every vehicle is validated like a position report before anything is
    /// written. Returns the number of vehicles inserted.
    pub async fn seed(&self, vehicles: &[SeedVehicle]) -> Result<u64, TrackerError> {
        let validated = vehicles
            .iter()
            .map(|vehicle| {
                PositionReport::new(
                    vehicle.plate.as_str(),
                    vehicle.latitude,
                    vehicle.longitude,
                    vehicle.speed,
                )
                .validate()
                .map(|plate| (plate, vehicle))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut inserted = 0;

        for (plate, vehicle) in validated {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO vehicles (
                    plat_nomor, driver_name, latitude, longitude, speed, last_update
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(plate.as_str())
            .bind(vehicle.driver_name.as_deref())
            .bind(vehicle.latitude)
            .bind(vehicle.longitude)
            .bind(vehicle.speed)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

            inserted += result.rows_affected();
        }

        info!("Seeded {} of {} sample vehicles", inserted, vehicles.len());
        Ok(inserted)
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
