// src/database/models.rs
use chrono::{DateTime, Utc};

use crate::models::{Plate, VehicleRecord};

#[derive(Debug, sqlx::FromRow)]
pub(super) struct VehicleRow {
    id: i64,
    plat_nomor: String,
    driver_name: Option<String>,
    latitude: f64,
    longitude: f64,
    speed: f64,
    last_update: DateTime<Utc>,
}

impl TryFrom<VehicleRow> for VehicleRecord {
    type Error = sqlx::Error;

    fn try_from(row: VehicleRow) -> Result<Self, Self::Error> {
        let plate = Plate::try_from(row.plat_nomor).map_err(|e| sqlx::Error::ColumnDecode {
            index: "plat_nomor".to_string(),
            source: Box::new(e),
        })?;

        Ok(VehicleRecord {
            id: row.id,
            plate,
            driver_name: row.driver_name,
            latitude: row.latitude,
            longitude: row.longitude,
            speed: row.speed,
            last_update: row.last_update,
        })
    }
}
