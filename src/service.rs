//! Position reporting and snapshot queries

use std::sync::Arc;

use tracing::{debug, error};

use crate::{
    database::Database,
    errors::TrackerError,
    hub::Hub,
    models::{PositionReport, PositionUpdate, VehicleRecord},
};

/// Stores position reports and announces them to viewers
#[derive(Clone)]
pub struct UpdateService {
    database: Database,
    hub: Arc<Hub>,
}

impl UpdateService {
    pub fn new(database: Database, hub: Arc<Hub>) -> Self {
        Self { database, hub }
    }

    /// Validate and store a report, then publish it.
    ///
    /// Nothing is published when validation or storage fails. Publishing
    /// itself cannot fail the report.
    pub async fn report_position(
        &self,
        report: PositionReport,
    ) -> Result<VehicleRecord, TrackerError> {
        let plate = report.validate()?;

        let record = self
            .database
            .upsert(&plate, report.latitude, report.longitude, report.speed)
            .await
            .map_err(|e| {
                error!("Failed to store position for {}: {}", plate, e);
                e
            })?;

        let update = PositionUpdate {
            plate,
            latitude: report.latitude,
            longitude: report.longitude,
            speed: report.speed,
        };
        let delivery = self.hub.publish(&update).await;
        debug!(
            "Position update for {} delivered to {} viewers, dropped for {}",
            update.plate, delivery.delivered, delivery.dropped
        );

        Ok(record)
    }
}

/// Read-only access to current vehicle state
#[derive(Clone)]
pub struct QueryService {
    database: Database,
}

impl QueryService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn snapshot(&self) -> Result<Vec<VehicleRecord>, TrackerError> {
        self.database.list_all().await
    }
}
