//! Data models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TrackerError;

/// Vehicle registration plate
///
/// Natural key of a vehicle. Surrounding whitespace is not significant and
/// an empty plate is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Plate(String);

impl TryFrom<&str> for Plate {
    type Error = TrackerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TrackerError::Validation(
                "plat_nomor must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for Plate {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl Plate {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last known state of one vehicle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRecord {
    /// Surrogate identifier assigned on first insert
    pub id: i64,
    #[serde(rename = "plat_nomor")]
    pub plate: Plate,
    /// Only ever set when the vehicle is seeded
    pub driver_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    /// Time of the most recent write, assigned by the server
    pub last_update: DateTime<Utc>,
}

/// Position report as submitted by a vehicle
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PositionReport {
    #[serde(rename = "plat_nomor")]
    pub plate: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
}

impl PositionReport {
    pub fn new(plate: impl Into<String>, latitude: f64, longitude: f64, speed: f64) -> Self {
        Self {
            plate: plate.into(),
            latitude,
            longitude,
            speed,
        }
    }

    /// Check coordinate and speed ranges, returning the normalized plate.
    pub fn validate(&self) -> Result<Plate, TrackerError> {
        let plate = Plate::try_from(self.plate.as_str())?;

        check_range("latitude", self.latitude, -90.0, 90.0)?;
        check_range("longitude", self.longitude, -180.0, 180.0)?;
        check_finite("speed", self.speed)?;
        if self.speed < 0.0 {
            return Err(TrackerError::Validation(
                "speed must not be negative".to_string(),
            ));
        }

        Ok(plate)
    }
}

fn check_finite(field: &str, value: f64) -> Result<(), TrackerError> {
    if !value.is_finite() {
        return Err(TrackerError::Validation(format!(
            "{field} must be a finite number"
        )));
    }
    Ok(())
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), TrackerError> {
    check_finite(field, value)?;
    if value < min || value > max {
        return Err(TrackerError::Validation(format!(
            "{field} {value} out of range [{min}, {max}]"
        )));
    }
    Ok(())
}

/// Payload pushed to viewers after a successful report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionUpdate {
    #[serde(rename = "plat_nomor")]
    pub plate: Plate,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
}

/// Events sent over a viewer connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    PositionUpdate(PositionUpdate),
}

/// Vehicle inserted at startup unless its plate already exists
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedVehicle {
    #[serde(rename = "plat_nomor")]
    pub plate: String,
    pub driver_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plate_is_trimmed() {
        let plate = Plate::try_from("  B 1234 ABC ").unwrap();
        assert_eq!(plate.as_str(), "B 1234 ABC");
    }

    #[test]
    fn empty_plate_is_rejected() {
        assert!(matches!(
            Plate::try_from("   "),
            Err(TrackerError::Validation(_))
        ));
    }

    #[test]
    fn parse_position_report() {
        let payload = r#"{
            "plat_nomor": "B 9999 ZZZ",
            "latitude": -6.0,
            "longitude": 106.0,
            "speed": 10
        }"#;

        let report: PositionReport = serde_json::from_str(payload).unwrap();
        assert_eq!(report, PositionReport::new("B 9999 ZZZ", -6.0, 106.0, 10.0));
    }

    #[test]
    fn validate_accepts_boundaries() {
        let report = PositionReport::new("B 1", -90.0, 180.0, 0.0);
        assert_eq!(report.validate().unwrap().as_str(), "B 1");
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let cases = [
            PositionReport::new("B 1", 90.5, 0.0, 0.0),
            PositionReport::new("B 1", 0.0, -180.1, 0.0),
            PositionReport::new("B 1", 0.0, 0.0, -1.0),
            PositionReport::new("B 1", f64::NAN, 0.0, 0.0),
            PositionReport::new("", 0.0, 0.0, 0.0),
        ];

        for report in cases {
            assert!(
                matches!(report.validate(), Err(TrackerError::Validation(_))),
                "{report:?} should be rejected"
            );
        }
    }

    #[test]
    fn validate_reports_readable_messages() {
        let err = PositionReport::new("B 1", 0.0, 0.0, -1.0)
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "speed must not be negative");

        let err = PositionReport::new("B 1", 0.0, 0.0, f64::INFINITY)
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "speed must be a finite number");

        let err = PositionReport::new("B 1", 91.0, 0.0, 0.0)
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "latitude 91 out of range [-90, 90]");
    }

    #[test]
    fn serialize_position_update_event() {
        let event = ServerEvent::PositionUpdate(PositionUpdate {
            plate: Plate::try_from("B 1234 ABC").unwrap(),
            latitude: -6.2088,
            longitude: 106.8456,
            speed: 40.0,
        });

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "position_update",
                "data": {
                    "plat_nomor": "B 1234 ABC",
                    "latitude": -6.2088,
                    "longitude": 106.8456,
                    "speed": 40.0
                }
            })
        );
    }
}
