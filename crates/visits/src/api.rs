//! Wire types of the visit-persistence, appointment and report services.
//!
//! The server is inconsistent about field naming, records are accepted in both camelCase and snake_case and
//! normalized here, once, into the domain types.

use chrono::{DateTime, Utc};
use serde_with::{serde_as, DisplayFromStr};
use thiserror::Error;

use crate::appointment::AppointmentStatus;
use crate::id::{AppointmentId, CustomerId, TechnicianId, VisitId};
use crate::observation::{
    BaitStationReadings, LightTrapReadings, MulticatchReadings, SnapTrapReadings, StationObservation, StationReadings,
    TrapReadings,
};
use crate::station::{Access, Condition, Consumption, StationId, StationType, YesNo};
use crate::technician::Technician;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Station record is missing a technician and no default was supplied. station: {0}")]
    MissingTechnician(StationId),
}

/// Flat representation of a [`StationObservation`].
///
/// Fields that do not apply to the station type, or that are unset, are serialized as `null`.
#[serde_as]
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    #[serde(alias = "station_id")]
    pub station_id: StationId,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(alias = "station_type", alias = "type")]
    pub station_type: StationType,
    #[serde(default)]
    pub access: Option<Access>,

    #[serde(default)]
    pub consumption: Option<Consumption>,
    #[serde(default, alias = "bait_type")]
    pub bait_type: Option<String>,
    #[serde(default, alias = "dosage_grams", alias = "dosage")]
    pub dosage_grams: Option<u32>,
    #[serde(default)]
    pub condition: Option<Condition>,

    #[serde(default)]
    pub capture: Option<YesNo>,
    #[serde(default, alias = "rodents_captured")]
    pub rodents_captured: Option<u32>,
    #[serde(default)]
    pub triggered: Option<YesNo>,
    #[serde(default, alias = "replaced_surface")]
    pub replaced_surface: Option<YesNo>,

    #[serde(default)]
    pub mosquitoes: Option<u32>,
    #[serde(default)]
    pub lepidoptera: Option<u32>,
    #[serde(default)]
    pub drosophila: Option<u32>,
    #[serde(default)]
    pub flies: Option<u32>,
    #[serde(default)]
    pub others: Option<Vec<String>>,
    #[serde(default, alias = "replace_bulb")]
    pub replace_bulb: Option<YesNo>,

    #[serde(default, alias = "technician_id")]
    pub technician_id: Option<TechnicianId>,
    #[serde(default, alias = "technician_name")]
    pub technician_name: Option<String>,
    #[serde(default, alias = "visit_id")]
    pub visit_id: Option<VisitId>,
    #[serde(default, alias = "created_at")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&StationObservation> for StationRecord {
    fn from(observation: &StationObservation) -> Self {
        let mut record = StationRecord {
            station_id: observation.station_id,
            station_type: observation.station_type(),
            access: Some(observation.access),
            consumption: None,
            bait_type: None,
            dosage_grams: None,
            condition: observation.readings.condition(),
            capture: None,
            rodents_captured: None,
            triggered: None,
            replaced_surface: None,
            mosquitoes: None,
            lepidoptera: None,
            drosophila: None,
            flies: None,
            others: None,
            replace_bulb: None,
            technician_id: Some(observation.technician_id.clone()),
            technician_name: Some(observation.technician_name.clone()),
            visit_id: observation.visit_id.clone(),
            timestamp: Some(observation.timestamp),
        };

        match &observation.readings {
            StationReadings::BaitStation(readings) => {
                record.consumption = readings.consumption;
                record.bait_type.clone_from(&readings.bait_type);
                record.dosage_grams = readings.dosage_grams;
            }
            StationReadings::Multicatch(readings) => {
                record.capture = readings.trap.capture;
                record.rodents_captured = readings.trap.rodents_captured;
                record.replaced_surface = readings.replaced_surface;
            }
            StationReadings::SnapTrap(readings) => {
                record.capture = readings.trap.capture;
                record.rodents_captured = readings.trap.rodents_captured;
                record.triggered = readings.triggered;
            }
            StationReadings::LightTrap(readings) => {
                record.mosquitoes = readings.mosquitoes;
                record.lepidoptera = readings.lepidoptera;
                record.drosophila = readings.drosophila;
                record.flies = readings.flies;
                record.others.clone_from(&readings.others);
                record.replace_bulb = readings.replace_bulb;
            }
        }

        record
    }
}

/// Values used for fields a server record omits.
#[derive(Debug, Clone)]
pub struct RecordDefaults<'a> {
    pub technician: Option<&'a Technician>,
    pub visit_id: Option<&'a VisitId>,
    pub timestamp: DateTime<Utc>,
}

impl StationRecord {
    /// Records without an explicit `access` are treated as accessible when they carry any reading.
    pub fn into_observation(self, defaults: &RecordDefaults) -> Result<StationObservation, RecordError> {
        let trap = TrapReadings {
            capture: self.capture,
            rodents_captured: self.rodents_captured,
            condition: self.condition,
        };

        let readings = match self.station_type {
            StationType::BaitStation => StationReadings::BaitStation(BaitStationReadings {
                consumption: self.consumption,
                bait_type: self.bait_type,
                dosage_grams: self.dosage_grams,
                condition: self.condition,
            }),
            StationType::Multicatch => StationReadings::Multicatch(MulticatchReadings {
                trap,
                replaced_surface: self.replaced_surface,
            }),
            StationType::SnapTrap => StationReadings::SnapTrap(SnapTrapReadings {
                trap,
                triggered: self.triggered,
            }),
            StationType::LightTrap => StationReadings::LightTrap(LightTrapReadings {
                mosquitoes: self.mosquitoes,
                lepidoptera: self.lepidoptera,
                drosophila: self.drosophila,
                flies: self.flies,
                others: self.others,
                replace_bulb: self.replace_bulb,
                condition: self.condition,
            }),
        };

        let access = self
            .access
            .unwrap_or_else(|| YesNo::from(readings.has_data()));

        // an inaccessible station never carries readings, whatever the server sent
        let readings = match access {
            YesNo::No => StationReadings::empty(self.station_type),
            YesNo::Yes => readings,
        };

        let (technician_id, technician_name) = match (self.technician_id, defaults.technician) {
            (Some(id), _) => (id, self.technician_name.unwrap_or_default()),
            (None, Some(technician)) => (
                technician.id.clone(),
                self.technician_name
                    .unwrap_or_else(|| technician.name.clone()),
            ),
            (None, None) => return Err(RecordError::MissingTechnician(self.station_id)),
        };

        Ok(StationObservation {
            station_id: self.station_id,
            access,
            readings,
            technician_id,
            technician_name,
            visit_id: self
                .visit_id
                .or_else(|| defaults.visit_id.cloned()),
            timestamp: self.timestamp.unwrap_or(defaults.timestamp),
        })
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisitSummary {
    pub customer_id: CustomerId,
    pub technician_id: TechnicianId,
    pub technician_name: String,
    pub appointment_id: Option<AppointmentId>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub work_type: String,
    /// Present when amending an already persisted visit.
    pub visit_id: Option<VisitId>,
    pub notes: String,
}

/// Payload of `submitVisit`.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisitSubmission {
    pub visit: VisitSummary,
    pub stations: Vec<StationRecord>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVisitResponse {
    pub success: bool,
    #[serde(default, alias = "visit_id")]
    pub visit_id: Option<VisitId>,
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

/// Payload of `updateAppointmentStatus`.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentStatusUpdate {
    pub id: AppointmentId,
    pub status: AppointmentStatus,
    pub visit_id: Option<VisitId>,
}

/// Plain success/failure acknowledgement.
#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
pub struct Acknowledgement {
    pub success: bool,
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisitIdLookupResponse {
    #[serde(default, alias = "visit_id", alias = "id")]
    pub visit_id: Option<VisitId>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisitReport {
    #[serde(alias = "visit_id", alias = "id")]
    pub visit_id: VisitId,
    #[serde(default, alias = "customer_id")]
    pub customer_id: Option<CustomerId>,
    #[serde(default, alias = "technician_name")]
    pub technician_name: Option<String>,
    #[serde(default, alias = "work_type")]
    pub work_type: Option<String>,
    #[serde(default, alias = "start_time")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "end_time")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "duration_ms")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub stations: Vec<StationRecord>,
}

impl VisitReport {
    /// Maps every station record field-for-field, see [`StationRecord::into_observation`].
    pub fn observations(&self, defaults: &RecordDefaults) -> Result<Vec<StationObservation>, RecordError> {
        self.stations
            .iter()
            .cloned()
            .map(|record| record.into_observation(defaults))
            .collect()
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
pub struct VisitReportResponse {
    pub success: bool,
    #[serde(default)]
    pub report: Option<VisitReport>,
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

#[cfg(test)]
mod api_tests {
    use chrono::TimeZone;

    use super::*;

    fn defaults_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn snake_and_camel_case_records_are_equivalent() {
        // given
        let snake = r#"{"station_id": 4, "station_type": "snap_trap", "access": "Yes", "capture": "Yes",
            "rodents_captured": 2, "triggered": "Yes", "condition": "Functional", "technician_id": "T9",
            "technician_name": "Nine", "visit_id": 100}"#;
        let camel = r#"{"stationId": 4, "stationType": "SnapTrap", "access": "Yes", "capture": "Yes",
            "rodentsCaptured": 2, "triggered": "Yes", "condition": "Functional", "technicianId": "T9",
            "technicianName": "Nine", "visitId": "100"}"#;

        // when
        let snake: StationRecord = serde_json::from_str(snake).unwrap();
        let camel: StationRecord = serde_json::from_str(camel).unwrap();

        // then
        assert_eq!(snake, camel);
        assert_eq!(snake.rodents_captured, Some(2));
    }

    #[test]
    fn record_maps_into_observation() {
        // given
        let record: StationRecord = serde_json::from_str(
            r#"{"station_id": 1, "type": "bait_station", "access": "Yes", "consumption": "75%",
                "bait_type": "Rodenticide-X", "dosage": 20, "condition": "Functional"}"#,
        )
        .unwrap();
        let technician = Technician {
            id: TechnicianId::new("T1").unwrap(),
            name: "Tech One".to_string(),
        };
        let visit_id = VisitId::new("V100").unwrap();
        let defaults = RecordDefaults {
            technician: Some(&technician),
            visit_id: Some(&visit_id),
            timestamp: defaults_time(),
        };

        // when
        let observation = record.into_observation(&defaults).unwrap();

        // then
        assert_eq!(observation.station_type(), StationType::BaitStation);
        assert_eq!(observation.technician_id, technician.id);
        assert_eq!(observation.visit_id, Some(visit_id));
        assert_eq!(observation.timestamp, defaults_time());
        assert_eq!(
            observation.readings,
            StationReadings::BaitStation(BaitStationReadings {
                consumption: Some(Consumption::ThreeQuarters),
                bait_type: Some("Rodenticide-X".to_string()),
                dosage_grams: Some(20),
                condition: Some(Condition::Functional),
            })
        );
    }

    #[test]
    fn record_without_access_or_data_is_inaccessible() {
        let record: StationRecord = serde_json::from_str(
            r#"{"stationId": 2, "stationType": "LightTrap", "technicianId": "T1"}"#,
        )
        .unwrap();
        let defaults = RecordDefaults {
            technician: None,
            visit_id: None,
            timestamp: defaults_time(),
        };

        let observation = record.into_observation(&defaults).unwrap();

        assert_eq!(observation.access, YesNo::No);
        assert_eq!(observation.readings, StationReadings::empty(StationType::LightTrap));
    }

    #[test]
    fn record_without_technician_needs_a_default() {
        let record: StationRecord = serde_json::from_str(r#"{"stationId": 2, "stationType": "LightTrap"}"#).unwrap();
        let defaults = RecordDefaults {
            technician: None,
            visit_id: None,
            timestamp: defaults_time(),
        };

        assert_eq!(
            record.into_observation(&defaults),
            Err(RecordError::MissingTechnician(StationId::new(2).unwrap()))
        );
    }

    #[test]
    fn inaccessible_observation_serializes_nulls() {
        // given
        let record = StationRecord::from(&StationObservation {
            station_id: StationId::new(1).unwrap(),
            access: YesNo::No,
            readings: StationReadings::empty(StationType::BaitStation),
            technician_id: TechnicianId::new("T1").unwrap(),
            technician_name: "Tech One".to_string(),
            visit_id: None,
            timestamp: defaults_time(),
        });

        // when
        let json = serde_json::to_value(&record).unwrap();

        // then
        assert_eq!(json["access"], "No");
        assert_eq!(json["stationType"], "BaitStation");
        for field in ["consumption", "baitType", "dosageGrams", "condition", "visitId"] {
            assert!(json[field].is_null(), "{} should be null", field);
            assert!(json.get(field).is_some(), "{} should be present", field);
        }
    }

    #[test]
    fn submit_response_accepts_numeric_visit_id() {
        let response: SubmitVisitResponse = serde_json::from_str(r#"{"success": true, "visit_id": 100}"#).unwrap();

        assert_eq!(response.visit_id, Some(VisitId::new("100").unwrap()));
        assert_eq!(response.error, None);
    }
}
