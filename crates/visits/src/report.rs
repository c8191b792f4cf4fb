//! Service report assembly, shared by the local session and fetched visit reports.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use strum::IntoEnumIterator;

use crate::api::{RecordDefaults, RecordError, StationRecord, VisitReport};
use crate::id::{CustomerId, VisitId};
use crate::observation::{StationObservation, StationReadings};
use crate::reference::ReferenceList;
use crate::session::VisitSession;
use crate::station::{StationType, YesNo};

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StationCounts {
    pub total: usize,
    pub with_data: usize,
    pub no_access: usize,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BaitSafetyInfo {
    pub bait_type: String,
    pub active_ingredient: Option<String>,
    pub antidote: Option<String>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportHeader {
    pub visit_id: Option<VisitId>,
    pub customer_id: Option<CustomerId>,
    pub technician_name: Option<String>,
    pub work_type: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceReport {
    pub header: ReportHeader,
    /// Only station types with at least one station are present, in canonical type order.
    pub counts: IndexMap<StationType, StationCounts>,
    pub stations: Vec<StationRecord>,
    pub bait_safety: Vec<BaitSafetyInfo>,
    pub notes: String,
}

impl ServiceReport {
    pub fn build(
        header: ReportHeader,
        observations: &[StationObservation],
        notes: impl Into<String>,
        chemicals: &ReferenceList,
    ) -> Self {
        let counts = StationType::iter()
            .filter_map(|station_type| {
                let of_type = observations
                    .iter()
                    .filter(|observation| observation.station_type() == station_type);
                let counts = of_type.fold(StationCounts::default(), |mut counts, observation| {
                    counts.total += 1;
                    match observation.access {
                        YesNo::No => counts.no_access += 1,
                        YesNo::Yes if observation.readings.has_data() => counts.with_data += 1,
                        YesNo::Yes => {}
                    }
                    counts
                });
                (counts.total > 0).then_some((station_type, counts))
            })
            .collect();

        let bait_types: IndexSet<&str> = observations
            .iter()
            .filter_map(|observation| match &observation.readings {
                StationReadings::BaitStation(readings) => readings.bait_type.as_deref(),
                _ => None,
            })
            .collect();

        let bait_safety = bait_types
            .into_iter()
            .map(|bait_type| {
                let chemical = chemicals.find(bait_type);
                BaitSafetyInfo {
                    bait_type: bait_type.to_string(),
                    active_ingredient: chemical.and_then(|chemical| chemical.active_ingredient.clone()),
                    antidote: chemical.and_then(|chemical| chemical.antidote.clone()),
                }
            })
            .collect();

        Self {
            header,
            counts,
            stations: observations
                .iter()
                .map(StationRecord::from)
                .collect(),
            bait_safety,
            notes: notes.into(),
        }
    }

    pub fn from_session(session: &VisitSession, chemicals: &ReferenceList, now: DateTime<Utc>) -> Self {
        let timer = session.timer();
        let header = ReportHeader {
            visit_id: session.visit_id().cloned(),
            customer_id: Some(session.customer_id().clone()),
            technician_name: Some(session.technician().name.clone()),
            work_type: Some(session.service_type().to_string()),
            start_time: timer.started_at,
            end_time: None,
            duration_ms: timer.started_at.map(|_| timer.elapsed_at(now)),
        };

        Self::build(header, &session.observations().qualifying(), session.notes(), chemicals)
    }

    pub fn from_visit_report(
        report: &VisitReport,
        chemicals: &ReferenceList,
        defaults: &RecordDefaults,
    ) -> Result<Self, RecordError> {
        let header = ReportHeader {
            visit_id: Some(report.visit_id.clone()),
            customer_id: report.customer_id.clone(),
            technician_name: report.technician_name.clone(),
            work_type: report.work_type.clone(),
            start_time: report.start_time,
            end_time: report.end_time,
            duration_ms: report.duration_ms,
        };
        let observations = report.observations(defaults)?;

        Ok(Self::build(
            header,
            &observations,
            report.notes.clone().unwrap_or_default(),
            chemicals,
        ))
    }
}

fn optional<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl Display for ServiceReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Visit: {}", optional(&self.header.visit_id))?;
        writeln!(f, "Customer: {}", optional(&self.header.customer_id))?;
        writeln!(f, "Technician: {}", optional(&self.header.technician_name))?;
        writeln!(f, "Work type: {}", optional(&self.header.work_type))?;
        if let Some(duration_ms) = self.header.duration_ms {
            writeln!(f, "Duration: {}s", duration_ms / 1000)?;
        }

        for (station_type, counts) in &self.counts {
            writeln!(
                f,
                "{}: total {}, with data {}, no access {}",
                station_type, counts.total, counts.with_data, counts.no_access
            )?;
        }

        for info in &self.bait_safety {
            writeln!(
                f,
                "Bait '{}': active ingredient {}, antidote {}",
                info.bait_type,
                optional(&info.active_ingredient),
                optional(&info.antidote)
            )?;
        }

        if !self.notes.is_empty() {
            writeln!(f, "Notes: {}", self.notes)?;
        }
        Ok(())
    }
}
