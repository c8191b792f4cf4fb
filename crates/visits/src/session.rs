//! The visit-session state machine.
//!
//! ```text
//! Idle -> WorkInProgress -> Saving(Finish) -> EditingCompleted <-> Saving(Update)
//!            |
//!            +-> Idle (cancel work)
//! ```
//!
//! The session owns its observations; they are only mutated through [`VisitSession::upsert`].

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use strum_macros::Display as StrumDisplay;
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{AppointmentStatusUpdate, StationRecord, VisitSubmission, VisitSummary};
use crate::appointment::{Appointment, AppointmentStatus, ServiceType};
use crate::completion::is_station_complete;
use crate::form::StationForm;
use crate::id::{AppointmentId, CustomerId, VisitId};
use crate::observation::{Observations, StationObservation};
use crate::reconcile::{work_type_label, SaveKind};
use crate::station::StationKey;
use crate::technician::Technician;
use crate::timer::VisitTimer;

#[derive(Debug, serde::Serialize, serde::Deserialize, StrumDisplay, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    WorkInProgress,
    Saving(SaveKind),
    EditingCompleted,
}

#[derive(Debug, StrumDisplay, Clone, Copy, PartialEq, Eq)]
pub enum StartWorkRejection {
    #[strum(to_string = "work can only be started from an appointment")]
    ManualSession,
    #[strum(to_string = "only myocide services are timed")]
    NotMyocide,
    #[strum(to_string = "the appointment is already completed")]
    AlreadyCompleted,
    #[strum(to_string = "the appointment was cancelled")]
    Cancelled,
    #[strum(to_string = "work has already started")]
    AlreadyStarted,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot start work, {0}")]
    StartWorkRejected(StartWorkRejection),
    #[error("Start work first")]
    StartWorkFirst,
    #[error("A save is already in progress")]
    Busy,
    #[error("There is no station data to save")]
    NoDataToSave,
    #[error("Please save the service first")]
    MissingVisitId,
    #[error("Unknown station. station: {0}")]
    UnknownStation(StationKey),
    #[error("Station is already complete, confirm to edit it. station: {0}")]
    ConfirmationRequired(StationKey),
    #[error("The report has already been generated for this save")]
    ReportAlreadyGenerated,
    #[error("Work is in progress")]
    WorkInProgress,
    #[error("Action not allowed. action: {action}, phase: {phase}")]
    NotAllowed { action: &'static str, phase: SessionPhase },
}

/// Where a session comes from, either an appointment or a manual visit.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionOrigin {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub appointment_id: Option<AppointmentId>,
    pub service_type: ServiceType,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub visit_id: Option<VisitId>,
    /// Stations of the customer's map, empty when the map is unknown.
    #[serde(default)]
    pub stations: Vec<StationKey>,
}

impl SessionOrigin {
    pub fn from_appointment(appointment: Appointment, stations: Vec<StationKey>) -> Self {
        Self {
            customer_id: appointment.customer_id,
            appointment_id: Some(appointment.id),
            service_type: appointment.service_type,
            status: appointment.status,
            visit_id: appointment.visit_id,
            stations,
        }
    }
}

/// What must be fetched before a reopened completed visit can be edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rehydration {
    LookupVisitId(AppointmentId),
    FetchReport(VisitId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisitSession {
    customer_id: CustomerId,
    technician: Technician,
    appointment_id: Option<AppointmentId>,
    service_type: ServiceType,
    status: AppointmentStatus,
    status_before_work: Option<AppointmentStatus>,
    visit_id: Option<VisitId>,
    observations: Observations,
    timer: VisitTimer,
    notes: String,
    phase: SessionPhase,
    editing_completed_visit: bool,
    report_generated: bool,
    stations: IndexSet<StationKey>,
}

impl VisitSession {
    pub fn open(origin: SessionOrigin, technician: Technician) -> Self {
        let completed = origin.status == AppointmentStatus::Completed;
        let phase = match completed {
            true => SessionPhase::EditingCompleted,
            false => SessionPhase::Idle,
        };
        info!(
            "Opened session. customer: {}, appointment: {:?}, status: {}, phase: {}",
            origin.customer_id, origin.appointment_id, origin.status, phase
        );

        Self {
            customer_id: origin.customer_id,
            technician,
            appointment_id: origin.appointment_id,
            service_type: origin.service_type,
            status: origin.status,
            status_before_work: None,
            visit_id: origin.visit_id,
            observations: Observations::default(),
            timer: VisitTimer::default(),
            notes: String::new(),
            phase,
            editing_completed_visit: completed,
            report_generated: false,
            stations: origin.stations.into_iter().collect(),
        }
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    pub fn technician(&self) -> &Technician {
        &self.technician
    }

    pub fn appointment_id(&self) -> Option<&AppointmentId> {
        self.appointment_id.as_ref()
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    pub fn visit_id(&self) -> Option<&VisitId> {
        self.visit_id.as_ref()
    }

    pub fn observations(&self) -> &Observations {
        &self.observations
    }

    pub fn timer(&self) -> &VisitTimer {
        &self.timer
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_editing_completed_visit(&self) -> bool {
        self.editing_completed_visit
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, SessionPhase::Saving(_))
    }

    pub fn is_work_in_progress(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::WorkInProgress | SessionPhase::Saving(SaveKind::Finish)
        )
    }

    pub fn stations(&self) -> impl Iterator<Item = &StationKey> {
        self.stations.iter()
    }

    pub fn is_station_complete(&self, key: &StationKey) -> bool {
        is_station_complete(key, &self.observations)
    }

    /// Known stations followed by any observed station missing from the map.
    pub fn station_statuses(&self) -> Vec<(StationKey, bool)> {
        let observed = self
            .observations
            .iter()
            .map(|observation| observation.key());
        self.stations
            .iter()
            .copied()
            .chain(observed.filter(|key| !self.stations.contains(key)))
            .map(|key| (key, self.is_station_complete(&key)))
            .collect()
    }

    pub fn set_stations(&mut self, stations: impl IntoIterator<Item = StationKey>) {
        self.stations = stations.into_iter().collect();
    }

    pub fn can_start_work(&self) -> Result<(), StartWorkRejection> {
        if self.appointment_id.is_none() {
            return Err(StartWorkRejection::ManualSession);
        }
        if self.service_type != ServiceType::Myocide {
            return Err(StartWorkRejection::NotMyocide);
        }
        match self.status {
            AppointmentStatus::Completed => return Err(StartWorkRejection::AlreadyCompleted),
            AppointmentStatus::Cancelled => return Err(StartWorkRejection::Cancelled),
            _ => {}
        }
        match self.phase {
            SessionPhase::Idle => Ok(()),
            SessionPhase::EditingCompleted => Err(StartWorkRejection::AlreadyCompleted),
            _ => Err(StartWorkRejection::AlreadyStarted),
        }
    }

    pub fn start_work(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.can_start_work()
            .map_err(SessionError::StartWorkRejected)?;

        self.observations.clear();
        self.timer.start(now);
        self.editing_completed_visit = false;
        self.status_before_work = Some(self.status);
        self.status = AppointmentStatus::InProgress;
        self.phase = SessionPhase::WorkInProgress;
        info!("Work started. customer: {}", self.customer_id);

        Ok(())
    }

    /// Discards the timer and every observation captured since work started.
    pub fn cancel_work(&mut self) -> Result<(), SessionError> {
        self.require_phase("cancel work", |phase| phase == SessionPhase::WorkInProgress)?;

        self.observations.clear();
        self.timer.reset();
        if let Some(status) = self.status_before_work.take() {
            self.status = status;
        }
        self.phase = match self.status {
            AppointmentStatus::Completed => SessionPhase::EditingCompleted,
            _ => SessionPhase::Idle,
        };
        info!("Work cancelled. customer: {}, phase: {}", self.customer_id, self.phase);

        Ok(())
    }

    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.timer.tick(now);
    }

    /// Opens the detail form of a station, pre-filled with its current observation.
    ///
    /// While work is in progress, reopening an already complete station needs `confirmed`.
    pub fn open_station_form(&self, key: StationKey, confirmed: bool) -> Result<StationForm, SessionError> {
        self.require_editable()?;
        self.require_known_station(&key)?;

        let complete = self.is_station_complete(&key);
        if self.phase == SessionPhase::WorkInProgress && complete && !confirmed {
            return Err(SessionError::ConfirmationRequired(key));
        }

        Ok(StationForm::open(key, self.observations.get(&key)))
    }

    /// Returns the observation that was replaced, if any.
    pub fn upsert(&mut self, mut observation: StationObservation) -> Result<Option<StationObservation>, SessionError> {
        self.require_editable()?;
        let key = observation.key();
        self.require_known_station(&key)?;

        if let Some(visit_id) = &self.visit_id {
            observation.visit_id = Some(visit_id.clone());
        }
        debug!("Upserting observation. station: {}", key);

        Ok(self.observations.upsert(observation))
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) -> Result<(), SessionError> {
        self.require_editable()?;
        self.notes = notes.into();
        Ok(())
    }

    /// Starts a save, returning the payload to submit.
    ///
    /// The session stays busy until [`Self::complete_save`] or [`Self::abort_save`].
    pub fn begin_save(&mut self, kind: SaveKind, now: DateTime<Utc>) -> Result<VisitSubmission, SessionError> {
        match (self.phase, kind) {
            (SessionPhase::Saving(_), _) => return Err(SessionError::Busy),
            (SessionPhase::WorkInProgress, SaveKind::Finish) => {}
            (SessionPhase::EditingCompleted, SaveKind::Update) => {
                if self.visit_id.is_none() {
                    return Err(SessionError::MissingVisitId);
                }
            }
            (SessionPhase::Idle, _) => return Err(SessionError::StartWorkFirst),
            (phase, SaveKind::Finish) => {
                return Err(SessionError::NotAllowed {
                    action: "finish and save",
                    phase,
                })
            }
            (phase, SaveKind::Update) => {
                return Err(SessionError::NotAllowed {
                    action: "update service",
                    phase,
                })
            }
        }

        let qualifying = self.observations.qualifying();
        if qualifying.is_empty() {
            return Err(SessionError::NoDataToSave);
        }

        let duration_ms = match kind {
            SaveKind::Finish => Some(self.timer.elapsed_at(now)),
            SaveKind::Update => None,
        };

        let submission = VisitSubmission {
            visit: VisitSummary {
                customer_id: self.customer_id.clone(),
                technician_id: self.technician.id.clone(),
                technician_name: self.technician.name.clone(),
                appointment_id: self.appointment_id.clone(),
                start_time: self.timer.started_at,
                end_time: now,
                duration_ms,
                work_type: work_type_label(self.service_type, kind),
                visit_id: self.visit_id.clone(),
                notes: self.notes.clone(),
            },
            stations: qualifying
                .iter()
                .map(StationRecord::from)
                .collect(),
        };

        info!(
            "Saving visit. kind: {:?}, stations: {}, visit: {:?}",
            kind,
            submission.stations.len(),
            self.visit_id
        );
        self.phase = SessionPhase::Saving(kind);

        Ok(submission)
    }

    /// Applies a successful save.
    ///
    /// Returns the best-effort appointment update to send, if the session came from an appointment.
    pub fn complete_save(
        &mut self,
        visit_id: VisitId,
        now: DateTime<Utc>,
    ) -> Result<Option<AppointmentStatusUpdate>, SessionError> {
        let SessionPhase::Saving(kind) = self.phase else {
            return Err(SessionError::NotAllowed {
                action: "complete save",
                phase: self.phase,
            });
        };

        let visit_id = self
            .visit_id
            .get_or_insert(visit_id)
            .clone();
        self.observations.assign_visit_id(&visit_id);

        if kind == SaveKind::Finish {
            self.timer.stop(now);
        }
        self.status = AppointmentStatus::Completed;
        self.status_before_work = None;
        self.editing_completed_visit = true;
        self.report_generated = false;
        self.phase = SessionPhase::EditingCompleted;
        info!("Visit saved. kind: {:?}, visit: {}", kind, visit_id);

        Ok(self.appointment_completion())
    }

    /// Leaves the session exactly as it was before [`Self::begin_save`].
    pub fn abort_save(&mut self) -> Result<SaveKind, SessionError> {
        let SessionPhase::Saving(kind) = self.phase else {
            return Err(SessionError::NotAllowed {
                action: "abort save",
                phase: self.phase,
            });
        };

        self.phase = match kind {
            SaveKind::Finish => SessionPhase::WorkInProgress,
            SaveKind::Update => SessionPhase::EditingCompleted,
        };
        info!("Save aborted. kind: {:?}", kind);

        Ok(kind)
    }

    pub fn appointment_completion(&self) -> Option<AppointmentStatusUpdate> {
        self.appointment_id
            .as_ref()
            .map(|id| AppointmentStatusUpdate {
                id: id.clone(),
                status: AppointmentStatus::Completed,
                visit_id: self.visit_id.clone(),
            })
    }

    /// Folds a re-fetched appointment status into the session.
    ///
    /// A completed session is never downgraded by a stale status.
    pub fn refresh_status(&mut self, status: AppointmentStatus, visit_id: Option<VisitId>) {
        if let Some(visit_id) = visit_id {
            self.backfill_visit_id(visit_id);
        }

        match status {
            AppointmentStatus::Completed => {
                self.status = AppointmentStatus::Completed;
                self.status_before_work = None;
                self.editing_completed_visit = true;
                if self.phase == SessionPhase::Idle {
                    self.phase = SessionPhase::EditingCompleted;
                    info!("Appointment completed elsewhere, editing. customer: {}", self.customer_id);
                }
            }
            _ if self.status == AppointmentStatus::Completed => {
                debug!("Ignoring status downgrade of a completed session. status: {}", status);
            }
            _ if self.phase == SessionPhase::Idle => self.status = status,
            _ => debug!("Ignoring status refresh while working. status: {}", status),
        }
    }

    /// Sets the visit id if the session does not have one yet.
    pub fn backfill_visit_id(&mut self, visit_id: VisitId) -> bool {
        if self.visit_id.is_some() {
            return false;
        }
        info!("Visit id backfilled. visit: {}", visit_id);
        self.observations.assign_visit_id(&visit_id);
        self.visit_id = Some(visit_id);
        true
    }

    /// What to fetch so that a reopened completed visit shows its observations.
    pub fn rehydration(&self) -> Option<Rehydration> {
        if self.phase != SessionPhase::EditingCompleted || !self.observations.is_empty() {
            return None;
        }
        match (&self.visit_id, &self.appointment_id) {
            (Some(visit_id), _) => Some(Rehydration::FetchReport(visit_id.clone())),
            (None, Some(appointment_id)) => Some(Rehydration::LookupVisitId(appointment_id.clone())),
            (None, None) => None,
        }
    }

    /// Loads observations fetched from the server, unless local ones exist already.
    pub fn rehydrate(&mut self, observations: Vec<StationObservation>, notes: Option<String>) -> bool {
        if self.rehydration().is_none() {
            debug!("Skipping rehydration, session already has observations or is not editing");
            return false;
        }
        self.observations = observations.into_iter().collect();
        if let Some(notes) = notes {
            self.notes = notes;
        }
        info!("Rehydrated session. stations: {}", self.observations.len());
        true
    }

    /// Marks the report as generated, once per save.
    pub fn generate_report(&mut self) -> Result<VisitId, SessionError> {
        let visit_id = self
            .visit_id
            .clone()
            .ok_or(SessionError::MissingVisitId)?;
        self.require_phase("generate report", |phase| phase == SessionPhase::EditingCompleted)?;
        if self.report_generated {
            return Err(SessionError::ReportAlreadyGenerated);
        }
        self.report_generated = true;
        Ok(visit_id)
    }

    pub fn can_generate_report(&self) -> bool {
        self.phase == SessionPhase::EditingCompleted && self.visit_id.is_some() && !self.report_generated
    }

    pub fn ensure_map_editable(&self) -> Result<(), SessionError> {
        match self.is_work_in_progress() {
            true => Err(SessionError::WorkInProgress),
            false => Ok(()),
        }
    }

    fn require_editable(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Idle => Err(SessionError::StartWorkFirst),
            SessionPhase::Saving(_) => Err(SessionError::Busy),
            SessionPhase::WorkInProgress => Ok(()),
            SessionPhase::EditingCompleted => match self.visit_id {
                Some(_) => Ok(()),
                None => Err(SessionError::MissingVisitId),
            },
        }
    }

    fn require_known_station(&self, key: &StationKey) -> Result<(), SessionError> {
        match self.stations.is_empty() || self.stations.contains(key) {
            true => Ok(()),
            false => Err(SessionError::UnknownStation(*key)),
        }
    }

    fn require_phase(&self, action: &'static str, allowed: impl Fn(SessionPhase) -> bool) -> Result<(), SessionError> {
        match allowed(self.phase) {
            true => Ok(()),
            false => Err(SessionError::NotAllowed {
                action,
                phase: self.phase,
            }),
        }
    }
}

#[cfg(test)]
mod session_tests {
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    use super::*;
    use crate::form::StationFormCommand;
    use crate::observation::test_support::{bait_readings, observation};
    use crate::id::TechnicianId;
    use crate::station::{Condition, Consumption, StationId, StationType, YesNo};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn technician() -> Technician {
        Technician {
            id: TechnicianId::new("T1").unwrap(),
            name: "Tech One".to_string(),
        }
    }

    fn bait(id: u32) -> StationKey {
        StationKey::new(StationId::new(id).unwrap(), StationType::BaitStation)
    }

    fn origin(status: AppointmentStatus) -> SessionOrigin {
        SessionOrigin {
            customer_id: CustomerId::new("C1").unwrap(),
            appointment_id: Some(AppointmentId::new("A1").unwrap()),
            service_type: ServiceType::Myocide,
            status,
            visit_id: None,
            stations: vec![bait(1), bait(2)],
        }
    }

    fn started_session() -> VisitSession {
        let mut session = VisitSession::open(origin(AppointmentStatus::Scheduled), technician());
        session.start_work(t0()).unwrap();
        session
    }

    fn fill_bait_station(session: &VisitSession, key: StationKey, condition: Condition) -> StationObservation {
        let mut form = session.open_station_form(key, true).unwrap();
        for command in [
            StationFormCommand::SetAccess(YesNo::Yes),
            StationFormCommand::SetConsumption(Some(Consumption::ThreeQuarters)),
            StationFormCommand::SetBaitType(Some("Rodenticide-X".to_string())),
            StationFormCommand::SetDosage(Some(20)),
            StationFormCommand::SetCondition(Some(condition)),
        ] {
            form.apply(command).unwrap();
        }
        form.submit(session.technician(), t0() + Duration::minutes(5))
            .unwrap()
    }

    #[test]
    fn finish_and_update_scenario() {
        // given
        let mut session = started_session();
        let logged = fill_bait_station(&session, bait(1), Condition::Functional);
        session.upsert(logged).unwrap();

        // when
        let submission = session
            .begin_save(SaveKind::Finish, t0() + Duration::minutes(10))
            .unwrap();

        // then
        assert_eq!(submission.stations.len(), 1);
        assert_eq!(submission.stations[0].station_id, StationId::new(1).unwrap());
        assert_eq!(submission.visit.work_type, "Myocide");
        assert_eq!(submission.visit.duration_ms, Some(600_000));
        assert_eq!(submission.visit.visit_id, None);
        assert!(session.is_busy());

        // when
        let appointment_update = session
            .complete_save(VisitId::new("V100").unwrap(), t0() + Duration::minutes(11))
            .unwrap();

        // then
        assert_eq!(session.status(), AppointmentStatus::Completed);
        assert_eq!(session.visit_id(), Some(&VisitId::new("V100").unwrap()));
        assert!(!session.timer().is_running);
        assert!(session.is_editing_completed_visit());
        assert_eq!(session.phase(), SessionPhase::EditingCompleted);
        assert_eq!(
            appointment_update,
            Some(AppointmentStatusUpdate {
                id: AppointmentId::new("A1").unwrap(),
                status: AppointmentStatus::Completed,
                visit_id: Some(VisitId::new("V100").unwrap()),
            })
        );

        // when the complete station is reopened while editing, no confirmation is needed
        let amended = fill_bait_station(&session, bait(1), Condition::Damaged);
        assert!(session.open_station_form(bait(1), false).is_ok());
        session.upsert(amended).unwrap();
        let submission = session
            .begin_save(SaveKind::Update, t0() + Duration::hours(1))
            .unwrap();

        // then
        assert_eq!(submission.visit.visit_id, Some(VisitId::new("V100").unwrap()));
        assert_eq!(submission.visit.work_type, "Myocide Update");
        assert_eq!(submission.visit.duration_ms, None);
        assert_eq!(submission.stations.len(), 1);
        assert_eq!(submission.stations[0].condition, Some(Condition::Damaged));

        // when
        session
            .complete_save(VisitId::new("V100").unwrap(), t0() + Duration::hours(1))
            .unwrap();

        // then
        assert_eq!(session.observations().len(), 1);
        assert_eq!(session.status(), AppointmentStatus::Completed);
        assert!(session.is_editing_completed_visit());
    }

    #[test]
    fn aborted_save_leaves_state_unchanged() {
        // given
        let mut session = started_session();
        session
            .upsert(observation(1, YesNo::No, bait_readings(None, None)))
            .unwrap();
        let before = session.clone();

        // when
        session.begin_save(SaveKind::Finish, t0()).unwrap();
        let kind = session.abort_save().unwrap();

        // then
        assert_eq!(kind, SaveKind::Finish);
        assert_eq!(session, before);
        assert_eq!(session.status(), AppointmentStatus::InProgress);
    }

    #[test]
    fn save_is_not_reentrant() {
        let mut session = started_session();
        session
            .upsert(observation(1, YesNo::No, bait_readings(None, None)))
            .unwrap();
        session.begin_save(SaveKind::Finish, t0()).unwrap();

        assert_eq!(session.begin_save(SaveKind::Finish, t0()), Err(SessionError::Busy));
        assert_eq!(
            session.upsert(observation(2, YesNo::No, bait_readings(None, None))),
            Err(SessionError::Busy)
        );
    }

    #[test]
    fn save_filters_observations_without_data() {
        // given
        let mut session = started_session();
        session
            .upsert(observation(2, YesNo::Yes, bait_readings(None, None)))
            .unwrap();

        // then
        assert_eq!(session.begin_save(SaveKind::Finish, t0()), Err(SessionError::NoDataToSave));
        assert_eq!(session.phase(), SessionPhase::WorkInProgress);

        // when
        session
            .upsert(observation(1, YesNo::No, bait_readings(None, None)))
            .unwrap();
        let submission = session.begin_save(SaveKind::Finish, t0()).unwrap();

        // then
        let ids: Vec<u32> = submission
            .stations
            .iter()
            .map(|record| record.station_id.get())
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[rstest]
    #[case(None, ServiceType::Myocide, AppointmentStatus::Scheduled, StartWorkRejection::ManualSession)]
    #[case(Some("A1"), ServiceType::Disinfection, AppointmentStatus::Scheduled, StartWorkRejection::NotMyocide)]
    #[case(Some("A1"), ServiceType::Myocide, AppointmentStatus::Completed, StartWorkRejection::AlreadyCompleted)]
    #[case(Some("A1"), ServiceType::Myocide, AppointmentStatus::Cancelled, StartWorkRejection::Cancelled)]
    fn start_work_guard(
        #[case] appointment_id: Option<&str>,
        #[case] service_type: ServiceType,
        #[case] status: AppointmentStatus,
        #[case] rejection: StartWorkRejection,
    ) {
        // given
        let mut session = VisitSession::open(
            SessionOrigin {
                appointment_id: appointment_id.map(|id| AppointmentId::new(id).unwrap()),
                service_type,
                ..origin(status)
            },
            technician(),
        );

        // when
        let result = session.start_work(t0());

        // then
        assert_eq!(result, Err(SessionError::StartWorkRejected(rejection)));
        assert_eq!(session.status(), status);
        assert!(!session.timer().is_running);
    }

    #[test]
    fn start_work_clears_stale_observations() {
        // given
        let mut session = VisitSession::open(
            SessionOrigin {
                status: AppointmentStatus::InProgress,
                ..origin(AppointmentStatus::Scheduled)
            },
            technician(),
        );
        session.start_work(t0()).unwrap();
        session
            .upsert(observation(1, YesNo::No, bait_readings(None, None)))
            .unwrap();
        session.cancel_work().unwrap();

        // when
        session.start_work(t0()).unwrap();

        // then
        assert!(session.observations().is_empty());
        assert!(session.timer().is_running);
        assert!(!session.is_editing_completed_visit());
    }

    #[test]
    fn cancel_work_discards_everything() {
        // given
        let mut session = started_session();
        session
            .upsert(observation(1, YesNo::No, bait_readings(None, None)))
            .unwrap();

        // when
        session.cancel_work().unwrap();

        // then
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.status(), AppointmentStatus::Scheduled);
        assert!(session.observations().is_empty());
        assert_eq!(*session.timer(), VisitTimer::default());
    }

    #[test]
    fn idle_session_rejects_station_forms() {
        let session = VisitSession::open(origin(AppointmentStatus::Scheduled), technician());

        assert_eq!(
            session.open_station_form(bait(1), false),
            Err(SessionError::StartWorkFirst)
        );
    }

    #[test]
    fn complete_station_needs_confirmation_while_working() {
        // given
        let mut session = started_session();
        session
            .upsert(observation(1, YesNo::Yes, bait_readings(Some(Consumption::Half), None)))
            .unwrap();

        // then
        assert_eq!(
            session.open_station_form(bait(1), false),
            Err(SessionError::ConfirmationRequired(bait(1)))
        );
        assert!(session.open_station_form(bait(1), true).is_ok());
        assert!(session.open_station_form(bait(2), false).is_ok());
    }

    #[test]
    fn unknown_station_is_rejected() {
        let session = started_session();

        assert_eq!(
            session.open_station_form(bait(9), false),
            Err(SessionError::UnknownStation(bait(9)))
        );
    }

    #[test]
    fn completion_reported_during_work_survives_cancel() {
        // given
        let mut session = started_session();
        session.refresh_status(AppointmentStatus::Completed, Some(VisitId::new("V100").unwrap()));

        // when
        session.cancel_work().unwrap();

        // then
        assert_eq!(session.status(), AppointmentStatus::Completed);
        assert_eq!(session.phase(), SessionPhase::EditingCompleted);
        assert!(session.is_editing_completed_visit());
        assert_eq!(
            session.start_work(t0()),
            Err(SessionError::StartWorkRejected(StartWorkRejection::AlreadyCompleted))
        );
        assert_eq!(session.status(), AppointmentStatus::Completed);
    }

    #[test]
    fn completed_session_is_sticky() {
        // given
        let mut session = VisitSession::open(
            SessionOrigin {
                visit_id: Some(VisitId::new("V100").unwrap()),
                ..origin(AppointmentStatus::Completed)
            },
            technician(),
        );
        assert!(session.is_editing_completed_visit());

        // when
        session.refresh_status(AppointmentStatus::Completed, None);
        session.refresh_status(AppointmentStatus::Scheduled, None);

        // then
        assert!(session.is_editing_completed_visit());
        assert_eq!(session.status(), AppointmentStatus::Completed);
        assert_eq!(session.phase(), SessionPhase::EditingCompleted);
    }

    #[test]
    fn completed_appointment_opens_for_editing() {
        // given
        let appointment: Appointment = serde_json::from_str(
            r#"{"id": "A1", "customer_id": "C1", "service_type": "myocide", "status": "completed", "visit_id": 100}"#,
        )
        .unwrap();

        // when
        let session = VisitSession::open(SessionOrigin::from_appointment(appointment, vec![bait(1)]), technician());

        // then
        assert_eq!(session.phase(), SessionPhase::EditingCompleted);
        assert_eq!(session.appointment_id(), Some(&AppointmentId::new("A1").unwrap()));
        assert_eq!(
            session.rehydration(),
            Some(Rehydration::FetchReport(VisitId::new("100").unwrap()))
        );
    }

    #[test]
    fn completed_without_visit_id_needs_backfill() {
        // given
        let mut session = VisitSession::open(origin(AppointmentStatus::Completed), technician());

        // then
        assert_eq!(
            session.rehydration(),
            Some(Rehydration::LookupVisitId(AppointmentId::new("A1").unwrap()))
        );
        assert_eq!(
            session.open_station_form(bait(1), false),
            Err(SessionError::MissingVisitId)
        );
        assert_eq!(session.generate_report(), Err(SessionError::MissingVisitId));

        // when
        assert!(session.backfill_visit_id(VisitId::new("V100").unwrap()));

        // then
        assert_eq!(
            session.rehydration(),
            Some(Rehydration::FetchReport(VisitId::new("V100").unwrap()))
        );
        assert!(!session.backfill_visit_id(VisitId::new("V200").unwrap()));

        // when
        let rehydrated = session.rehydrate(
            vec![observation(1, YesNo::No, bait_readings(None, None))],
            Some("gate locked".to_string()),
        );

        // then
        assert!(rehydrated);
        assert!(session.is_station_complete(&bait(1)));
        assert_eq!(session.notes(), "gate locked");
        assert_eq!(session.rehydration(), None);
        assert!(!session.rehydrate(vec![], None));
    }

    #[test]
    fn refresh_to_completed_moves_idle_session_to_editing() {
        let mut session = VisitSession::open(origin(AppointmentStatus::Scheduled), technician());

        session.refresh_status(AppointmentStatus::Completed, Some(VisitId::new("V7").unwrap()));

        assert_eq!(session.phase(), SessionPhase::EditingCompleted);
        assert_eq!(session.visit_id(), Some(&VisitId::new("V7").unwrap()));
        assert!(session.is_editing_completed_visit());
    }

    #[test]
    fn report_can_be_generated_once_per_save() {
        // given
        let mut session = started_session();
        session
            .upsert(observation(1, YesNo::No, bait_readings(None, None)))
            .unwrap();
        session.begin_save(SaveKind::Finish, t0()).unwrap();
        session
            .complete_save(VisitId::new("V100").unwrap(), t0())
            .unwrap();

        // then
        assert_eq!(session.generate_report(), Ok(VisitId::new("V100").unwrap()));
        assert_eq!(session.generate_report(), Err(SessionError::ReportAlreadyGenerated));

        // when
        session.begin_save(SaveKind::Update, t0()).unwrap();
        session
            .complete_save(VisitId::new("V100").unwrap(), t0())
            .unwrap();

        // then
        assert!(session.can_generate_report());
    }

    #[test]
    fn upsert_stamps_known_visit_id() {
        let mut session = VisitSession::open(
            SessionOrigin {
                visit_id: Some(VisitId::new("V100").unwrap()),
                ..origin(AppointmentStatus::Completed)
            },
            technician(),
        );

        session
            .upsert(observation(2, YesNo::No, bait_readings(None, None)))
            .unwrap();

        assert_eq!(
            session
                .observations()
                .get(&bait(2))
                .and_then(|observation| observation.visit_id.clone()),
            Some(VisitId::new("V100").unwrap())
        );
    }

    #[test]
    fn station_statuses_follow_map_order() {
        let mut session = started_session();
        session
            .upsert(observation(2, YesNo::No, bait_readings(None, None)))
            .unwrap();

        assert_eq!(session.station_statuses(), vec![(bait(1), false), (bait(2), true)]);
        assert_eq!(session.ensure_map_editable(), Err(SessionError::WorkInProgress));
    }
}
