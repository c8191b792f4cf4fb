use std::fmt::Display;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use crux_core::macros::effect;
use crux_core::render::RenderOperation;
pub use crux_core::Core;
use crux_core::{render, App, Command};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, trace, warn};
pub use visits::api::{AppointmentStatusUpdate, RecordDefaults, VisitSubmission};
pub use visits::appointment::{Appointment, AppointmentStatus, ServiceType};
pub use visits::form::{StationForm, StationFormCommand};
pub use visits::id::{AppointmentId, CustomerId, MapId, TechnicianId, VisitId};
pub use visits::reference::{ReferenceItem, ReferenceKind, ReferenceList};
pub use visits::report::ServiceReport;
pub use visits::session::{SessionOrigin, SessionPhase};
pub use visits::station::{StationKey, StationType, DOSAGE_OPTIONS_GRAMS};
pub use visits::station_map::StationLayout;
pub use visits::technician::{Role, Technician};
use visits::api::RecordError;
use visits::reconcile::{classify_failure, interpret_submit, GatewayError, SaveKind};
use visits::session::{Rehydration, SessionError, VisitSession};
use visits::station_map::{StationMap, StationMapError};
use visits::timer::TICK_INTERVAL_MS;

use crate::effects::ticker::{self, TickerOperation};
use crate::effects::visit_api::{self, VisitApiOperation, VisitApiResponse, VisitApiResult};
use crate::router::{Router, RouterError, Screen};

pub mod effects;
pub mod router;

#[derive(Default)]
pub struct FieldService;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    /// A station form field is missing or invalid, the form stays open.
    Validation,
    /// The action is not possible in the current state, nothing was sent.
    Blocked,
    /// The server requires an administrator to configure a service price.
    PriceNotSet,
    Failure,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Display) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

impl From<&SessionError> for Notice {
    fn from(error: &SessionError) -> Self {
        Notice::new(NoticeKind::Blocked, error)
    }
}

impl From<&GatewayError> for Notice {
    fn from(error: &GatewayError) -> Self {
        match error {
            GatewayError::PriceNotSet(_) => Notice::new(NoticeKind::PriceNotSet, error),
            GatewayError::Remote(_) | GatewayError::MissingVisitId => Notice::new(NoticeKind::Failure, error),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum PendingConfirmation {
    CancelWork,
    EditCompletedStation { key: StationKey },
}

#[derive(Default)]
pub struct Model {
    technician: Option<Technician>,
    role: Option<Role>,
    router: Router,

    session: Option<VisitSession>,
    /// Incremented whenever a session is opened or closed, results issued for another generation are dropped.
    generation: u64,
    form: Option<StationForm>,
    pending_confirmation: Option<PendingConfirmation>,

    references: IndexMap<ReferenceKind, ReferenceList>,
    station_map: Option<StationMap>,
    report: Option<ServiceReport>,

    notice: Option<Notice>,
    error: Option<(DateTime<Utc>, String)>,
}

impl Model {
    fn session_ref(&self) -> Result<&VisitSession, AppError> {
        self.session
            .as_ref()
            .ok_or(AppError::OperationRequiresSession)
    }

    fn session_mut(&mut self) -> Result<&mut VisitSession, AppError> {
        self.session
            .as_mut()
            .ok_or(AppError::OperationRequiresSession)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.session.is_some() && self.generation == generation
    }

    fn notify(&mut self, notice: Notice) {
        debug!("Notice. kind: {:?}, message: {}", notice.kind, notice.message);
        self.notice.replace(notice);
    }

    fn chemicals(&self) -> ReferenceList {
        self.references
            .get(&ReferenceKind::Chemicals)
            .cloned()
            .unwrap_or_default()
    }

    /// Drops the session, returning the command that stops its ticker, if it was running.
    fn close_session(&mut self) -> Command<Effect, Event> {
        self.form.take();
        self.pending_confirmation.take();
        self.generation += 1;

        match self.session.take() {
            Some(session) => {
                info!("Closed session. customer: {}", session.customer_id());
                match session.timer().is_running {
                    true => ticker::stop(),
                    false => Command::done(),
                }
            }
            None => Command::done(),
        }
    }

    fn rehydrate_command(&self) -> Command<Effect, Event> {
        let Some(session) = &self.session else {
            return Command::done();
        };
        let generation = self.generation;

        match session.rehydration() {
            Some(Rehydration::LookupVisitId(appointment_id)) => {
                debug!("Looking up visit id. appointment: {}", appointment_id);
                visit_api::request(VisitApiOperation::LookupVisitId {
                    appointment_id,
                })
                .then_send(move |result| Event::VisitIdLookedUp {
                    generation,
                    result,
                })
            }
            Some(Rehydration::FetchReport(visit_id)) => {
                debug!("Fetching visit report for rehydration. visit: {}", visit_id);
                visit_api::request(VisitApiOperation::GetVisitReport {
                    visit_id,
                })
                .then_send(move |result| Event::SessionReportFetched {
                    generation,
                    result,
                })
            }
            None => Command::done(),
        }
    }

    fn sync_session_stations(&mut self) {
        if let (Some(session), Some(map)) = (self.session.as_mut(), self.station_map.as_ref()) {
            session.set_stations(map.keys());
        }
    }

    fn ensure_map_editable(&self) -> Result<(), SessionError> {
        match &self.session {
            Some(session) => session.ensure_map_editable(),
            None => Ok(()),
        }
    }
}

#[effect]
pub enum Effect {
    Render(RenderOperation),
    VisitApi(VisitApiOperation),
    Ticker(TickerOperation),
}

#[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug, Clone)]
pub struct StationStatus {
    pub key: StationKey,
    pub complete: bool,
}

#[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug, Clone)]
pub struct SessionView {
    pub customer_id: CustomerId,
    pub appointment_id: Option<AppointmentId>,
    pub service_type: ServiceType,
    pub status: AppointmentStatus,
    pub visit_id: Option<VisitId>,
    pub phase: SessionPhase,
    pub is_editing_completed_visit: bool,
    pub elapsed_ms: u64,
    pub timer_running: bool,
    pub busy: bool,
    pub can_start_work: bool,
    pub can_generate_report: bool,
    pub stations: Vec<StationStatus>,
    pub observation_count: usize,
    pub notes: String,
}

impl From<&VisitSession> for SessionView {
    fn from(session: &VisitSession) -> Self {
        Self {
            customer_id: session.customer_id().clone(),
            appointment_id: session.appointment_id().cloned(),
            service_type: session.service_type(),
            status: session.status(),
            visit_id: session.visit_id().cloned(),
            phase: session.phase(),
            is_editing_completed_visit: session.is_editing_completed_visit(),
            elapsed_ms: session.timer().elapsed_ms,
            timer_running: session.timer().is_running,
            busy: session.is_busy(),
            can_start_work: session.can_start_work().is_ok(),
            can_generate_report: session.can_generate_report(),
            stations: session
                .station_statuses()
                .into_iter()
                .map(|(key, complete)| StationStatus {
                    key,
                    complete,
                })
                .collect(),
            observation_count: session.observations().len(),
            notes: session.notes().to_string(),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Default, PartialEq, Debug)]
pub struct FieldViewModel {
    pub screen: Screen,
    pub technician: Option<Technician>,
    pub role: Option<Role>,
    pub session: Option<SessionView>,
    pub form: Option<StationForm>,
    pub pending_confirmation: Option<PendingConfirmation>,
    pub notice: Option<Notice>,
    pub bait_types: Vec<String>,
    pub chemicals: Vec<ReferenceItem>,
    pub dosage_options: Vec<u32>,
    pub station_map: Option<StationLayout>,
    pub report: Option<ServiceReport>,
    pub error: Option<(DateTime<Utc>, String)>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub enum Event {
    None,

    //
    // Sign-in and navigation
    //
    SignIn {
        technician: Technician,
        role: Role,
    },
    SignOut,
    Navigate {
        screen: Screen,
    },
    Back,
    DismissNotice,

    //
    // Session
    //
    OpenSession {
        origin: SessionOrigin,
    },
    /// Opens a session for a fetched appointment, see [`SessionOrigin::from_appointment`].
    OpenAppointment {
        appointment: Appointment,
        stations: Vec<StationKey>,
    },
    CloseSession,
    /// A re-fetched appointment for the open session.
    AppointmentRefreshed {
        status: AppointmentStatus,
        visit_id: Option<VisitId>,
    },
    StartWork,
    /// Asks for confirmation, see [`Event::Confirm`].
    RequestCancelWork,
    Confirm,
    Dismiss,
    Tick {
        now: DateTime<Utc>,
    },
    SetNotes {
        notes: String,
    },
    FinishAndSave,
    UpdateService,
    GenerateReport,

    //
    // Station forms
    //
    OpenStation {
        key: StationKey,
    },
    EditStation {
        command: StationFormCommand,
    },
    SubmitStation,
    CloseStation,

    //
    // Reference data and reports
    //
    LoadReferences {
        kind: ReferenceKind,
    },
    ViewReport {
        visit_id: VisitId,
    },

    //
    // Station map editing
    //
    LoadStationMap {
        layout: StationLayout,
    },
    PlaceStation {
        station_type: StationType,
        x: f64,
        y: f64,
    },
    MoveStation {
        key: StationKey,
        x: f64,
        y: f64,
    },
    RemoveStation {
        key: StationKey,
    },
    SaveStationLayout,

    //
    // Shell responses
    //
    #[serde(skip)]
    VisitSubmitted {
        generation: u64,
        result: VisitApiResult,
    },
    #[serde(skip)]
    AppointmentStatusUpdated {
        generation: u64,
        result: VisitApiResult,
    },
    #[serde(skip)]
    VisitIdLookedUp {
        generation: u64,
        result: VisitApiResult,
    },
    #[serde(skip)]
    SessionReportFetched {
        generation: u64,
        result: VisitApiResult,
    },
    #[serde(skip)]
    ReportFetched {
        visit_id: VisitId,
        result: VisitApiResult,
    },
    #[serde(skip)]
    ReferencesLoaded {
        kind: ReferenceKind,
        result: VisitApiResult,
    },
    #[serde(skip)]
    StationLayoutSaved {
        result: VisitApiResult,
    },
}

fn now() -> DateTime<Utc> {
    DateTime::from(SystemTime::now())
}

impl FieldService {
    fn update_inner(
        &self,
        event: <FieldService as App>::Event,
    ) -> Box<
        dyn FnOnce(
            &mut <FieldService as App>::Model,
        ) -> Result<Command<<FieldService as App>::Effect, <FieldService as App>::Event>, AppError>,
    > {
        match event {
            Event::None => Box::new(|_model: &mut Model| Ok(render::render())),
            Event::SignIn {
                technician,
                role,
            } => Box::new(move |model: &mut Model| {
                info!("Signing in. user: {}, role: {}", technician.id, role);
                let stop = model.close_session();
                model.technician.replace(technician);
                model.role.replace(role);
                model.router.reset_for(Some(role));
                Ok(Command::all([stop, render::render()]))
            }),
            Event::SignOut => Box::new(|model: &mut Model| {
                info!("Signing out");
                let stop = model.close_session();
                model.technician.take();
                model.role.take();
                model.report.take();
                model.station_map.take();
                model.notice.take();
                model.router.reset_for(None);
                Ok(Command::all([stop, render::render()]))
            }),
            Event::Navigate {
                screen,
            } => Box::new(move |model: &mut Model| {
                model
                    .router
                    .navigate(screen, model.role)
                    .map_err(AppError::NavigationError)?;
                Ok(render::render())
            }),
            Event::Back => Box::new(|model: &mut Model| {
                model
                    .router
                    .back()
                    .map_err(AppError::NavigationError)?;
                Ok(render::render())
            }),
            Event::DismissNotice => Box::new(|model: &mut Model| {
                model.notice.take();
                Ok(render::render())
            }),
            Event::OpenSession {
                origin,
            } => Box::new(move |model: &mut Model| {
                let technician = model
                    .technician
                    .clone()
                    .ok_or(AppError::OperationRequiresSignIn)?;
                model
                    .router
                    .navigate(
                        Screen::Inspection {
                            customer_id: origin.customer_id.clone(),
                        },
                        model.role,
                    )
                    .map_err(AppError::NavigationError)?;

                let stop = model.close_session();
                model
                    .session
                    .replace(VisitSession::open(origin, technician));
                model.notice.take();

                let rehydrate = model.rehydrate_command();
                Ok(Command::all([stop, rehydrate, render::render()]))
            }),
            Event::OpenAppointment {
                appointment,
                stations,
            } => self.update_inner(Event::OpenSession {
                origin: SessionOrigin::from_appointment(appointment, stations),
            }),
            Event::CloseSession => Box::new(|model: &mut Model| {
                let stop = model.close_session();
                model.router.reset_for(model.role);
                Ok(Command::all([stop, render::render()]))
            }),
            Event::AppointmentRefreshed {
                status,
                visit_id,
            } => Box::new(move |model: &mut Model| {
                model
                    .session_mut()?
                    .refresh_status(status, visit_id);
                let rehydrate = model.rehydrate_command();
                Ok(Command::all([rehydrate, render::render()]))
            }),
            Event::StartWork => Box::new(|model: &mut Model| {
                let result = model.session_mut()?.start_work(now());
                match result {
                    Ok(()) => {
                        model.notice.take();
                        Ok(Command::all([ticker::start(TICK_INTERVAL_MS), render::render()]))
                    }
                    Err(e) => {
                        model.notify(Notice::from(&e));
                        Ok(render::render())
                    }
                }
            }),
            Event::RequestCancelWork => Box::new(|model: &mut Model| {
                let session = model.session_ref()?;
                match session.phase() {
                    SessionPhase::WorkInProgress => {
                        model
                            .pending_confirmation
                            .replace(PendingConfirmation::CancelWork);
                    }
                    phase => model.notify(Notice::from(&SessionError::NotAllowed {
                        action: "cancel work",
                        phase,
                    })),
                }
                Ok(render::render())
            }),
            Event::Confirm => Box::new(|model: &mut Model| match model.pending_confirmation.take() {
                None => {
                    debug!("Nothing to confirm");
                    Ok(render::render())
                }
                Some(PendingConfirmation::CancelWork) => {
                    let result = model.session_mut()?.cancel_work();
                    match result {
                        Ok(()) => {
                            model.form.take();
                            Ok(Command::all([ticker::stop(), render::render()]))
                        }
                        Err(e) => {
                            model.notify(Notice::from(&e));
                            Ok(render::render())
                        }
                    }
                }
                Some(PendingConfirmation::EditCompletedStation {
                    key,
                }) => {
                    let result = model
                        .session_ref()?
                        .open_station_form(key, true);
                    match result {
                        Ok(form) => {
                            model.form.replace(form);
                        }
                        Err(e) => model.notify(Notice::from(&e)),
                    }
                    Ok(render::render())
                }
            }),
            Event::Dismiss => Box::new(|model: &mut Model| {
                model.pending_confirmation.take();
                Ok(render::render())
            }),
            Event::Tick {
                now,
            } => Box::new(move |model: &mut Model| {
                match model.session.as_mut() {
                    Some(session) => session.tick(now),
                    None => debug!("Tick without a session"),
                }
                Ok(render::render())
            }),
            Event::SetNotes {
                notes,
            } => Box::new(move |model: &mut Model| {
                let result = model.session_mut()?.set_notes(notes);
                if let Err(e) = result {
                    model.notify(Notice::from(&e));
                }
                Ok(render::render())
            }),
            Event::FinishAndSave => Box::new(|model: &mut Model| Self::begin_save(model, SaveKind::Finish)),
            Event::UpdateService => Box::new(|model: &mut Model| Self::begin_save(model, SaveKind::Update)),
            Event::GenerateReport => Box::new(|model: &mut Model| {
                let result = model.session_mut()?.generate_report();
                match result {
                    Ok(visit_id) => {
                        info!("Generating report. visit: {}", visit_id);
                        let report = ServiceReport::from_session(model.session_ref()?, &model.chemicals(), now());
                        model.report.replace(report);
                        model
                            .router
                            .navigate(
                                Screen::Report {
                                    visit_id,
                                },
                                model.role,
                            )
                            .map_err(AppError::NavigationError)?;
                    }
                    Err(e) => model.notify(Notice::from(&e)),
                }
                Ok(render::render())
            }),
            Event::OpenStation {
                key,
            } => Box::new(move |model: &mut Model| {
                let result = model
                    .session_ref()?
                    .open_station_form(key, false);
                match result {
                    Ok(form) => {
                        model.form.replace(form);
                    }
                    Err(SessionError::ConfirmationRequired(key)) => {
                        model
                            .pending_confirmation
                            .replace(PendingConfirmation::EditCompletedStation {
                                key,
                            });
                    }
                    Err(e) => model.notify(Notice::from(&e)),
                }
                Ok(render::render())
            }),
            Event::EditStation {
                command,
            } => Box::new(move |model: &mut Model| {
                let form = model
                    .form
                    .as_mut()
                    .ok_or(AppError::OperationRequiresStationForm)?;
                if let Err(e) = form.apply(command) {
                    model.notify(Notice::new(NoticeKind::Validation, e));
                }
                Ok(render::render())
            }),
            Event::SubmitStation => Box::new(|model: &mut Model| {
                let submitted = {
                    let session = model.session_ref()?;
                    let form = model
                        .form
                        .as_ref()
                        .ok_or(AppError::OperationRequiresStationForm)?;
                    form.submit(session.technician(), now())
                };

                match submitted {
                    Ok(observation) => {
                        let key = observation.key();
                        let result = model.session_mut()?.upsert(observation);
                        match result {
                            Ok(_) => {
                                info!("Station logged. station: {}", key);
                                model.form.take();
                                model.notice.take();
                            }
                            Err(e) => model.notify(Notice::from(&e)),
                        }
                    }
                    Err(e) => model.notify(Notice::new(NoticeKind::Validation, e)),
                }
                Ok(render::render())
            }),
            Event::CloseStation => Box::new(|model: &mut Model| {
                model.form.take();
                Ok(render::render())
            }),
            Event::LoadReferences {
                kind,
            } => Box::new(move |_model: &mut Model| {
                Ok(visit_api::request(VisitApiOperation::GetReferenceList {
                    kind,
                })
                .then_send(move |result| Event::ReferencesLoaded {
                    kind,
                    result,
                }))
            }),
            Event::ViewReport {
                visit_id,
            } => Box::new(move |model: &mut Model| {
                let screen = Screen::Report {
                    visit_id: visit_id.clone(),
                };
                if !screen.is_permitted(model.role) {
                    return Err(AppError::NavigationError(RouterError::NotPermitted {
                        screen,
                        role: model.role,
                    }));
                }

                Ok(visit_api::request(VisitApiOperation::GetVisitReport {
                    visit_id: visit_id.clone(),
                })
                .then_send(move |result| Event::ReportFetched {
                    visit_id,
                    result,
                }))
            }),
            Event::LoadStationMap {
                layout,
            } => Box::new(move |model: &mut Model| {
                let map = StationMap::from_layout(layout).map_err(AppError::StationMapError)?;
                info!("Loaded station map. map: {}, stations: {}", map.map_id(), map.keys().count());
                model.station_map.replace(map);
                model.sync_session_stations();
                Ok(render::render())
            }),
            Event::PlaceStation {
                station_type,
                x,
                y,
            } => Box::new(move |model: &mut Model| {
                Self::edit_station_map(model, |map| map.place(station_type, x, y).map(|_| ()))
            }),
            Event::MoveStation {
                key,
                x,
                y,
            } => Box::new(move |model: &mut Model| Self::edit_station_map(model, |map| map.move_to(&key, x, y))),
            Event::RemoveStation {
                key,
            } => Box::new(move |model: &mut Model| Self::edit_station_map(model, |map| map.remove(&key).map(|_| ()))),
            Event::SaveStationLayout => Box::new(|model: &mut Model| {
                if let Err(e) = model.ensure_map_editable() {
                    model.notify(Notice::from(&e));
                    return Ok(render::render());
                }
                let layout = model
                    .station_map
                    .as_ref()
                    .ok_or(AppError::OperationRequiresStationMap)?
                    .layout();
                info!("Saving station layout. map: {}, stations: {}", layout.map_id, layout.stations.len());

                Ok(visit_api::request(VisitApiOperation::SaveStationLayout(layout))
                    .then_send(|result| Event::StationLayoutSaved {
                        result,
                    }))
            }),

            //
            // Shell responses
            //
            Event::VisitSubmitted {
                generation,
                result,
            } => Box::new(move |model: &mut Model| {
                if !model.is_current(generation) {
                    debug!("Dropping stale visit submission result. generation: {}", generation);
                    return Ok(Command::done());
                }
                Self::apply_submission(model, generation, result)
            }),
            Event::AppointmentStatusUpdated {
                generation,
                result,
            } => Box::new(move |_model: &mut Model| {
                match result {
                    VisitApiResult::Ok {
                        response: VisitApiResponse::Acknowledged(ack),
                    } if ack.success => info!("Appointment marked completed. generation: {}", generation),
                    VisitApiResult::Ok {
                        response: VisitApiResponse::Acknowledged(ack),
                    } => warn!("Appointment status update rejected. error: {:?}", ack.error),
                    VisitApiResult::Ok {
                        response,
                    } => warn!("Unexpected appointment status update response. response: {:?}", response),
                    VisitApiResult::Err {
                        error,
                    } => warn!("Appointment status update failed. error: {}", error),
                }
                Ok(Command::done())
            }),
            Event::VisitIdLookedUp {
                generation,
                result,
            } => Box::new(move |model: &mut Model| {
                if !model.is_current(generation) {
                    debug!("Dropping stale visit id lookup. generation: {}", generation);
                    return Ok(Command::done());
                }
                match result {
                    VisitApiResult::Ok {
                        response: VisitApiResponse::VisitIdLookup(lookup),
                    } => match lookup.visit_id {
                        Some(visit_id) => {
                            model
                                .session_mut()?
                                .backfill_visit_id(visit_id);
                        }
                        None => model.notify(Notice::new(
                            NoticeKind::Info,
                            "No saved visit was found for this appointment",
                        )),
                    },
                    VisitApiResult::Ok {
                        response,
                    } => return Err(AppError::unexpected_response("lookup visit id", response)),
                    VisitApiResult::Err {
                        error,
                    } => model.notify(Notice::new(NoticeKind::Failure, error)),
                }
                let rehydrate = model.rehydrate_command();
                Ok(Command::all([rehydrate, render::render()]))
            }),
            Event::SessionReportFetched {
                generation,
                result,
            } => Box::new(move |model: &mut Model| {
                if !model.is_current(generation) {
                    debug!("Dropping stale visit report. generation: {}", generation);
                    return Ok(Command::done());
                }
                match result {
                    VisitApiResult::Ok {
                        response:
                            VisitApiResponse::VisitReport(visits::api::VisitReportResponse {
                                success: true,
                                report: Some(report),
                                ..
                            }),
                    } => {
                        let session = model.session_mut()?;
                        let observations = report
                            .observations(&RecordDefaults {
                                technician: Some(session.technician()),
                                visit_id: session.visit_id(),
                                timestamp: now(),
                            })
                            .map_err(AppError::RecordError)?;
                        session.rehydrate(observations, report.notes);
                    }
                    VisitApiResult::Ok {
                        response: VisitApiResponse::VisitReport(response),
                    } => model.notify(Notice::new(
                        NoticeKind::Failure,
                        response
                            .error
                            .unwrap_or_else(|| "Visit report unavailable".to_string()),
                    )),
                    VisitApiResult::Ok {
                        response,
                    } => return Err(AppError::unexpected_response("get visit report", response)),
                    VisitApiResult::Err {
                        error,
                    } => model.notify(Notice::new(NoticeKind::Failure, error)),
                }
                Ok(render::render())
            }),
            Event::ReportFetched {
                visit_id,
                result,
            } => Box::new(move |model: &mut Model| {
                match result {
                    VisitApiResult::Ok {
                        response:
                            VisitApiResponse::VisitReport(visits::api::VisitReportResponse {
                                success: true,
                                report: Some(report),
                                ..
                            }),
                    } => {
                        let defaults = RecordDefaults {
                            technician: model.technician.as_ref(),
                            visit_id: Some(&visit_id),
                            timestamp: now(),
                        };
                        let report = ServiceReport::from_visit_report(&report, &model.chemicals(), &defaults)
                            .map_err(AppError::RecordError)?;
                        model.report.replace(report);
                        model
                            .router
                            .navigate(
                                Screen::Report {
                                    visit_id,
                                },
                                model.role,
                            )
                            .map_err(AppError::NavigationError)?;
                    }
                    VisitApiResult::Ok {
                        response: VisitApiResponse::VisitReport(response),
                    } => model.notify(Notice::new(
                        NoticeKind::Failure,
                        response
                            .error
                            .unwrap_or_else(|| "Visit report unavailable".to_string()),
                    )),
                    VisitApiResult::Ok {
                        response,
                    } => return Err(AppError::unexpected_response("get visit report", response)),
                    VisitApiResult::Err {
                        error,
                    } => model.notify(Notice::new(NoticeKind::Failure, error)),
                }
                Ok(render::render())
            }),
            Event::ReferencesLoaded {
                kind,
                result,
            } => Box::new(move |model: &mut Model| {
                match result {
                    VisitApiResult::Ok {
                        response: VisitApiResponse::ReferenceList(list),
                    } => {
                        info!("Loaded reference list. kind: {}, items: {}", kind, list.items().len());
                        model.references.insert(kind, list);
                    }
                    VisitApiResult::Ok {
                        response,
                    } => return Err(AppError::unexpected_response("get reference list", response)),
                    VisitApiResult::Err {
                        error,
                    } => model.notify(Notice::new(NoticeKind::Failure, error)),
                }
                Ok(render::render())
            }),
            Event::StationLayoutSaved {
                result,
            } => Box::new(move |model: &mut Model| {
                match result {
                    VisitApiResult::Ok {
                        response: VisitApiResponse::Acknowledged(ack),
                    } if ack.success => model.notify(Notice::new(NoticeKind::Success, "Station layout saved")),
                    VisitApiResult::Ok {
                        response: VisitApiResponse::Acknowledged(ack),
                    } => model.notify(Notice::new(
                        NoticeKind::Failure,
                        ack.error
                            .unwrap_or_else(|| "Saving the station layout failed".to_string()),
                    )),
                    VisitApiResult::Ok {
                        response,
                    } => return Err(AppError::unexpected_response("save station layout", response)),
                    VisitApiResult::Err {
                        error,
                    } => model.notify(Notice::new(NoticeKind::Failure, error)),
                }
                Ok(render::render())
            }),
        }
    }

    fn begin_save(model: &mut Model, kind: SaveKind) -> Result<Command<Effect, Event>, AppError> {
        let generation = model.generation;
        let result = model
            .session_mut()?
            .begin_save(kind, now());

        match result {
            Ok(submission) => {
                model.notice.take();
                let submit = visit_api::request(VisitApiOperation::SubmitVisit(submission)).then_send(move |result| {
                    Event::VisitSubmitted {
                        generation,
                        result,
                    }
                });
                Ok(Command::all([submit, render::render()]))
            }
            Err(e) => {
                model.notify(Notice::from(&e));
                Ok(render::render())
            }
        }
    }

    /// Folds a `submitVisit` result into the session, then links the appointment on a best-effort basis.
    fn apply_submission(
        model: &mut Model,
        generation: u64,
        result: VisitApiResult,
    ) -> Result<Command<Effect, Event>, AppError> {
        let session = model.session_mut()?;

        let outcome = match result {
            VisitApiResult::Ok {
                response: VisitApiResponse::VisitSubmitted(response),
            } => interpret_submit(response, session.visit_id()),
            VisitApiResult::Ok {
                response,
            } => Err(GatewayError::Remote(format!("unexpected response: {:?}", response))),
            VisitApiResult::Err {
                error,
            } => Err(classify_failure(error)),
        };

        match outcome {
            Ok(visit_id) => {
                let was_running = session.timer().is_running;
                let appointment_update = session
                    .complete_save(visit_id.clone(), now())
                    .map_err(AppError::SessionError)?;

                let stop = match was_running && !session.timer().is_running {
                    true => ticker::stop(),
                    false => Command::done(),
                };
                let link = match appointment_update {
                    Some(update) => visit_api::request(VisitApiOperation::UpdateAppointmentStatus(update)).then_send(
                        move |result| Event::AppointmentStatusUpdated {
                            generation,
                            result,
                        },
                    ),
                    None => Command::done(),
                };

                model.notify(Notice::new(NoticeKind::Success, format!("Visit saved. visit: {}", visit_id)));
                Ok(Command::all([stop, link, render::render()]))
            }
            Err(e) => {
                let kind = session
                    .abort_save()
                    .map_err(AppError::SessionError)?;
                warn!("Save failed. kind: {:?}, error: {}", kind, e);
                model.notify(Notice::from(&e));
                Ok(render::render())
            }
        }
    }

    fn edit_station_map(
        model: &mut Model,
        edit: impl FnOnce(&mut StationMap) -> Result<(), StationMapError>,
    ) -> Result<Command<Effect, Event>, AppError> {
        if let Err(e) = model.ensure_map_editable() {
            model.notify(Notice::from(&e));
            return Ok(render::render());
        }

        let map = model
            .station_map
            .as_mut()
            .ok_or(AppError::OperationRequiresStationMap)?;
        edit(map).map_err(AppError::StationMapError)?;
        model.sync_session_stations();

        Ok(render::render())
    }
}

impl App for FieldService {
    type Event = Event;
    type Model = Model;
    type ViewModel = FieldViewModel;
    type Capabilities = ();
    type Effect = Effect;

    fn update(
        &self,
        event: Self::Event,
        model: &mut Self::Model,
        _caps: &Self::Capabilities,
    ) -> Command<Self::Effect, Self::Event> {
        debug!("event: {:?}", event);
        let try_fn = self.update_inner(event);

        match try_fn(model) {
            Err(e) => {
                model
                    .error
                    .replace((DateTime::from(SystemTime::now()), format!("{:?}", e)));
                render::render()
            }
            Ok(command) => {
                model.error.take();
                command
            }
        }
    }

    fn view(&self, model: &Self::Model) -> Self::ViewModel {
        let bait_types = model
            .references
            .get(&ReferenceKind::BaitTypes)
            .map(|list| {
                list.names()
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let view_model = FieldViewModel {
            screen: model.router.current().clone(),
            technician: model.technician.clone(),
            role: model.role,
            session: model
                .session
                .as_ref()
                .map(SessionView::from),
            form: model.form.clone(),
            pending_confirmation: model.pending_confirmation.clone(),
            notice: model.notice.clone(),
            bait_types,
            chemicals: model.chemicals().items().to_vec(),
            dosage_options: DOSAGE_OPTIONS_GRAMS.to_vec(),
            station_map: model
                .station_map
                .as_ref()
                .map(StationMap::layout),
            report: model.report.clone(),
            error: model.error.clone(),
        };

        trace!("view model: {:?}", view_model);

        view_model
    }
}

#[derive(Error, Debug)]
enum AppError {
    #[error("Operation requires a signed-in user")]
    OperationRequiresSignIn,
    #[error("Operation requires an open session")]
    OperationRequiresSession,
    #[error("Operation requires an open station form")]
    OperationRequiresStationForm,
    #[error("Operation requires a station map")]
    OperationRequiresStationMap,
    #[error("Navigation error. cause: {0}")]
    NavigationError(RouterError),
    #[error("Session error. cause: {0}")]
    SessionError(SessionError),
    #[error("Station map error. cause: {0}")]
    StationMapError(StationMapError),
    #[error("Station record error. cause: {0}")]
    RecordError(RecordError),
    #[error("Unexpected response. operation: {operation}, response: {response}")]
    UnexpectedResponse { operation: &'static str, response: String },
}

impl AppError {
    fn unexpected_response(operation: &'static str, response: VisitApiResponse) -> Self {
        AppError::UnexpectedResponse {
            operation,
            response: format!("{:?}", response),
        }
    }
}
