use std::future::Future;

use crux_core::capability::Operation;
use crux_core::command::RequestBuilder;
use crux_core::{Command, Request};
use visits::api::{
    Acknowledgement, AppointmentStatusUpdate, SubmitVisitResponse, VisitIdLookupResponse, VisitReportResponse,
    VisitSubmission,
};
use visits::id::{AppointmentId, VisitId};
use visits::reference::{ReferenceKind, ReferenceList};
use visits::station_map::StationLayout;

/// Calls against the visit-persistence, appointment, report and reference-data services.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub enum VisitApiOperation {
    SubmitVisit(VisitSubmission),
    UpdateAppointmentStatus(AppointmentStatusUpdate),
    LookupVisitId { appointment_id: AppointmentId },
    GetVisitReport { visit_id: VisitId },
    GetReferenceList { kind: ReferenceKind },
    SaveStationLayout(StationLayout),
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub enum VisitApiResponse {
    VisitSubmitted(SubmitVisitResponse),
    Acknowledged(Acknowledgement),
    VisitIdLookup(VisitIdLookupResponse),
    VisitReport(VisitReportResponse),
    ReferenceList(ReferenceList),
}

/// `Err` carries a transport failure, the service's own failures are part of the response.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub enum VisitApiResult {
    Ok { response: VisitApiResponse },
    Err { error: String },
}

impl Operation for VisitApiOperation {
    type Output = VisitApiResult;
}

pub fn request<Effect, Event>(
    operation: VisitApiOperation,
) -> RequestBuilder<Effect, Event, impl Future<Output = VisitApiResult>>
where
    Effect: From<Request<VisitApiOperation>> + Send + 'static,
    Event: Send + 'static,
{
    Command::request_from_shell(operation)
}
