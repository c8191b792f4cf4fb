//! Rules for folding visit-persistence results back into a session.

use thiserror::Error;
use tracing::warn;

use crate::api::SubmitVisitResponse;
use crate::appointment::ServiceType;
use crate::id::VisitId;

/// Substrings, matched case-insensitively, that identify the "price not configured" precondition failure.
pub const PRICE_ERROR_MARKERS: [&str; 2] = ["price must be set", "price not set"];

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    /// First save of a visit, ends the work in progress.
    Finish,
    /// Amendment of an already persisted visit.
    Update,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("A service price has not been configured. Ask an administrator to set it, then save again. cause: {0}")]
    PriceNotSet(String),
    #[error("Saving the visit failed. cause: {0}")]
    Remote(String),
    #[error("The server accepted the visit but did not return a visit id")]
    MissingVisitId,
}

impl GatewayError {
    pub fn is_precondition(&self) -> bool {
        matches!(self, GatewayError::PriceNotSet(_))
    }
}

pub fn classify_failure(message: impl Into<String>) -> GatewayError {
    let message = message.into();
    let lowercase = message.to_lowercase();
    match PRICE_ERROR_MARKERS
        .iter()
        .any(|marker| lowercase.contains(marker))
    {
        true => GatewayError::PriceNotSet(message),
        false => GatewayError::Remote(message),
    }
}

/// Resolves the visit id that results from a `submitVisit` call.
///
/// Once a session has a visit id it never changes; a different id from the server is logged and ignored.
pub fn interpret_submit(response: SubmitVisitResponse, existing: Option<&VisitId>) -> Result<VisitId, GatewayError> {
    if !response.success {
        return Err(classify_failure(
            response
                .error
                .unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    match (existing, response.visit_id) {
        (Some(existing), Some(returned)) if *existing != returned => {
            warn!(
                "Server returned a different visit id, keeping the existing one. existing: {}, returned: {}",
                existing, returned
            );
            Ok(existing.clone())
        }
        (Some(existing), _) => Ok(existing.clone()),
        (None, Some(returned)) => Ok(returned),
        (None, None) => Err(GatewayError::MissingVisitId),
    }
}

pub fn work_type_label(service_type: ServiceType, kind: SaveKind) -> String {
    match kind {
        SaveKind::Finish => service_type.to_string(),
        SaveKind::Update => format!("{} Update", service_type),
    }
}
