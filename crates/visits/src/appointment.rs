use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum_macros::{Display as StrumDisplay, EnumIter};
use thiserror::Error;

use crate::id::{AppointmentId, CustomerId, VisitId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppointmentError {
    #[error("Unknown service type. value: '{0}'")]
    UnknownServiceType(String),
    #[error("Unknown appointment status. value: '{0}'")]
    UnknownStatus(String),
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .to_ascii_lowercase()
}

#[derive(
    Debug, SerializeDisplay, DeserializeFromStr, StrumDisplay, EnumIter, Clone, Copy, PartialEq, Eq, Hash
)]
pub enum ServiceType {
    Myocide,
    Disinfection,
    Insecticide,
    Special,
}

impl FromStr for ServiceType {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "myocide" => Ok(ServiceType::Myocide),
            "disinfection" => Ok(ServiceType::Disinfection),
            "insecticide" => Ok(ServiceType::Insecticide),
            "special" => Ok(ServiceType::Special),
            _ => Err(AppointmentError::UnknownServiceType(s.to_string())),
        }
    }
}

/// Mirrors the server-side appointment status.
#[derive(
    Debug, SerializeDisplay, DeserializeFromStr, StrumDisplay, EnumIter, Clone, Copy, PartialEq, Eq, Hash
)]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "scheduled" | "pending" => Ok(AppointmentStatus::Scheduled),
            "inprogress" => Ok(AppointmentStatus::InProgress),
            "completed" | "complete" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            _ => Err(AppointmentError::UnknownStatus(s.to_string())),
        }
    }
}

/// A scheduled visit owned by the backend.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: AppointmentId,
    #[serde(alias = "customer_id")]
    pub customer_id: CustomerId,
    #[serde(alias = "service_type")]
    pub service_type: ServiceType,
    pub status: AppointmentStatus,
    #[serde(default, alias = "visit_id")]
    pub visit_id: Option<VisitId>,
}
