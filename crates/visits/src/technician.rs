use strum_macros::Display as StrumDisplay;

use crate::id::TechnicianId;

#[derive(Debug, serde::Serialize, serde::Deserialize, StrumDisplay, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Technician,
    Admin,
    Customer,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub id: TechnicianId,
    pub name: String,
}
