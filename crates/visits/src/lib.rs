//! Field-service visit domain.
//!
//! Station observations are captured through [`form::StationForm`]s, accumulated in a
//! [`session::VisitSession`] and persisted as a visit through the rules in [`reconcile`].

pub mod appointment;
pub mod completion;
pub mod api;
pub mod form;
pub mod id;
pub mod observation;
pub mod reconcile;
pub mod reference;
pub mod report;
pub mod session;
pub mod station;
pub mod station_map;
pub mod technician;
pub mod timer;
