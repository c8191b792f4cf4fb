//! Working state and validation for the per-station detail forms.
//!
//! A form holds what the technician has entered so far.  Nothing reaches the session until
//! [`StationForm::submit`] succeeds, a failed submission leaves all state untouched.

use chrono::{DateTime, Utc};
use strum_macros::Display as StrumDisplay;
use thiserror::Error;
use tracing::trace;

use crate::observation::{
    BaitStationReadings, LightTrapReadings, MulticatchReadings, SnapTrapReadings, StationObservation, StationReadings,
    TrapReadings,
};
use crate::station::{
    Access, Condition, Consumption, StationKey, StationType, YesNo, DOSAGE_OPTIONS_GRAMS,
};
use crate::technician::Technician;

#[derive(Debug, serde::Serialize, serde::Deserialize, StrumDisplay, Clone, Copy, PartialEq, Eq)]
pub enum StationField {
    #[strum(to_string = "access")]
    Access,
    #[strum(to_string = "consumption")]
    Consumption,
    #[strum(to_string = "bait type")]
    BaitType,
    #[strum(to_string = "dosage")]
    Dosage,
    #[strum(to_string = "condition")]
    Condition,
    #[strum(to_string = "capture")]
    Capture,
    #[strum(to_string = "rodents captured")]
    RodentsCaptured,
    #[strum(to_string = "triggered")]
    Triggered,
    #[strum(to_string = "replaced surface")]
    ReplacedSurface,
    #[strum(to_string = "replace bulb")]
    ReplaceBulb,
    #[strum(to_string = "counter")]
    Counter,
    #[strum(to_string = "others")]
    Others,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StationFormError {
    #[error("Please fill in the {0} field")]
    MissingField(StationField),
    #[error("Invalid dosage. grams: {0}, allowed: {allowed:?}", allowed = DOSAGE_OPTIONS_GRAMS)]
    InvalidDosage(u32),
    #[error("Field '{field}' does not apply to {station_type}")]
    FieldNotApplicable {
        field: StationField,
        station_type: StationType,
    },
    #[error("Unknown 'others' entry. index: {0}")]
    UnknownOtherEntry(usize),
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LightTrapCounter {
    Mosquitoes,
    Lepidoptera,
    Drosophila,
    Flies,
}

/// One field change made by the technician.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub enum StationFormCommand {
    SetAccess(Access),
    SetConsumption(Option<Consumption>),
    SetBaitType(Option<String>),
    SetDosage(Option<u32>),
    SetCondition(Option<Condition>),
    SetCapture(Option<YesNo>),
    SetRodentsCaptured(Option<u32>),
    SetTriggered(Option<YesNo>),
    SetReplacedSurface(Option<YesNo>),
    SetReplaceBulb(Option<YesNo>),
    SetCounter(LightTrapCounter, Option<u32>),
    AddOther(String),
    RemoveOther(usize),
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
pub struct BaitStationFields {
    pub consumption: Option<Consumption>,
    pub bait_type: Option<String>,
    pub dosage_grams: Option<u32>,
    pub condition: Option<Condition>,
}

/// Shared by multicatch and snap traps, only one of `triggered`/`replaced_surface` applies.
#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
pub struct AtoxicFields {
    pub capture: Option<YesNo>,
    pub rodents_captured: Option<u32>,
    pub triggered: Option<YesNo>,
    pub replaced_surface: Option<YesNo>,
    pub condition: Option<Condition>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
pub struct LightTrapFields {
    pub mosquitoes: Option<u32>,
    pub lepidoptera: Option<u32>,
    pub drosophila: Option<u32>,
    pub flies: Option<u32>,
    pub others: Vec<String>,
    pub replace_bulb: Option<YesNo>,
    pub condition: Option<Condition>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub enum FormFields {
    BaitStation(BaitStationFields),
    Atoxic(AtoxicFields),
    LightTrap(LightTrapFields),
}

impl FormFields {
    fn empty(station_type: StationType) -> Self {
        match station_type {
            StationType::BaitStation => FormFields::BaitStation(Default::default()),
            StationType::Multicatch | StationType::SnapTrap => FormFields::Atoxic(Default::default()),
            StationType::LightTrap => FormFields::LightTrap(Default::default()),
        }
    }

    fn from_readings(readings: &StationReadings) -> Self {
        match readings {
            StationReadings::BaitStation(readings) => FormFields::BaitStation(BaitStationFields {
                consumption: readings.consumption,
                bait_type: readings.bait_type.clone(),
                dosage_grams: readings.dosage_grams,
                condition: readings.condition,
            }),
            StationReadings::Multicatch(readings) => FormFields::Atoxic(AtoxicFields {
                capture: readings.trap.capture,
                rodents_captured: readings.trap.rodents_captured,
                triggered: None,
                replaced_surface: readings.replaced_surface,
                condition: readings.trap.condition,
            }),
            StationReadings::SnapTrap(readings) => FormFields::Atoxic(AtoxicFields {
                capture: readings.trap.capture,
                rodents_captured: readings.trap.rodents_captured,
                triggered: readings.triggered,
                replaced_surface: None,
                condition: readings.trap.condition,
            }),
            StationReadings::LightTrap(readings) => FormFields::LightTrap(LightTrapFields {
                mosquitoes: readings.mosquitoes,
                lepidoptera: readings.lepidoptera,
                drosophila: readings.drosophila,
                flies: readings.flies,
                others: readings.others.clone().unwrap_or_default(),
                replace_bulb: readings.replace_bulb,
                condition: readings.condition,
            }),
        }
    }
}

/// The open detail form for a single station.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct StationForm {
    pub key: StationKey,
    pub access: Option<Access>,
    pub fields: FormFields,
}

impl StationForm {
    /// Opens a form, pre-filled from the station's current observation when there is one.
    pub fn open(key: StationKey, existing: Option<&StationObservation>) -> Self {
        match existing {
            Some(observation) if observation.key() == key => Self {
                key,
                access: Some(observation.access),
                fields: FormFields::from_readings(&observation.readings),
            },
            _ => Self {
                key,
                access: None,
                fields: FormFields::empty(key.station_type),
            },
        }
    }

    pub fn apply(&mut self, command: StationFormCommand) -> Result<(), StationFormError> {
        trace!("form command. key: {}, command: {:?}", self.key, command);
        let station_type = self.key.station_type;
        let not_applicable = |field| StationFormError::FieldNotApplicable {
            field,
            station_type,
        };

        match (command, &mut self.fields) {
            (StationFormCommand::SetAccess(access), fields) => {
                if access == YesNo::No {
                    // working values are discarded, not just hidden
                    *fields = FormFields::empty(station_type);
                }
                self.access = Some(access);
            }
            (StationFormCommand::SetCondition(value), FormFields::BaitStation(fields)) => fields.condition = value,
            (StationFormCommand::SetCondition(value), FormFields::Atoxic(fields)) => fields.condition = value,
            (StationFormCommand::SetCondition(value), FormFields::LightTrap(fields)) => fields.condition = value,

            (StationFormCommand::SetConsumption(value), FormFields::BaitStation(fields)) => fields.consumption = value,
            (StationFormCommand::SetBaitType(value), FormFields::BaitStation(fields)) => {
                fields.bait_type = value
                    .map(|bait_type| bait_type.trim().to_string())
                    .filter(|bait_type| !bait_type.is_empty())
            }
            (StationFormCommand::SetDosage(value), FormFields::BaitStation(fields)) => {
                if let Some(grams) = value {
                    if !DOSAGE_OPTIONS_GRAMS.contains(&grams) {
                        return Err(StationFormError::InvalidDosage(grams));
                    }
                }
                fields.dosage_grams = value
            }

            (StationFormCommand::SetCapture(value), FormFields::Atoxic(fields)) => fields.capture = value,
            (StationFormCommand::SetRodentsCaptured(value), FormFields::Atoxic(fields)) => {
                fields.rodents_captured = value
            }
            (StationFormCommand::SetTriggered(value), FormFields::Atoxic(fields))
                if station_type == StationType::SnapTrap =>
            {
                fields.triggered = value
            }
            (StationFormCommand::SetReplacedSurface(value), FormFields::Atoxic(fields))
                if station_type == StationType::Multicatch =>
            {
                fields.replaced_surface = value
            }

            (StationFormCommand::SetReplaceBulb(value), FormFields::LightTrap(fields)) => fields.replace_bulb = value,
            (StationFormCommand::SetCounter(counter, value), FormFields::LightTrap(fields)) => match counter {
                LightTrapCounter::Mosquitoes => fields.mosquitoes = value,
                LightTrapCounter::Lepidoptera => fields.lepidoptera = value,
                LightTrapCounter::Drosophila => fields.drosophila = value,
                LightTrapCounter::Flies => fields.flies = value,
            },
            (StationFormCommand::AddOther(value), FormFields::LightTrap(fields)) => {
                let value = value.trim();
                if !value.is_empty() {
                    fields.others.push(value.to_string());
                }
            }
            (StationFormCommand::RemoveOther(index), FormFields::LightTrap(fields)) => {
                if index >= fields.others.len() {
                    return Err(StationFormError::UnknownOtherEntry(index));
                }
                fields.others.remove(index);
            }

            (StationFormCommand::SetConsumption(_), _) => return Err(not_applicable(StationField::Consumption)),
            (StationFormCommand::SetBaitType(_), _) => return Err(not_applicable(StationField::BaitType)),
            (StationFormCommand::SetDosage(_), _) => return Err(not_applicable(StationField::Dosage)),
            (StationFormCommand::SetCapture(_), _) => return Err(not_applicable(StationField::Capture)),
            (StationFormCommand::SetRodentsCaptured(_), _) => {
                return Err(not_applicable(StationField::RodentsCaptured))
            }
            (StationFormCommand::SetTriggered(_), _) => return Err(not_applicable(StationField::Triggered)),
            (StationFormCommand::SetReplacedSurface(_), _) => {
                return Err(not_applicable(StationField::ReplacedSurface))
            }
            (StationFormCommand::SetReplaceBulb(_), _) => return Err(not_applicable(StationField::ReplaceBulb)),
            (StationFormCommand::SetCounter(..), _) => return Err(not_applicable(StationField::Counter)),
            (StationFormCommand::AddOther(_) | StationFormCommand::RemoveOther(_), _) => {
                return Err(not_applicable(StationField::Others))
            }
        }

        Ok(())
    }

    /// Validates the working state and builds the observation.
    ///
    /// Required fields are checked in a fixed order per station type, the first missing one is reported.
    pub fn submit(&self, technician: &Technician, now: DateTime<Utc>) -> Result<StationObservation, StationFormError> {
        let (access, readings) = match self.access {
            Some(YesNo::No) => (YesNo::No, StationReadings::empty(self.key.station_type)),
            access => {
                let readings = self.validated_readings()?;
                let access = access.ok_or(StationFormError::MissingField(StationField::Access))?;
                (access, readings)
            }
        };

        Ok(StationObservation {
            station_id: self.key.station_id,
            access,
            readings,
            technician_id: technician.id.clone(),
            technician_name: technician.name.clone(),
            visit_id: None,
            timestamp: now,
        })
    }

    fn validated_readings(&self) -> Result<StationReadings, StationFormError> {
        let required = |field: StationField| StationFormError::MissingField(field);

        match &self.fields {
            FormFields::BaitStation(fields) => {
                let consumption = fields
                    .consumption
                    .ok_or(required(StationField::Consumption))?;
                let bait_type = fields
                    .bait_type
                    .clone()
                    .ok_or(required(StationField::BaitType))?;
                let dosage_grams = fields
                    .dosage_grams
                    .ok_or(required(StationField::Dosage))?;
                let condition = fields
                    .condition
                    .ok_or(required(StationField::Condition))?;

                Ok(StationReadings::BaitStation(BaitStationReadings {
                    consumption: Some(consumption),
                    bait_type: Some(bait_type),
                    dosage_grams: Some(dosage_grams),
                    condition: Some(condition),
                }))
            }
            FormFields::Atoxic(fields) => {
                let capture = fields
                    .capture
                    .ok_or(required(StationField::Capture))?;
                let rodents_captured = match capture {
                    YesNo::Yes => Some(
                        fields
                            .rodents_captured
                            .ok_or(required(StationField::RodentsCaptured))?,
                    ),
                    YesNo::No => None,
                };

                let station_type = self.key.station_type;
                let type_specific = match station_type {
                    StationType::SnapTrap => fields
                        .triggered
                        .ok_or(required(StationField::Triggered))?,
                    _ => fields
                        .replaced_surface
                        .ok_or(required(StationField::ReplacedSurface))?,
                };
                let condition = fields
                    .condition
                    .ok_or(required(StationField::Condition))?;

                let trap = TrapReadings {
                    capture: Some(capture),
                    rodents_captured,
                    condition: Some(condition),
                };

                Ok(match station_type {
                    StationType::SnapTrap => StationReadings::SnapTrap(SnapTrapReadings {
                        trap,
                        triggered: Some(type_specific),
                    }),
                    _ => StationReadings::Multicatch(MulticatchReadings {
                        trap,
                        replaced_surface: Some(type_specific),
                    }),
                })
            }
            FormFields::LightTrap(fields) => {
                let replace_bulb = fields
                    .replace_bulb
                    .ok_or(required(StationField::ReplaceBulb))?;
                let condition = fields
                    .condition
                    .ok_or(required(StationField::Condition))?;

                Ok(StationReadings::LightTrap(LightTrapReadings {
                    mosquitoes: fields.mosquitoes,
                    lepidoptera: fields.lepidoptera,
                    drosophila: fields.drosophila,
                    flies: fields.flies,
                    others: Some(fields.others.clone()),
                    replace_bulb: Some(replace_bulb),
                    condition: Some(condition),
                }))
            }
        }
    }
}
