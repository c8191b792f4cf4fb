use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum_macros::{Display as StrumDisplay, EnumIter};
use thiserror::Error;

/// Dosages, in grams, a technician may select for a bait station.
pub const DOSAGE_OPTIONS_GRAMS: [u32; 8] = [5, 10, 15, 20, 25, 30, 40, 50];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StationError {
    #[error("Station id must be a positive integer")]
    InvalidStationId,
    #[error("Unknown station type. value: '{0}'")]
    UnknownStationType(String),
    #[error("Unknown consumption band. value: '{0}'")]
    UnknownConsumption(String),
}

#[derive(
    Debug,
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash
)]
#[serde(try_from = "u32", into = "u32")]
pub struct StationId(u32);

impl StationId {
    pub const FIRST: StationId = StationId(1);

    pub fn new(value: u32) -> Result<Self, StationError> {
        match value {
            0 => Err(StationError::InvalidStationId),
            value => Ok(Self(value)),
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> StationId {
        StationId(self.0.saturating_add(1))
    }
}

impl TryFrom<u32> for StationId {
    type Error = StationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StationId> for u32 {
    fn from(value: StationId) -> Self {
        value.0
    }
}

impl Display for StationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of physical device.  Immutable once an observation is created.
///
/// Parsing is tolerant of the spellings used by the server, e.g. `bait_station`, `snap-trap`, `LIGHTTRAP`.
#[derive(
    Debug,
    SerializeDisplay,
    DeserializeFromStr,
    StrumDisplay,
    EnumIter,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash
)]
pub enum StationType {
    BaitStation,
    Multicatch,
    SnapTrap,
    LightTrap,
}

impl StationType {
    /// Multicatch and snap traps share the "atoxic" form.
    pub fn is_atoxic(&self) -> bool {
        matches!(self, StationType::Multicatch | StationType::SnapTrap)
    }
}

impl FromStr for StationType {
    type Err = StationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "baitstation" | "bait" => Ok(StationType::BaitStation),
            "multicatch" | "multicatchtrap" => Ok(StationType::Multicatch),
            "snaptrap" | "snap" => Ok(StationType::SnapTrap),
            "lighttrap" | "light" => Ok(StationType::LightTrap),
            _ => Err(StationError::UnknownStationType(s.to_string())),
        }
    }
}

/// Identity of a station within a session, observations are upserted by this key.
#[derive(
    Debug,
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash
)]
#[serde(rename_all = "camelCase")]
pub struct StationKey {
    pub station_id: StationId,
    pub station_type: StationType,
}

impl StationKey {
    pub fn new(station_id: StationId, station_type: StationType) -> Self {
        Self {
            station_id,
            station_type,
        }
    }
}

impl Display for StationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{}", self.station_type, self.station_id)
    }
}

#[derive(
    Debug, serde::Serialize, serde::Deserialize, StrumDisplay, EnumIter, Clone, Copy, PartialEq, Eq, Hash
)]
pub enum YesNo {
    Yes,
    No,
}

impl From<bool> for YesNo {
    fn from(value: bool) -> Self {
        match value {
            true => YesNo::Yes,
            false => YesNo::No,
        }
    }
}

/// Whether the technician could physically reach the station.
pub type Access = YesNo;

#[derive(
    Debug, serde::Serialize, serde::Deserialize, StrumDisplay, EnumIter, Clone, Copy, PartialEq, Eq, Hash
)]
pub enum Condition {
    Functional,
    Damaged,
}

/// Bait consumption, in bands of 25%.
#[derive(
    Debug,
    SerializeDisplay,
    DeserializeFromStr,
    StrumDisplay,
    EnumIter,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash
)]
pub enum Consumption {
    #[strum(to_string = "0%")]
    Zero,
    #[strum(to_string = "25%")]
    Quarter,
    #[strum(to_string = "50%")]
    Half,
    #[strum(to_string = "75%")]
    ThreeQuarters,
    #[strum(to_string = "100%")]
    Full,
}

impl FromStr for Consumption {
    type Err = StationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('%').trim() {
            "0" => Ok(Consumption::Zero),
            "25" => Ok(Consumption::Quarter),
            "50" => Ok(Consumption::Half),
            "75" => Ok(Consumption::ThreeQuarters),
            "100" => Ok(Consumption::Full),
            _ => Err(StationError::UnknownConsumption(s.to_string())),
        }
    }
}

#[cfg(test)]
mod station_tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("BaitStation", StationType::BaitStation)]
    #[case("bait_station", StationType::BaitStation)]
    #[case("snap-trap", StationType::SnapTrap)]
    #[case("SnapTrap", StationType::SnapTrap)]
    #[case("multicatch", StationType::Multicatch)]
    #[case("LIGHTTRAP", StationType::LightTrap)]
    #[case("light trap", StationType::LightTrap)]
    fn station_type_parsing(#[case] value: &str, #[case] expected: StationType) {
        assert_eq!(StationType::from_str(value), Ok(expected));
    }

    #[test]
    fn station_type_unknown() {
        assert_eq!(
            StationType::from_str("glue_board"),
            Err(StationError::UnknownStationType("glue_board".to_string()))
        );
    }

    #[test]
    fn station_type_serializes_canonically() {
        assert_eq!(serde_json::to_string(&StationType::SnapTrap).unwrap(), r#""SnapTrap""#);
        let parsed: StationType = serde_json::from_str(r#""light_trap""#).unwrap();
        assert_eq!(parsed, StationType::LightTrap);
    }

    #[rstest]
    #[case("0%", Consumption::Zero)]
    #[case("25%", Consumption::Quarter)]
    #[case("50", Consumption::Half)]
    #[case(" 75 %", Consumption::ThreeQuarters)]
    #[case("100%", Consumption::Full)]
    fn consumption_parsing(#[case] value: &str, #[case] expected: Consumption) {
        assert_eq!(Consumption::from_str(value), Ok(expected));
    }

    #[test]
    fn consumption_display() {
        assert_eq!(Consumption::ThreeQuarters.to_string(), "75%");
        assert_eq!(serde_json::to_string(&Consumption::Zero).unwrap(), r#""0%""#);
    }

    #[test]
    fn station_id_must_be_positive() {
        assert_eq!(StationId::new(0), Err(StationError::InvalidStationId));
        assert!(serde_json::from_str::<StationId>("0").is_err());
        assert_eq!(serde_json::from_str::<StationId>("3").unwrap().get(), 3);
    }

    #[test]
    fn station_key_display() {
        let key = StationKey::new(StationId::new(3).unwrap(), StationType::BaitStation);
        assert_eq!(key.to_string(), "BaitStation #3");
    }
}
