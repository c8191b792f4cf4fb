use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::id::{TechnicianId, VisitId};
use crate::station::{Access, Condition, Consumption, StationId, StationKey, StationType, YesNo};

/// One technician-submitted reading for one physical station.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StationObservation {
    pub station_id: StationId,
    pub access: Access,
    pub readings: StationReadings,
    pub technician_id: TechnicianId,
    pub technician_name: String,
    /// `None` until the parent visit has been persisted.
    pub visit_id: Option<VisitId>,
    pub timestamp: DateTime<Utc>,
}

impl StationObservation {
    pub fn station_type(&self) -> StationType {
        self.readings.station_type()
    }

    pub fn key(&self) -> StationKey {
        StationKey::new(self.station_id, self.station_type())
    }

    /// `true` if the station was inaccessible or carries at least one type-relevant reading.
    pub fn is_reportable(&self) -> bool {
        self.access == YesNo::No || self.readings.has_data()
    }
}

/// Type-specific readings.
///
/// When access is `No` every field is `None`, serialized as an explicit `null`.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "stationType")]
pub enum StationReadings {
    BaitStation(BaitStationReadings),
    Multicatch(MulticatchReadings),
    SnapTrap(SnapTrapReadings),
    LightTrap(LightTrapReadings),
}

impl StationReadings {
    /// Readings with every field explicitly unset.
    pub fn empty(station_type: StationType) -> Self {
        match station_type {
            StationType::BaitStation => StationReadings::BaitStation(BaitStationReadings::default()),
            StationType::Multicatch => StationReadings::Multicatch(MulticatchReadings::default()),
            StationType::SnapTrap => StationReadings::SnapTrap(SnapTrapReadings::default()),
            StationType::LightTrap => StationReadings::LightTrap(LightTrapReadings::default()),
        }
    }

    pub fn station_type(&self) -> StationType {
        match self {
            StationReadings::BaitStation(_) => StationType::BaitStation,
            StationReadings::Multicatch(_) => StationType::Multicatch,
            StationReadings::SnapTrap(_) => StationType::SnapTrap,
            StationReadings::LightTrap(_) => StationType::LightTrap,
        }
    }

    /// `0%` consumption counts as data, only `None` is "no data".
    pub fn has_data(&self) -> bool {
        match self {
            StationReadings::BaitStation(readings) => readings.has_data(),
            StationReadings::Multicatch(readings) => {
                readings.trap.has_data() || readings.replaced_surface.is_some()
            }
            StationReadings::SnapTrap(readings) => readings.trap.has_data() || readings.triggered.is_some(),
            StationReadings::LightTrap(readings) => readings.has_data(),
        }
    }

    pub fn condition(&self) -> Option<Condition> {
        match self {
            StationReadings::BaitStation(readings) => readings.condition,
            StationReadings::Multicatch(readings) => readings.trap.condition,
            StationReadings::SnapTrap(readings) => readings.trap.condition,
            StationReadings::LightTrap(readings) => readings.condition,
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaitStationReadings {
    pub consumption: Option<Consumption>,
    pub bait_type: Option<String>,
    pub dosage_grams: Option<u32>,
    pub condition: Option<Condition>,
}

impl BaitStationReadings {
    fn has_data(&self) -> bool {
        self.consumption.is_some() || self.bait_type.is_some() || self.dosage_grams.is_some() || self.condition.is_some()
    }
}

/// Readings shared by the atoxic traps (multicatch and snap traps).
#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrapReadings {
    pub capture: Option<YesNo>,
    pub rodents_captured: Option<u32>,
    pub condition: Option<Condition>,
}

impl TrapReadings {
    fn has_data(&self) -> bool {
        self.capture.is_some() || self.rodents_captured.is_some() || self.condition.is_some()
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MulticatchReadings {
    #[serde(flatten)]
    pub trap: TrapReadings,
    pub replaced_surface: Option<YesNo>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapTrapReadings {
    #[serde(flatten)]
    pub trap: TrapReadings,
    pub triggered: Option<YesNo>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LightTrapReadings {
    pub mosquitoes: Option<u32>,
    pub lepidoptera: Option<u32>,
    pub drosophila: Option<u32>,
    pub flies: Option<u32>,
    /// `None` when inaccessible, otherwise the (possibly empty) list of other pests.
    pub others: Option<Vec<String>>,
    pub replace_bulb: Option<YesNo>,
    pub condition: Option<Condition>,
}

impl LightTrapReadings {
    pub fn has_counters(&self) -> bool {
        [self.mosquitoes, self.lepidoptera, self.drosophila, self.flies]
            .iter()
            .any(Option::is_some)
    }

    fn has_data(&self) -> bool {
        self.has_counters()
            || self
                .others
                .as_ref()
                .is_some_and(|others| !others.is_empty())
            || self.replace_bulb.is_some()
            || self.condition.is_some()
    }
}

/// The session's observations, in insertion order, at most one per [`StationKey`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Observations(IndexMap<StationKey, StationObservation>);

impl Observations {
    /// Replace any existing observation for the same key, keeping its original position.
    ///
    /// Returns the replaced observation, if any.
    pub fn upsert(&mut self, observation: StationObservation) -> Option<StationObservation> {
        self.0.insert(observation.key(), observation)
    }

    pub fn get(&self, key: &StationKey) -> Option<&StationObservation> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StationObservation> {
        self.0.values()
    }

    /// The observations that may be persisted, see [`StationObservation::is_reportable`].
    pub fn qualifying(&self) -> Vec<StationObservation> {
        self.0
            .values()
            .filter(|observation| observation.is_reportable())
            .cloned()
            .collect()
    }

    pub fn assign_visit_id(&mut self, visit_id: &VisitId) {
        for observation in self.0.values_mut() {
            observation.visit_id = Some(visit_id.clone());
        }
    }
}

impl FromIterator<StationObservation> for Observations {
    fn from_iter<T: IntoIterator<Item = StationObservation>>(iter: T) -> Self {
        let mut observations = Observations::default();
        for observation in iter {
            observations.upsert(observation);
        }
        observations
    }
}


#[cfg(test)]
mod observation_tests {
    use rstest::rstest;

    use super::test_support::*;
    use super::*;

    #[test]
    fn upsert_replaces_by_identity() {
        // given
        let mut observations = Observations::default();
        observations.upsert(observation(1, YesNo::Yes, bait_readings(Some(Consumption::Half), None)));
        observations.upsert(observation(2, YesNo::No, StationReadings::empty(StationType::BaitStation)));

        // when
        let replaced = observations.upsert(observation(
            1,
            YesNo::Yes,
            bait_readings(Some(Consumption::Full), Some(Condition::Damaged)),
        ));

        // then
        assert!(replaced.is_some());
        assert_eq!(observations.len(), 2);
        let first = observations.iter().next().unwrap();
        assert_eq!(first.station_id.get(), 1);
        assert_eq!(
            first.readings,
            bait_readings(Some(Consumption::Full), Some(Condition::Damaged))
        );
    }

    #[test]
    fn same_id_different_type_are_distinct() {
        let mut observations = Observations::default();
        observations.upsert(observation(1, YesNo::No, StationReadings::empty(StationType::BaitStation)));
        observations.upsert(observation(1, YesNo::No, StationReadings::empty(StationType::SnapTrap)));

        assert_eq!(observations.len(), 2);
    }

    #[rstest]
    #[case(bait_readings(Some(Consumption::Zero), None), true)]
    #[case(bait_readings(None, Some(Condition::Functional)), true)]
    #[case(bait_readings(None, None), false)]
    #[case(StationReadings::SnapTrap(SnapTrapReadings { trap: TrapReadings::default(), triggered: Some(YesNo::No) }), true)]
    #[case(StationReadings::Multicatch(MulticatchReadings::default()), false)]
    #[case(StationReadings::LightTrap(LightTrapReadings { flies: Some(0), ..Default::default() }), true)]
    #[case(StationReadings::LightTrap(LightTrapReadings { others: Some(vec![]), ..Default::default() }), false)]
    fn has_data(#[case] readings: StationReadings, #[case] expected: bool) {
        assert_eq!(readings.has_data(), expected);
    }

    #[test]
    fn qualifying_filters_observations_without_data() {
        // given
        let observations = Observations::from_iter([
            observation(1, YesNo::No, StationReadings::empty(StationType::BaitStation)),
            observation(2, YesNo::Yes, bait_readings(None, None)),
        ]);

        // when
        let qualifying = observations.qualifying();

        // then
        assert_eq!(qualifying.len(), 1);
        assert_eq!(qualifying[0].station_id.get(), 1);
    }

    #[test]
    fn inaccessible_readings_serialize_explicit_nulls() {
        let readings = StationReadings::empty(StationType::BaitStation);

        let json = serde_json::to_value(&readings).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "stationType": "BaitStation",
                "consumption": null,
                "baitType": null,
                "dosageGrams": null,
                "condition": null,
            })
        );
    }
}
