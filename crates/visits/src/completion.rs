use crate::observation::Observations;
use crate::station::StationKey;

/// A station is complete when it has an observation that is either inaccessible or carries data.
///
/// Pure, recomputed on every query.
pub fn is_station_complete(key: &StationKey, observations: &Observations) -> bool {
    observations
        .get(key)
        .is_some_and(|observation| observation.is_reportable())
}
