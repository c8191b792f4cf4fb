//! Station placements of a customer site, edited outside of any work in progress.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::id::MapId;
use crate::station::{StationId, StationKey, StationType};

#[derive(Error, Debug)]
pub enum StationMapError {
    #[error("Invalid station placement. station: {key}, cause: {cause}")]
    InvalidPlacement { key: StationKey, cause: ValidationErrors },
    #[error("Station already placed. station: {0}")]
    DuplicateStation(StationKey),
    #[error("Unknown station. station: {0}")]
    UnknownStation(StationKey),
}

/// Position of one station on the site map, in coordinates normalized to the map image.
#[derive(Clone, Debug, Validate, serde::Deserialize, serde::Serialize, PartialEq)]
pub struct StationPlacement {
    pub id: StationId,
    #[serde(rename = "type")]
    pub station_type: StationType,
    #[validate(custom(function = "StationPlacement::validate_coordinate"))]
    pub x: f64,
    #[validate(custom(function = "StationPlacement::validate_coordinate"))]
    pub y: f64,
}

impl StationPlacement {
    pub fn key(&self) -> StationKey {
        StationKey::new(self.id, self.station_type)
    }

    /// Accepts finite values in `0..=1` only.
    fn validate_coordinate(value: f64) -> Result<(), ValidationError> {
        match value.is_finite() && (0.0..=1.0).contains(&value) {
            true => Ok(()),
            false => Err(ValidationError::new("station-placement-out-of-bounds")),
        }
    }
}

/// Payload of `saveStationLayout`.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StationLayout {
    pub map_id: MapId,
    pub stations: Vec<StationPlacement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationMap {
    map_id: MapId,
    placements: IndexMap<StationKey, StationPlacement>,
}

impl StationMap {
    pub fn new(map_id: MapId) -> Self {
        Self {
            map_id,
            placements: IndexMap::new(),
        }
    }

    pub fn from_layout(layout: StationLayout) -> Result<Self, StationMapError> {
        let mut map = Self::new(layout.map_id);
        for placement in layout.stations {
            map.insert(placement)?;
        }
        Ok(map)
    }

    pub fn map_id(&self) -> &MapId {
        &self.map_id
    }

    pub fn keys(&self) -> impl Iterator<Item = StationKey> + '_ {
        self.placements.keys().copied()
    }

    pub fn placements(&self) -> impl Iterator<Item = &StationPlacement> {
        self.placements.values()
    }

    pub fn get(&self, key: &StationKey) -> Option<&StationPlacement> {
        self.placements.get(key)
    }

    /// Places a new station, numbered after the highest existing id of the same type.
    pub fn place(&mut self, station_type: StationType, x: f64, y: f64) -> Result<StationKey, StationMapError> {
        let id = self
            .placements
            .keys()
            .filter(|key| key.station_type == station_type)
            .map(|key| key.station_id)
            .max()
            .map(|id| id.next())
            .unwrap_or(StationId::FIRST);

        let placement = StationPlacement {
            id,
            station_type,
            x,
            y,
        };
        let key = placement.key();
        self.insert(placement)?;
        debug!("Placed station. station: {}, x: {}, y: {}", key, x, y);
        Ok(key)
    }

    pub fn insert(&mut self, placement: StationPlacement) -> Result<(), StationMapError> {
        let key = placement.key();
        Self::validate_placement(&placement)?;
        if self.placements.contains_key(&key) {
            return Err(StationMapError::DuplicateStation(key));
        }
        self.placements.insert(key, placement);
        Ok(())
    }

    pub fn move_to(&mut self, key: &StationKey, x: f64, y: f64) -> Result<(), StationMapError> {
        let placement = self
            .placements
            .get(key)
            .ok_or(StationMapError::UnknownStation(*key))?;
        let moved = StationPlacement {
            x,
            y,
            ..placement.clone()
        };
        Self::validate_placement(&moved)?;
        self.placements.insert(*key, moved);
        Ok(())
    }

    pub fn remove(&mut self, key: &StationKey) -> Result<StationPlacement, StationMapError> {
        self.placements
            .shift_remove(key)
            .ok_or(StationMapError::UnknownStation(*key))
    }

    pub fn layout(&self) -> StationLayout {
        StationLayout {
            map_id: self.map_id.clone(),
            stations: self.placements.values().cloned().collect(),
        }
    }

    fn validate_placement(placement: &StationPlacement) -> Result<(), StationMapError> {
        placement
            .validate()
            .map_err(|cause| StationMapError::InvalidPlacement {
                key: placement.key(),
                cause,
            })
    }
}
