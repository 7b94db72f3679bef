use std::collections::HashMap;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::{GenerationError, TrainId};

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub types: Vec<TrainUnitType>,
    pub trains: Vec<Train>,
    #[serde(default)]
    pub walking_speed: f64,
    #[serde(default)]
    pub headway_following: f64,
    #[serde(default)]
    pub headway_crossing: f64,
    #[serde(default)]
    pub release_time: f64,
    #[serde(default)]
    pub setup_time: f64,
    #[serde(default)]
    pub sight_reaction_time: f64,
    #[serde(default = "default_minimum_stop_time")]
    pub minimum_stop_time: f64,
}

fn default_minimum_stop_time() -> f64 { 60.0 }

#[derive(Deserialize, Debug, Clone)]
pub struct TrainUnitType {
    pub name: String,
    pub length: f64,
    pub speed: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Train {
    pub train_number: TrainId,
    pub train_unit_types: Vec<String>,
    pub movements: Vec<Movement>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub start_location: String,
    pub end_location: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Intermediate stops in visiting order, with scheduled departure time.
    #[serde(default)]
    pub stops: IndexMap<String, f64>,
}

impl Movement {
    pub fn stop_list(&self) -> Vec<(&str, f64)> {
        self.stops.iter().map(|(loc, &t)| (loc.as_str(), t)).collect()
    }
}

/// Physical properties of a train composed of one or more units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TrainSpec {
    pub id: TrainId,
    pub length: f64,
    pub speed: f64,
}

impl Scenario {
    /// End of the planning horizon.
    pub fn global_end_time(&self) -> f64 {
        self.trains.iter()
            .flat_map(|t| t.movements.iter())
            .map(|m| 2.0 * m.end_time)
            .fold(0.0, f64::max)
    }

    pub fn train_spec(&self, train: &Train) -> Result<TrainSpec, GenerationError> {
        let types: HashMap<&str, &TrainUnitType> = self.types.iter().map(|t| (t.name.as_str(), t)).collect();
        if train.train_unit_types.is_empty() {
            return Err(GenerationError::EmptyTrain(train.train_number));
        }
        let mut length = 0.0;
        let mut speed = std::f64::INFINITY;
        for name in &train.train_unit_types {
            let unit = types.get(name.as_str())
                .ok_or_else(|| GenerationError::UnknownTrainType(name.clone(), train.train_number))?;
            length += unit.length;
            speed = speed.min(unit.speed);
        }
        Ok(TrainSpec { id: train.train_number, length, speed })
    }

    pub fn max_train_id(&self) -> TrainId {
        self.trains.iter().map(|t| t.train_number).max().unwrap_or(0)
    }
}

pub fn parse_scenario(s: &str) -> Result<Scenario, serde_json::Error> {
    serde_json::from_str(s)
}
