//! Topology document, as produced by the location tooling.
//! Track part ids appear both as JSON strings and as numbers, so every
//! reference is normalised to a `String`.

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

pub type PartId = String;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    pub track_parts: Vec<TrackPart>,
    #[serde(default)]
    pub signals: Vec<SignalSpec>,
    #[serde(default)]
    pub stations: Vec<Station>,
    #[serde(default)]
    pub distance_markers: Option<HashMap<String, f64>>,
}

#[derive(Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PartType {
    RailRoad,
    Switch,
    EnglishSwitch,
    Bumper,
    SideSwitch,
}

impl PartType {
    pub fn is_switch(&self) -> bool {
        match *self {
            PartType::Switch | PartType::EnglishSwitch | PartType::SideSwitch => true,
            PartType::RailRoad | PartType::Bumper => false,
        }
    }
}

#[derive(Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match *self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn as_str(&self) -> &str {
        match *self {
            Side::A => "A",
            Side::B => "B",
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TrackPart {
    #[serde(deserialize_with = "part_id")]
    pub id: PartId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PartType,
    pub length: f64,
    #[serde(deserialize_with = "part_ids")]
    pub a_side: Vec<PartId>,
    #[serde(deserialize_with = "part_ids")]
    pub b_side: Vec<PartId>,
    #[serde(default)]
    pub saw_movement_allowed: bool,
    #[serde(default)]
    pub station_platform: bool,
    /// Divergence angle of a switch, `"1:9"` or `9`.
    #[serde(default, rename = "wisselhoek")]
    pub switch_angle: Option<SwitchAngle>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SwitchAngle {
    Ratio(f64),
    Text(String),
}

#[derive(Deserialize, Debug, Clone)]
pub struct SignalSpec {
    pub name: String,
    pub side: Side,
    #[serde(deserialize_with = "part_id")]
    pub track: PartId,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub station_name: String,
    #[serde(deserialize_with = "part_id")]
    pub platform: String,
    #[serde(deserialize_with = "part_id")]
    pub track_id: PartId,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(id: RawId) -> String {
        match id {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

fn part_id<'de, D: Deserializer<'de>>(d: D) -> Result<PartId, D::Error> {
    RawId::deserialize(d).map(String::from)
}

fn part_ids<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<PartId>, D::Error> {
    Vec::<RawId>::deserialize(d).map(|ids| ids.into_iter().map(String::from).collect())
}

pub fn parse_topology(s: &str) -> Result<Topology, serde_json::Error> {
    serde_json::from_str(s)
}
