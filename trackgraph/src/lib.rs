extern crate smallvec;
extern crate ordered_float;
extern crate regex;
extern crate failure;
#[macro_use] extern crate failure_derive;
#[macro_use] extern crate log;
extern crate serde;
extern crate serde_json;

pub mod input;
pub mod track;
pub mod blocks;
pub mod path;


pub use track::{TrackGraph, Location};
pub use blocks::BlockGraph;

#[derive(Debug, Fail)]
pub enum TopologyError {
    #[fail(display = "unknown track part {} referenced from {}", _0, _1)]
    UnknownTrackPart(String, String),
    #[fail(display = "unknown track node {}", _0)]
    UnknownNode(String),
    #[fail(display = "unknown location {}", _0)]
    UnknownLocation(String),
    #[fail(display = "side switch {} has no matching pair", _0)]
    MissingSideSwitchPair(String),
    #[fail(display = "invalid switch angle {:?}", _0)]
    InvalidSwitchAngle(String),
    #[fail(display = "error in regular expression: {}", _0)]
    RegexError(String),
}

/// Track graph and signal blocks for a topology document.
pub fn build_topology(s: &str) -> Result<(TrackGraph, BlockGraph), failure::Error> {
    let topology = input::parse_topology(s)?;
    let track = track::build(&topology)?;
    let blocks = blocks::build_blocks(&track);
    info!("Topology: {} track parts, {} signals, {} blocks",
          track.parts.len(), track.signals.len(), blocks.edges.len());
    Ok((track, blocks))
}
