extern crate smallvec;
extern crate ordered_float;
extern crate failure;
#[macro_use] extern crate failure_derive;
#[macro_use] extern crate log;
extern crate serde;
extern crate serde_json;
extern crate indexmap;
extern crate trackgraph;

pub mod config;
pub mod input;
pub mod occupation;
pub mod merge;
pub mod flexibility;
pub mod safe;
pub mod output;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::time::Instant;
use smallvec::SmallVec;
use trackgraph::{TrackGraph, BlockGraph};
use trackgraph::path::PathError;

use config::Config;
use input::scenario::{self, Scenario};
use occupation::{BlockIntervals, Parameters, TrainPlan};
use flexibility::Flexibility;
use safe::SafeGraph;

/// Train number; 0 stands for "no train".
pub type TrainId = i64;

#[derive(Debug, Fail)]
pub enum GenerationError {
    #[fail(display = "unknown train unit type {} in train {}", _0, _1)]
    UnknownTrainType(String, TrainId),
    #[fail(display = "train {} has no train units", _0)]
    EmptyTrain(TrainId),
    #[fail(display = "movement {} of train {}: {}", index, train, cause)]
    Movement { train: TrainId, index: usize, #[cause] cause: PathError },
    #[fail(display = "inconsistent occupation on block {}: {}", block, detail)]
    Inconsistent { block: String, detail: String },
    #[fail(display = "unknown destination {}", _0)]
    UnknownDestination(String),
}

pub type AppResult<T> = Result<T, failure::Error>;

pub fn read_file(f: &Path) -> AppResult<String> {
    use std::fs::File;
    use std::io::prelude::*;
    use std::io::BufReader;

    let file = File::open(f)?;
    let mut file = BufReader::new(&file);
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

pub fn get_topology(f: &Path) -> AppResult<(TrackGraph, BlockGraph)> {
    let contents = read_file(f)?;
    trackgraph::build_topology(&contents)
}

pub fn get_scenario(f: &Path) -> AppResult<Scenario> {
    let contents = read_file(f)?;
    let s = scenario::parse_scenario(&contents)?;
    Ok(s)
}

/// Writes the safe interval graph to `f`, flushing before returning so
/// write errors are not lost.
pub fn write_output(f: &Path, track: &TrackGraph, blocks: &BlockGraph, generated: &Generated,
                    allowed: &[String]) -> AppResult<()> {
    use std::fs::File;
    use std::io::{BufWriter, Write};

    let file = File::create(f)?;
    let mut writer = BufWriter::new(&file);
    output::graph::write_graph(&mut writer, track, blocks, &generated.safe,
                               &generated.flexibility, allowed, generated.num_trains)?;
    writer.flush()?;
    Ok(())
}

/// Everything computed for one scenario.
#[derive(Debug)]
pub struct Generated {
    pub plans: Vec<TrainPlan>,
    pub occupations: BlockIntervals,
    pub merged: BlockIntervals,
    pub flexibility: Flexibility,
    pub safe: SafeGraph,
    pub global_end: f64,
    pub num_trains: TrainId,
}

struct StageTimer {
    stages: SmallVec<[(&'static str, f64); 8]>,
    last: Instant,
}

impl StageTimer {
    fn new() -> StageTimer {
        StageTimer { stages: SmallVec::new(), last: Instant::now() }
    }

    fn stage(&mut self, name: &'static str) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.stages.push((name, elapsed.as_secs() as f64 + elapsed.subsec_nanos() as f64 * 1e-9));
        self.last = now;
    }

    fn report(&self) {
        for &(name, secs) in &self.stages {
            info!("{:<14} {:.3}s", name, secs);
        }
    }
}

fn destination_node(blocks: &BlockGraph, destination: &str) -> Result<usize, GenerationError> {
    blocks.find_node(destination)
        .or_else(|| blocks.find_block(destination).map(|b| blocks.edges[b].from))
        .ok_or_else(|| GenerationError::UnknownDestination(destination.to_string()))
}

/// Runs the pipeline from planned movements to the safe interval graph.
pub fn generate(track: &TrackGraph, blocks: &BlockGraph, scenario: &Scenario, config: &Config)
                -> Result<Generated, GenerationError> {
    let mut timer = StageTimer::new();
    let params = Parameters::new(scenario, config);
    info!("Scenario: {} trains, walking speed {}, headway following {} crossing {}",
          scenario.trains.len(), scenario.walking_speed,
          scenario.headway_following, scenario.headway_crossing);

    let mut occupations: BlockIntervals = vec![Vec::new(); blocks.edges.len()];
    let mut plans = Vec::new();
    for train in &scenario.trains {
        plans.push(occupation::occupy_train(track, blocks, scenario, train, &params, &mut occupations)?);
    }
    timer.stage("occupation");

    let merged = merge::merge_intervals(blocks, &occupations, config.agent)?;
    timer.stage("merge");

    let flex = flexibility::flexibility(blocks, &occupations, &plans, config);
    timer.stage("flexibility");

    let destination = match config.destination {
        Some(ref d) => Some(destination_node(blocks, d)?),
        None => None,
    };
    let global_end = scenario.global_end_time();
    let h = safe::heuristic(blocks, destination, config.agent_speed);
    let safe = safe::safe_graph(blocks, &merged, &flex, global_end, config.agent_speed, &h);
    timer.stage("safe intervals");
    timer.report();

    info!("Safe interval graph: {} vertices, {} edges", safe.intervals.len(), safe.edges.len());
    Ok(Generated {
        plans,
        occupations,
        merged,
        flexibility: flex,
        safe,
        global_end,
        num_trains: scenario.max_train_id(),
    })
}
