use trackgraph::{TrackGraph, BlockGraph};
use trackgraph::blocks::BlockId;
use trackgraph::path::{construct_path, PathStep};

use crate::config::Config;
use crate::input::scenario::{Scenario, Train, TrainSpec};
use crate::{GenerationError, TrainId};

/// A block is unavailable to every other train during `[start, end)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OccupationInterval {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub train: TrainId,
    pub recovery: f64,
}

/// Occupations per block, indexed by `BlockId`.
pub type BlockIntervals = Vec<Vec<OccupationInterval>>;

#[derive(Debug, Copy, Clone)]
pub struct Parameters {
    pub release_time: f64,
    pub setup_time: f64,
    pub sight_reaction_time: f64,
    pub minimum_stop_time: f64,
    pub running_time_margin: f64,
    pub sighting_blocks: usize,
}

impl Parameters {
    pub fn new(scenario: &Scenario, config: &Config) -> Parameters {
        Parameters {
            release_time: scenario.release_time,
            setup_time: scenario.setup_time,
            sight_reaction_time: scenario.sight_reaction_time,
            minimum_stop_time: scenario.minimum_stop_time,
            running_time_margin: config.running_time_margin,
            sighting_blocks: config.sighting_blocks,
        }
    }
}

/// The blocks a movement passes, in order. `step_block[i]` is the index
/// into `blocks` of the block carrying path step `i`, if any.
#[derive(Debug, Clone, Default)]
pub struct BlockRoute {
    pub blocks: Vec<BlockId>,
    pub step_block: Vec<Option<usize>>,
}

/// Planned movements of one train with their block routes.
#[derive(Debug, Clone)]
pub struct TrainPlan {
    pub train: TrainId,
    pub paths: Vec<Vec<PathStep>>,
    pub routes: Vec<BlockRoute>,
    /// Recovery time per route block, parallel to `routes[i].blocks`.
    pub recovery: Vec<Vec<f64>>,
    /// End of this train's own occupation per route block.
    pub occupied_until: Vec<Vec<f64>>,
}

impl TrainPlan {
    /// All route blocks over all movements with their recovery time and
    /// the end of the train's occupation at that point of the route.
    pub fn route_blocks<'a>(&'a self) -> impl DoubleEndedIterator<Item = (BlockId, f64, f64)> + 'a {
        self.routes.iter().zip(self.recovery.iter()).zip(self.occupied_until.iter())
            .flat_map(|((r, recovery), until)| {
                r.blocks.iter().zip(recovery.iter()).zip(until.iter())
                    .map(|((&b, &rec), &until)| (b, rec, until))
            })
    }
}

/// Per route block results of reserving one movement.
#[derive(Debug, Clone, Default)]
pub struct MovementOccupation {
    pub recovery: Vec<f64>,
    pub occupied_until: Vec<f64>,
}

fn transition_at(nodes: &[usize], from: usize, to: usize) -> Option<usize> {
    nodes.windows(2).position(|w| w[0] == from && w[1] == to)
}

/// Maps each step of a track path onto the block that carries it.
pub fn block_route(track: &TrackGraph, blocks: &BlockGraph, steps: &[PathStep]) -> BlockRoute {
    let transitions: Vec<(usize, usize)> = steps.iter()
        .map(|s| (track.edges[s.edge].from, track.edges[s.edge].to))
        .collect();
    let mut route = BlockRoute::default();
    let mut current: Option<(BlockId, usize)> = None;

    for (i, &(from, to)) in transitions.iter().enumerate() {
        if let Some((b, pos)) = current {
            let nodes = &blocks.edges[b].track_nodes;
            if nodes.get(pos) == Some(&from) && nodes.get(pos + 1) == Some(&to) {
                current = Some((b, pos + 1));
                route.step_block.push(Some(route.blocks.len() - 1));
                continue;
            }
        }

        // Prefer the block that follows the path furthest ahead.
        let mut best: Option<(usize, BlockId, usize)> = None;
        for &b in &blocks.same_direction[from] {
            let nodes = &blocks.edges[b].track_nodes;
            if let Some(pos) = transition_at(nodes, from, to) {
                let matched = transitions[i..].iter().zip(nodes[pos..].windows(2))
                    .take_while(|&(&(f, t), w)| w[0] == f && w[1] == t)
                    .count();
                if best.map(|(m, _, _)| matched > m).unwrap_or(true) {
                    best = Some((matched, b, pos));
                }
            }
        }

        match best {
            Some((_, b, pos)) => {
                route.blocks.push(b);
                route.step_block.push(Some(route.blocks.len() - 1));
                current = Some((b, pos + 1));
            }
            None => {
                debug!("No block covers {} -> {}", track.nodes[from].name, track.nodes[to].name);
                route.step_block.push(None);
                current = None;
            }
        }
    }
    route
}

/// Reserves blocks for one movement. Returns the recovery time and the
/// occupation end per route block.
pub fn occupy_movement(track: &TrackGraph, blocks: &BlockGraph, steps: &[PathStep], route: &BlockRoute,
                       start_time: f64, train: &TrainSpec, params: &Parameters,
                       intervals: &mut BlockIntervals) -> MovementOccupation {
    let mut result = MovementOccupation {
        recovery: vec![0.0; route.blocks.len()],
        occupied_until: vec![std::f64::NEG_INFINITY; route.blocks.len()],
    };
    let mut cur_time = start_time;

    for (i, step) in steps.iter().enumerate() {
        let e = &track.edges[step.edge];
        let v = e.max_speed.min(train.speed);
        let run = e.length / v;
        let station_time = match step.departure {
            Some(departure) => params.minimum_stop_time.max(departure - cur_time),
            None => 0.0,
        };
        let clearing_time = train.length / v;
        let occupation_end = cur_time + run + clearing_time + station_time + params.release_time;
        let recovery_time = match step.departure {
            Some(_) => station_time - params.minimum_stop_time,
            None => run - e.length / (v * params.running_time_margin),
        };

        let occupation = OccupationInterval {
            start: cur_time,
            end: occupation_end,
            duration: run + station_time,
            train: train.id,
            recovery: recovery_time,
        };
        for b in blocks.blocks_at(e.from) {
            intervals[b].push(occupation);
        }

        if let Some(p) = route.step_block[i] {
            result.recovery[p] += recovery_time;
            result.occupied_until[p] = result.occupied_until[p].max(occupation_end);

            let sighting = OccupationInterval {
                start: cur_time - params.setup_time - params.sight_reaction_time,
                end: cur_time + station_time + run,
                duration: 0.0,
                train: train.id,
                recovery: 0.0,
            };
            let ahead = route.blocks.iter().skip(p + 1).take(params.sighting_blocks);
            let mut claimed: Vec<BlockId> = ahead.flat_map(|&b| blocks.affected_blocks(b)).collect();
            claimed.sort();
            claimed.dedup();
            for b in claimed {
                intervals[b].push(sighting);
            }
        }

        cur_time += run + station_time;
    }

    result
}

/// Plans every movement of a train and records its block occupations.
pub fn occupy_train(track: &TrackGraph, blocks: &BlockGraph, scenario: &Scenario, train: &Train,
                    params: &Parameters, intervals: &mut BlockIntervals) -> Result<TrainPlan, GenerationError> {
    let spec = scenario.train_spec(train)?;
    let mut plan = TrainPlan {
        train: spec.id,
        paths: Vec::new(),
        routes: Vec::new(),
        recovery: Vec::new(),
        occupied_until: Vec::new(),
    };

    for (index, movement) in train.movements.iter().enumerate() {
        let steps = construct_path(track, &movement.start_location, &movement.stop_list(), &movement.end_location)
            .map_err(|cause| GenerationError::Movement { train: spec.id, index, cause })?;
        let route = block_route(track, blocks, &steps);
        debug!("Train {} movement {}: {} edges over {} blocks", spec.id, index, steps.len(), route.blocks.len());
        let occupied = occupy_movement(track, blocks, &steps, &route, movement.start_time, &spec, params, intervals);
        plan.paths.push(steps);
        plan.routes.push(route);
        plan.recovery.push(occupied.recovery);
        plan.occupied_until.push(occupied.occupied_until);
    }

    Ok(plan)
}
