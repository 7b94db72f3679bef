use trackgraph::BlockGraph;
use trackgraph::blocks::BlockId;

use crate::flexibility::Flexibility;
use crate::occupation::{BlockIntervals, OccupationInterval};
use crate::TrainId;

/// A maximal window in which a block is free. `index` is the vertex id
/// in the output graph.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SafeInterval {
    pub index: usize,
    pub block: BlockId,
    pub start: f64,
    pub end: f64,
    pub train_before: TrainId,
    pub train_after: TrainId,
}

/// Arrival-time function edge between safe intervals of consecutive blocks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AtfEdge {
    pub from: usize,
    pub to: usize,
    pub zeta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub delta: f64,
    pub train_before: TrainId,
    pub recovery_before: f64,
    pub train_after: TrainId,
    pub buffer_after: f64,
    pub recovery_after: f64,
    pub heuristic: f64,
}

#[derive(Debug, Default, Clone)]
pub struct SafeGraph {
    pub intervals: Vec<SafeInterval>,
    /// Indices into `intervals` per block, chronological.
    pub by_block: Vec<Vec<usize>>,
    pub edges: Vec<AtfEdge>,
}

/// Free windows of one block over `[0, global_end)`.
pub fn complement(block: BlockId, occupied: &[OccupationInterval], global_end: f64,
                  intervals: &mut Vec<SafeInterval>) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut push = |start: f64, end: f64, train_before: TrainId, train_after: TrainId| {
        let index = intervals.len();
        intervals.push(SafeInterval { index, block, start, end, train_before, train_after });
        indices.push(index);
    };

    let mut current = 0.0;
    let mut train_before = 0;
    for occ in occupied {
        let start = occ.start.max(0.0).min(global_end);
        if start > current {
            push(current, start, train_before, occ.train);
        } else if start == current {
            debug!("Skipping empty safe interval at {} on block {}", current, block);
        }
        train_before = occ.train;
        current = f64::max(current, occ.end);
    }
    if current < global_end {
        push(current, global_end, train_before, 0);
    }
    indices
}

/// Lower bound on the remaining travel time of the agent after entering
/// each block. Zero everywhere without a destination.
pub fn heuristic(blocks: &BlockGraph, destination: Option<usize>, agent_speed: f64) -> Vec<f64> {
    let target = match destination {
        Some(t) => t,
        None => return vec![0.0; blocks.edges.len()],
    };
    let dist = blocks.distances_to(target);
    blocks.edges.iter().map(|e| {
        if e.from == target {
            0.0
        } else {
            (e.length + dist[e.to]) / agent_speed
        }
    }).collect()
}

pub fn safe_graph(blocks: &BlockGraph, merged: &BlockIntervals, flex: &Flexibility,
                  global_end: f64, agent_speed: f64, heuristic: &[f64]) -> SafeGraph {
    let mut graph = SafeGraph::default();
    for (b, occupied) in merged.iter().enumerate() {
        let indices = complement(b, occupied, global_end, &mut graph.intervals);
        graph.by_block.push(indices);
    }

    for b1 in 0..blocks.edges.len() {
        let delta = blocks.edges[b1].length / agent_speed;
        for &b2 in blocks.successors(b1) {
            for &fi in &graph.by_block[b1] {
                let f = graph.intervals[fi];
                for &ti in &graph.by_block[b2] {
                    let t = graph.intervals[ti];
                    if t.start > f.end || t.end < f.start {
                        continue;
                    }
                    let alpha = f.start.max(t.start - delta);
                    let beta = f.end.min(t.end - delta);
                    if beta <= alpha {
                        continue;
                    }
                    graph.edges.push(AtfEdge {
                        from: fi,
                        to: ti,
                        zeta: f.start,
                        alpha,
                        beta,
                        delta,
                        train_before: t.train_before,
                        recovery_before: flex.recovery(t.train_before, b2),
                        train_after: t.train_after,
                        buffer_after: flex.buffer(t.train_after, b2),
                        recovery_after: flex.recovery(t.train_after, b2),
                        heuristic: heuristic[b2],
                    });
                }
            }
        }
    }
    graph
}
