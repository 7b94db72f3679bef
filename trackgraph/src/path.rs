use std::cmp::Ordering;
use std::collections::BinaryHeap;
use ordered_float::OrderedFloat;

use crate::track::*;
use crate::TopologyError;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct QueuedNode {
    pub dist: OrderedFloat<f64>,
    pub node: usize,
}

impl Ord for QueuedNode {
    fn cmp(&self, other: &QueuedNode) -> Ordering {
        // Flipped to make the (maximum) BinaryHeap a minimum heap.
        other.dist.cmp(&self.dist)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueuedNode {
    fn partial_cmp(&self, other: &QueuedNode) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Fail)]
pub enum PathError {
    #[fail(display = "no path found between {} and {}", from, to)]
    NoPath { from: String, to: String },
    #[fail(display = "{}", _0)]
    Topology(#[cause] TopologyError),
}

impl From<TopologyError> for PathError {
    fn from(e: TopologyError) -> PathError {
        PathError::Topology(e)
    }
}

/// One edge of a planned movement. `departure` is set on the first edge
/// after an intermediate stop and holds the scheduled departure time.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PathStep {
    pub edge: EdgeId,
    pub departure: Option<f64>,
}

#[derive(Debug)]
pub struct ShortestPaths {
    pub source: NodeId,
    dist: Vec<f64>,
    prev: Vec<Option<EdgeId>>,
}

impl ShortestPaths {
    pub fn distance(&self, n: NodeId) -> f64 {
        self.dist[n]
    }

    /// Edges from the source to `n`, or None if unreachable.
    pub fn path_to(&self, g: &TrackGraph, n: NodeId) -> Option<Vec<EdgeId>> {
        if !self.dist[n].is_finite() {
            return None;
        }
        let mut edges = Vec::new();
        let mut node = n;
        while let Some(e) = self.prev[node] {
            edges.push(e);
            node = g.edges[e].from;
        }
        edges.reverse();
        Some(edges)
    }
}

pub fn dijkstra(g: &TrackGraph, source: NodeId) -> ShortestPaths {
    let mut dist = vec![std::f64::INFINITY; g.nodes.len()];
    let mut prev = vec![None; g.nodes.len()];
    let mut queue = BinaryHeap::new();
    dist[source] = 0.0;
    queue.push(QueuedNode { dist: OrderedFloat(0.0), node: source });

    while let Some(QueuedNode { dist: OrderedFloat(d), node }) = queue.pop() {
        if d > dist[node] { continue; } // stale entry
        for &e in &g.nodes[node].outgoing {
            let edge = &g.edges[e];
            let next = d + edge.length;
            if next < dist[edge.to] {
                dist[edge.to] = next;
                prev[edge.to] = Some(e);
                queue.push(QueuedNode { dist: OrderedFloat(next), node: edge.to });
            }
        }
    }

    ShortestPaths { source, dist, prev }
}

/// Closest reachable target from the given sources, as (source paths, target).
fn closest(g: &TrackGraph, sources: &[NodeId], targets: &[NodeId]) -> Option<(ShortestPaths, NodeId)> {
    let mut best: Option<(ShortestPaths, NodeId)> = None;
    for &s in sources {
        let paths = dijkstra(g, s);
        let target = targets.iter().cloned()
            .filter(|&t| paths.distance(t).is_finite())
            .min_by_key(|&t| OrderedFloat(paths.distance(t)));
        if let Some(t) = target {
            let better = match best {
                Some((ref p, bt)) => paths.distance(t) < p.distance(bt),
                None => true,
            };
            if better {
                best = Some((paths, t));
            }
        }
    }
    best
}

/// Plans a movement from `start` through the intermediate `stops`
/// (location, scheduled departure) to `end`.
pub fn construct_path(g: &TrackGraph, start: &str, stops: &[(&str, f64)], end: &str)
                      -> Result<Vec<PathStep>, PathError> {
    let mut waypoints = vec![(start, None)];
    waypoints.extend(stops.iter().map(|&(loc, time)| (loc, Some(time))));
    waypoints.push((end, None));

    let mut steps = Vec::new();
    let mut current: Vec<NodeId> = g.resolve_location(start)?.candidates().to_vec();
    let mut pending_departure = None;

    for pair in waypoints.windows(2) {
        let (from_name, departure) = pair[0];
        let (to_name, _) = pair[1];
        let targets = g.resolve_location(to_name)?.candidates();

        let (paths, target) = closest(g, &current, &targets)
            .ok_or_else(|| PathError::NoPath { from: from_name.to_string(), to: to_name.to_string() })?;
        let edges = paths.path_to(g, target)
            .ok_or_else(|| PathError::NoPath { from: from_name.to_string(), to: to_name.to_string() })?;
        debug!("Leg {} -> {}: {} edges, {:.1}m", from_name, to_name, edges.len(), paths.distance(target));

        if departure.is_some() {
            if let Some(carried) = pending_departure {
                debug!("Stop at {} replaces the departure {} of an earlier stop at the same place", from_name, carried);
            }
            pending_departure = departure;
        }
        if edges.is_empty() && pending_departure.is_some() {
            debug!("No edges between {} and {}, carrying the departure over", from_name, to_name);
        }
        for e in edges {
            steps.push(PathStep { edge: e, departure: pending_departure.take() });
        }
        current = vec![target];
    }

    // A stop at the end location keeps its dwell on the last edge.
    if let Some(departure) = pending_departure {
        match steps.last_mut() {
            Some(last) if last.departure.is_none() => last.departure = Some(departure),
            _ => debug!("Dropping departure {} at {}: no edge left to carry it", departure, end),
        }
    }

    Ok(steps)
}

#[test]
fn test_ordering() {
    let mut p = BinaryHeap::new();
    p.push(QueuedNode { dist: OrderedFloat(123.0), node: 0 });
    p.push(QueuedNode { dist: OrderedFloat(12.0), node: 1 });
    p.push(QueuedNode { dist: OrderedFloat(12.0), node: 2 });
    assert_eq!(p.pop().map(|q| q.node), Some(1));
    assert_eq!(p.pop().map(|q| q.node), Some(2));
    assert_eq!(p.pop().map(|q| q.node), Some(0));
}
