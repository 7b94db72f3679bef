use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use smallvec::SmallVec;
use ordered_float::OrderedFloat;

use crate::input::Side;
use crate::path::QueuedNode;
use crate::track::*;

pub type BlockNodeId = usize;
pub type BlockId = usize;

#[derive(Debug, Clone)]
pub struct BlockNode {
    pub name: String,
    pub signal: Option<usize>,
    /// None for phantom nodes introduced when resolving loops.
    pub track_node: Option<NodeId>,
    pub outgoing: SmallVec<[BlockId; 4]>,
    pub incoming: SmallVec<[BlockId; 4]>,
}

#[derive(Debug, Clone)]
pub struct BlockEdge {
    pub from: BlockNodeId,
    pub to: BlockNodeId,
    /// Traversed track nodes, both signal nodes included.
    pub track_nodes: Vec<NodeId>,
    pub length: f64,
    pub max_speed: f64,
    pub direction: Side,
}

#[derive(Debug, Default)]
pub struct BlockGraph {
    pub nodes: Vec<BlockNode>,
    pub edges: Vec<BlockEdge>,
    /// Per track node: blocks running over it.
    pub same_direction: Vec<SmallVec<[BlockId; 4]>>,
    /// Per track node: blocks running over one of its opposite nodes.
    pub opposite_direction: Vec<SmallVec<[BlockId; 4]>>,
}

impl BlockGraph {
    /// All blocks claimed by occupying the track node, in either direction.
    pub fn blocks_at(&self, n: NodeId) -> Vec<BlockId> {
        let mut blocks: Vec<BlockId> = self.same_direction[n].iter()
            .chain(self.opposite_direction[n].iter())
            .cloned().collect();
        blocks.sort();
        blocks.dedup();
        blocks
    }

    pub fn affected_blocks(&self, b: BlockId) -> Vec<BlockId> {
        let mut blocks = Vec::new();
        for &n in &self.edges[b].track_nodes {
            blocks.extend(self.blocks_at(n));
        }
        blocks.sort();
        blocks.dedup();
        blocks
    }

    pub fn identifier(&self, b: BlockId) -> String {
        let e = &self.edges[b];
        format!("{}--{}--{}", self.nodes[e.from].name, self.nodes[e.to].name, b)
    }

    /// Looks up a block node by name, with or without the `r-` prefix.
    pub fn find_node(&self, name: &str) -> Option<BlockNodeId> {
        let prefixed = format!("r-{}", name);
        self.nodes.iter().position(|n| n.name == name || n.name == prefixed)
    }

    pub fn find_block(&self, identifier: &str) -> Option<BlockId> {
        (0..self.edges.len()).find(|&b| self.identifier(b) == identifier)
    }

    pub fn successors(&self, b: BlockId) -> &[BlockId] {
        &self.nodes[self.edges[b].to].outgoing
    }

    /// Shortest block-length distance from every block node to `target`.
    pub fn distances_to(&self, target: BlockNodeId) -> Vec<f64> {
        let mut dist = vec![std::f64::INFINITY; self.nodes.len()];
        let mut queue = BinaryHeap::new();
        dist[target] = 0.0;
        queue.push(QueuedNode { dist: OrderedFloat(0.0), node: target });
        while let Some(QueuedNode { dist: OrderedFloat(d), node }) = queue.pop() {
            if d > dist[node] { continue; }
            for &b in &self.nodes[node].incoming {
                let e = &self.edges[b];
                let next = d + e.length;
                if next < dist[e.from] {
                    dist[e.from] = next;
                    queue.push(QueuedNode { dist: OrderedFloat(next), node: e.from });
                }
            }
        }
        dist
    }

    fn add_node(&mut self, name: String, signal: Option<usize>, track_node: Option<NodeId>) -> BlockNodeId {
        self.nodes.push(BlockNode {
            name,
            signal,
            track_node,
            outgoing: SmallVec::new(),
            incoming: SmallVec::new(),
        });
        self.nodes.len() - 1
    }

    fn add_edge(&mut self, g: &TrackGraph, from: BlockNodeId, to: BlockNodeId, path: &Path) -> BlockId {
        let id = self.edges.len();
        let direction = g.nodes[path.nodes[0]].direction;
        self.edges.push(BlockEdge {
            from,
            to,
            track_nodes: path.nodes.clone(),
            length: path.length,
            max_speed: if path.max_speed.is_finite() { path.max_speed } else { DEFAULT_MAX_SPEED },
            direction,
        });
        self.nodes[from].outgoing.push(id);
        self.nodes[to].incoming.push(id);
        for &n in &path.nodes {
            if !self.same_direction[n].contains(&id) {
                self.same_direction[n].push(id);
            }
            for &o in &g.nodes[n].opposites {
                if !self.opposite_direction[o].contains(&id) {
                    self.opposite_direction[o].push(id);
                }
            }
        }
        id
    }
}

#[derive(Debug, Clone)]
struct Path {
    nodes: Vec<NodeId>,
    length: f64,
    max_speed: f64,
}

impl Path {
    fn start(n: NodeId) -> Path {
        Path { nodes: vec![n], length: 0.0, max_speed: std::f64::INFINITY }
    }

    fn extend(&self, e: &TrackEdge) -> Path {
        let mut nodes = self.nodes.clone();
        nodes.push(e.to);
        Path {
            nodes,
            length: self.length + e.length,
            max_speed: self.max_speed.min(e.max_speed),
        }
    }

    fn signature(&self) -> (NodeId, Vec<NodeId>) {
        let mut visited = self.nodes.clone();
        visited.sort();
        (*self.nodes.last().unwrap_or(&0), visited)
    }
}

pub fn build_blocks(g: &TrackGraph) -> BlockGraph {
    let mut blocks = BlockGraph {
        nodes: Vec::new(),
        edges: Vec::new(),
        same_direction: vec![SmallVec::new(); g.nodes.len()],
        opposite_direction: vec![SmallVec::new(); g.nodes.len()],
    };

    let mut signal_nodes: HashMap<NodeId, BlockNodeId> = HashMap::new();
    for (i, signal) in g.signals.iter().enumerate() {
        if let Some(&other) = signal_nodes.get(&signal.node) {
            warn!("Signal {} shares node {} with {}; using the first",
                  signal.name, g.nodes[signal.node].name, blocks.nodes[other].name);
            continue;
        }
        let id = blocks.add_node(format!("r-{}", signal.name), Some(i), Some(signal.node));
        signal_nodes.insert(signal.node, id);
    }

    let origins: Vec<(BlockNodeId, NodeId)> = blocks.nodes.iter().enumerate()
        .filter_map(|(i, n)| n.track_node.map(|t| (i, t)))
        .collect();
    for (block_node, origin) in origins {
        expand_signal(g, &mut blocks, &signal_nodes, block_node, origin);
    }

    debug!("Block graph has {} nodes and {} blocks", blocks.nodes.len(), blocks.edges.len());
    blocks
}

fn expand_signal(g: &TrackGraph, blocks: &mut BlockGraph,
                 signal_nodes: &HashMap<NodeId, BlockNodeId>,
                 block_node: BlockNodeId, origin: NodeId) {
    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    let mut phantom: Option<BlockNodeId> = None;
    queue.push_back(Path::start(origin));

    while let Some(path) = queue.pop_front() {
        let last = *path.nodes.last().unwrap_or(&origin);
        for &e in &g.nodes[last].outgoing {
            let edge = &g.edges[e];
            let next = edge.to;
            let extended = path.extend(edge);

            if next == origin || g.nodes[origin].associated.contains(&next) {
                let loop_node = match phantom {
                    Some(p) => p,
                    None => {
                        let name = format!("{}~loop", blocks.nodes[block_node].name);
                        let p = blocks.add_node(name, None, None);
                        add_connector(blocks, p, block_node, g.nodes[origin].direction);
                        phantom = Some(p);
                        p
                    }
                };
                debug!("Route from {} loops back at {}", g.nodes[origin].name, g.nodes[next].name);
                blocks.add_edge(g, block_node, loop_node, &extended);
                continue;
            }

            if path.nodes.contains(&next) {
                warn!("Unresolved loop from {} re-entering {}", g.nodes[origin].name, g.nodes[next].name);
                continue;
            }

            if let Some(&to) = signal_nodes.get(&next) {
                blocks.add_edge(g, block_node, to, &extended);
                continue;
            }

            if g.nodes[origin].opposites.contains(&next) {
                warn!("Unresolved reversal from {} onto opposite {}", g.nodes[origin].name, g.nodes[next].name);
            }

            if g.nodes[next].outgoing.is_empty() {
                debug!("Dropping dead end at {} from {}", g.nodes[next].name, g.nodes[origin].name);
                continue;
            }

            if visited.insert(extended.signature()) {
                queue.push_back(extended);
            }
        }
    }
}

/// Zero-length block without track nodes. It claims no track and is only
/// used to link a loop back to the block node it started from.
fn add_connector(blocks: &mut BlockGraph, from: BlockNodeId, to: BlockNodeId, direction: Side) -> BlockId {
    let id = blocks.edges.len();
    blocks.edges.push(BlockEdge {
        from,
        to,
        track_nodes: Vec::new(),
        length: 0.0,
        max_speed: DEFAULT_MAX_SPEED,
        direction,
    });
    blocks.nodes[from].outgoing.push(id);
    blocks.nodes[to].incoming.push(id);
    id
}
