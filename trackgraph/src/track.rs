use std::collections::{BTreeMap, HashMap};
use smallvec::SmallVec;
use regex::Regex;

use crate::input::*;
use crate::TopologyError;

pub type NodeId = usize; // Index into TrackGraph.nodes
pub type EdgeId = usize; // Index into TrackGraph.edges
pub type PartIdx = usize; // Index into TrackGraph.parts

/// Speed limit on plain track, m/s.
pub const DEFAULT_MAX_SPEED: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct TrackNode {
    pub name: String,
    pub part: PartIdx,
    pub node_type: PartType,
    pub direction: Side,
    pub station_platform: bool,
    pub can_reverse: bool,
    pub outgoing: SmallVec<[EdgeId; 4]>,
    pub incoming: SmallVec<[EdgeId; 4]>,
    /// Same physical point, reachable by a zero-cost reversal.
    pub associated: SmallVec<[NodeId; 2]>,
    pub opposites: SmallVec<[NodeId; 2]>,
}

#[derive(Debug, Clone)]
pub struct TrackEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub length: f64,
    pub max_speed: f64,
    pub direction: Side,
    /// Edges on the same switch leg; they cannot be used at the same time.
    pub associated: SmallVec<[EdgeId; 2]>,
    pub opposites: SmallVec<[EdgeId; 2]>,
}

#[derive(Debug, Clone)]
pub struct PartInfo {
    pub id: PartId,
    pub name: String,
    pub kind: PartType,
    pub length: f64,
    pub a_nodes: SmallVec<[NodeId; 2]>,
    pub b_nodes: SmallVec<[NodeId; 2]>,
}

impl PartInfo {
    pub fn side_nodes(&self, side: Side) -> &[NodeId] {
        match side {
            Side::A => &self.a_nodes,
            Side::B => &self.b_nodes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Signal {
    pub name: String,
    pub node: NodeId,
}

/// A movement endpoint: either an exact node, or a place that can be
/// entered from both sides (station platform, bare track name).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Location {
    Node(NodeId),
    Sides(NodeId, NodeId),
}

impl Location {
    pub fn candidates(&self) -> SmallVec<[NodeId; 2]> {
        match *self {
            Location::Node(n) => SmallVec::from_slice(&[n]),
            Location::Sides(a, b) => SmallVec::from_slice(&[a, b]),
        }
    }
}

#[derive(Debug, Default)]
pub struct TrackGraph {
    pub nodes: Vec<TrackNode>,
    pub edges: Vec<TrackEdge>,
    pub parts: Vec<PartInfo>,
    pub signals: Vec<Signal>,
    pub stations: BTreeMap<String, (NodeId, NodeId)>,
    pub distance_markers: BTreeMap<String, f64>,
    node_names: HashMap<String, NodeId>,
    part_names: HashMap<String, PartIdx>,
    part_ids: HashMap<PartId, PartIdx>,
}

impl TrackGraph {
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_names.get(name).cloned()
    }

    pub fn part_by_id(&self, id: &str) -> Option<PartIdx> {
        self.part_ids.get(id).cloned()
    }

    pub fn part_of(&self, n: NodeId) -> &PartInfo {
        &self.parts[self.nodes[n].part]
    }

    pub fn resolve_location(&self, name: &str) -> Result<Location, TopologyError> {
        if let Some(n) = self.node_by_name(name) {
            return Ok(Location::Node(n));
        }
        if let Some(&(a, b)) = self.stations.get(name).or_else(|| self.stations.get(&name.to_uppercase())) {
            return Ok(Location::Sides(a, b));
        }
        let part = self.part_names.get(name).or_else(|| self.part_ids.get(name));
        if let Some(&p) = part {
            let part = &self.parts[p];
            if let (Some(&a), Some(&b)) = (part.a_nodes.first(), part.b_nodes.first()) {
                return Ok(Location::Sides(a, b));
            }
        }
        Err(TopologyError::UnknownLocation(name.to_string()))
    }

    /// Whether the node lies on one of the given track parts, matched
    /// by id or by name.
    pub fn on_tracks(&self, n: NodeId, tracks: &[String]) -> bool {
        let part = self.part_of(n);
        tracks.iter().any(|t| *t == part.id || *t == part.name)
    }
}

/// Sequence generator for builder-assigned ids.
#[derive(Debug, Default)]
struct Sequence(usize);

impl Sequence {
    fn next(&mut self) -> usize {
        let id = self.0;
        self.0 += 1;
        id
    }
}

pub struct TopologyBuilder {
    graph: TrackGraph,
    part_seq: Sequence,
    edge_seq: Sequence,
    side_switches: SideSwitchPairs,
}

pub fn build(topology: &Topology) -> Result<TrackGraph, TopologyError> {
    TopologyBuilder::new()?.build(topology)
}

impl TopologyBuilder {
    pub fn new() -> Result<Self, TopologyError> {
        Ok(TopologyBuilder {
            graph: Default::default(),
            part_seq: Default::default(),
            edge_seq: Default::default(),
            side_switches: SideSwitchPairs::new()?,
        })
    }

    pub fn build(mut self, topology: &Topology) -> Result<TrackGraph, TopologyError> {
        for part in &topology.track_parts {
            self.add_part_nodes(part);
        }
        for part in &topology.track_parts {
            self.add_part_edges(part)?;
        }
        self.assign_opposite_edges();
        self.add_distance_markers(topology);
        self.add_signals(topology)?;
        self.add_stations(topology)?;
        debug!("Track graph has {} nodes and {} edges",
               self.graph.nodes.len(), self.graph.edges.len());
        Ok(self.graph)
    }

    fn new_node(&mut self, part_idx: PartIdx, part: &TrackPart, suffix: &str) -> NodeId {
        let id = self.graph.nodes.len();
        let name = format!("{}{}", part.name, suffix);
        let direction = if suffix.starts_with('A') { Side::A } else { Side::B };
        self.graph.nodes.push(TrackNode {
            name: name.clone(),
            part: part_idx,
            node_type: part.kind,
            direction,
            station_platform: false,
            can_reverse: false,
            outgoing: SmallVec::new(),
            incoming: SmallVec::new(),
            associated: SmallVec::new(),
            opposites: SmallVec::new(),
        });
        self.graph.node_names.insert(name, id);
        id
    }

    fn set_opposite(&mut self, a: NodeId, b: NodeId) {
        self.graph.nodes[a].opposites.push(b);
        self.graph.nodes[b].opposites.push(a);
    }

    fn add_part_nodes(&mut self, part: &TrackPart) {
        let part_idx = self.part_seq.next();
        let single_sided = part.a_side.len() == 1 || part.b_side.len() == 1;
        let (a_nodes, b_nodes): (SmallVec<[NodeId; 2]>, SmallVec<[NodeId; 2]>) = match part.kind {
            PartType::RailRoad | PartType::Bumper => self.add_track_nodes(part_idx, part),
            PartType::SideSwitch if single_sided => self.add_track_nodes(part_idx, part),
            PartType::Switch | PartType::SideSwitch => {
                if part.a_side.len() > part.b_side.len() {
                    let ar = self.new_node(part_idx, part, "AR");
                    let al = self.new_node(part_idx, part, "AL");
                    let b = self.new_node(part_idx, part, "B");
                    self.set_opposite(ar, b);
                    self.set_opposite(al, b);
                    (SmallVec::from_slice(&[ar, al]), SmallVec::from_slice(&[b]))
                } else {
                    let a = self.new_node(part_idx, part, "A");
                    let br = self.new_node(part_idx, part, "BR");
                    let bl = self.new_node(part_idx, part, "BL");
                    self.set_opposite(a, br);
                    self.set_opposite(a, bl);
                    (SmallVec::from_slice(&[a]), SmallVec::from_slice(&[br, bl]))
                }
            }
            PartType::EnglishSwitch => {
                let ar = self.new_node(part_idx, part, "AR");
                let al = self.new_node(part_idx, part, "AL");
                let br = self.new_node(part_idx, part, "BR");
                let bl = self.new_node(part_idx, part, "BL");
                for &a in &[ar, al] {
                    for &b in &[br, bl] {
                        self.set_opposite(a, b);
                    }
                }
                (SmallVec::from_slice(&[ar, al]), SmallVec::from_slice(&[br, bl]))
            }
        };

        self.graph.part_ids.insert(part.id.clone(), part_idx);
        self.graph.part_names.insert(part.name.clone(), part_idx);
        self.graph.parts.push(PartInfo {
            id: part.id.clone(),
            name: part.name.clone(),
            kind: part.kind,
            length: part.length,
            a_nodes,
            b_nodes,
        });
    }

    fn add_track_nodes(&mut self, part_idx: PartIdx, part: &TrackPart)
                       -> (SmallVec<[NodeId; 2]>, SmallVec<[NodeId; 2]>) {
        let a = self.new_node(part_idx, part, "A");
        let b = self.new_node(part_idx, part, "B");
        for &n in &[a, b] {
            self.graph.nodes[n].station_platform = part.station_platform;
            self.graph.nodes[n].can_reverse = part.saw_movement_allowed;
        }
        if part.saw_movement_allowed {
            self.graph.nodes[a].associated.push(b);
            self.graph.nodes[b].associated.push(a);
        }
        self.set_opposite(a, b);
        (SmallVec::from_slice(&[a]), SmallVec::from_slice(&[b]))
    }

    fn add_edge(&mut self, from: NodeId, to: NodeId, length: f64, max_speed: f64) -> EdgeId {
        let id = self.edge_seq.next();
        let direction = self.graph.nodes[from].direction;
        self.graph.edges.push(TrackEdge {
            from,
            to,
            length,
            max_speed,
            direction,
            associated: SmallVec::new(),
            opposites: SmallVec::new(),
        });
        self.graph.nodes[from].outgoing.push(id);
        self.graph.nodes[to].incoming.push(id);
        id
    }

    fn part(&self, id: &str, referenced_from: &str) -> Result<PartIdx, TopologyError> {
        self.graph.part_by_id(id)
            .ok_or_else(|| TopologyError::UnknownTrackPart(id.to_string(), referenced_from.to_string()))
    }

    fn side_node(&self, part_idx: PartIdx, side: Side, i: usize) -> Result<NodeId, TopologyError> {
        let part = &self.graph.parts[part_idx];
        part.side_nodes(side).get(i).cloned()
            .ok_or_else(|| TopologyError::UnknownNode(format!("{}{}[{}]", part.name, side.as_str(), i)))
    }

    /// Connects one side of a part to the same-side nodes of its
    /// neighbours. Returns the created edges and whether the side is
    /// connected to anything.
    fn connect_side(&mut self, part: &TrackPart, side: Side) -> Result<(Vec<EdgeId>, bool), TopologyError> {
        let part_idx = self.part(&part.id, &part.name)?;
        let max_speed = edge_speed(part)?;
        let neighbours = match side {
            Side::A => &part.a_side,
            Side::B => &part.b_side,
        };
        let mut edges = Vec::new();
        let mut connected = false;
        for (i, neighbour_id) in neighbours.iter().enumerate() {
            let from = self.side_node(part_idx, side, i)?;
            let neighbour = self.part(neighbour_id, &part.name)?;
            connected = true;
            // Edges carry the length of the part they lead into.
            let length = self.graph.parts[neighbour].length;
            let targets = self.graph.parts[neighbour].side_nodes(side).to_vec();
            for to in targets {
                edges.push(self.add_edge(from, to, length, max_speed));
            }

            if self.graph.nodes[from].node_type == PartType::Bumper && part.saw_movement_allowed {
                let back = self.side_node(part_idx, side.opposite(), i)?;
                self.add_edge(back, from, part.length, DEFAULT_MAX_SPEED);
            }
        }
        Ok((edges, connected))
    }

    fn add_part_edges(&mut self, part: &TrackPart) -> Result<(), TopologyError> {
        let (a_edges, a_connected) = self.connect_side(part, Side::A)?;
        let (b_edges, b_connected) = self.connect_side(part, Side::B)?;

        if part.kind == PartType::SideSwitch {
            self.connect_side_switch(part)?;
        }

        if part.kind == PartType::RailRoad && part.saw_movement_allowed && a_connected && b_connected {
            let part_idx = self.part(&part.id, &part.name)?;
            let a = self.side_node(part_idx, Side::A, 0)?;
            let b = self.side_node(part_idx, Side::B, 0)?;
            self.add_edge(a, b, 0.0, DEFAULT_MAX_SPEED);
            self.add_edge(b, a, 0.0, DEFAULT_MAX_SPEED);
        }

        self.associate_edges(&a_edges);
        self.associate_edges(&b_edges);
        Ok(())
    }

    fn associate_edges(&mut self, edges: &[EdgeId]) {
        for &x in edges {
            for &y in edges {
                if x == y { continue; }
                let (ex, ey) = (&self.graph.edges[x], &self.graph.edges[y]);
                if (ex.from == ey.from || ex.to == ey.to) && !ex.associated.contains(&y) {
                    self.graph.edges[x].associated.push(y);
                }
            }
        }
    }

    /// A side switch has one open side. That side is joined by zero-length
    /// connectors to the paired side switch, whose name has the two
    /// characters before the trailing `-` swapped.
    fn connect_side_switch(&mut self, part: &TrackPart) -> Result<(), TopologyError> {
        let (from_side, to_side) = match (part.a_side.is_empty(), part.b_side.is_empty()) {
            (true, false) => (Side::A, Side::B),
            (false, true) => (Side::B, Side::A),
            _ => return Err(TopologyError::MissingSideSwitchPair(part.name.clone())),
        };
        let from = self.graph.node_by_name(&format!("{}{}", part.name, from_side.as_str()))
            .ok_or_else(|| TopologyError::UnknownNode(format!("{}{}", part.name, from_side.as_str())))?;

        let pair = self.side_switches.pair(&part.name)
            .ok_or_else(|| TopologyError::MissingSideSwitchPair(part.name.clone()))?;
        let base = format!("{}{}", pair, to_side.as_str());
        let targets: Vec<NodeId> = match self.graph.node_by_name(&base) {
            Some(n) => vec![n],
            None => ["L", "R"].iter()
                .filter_map(|leg| self.graph.node_by_name(&format!("{}{}", base, leg)))
                .collect(),
        };
        if targets.is_empty() {
            return Err(TopologyError::MissingSideSwitchPair(part.name.clone()));
        }
        for to in targets {
            self.add_edge(from, to, 0.0, DEFAULT_MAX_SPEED);
        }
        Ok(())
    }

    /// `u -> v` is opposite to `u' -> v'` when `u'` is opposite to `v`
    /// and `v'` is opposite to `u`.
    fn assign_opposite_edges(&mut self) {
        let g = &self.graph;
        let mut pairs = Vec::new();
        for (e_idx, e) in g.edges.iter().enumerate() {
            for &o in &g.nodes[e.to].opposites {
                for &f_idx in &g.nodes[o].outgoing {
                    if g.nodes[e.from].opposites.contains(&g.edges[f_idx].to) {
                        pairs.push((e_idx, f_idx));
                    }
                }
            }
        }
        for (e, f) in pairs {
            if !self.graph.edges[e].opposites.contains(&f) {
                self.graph.edges[e].opposites.push(f);
            }
            if !self.graph.edges[f].opposites.contains(&e) {
                self.graph.edges[f].opposites.push(e);
            }
        }
    }

    fn add_distance_markers(&mut self, topology: &Topology) {
        let markers = match topology.distance_markers {
            Some(ref m) if !m.is_empty() => m.clone(),
            _ => {
                let mut m = HashMap::new();
                m.insert("Start".to_string(), 0.0);
                m
            }
        };
        let min = markers.values().cloned().fold(std::f64::INFINITY, f64::min);
        self.graph.distance_markers = markers.into_iter().map(|(k, v)| (k, v - min)).collect();
    }

    fn add_signals(&mut self, topology: &Topology) -> Result<(), TopologyError> {
        for signal in &topology.signals {
            let part = self.part(&signal.track, &signal.name)?;
            let node = self.side_node(part, signal.side, 0)?;
            self.graph.signals.push(Signal { name: signal.name.clone(), node });
        }
        Ok(())
    }

    fn add_stations(&mut self, topology: &Topology) -> Result<(), TopologyError> {
        for station in &topology.stations {
            let key = format!("{}|{}", station.station_name.to_uppercase(), station.platform);
            let part_idx = self.part(&station.track_id, &key)?;
            let part = &self.graph.parts[part_idx];
            if part.a_nodes.len() != 1 || part.b_nodes.len() != 1 {
                warn!("Found platform {} on a switch: {}", key, part.name);
            }
            let a = self.side_node(part_idx, Side::A, 0)?;
            let b = self.side_node(part_idx, Side::B, 0)?;
            self.graph.stations.insert(key, (a, b));
        }
        Ok(())
    }
}

/// Side switches come in pairs named by swapping the two characters
/// before the trailing `-`.
pub struct SideSwitchPairs {
    re: Regex,
}

impl SideSwitchPairs {
    pub fn new() -> Result<Self, TopologyError> {
        let re = Regex::new(r"^(?P<base>.*)(?P<x>.)(?P<y>.)-$")
            .map_err(|e| TopologyError::RegexError(format!("{:?}", e)))?;
        Ok(SideSwitchPairs { re })
    }

    /// Name of the side switch paired with `name`, e.g. `sw12-` pairs with `sw21-`.
    pub fn pair(&self, name: &str) -> Option<String> {
        let c = self.re.captures(name)?;
        Some(format!("{}{}{}-", &c["base"], &c["y"], &c["x"]))
    }
}

fn edge_speed(part: &TrackPart) -> Result<f64, TopologyError> {
    match part.switch_angle {
        Some(ref angle) if part.kind.is_switch() => switch_speed(angle),
        _ => Ok(DEFAULT_MAX_SPEED),
    }
}

/// Maximum speed (m/s) over a switch with the given divergence angle 1:N.
pub fn switch_speed(angle: &SwitchAngle) -> Result<f64, TopologyError> {
    let ratio = match *angle {
        SwitchAngle::Ratio(n) => n,
        SwitchAngle::Text(ref s) => {
            let n = s.rsplit(':').next().unwrap_or("");
            n.trim().parse::<f64>()
                .map_err(|_| TopologyError::InvalidSwitchAngle(s.clone()))?
        }
    };
    let kmh = if ratio < 9.0 { 30.0 }
        else if ratio < 12.0 { 40.0 }
        else if ratio < 15.0 { 60.0 }
        else if ratio < 18.0 { 80.0 }
        else if ratio < 29.0 { 100.0 }
        else { 140.0 };
    Ok(kmh / 3.6)
}

#[test]
fn test_paired_side_switch() {
    let pairs = SideSwitchPairs::new().unwrap();
    assert_eq!(pairs.pair("s-1-2-").as_ref().map(|s| s.as_str()), Some("s-12--"));
    assert_eq!(pairs.pair("sw12-").as_ref().map(|s| s.as_str()), Some("sw21-"));
    assert_eq!(pairs.pair("x"), None);
    // Reused for every lookup.
    assert_eq!(pairs.pair("sw21-").as_ref().map(|s| s.as_str()), Some("sw12-"));
}

#[test]
fn test_switch_speed() {
    assert_eq!(switch_speed(&SwitchAngle::Text("1:9".to_string())).unwrap(), 40.0 / 3.6);
    assert_eq!(switch_speed(&SwitchAngle::Ratio(15.0)).unwrap(), 80.0 / 3.6);
    assert!(switch_speed(&SwitchAngle::Text("steep".to_string())).is_err());
}
