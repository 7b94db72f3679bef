use std::io::Write;
use trackgraph::{TrackGraph, BlockGraph};
use trackgraph::blocks::BlockId;

use crate::flexibility::Flexibility;
use crate::safe::{AtfEdge, SafeGraph};
use crate::TrainId;

fn block_on_tracks(track: &TrackGraph, blocks: &BlockGraph, b: BlockId, tracks: &[String]) -> bool {
    blocks.edges[b].track_nodes.iter().any(|&n| track.on_tracks(n, tracks))
}

/// Edges to write. With an allow-list, only edges where either end lies
/// on one of the listed tracks.
pub fn filter_edges<'a>(track: &TrackGraph, blocks: &BlockGraph, graph: &'a SafeGraph,
                        allowed_tracks: &[String]) -> Vec<&'a AtfEdge> {
    if allowed_tracks.is_empty() {
        return graph.edges.iter().collect();
    }
    debug!("Filtering edges on tracks {:?}", allowed_tracks);
    graph.edges.iter().filter(|e| {
        block_on_tracks(track, blocks, graph.intervals[e.from].block, allowed_tracks)
            || block_on_tracks(track, blocks, graph.intervals[e.to].block, allowed_tracks)
    }).collect()
}

/// Writes the safe interval graph in the search input format:
///
/// ```text
/// vertex count: <N>
/// edge count: <M>
/// <block> <start> <end> <trainBefore> <trainAfter> <bufferAfter>
/// <from> <to> <zeta> <alpha> <beta> <delta> <trainBefore> <recoveryBefore> <trainAfter> <bufferAfter> <recoveryAfter> <heuristic>
/// num_trains <maxTrainId>
/// ```
pub fn write_graph<W: Write>(w: &mut W, track: &TrackGraph, blocks: &BlockGraph, graph: &SafeGraph,
                             flex: &Flexibility, allowed_tracks: &[String], num_trains: TrainId)
                             -> Result<(), failure::Error> {
    let edges = filter_edges(track, blocks, graph, allowed_tracks);
    writeln!(w, "vertex count: {}", graph.intervals.len())?;
    writeln!(w, "edge count: {}", edges.len())?;
    for s in &graph.intervals {
        writeln!(w, "{} {} {} {} {} {}", blocks.identifier(s.block), s.start, s.end,
                 s.train_before, s.train_after, flex.buffer(s.train_after, s.block))?;
    }
    for e in edges {
        writeln!(w, "{} {} {} {} {} {} {} {} {} {} {} {}",
                 e.from, e.to, e.zeta, e.alpha, e.beta, e.delta,
                 e.train_before, e.recovery_before, e.train_after, e.buffer_after,
                 e.recovery_after, e.heuristic)?;
    }
    writeln!(w, "num_trains {}", num_trains)?;
    Ok(())
}
