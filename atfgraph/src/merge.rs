use std::cmp::Reverse;
use ordered_float::OrderedFloat;
use trackgraph::BlockGraph;

use crate::occupation::{BlockIntervals, OccupationInterval};
use crate::{GenerationError, TrainId};

/// Folds the reservations of all trains except `subject` into one sorted,
/// non-overlapping timeline per block.
pub fn merge_intervals(blocks: &BlockGraph, intervals: &BlockIntervals, subject: Option<TrainId>)
                       -> Result<BlockIntervals, GenerationError> {
    let mut merged = Vec::with_capacity(intervals.len());
    for (b, block_intervals) in intervals.iter().enumerate() {
        let kept = remove_contained(block_intervals, subject);
        let timeline = coalesce(kept);
        check_timeline(blocks, b, &timeline)?;
        merged.push(timeline);
    }
    Ok(merged)
}

fn remove_contained(intervals: &[OccupationInterval], subject: Option<TrainId>) -> Vec<OccupationInterval> {
    let mut sorted: Vec<OccupationInterval> = intervals.iter()
        .filter(|i| Some(i.train) != subject)
        .cloned().collect();
    // Longer first on equal start, so a contained interval always comes
    // after the one containing it.
    sorted.sort_by_key(|i| (OrderedFloat(i.start), Reverse(OrderedFloat(i.end))));

    let mut kept: Vec<OccupationInterval> = Vec::with_capacity(sorted.len());
    let mut max_end = std::f64::NEG_INFINITY;
    for interval in sorted {
        if interval.end <= max_end {
            continue;
        }
        max_end = interval.end;
        kept.push(interval);
    }
    kept
}

fn coalesce(intervals: Vec<OccupationInterval>) -> Vec<OccupationInterval> {
    let mut merged: Vec<OccupationInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let Some(last) = merged.last_mut() {
            if interval.start <= last.end {
                last.end = last.end.max(interval.end);
                last.duration += interval.duration;
                last.recovery += interval.recovery;
                last.train = interval.train;
                continue;
            }
        }
        merged.push(interval);
    }
    merged
}

fn check_timeline(blocks: &BlockGraph, b: usize, timeline: &[OccupationInterval]) -> Result<(), GenerationError> {
    for (i, interval) in timeline.iter().enumerate() {
        let detail = if interval.end < interval.start {
            Some(format!("interval {:?} ends before it starts", interval))
        } else if i > 0 && interval.start <= timeline[i - 1].end {
            Some(format!("interval {:?} starts before the end of {:?}", interval, timeline[i - 1]))
        } else {
            None
        };
        if let Some(detail) = detail {
            let block = blocks.identifier(b);
            error!("Block {}: {}", block, detail);
            return Err(GenerationError::Inconsistent { block, detail });
        }
    }
    Ok(())
}
