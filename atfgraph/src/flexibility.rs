use std::collections::BTreeMap;
use trackgraph::BlockGraph;
use trackgraph::blocks::BlockId;

use crate::config::Config;
use crate::occupation::{BlockIntervals, TrainPlan};
use crate::TrainId;

/// Slack per (train, block). Missing entries count as zero.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Flexibility {
    pub buffer: BTreeMap<(TrainId, BlockId), f64>,
    pub recovery: BTreeMap<(TrainId, BlockId), f64>,
}

impl Flexibility {
    pub fn buffer(&self, train: TrainId, block: BlockId) -> f64 {
        self.buffer.get(&(train, block)).cloned().unwrap_or(0.0)
    }

    pub fn recovery(&self, train: TrainId, block: BlockId) -> f64 {
        self.recovery.get(&(train, block)).cloned().unwrap_or(0.0)
    }
}

/// Time between `own_end`, the end of `train`'s reservation of the block at
/// this point of its route, and the next reservation by another train.
fn gap_after(intervals: &BlockIntervals, block: BlockId, train: TrainId, own_end: f64,
             subject: Option<TrainId>) -> f64 {
    if !own_end.is_finite() {
        return std::f64::INFINITY;
    }
    intervals[block].iter()
        .filter(|i| i.train != train && Some(i.train) != subject && i.start >= own_end)
        .map(|i| i.start - own_end)
        .fold(std::f64::INFINITY, f64::min)
}

pub fn flexibility(blocks: &BlockGraph, intervals: &BlockIntervals, plans: &[TrainPlan], config: &Config) -> Flexibility {
    let mut flex = Flexibility::default();
    for plan in plans {
        if Some(plan.train) == config.agent {
            continue;
        }
        let mut last = std::f64::INFINITY;
        let mut compound = 0.0;
        for (block, recovery, own_end) in plan.route_blocks().rev() {
            last = last.min(gap_after(intervals, block, plan.train, own_end, config.agent));
            compound += recovery;
            let buffer = if config.use_recovery_time { last + compound } else { last };
            let buffer = buffer.min(config.max_buffer_time);
            for affected in blocks.affected_blocks(block) {
                flex.buffer.insert((plan.train, affected), buffer);
                flex.recovery.insert((plan.train, affected), compound);
            }
        }
        debug!("Train {}: minimum buffer {}", plan.train, last);
    }
    flex
}
