use crate::TrainId;

/// Assumed ratio between scheduled and minimum running time. The
/// difference counts as recovery time on edges without a stop.
pub const RUNNING_TIME_MARGIN: f64 = 1.08;

/// Number of blocks ahead of a train reserved for signal sighting.
pub const SIGHTING_BLOCKS: usize = 2;

pub const DEFAULT_AGENT_SPEED: f64 = 40.0;

#[derive(Debug, Clone)]
pub struct Config {
    /// The train being replanned. Its own reservations are left out.
    pub agent: Option<TrainId>,
    pub agent_speed: f64,
    /// Block node name or block identifier the agent is heading for.
    pub destination: Option<String>,
    pub max_buffer_time: f64,
    pub use_recovery_time: bool,
    pub sighting_blocks: usize,
    pub running_time_margin: f64,
    /// Track part ids or names. When non-empty, only graph edges touching
    /// these tracks are written.
    pub allowed_tracks: Vec<String>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            agent: None,
            agent_speed: DEFAULT_AGENT_SPEED,
            destination: None,
            max_buffer_time: std::f64::INFINITY,
            use_recovery_time: true,
            sighting_blocks: SIGHTING_BLOCKS,
            running_time_margin: RUNNING_TIME_MARGIN,
            allowed_tracks: Vec::new(),
        }
    }
}
