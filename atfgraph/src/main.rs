extern crate atfgraph;
extern crate failure;
extern crate structopt;
extern crate env_logger;
#[macro_use] extern crate log;

use atfgraph::*;
use atfgraph::config::{self, Config};
use std::path::PathBuf;
use std::time::Instant;
use structopt::StructOpt;

/// atfgraph -- safe interval graph generation for train replanning
#[derive(StructOpt, Debug)]
#[structopt(name="atfgraph")]
struct Opt {
    /// Verbose mode (-v, -vv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Location topology file (JSON)
    #[structopt(short = "l", long = "location", parse(from_os_str))]
    location: PathBuf,

    /// Scenario file (JSON)
    #[structopt(short = "s", long = "scenario", parse(from_os_str))]
    scenario: PathBuf,

    /// Output graph file
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: PathBuf,

    /// Destination signal or block of the replanned train
    #[structopt(short = "d", long = "destination")]
    destination: Option<String>,

    /// Train number of the replanned train
    #[structopt(short = "a", long = "agent")]
    agent: Option<TrainId>,

    /// Speed of the replanned train
    #[structopt(long = "agent-speed", default_value = "40")]
    agent_speed: f64,

    /// Maximum buffer time
    #[structopt(short = "b", long = "buffer")]
    buffer: Option<f64>,

    /// Do not add recovery time to buffer times
    #[structopt(long = "no-recovery")]
    no_recovery: bool,

    /// Running time margin used for recovery time on edges without stops
    #[structopt(long = "margin")]
    margin: Option<f64>,

    /// Number of blocks ahead reserved for signal sighting
    #[structopt(long = "sighting-blocks")]
    sighting_blocks: Option<usize>,

    /// Only write edges touching these track parts
    #[structopt(long = "allow")]
    allow: Vec<String>,
}

impl Opt {
    fn config(&self) -> Config {
        Config {
            agent: self.agent,
            agent_speed: self.agent_speed,
            destination: self.destination.clone(),
            max_buffer_time: self.buffer.unwrap_or(std::f64::INFINITY),
            use_recovery_time: !self.no_recovery,
            sighting_blocks: self.sighting_blocks.unwrap_or(config::SIGHTING_BLOCKS),
            running_time_margin: self.margin.unwrap_or(config::RUNNING_TIME_MARGIN),
            allowed_tracks: self.allow.clone(),
        }
    }
}

fn run(opt: &Opt) -> AppResult<()> {
    let config = opt.config();
    debug!("{:?}", config);

    let start = Instant::now();
    let (track, blocks) = get_topology(&opt.location)?;
    info!("{:<14} {:?}", "topology", start.elapsed());
    if opt.verbose >= 2 {
        for b in 0..blocks.edges.len() {
            trace!("  - {} ({}m)", blocks.identifier(b), blocks.edges[b].length);
        }
    }

    let scenario = get_scenario(&opt.scenario)?;
    let generated = generate(&track, &blocks, &scenario, &config)?;

    write_output(&opt.output, &track, &blocks, &generated, &config.allowed_tracks)?;
    info!("Wrote {}", opt.output.display());
    Ok(())
}

pub fn main() {
    let opt = Opt::from_args();
    let level = match opt.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&opt) {
        Ok(()) => {},
        Err(e) => {
            println!("Error:\n{}", e.as_fail());
            for cause in e.iter_causes() {
                println!("  caused by: {}", cause);
            }
            std::process::exit(1);
        },
    }
}
