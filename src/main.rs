use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{info, warn};

use gatesim::core::{ChannelLayout, GateShape, RetractionPolicy, Side, SimConfig, Simulation};
use gatesim::io::{unique_path, SnapshotWriter, TotalsRecorder};
use gatesim::{logging, Error, Result};

/// Average mass spread and channel currents for one parameter point.
///
/// Appends `id,mass_spread` followed by the left-to-right and right-to-left
/// currents of the main channel and then of the back channel to the output
/// file (or stdout). Parameter points that cannot be simulated, including any
/// with a back channel, are reported as zeros.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Length of the channel (gap between the chambers with --distance-is-gap)
    channel_length: f64,
    /// Full width of the channel
    channel_width: f64,
    /// Capacity of each gate
    threshold: usize,
    /// Radius of both chambers
    radius: f64,
    /// Length of the back channel
    second_length: f64,
    /// Full width of the back channel; 0 for a single channel
    second_width: f64,
    /// Number of particles
    num_particles: usize,
    /// Initial fraction of particles in the left chamber
    initial_ratio: f64,
    /// Events discarded before averaging
    transient: u64,
    /// Event count at which the run stops
    final_events: u64,
    /// Use curved gates (requires --distance-is-gap)
    #[arg(long)]
    curved: bool,
    /// Interpret the channel length as the gap between the chambers
    #[arg(long)]
    distance_is_gap: bool,
    /// Retract refused particles in a random outward direction
    #[arg(long)]
    random_retraction: bool,
    /// RNG seed; drawn at random when omitted
    #[arg(long)]
    seed: Option<u64>,
    /// Time between position snapshots
    #[arg(long, requires = "snapshot")]
    sample_interval: Option<f64>,
    /// File receiving position snapshots
    #[arg(long, requires = "sample_interval")]
    snapshot: Option<PathBuf>,
    /// File receiving chamber totals after every event
    #[arg(long)]
    totals: Option<PathBuf>,
    /// File the result line is appended to; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Directory receiving a run summary under a random file name
    #[arg(long)]
    debug_dir: Option<PathBuf>,
    /// Identifier written at the start of the result line
    #[arg(long, default_value = "0")]
    id: String,
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Outcome {
    mass_spread: f64,
    /// Crossings per unit time, left-to-right then right-to-left, for the
    /// main channel and the back channel.
    currents: [[f64; 2]; 2],
}

fn config_from(args: &Args) -> Result<SimConfig> {
    let gate_shape = GateShape::from_flags(!args.curved, !args.distance_is_gap)?;
    let retraction = if args.random_retraction {
        RetractionPolicy::Random
    } else {
        RetractionPolicy::Reverse
    };
    Ok(SimConfig {
        num_particles: args.num_particles,
        circle_radius: args.radius,
        circle_distance: args.channel_length,
        bridge_height: args.channel_width,
        left_capacity: args.threshold,
        right_capacity: args.threshold,
        retraction,
        gate_shape,
        channels: ChannelLayout::from_back_channel(args.second_length, args.second_width),
    })
}

fn run(args: &Args) -> Result<Outcome> {
    let mut sim = Simulation::new(config_from(args)?, args.seed)?;
    sim.start(args.initial_ratio)?;
    info!(
        "run {}: {} particles, seed {}, events [{}, {})",
        args.id,
        sim.num_particles(),
        sim.seed(),
        args.transient,
        args.final_events
    );

    let sampling_interval = args.sample_interval.unwrap_or(0.0);
    let snapshots = match &args.snapshot {
        Some(path) if sampling_interval > 0.0 => Some(SnapshotWriter::create(path)?),
        _ => None,
    };
    let totals = args.totals.as_ref().map(|_| {
        let mut recorder = TotalsRecorder::new();
        recorder.record(&sim.measurement());
        recorder
    });
    let mut observers = (snapshots, totals);

    while sim.events() < args.transient {
        sim.update(sampling_interval, &mut observers)?;
    }

    let offsets = [sim.crossings(Side::Left), sim.crossings(Side::Right)];
    let time_offset = sim.time();
    let weight = 1.0 / args.final_events.saturating_sub(args.transient).max(1) as f64;
    let mut mass_spread = 0.0;
    while sim.events() < args.final_events {
        let m = sim.update(sampling_interval, &mut observers)?;
        mass_spread += weight * m.mass_spread();
    }

    let elapsed = sim.time() - time_offset;
    let current = |side: Side, offset: u64| {
        if elapsed > 0.0 {
            (sim.crossings(side) - offset) as f64 / elapsed
        } else {
            0.0
        }
    };
    let currents = [
        [
            current(Side::Left, offsets[0]),
            current(Side::Right, offsets[1]),
        ],
        [0.0; 2],
    ];

    let (snapshots, totals) = observers;
    if let Some(mut writer) = snapshots {
        writer.flush()?;
    }
    if let (Some(recorder), Some(path)) = (totals, &args.totals) {
        recorder.save(path)?;
    }
    if sim.explosions() > 0 || sim.degeneracy_resets() > 0 {
        info!(
            "{} explosions, {} degeneracy resets, {} clamps, {} anomalies",
            sim.explosions(),
            sim.degeneracy_resets(),
            sim.clamps(),
            sim.anomalies()
        );
    }
    if let Some(dir) = &args.debug_dir {
        let path = unique_path(dir, &sim.token(7), "debug");
        write_summary(&path, args, &sim)?;
        info!("run summary written to {}", path.display());
    }
    Ok(Outcome {
        mass_spread,
        currents,
    })
}

fn write_summary(path: &Path, args: &Args, sim: &Simulation) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "id {}", args.id)?;
    writeln!(out, "seed {}", sim.seed())?;
    writeln!(out, "particles {}", sim.num_particles())?;
    writeln!(out, "time {}", sim.time())?;
    writeln!(out, "events {}", sim.events())?;
    writeln!(out, "crossings_left_to_right {}", sim.crossings(Side::Left))?;
    writeln!(out, "crossings_right_to_left {}", sim.crossings(Side::Right))?;
    writeln!(out, "explosions {}", sim.explosions())?;
    writeln!(out, "degeneracy_resets {}", sim.degeneracy_resets())?;
    writeln!(out, "clamps {}", sim.clamps())?;
    writeln!(out, "anomalies {}", sim.anomalies())?;
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let outcome = match run(&args) {
        Ok(outcome) => outcome,
        Err(Error::Config(msg)) => {
            warn!(
                "not running for channel width {} and radius {}, reporting zeros: {msg}",
                args.channel_width, args.radius
            );
            Outcome::default()
        }
        Err(e) => return Err(e),
    };

    let [main, back] = outcome.currents;
    let line = format!(
        "{},{},{},{},{},{}",
        args.id, outcome.mass_spread, main[0], main[1], back[0], back[1]
    );
    match &args.output {
        Some(path) => {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{line}")?;
        }
        None => println!("{line}"),
    }
    Ok(())
}
