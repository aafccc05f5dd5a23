//! JointScope CLI
//!
//! Replays recorded joint-motion CSVs in real time, writes synthetic
//! recordings, or runs the deterministic replay scenarios.

use clap::Parser;
use jointscope_core::{
    ChartSink, HeatmapSink, PoseSink, RecordingSink, ReplayConfig, ReplayError, ReplaySession,
};
use jointscope_core::pose::TracingPoseSink;
use jointscope_env::{RobotId, TokioContext};
use jointscope_sim::scenarios::ScenarioId;
use jointscope_sim::{load_recordings, play_to_end, write_csv, MotionGenerator, PlaySummary};
use jointscope_sim::{ScenarioResult, ScenarioRunner};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// JointScope motion replay CLI
#[derive(Parser, Debug)]
#[command(name = "jointscope")]
#[command(about = "Replay robot joint motion logs or run deterministic replay scenarios", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (end_of_data, pause_resume, seek, robot_delete,
    /// brush_zoom, heatmap, lossy_frames, grouping, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// TOML replay configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Chart window size in frames (overrides the config file)
    #[arg(long)]
    window_size: Option<usize>,

    /// Seconds between recorded frames (overrides the config file)
    #[arg(long)]
    sample_interval: Option<f64>,

    /// Movement CSVs to replay in real time, one robot per file
    #[arg(long, num_args = 1..)]
    play: Vec<PathBuf>,

    /// Give up on a replay after this many seconds (`inf` for never)
    #[arg(long, default_value = "600", value_parser = parse_secs)]
    max_duration: Duration,

    /// Robot shown in the heatmap, e.g. `1` or `robot1` (defaults to the
    /// last one loaded)
    #[arg(long)]
    heatmap_robot: Option<RobotId>,

    /// Write synthetic recordings into this directory and exit
    #[arg(long)]
    generate: Option<PathBuf>,

    /// Robots to generate
    #[arg(long, default_value = "2")]
    robots: usize,

    /// Frames for the first generated robot; each further robot gets 30 more
    #[arg(long, default_value = "300")]
    frames: usize,

    /// Fraction of generated cells written as unparseable
    #[arg(long, default_value = "0")]
    dropout: f64,

    /// Stream poses to a Rerun viewer (needs the `visualization` feature)
    #[arg(long)]
    rerun: bool,

    /// Save the Rerun recording to this `.rrd` file instead of spawning a
    /// viewer (implies `--rerun`)
    #[arg(long)]
    rerun_save: Option<PathBuf>,

    /// Show charts and heatmap in a terminal dashboard (needs the
    /// `dashboard` feature)
    #[arg(long)]
    dashboard: bool,
}

/// Non-negative seconds; infinity means no limit.
fn parse_secs(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.parse().map_err(|e| format!("{}: {}", raw, e))?;
    if secs.is_nan() || secs < 0.0 {
        return Err(format!("expected non-negative seconds, got {}", raw));
    }
    if secs.is_infinite() {
        return Ok(Duration::MAX);
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{}: {}", raw, e))
}

fn init_logging(args: &Args) {
    let default = if args.verbose {
        "debug"
    } else if args.dashboard {
        // Log lines would tear the TUI
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", err);
    }
}

fn load_config(args: &Args) -> Result<ReplayConfig, ReplayError> {
    let mut config = match &args.config {
        Some(path) => ReplayConfig::load(path)?,
        None => ReplayConfig::default(),
    };
    if let Some(window_size) = args.window_size {
        config.window_size = window_size;
    }
    if let Some(interval) = args.sample_interval {
        config.sample_interval_secs = interval;
    }
    config.validate()?;
    Ok(config)
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            error!("Configuration rejected: {}", err);
            std::process::exit(2);
        }
    };

    if let Some(dir) = &args.generate {
        match generate_recordings(dir, &args, &config) {
            Ok(paths) => {
                for path in paths {
                    println!("{}", path.display());
                }
            }
            Err(err) => {
                error!("Failed to generate recordings: {}", err);
                std::process::exit(1);
            }
        }
        return;
    }

    if !args.play.is_empty() {
        let max_duration = args.max_duration;
        let outcome = if args.dashboard {
            replay_with_dashboard(&args, config, max_duration)
        } else {
            replay_headless(&args, config, max_duration)
        };
        match outcome {
            Ok(Some(summary)) if args.json => match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{}", json),
                Err(err) => error!("Failed to encode summary: {}", err),
            },
            Ok(_) => {}
            Err(err) => {
                error!("Replay failed: {}", err);
                std::process::exit(1);
            }
        }
        return;
    }

    run_scenarios(&args, config);
}

/// Writes `args.robots` recordings of growing length into `dir`.
fn generate_recordings(
    dir: &Path,
    args: &Args,
    config: &ReplayConfig,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(args.robots);
    for i in 0..args.robots {
        let frames = args.frames + 30 * i;
        let series = MotionGenerator::new(args.seed.wrapping_add(i as u64))
            .with_sample_interval(config.sample_interval_secs)
            .with_dropout(args.dropout)
            .generate(frames);
        let path = dir.join(format!("robot_{}.csv", i));
        write_csv(&series, std::fs::File::create(&path)?)?;
        info!("Wrote {} frames to {}", frames, path.display());
        paths.push(path);
    }
    Ok(paths)
}

fn pose_sink(rerun: bool, save: Option<&Path>) -> Result<Box<dyn PoseSink>, String> {
    if rerun || save.is_some() {
        #[cfg(feature = "visualization")]
        {
            use jointscope_core::visualization::RerunPoseSink;
            let sink = match save {
                Some(path) => {
                    info!("Saving Rerun recording to {}", path.display());
                    RerunPoseSink::new_to_file("jointscope", path)
                }
                None => RerunPoseSink::new("jointscope"),
            }
            .map_err(|e| e.to_string())?;
            return Ok(Box::new(sink));
        }
        #[cfg(not(feature = "visualization"))]
        warn!("Built without the visualization feature; logging poses instead");
    }
    Ok(Box::new(TracingPoseSink::new()))
}

/// Runs one replay to completion on a current-thread runtime.
fn replay_blocking(
    paths: &[PathBuf],
    config: ReplayConfig,
    heatmap_robot: Option<RobotId>,
    max_duration: Duration,
    pose: &mut dyn PoseSink,
    charts: &mut dyn ChartSink,
    heatmap: &mut dyn HeatmapSink,
) -> Result<PlaySummary, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| e.to_string())?;
    let context = TokioContext::shared();
    let mut session = ReplaySession::new(context.clone(), config).map_err(|e| e.to_string())?;
    load_recordings(&mut session, paths, pose).map_err(|e| e.to_string())?;
    if let Some(robot) = heatmap_robot {
        session
            .select_heatmap_robot(robot)
            .map_err(|e| format!("--heatmap-robot: {}", e))?;
    }
    Ok(runtime.block_on(play_to_end(
        &mut session,
        &*context,
        pose,
        charts,
        heatmap,
        max_duration,
    )))
}

fn replay_headless(
    args: &Args,
    config: ReplayConfig,
    max_duration: Duration,
) -> Result<Option<PlaySummary>, String> {
    let mut pose = pose_sink(args.rerun, args.rerun_save.as_deref())?;
    let mut charts = RecordingSink::new();
    let mut heatmap = RecordingSink::new();
    let summary = replay_blocking(
        &args.play,
        config,
        args.heatmap_robot,
        max_duration,
        pose.as_mut(),
        &mut charts,
        &mut heatmap,
    )?;
    info!(
        "{} chart draws, {} heatmap draws",
        charts.chart_draws, heatmap.heatmap_draws
    );
    Ok(Some(summary))
}

#[cfg(feature = "dashboard")]
fn replay_with_dashboard(
    args: &Args,
    config: ReplayConfig,
    max_duration: Duration,
) -> Result<Option<PlaySummary>, String> {
    use jointscope_core::dashboard::{ReplayDashboard, TerminalChartSink};

    let (tx, rx) = crossbeam::channel::unbounded();
    let paths = args.play.clone();
    let rerun = args.rerun;
    let rerun_save = args.rerun_save.clone();
    let heatmap_robot = args.heatmap_robot;
    let replay = std::thread::spawn(move || {
        let mut pose = pose_sink(rerun, rerun_save.as_deref())?;
        let mut charts = TerminalChartSink::new(tx.clone());
        let mut heatmap = TerminalChartSink::new(tx);
        replay_blocking(
            &paths,
            config,
            heatmap_robot,
            max_duration,
            pose.as_mut(),
            &mut charts,
            &mut heatmap,
        )
    });

    let mut dashboard = ReplayDashboard::new(rx);
    dashboard.run().map_err(|e| e.to_string())?;

    if !replay.is_finished() {
        // Quitting the dashboard abandons the replay
        warn!("Dashboard closed before the replay finished");
        return Ok(None);
    }
    match replay.join() {
        Ok(summary) => summary.map(Some),
        Err(_) => Err("replay thread panicked".to_string()),
    }
}

#[cfg(not(feature = "dashboard"))]
fn replay_with_dashboard(
    args: &Args,
    config: ReplayConfig,
    max_duration: Duration,
) -> Result<Option<PlaySummary>, String> {
    warn!("Built without the dashboard feature; replaying headless");
    replay_headless(args, config, max_duration)
}

fn run_scenarios(args: &Args, config: ReplayConfig) {
    if !args.json {
        info!("JointScope replay scenarios v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            error!("{}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            error!("Available scenarios: {}, all", names.join(", "));
            std::process::exit(1);
        })]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed).with_config(config.clone());

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "final_frame": r.final_frame,
                    "chart_draws": r.metrics.chart_draws,
                    "heatmap_draws": r.metrics.heatmap_draws,
                    "unparseable_cells": r.metrics.unparseable_cells,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(err) => error!("Failed to encode summary: {}", err),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
