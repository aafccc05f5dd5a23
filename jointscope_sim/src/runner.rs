//! Scenario runner - drives replay sessions through deterministic scenarios.

use crate::context::SimContext;
use crate::motion::{write_csv, MotionGenerator};
use crate::scenarios::ScenarioId;

use jointscope_core::ingest::parse_movement;
use jointscope_core::render::PoseEvent;
use jointscope_core::view::WindowedSeriesView;
use jointscope_core::{
    ChartGrouping, ChartKey, RecordingSink, ReplayConfig, ReplayError, ReplaySession, Series,
};
use jointscope_env::{ReplayContext, RobotId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Frame the clock reported last
    pub final_frame: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Robots loaded over the run
    pub robots_loaded: usize,

    /// Pose sink updates
    pub pose_updates: usize,

    /// Chart draws
    pub chart_draws: usize,

    /// Heatmap draws
    pub heatmap_draws: usize,

    /// Cells that failed to parse on ingest
    pub unparseable_cells: usize,

    /// Seeks issued
    pub seeks: usize,
}

/// One session wired to recording sinks on virtual time.
struct Harness {
    ctx: Arc<SimContext>,
    session: ReplaySession<SimContext>,
    pose: RecordingSink,
    charts: RecordingSink,
    heatmap: RecordingSink,
    ticks: u64,
    robots_loaded: usize,
    unparseable_cells: usize,
    seeks: usize,
}

impl Harness {
    fn new(config: &ReplayConfig) -> Result<Self, ReplayError> {
        let ctx = SimContext::shared();
        let session = ReplaySession::new(ctx.clone(), config.clone())?;
        Ok(Self {
            ctx,
            session,
            pose: RecordingSink::new(),
            charts: RecordingSink::new(),
            heatmap: RecordingSink::new(),
            ticks: 0,
            robots_loaded: 0,
            unparseable_cells: 0,
            seeks: 0,
        })
    }

    /// Adds a robot, acknowledges its model and loads `series`.
    fn load(&mut self, series: Series) -> Result<RobotId, ReplayError> {
        let robot = self.session.add_robot()?;
        self.session.model_ready(&mut self.pose);
        self.session.load_movement(robot, series, None)?;
        self.robots_loaded += 1;
        Ok(robot)
    }

    /// One display pump plus one tick, then one tick period of time.
    fn step(&mut self) -> usize {
        self.session.pump();
        self.session.update_pose(&mut self.pose);
        let frame = self.session.tick(&mut self.charts, &mut self.heatmap);
        self.ticks += 1;
        self.ctx.advance_time(self.session.config().tick_period());
        frame
    }

    fn play(&mut self) {
        self.session.control_mut().check();
        self.session.pump();
    }

    fn pause(&mut self) {
        self.session.control_mut().uncheck();
        self.session.pump();
    }

    fn advance_frames(&self, frames: u32) {
        self.ctx.advance_time(self.session.clock().sample_interval() * frames);
    }

    fn metrics(&self) -> ScenarioMetrics {
        ScenarioMetrics {
            robots_loaded: self.robots_loaded,
            pose_updates: self.pose.pose_events.len(),
            chart_draws: self.charts.chart_draws,
            heatmap_draws: self.heatmap.heatmap_draws,
            unparseable_cells: self.unparseable_cells,
            seeks: self.seeks,
        }
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message())
    }
}

/// Runs replay scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Session configuration every scenario starts from
    config: ReplayConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: ReplayConfig::default(),
        }
    }

    /// Sets the session configuration.
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut harness = match Harness::new(&self.config) {
            Ok(harness) => harness,
            Err(err) => return self.failed_setup(scenario, err),
        };
        // Motion seeds are derived so they differ from the scenario RNG
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let motion_seed = self.seed.wrapping_mul(0x9e3779b97f4a7c15);

        let outcome = match scenario {
            ScenarioId::EndOfData => self.run_end_of_data(&mut harness, &mut rng, motion_seed),
            ScenarioId::PauseResume => self.run_pause_resume(&mut harness, &mut rng, motion_seed),
            ScenarioId::Seek => self.run_seek(&mut harness, &mut rng, motion_seed),
            ScenarioId::RobotDelete => self.run_robot_delete(&mut harness, &mut rng, motion_seed),
            ScenarioId::BrushZoom => self.run_brush_zoom(&mut harness, &mut rng, motion_seed),
            ScenarioId::Heatmap => self.run_heatmap(&mut harness, &mut rng, motion_seed),
            ScenarioId::LossyFrames => self.run_lossy_frames(&mut harness, &mut rng, motion_seed),
            ScenarioId::Grouping => self.run_grouping(&mut harness, &mut rng, motion_seed),
        };

        let final_frame = harness.session.current_frame();
        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed: outcome.is_ok(),
            total_ticks: harness.ticks,
            final_time_secs: harness.ctx.now().as_secs_f64(),
            final_frame,
            failure_reason: outcome.err(),
            metrics: harness.metrics(),
        };
        if result.passed {
            info!(
                "{} passed: {} ticks, final frame {}",
                scenario.name(),
                result.total_ticks,
                result.final_frame
            );
        } else {
            info!(
                "{} failed: {}",
                scenario.name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
        result
    }

    fn failed_setup(&self, scenario: ScenarioId, err: ReplayError) -> ScenarioResult {
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            total_ticks: 0,
            final_time_secs: 0.0,
            final_frame: 0,
            failure_reason: Some(format!("setup failed: {}", err)),
            metrics: ScenarioMetrics::default(),
        }
    }

    /// RPL-001: two robots of different lengths.
    ///
    /// **Assertion**: frames never decrease, never reach the shorter length,
    /// and playback halts on `min_length - 1`. The halt holds while the
    /// toggle stays checked, and an unchecked toggle keeps it there however
    /// much time passes.
    fn run_end_of_data(
        &self,
        h: &mut Harness,
        rng: &mut ChaCha8Rng,
        motion_seed: u64,
    ) -> Result<(), String> {
        let long = rng.gen_range(150..400);
        let short = rng.gen_range(60..long);
        h.load(MotionGenerator::new(motion_seed).generate(long))
            .map_err(|e| e.to_string())?;
        h.load(MotionGenerator::new(motion_seed ^ 1).generate(short))
            .map_err(|e| e.to_string())?;
        ensure(h.session.store().min_length() == Some(short), || {
            format!("min length {:?}, expected {}", h.session.store().min_length(), short)
        })?;

        h.session.control_mut().check();
        let mut last = 0;
        let budget = short + 60;
        for _ in 0..budget {
            let frame = h.step();
            ensure(frame >= last, || format!("frame went back {} -> {}", last, frame))?;
            ensure(frame < short, || format!("frame {} beyond {} frames", frame, short))?;
            last = frame;
            if !h.session.clock().is_running() && frame + 1 == short {
                break;
            }
        }
        ensure(last + 1 == short, || format!("halted at {}, expected {}", last, short - 1))?;
        ensure(h.pose.pose_frames.windows(2).all(|w| w[0] <= w[1]), || {
            "pose frames went backwards".to_string()
        })?;

        // The toggle is still checked; the halt must hold anyway
        for _ in 0..10 {
            let frame = h.step();
            ensure(frame + 1 == short, || format!("frame {} after end of data", frame))?;
            ensure(!h.session.clock().is_running(), || {
                "checked toggle restarted a finished replay".to_string()
            })?;
        }

        h.session.control_mut().uncheck();
        h.session.pump();
        h.advance_frames(500);
        let held = h.session.current_frame();
        ensure(held == short - 1, || format!("idle clock moved to {}", held))
    }

    /// RPL-002: random pauses of random length.
    ///
    /// **Assertion**: the frame at resume equals the frame at pause.
    fn run_pause_resume(
        &self,
        h: &mut Harness,
        rng: &mut ChaCha8Rng,
        motion_seed: u64,
    ) -> Result<(), String> {
        h.load(MotionGenerator::new(motion_seed).generate(2_000))
            .map_err(|e| e.to_string())?;
        h.session.control_mut().check();

        for round in 0..5 {
            for _ in 0..rng.gen_range(5..40) {
                h.step();
            }
            h.pause();
            let paused = h.session.current_frame();
            h.ctx
                .advance_time(Duration::from_millis(rng.gen_range(0..10_000)));
            let idle = h.session.current_frame();
            ensure(idle == paused, || {
                format!("round {}: idle clock moved {} -> {}", round, paused, idle)
            })?;

            h.play();
            let resumed = h.session.current_frame();
            ensure(resumed == paused, || {
                format!("round {}: resumed at {}, paused at {}", round, resumed, paused)
            })?;
            debug!("Round {}: paused and resumed at frame {}", round, paused);
        }
        Ok(())
    }

    /// RPL-003: seeks while running and idle.
    ///
    /// **Assertion**: targets clamp to the last common frame, and a running
    /// clock continues from the target without a time jump.
    fn run_seek(
        &self,
        h: &mut Harness,
        rng: &mut ChaCha8Rng,
        motion_seed: u64,
    ) -> Result<(), String> {
        let len = 300;
        h.load(MotionGenerator::new(motion_seed).generate(len))
            .map_err(|e| e.to_string())?;

        for i in 0..20 {
            let running = rng.gen_bool(0.5);
            if h.session.clock().at_end() {
                // A finished replay only restarts from a seek
                h.session.seek(0);
            }
            if running {
                h.play();
                ensure(h.session.clock().is_running(), || format!("seek {}: play did not start", i))?;
            } else {
                h.pause();
            }
            // Time passes before the seek; it must not leak into the target
            h.ctx
                .advance_time(Duration::from_millis(rng.gen_range(0..2_000)));

            let target = rng.gen_range(0..500);
            h.session.seek(target);
            h.seeks += 1;
            let expected = target.min(len - 1);
            let frame = h.session.current_frame();
            ensure(frame == expected, || {
                format!("seek {} ({}): got {}, expected {}", i, target, frame, expected)
            })?;

            if running && expected + 5 < len {
                let k = rng.gen_range(0..5);
                h.advance_frames(k);
                let frame = h.session.current_frame();
                ensure(frame == expected + k as usize, || {
                    format!("seek {}: {} frames later got {}", i, k, frame)
                })?;
            }
            h.step();
        }
        Ok(())
    }

    /// RPL-004: delete robots mid-playback.
    ///
    /// **Assertion**: bounds widen as the shortest robot goes, the heatmap
    /// falls back to a remaining robot, and deleting the last robot stops
    /// everything at frame 0.
    fn run_robot_delete(
        &self,
        h: &mut Harness,
        rng: &mut ChaCha8Rng,
        motion_seed: u64,
    ) -> Result<(), String> {
        let lengths = [
            rng.gen_range(250..350),
            rng.gen_range(100..200),
            rng.gen_range(200..250),
        ];
        let mut robots = Vec::new();
        for (i, len) in lengths.iter().enumerate() {
            let series = MotionGenerator::new(motion_seed.wrapping_add(i as u64)).generate(*len);
            robots.push(h.load(series).map_err(|e| e.to_string())?);
        }
        h.session.control_mut().check();
        for _ in 0..50 {
            h.step();
        }

        h.session
            .delete_robot(robots[1], &mut h.charts, &mut h.heatmap)
            .map_err(|e| e.to_string())?;
        let widened = lengths[0].min(lengths[2]);
        ensure(h.session.store().min_length() == Some(widened), || {
            format!("min length {:?} after delete, expected {}", h.session.store().min_length(), widened)
        })?;
        ensure(h.charts.chart(&ChartKey::Robot(robots[1])).is_none(), || {
            "deleted robot still has a chart".to_string()
        })?;
        ensure(h.session.heatmap_robot() == Some(robots[2]), || {
            format!("heatmap moved to {:?}", h.session.heatmap_robot())
        })?;
        ensure(h.session.clock().is_running(), || "delete stopped playback".to_string())?;

        h.session
            .delete_robot(robots[2], &mut h.charts, &mut h.heatmap)
            .map_err(|e| e.to_string())?;
        h.step();
        ensure(
            h.heatmap.heatmap.as_ref().map(|(robot, _)| *robot) == Some(robots[0]),
            || "heatmap did not fall back to the remaining robot".to_string(),
        )?;

        h.session
            .delete_robot(robots[0], &mut h.charts, &mut h.heatmap)
            .map_err(|e| e.to_string())?;
        ensure(h.heatmap.heatmap.is_none(), || "heatmap not cleared".to_string())?;
        let frame = h.session.current_frame();
        ensure(frame == 0 && !h.session.clock().is_running(), || {
            format!("empty session at frame {}", frame)
        })?;
        ensure(h.session.roster().add_enabled(), || "adding stays disabled".to_string())
    }

    /// RPL-005: brush-to-zoom.
    ///
    /// **Assertion**: a brush pins the chart to exactly the brushed range
    /// while playback continues; degenerate brushes change nothing; clearing
    /// returns to the playback window.
    fn run_brush_zoom(
        &self,
        h: &mut Harness,
        rng: &mut ChaCha8Rng,
        motion_seed: u64,
    ) -> Result<(), String> {
        let len = 400;
        let robot = h
            .load(MotionGenerator::new(motion_seed).generate(len))
            .map_err(|e| e.to_string())?;
        let key = ChartKey::Robot(robot);
        h.session.control_mut().check();
        for _ in 0..30 {
            h.step();
        }

        h.session.begin_brush();
        h.session.pump();
        ensure(!h.session.clock().is_running(), || "brush did not pause".to_string())?;

        let before = h.charts.chart(&key).map(|points| points.frames.clone());
        let start = rng.gen_range(0..300);
        for end in [start, start + 1] {
            let rescaled = h.session.end_brush(&key, start, end, &mut h.charts);
            ensure(!rescaled, || format!("degenerate brush [{}, {}) applied", start, end))?;
        }
        let after = h.charts.chart(&key).map(|points| points.frames.clone());
        ensure(before == after, || "degenerate brush redrew the chart".to_string())?;

        let end = start + rng.gen_range(2..80);
        ensure(h.session.end_brush(&key, start, end, &mut h.charts), || {
            format!("brush [{}, {}) ignored", start, end)
        })?;

        h.play();
        for _ in 0..20 {
            h.step();
            let frames = h.charts.chart(&key).map(|points| points.frames.clone());
            ensure(frames == Some(start..end), || {
                format!("brushed chart shows {:?}, expected {:?}", frames, start..end)
            })?;
        }

        h.session.clear_brush(&key, &mut h.charts);
        let frame = h.session.current_frame();
        let expected = WindowedSeriesView::window_range(len, frame, h.session.window_size());
        let frames = h.charts.chart(&key).map(|points| points.frames.clone());
        ensure(frames == Some(expected.clone()), || {
            format!("cleared chart shows {:?}, expected {:?}", frames, expected)
        })
    }

    /// RPL-006: heatmap over random lengths.
    ///
    /// **Assertion**: every cell equals the mean of its bucket computed
    /// directly from the series.
    fn run_heatmap(
        &self,
        h: &mut Harness,
        rng: &mut ChaCha8Rng,
        motion_seed: u64,
    ) -> Result<(), String> {
        let columns = self.config.heatmap_grid_columns;
        for round in 0..5u64 {
            let len = rng.gen_range(1..600);
            let series = MotionGenerator::new(motion_seed.wrapping_add(round))
                .with_dropout(0.05)
                .generate(len);
            let expected = series.clone();

            // Each round replaces the previous robot
            for robot in h.session.roster().ids().collect::<Vec<_>>() {
                h.session
                    .delete_robot(robot, &mut h.charts, &mut h.heatmap)
                    .map_err(|e| e.to_string())?;
            }
            h.load(series).map_err(|e| e.to_string())?;
            h.step();

            let grid = h
                .session
                .heatmap_grid()
                .ok_or_else(|| format!("round {}: no heatmap", round))?;
            ensure(grid.columns == columns, || {
                format!("round {}: {} columns, expected {}", round, grid.columns, columns)
            })?;
            let bucket = len / columns;
            ensure(grid.bucket_size == bucket, || {
                format!("round {}: bucket {}, expected {}", round, grid.bucket_size, bucket)
            })?;

            for (row, name) in grid.rows.iter().enumerate() {
                let idx = expected
                    .channel_index(name)
                    .ok_or_else(|| format!("heatmap row {} not in series", name))?;
                for column in 0..columns {
                    let mean = if bucket == 0 {
                        0.0
                    } else {
                        let frames = &expected.frames()[column * bucket..(column + 1) * bucket];
                        frames.iter().map(|f| f.value_or_zero(idx)).sum::<f64>() / bucket as f64
                    };
                    let cell = grid
                        .cell(column, row)
                        .map(|cell| cell.value)
                        .unwrap_or(f64::NAN);
                    ensure((cell - mean).abs() < 1e-9, || {
                        format!("round {}: cell ({}, {}) = {}, expected {}", round, column, row, cell, mean)
                    })?;
                }
            }
            ensure(grid.column_labels().len() == columns / 10, || {
                "unexpected column labels".to_string()
            })?;
        }
        ensure(h.session.color_scale().legend().len() == 7, || {
            "legend should have 7 ticks".to_string()
        })
    }

    /// RPL-007: ten percent of cells fail to parse.
    ///
    /// **Assertion**: nothing downstream ever sees a NaN.
    fn run_lossy_frames(
        &self,
        h: &mut Harness,
        _rng: &mut ChaCha8Rng,
        motion_seed: u64,
    ) -> Result<(), String> {
        let source = MotionGenerator::new(motion_seed).with_dropout(0.1).generate(300);
        let mut buf = Vec::new();
        write_csv(&source, &mut buf).map_err(|e| e.to_string())?;
        let (series, report) = parse_movement(buf.as_slice()).map_err(|e| e.to_string())?;
        h.unparseable_cells += report.unparseable_cells;
        ensure(report.unparseable_cells == source.missing_samples(), || {
            format!(
                "{} unparseable cells, {} dropped",
                report.unparseable_cells,
                source.missing_samples()
            )
        })?;

        let robot = h.load(series).map_err(|e| e.to_string())?;
        h.session.control_mut().check();
        for _ in 0..120 {
            h.step();
        }

        for event in &h.pose.pose_events {
            let finite = match event {
                PoseEvent::Joint { value, .. } => value.is_finite(),
                PoseEvent::Position { position, .. } => position.iter().all(|v| v.is_finite()),
                PoseEvent::Rotation { rotation, .. } => rotation.iter().all(|v| v.is_finite()),
                PoseEvent::InitPosition { value, .. } => value.is_finite(),
                _ => true,
            };
            ensure(finite, || format!("non-finite pose update {:?}", event))?;
        }
        let chart = h
            .charts
            .chart(&ChartKey::Robot(robot))
            .ok_or_else(|| "no chart drawn".to_string())?;
        for trace in &chart.traces {
            for point in &trace.points {
                ensure(point.value.is_finite() && point.y.is_finite(), || {
                    format!("non-finite chart point in {} at frame {}", trace.label, point.frame)
                })?;
            }
        }
        let grid = h
            .session
            .heatmap_grid()
            .ok_or_else(|| "no heatmap".to_string())?;
        ensure(grid.cells.iter().all(|cell| cell.value.is_finite()), || {
            "non-finite heatmap cell".to_string()
        })
    }

    /// RPL-008: grouping switches with toggles in between.
    ///
    /// **Assertion**: the chart set always matches grouping and check state,
    /// and highlights follow the opposite dimension's toggles.
    fn run_grouping(
        &self,
        h: &mut Harness,
        rng: &mut ChaCha8Rng,
        motion_seed: u64,
    ) -> Result<(), String> {
        let a = h
            .load(MotionGenerator::new(motion_seed).generate(rng.gen_range(100..200)))
            .map_err(|e| e.to_string())?;
        let b = h
            .load(MotionGenerator::new(motion_seed ^ 7).generate(rng.gen_range(100..200)))
            .map_err(|e| e.to_string())?;
        h.session.control_mut().check();
        for _ in 0..10 {
            h.step();
        }
        ensure(
            h.session.chart_keys() == vec![ChartKey::Robot(a), ChartKey::Robot(b)],
            || format!("by-robot charts: {:?}", h.session.chart_keys()),
        )?;

        let channels: Vec<String> = h.session.observation_channels().to_vec();
        let first = channels[rng.gen_range(0..channels.len())].clone();
        let mut second = channels[rng.gen_range(0..channels.len())].clone();
        if second == first {
            second = channels
                .iter()
                .find(|c| **c != first)
                .cloned()
                .ok_or_else(|| "need two channels".to_string())?;
        }

        h.session.set_grouping(ChartGrouping::ByChannel, &mut h.charts);
        ensure(h.session.chart_keys().is_empty(), || {
            "channel charts before any channel is checked".to_string()
        })?;
        ensure(h.charts.charts.is_empty(), || "robot charts not cleared".to_string())?;
        h.session.toggle_channel(&first, &mut h.charts);
        h.session.toggle_channel(&second, &mut h.charts);
        h.step();

        let key = ChartKey::Channel(first.clone());
        let chart = h
            .charts
            .chart(&key)
            .ok_or_else(|| format!("no chart for {}", first))?;
        ensure(chart.traces.len() == 2, || {
            format!("{} traces on {}, expected 2", chart.traces.len(), first)
        })?;

        h.session.toggle_robot_plot(a, &mut h.charts);
        ensure(h.charts.highlighted(&key) == [b.label()], || {
            format!("highlighted {:?}", h.charts.highlighted(&key))
        })?;

        h.session.set_grouping(ChartGrouping::ByRobot, &mut h.charts);
        ensure(h.session.chart_keys() == vec![ChartKey::Robot(b)], || {
            format!("by-robot charts after toggle: {:?}", h.session.chart_keys())
        })?;
        ensure(h.charts.chart(&key).is_none(), || "channel chart survived".to_string())?;
        h.step();

        let mut expected = vec![first, second];
        expected.sort();
        ensure(h.charts.highlighted(&ChartKey::Robot(b)) == expected.as_slice(), || {
            format!("robot chart highlights {:?}", h.charts.highlighted(&ChartKey::Robot(b)))
        })
    }
}
