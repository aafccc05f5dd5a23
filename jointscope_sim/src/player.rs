//! Real-time replay driver.
//!
//! Hosts the two pumps of a session: the display pump (control + pose) at
//! `display_rate_hz` and the clock tick (charts + heatmap) at
//! `tick_rate_hz`. Time comes from the context, so the same loop runs
//! against Tokio in the CLI and against `SimContext` in tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jointscope_core::ingest::load_movement_file;
use jointscope_core::{ChartSink, HeatmapSink, PoseSink, ReplayError, ReplaySession, RobotId};
use jointscope_env::ReplayContext;
use serde::Serialize;
use tracing::{debug, info, warn};

/// What a replay did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaySummary {
    pub display_frames: u64,
    pub ticks: u64,
    pub final_frame: usize,
    pub elapsed_secs: f64,
    pub reached_end: bool,
}

/// Adds one robot per file and loads its movement.
///
/// There is no model loader on this side, so each robot's model is
/// acknowledged as ready right away.
pub fn load_recordings<C: ReplayContext>(
    session: &mut ReplaySession<C>,
    paths: &[PathBuf],
    pose: &mut dyn PoseSink,
) -> Result<Vec<RobotId>, ReplayError> {
    let mut robots = Vec::with_capacity(paths.len());
    for path in paths {
        let robot = session.add_robot()?;
        session.model_ready(pose);
        let (series, _) = load_movement_file(path)?;
        session.load_movement(robot, series, file_name(path))?;
        robots.push(robot);
    }
    Ok(robots)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

/// Plays from the current frame until end-of-data or `max_duration`.
pub async fn play_to_end<C: ReplayContext>(
    session: &mut ReplaySession<C>,
    context: &C,
    pose: &mut dyn PoseSink,
    charts: &mut dyn ChartSink,
    heatmap: &mut dyn HeatmapSink,
    max_duration: Duration,
) -> PlaySummary {
    let mut summary = PlaySummary::default();
    if !session.store().has_any() {
        warn!("Nothing to play");
        return summary;
    }

    let display_period = session.config().display_period();
    let tick_period = session.config().tick_period();
    let started = context.now();
    let mut next_tick = started;

    session.control_mut().check();
    info!(
        "Playing {} robot(s), {} common frames",
        session.store().len(),
        session.store().min_length().unwrap_or(0)
    );

    loop {
        session.pump();
        let frame = session.update_pose(pose);
        summary.display_frames += 1;

        // The display pump is where end-of-data halts the clock; draw that
        // final frame before leaving
        let halted = !session.clock().is_running();
        let now = context.now();
        if now >= next_tick || halted {
            summary.final_frame = session.tick(charts, heatmap);
            summary.ticks += 1;
            next_tick += tick_period;
            if summary.ticks % 30 == 0 {
                debug!("  t={:.1}s | frame={}", (now - started).as_secs_f64(), frame);
            }
        }

        if halted {
            summary.reached_end = session.store().min_length() == Some(summary.final_frame + 1);
            break;
        }
        if context.elapsed_since(started).unwrap_or(Duration::ZERO) >= max_duration {
            warn!("Replay stopped after {:?}", max_duration);
            break;
        }
        context.sleep(display_period).await;
    }

    session.control_mut().uncheck();
    session.pump();
    summary.elapsed_secs = context.elapsed_since(started).unwrap_or(Duration::ZERO).as_secs_f64();
    info!(
        "Replay finished at frame {} after {} ticks ({:.2}s)",
        summary.final_frame, summary.ticks, summary.elapsed_secs
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use crate::motion::{write_csv, MotionGenerator};
    use jointscope_core::{RecordingSink, ReplayConfig};

    #[tokio::test]
    async fn test_play_to_end_on_virtual_time() {
        let ctx = SimContext::shared();
        let mut session = ReplaySession::new(ctx.clone(), ReplayConfig::default()).unwrap();
        let mut sink = RecordingSink::new();

        let dir = std::env::temp_dir();
        let paths: Vec<PathBuf> = [90usize, 60]
            .iter()
            .enumerate()
            .map(|(i, len)| {
                let path = dir.join(format!("jointscope-play-{}-{}.csv", std::process::id(), i));
                let series = MotionGenerator::new(i as u64).generate(*len);
                let file = std::fs::File::create(&path).unwrap();
                write_csv(&series, file).unwrap();
                path
            })
            .collect();

        let robots = load_recordings(&mut session, &paths, &mut sink).unwrap();
        for path in &paths {
            std::fs::remove_file(path).ok();
        }
        assert_eq!(robots, vec![RobotId(0), RobotId(1)]);
        assert!(session.robot(RobotId(1)).unwrap().source_name.is_some());

        let mut charts = RecordingSink::new();
        let mut heatmap = RecordingSink::new();
        let summary = play_to_end(
            &mut session,
            &*ctx,
            &mut sink,
            &mut charts,
            &mut heatmap,
            Duration::from_secs(60),
        )
        .await;

        assert!(summary.reached_end);
        assert_eq!(summary.final_frame, 59);
        // Display pump runs at twice the tick rate
        assert!(summary.display_frames > summary.ticks);
        assert!(!session.control().is_checked());
        assert!(heatmap.heatmap.is_some());
    }

    #[tokio::test]
    async fn test_empty_session_returns_immediately() {
        let ctx = SimContext::shared();
        let mut session = ReplaySession::new(ctx.clone(), ReplayConfig::default()).unwrap();
        let mut sink = RecordingSink::new();
        let mut charts = RecordingSink::new();
        let mut heatmap = RecordingSink::new();
        let summary = play_to_end(
            &mut session,
            &*ctx,
            &mut sink,
            &mut charts,
            &mut heatmap,
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(summary.ticks, 0);
        assert!(!summary.reached_end);
    }
}
