//! End-to-end session tests: CSV in, pose/chart/heatmap out.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jointscope_core::ingest::{load_movement_file, parse_movement};
use jointscope_core::store::StoreError;
use jointscope_core::{
    ChartGrouping, ChartKey, ClockState, RecordingSink, ReplayConfig, ReplayError, ReplaySession,
};
use jointscope_env::{ReplayContext, RobotId};

#[derive(Default)]
struct ManualContext {
    now_ns: AtomicU64,
}

impl ManualContext {
    fn advance(&self, by: Duration) {
        self.now_ns.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReplayContext for ManualContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

fn csv(frames: usize) -> String {
    let mut out = String::from("shoulder,elbow,pos_0,pos_1,pos_2,rot_0,rot_1,rot_2\n");
    for f in 0..frames {
        let t = f as f64 / 10.0;
        out.push_str(&format!("{},{},{},0,0,0,0,{}\n", t.sin(), t.cos(), t, t / 2.0));
    }
    // Exporters leave a trailing blank line
    out.push('\n');
    out
}

fn session() -> (Arc<ManualContext>, ReplaySession<ManualContext>) {
    let ctx = Arc::new(ManualContext::default());
    let config = ReplayConfig::from_toml_str(
        r#"
        sample_interval_secs = 0.02
        window_size = 30
        heatmap_grid_columns = 20
        "#,
    )
    .unwrap();
    (ctx.clone(), ReplaySession::new(ctx, config).unwrap())
}

#[test]
fn test_two_robots_replay_to_common_end() {
    let (ctx, mut session) = session();
    let mut pose = RecordingSink::new();
    let mut charts = RecordingSink::new();
    let mut heatmap = RecordingSink::new();

    for frames in [300, 200] {
        let robot = session.add_robot().unwrap();
        session.model_ready(&mut pose);
        let (series, report) = parse_movement(csv(frames).as_bytes()).unwrap();
        assert_eq!(report.frames, frames);
        session
            .load_movement(robot, series, Some(format!("robot{}.csv", robot.get())))
            .unwrap();
    }
    assert_eq!(session.store().min_length(), Some(200));

    session.control_mut().check();
    let interval = Duration::from_millis(20);
    let mut last = 0;
    for _ in 0..250 {
        session.pump();
        session.update_pose(&mut pose);
        let frame = session.tick(&mut charts, &mut heatmap);
        assert!(frame >= last);
        assert!(frame < 200);
        last = frame;
        ctx.advance(interval);
    }

    assert_eq!(last, 199);
    assert_eq!(session.current_frame(), 199);
    assert!(!session.clock().is_running());
    // The toggle is still checked, yet the halt holds until a seek
    assert!(session.control().is_checked());
    assert_eq!(session.pump(), ClockState::Idle);
    assert_eq!(session.current_frame(), 199);
    session.seek(150);
    assert_eq!(session.pump(), ClockState::Running);

    // Heatmap follows the most recently loaded robot
    assert_eq!(heatmap.heatmap.as_ref().map(|(r, _)| *r), Some(RobotId(1)));
    let grid = session.heatmap_grid().unwrap();
    assert_eq!(grid.columns, 20);
    assert_eq!(grid.bucket_size, 10);

    let chart = charts.chart(&ChartKey::Robot(RobotId(0))).unwrap();
    assert_eq!(chart.frames, 184..200);
}

#[test]
fn test_channel_grouping_overlays_robots() {
    let (_ctx, mut session) = session();
    let mut pose = RecordingSink::new();
    let mut charts = RecordingSink::new();

    for _ in 0..3 {
        let robot = session.add_robot().unwrap();
        session.model_ready(&mut pose);
        let (series, _) = parse_movement(csv(100).as_bytes()).unwrap();
        session.load_movement(robot, series, None).unwrap();
    }

    session.set_grouping(ChartGrouping::ByChannel, &mut charts);
    session.toggle_channel("elbow", &mut charts);
    session.toggle_robot_plot(RobotId(1), &mut charts);

    let key = ChartKey::Channel("elbow".to_string());
    let chart = charts.chart(&key).unwrap();
    assert_eq!(chart.traces.len(), 3);
    assert_eq!(
        charts.highlighted(&key),
        &["Robot 0".to_string(), "Robot 2".to_string()]
    );
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("jointscope-{}.csv", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(csv(12).as_bytes()).unwrap();
    }
    let (series, report) = load_movement_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(series.len(), 12);
    assert_eq!(report.unparseable_cells, 0);
    assert_eq!(series.joint_channels(), vec!["shoulder", "elbow"]);
}

#[test]
fn test_end_of_data_halts_once_while_still_checked() {
    let ctx = Arc::new(ManualContext::default());
    let config = ReplayConfig {
        sample_interval_secs: 0.01,
        ..ReplayConfig::default()
    };
    let mut session = ReplaySession::new(ctx.clone(), config).unwrap();
    let mut pose = RecordingSink::new();
    let robot = session.add_robot().unwrap();
    session.model_ready(&mut pose);
    let (series, _) = parse_movement(csv(5).as_bytes()).unwrap();
    session.load_movement(robot, series, None).unwrap();

    session.control_mut().check();
    let mut halts = 0;
    for _ in 0..40 {
        session.pump();
        let was_running = session.clock().is_running();
        session.update_pose(&mut pose);
        if was_running && !session.clock().is_running() {
            halts += 1;
        }
        ctx.advance(Duration::from_millis(10));
    }

    assert_eq!(halts, 1);
    assert!(session.control().is_checked());
    assert_eq!(session.current_frame(), 4);
    assert_eq!(pose.pose_frames.last(), Some(&4));
}

#[test]
fn test_dragging_a_joint_stops_animation() {
    let (ctx, mut session) = session();
    let mut pose = RecordingSink::new();
    let robot = session.add_robot().unwrap();
    session.model_ready(&mut pose);
    let (series, _) = parse_movement(csv(100).as_bytes()).unwrap();
    session.load_movement(robot, series, None).unwrap();

    session.control_mut().check();
    assert_eq!(session.pump(), ClockState::Running);
    ctx.advance(Duration::from_millis(20) * 12);

    session.manipulate_start();
    assert!(!session.control().is_checked());
    assert_eq!(session.pump(), ClockState::Idle);

    ctx.advance(Duration::from_secs(1));
    assert_eq!(session.current_frame(), 12);
}

#[test]
fn test_heatmap_follows_selected_robot() {
    let (_ctx, mut session) = session();
    let mut pose = RecordingSink::new();
    let mut charts = RecordingSink::new();
    let mut heatmap = RecordingSink::new();
    for frames in [80, 60] {
        let robot = session.add_robot().unwrap();
        session.model_ready(&mut pose);
        let (series, _) = parse_movement(csv(frames).as_bytes()).unwrap();
        session.load_movement(robot, series, None).unwrap();
    }
    session.tick(&mut charts, &mut heatmap);
    assert_eq!(heatmap.heatmap.as_ref().map(|(r, _)| *r), Some(RobotId(1)));

    session.select_heatmap_robot(RobotId(0)).unwrap();
    assert_eq!(session.heatmap_robot(), Some(RobotId(0)));
    session.tick(&mut charts, &mut heatmap);
    assert_eq!(heatmap.heatmap.as_ref().map(|(r, _)| *r), Some(RobotId(0)));
    assert_eq!(heatmap.heatmap_draws, 2);
    // 80 frames over 20 columns
    assert_eq!(session.heatmap_grid().unwrap().bucket_size, 4);

    assert!(matches!(
        session.select_heatmap_robot(RobotId(7)),
        Err(ReplayError::Store(StoreError::NotFound(_)))
    ));
    assert_eq!(session.heatmap_robot(), Some(RobotId(0)));
}

#[test]
fn test_blank_row_keeps_robots_aligned() {
    let (_ctx, mut session) = session();
    let mut pose = RecordingSink::new();

    let gapped = "shoulder,elbow\n0.1,0.2\n,\n0.5,0.6\n0.7,0.8\n";
    let whole = "shoulder,elbow\n1,1\n2,2\n3,3\n4,4\n";
    for raw in [gapped, whole] {
        let robot = session.add_robot().unwrap();
        session.model_ready(&mut pose);
        let (series, _) = parse_movement(raw.as_bytes()).unwrap();
        session.load_movement(robot, series, None).unwrap();
    }
    assert_eq!(session.store().min_length(), Some(4));

    session.seek(2);
    session.update_pose(&mut pose);
    assert_eq!(pose.joint(RobotId(0), "shoulder"), Some(0.5));
    assert_eq!(pose.joint(RobotId(1), "shoulder"), Some(3.0));

    session.seek(1);
    session.update_pose(&mut pose);
    assert_eq!(pose.joint(RobotId(0), "elbow"), Some(0.0));
}

#[test]
fn test_unrepresentable_interval_is_a_config_error() {
    let config = ReplayConfig {
        sample_interval_secs: 1e300,
        ..ReplayConfig::default()
    };
    assert!(matches!(
        ReplaySession::new(Arc::new(ManualContext::default()), config),
        Err(ReplayError::Config(_))
    ));
}
