//! ReplaySession - the single logical thread that owns all replay state.
//!
//! Every mutation path (ingestion, clock pumps, chart interaction, robot
//! panel toggles) goes through `&mut self`, so the store, clock and charts
//! can never be observed half-updated. Hosts drive two pumps:
//!
//! ```text
//! display frame:  pump()  ->  update_pose(pose_sink)
//! tick:           tick(chart_sink, heatmap_sink)
//! ```
//!
//! # Chart grouping
//!
//! | Grouping    | One chart per     | Traces            | Highlighted            |
//! |-------------|-------------------|-------------------|------------------------|
//! | `ByRobot`   | plotted robot     | every joint       | checked joints, hover  |
//! | `ByChannel` | checked joint     | every robot       | plotted robots, hover  |

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Arc;

use jointscope_env::{ReplayContext, RobotId};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{ClockState, PlaybackClock};
use crate::config::ReplayConfig;
use crate::control::AnimationControl;
use crate::error::ReplayError;
use crate::heatmap::{DivergingColorScale, HeatmapAggregator, HeatmapGrid};
use crate::pose::PoseSink;
use crate::render::{ChartKey, ChartSink, HeatmapSink};
use crate::robot::{RobotController, RobotRoster};
use crate::series::{Series, POSITION_CHANNELS, ROTATION_CHANNELS};
use crate::store::MovementStore;
use crate::subscription::{OneShotRegistry, SubscriptionHandle};
use crate::view::{ChartGeometry, TraceSource, WindowPoints, WindowedSeriesView};

/// How line charts are split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartGrouping {
    #[default]
    ByRobot,
    ByChannel,
}

#[derive(Debug, Default)]
struct LineChart {
    /// Brushed frame range; overrides the playback window while set
    selection: Option<Range<usize>>,
    /// Last projection handed to the sink, for hit testing
    last: Option<WindowPoints>,
}

/// Replay engine for one operator session.
pub struct ReplaySession<C: ReplayContext> {
    config: ReplayConfig,
    store: MovementStore,
    clock: PlaybackClock<C>,
    control: AnimationControl,

    roster: RobotRoster,
    model_ready: OneShotRegistry<RobotRoster>,
    pending_ready: BTreeMap<RobotId, SubscriptionHandle>,

    view: WindowedSeriesView,
    window_size: usize,
    grouping: ChartGrouping,
    charts: BTreeMap<ChartKey, LineChart>,

    /// Joint channels offered for plotting, in header order
    observation_channels: Vec<String>,
    checked_channels: BTreeSet<String>,
    checked_robots: BTreeSet<RobotId>,
    /// Trace label under the pointer (or the joint hovered in 3D)
    hovered: Option<String>,

    aggregator: HeatmapAggregator,
    color_scale: DivergingColorScale,
    heatmap_robot: Option<RobotId>,
    heatmap_grid: Option<HeatmapGrid>,
    heatmap_dirty: bool,
}

impl<C: ReplayContext> ReplaySession<C> {
    /// Creates an empty session. The config is validated first.
    pub fn new(context: Arc<C>, config: ReplayConfig) -> Result<Self, ReplayError> {
        config.validate()?;
        let clock = PlaybackClock::new(context, config.sample_interval());
        let view = WindowedSeriesView::new(ChartGeometry::from_config(&config.chart));
        let aggregator = HeatmapAggregator::new(config.heatmap_grid_columns);
        info!(
            "Replay session: interval={:?}, window={}, heatmap columns={}",
            config.sample_interval(),
            config.window_size,
            config.heatmap_grid_columns
        );
        Ok(Self {
            window_size: config.window_size,
            config,
            store: MovementStore::new(),
            clock,
            control: AnimationControl::new(),
            roster: RobotRoster::new(),
            model_ready: OneShotRegistry::new(),
            pending_ready: BTreeMap::new(),
            view,
            grouping: ChartGrouping::default(),
            charts: BTreeMap::new(),
            observation_channels: Vec::new(),
            checked_channels: BTreeSet::new(),
            checked_robots: BTreeSet::new(),
            hovered: None,
            aggregator,
            color_scale: DivergingColorScale::joint_angles(),
            heatmap_robot: None,
            heatmap_grid: None,
            heatmap_dirty: false,
        })
    }

    // ---- accessors ----

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn store(&self) -> &MovementStore {
        &self.store
    }

    pub fn clock(&self) -> &PlaybackClock<C> {
        &self.clock
    }

    pub fn control(&self) -> &AnimationControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut AnimationControl {
        &mut self.control
    }

    pub fn roster(&self) -> &RobotRoster {
        &self.roster
    }

    pub fn robot(&self, robot: RobotId) -> Option<&RobotController> {
        self.roster.get(robot)
    }

    pub fn grouping(&self) -> ChartGrouping {
        self.grouping
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn chart_keys(&self) -> Vec<ChartKey> {
        self.charts.keys().cloned().collect()
    }

    pub fn selection(&self, key: &ChartKey) -> Option<Range<usize>> {
        self.charts.get(key).and_then(|chart| chart.selection.clone())
    }

    pub fn observation_channels(&self) -> &[String] {
        &self.observation_channels
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn heatmap_robot(&self) -> Option<RobotId> {
        self.heatmap_robot
    }

    pub fn heatmap_grid(&self) -> Option<&HeatmapGrid> {
        self.heatmap_grid.as_ref()
    }

    pub fn color_scale(&self) -> &DivergingColorScale {
        &self.color_scale
    }

    /// Current frame; may trigger the end-of-data transition.
    pub fn current_frame(&mut self) -> usize {
        self.clock.current_frame(&self.store)
    }

    /// Registers the clock's tick callback.
    pub fn on_tick(&mut self, callback: impl FnMut(usize) + 'static) {
        self.clock.on_tick(callback);
    }

    pub fn seek(&mut self, frame: usize) {
        self.clock.seek(frame, &self.store);
    }

    // ---- robots ----

    /// Creates the next robot controller.
    ///
    /// Animation is unchecked and further additions are refused until
    /// `model_ready()` reports the robot's model as loaded.
    pub fn add_robot(&mut self) -> Result<RobotId, ReplayError> {
        let id = self.roster.add().ok_or(ReplayError::RobotCreationPending)?;
        self.control.uncheck();
        let handle = self.model_ready.register(move |roster: &mut RobotRoster| {
            roster.enable_add();
            debug!("Model ready for {}", id.label());
        });
        self.pending_ready.insert(id, handle);
        Ok(id)
    }

    /// The robot model finished loading: fires pending one-shots, then
    /// pushes every robot's panel state to the pose sink.
    pub fn model_ready(&mut self, sink: &mut dyn PoseSink) -> usize {
        let fired = self.model_ready.fire(&mut self.roster);
        self.pending_ready.clear();
        for controller in self.roster.iter() {
            controller.apply(sink);
        }
        fired
    }

    /// Removes a robot, its movement, its chart and, if selected, its
    /// heatmap.
    pub fn delete_robot(
        &mut self,
        robot: RobotId,
        charts: &mut dyn ChartSink,
        heatmap: &mut dyn HeatmapSink,
    ) -> Result<(), ReplayError> {
        self.roster
            .remove(robot)
            .ok_or(ReplayError::UnknownRobot(robot))?;
        if let Some(handle) = self.pending_ready.remove(&robot) {
            self.model_ready.cancel(handle);
            self.roster.enable_add();
        }
        self.store.remove(robot);
        self.checked_robots.remove(&robot);

        let key = ChartKey::Robot(robot);
        if self.charts.remove(&key).is_some() {
            charts.clear_chart(&key);
        }

        if self.heatmap_robot == Some(robot) {
            match self.store.robot_ids().next() {
                Some(next) => {
                    self.heatmap_robot = Some(next);
                    self.heatmap_dirty = true;
                }
                None => {
                    self.heatmap_robot = None;
                    self.heatmap_grid = None;
                    heatmap.clear_heatmap();
                }
            }
        }
        info!("Deleted {}", robot.label());
        Ok(())
    }

    /// Installs a parsed movement for an existing robot, replacing any
    /// previous one. The robot becomes plotted and, when grouping by robot,
    /// the heatmap selection.
    pub fn load_movement(
        &mut self,
        robot: RobotId,
        series: Series,
        source_name: Option<String>,
    ) -> Result<(), ReplayError> {
        if !self.roster.contains(robot) {
            return Err(ReplayError::UnknownRobot(robot));
        }
        if self.store.remove(robot).is_some() {
            debug!("Replacing movement of {}", robot.label());
        }
        if self.observation_channels.is_empty() {
            self.observation_channels = series
                .joint_channels()
                .into_iter()
                .map(str::to_string)
                .collect();
        }
        let frames = series.len();
        self.store.add(robot, series)?;
        if let Some(controller) = self.roster.get_mut(robot) {
            controller.source_name = source_name;
        }
        self.checked_robots.insert(robot);
        self.sync_charts();

        if self.grouping == ChartGrouping::ByRobot {
            self.heatmap_robot = Some(robot);
            self.heatmap_dirty = true;
        }
        info!(
            "{} loaded {} frames (min length {:?})",
            robot.label(),
            frames,
            self.store.min_length()
        );
        Ok(())
    }

    /// Selects the robot shown in the heatmap.
    pub fn select_heatmap_robot(&mut self, robot: RobotId) -> Result<(), ReplayError> {
        self.store.get(robot)?;
        self.heatmap_robot = Some(robot);
        self.heatmap_dirty = true;
        Ok(())
    }

    pub fn set_visible(
        &mut self,
        robot: RobotId,
        visible: bool,
        sink: &mut dyn PoseSink,
    ) -> Result<(), ReplayError> {
        self.controller_mut(robot)?.visible = visible;
        sink.set_robot_visibility(robot, visible);
        Ok(())
    }

    pub fn set_highlight(
        &mut self,
        robot: RobotId,
        highlight: bool,
        sink: &mut dyn PoseSink,
    ) -> Result<(), ReplayError> {
        self.controller_mut(robot)?.highlight = highlight;
        sink.set_robot_highlight(robot, highlight);
        Ok(())
    }

    /// "Update position" toggle; when off the robot stands still.
    pub fn set_follow_position(
        &mut self,
        robot: RobotId,
        follow: bool,
        sink: &mut dyn PoseSink,
    ) -> Result<(), ReplayError> {
        self.controller_mut(robot)?.follow_position = follow;
        sink.set_robot_stand_still(robot, !follow);
        Ok(())
    }

    /// Sets one axis of the robot's initial placement. Axes past 2 are
    /// ignored.
    pub fn set_init_position(
        &mut self,
        robot: RobotId,
        axis: usize,
        value: f64,
        sink: &mut dyn PoseSink,
    ) -> Result<(), ReplayError> {
        let controller = self.controller_mut(robot)?;
        if axis >= 3 {
            warn!("Ignoring init position axis {}", axis);
            return Ok(());
        }
        controller.init_position[axis] = value;
        sink.set_robot_init_position(robot, axis, value);
        Ok(())
    }

    /// The operator started dragging a joint in the 3D view.
    pub fn manipulate_start(&mut self) {
        self.control.uncheck();
    }

    fn controller_mut(&mut self, robot: RobotId) -> Result<&mut RobotController, ReplayError> {
        self.roster
            .get_mut(robot)
            .ok_or(ReplayError::UnknownRobot(robot))
    }

    // ---- pumps ----

    /// Display-frame pump: converges the clock to the animation toggle.
    pub fn pump(&mut self) -> ClockState {
        self.control.drive(&mut self.clock, &self.store)
    }

    /// Pushes the current frame of every loaded robot to the pose sink.
    ///
    /// Unparseable values read as zero. A robot without data at the
    /// current frame stops the clock and has its joints zeroed.
    pub fn update_pose(&mut self, sink: &mut dyn PoseSink) -> usize {
        let frame = self.clock.current_frame(&self.store);
        sink.begin_frame(frame);
        for (robot, series) in self.store.iter() {
            if !self.roster.contains(robot) {
                continue;
            }
            let joints = series.joint_channels();
            let Some(sample) = series.frame(frame) else {
                self.clock.stop(&self.store);
                for joint in joints {
                    sink.set_joint_value(robot, joint, 0.0);
                }
                return frame;
            };
            for joint in joints {
                let value = series
                    .channel_index(joint)
                    .map_or(0.0, |idx| sample.value_or_zero(idx));
                sink.set_joint_value(robot, joint, value);
            }
            let axes = |names: [&str; 3]| {
                let read = |name: &str| {
                    series
                        .channel_index(name)
                        .map_or(0.0, |idx| sample.value_or_zero(idx))
                };
                Vector3::new(read(names[0]), read(names[1]), read(names[2]))
            };
            sink.set_robot_position(robot, axes(POSITION_CHANNELS));
            sink.set_robot_rotation(robot, axes(ROTATION_CHANNELS));
        }
        frame
    }

    /// Tick pump: advances the clock, fires the tick callback and redraws
    /// charts and, when stale, the heatmap. Returns the frame drawn.
    pub fn tick(&mut self, charts: &mut dyn ChartSink, heatmap: &mut dyn HeatmapSink) -> usize {
        let frame = self.clock.tick(&self.store);
        self.draw_charts(frame, charts);
        if self.heatmap_dirty {
            self.refresh_heatmap(heatmap);
        }
        frame
    }

    /// Redraws every chart at the current frame.
    pub fn redraw_charts(&mut self, sink: &mut dyn ChartSink) {
        let frame = self.clock.current_frame(&self.store);
        self.draw_charts(frame, sink);
    }

    // ---- chart interaction ----

    /// Switches grouping; every chart is rebuilt.
    pub fn set_grouping(&mut self, grouping: ChartGrouping, sink: &mut dyn ChartSink) {
        if grouping == self.grouping {
            return;
        }
        for key in self.charts.keys() {
            sink.clear_chart(key);
        }
        self.charts.clear();
        self.grouping = grouping;
        self.sync_charts();
        self.redraw_charts(sink);
        debug!("Chart grouping: {:?}", grouping);
    }

    /// Flips a joint's checked state; returns the new state.
    pub fn toggle_channel(&mut self, channel: &str, sink: &mut dyn ChartSink) -> bool {
        let checked = if self.checked_channels.remove(channel) {
            false
        } else {
            self.checked_channels.insert(channel.to_string());
            true
        };
        self.apply_chart_membership(sink);
        checked
    }

    /// Flips a robot's plotted state; returns the new state.
    pub fn toggle_robot_plot(&mut self, robot: RobotId, sink: &mut dyn ChartSink) -> bool {
        let checked = if self.checked_robots.remove(&robot) {
            false
        } else {
            self.checked_robots.insert(robot);
            true
        };
        self.apply_chart_membership(sink);
        checked
    }

    /// Changes the playback window and re-windows every chart.
    pub fn set_window_size(&mut self, window_size: usize, sink: &mut dyn ChartSink) {
        self.window_size = window_size.max(1);
        self.redraw_charts(sink);
    }

    /// A brush gesture started: stop animating.
    pub fn begin_brush(&mut self) {
        self.control.uncheck();
    }

    /// A brush gesture ended over `[start, end)`.
    ///
    /// Selections of one frame or less are ignored and leave the chart
    /// untouched. Returns whether the chart was rescaled.
    pub fn end_brush(
        &mut self,
        key: &ChartKey,
        start: usize,
        end: usize,
        sink: &mut dyn ChartSink,
    ) -> bool {
        if !self.charts.contains_key(key) {
            return false;
        }
        let frame = self.clock.current_frame(&self.store);
        let Some(points) = self.project_chart(key, frame, Some(start..end)) else {
            debug!("Ignoring brush [{}, {})", start, end);
            return false;
        };
        if let Some(chart) = self.charts.get_mut(key) {
            chart.selection = Some(start..end);
        }
        self.present_chart(key, points, sink);
        true
    }

    /// Returns a brushed chart to the playback window.
    pub fn clear_brush(&mut self, key: &ChartKey, sink: &mut dyn ChartSink) {
        if let Some(chart) = self.charts.get_mut(key) {
            chart.selection = None;
        }
        let frame = self.clock.current_frame(&self.store);
        self.draw_chart(key, frame, sink);
    }

    /// Single click on a chart at horizontal pixel `pixel_x`.
    ///
    /// While animating this pauses. Otherwise it seeks to the frame under
    /// the cursor and resumes. Returns the frame seeked to, if any.
    pub fn click(&mut self, key: &ChartKey, pixel_x: f64) -> Option<usize> {
        if self.control.is_checked() {
            self.control.uncheck();
            self.clock.pause(&self.store);
            return None;
        }
        let frame = self
            .charts
            .get(key)
            .and_then(|chart| chart.last.as_ref())
            .and_then(|points| points.frame_at(pixel_x))?;
        self.control.check();
        self.clock.seek(frame, &self.store);
        self.clock.start(&self.store);
        Some(frame)
    }

    /// Pointer moved over a chart; highlights the nearest trace. Returns
    /// the hovered label.
    pub fn hover_chart(
        &mut self,
        key: &ChartKey,
        pixel_x: f64,
        pixel_y: f64,
        sink: &mut dyn ChartSink,
    ) -> Option<String> {
        let label = self
            .charts
            .get(key)
            .and_then(|chart| chart.last.as_ref())
            .and_then(|points| WindowedSeriesView::nearest_point(points, pixel_x, pixel_y))
            .map(|nearest| nearest.label.to_string());
        self.set_hovered(label.clone(), sink);
        label
    }

    /// A joint is hovered (or un-hovered) in the 3D view.
    pub fn hover_joint(&mut self, joint: Option<String>, sink: &mut dyn ChartSink) {
        self.set_hovered(joint, sink);
    }

    /// Pointer left a chart.
    pub fn pointer_leave(&mut self, sink: &mut dyn ChartSink) {
        self.set_hovered(None, sink);
    }

    fn set_hovered(&mut self, hovered: Option<String>, sink: &mut dyn ChartSink) {
        if self.hovered == hovered {
            return;
        }
        self.hovered = hovered;
        // While playing the next tick redraws anyway
        if !self.clock.is_running() {
            self.redraw_charts(sink);
        }
    }

    // ---- chart plumbing ----

    /// Keys the current grouping and check state call for.
    fn wanted_charts(&self) -> Vec<ChartKey> {
        match self.grouping {
            ChartGrouping::ByRobot => self
                .checked_robots
                .iter()
                .filter(|robot| self.store.contains(**robot))
                .map(|robot| ChartKey::Robot(*robot))
                .collect(),
            ChartGrouping::ByChannel => self
                .observation_channels
                .iter()
                .filter(|name| self.checked_channels.contains(*name))
                .map(|name| ChartKey::Channel(name.clone()))
                .collect(),
        }
    }

    /// Adds missing charts and drops unwanted ones without touching a sink.
    fn sync_charts(&mut self) -> Vec<ChartKey> {
        let wanted = self.wanted_charts();
        let removed: Vec<ChartKey> = self
            .charts
            .keys()
            .filter(|key| !wanted.contains(key))
            .cloned()
            .collect();
        for key in &removed {
            self.charts.remove(key);
        }
        for key in wanted {
            self.charts.entry(key).or_default();
        }
        removed
    }

    fn apply_chart_membership(&mut self, sink: &mut dyn ChartSink) {
        for key in self.sync_charts() {
            sink.clear_chart(&key);
        }
        self.redraw_charts(sink);
    }

    fn draw_charts(&mut self, frame: usize, sink: &mut dyn ChartSink) {
        let keys: Vec<ChartKey> = self.charts.keys().cloned().collect();
        for key in keys {
            self.draw_chart(&key, frame, sink);
        }
    }

    fn draw_chart(&mut self, key: &ChartKey, frame: usize, sink: &mut dyn ChartSink) {
        let Some(chart) = self.charts.get(key) else {
            return;
        };
        let Some(points) = self.project_chart(key, frame, chart.selection.clone()) else {
            return;
        };
        self.present_chart(key, points, sink);
    }

    fn present_chart(&mut self, key: &ChartKey, points: WindowPoints, sink: &mut dyn ChartSink) {
        if points.is_empty() {
            // Nothing to plot (no channels or no data); skip drawing
            return;
        }
        let highlighted = self.highlighted_labels(key);
        sink.draw_chart(key, &points, &highlighted);
        if let Some(chart) = self.charts.get_mut(key) {
            chart.last = Some(points);
        }
    }

    fn project_chart(
        &self,
        key: &ChartKey,
        frame: usize,
        selection: Option<Range<usize>>,
    ) -> Option<WindowPoints> {
        // Every chart shares the playback axis of frames common to all robots
        let limit = self.store.min_length()?;
        let sources: Vec<TraceSource<'_>> = match key {
            ChartKey::Robot(robot) => {
                let series = self.store.get(*robot).ok()?;
                self.observation_channels
                    .iter()
                    .map(|name| TraceSource::new(name.as_str(), series, name))
                    .collect()
            }
            ChartKey::Channel(name) => self
                .store
                .iter()
                .map(|(robot, series)| TraceSource::new(robot.label(), series, name))
                .collect(),
        };
        match selection {
            Some(range) => self.view.rescale_over(limit, &sources, range.start, range.end),
            None => Some(self.view.build_window_over(limit, &sources, frame, self.window_size)),
        }
    }

    fn highlighted_labels(&self, key: &ChartKey) -> Vec<String> {
        let mut labels: Vec<String> = match key {
            ChartKey::Robot(_) => self.checked_channels.iter().cloned().collect(),
            ChartKey::Channel(_) => self.checked_robots.iter().map(|r| r.label()).collect(),
        };
        if let Some(hovered) = &self.hovered {
            if !labels.contains(hovered) {
                labels.push(hovered.clone());
            }
        }
        labels
    }

    fn refresh_heatmap(&mut self, sink: &mut dyn HeatmapSink) {
        self.heatmap_dirty = false;
        let Some(robot) = self.heatmap_robot else {
            return;
        };
        let Ok(series) = self.store.get(robot) else {
            return;
        };
        let channels: Vec<&str> = self.observation_channels.iter().map(String::as_str).collect();
        let grid = self.aggregator.process(series, &channels);
        sink.draw_heatmap(robot, &grid, &self.color_scale);
        self.heatmap_grid = Some(grid);
    }
}
