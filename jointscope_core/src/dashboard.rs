//! JointScope TUI Dashboard Module
//! ===============================
//!
//! Terminal rendering of the replay's line charts and heatmap overview.
//! Uses Ratatui for rendering and Crossbeam to hand render packets from
//! the replay loop to the UI thread.
//!
//! Enable with the `dashboard` feature flag.

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender};
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use jointscope_env::RobotId;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame, Terminal,
};

use crate::heatmap::{DivergingColorScale, HeatmapGrid};
use crate::render::{ChartKey, ChartSink, HeatmapSink};
use crate::view::WindowPoints;

// =============================================================================
// RENDER PACKET (Sent from the replay loop to the dashboard)
// =============================================================================

/// One labelled line in data coordinates (frame, value).
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLine {
    pub label: String,
    pub highlighted: bool,
    pub data: Vec<(f64, f64)>,
}

/// Self-contained snapshot of one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSnapshot {
    pub first_frame: usize,
    pub last_frame: usize,
    pub y_domain: (f64, f64),
    pub lines: Vec<ChartLine>,
}

/// Render updates produced by `TerminalChartSink`.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPacket {
    Chart { key: ChartKey, snapshot: ChartSnapshot },
    ClearChart(ChartKey),
    Heatmap {
        robot: RobotId,
        /// Channel name and one RGB colour per column
        rows: Vec<(String, Vec<[u8; 3]>)>,
    },
    ClearHeatmap,
}

/// Chart/heatmap sink that forwards snapshots over a channel.
///
/// A disconnected dashboard is not an error; packets are dropped.
pub struct TerminalChartSink {
    tx: Sender<RenderPacket>,
}

impl TerminalChartSink {
    pub fn new(tx: Sender<RenderPacket>) -> Self {
        Self { tx }
    }

    fn send(&self, packet: RenderPacket) {
        let _ = self.tx.send(packet);
    }
}

impl ChartSink for TerminalChartSink {
    fn draw_chart(&mut self, key: &ChartKey, points: &WindowPoints, highlighted: &[String]) {
        let lines = points
            .traces
            .iter()
            .map(|trace| ChartLine {
                label: trace.label.clone(),
                highlighted: highlighted.contains(&trace.label),
                data: trace
                    .points
                    .iter()
                    .map(|p| (p.frame as f64, p.value))
                    .collect(),
            })
            .collect();
        let snapshot = ChartSnapshot {
            first_frame: points.frames.start,
            last_frame: points.frames.end.saturating_sub(1),
            y_domain: points.y_scale.domain,
            lines,
        };
        self.send(RenderPacket::Chart {
            key: key.clone(),
            snapshot,
        });
    }

    fn clear_chart(&mut self, key: &ChartKey) {
        self.send(RenderPacket::ClearChart(key.clone()));
    }
}

impl HeatmapSink for TerminalChartSink {
    fn draw_heatmap(&mut self, robot: RobotId, grid: &HeatmapGrid, scale: &DivergingColorScale) {
        let rows = grid
            .rows
            .iter()
            .enumerate()
            .map(|(row, name)| {
                let colors = grid
                    .row(row)
                    .iter()
                    .map(|cell| {
                        let c = scale.color(cell.value);
                        [c.red, c.green, c.blue]
                    })
                    .collect();
                (name.clone(), colors)
            })
            .collect();
        self.send(RenderPacket::Heatmap { robot, rows });
    }

    fn clear_heatmap(&mut self) {
        self.send(RenderPacket::ClearHeatmap);
    }
}

// =============================================================================
// REPLAY DASHBOARD
// =============================================================================

const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Magenta,
    Color::Green,
    Color::LightBlue,
    Color::LightRed,
];

/// TUI dashboard showing the latest snapshot of every chart.
pub struct ReplayDashboard {
    rx: Receiver<RenderPacket>,
    charts: BTreeMap<ChartKey, ChartSnapshot>,
    heatmap: Option<(RobotId, Vec<(String, Vec<[u8; 3]>)>)>,
    frame_count: usize,
}

impl ReplayDashboard {
    pub fn new(rx: Receiver<RenderPacket>) -> Self {
        Self {
            rx,
            charts: BTreeMap::new(),
            heatmap: None,
            frame_count: 0,
        }
    }

    /// Applies every queued packet. Returns how many were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(packet) = self.rx.try_recv() {
            match packet {
                RenderPacket::Chart { key, snapshot } => {
                    self.charts.insert(key, snapshot);
                }
                RenderPacket::ClearChart(key) => {
                    self.charts.remove(&key);
                }
                RenderPacket::Heatmap { robot, rows } => self.heatmap = Some((robot, rows)),
                RenderPacket::ClearHeatmap => self.heatmap = None,
            }
            applied += 1;
        }
        applied
    }

    pub fn chart(&self, key: &ChartKey) -> Option<&ChartSnapshot> {
        self.charts.get(key)
    }

    /// Run the TUI main loop (blocks until 'q' pressed)
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        loop {
            self.drain();

            terminal.draw(|f| self.ui(f))?;
            self.frame_count += 1;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
                        break;
                    }
                }
            }
        }

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        Ok(())
    }

    fn ui(&self, f: &mut Frame) {
        let heatmap_rows = self.heatmap.as_ref().map_or(0, |(_, rows)| rows.len() as u16);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(2),                // Header
                Constraint::Min(8),                   // Line charts
                Constraint::Length(heatmap_rows + 2), // Heatmap
                Constraint::Length(1),                // Footer
            ])
            .split(f.area());

        // === HEADER ===
        let frame_label = self
            .charts
            .values()
            .next()
            .map(|c| format!("frames {}..={}", c.first_frame, c.last_frame))
            .unwrap_or_else(|| "no data".to_string());
        let header = Paragraph::new(Line::from(vec![
            Span::styled("JointScope Replay", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  |  "),
            Span::styled(frame_label, Style::default().fg(Color::Cyan)),
            Span::raw("  |  "),
            Span::raw(format!("Redraws: {}", self.frame_count)),
        ]))
        .block(Block::default().borders(Borders::BOTTOM));
        f.render_widget(header, chunks[0]);

        // === LINE CHARTS ===
        if !self.charts.is_empty() {
            let n = self.charts.len() as u32;
            let areas = Layout::default()
                .direction(Direction::Vertical)
                .constraints((0..n).map(|_| Constraint::Ratio(1, n)).collect::<Vec<_>>())
                .split(chunks[1]);
            for ((key, snapshot), area) in self.charts.iter().zip(areas.iter()) {
                render_chart(f, *area, key, snapshot);
            }
        }

        // === HEATMAP ===
        if let Some((robot, rows)) = &self.heatmap {
            let label_width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            let lines: Vec<Line> = rows
                .iter()
                .map(|(name, colors)| {
                    let mut spans = vec![Span::raw(format!("{:>width$} ", name, width = label_width))];
                    spans.extend(colors.iter().map(|[r, g, b]| {
                        Span::styled(" ", Style::default().bg(Color::Rgb(*r, *g, *b)))
                    }));
                    Line::from(spans)
                })
                .collect();
            let heatmap = Paragraph::new(lines).block(
                Block::default()
                    .title(format!("Overview: {}", robot.label()))
                    .borders(Borders::ALL),
            );
            f.render_widget(heatmap, chunks[2]);
        }

        // === FOOTER ===
        let footer = Paragraph::new("Press 'q' to quit").style(Style::default().fg(Color::DarkGray));
        f.render_widget(footer, chunks[3]);
    }
}

fn render_chart(f: &mut Frame, area: Rect, key: &ChartKey, snapshot: &ChartSnapshot) {
    let datasets: Vec<Dataset> = snapshot
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let mut style = Style::default().fg(PALETTE[i % PALETTE.len()]);
            if line.highlighted {
                style = style.add_modifier(Modifier::BOLD);
            }
            Dataset::default()
                .name(line.label.clone())
                .marker(if line.highlighted {
                    symbols::Marker::Block
                } else {
                    symbols::Marker::Braille
                })
                .graph_type(GraphType::Line)
                .style(style)
                .data(&line.data)
        })
        .collect();

    let (lo, hi) = snapshot.y_domain;
    let x_bounds = [snapshot.first_frame as f64, snapshot.last_frame.max(snapshot.first_frame + 1) as f64];
    let chart = Chart::new(datasets)
        .block(Block::default().title(key.to_string()).borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .bounds(x_bounds)
                .labels([snapshot.first_frame.to_string(), snapshot.last_frame.to_string()]),
        )
        .y_axis(
            Axis::default()
                .bounds([lo, hi])
                .labels([format!("{:.2}", lo), format!("{:.2}", hi)]),
        );
    f.render_widget(chart, area);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heatmap::HeatmapAggregator;
    use crate::series::Series;
    use crate::view::WindowedSeriesView;

    fn series() -> Series {
        Series::from_rows(
            ["hip", "knee"],
            (0..40).map(|f| vec![f as f64 * 0.1, -1.0]).collect(),
        )
    }

    #[test]
    fn test_chart_packets_reach_dashboard() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut sink = TerminalChartSink::new(tx);
        let mut dashboard = ReplayDashboard::new(rx);

        let points = WindowedSeriesView::default().build_window(&series(), 20, 10, &["hip", "knee"]);
        let key = ChartKey::Robot(RobotId(0));
        sink.draw_chart(&key, &points, &["knee".to_string()]);
        assert_eq!(dashboard.drain(), 1);

        let snapshot = dashboard.chart(&key).unwrap();
        assert_eq!(snapshot.first_frame, 15);
        assert_eq!(snapshot.last_frame, 24);
        assert_eq!(snapshot.lines.len(), 2);
        assert!(!snapshot.lines[0].highlighted);
        assert!(snapshot.lines[1].highlighted);
        assert_eq!(snapshot.lines[1].data[0], (15.0, -1.0));

        sink.clear_chart(&key);
        dashboard.drain();
        assert!(dashboard.chart(&key).is_none());
    }

    #[test]
    fn test_heatmap_packet_carries_colors() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut sink = TerminalChartSink::new(tx);
        let grid = HeatmapAggregator::new(4).process(&series(), &["hip", "knee"]);
        sink.draw_heatmap(RobotId(1), &grid, &DivergingColorScale::joint_angles());

        match rx.try_recv().unwrap() {
            RenderPacket::Heatmap { robot, rows } => {
                assert_eq!(robot, RobotId(1));
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].1.len(), 4);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_disconnected_dashboard_is_ignored() {
        let (tx, rx) = crossbeam::channel::unbounded();
        drop(rx);
        let mut sink = TerminalChartSink::new(tx);
        sink.clear_heatmap();
    }
}
