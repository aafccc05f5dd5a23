//! PlaybackClock - the single logical clock shared by every consumer.
//!
//! Maps wall time to a discrete frame index:
//!
//! ```text
//! Idle:     frame = frame_offset
//! Running:  frame = floor((now - origin) / sample_interval) + frame_offset
//! ```
//!
//! The clock never schedules itself. A host driver pumps `tick()` at a fixed
//! cadence; the sample interval is data time per frame and is independent
//! of that cadence.
//!
//! # State Machine
//!
//! ```text
//!            start() [data present]
//!   ┌──────┐ ───────────────────────► ┌─────────┐
//!   │ Idle │                          │ Running │ ◄── seek() re-anchors
//!   └──────┘ ◄─────────────────────── └─────────┘
//!            pause() / stop() / end-of-data
//! ```
//!
//! End-of-data clamps to the last frame common to all loaded robots and
//! halts; it never wraps or loops. The halt is latched: `start()` refuses to
//! run from the last frame again until a `seek()` moves the offset or the
//! common length grows.

use std::sync::Arc;
use std::time::Duration;

use jointscope_env::ReplayContext;
use tracing::{debug, info, warn};

use crate::store::MovementStore;

/// Externally visible clock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    Running,
}

/// Callback invoked once per pumped tick with the current frame.
pub type TickCallback = Box<dyn FnMut(usize)>;

/// Wall-time to frame-index clock.
pub struct PlaybackClock<Ctx: ReplayContext> {
    context: Arc<Ctx>,

    /// Data time covered by one frame
    sample_interval: Duration,

    /// Context time at which the current run was anchored
    origin: Option<Duration>,

    /// Frame to resume from; the frozen frame while idle
    frame_offset: usize,

    running: bool,

    /// Set by end-of-data, cleared by `seek()`
    at_end: bool,

    on_tick: Option<TickCallback>,
}

impl<Ctx: ReplayContext> PlaybackClock<Ctx> {
    /// Creates an idle clock at frame 0.
    ///
    /// A zero interval is bumped to one nanosecond so the frame formula
    /// stays defined.
    pub fn new(context: Arc<Ctx>, sample_interval: Duration) -> Self {
        Self {
            context,
            sample_interval: sample_interval.max(Duration::from_nanos(1)),
            origin: None,
            frame_offset: 0,
            running: false,
            at_end: false,
            on_tick: None,
        }
    }

    /// Whether playback halted on end-of-data and has not been re-seeked.
    pub fn at_end(&self) -> bool {
        self.at_end
    }

    /// Data time per frame.
    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> ClockState {
        if self.running {
            ClockState::Running
        } else {
            ClockState::Idle
        }
    }

    /// Frame playback resumes from.
    pub fn frame_offset(&self) -> usize {
        self.frame_offset
    }

    /// Starts playback from `frame_offset`.
    ///
    /// No-op when already running, when no playable data is loaded, or when
    /// playback already halted on the last common frame. Returns whether the
    /// clock is running afterwards.
    pub fn start(&mut self, store: &MovementStore) -> bool {
        if self.running {
            return true;
        }
        let Some(len) = store.min_length().filter(|len| *len > 0) else {
            return false;
        };
        if self.at_end {
            if self.frame_offset + 1 >= len {
                return false;
            }
            // A shorter robot went away; there is data left to play
            self.at_end = false;
        }
        self.origin = Some(self.context.now());
        self.running = true;
        debug!("Clock started at frame {}", self.frame_offset);
        true
    }

    /// Freezes the current frame into `frame_offset` and goes idle.
    pub fn pause(&mut self, store: &MovementStore) {
        if !self.running {
            return;
        }
        let frame = self.current_frame(store);
        self.frame_offset = frame;
        self.running = false;
        self.origin = None;
        debug!("Clock paused at frame {}", frame);
    }

    /// Same as `pause()`; used on end-of-data by consumers.
    pub fn stop(&mut self, store: &MovementStore) {
        self.pause(store);
    }

    /// Moves the resume point to `frame`, clamped to the playable range.
    ///
    /// While running the clock is re-anchored to now, so playback continues
    /// from the new frame without a time jump. With no data loaded the
    /// offset resets to 0.
    pub fn seek(&mut self, frame: usize, store: &MovementStore) {
        self.frame_offset = match store.min_length() {
            Some(len) if len > 0 => frame.min(len - 1),
            _ => 0,
        };
        self.at_end = false;
        if self.running {
            self.origin = Some(self.context.now());
        }
        debug!("Clock seeked to frame {}", self.frame_offset);
    }

    /// The current frame, always in `[0, min_length)` while data exists.
    ///
    /// Reaching `min_length` while running clamps `frame_offset` to the last
    /// common frame and halts the clock. That transition happens once;
    /// subsequent calls return the frozen frame.
    pub fn current_frame(&mut self, store: &MovementStore) -> usize {
        let limit = store.min_length().filter(|len| *len > 0);

        if !self.running {
            if let Some(len) = limit {
                // A shorter robot may have been loaded while idle
                self.frame_offset = self.frame_offset.min(len - 1);
            }
            return self.frame_offset;
        }

        let Some(len) = limit else {
            // Data vanished underneath a running clock
            self.running = false;
            self.origin = None;
            self.frame_offset = 0;
            self.at_end = false;
            return 0;
        };

        let elapsed_frames = self.elapsed_frames();
        let frame = self.frame_offset.saturating_add(elapsed_frames);
        if frame >= len {
            self.frame_offset = len - 1;
            self.running = false;
            self.origin = None;
            self.at_end = true;
            info!("End of data: playback halted at frame {}", self.frame_offset);
            return self.frame_offset;
        }
        frame
    }

    /// Registers the single tick callback, replacing any previous one.
    pub fn on_tick(&mut self, callback: impl FnMut(usize) + 'static) {
        self.on_tick = Some(Box::new(callback));
    }

    /// Driver entry point: reads the current frame and hands it to the
    /// registered callback.
    pub fn tick(&mut self, store: &MovementStore) -> usize {
        let frame = self.current_frame(store);
        if let Some(callback) = self.on_tick.as_mut() {
            callback(frame);
        }
        frame
    }

    fn elapsed_frames(&self) -> usize {
        let Some(origin) = self.origin else {
            return 0;
        };
        let elapsed = match self.context.elapsed_since(origin) {
            Ok(elapsed) => elapsed,
            Err(err) => {
                warn!("{}; holding frame", err);
                Duration::ZERO
            }
        };
        (elapsed.as_nanos() / self.sample_interval.as_nanos()) as usize
    }
}
