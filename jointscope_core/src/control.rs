//! AnimationControl - the level-triggered play/idle toggle.
//!
//! The toggle owns a single boolean. The host driver calls `drive()` once per
//! display frame and the clock converges to the toggle's level: started when
//! checked, paused when unchecked. Interactions that imply "stop animating"
//! only need to `uncheck()`; the next pump does the rest. A checked toggle
//! at end-of-data leaves the clock idle because the clock refuses to restart
//! from its last frame.

use jointscope_env::ReplayContext;

use crate::clock::{ClockState, PlaybackClock};
use crate::store::MovementStore;

/// Two-state animation toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimationControl {
    checked: bool,
}

impl AnimationControl {
    /// Creates an unchecked control.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self) {
        self.checked = true;
    }

    pub fn uncheck(&mut self) {
        self.checked = false;
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// One pump of the driver loop.
    ///
    /// Does nothing until at least one movement is loaded.
    pub fn drive<Ctx: ReplayContext>(
        &self,
        clock: &mut PlaybackClock<Ctx>,
        store: &MovementStore,
    ) -> ClockState {
        if store.has_any() {
            if self.checked {
                clock.start(store);
            } else if clock.is_running() {
                clock.pause(store);
            }
        }
        clock.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Series;
    use crate::test_support::TestContext;
    use jointscope_env::RobotId;
    use std::time::Duration;

    fn loaded_store() -> MovementStore {
        let mut store = MovementStore::new();
        let rows = (0..100).map(|f| vec![f as f64]).collect();
        store.add(RobotId(0), Series::from_rows(["j"], rows)).unwrap();
        store
    }

    #[test]
    fn test_toggle_levels() {
        let mut control = AnimationControl::new();
        assert!(!control.is_checked());
        control.check();
        assert!(control.is_checked());
        control.uncheck();
        assert!(!control.is_checked());
    }

    #[test]
    fn test_drive_converges_to_level() {
        let ctx = TestContext::shared();
        let mut clock = PlaybackClock::new(ctx.clone(), Duration::from_millis(10));
        let store = loaded_store();
        let mut control = AnimationControl::new();

        control.check();
        assert_eq!(control.drive(&mut clock, &store), ClockState::Running);
        // Level-triggered: repeated pumps keep the same state
        assert_eq!(control.drive(&mut clock, &store), ClockState::Running);

        ctx.advance(Duration::from_millis(50));
        control.uncheck();
        assert_eq!(control.drive(&mut clock, &store), ClockState::Idle);
        assert_eq!(clock.frame_offset(), 5);
    }

    #[test]
    fn test_checked_drive_settles_after_end_of_data() {
        let ctx = TestContext::shared();
        let mut clock = PlaybackClock::new(ctx.clone(), Duration::from_millis(10));
        let store = loaded_store();
        let mut control = AnimationControl::new();
        control.check();
        control.drive(&mut clock, &store);

        ctx.advance(Duration::from_secs(2));
        assert_eq!(clock.current_frame(&store), 99);
        for _ in 0..10 {
            assert_eq!(control.drive(&mut clock, &store), ClockState::Idle);
            ctx.advance(Duration::from_millis(10));
            assert_eq!(clock.current_frame(&store), 99);
        }
    }

    #[test]
    fn test_drive_without_data_stays_idle() {
        let ctx = TestContext::shared();
        let mut clock = PlaybackClock::new(ctx, Duration::from_millis(10));
        let mut control = AnimationControl::new();
        control.check();
        assert_eq!(control.drive(&mut clock, &MovementStore::new()), ClockState::Idle);
    }
}
