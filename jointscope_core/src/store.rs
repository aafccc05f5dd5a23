//! MovementStore - one series per robot, plus the cross-robot minimum.
//!
//! The minimum length bounds playback: the clock halts on the last frame
//! that every loaded robot has.

use std::collections::BTreeMap;

use jointscope_env::RobotId;
use thiserror::Error;
use tracing::debug;

use crate::series::Series;

/// Errors raised by the movement store.
///
/// Both are recovered locally by the caller and never escalate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A series is already loaded for this robot; remove it first
    #[error("Robot {0} already has a movement loaded")]
    DuplicateRobot(RobotId),

    /// No series is loaded for this robot
    #[error("No movement loaded for robot {0}")]
    NotFound(RobotId),
}

/// Per-robot movement storage.
#[derive(Debug, Default)]
pub struct MovementStore {
    movements: BTreeMap<RobotId, Series>,

    /// `None` is the "no data" sentinel
    min_length: Option<usize>,
}

impl MovementStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a robot's series.
    ///
    /// Fails with `DuplicateRobot` if one is already present.
    pub fn add(&mut self, robot: RobotId, series: Series) -> Result<(), StoreError> {
        if self.movements.contains_key(&robot) {
            return Err(StoreError::DuplicateRobot(robot));
        }
        debug!("Movement added for robot {} ({} frames)", robot, series.len());
        self.movements.insert(robot, series);
        self.recompute_min_length();
        Ok(())
    }

    /// Removes a robot's series; absent robots are a no-op.
    pub fn remove(&mut self, robot: RobotId) -> Option<Series> {
        let removed = self.movements.remove(&robot);
        if removed.is_some() {
            debug!("Movement removed for robot {}", robot);
            self.recompute_min_length();
        }
        removed
    }

    /// True if at least one series is present. Gates the clock.
    pub fn has_any(&self) -> bool {
        !self.movements.is_empty()
    }

    /// True if this robot has a series loaded.
    pub fn contains(&self, robot: RobotId) -> bool {
        self.movements.contains_key(&robot)
    }

    /// Returns the robot's series.
    pub fn get(&self, robot: RobotId) -> Result<&Series, StoreError> {
        self.movements.get(&robot).ok_or(StoreError::NotFound(robot))
    }

    /// Cross-robot minimum length, `None` when the store is empty.
    pub fn min_length(&self) -> Option<usize> {
        self.min_length
    }

    /// Number of robots with a series.
    pub fn len(&self) -> usize {
        self.movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }

    /// Robot ids in ascending order.
    pub fn robot_ids(&self) -> impl Iterator<Item = RobotId> + '_ {
        self.movements.keys().copied()
    }

    /// Robot/series pairs in ascending robot order.
    pub fn iter(&self) -> impl Iterator<Item = (RobotId, &Series)> + '_ {
        self.movements.iter().map(|(id, s)| (*id, s))
    }

    /// Drops every series.
    pub fn clear(&mut self) {
        self.movements.clear();
        self.min_length = None;
    }

    fn recompute_min_length(&mut self) {
        self.min_length = self.movements.values().map(Series::len).min();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(len: usize) -> Series {
        Series::from_rows(["j"], (0..len).map(|i| vec![i as f64]).collect())
    }

    #[test]
    fn test_empty_store_has_no_min() {
        let store = MovementStore::new();
        assert!(!store.has_any());
        assert_eq!(store.min_length(), None);
    }

    #[test]
    fn test_min_length_tracks_add_and_remove() {
        let mut store = MovementStore::new();
        store.add(RobotId(1), series(300)).unwrap();
        store.add(RobotId(2), series(200)).unwrap();
        assert_eq!(store.min_length(), Some(200));

        store.remove(RobotId(2));
        assert_eq!(store.min_length(), Some(300));

        store.remove(RobotId(1));
        assert_eq!(store.min_length(), None);
        assert!(!store.has_any());
    }

    #[test]
    fn test_duplicate_robot_rejected() {
        let mut store = MovementStore::new();
        store.add(RobotId(0), series(10)).unwrap();
        assert_eq!(
            store.add(RobotId(0), series(5)),
            Err(StoreError::DuplicateRobot(RobotId(0)))
        );
        // The original series is untouched
        assert_eq!(store.get(RobotId(0)).unwrap().len(), 10);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut store = MovementStore::new();
        store.add(RobotId(0), series(10)).unwrap();
        assert!(store.remove(RobotId(9)).is_none());
        assert_eq!(store.min_length(), Some(10));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = MovementStore::new();
        assert_eq!(store.get(RobotId(3)).unwrap_err(), StoreError::NotFound(RobotId(3)));
    }

    #[test]
    fn test_clear() {
        let mut store = MovementStore::new();
        store.add(RobotId(0), series(10)).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.min_length(), None);
    }
}
