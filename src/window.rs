//! Recent reading window
//!
//! Keeps the last N heart-rate readings for display and smoothing.
//! Detection never depends on the window contents.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of readings kept
pub const DEFAULT_WINDOW_SIZE: usize = 20;

/// Bounded FIFO of recent bpm values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl Default for RecentWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl RecentWindow {
    /// Create a window holding at most `capacity` readings (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest when full
    pub fn push(&mut self, bpm: f64) {
        self.values.push_back(bpm);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    /// Rolling average of the window
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: f64 = self.values.iter().sum();
        Some(sum / self.values.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_rolling() {
        let mut window = RecentWindow::new(3);

        // Add 5 readings - only last 3 should be kept
        for i in 0..5 {
            window.push(60.0 + (i as f64) * 10.0); // 60, 70, 80, 90, 100
        }

        assert_eq!(window.len(), 3);
        let kept: Vec<f64> = window.iter().copied().collect();
        assert_eq!(kept, vec![80.0, 90.0, 100.0]);
        assert!((window.mean().unwrap() - 90.0).abs() < 0.001);
        assert_eq!(window.latest(), Some(100.0));
        assert_eq!(window.min(), Some(80.0));
        assert_eq!(window.max(), Some(100.0));
    }

    #[test]
    fn test_default_capacity() {
        let mut window = RecentWindow::default();
        for i in 0..25 {
            window.push(i as f64);
        }
        assert_eq!(window.len(), DEFAULT_WINDOW_SIZE);
        assert_eq!(window.iter().next(), Some(&5.0));
    }

    #[test]
    fn test_empty_window() {
        let window = RecentWindow::new(0);
        assert_eq!(window.capacity(), 1);
        assert!(window.mean().is_none());
        assert!(window.latest().is_none());
    }
}
