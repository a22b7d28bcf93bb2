//! # Sample Buffers
//!
//! Fixed-capacity FIFO buffers used by the stream processor:
//! - **DelayLine**: holds the most recent N raw samples and emits the oldest
//!   one per push once full
//! - **RollingHistory**: paired raw-delayed / filtered histories for display,
//!   always equal length, oldest evicted
//! - **DisplayHistory**: the audio-side handle that publishes into a history
//!   shared with the HTTP context without ever blocking the audio path
//!
//! All buffers allocate their full capacity up front, so steady-state pushes
//! never reallocate.

use crate::audio::Sample;
use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

/// Constant-latency delay over a sample stream.
///
/// ## Behaviour:
/// - the first N pushes fill the line and return `None` (cold start)
/// - every later push evicts and returns the sample that has been resident
///   longest, so the output lags the input by exactly N samples
pub struct DelayLine {
    buffer: VecDeque<Sample>,
    capacity: usize,
}

impl DelayLine {
    /// Create a delay line of `capacity` samples. Zero is a configuration error.
    pub fn new(capacity: usize) -> AppResult<Self> {
        if capacity == 0 {
            return Err(AppError::ConfigError(
                "Delay line capacity must be at least 1 sample".to_string(),
            ));
        }

        Ok(Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    #[inline]
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        let evicted = if self.buffer.len() == self.capacity {
            self.buffer.pop_front()
        } else {
            None
        };
        self.buffer.push_back(sample);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once the line holds `capacity` samples. Never reverts.
    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }
}

/// Bounded pair of histories (raw-delayed and filtered), most-recent-last.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    raw: VecDeque<Sample>,
    filtered: VecDeque<Sample>,
    capacity: usize,
}

/// Read-only copy of a [`RollingHistory`], as served to viewers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySnapshot {
    pub raw: Vec<Sample>,
    pub filtered: Vec<Sample>,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            raw: VecDeque::with_capacity(capacity),
            filtered: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append paired samples. Extra samples in the longer slice are ignored
    /// so both histories stay the same length.
    pub fn extend(&mut self, raw: &[Sample], filtered: &[Sample]) {
        for (&r, &f) in raw.iter().zip(filtered) {
            if self.raw.len() == self.capacity {
                self.raw.pop_front();
                self.filtered.pop_front();
            }
            self.raw.push_back(r);
            self.filtered.push_back(f);
        }
    }

    /// Move everything out of `other` into `self`, preserving order.
    fn absorb(&mut self, other: &mut RollingHistory) {
        for (r, f) in other.raw.drain(..).zip(other.filtered.drain(..)) {
            if self.raw.len() == self.capacity {
                self.raw.pop_front();
                self.filtered.pop_front();
            }
            self.raw.push_back(r);
            self.filtered.push_back(f);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            raw: self.raw.iter().copied().collect(),
            filtered: self.filtered.iter().copied().collect(),
        }
    }
}

impl HistorySnapshot {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Keep at most `max_points` evenly spaced samples. The most recent sample
    /// is always kept.
    pub fn decimate(self, max_points: usize) -> Self {
        let len = self.len();
        if max_points == 0 || len <= max_points {
            return self;
        }

        let step = len.div_ceil(max_points);
        // Anchor on the newest sample and walk backwards
        let offset = (len - 1) % step;
        let pick = |v: &[Sample]| -> Vec<Sample> { v.iter().skip(offset).step_by(step).copied().collect() };

        Self {
            raw: pick(&self.raw),
            filtered: pick(&self.filtered),
        }
    }
}

/// Audio-side writer for a history shared with display readers.
///
/// Appends only ever `try_lock` the shared history. While a reader holds the
/// lock the batch goes into a local staging history of the same capacity and
/// is flushed on the next successful append.
pub struct DisplayHistory {
    shared: Arc<Mutex<RollingHistory>>,
    pending: RollingHistory,
}

/// Cloneable read handle for the display collaborator.
#[derive(Debug, Clone)]
pub struct HistoryReader {
    shared: Arc<Mutex<RollingHistory>>,
}

impl DisplayHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(RollingHistory::new(capacity))),
            pending: RollingHistory::new(capacity),
        }
    }

    pub fn reader(&self) -> HistoryReader {
        HistoryReader {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn append(&mut self, raw: &[Sample], filtered: &[Sample]) {
        let mut history = match self.shared.try_lock() {
            Ok(history) => history,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.pending.extend(raw, filtered);
                return;
            }
        };

        if !self.pending.is_empty() {
            history.absorb(&mut self.pending);
        }
        history.extend(raw, filtered);
    }
}

impl HistoryReader {
    pub fn snapshot(&self) -> HistorySnapshot {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    pub fn capacity(&self) -> usize {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(DelayLine::new(0), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_delay_line_latency() {
        for n in [1usize, 2, 3, 16, 100] {
            let mut line = DelayLine::new(n).unwrap();

            for i in 0..n {
                assert_eq!(line.push(i as Sample), None, "push {} of {}", i + 1, n);
            }
            assert!(line.is_full());

            // (N+1)-th push yields the first sample, then exact FIFO
            for i in n..(n * 3 + 5) {
                assert_eq!(line.push(i as Sample), Some((i - n) as Sample));
                assert!(line.is_full());
            }
        }
    }

    #[test]
    fn test_steady_state_pass_through() {
        let mut line = DelayLine::new(8).unwrap();
        for _ in 0..8 {
            line.push(0.25);
        }
        for _ in 0..100 {
            assert_eq!(line.push(0.25), Some(0.25));
        }
    }

    #[test]
    fn test_rolling_history_bounded_and_paired() {
        let mut history = RollingHistory::new(4);
        history.extend(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]);
        history.extend(&[4.0, 5.0, 6.0], &[40.0, 50.0, 60.0]);

        let snap = history.snapshot();
        assert_eq!(snap.raw, vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(snap.filtered, vec![30.0, 40.0, 50.0, 60.0]);

        // Mismatched input never breaks the equal-length invariant
        history.extend(&[7.0, 8.0], &[70.0]);
        let snap = history.snapshot();
        assert_eq!(snap.raw.len(), snap.filtered.len());
        assert_eq!(snap.raw.last(), Some(&7.0));
    }

    #[test]
    fn test_decimate_keeps_newest() {
        let snap = HistorySnapshot {
            raw: (0..10).map(|i| i as Sample).collect(),
            filtered: (0..10).map(|i| -(i as Sample)).collect(),
        };

        let small = snap.clone().decimate(4);
        assert!(small.len() <= 4);
        assert_eq!(small.raw.last(), Some(&9.0));
        assert_eq!(small.filtered.last(), Some(&-9.0));
        assert_eq!(small.raw.len(), small.filtered.len());

        assert_eq!(snap.clone().decimate(100), snap);
    }

    #[test]
    fn test_display_history_stages_while_reader_holds_lock() {
        let mut display = DisplayHistory::new(16);
        let reader = display.reader();

        display.append(&[1.0, 2.0], &[0.1, 0.2]);
        assert_eq!(reader.snapshot().raw, vec![1.0, 2.0]);

        {
            let _held = reader.shared.lock().unwrap();
            display.append(&[3.0], &[0.3]);
            assert_eq!(display.pending.raw.len(), 1);
        }

        display.append(&[4.0], &[0.4]);
        assert!(display.pending.is_empty());

        let snap = reader.snapshot();
        assert_eq!(snap.raw, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(snap.filtered, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(reader.capacity(), 16);
    }
}
