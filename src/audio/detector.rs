//! Peak detection over one block's worth of filtered samples.

use crate::audio::Sample;
use crate::error::{AppError, AppResult};

/// Fires when the largest absolute amplitude in a batch strictly exceeds a
/// fixed threshold.
///
/// NaN samples never count as exceeding the threshold; they are skipped, so a
/// finite peak in the same batch as a NaN still fires. One call judges the
/// whole batch, so several peaks inside one block collapse to one event.
#[derive(Debug, Clone, Copy)]
pub struct PeakDetector {
    threshold: Sample,
}

impl PeakDetector {
    pub fn new(threshold: Sample) -> Self {
        Self { threshold }
    }

    /// Largest `|s|` in the batch, ignoring NaN. `None` for an empty batch.
    pub fn peak(batch: &[Sample]) -> Option<Sample> {
        if batch.is_empty() {
            return None;
        }
        Some(batch.iter().map(|s| s.abs()).fold(0.0, Sample::max))
    }

    /// ## Errors:
    /// An empty batch has no peak; callers must skip the block instead.
    pub fn detect(&self, batch: &[Sample]) -> AppResult<bool> {
        let peak = Self::peak(batch).ok_or(AppError::EmptyBatch)?;
        Ok(peak > self.threshold)
    }
}
