//! # Application State Management
//!
//! State shared between the audio context (one capture thread) and the HTTP
//! handlers that serve health, metrics and display snapshots.
//!
//! ## Sharing Rules:
//! - The delay line and filter state are owned by the stream processor and are
//!   never shared
//! - Counters are plain atomics, so the audio path updates them without locks
//! - Display history is shared through [`HistoryReader`]; the audio side only
//!   ever `try_lock`s it
//!
//! ## Key Rust Concepts:
//! - **Arc**: several owners (capture thread, every HTTP worker) of one value
//! - **AtomicU64 / AtomicU8**: lock-free counters and flags
//! - **Ordering::Relaxed**: each counter is independent, no cross-counter ordering needed

use crate::audio::buffer::HistoryReader;
use crate::config::AppConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Lifecycle of the stream processor.
///
/// `Priming` lasts until the delay line first fills; the move to `Steady` is
/// permanent for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorState {
    Priming,
    Steady,
}

impl ProcessorState {
    pub fn as_str(&self) -> &str {
        match self {
            ProcessorState::Priming => "priming",
            ProcessorState::Steady => "steady",
        }
    }
}

/// Pipeline counters updated from the audio context.
#[derive(Debug, Default)]
pub struct PipelineStats {
    blocks_received: AtomicU64,
    blocks_priming: AtomicU64,
    samples_delayed: AtomicU64,
    events_detected: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
    status_faults: AtomicU64,
    /// 0 = priming, 1 = steady
    state: AtomicU8,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub blocks_received: u64,
    pub blocks_priming: u64,
    pub samples_delayed: u64,
    pub events_detected: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub status_faults: u64,
    pub state: ProcessorState,
}

impl PipelineStats {
    pub fn record_block(&self) {
        self.blocks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_priming_block(&self) {
        self.blocks_priming.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delayed(&self, samples: usize) {
        self.samples_delayed.fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn record_event(&self) {
        self.events_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status_fault(&self) {
        self.status_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_state(&self, state: ProcessorState) {
        let raw = match state {
            ProcessorState::Priming => 0,
            ProcessorState::Steady => 1,
        };
        self.state.store(raw, Ordering::Relaxed);
    }

    pub fn state(&self) -> ProcessorState {
        match self.state.load(Ordering::Relaxed) {
            0 => ProcessorState::Priming,
            _ => ProcessorState::Steady,
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_received: self.blocks_received.load(Ordering::Relaxed),
            blocks_priming: self.blocks_priming.load(Ordering::Relaxed),
            samples_delayed: self.samples_delayed.load(Ordering::Relaxed),
            events_detected: self.events_detected.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            status_faults: self.status_faults.load(Ordering::Relaxed),
            state: self.state(),
        }
    }
}

/// Everything the HTTP handlers need, cheap to clone into each worker.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Startup configuration; immutable for the life of the process
    pub config: Arc<AppConfig>,

    /// Counters written by the audio context
    pub stats: Arc<PipelineStats>,

    /// Read side of the rolling display history
    pub history: HistoryReader,

    /// Distinguishes restarts when several viewers poll the same host
    pub instance_id: Uuid,

    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, stats: Arc<PipelineStats>, history: HistoryReader) -> Self {
        Self {
            config: Arc::new(config),
            stats,
            history,
            instance_id: Uuid::new_v4(),
            start_time: Instant::now(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl StatsSnapshot {
    /// Fraction of processed blocks that produced a notification.
    pub fn event_rate(&self) -> f64 {
        let processed = self.blocks_received.saturating_sub(self.blocks_priming);
        if processed > 0 {
            self.events_detected as f64 / processed as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot() {
        let stats = PipelineStats::default();
        assert_eq!(stats.state(), ProcessorState::Priming);

        stats.record_block();
        stats.record_priming_block();
        stats.record_block();
        stats.record_delayed(16);
        stats.record_event();
        stats.set_state(ProcessorState::Steady);

        let snap = stats.snapshot();
        assert_eq!(snap.blocks_received, 2);
        assert_eq!(snap.blocks_priming, 1);
        assert_eq!(snap.samples_delayed, 16);
        assert_eq!(snap.state, ProcessorState::Steady);
        assert_eq!(snap.event_rate(), 1.0);
    }

    #[test]
    fn test_event_rate_without_blocks() {
        let snap = PipelineStats::default().snapshot();
        assert_eq!(snap.event_rate(), 0.0);
    }
}
