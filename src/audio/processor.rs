//! # Stream Processing
//!
//! Runs one audio block at a time through the detection pipeline:
//!
//! ```text
//! block ─▶ channel select ─▶ DelayLine ─▶ FilterCascade ─▶ PeakDetector ─▶ EventNotifier
//!                                  │               │
//!                                  └──────▶ DisplayHistory (observability only)
//! ```
//!
//! ## Per-Block Steps:
//! 1. Push every selected-channel sample into the delay line, collecting the
//!    samples it emits
//! 2. Nothing emitted (still priming): stop here
//! 3. Filter the delayed batch in order
//! 4. Append both batches to the rolling display history
//! 5. Notify at most once if the filtered batch has a peak above threshold
//!
//! Scratch buffers are allocated once at construction. The per-sample path
//! takes no locks and performs no I/O.

use crate::audio::buffer::{DelayLine, DisplayHistory, HistoryReader};
use crate::audio::detector::PeakDetector;
use crate::audio::filter::FilterCascade;
use crate::audio::Sample;
use crate::config::AppConfig;
use crate::error::AppResult;
use crate::notifier::EventNotifier;
use crate::state::{PipelineStats, ProcessorState};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One interleaved multi-channel block as delivered by the acquisition layer.
#[derive(Debug, Clone, Copy)]
pub struct InputBlock<'a> {
    samples: &'a [f32],
    channels: usize,
}

impl<'a> InputBlock<'a> {
    /// `samples` is frame-interleaved; a trailing partial frame is ignored.
    pub fn new(samples: &'a [f32], channels: usize) -> Self {
        Self { samples, channels }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

/// Acquisition-layer status flags that accompany a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStatus {
    /// Frames were lost before this block (processing fell behind)
    pub input_overflow: bool,
    /// The source could not fill the block
    pub input_underflow: bool,
}

impl BlockStatus {
    pub fn is_ok(&self) -> bool {
        !(self.input_overflow || self.input_underflow)
    }
}

/// What happened to one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockOutcome {
    /// Samples that came out of the delay line (0 while priming)
    pub delayed: usize,
    /// Whether a notification was sent for this block
    pub event: bool,
}

/// Owns all per-stream DSP state. Constructed once and driven by a single
/// acquisition context.
pub struct StreamProcessor<N: EventNotifier> {
    delay_line: DelayLine,
    cascade: FilterCascade,
    detector: PeakDetector,
    notifier: N,
    display: DisplayHistory,
    stats: Arc<PipelineStats>,
    state: ProcessorState,
    delayed: Vec<Sample>,
    filtered: Vec<Sample>,
}

impl<N: EventNotifier> StreamProcessor<N> {
    /// Build the pipeline from a validated configuration.
    ///
    /// ## Errors:
    /// Configuration errors only: a delay shorter than one sample or an
    /// unusable coefficient set.
    pub fn new(config: &AppConfig, notifier: N, stats: Arc<PipelineStats>) -> AppResult<Self> {
        let delay_line = DelayLine::new(config.delay_samples())?;
        let cascade = FilterCascade::new(config.coefficients()?);
        let block_size = config.audio.block_size;

        stats.set_state(ProcessorState::Priming);
        info!(
            delay_samples = delay_line.capacity(),
            threshold = config.pipeline.threshold,
            block_size = block_size,
            "Stream processor ready, priming delay line"
        );

        Ok(Self {
            delay_line,
            cascade,
            detector: PeakDetector::new(config.pipeline.threshold),
            notifier,
            display: DisplayHistory::new(config.history_capacity()),
            stats,
            state: ProcessorState::Priming,
            delayed: Vec::with_capacity(block_size),
            filtered: Vec::with_capacity(block_size),
        })
    }

    /// Block ingestion entry point, called once per arriving block.
    ///
    /// Status faults are reported and counted, then the block is processed
    /// anyway. A channel index outside the block is reported and the block
    /// skipped.
    pub fn on_block(
        &mut self,
        block: InputBlock<'_>,
        channel: usize,
        status: BlockStatus,
    ) -> BlockOutcome {
        self.stats.record_block();

        if !status.is_ok() {
            self.stats.record_status_fault();
            warn!(
                overflow = status.input_overflow,
                underflow = status.input_underflow,
                "Acquisition status fault"
            );
        }

        if channel >= block.channels() {
            self.stats.record_status_fault();
            warn!(
                channel = channel,
                channels = block.channels(),
                "Selected channel not present in block; skipping"
            );
            return BlockOutcome::default();
        }

        self.delayed.clear();
        for frame in block.samples.chunks_exact(block.channels()) {
            if let Some(out) = self.delay_line.push(Sample::from(frame[channel])) {
                self.delayed.push(out);
            }
        }

        if self.state == ProcessorState::Priming && self.delay_line.is_full() {
            self.state = ProcessorState::Steady;
            self.stats.set_state(ProcessorState::Steady);
            info!(delay_samples = self.delay_line.capacity(), "Delay line full, streaming");
        }

        if self.delayed.is_empty() {
            self.stats.record_priming_block();
            return BlockOutcome::default();
        }

        self.filtered.clear();
        self.cascade.process_into(&self.delayed, &mut self.filtered);

        self.display.append(&self.delayed, &self.filtered);
        self.stats.record_delayed(self.delayed.len());

        let event = match self.detector.detect(&self.filtered) {
            Ok(hit) => hit,
            Err(err) => {
                debug!(error = %err, "Detection skipped");
                false
            }
        };

        if event {
            self.stats.record_event();
            self.notifier.notify();
        }

        BlockOutcome {
            delayed: self.delayed.len(),
            event,
        }
    }

    pub fn history_reader(&self) -> HistoryReader {
        self.display.reader()
    }
}
