//! Capture loop: pulls blocks from a [`BlockSource`] and hands them to the
//! stream processor, one at a time, on a dedicated thread.

use crate::audio::processor::{BlockStatus, InputBlock, StreamProcessor};
use crate::audio::source::BlockSource;
use crate::notifier::EventNotifier;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How a capture run is paced and which channel it analyses.
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    pub block_size: usize,
    pub channel: usize,
    /// `Some(period)` paces blocks in real time; `None` runs flat out
    pub pacing: Option<Duration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub blocks: u64,
    pub events: u64,
    pub overruns: u64,
}

/// Drive `processor` from `source` until the source ends or `shutdown` is set.
///
/// With pacing, each block has a deadline on the monotonic clock. Falling more
/// than one period behind flags the next block as an overflow and re-anchors
/// the schedule instead of trying to catch up.
pub fn run_capture<S, N>(
    source: &mut S,
    processor: &mut StreamProcessor<N>,
    options: CaptureOptions,
    shutdown: &AtomicBool,
) -> Result<CaptureSummary>
where
    S: BlockSource + ?Sized,
    N: EventNotifier,
{
    let channels = source.channels();
    let mut block = Vec::with_capacity(options.block_size * channels);
    let mut summary = CaptureSummary::default();
    let mut deadline = Instant::now();
    let mut status = BlockStatus::default();

    while !shutdown.load(Ordering::Relaxed) {
        if !source.next_block(options.block_size, &mut block)? {
            info!(blocks = summary.blocks, "Source exhausted");
            break;
        }

        let outcome = processor.on_block(InputBlock::new(&block, channels), options.channel, status);
        summary.blocks += 1;
        if outcome.event {
            summary.events += 1;
        }
        status = BlockStatus::default();

        if let Some(period) = options.pacing {
            deadline += period;
            let now = Instant::now();
            if now < deadline {
                thread::sleep(deadline - now);
            } else if now - deadline > period {
                summary.overruns += 1;
                status.input_overflow = true;
                warn!(
                    behind_ms = (now - deadline).as_secs_f64() * 1000.0,
                    "Capture fell behind real time"
                );
                deadline = now;
            }
        }
    }

    Ok(summary)
}

/// Run the capture loop on its own thread. The thread owns the source and the
/// processor; the returned handle yields the run summary.
pub fn spawn_capture<N>(
    mut source: Box<dyn BlockSource + Send>,
    mut processor: StreamProcessor<N>,
    options: CaptureOptions,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<Result<CaptureSummary>>>
where
    N: EventNotifier + 'static,
{
    thread::Builder::new()
        .name("capture".to_string())
        .spawn(move || {
            let result = run_capture(source.as_mut(), &mut processor, options, &shutdown);
            // Wake the rest of the process when the stream ends on its own
            shutdown.store(true, Ordering::SeqCst);
            result
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::state::PipelineStats;

    struct Silence {
        remaining: usize,
    }

    impl BlockSource for Silence {
        fn sample_rate(&self) -> u32 {
            44100
        }

        fn channels(&self) -> usize {
            2
        }

        fn next_block(&mut self, frames: usize, out: &mut Vec<f32>) -> Result<bool> {
            out.clear();
            if self.remaining == 0 {
                return Ok(false);
            }
            let n = frames.min(self.remaining);
            self.remaining -= n;
            out.resize(n * 2, 0.0);
            Ok(true)
        }
    }

    struct Quiet;

    impl EventNotifier for Quiet {
        fn notify(&mut self) {}
    }

    fn processor() -> StreamProcessor<Quiet> {
        StreamProcessor::new(&AppConfig::default(), Quiet, Arc::new(PipelineStats::default()))
            .unwrap()
    }

    #[test]
    fn test_runs_until_source_ends() {
        let mut source = Silence { remaining: 100 };
        let mut proc = processor();
        let options = CaptureOptions { block_size: 16, channel: 0, pacing: None };

        let summary = run_capture(&mut source, &mut proc, options, &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.blocks, 7);
        assert_eq!(summary.events, 0);
    }

    #[test]
    fn test_stops_on_shutdown() {
        let mut source = Silence { remaining: usize::MAX };
        let mut proc = processor();
        let options = CaptureOptions { block_size: 16, channel: 0, pacing: None };

        let summary = run_capture(&mut source, &mut proc, options, &AtomicBool::new(true)).unwrap();
        assert_eq!(summary.blocks, 0);
    }

    #[test]
    fn test_spawned_capture_sets_shutdown_at_end() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let options = CaptureOptions {
            block_size: 16,
            channel: 0,
            pacing: Some(Duration::from_micros(100)),
        };

        let handle = spawn_capture(
            Box::new(Silence { remaining: 160 }),
            processor(),
            options,
            Arc::clone(&shutdown),
        )
        .unwrap();

        let summary = handle.join().unwrap().unwrap();
        assert_eq!(summary.blocks, 10);
        assert!(shutdown.load(Ordering::SeqCst));
    }
}
