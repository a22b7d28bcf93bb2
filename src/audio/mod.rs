//! # Audio Processing Module
//!
//! The streaming signal path of the bass detector.
//!
//! ## Key Components:
//! - **Buffers**: delay line and bounded display history
//! - **Filter**: biquad sections and the two-stage cascade
//! - **Detector**: per-block peak threshold
//! - **Processor**: the per-block pipeline and its priming/steady lifecycle
//! - **Source / Capture**: acquisition glue that feeds blocks to the processor
//!
//! ## Stream Format:
//! - **Sample Rate**: 44.1 kHz by default
//! - **Block Size**: 16 frames by default (~0.36 ms budget per block)
//! - **Channels**: interleaved; one selected channel is analysed

pub mod buffer;     // Delay line and rolling display history
pub mod capture;    // Capture thread driving the processor
pub mod detector;   // Peak threshold detection
pub mod filter;     // Biquad filter and cascade
pub mod processor;  // Per-block pipeline orchestration
pub mod source;     // WAV and raw PCM block sources

/// One normalized audio amplitude.
pub type Sample = f64;
