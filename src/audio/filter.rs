//! # Biquad Filtering
//!
//! The fixed filter topology of the detector: two identical second-order IIR
//! sections in series. Each section runs the direct-form-I recurrence
//!
//! ```text
//! y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - (a1*y[n-1] + a2*y[n-2])
//! ```
//!
//! with `a0` normalized to 1. Coefficients are fixed once a filter is built.
//! NaN and infinite inputs are not special-cased; they propagate through the
//! arithmetic like any other value.

use crate::audio::Sample;
use crate::error::{AppError, AppResult};

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: Sample,
    pub b1: Sample,
    pub b2: Sample,
    pub a1: Sample,
    pub a2: Sample,
}

impl BiquadCoeffs {
    /// Build coefficients from `[b0, b1, b2]` and `[a0, a1, a2]`, dividing
    /// everything by `a0`.
    ///
    /// ## Errors:
    /// - either list is empty or does not have exactly three entries
    /// - `a0` is zero or any coefficient is not finite
    pub fn from_lists(feedforward: &[Sample], feedback: &[Sample]) -> AppResult<Self> {
        if feedforward.is_empty() || feedback.is_empty() {
            return Err(AppError::ConfigError(
                "Filter coefficient sets cannot be empty".to_string(),
            ));
        }

        let (&[b0, b1, b2], &[a0, a1, a2]) = (feedforward, feedback) else {
            return Err(AppError::ConfigError(format!(
                "Expected 3 feedforward and 3 feedback coefficients, got {} and {}",
                feedforward.len(),
                feedback.len()
            )));
        };

        if feedforward.iter().chain(feedback).any(|c| !c.is_finite()) {
            return Err(AppError::ConfigError(
                "Filter coefficients must be finite".to_string(),
            ));
        }

        if a0 == 0.0 {
            return Err(AppError::ConfigError("Feedback coefficient a0 cannot be 0".to_string()));
        }

        Ok(Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        })
    }

    /// Whether both poles of `z^2 + a1*z + a2` lie strictly inside the unit
    /// circle (Jury criterion for second-order polynomials).
    ///
    /// Only meant for startup validation, never for the per-sample path.
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

/// Stateful second-order IIR section.
///
/// ## State:
/// `x1`/`x2` are the two previous inputs, `y1`/`y2` the two previous outputs.
/// They start at zero, so an all-zero input produces an all-zero output.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    x1: Sample,
    x2: Sample,
    y1: Sample,
    y2: Sample,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        let c = &self.coeffs;

        // Reads the old history before any of it is shifted
        let y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - (c.a1 * self.y1 + c.a2 * self.y2);

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }
}

/// Two biquad sections in series; the second filters the output of the first.
#[derive(Debug, Clone)]
pub struct FilterCascade {
    first: BiquadFilter,
    second: BiquadFilter,
}

impl FilterCascade {
    /// Cascade of two independent sections sharing one coefficient set.
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self::from_sections(BiquadFilter::new(coeffs), BiquadFilter::new(coeffs))
    }

    pub fn from_sections(first: BiquadFilter, second: BiquadFilter) -> Self {
        Self { first, second }
    }

    #[inline]
    pub fn process(&mut self, x: Sample) -> Sample {
        self.second.process(self.first.process(x))
    }

    /// Filter `input` in order, appending one output per input to `output`.
    /// An empty input leaves both the state and `output` untouched.
    pub fn process_into(&mut self, input: &[Sample], output: &mut Vec<Sample>) {
        output.extend(input.iter().map(|&x| self.process(x)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn default_coeffs() -> BiquadCoeffs {
        AppConfig::default().coefficients().unwrap()
    }

    fn passthrough() -> BiquadCoeffs {
        BiquadCoeffs { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }

    #[test]
    fn test_zero_input_is_fixed_point() {
        let mut filter = BiquadFilter::new(default_coeffs());
        for _ in 0..10_000 {
            assert_eq!(filter.process(0.0), 0.0);
        }

        let mut cascade = FilterCascade::new(default_coeffs());
        let mut out = Vec::new();
        cascade.process_into(&vec![0.0; 4096], &mut out);
        assert_eq!(out.len(), 4096);
        assert!(out.iter().all(|&y| y == 0.0));
    }

    #[test]
    fn test_impulse_response_first_taps() {
        let coeffs = BiquadCoeffs {
            b0: 0.5,
            b1: 0.25,
            b2: 0.125,
            a1: -0.5,
            a2: 0.25,
        };
        let mut filter = BiquadFilter::new(coeffs);

        let y0 = filter.process(1.0);
        let y1 = filter.process(0.0);
        let y2 = filter.process(0.0);
        let y3 = filter.process(0.0);

        assert_eq!(y0, 0.5);
        // 0.25 - (-0.5 * 0.5)
        assert_eq!(y1, 0.5);
        // 0.125 - (-0.5 * 0.5 + 0.25 * 0.5)
        assert_eq!(y2, 0.25);
        // 0 - (-0.5 * 0.25 + 0.25 * 0.5)
        assert_eq!(y3, 0.0);
    }

    #[test]
    fn test_passthrough() {
        let mut cascade = FilterCascade::new(passthrough());
        for x in [0.3, -0.7, 1.5, 0.0] {
            assert_eq!(cascade.process(x), x);
        }
    }

    #[test]
    fn test_cascade_matches_sequential_batches() {
        let coeffs = default_coeffs();
        let input: Vec<Sample> = (0..2000)
            .map(|i| ((i as Sample) * 0.013).sin() * 0.8 + if i % 97 == 0 { 0.5 } else { 0.0 })
            .collect();

        // Cascade, fed in uneven chunks
        let mut cascade = FilterCascade::new(coeffs);
        let mut streamed = Vec::new();
        for chunk in input.chunks(37) {
            cascade.process_into(chunk, &mut streamed);
        }

        // A over the whole input, then B over the whole of A's output
        let mut a = BiquadFilter::new(coeffs);
        let mut b = BiquadFilter::new(coeffs);
        let stage_a: Vec<Sample> = input.iter().map(|&x| a.process(x)).collect();
        let stage_b: Vec<Sample> = stage_a.iter().map(|&x| b.process(x)).collect();

        assert_eq!(streamed, stage_b);
    }

    #[test]
    fn test_empty_input_is_noop() {
        let mut cascade = FilterCascade::new(default_coeffs());
        let mut out = Vec::new();
        cascade.process_into(&[], &mut out);
        assert!(out.is_empty());

        // State untouched: an impulse afterwards matches a fresh cascade
        let mut fresh = FilterCascade::new(default_coeffs());
        assert_eq!(cascade.process(1.0), fresh.process(1.0));
    }

    #[test]
    fn test_unit_dc_gain_of_default_filter() {
        let mut cascade = FilterCascade::new(default_coeffs());
        let mut y = 0.0;
        for _ in 0..200_000 {
            y = cascade.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3, "settled at {}", y);
    }

    #[test]
    fn test_nan_propagates() {
        let mut filter = BiquadFilter::new(default_coeffs());
        assert!(filter.process(Sample::NAN).is_nan());
        assert!(filter.process(0.0).is_nan());
    }

    #[test]
    fn test_from_lists_normalizes_by_a0() {
        let coeffs = BiquadCoeffs::from_lists(&[2.0, 4.0, 2.0], &[2.0, -1.0, 0.5]).unwrap();
        assert_eq!(coeffs.b0, 1.0);
        assert_eq!(coeffs.b1, 2.0);
        assert_eq!(coeffs.a1, -0.5);
        assert_eq!(coeffs.a2, 0.25);

        assert!(BiquadCoeffs::from_lists(&[], &[1.0, 0.0, 0.0]).is_err());
        assert!(BiquadCoeffs::from_lists(&[1.0, 0.0, 0.0], &[0.0, 0.0, 0.0]).is_err());
        assert!(BiquadCoeffs::from_lists(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_stability_check() {
        assert!(default_coeffs().is_stable());
        assert!(passthrough().is_stable());

        let on_circle = BiquadCoeffs { a1: -2.0, a2: 1.0, ..passthrough() };
        assert!(!on_circle.is_stable());

        let outside = BiquadCoeffs { a1: 0.0, a2: 1.2, ..passthrough() };
        assert!(!outside.is_stable());
    }
}
