//! Hemodynamic signal processing
//!
//! Converts raw light-intensity series to optical density and applies a
//! zero-phase bandpass filter over the hemodynamic response range. All
//! processing is synchronous and allocation-per-call; filters are stateful
//! and must be driven sample-in-order by a single owner.

use crate::types::ChannelValue;

/// Intensities below this are treated as dark readings and clamp to zero
/// optical density instead of producing infinities.
const INTENSITY_EPSILON: f64 = 1e-9;

// Fixed 10th-order Butterworth bandpass for the 0.01-0.1 Hz hemodynamic
// band, precomputed with scipy.signal.butter.
const BANDPASS_B: [f64; 11] = [
    4.4568762392924175e-07,
    0.0,
    -2.2284381196462087e-06,
    0.0,
    4.456876239292417e-06,
    0.0,
    -4.456876239292417e-06,
    0.0,
    2.2284381196462087e-06,
    0.0,
    -4.4568762392924175e-07,
];
const BANDPASS_A: [f64; 11] = [
    1.0,
    -9.632908071507657,
    41.76951188974173,
    -107.36208543704004,
    181.1533213783332,
    -209.6623428034052,
    168.56546947437533,
    -92.96027493337579,
    33.65376715250092,
    -7.222126070431862,
    0.6976674208093903,
];

// ============================================================================
// IIR Filter
// ============================================================================

/// Direct-form digital IIR filter.
///
/// Holds an internal state vector of length `max(|a|, |b|) - 1`. Coefficients
/// are normalized at construction so `a[0] = 1`. `process` is stateful and
/// order-dependent: samples must be fed one at a time, in order, by a single
/// owner.
#[derive(Clone, Debug)]
pub struct IirFilter {
    b: Vec<f64>,
    a: Vec<f64>,
    z: Vec<f64>,
}

impl IirFilter {
    /// Create a filter from feedforward (`b`) and feedback (`a`) coefficients.
    ///
    /// The shorter coefficient vector is zero-padded to the longer one's
    /// length, then both are normalized by `a[0]`.
    ///
    /// # Panics
    ///
    /// Panics if `a` is empty or `a[0]` is zero, which describes no
    /// realizable filter.
    #[must_use]
    pub fn new(b: &[f64], a: &[f64]) -> Self {
        assert!(
            !a.is_empty() && a[0] != 0.0,
            "feedback coefficients must start with a nonzero a[0]"
        );

        let order = b.len().max(a.len());
        let mut b: Vec<f64> = b.iter().copied().chain(std::iter::repeat(0.0)).take(order).collect();
        let mut a: Vec<f64> = a.iter().copied().chain(std::iter::repeat(0.0)).take(order).collect();

        let a0 = a[0];
        if a0 != 1.0 {
            for coeff in &mut b {
                *coeff /= a0;
            }
            for coeff in &mut a {
                *coeff /= a0;
            }
            a[0] = 1.0;
        }

        let z = vec![0.0; order - 1];
        Self { b, a, z }
    }

    /// Consume one sample, update the internal state, return one output.
    pub fn process(&mut self, x: f64) -> f64 {
        if self.z.is_empty() {
            return self.b[0] * x;
        }

        let y = self.b[0] * x + self.z[0];
        let n = self.z.len();
        for i in 1..n {
            self.z[i - 1] = self.b[i] * x + self.z[i] - self.a[i] * y;
        }
        self.z[n - 1] = self.b[n] * x - self.a[n] * y;
        y
    }

    /// Run a whole series through the filter, preserving state across samples.
    #[must_use]
    pub fn process_block(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&x| self.process(x)).collect()
    }

    /// Reset the internal state to zero.
    pub fn reset(&mut self) {
        self.z.fill(0.0);
    }
}

// ============================================================================
// Zero-Phase Filtering
// ============================================================================

/// Apply a filter forward and backward, canceling its net phase shift.
///
/// Forward pass, time-reverse, state reset, second forward pass, reverse
/// back. The effective filter order doubles.
#[must_use]
pub fn zero_phase_filter(filter: &mut IirFilter, input: &[f64]) -> Vec<f64> {
    let forward = filter.process_block(input);

    let reversed: Vec<f64> = forward.into_iter().rev().collect();
    filter.reset();

    let mut backward = filter.process_block(&reversed);
    backward.reverse();
    backward
}

/// Bandpass-filter an optical density series over the hemodynamic band.
///
/// The coefficient set is a fixed 10th-order Butterworth design for the
/// 0.01-0.1 Hz passband; `sample_rate`, `lower_cutoff` and `higher_cutoff`
/// do not currently select coefficients. Documented limitation: a
/// cutoff-parameterized design would require a runtime bilinear-transform
/// designer.
#[must_use]
pub fn butterworth_bandpass_filter(
    data: &[f64],
    _sample_rate: f64,
    _lower_cutoff: f64,
    _higher_cutoff: f64,
) -> Vec<f64> {
    let mut filter = IirFilter::new(&BANDPASS_B, &BANDPASS_A);
    zero_phase_filter(&mut filter, data)
}

// ============================================================================
// Pipeline
// ============================================================================

/// Convert a raw intensity series to optical density.
///
/// `I0` is the first sample clamped to at least the dark threshold. Samples
/// below the threshold map to exactly zero rather than infinities.
#[must_use]
pub fn optical_density(raw: &[ChannelValue]) -> Vec<ChannelValue> {
    let initial_intensity = raw.first().copied().unwrap_or(0.0).max(INTENSITY_EPSILON);

    raw.iter()
        .map(|&intensity| {
            if intensity < INTENSITY_EPSILON {
                0.0
            } else {
                (initial_intensity / intensity).log10()
            }
        })
        .collect()
}

/// Produce a cleaned hemodynamic signal from a raw intensity series.
///
/// Optical density conversion followed by zero-phase bandpass filtering over
/// the 0.01-0.1 Hz hemodynamic response range.
#[must_use]
pub fn preprocess_hemodynamic_data(raw: &[ChannelValue], sampling_rate: f64) -> Vec<ChannelValue> {
    let density = optical_density(raw);
    butterworth_bandpass_filter(&density, sampling_rate, 0.01, 0.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optical_density_constant_series_is_zero() {
        let raw = vec![0.75; 64];
        let density = optical_density(&raw);
        assert!(density.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_optical_density_clamps_dark_samples() {
        let raw = vec![1.0, 0.0, 1e-12, 0.5];
        let density = optical_density(&raw);

        assert_eq!(density[1], 0.0);
        assert_eq!(density[2], 0.0);
        assert!(density.iter().all(|v| v.is_finite()));
        assert!((density[3] - 2.0_f64.log10()).abs() < 1e-12);
    }

    #[test]
    fn test_optical_density_dark_baseline() {
        // A dark first sample clamps I0 to the threshold instead of
        // poisoning the whole series.
        let raw = vec![0.0, 1.0];
        let density = optical_density(&raw);
        assert!(density.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_iir_first_order_impulse_response() {
        // y[n] = x[n] + 0.5 y[n-1]
        let mut filter = IirFilter::new(&[1.0], &[1.0, -0.5]);
        let out = filter.process_block(&[1.0, 0.0, 0.0, 0.0]);
        let expected = [1.0, 0.5, 0.25, 0.125];
        for (o, e) in out.iter().zip(expected.iter()) {
            assert!((o - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_iir_normalizes_leading_feedback_coefficient() {
        let mut scaled = IirFilter::new(&[2.0], &[2.0, -1.0]);
        let mut reference = IirFilter::new(&[1.0], &[1.0, -0.5]);

        let input = [1.0, 2.0, -1.0, 0.5];
        let a = scaled.process_block(&input);
        let b = reference.process_block(&input);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_iir_reset_clears_state() {
        let mut filter = IirFilter::new(&[1.0], &[1.0, -0.5]);
        let first = filter.process_block(&[1.0, 1.0, 1.0]);
        filter.reset();
        let second = filter.process_block(&[1.0, 1.0, 1.0]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_bandpass_zero_series_stays_zero() {
        let zeros = vec![0.0; 200];
        let out = butterworth_bandpass_filter(&zeros, 7.8, 0.01, 0.1);
        assert_eq!(out.len(), zeros.len());
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_preprocess_is_deterministic() {
        let raw: Vec<f64> = (0..256)
            .map(|i| 1.0 + 0.05 * (f64::from(i) * 0.21).sin())
            .collect();

        let first = preprocess_hemodynamic_data(&raw, 7.8);
        let second = preprocess_hemodynamic_data(&raw, 7.8);

        assert_eq!(first.len(), raw.len());
        // Bit-identical across repeated calls
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_preprocess_constant_series_is_all_zero() {
        let raw = vec![0.42; 128];
        let out = preprocess_hemodynamic_data(&raw, 7.8);
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
