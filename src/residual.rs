//! Pointwise temporal residual operations
//!
//! A residual frame is the signed per-sample difference between the
//! current frame and the previous reconstructed reference. The codec
//! backend only accepts unsigned samples, so signed residuals are biased
//! into unsigned range before encoding and unbiased after decoding.
//!
//! All operations write into caller-provided buffers so the frame
//! encoder/decoder can reuse scratch allocations across frames.

use serde::Serialize;

/// Default bias offset mapping signed residuals into unsigned range
///
/// Chosen so the biased range fits a 12-bit codec sample depth; the
/// frame pipeline uses [`FULL_RANGE_BIAS`] instead to keep the entire
/// signed 16-bit range addressable at 16 bits per sample.
pub const RESIDUAL_BIAS: i32 = 1024;

/// Bias offset covering the full signed 16-bit range at 16-bit depth
pub const FULL_RANGE_BIAS: i32 = 32768;

/// Compute `out[k] = cur[k] - ref[k]`
///
/// Differences are taken in 32-bit and saturated into `i16`; sensor
/// dynamics keep real-world residuals far inside that range, saturation
/// only guards pathological input.
///
/// # Panics
///
/// Panics when the slice lengths disagree.
pub fn residual(cur: &[u16], reference: &[u16], out: &mut [i16]) {
    assert_eq!(cur.len(), reference.len());
    assert!(out.len() >= cur.len());
    for ((o, &c), &r) in out.iter_mut().zip(cur.iter()).zip(reference.iter()) {
        let diff = i32::from(c) - i32::from(r);
        *o = diff.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
    }
}

/// Reconstruct `out[k] = clamp(ref[k] + residual[k], 0, 65535)`
pub fn reconstruct(residual: &[i16], reference: &[u16], out: &mut [u16]) {
    assert_eq!(residual.len(), reference.len());
    assert!(out.len() >= residual.len());
    for ((o, &r), &p) in out.iter_mut().zip(residual.iter()).zip(reference.iter()) {
        let val = i32::from(p) + i32::from(r);
        *o = val.clamp(0, 65535) as u16;
    }
}

/// Map signed residuals to unsigned codec samples by adding `offset`
///
/// The caller picks an offset that keeps the biased range inside the
/// codec sample depth; out-of-range sums wrap in two's complement and are
/// the caller's contract violation.
pub fn bias(residual: &[i16], out: &mut [u16], offset: i32) {
    assert!(out.len() >= residual.len());
    for (o, &r) in out.iter_mut().zip(residual.iter()) {
        *o = (i32::from(r) + offset) as u16;
    }
}

/// Inverse of [`bias`]
pub fn unbias(biased: &[u16], out: &mut [i16], offset: i32) {
    assert!(out.len() >= biased.len());
    for (o, &b) in out.iter_mut().zip(biased.iter()) {
        *o = (i32::from(b) - offset) as i16;
    }
}

/// Reconstruction quality summary between an original and its decode
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    /// Largest absolute per-sample error in DN
    pub max_error: f64,
    /// Mean absolute error in DN
    pub mean_error: f64,
    /// Root mean square error in DN
    pub rmse: f64,
}

impl ErrorStats {
    /// Compare two sample grids of equal length
    pub fn between(original: &[u16], reconstructed: &[u16]) -> Self {
        debug_assert_eq!(original.len(), reconstructed.len());
        if original.is_empty() {
            return ErrorStats::default();
        }
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut max_err = 0.0f64;
        for (&a, &b) in original.iter().zip(reconstructed.iter()) {
            let err = f64::from((i32::from(a) - i32::from(b)).abs());
            sum += err;
            sum_sq += err * err;
            if err > max_err {
                max_err = err;
            }
        }
        let n = original.len() as f64;
        ErrorStats {
            max_error: max_err,
            mean_error: sum / n,
            rmse: (sum_sq / n).sqrt(),
        }
    }
}
