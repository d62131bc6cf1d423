//! Residual statistics and session accounting
//!
//! The decision engine needs a cheap per-frame summary of the candidate
//! residual: how much of it sits inside the dead zone, how heavy the
//! tails are, and a bits-per-sample estimate. Percentiles come from a
//! bounded 1024-bin magnitude histogram rather than a sort; magnitudes
//! at or above 1024 DN saturate into the top bin, which the cumulative
//! walk reaches last so tail percentiles stay correct.
//!
//! [`FrameStats`] and [`SessionStats`] mirror what the host typically
//! exports as JSON after a run.

use std::collections::HashMap;

use serde::Serialize;

use crate::residual::ErrorStats;

/// Number of magnitude histogram bins (1 DN per bin)
pub const HISTOGRAM_BINS: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────
// MagnitudeHistogram
// ─────────────────────────────────────────────────────────────────────────

/// Reusable histogram over residual magnitudes
///
/// Allocates its bin array once; `clear()` + `accumulate()` lets one
/// instance serve every frame of a session.
#[derive(Debug, Clone)]
pub struct MagnitudeHistogram {
    bins: Vec<u64>,
    total_samples: u64,
}

impl MagnitudeHistogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        MagnitudeHistogram {
            bins: vec![0; HISTOGRAM_BINS],
            total_samples: 0,
        }
    }

    /// Reset all bins without releasing the allocation
    pub fn clear(&mut self) {
        self.bins.fill(0);
        self.total_samples = 0;
    }

    /// Accumulate the magnitudes of a signed residual
    pub fn accumulate(&mut self, residuals: &[i16]) {
        for &r in residuals {
            let mag = (i32::from(r).unsigned_abs() as usize).min(HISTOGRAM_BINS - 1);
            self.bins[mag] += 1;
        }
        self.total_samples += residuals.len() as u64;
    }

    /// Bin counts
    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Number of accumulated samples
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Mean magnitude (top bin contributes its saturated value)
    pub fn mean(&self) -> f64 {
        if self.total_samples == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(mag, &count)| mag as f64 * count as f64)
            .sum();
        sum / self.total_samples as f64
    }

    /// Standard deviation of the magnitude distribution
    pub fn stddev(&self) -> f64 {
        if self.total_samples == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let var: f64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(mag, &count)| {
                let d = mag as f64 - mean;
                d * d * count as f64
            })
            .sum::<f64>()
            / self.total_samples as f64;
        var.sqrt()
    }

    /// Magnitude below which fraction `p` of samples fall, `p` in [0, 1]
    ///
    /// Cumulative-count walk with threshold `floor(p * N)`.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.total_samples == 0 {
            return 0.0;
        }
        let threshold = (p * self.total_samples as f64) as u64;
        let mut cumulative = 0u64;
        for (mag, &count) in self.bins.iter().enumerate() {
            cumulative += count;
            if cumulative >= threshold {
                return mag as f64;
            }
        }
        (HISTOGRAM_BINS - 1) as f64
    }

    /// Largest non-empty magnitude bin
    pub fn max_value(&self) -> f64 {
        self.bins
            .iter()
            .rposition(|&count| count > 0)
            .map(|mag| mag as f64)
            .unwrap_or(0.0)
    }

    /// Shannon entropy of the magnitude distribution in bits per sample
    pub fn entropy(&self) -> f64 {
        if self.total_samples == 0 {
            return 0.0;
        }
        let n = self.total_samples as f64;
        let mut h = 0.0;
        for &count in &self.bins {
            if count > 0 {
                let p = count as f64 / n;
                h -= p * p.log2();
            }
        }
        h
    }
}

impl Default for MagnitudeHistogram {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────
// ResidualStats
// ─────────────────────────────────────────────────────────────────────────

/// Per-frame residual summary consumed by the decision engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResidualStats {
    /// Fraction of samples with |R| <= dead-zone threshold
    pub zero_mass: f64,
    /// Mean |R| in DN
    pub mean_abs: f64,
    /// 95th percentile of |R|
    pub p95: f64,
    /// 99th percentile of |R|
    pub p99: f64,
    /// Shannon entropy in bits per sample (quantized symbols when
    /// available, magnitude histogram otherwise)
    pub entropy: f64,
    /// Rate estimate used by the decision engine, bits per sample
    pub bps_res: f64,
}

impl ResidualStats {
    /// Compute statistics over a signed residual
    ///
    /// `quantized`, when supplied, drives the entropy term with the
    /// actual symbol distribution; otherwise the magnitude-histogram
    /// entropy plus a one-bit sign term is used as a rate proxy. The
    /// histogram is cleared and refilled, never reallocated. An empty
    /// residual yields all-zero stats.
    pub fn compute(
        residual: &[i16],
        dead_zone_t: u32,
        quantized: Option<&[i16]>,
        histogram: &mut MagnitudeHistogram,
    ) -> Self {
        if residual.is_empty() {
            return ResidualStats::default();
        }
        let n = residual.len() as f64;

        histogram.clear();
        histogram.accumulate(residual);

        let mut zero_count = 0u64;
        let mut sum_abs = 0.0f64;
        for &r in residual {
            let mag = i32::from(r).unsigned_abs();
            if mag <= dead_zone_t {
                zero_count += 1;
            }
            sum_abs += f64::from(mag);
        }

        let entropy;
        let bps_res;
        match quantized {
            Some(symbols) => {
                entropy = symbol_entropy(symbols);
                bps_res = entropy;
            }
            None => {
                entropy = histogram.entropy();
                // Magnitude entropy plus one sign bit approximates the
                // symbol rate from the pre-quantization side
                bps_res = entropy + 1.0;
            }
        }

        ResidualStats {
            zero_mass: zero_count as f64 / n,
            mean_abs: sum_abs / n,
            p95: histogram.percentile(0.95),
            p99: histogram.percentile(0.99),
            entropy,
            bps_res,
        }
    }
}

/// Shannon entropy of a quantized symbol grid in bits per sample
///
/// Symbol values are sparse, so counts go through a map rather than a
/// dense table.
pub fn symbol_entropy(symbols: &[i16]) -> f64 {
    if symbols.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<i16, u64> = HashMap::new();
    for &s in symbols {
        *counts.entry(s).or_insert(0) += 1;
    }
    let n = symbols.len() as f64;
    let mut h = 0.0;
    for &count in counts.values() {
        let p = count as f64 / n;
        h -= p * p.log2();
    }
    h
}

// ─────────────────────────────────────────────────────────────────────────
// FrameStats / SessionStats
// ─────────────────────────────────────────────────────────────────────────

/// Per-frame compression and quality record
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameStats {
    /// Frame index within the stream
    pub frame_index: u32,
    /// Whether the frame was encoded as an intra frame
    pub is_keyframe: bool,
    /// Candidate residual statistics (zeroed for the first frame of a GOP)
    pub residual: ResidualStats,
    /// Entropy of the quantized symbols actually encoded (residual frames)
    pub quantized_entropy: f64,
    /// Raw frame size in bytes
    pub original_bytes: usize,
    /// Compressed payload size in bytes
    pub compressed_bytes: usize,
    /// original / compressed
    pub compression_ratio: f64,
    /// Reconstruction error against the closed-loop reference
    pub error: ErrorStats,
}

impl FrameStats {
    /// Serialize to a JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Aggregate statistics for an encoding session
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    /// Total frames pushed through the pipeline
    pub total_frames: u32,
    /// Intra frames emitted
    pub keyframes: u32,
    /// Residual frames emitted
    pub residual_frames: u32,
    /// Total raw input bytes
    pub total_original_bytes: u64,
    /// Total compressed payload bytes
    pub total_compressed_bytes: u64,
    /// Overall original / compressed ratio
    pub overall_compression_ratio: f64,
    /// Mean of per-frame max reconstruction errors
    pub avg_max_error: f64,
    /// Mean of per-frame RMSE
    pub avg_rmse: f64,
}

impl SessionStats {
    /// Fold one frame record into the aggregates
    pub fn add_frame(&mut self, frame: &FrameStats) {
        self.total_frames += 1;
        if frame.is_keyframe {
            self.keyframes += 1;
        } else {
            self.residual_frames += 1;
        }
        self.total_original_bytes += frame.original_bytes as u64;
        self.total_compressed_bytes += frame.compressed_bytes as u64;
        // Running sums; divided out in finalize()
        self.avg_max_error += frame.error.max_error;
        self.avg_rmse += frame.error.rmse;
    }

    /// Turn running sums into averages and compute the overall ratio
    pub fn finalize(&mut self) {
        if self.total_frames > 0 {
            let n = f64::from(self.total_frames);
            self.avg_max_error /= n;
            self.avg_rmse /= n;
        }
        if self.total_compressed_bytes > 0 {
            self.overall_compression_ratio =
                self.total_original_bytes as f64 / self.total_compressed_bytes as f64;
        }
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
