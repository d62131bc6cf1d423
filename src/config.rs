//! Codec configuration
//!
//! One flat structure carries every tunable the host exposes: GOP
//! shape, NEAR parameters, quantization, the 12-bit range-map switch,
//! and the decision thresholds. The struct serde-derives so a host can
//! deserialize it straight from its YAML/JSON profile files; loading and
//! file formats stay on the host side.

use serde::{Deserialize, Serialize};

use crate::codec::MAX_NEAR;
use crate::decision::DecisionConfig;
use crate::error::{Error, Result};
use crate::quant::{QuantParams, MAX_FP_BITS};

/// Full codec configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Force an intra frame every N frames
    pub gop_period: u32,
    /// Hard cap on consecutive residual frames
    pub gop_max: u32,
    /// NEAR parameter for intra frames (0 = lossless)
    pub keyframe_near: u32,
    /// NEAR parameter for residual frames
    pub residual_near: u32,
    /// Dead-zone threshold in DN
    pub dead_zone_t: u32,
    /// Quantization step
    pub quant_q: f64,
    /// Fixed-point fractional bits
    pub fp_bits: u32,
    /// Remap narrow-range frames to 12 bits before intra encoding
    pub enable_12bit_mode: bool,
    /// P95 threshold for the heuristic intra test
    pub decision_p95_threshold: f64,
    /// P99 threshold for the heuristic intra test
    pub decision_p99_threshold: f64,
    /// Residual entropy threshold for the heuristic intra test
    pub decision_entropy_threshold: f64,
    /// Mean |R| threshold for the heuristic intra test
    pub decision_mean_abs_max: f64,
    /// Zero-mass floor for the heuristic intra test
    pub decision_zero_mass_min: f64,
    /// Rate-test slack in bits per pixel
    pub decision_margin_bpp: f64,
    /// Rate-test hysteresis in bits per pixel
    pub decision_hysteresis_bpp: f64,
    /// EMA smoothing factor
    pub ema_alpha: f64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            gop_period: 60,
            gop_max: 120,
            keyframe_near: 0,
            residual_near: 10,
            dead_zone_t: 2,
            quant_q: 2.0,
            fp_bits: 8,
            enable_12bit_mode: true,
            decision_p95_threshold: 30.0,
            decision_p99_threshold: 100.0,
            decision_entropy_threshold: 6.0,
            decision_mean_abs_max: 12.0,
            decision_zero_mass_min: 0.75,
            decision_margin_bpp: 0.3,
            decision_hysteresis_bpp: 0.15,
            ema_alpha: 0.2,
        }
    }
}

impl CodecConfig {
    /// Set the GOP period
    pub fn with_gop_period(mut self, period: u32) -> Self {
        self.gop_period = period;
        self
    }

    /// Set both NEAR parameters
    pub fn with_near(mut self, keyframe_near: u32, residual_near: u32) -> Self {
        self.keyframe_near = keyframe_near;
        self.residual_near = residual_near;
        self
    }

    /// Set the quantizer shape
    pub fn with_quantizer(mut self, dead_zone_t: u32, quant_q: f64, fp_bits: u32) -> Self {
        self.dead_zone_t = dead_zone_t;
        self.quant_q = quant_q;
        self.fp_bits = fp_bits;
        self
    }

    /// Enable or disable the 12-bit range map
    pub fn with_12bit_mode(mut self, enable: bool) -> Self {
        self.enable_12bit_mode = enable;
        self
    }

    /// Validate every parameter the core depends on
    pub fn validate(&self) -> Result<()> {
        if self.gop_period == 0 {
            return Err(Error::invalid_config("gop_period must be > 0"));
        }
        if self.gop_max < self.gop_period {
            return Err(Error::invalid_config(format!(
                "gop_max {} must be >= gop_period {}",
                self.gop_max, self.gop_period
            )));
        }
        if self.keyframe_near > MAX_NEAR || self.residual_near > MAX_NEAR {
            return Err(Error::invalid_config(format!(
                "near parameters must be <= {}",
                MAX_NEAR
            )));
        }
        if !(self.quant_q > 0.0) {
            return Err(Error::invalid_config("quant_q must be > 0"));
        }
        if self.fp_bits > MAX_FP_BITS {
            return Err(Error::invalid_config(format!(
                "fp_bits must be <= {}",
                MAX_FP_BITS
            )));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(Error::invalid_config("ema_alpha must be in (0, 1]"));
        }
        // Constructing the params re-checks the fixed-point derivation
        QuantParams::new(self.dead_zone_t, self.quant_q, self.fp_bits)?;
        Ok(())
    }

    /// Quantization parameters derived from this configuration
    pub fn quant_params(&self) -> Result<QuantParams> {
        QuantParams::new(self.dead_zone_t, self.quant_q, self.fp_bits)
    }

    /// Decision engine configuration derived from this configuration
    pub fn decision_config(&self) -> DecisionConfig {
        DecisionConfig {
            gop_period: self.gop_period,
            gop_max: self.gop_max,
            zero_mass_min: self.decision_zero_mass_min,
            mean_abs_max: self.decision_mean_abs_max,
            p95_max: self.decision_p95_threshold,
            p99_max: self.decision_p99_threshold,
            entropy_max: self.decision_entropy_threshold,
            margin_bpp: self.decision_margin_bpp,
            hysteresis_bpp: self.decision_hysteresis_bpp,
            ema_alpha: self.ema_alpha,
            ..Default::default()
        }
    }
}
