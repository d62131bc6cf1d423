//! Intra/residual mode decision
//!
//! Three tests run in order; the first that triggers forces an intra
//! frame:
//!
//! 1. **Periodic** — frame index hits the GOP period, or the residual run
//!    reaches the hard cap.
//! 2. **Heuristic** — the candidate residual looks like a scene change or
//!    an FFC/NUC event (low zero-mass, high mean |R|, heavy tails).
//! 3. **Rate** — the residual's estimated bits-per-sample is no longer
//!    meaningfully cheaper than the intra EMA; a hysteresis band keeps the
//!    mode from flip-flopping around the break-even point.
//!
//! The engine only tracks rate state; updating it after each encode is
//! the caller's responsibility so that a decision can be overridden (for
//! example by a forced keyframe) without desynchronizing the EMAs.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::stats::ResidualStats;

/// Frame encoding mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Encode independently (keyframe)
    Intra,
    /// Encode as quantized difference from the reference
    Residual,
}

impl FrameMode {
    /// Whether this mode produces a keyframe
    pub fn is_keyframe(&self) -> bool {
        matches!(self, FrameMode::Intra)
    }
}

/// Decision engine thresholds and rate-tracking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Force an intra frame every N frames
    pub gop_period: u32,
    /// Hard cap on consecutive residual frames
    pub gop_max: u32,
    /// Minimum fraction of dead-zone samples before forcing intra
    pub zero_mass_min: f64,
    /// Maximum mean |R| before forcing intra
    pub mean_abs_max: f64,
    /// Maximum P95 of |R| before forcing intra
    pub p95_max: f64,
    /// Maximum P99 of |R| before forcing intra
    pub p99_max: f64,
    /// Maximum residual entropy in bits per sample before forcing intra
    pub entropy_max: f64,
    /// Rate-test slack in bits per pixel
    pub margin_bpp: f64,
    /// Rate-test stickiness in bits per pixel
    pub hysteresis_bpp: f64,
    /// EMA smoothing factor in (0, 1]
    pub ema_alpha: f64,
    /// Seed guess for the intra bpp EMA before the first observation
    pub initial_intra_bpp: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        DecisionConfig {
            gop_period: 60,
            gop_max: 120,
            zero_mass_min: 0.75,
            mean_abs_max: 12.0,
            p95_max: 30.0,
            p99_max: 100.0,
            entropy_max: 6.0,
            margin_bpp: 0.3,
            hysteresis_bpp: 0.15,
            ema_alpha: 0.2,
            initial_intra_bpp: 2.5,
        }
    }
}

/// Mode-decision engine with EMA rate tracking and hysteresis
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: DecisionConfig,
    ema_intra_bpp: f64,
    ema_residual_bpp: f64,
    ema_initialized: bool,
    frames_since_key: u32,
    last_mode: FrameMode,
}

impl DecisionEngine {
    /// Create an engine from a configuration
    pub fn new(config: DecisionConfig) -> Self {
        let ema_intra_bpp = config.initial_intra_bpp;
        DecisionEngine {
            config,
            ema_intra_bpp,
            ema_residual_bpp: 0.0,
            ema_initialized: false,
            frames_since_key: 0,
            last_mode: FrameMode::Intra,
        }
    }

    /// Current intra bits-per-pixel estimate
    pub fn ema_intra_bpp(&self) -> f64 {
        self.ema_intra_bpp
    }

    /// Current residual bits-per-pixel estimate (observability only)
    pub fn ema_residual_bpp(&self) -> f64 {
        self.ema_residual_bpp
    }

    /// Residual frames since the last intra
    pub fn frames_since_key(&self) -> u32 {
        self.frames_since_key
    }

    /// Mode recorded by the last update
    pub fn last_mode(&self) -> FrameMode {
        self.last_mode
    }

    /// Decide the mode for a candidate frame; does not mutate state
    pub fn decide(&self, stats: &ResidualStats, frame_index: u32) -> FrameMode {
        if self.periodic_forces_intra(frame_index) {
            trace!(frame = frame_index, "periodic intra");
            return FrameMode::Intra;
        }
        if self.heuristic_forces_intra(stats) {
            debug!(
                frame = frame_index,
                zero_mass = stats.zero_mass,
                mean_abs = stats.mean_abs,
                p95 = stats.p95,
                p99 = stats.p99,
                "heuristic intra (scene change / FFC)"
            );
            return FrameMode::Intra;
        }
        if self.rate_forces_intra(stats) {
            debug!(
                frame = frame_index,
                bps_res = stats.bps_res,
                ema_intra = self.ema_intra_bpp,
                "rate intra"
            );
            return FrameMode::Intra;
        }
        FrameMode::Residual
    }

    /// Record an encoded intra frame
    ///
    /// Folds the observed size into the intra EMA and resets the residual
    /// run counter. This is the only place the counter resets, so one
    /// intra event resets it exactly once.
    pub fn update_intra(&mut self, compressed_bytes: usize, width: u32, height: u32) {
        let bpp = bits_per_pixel(compressed_bytes, width, height);
        if self.ema_initialized {
            let a = self.config.ema_alpha;
            self.ema_intra_bpp = (1.0 - a) * self.ema_intra_bpp + a * bpp;
        } else {
            self.ema_intra_bpp = bpp;
            self.ema_initialized = true;
        }
        self.frames_since_key = 0;
        self.last_mode = FrameMode::Intra;
        trace!(bpp, ema = self.ema_intra_bpp, "intra EMA updated");
    }

    /// Record an encoded residual frame
    pub fn update_residual(&mut self, compressed_bytes: usize, width: u32, height: u32) {
        let bpp = bits_per_pixel(compressed_bytes, width, height);
        let a = self.config.ema_alpha;
        self.ema_residual_bpp = (1.0 - a) * self.ema_residual_bpp + a * bpp;
        self.frames_since_key += 1;
        self.last_mode = FrameMode::Residual;
        trace!(bpp, ema = self.ema_residual_bpp, "residual EMA updated");
    }

    fn periodic_forces_intra(&self, frame_index: u32) -> bool {
        (self.config.gop_period > 0 && frame_index % self.config.gop_period == 0)
            || self.frames_since_key >= self.config.gop_max
    }

    fn heuristic_forces_intra(&self, stats: &ResidualStats) -> bool {
        stats.zero_mass < self.config.zero_mass_min
            || stats.mean_abs > self.config.mean_abs_max
            || stats.p95 > self.config.p95_max
            || stats.p99 > self.config.p99_max
            || stats.entropy > self.config.entropy_max
    }

    fn rate_forces_intra(&self, stats: &ResidualStats) -> bool {
        // No real intra observation yet; the seed guess is not worth
        // acting on
        if !self.ema_initialized {
            return false;
        }
        let mut threshold = self.ema_intra_bpp;
        if self.last_mode == FrameMode::Residual {
            threshold -= self.config.hysteresis_bpp;
        } else {
            threshold += self.config.hysteresis_bpp;
        }
        stats.bps_res + self.config.margin_bpp >= threshold
    }
}

fn bits_per_pixel(bytes: usize, width: u32, height: u32) -> f64 {
    let pixels = f64::from(width) * f64::from(height);
    if pixels == 0.0 {
        return 0.0;
    }
    (bytes as f64) * 8.0 / pixels
}
