//! In-memory compression pipeline
//!
//! Ties the decision engine and the frame encoder together: for each
//! pushed frame it measures the candidate residual against the encoder's
//! reference, asks the decision engine for a mode, encodes, feeds the
//! observed sizes back into the rate EMAs, and accumulates per-frame and
//! session statistics. Frame I/O (PNG loading, record files) stays with
//! the host.

use tracing::{debug, info};

use crate::codec::NearLosslessCodec;
use crate::config::CodecConfig;
use crate::container::CompressedFrame;
use crate::decision::{DecisionEngine, FrameMode};
use crate::encoder::FrameEncoder;
use crate::error::Result;
use crate::frame::Frame;
use crate::quant::{quantize, QuantParams};
use crate::residual::{residual, ErrorStats};
use crate::stats::{symbol_entropy, FrameStats, MagnitudeHistogram, ResidualStats, SessionStats};

/// Decision + encode orchestration with statistics tracking
pub struct CompressionPipeline {
    config: CodecConfig,
    quant: QuantParams,
    encoder: FrameEncoder,
    decision: DecisionEngine,
    session: SessionStats,
    histogram: MagnitudeHistogram,
    residual_scratch: Vec<i16>,
    quantized_scratch: Vec<i16>,
}

impl CompressionPipeline {
    /// Create a pipeline over the default backend
    pub fn new(config: CodecConfig) -> Result<Self> {
        let encoder = FrameEncoder::with_default_backend()?;
        Self::with_encoder(config, encoder)
    }

    /// Create a pipeline over an explicit backend
    pub fn with_backend(config: CodecConfig, codec: Box<dyn NearLosslessCodec>) -> Result<Self> {
        Self::with_encoder(config, FrameEncoder::new(codec))
    }

    fn with_encoder(config: CodecConfig, encoder: FrameEncoder) -> Result<Self> {
        config.validate()?;
        let quant = config.quant_params()?;
        let decision = DecisionEngine::new(config.decision_config());
        info!(
            gop_period = config.gop_period,
            keyframe_near = config.keyframe_near,
            residual_near = config.residual_near,
            t = config.dead_zone_t,
            q = config.quant_q,
            "pipeline configured"
        );
        Ok(CompressionPipeline {
            config,
            quant,
            encoder,
            decision,
            session: SessionStats::default(),
            histogram: MagnitudeHistogram::new(),
            residual_scratch: Vec::new(),
            quantized_scratch: Vec::new(),
        })
    }

    /// The configuration the pipeline was built with
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// The decision engine state (for logging/inspection)
    pub fn decision(&self) -> &DecisionEngine {
        &self.decision
    }

    /// Compress one frame
    ///
    /// Frames must arrive in non-decreasing index order. The first frame
    /// of a stream (and the first after a dimension change) is always
    /// encoded intra.
    pub fn push_frame(&mut self, frame: &Frame) -> Result<(CompressedFrame, FrameStats)> {
        frame.validate()?;
        let n = frame.pixel_count();

        // Candidate residual statistics against the current reference
        let mut residual_stats = ResidualStats::default();
        let mut quantized_entropy = 0.0;
        let dims_match = self.encoder.reference_dimensions() == Some((frame.width, frame.height));
        let candidate = match self.encoder.reference() {
            Some(reference) if dims_match && reference.len() == n => {
                self.residual_scratch.resize(n, 0);
                self.quantized_scratch.resize(n, 0);
                residual(&frame.data, reference, &mut self.residual_scratch);
                // Decision runs on the pre-quantization proxy; the
                // quantized-symbol entropy is tracked for observability
                residual_stats = ResidualStats::compute(
                    &self.residual_scratch,
                    self.quant.dead_zone_t,
                    None,
                    &mut self.histogram,
                );
                quantize(&self.residual_scratch, &mut self.quantized_scratch, &self.quant);
                quantized_entropy = symbol_entropy(&self.quantized_scratch);
                true
            }
            _ => false,
        };

        let mode = if candidate {
            self.decision.decide(&residual_stats, frame.index)
        } else {
            FrameMode::Intra
        };

        let record = self.encoder.encode(
            frame,
            mode.is_keyframe(),
            self.config.keyframe_near,
            self.config.residual_near,
            &self.quant,
            self.config.enable_12bit_mode,
        )?;

        match mode {
            FrameMode::Intra => {
                self.decision
                    .update_intra(record.payload.len(), frame.width, frame.height)
            }
            FrameMode::Residual => {
                self.decision
                    .update_residual(record.payload.len(), frame.width, frame.height)
            }
        }

        // The closed-loop reference is exactly what a decoder will see
        let error = self
            .encoder
            .reference()
            .map(|reference| ErrorStats::between(&frame.data, reference))
            .unwrap_or_default();

        let stats = FrameStats {
            frame_index: frame.index,
            is_keyframe: record.is_keyframe,
            residual: residual_stats,
            quantized_entropy,
            original_bytes: frame.byte_count(),
            compressed_bytes: record.payload.len(),
            compression_ratio: frame.byte_count() as f64 / record.payload.len().max(1) as f64,
            error,
        };
        self.session.add_frame(&stats);

        debug!(
            frame = frame.index,
            keyframe = record.is_keyframe,
            bytes = record.payload.len(),
            ratio = stats.compression_ratio,
            max_error = error.max_error,
            "frame compressed"
        );

        Ok((record, stats))
    }

    /// Aggregate statistics so far
    pub fn session_stats(&self) -> SessionStats {
        let mut stats = self.session.clone();
        stats.finalize();
        stats
    }

    /// Consume the pipeline and return the finalized session statistics
    pub fn finish(self) -> SessionStats {
        let mut stats = self.session;
        stats.finalize();
        info!(
            frames = stats.total_frames,
            keyframes = stats.keyframes,
            ratio = stats.overall_compression_ratio,
            "session finished"
        );
        stats
    }
}
