//! Frame encoder with closed-loop reference management
//!
//! The encoder is a small state machine around one piece of state: the
//! previous *reconstructed* frame. Intra frames rebuild that reference
//! from the backend's own decode (so NEAR > 0 loss is accounted for);
//! residual frames quantize the temporal difference against it and fold
//! the dequantized symbols back in. The reference therefore always equals
//! what a decoder reconstructs from the emitted records, which stops
//! error from accumulating across a GOP.
//!
//! Scratch buffers are owned by the encoder and reused across frames;
//! steady-state encoding allocates only the payload vectors the backend
//! returns.

use tracing::{debug, trace};

use crate::codec::{create_codec, NearLosslessCodec, DEFAULT_BACKEND};
use crate::container::CompressedFrame;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::quant::{dequantize, quantize, QuantParams};
use crate::range::{map_from_12bit, map_to_12bit, RangeSpec};
use crate::residual::{bias, reconstruct, residual, unbias, FULL_RANGE_BIAS};

// ─────────────────────────────────────────────────────────────────────────
// ReferenceState
// ─────────────────────────────────────────────────────────────────────────

/// Previous reconstructed frame plus its metadata
///
/// Created empty, set by the first intra frame, updated on every
/// successfully encoded or decoded frame, and invalidated by `reset()`.
#[derive(Debug, Clone, Default)]
pub struct ReferenceState {
    /// Reconstructed sample grid
    pub(crate) data: Vec<u16>,
    /// Reference width in pixels
    pub(crate) width: u32,
    /// Reference height in pixels
    pub(crate) height: u32,
    /// Index of the frame the reference was built from
    pub(crate) frame_index: u32,
    /// Timestamp of the frame the reference was built from
    pub(crate) timestamp: u64,
    /// Whether an intra frame has seeded the reference in this GOP
    pub(crate) initialized: bool,
}

impl ReferenceState {
    /// Create an empty, uninitialized reference
    pub fn new() -> Self {
        ReferenceState::default()
    }

    /// Whether a prior intra frame has seeded the reference
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Reconstructed samples, when initialized
    pub fn samples(&self) -> Option<&[u16]> {
        self.initialized.then_some(self.data.as_slice())
    }

    /// Invalidate the reference
    pub fn clear(&mut self) {
        self.initialized = false;
        self.data.clear();
    }

    pub(crate) fn check_matches(&self, frame_w: u32, frame_h: u32, op: &'static str) -> Result<()> {
        if !self.initialized {
            return Err(Error::no_reference(op));
        }
        if frame_w != self.width || frame_h != self.height {
            return Err(Error::dimension_mismatch(
                frame_w,
                frame_h,
                self.width,
                self.height,
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────
// EncoderStats
// ─────────────────────────────────────────────────────────────────────────

/// Running counters for an encoder instance
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderStats {
    /// Total frames encoded
    pub frames_encoded: u64,
    /// Intra frames emitted
    pub keyframes: u64,
    /// Residual frames emitted
    pub residual_frames: u64,
    /// Total payload bytes produced
    pub payload_bytes: u64,
}

// ─────────────────────────────────────────────────────────────────────────
// FrameEncoder
// ─────────────────────────────────────────────────────────────────────────

/// Temporal frame encoder
pub struct FrameEncoder {
    codec: Box<dyn NearLosslessCodec>,
    reference: ReferenceState,
    stats: EncoderStats,
    // Scratch buffers, reused across frames
    residual_buf: Vec<i16>,
    quantized_buf: Vec<i16>,
    biased_buf: Vec<u16>,
    mapped_buf: Vec<u16>,
    recon_buf: Vec<u16>,
}

impl FrameEncoder {
    /// Create an encoder over an explicit backend
    pub fn new(codec: Box<dyn NearLosslessCodec>) -> Self {
        FrameEncoder {
            codec,
            reference: ReferenceState::new(),
            stats: EncoderStats::default(),
            residual_buf: Vec::new(),
            quantized_buf: Vec::new(),
            biased_buf: Vec::new(),
            mapped_buf: Vec::new(),
            recon_buf: Vec::new(),
        }
    }

    /// Create an encoder over the default built-in backend
    pub fn with_default_backend() -> Result<Self> {
        Ok(FrameEncoder::new(create_codec(DEFAULT_BACKEND)?))
    }

    /// The reconstructed reference, when initialized
    pub fn reference(&self) -> Option<&[u16]> {
        self.reference.samples()
    }

    /// Dimensions of the current reference, when initialized
    pub fn reference_dimensions(&self) -> Option<(u32, u32)> {
        self.reference
            .initialized
            .then_some((self.reference.width, self.reference.height))
    }

    /// Running counters
    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    /// Clear the reference; the next frame must be intra
    pub fn reset(&mut self) {
        debug!("encoder reset, reference invalidated");
        self.reference.clear();
    }

    /// Encode a frame, dispatching on `is_keyframe`
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &mut self,
        frame: &Frame,
        is_keyframe: bool,
        keyframe_near: u32,
        residual_near: u32,
        quant: &QuantParams,
        enable_12bit: bool,
    ) -> Result<CompressedFrame> {
        if is_keyframe {
            self.encode_intra(frame, keyframe_near, enable_12bit)
        } else {
            self.encode_residual(frame, residual_near, quant)
        }
    }

    /// Encode an intra (key) frame
    ///
    /// With `enable_12bit`, a frame whose dynamic range spans less than
    /// half the 16-bit space is remapped to 12 bits before backend
    /// encoding. The produced stream is always decoded back so the
    /// reference reflects any NEAR loss.
    pub fn encode_intra(
        &mut self,
        frame: &Frame,
        near: u32,
        enable_12bit: bool,
    ) -> Result<CompressedFrame> {
        frame.validate()?;
        let n = frame.pixel_count();

        let range_spec = enable_12bit
            .then(|| RangeSpec::compute(&frame.data))
            .filter(RangeSpec::is_beneficial);

        let payload = match &range_spec {
            Some(spec) => {
                self.mapped_buf.resize(n, 0);
                map_to_12bit(&frame.data, &mut self.mapped_buf, spec);
                self.codec
                    .encode(&self.mapped_buf[..n], frame.width, frame.height, 12, near)?
            }
            None => self
                .codec
                .encode(&frame.data, frame.width, frame.height, 16, near)?,
        };

        // Closed loop: decode what was actually written, NEAR loss included
        let expected_bits = if range_spec.is_some() { 12 } else { 16 };
        let decoded = self.codec.decode(&payload, frame.width, frame.height)?;
        if decoded.bits_per_sample != expected_bits {
            return Err(Error::stream_mismatch(format!(
                "backend returned {} bits, expected {}",
                decoded.bits_per_sample, expected_bits
            )));
        }
        if decoded.samples.len() != n {
            return Err(Error::stream_mismatch(format!(
                "backend returned {} samples, expected {}",
                decoded.samples.len(),
                n
            )));
        }

        // All fallible work is done; commit the new reference
        match &range_spec {
            Some(spec) => {
                self.reference.data.resize(n, 0);
                map_from_12bit(&decoded.samples, &mut self.reference.data, spec);
            }
            None => self.reference.data = decoded.samples,
        }
        self.reference.width = frame.width;
        self.reference.height = frame.height;
        self.reference.frame_index = frame.index;
        self.reference.timestamp = frame.timestamp;
        self.reference.initialized = true;

        self.stats.frames_encoded += 1;
        self.stats.keyframes += 1;
        self.stats.payload_bytes += payload.len() as u64;

        let (use_range_map, range_min, range_max) = match range_spec {
            Some(spec) => (true, spec.min_value, spec.max_value),
            None => (false, 0, 65535),
        };
        debug!(
            frame = frame.index,
            bytes = payload.len(),
            use_range_map,
            near,
            "encoded intra frame"
        );

        Ok(CompressedFrame {
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
            frame_index: frame.index,
            is_keyframe: true,
            near_lossless: near,
            quant_q: 0.0,
            dead_zone_t: 0,
            fp_bits: 0,
            use_range_map,
            range_min,
            range_max,
            payload,
        })
    }

    /// Encode a residual frame against the current reference
    ///
    /// Fails with a precondition error when no reference is initialized
    /// or the dimensions disagree; the reference is left untouched on any
    /// failure.
    pub fn encode_residual(
        &mut self,
        frame: &Frame,
        near: u32,
        quant: &QuantParams,
    ) -> Result<CompressedFrame> {
        frame.validate()?;
        self.reference
            .check_matches(frame.width, frame.height, "encode_residual")?;
        let n = frame.pixel_count();

        self.residual_buf.resize(n, 0);
        self.quantized_buf.resize(n, 0);
        self.biased_buf.resize(n, 0);
        self.recon_buf.resize(n, 0);

        residual(&frame.data, &self.reference.data, &mut self.residual_buf);
        quantize(&self.residual_buf, &mut self.quantized_buf, quant);
        bias(&self.quantized_buf, &mut self.biased_buf, FULL_RANGE_BIAS);

        let payload =
            self.codec
                .encode(&self.biased_buf[..n], frame.width, frame.height, 16, near)?;

        // Closed loop. At NEAR=0 the backend reproduces the symbols
        // exactly, so dequantizing our own grid matches what the decoder
        // computes without paying for a decode.
        if near > 0 {
            let decoded = self.codec.decode(&payload, frame.width, frame.height)?;
            if decoded.bits_per_sample != 16 {
                return Err(Error::stream_mismatch(format!(
                    "backend returned {} bits, expected 16",
                    decoded.bits_per_sample
                )));
            }
            if decoded.samples.len() != n {
                return Err(Error::stream_mismatch(format!(
                    "backend returned {} samples, expected {}",
                    decoded.samples.len(),
                    n
                )));
            }
            unbias(&decoded.samples, &mut self.residual_buf, FULL_RANGE_BIAS);
            dequantize(&self.residual_buf, &mut self.quantized_buf, quant);
        } else {
            dequantize(&self.quantized_buf, &mut self.residual_buf, quant);
            std::mem::swap(&mut self.quantized_buf, &mut self.residual_buf);
        }
        // quantized_buf now holds the dequantized residual
        reconstruct(&self.quantized_buf, &self.reference.data, &mut self.recon_buf);

        std::mem::swap(&mut self.reference.data, &mut self.recon_buf);
        self.reference.frame_index = frame.index;
        self.reference.timestamp = frame.timestamp;

        self.stats.frames_encoded += 1;
        self.stats.residual_frames += 1;
        self.stats.payload_bytes += payload.len() as u64;

        trace!(
            frame = frame.index,
            bytes = payload.len(),
            near,
            t = quant.dead_zone_t,
            q = quant.quant_q,
            "encoded residual frame"
        );

        Ok(CompressedFrame {
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
            frame_index: frame.index,
            is_keyframe: false,
            near_lossless: near,
            quant_q: quant.quant_q,
            dead_zone_t: quant.dead_zone_t,
            fp_bits: quant.fp_bits,
            use_range_map: false,
            range_min: 0,
            range_max: 65535,
            payload,
        })
    }
}
