//! Frame decoder
//!
//! Mirrors the encoder: intra records rebuild the reference from the
//! backend decode (inverse range map included), residual records unbias
//! and dequantize the symbol grid embedded in the payload and add it to
//! the reference with clamping. Because both sides run the identical
//! reconstruction, the decoder's reference tracks the encoder's
//! byte-for-byte across a GOP.

use tracing::{debug, trace};

use crate::codec::{create_codec, NearLosslessCodec, DEFAULT_BACKEND};
use crate::container::CompressedFrame;
use crate::encoder::ReferenceState;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::quant::dequantize;
use crate::range::{map_from_12bit, RangeSpec};
use crate::residual::{reconstruct, unbias, FULL_RANGE_BIAS};

/// Temporal frame decoder
pub struct FrameDecoder {
    codec: Box<dyn NearLosslessCodec>,
    reference: ReferenceState,
    // Scratch buffers, reused across frames
    symbol_buf: Vec<i16>,
    dequant_buf: Vec<i16>,
}

impl FrameDecoder {
    /// Create a decoder over an explicit backend
    pub fn new(codec: Box<dyn NearLosslessCodec>) -> Self {
        FrameDecoder {
            codec,
            reference: ReferenceState::new(),
            symbol_buf: Vec::new(),
            dequant_buf: Vec::new(),
        }
    }

    /// Create a decoder over the default built-in backend
    pub fn with_default_backend() -> Result<Self> {
        Ok(FrameDecoder::new(create_codec(DEFAULT_BACKEND)?))
    }

    /// The reconstructed reference, when initialized
    pub fn reference(&self) -> Option<&[u16]> {
        self.reference.samples()
    }

    /// Clear the reference; the next record must be intra
    pub fn reset(&mut self) {
        debug!("decoder reset, reference invalidated");
        self.reference.clear();
    }

    /// Decode one record into a frame
    pub fn decode(&mut self, record: &CompressedFrame) -> Result<Frame> {
        if record.width == 0 || record.height == 0 {
            return Err(Error::malformed(0, "zero frame dimensions"));
        }
        if record.is_keyframe {
            self.decode_intra(record)
        } else {
            self.decode_residual(record)
        }
    }

    fn decode_intra(&mut self, record: &CompressedFrame) -> Result<Frame> {
        let n = record.pixel_count();
        let decoded = self
            .codec
            .decode(&record.payload, record.width, record.height)?;

        let expected_bits = if record.use_range_map { 12 } else { 16 };
        if decoded.bits_per_sample != expected_bits {
            return Err(Error::stream_mismatch(format!(
                "payload is {} bits, record says {}",
                decoded.bits_per_sample, expected_bits
            )));
        }
        if decoded.samples.len() != n {
            return Err(Error::stream_mismatch(format!(
                "payload decoded to {} samples, record says {}",
                decoded.samples.len(),
                n
            )));
        }

        let data = if record.use_range_map {
            let spec = RangeSpec::new(record.range_min, record.range_max);
            let mut restored = vec![0u16; n];
            map_from_12bit(&decoded.samples, &mut restored, &spec);
            restored
        } else {
            decoded.samples
        };

        self.reference.data.clone_from(&data);
        self.reference.width = record.width;
        self.reference.height = record.height;
        self.reference.frame_index = record.frame_index;
        self.reference.timestamp = record.timestamp;
        self.reference.initialized = true;

        debug!(
            frame = record.frame_index,
            use_range_map = record.use_range_map,
            "decoded intra frame"
        );

        Ok(Frame {
            data,
            width: record.width,
            height: record.height,
            index: record.frame_index,
            timestamp: record.timestamp,
        })
    }

    fn decode_residual(&mut self, record: &CompressedFrame) -> Result<Frame> {
        self.reference
            .check_matches(record.width, record.height, "decode_residual")?;
        let quant = record.quant_params()?;
        let n = record.pixel_count();

        let decoded = self
            .codec
            .decode(&record.payload, record.width, record.height)?;
        if decoded.bits_per_sample != 16 {
            return Err(Error::stream_mismatch(format!(
                "residual payload is {} bits, expected 16",
                decoded.bits_per_sample
            )));
        }
        if decoded.samples.len() != n {
            return Err(Error::stream_mismatch(format!(
                "payload decoded to {} samples, record says {}",
                decoded.samples.len(),
                n
            )));
        }

        self.symbol_buf.resize(n, 0);
        self.dequant_buf.resize(n, 0);
        unbias(&decoded.samples, &mut self.symbol_buf, FULL_RANGE_BIAS);
        dequantize(&self.symbol_buf, &mut self.dequant_buf, &quant);

        let mut data = vec![0u16; n];
        reconstruct(&self.dequant_buf, &self.reference.data, &mut data);

        self.reference.data.clone_from(&data);
        self.reference.frame_index = record.frame_index;
        self.reference.timestamp = record.timestamp;

        trace!(frame = record.frame_index, "decoded residual frame");

        Ok(Frame {
            data,
            width: record.width,
            height: record.height,
            index: record.frame_index,
            timestamp: record.timestamp,
        })
    }
}
