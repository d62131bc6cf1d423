//! Temporal residual compression for 16-bit LWIR thermal video
//!
//! The crate compresses monochrome 16-bit thermal streams with a
//! closed-loop temporal coder layered on a pluggable near-lossless
//! still-image backend (JPEG-LS class). Each frame becomes one
//! self-describing record; the matching decoder reproduces the stream
//! with bounded per-sample error.
//!
//! # Architecture
//!
//! - `frame`: uncompressed frame representation
//! - `range`: per-frame dynamic-range remap to 12 bits
//! - `quant`: dead-zone + fractional-step quantizer (fixed point)
//! - `residual`: pointwise residual/reconstruct/bias operations
//! - `stats`: residual statistics, histograms, session accounting
//! - `codec`: the near-lossless still-image backend seam
//! - `container`: the compressed-frame record format
//! - `encoder` / `decoder`: closed-loop frame coding state machines
//! - `decision`: intra/residual mode decision with EMA rate tracking
//! - `pipeline`: decision + encode orchestration with statistics
//!
//! # Encoding
//!
//! ```
//! use lwir_codec::{CodecConfig, CompressionPipeline, Frame, FrameDecoder};
//!
//! let config = CodecConfig::default().with_gop_period(30);
//! let mut pipeline = CompressionPipeline::new(config).unwrap();
//! let mut decoder = FrameDecoder::with_default_backend().unwrap();
//!
//! let frame = Frame::from_samples(vec![29000; 640 * 512], 640, 512).unwrap();
//! let (record, stats) = pipeline.push_frame(&frame).unwrap();
//! assert!(record.is_keyframe);
//! assert!(stats.compression_ratio > 1.0);
//!
//! let decoded = decoder.decode(&record).unwrap();
//! assert_eq!(decoded.width, 640);
//! ```
//!
//! # Closed loop
//!
//! The encoder's reference is always the frame a decoder reconstructs
//! from the emitted records, so quantization and NEAR loss never
//! accumulate across a GOP.

pub mod codec;
pub mod config;
pub mod container;
pub mod decision;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod quant;
pub mod range;
pub mod residual;
pub mod stats;

pub use codec::{create_codec, DecodedImage, NearLosslessCodec, RawCodec, RiceCodec};
pub use config::CodecConfig;
pub use container::{CompressedFrame, HEADER_SIZE};
pub use decision::{DecisionConfig, DecisionEngine, FrameMode};
pub use decoder::FrameDecoder;
pub use encoder::{EncoderStats, FrameEncoder, ReferenceState};
pub use error::{Error, Result};
pub use frame::Frame;
pub use pipeline::CompressionPipeline;
pub use quant::QuantParams;
pub use range::RangeSpec;
pub use residual::ErrorStats;
pub use stats::{FrameStats, MagnitudeHistogram, ResidualStats, SessionStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization options
#[derive(Debug, Clone, Default)]
pub struct InitConfig {
    /// Install a tracing subscriber at debug level
    pub verbose: bool,
    /// Install a tracing subscriber at trace level
    pub debug: bool,
}

/// Initialize logging for hosts that don't install their own subscriber
pub fn init(config: InitConfig) {
    if config.verbose || config.debug {
        let level = if config.debug { "trace" } else { "debug" };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(level)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_init_is_idempotent() {
        init(InitConfig {
            verbose: true,
            ..Default::default()
        });
        init(InitConfig {
            debug: true,
            verbose: false,
        });
    }
}
