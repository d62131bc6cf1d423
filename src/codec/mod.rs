//! Pluggable near-lossless still-image backend
//!
//! The temporal coder treats the still-image codec as a narrow contract:
//! encode a 2D unsigned sample grid at 12 or 16 bits with a NEAR
//! parameter, decode it back. Every reconstructed sample is guaranteed to
//! lie within ±NEAR of the input, exactly. Backends are deterministic,
//! stateless between calls, and produce one self-delimited byte stream
//! per encode.
//!
//! Production deployments plug a JPEG-LS implementation in through
//! [`NearLosslessCodec`]; the crate ships two built-in backends:
//!
//! - `rice` — DPCM prediction with near-lossless error quantization and
//!   adaptive Rice entropy coding (default)
//! - `raw`  — verbatim store, lossless at any NEAR (development/reference)

pub mod raw;
pub mod rice;

pub use raw::RawCodec;
pub use rice::RiceCodec;

use crate::error::{Error, Result};

/// Identifier of the default built-in backend
pub const DEFAULT_BACKEND: &str = "rice";

/// Maximum NEAR parameter accepted by the contract
pub const MAX_NEAR: u32 = 255;

/// Decoded still image with its sample depth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Row-major sample grid
    pub samples: Vec<u16>,
    /// Bits per sample of the encoded stream (12 or 16)
    pub bits_per_sample: u8,
}

/// Contract over a near-lossless still-image codec
///
/// Guarantees the temporal coder relies on: with NEAR = n every decoded
/// sample lies within ±n of the input; encode/decode are deterministic
/// and carry no state between calls.
pub trait NearLosslessCodec: Send + Sync + std::fmt::Debug {
    /// Backend identifier ("rice", "raw", ...)
    fn id(&self) -> &'static str;

    /// Encode a sample grid into a self-delimited byte stream
    fn encode(
        &self,
        samples: &[u16],
        width: u32,
        height: u32,
        bits_per_sample: u8,
        near: u32,
    ) -> Result<Vec<u8>>;

    /// Decode a byte stream produced by [`encode`](Self::encode)
    ///
    /// The passed dimensions come from container metadata; a stream whose
    /// embedded dimensions disagree is rejected as a codec failure.
    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<DecodedImage>;
}

/// Create a backend by identifier
pub fn create_codec(id: &str) -> Result<Box<dyn NearLosslessCodec>> {
    match id {
        "rice" => Ok(Box::new(RiceCodec::new())),
        "raw" => Ok(Box::new(RawCodec::new())),
        _ => Err(Error::UnknownBackend { id: id.to_string() }),
    }
}

/// Validate the shared encode-side contract arguments
pub(crate) fn validate_encode_args(
    samples: &[u16],
    width: u32,
    height: u32,
    bits_per_sample: u8,
    near: u32,
) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::backend_encode(format!(
            "invalid dimensions {}x{}",
            width, height
        )));
    }
    let expected = (width as usize) * (height as usize);
    if samples.len() != expected {
        return Err(Error::backend_encode(format!(
            "sample count {} doesn't match {}x{}",
            samples.len(),
            width,
            height
        )));
    }
    if bits_per_sample != 12 && bits_per_sample != 16 {
        return Err(Error::backend_encode(format!(
            "bits_per_sample must be 12 or 16, got {}",
            bits_per_sample
        )));
    }
    if near > MAX_NEAR {
        return Err(Error::backend_encode(format!(
            "near {} exceeds maximum {}",
            near, MAX_NEAR
        )));
    }
    if bits_per_sample < 16 {
        let maxval = (1u32 << bits_per_sample) - 1;
        if samples.iter().any(|&s| u32::from(s) > maxval) {
            return Err(Error::backend_encode(format!(
                "sample exceeds {}-bit range",
                bits_per_sample
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_known_backends() {
        assert_eq!(create_codec("rice").unwrap().id(), "rice");
        assert_eq!(create_codec("raw").unwrap().id(), "raw");
        assert_eq!(create_codec(DEFAULT_BACKEND).unwrap().id(), "rice");
    }

    #[test]
    fn test_factory_unknown_backend() {
        let err = create_codec("jpegxs").unwrap_err();
        assert!(err.is_codec_failure());
    }

    #[test]
    fn test_encode_arg_validation() {
        let samples = vec![0u16; 64];
        assert!(validate_encode_args(&samples, 8, 8, 16, 0).is_ok());
        assert!(validate_encode_args(&samples, 8, 8, 12, 255).is_ok());

        assert!(validate_encode_args(&samples, 0, 8, 16, 0).is_err());
        assert!(validate_encode_args(&samples, 8, 7, 16, 0).is_err());
        assert!(validate_encode_args(&samples, 8, 8, 8, 0).is_err());
        assert!(validate_encode_args(&samples, 8, 8, 16, 256).is_err());

        let too_big = vec![4096u16; 64];
        assert!(validate_encode_args(&too_big, 8, 8, 12, 0).is_err());
    }
}
