//! DPCM + Rice near-lossless backend
//!
//! Prediction is the left neighbor (above for the first column, mid-range
//! for the first sample). Prediction errors are quantized with the
//! standard near-lossless recurrence so the decoder-side reconstruction
//! stays within ±NEAR of the input, then zigzag-mapped and Rice coded
//! with a per-frame adaptive parameter.
//!
//! The prediction loop is closed over the *reconstructed* neighbors, so
//! encoder and decoder walk identical state and the error bound holds per
//! sample, not per row.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use super::{validate_encode_args, DecodedImage, NearLosslessCodec};
use crate::error::{Error, Result};

/// Magic bytes identifying a Rice stream
pub const RICE_MAGIC: &[u8; 4] = b"LRC1";

/// Header size: magic + bits + near + width + height + k
const HEADER_SIZE: usize = 4 + 1 + 1 + 4 + 4 + 1;

/// Largest Rice parameter ever emitted (zigzagged 17-bit symbols)
const MAX_K: u8 = 17;

/// DPCM + Rice backend
#[derive(Debug, Default, Clone, Copy)]
pub struct RiceCodec;

impl RiceCodec {
    /// Create a new Rice backend
    pub fn new() -> Self {
        RiceCodec
    }
}

impl NearLosslessCodec for RiceCodec {
    fn id(&self) -> &'static str {
        "rice"
    }

    fn encode(
        &self,
        samples: &[u16],
        width: u32,
        height: u32,
        bits_per_sample: u8,
        near: u32,
    ) -> Result<Vec<u8>> {
        validate_encode_args(samples, width, height, bits_per_sample, near)?;

        let w = width as usize;
        let maxval = if bits_per_sample == 16 {
            65535u32
        } else {
            (1u32 << bits_per_sample) - 1
        };
        let mid = 1u16 << (bits_per_sample - 1);
        let delta = 2 * near as i32 + 1;

        // Closed-loop prediction pass: quantized errors + reconstruction
        let mut symbols = vec![0i32; samples.len()];
        let mut recon = vec![0u16; samples.len()];
        for (idx, &sample) in samples.iter().enumerate() {
            let pred = predict(&recon, idx, w, mid);
            let err = i32::from(sample) - i32::from(pred);
            let q = quantize_error(err, near as i32, delta);
            let rec = (i32::from(pred) + q * delta).clamp(0, maxval as i32) as u16;
            symbols[idx] = q;
            recon[idx] = rec;
        }

        let k = estimate_rice_parameter(&symbols);

        let mut out = Vec::with_capacity(HEADER_SIZE + samples.len());
        out.extend_from_slice(RICE_MAGIC);
        out.push(bits_per_sample);
        out.push(near as u8);
        out.write_u32::<LittleEndian>(width)
            .map_err(|e| Error::backend_encode(e.to_string()))?;
        out.write_u32::<LittleEndian>(height)
            .map_err(|e| Error::backend_encode(e.to_string()))?;
        out.push(k);

        let mut bits = BitWriter::new();
        for &q in &symbols {
            encode_symbol(&mut bits, q, k);
        }
        out.extend_from_slice(&bits.into_bytes());
        Ok(out)
    }

    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<DecodedImage> {
        if data.len() < HEADER_SIZE {
            return Err(Error::backend_decode("stream shorter than header"));
        }
        if &data[0..4] != RICE_MAGIC {
            return Err(Error::backend_decode("bad magic for rice stream"));
        }
        let bits_per_sample = data[4];
        if bits_per_sample != 12 && bits_per_sample != 16 {
            return Err(Error::backend_decode(format!(
                "unsupported bits_per_sample {}",
                bits_per_sample
            )));
        }
        let near = u32::from(data[5]);
        let mut cursor = Cursor::new(&data[6..14]);
        let stream_w = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::backend_decode(e.to_string()))?;
        let stream_h = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::backend_decode(e.to_string()))?;
        if stream_w != width || stream_h != height {
            return Err(Error::stream_mismatch(format!(
                "stream is {}x{}, container says {}x{}",
                stream_w, stream_h, width, height
            )));
        }
        let k = data[14];
        if k > MAX_K {
            return Err(Error::backend_decode(format!("rice parameter {} out of range", k)));
        }

        let w = width as usize;
        let pixel_count = w * height as usize;
        let maxval = if bits_per_sample == 16 {
            65535u32
        } else {
            (1u32 << bits_per_sample) - 1
        };
        let mid = 1u16 << (bits_per_sample - 1);
        let delta = 2 * near as i32 + 1;

        let mut bits = BitReader::new(&data[HEADER_SIZE..]);
        let mut samples = vec![0u16; pixel_count];
        for idx in 0..pixel_count {
            let q = decode_symbol(&mut bits, k)
                .ok_or_else(|| Error::backend_decode("truncated rice stream"))?;
            let pred = predict(&samples, idx, w, mid);
            // Saturating math: a corrupted escape code must not overflow
            let rec = i32::from(pred).saturating_add(q.saturating_mul(delta));
            samples[idx] = rec.clamp(0, maxval as i32) as u16;
        }

        Ok(DecodedImage {
            samples,
            bits_per_sample,
        })
    }
}

/// Left-neighbor prediction, falling back to the row above and mid-range
#[inline]
fn predict(recon: &[u16], idx: usize, width: usize, mid: u16) -> u16 {
    if idx % width != 0 {
        recon[idx - 1]
    } else if idx >= width {
        recon[idx - width]
    } else {
        mid
    }
}

/// Near-lossless error quantization: |err - q*delta| <= near
#[inline]
fn quantize_error(err: i32, near: i32, delta: i32) -> i32 {
    if err > 0 {
        (near + err) / delta
    } else {
        -((near - err) / delta)
    }
}

/// Unary run length at which a symbol escapes to a raw 32-bit code
const ESCAPE_QUOTIENT: u32 = 48;

/// Pick a Rice parameter from the symbol distribution
///
/// Mean-driven so the expected code length stays near optimal. The first
/// symbol is excluded: it is predicted from mid-range and would otherwise
/// skew the mean by itself; rare oversized quotients go through the
/// escape code instead of inflating `k` for the whole frame.
fn estimate_rice_parameter(symbols: &[i32]) -> u8 {
    let body = if symbols.len() > 1 { &symbols[1..] } else { symbols };
    if body.is_empty() {
        return 0;
    }
    let sum: u64 = body.iter().map(|&s| s.unsigned_abs() as u64).sum();
    let mean = (sum / body.len() as u64) as u32;
    let mean_k = if mean > 0 {
        (32 - mean.leading_zeros()) as u8
    } else {
        0
    };
    mean_k.min(MAX_K)
}

#[inline]
fn encode_symbol(bits: &mut BitWriter, value: i32, k: u8) {
    // Zigzag: 0, -1, 1, -2, 2, ... -> 0, 1, 2, 3, 4, ...
    let unsigned = ((value << 1) ^ (value >> 31)) as u32;
    let quotient = unsigned >> k;

    if quotient >= ESCAPE_QUOTIENT {
        // Escape: a full unary run followed by the raw value
        for _ in 0..ESCAPE_QUOTIENT {
            bits.write_bit(1);
        }
        for i in (0..32).rev() {
            bits.write_bit((unsigned >> i) & 1);
        }
        return;
    }

    let remainder = if k == 0 { 0 } else { unsigned & ((1u32 << k) - 1) };
    for _ in 0..quotient {
        bits.write_bit(1);
    }
    bits.write_bit(0);
    for i in (0..k).rev() {
        bits.write_bit((remainder >> i) & 1);
    }
}

#[inline]
fn decode_symbol(bits: &mut BitReader<'_>, k: u8) -> Option<i32> {
    let mut quotient = 0u32;
    let escaped = loop {
        if quotient == ESCAPE_QUOTIENT {
            break true;
        }
        match bits.read_bit()? {
            1 => quotient += 1,
            _ => break false,
        }
    };

    let unsigned = if escaped {
        let mut value = 0u32;
        for _ in 0..32 {
            value = (value << 1) | bits.read_bit()?;
        }
        value
    } else {
        let mut remainder = 0u32;
        for _ in 0..k {
            remainder = (remainder << 1) | bits.read_bit()?;
        }
        (quotient << k) | remainder
    };

    Some(((unsigned >> 1) as i32) ^ -((unsigned & 1) as i32))
}

/// MSB-first bit writer
struct BitWriter {
    bytes: Vec<u8>,
    current_byte: u8,
    bit_pos: u8,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter {
            bytes: Vec::new(),
            current_byte: 0,
            bit_pos: 0,
        }
    }

    fn write_bit(&mut self, bit: u32) {
        if bit != 0 {
            self.current_byte |= 1 << (7 - self.bit_pos);
        }
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bytes.push(self.current_byte);
            self.current_byte = 0;
            self.bit_pos = 0;
        }
    }

    fn into_bytes(mut self) -> Vec<u8> {
        if self.bit_pos > 0 {
            self.bytes.push(self.current_byte);
        }
        self.bytes
    }
}

/// MSB-first bit reader; `None` past the end of the buffer
struct BitReader<'a> {
    bytes: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BitReader {
            bytes,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    fn read_bit(&mut self) -> Option<u32> {
        if self.byte_pos >= self.bytes.len() {
            return None;
        }
        let bit = (self.bytes[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Some(u32::from(bit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(w: usize, h: usize) -> Vec<u16> {
        (0..w * h).map(|i| (1000 + (i % w) * 3 + (i / w) * 7) as u16).collect()
    }

    #[test]
    fn test_lossless_roundtrip_near_zero() {
        let codec = RiceCodec::new();
        let samples = gradient_frame(16, 12);
        let encoded = codec.encode(&samples, 16, 12, 16, 0).unwrap();
        let decoded = codec.decode(&encoded, 16, 12).unwrap();
        assert_eq!(decoded.samples, samples);
        assert_eq!(decoded.bits_per_sample, 16);
    }

    #[test]
    fn test_near_bound_holds_exactly() {
        let codec = RiceCodec::new();
        // Noisy content exercises the quantized-error path
        let samples: Vec<u16> = (0..32 * 32u32)
            .map(|i| (20000 + (i.wrapping_mul(2654435761) % 977)) as u16)
            .collect();
        for &near in &[1u32, 3, 10, 255] {
            let encoded = codec.encode(&samples, 32, 32, 16, near).unwrap();
            let decoded = codec.decode(&encoded, 32, 32).unwrap();
            for (&orig, &dec) in samples.iter().zip(decoded.samples.iter()) {
                let err = (i32::from(orig) - i32::from(dec)).unsigned_abs();
                assert!(err <= near, "near={} err={}", near, err);
            }
        }
    }

    #[test]
    fn test_12bit_roundtrip() {
        let codec = RiceCodec::new();
        let samples: Vec<u16> = (0..64u16).map(|i| i * 64).collect();
        let encoded = codec.encode(&samples, 8, 8, 12, 0).unwrap();
        let decoded = codec.decode(&encoded, 8, 8).unwrap();
        assert_eq!(decoded.bits_per_sample, 12);
        assert_eq!(decoded.samples, samples);
    }

    #[test]
    fn test_flat_frame_compresses_hard() {
        let codec = RiceCodec::new();
        let samples = vec![1000u16; 64 * 64];
        let encoded = codec.encode(&samples, 64, 64, 16, 0).unwrap();
        // One bit per sample after the escaped first symbol, plus header
        assert!(encoded.len() < 64 * 64 / 8 + HEADER_SIZE + 32);
        let decoded = codec.decode(&encoded, 64, 64).unwrap();
        assert_eq!(decoded.samples, samples);
    }

    #[test]
    fn test_smooth_content_beats_raw() {
        let codec = RiceCodec::new();
        let samples = gradient_frame(64, 64);
        let encoded = codec.encode(&samples, 64, 64, 16, 0).unwrap();
        assert!(encoded.len() < samples.len() * 2 / 2);
    }

    #[test]
    fn test_escape_path_roundtrips() {
        let codec = RiceCodec::new();
        // Alternating extremes force huge prediction errors at k chosen
        // from a mostly-flat body
        let mut samples = vec![100u16; 256];
        samples[128] = 65000;
        samples[129] = 100;
        let encoded = codec.encode(&samples, 16, 16, 16, 0).unwrap();
        let decoded = codec.decode(&encoded, 16, 16).unwrap();
        assert_eq!(decoded.samples, samples);
    }

    #[test]
    fn test_determinism() {
        let codec = RiceCodec::new();
        let samples = gradient_frame(16, 16);
        let a = codec.encode(&samples, 16, 16, 16, 2).unwrap();
        let b = codec.encode(&samples, 16, 16, 16, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let codec = RiceCodec::new();
        let encoded = codec.encode(&[0; 64], 8, 8, 16, 0).unwrap();
        assert!(codec.decode(&encoded, 8, 16).is_err());
    }

    #[test]
    fn test_rejects_truncated_stream() {
        let codec = RiceCodec::new();
        let samples: Vec<u16> = (0..256u16).map(|i| i.wrapping_mul(997)).collect();
        let encoded = codec.encode(&samples, 16, 16, 16, 0).unwrap();
        let err = codec.decode(&encoded[..HEADER_SIZE + 4], 16, 16).unwrap_err();
        assert!(err.is_codec_failure());
    }

    #[test]
    fn test_quantize_error_identity_at_near_zero() {
        for err in -100..=100 {
            assert_eq!(quantize_error(err, 0, 1), err);
        }
    }

    #[test]
    fn test_quantize_error_bound() {
        for near in 0i32..=10 {
            let delta = 2 * near + 1;
            for err in -500i32..=500 {
                let q = quantize_error(err, near, delta);
                assert!((err - q * delta).abs() <= near, "near={} err={}", near, err);
            }
        }
    }

    #[test]
    fn test_estimate_rice_parameter_zero_symbols() {
        assert_eq!(estimate_rice_parameter(&[0; 100]), 0);
        assert_eq!(estimate_rice_parameter(&[]), 0);
    }

    #[test]
    fn test_estimate_rice_parameter_ignores_first_symbol() {
        // A huge first symbol (mid-range prediction miss) must not drag
        // the parameter up for the whole frame
        let mut symbols = vec![0i32; 4096];
        symbols[0] = -31768;
        assert_eq!(estimate_rice_parameter(&symbols), 0);
    }
}
