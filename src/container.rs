//! Compressed-frame container format
//!
//! Each encoded frame travels as one self-describing record: a fixed
//! 50-byte little-endian header carrying everything a decoder needs to
//! invert the pipeline (dimensions, mode, NEAR, quantization parameters,
//! range-map bounds) followed by the backend byte stream. Residual
//! records additionally depend on the previous reconstructed reference
//! (GOP-local dependency), but are otherwise self-contained.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::quant::{QuantParams, MAX_FP_BITS};

/// Size of the fixed record header in bytes
pub const HEADER_SIZE: usize = 50;

/// A single compressed frame record
///
/// ## Layout (Little Endian)
///
/// | Offset | Size | Field         | Notes                              |
/// |--------|------|---------------|------------------------------------|
/// | 0x00   | 4    | width         | pixels, non-zero                   |
/// | 0x04   | 4    | height        | pixels, non-zero                   |
/// | 0x08   | 8    | timestamp     | opaque units                       |
/// | 0x10   | 4    | frame_index   |                                    |
/// | 0x14   | 1    | is_keyframe   | 0 or 1                             |
/// | 0x15   | 4    | near_lossless | codec NEAR used                    |
/// | 0x19   | 8    | quant_q       | IEEE-754 binary64                  |
/// | 0x21   | 4    | dead_zone_t   |                                    |
/// | 0x25   | 4    | fp_bits       | must be <= 16                      |
/// | 0x29   | 1    | use_range_map | 0 or 1                             |
/// | 0x2A   | 2    | range_min     |                                    |
/// | 0x2C   | 2    | range_max     |                                    |
/// | 0x2E   | 4    | payload_size  | N, must equal remaining bytes      |
/// | 0x32   | N    | payload       | backend byte stream                |
///
/// Intra records carry `quant_q = 0`, `dead_zone_t = 0`, `fp_bits = 0`;
/// residual records carry `use_range_map = 0`, `range_min = 0`,
/// `range_max = 65535`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp in opaque units
    pub timestamp: u64,
    /// Frame index within the stream
    pub frame_index: u32,
    /// Whether this record is an intra frame
    pub is_keyframe: bool,
    /// NEAR parameter handed to the backend
    pub near_lossless: u32,
    /// Quantization step (0 for intra records)
    pub quant_q: f64,
    /// Dead-zone threshold (0 for intra records)
    pub dead_zone_t: u32,
    /// Fixed-point fractional bits (0 for intra records)
    pub fp_bits: u32,
    /// Whether the payload was encoded through the 12-bit range map
    pub use_range_map: bool,
    /// Range-map lower bound
    pub range_min: u16,
    /// Range-map upper bound
    pub range_max: u16,
    /// Backend byte stream
    pub payload: Vec<u8>,
}

impl CompressedFrame {
    /// Number of pixels described by the record
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Total serialized size in bytes
    pub fn serialized_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Quantization parameters embedded in a residual record
    pub fn quant_params(&self) -> Result<QuantParams> {
        QuantParams::new(self.dead_zone_t, self.quant_q, self.fp_bits)
    }

    /// Serialize the record into a byte vector
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        // Writing into a Vec cannot fail
        let _ = out.write_u32::<LittleEndian>(self.width);
        let _ = out.write_u32::<LittleEndian>(self.height);
        let _ = out.write_u64::<LittleEndian>(self.timestamp);
        let _ = out.write_u32::<LittleEndian>(self.frame_index);
        let _ = out.write_u8(u8::from(self.is_keyframe));
        let _ = out.write_u32::<LittleEndian>(self.near_lossless);
        let _ = out.write_f64::<LittleEndian>(self.quant_q);
        let _ = out.write_u32::<LittleEndian>(self.dead_zone_t);
        let _ = out.write_u32::<LittleEndian>(self.fp_bits);
        let _ = out.write_u8(u8::from(self.use_range_map));
        let _ = out.write_u16::<LittleEndian>(self.range_min);
        let _ = out.write_u16::<LittleEndian>(self.range_max);
        let _ = out.write_u32::<LittleEndian>(self.payload.len() as u32);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse and validate a record
    pub fn parse(data: &[u8]) -> Result<CompressedFrame> {
        if data.len() < HEADER_SIZE {
            return Err(Error::malformed(
                data.len(),
                format!("record shorter than {}-byte header", HEADER_SIZE),
            ));
        }

        let mut cursor = Cursor::new(data);
        let read_err = |e: std::io::Error| Error::malformed(0, e.to_string());

        let width = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let height = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let timestamp = cursor.read_u64::<LittleEndian>().map_err(read_err)?;
        let frame_index = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let keyframe_byte = cursor.read_u8().map_err(read_err)?;
        let near_lossless = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let quant_q = cursor.read_f64::<LittleEndian>().map_err(read_err)?;
        let dead_zone_t = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let fp_bits = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let range_map_byte = cursor.read_u8().map_err(read_err)?;
        let range_min = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let range_max = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let payload_size = cursor.read_u32::<LittleEndian>().map_err(read_err)? as usize;

        if width == 0 || height == 0 {
            return Err(Error::malformed(0, "zero frame dimensions"));
        }
        if keyframe_byte > 1 {
            return Err(Error::malformed(
                0x14,
                format!("is_keyframe must be 0 or 1, got {}", keyframe_byte),
            ));
        }
        if fp_bits > MAX_FP_BITS {
            return Err(Error::malformed(
                0x25,
                format!("fp_bits {} exceeds {}", fp_bits, MAX_FP_BITS),
            ));
        }
        if range_map_byte > 1 {
            return Err(Error::malformed(
                0x29,
                format!("use_range_map must be 0 or 1, got {}", range_map_byte),
            ));
        }
        if range_min > range_max {
            return Err(Error::malformed(
                0x2A,
                format!("range_min {} exceeds range_max {}", range_min, range_max),
            ));
        }
        let remaining = data.len() - HEADER_SIZE;
        if payload_size != remaining {
            return Err(Error::malformed(
                0x2E,
                format!(
                    "payload_size {} doesn't match {} remaining bytes",
                    payload_size, remaining
                ),
            ));
        }
        if payload_size == 0 {
            return Err(Error::malformed(0x2E, "empty payload"));
        }

        Ok(CompressedFrame {
            width,
            height,
            timestamp,
            frame_index,
            is_keyframe: keyframe_byte == 1,
            near_lossless,
            quant_q,
            dead_zone_t,
            fp_bits,
            use_range_map: range_map_byte == 1,
            range_min,
            range_max,
            payload: data[HEADER_SIZE..].to_vec(),
        })
    }
}
