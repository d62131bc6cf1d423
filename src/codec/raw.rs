//! Verbatim store backend
//!
//! Writes samples as little-endian words behind a small self-describing
//! header. Lossless, so it trivially satisfies any NEAR bound. Useful as
//! a development reference and for isolating pipeline behaviour from
//! entropy-coder behaviour in tests.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use super::{validate_encode_args, DecodedImage, NearLosslessCodec};
use crate::error::{Error, Result};

/// Magic bytes identifying a raw store stream
pub const RAW_MAGIC: &[u8; 4] = b"LRW1";

/// Header size: magic + bits + near + width + height
const HEADER_SIZE: usize = 4 + 1 + 1 + 4 + 4;

/// Store backend (lossless at any NEAR)
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl RawCodec {
    /// Create a new store backend
    pub fn new() -> Self {
        RawCodec
    }
}

impl NearLosslessCodec for RawCodec {
    fn id(&self) -> &'static str {
        "raw"
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

        let mut out = Vec::with_capacity(HEADER_SIZE + samples.len() * 2);
        out.extend_from_slice(RAW_MAGIC);
        out.push(bits_per_sample);
        out.push(near as u8);
        out.write_u32::<LittleEndian>(width)
            .map_err(|e| Error::backend_encode(e.to_string()))?;
        out.write_u32::<LittleEndian>(height)
            .map_err(|e| Error::backend_encode(e.to_string()))?;
        for &s in samples {
            out.write_u16::<LittleEndian>(s)
                .map_err(|e| Error::backend_encode(e.to_string()))?;
        }
        Ok(out)
    }

    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<DecodedImage> {
        if data.len() < HEADER_SIZE {
            return Err(Error::backend_decode("stream shorter than header"));
        }
        if &data[0..4] != RAW_MAGIC {
            return Err(Error::backend_decode("bad magic for raw stream"));
        }
        let bits_per_sample = data[4];
        if bits_per_sample != 12 && bits_per_sample != 16 {
            return Err(Error::backend_decode(format!(
                "unsupported bits_per_sample {}",
                bits_per_sample
            )));
        }
        let mut cursor = Cursor::new(&data[6..HEADER_SIZE]);
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

        let pixel_count = (width as usize) * (height as usize);
        let body = &data[HEADER_SIZE..];
        if body.len() != pixel_count * 2 {
            return Err(Error::backend_decode(format!(
                "body is {} bytes, expected {}",
                body.len(),
                pixel_count * 2
            )));
        }
        let mut samples = Vec::with_capacity(pixel_count);
        for chunk in body.chunks_exact(2) {
            samples.push(u16::from_le_bytes([chunk[0], chunk[1]]));
        }
        Ok(DecodedImage {
            samples,
            bits_per_sample,
        })
    }
}
