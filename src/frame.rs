//! Frame representation for uncompressed LWIR data
//!
//! A [`Frame`] is a single monochrome 16-bit image with the metadata the
//! temporal coder carries through the pipeline: dimensions, a stream
//! index, and an opaque timestamp.

use crate::error::{Error, Result};

/// A single 16-bit grayscale LWIR frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sample grid, row-major, `width * height` entries
    pub data: Vec<u16>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame index within the stream (non-decreasing)
    pub index: u32,
    /// Timestamp in opaque units (microseconds or frame number)
    pub timestamp: u64,
}

impl Frame {
    /// Create a zero-filled frame with the given dimensions
    pub fn new(width: u32, height: u32) -> Self {
        Frame {
            data: vec![0; (width as usize) * (height as usize)],
            width,
            height,
            index: 0,
            timestamp: 0,
        }
    }

    /// Create a frame from existing sample data
    ///
    /// Fails with a precondition error when the sample count doesn't match
    /// the dimensions or either dimension is zero.
    pub fn from_samples(data: Vec<u16>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_frame("dimensions must be non-zero"));
        }
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(Error::invalid_frame(format!(
                "sample count {} doesn't match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Frame {
            data,
            width,
            height,
            index: 0,
            timestamp: 0,
        })
    }

    /// Set the frame index
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Number of samples in the grid
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Size of the raw frame in bytes
    pub fn byte_count(&self) -> usize {
        self.pixel_count() * 2
    }

    /// Check structural validity (non-zero dimensions, matching length)
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.pixel_count()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(Error::invalid_frame(format!(
                "{}x{} frame with {} samples",
                self.width,
                self.height,
                self.data.len()
            )));
        }
        Ok(())
    }
}
