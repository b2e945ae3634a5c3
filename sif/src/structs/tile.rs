//! Tile descriptors: where each frame's pixels live in the file.

use std::fmt::{Display, Formatter};

/// Size in bytes of one stored pixel.
pub const BYTES_PER_PIXEL: u64 = 4;

/// On-disk pixel representation of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit IEEE-754 float, little-endian.
    F32Le,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u64 {
        match self {
            PixelFormat::F32Le => BYTES_PER_PIXEL,
        }
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::F32Le => write!(f, "F;32F"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u64,
    pub top: u64,
    pub right: u64,
    pub bottom: u64,
}

impl BoundingBox {
    pub fn width(&self) -> u64 {
        self.right - self.left
    }

    pub fn height(&self) -> u64 {
        self.bottom - self.top
    }
}

/// One frame of pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub bbox: BoundingBox,
    /// Absolute byte offset of the first pixel.
    pub offset: u64,
    pub pixel_format: PixelFormat,
}

impl Tile {
    pub fn byte_len(&self) -> u64 {
        self.bbox.width() * self.bbox.height() * self.pixel_format.bytes_per_pixel()
    }
}
