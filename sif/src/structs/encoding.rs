//! Raw pixel encodings used by spool acquisitions.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::{Result, bail};

use crate::utils::errors::SpoolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelEncoding {
    /// 16-bit unsigned, little-endian.
    Mono16,
    /// 32-bit unsigned, little-endian.
    Mono32,
    /// 12-bit unsigned, two pixels packed into three bytes.
    Mono12Packed,
}

impl PixelEncoding {
    /// Bytes per pixel for byte-aligned encodings.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelEncoding::Mono16 => Some(2),
            PixelEncoding::Mono32 => Some(4),
            PixelEncoding::Mono12Packed => None,
        }
    }
}

impl FromStr for PixelEncoding {
    type Err = SpoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Mono16" => Ok(PixelEncoding::Mono16),
            "Mono32" => Ok(PixelEncoding::Mono32),
            "Mono12Packed" => Ok(PixelEncoding::Mono12Packed),
            other => Err(SpoolError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl Display for PixelEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelEncoding::Mono16 => write!(f, "Mono16"),
            PixelEncoding::Mono32 => write!(f, "Mono32"),
            PixelEncoding::Mono12Packed => write!(f, "Mono12Packed"),
        }
    }
}

/// Little-endian decoding of one fixed-width pixel.
pub trait AlignedPixel: Copy {
    const SIZE: usize;
    fn from_le_slice(bytes: &[u8]) -> Self;
}

impl AlignedPixel for u16 {
    const SIZE: usize = 2;

    #[inline(always)]
    fn from_le_slice(bytes: &[u8]) -> Self {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

impl AlignedPixel for u32 {
    const SIZE: usize = 4;

    #[inline(always)]
    fn from_le_slice(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Decodes `height` rows of `stride` bytes, keeping the first `width`
/// pixels of each row. Padding to the right of `width` is dropped.
///
/// `frame` must hold at least `stride * height` bytes and `stride` must fit
/// `width` pixels.
pub fn decode_aligned<T: AlignedPixel>(
    frame: &[u8],
    stride: usize,
    width: usize,
    height: usize,
    out: &mut Vec<T>,
) -> Result<()> {
    let row_bytes = match width.checked_mul(T::SIZE) {
        Some(bytes) if stride != 0 && bytes <= stride => bytes,
        _ => bail!(SpoolError::InvalidSpoolValue {
            key: "AOIStride",
            value: stride.to_string(),
        }),
    };

    let rows = (frame.len() / stride).min(height);
    out.reserve(width * rows);

    for row in frame.chunks_exact(stride).take(rows) {
        out.extend(
            row[..row_bytes]
                .chunks_exact(T::SIZE)
                .map(T::from_le_slice),
        );
    }

    Ok(())
}

/// Unpacks 12-bit pixels stored two per three bytes:
/// `p0 = (b0 << 4) | (b1 >> 4)`, `p1 = (b2 << 4) | (b1 & 0xF)`.
///
/// Decoding with this layout does not reproduce camera precision on every
/// reference acquisition, so spool reading refuses `Mono12Packed` and this
/// stays available for explicit inspection only.
pub fn unpack_mono12_packed(bytes: &[u8]) -> Vec<u16> {
    let mut pixels = Vec::with_capacity(bytes.len() / 3 * 2);

    for group in bytes.chunks_exact(3) {
        let (b0, b1, b2) = (group[0] as u16, group[1] as u16, group[2] as u16);
        pixels.push((b0 << 4) | (b1 >> 4));
        pixels.push((b2 << 4) | (b1 & 0xF));
    }

    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_names() {
        assert_eq!("Mono16".parse::<PixelEncoding>().unwrap(), PixelEncoding::Mono16);
        assert_eq!(" Mono32 ".parse::<PixelEncoding>().unwrap(), PixelEncoding::Mono32);
        assert_eq!(
            "Mono12Packed".parse::<PixelEncoding>().unwrap(),
            PixelEncoding::Mono12Packed
        );
        assert!(matches!(
            "RGB8Packed".parse::<PixelEncoding>(),
            Err(SpoolError::UnsupportedEncoding(name)) if name == "RGB8Packed"
        ));
    }

    #[test]
    fn test_decode_mono16_strips_stride_padding() -> Result<()> {
        // 2 rows, 3 pixels wide, 8-byte stride (one pixel of padding)
        let frame = [
            1, 0, 2, 0, 3, 0, 0xFF, 0xFF, //
            4, 0, 5, 0, 0x06, 0x01, 0xFF, 0xFF,
        ];
        let mut out = Vec::new();
        decode_aligned::<u16>(&frame, 8, 3, 2, &mut out)?;

        assert_eq!(out, vec![1, 2, 3, 4, 5, 0x0106]);

        Ok(())
    }

    #[test]
    fn test_decode_mono32() -> Result<()> {
        let frame = [0x78, 0x56, 0x34, 0x12, 1, 0, 0, 0];
        let mut out = Vec::new();
        decode_aligned::<u32>(&frame, 8, 2, 1, &mut out)?;

        assert_eq!(out, vec![0x1234_5678, 1]);

        Ok(())
    }

    #[test]
    fn test_stride_narrower_than_width_is_rejected() {
        let mut out: Vec<u16> = Vec::new();
        assert!(decode_aligned(&[0; 8], 4, 3, 2, &mut out).is_err());
    }

    #[test]
    fn test_oversized_width_is_rejected() {
        let mut out: Vec<u32> = Vec::new();
        let err = decode_aligned(&[0; 8], 8, usize::MAX / 2, 1, &mut out).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SpoolError>(),
            Some(SpoolError::InvalidSpoolValue { key: "AOIStride", .. })
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_unpack_mono12_bit_layout() {
        let pixels = unpack_mono12_packed(&[0xAB, 0xCD, 0xEF, 0x12, 0x34]);

        assert_eq!(pixels, vec![0xABC, 0xEFD]);
    }
}
