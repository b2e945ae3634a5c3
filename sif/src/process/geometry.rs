//! Plane geometry and tile planning.
//!
//! Subimages stack vertically into one plane. The last subimage's size is
//! canonical; all subimages are expected to be congruent.

use anyhow::{Result, bail};
use log::debug;

use crate::log_or_err;
use crate::structs::subimage::Subimage;
use crate::structs::tile::{BoundingBox, PixelFormat, Tile};
use crate::utils::errors::GeometryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u64,
    pub subimage_height: u64,
    pub subimages: u64,
}

impl Geometry {
    /// Derives the plane geometry from the decoded subimages.
    ///
    /// A subimage that differs in size from subimage 0 is reported at
    /// `Warn` level, so it only fails when `fail_level` is `Warn` or lower.
    pub fn from_subimages(subimages: &[Subimage], fail_level: log::Level) -> Result<Self> {
        let (Some(first), Some(last)) = (subimages.first(), subimages.last()) else {
            bail!(GeometryError::NoSubimages);
        };

        for (index, sub) in subimages.iter().enumerate().skip(1) {
            if (sub.width(), sub.height()) != (first.width(), first.height()) {
                log_or_err!(
                    fail_level,
                    log::Level::Warn,
                    GeometryError::IncongruentSubimages {
                        subimage: index,
                        width: sub.width(),
                        height: sub.height(),
                        expected_width: first.width(),
                        expected_height: first.height(),
                    }
                );
            }
        }

        let geometry = Self {
            width: last.width(),
            subimage_height: last.height(),
            subimages: subimages.len() as u64,
        };

        let height = geometry
            .subimage_height
            .checked_mul(geometry.subimages)
            .ok_or(GeometryError::SizeOverflow("plane height"))?;
        if geometry.width == 0 || height == 0 {
            bail!(GeometryError::InvalidGeometry {
                width: geometry.width,
                height,
            });
        }
        geometry.frame_bytes()?;

        Ok(geometry)
    }

    /// `(width, height)` of the combined plane.
    ///
    /// Saturates instead of overflowing; geometries from
    /// [`Geometry::from_subimages`] never reach that.
    pub fn plane_shape(&self) -> (u64, u64) {
        (self.width, self.subimage_height.saturating_mul(self.subimages))
    }

    pub fn pixels_per_frame(&self) -> u64 {
        let (width, height) = self.plane_shape();
        width.saturating_mul(height)
    }

    /// Bytes of one float32 frame.
    pub fn frame_bytes(&self) -> Result<u64> {
        let bytes = self
            .subimage_height
            .checked_mul(self.subimages)
            .and_then(|h| h.checked_mul(self.width))
            .and_then(|px| px.checked_mul(PixelFormat::F32Le.bytes_per_pixel()))
            .filter(|&b| usize::try_from(b).is_ok());

        match bytes {
            Some(bytes) => Ok(bytes),
            None => bail!(GeometryError::SizeOverflow("frame size")),
        }
    }

    /// One tile per frame, laid out back to back from `data_offset`.
    pub fn plan_tiles(&self, frames: usize, data_offset: u64) -> Result<Vec<Tile>> {
        let (width, height) = self.plane_shape();
        let pixel_format = PixelFormat::F32Le;
        let stride = self.frame_bytes()?;

        // the end of the last tile bounds every offset below
        let end = (frames as u64)
            .checked_mul(stride)
            .and_then(|len| len.checked_add(data_offset));
        if end.is_none() {
            bail!(GeometryError::SizeOverflow("payload offset"));
        }

        debug!("Planning {frames} tile(s) of {width}x{height} from byte {data_offset}");

        Ok((0..frames as u64)
            .map(|frame| Tile {
                bbox: BoundingBox {
                    left: 0,
                    top: 0,
                    right: width,
                    bottom: height,
                },
                offset: data_offset + frame * stride,
                pixel_format,
            })
            .collect())
    }
}
