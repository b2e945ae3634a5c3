//! Subimage descriptors.
//!
//! Each subimage line carries `x0 y1 x1 y0 ybin xbin` in that literal
//! order. Whether the pairs really mean left/top/right/bottom is not known,
//! so the values are kept exactly as read.

use anyhow::{Result, bail};

use crate::utils::errors::GeometryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subimage {
    pub x0: i64,
    pub y1: i64,
    pub x1: i64,
    pub y0: i64,
    pub ybin: i64,
    pub xbin: i64,
    width: u64,
    height: u64,
}

impl Subimage {
    /// Builds a descriptor from the six coordinates in read order.
    ///
    /// Binned extents must divide exactly; anything else is malformed input.
    pub fn from_coordinates(index: usize, coords: [i64; 6]) -> Result<Self> {
        let [x0, y1, x1, y0, ybin, xbin] = coords;

        let width = Self::binned_extent(index, "width", x0, x1, xbin)?;
        let height = Self::binned_extent(index, "height", y0, y1, ybin)?;

        Ok(Self {
            x0,
            y1,
            x1,
            y0,
            ybin,
            xbin,
            width,
            height,
        })
    }

    /// `(hi - lo + 1) / binning`, exact or an error.
    fn binned_extent(
        index: usize,
        axis: &'static str,
        lo: i64,
        hi: i64,
        binning: i64,
    ) -> Result<u64> {
        let Some(extent) = hi.checked_sub(lo).and_then(|d| d.checked_add(1)) else {
            bail!(GeometryError::ExtentOverflow {
                subimage: index,
                axis,
                lo,
                hi,
            });
        };

        if binning <= 0 || extent < 0 || extent % binning != 0 {
            bail!(GeometryError::InexactBinning {
                subimage: index,
                axis,
                extent,
                binning,
            });
        }

        Ok((extent / binning) as u64)
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn coordinates(&self) -> [i64; 6] {
        [self.x0, self.y1, self.x1, self.y0, self.ybin, self.xbin]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binned_dimensions() -> Result<()> {
        let sub = Subimage::from_coordinates(0, [1, 256, 1024, 1, 1, 1])?;
        assert_eq!((sub.width(), sub.height()), (1024, 256));

        let sub = Subimage::from_coordinates(0, [1, 256, 1024, 1, 256, 2])?;
        assert_eq!((sub.width(), sub.height()), (512, 1));
        assert_eq!(sub.coordinates(), [1, 256, 1024, 1, 256, 2]);

        Ok(())
    }

    #[test]
    fn test_inexact_binning_is_rejected() {
        let err = Subimage::from_coordinates(3, [1, 10, 1024, 1, 3, 1]).unwrap_err();

        match err.downcast_ref::<GeometryError>() {
            Some(GeometryError::InexactBinning {
                subimage,
                axis,
                extent,
                binning,
            }) => {
                assert_eq!(*subimage, 3);
                assert_eq!(*axis, "height");
                assert_eq!(*extent, 10);
                assert_eq!(*binning, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_extent_overflow_is_rejected() {
        let err = Subimage::from_coordinates(0, [0, 1, i64::MAX, 1, 1, 1]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GeometryError>(),
            Some(GeometryError::ExtentOverflow { subimage: 0, axis: "width", .. })
        ));

        let err = Subimage::from_coordinates(2, [1, i64::MIN, 1, 1, 1, 1]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GeometryError>(),
            Some(GeometryError::ExtentOverflow { subimage: 2, axis: "height", .. })
        ));
    }

    #[test]
    fn test_zero_binning_is_rejected() {
        assert!(Subimage::from_coordinates(0, [1, 1, 10, 1, 1, 0]).is_err());
    }
}
