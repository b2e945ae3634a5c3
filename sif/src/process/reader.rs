use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};

use crate::process::calibration::{Calibration, extract_calibration};
use crate::process::geometry::Geometry;
use crate::process::header::{Header, HeaderDecoder, KEY_TIMESTAMPS};
use crate::process::payload::{FrameStack, read_tiles};
use crate::structs::metadata::{Metadata, Value};
use crate::structs::subimage::Subimage;
use crate::structs::tile::Tile;
use crate::structs::timestamp::timestamps_to_seconds;
use crate::structs::version::SifVersion;
use crate::utils::token_io::TokenReader;

/// A decoded SIF file: metadata plus the location of every frame.
#[derive(Debug, Clone)]
pub struct SifFile {
    pub metadata: Metadata,
    pub version: SifVersion,
    pub subimages: Vec<Subimage>,
    pub geometry: Geometry,
    pub tiles: Vec<Tile>,
    /// Absolute offset of the first pixel byte.
    pub data_offset: u64,
}

impl SifFile {
    fn from_header(header: Header, geometry: Geometry) -> Result<Self> {
        let tiles = geometry.plan_tiles(header.frame_count, header.data_offset)?;

        Ok(Self {
            metadata: header.metadata,
            version: header.version,
            subimages: header.subimages,
            geometry,
            tiles,
            data_offset: header.data_offset,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.tiles.len()
    }

    /// `(width, height)` of one frame.
    pub fn plane_shape(&self) -> (u64, u64) {
        self.geometry.plane_shape()
    }

    /// Raw per-frame timestamps in microseconds.
    pub fn timestamps(&self) -> &[u64] {
        match self.metadata.get(KEY_TIMESTAMPS) {
            Some(Value::UIntList(ts)) => ts,
            _ => &[],
        }
    }

    /// Timestamps in seconds with counter wraparound undone.
    pub fn timestamps_seconds(&self) -> Vec<f64> {
        timestamps_to_seconds(self.timestamps())
    }

    /// Evaluated calibration over the plane width, if the file has one.
    pub fn calibration(&self) -> Result<Option<Calibration>> {
        extract_calibration(
            &self.metadata,
            self.frame_count(),
            self.geometry.width as usize,
        )
    }
}

/// Reads SIF files.
///
/// Decodes the header, plans the tiles and, on request, reads the frames.
#[derive(Debug, Clone)]
pub struct SifReader {
    fail_level: log::Level,
    ignore_corrupt: bool,
}

impl Default for SifReader {
    fn default() -> Self {
        Self {
            fail_level: log::Level::Error,
            ignore_corrupt: false,
        }
    }
}

impl SifReader {
    /// Sets the failure level for validation errors.
    ///
    /// - `log::Level::Error`: Only fail on Error level messages (default)
    /// - `log::Level::Warn`: Fail on Warning level and above (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }

    /// Returns the frames present instead of failing when the payload is
    /// shorter than the header declares.
    pub fn set_ignore_corrupt(&mut self, ignore: bool) {
        self.ignore_corrupt = ignore;
    }

    /// Decodes the header of `stream`, starting at its current position.
    ///
    /// The stream stays owned by the caller.
    pub fn open<R: Read + Seek>(&self, stream: &mut R) -> Result<SifFile> {
        let mut reader = TokenReader::new(stream)?;
        let header = HeaderDecoder::new(&mut reader).decode()?;
        let geometry = Geometry::from_subimages(&header.subimages, self.fail_level)?;

        SifFile::from_header(header, geometry)
    }

    pub fn open_path(&self, path: &Path) -> Result<SifFile> {
        let mut file = open_file(path)?;
        self.open(&mut file)
    }

    /// Reads every tile of `sif` from `stream`.
    pub fn read_frames<R: Read + Seek>(
        &self,
        stream: &mut R,
        sif: &SifFile,
    ) -> Result<FrameStack<f32>> {
        read_tiles(stream, &sif.tiles, sif.plane_shape(), self.ignore_corrupt)
    }

    /// Opens `path`, decodes it and reads all frames.
    pub fn load_path(&self, path: &Path) -> Result<(SifFile, FrameStack<f32>)> {
        let mut file = open_file(path)?;
        let sif = self.open(&mut file)?;
        let frames = self.read_frames(&mut file, &sif)?;
        Ok((sif, frames))
    }
}

fn open_file(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::utils::errors::{GeometryError, HeaderError, PayloadError};
    use crate::utils::fixture::{SifFixture, Stray};

    #[test]
    fn test_single_frame() -> Result<()> {
        let fixture = SifFixture::default();
        let mut stream = Cursor::new(fixture.to_bytes());

        let reader = SifReader::default();
        let sif = reader.open(&mut stream)?;

        assert_eq!(sif.frame_count(), 1);
        assert_eq!(sif.tiles.len(), 1);
        assert_eq!(sif.plane_shape(), (8, 4));
        assert_eq!(sif.tiles[0].offset, fixture.header_bytes().len() as u64);

        let frames = reader.read_frames(&mut stream, &sif)?;
        assert_eq!(frames.shape(), [1, 4, 8]);
        assert_eq!(frames.get(0, 1, 2), Some(&SifFixture::pixel(0, 10)));

        Ok(())
    }

    #[test]
    fn test_multi_frame_with_subimages() -> Result<()> {
        let fixture = SifFixture {
            version: 65567,
            frames: 4,
            stray: Stray::ZeroOne,
            subimages: vec![[1, 2, 16, 1, 1, 2], [1, 4, 16, 3, 1, 2], [1, 6, 16, 5, 1, 2]],
            ..Default::default()
        };
        let mut stream = Cursor::new(fixture.to_bytes());

        let reader = SifReader::default();
        let sif = reader.open(&mut stream)?;
        assert_eq!(sif.plane_shape(), (8, 6));

        let step = 8 * 6 * 4;
        assert!(sif.tiles.windows(2).all(|w| w[1].offset - w[0].offset == step));

        let frames = reader.read_frames(&mut stream, &sif)?;
        assert_eq!(frames.shape(), [4, 6, 8]);
        assert_eq!(frames.get(3, 5, 7), Some(&SifFixture::pixel(3, 47)));

        Ok(())
    }

    #[test]
    fn test_corrupt_payload() -> Result<()> {
        let fixture = SifFixture {
            frames: 5,
            payload_frames: Some(3),
            ..Default::default()
        };
        let mut stream = Cursor::new(fixture.to_bytes());

        let mut reader = SifReader::default();
        let sif = reader.open(&mut stream)?;
        let err = reader.read_frames(&mut stream, &sif).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PayloadError>(),
            Some(PayloadError::CorruptPayload { expected: 5, found: 3 })
        ));

        reader.set_ignore_corrupt(true);
        let frames = reader.read_frames(&mut stream, &sif)?;
        assert_eq!(frames.shape(), [3, 4, 8]);
        assert_eq!(frames.declared_frames, 5);

        Ok(())
    }

    #[test]
    fn test_strict_mode_rejects_incongruent_subimages() -> Result<()> {
        let fixture = SifFixture {
            subimages: vec![[1, 2, 8, 1, 1, 1], [1, 6, 8, 3, 1, 1]],
            ..Default::default()
        };
        let bytes = fixture.to_bytes();

        SifReader::default().open(&mut Cursor::new(&bytes))?;

        let mut strict = SifReader::default();
        strict.set_fail_level(log::Level::Warn);
        let err = strict.open(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GeometryError>(),
            Some(GeometryError::IncongruentSubimages { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_not_a_sif_file() {
        let err = SifReader::default()
            .open(&mut Cursor::new(b"GIF89a".to_vec()))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeaderError>(),
            Some(HeaderError::NotASifFile { .. })
        ));
    }

    #[test]
    fn test_calibration_and_timestamps() -> Result<()> {
        let fixture = SifFixture {
            frames: 3,
            calibration_line: "10 2 0 0".to_string(),
            timestamps: Some(vec![4_294_000_000, 4_294_967_000, 1_000]),
            ..Default::default()
        };
        let sif = SifReader::default().open(&mut Cursor::new(fixture.to_bytes()))?;

        assert_eq!(
            sif.calibration()?,
            Some(Calibration::Shared(
                (1..=8).map(|x| 10.0 + 2.0 * x as f64).collect()
            ))
        );

        let seconds = sif.timestamps_seconds();
        assert!(seconds.windows(2).all(|w| w[0] < w[1]));

        Ok(())
    }

    #[test]
    fn test_load_path() -> Result<()> {
        let fixture = SifFixture {
            frames: 2,
            ..Default::default()
        };
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sample.sif");
        std::fs::write(&path, fixture.to_bytes())?;

        let (sif, frames) = SifReader::default().load_path(&path)?;
        assert_eq!(sif.frame_count(), 2);
        assert_eq!(frames.frame(1).map(|f| f[0]), Some(SifFixture::pixel(1, 0)));

        Ok(())
    }

    #[test]
    fn test_missing_file_is_named() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("absent.sif");

        let err = SifReader::default().open_path(&path).unwrap_err();
        assert!(format!("{err:#}").contains("absent.sif"));

        let err = SifReader::default().load_path(&path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to open"));
        assert!(err.downcast_ref::<std::io::Error>().is_some());

        Ok(())
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let fixture = SifFixture {
            subimages: vec![[1, 1 << 62, 1, 1, 1, 1], [1, 1 << 62, 1, 1, 1, 1]],
            ..Default::default()
        };

        let err = SifReader::default()
            .open(&mut Cursor::new(fixture.header_bytes()))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GeometryError>(),
            Some(GeometryError::SizeOverflow(_))
        ));
    }
}
