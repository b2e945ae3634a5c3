//! Spooled acquisitions.
//!
//! A spool directory holds one `.ini` descriptor, one `.sifx` header and
//! one `*spool.dat` file per frame. The acquisition software writes the
//! frame index into the file name least significant digit first, so files
//! are ordered by the reversed digits of their name.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, trace, warn};

use crate::log_or_err;
use crate::process::header::{Header, HeaderDecoder, KEY_DETECTOR_DIMENSIONS};
use crate::process::payload::FrameStack;
use crate::structs::encoding::{AlignedPixel, PixelEncoding, decode_aligned};
use crate::structs::metadata::Value;
use crate::structs::spool_ini::SpoolDescriptor;
use crate::utils::errors::SpoolError;
use crate::utils::token_io::TokenReader;

pub const DESCRIPTOR_PATTERN: &str = "*.ini";
pub const HEADER_PATTERN: &str = "*.sifx";
pub const PAYLOAD_PATTERN: &str = "*spool.dat";

const PAYLOAD_SUFFIX: &str = "spool.dat";

/// Decoded spool frames in their native integer width.
#[derive(Debug, Clone, PartialEq)]
pub enum SpoolFrames {
    Mono16(FrameStack<u16>),
    Mono32(FrameStack<u32>),
}

impl SpoolFrames {
    pub fn shape(&self) -> [usize; 3] {
        match self {
            SpoolFrames::Mono16(stack) => stack.shape(),
            SpoolFrames::Mono32(stack) => stack.shape(),
        }
    }

    pub fn declared_frames(&self) -> usize {
        match self {
            SpoolFrames::Mono16(stack) => stack.declared_frames,
            SpoolFrames::Mono32(stack) => stack.declared_frames,
        }
    }

    pub fn encoding(&self) -> PixelEncoding {
        match self {
            SpoolFrames::Mono16(_) => PixelEncoding::Mono16,
            SpoolFrames::Mono32(_) => PixelEncoding::Mono32,
        }
    }
}

/// A discovered spool directory, before any pixel is read.
#[derive(Debug, Clone)]
pub struct SpoolAcquisition {
    pub dir: PathBuf,
    pub descriptor: SpoolDescriptor,
    pub header: Header,
    /// Payload files in frame order.
    pub payload_files: Vec<PathBuf>,
}

impl SpoolAcquisition {
    pub fn frame_count(&self) -> usize {
        self.header.frame_count
    }

    /// `(width, height)` of one frame after stride padding is dropped.
    pub fn frame_shape(&self) -> (usize, usize) {
        (self.descriptor.width, self.descriptor.height)
    }
}

/// Frame index encoded in a payload file name.
pub fn spool_order_key(path: &Path) -> Result<u64> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let digits: String = name.chars().filter(char::is_ascii_digit).rev().collect();

    match digits.parse() {
        Ok(key) => Ok(key),
        Err(_) => bail!(SpoolError::UnorderedPayload {
            path: path.to_path_buf(),
        }),
    }
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn single_file(
    dir: &Path,
    paths: &[PathBuf],
    pattern: &'static str,
    ext: &str,
) -> Result<PathBuf> {
    let matches: Vec<_> = paths.iter().filter(|p| has_extension(p, ext)).collect();

    match matches.as_slice() {
        [] => bail!(SpoolError::MissingFile {
            pattern,
            dir: dir.to_path_buf(),
        }),
        [path] => Ok(path.to_path_buf()),
        _ => bail!(SpoolError::AmbiguousFile {
            pattern,
            dir: dir.to_path_buf(),
            count: matches.len(),
        }),
    }
}

fn read_header(path: &Path) -> Result<Header> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let file = BufReader::new(file);
    let mut reader = TokenReader::new(file)?;
    HeaderDecoder::new(&mut reader).decode()
}

/// Reads spool directories.
///
/// Configuration follows the same pattern as [`crate::process::reader::SifReader`]:
/// construct with `Default` and adjust with setters.
#[derive(Debug, Clone)]
pub struct SpoolReader {
    fail_level: log::Level,
    ignore_missing: bool,
    ignore_corrupt: bool,
}

impl Default for SpoolReader {
    fn default() -> Self {
        Self {
            fail_level: log::Level::Error,
            ignore_missing: false,
            ignore_corrupt: false,
        }
    }
}

impl SpoolReader {
    /// Sets the failure level for validation errors.
    ///
    /// - `log::Level::Error`: Only fail on Error level messages (default)
    /// - `log::Level::Warn`: Fail on Warning level and above (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }

    /// Tolerates fewer payload files than declared frames.
    pub fn set_ignore_missing(&mut self, ignore: bool) {
        self.ignore_missing = ignore;
    }

    /// Tolerates payload files shorter than one frame.
    pub fn set_ignore_corrupt(&mut self, ignore: bool) {
        self.ignore_corrupt = ignore;
    }

    /// Locates and decodes the descriptor and header of a spool directory.
    pub fn open(&self, dir: &Path) -> Result<SpoolAcquisition> {
        let paths = list_dir(dir)?;

        let ini = single_file(dir, &paths, DESCRIPTOR_PATTERN, "ini")?;
        let sifx = single_file(dir, &paths, HEADER_PATTERN, "sifx")?;

        let mut payload_files = Vec::new();
        for path in paths.iter().filter(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(PAYLOAD_SUFFIX))
        }) {
            payload_files.push((spool_order_key(path)?, path.clone()));
        }

        if payload_files.is_empty() {
            bail!(SpoolError::MissingFile {
                pattern: PAYLOAD_PATTERN,
                dir: dir.to_path_buf(),
            });
        }

        payload_files.sort();
        let payload_files: Vec<_> = payload_files.into_iter().map(|(_, p)| p).collect();
        debug!(
            "Spool directory {}: {} payload file(s)",
            dir.display(),
            payload_files.len()
        );

        let descriptor = SpoolDescriptor::from_path(&ini)?;
        let header = read_header(&sifx)?;

        if let Some(Value::IntPair(detector_width, detector_height)) =
            header.metadata.get(KEY_DETECTOR_DIMENSIONS)
        {
            if descriptor.width as i64 > *detector_width
                || descriptor.height as i64 > *detector_height
            {
                log_or_err!(
                    self.fail_level,
                    log::Level::Warn,
                    SpoolError::AoiExceedsDetector {
                        width: descriptor.width,
                        height: descriptor.height,
                        detector_width: *detector_width,
                        detector_height: *detector_height,
                    }
                );
            }
        }

        Ok(SpoolAcquisition {
            dir: dir.to_path_buf(),
            descriptor,
            header,
            payload_files,
        })
    }

    /// Decodes the pixel data of an opened acquisition.
    pub fn read_frames(&self, acquisition: &SpoolAcquisition) -> Result<SpoolFrames> {
        let descriptor = &acquisition.descriptor;

        match descriptor.encoding {
            PixelEncoding::Mono16 => Ok(SpoolFrames::Mono16(self.read_aligned(acquisition)?)),
            PixelEncoding::Mono32 => Ok(SpoolFrames::Mono32(self.read_aligned(acquisition)?)),
            other => bail!(SpoolError::UnsupportedEncoding(other.to_string())),
        }
    }

    /// Opens `dir` and decodes all of its frames.
    pub fn load(&self, dir: &Path) -> Result<(SpoolAcquisition, SpoolFrames)> {
        let acquisition = self.open(dir)?;
        let frames = self.read_frames(&acquisition)?;
        Ok((acquisition, frames))
    }

    fn frame_files<'a>(&self, acquisition: &'a SpoolAcquisition) -> Result<&'a [PathBuf]> {
        let expected = acquisition.frame_count();
        let found = acquisition.payload_files.len();

        if found < expected {
            let err = SpoolError::FrameCountMismatch { expected, found };
            if !self.ignore_missing {
                bail!(err);
            }
            warn!("{err}");
        } else if found > expected {
            warn!("{found} spool files found, only the first {expected} are frames");
        }

        Ok(&acquisition.payload_files[..found.min(expected)])
    }

    fn read_aligned<T: AlignedPixel>(
        &self,
        acquisition: &SpoolAcquisition,
    ) -> Result<FrameStack<T>> {
        let descriptor = &acquisition.descriptor;
        let frame_bytes = descriptor.frame_bytes();
        let mut data = Vec::new();
        let mut frames = 0;

        for path in self.frame_files(acquisition)? {
            let bytes =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

            if bytes.len() < frame_bytes {
                let err = SpoolError::CorruptPayload {
                    path: path.clone(),
                    expected: frame_bytes,
                    found: bytes.len(),
                };
                if !self.ignore_corrupt {
                    bail!(err);
                }
                warn!("{err}");
                break;
            }

            trace!("Frame {frames} from {}", path.display());
            decode_aligned(
                &bytes[..frame_bytes],
                descriptor.stride,
                descriptor.width,
                descriptor.height,
                &mut data,
            )?;
            frames += 1;
        }

        Ok(FrameStack {
            data,
            frames,
            height: descriptor.height,
            width: descriptor.width,
            declared_frames: acquisition.frame_count(),
        })
    }
}
