//! Header decoding.
//!
//! The header is a fixed sequence of reads whose only branches are the
//! version-dependent opaque lines, the calibration sub-version and the
//! stray terminator after the timestamps. Each section is a table of
//! [`ReadStep`]s; opaque fields are named so failures can point at them.

use std::io::{Read as IoRead, Seek};

use anyhow::{Result, bail};
use log::{debug, trace};

use crate::structs::metadata::{Metadata, Value};
use crate::structs::subimage::Subimage;
use crate::structs::user_text::scan_instrument_parameters;
use crate::structs::version::{CALIBRATION_EXTRA_LINE_VERSION, SifVersion};
use crate::utils::errors::{HeaderError, TokenError};
use crate::utils::token_io::{TokenReader, parse_number};

/// Leading bytes of every SIF file.
pub const MAGIC: &[u8; 36] = b"Andor Technology Multi-Channel File\n";

pub const KEY_SIF_VERSION: &str = "SifVersion";
pub const KEY_DETECTOR_DIMENSIONS: &str = "DetectorDimensions";
pub const KEY_USER_TEXT: &str = "UserText";
pub const KEY_CALIBRATION_VERSION: &str = "SifCalbVersion";
pub const KEY_CALIBRATION_DATA: &str = "Calibration_data";
pub const KEY_NUMBER_OF_FRAMES: &str = "NumberOfFrames";
pub const KEY_NUMBER_OF_SUBIMAGES: &str = "NumberOfSubImages";
pub const KEY_TIMESTAMPS: &str = "Timestamps";

/// Primitive read performed by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Read {
    /// Space-delimited token, kept as bytes.
    Token,
    Int,
    /// Non-negative integer; a sign is malformed.
    UInt,
    Float,
    /// Newline-terminated line.
    Line,
    /// Remainder of the current line, leading blanks skipped.
    RestOfLine,
    Bytes(usize),
    /// Length line followed by that many bytes.
    Prefixed,
    IntPair,
    FloatPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStep {
    /// Field whose meaning is unknown; read and discarded.
    Skip(&'static str, Read),
    /// Field stored in the metadata under its name.
    Field(&'static str, Read),
}

use Read::*;
use ReadStep::{Field, Skip};

/// From the line after the magic up to the shutter times.
pub const PREAMBLE: &[ReadStep] = &[
    Skip("format_line", Line),
    Field(KEY_SIF_VERSION, Int),
    Skip("preamble_token_1", Token),
    Skip("preamble_token_2", Token),
    Skip("preamble_token_3", Token),
    Field("ExperimentTime", Int),
    Field("DetectorTemperature", Float),
    Skip("temperature_padding", Bytes(10)),
    Skip("pre_exposure_token", Token),
    Field("ExposureTime", Float),
    Field("CycleTime", Float),
    Field("AccumulatedCycleTime", Float),
    Field("AccumulatedCycles", Int),
    Skip("cycles_nul", Bytes(1)),
    Skip("cycles_padding", Bytes(1)),
    Field("StackCycleTime", Float),
    Field("PixelReadoutTime", Float),
    Skip("pre_gain_token_1", Token),
    Skip("pre_gain_token_2", Token),
    Field("GainDAC", Float),
    Skip("acquisition_tail", RestOfLine),
    Field("DetectorType", Line),
    Field(KEY_DETECTOR_DIMENSIONS, IntPair),
    Field("OriginalFilename", Prefixed),
    Skip("filename_padding", Bytes(2)),
    Skip("user_text_tag", Token),
    Field(KEY_USER_TEXT, Prefixed),
    Skip("user_text_padding", Bytes(1)),
    Skip("shutter_tag", Int),
    Skip("shutter_flags", Bytes(8)),
    Field("ShutterTime", FloatPair),
];

/// From the lines after the calibration to the frame counters.
pub const AXES: &[ReadStep] = &[
    Skip("calibration_tail_1", Line),
    Skip("calibration_tail_2", Line),
    Skip("calibration_tail_3", Line),
    // 422 or 433 in known files
    Skip("axis_marker", Line),
    Skip("axis_preamble_1", Line),
    Skip("axis_preamble_2", Line),
    Field("FrameAxis", Prefixed),
    Field("DataType", Prefixed),
    Field("ImageAxis", Prefixed),
    Skip("image_tag", Token),
    Skip("image_rect_0", Token),
    Skip("image_rect_1", Token),
    Skip("image_rect_2", Token),
    Skip("image_rect_3", Token),
    Field(KEY_NUMBER_OF_FRAMES, UInt),
    Field(KEY_NUMBER_OF_SUBIMAGES, UInt),
    Field("TotalLength", UInt),
    Field("ImageLength", UInt),
];

impl ReadStep {
    pub fn name(&self) -> &'static str {
        match self {
            Skip(name, _) | Field(name, _) => name,
        }
    }

    pub fn read(&self) -> Read {
        match self {
            Skip(_, read) | Field(_, read) => *read,
        }
    }

    /// Performs the read and stores named fields in `metadata`.
    pub fn apply<R: IoRead + Seek>(
        &self,
        reader: &mut TokenReader<R>,
        metadata: &mut Metadata,
    ) -> Result<(), HeaderError> {
        let position = reader.position();
        let value = read_value(reader, self.read()).map_err(|source| HeaderError::Decode {
            field: self.name(),
            position,
            source,
        })?;

        match self {
            Field(name, _) => {
                trace!("{name} @ {position}: {value}");
                metadata.insert(*name, value);
            }
            Skip(name, _) => trace!("Skipped {name} @ {position}: {value}"),
        }

        Ok(())
    }
}

fn read_value<R: IoRead + Seek>(
    reader: &mut TokenReader<R>,
    read: Read,
) -> Result<Value, TokenError> {
    let value = match read {
        Token => Value::Bytes(reader.read_token()?),
        Int => Value::Int(reader.read_int()?),
        UInt => Value::UInt(reader.read_int()?),
        Float => Value::Float(reader.read_float()?),
        Line => Value::Bytes(reader.read_line()?),
        RestOfLine => Value::Bytes(reader.read_delimited(b'\n')?),
        Bytes(n) => Value::Bytes(reader.read_exact(n)?),
        Prefixed => Value::Bytes(reader.read_prefixed()?),
        IntPair => Value::IntPair(reader.read_int()?, reader.read_int()?),
        FloatPair => Value::FloatPair(reader.read_float()?, reader.read_float()?),
    };

    Ok(value)
}

/// Everything decoded up to the first pixel.
#[derive(Debug, Clone)]
pub struct Header {
    pub metadata: Metadata,
    pub version: SifVersion,
    pub frame_count: usize,
    pub subimages: Vec<Subimage>,
    /// Absolute offset of the first pixel byte.
    pub data_offset: u64,
}

impl Header {
    /// Raw per-frame timestamps in microseconds.
    pub fn timestamps(&self) -> &[u64] {
        match self.metadata.get(KEY_TIMESTAMPS) {
            Some(Value::UIntList(ts)) => ts,
            _ => &[],
        }
    }
}

/// Decodes a SIF header from a token reader.
///
/// Metadata is only handed out once the whole header decoded, so a failure
/// at any step leaves nothing partially filled.
pub struct HeaderDecoder<'a, R: IoRead + Seek> {
    reader: &'a mut TokenReader<R>,
    metadata: Metadata,
}

impl<'a, R> HeaderDecoder<'a, R>
where
    R: IoRead + Seek,
{
    pub fn new(reader: &'a mut TokenReader<R>) -> Self {
        Self {
            reader,
            metadata: Metadata::new(),
        }
    }

    pub fn decode(mut self) -> Result<Header> {
        self.check_magic()?;
        self.run(PREAMBLE)?;

        let version = SifVersion(self.int(KEY_SIF_VERSION));
        self.skip_version_lines(version)?;
        self.read_calibration()?;
        self.run(AXES)?;

        let frame_count = self.count(KEY_NUMBER_OF_FRAMES);
        let subimage_count = self.count(KEY_NUMBER_OF_SUBIMAGES);

        let subimages = self.read_subimages(subimage_count)?;
        self.read_timestamps(frame_count)?;
        self.consume_stray_terminator(version)?;

        let data_offset = self.reader.position();

        if let Some(user_text) = self.metadata.get_bytes(KEY_USER_TEXT) {
            let user_text = user_text.to_vec();
            scan_instrument_parameters(&user_text, &mut self.metadata);
        }

        debug!(
            "SIF {version}: {frame_count} frame(s), {subimage_count} subimage(s), data at byte {data_offset}"
        );

        Ok(Header {
            metadata: self.metadata,
            version,
            frame_count,
            subimages,
            data_offset,
        })
    }

    fn check_magic(&mut self) -> Result<()> {
        let position = self.reader.position();

        match self.reader.read_exact(MAGIC.len()) {
            Ok(bytes) if bytes == MAGIC => Ok(()),
            Ok(_) | Err(TokenError::TruncatedInput { .. }) => {
                bail!(HeaderError::NotASifFile { position })
            }
            Err(source) => bail!(HeaderError::Decode {
                field: "magic",
                position,
                source,
            }),
        }
    }

    fn run(&mut self, steps: &[ReadStep]) -> Result<()> {
        for step in steps {
            step.apply(self.reader, &mut self.metadata)?;
        }

        Ok(())
    }

    // Both helpers read fields whose step has already succeeded.
    fn int(&self, key: &str) -> i64 {
        self.metadata.get_int(key).unwrap_or_default()
    }

    fn count(&self, key: &str) -> usize {
        match self.metadata.get(key) {
            Some(Value::UInt(v)) => *v as usize,
            _ => 0,
        }
    }

    fn skip_version_lines(&mut self, version: SifVersion) -> Result<()> {
        let lines = version.lines();
        trace!("SifVersion {version}: skipping {} opaque line(s)", lines.skipped);

        for _ in 0..lines.skipped {
            Skip("version_line", Line).apply(self.reader, &mut self.metadata)?;
        }

        if lines.diagnostic {
            let position = self.reader.position();
            let line = self
                .reader
                .read_line()
                .map_err(|source| HeaderError::Decode {
                    field: "version_diagnostic",
                    position,
                    source,
                })?;
            debug!(
                "SifVersion {version} diagnostic line: {:?}",
                String::from_utf8_lossy(&line)
            );
        }

        Ok(())
    }

    fn read_calibration(&mut self) -> Result<()> {
        Field(KEY_CALIBRATION_VERSION, Int).apply(self.reader, &mut self.metadata)?;

        if self.int(KEY_CALIBRATION_VERSION) == CALIBRATION_EXTRA_LINE_VERSION {
            Skip("calibration_extra_line", Line).apply(self.reader, &mut self.metadata)?;
        }

        Field(KEY_CALIBRATION_DATA, Line).apply(self.reader, &mut self.metadata)?;

        Ok(())
    }

    fn read_subimages(&mut self, count: usize) -> Result<Vec<Subimage>> {
        let mut subimages = Vec::new();

        for index in 0..count {
            Skip("subimage_tag", Token).apply(self.reader, &mut self.metadata)?;

            let position = self.reader.position();
            let decode_err = |source| HeaderError::Decode {
                field: "subimage_area",
                position,
                source,
            };

            let line = self.reader.read_line().map_err(decode_err)?;
            let mut coords = [0i64; 6];
            let mut tokens = line
                .split(|b| b.is_ascii_whitespace())
                .filter(|t| !t.is_empty());

            for coord in coords.iter_mut() {
                let token = tokens.next().ok_or_else(|| {
                    decode_err(TokenError::MalformedNumber {
                        token: String::from_utf8_lossy(&line).into_owned(),
                        position,
                    })
                })?;
                *coord = parse_number(token, position).map_err(decode_err)?;
            }

            let subimage = Subimage::from_coordinates(index, coords)?;
            trace!(
                "Subimage {index}: {coords:?} -> {}x{}",
                subimage.width(),
                subimage.height()
            );
            subimages.push(subimage);
        }

        Ok(subimages)
    }

    fn read_timestamps(&mut self, frames: usize) -> Result<()> {
        let mut timestamps = Vec::new();

        for _ in 0..frames {
            let position = self.reader.position();
            let timestamp = self
                .reader
                .read_line()
                .and_then(|line| parse_number::<u64>(&line, position))
                .map_err(|source| HeaderError::Decode {
                    field: KEY_TIMESTAMPS,
                    position,
                    source,
                })?;
            timestamps.push(timestamp);
        }

        self.metadata.insert(KEY_TIMESTAMPS, timestamps);

        Ok(())
    }

    /// Some writers leave a `0` line (and beyond the known dialects a
    /// further `1` line) between the timestamps and the pixels.
    fn consume_stray_terminator(&mut self, version: SifVersion) -> Result<()> {
        if self.peek_sentinel(0)? && version.is_beyond_known() {
            self.peek_sentinel(1)?;
        }

        Ok(())
    }

    /// Consumes the next line if it holds exactly `value`, otherwise
    /// rewinds to where it started.
    fn peek_sentinel(&mut self, value: i64) -> Result<bool, HeaderError> {
        let mark = self.reader.mark();
        let decode_err = |source| HeaderError::Decode {
            field: "stray_terminator",
            position: mark.position(),
            source,
        };

        let matched = match self.reader.read_line() {
            Ok(line) => parse_number::<i64>(&line, mark.position()).ok() == Some(value),
            Err(TokenError::TruncatedInput { .. }) => false,
            Err(source) => return Err(decode_err(source)),
        };

        if matched {
            debug!("Consumed stray `{value}` line at byte {}", mark.position());
        } else {
            self.reader.reset(mark).map_err(decode_err)?;
        }

        Ok(matched)
    }
}
