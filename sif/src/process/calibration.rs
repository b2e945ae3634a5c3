//! Calibration polynomial extraction.
//!
//! A shared polynomial sits on the calibration line of the header as
//! blank-separated coefficients. Multi-frame acquisitions may instead put
//! one `Calibration data for frame N: c0,c1,...` line per frame at the start
//! of the user text. Coefficient `i` multiplies `x^i`, with `x` the 1-based
//! pixel index.

use anyhow::{Result, bail};
use log::debug;

use crate::process::header::{KEY_CALIBRATION_DATA, KEY_DETECTOR_DIMENSIONS, KEY_USER_TEXT};
use crate::structs::metadata::{Metadata, Value};
use crate::utils::errors::CalibrationError;

pub const PER_FRAME_MARKER: &[u8] = b"Calibration data for frame";

/// Prefix of per-frame coefficient lists stored as float lists.
pub const KEY_PER_FRAME_PREFIX: &str = "Calibration_data_for_frame_";

#[derive(Debug, Clone, PartialEq)]
pub enum Coefficients {
    Shared(Vec<f64>),
    PerFrame(Vec<Vec<f64>>),
}

/// Evaluated calibration, one value per pixel column.
#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    /// `[width]`
    Shared(Vec<f64>),
    /// `[frames, width]`, row-major.
    PerFrame {
        frames: usize,
        width: usize,
        values: Vec<f64>,
    },
}

impl Calibration {
    pub fn width(&self) -> usize {
        match self {
            Calibration::Shared(values) => values.len(),
            Calibration::PerFrame { width, .. } => *width,
        }
    }

    /// Values for `frame`; a shared calibration applies to every frame.
    pub fn frame(&self, frame: usize) -> Option<&[f64]> {
        match self {
            Calibration::Shared(values) => Some(values.as_slice()),
            Calibration::PerFrame {
                frames,
                width,
                values,
            } => (frame < *frames).then(|| &values[frame * width..(frame + 1) * width]),
        }
    }
}

/// Evaluates `Σ coeffs[i] * x^i` for `x` in `1..=width`.
pub fn evaluate(coeffs: &[f64], width: usize) -> Vec<f64> {
    (1..=width)
        .map(|x| {
            let x = x as f64;
            coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
        })
        .collect()
}

fn parse_shared(line: &[u8]) -> Option<Vec<f64>> {
    let text = std::str::from_utf8(line).ok()?;
    let coeffs = text
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<Vec<f64>, _>>()
        .ok()?;

    (!coeffs.is_empty()).then_some(coeffs)
}

fn parse_per_frame(user_text: &[u8], frames: usize) -> Result<Vec<Vec<f64>>> {
    let text = String::from_utf8_lossy(user_text);
    let mut lines = text.lines();
    let mut coeffs = Vec::with_capacity(frames);

    for frame in 0..frames {
        let Some(line) = lines.next() else {
            bail!(CalibrationError::MissingFrame { frame });
        };

        let malformed = || CalibrationError::MalformedCoefficients {
            frame,
            line: line.to_string(),
        };

        let Some((_, list)) = line.split_once(':') else {
            bail!(malformed());
        };

        let values = list
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| malformed())?;

        if values.is_empty() {
            bail!(malformed());
        }

        coeffs.push(values);
    }

    Ok(coeffs)
}

/// Finds the calibration coefficients in `metadata`.
///
/// Returns `None` when the file carries no usable calibration.
pub fn extract_coefficients(metadata: &Metadata, frames: usize) -> Result<Option<Coefficients>> {
    if let Some(Value::FloatList(_)) = metadata.get(&format!("{KEY_PER_FRAME_PREFIX}1")) {
        let coeffs = (1..=frames)
            .map(|f| match metadata.get(&format!("{KEY_PER_FRAME_PREFIX}{f}")) {
                Some(Value::FloatList(c)) => Ok(c.clone()),
                _ => Err(CalibrationError::MissingFrame { frame: f - 1 }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Some(Coefficients::PerFrame(coeffs)));
    }

    if let Some(user_text) = metadata.get_bytes(KEY_USER_TEXT) {
        if user_text.starts_with(PER_FRAME_MARKER) {
            debug!("Per-frame calibration for {frames} frame(s) in user text");
            return Ok(Some(Coefficients::PerFrame(parse_per_frame(
                user_text, frames,
            )?)));
        }
    }

    let shared = match metadata.get(KEY_CALIBRATION_DATA) {
        Some(Value::FloatList(c)) if !c.is_empty() => Some(c.clone()),
        Some(Value::Bytes(line)) => parse_shared(line),
        _ => None,
    };

    if shared.is_none() {
        debug!("No usable calibration data");
    }

    Ok(shared.map(Coefficients::Shared))
}

/// Extracts and evaluates the calibration over `1..=width`.
pub fn extract_calibration(
    metadata: &Metadata,
    frames: usize,
    width: usize,
) -> Result<Option<Calibration>> {
    let calibration = match extract_coefficients(metadata, frames)? {
        None => None,
        Some(Coefficients::Shared(coeffs)) => Some(Calibration::Shared(evaluate(&coeffs, width))),
        Some(Coefficients::PerFrame(per_frame)) => Some(Calibration::PerFrame {
            frames: per_frame.len(),
            width,
            values: per_frame
                .iter()
                .flat_map(|coeffs| evaluate(coeffs, width))
                .collect(),
        }),
    };

    Ok(calibration)
}

/// Plane width as far as it can be told from metadata alone.
pub fn metadata_width(metadata: &Metadata) -> Option<usize> {
    match metadata.get(KEY_DETECTOR_DIMENSIONS) {
        Some(Value::IntPair(width, _)) => usize::try_from(*width).ok(),
        _ => None,
    }
}
