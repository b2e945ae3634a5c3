use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use indicatif::MultiProgress;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::command::{Cli, InfoArgs, InfoFormat};
use super::progress::create_spinner;
use crate::timestamp::time_str;
use sif::process::reader::{SifFile, SifReader};
use sif::process::spool::{SpoolAcquisition, SpoolReader};
use sif::structs::metadata::{Metadata, Value};

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing {}", args.input.display());

    let pb = match multi {
        Some(multi) => Some(create_spinner(multi, "Reading header...")?),
        None => None,
    };

    let report = analyze(&args.input, cli.fail_level())?;

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    let mut out = io::stdout().lock();
    match args.format {
        InfoFormat::Text => write_text(&report, &mut out)?,
        InfoFormat::Yaml => write!(out, "{}", serde_yaml_ng::to_string(&report)?)?,
    }

    Ok(())
}

/// Opens a `.sif` file or, for a directory, a spool acquisition.
pub fn analyze(input: &Path, fail_level: log::Level) -> Result<Report> {
    if input.is_dir() {
        let mut reader = SpoolReader::default();
        reader.set_fail_level(fail_level);
        let acquisition = reader.open(input)?;
        Ok(Report::Spool(SpoolReport::new(&acquisition)))
    } else {
        let mut reader = SifReader::default();
        reader.set_fail_level(fail_level);
        let sif = reader.open_path(input)?;
        Ok(Report::Sif(SifReport::new(input, &sif)?))
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Report {
    Sif(SifReport),
    Spool(SpoolReport),
}

#[derive(Debug, Serialize)]
pub struct SifReport {
    path: String,
    sif_version: i64,
    frames: usize,
    width: u64,
    height: u64,
    subimages: Vec<[i64; 6]>,
    data_offset: u64,
    tiles: Vec<TileReport>,
    timestamps: Vec<f64>,
    calibrated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration_error: Option<String>,
    metadata: MetadataMap,
}

#[derive(Debug, Serialize)]
struct TileReport {
    offset: u64,
    bytes: u64,
}

impl SifReport {
    fn new(path: &Path, sif: &SifFile) -> Result<Self> {
        let (width, height) = sif.plane_shape();

        // a broken calibration is reported, the rest of the file is still valid
        let (calibrated, calibration_error) = match sif.calibration() {
            Ok(calibration) => (calibration.is_some(), None),
            Err(err) => {
                log::warn!("{}: {err}", path.display());
                (false, Some(err.to_string()))
            }
        };

        Ok(Self {
            path: path.display().to_string(),
            sif_version: sif.version.0,
            frames: sif.frame_count(),
            width,
            height,
            subimages: sif.subimages.iter().map(|s| s.coordinates()).collect(),
            data_offset: sif.data_offset,
            tiles: sif
                .tiles
                .iter()
                .map(|t| TileReport {
                    offset: t.offset,
                    bytes: t.byte_len(),
                })
                .collect(),
            timestamps: sif.timestamps_seconds(),
            calibrated,
            calibration_error,
            metadata: MetadataMap(sif.metadata.clone()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SpoolReport {
    path: String,
    encoding: String,
    frames: usize,
    width: usize,
    height: usize,
    stride: usize,
    payload_files: usize,
    #[serde(serialize_with = "serialize_pairs")]
    descriptor: Vec<(String, String)>,
    metadata: MetadataMap,
}

impl SpoolReport {
    fn new(acquisition: &SpoolAcquisition) -> Self {
        let (width, height) = acquisition.frame_shape();

        Self {
            path: acquisition.dir.display().to_string(),
            encoding: acquisition.descriptor.encoding.to_string(),
            frames: acquisition.frame_count(),
            width,
            height,
            stride: acquisition.descriptor.stride,
            payload_files: acquisition.payload_files.len(),
            descriptor: acquisition
                .descriptor
                .entries()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            metadata: MetadataMap(acquisition.header.metadata.clone()),
        }
    }
}

fn serialize_pairs<S>(pairs: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(pairs.iter().map(|(k, v)| (k, v)))
}

/// Header metadata as a map in read order.
#[derive(Debug)]
struct MetadataMap(Metadata);

impl Serialize for MetadataMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0.iter() {
            map.serialize_entry(key, &ValueRef(value))?;
        }
        map.end()
    }
}

struct ValueRef<'a>(&'a Value);

impl Serialize for ValueRef<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0 {
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::UInt(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bytes(v) => serializer.collect_str(&String::from_utf8_lossy(v)),
            Value::IntPair(a, b) => [a, b].serialize(serializer),
            Value::FloatPair(a, b) => [a, b].serialize(serializer),
            Value::UIntList(v) => v.serialize(serializer),
            Value::FloatList(v) => v.serialize(serializer),
        }
    }
}

/// Printable form of a metadata value; byte strings are shown lossily.
fn display_value(value: &Value) -> String {
    match value {
        Value::Bytes(v) => String::from_utf8_lossy(v).trim_end().to_string(),
        other => other.to_string(),
    }
}

pub fn write_text<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    match report {
        Report::Sif(sif) => write_sif_text(sif, out),
        Report::Spool(spool) => write_spool_text(spool, out),
    }
}

fn write_sif_text<W: Write>(report: &SifReport, out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "SIF File Information")?;
    writeln!(out, "====================")?;
    writeln!(out)?;
    writeln!(out, "  File                      {}", report.path)?;
    writeln!(out, "  SIF version               {}", report.sif_version)?;
    writeln!(out, "  Frames                    {}", report.frames)?;
    writeln!(out, "  Plane                     {}x{}", report.width, report.height)?;
    writeln!(out, "  Subimages                 {}", report.subimages.len())?;
    writeln!(out, "  Data offset               {}", report.data_offset)?;
    writeln!(out, "  Calibrated                {}", report.calibrated)?;
    if let Some(err) = &report.calibration_error {
        writeln!(out, "  Calibration error         {err}")?;
    }
    writeln!(out)?;

    writeln!(out, "Subimages (x0 y1 x1 y0 ybin xbin)")?;
    for (index, [x0, y1, x1, y0, ybin, xbin]) in report.subimages.iter().enumerate() {
        writeln!(out, "  {index:<4}  {x0} {y1} {x1} {y0} {ybin} {xbin}")?;
    }
    writeln!(out)?;

    writeln!(out, "Frames")?;
    for (index, tile) in report.tiles.iter().enumerate() {
        let time = report
            .timestamps
            .get(index)
            .map(|&s| time_str(s))
            .unwrap_or_default();
        writeln!(
            out,
            "  {index:<6}  offset {:<12}  {:>8} bytes  {time}",
            tile.offset, tile.bytes
        )?;
    }
    writeln!(out)?;

    write_metadata_text(&report.metadata.0, out)
}

fn write_spool_text<W: Write>(report: &SpoolReport, out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Spool Acquisition Information")?;
    writeln!(out, "=============================")?;
    writeln!(out)?;
    writeln!(out, "  Directory                 {}", report.path)?;
    writeln!(out, "  Pixel encoding            {}", report.encoding)?;
    writeln!(out, "  Frames                    {}", report.frames)?;
    writeln!(out, "  Frame shape               {}x{}", report.width, report.height)?;
    writeln!(out, "  Row stride                {} bytes", report.stride)?;
    writeln!(out, "  Payload files             {}", report.payload_files)?;
    writeln!(out)?;

    writeln!(out, "Descriptor")?;
    for (key, value) in &report.descriptor {
        writeln!(out, "  {key:<26}{value}")?;
    }
    writeln!(out)?;

    write_metadata_text(&report.metadata.0, out)
}

fn write_metadata_text<W: Write>(metadata: &Metadata, out: &mut W) -> io::Result<()> {
    writeln!(out, "Metadata")?;
    for (key, value) in metadata.iter() {
        writeln!(out, "  {key:<26}{}", display_value(value))?;
    }
    writeln!(out)
}
