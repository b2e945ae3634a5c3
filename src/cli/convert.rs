use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use indicatif::MultiProgress;
use log::{info, warn};
use serde::Serialize;

use super::command::{Cli, ConvertArgs};
use super::progress::create_progress_bar;
use crate::input::expand_patterns;
use sif::process::reader::SifReader;

const JOIN_BASENAME: &str = "sif_joined_data";

/// One spectrum: the first row of the first frame against its wavelengths.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub sample: String,
    pub wavelengths: Vec<f64>,
    pub counts: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct Row {
    wavelength: f64,
    counts: i64,
}

pub fn cmd_convert(args: &ConvertArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let paths = expand_patterns(&args.pattern)?;

    if paths.is_empty() {
        println!("No files matched, aborting.");
        std::process::exit(1);
    }

    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    let mut reader = SifReader::default();
    reader.set_fail_level(cli.fail_level());

    convert_files(&paths, &output_dir, args.join, &reader, multi)?;

    Ok(())
}

/// Converts `paths` into CSV files under `output_dir`.
///
/// Returns the files written.
pub fn convert_files(
    paths: &[PathBuf],
    output_dir: &Path,
    join: bool,
    reader: &SifReader,
    multi: Option<&MultiProgress>,
) -> Result<Vec<PathBuf>> {
    if !output_dir.is_dir() {
        return Err(anyhow!(
            "Output directory {} does not exist",
            output_dir.display()
        ));
    }

    info!("Matched {} file(s)", paths.len());

    let pb = match multi {
        Some(multi) => Some(create_progress_bar(multi, paths.len() as u64)?),
        None => None,
    };

    let mut written = Vec::new();
    let mut joined = Vec::new();

    for path in paths {
        info!("Converting {}", path.display());
        if let Some(ref pb) = pb {
            pb.set_message(path.display().to_string());
        }

        let spectrum = read_spectrum(path, reader)?;

        if join {
            joined.push(spectrum);
        } else {
            let out = output_dir.join(format!("{}.csv", spectrum.sample));
            write_spectrum(&out, &spectrum)?;
            written.push(out);
        }

        if let Some(ref pb) = pb {
            pb.inc(1);
        }
    }

    if join {
        info!("Joining data");
        let out = output_dir.join(new_join_filename(output_dir));
        write_joined(&out, &mut joined)?;
        written.push(out);
    }

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    Ok(written)
}

/// Reads the spectrum of a single SIF file.
///
/// Only the first row of the first frame is a spectrum; anything beyond it
/// is reported and left out. Files without calibration are indexed by
/// 1-based pixel number.
pub fn read_spectrum(path: &Path, reader: &SifReader) -> Result<Spectrum> {
    let (sif, frames) = reader.load_path(path)?;

    let Some(first) = frames.frame(0) else {
        return Err(anyhow!("{} contains no frames", path.display()));
    };

    if frames.declared_frames > 1 {
        warn!(
            "{} holds {} frames, converting the first only",
            path.display(),
            frames.declared_frames
        );
    }
    if frames.height > 1 {
        warn!(
            "{} is {} rows high, converting the first row only",
            path.display(),
            frames.height
        );
    }

    let width = frames.width;
    let counts = first[..width].iter().map(|&v| v as i64).collect();

    let wavelengths = match sif.calibration()? {
        Some(calibration) => match calibration.frame(0) {
            Some(values) => values.to_vec(),
            None => return Err(anyhow!("{} has no calibration for frame 0", path.display())),
        },
        None => {
            warn!(
                "{} has no wavelength calibration, using pixel numbers",
                path.display()
            );
            (1..=width).map(|x| x as f64).collect()
        }
    };

    let sample = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Spectrum {
        sample,
        wavelengths,
        counts,
    })
}

/// Writes `wavelength,counts` rows.
pub fn write_spectrum(path: &Path, spectrum: &Spectrum) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    for (&wavelength, &counts) in spectrum.wavelengths.iter().zip(&spectrum.counts) {
        writer.serialize(Row { wavelength, counts })?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes spectra side by side, ordered by sample name.
///
/// The first header row names the sample, the second the column. Shorter
/// spectra are padded with empty cells.
pub fn write_joined(path: &Path, spectra: &mut [Spectrum]) -> Result<()> {
    spectra.sort_by(|a, b| a.sample.cmp(&b.sample));

    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(
        spectra
            .iter()
            .flat_map(|s| [s.sample.as_str(), s.sample.as_str()]),
    )?;
    writer.write_record(spectra.iter().flat_map(|_| ["wavelength", "counts"]))?;

    let rows = spectra
        .iter()
        .map(|s| s.counts.len().min(s.wavelengths.len()))
        .max()
        .unwrap_or(0);

    for row in 0..rows {
        let record = spectra.iter().flat_map(|s| {
            match (s.wavelengths.get(row), s.counts.get(row)) {
                (Some(w), Some(c)) => [format!("{w:?}"), c.to_string()],
                _ => [String::new(), String::new()],
            }
        });
        writer.write_record(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// First of `sif_joined_data.csv`, `sif_joined_data-1.csv`, ... not yet in `dir`.
pub fn new_join_filename(dir: &Path) -> String {
    let name = |i: usize| match i {
        0 => format!("{JOIN_BASENAME}.csv"),
        i => format!("{JOIN_BASENAME}-{i}.csv"),
    };

    let mut i = 0;
    while dir.join(name(i)).exists() {
        i += 1;
    }

    name(i)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use sif::utils::fixture::SifFixture;

    fn write_fixture(dir: &Path, name: &str, fixture: &SifFixture) -> Result<PathBuf> {
        let path = dir.join(name);
        fs::write(&path, fixture.to_bytes())?;
        Ok(path)
    }

    fn linear(offset: u32) -> SifFixture {
        SifFixture {
            calibration_line: format!("{offset} 1 0 0"),
            ..Default::default()
        }
    }

    #[test]
    fn test_read_spectrum() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let fixture = SifFixture {
            detector: (4, 1),
            subimages: vec![[1, 1, 4, 1, 1, 1]],
            calibration_line: "500 2 0 0".to_string(),
            ..Default::default()
        };
        let path = write_fixture(dir.path(), "sample.sif", &fixture)?;

        let spectrum = read_spectrum(&path, &SifReader::default())?;

        assert_eq!(spectrum.sample, "sample");
        assert_eq!(spectrum.wavelengths, vec![502.0, 504.0, 506.0, 508.0]);
        assert_eq!(spectrum.counts, vec![0, 1, 2, 3]);

        Ok(())
    }

    #[test]
    fn test_uncalibrated_uses_pixel_numbers() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let fixture = SifFixture {
            calibration_line: String::new(),
            ..Default::default()
        };
        let path = write_fixture(dir.path(), "raw.sif", &fixture)?;

        let spectrum = read_spectrum(&path, &SifReader::default())?;

        assert_eq!(spectrum.wavelengths, (1..=8).map(f64::from).collect::<Vec<_>>());
        assert_eq!(spectrum.counts.len(), 8);

        Ok(())
    }

    #[test]
    fn test_per_file_output() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        let a = write_fixture(dir.path(), "a.sif", &linear(100))?;
        let b = write_fixture(dir.path(), "b.sif", &linear(200))?;

        let written = convert_files(&[a, b], out.path(), false, &SifReader::default(), None)?;

        assert_eq!(
            written,
            vec![out.path().join("a.csv"), out.path().join("b.csv")]
        );

        let text = fs::read_to_string(out.path().join("b.csv"))?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "wavelength,counts");
        assert_eq!(lines[1], "201.0,0");
        assert_eq!(lines.len(), 9);

        Ok(())
    }

    #[test]
    fn test_joined_output_sorted_by_sample() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = tempfile::tempdir()?;
        let zeta = write_fixture(dir.path(), "zeta.sif", &linear(300))?;
        let alpha = write_fixture(dir.path(), "alpha.sif", &linear(100))?;

        let written = convert_files(
            &[zeta.clone(), alpha.clone()],
            out.path(),
            true,
            &SifReader::default(),
            None,
        )?;
        assert_eq!(written, vec![out.path().join("sif_joined_data.csv")]);

        let text = fs::read_to_string(&written[0])?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "alpha,alpha,zeta,zeta");
        assert_eq!(lines[1], "wavelength,counts,wavelength,counts");
        assert_eq!(lines[2], "101.0,0,301.0,0");
        assert_eq!(lines.len(), 10);

        // existing output is never overwritten
        let written = convert_files(&[zeta, alpha], out.path(), true, &SifReader::default(), None)?;
        assert_eq!(written, vec![out.path().join("sif_joined_data-1.csv")]);

        Ok(())
    }

    #[test]
    fn test_joined_pads_shorter_spectra() -> Result<()> {
        let out = tempfile::tempdir()?;
        let path = out.path().join("joined.csv");
        let mut spectra = vec![
            Spectrum {
                sample: "long".to_string(),
                wavelengths: vec![1.5, 2.5],
                counts: vec![10, 20],
            },
            Spectrum {
                sample: "short".to_string(),
                wavelengths: vec![1.0],
                counts: vec![7],
            },
        ];

        write_joined(&path, &mut spectra)?;

        let text = fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "1.5,10,1.0,7");
        assert_eq!(lines[3], "2.5,20,,");

        Ok(())
    }

    #[test]
    fn test_missing_output_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_fixture(dir.path(), "a.sif", &linear(0))?;

        let err = convert_files(
            &[path],
            &dir.path().join("missing"),
            false,
            &SifReader::default(),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        Ok(())
    }

    #[test]
    fn test_counts_truncate_toward_zero() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let fixture = SifFixture {
            frames: 2,
            ..Default::default()
        };
        let path = write_fixture(dir.path(), "multi.sif", &fixture)?;

        let spectrum = read_spectrum(&path, &SifReader::default())?;

        // frame 0, row 0 only
        assert_eq!(spectrum.counts, (0..8).collect::<Vec<i64>>());

        Ok(())
    }

    #[test]
    fn test_new_join_filename() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(new_join_filename(dir.path()), "sif_joined_data.csv");

        fs::write(dir.path().join("sif_joined_data.csv"), b"")?;
        fs::write(dir.path().join("sif_joined_data-1.csv"), b"")?;
        assert_eq!(new_join_filename(dir.path()), "sif_joined_data-2.csv");

        Ok(())
    }
}
