#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Decoder for Andor SIF ("Andor Technology Multi-Channel File") camera
//! acquisitions.
//!
//! ### File Organization
//!
//! **Header**: ASCII tokens, newline-terminated lines, length-prefixed
//! strings and short binary runs, in a fixed order that varies with the
//! `SifVersion` dispatch tag.
//! **Payload**: one little-endian float32 plane per frame, directly after
//! the header. Subimages stack vertically inside a plane.
//!
//! ### Spool Acquisitions
//!
//! Directories holding an `.ini` descriptor, a `.sifx` header and one raw
//! `*spool.dat` file per frame (`Mono16` or `Mono32`).
//!
//! ## Quick Start
//!
//! 1. Decode the header and plan the tiles with [`process::reader::SifReader::open`]
//! 2. Read the frames with [`process::reader::SifReader::read_frames`]
//! 3. Evaluate the wavelength axis with [`process::reader::SifFile::calibration`]
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! use sif::process::reader::SifReader;
//!
//! let mut file = BufReader::new(File::open("spectrum.sif")?);
//!
//! let reader = SifReader::default();
//! let sif = reader.open(&mut file)?;
//! let frames = reader.read_frames(&mut file, &sif)?;
//!
//! let (width, height) = sif.plane_shape();
//! println!("{} frame(s) of {width}x{height}", frames.frames);
//!
//! if let Some(calibration) = sif.calibration()? {
//!     let wavelengths = calibration.frame(0);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Decoding stages.
///
/// 1. **Header** ([`process::header`]): Token-level header decoding.
/// 2. **Geometry** ([`process::geometry`]): Plane shape and tile offsets.
/// 3. **Payload** ([`process::payload`]): Frame reading.
/// 4. **Calibration** ([`process::calibration`]): Wavelength polynomials.
/// 5. **Spool** ([`process::spool`]): Directory-based acquisitions.
pub mod process;

/// Data structures representing SIF format components.
///
/// - **Metadata** ([`structs::metadata`]): Ordered header fields
/// - **Versions** ([`structs::version`]): Dialect dispatch
/// - **Subimages** ([`structs::subimage`]): Binned regions of a plane
/// - **Tiles** ([`structs::tile`]): Frame locations
/// - **Timestamps** ([`structs::timestamp`]): Wraparound correction
/// - **Spool descriptors** ([`structs::spool_ini`]): `.ini` parsing
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Token I/O** ([`utils::token_io`]): Position-tracking header reader
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
