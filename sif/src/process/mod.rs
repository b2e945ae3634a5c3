/// Header decoding.
///
/// Provides the [`HeaderDecoder`](header::HeaderDecoder), which runs the
/// table of [`ReadStep`](header::ReadStep)s over a token reader and yields
/// a [`Header`](header::Header).
pub mod header;

/// Plane geometry and per-frame tile planning.
pub mod geometry;

/// Calibration polynomial extraction and evaluation.
pub mod calibration;

/// Reading float32 frames at the planned tile offsets.
pub mod payload;

/// Directory-based spool acquisitions.
///
/// Provides the [`SpoolReader`](spool::SpoolReader) for `.ini` + `.sifx` +
/// `*spool.dat` directories.
pub mod spool;

/// Entry point for `.sif` files.
///
/// Provides the [`SifReader`](reader::SifReader), which ties header
/// decoding, geometry and payload reading together.
pub mod reader;
