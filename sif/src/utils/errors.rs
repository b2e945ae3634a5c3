use std::io;
use std::path::PathBuf;

#[macro_export]
macro_rules! log_or_err {
    ($fail_level:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $fail_level {
            return Err($err.into());
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("Truncated input at byte {position}: {requested} more bytes required")]
    TruncatedInput { position: u64, requested: usize },

    #[error("Malformed number {token:?} at byte {position}")]
    MalformedNumber { token: String, position: u64 },

    #[error("I/O error at byte {position}: {source}")]
    Io {
        position: u64,
        #[source]
        source: io::Error,
    },
}

impl TokenError {
    pub fn position(&self) -> u64 {
        match self {
            TokenError::TruncatedInput { position, .. }
            | TokenError::MalformedNumber { position, .. }
            | TokenError::Io { position, .. } => *position,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    #[error("Not a SIF file: magic preamble mismatch at byte {position}")]
    NotASifFile { position: u64 },

    #[error("Failed to decode header field `{field}` at byte {position}: {source}")]
    Decode {
        field: &'static str,
        position: u64,
        #[source]
        source: TokenError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum GeometryError {
    #[error("Invalid geometry: plane is {width}x{height} pixels")]
    InvalidGeometry { width: u64, height: u64 },

    #[error("Header declares no subimages")]
    NoSubimages,

    #[error("Subimage {subimage}: {axis} extent {extent} is not divisible by binning {binning}")]
    InexactBinning {
        subimage: usize,
        axis: &'static str,
        extent: i64,
        binning: i64,
    },

    #[error("Subimage {subimage}: {axis} from {lo} to {hi} overflows")]
    ExtentOverflow {
        subimage: usize,
        axis: &'static str,
        lo: i64,
        hi: i64,
    },

    #[error("Frame geometry overflows: {0}")]
    SizeOverflow(&'static str),

    #[error(
        "Subimage {subimage} is {width}x{height}, but subimage 0 is {expected_width}x{expected_height}"
    )]
    IncongruentSubimages {
        subimage: usize,
        width: u64,
        height: u64,
        expected_width: u64,
        expected_height: u64,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum PayloadError {
    #[error(
        "The file might be corrupt. Number of frames should be {expected} according to the header, but only {found} found in the file"
    )]
    CorruptPayload { expected: usize, found: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("Calibration line for frame {frame} is missing from the user text")]
    MissingFrame { frame: usize },

    #[error("Malformed calibration coefficients for frame {frame}: {line:?}")]
    MalformedCoefficients { frame: usize, line: String },
}

#[derive(thiserror::Error, Debug)]
pub enum SpoolError {
    #[error("No `{pattern}` file found in {}", dir.display())]
    MissingFile { pattern: &'static str, dir: PathBuf },

    #[error("Expected exactly one `{pattern}` file in {}, found {count}", dir.display())]
    AmbiguousFile {
        pattern: &'static str,
        dir: PathBuf,
        count: usize,
    },

    #[error("Spool descriptor {} is missing required key `{key}`", path.display())]
    MalformedSpoolDescriptor { key: &'static str, path: PathBuf },

    #[error("Spool descriptor key `{key}` has invalid value {value:?}")]
    InvalidSpoolValue { key: &'static str, value: String },

    #[error(
        "Spool frames are {width}x{height}, larger than the {detector_width}x{detector_height} detector"
    )]
    AoiExceedsDetector {
        width: usize,
        height: usize,
        detector_width: i64,
        detector_height: i64,
    },

    #[error("Unsupported pixel encoding `{0}`")]
    UnsupportedEncoding(String),

    #[error(
        "Number of frames should be {expected} according to the header, but only {found} spool files found"
    )]
    FrameCountMismatch { expected: usize, found: usize },

    #[error("Spool file {} carries no frame index", path.display())]
    UnorderedPayload { path: PathBuf },

    #[error("Spool file {} holds {found} bytes, frame needs {expected}", path.display())]
    CorruptPayload {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}
