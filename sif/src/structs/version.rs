//! SIF format version dispatch.
//!
//! The `SifVersion` header token is a dispatch tag, not a semantic version.
//! It selects how many opaque lines sit between the shutter times and the
//! calibration sub-version token.
//!
//! | SifVersion        | Opaque lines                |
//! |-------------------|-----------------------------|
//! | `65548..=65557`   | 2                           |
//! | `65558`           | 5                           |
//! | `65559`           | 9                           |
//! | `65565`           | 15, then 1 diagnostic line  |
//! | `> 65565`         | 18                          |
//! | anything else     | 0                           |

use std::fmt::{Display, Formatter};

/// Calibration sub-version that carries one extra line before the
/// calibration coefficients.
pub const CALIBRATION_EXTRA_LINE_VERSION: i64 = 65540;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SifVersion(pub i64);

/// Opaque lines to skip for a version dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionLines {
    pub skipped: usize,
    pub diagnostic: bool,
}

impl SifVersion {
    pub const NEWEST_KNOWN: SifVersion = SifVersion(65565);

    pub fn lines(self) -> VersionLines {
        let (skipped, diagnostic) = match self.0 {
            65548..=65557 => (2, false),
            65558 => (5, false),
            65559 => (9, false),
            65565 => (15, true),
            v if v > Self::NEWEST_KNOWN.0 => (18, false),
            _ => (0, false),
        };

        VersionLines {
            skipped,
            diagnostic,
        }
    }

    /// Dialects newer than every enumerated one.
    pub fn is_beyond_known(self) -> bool {
        self > Self::NEWEST_KNOWN
    }
}

impl Display for SifVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[test]
fn test_version_dispatch_table() {
    let lines = |v| SifVersion(v).lines();

    assert_eq!(lines(65548).skipped, 2);
    assert_eq!(lines(65557).skipped, 2);
    assert_eq!(lines(65558).skipped, 5);
    assert_eq!(lines(65559).skipped, 9);
    assert_eq!(
        lines(65565),
        VersionLines {
            skipped: 15,
            diagnostic: true
        }
    );
    assert_eq!(lines(65567).skipped, 18);
    assert_eq!(lines(70000).skipped, 18);

    // gaps in the table fall through with nothing skipped
    assert_eq!(lines(65538).skipped, 0);
    assert_eq!(lines(65560).skipped, 0);
    assert_eq!(lines(65564).skipped, 0);
    assert!(!lines(65564).diagnostic);
}
