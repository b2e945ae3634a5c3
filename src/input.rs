use std::path::PathBuf;

use anyhow::Result;
use glob::glob;

/// Expands shell-style patterns into the matching paths.
///
/// Paths keep pattern order, then the order `glob` yields them. A path
/// matched by several patterns is listed once.
pub fn expand_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let matched = glob(pattern.as_ref())?.collect::<Result<Vec<_>, _>>()?;
        log::debug!("Pattern {:?} matched {} path(s)", pattern.as_ref(), matched.len());

        for path in matched {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_expand_and_dedup() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b.sif", "a.sif", "notes.txt"] {
            fs::write(dir.path().join(name), b"")?;
        }

        let all = format!("{}/*.sif", dir.path().display());
        let one = format!("{}/a.sif", dir.path().display());
        let paths = expand_patterns(&[all, one])?;

        assert_eq!(
            paths,
            vec![dir.path().join("a.sif"), dir.path().join("b.sif")]
        );

        Ok(())
    }

    #[test]
    fn test_no_match_is_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let pattern = format!("{}/*.sif", dir.path().display());

        assert!(expand_patterns(&[pattern])?.is_empty());

        Ok(())
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(expand_patterns(&["[unclosed"]).is_err());
    }
}
