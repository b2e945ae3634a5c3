//! Spool acquisition descriptor (`*.ini`).
//!
//! A flat `key = value` text file written next to the spooled frames.
//! Section headers, blank lines and `;`/`#` comments are ignored; keys from
//! all sections share one namespace.

use std::path::Path;

use anyhow::{Context, Result, bail};
use log::trace;

use crate::structs::encoding::PixelEncoding;
use crate::utils::errors::SpoolError;

pub const KEY_HEIGHT: &str = "AOIHeight";
pub const KEY_WIDTH: &str = "AOIWidth";
pub const KEY_STRIDE: &str = "AOIStride";
pub const KEY_ENCODING: &str = "PixelEncoding";
pub const KEY_IMAGE_SIZE: &str = "ImageSizeBytes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolDescriptor {
    /// Frame height in rows.
    pub height: usize,
    /// Frame width in pixels.
    pub width: usize,
    /// Row length in bytes, padding included.
    pub stride: usize,
    pub encoding: PixelEncoding,
    /// Bytes per image in a spool file, trailing metadata included.
    pub image_size_bytes: usize,
    entries: Vec<(String, String)>,
}

impl SpoolDescriptor {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text, path)
    }

    /// Parses descriptor text; `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let entries: Vec<(String, String)> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with(['[', ';', '#']))
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        let lookup = |key: &'static str| -> Result<&str> {
            match entries.iter().find(|(k, _)| k == key) {
                Some((_, v)) => Ok(v.as_str()),
                None => bail!(SpoolError::MalformedSpoolDescriptor {
                    key,
                    path: path.to_path_buf(),
                }),
            }
        };

        let number = |key: &'static str| -> Result<usize> {
            let value = lookup(key)?;
            match value.parse() {
                Ok(v) => Ok(v),
                Err(_) => bail!(SpoolError::InvalidSpoolValue {
                    key,
                    value: value.to_string(),
                }),
            }
        };

        let descriptor = Self {
            height: number(KEY_HEIGHT)?,
            width: number(KEY_WIDTH)?,
            stride: number(KEY_STRIDE)?,
            encoding: lookup(KEY_ENCODING)?.parse()?,
            image_size_bytes: number(KEY_IMAGE_SIZE)?,
            entries: entries.clone(),
        };

        let bpp = descriptor.encoding.bytes_per_pixel().unwrap_or(1);
        if descriptor.width.checked_mul(bpp).is_none() {
            bail!(SpoolError::InvalidSpoolValue {
                key: KEY_WIDTH,
                value: descriptor.width.to_string(),
            });
        }
        if descriptor.stride.checked_mul(descriptor.height).is_none() {
            bail!(SpoolError::InvalidSpoolValue {
                key: KEY_STRIDE,
                value: descriptor.stride.to_string(),
            });
        }

        trace!(
            "Spool descriptor: {}x{} stride {} {} ({} bytes/image)",
            descriptor.width,
            descriptor.height,
            descriptor.stride,
            descriptor.encoding,
            descriptor.image_size_bytes
        );

        Ok(descriptor)
    }

    /// Raw value of any descriptor key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Bytes of pixel data per frame, padding included.
    ///
    /// Parsed descriptors never saturate.
    pub fn frame_bytes(&self) -> usize {
        self.stride.saturating_mul(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = "[data]\n\
        AOIHeight = 100\n\
        AOIWidth = 100\n\
        AOIStride = 200\n\
        PixelEncoding = Mono16\n\
        ImageSizeBytes = 20040\n\
        \n\
        [multiimage]\n\
        ; comment\n\
        ImagesPerFile = 1\n";

    #[test]
    fn test_parse_descriptor() -> Result<()> {
        let descriptor = SpoolDescriptor::parse(DESCRIPTOR, Path::new("acquisitionmetadata.ini"))?;

        assert_eq!(descriptor.height, 100);
        assert_eq!(descriptor.width, 100);
        assert_eq!(descriptor.stride, 200);
        assert_eq!(descriptor.encoding, PixelEncoding::Mono16);
        assert_eq!(descriptor.image_size_bytes, 20040);
        assert_eq!(descriptor.frame_bytes(), 20000);
        assert_eq!(descriptor.get("ImagesPerFile"), Some("1"));

        Ok(())
    }

    #[test]
    fn test_missing_key_is_malformed() {
        let text = DESCRIPTOR.replace("AOIStride = 200\n", "");
        let err = SpoolDescriptor::parse(&text, Path::new("a.ini")).unwrap_err();

        match err.downcast_ref::<SpoolError>() {
            Some(SpoolError::MalformedSpoolDescriptor { key, .. }) => assert_eq!(*key, "AOIStride"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_value() {
        let text = DESCRIPTOR.replace("AOIHeight = 100", "AOIHeight = tall");
        let err = SpoolDescriptor::parse(&text, Path::new("a.ini")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SpoolError>(),
            Some(SpoolError::InvalidSpoolValue { key: "AOIHeight", .. })
        ));
    }

    #[test]
    fn test_unknown_encoding() {
        let text = DESCRIPTOR.replace("Mono16", "Bayer8");
        let err = SpoolDescriptor::parse(&text, Path::new("a.ini")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SpoolError>(),
            Some(SpoolError::UnsupportedEncoding(name)) if name == "Bayer8"
        ));
    }

    #[test]
    fn test_oversized_frame_is_invalid() {
        let text = DESCRIPTOR.replace("AOIStride = 200", &format!("AOIStride = {}", usize::MAX));
        let err = SpoolDescriptor::parse(&text, Path::new("a.ini")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SpoolError>(),
            Some(SpoolError::InvalidSpoolValue { key: "AOIStride", .. })
        ));

        let text = DESCRIPTOR.replace("AOIWidth = 100", &format!("AOIWidth = {}", usize::MAX));
        let err = SpoolDescriptor::parse(&text, Path::new("a.ini")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SpoolError>(),
            Some(SpoolError::InvalidSpoolValue { key: "AOIWidth", .. })
        ));
    }

    #[test]
    fn test_missing_descriptor_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acquisitionmetadata.ini");

        let err = SpoolDescriptor::from_path(&path).unwrap_err();
        assert!(format!("{err:#}").contains("acquisitionmetadata.ini"));
    }
}
