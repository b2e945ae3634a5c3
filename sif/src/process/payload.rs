//! Frame payload reading.

use std::io::{self, Read, Seek, SeekFrom};

use anyhow::{Result, bail};
use log::{trace, warn};

use crate::structs::tile::Tile;
use crate::utils::errors::PayloadError;

/// Frames stacked as `[frames, height, width]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStack<T> {
    pub data: Vec<T>,
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    /// Frames promised by the header. Larger than `frames` only when a
    /// corrupt file was read in tolerant mode.
    pub declared_frames: usize,
}

impl<T> FrameStack<T> {
    pub fn shape(&self) -> [usize; 3] {
        [self.frames, self.height, self.width]
    }

    pub fn frame_len(&self) -> usize {
        self.height * self.width
    }

    pub fn frame(&self, index: usize) -> Option<&[T]> {
        let len = self.frame_len();
        let start = index.checked_mul(len)?;
        self.data.get(start..start.checked_add(len)?)
    }

    pub fn get(&self, frame: usize, row: usize, col: usize) -> Option<&T> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.frame(frame).map(|f| &f[row * self.width + col])
    }

    pub fn is_truncated(&self) -> bool {
        self.frames < self.declared_frames
    }
}

/// Reads the little-endian float32 pixels of every tile.
///
/// A frame that is not fully present ends the read. Without
/// `ignore_corrupt` that is a [`PayloadError::CorruptPayload`]; with it the
/// frames read so far are returned and a warning is logged.
pub fn read_tiles<R: Read + Seek>(
    stream: &mut R,
    tiles: &[Tile],
    plane_shape: (u64, u64),
    ignore_corrupt: bool,
) -> Result<FrameStack<f32>> {
    let (width, height) = (plane_shape.0 as usize, plane_shape.1 as usize);
    let mut data = Vec::new();
    let mut buf = Vec::new();
    let mut frames = 0;

    for (index, tile) in tiles.iter().enumerate() {
        buf.resize(tile.byte_len() as usize, 0);
        stream.seek(SeekFrom::Start(tile.offset))?;

        match stream.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                trace!("Frame {index} at byte {} is incomplete", tile.offset);
                break;
            }
            Err(e) => return Err(e.into()),
        }

        data.extend(
            buf.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        );
        frames += 1;
    }

    if frames < tiles.len() {
        let err = PayloadError::CorruptPayload {
            expected: tiles.len(),
            found: frames,
        };
        if !ignore_corrupt {
            bail!(err);
        }
        warn!("{err}");
    }

    Ok(FrameStack {
        data,
        frames,
        height,
        width,
        declared_frames: tiles.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::structs::tile::{BoundingBox, PixelFormat};

    fn tiles(frames: u64, offset: u64) -> Vec<Tile> {
        (0..frames)
            .map(|f| Tile {
                bbox: BoundingBox {
                    left: 0,
                    top: 0,
                    right: 3,
                    bottom: 2,
                },
                offset: offset + f * 24,
                pixel_format: PixelFormat::F32Le,
            })
            .collect()
    }

    fn payload(frames: usize, extra: usize) -> Vec<u8> {
        let mut bytes = vec![0xEE; 5];
        for v in 0..frames * 6 {
            bytes.extend_from_slice(&(v as f32).to_le_bytes());
        }
        bytes.extend(std::iter::repeat_n(0u8, extra));
        bytes
    }

    #[test]
    fn test_read_frames() -> Result<()> {
        let mut stream = Cursor::new(payload(2, 0));
        let stack = read_tiles(&mut stream, &tiles(2, 5), (3, 2), false)?;

        assert_eq!(stack.shape(), [2, 2, 3]);
        assert_eq!(stack.frame(1), Some(&[6.0, 7.0, 8.0, 9.0, 10.0, 11.0][..]));
        assert_eq!(stack.get(1, 1, 2), Some(&11.0));
        assert_eq!(stack.get(0, 2, 0), None);
        assert!(!stack.is_truncated());

        Ok(())
    }

    #[test]
    fn test_truncated_payload_fails_by_default() {
        // 3 complete frames and part of a fourth, 5 declared
        let mut stream = Cursor::new(payload(3, 10));
        let err = read_tiles(&mut stream, &tiles(5, 5), (3, 2), false).unwrap_err();

        match err.downcast_ref::<PayloadError>() {
            Some(PayloadError::CorruptPayload { expected, found }) => {
                assert_eq!((*expected, *found), (5, 3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains('5') && message.contains('3'));
    }

    #[test]
    fn test_truncated_payload_tolerated() -> Result<()> {
        let mut stream = Cursor::new(payload(3, 10));
        let stack = read_tiles(&mut stream, &tiles(5, 5), (3, 2), true)?;

        assert_eq!(stack.shape(), [3, 2, 3]);
        assert_eq!(stack.declared_frames, 5);
        assert!(stack.is_truncated());
        assert_eq!(stack.data.len(), 18);
        assert_eq!(stack.frame(usize::MAX), None);
        assert_eq!(stack.get(usize::MAX / 2, 0, 0), None);

        Ok(())
    }
}
