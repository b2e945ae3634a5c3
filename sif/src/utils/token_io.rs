//! Token-level reader for SIF headers.
//!
//! SIF headers mix whitespace-delimited ASCII tokens, newline-terminated
//! lines, length-prefixed strings and fixed-length binary runs. The reader
//! tracks the absolute byte position so every failure can name the offset
//! where it occurred.

use std::io;
use std::io::SeekFrom;
use std::str::FromStr;

use crate::utils::errors::TokenError;

/// Saved cursor position for speculative reads.
///
/// Obtained from [`TokenReader::mark`] and handed back to
/// [`TokenReader::reset`] to un-read everything consumed since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(u64);

impl Mark {
    pub fn position(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub struct TokenReader<R: io::Read + io::Seek> {
    inner: R,
    position: u64,
}

pub type SliceTokenReader<'a> = TokenReader<io::Cursor<&'a [u8]>>;

impl<R> TokenReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(mut inner: R) -> Result<Self, TokenError> {
        let position = inner
            .stream_position()
            .map_err(|source| TokenError::Io {
                position: 0,
                source,
            })?;

        Ok(Self { inner, position })
    }

    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads one byte, `None` at end of stream.
    #[inline(always)]
    fn next_byte(&mut self) -> Result<Option<u8>, TokenError> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.position += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(TokenError::Io {
                        position: self.position,
                        source,
                    });
                }
            }
        }
    }

    /// Returns exactly `n` bytes or fails with `TruncatedInput`.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TokenError> {
        let start = self.position;
        let mut buf = vec![0u8; n];
        let mut filled = 0;

        while filled < n {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(TokenError::TruncatedInput {
                        position: start + filled as u64,
                        requested: n - filled,
                    });
                }
                Ok(read) => {
                    filled += read;
                    self.position += read as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(TokenError::Io {
                        position: self.position,
                        source,
                    });
                }
            }
        }

        Ok(buf)
    }

    /// Reads up to and including the next newline and returns the line
    /// without its terminator.
    ///
    /// A final line without a newline is returned as is; an empty read at
    /// end of stream is `TruncatedInput`.
    pub fn read_line(&mut self) -> Result<Vec<u8>, TokenError> {
        let mut line = Vec::new();

        loop {
            match self.next_byte()? {
                Some(b'\n') => break,
                Some(byte) => line.push(byte),
                None if line.is_empty() => {
                    return Err(TokenError::TruncatedInput {
                        position: self.position,
                        requested: 1,
                    });
                }
                None => break,
            }
        }

        Ok(line)
    }

    /// Accumulates bytes until `terminator` or a newline.
    ///
    /// Delimiters seen before the first token byte are skipped, so runs of
    /// blanks never yield empty tokens.
    pub fn read_delimited(&mut self, terminator: u8) -> Result<Vec<u8>, TokenError> {
        let mut token = Vec::new();

        loop {
            let Some(byte) = self.next_byte()? else {
                return Err(TokenError::TruncatedInput {
                    position: self.position,
                    requested: 1,
                });
            };

            if byte == terminator || byte == b'\n' {
                if token.is_empty() {
                    continue;
                }
                break;
            }

            token.push(byte);
        }

        Ok(token)
    }

    #[inline(always)]
    pub fn read_token(&mut self) -> Result<Vec<u8>, TokenError> {
        self.read_delimited(b' ')
    }

    pub fn read_int<T: FromStr>(&mut self) -> Result<T, TokenError> {
        let start = self.position;
        let token = self.read_token()?;
        parse_number(&token, start)
    }

    pub fn read_float(&mut self) -> Result<f64, TokenError> {
        let start = self.position;
        let token = self.read_token()?;
        parse_number(&token, start)
    }

    /// Reads a string whose decimal byte length sits on the preceding line.
    pub fn read_prefixed(&mut self) -> Result<Vec<u8>, TokenError> {
        let start = self.position;
        let length_line = self.read_line()?;
        let length: usize = parse_number(&length_line, start)?;

        self.read_exact(length)
    }

    #[inline(always)]
    pub fn mark(&self) -> Mark {
        Mark(self.position)
    }

    /// Rewinds to a previously taken [`Mark`].
    pub fn reset(&mut self, mark: Mark) -> Result<(), TokenError> {
        self.inner
            .seek(SeekFrom::Start(mark.0))
            .map_err(|source| TokenError::Io {
                position: self.position,
                source,
            })?;
        self.position = mark.0;

        Ok(())
    }
}

impl<'a> SliceTokenReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        Self {
            inner: io::Cursor::new(buf),
            position: 0,
        }
    }
}

/// Parses an ASCII number, ignoring surrounding whitespace.
pub fn parse_number<T: FromStr>(token: &[u8], position: u64) -> Result<T, TokenError> {
    std::str::from_utf8(token.trim_ascii())
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| TokenError::MalformedNumber {
            token: String::from_utf8_lossy(token).into_owned(),
            position,
        })
}
