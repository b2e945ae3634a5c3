//! Synthetic SIF files for tests.
//!
//! Produces byte-exact headers for any version dialect, followed by a
//! deterministic float32 payload (`frame * 1000 + pixel index`).

use crate::process::header::MAGIC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stray {
    None,
    Zero,
    ZeroOne,
}

#[derive(Debug, Clone)]
pub struct SifFixture {
    pub version: i64,
    pub calibration_version: i64,
    pub calibration_line: String,
    pub user_text: String,
    pub detector: (i64, i64),
    pub frames: usize,
    pub subimages: Vec<[i64; 6]>,
    pub timestamps: Option<Vec<u64>>,
    pub stray: Stray,
    /// Frames of pixel data actually written; defaults to `frames`.
    pub payload_frames: Option<usize>,
}

impl Default for SifFixture {
    fn default() -> Self {
        Self {
            version: 65559,
            calibration_version: 65539,
            calibration_line: "400.5 0.25 1e-5 0".to_string(),
            user_text: String::new(),
            detector: (8, 4),
            frames: 1,
            subimages: vec![[1, 4, 8, 1, 1, 1]],
            timestamps: None,
            stray: Stray::None,
            payload_frames: None,
        }
    }
}

/// Opaque line count per dialect, spelled out independently of the decoder.
pub fn opaque_lines(version: i64) -> usize {
    if (65548..=65557).contains(&version) {
        2
    } else if version == 65558 {
        5
    } else if version == 65559 {
        9
    } else if version == 65565 {
        15 + 1
    } else if version > 65565 {
        18
    } else {
        0
    }
}

fn prefixed(out: &mut Vec<u8>, text: &str) {
    out.extend_from_slice(format!("{}\n", text.len()).as_bytes());
    out.extend_from_slice(text.as_bytes());
}

impl SifFixture {
    pub fn width(&self) -> usize {
        let [x0, _, x1, _, _, xbin] = self.subimages[self.subimages.len() - 1];
        ((1 + x1 - x0) / xbin) as usize
    }

    pub fn subimage_height(&self) -> usize {
        let [_, y1, _, y0, ybin, _] = self.subimages[self.subimages.len() - 1];
        ((1 + y1 - y0) / ybin) as usize
    }

    /// Pixels per frame across all subimages.
    pub fn plane_len(&self) -> usize {
        self.width() * self.subimage_height() * self.subimages.len()
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.timestamps
            .clone()
            .unwrap_or_else(|| (0..self.frames as u64).map(|f| f * 1000).collect())
    }

    pub fn pixel(frame: usize, index: usize) -> f32 {
        frame as f32 * 1000.0 + index as f32
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut push = |out: &mut Vec<u8>, s: &str| out.extend_from_slice(s.as_bytes());

        out.extend_from_slice(MAGIC);
        push(&mut out, "65538 1\n");
        push(&mut out, &format!("{} 0 0 1 ", self.version));
        push(&mut out, "1600000000 -60.5 ");
        push(&mut out, "0123456789");
        push(&mut out, " 0 ");
        push(&mut out, "0.1 0.2 0.3 5 ");
        out.extend_from_slice(b"\0 ");
        push(&mut out, "0.05 3e-6 ");
        push(&mut out, "0 1 ");
        push(&mut out, "2.5 ");
        push(&mut out, "0 0 1e-8 0\n");
        push(&mut out, "DU420_BVF\n");
        push(&mut out, &format!("{} {}\n", self.detector.0, self.detector.1));
        prefixed(&mut out, "fixture.sif");
        push(&mut out, " \n");
        push(&mut out, "65538 ");
        prefixed(&mut out, &self.user_text);
        push(&mut out, "\n");
        push(&mut out, "65538 ");
        out.extend_from_slice(b"\x01 \x02 \x03 \x00 ");
        push(&mut out, "0.01 0.02\n");

        for i in 0..opaque_lines(self.version) {
            push(&mut out, &format!("opaque line {i}\n"));
        }

        push(&mut out, &format!("{} ", self.calibration_version));
        if self.calibration_version == 65540 {
            push(&mut out, "extra\n");
        }
        push(&mut out, &format!("{}\n", self.calibration_line));

        push(&mut out, "0 1 0 0\n0 1 0 0\n0 1 0 0\n");
        push(&mut out, "422\n");
        push(&mut out, "13\n13\n");
        prefixed(&mut out, "Wavelength");
        prefixed(&mut out, "Counts");
        prefixed(&mut out, "Pixel number");
        push(&mut out, "\n65541 ");
        push(&mut out, "1 4 8 1 ");

        // informational only; wraps for oversized geometries
        let plane_bytes = self.plane_len().wrapping_mul(4);
        push(
            &mut out,
            &format!(
                "{} {} {} {}\n",
                self.frames,
                self.subimages.len(),
                plane_bytes.wrapping_mul(self.frames),
                plane_bytes
            ),
        );

        for [x0, y1, x1, y0, ybin, xbin] in &self.subimages {
            push(
                &mut out,
                &format!("65538 {x0} {y1} {x1} {y0} {ybin} {xbin} 0 0\n"),
            );
        }

        for ts in self.timestamps() {
            push(&mut out, &format!("{ts}\n"));
        }

        match self.stray {
            Stray::None => {}
            Stray::Zero => push(&mut out, "0\n"),
            Stray::ZeroOne => push(&mut out, "0\n1\n"),
        }

        out
    }

    pub fn payload_bytes(&self) -> Vec<u8> {
        let frames = self.payload_frames.unwrap_or(self.frames);
        let mut out = Vec::with_capacity(frames * self.plane_len() * 4);

        for frame in 0..frames {
            for index in 0..self.plane_len() {
                out.extend_from_slice(&Self::pixel(frame, index).to_le_bytes());
            }
        }

        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header_bytes();
        out.extend(self.payload_bytes());
        out
    }
}
