//! Signature capture
//!
//! A [`SignaturePad`] collects pen strokes and rasterizes them into a PNG
//! trimmed to the ink, exported as a `data:image/png;base64,` URL.
//! [`SignatureCapture`] is the single open/commit/cancel slot a report form
//! uses to route that image to a row or a section-level signature.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use image::{ImageFormat, Rgba, RgbaImage};
use plant_report_common::PNG_DATA_URL_PREFIX;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PAD_WIDTH: u32 = 500;
pub const DEFAULT_PAD_HEIGHT: u32 = 200;
/// Largest pad side; stroke files reaching beyond it are rejected
pub const MAX_PAD_SIZE: u32 = 4096;

const PEN_WIDTH: f32 = 2.0;
const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
// distance between pen stamps along a segment
const STAMP_STEP: f32 = 0.5;

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Nothing has been drawn")]
    Empty,

    #[error("No signature capture is open")]
    NotOpen,

    #[error("Cannot sign {0}")]
    InvalidTarget(String),

    #[error("Signature must be a PNG data URL")]
    NotDataUrl,

    #[error("Invalid stroke data: {0}")]
    InvalidStrokes(String),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

pub type Point = [f32; 2];

/// Drawing surface in pad pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    strokes: Vec<Vec<Point>>,
}

impl Default for SignaturePad {
    fn default() -> Self {
        Self::new(DEFAULT_PAD_WIDTH, DEFAULT_PAD_HEIGHT)
    }
}

impl SignaturePad {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.min(MAX_PAD_SIZE),
            height: height.min(MAX_PAD_SIZE),
            strokes: Vec::new(),
        }
    }

    /// Pad sized to fit the given strokes, never larger than [`MAX_PAD_SIZE`]
    pub fn from_strokes(strokes: Vec<Vec<Point>>) -> Self {
        let extent = |axis: usize, min: u32| {
            let max = strokes
                .iter()
                .flatten()
                .map(|p| p[axis])
                .fold(0.0_f32, f32::max)
                .ceil()
                .min(MAX_PAD_SIZE as f32);
            (max as u32).saturating_add(PEN_WIDTH as u32).clamp(min, MAX_PAD_SIZE)
        };
        let width = extent(0, DEFAULT_PAD_WIDTH);
        let height = extent(1, DEFAULT_PAD_HEIGHT);
        Self {
            width,
            height,
            strokes,
        }
    }

    /// Strokes as JSON: `[[[x, y], ...], ...]`
    pub fn from_json(json: &str) -> Result<Self, SignatureError> {
        let strokes: Vec<Vec<Point>> =
            serde_json::from_str(json).map_err(|e| SignatureError::InvalidStrokes(e.to_string()))?;
        if strokes.iter().flatten().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(SignatureError::InvalidStrokes("non-finite coordinate".into()));
        }
        let limit = MAX_PAD_SIZE as f32;
        if let Some(p) = strokes
            .iter()
            .flatten()
            .find(|p| p.iter().any(|c| c.abs() > limit))
        {
            return Err(SignatureError::InvalidStrokes(format!(
                "point ({}, {}) is outside the {}px pad",
                p[0], p[1], MAX_PAD_SIZE
            )));
        }
        Ok(Self::from_strokes(strokes))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn strokes(&self) -> &[Vec<Point>] {
        &self.strokes
    }

    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        self.strokes.push(vec![[x, y]]);
    }

    /// Extends the current stroke, starting one if none is open
    pub fn line_to(&mut self, x: f32, y: f32) {
        match self.strokes.last_mut() {
            Some(stroke) => stroke.push([x, y]),
            None => self.begin_stroke(x, y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    /// Rasterized strokes cropped to the ink bounding box
    pub fn render(&self) -> Result<RgbaImage, SignatureError> {
        if self.is_empty() {
            return Err(SignatureError::Empty);
        }

        let mut canvas = RgbaImage::new(self.width, self.height);
        for stroke in &self.strokes {
            match stroke.as_slice() {
                [] => {}
                [only] => stamp(&mut canvas, *only),
                points => {
                    for segment in points.windows(2) {
                        draw_segment(&mut canvas, segment[0], segment[1]);
                    }
                }
            }
        }

        let (x, y, w, h) = ink_bounds(&canvas).ok_or(SignatureError::Empty)?;
        Ok(image::imageops::crop_imm(&canvas, x, y, w, h).to_image())
    }

    pub fn to_png(&self) -> Result<Vec<u8>, SignatureError> {
        let image = self.render()?;
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    pub fn to_data_url(&self) -> Result<String, SignatureError> {
        let png = self.to_png()?;
        Ok(format!("{}{}", PNG_DATA_URL_PREFIX, B64.encode(png)))
    }
}

fn draw_segment(canvas: &mut RgbaImage, from: Point, to: Point) {
    let Some((from, to)) = clip_segment(canvas, from, to) else {
        return;
    };
    let (dx, dy) = (to[0] - from[0], to[1] - from[1]);
    let steps = ((dx * dx + dy * dy).sqrt() / STAMP_STEP).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp(canvas, [from[0] + dx * t, from[1] + dy * t]);
    }
}

// Liang-Barsky against the canvas grown by the pen radius, so stamping cost
// depends on the canvas and not on how far the points lie outside it
fn clip_segment(canvas: &RgbaImage, from: Point, to: Point) -> Option<(Point, Point)> {
    let radius = PEN_WIDTH / 2.0;
    let (dx, dy) = (to[0] - from[0], to[1] - from[1]);
    let edges = [
        (-dx, from[0] + radius),
        (dx, canvas.width() as f32 + radius - from[0]),
        (-dy, from[1] + radius),
        (dy, canvas.height() as f32 + radius - from[1]),
    ];

    let (mut t0, mut t1) = (0.0_f32, 1.0_f32);
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((
        [from[0] + dx * t0, from[1] + dy * t0],
        [from[0] + dx * t1, from[1] + dy * t1],
    ))
}

// round pen: every pixel whose centre lies within half the pen width
fn stamp(canvas: &mut RgbaImage, at: Point) {
    let radius = PEN_WIDTH / 2.0;
    let (w, h) = (canvas.width() as i64, canvas.height() as i64);
    let x0 = ((at[0] - radius).floor() as i64).max(0);
    let x1 = ((at[0] + radius).ceil() as i64).min(w - 1);
    let y0 = ((at[1] - radius).floor() as i64).max(0);
    let y1 = ((at[1] + radius).ceil() as i64).min(h - 1);

    for py in y0..=y1 {
        for px in x0..=x1 {
            let cx = px as f32 + 0.5 - at[0];
            let cy = py as f32 + 0.5 - at[1];
            if cx * cx + cy * cy <= radius * radius {
                canvas.put_pixel(px as u32, py as u32, INK);
            }
        }
    }
}

fn ink_bounds(canvas: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in canvas.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
        });
    }
    bounds.map(|(min_x, min_y, max_x, max_y)| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Where a committed signature goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignatureTarget {
    /// A `Signature` cell of one row
    Cell {
        collection: String,
        row: usize,
        column: String,
    },
    /// The technician slot of a section
    Technician { collection: String },
    /// The notes sign-off
    Notes,
}

impl std::fmt::Display for SignatureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cell {
                collection,
                row,
                column,
            } => write!(f, "{}[{}].{}", collection, row, column),
            Self::Technician { collection } => write!(f, "{} technician", collection),
            Self::Notes => write!(f, "notes"),
        }
    }
}

#[derive(Debug, Default)]
enum CaptureState {
    #[default]
    Closed,
    Open {
        target: SignatureTarget,
        pad: SignaturePad,
    },
}

/// Single capture slot; at most one target is open at a time
#[derive(Debug, Default)]
pub struct SignatureCapture {
    state: CaptureState,
}

impl SignatureCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, CaptureState::Open { .. })
    }

    pub fn target(&self) -> Option<&SignatureTarget> {
        match &self.state {
            CaptureState::Open { target, .. } => Some(target),
            CaptureState::Closed => None,
        }
    }

    /// Opens a fresh pad for `target`.
    ///
    /// An already open capture is replaced: its strokes are discarded and
    /// its target is returned.
    pub fn open(&mut self, target: SignatureTarget) -> Option<SignatureTarget> {
        self.open_with(target, SignaturePad::default())
    }

    pub fn open_with(&mut self, target: SignatureTarget, pad: SignaturePad) -> Option<SignatureTarget> {
        let previous = match std::mem::replace(&mut self.state, CaptureState::Open { target, pad }) {
            CaptureState::Open { target, .. } => Some(target),
            CaptureState::Closed => None,
        };
        if let Some(previous) = &previous {
            debug!(replaced = %previous, "signature capture retargeted");
        }
        previous
    }

    pub fn pad_mut(&mut self) -> Option<&mut SignaturePad> {
        match &mut self.state {
            CaptureState::Open { pad, .. } => Some(pad),
            CaptureState::Closed => None,
        }
    }

    /// Rasterizes the pad, hands the image and target to `sink` and closes.
    ///
    /// An empty pad leaves the capture open.
    pub fn commit<F, R>(&mut self, sink: F) -> Result<R, SignatureError>
    where
        F: FnOnce(String, SignatureTarget) -> R,
    {
        let data_url = match &self.state {
            CaptureState::Open { pad, .. } => pad.to_data_url()?,
            CaptureState::Closed => return Err(SignatureError::NotOpen),
        };
        match std::mem::take(&mut self.state) {
            CaptureState::Open { target, .. } => Ok(sink(data_url, target)),
            CaptureState::Closed => Err(SignatureError::NotOpen),
        }
    }

    /// Closes without producing an image; returns the abandoned target
    pub fn cancel(&mut self) -> Result<SignatureTarget, SignatureError> {
        match std::mem::take(&mut self.state) {
            CaptureState::Open { target, .. } => Ok(target),
            CaptureState::Closed => Err(SignatureError::NotOpen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: usize) -> SignatureTarget {
        SignatureTarget::Cell {
            collection: "condenserWater1".to_string(),
            row,
            column: "Signature".to_string(),
        }
    }

    fn decode(data_url: &str) -> RgbaImage {
        let b64 = data_url.strip_prefix(PNG_DATA_URL_PREFIX).unwrap();
        let bytes = B64.decode(b64).unwrap();
        image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .to_rgba8()
    }

    #[test]
    fn test_png_is_trimmed_to_ink() {
        let mut pad = SignaturePad::default();
        pad.begin_stroke(10.0, 10.0);
        pad.line_to(20.0, 10.0);

        let url = pad.to_data_url().unwrap();
        assert!(url.starts_with(PNG_DATA_URL_PREFIX));

        let image = decode(&url);
        assert_eq!(image.dimensions(), (12, 2));
        assert!(image.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_dot_and_clear() {
        let mut pad = SignaturePad::new(50, 50);
        pad.begin_stroke(5.0, 5.0);
        assert_eq!(pad.render().unwrap().dimensions(), (2, 2));

        pad.clear();
        assert!(pad.is_empty());
        assert!(matches!(pad.to_data_url(), Err(SignatureError::Empty)));
    }

    #[test]
    fn test_strokes_outside_pad_are_empty() {
        let mut pad = SignaturePad::new(10, 10);
        pad.begin_stroke(-50.0, -50.0);
        pad.line_to(-40.0, -50.0);
        assert!(matches!(pad.render(), Err(SignatureError::Empty)));
    }

    #[test]
    fn test_from_json() {
        let pad = SignaturePad::from_json("[[[1, 1], [30, 40]], [[600, 5]]]").unwrap();
        assert_eq!(pad.strokes().len(), 2);
        assert_eq!(pad.dimensions(), (602, 200));

        assert!(matches!(
            SignaturePad::from_json("{\"x\": 1}"),
            Err(SignatureError::InvalidStrokes(_))
        ));
    }

    #[test]
    fn test_huge_coordinates_are_bounded() {
        assert!(matches!(
            SignaturePad::from_json("[[[5e9, 10]]]"),
            Err(SignatureError::InvalidStrokes(_))
        ));
        assert!(matches!(
            SignaturePad::from_json("[[[100000, 100000]]]"),
            Err(SignatureError::InvalidStrokes(_))
        ));

        let pad = SignaturePad::from_strokes(vec![vec![[5e9, 10.0]]]);
        assert_eq!(pad.dimensions(), (MAX_PAD_SIZE, DEFAULT_PAD_HEIGHT));
        assert_eq!(SignaturePad::new(u32::MAX, 10).dimensions(), (MAX_PAD_SIZE, 10));
    }

    #[test]
    fn test_long_segment_is_clipped_to_pad() {
        let mut pad = SignaturePad::new(50, 20);
        pad.begin_stroke(-1e6, 10.0);
        pad.line_to(1e6, 10.0);
        assert_eq!(pad.render().unwrap().dimensions(), (50, 2));

        // far outside any pad: returns promptly instead of stamping forever
        let mut pad = SignaturePad::new(50, 20);
        pad.begin_stroke(-1e30, 10.0);
        pad.line_to(1e30, 10.0);
        assert!(pad.render().map(|image| image.width() <= 50).unwrap_or(true));
    }

    #[test]
    fn test_commit_invokes_sink_and_closes() {
        let mut capture = SignatureCapture::new();
        capture.open(cell(2));
        capture.pad_mut().unwrap().begin_stroke(3.0, 3.0);

        let (url, target) = capture.commit(|url, target| (url, target)).unwrap();
        assert!(url.starts_with(PNG_DATA_URL_PREFIX));
        assert_eq!(target, cell(2));
        assert!(!capture.is_open());
    }

    #[test]
    fn test_commit_empty_stays_open() {
        let mut capture = SignatureCapture::new();
        capture.open(SignatureTarget::Notes);

        let mut called = false;
        let result = capture.commit(|_, _| called = true);
        assert!(matches!(result, Err(SignatureError::Empty)));
        assert!(!called);
        assert!(capture.is_open());
    }

    #[test]
    fn test_reopen_replaces_target_and_discards_strokes() {
        let mut capture = SignatureCapture::new();
        assert_eq!(capture.open(cell(0)), None);
        capture.pad_mut().unwrap().begin_stroke(3.0, 3.0);

        let replaced = capture.open(SignatureTarget::Technician {
            collection: "chilledWater1".to_string(),
        });
        assert_eq!(replaced, Some(cell(0)));
        assert!(capture.pad_mut().unwrap().is_empty());
        assert_eq!(
            capture.target(),
            Some(&SignatureTarget::Technician {
                collection: "chilledWater1".to_string()
            })
        );
    }

    #[test]
    fn test_cancel_and_closed_state() {
        let mut capture = SignatureCapture::new();
        assert!(matches!(capture.cancel(), Err(SignatureError::NotOpen)));
        assert!(matches!(capture.commit(|_, _| ()), Err(SignatureError::NotOpen)));

        capture.open(cell(1));
        capture.pad_mut().unwrap().begin_stroke(1.0, 1.0);
        assert_eq!(capture.cancel().unwrap(), cell(1));
        assert!(!capture.is_open());
        assert!(capture.pad_mut().is_none());
    }
}
