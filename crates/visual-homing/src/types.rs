//! Core data types for snapshots, match results, waypoints, and errors.

use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

/// A normalized single-channel view, the unit of comparison for perfect memory.
///
/// Samples are 8-bit fixed point: a value of `v` stands for `v / 255` of the
/// view's unit L2 norm. Every snapshot owns its pixel buffer, so a snapshot
/// handed out by the processor or stored in memory never aliases another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    image: GrayImage,
}

impl Snapshot {
    /// Create an all-zero snapshot.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    /// Wrap an existing grayscale image.
    pub fn from_gray(image: GrayImage) -> Self {
        Self { image }
    }

    /// Build a snapshot from row-major samples.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> HomingResult<Self> {
        let expected = (width as usize) * (height as usize);
        let actual = data.len();
        ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(width, height, data)
            .map(Self::from_gray)
            .ok_or_else(|| {
                HomingError::InvalidInput(format!(
                    "snapshot {width}x{height} needs {expected} samples, got {actual}"
                ))
            })
    }

    /// Build a snapshot by evaluating `f(x, y)` for every sample.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Self {
        Self {
            image: GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)` of the snapshot.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Sample at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y).0[0]
    }

    /// Row-major sample buffer.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    /// Circularly shift every row right by `num_right` columns into `out`.
    ///
    /// Columns pushed past the right edge reappear on the left, which for a
    /// panoramic view is the same as turning on the spot. `out` is resized
    /// when its dimensions differ.
    pub fn shift_columns_into(&self, num_right: usize, out: &mut GrayImage) {
        let (width, height) = self.dimensions();
        if out.dimensions() != (width, height) {
            *out = GrayImage::new(width, height);
        }

        let cols = width as usize;
        if cols == 0 {
            return;
        }
        let shift = num_right % cols;
        let src = self.image.as_raw();
        let dst: &mut [u8] = &mut *out;

        for (src_row, dst_row) in src.chunks_exact(cols).zip(dst.chunks_exact_mut(cols)) {
            dst_row[shift..].copy_from_slice(&src_row[..cols - shift]);
            dst_row[..shift].copy_from_slice(&src_row[cols - shift..]);
        }
    }

    /// Return a copy shifted right by `num_right` columns.
    pub fn shifted(&self, num_right: usize) -> Snapshot {
        let mut out = GrayImage::new(self.width(), self.height());
        self.shift_columns_into(num_right, &mut out);
        Snapshot::from_gray(out)
    }

    /// Sum of absolute per-sample differences against a same-sized buffer.
    pub fn sum_abs_diff(&self, other: &[u8]) -> u64 {
        sum_abs_diff(self.as_raw(), other)
    }
}

/// Sum of absolute differences between two equally sized sample buffers.
pub fn sum_abs_diff(a: &[u8], b: &[u8]) -> u64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum()
}

/// Outcome of a rotational perfect-memory query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Rotation of the query relative to the best match, radians in `[0, 2π)`.
    pub heading: f64,
    /// Insertion index of the best-matching stored snapshot.
    pub snapshot_index: usize,
    /// Minimum sum of absolute differences; lower is better.
    pub match_value: f64,
}

impl MatchResult {
    pub fn heading_degrees(&self) -> f64 {
        self.heading.to_degrees()
    }
}

/// A sparse point on a learned route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f32,
    pub y: f32,
    /// Heading towards the next waypoint in degrees, 0 along +y, clockwise.
    pub heading: f32,
    /// Caller-assigned familiarity in `[0, 1]`.
    pub familiarity: f32,
}

/// Errors that can occur in the homing library.
#[derive(thiserror::Error, Debug)]
pub enum HomingError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Snapshot dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Perfect memory is empty; train at least one snapshot before testing")]
    EmptyMemory,

    #[error("Route needs at least 2 waypoints for segment queries, has {0}")]
    InsufficientWaypoints(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Waypoint {index} out of range (route has {len})")]
    WaypointOutOfRange { index: usize, len: usize },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Convenience result type.
pub type HomingResult<T> = Result<T, HomingError>;
