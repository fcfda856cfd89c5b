//! Contrast-limited adaptive histogram equalization for 8-bit grayscale images.
//!
//! The image is split into a grid of tiles. Each tile gets its own clipped
//! histogram and cumulative lookup table, and every output pixel blends the
//! lookup tables of the four tiles whose centres surround it. Images whose
//! size is not a multiple of the grid are padded by reflection (without
//! repeating the border sample) before the histograms are built.

use image::GrayImage;

use crate::config::ClaheConfig;

const HIST_SIZE: usize = 256;

/// Reusable CLAHE operator; keeps its lookup tables between calls.
#[derive(Debug, Clone)]
pub struct Clahe {
    clip_limit: f64,
    tiles_x: usize,
    tiles_y: usize,
    luts: Vec<u8>,
}

impl Clahe {
    pub fn new(config: &ClaheConfig) -> Self {
        let tiles_x = config.tile_grid_width.max(1) as usize;
        let tiles_y = config.tile_grid_height.max(1) as usize;
        Self {
            clip_limit: config.clip_limit,
            tiles_x,
            tiles_y,
            luts: vec![0; tiles_x * tiles_y * HIST_SIZE],
        }
    }

    /// Equalize `src` into `dst`, resizing `dst` when needed.
    pub fn apply(&mut self, src: &GrayImage, dst: &mut GrayImage) {
        let (width, height) = src.dimensions();
        if dst.dimensions() != (width, height) {
            *dst = GrayImage::new(width, height);
        }
        if width == 0 || height == 0 {
            return;
        }

        let (w, h) = (width as usize, height as usize);
        let padded_w = w + (self.tiles_x - w % self.tiles_x) % self.tiles_x;
        let padded_h = h + (self.tiles_y - h % self.tiles_y) % self.tiles_y;
        let tile_w = padded_w / self.tiles_x;
        let tile_h = padded_h / self.tiles_y;

        self.build_luts(src, tile_w, tile_h);
        self.interpolate(src, dst, tile_w, tile_h);
    }

    fn build_luts(&mut self, src: &GrayImage, tile_w: usize, tile_h: usize) {
        let (w, h) = (src.width() as usize, src.height() as usize);
        let pixels = src.as_raw();
        let tile_area = tile_w * tile_h;

        let clip = if self.clip_limit > 0.0 {
            Some(((self.clip_limit * tile_area as f64 / HIST_SIZE as f64) as usize).max(1))
        } else {
            None
        };
        let lut_scale = (HIST_SIZE - 1) as f64 / tile_area as f64;

        let mut hist = [0usize; HIST_SIZE];
        for ty in 0..self.tiles_y {
            for tx in 0..self.tiles_x {
                hist.fill(0);
                for py in ty * tile_h..(ty + 1) * tile_h {
                    let row = reflect_101(py, h) * w;
                    for px in tx * tile_w..(tx + 1) * tile_w {
                        hist[pixels[row + reflect_101(px, w)] as usize] += 1;
                    }
                }

                if let Some(clip) = clip {
                    clip_histogram(&mut hist, clip);
                }

                let lut = &mut self.luts[(ty * self.tiles_x + tx) * HIST_SIZE..][..HIST_SIZE];
                let mut sum = 0usize;
                for (entry, &count) in lut.iter_mut().zip(hist.iter()) {
                    sum += count;
                    *entry = (sum as f64 * lut_scale).round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    fn interpolate(&self, src: &GrayImage, dst: &mut GrayImage, tile_w: usize, tile_h: usize) {
        let w = src.width() as usize;
        let src_pixels = src.as_raw();
        let dst_pixels: &mut [u8] = &mut *dst;

        let columns: Vec<TileBlend> = (0..w)
            .map(|x| TileBlend::new(x, tile_w, self.tiles_x))
            .collect();

        for (y, (src_row, dst_row)) in src_pixels
            .chunks_exact(w)
            .zip(dst_pixels.chunks_exact_mut(w))
            .enumerate()
        {
            let rows = TileBlend::new(y, tile_h, self.tiles_y);
            let lut_top = rows.lower * self.tiles_x;
            let lut_bottom = rows.upper * self.tiles_x;

            for ((&value, out), cols) in src_row.iter().zip(dst_row.iter_mut()).zip(&columns) {
                let v = value as usize;
                let sample = |tile: usize| self.luts[tile * HIST_SIZE + v] as f32;

                let top = sample(lut_top + cols.lower) * cols.lower_weight
                    + sample(lut_top + cols.upper) * cols.upper_weight;
                let bottom = sample(lut_bottom + cols.lower) * cols.lower_weight
                    + sample(lut_bottom + cols.upper) * cols.upper_weight;
                let blended = top * rows.lower_weight + bottom * rows.upper_weight;

                *out = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Neighbouring tile indices and weights along one axis.
#[derive(Debug, Clone, Copy)]
struct TileBlend {
    lower: usize,
    upper: usize,
    lower_weight: f32,
    upper_weight: f32,
}

impl TileBlend {
    fn new(pos: usize, tile_size: usize, tiles: usize) -> Self {
        let f = pos as f32 / tile_size as f32 - 0.5;
        let lower = f.floor();
        let upper_weight = f - lower;
        let lower = lower as i64;
        Self {
            lower: lower.max(0) as usize,
            upper: ((lower + 1) as usize).min(tiles - 1),
            lower_weight: 1.0 - upper_weight,
            upper_weight,
        }
    }
}

/// Clip every bin at `clip` and spread the excess back over the histogram.
fn clip_histogram(hist: &mut [usize; HIST_SIZE], clip: usize) {
    let mut clipped = 0usize;
    for count in hist.iter_mut() {
        if *count > clip {
            clipped += *count - clip;
            *count = clip;
        }
    }

    let batch = clipped / HIST_SIZE;
    let mut residual = clipped - batch * HIST_SIZE;
    for count in hist.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (HIST_SIZE / residual).max(1);
        let mut i = 0;
        while i < HIST_SIZE && residual > 0 {
            hist[i] += 1;
            i += step;
            residual -= 1;
        }
    }
}

/// Mirror an index past the end of `0..len` without repeating the edge.
fn reflect_101(i: usize, len: usize) -> usize {
    if i < len {
        i
    } else if len <= 1 {
        0
    } else {
        (2 * len - 2).saturating_sub(i)
    }
}
