//! Snapshot preprocessing: raw color view to normalized, rotation-comparable snapshot.

use std::time::Instant;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbImage};

use crate::clahe::Clahe;
use crate::config::ProcessorConfig;
use crate::types::{HomingError, HomingResult, Snapshot};

/// Converts raw views into [`Snapshot`]s.
///
/// The pipeline is: downsample to the intermediate resolution, convert to
/// grayscale, invert, equalize with CLAHE, downsample to the output
/// resolution with a cubic filter, then scale to unit L2 norm in 8-bit fixed
/// point. The greyscale and equalized buffers at the intermediate resolution
/// live in the processor and are reused; the resized images are allocated by
/// `imageops::resize` on every call.
#[derive(Debug, Clone)]
pub struct SnapshotProcessor {
    config: ProcessorConfig,
    clahe: Clahe,
    greyscale: GrayImage,
    equalized: GrayImage,
    last: Snapshot,
}

impl SnapshotProcessor {
    pub fn new(config: ProcessorConfig) -> HomingResult<Self> {
        config.validate()?;
        Ok(Self {
            clahe: Clahe::new(&config.clahe),
            greyscale: GrayImage::new(config.intermediate_width, config.intermediate_height),
            equalized: GrayImage::new(config.intermediate_width, config.intermediate_height),
            last: Snapshot::new(config.output_width, config.output_height),
            config,
        })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// `(width, height)` of every snapshot this processor produces.
    pub fn output_dimensions(&self) -> (u32, u32) {
        (self.config.output_width, self.config.output_height)
    }

    /// The most recently produced snapshot.
    pub fn last_snapshot(&self) -> &Snapshot {
        &self.last
    }

    /// Process any decoded image, converting it to RGB first.
    pub fn process_dynamic(&mut self, view: &DynamicImage) -> HomingResult<Snapshot> {
        self.process(&view.to_rgb8())
    }

    /// Turn one raw color view into a normalized snapshot.
    pub fn process(&mut self, view: &RgbImage) -> HomingResult<Snapshot> {
        let _span = tracing::debug_span!("snapshot_process").entered();
        let start = Instant::now();

        let cfg = self.config;
        let (view_w, view_h) = view.dimensions();
        if view_w == 0 || view_h == 0 {
            return Err(HomingError::InvalidInput("view is empty".to_string()));
        }
        if view_w < cfg.intermediate_width || view_h < cfg.intermediate_height {
            return Err(HomingError::InvalidInput(format!(
                "view {view_w}x{view_h} is smaller than intermediate resolution {}x{}",
                cfg.intermediate_width, cfg.intermediate_height
            )));
        }

        let intermediate = imageops::resize(
            view,
            cfg.intermediate_width,
            cfg.intermediate_height,
            FilterType::Triangle,
        );

        // Inverted so the darker ground carries more weight than the sky.
        for (rgb, grey) in intermediate.pixels().zip(self.greyscale.pixels_mut()) {
            grey.0[0] = 255 - luma(rgb.0);
        }

        self.clahe.apply(&self.greyscale, &mut self.equalized);

        let mut output = imageops::resize(
            &self.equalized,
            cfg.output_width,
            cfg.output_height,
            FilterType::CatmullRom,
        );
        normalize_l2(&mut output);

        self.last = Snapshot::from_gray(output);
        tracing::debug!(
            "Processed {view_w}x{view_h} view in {:.3} ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(self.last.clone())
    }
}

/// ITU-R BT.601 luma in 14-bit fixed point.
fn luma([r, g, b]: [u8; 3]) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    ((u32::from(r) * R + u32::from(g) * G + u32::from(b) * B + (1 << 13)) >> 14) as u8
}

/// Scale samples so the image has unit L2 norm, with 255 standing for 1.
fn normalize_l2(image: &mut GrayImage) {
    let sum_sq: f64 = image.as_raw().iter().map(|&v| f64::from(v).powi(2)).sum();
    let norm = sum_sq.sqrt() / 255.0;
    if norm == 0.0 {
        return;
    }
    for sample in image.iter_mut() {
        *sample = (f64::from(*sample) / norm).round().min(255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn processor() -> SnapshotProcessor {
        SnapshotProcessor::new(ProcessorConfig::default()).unwrap()
    }

    fn textured_view(width: u32, height: u32, phase: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = ((x + phase) * 7 + y * 3) % 256;
            let ground = if y > height / 2 { 40 } else { 200 };
            Rgb([v as u8, ground, (255 - v) as u8])
        })
    }

    #[test]
    fn test_luma_weights() {
        assert_eq!(luma([0, 0, 0]), 0);
        assert_eq!(luma([255, 255, 255]), 255);
        assert_eq!(luma([255, 0, 0]), 76);
        assert_eq!(luma([0, 255, 0]), 150);
        assert_eq!(luma([0, 0, 255]), 29);
    }

    #[test]
    fn test_output_resolution() {
        let mut proc = processor();
        let snap = proc.process(&textured_view(720, 200, 0)).unwrap();
        assert_eq!(snap.dimensions(), (36, 10));
        assert_eq!(proc.output_dimensions(), (36, 10));
    }

    #[test]
    fn test_black_view_normalizes_to_flat_unit_vector() {
        // Black inverts to white, stays flat through CLAHE and resizing, then
        // each of the 360 samples becomes 255 / sqrt(360) ~= 13.4.
        let mut proc = processor();
        let snap = proc.process(&RgbImage::new(148, 38)).unwrap();
        assert!(snap.as_raw().iter().all(|&v| v == 13));
    }

    #[test]
    fn test_output_has_unit_norm() {
        let mut proc = processor();
        let snap = proc.process(&textured_view(300, 90, 5)).unwrap();
        let norm = snap
            .as_raw()
            .iter()
            .map(|&v| f64::from(v).powi(2))
            .sum::<f64>()
            .sqrt();
        assert!((norm - 255.0).abs() < 255.0 * 0.05, "norm was {norm}");
    }

    #[test]
    fn test_deterministic() {
        let view = textured_view(400, 120, 11);
        let a = processor().process(&view).unwrap();
        let b = processor().process(&view).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_result_is_independent_of_later_calls() {
        let mut proc = processor();
        let first = proc.process(&textured_view(300, 90, 0)).unwrap();
        let kept = first.clone();
        let second = proc.process(&RgbImage::new(300, 90)).unwrap();
        assert_eq!(first, kept);
        assert_eq!(proc.last_snapshot(), &second);
    }

    #[test]
    fn test_rejects_small_and_empty_views() {
        let mut proc = processor();
        assert!(matches!(
            proc.process(&RgbImage::new(0, 0)),
            Err(HomingError::InvalidInput(_))
        ));
        assert!(matches!(
            proc.process(&RgbImage::new(50, 50)),
            Err(HomingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_process_dynamic() {
        let mut proc = processor();
        let img = DynamicImage::new_rgba8(200, 60);
        let snap = proc.process_dynamic(&img).unwrap();
        assert_eq!(snap.dimensions(), (36, 10));
    }

    #[test]
    fn test_intermediate_buffers_reused() {
        let mut proc = processor();
        proc.process(&textured_view(300, 90, 0)).unwrap();
        let greyscale = proc.greyscale.as_raw().as_ptr();
        let equalized = proc.equalized.as_raw().as_ptr();

        proc.process(&textured_view(500, 150, 3)).unwrap();
        assert_eq!(proc.greyscale.as_raw().as_ptr(), greyscale);
        assert_eq!(proc.equalized.as_raw().as_ptr(), equalized);
        assert_eq!(proc.greyscale.dimensions(), (74, 19));
    }
}
