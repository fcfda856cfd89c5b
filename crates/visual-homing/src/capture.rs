//! Raw view loading.

use std::path::Path;

use image::RgbImage;

use crate::types::{HomingError, HomingResult};

/// Load a color view from an image file.
pub fn load_view(path: &Path) -> HomingResult<RgbImage> {
    let img = image::open(path)?;
    let view = img.to_rgb8();
    check_non_empty(&view)?;
    Ok(view)
}

/// Decode a color view from encoded image bytes (PNG, JPEG, ...).
pub fn load_view_from_memory(bytes: &[u8]) -> HomingResult<RgbImage> {
    let view = image::load_from_memory(bytes)?.to_rgb8();
    check_non_empty(&view)?;
    Ok(view)
}

fn check_non_empty(view: &RgbImage) -> HomingResult<()> {
    if view.width() == 0 || view.height() == 0 {
        return Err(HomingError::InvalidInput("view is empty".to_string()));
    }
    Ok(())
}

/// Check if a file path points to a supported image format.
pub fn is_supported_format(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" | "tiff" | "tif" | "pnm" | "ppm"
    )
}

/// List the views in a directory in file-name order.
pub fn list_views(dir: &Path) -> HomingResult<Vec<std::path::PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_format(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
