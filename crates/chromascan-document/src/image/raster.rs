// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rendered-raster inspector: checks per-page PNG renderings for colored
// pixels, giving a reference to compare detector verdicts against.

use std::path::Path;

use chromascan_core::error::{ChromascanError, Result};
use chromascan_core::types::PageComparison;
use image::DynamicImage;
use tracing::{debug, info, instrument, warn};

use super::samples::{RgbRaster, is_rgb_image_colored};

/// File name prefix of per-page renderings (`doc-001.png`, `doc-002.png`, ...).
const PAGE_PREFIX: &str = "doc-";
const PAGE_SUFFIX: &str = ".png";

/// Looks for colored pixels in rendered page images.
#[derive(Debug, Clone, Copy)]
pub struct RasterInspector {
    /// Largest channel difference still considered gray, as a fraction of
    /// full scale.
    threshold: f64,
}

impl RasterInspector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether any pixel has two channels differing by more than the threshold.
    pub fn is_image_colored(&self, image: &DynamicImage) -> bool {
        let rgb = image.to_rgb16();
        let raster = RgbRaster {
            width: rgb.width(),
            height: rgb.height(),
            bits_per_component: 16,
            samples: rgb.into_raw(),
        };
        is_rgb_image_colored(&raster, self.threshold)
    }

    /// Load an image file and inspect it.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn is_file_colored(&self, path: impl AsRef<Path>) -> Result<bool> {
        let image = image::open(path.as_ref()).map_err(|err| {
            ChromascanError::Image(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        let colored = self.is_image_colored(&image);
        debug!(width = image.width(), height = image.height(), colored, "Raster inspected");
        Ok(colored)
    }

    /// Numbers of the colored pages among the `doc-NNN.png` files in `dir`,
    /// in ascending order.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn color_pages(&self, dir: impl AsRef<Path>) -> Result<Vec<u32>> {
        let mut pages = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(page) = file_name.to_str().and_then(page_number) else {
                continue;
            };
            if self.is_file_colored(entry.path())? {
                pages.push(page);
            }
        }
        pages.sort_unstable();
        if pages.is_empty() {
            warn!("No colored page renderings found");
        }
        info!(color_pages = pages.len(), "Reference rasters inspected");
        Ok(pages)
    }

    /// Compare detector output against the renderings in `dir`.
    pub fn compare_pages(&self, detected: &[u32], dir: impl AsRef<Path>) -> Result<PageComparison> {
        let reference = self.color_pages(dir)?;
        Ok(PageComparison::between(detected, &reference))
    }
}

/// Page number encoded in a rendering's file name.
fn page_number(file_name: &str) -> Option<u32> {
    let digits = file_name.strip_prefix(PAGE_PREFIX)?.strip_suffix(PAGE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
