// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: PDF image sample decoding and rendered-raster inspection.

pub mod raster;
pub mod samples;

pub use raster::RasterInspector;
pub use samples::{PdfImage, RgbRaster, is_rgb_image_colored};
