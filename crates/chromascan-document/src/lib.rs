// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// chromascan-document: colored-page detection for PDF documents.
//
// Reads documents with `lopdf`, replays page content streams while tracking
// the graphics state, and decides for each page whether anything drawn on it
// is colored. Also checks rendered page images for colored pixels so that
// detector output can be compared against a rasterizer.

pub mod color;
pub mod content;
pub mod detect;
pub mod image;
pub mod pdf;
pub mod resources;

// Re-export the primary types so callers can use `chromascan_document::PdfReader` etc.
pub use color::{Color, ColorSpace, is_color_colored};
pub use detect::ColorDetector;
pub use image::raster::RasterInspector;
pub use image::samples::is_rgb_image_colored;
pub use pdf::reader::PdfReader;
pub use resources::{PdfResources, ResourceResolver};
