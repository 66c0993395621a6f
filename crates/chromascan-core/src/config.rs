// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Smallest normalized channel difference that is visible on a typical
/// mid-range color laser printer.
pub const COLOR_TOLERANCE: f64 = 3.1 / 255.0;

/// Channel difference above which a pixel of a rendered page image counts as
/// colored. Rasterizers anti-alias edges, so this is looser than
/// [`COLOR_TOLERANCE`].
pub const RASTER_THRESHOLD: f64 = 5.0 / 255.0;

/// Default bound on Form XObject / tiling pattern nesting.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 32;

/// Settings for a detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Channel difference (0.0-1.0) a color must exceed to count as colored.
    pub color_tolerance: f64,
    /// Channel difference (0.0-1.0) used when inspecting rendered page images.
    pub raster_threshold: f64,
    /// Maximum depth of nested forms and tiling patterns before giving up.
    pub max_nesting_depth: usize,
    /// File names that are never scanned (known pathological inputs).
    pub skip_files: Vec<String>,
    /// Skip files smaller than this many bytes.
    pub min_file_size: Option<u64>,
    /// Skip files of this many bytes or more. The bound is exclusive, unlike
    /// `min_file_size`.
    pub max_file_size: Option<u64>,
    /// Keep scanning the remaining files after one fails.
    pub keep_going: bool,
    /// Directory of rendered page images (`<stem>/doc-NNN.png`) to
    /// cross-check detector verdicts against.
    pub reference_dir: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            color_tolerance: COLOR_TOLERANCE,
            raster_threshold: RASTER_THRESHOLD,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            skip_files: Vec::new(),
            min_file_size: None,
            max_file_size: None,
            keep_going: false,
            reference_dir: None,
        }
    }
}

impl ScanConfig {
    /// Load a config from a JSON file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Whether `path` is on the deny-list (matched by file name).
    pub fn is_skipped(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.skip_files.iter().any(|skip| skip == name)
    }

    /// Whether a file of `size` bytes falls inside the configured size window
    /// `[min_file_size, max_file_size)`.
    pub fn accepts_size(&self, size: u64) -> bool {
        self.min_file_size.is_none_or(|min| size >= min)
            && self.max_file_size.is_none_or(|max| size < max)
    }
}
