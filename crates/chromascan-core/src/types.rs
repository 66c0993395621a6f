// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Chromascan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChromascanError, ErrorKind};

/// Kinds of named resources a content stream can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    XObject,
    Pattern,
    Shading,
    ColorSpace,
}

impl ResourceKind {
    /// Key of the resource sub-dictionary holding this kind.
    pub fn dictionary_key(&self) -> &'static [u8] {
        match self {
            Self::XObject => b"XObject",
            Self::Pattern => b"Pattern",
            Self::Shading => b"Shading",
            Self::ColorSpace => b"ColorSpace",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::XObject => "XObject",
            Self::Pattern => "pattern",
            Self::Shading => "shading",
            Self::ColorSpace => "colorspace",
        };
        f.write_str(label)
    }
}

/// Outcome of walking a content stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verdict {
    /// Nothing colored seen yet.
    #[default]
    Undetermined,
    /// At least one colored mark was found.
    Colored,
}

impl Verdict {
    pub fn from_bool(colored: bool) -> Self {
        if colored { Self::Colored } else { Self::Undetermined }
    }

    pub fn is_colored(&self) -> bool {
        matches!(self, Self::Colored)
    }
}

/// Counters gathered while evaluating one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Content-stream operations replayed (including nested streams).
    pub operations: usize,
    /// Image XObjects inspected.
    pub xobject_images: usize,
    /// Inline images inspected.
    pub inline_images: usize,
    /// Form XObjects walked.
    pub forms: usize,
    /// Patterns resolved.
    pub patterns: usize,
    /// Shadings resolved.
    pub shadings: usize,
}

impl ScanStats {
    /// Fold another set of counters into this one.
    pub fn absorb(&mut self, other: &ScanStats) {
        self.operations += other.operations;
        self.xobject_images += other.xobject_images;
        self.inline_images += other.inline_images;
        self.forms += other.forms;
        self.patterns += other.patterns;
        self.shadings += other.shadings;
    }
}

/// Detector result for a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageVerdict {
    /// 1-based page number.
    pub page_number: u32,
    pub colored: bool,
    pub stats: ScanStats,
}

/// Detector result for a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub path: Option<String>,
    pub page_count: usize,
    /// 1-based numbers of the pages holding at least one colored mark.
    pub color_pages: Vec<u32>,
    pub stats: ScanStats,
    pub elapsed_ms: u128,
}

impl DocumentReport {
    /// Build a report from per-page verdicts, in page order.
    pub fn from_verdicts(
        path: Option<String>,
        page_count: usize,
        verdicts: &[PageVerdict],
        elapsed_ms: u128,
    ) -> Self {
        let mut stats = ScanStats::default();
        let mut color_pages = Vec::new();
        for verdict in verdicts {
            stats.absorb(&verdict.stats);
            if verdict.colored {
                color_pages.push(verdict.page_number);
            }
        }
        Self {
            path,
            page_count,
            color_pages,
            stats,
            elapsed_ms,
        }
    }
}

/// Difference between detector verdicts and a reference set of color pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageComparison {
    /// Pages the detector called colored that the reference did not.
    pub false_positives: Vec<u32>,
    /// Reference color pages the detector missed.
    pub false_negatives: Vec<u32>,
}

impl PageComparison {
    /// Compare detected color pages against `reference` color pages.
    pub fn between(detected: &[u32], reference: &[u32]) -> Self {
        Self {
            false_positives: detected
                .iter()
                .copied()
                .filter(|page| !reference.contains(page))
                .collect(),
            false_negatives: reference
                .iter()
                .copied()
                .filter(|page| !detected.contains(page))
                .collect(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.false_positives.is_empty() && self.false_negatives.is_empty()
    }
}

/// Per-file outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FileOutcome {
    /// Scanned, and matched the reference rasters if any were configured.
    Pass(DocumentReport),
    /// Scanned, but disagreed with the reference rasters.
    Fail {
        report: DocumentReport,
        comparison: PageComparison,
    },
    /// Could not be scanned.
    Bad {
        path: String,
        kind: ErrorKind,
        error: String,
    },
}

impl FileOutcome {
    /// Outcome for a file whose scan failed with `error`.
    pub fn bad(path: impl Into<String>, error: &ChromascanError) -> Self {
        Self::Bad {
            path: path.into(),
            kind: error.kind(),
            error: error.to_string(),
        }
    }
}

/// Summary of a batch of files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub files: Vec<FileOutcome>,
    /// Files excluded by the deny-list or size window.
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            files: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn pass_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::Pass(_)))
            .count()
    }

    pub fn fail_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::Fail { .. }))
            .count()
    }

    pub fn bad_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::Bad { .. }))
            .count()
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}
