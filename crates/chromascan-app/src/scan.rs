// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch scanning: select the input files, scan each one and collect the
// outcomes into a report.

use std::path::{Path, PathBuf};

use chromascan_core::ScanConfig;
use chromascan_core::error::Result;
use chromascan_core::types::{BatchReport, DocumentReport, FileOutcome};
use chromascan_document::{ColorDetector, PdfReader, RasterInspector};
use tracing::{info, instrument, warn};

/// Runs the detector over a list of files.
pub struct BatchRunner {
    config: ScanConfig,
    detector: ColorDetector,
    inspector: RasterInspector,
}

impl BatchRunner {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            detector: ColorDetector::new(&config),
            inspector: RasterInspector::new(config.raster_threshold),
            config,
        }
    }

    /// Drop deny-listed files and files outside the size window, then order
    /// the rest smallest first. Excluded files are listed in `report`.
    pub fn select_files(&self, paths: &[PathBuf], report: &mut BatchReport) -> Result<Vec<PathBuf>> {
        let mut selected = Vec::with_capacity(paths.len());
        for path in paths {
            let size = std::fs::metadata(path)?.len();
            if self.config.is_skipped(path) || !self.config.accepts_size(size) {
                info!(path = %path.display(), size, "Skipping file");
                report.skipped.push(path.display().to_string());
                continue;
            }
            selected.push((size, path.clone()));
        }
        selected.sort();
        Ok(selected.into_iter().map(|(_, path)| path).collect())
    }

    /// Scan every selected file. Stops at the first file that does not pass
    /// unless `keep_going` is set.
    pub fn run(&self, paths: &[PathBuf]) -> Result<BatchReport> {
        let mut report = BatchReport::new();
        let files = self.select_files(paths, &mut report)?;
        let total = files.len();

        for (index, path) in files.iter().enumerate() {
            let outcome = self.scan_file(path);
            eprintln!("{:3} of {} {}", index + 1, total, progress_line(path, &outcome));
            let passed = matches!(outcome, FileOutcome::Pass(_));
            report.files.push(outcome);
            if !passed && !self.config.keep_going {
                warn!(path = %path.display(), "Stopping after failure");
                break;
            }
        }
        Ok(report)
    }

    /// Scan one file and, if reference renderings are configured, compare.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn scan_file(&self, path: &Path) -> FileOutcome {
        let report = match PdfReader::open(path).and_then(|reader| reader.scan(&self.detector)) {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, kind = ?err.kind(), "File could not be scanned");
                return FileOutcome::bad(path.display().to_string(), &err);
            }
        };

        let Some(reference) = self.reference_dir(path) else {
            return FileOutcome::Pass(report);
        };
        match self.inspector.compare_pages(&report.color_pages, &reference) {
            Ok(comparison) if comparison.is_match() => FileOutcome::Pass(report),
            Ok(comparison) => {
                warn!(
                    false_positives = ?comparison.false_positives,
                    false_negatives = ?comparison.false_negatives,
                    "Detector disagrees with reference renderings"
                );
                FileOutcome::Fail { report, comparison }
            }
            Err(err) => FileOutcome::bad(path.display().to_string(), &err),
        }
    }

    /// `<reference_dir>/<file stem>`, if that directory exists.
    fn reference_dir(&self, path: &Path) -> Option<PathBuf> {
        let dir = self.config.reference_dir.as_ref()?.join(path.file_stem()?);
        if dir.is_dir() {
            Some(dir)
        } else {
            warn!(dir = %dir.display(), "No reference renderings");
            None
        }
    }
}

fn progress_line(path: &Path, outcome: &FileOutcome) -> String {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let summary = |report: &DocumentReport| {
        format!(
            "{} pages {} color {:.3} sec",
            report.page_count,
            report.color_pages.len(),
            report.elapsed_ms as f64 / 1000.0
        )
    };
    match outcome {
        FileOutcome::Pass(report) => format!("{:<30} {}, pass", name, summary(report)),
        FileOutcome::Fail { report, .. } => format!("{:<30} {}, fail", name, summary(report)),
        FileOutcome::Bad { error, .. } => format!("{:<30} bad: {}", name, error),
    }
}
