// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open documents with `lopdf`, hand out page content and
// resources, and run the color detector over every page.

use std::path::Path;
use std::time::Instant;

use chromascan_core::error::{ChromascanError, Result};
use chromascan_core::types::DocumentReport;
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, info, instrument};

use super::object::{self, kind_name};
use crate::detect::ColorDetector;
use crate::resources::{PdfResources, ScopeId};

/// Upper bound on `/Parent` hops when looking for inherited resources.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Read-only access to the pages of a PDF document.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            ChromascanError::Pdf(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        let mut reader = Self::from_document(document)?;
        reader.source_path = Some(path_ref.display().to_string());
        Ok(reader)
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            ChromascanError::Pdf(format!("failed to load PDF from memory: {}", err))
        })?;
        Self::from_document(document)
    }

    /// Wrap an already-loaded document.
    pub fn from_document(document: Document) -> Result<Self> {
        if document.is_encrypted() {
            return Err(ChromascanError::Encrypted);
        }
        debug!(pages = document.get_pages().len(), "PDF loaded");
        Ok(Self {
            document,
            source_path: None,
        })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Return the source path if the reader was created via [`PdfReader::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Object id of page `page_number` (1-indexed).
    pub fn page_id(&self, page_number: u32) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        pages.get(&page_number).copied().ok_or_else(|| {
            ChromascanError::Pdf(format!(
                "page {} out of range (document has {} pages)",
                page_number,
                pages.len()
            ))
        })
    }

    /// Decoded content of a page: all of its content streams joined by
    /// newlines. Pages without `/Contents` have empty content.
    pub fn page_content(&self, page_number: u32) -> Result<Vec<u8>> {
        let page_id = self.page_id(page_number)?;
        let page = self.page_dictionary(page_id)?;
        let streams = match object::lookup(&self.document, page, b"Contents")? {
            None | Some(Object::Null) => return Ok(Vec::new()),
            Some(Object::Array(parts)) => parts
                .iter()
                .map(|part| object::resolve(&self.document, part).map(|(_, direct)| direct))
                .collect::<Result<Vec<_>>>()?,
            Some(single) => vec![single],
        };

        let mut content = Vec::new();
        for stream in streams {
            let Object::Stream(stream) = stream else {
                return Err(ChromascanError::malformed(
                    "page contents",
                    format!("expected stream, found {}", kind_name(stream)),
                ));
            };
            if !content.is_empty() {
                content.push(b'\n');
            }
            content.extend_from_slice(&object::stream_bytes(stream)?);
        }
        Ok(content)
    }

    /// Resources of a page, inherited through `/Parent` when the page has
    /// none of its own.
    pub fn page_resources(&self, page_number: u32) -> Result<PdfResources<'_>> {
        let page_id = self.page_id(page_number)?;
        let mut node_id = page_id;
        let mut node = self.page_dictionary(page_id)?;
        for _ in 0..MAX_PAGE_TREE_DEPTH {
            if let Some(resources) = PdfResources::of(&self.document, node, node_id)? {
                return Ok(resources);
            }
            let Ok(Object::Reference(parent_id)) = node.get(b"Parent") else {
                break;
            };
            node_id = *parent_id;
            node = self.document.get_dictionary(node_id).map_err(|err| {
                ChromascanError::Pdf(format!("cannot read page tree node {:?}: {}", node_id, err))
            })?;
        }
        debug!(page_number, "Page has no resources");
        Ok(PdfResources::new(&self.document, None, ScopeId(page_id)))
    }

    // -- Detection ------------------------------------------------------------

    pub fn is_page_colored(&self, detector: &ColorDetector, page_number: u32) -> Result<bool> {
        detector.is_page_colored(self, page_number)
    }

    /// 1-based numbers of the pages holding colored marks, in order.
    pub fn color_pages(&self, detector: &ColorDetector) -> Result<Vec<u32>> {
        Ok(self.scan(detector)?.color_pages)
    }

    /// Evaluate every page and summarise the result.
    #[instrument(skip_all, fields(path = self.source_path.as_deref().unwrap_or("<memory>")))]
    pub fn scan(&self, detector: &ColorDetector) -> Result<DocumentReport> {
        let started = Instant::now();
        let page_count = self.page_count();
        let verdicts = self
            .document
            .get_pages()
            .into_keys()
            .map(|page_number| detector.evaluate_page(self, page_number))
            .collect::<Result<Vec<_>>>()?;

        let report = DocumentReport::from_verdicts(
            self.source_path.clone(),
            page_count,
            &verdicts,
            started.elapsed().as_millis(),
        );
        info!(
            pages = page_count,
            color_pages = report.color_pages.len(),
            elapsed_ms = report.elapsed_ms,
            "Document scanned"
        );
        Ok(report)
    }

    // -- Helpers --------------------------------------------------------------

    fn page_dictionary(&self, page_id: ObjectId) -> Result<&lopdf::Dictionary> {
        self.document.get_dictionary(page_id).map_err(|err| {
            ChromascanError::Pdf(format!("cannot read page object {:?}: {}", page_id, err))
        })
    }
}
