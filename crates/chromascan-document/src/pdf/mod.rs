// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: document access through `lopdf`.

pub mod object;
pub mod reader;

#[cfg(test)]
pub(crate) mod fixtures;

pub use reader::PdfReader;
