// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content module: tokenizing and replaying page content streams.

pub mod lexer;
pub mod processor;

pub use lexer::parse_content;
pub use processor::{ContentProcessor, GraphicsState, OperationHandler, Paint};
