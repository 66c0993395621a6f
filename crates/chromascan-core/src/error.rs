// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Chromascan.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ResourceKind;

/// Top-level error type for all Chromascan operations.
#[derive(Debug, Error)]
pub enum ChromascanError {
    // -- Parse errors --
    #[error("content stream parse error at byte {offset}: {message}")]
    ContentParse { offset: usize, message: String },

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("document is encrypted and cannot be opened without a password")]
    Encrypted,

    // -- Resource resolution --
    #[error("{kind} /{name} is not defined in resources")]
    MissingResource { kind: ResourceKind, name: String },

    // -- Type errors --
    #[error("invalid operands for `{operator}`: {message}")]
    InvalidOperand { operator: String, message: String },

    #[error("expected {expected} color, found {found}")]
    UnexpectedColor {
        expected: &'static str,
        found: &'static str,
    },

    #[error("malformed {what}: {message}")]
    Malformed { what: &'static str, message: String },

    // -- Unsupported input --
    #[error("unsupported colorspace for color detection: {0}")]
    UnsupportedColorSpace(String),

    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),

    #[error("image decoding failed: {0}")]
    Image(String),

    #[error("content nesting exceeds the limit of {0} levels")]
    NestingTooDeep(usize),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`ChromascanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Input bytes could not be tokenized or loaded.
    Parse,
    /// A name referenced from a content stream is missing from resources.
    Resource,
    /// An operand or graphics-state value had the wrong shape.
    Type,
    /// The input uses a colorspace, function or encoding the detector cannot evaluate.
    Unsupported,
    /// Filesystem, serialization or traversal limits.
    Environment,
}

impl ChromascanError {
    /// Which of the error categories this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContentParse { .. } | Self::Pdf(_) | Self::Encrypted => ErrorKind::Parse,
            Self::MissingResource { .. } => ErrorKind::Resource,
            Self::InvalidOperand { .. } | Self::UnexpectedColor { .. } | Self::Malformed { .. } => {
                ErrorKind::Type
            }
            Self::UnsupportedColorSpace(_) | Self::UnsupportedFunction(_) | Self::Image(_) => {
                ErrorKind::Unsupported
            }
            Self::NestingTooDeep(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorKind::Environment
            }
        }
    }

    /// Shorthand for an [`ChromascanError::InvalidOperand`] error.
    pub fn operand(operator: &str, message: impl Into<String>) -> Self {
        Self::InvalidOperand {
            operator: operator.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`ChromascanError::Malformed`] error.
    pub fn malformed(what: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            message: message.into(),
        }
    }

    /// Shorthand for a [`ChromascanError::MissingResource`] error.
    pub fn missing(kind: ResourceKind, name: &[u8]) -> Self {
        Self::MissingResource {
            kind,
            name: String::from_utf8_lossy(name).into_owned(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ChromascanError>;
