// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Color module: colorspaces, color values and tint-transform functions.

pub mod function;
pub mod space;
pub mod value;

pub use function::Function;
pub use space::ColorSpace;
pub use value::{Color, PatternColor, is_color_colored};
