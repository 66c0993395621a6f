// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream replay with graphics-state tracking.
//
// The processor owns the graphics state. For every operation it first applies
// the operation's effect on that state, then hands the operation and the
// updated state to an `OperationHandler`, which may stop the replay early.

use std::ops::ControlFlow;

use chromascan_core::error::{ChromascanError, Result};
use lopdf::Object;
use lopdf::content::Operation;

use super::lexer::parse_content;
use crate::color::{Color, ColorSpace, PatternColor};
use crate::pdf::object::{as_number, kind_name};
use crate::resources::ResourceResolver;

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// The parts of the PDF graphics state that color detection depends on.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    /// Current transformation matrix `[a b c d e f]`.
    pub ctm: [f64; 6],
    pub stroke_space: ColorSpace,
    pub stroke_color: Color,
    pub fill_space: ColorSpace,
    pub fill_color: Color,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            stroke_space: ColorSpace::DeviceGray,
            stroke_color: Color::DeviceGray(0.0),
            fill_space: ColorSpace::DeviceGray,
            fill_color: Color::DeviceGray(0.0),
        }
    }
}

/// Which of the two current colors an operator targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    Stroke,
    Fill,
}

impl GraphicsState {
    pub fn space(&self, paint: Paint) -> &ColorSpace {
        match paint {
            Paint::Stroke => &self.stroke_space,
            Paint::Fill => &self.fill_space,
        }
    }

    pub fn color(&self, paint: Paint) -> &Color {
        match paint {
            Paint::Stroke => &self.stroke_color,
            Paint::Fill => &self.fill_color,
        }
    }

    fn set(&mut self, paint: Paint, space: Option<ColorSpace>, color: Color) {
        let (slot_space, slot_color) = match paint {
            Paint::Stroke => (&mut self.stroke_space, &mut self.stroke_color),
            Paint::Fill => (&mut self.fill_space, &mut self.fill_color),
        };
        if let Some(space) = space {
            *slot_space = space;
        }
        *slot_color = color;
    }
}

/// Receives every operation after the graphics state has been updated.
pub trait OperationHandler<R: ResourceResolver> {
    fn handle(&mut self, op: &Operation, state: &GraphicsState, resources: &R)
    -> Result<ControlFlow<()>>;
}

/// Replays content streams against a resource resolver.
pub struct ContentProcessor<'r, R> {
    resources: &'r R,
    state: GraphicsState,
    saved: Vec<GraphicsState>,
}

impl<'r, R: ResourceResolver> ContentProcessor<'r, R> {
    pub fn new(resources: &'r R) -> Self {
        Self::with_state(resources, GraphicsState::default())
    }

    /// Start from an inherited graphics state, as a form XObject does.
    pub fn with_state(resources: &'r R, state: GraphicsState) -> Self {
        Self {
            resources,
            state,
            saved: Vec::new(),
        }
    }

    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    /// Tokenize `content` and replay it.
    pub fn process(
        &mut self,
        content: &[u8],
        handler: &mut impl OperationHandler<R>,
    ) -> Result<ControlFlow<()>> {
        let operations = parse_content(content)?;
        self.replay(&operations, handler)
    }

    pub fn replay(
        &mut self,
        operations: &[Operation],
        handler: &mut impl OperationHandler<R>,
    ) -> Result<ControlFlow<()>> {
        for op in operations {
            self.apply(op)?;
            if handler.handle(op, &self.state, self.resources)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn apply(&mut self, op: &Operation) -> Result<()> {
        match op.operator.as_str() {
            "q" => self.saved.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.saved.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                let m = numbers(op, Some(6))?;
                self.state.ctm = multiply([m[0], m[1], m[2], m[3], m[4], m[5]], self.state.ctm);
            }
            "CS" => self.set_space(op, Paint::Stroke)?,
            "cs" => self.set_space(op, Paint::Fill)?,
            "SC" | "SCN" => self.set_color(op, Paint::Stroke)?,
            "sc" | "scn" => self.set_color(op, Paint::Fill)?,
            "G" => self.set_device(op, Paint::Stroke, ColorSpace::DeviceGray)?,
            "g" => self.set_device(op, Paint::Fill, ColorSpace::DeviceGray)?,
            "RG" => self.set_device(op, Paint::Stroke, ColorSpace::DeviceRgb)?,
            "rg" => self.set_device(op, Paint::Fill, ColorSpace::DeviceRgb)?,
            "K" => self.set_device(op, Paint::Stroke, ColorSpace::DeviceCmyk)?,
            "k" => self.set_device(op, Paint::Fill, ColorSpace::DeviceCmyk)?,
            _ => {}
        }
        Ok(())
    }

    fn set_space(&mut self, op: &Operation, paint: Paint) -> Result<()> {
        let name = single_name(op)?;
        let space = self.resources.color_space(name)?;
        let color = space.initial_color()?;
        self.state.set(paint, Some(space), color);
        Ok(())
    }

    fn set_color(&mut self, op: &Operation, paint: Paint) -> Result<()> {
        let color = match self.state.space(paint) {
            ColorSpace::Pattern { underlying } => {
                let Some((Object::Name(name), components)) = op.operands.split_last() else {
                    return Err(ChromascanError::operand(
                        &op.operator,
                        "pattern color must end with a pattern name",
                    ));
                };
                let components = numbers_of(op, components)?;
                let underlying = match (underlying, components.is_empty()) {
                    (_, true) => None,
                    (Some(base), false) => Some(Box::new(base.color_from_components(&components)?)),
                    (None, false) => {
                        return Err(ChromascanError::operand(
                            &op.operator,
                            "components given for a pattern without an underlying colorspace",
                        ));
                    }
                };
                Color::Pattern(PatternColor {
                    name: name.clone(),
                    underlying,
                })
            }
            space => space
                .color_from_components(&numbers(op, None)?)
                .map_err(|err| ChromascanError::operand(&op.operator, err.to_string()))?,
        };
        self.state.set(paint, None, color);
        Ok(())
    }

    fn set_device(&mut self, op: &Operation, paint: Paint, space: ColorSpace) -> Result<()> {
        let values = numbers(op, Some(space.components()))?;
        let color = space.color_from_components(&values)?;
        self.state.set(paint, Some(space), color);
        Ok(())
    }
}

fn numbers(op: &Operation, expected: Option<usize>) -> Result<Vec<f64>> {
    if let Some(expected) = expected {
        if op.operands.len() != expected {
            return Err(ChromascanError::operand(
                &op.operator,
                format!("expected {} operands, got {}", expected, op.operands.len()),
            ));
        }
    }
    numbers_of(op, &op.operands)
}

fn numbers_of(op: &Operation, operands: &[Object]) -> Result<Vec<f64>> {
    operands
        .iter()
        .map(|operand| {
            as_number(operand).ok_or_else(|| {
                ChromascanError::operand(
                    &op.operator,
                    format!("expected number, found {}", kind_name(operand)),
                )
            })
        })
        .collect()
}

/// The sole name operand of `op`.
pub fn single_name(op: &Operation) -> Result<&[u8]> {
    match op.operands.as_slice() {
        [Object::Name(name)] => Ok(name),
        [other] => Err(ChromascanError::operand(
            &op.operator,
            format!("expected name, found {}", kind_name(other)),
        )),
        operands => Err(ChromascanError::operand(
            &op.operator,
            format!("expected 1 operand, got {}", operands.len()),
        )),
    }
}

/// `m × ctm`, the effect of `cm` on the current matrix.
fn multiply(m: [f64; 6], ctm: [f64; 6]) -> [f64; 6] {
    [
        m[0] * ctm[0] + m[1] * ctm[2],
        m[0] * ctm[1] + m[1] * ctm[3],
        m[2] * ctm[0] + m[3] * ctm[2],
        m[2] * ctm[1] + m[3] * ctm[3],
        m[4] * ctm[0] + m[5] * ctm[2] + ctm[4],
        m[4] * ctm[1] + m[5] * ctm[3] + ctm[5],
    ]
}
