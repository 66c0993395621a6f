// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF functions (types 0, 2, 3 and 4), used as tint transforms by
// Separation and DeviceN colorspaces.

use chromascan_core::error::{ChromascanError, Result};
use lopdf::{Dictionary, Document, Object};

use crate::pdf::object::{self, kind_name};

/// Operand stack limit for type 4 calculator functions.
const PS_STACK_LIMIT: usize = 100;

/// Nesting limit for type 3 functions built from other functions.
const MAX_FUNCTION_DEPTH: usize = 8;

/// A parsed PDF function mapping `m` inputs to `n` outputs.
#[derive(Debug, Clone)]
pub enum Function {
    Sampled(SampledFunction),
    Exponential(ExponentialFunction),
    Stitching(StitchingFunction),
    PostScript(PostScriptFunction),
}

#[derive(Debug, Clone)]
pub struct SampledFunction {
    domain: Vec<f64>,
    range: Vec<f64>,
    size: Vec<usize>,
    bits_per_sample: u32,
    encode: Vec<f64>,
    decode: Vec<f64>,
    samples: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ExponentialFunction {
    domain: Vec<f64>,
    range: Option<Vec<f64>>,
    c0: Vec<f64>,
    c1: Vec<f64>,
    exponent: f64,
}

#[derive(Debug, Clone)]
pub struct StitchingFunction {
    domain: Vec<f64>,
    range: Option<Vec<f64>>,
    functions: Vec<Function>,
    bounds: Vec<f64>,
    encode: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct PostScriptFunction {
    domain: Vec<f64>,
    range: Vec<f64>,
    program: Vec<PsOp>,
}

impl Function {
    /// Parse a function dictionary or stream.
    pub fn parse(doc: &Document, function: &Object) -> Result<Self> {
        Self::parse_nested(doc, function, 0)
    }

    fn parse_nested(doc: &Document, function: &Object, depth: usize) -> Result<Self> {
        if depth > MAX_FUNCTION_DEPTH {
            return Err(ChromascanError::malformed(
                "function",
                format!("type 3 functions nested deeper than {}", MAX_FUNCTION_DEPTH),
            ));
        }
        let (_, function) = object::resolve(doc, function)?;
        let (dict, stream) = match function {
            Object::Dictionary(dict) => (dict, None),
            Object::Stream(stream) => (&stream.dict, Some(stream)),
            other => {
                return Err(ChromascanError::malformed(
                    "function",
                    format!("expected dictionary or stream, found {}", kind_name(other)),
                ));
            }
        };

        let domain = required_numbers(doc, dict, b"Domain")?;
        if domain.len() < 2 || domain.len() % 2 != 0 {
            return Err(ChromascanError::malformed(
                "function",
                format!("/Domain needs pairs of bounds, has {} values", domain.len()),
            ));
        }
        let range = object::lookup_numbers(doc, dict, b"Range")?;
        let function_type = object::lookup_integer(doc, dict, b"FunctionType")?
            .ok_or_else(|| ChromascanError::malformed("function", "missing /FunctionType"))?;

        match function_type {
            0 => {
                let stream = stream.ok_or_else(|| {
                    ChromascanError::malformed("function", "type 0 function must be a stream")
                })?;
                let range = range.ok_or_else(|| {
                    ChromascanError::malformed("function", "type 0 function needs /Range")
                })?;
                let size = required_numbers(doc, dict, b"Size")?
                    .into_iter()
                    .map(|s| s.max(1.0) as usize)
                    .collect::<Vec<_>>();
                let bits_per_sample = object::lookup_integer(doc, dict, b"BitsPerSample")?
                    .ok_or_else(|| {
                        ChromascanError::malformed("function", "type 0 function needs /BitsPerSample")
                    })? as u32;
                if !matches!(bits_per_sample, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
                    return Err(ChromascanError::UnsupportedFunction(format!(
                        "{} bits per sample",
                        bits_per_sample
                    )));
                }
                let encode = object::lookup_numbers(doc, dict, b"Encode")?.unwrap_or_else(|| {
                    size.iter().flat_map(|s| [0.0, (*s - 1) as f64]).collect()
                });
                if size.is_empty() || domain.len() < 2 * size.len() || encode.len() != 2 * size.len() {
                    return Err(ChromascanError::malformed(
                        "function",
                        "type 0 /Domain and /Encode do not match /Size",
                    ));
                }
                if range.len() < 2 || range.len() % 2 != 0 {
                    return Err(ChromascanError::malformed(
                        "function",
                        "type 0 /Range needs pairs of bounds",
                    ));
                }
                let decode = object::lookup_numbers(doc, dict, b"Decode")?.unwrap_or_else(|| range.clone());
                let samples = object::stream_bytes(stream)?;
                // Every grid point must be present, so sample indices stay in range.
                let table_bits = size
                    .iter()
                    .try_fold(range.len() / 2, |acc, s| acc.checked_mul(*s))
                    .and_then(|count| count.checked_mul(bits_per_sample as usize));
                match table_bits {
                    Some(bits) if bits <= samples.len().saturating_mul(8) => {}
                    _ => {
                        return Err(ChromascanError::malformed(
                            "function",
                            "sample table is smaller than /Size requires",
                        ));
                    }
                }
                Ok(Self::Sampled(SampledFunction {
                    domain,
                    range,
                    size,
                    bits_per_sample,
                    encode,
                    decode,
                    samples,
                }))
            }
            2 => Ok(Self::Exponential(ExponentialFunction {
                domain,
                range,
                c0: object::lookup_numbers(doc, dict, b"C0")?.unwrap_or_else(|| vec![0.0]),
                c1: object::lookup_numbers(doc, dict, b"C1")?.unwrap_or_else(|| vec![1.0]),
                exponent: object::lookup(doc, dict, b"N")?
                    .and_then(object::as_number)
                    .ok_or_else(|| ChromascanError::malformed("function", "type 2 function needs /N"))?,
            })),
            3 => {
                let functions = match object::lookup(doc, dict, b"Functions")? {
                    Some(Object::Array(items)) => items
                        .iter()
                        .map(|item| Function::parse_nested(doc, item, depth + 1))
                        .collect::<Result<Vec<_>>>()?,
                    _ => {
                        return Err(ChromascanError::malformed(
                            "function",
                            "type 3 function needs a /Functions array",
                        ));
                    }
                };
                let bounds = required_numbers(doc, dict, b"Bounds")?;
                let encode = required_numbers(doc, dict, b"Encode")?;
                if bounds.len() + 1 != functions.len() || encode.len() != 2 * functions.len() {
                    return Err(ChromascanError::malformed(
                        "function",
                        "type 3 /Bounds and /Encode do not match /Functions",
                    ));
                }
                Ok(Self::Stitching(StitchingFunction {
                    domain,
                    range,
                    functions,
                    bounds,
                    encode,
                }))
            }
            4 => {
                let stream = stream.ok_or_else(|| {
                    ChromascanError::malformed("function", "type 4 function must be a stream")
                })?;
                let range = range.ok_or_else(|| {
                    ChromascanError::malformed("function", "type 4 function needs /Range")
                })?;
                Ok(Self::PostScript(PostScriptFunction {
                    domain,
                    range,
                    program: parse_program(&object::stream_bytes(stream)?)?,
                }))
            }
            other => Err(ChromascanError::UnsupportedFunction(format!(
                "function type {}",
                other
            ))),
        }
    }

    /// Evaluate the function at `input`.
    pub fn eval(&self, input: &[f64]) -> Result<Vec<f64>> {
        match self {
            Self::Sampled(f) => f.eval(input),
            Self::Exponential(f) => Ok(f.eval(input)),
            Self::Stitching(f) => f.eval(input),
            Self::PostScript(f) => f.eval(input),
        }
    }
}

fn required_numbers(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<Vec<f64>> {
    object::lookup_numbers(doc, dict, key)?.ok_or_else(|| {
        ChromascanError::malformed(
            "function",
            format!("missing /{}", String::from_utf8_lossy(key)),
        )
    })
}

/// Linear map of `x` from `[x0, x1]` onto `[y0, y1]`.
fn interpolate(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Clamp `value` into the `index`-th interval of a flattened `[min max ...]` array.
fn clip(value: f64, bounds: &[f64], index: usize) -> f64 {
    match (bounds.get(2 * index), bounds.get(2 * index + 1)) {
        (Some(min), Some(max)) if min <= max => value.clamp(*min, *max),
        _ => value,
    }
}

fn clip_all(values: &mut [f64], bounds: Option<&[f64]>) {
    if let Some(bounds) = bounds {
        for (i, value) in values.iter_mut().enumerate() {
            *value = clip(*value, bounds, i);
        }
    }
}

impl SampledFunction {
    fn eval(&self, input: &[f64]) -> Result<Vec<f64>> {
        let m = self.size.len();
        let n = self.range.len() / 2;
        if input.len() < m {
            return Err(ChromascanError::malformed(
                "function input",
                format!("expected {} inputs, got {}", m, input.len()),
            ));
        }

        let encoded: Vec<f64> = (0..m)
            .map(|i| {
                let x = clip(input[i], &self.domain, i);
                let e = interpolate(
                    x,
                    self.domain[2 * i],
                    self.domain[2 * i + 1],
                    self.encode.get(2 * i).copied().unwrap_or(0.0),
                    self.encode.get(2 * i + 1).copied().unwrap_or((self.size[i] - 1) as f64),
                );
                e.clamp(0.0, (self.size[i] - 1) as f64)
            })
            .collect();

        let max_sample = ((1u64 << self.bits_per_sample) - 1) as f64;
        let mut output = Vec::with_capacity(n);
        for j in 0..n {
            // Single-input functions interpolate between neighbouring samples;
            // multi-input ones take the nearest sample.
            let raw = if m == 1 {
                let e = encoded[0];
                let lo = e.floor() as usize;
                let hi = (lo + 1).min(self.size[0] - 1);
                let t = e - lo as f64;
                let a = self.sample(lo * n + j)? as f64;
                let b = self.sample(hi * n + j)? as f64;
                a + (b - a) * t
            } else {
                let mut offset = 0usize;
                let mut stride = 1usize;
                for (i, e) in encoded.iter().enumerate() {
                    offset += (e.round() as usize) * stride;
                    stride *= self.size[i];
                }
                self.sample(offset * n + j)? as f64
            };
            let decoded = interpolate(
                raw,
                0.0,
                max_sample,
                self.decode.get(2 * j).copied().unwrap_or(0.0),
                self.decode.get(2 * j + 1).copied().unwrap_or(1.0),
            );
            output.push(clip(decoded, &self.range, j));
        }
        Ok(output)
    }

    /// Read the `index`-th sample from the packed sample table.
    fn sample(&self, index: usize) -> Result<u64> {
        let bits = self.bits_per_sample as usize;
        let start_bit = index * bits;
        let mut value = 0u64;
        for bit in start_bit..start_bit + bits {
            let byte = self.samples.get(bit / 8).ok_or_else(|| {
                ChromascanError::malformed("function", "sample table is truncated")
            })?;
            let set = (byte >> (7 - bit % 8)) & 1;
            value = (value << 1) | u64::from(set);
        }
        Ok(value)
    }
}

impl ExponentialFunction {
    fn eval(&self, input: &[f64]) -> Vec<f64> {
        let x = clip(input.first().copied().unwrap_or(0.0), &self.domain, 0);
        let factor = x.powf(self.exponent);
        let mut output: Vec<f64> = self
            .c0
            .iter()
            .zip(self.c1.iter())
            .map(|(c0, c1)| c0 + factor * (c1 - c0))
            .collect();
        clip_all(&mut output, self.range.as_deref());
        output
    }
}

impl StitchingFunction {
    fn eval(&self, input: &[f64]) -> Result<Vec<f64>> {
        let x = clip(input.first().copied().unwrap_or(0.0), &self.domain, 0);
        let k = self
            .bounds
            .iter()
            .position(|bound| x < *bound)
            .unwrap_or(self.bounds.len());
        let low = if k == 0 { self.domain[0] } else { self.bounds[k - 1] };
        let high = if k == self.bounds.len() {
            self.domain[1]
        } else {
            self.bounds[k]
        };
        let mapped = interpolate(x, low, high, self.encode[2 * k], self.encode[2 * k + 1]);
        let mut output = self.functions[k].eval(&[mapped])?;
        clip_all(&mut output, self.range.as_deref());
        Ok(output)
    }
}

// -- Type 4: PostScript calculator ---------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum PsOp {
    Number(f64),
    Bool(bool),
    Op(PsOperator),
    If(Vec<PsOp>),
    IfElse(Vec<PsOp>, Vec<PsOp>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PsOperator {
    Abs,
    Add,
    Atan,
    Ceiling,
    Cos,
    Cvi,
    Cvr,
    Div,
    Exp,
    Floor,
    Idiv,
    Ln,
    Log,
    Mod,
    Mul,
    Neg,
    Round,
    Sin,
    Sqrt,
    Sub,
    Truncate,
    And,
    Bitshift,
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
    Ne,
    Not,
    Or,
    Xor,
    Copy,
    Dup,
    Exch,
    Index,
    Pop,
    Roll,
}

impl PsOperator {
    fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "abs" => Self::Abs,
            "add" => Self::Add,
            "atan" => Self::Atan,
            "ceiling" => Self::Ceiling,
            "cos" => Self::Cos,
            "cvi" => Self::Cvi,
            "cvr" => Self::Cvr,
            "div" => Self::Div,
            "exp" => Self::Exp,
            "floor" => Self::Floor,
            "idiv" => Self::Idiv,
            "ln" => Self::Ln,
            "log" => Self::Log,
            "mod" => Self::Mod,
            "mul" => Self::Mul,
            "neg" => Self::Neg,
            "round" => Self::Round,
            "sin" => Self::Sin,
            "sqrt" => Self::Sqrt,
            "sub" => Self::Sub,
            "truncate" => Self::Truncate,
            "and" => Self::And,
            "bitshift" => Self::Bitshift,
            "eq" => Self::Eq,
            "ge" => Self::Ge,
            "gt" => Self::Gt,
            "le" => Self::Le,
            "lt" => Self::Lt,
            "ne" => Self::Ne,
            "not" => Self::Not,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "copy" => Self::Copy,
            "dup" => Self::Dup,
            "exch" => Self::Exch,
            "index" => Self::Index,
            "pop" => Self::Pop,
            "roll" => Self::Roll,
            _ => return None,
        })
    }
}

/// Intermediate item while parsing: procedures stay unattached until the
/// following `if`/`ifelse` consumes them.
enum PsItem {
    Op(PsOp),
    Block(Vec<PsOp>),
}

fn parse_program(source: &[u8]) -> Result<Vec<PsOp>> {
    let text = String::from_utf8_lossy(source);
    let spaced = text.replace('{', " { ").replace('}', " } ");
    let mut tokens = spaced.split_whitespace();

    match tokens.next() {
        Some("{") => {}
        _ => {
            return Err(ChromascanError::malformed(
                "type 4 function",
                "program must start with `{`",
            ));
        }
    }
    let program = parse_block(&mut tokens)?;
    if tokens.next().is_some() {
        return Err(ChromascanError::malformed(
            "type 4 function",
            "trailing tokens after program",
        ));
    }
    Ok(program)
}

fn parse_block<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<Vec<PsOp>> {
    let mut items: Vec<PsItem> = Vec::new();
    loop {
        let token = tokens.next().ok_or_else(|| {
            ChromascanError::malformed("type 4 function", "unterminated procedure")
        })?;
        match token {
            "}" => break,
            "{" => items.push(PsItem::Block(parse_block(tokens)?)),
            "if" => {
                let Some(PsItem::Block(body)) = items.pop() else {
                    return Err(ChromascanError::malformed(
                        "type 4 function",
                        "`if` without procedure",
                    ));
                };
                items.push(PsItem::Op(PsOp::If(body)));
            }
            "ifelse" => {
                let (Some(PsItem::Block(otherwise)), Some(PsItem::Block(then))) =
                    (items.pop(), items.pop())
                else {
                    return Err(ChromascanError::malformed(
                        "type 4 function",
                        "`ifelse` without two procedures",
                    ));
                };
                items.push(PsItem::Op(PsOp::IfElse(then, otherwise)));
            }
            "true" => items.push(PsItem::Op(PsOp::Bool(true))),
            "false" => items.push(PsItem::Op(PsOp::Bool(false))),
            word => {
                if let Ok(number) = word.parse::<f64>() {
                    items.push(PsItem::Op(PsOp::Number(number)));
                } else if let Some(op) = PsOperator::from_keyword(word) {
                    items.push(PsItem::Op(PsOp::Op(op)));
                } else {
                    return Err(ChromascanError::UnsupportedFunction(format!(
                        "type 4 operator `{}`",
                        word
                    )));
                }
            }
        }
    }

    items
        .into_iter()
        .map(|item| match item {
            PsItem::Op(op) => Ok(op),
            PsItem::Block(_) => Err(ChromascanError::malformed(
                "type 4 function",
                "procedure not followed by `if` or `ifelse`",
            )),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PsValue {
    Num(f64),
    Bool(bool),
}

struct PsMachine {
    stack: Vec<PsValue>,
}

impl PsMachine {
    fn push(&mut self, value: PsValue) -> Result<()> {
        if self.stack.len() >= PS_STACK_LIMIT {
            return Err(ChromascanError::malformed("type 4 function", "stack overflow"));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<PsValue> {
        self.stack
            .pop()
            .ok_or_else(|| ChromascanError::malformed("type 4 function", "stack underflow"))
    }

    fn pop_num(&mut self) -> Result<f64> {
        match self.pop()? {
            PsValue::Num(value) => Ok(value),
            PsValue::Bool(_) => Err(ChromascanError::malformed(
                "type 4 function",
                "expected number, found boolean",
            )),
        }
    }

    fn pop_bool(&mut self) -> Result<bool> {
        match self.pop()? {
            PsValue::Bool(value) => Ok(value),
            PsValue::Num(_) => Err(ChromascanError::malformed(
                "type 4 function",
                "expected boolean, found number",
            )),
        }
    }

    fn unary(&mut self, f: impl Fn(f64) -> f64) -> Result<()> {
        let a = self.pop_num()?;
        self.push(PsValue::Num(f(a)))
    }

    fn binary(&mut self, f: impl Fn(f64, f64) -> f64) -> Result<()> {
        let b = self.pop_num()?;
        let a = self.pop_num()?;
        self.push(PsValue::Num(f(a, b)))
    }

    fn compare(&mut self, f: impl Fn(f64, f64) -> bool) -> Result<()> {
        let b = self.pop_num()?;
        let a = self.pop_num()?;
        self.push(PsValue::Bool(f(a, b)))
    }

    /// `and`, `or`, `xor` work on booleans or integers.
    fn logical(&mut self, on_bool: fn(bool, bool) -> bool, on_int: fn(i64, i64) -> i64) -> Result<()> {
        match (self.pop()?, self.pop()?) {
            (PsValue::Bool(b), PsValue::Bool(a)) => self.push(PsValue::Bool(on_bool(a, b))),
            (PsValue::Num(b), PsValue::Num(a)) => {
                self.push(PsValue::Num(on_int(a as i64, b as i64) as f64))
            }
            _ => Err(ChromascanError::malformed(
                "type 4 function",
                "mixed operand types for logical operator",
            )),
        }
    }

    fn run(&mut self, program: &[PsOp]) -> Result<()> {
        for op in program {
            match op {
                PsOp::Number(value) => self.push(PsValue::Num(*value))?,
                PsOp::Bool(value) => self.push(PsValue::Bool(*value))?,
                PsOp::If(body) => {
                    if self.pop_bool()? {
                        self.run(body)?;
                    }
                }
                PsOp::IfElse(then, otherwise) => {
                    if self.pop_bool()? {
                        self.run(then)?;
                    } else {
                        self.run(otherwise)?;
                    }
                }
                PsOp::Op(operator) => self.apply(*operator)?,
            }
        }
        Ok(())
    }

    fn apply(&mut self, operator: PsOperator) -> Result<()> {
        use PsOperator::*;
        match operator {
            Abs => self.unary(f64::abs),
            Add => self.binary(|a, b| a + b),
            Atan => self.binary(|num, den| {
                let degrees = num.atan2(den).to_degrees();
                if degrees < 0.0 { degrees + 360.0 } else { degrees }
            }),
            Ceiling => self.unary(f64::ceil),
            Cos => self.unary(|a| a.to_radians().cos()),
            Cvi => self.unary(f64::trunc),
            Cvr => Ok(()),
            Div => self.binary(|a, b| if b == 0.0 { 0.0 } else { a / b }),
            Exp => self.binary(f64::powf),
            Floor => self.unary(f64::floor),
            Idiv => self.binary(|a, b| {
                let (a, b) = (a as i64, b as i64);
                if b == 0 { 0.0 } else { (a / b) as f64 }
            }),
            Ln => self.unary(f64::ln),
            Log => self.unary(f64::log10),
            Mod => self.binary(|a, b| {
                let (a, b) = (a as i64, b as i64);
                if b == 0 { 0.0 } else { (a % b) as f64 }
            }),
            Mul => self.binary(|a, b| a * b),
            Neg => self.unary(|a| -a),
            Round => self.unary(|a| (a + 0.5).floor()),
            Sin => self.unary(|a| a.to_radians().sin()),
            Sqrt => self.unary(f64::sqrt),
            Sub => self.binary(|a, b| a - b),
            Truncate => self.unary(f64::trunc),
            And => self.logical(|a, b| a && b, |a, b| a & b),
            Or => self.logical(|a, b| a || b, |a, b| a | b),
            Xor => self.logical(|a, b| a ^ b, |a, b| a ^ b),
            Bitshift => self.binary(|a, shift| {
                let (a, shift) = (a as i64, shift as i64);
                if shift >= 0 {
                    (a << shift.min(63)) as f64
                } else {
                    (a >> (-shift).min(63)) as f64
                }
            }),
            Not => match self.pop()? {
                PsValue::Bool(value) => self.push(PsValue::Bool(!value)),
                PsValue::Num(value) => self.push(PsValue::Num(!(value as i64) as f64)),
            },
            Eq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(PsValue::Bool(a == b))
            }
            Ne => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(PsValue::Bool(a != b))
            }
            Ge => self.compare(|a, b| a >= b),
            Gt => self.compare(|a, b| a > b),
            Le => self.compare(|a, b| a <= b),
            Lt => self.compare(|a, b| a < b),
            Copy => {
                let count = self.pop_num()? as usize;
                if count > self.stack.len() {
                    return Err(ChromascanError::malformed("type 4 function", "stack underflow"));
                }
                let start = self.stack.len() - count;
                for i in start..start + count {
                    let value = self.stack[i];
                    self.push(value)?;
                }
                Ok(())
            }
            Dup => {
                let value = self.pop()?;
                self.push(value)?;
                self.push(value)
            }
            Exch => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b)?;
                self.push(a)
            }
            Index => {
                let depth = self.pop_num()? as usize;
                let value = self
                    .stack
                    .len()
                    .checked_sub(depth + 1)
                    .map(|i| self.stack[i])
                    .ok_or_else(|| ChromascanError::malformed("type 4 function", "stack underflow"))?;
                self.push(value)
            }
            Pop => self.pop().map(|_| ()),
            Roll => {
                let shift = self.pop_num()? as i64;
                let count = self.pop_num()? as usize;
                if count > self.stack.len() {
                    return Err(ChromascanError::malformed("type 4 function", "stack underflow"));
                }
                if count > 0 {
                    let start = self.stack.len() - count;
                    let window = &mut self.stack[start..];
                    let shift = shift.rem_euclid(count as i64) as usize;
                    window.rotate_right(shift);
                }
                Ok(())
            }
        }
    }
}

impl PostScriptFunction {
    fn eval(&self, input: &[f64]) -> Result<Vec<f64>> {
        let mut machine = PsMachine { stack: Vec::new() };
        for (i, value) in input.iter().enumerate() {
            machine.push(PsValue::Num(clip(*value, &self.domain, i)))?;
        }
        machine.run(&self.program)?;

        let n = self.range.len() / 2;
        if machine.stack.len() < n {
            return Err(ChromascanError::malformed(
                "type 4 function",
                format!("program left {} values, expected {}", machine.stack.len(), n),
            ));
        }
        let start = machine.stack.len() - n;
        machine.stack[start..]
            .iter()
            .enumerate()
            .map(|(j, value)| match value {
                PsValue::Num(v) => Ok(clip(*v, &self.range, j)),
                PsValue::Bool(_) => Err(ChromascanError::malformed(
                    "type 4 function",
                    "program returned a boolean",
                )),
            })
            .collect()
    }
}
