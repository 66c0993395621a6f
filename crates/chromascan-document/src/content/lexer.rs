// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream tokenizer.
//
// Turns the bytes of a content stream into `lopdf` operations. Inline images
// (`BI ... ID <data> EI`) come out as a single `BI` operation whose only
// operand is a stream carrying the expanded image dictionary and the raw
// image bytes.

use chromascan_core::error::{ChromascanError, Result};
use lopdf::content::Operation;
use lopdf::{Dictionary, Object, Stream, StringFormat};

/// Tokenize a whole content stream.
pub fn parse_content(data: &[u8]) -> Result<Vec<Operation>> {
    let mut lexer = Lexer::new(data);
    let mut operations = Vec::new();
    let mut operands = Vec::new();

    while let Some(byte) = lexer.peek_token_start()? {
        if starts_object(byte) {
            operands.push(lexer.object()?);
            continue;
        }
        if is_delimiter(byte) {
            return Err(lexer.error(format!("unexpected `{}`", byte as char)));
        }
        let keyword = lexer.keyword();
        match keyword {
            b"true" => operands.push(Object::Boolean(true)),
            b"false" => operands.push(Object::Boolean(false)),
            b"null" => operands.push(Object::Null),
            b"BI" => {
                operands.clear();
                let image = lexer.inline_image()?;
                operations.push(Operation::new("BI", vec![Object::Stream(image)]));
            }
            _ => {
                let operator = String::from_utf8_lossy(keyword).into_owned();
                operations.push(Operation::new(&operator, std::mem::take(&mut operands)));
            }
        }
    }
    Ok(operations)
}

// -- Character classes ----------------------------------------------------------

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

fn starts_object(byte: u8) -> bool {
    matches!(byte, b'[' | b'(' | b'<' | b'/' | b'+' | b'-' | b'.') || byte.is_ascii_digit()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|digit| digit as u8)
}

// -- Lexer ------------------------------------------------------------------------

struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> ChromascanError {
        ChromascanError::ContentParse {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(byte) = self.peek() {
            if is_whitespace(byte) {
                self.pos += 1;
            } else if byte == b'%' {
                while let Some(byte) = self.peek() {
                    if byte == b'\n' || byte == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// First byte of the next token, or `None` at end of input.
    fn peek_token_start(&mut self) -> Result<Option<u8>> {
        self.skip_whitespace_and_comments();
        Ok(self.peek())
    }

    fn keyword(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(is_regular) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    fn object(&mut self) -> Result<Object> {
        let Some(byte) = self.peek_token_start()? else {
            return Err(self.error("unexpected end of content"));
        };
        match byte {
            b'/' => self.name().map(Object::Name),
            b'(' => self.literal_string(),
            b'[' => self.array(),
            b'<' if self.data.get(self.pos + 1) == Some(&b'<') => {
                self.dictionary().map(Object::Dictionary)
            }
            b'<' => self.hex_string(),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.number(),
            _ if is_regular(byte) => {
                let start = self.pos;
                match self.keyword() {
                    b"true" => Ok(Object::Boolean(true)),
                    b"false" => Ok(Object::Boolean(false)),
                    b"null" => Ok(Object::Null),
                    other => {
                        self.pos = start;
                        Err(self.error(format!(
                            "unexpected keyword `{}` inside an object",
                            String::from_utf8_lossy(other)
                        )))
                    }
                }
            }
            _ => Err(self.error(format!("unexpected `{}`", byte as char))),
        }
    }

    fn number(&mut self) -> Result<Object> {
        let start = self.pos;
        let token = self.keyword();
        let text = std::str::from_utf8(token).map_err(|_| self.error("invalid number"))?;
        let malformed = || ChromascanError::ContentParse {
            offset: start,
            message: format!("invalid number `{}`", text),
        };
        if text.contains('.') {
            // Forms like `4.` and `-.5` are valid PDF reals.
            let normalized = match text.strip_suffix('.') {
                Some(stripped) => stripped.to_string(),
                None => text.to_string(),
            };
            let normalized = normalized.replacen("-.", "-0.", 1).replacen("+.", "0.", 1);
            let normalized = normalized.strip_prefix('+').unwrap_or(&normalized);
            let value = if normalized.is_empty() || normalized == "-" {
                0.0
            } else {
                normalized.parse::<f32>().map_err(|_| malformed())?
            };
            Ok(Object::Real(value))
        } else {
            text.parse::<i64>().map(Object::Integer).map_err(|_| malformed())
        }
    }

    /// Name after the leading slash, with `#xx` escapes decoded.
    fn name(&mut self) -> Result<Vec<u8>> {
        self.pos += 1;
        let mut name = Vec::new();
        while let Some(byte) = self.peek().filter(|byte| is_regular(*byte)) {
            if byte == b'#' {
                let escaped = self
                    .data
                    .get(self.pos + 1..self.pos + 3)
                    .and_then(|pair| Some(hex_value(pair[0])? << 4 | hex_value(pair[1])?));
                if let Some(value) = escaped {
                    name.push(value);
                    self.pos += 3;
                    continue;
                }
            }
            name.push(byte);
            self.pos += 1;
        }
        Ok(name)
    }

    fn literal_string(&mut self) -> Result<Object> {
        let start = self.pos;
        self.pos += 1;
        let mut depth = 1usize;
        let mut bytes = Vec::new();
        loop {
            let Some(byte) = self.peek() else {
                self.pos = start;
                return Err(self.error("unterminated string"));
            };
            self.pos += 1;
            match byte {
                b'(' => {
                    depth += 1;
                    bytes.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(byte);
                }
                b'\\' => self.string_escape(&mut bytes),
                b'\r' => {
                    // End-of-line markers inside strings read as a single LF.
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                    bytes.push(b'\n');
                }
                _ => bytes.push(byte),
            }
        }
        Ok(Object::String(bytes, StringFormat::Literal))
    }

    fn string_escape(&mut self, bytes: &mut Vec<u8>) {
        let Some(byte) = self.peek() else {
            return;
        };
        self.pos += 1;
        match byte {
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0C),
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            b'0'..=b'7' => {
                let mut value = u32::from(byte - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(digit @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(digit - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                bytes.push((value & 0xFF) as u8);
            }
            other => bytes.push(other),
        }
    }

    fn hex_string(&mut self) -> Result<Object> {
        let start = self.pos;
        self.pos += 1;
        let mut nibbles = Vec::new();
        loop {
            let Some(byte) = self.peek() else {
                self.pos = start;
                return Err(self.error("unterminated hex string"));
            };
            self.pos += 1;
            match byte {
                b'>' => break,
                _ if is_whitespace(byte) => {}
                _ => match hex_value(byte) {
                    Some(value) => nibbles.push(value),
                    None => {
                        self.pos -= 1;
                        return Err(self.error(format!(
                            "invalid hex digit `{}`",
                            byte as char
                        )));
                    }
                },
            }
        }
        let bytes = nibbles
            .chunks(2)
            .map(|pair| pair[0] << 4 | pair.get(1).copied().unwrap_or(0))
            .collect();
        Ok(Object::String(bytes, StringFormat::Hexadecimal))
    }

    fn array(&mut self) -> Result<Object> {
        let start = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            match self.peek_token_start()? {
                None => {
                    self.pos = start;
                    return Err(self.error("unterminated array"));
                }
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Object::Array(items));
                }
                Some(_) => items.push(self.object()?),
            }
        }
    }

    fn dictionary(&mut self) -> Result<Dictionary> {
        let start = self.pos;
        self.pos += 2;
        let mut dict = Dictionary::new();
        loop {
            match self.peek_token_start()? {
                None => {
                    self.pos = start;
                    return Err(self.error("unterminated dictionary"));
                }
                Some(b'>') if self.data.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    return Ok(dict);
                }
                Some(b'/') => {
                    let key = self.name()?;
                    let value = self.object()?;
                    dict.set(key, value);
                }
                Some(_) => return Err(self.error("dictionary key is not a name")),
            }
        }
    }

    // -- Inline images ----------------------------------------------------------

    fn inline_image(&mut self) -> Result<Stream> {
        let start = self.pos;
        let mut dict = Dictionary::new();
        loop {
            match self.peek_token_start()? {
                None => {
                    self.pos = start;
                    return Err(self.error("unterminated inline image"));
                }
                Some(b'/') => {
                    let key = expand_key(self.name()?);
                    let value = expand_value(&key, self.object()?);
                    dict.set(key, value);
                }
                Some(byte) if is_regular(byte) => {
                    let keyword = self.keyword();
                    if keyword != b"ID" {
                        return Err(self.error(format!(
                            "expected `ID` in inline image, found `{}`",
                            String::from_utf8_lossy(keyword)
                        )));
                    }
                    break;
                }
                Some(_) => return Err(self.error("inline image key is not a name")),
            }
        }

        // Exactly one whitespace byte separates `ID` from the data.
        if self.peek().is_some_and(is_whitespace) {
            self.pos += 1;
        }
        let data_start = self.pos;
        let data_end = self
            .exact_image_end(&dict, data_start)
            .or_else(|| self.scan_image_end(data_start))
            .ok_or_else(|| ChromascanError::ContentParse {
                offset: start,
                message: "inline image data has no `EI`".into(),
            })?;

        let data = self.data[data_start..data_end.data].to_vec();
        self.pos = data_end.resume;
        Ok(Stream::new(dict, data))
    }

    /// End of the data when its length follows from the image dictionary.
    fn exact_image_end(&self, dict: &Dictionary, data_start: usize) -> Option<ImageEnd> {
        let length = unfiltered_image_length(dict)?;
        let data_end = data_start.checked_add(length)?;
        let mut cursor = data_end;
        while self.data.get(cursor).copied().is_some_and(is_whitespace) {
            cursor += 1;
        }
        if self.data.get(cursor..cursor + 2)? != b"EI" {
            return None;
        }
        let resume = cursor + 2;
        if self.data.get(resume).copied().is_some_and(is_regular) {
            return None;
        }
        Some(ImageEnd {
            data: data_end,
            resume,
        })
    }

    /// End of the data found by looking for a whitespace-delimited `EI`.
    fn scan_image_end(&self, data_start: usize) -> Option<ImageEnd> {
        let mut cursor = data_start;
        while cursor + 2 <= self.data.len() {
            if &self.data[cursor..cursor + 2] == b"EI" {
                let before_ok = cursor == data_start || is_whitespace(self.data[cursor - 1]);
                let after_ok = self
                    .data
                    .get(cursor + 2)
                    .is_none_or(|byte| is_whitespace(*byte) || is_delimiter(*byte));
                if before_ok && after_ok {
                    let data = if cursor > data_start { cursor - 1 } else { cursor };
                    return Some(ImageEnd {
                        data,
                        resume: cursor + 2,
                    });
                }
            }
            cursor += 1;
        }
        None
    }
}

struct ImageEnd {
    /// One past the last data byte.
    data: usize,
    /// Position just after `EI`.
    resume: usize,
}

/// Byte length of an unfiltered inline image in a device colorspace.
fn unfiltered_image_length(dict: &Dictionary) -> Option<usize> {
    if dict.get(b"Filter").is_ok() {
        return None;
    }
    let integer = |key: &[u8]| match dict.get(key).ok()? {
        Object::Integer(value) if *value >= 0 => Some(*value as usize),
        _ => None,
    };
    let width = integer(b"Width")?;
    let height = integer(b"Height")?;
    let image_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let (components, bits) = if image_mask {
        (1, 1)
    } else {
        let components = match dict.get(b"ColorSpace").ok()? {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" => 1,
                b"DeviceRGB" => 3,
                b"DeviceCMYK" => 4,
                _ => return None,
            },
            Object::Array(items) => match items.first() {
                Some(Object::Name(family)) if family == b"Indexed" => 1,
                _ => return None,
            },
            _ => return None,
        };
        (components, integer(b"BitsPerComponent")?)
    };
    let row = (width.checked_mul(components)?.checked_mul(bits)? + 7) / 8;
    row.checked_mul(height)
}

fn expand_key(key: Vec<u8>) -> Vec<u8> {
    let full: &[u8] = match key.as_slice() {
        b"BPC" => b"BitsPerComponent",
        b"CS" => b"ColorSpace",
        b"D" => b"Decode",
        b"DP" => b"DecodeParms",
        b"F" => b"Filter",
        b"H" => b"Height",
        b"IM" => b"ImageMask",
        b"I" => b"Interpolate",
        b"L" => b"Length",
        b"W" => b"Width",
        _ => return key,
    };
    full.to_vec()
}

fn expand_color_space_name(name: Vec<u8>) -> Vec<u8> {
    let full: &[u8] = match name.as_slice() {
        b"G" => b"DeviceGray",
        b"RGB" => b"DeviceRGB",
        b"CMYK" => b"DeviceCMYK",
        b"I" => b"Indexed",
        _ => return name,
    };
    full.to_vec()
}

fn expand_filter_name(name: Vec<u8>) -> Vec<u8> {
    let full: &[u8] = match name.as_slice() {
        b"AHx" => b"ASCIIHexDecode",
        b"A85" => b"ASCII85Decode",
        b"LZW" => b"LZWDecode",
        b"Fl" => b"FlateDecode",
        b"RL" => b"RunLengthDecode",
        b"CCF" => b"CCITTFaxDecode",
        b"DCT" => b"DCTDecode",
        _ => return name,
    };
    full.to_vec()
}

fn expand_value(key: &[u8], value: Object) -> Object {
    let expand: fn(Vec<u8>) -> Vec<u8> = match key {
        b"ColorSpace" => expand_color_space_name,
        b"Filter" => expand_filter_name,
        _ => return value,
    };
    match value {
        Object::Name(name) => Object::Name(expand(name)),
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Object::Name(name) => Object::Name(expand(name)),
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}
