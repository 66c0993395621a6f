// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image samples: reading image XObjects and inline images into RGB rasters,
// and scanning those rasters for colored pixels.

use chromascan_core::error::{ChromascanError, Result};
use image::ImageFormat;
use lopdf::{Document, Object, Stream};
use tracing::debug;

use crate::color::ColorSpace;
use crate::color::value::is_triple_colored;
use crate::pdf::object;

/// An image XObject or inline image, not yet decoded.
#[derive(Debug, Clone)]
pub struct PdfImage {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    /// `None` when the dictionary has no `/ColorSpace` (image masks, JPX).
    pub color_space: Option<ColorSpace>,
    pub image_mask: bool,
    pub decode: Option<Vec<f64>>,
    /// Filter names, outermost first.
    pub filters: Vec<Vec<u8>>,
    stream: Stream,
}

/// Decoded image samples as RGB triples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbRaster {
    pub width: u32,
    pub height: u32,
    /// Bits per channel; channel values range over `0..=2^bits - 1`.
    pub bits_per_component: u8,
    /// Row-major `r g b` triples.
    pub samples: Vec<u16>,
}

impl PdfImage {
    /// Read the image dictionary of `stream`. Colorspace values are handed
    /// to `color_space` so named spaces resolve against the right resources.
    pub fn from_stream(
        doc: &Document,
        stream: &Stream,
        color_space: impl Fn(&Object) -> Result<ColorSpace>,
    ) -> Result<Self> {
        let dict = &stream.dict;
        let dimension = |key: &[u8]| -> Result<u32> {
            let value = object::lookup_integer(doc, dict, key)?.ok_or_else(|| {
                ChromascanError::malformed(
                    "image",
                    format!("missing /{}", String::from_utf8_lossy(key)),
                )
            })?;
            u32::try_from(value).map_err(|_| {
                ChromascanError::malformed(
                    "image",
                    format!("/{} out of range: {}", String::from_utf8_lossy(key), value),
                )
            })
        };
        let width = dimension(b"Width")?;
        let height = dimension(b"Height")?;

        let image_mask = matches!(object::lookup(doc, dict, b"ImageMask")?, Some(Object::Boolean(true)));
        let bits_per_component = match object::lookup_integer(doc, dict, b"BitsPerComponent")? {
            _ if image_mask => 1,
            Some(bits @ (1 | 2 | 4 | 8 | 16)) => bits as u8,
            Some(other) => {
                return Err(ChromascanError::malformed(
                    "image",
                    format!("unsupported /BitsPerComponent {}", other),
                ));
            }
            None => 8,
        };
        let color_space = match object::lookup(doc, dict, b"ColorSpace")? {
            None | Some(Object::Null) => None,
            Some(space) if !image_mask => Some(color_space(space)?),
            Some(_) => None,
        };
        let decode = object::lookup_numbers(doc, dict, b"Decode")?;

        Ok(Self {
            width,
            height,
            bits_per_component,
            color_space,
            image_mask,
            decode,
            filters: object::filter_names(doc, dict)?,
            stream: stream.clone(),
        })
    }

    /// Number of color components per sample, if known without decoding.
    pub fn color_components(&self) -> Option<usize> {
        if self.image_mask {
            return Some(1);
        }
        self.color_space.as_ref().map(ColorSpace::components)
    }

    pub fn has_filter(&self, name: &[u8]) -> bool {
        self.filters.iter().any(|filter| filter == name)
    }

    /// Decode the samples and convert them to RGB.
    ///
    /// Images without a colorspace are read as DeviceGray.
    pub fn decode_to_rgb(&self) -> Result<RgbRaster> {
        if let [filter] = self.filters.as_slice() {
            if filter == b"DCTDecode" {
                return self.decode_jpeg();
            }
        }
        if let Some(filter) = self.filters.iter().find(|filter| {
            matches!(
                filter.as_slice(),
                b"DCTDecode" | b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode"
            )
        }) {
            return Err(ChromascanError::Image(format!(
                "cannot decode samples through /{}",
                String::from_utf8_lossy(filter)
            )));
        }

        let data = object::stream_bytes(&self.stream)?;
        let space = self.color_space.clone().unwrap_or(ColorSpace::DeviceGray);
        let components = space.components();
        let bits = usize::from(self.bits_per_component);
        let width = self.width as usize;
        let height = self.height as usize;
        let too_large = || {
            ChromascanError::Image(format!(
                "image dimensions {}x{} with {} components are too large",
                width, height, components
            ))
        };
        let row_bytes = width
            .checked_mul(components)
            .and_then(|n| n.checked_mul(bits))
            .ok_or_else(too_large)?
            .div_ceil(8);
        let pixel_count = width.checked_mul(height).ok_or_else(too_large)?;
        let needed = row_bytes.checked_mul(height).ok_or_else(too_large)?;
        if data.len() < needed {
            return Err(ChromascanError::Image(format!(
                "image data truncated: {} bytes for {}x{} at {} bpc",
                data.len(),
                width,
                height,
                bits
            )));
        }

        let decode = match &self.decode {
            Some(decode) if decode.len() >= 2 * components => decode.clone(),
            _ => space.default_decode(self.bits_per_component),
        };
        let max = ((1u32 << bits) - 1) as f64;
        debug!(
            width,
            height,
            components,
            bits,
            space = space.name(),
            "decoding image samples"
        );

        let mut samples = Vec::with_capacity(pixel_count.saturating_mul(3));
        let mut values = vec![0.0; components];
        for row in data.chunks_exact(row_bytes.max(1)).take(height) {
            let mut reader = SampleReader::new(row, bits);
            for _ in 0..width {
                for (i, value) in values.iter_mut().enumerate() {
                    let (dmin, dmax) = (decode[2 * i], decode[2 * i + 1]);
                    *value = dmin + f64::from(reader.read()) * (dmax - dmin) / max;
                }
                for channel in space.to_rgb(&values)? {
                    samples.push((channel.clamp(0.0, 1.0) * 65535.0).round() as u16);
                }
            }
        }
        Ok(RgbRaster {
            width: self.width,
            height: self.height,
            bits_per_component: 16,
            samples,
        })
    }

    fn decode_jpeg(&self) -> Result<RgbRaster> {
        let decoded = image::load_from_memory_with_format(&self.stream.content, ImageFormat::Jpeg)
            .map_err(|err| ChromascanError::Image(format!("failed to decode DCT image: {}", err)))?
            .to_rgb8();
        Ok(RgbRaster {
            width: decoded.width(),
            height: decoded.height(),
            bits_per_component: 8,
            samples: decoded.into_raw().into_iter().map(u16::from).collect(),
        })
    }
}

/// Reads big-endian samples of 1, 2, 4, 8 or 16 bits from one image row.
struct SampleReader<'a> {
    row: &'a [u8],
    bits: usize,
    bit_pos: usize,
}

impl<'a> SampleReader<'a> {
    fn new(row: &'a [u8], bits: usize) -> Self {
        Self { row, bits, bit_pos: 0 }
    }

    fn read(&mut self) -> u16 {
        let byte = |index: usize| self.row.get(index).copied().unwrap_or(0);
        let value = match self.bits {
            16 => {
                let index = self.bit_pos / 8;
                u16::from_be_bytes([byte(index), byte(index + 1)])
            }
            8 => u16::from(byte(self.bit_pos / 8)),
            bits => {
                let shift = 8 - bits - self.bit_pos % 8;
                let mask = (1u8 << bits) - 1;
                u16::from((byte(self.bit_pos / 8) >> shift) & mask)
            }
        };
        self.bit_pos += self.bits;
        value
    }
}

/// Whether any pixel of `raster` has channels that differ by more than
/// `tolerance` (as a fraction of full scale).
pub fn is_rgb_image_colored(raster: &RgbRaster, tolerance: f64) -> bool {
    let max = ((1u32 << raster.bits_per_component) - 1) as f64;
    raster.samples.chunks_exact(3).any(|pixel| {
        is_triple_colored(
            tolerance,
            [
                f64::from(pixel[0]) / max,
                f64::from(pixel[1]) / max,
                f64::from(pixel[2]) / max,
            ],
        )
    })
}
