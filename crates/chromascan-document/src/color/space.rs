// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colorspace model: parsing from PDF objects, turning operands into colors,
// and converting image samples to RGB.

use chromascan_core::error::{ChromascanError, Result};
use lopdf::{Document, Object};

use super::function::Function;
use super::value::{Color, PatternColor};
use crate::pdf::object::{self, kind_name};

/// D65 white point, used when a CIE-based space omits /WhitePoint.
const D65: [f64; 3] = [0.9505, 1.0, 1.089];

/// Limit on colorspaces nested inside one another (bases, alternates and
/// named references).
pub const MAX_COLOR_SPACE_DEPTH: usize = 8;

#[derive(Debug, Clone)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    CalGray,
    CalRgb,
    Lab {
        white_point: [f64; 3],
        /// a*/b* ranges as `[amin amax bmin bmax]`.
        range: [f64; 4],
    },
    IccBased {
        components: usize,
        alternate: Box<ColorSpace>,
    },
    Indexed {
        base: Box<ColorSpace>,
        hival: usize,
        lookup: Vec<u8>,
    },
    Separation {
        alternate: Box<ColorSpace>,
        tint: Function,
    },
    DeviceN {
        components: usize,
        alternate: Box<ColorSpace>,
        tint: Function,
    },
    Pattern {
        underlying: Option<Box<ColorSpace>>,
    },
}

impl ColorSpace {
    /// Colorspaces that can be named without a resource lookup, including the
    /// abbreviations allowed in inline images.
    pub fn from_device_name(name: &[u8]) -> Option<Self> {
        match name {
            b"DeviceGray" | b"G" => Some(Self::DeviceGray),
            b"DeviceRGB" | b"RGB" => Some(Self::DeviceRgb),
            b"DeviceCMYK" | b"CMYK" => Some(Self::DeviceCmyk),
            b"Pattern" => Some(Self::Pattern { underlying: None }),
            _ => None,
        }
    }

    /// Parse a colorspace given as a name or array.
    ///
    /// Names that are not device names are handed to `named` so the caller
    /// can consult its `/ColorSpace` resources.
    pub fn parse(
        doc: &Document,
        space: &Object,
        named: &dyn Fn(&[u8]) -> Result<ColorSpace>,
    ) -> Result<Self> {
        Self::parse_nested(doc, space, named, 0)
    }

    fn parse_nested(
        doc: &Document,
        space: &Object,
        named: &dyn Fn(&[u8]) -> Result<ColorSpace>,
        depth: usize,
    ) -> Result<Self> {
        if depth > MAX_COLOR_SPACE_DEPTH {
            return Err(ChromascanError::malformed(
                "colorspace",
                format!("nested deeper than {}", MAX_COLOR_SPACE_DEPTH),
            ));
        }
        let (_, space) = object::resolve(doc, space)?;
        match space {
            Object::Name(name) => match Self::from_device_name(name) {
                Some(device) => Ok(device),
                None => named(name),
            },
            Object::Array(items) => Self::parse_array(doc, items, named, depth),
            other => Err(ChromascanError::malformed(
                "colorspace",
                format!("expected name or array, found {}", kind_name(other)),
            )),
        }
    }

    fn parse_array(
        doc: &Document,
        items: &[Object],
        named: &dyn Fn(&[u8]) -> Result<ColorSpace>,
        depth: usize,
    ) -> Result<Self> {
        let nested = |space: &Object| Self::parse_nested(doc, space, named, depth + 1);
        let family = match items.first().map(|first| object::resolve(doc, first)) {
            Some(Ok((_, Object::Name(name)))) => name.as_slice(),
            _ => {
                return Err(ChromascanError::malformed(
                    "colorspace",
                    "array does not start with a family name",
                ));
            }
        };
        let operand = |index: usize| -> Result<&Object> {
            let item = items.get(index).ok_or_else(|| {
                ChromascanError::malformed(
                    "colorspace",
                    format!(
                        "/{} array is missing element {}",
                        String::from_utf8_lossy(family),
                        index
                    ),
                )
            })?;
            object::resolve(doc, item).map(|(_, direct)| direct)
        };

        match family {
            b"DeviceGray" | b"G" => Ok(Self::DeviceGray),
            b"DeviceRGB" | b"RGB" => Ok(Self::DeviceRgb),
            b"DeviceCMYK" | b"CMYK" => Ok(Self::DeviceCmyk),
            b"CalGray" => Ok(Self::CalGray),
            b"CalRGB" => Ok(Self::CalRgb),
            b"Lab" => {
                let dict = match operand(1)? {
                    Object::Dictionary(dict) => dict,
                    other => {
                        return Err(ChromascanError::malformed(
                            "Lab colorspace",
                            format!("expected dictionary, found {}", kind_name(other)),
                        ));
                    }
                };
                let white_point = object::lookup_numbers(doc, dict, b"WhitePoint")?
                    .and_then(|wp| wp.try_into().ok())
                    .unwrap_or(D65);
                let range = object::lookup_numbers(doc, dict, b"Range")?
                    .and_then(|r| r.try_into().ok())
                    .unwrap_or([-100.0, 100.0, -100.0, 100.0]);
                Ok(Self::Lab { white_point, range })
            }
            b"ICCBased" => {
                let stream = match operand(1)? {
                    Object::Stream(stream) => stream,
                    other => {
                        return Err(ChromascanError::malformed(
                            "ICCBased colorspace",
                            format!("expected stream, found {}", kind_name(other)),
                        ));
                    }
                };
                let components = match object::lookup_integer(doc, &stream.dict, b"N")? {
                    Some(n @ 1..=4) => n as usize,
                    Some(n) => {
                        return Err(ChromascanError::UnsupportedColorSpace(format!(
                            "ICCBased with N={}",
                            n
                        )));
                    }
                    None => {
                        return Err(ChromascanError::malformed("ICCBased colorspace", "missing /N"));
                    }
                };
                let alternate = match object::lookup(doc, &stream.dict, b"Alternate")? {
                    Some(alt) => nested(alt)?,
                    None => match components {
                        1 => Self::DeviceGray,
                        3 => Self::DeviceRgb,
                        4 => Self::DeviceCmyk,
                        n => {
                            return Err(ChromascanError::UnsupportedColorSpace(format!(
                                "ICCBased with N={}",
                                n
                            )));
                        }
                    },
                };
                if alternate.components() != components {
                    return Err(ChromascanError::malformed(
                        "ICCBased colorspace",
                        format!(
                            "/N {} does not match /Alternate {} with {} components",
                            components,
                            alternate.name(),
                            alternate.components()
                        ),
                    ));
                }
                Ok(Self::IccBased {
                    components,
                    alternate: Box::new(alternate),
                })
            }
            b"Indexed" | b"I" => {
                let base = nested(operand(1)?)?;
                let hival = object::as_number(operand(2)?).ok_or_else(|| {
                    ChromascanError::malformed("Indexed colorspace", "hival is not a number")
                })? as usize;
                let lookup = match operand(3)? {
                    Object::String(bytes, _) => bytes.clone(),
                    Object::Stream(stream) => object::stream_bytes(stream)?,
                    other => {
                        return Err(ChromascanError::malformed(
                            "Indexed colorspace",
                            format!("expected lookup string or stream, found {}", kind_name(other)),
                        ));
                    }
                };
                Ok(Self::Indexed {
                    base: Box::new(base),
                    hival,
                    lookup,
                })
            }
            b"Separation" => Ok(Self::Separation {
                alternate: Box::new(nested(operand(2)?)?),
                tint: Function::parse(doc, operand(3)?)?,
            }),
            b"DeviceN" => {
                let components = match operand(1)? {
                    Object::Array(names) => names.len(),
                    other => {
                        return Err(ChromascanError::malformed(
                            "DeviceN colorspace",
                            format!("expected colorant array, found {}", kind_name(other)),
                        ));
                    }
                };
                Ok(Self::DeviceN {
                    components,
                    alternate: Box::new(nested(operand(2)?)?),
                    tint: Function::parse(doc, operand(3)?)?,
                })
            }
            b"Pattern" => {
                let underlying = match items.get(1) {
                    Some(base) => Some(Box::new(nested(base)?)),
                    None => None,
                };
                Ok(Self::Pattern { underlying })
            }
            other => Err(ChromascanError::UnsupportedColorSpace(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }

    /// Number of color components an operand list or image sample carries.
    pub fn components(&self) -> usize {
        match self {
            Self::DeviceGray | Self::CalGray => 1,
            Self::DeviceRgb | Self::CalRgb | Self::Lab { .. } => 3,
            Self::DeviceCmyk => 4,
            Self::IccBased { components, .. } => *components,
            Self::Indexed { .. } | Self::Separation { .. } => 1,
            Self::DeviceN { components, .. } => *components,
            Self::Pattern { .. } => 1,
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern { .. })
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Indexed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DeviceGray => "DeviceGray",
            Self::DeviceRgb => "DeviceRGB",
            Self::DeviceCmyk => "DeviceCMYK",
            Self::CalGray => "CalGray",
            Self::CalRgb => "CalRGB",
            Self::Lab { .. } => "Lab",
            Self::IccBased { .. } => "ICCBased",
            Self::Indexed { .. } => "Indexed",
            Self::Separation { .. } => "Separation",
            Self::DeviceN { .. } => "DeviceN",
            Self::Pattern { .. } => "Pattern",
        }
    }

    /// Color selected when this space becomes current (`CS`/`cs`).
    pub fn initial_color(&self) -> Result<Color> {
        match self {
            Self::DeviceGray => Ok(Color::DeviceGray(0.0)),
            Self::DeviceRgb => Ok(Color::DeviceRgb([0.0; 3])),
            Self::DeviceCmyk => Ok(Color::DeviceCmyk([0.0, 0.0, 0.0, 1.0])),
            Self::CalGray => Ok(Color::CalGray(0.0)),
            Self::CalRgb => Ok(Color::CalRgb([0.0; 3])),
            Self::Lab { range, .. } => Ok(Color::Lab([
                0.0,
                0.0f64.max(range[0]).min(range[1]),
                0.0f64.max(range[2]).min(range[3]),
            ])),
            Self::IccBased { alternate, .. } => alternate.initial_color(),
            Self::Indexed { .. } => self.color_from_components(&[0.0]),
            Self::Separation { .. } => self.color_from_components(&[1.0]),
            Self::DeviceN { components, .. } => self.color_from_components(&vec![1.0; *components]),
            Self::Pattern { .. } => Ok(Color::Pattern(PatternColor {
                name: Vec::new(),
                underlying: None,
            })),
        }
    }

    /// Build a color from operand values in this space's natural ranges.
    pub fn color_from_components(&self, values: &[f64]) -> Result<Color> {
        let expected = self.components();
        if values.len() != expected {
            return Err(ChromascanError::malformed(
                "color",
                format!(
                    "{} expects {} components, got {}",
                    self.name(),
                    expected,
                    values.len()
                ),
            ));
        }
        match self {
            Self::DeviceGray => Ok(Color::DeviceGray(values[0])),
            Self::DeviceRgb => Ok(Color::DeviceRgb([values[0], values[1], values[2]])),
            Self::DeviceCmyk => Ok(Color::DeviceCmyk([values[0], values[1], values[2], values[3]])),
            Self::CalGray => Ok(Color::CalGray(values[0])),
            Self::CalRgb => Ok(Color::CalRgb([values[0], values[1], values[2]])),
            Self::Lab { .. } => Ok(Color::Lab([values[0], values[1], values[2]])),
            Self::IccBased { alternate, .. } => alternate.color_from_components(values),
            Self::Indexed { base, .. } => base.color_from_components(&self.lookup_entry(values[0])?),
            Self::Separation { alternate, tint } | Self::DeviceN { alternate, tint, .. } => {
                alternate.color_from_components(&tint.eval(values)?)
            }
            Self::Pattern { .. } => Err(ChromascanError::UnexpectedColor {
                expected: "non-pattern",
                found: "Pattern",
            }),
        }
    }

    /// Default `/Decode` array for image samples of `bits_per_component` bits.
    pub fn default_decode(&self, bits_per_component: u8) -> Vec<f64> {
        match self {
            Self::Lab { range, .. } => vec![0.0, 100.0, range[0], range[1], range[2], range[3]],
            Self::Indexed { .. } => vec![0.0, ((1u32 << bits_per_component) - 1) as f64],
            _ => [0.0, 1.0].repeat(self.components()),
        }
    }

    /// Convert one pixel, given in this space's natural ranges, to RGB in 0-1.
    pub fn to_rgb(&self, values: &[f64]) -> Result<[f64; 3]> {
        if values.len() != self.components() {
            return Err(ChromascanError::malformed(
                "color",
                format!(
                    "{} pixel needs {} components, got {}",
                    self.name(),
                    self.components(),
                    values.len()
                ),
            ));
        }
        match self {
            Self::DeviceGray | Self::CalGray => {
                let g = values[0].clamp(0.0, 1.0);
                Ok([g, g, g])
            }
            Self::DeviceRgb | Self::CalRgb => Ok([
                values[0].clamp(0.0, 1.0),
                values[1].clamp(0.0, 1.0),
                values[2].clamp(0.0, 1.0),
            ]),
            Self::DeviceCmyk => {
                let [c, m, y, k] = [values[0], values[1], values[2], values[3]].map(|v| v.clamp(0.0, 1.0));
                Ok([(1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)])
            }
            Self::Lab { white_point, .. } => Ok(lab_to_rgb(*white_point, [values[0], values[1], values[2]])),
            Self::IccBased { alternate, .. } => alternate.to_rgb(values),
            Self::Indexed { base, .. } => base.to_rgb(&self.lookup_entry(values[0])?),
            Self::Separation { alternate, tint } | Self::DeviceN { alternate, tint, .. } => {
                alternate.to_rgb(&tint.eval(values)?)
            }
            Self::Pattern { .. } => Err(ChromascanError::UnsupportedColorSpace(
                "Pattern colorspace has no pixel values".into(),
            )),
        }
    }

    /// Base-space component values stored at palette `index`.
    fn lookup_entry(&self, index: f64) -> Result<Vec<f64>> {
        let Self::Indexed { base, hival, lookup } = self else {
            return Err(ChromascanError::UnsupportedColorSpace(format!(
                "{} is not indexed",
                self.name()
            )));
        };
        let n = base.components();
        let index = (index.round().max(0.0) as usize).min(*hival);
        let entry = index
            .checked_mul(n)
            .and_then(|start| lookup.get(start..start.checked_add(n)?))
            .ok_or_else(|| {
                ChromascanError::malformed("Indexed colorspace", "lookup table is too short")
            })?;
        let decode = base.default_decode(8);
        Ok(entry
            .iter()
            .enumerate()
            .map(|(i, byte)| {
                let (min, max) = (decode[2 * i], decode[2 * i + 1]);
                min + f64::from(*byte) * (max - min) / 255.0
            })
            .collect())
    }
}

/// CIE L*a*b* to sRGB.
fn lab_to_rgb(white_point: [f64; 3], [l, a, b]: [f64; 3]) -> [f64; 3] {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let inverse = |t: f64| {
        if t > 6.0 / 29.0 {
            t * t * t
        } else {
            3.0 * (6.0f64 / 29.0).powi(2) * (t - 4.0 / 29.0)
        }
    };
    let x = white_point[0] * inverse(fx);
    let y = white_point[1] * inverse(fy);
    let z = white_point[2] * inverse(fz);

    let linear = [
        3.2406 * x - 1.5372 * y - 0.4986 * z,
        -0.9689 * x + 1.8758 * y + 0.0415 * z,
        0.0557 * x - 0.2040 * y + 1.0570 * z,
    ];
    linear.map(|c| {
        let c = c.clamp(0.0, 1.0);
        if c <= 0.0031308 {
            12.92 * c
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Stream, StringFormat, dictionary};

    fn no_names(name: &[u8]) -> Result<ColorSpace> {
        Err(ChromascanError::UnsupportedColorSpace(
            String::from_utf8_lossy(name).into_owned(),
        ))
    }

    fn name(value: &str) -> Object {
        Object::Name(value.as_bytes().to_vec())
    }

    #[test]
    fn device_names_resolve_without_lookup() {
        let doc = Document::with_version("1.5");
        let space = ColorSpace::parse(&doc, &name("DeviceCMYK"), &no_names).unwrap();
        assert_eq!(space.components(), 4);
        assert!(ColorSpace::parse(&doc, &name("CS0"), &no_names).is_err());
    }

    #[test]
    fn indexed_colors_resolve_to_base() {
        let doc = Document::with_version("1.5");
        let space = Object::Array(vec![
            name("Indexed"),
            name("DeviceRGB"),
            Object::Integer(1),
            Object::String(vec![128, 128, 128, 255, 0, 0], StringFormat::Hexadecimal),
        ]);
        let space = ColorSpace::parse(&doc, &space, &no_names).unwrap();
        assert!(space.is_indexed());

        match space.color_from_components(&[1.0]).unwrap() {
            Color::DeviceRgb(rgb) => assert_eq!(rgb, [1.0, 0.0, 0.0]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(space.to_rgb(&[0.0]).unwrap(), [128.0 / 255.0; 3]);
        // Out-of-range indices clamp to hival.
        assert_eq!(space.to_rgb(&[9.0]).unwrap(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn separation_evaluates_tint_transform() {
        let doc = Document::with_version("1.5");
        let tint = Object::Dictionary(dictionary! {
            "FunctionType" => 2i64,
            "Domain" => vec![Object::Integer(0), Object::Integer(1)],
            "C0" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0), Object::Integer(0)],
            "C1" => vec![Object::Integer(0), Object::Integer(1), Object::Integer(0), Object::Integer(0)],
            "N" => 1i64,
        });
        let space = Object::Array(vec![name("Separation"), name("Magenta"), name("DeviceCMYK"), tint]);
        let space = ColorSpace::parse(&doc, &space, &no_names).unwrap();
        assert_eq!(space.components(), 1);

        match space.initial_color().unwrap() {
            Color::DeviceCmyk(cmyk) => assert_eq!(cmyk, [0.0, 1.0, 0.0, 0.0]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn icc_based_uses_component_count() {
        let mut doc = Document::with_version("1.5");
        let mut dict = Dictionary::new();
        dict.set("N", Object::Integer(3));
        let profile = doc.add_object(Object::Stream(Stream::new(dict, vec![0; 4])));
        let space = Object::Array(vec![name("ICCBased"), Object::Reference(profile)]);
        let space = ColorSpace::parse(&doc, &space, &no_names).unwrap();
        assert_eq!(space.components(), 3);
        assert!(matches!(
            space.color_from_components(&[0.1, 0.2, 0.3]).unwrap(),
            Color::DeviceRgb(_)
        ));
    }

    #[test]
    fn icc_based_alternate_must_match_component_count() {
        let mut doc = Document::with_version("1.5");
        let profile = doc.add_object(Object::Stream(Stream::new(
            dictionary! { "N" => 3i64, "Alternate" => "DeviceCMYK" },
            vec![0; 4],
        )));
        let space = Object::Array(vec![name("ICCBased"), Object::Reference(profile)]);
        assert!(matches!(
            ColorSpace::parse(&doc, &space, &no_names),
            Err(ChromascanError::Malformed { .. })
        ));
    }

    #[test]
    fn pixel_component_count_is_checked() {
        assert!(ColorSpace::DeviceCmyk.to_rgb(&[0.1, 0.2, 0.3]).is_err());
        assert!(ColorSpace::DeviceRgb.to_rgb(&[0.5]).is_err());
        assert!(ColorSpace::DeviceGray.to_rgb(&[]).is_err());
    }

    #[test]
    fn devicen_tint_with_too_few_outputs_is_an_error() {
        let doc = Document::with_version("1.5");
        // Default C0/C1 give one output; DeviceRGB needs three.
        let tint = Object::Dictionary(dictionary! {
            "FunctionType" => 2i64,
            "Domain" => vec![Object::Integer(0), Object::Integer(1)],
            "N" => 1i64,
        });
        let space = Object::Array(vec![
            name("DeviceN"),
            Object::Array(vec![name("A"), name("B")]),
            name("DeviceRGB"),
            tint,
        ]);
        let space = ColorSpace::parse(&doc, &space, &no_names).unwrap();
        assert!(space.to_rgb(&[0.5, 0.5]).is_err());
    }

    #[test]
    fn self_referencing_array_is_rejected() {
        let mut doc = Document::with_version("1.5");
        let id = doc.new_object_id();
        doc.objects.insert(
            id,
            Object::Array(vec![
                name("Indexed"),
                Object::Reference(id),
                Object::Integer(1),
                Object::String(vec![0, 0], StringFormat::Hexadecimal),
            ]),
        );
        assert!(matches!(
            ColorSpace::parse(&doc, &Object::Reference(id), &no_names),
            Err(ChromascanError::Malformed { .. })
        ));
    }

    #[test]
    fn pattern_with_underlying_space() {
        let doc = Document::with_version("1.5");
        let space = Object::Array(vec![name("Pattern"), name("DeviceRGB")]);
        match ColorSpace::parse(&doc, &space, &no_names).unwrap() {
            ColorSpace::Pattern { underlying: Some(base) } => assert_eq!(base.components(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn component_count_mismatch_is_an_error() {
        assert!(ColorSpace::DeviceRgb.color_from_components(&[0.5]).is_err());
    }

    #[test]
    fn cmyk_to_rgb() {
        assert_eq!(ColorSpace::DeviceCmyk.to_rgb(&[0.0, 0.0, 0.0, 1.0]).unwrap(), [0.0; 3]);
        assert_eq!(ColorSpace::DeviceCmyk.to_rgb(&[1.0, 0.0, 0.0, 0.0]).unwrap(), [0.0, 1.0, 1.0]);
    }

    #[test]
    fn lab_neutral_axis_is_gray() {
        let space = ColorSpace::Lab {
            white_point: D65,
            range: [-100.0, 100.0, -100.0, 100.0],
        };
        let [r, g, b] = space.to_rgb(&[50.0, 0.0, 0.0]).unwrap();
        assert!((r - g).abs() < 0.01 && (g - b).abs() < 0.01);
    }
}
