// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Named resource lookup for content streams.
//
// A content stream refers to colorspaces, patterns, shadings and XObjects by
// name. `ResourceResolver` turns those names into parsed values;
// `PdfResources` is the implementation backed by a `lopdf` document.

use chromascan_core::error::{ChromascanError, Result};
use chromascan_core::types::ResourceKind;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::color::ColorSpace;
use crate::color::space::MAX_COLOR_SPACE_DEPTH;
use crate::image::samples::PdfImage;
use crate::pdf::object::{self, kind_name};

/// Identity of a resource dictionary.
///
/// Indirect resource dictionaries are identified by their own object id;
/// direct ones by the id of the page, form or pattern that holds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub ObjectId);

/// Resolves names used in a content stream against its resources.
pub trait ResourceResolver: Sized {
    /// Identity of the resource dictionary names are looked up in.
    fn scope(&self) -> ScopeId;

    /// Colorspace named by a `CS`/`cs` operand.
    fn color_space(&self, name: &[u8]) -> Result<ColorSpace>;

    /// Colorspace given as a name or array, as in image dictionaries.
    fn color_space_from(&self, space: &Object) -> Result<ColorSpace>;

    fn pattern(&self, name: &[u8]) -> Result<Pattern<Self>>;

    fn shading(&self, name: &[u8]) -> Result<Shading>;

    fn xobject(&self, name: &[u8]) -> Result<XObject<Self>>;

    /// Interpret the dictionary and data of an inline image.
    fn inline_image(&self, image: &Stream) -> Result<PdfImage>;
}

/// A shading dictionary, reduced to what color detection needs.
#[derive(Debug, Clone)]
pub struct Shading {
    pub color_space: ColorSpace,
}

#[derive(Debug, Clone)]
pub struct TilingPattern<R> {
    /// 1 for colored patterns, 2 for uncolored ones.
    pub paint_type: i64,
    pub content: Vec<u8>,
    pub resources: R,
}

#[derive(Debug, Clone)]
pub enum Pattern<R> {
    Tiling(TilingPattern<R>),
    Shading(Shading),
}

impl<R> Pattern<R> {
    /// Swap the resource handle of a tiling pattern.
    pub fn map_resources<S>(self, f: impl FnOnce(R) -> S) -> Pattern<S> {
        match self {
            Self::Tiling(tiling) => Pattern::Tiling(TilingPattern {
                paint_type: tiling.paint_type,
                content: tiling.content,
                resources: f(tiling.resources),
            }),
            Self::Shading(shading) => Pattern::Shading(shading),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormXObject<R> {
    pub content: Vec<u8>,
    /// Own resources; `None` means the invoking stream's resources apply.
    pub resources: Option<R>,
}

#[derive(Debug, Clone)]
pub enum XObject<R> {
    Image(PdfImage),
    Form(FormXObject<R>),
    /// PostScript XObjects and unknown subtypes.
    Other,
}

impl<R> XObject<R> {
    pub fn map_resources<S>(self, f: impl FnOnce(R) -> S) -> XObject<S> {
        match self {
            Self::Image(image) => XObject::Image(image),
            Self::Form(form) => XObject::Form(FormXObject {
                content: form.content,
                resources: form.resources.map(f),
            }),
            Self::Other => XObject::Other,
        }
    }
}

// -- lopdf-backed resolver ----------------------------------------------------

/// Resource dictionary of a page, form or pattern inside a loaded document.
#[derive(Debug, Clone, Copy)]
pub struct PdfResources<'a> {
    doc: &'a Document,
    dict: Option<&'a Dictionary>,
    scope: ScopeId,
}

impl<'a> PdfResources<'a> {
    pub fn new(doc: &'a Document, dict: Option<&'a Dictionary>, scope: ScopeId) -> Self {
        Self { doc, dict, scope }
    }

    /// Resources stored under `/Resources` of `owner`, identified by the
    /// reference id when indirect and by `owner_id` otherwise.
    pub fn of(doc: &'a Document, owner: &'a Dictionary, owner_id: ObjectId) -> Result<Option<Self>> {
        let Ok(entry) = owner.get(b"Resources") else {
            return Ok(None);
        };
        let (ref_id, direct) = object::resolve(doc, entry)?;
        let dict = match direct {
            Object::Dictionary(dict) => dict,
            Object::Null => return Ok(None),
            other => {
                return Err(ChromascanError::malformed(
                    "resources",
                    format!("expected dictionary, found {}", kind_name(other)),
                ));
            }
        };
        Ok(Some(Self::new(doc, Some(dict), ScopeId(ref_id.unwrap_or(owner_id)))))
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    /// Resolved entry `name` of the `kind` sub-dictionary.
    fn entry(&self, kind: ResourceKind, name: &[u8]) -> Result<(Option<ObjectId>, &'a Object)> {
        let doc = self.doc;
        let category = match self.dict {
            Some(dict) => object::lookup_dict(doc, dict, kind.dictionary_key())?,
            None => None,
        };
        let entry = category
            .and_then(|category| category.get(name).ok())
            .ok_or_else(|| ChromascanError::missing(kind, name))?;
        object::resolve(doc, entry)
    }

    /// Look up `/ColorSpace` entry `name`, following names that refer to
    /// other entries at most [`MAX_COLOR_SPACE_DEPTH`] times.
    fn named_color_space(&self, name: &[u8], depth: usize) -> Result<ColorSpace> {
        if let Some(device) = ColorSpace::from_device_name(name) {
            return Ok(device);
        }
        if depth > MAX_COLOR_SPACE_DEPTH {
            return Err(ChromascanError::malformed(
                "colorspace",
                format!(
                    "/{} refers to itself or nests too deeply",
                    String::from_utf8_lossy(name)
                ),
            ));
        }
        let (_, space) = self.entry(ResourceKind::ColorSpace, name)?;
        ColorSpace::parse(self.doc, space, &|inner| {
            self.named_color_space(inner, depth + 1)
        })
    }

    fn shading_from(&self, object: &'a Object) -> Result<Shading> {
        let dict = match object {
            Object::Dictionary(dict) => dict,
            Object::Stream(stream) => &stream.dict,
            other => {
                return Err(ChromascanError::malformed(
                    "shading",
                    format!("expected dictionary or stream, found {}", kind_name(other)),
                ));
            }
        };
        let space = object::lookup(self.doc, dict, b"ColorSpace")?
            .ok_or_else(|| ChromascanError::malformed("shading", "missing /ColorSpace"))?;
        Ok(Shading {
            color_space: self.color_space_from(space)?,
        })
    }
}

impl<'a> ResourceResolver for PdfResources<'a> {
    fn scope(&self) -> ScopeId {
        self.scope
    }

    fn color_space(&self, name: &[u8]) -> Result<ColorSpace> {
        self.named_color_space(name, 0)
    }

    fn color_space_from(&self, space: &Object) -> Result<ColorSpace> {
        ColorSpace::parse(self.doc, space, &|inner| self.named_color_space(inner, 0))
    }

    fn pattern(&self, name: &[u8]) -> Result<Pattern<Self>> {
        let (id, pattern) = self.entry(ResourceKind::Pattern, name)?;
        let dict = match pattern {
            Object::Dictionary(dict) => dict,
            Object::Stream(stream) => &stream.dict,
            other => {
                return Err(ChromascanError::malformed(
                    "pattern",
                    format!("expected dictionary or stream, found {}", kind_name(other)),
                ));
            }
        };
        let pattern_type = object::lookup_integer(self.doc, dict, b"PatternType")?;
        debug!(name = %String::from_utf8_lossy(name), ?pattern_type, "resolving pattern");
        match (pattern_type, pattern) {
            (Some(1), Object::Stream(stream)) => {
                let paint_type = object::lookup_integer(self.doc, dict, b"PaintType")?.unwrap_or(1);
                let owner_id = id.unwrap_or(self.scope.0);
                let resources = Self::of(self.doc, dict, owner_id)?
                    .unwrap_or_else(|| Self::new(self.doc, None, ScopeId(owner_id)));
                Ok(Pattern::Tiling(TilingPattern {
                    paint_type,
                    content: object::stream_bytes(stream)?,
                    resources,
                }))
            }
            (Some(1), _) => Err(ChromascanError::malformed(
                "tiling pattern",
                "pattern is not a stream",
            )),
            (Some(2), _) => {
                let shading = object::lookup(self.doc, dict, b"Shading")?
                    .ok_or_else(|| ChromascanError::malformed("shading pattern", "missing /Shading"))?;
                Ok(Pattern::Shading(self.shading_from(shading)?))
            }
            (other, _) => Err(ChromascanError::malformed(
                "pattern",
                format!("unknown /PatternType {:?}", other),
            )),
        }
    }

    fn shading(&self, name: &[u8]) -> Result<Shading> {
        let (_, shading) = self.entry(ResourceKind::Shading, name)?;
        self.shading_from(shading)
    }

    fn xobject(&self, name: &[u8]) -> Result<XObject<Self>> {
        let (id, xobject) = self.entry(ResourceKind::XObject, name)?;
        let Object::Stream(stream) = xobject else {
            return Err(ChromascanError::malformed(
                "XObject",
                format!(
                    "/{} should be a stream, found {}",
                    String::from_utf8_lossy(name),
                    kind_name(xobject)
                ),
            ));
        };
        match object::lookup_name(self.doc, &stream.dict, b"Subtype")? {
            Some(b"Image") => Ok(XObject::Image(PdfImage::from_stream(self.doc, stream, |space| {
                self.color_space_from(space)
            })?)),
            Some(b"Form") => {
                let owner_id = id.unwrap_or(self.scope.0);
                Ok(XObject::Form(FormXObject {
                    content: object::stream_bytes(stream)?,
                    resources: Self::of(self.doc, &stream.dict, owner_id)?,
                }))
            }
            _ => Ok(XObject::Other),
        }
    }

    fn inline_image(&self, image: &Stream) -> Result<PdfImage> {
        PdfImage::from_stream(self.doc, image, |space| self.color_space_from(space))
    }
}
