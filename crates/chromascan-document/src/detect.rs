// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colored-mark detection.
//
// Replays a page's content stream and stops at the first operation that puts
// a colored mark on the page: a non-gray color being set, a colored pattern
// or shading, or an image with colored pixels. Form XObjects and colored
// tiling patterns are walked recursively. Patterns, shadings and XObjects are
// evaluated at most once per page and resource scope.

use std::collections::HashMap;
use std::ops::ControlFlow;

use chromascan_core::config::ScanConfig;
use chromascan_core::error::{ChromascanError, Result};
use chromascan_core::types::{PageVerdict, ScanStats, Verdict};
use lopdf::Object;
use lopdf::content::Operation;
use tracing::{debug, info, instrument, trace};

use crate::color::{Color, is_color_colored};
use crate::content::processor::single_name;
use crate::content::{ContentProcessor, GraphicsState, OperationHandler, Paint};
use crate::image::samples::{PdfImage, is_rgb_image_colored};
use crate::pdf::reader::PdfReader;
use crate::resources::{Pattern, ResourceResolver, ScopeId, Shading, XObject};

/// Filters that only ever carry gray samples. `CCITTDecode` is a name some
/// producers write for `CCITTFaxDecode`.
const GRAY_ONLY_FILTERS: [&[u8]; 4] = [
    b"CCITTFaxDecode",
    b"CCITTDecode",
    b"JBIG2Decode",
    b"RunLengthDecode",
];

/// Decides whether pages and content streams hold colored marks.
#[derive(Debug, Clone)]
pub struct ColorDetector {
    tolerance: f64,
    max_nesting_depth: usize,
}

impl Default for ColorDetector {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

impl ColorDetector {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            tolerance: config.color_tolerance,
            max_nesting_depth: config.max_nesting_depth,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Whether `content`, read against `resources`, draws anything colored.
    pub fn is_content_stream_colored<R: ResourceResolver>(
        &self,
        content: &[u8],
        resources: &R,
    ) -> Result<bool> {
        self.evaluate_content_stream(content, resources)
            .map(|(verdict, _)| verdict.is_colored())
    }

    /// Walk `content` and report the verdict with the work it took.
    pub fn evaluate_content_stream<R: ResourceResolver>(
        &self,
        content: &[u8],
        resources: &R,
    ) -> Result<(Verdict, ScanStats)> {
        let mut scan = PageScan::new(self);
        let verdict = scan.walk(content, resources, GraphicsState::default())?;
        Ok((verdict, scan.stats))
    }

    /// Evaluate one page (1-based) of `reader`.
    #[instrument(skip_all, fields(page = page_number))]
    pub fn evaluate_page(&self, reader: &PdfReader, page_number: u32) -> Result<PageVerdict> {
        let content = reader.page_content(page_number)?;
        let resources = reader.page_resources(page_number)?;
        let (verdict, stats) = self.evaluate_content_stream(&content, &resources)?;
        debug!(
            colored = verdict.is_colored(),
            operations = stats.operations,
            forms = stats.forms,
            "Page evaluated"
        );
        Ok(PageVerdict {
            page_number,
            colored: verdict.is_colored(),
            stats,
        })
    }

    pub fn is_page_colored(&self, reader: &PdfReader, page_number: u32) -> Result<bool> {
        self.evaluate_page(reader, page_number)
            .map(|verdict| verdict.colored)
    }
}

// -- Per-page traversal -------------------------------------------------------

type MemoKey = (ScopeId, Vec<u8>);

/// Traversal state shared by every content stream visited for one page.
struct PageScan<'d> {
    detector: &'d ColorDetector,
    patterns: HashMap<MemoKey, bool>,
    shadings: HashMap<MemoKey, bool>,
    xobjects: HashMap<MemoKey, bool>,
    stats: ScanStats,
    depth: usize,
}

impl<'d> PageScan<'d> {
    fn new(detector: &'d ColorDetector) -> Self {
        Self {
            detector,
            patterns: HashMap::new(),
            shadings: HashMap::new(),
            xobjects: HashMap::new(),
            stats: ScanStats::default(),
            depth: 0,
        }
    }

    fn walk<R: ResourceResolver>(
        &mut self,
        content: &[u8],
        resources: &R,
        state: GraphicsState,
    ) -> Result<Verdict> {
        let mut processor = ContentProcessor::with_state(resources, state);
        let flow = processor.process(content, self)?;
        Ok(Verdict::from_bool(flow.is_break()))
    }

    /// Walk a form or tiling pattern one level deeper.
    fn nested<R: ResourceResolver>(
        &mut self,
        content: &[u8],
        resources: &R,
        state: GraphicsState,
    ) -> Result<Verdict> {
        if self.depth >= self.detector.max_nesting_depth {
            return Err(ChromascanError::NestingTooDeep(self.detector.max_nesting_depth));
        }
        self.depth += 1;
        let verdict = self.walk(content, resources, state);
        self.depth -= 1;
        verdict
    }

    fn colored(&self, color: &Color) -> Result<bool> {
        is_color_colored(color, self.detector.tolerance)
    }

    // -- Colors and patterns --------------------------------------------------

    fn is_paint_colored<R: ResourceResolver>(
        &mut self,
        state: &GraphicsState,
        paint: Paint,
        resources: &R,
    ) -> Result<bool> {
        let color = state.color(paint);
        if !state.space(paint).is_pattern() {
            return self.colored(color);
        }
        let Color::Pattern(pattern) = color else {
            return Err(ChromascanError::UnexpectedColor {
                expected: "Pattern",
                found: color.family(),
            });
        };
        if let Some(underlying) = &pattern.underlying {
            if self.colored(underlying)? {
                return Ok(true);
            }
        }
        self.is_pattern_colored(&pattern.name, resources)
    }

    fn is_pattern_colored<R: ResourceResolver>(&mut self, name: &[u8], resources: &R) -> Result<bool> {
        let key = (resources.scope(), name.to_vec());
        if let Some(&colored) = self.patterns.get(&key) {
            trace!(pattern = %String::from_utf8_lossy(name), colored, "Pattern memo hit");
            return Ok(colored);
        }
        self.stats.patterns += 1;
        let colored = match resources.pattern(name)? {
            Pattern::Tiling(tiling) if tiling.paint_type == 1 => {
                self.patterns.insert(key.clone(), false);
                self.nested(&tiling.content, &tiling.resources, GraphicsState::default())?
                    .is_colored()
            }
            // Uncolored tiling patterns take their color from the underlying
            // colorspace, which has already been tested.
            Pattern::Tiling(_) => false,
            Pattern::Shading(shading) => self.is_shading_colored(&shading)?,
        };
        debug!(pattern = %String::from_utf8_lossy(name), colored, "Pattern evaluated");
        self.patterns.insert(key, colored);
        Ok(colored)
    }

    fn is_shading_colored(&self, shading: &Shading) -> Result<bool> {
        match shading.color_space.components() {
            1 => Ok(false),
            3 | 4 => Ok(true),
            n => Err(ChromascanError::UnsupportedColorSpace(format!(
                "shading in {} with {} components",
                shading.color_space.name(),
                n
            ))),
        }
    }

    fn is_sh_colored<R: ResourceResolver>(&mut self, op: &Operation, resources: &R) -> Result<bool> {
        let name = single_name(op)?;
        let key = (resources.scope(), name.to_vec());
        if let Some(&colored) = self.shadings.get(&key) {
            return Ok(colored);
        }
        self.stats.shadings += 1;
        let colored = self.is_shading_colored(&resources.shading(name)?)?;
        self.shadings.insert(key, colored);
        Ok(colored)
    }

    // -- Images and forms -----------------------------------------------------

    /// Filter-based shortcuts, then a full decode.
    fn is_image_colored(&self, image: &PdfImage) -> Result<bool> {
        if image.has_filter(b"JPXDecode") {
            return Ok(true);
        }
        if GRAY_ONLY_FILTERS.iter().any(|filter| image.has_filter(filter)) {
            return Ok(false);
        }
        let raster = image.decode_to_rgb()?;
        Ok(is_rgb_image_colored(&raster, self.detector.tolerance))
    }

    fn is_inline_image_colored<R: ResourceResolver>(
        &mut self,
        op: &Operation,
        resources: &R,
    ) -> Result<bool> {
        let [Object::Stream(stream)] = op.operands.as_slice() else {
            return Err(ChromascanError::operand(
                &op.operator,
                format!("expected one inline image, got {} operands", op.operands.len()),
            ));
        };
        self.stats.inline_images += 1;
        let image = resources.inline_image(stream)?;
        if image.image_mask || image.color_components().unwrap_or(1) <= 1 {
            return Ok(false);
        }
        self.is_image_colored(&image)
    }

    fn is_xobject_colored<R: ResourceResolver>(
        &mut self,
        op: &Operation,
        state: &GraphicsState,
        resources: &R,
    ) -> Result<bool> {
        let name = match op.operands.first() {
            Some(Object::Name(name)) => name.as_slice(),
            _ => return Err(ChromascanError::operand("Do", "expected an XObject name")),
        };
        let key = (resources.scope(), name.to_vec());
        if let Some(&colored) = self.xobjects.get(&key) {
            trace!(xobject = %String::from_utf8_lossy(name), colored, "XObject memo hit");
            return Ok(colored);
        }
        // A form reached again while it is being walked reads as gray.
        self.xobjects.insert(key.clone(), false);

        let colored = match resources.xobject(name)? {
            XObject::Image(image) => {
                self.stats.xobject_images += 1;
                let single_channel = match &image.color_space {
                    Some(space) => space.components() == 1 && !space.is_indexed(),
                    None => !image.has_filter(b"JPXDecode"),
                };
                if image.image_mask || single_channel {
                    false
                } else {
                    self.is_image_colored(&image)?
                }
            }
            XObject::Form(form) => {
                self.stats.forms += 1;
                let verdict = match &form.resources {
                    Some(own) => self.nested(&form.content, own, state.clone())?,
                    None => self.nested(&form.content, resources, state.clone())?,
                };
                verdict.is_colored()
            }
            XObject::Other => false,
        };
        debug!(xobject = %String::from_utf8_lossy(name), colored, "XObject evaluated");
        self.xobjects.insert(key, colored);
        Ok(colored)
    }
}

impl<R: ResourceResolver> OperationHandler<R> for PageScan<'_> {
    fn handle(
        &mut self,
        op: &Operation,
        state: &GraphicsState,
        resources: &R,
    ) -> Result<ControlFlow<()>> {
        self.stats.operations += 1;
        let colored = match op.operator.as_str() {
            "SC" | "SCN" => self.is_paint_colored(state, Paint::Stroke, resources)?,
            "sc" | "scn" => self.is_paint_colored(state, Paint::Fill, resources)?,
            "RG" | "K" => self.colored(&state.stroke_color)?,
            "rg" | "k" => self.colored(&state.fill_color)?,
            "sh" => self.is_sh_colored(op, resources)?,
            "BI" => self.is_inline_image_colored(op, resources)?,
            "Do" => self.is_xobject_colored(op, state, resources)?,
            _ => false,
        };
        if colored {
            info!(operator = %op.operator, "Colored mark found");
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;
    use crate::color::ColorSpace;
    use crate::pdf::fixtures::DocBuilder;
    use crate::resources::PdfResources;
    use chromascan_core::types::ResourceKind;
    use lopdf::{Dictionary, Document, ObjectId, Stream, dictionary};

    fn name(value: &str) -> Object {
        Object::Name(value.as_bytes().to_vec())
    }

    fn detector() -> ColorDetector {
        ColorDetector::default()
    }

    /// Resources dictionary stored as its own object.
    fn resources_of(doc: &Document, id: ObjectId) -> PdfResources<'_> {
        PdfResources::new(doc, doc.get_dictionary(id).ok(), ScopeId(id))
    }

    fn colored_with(doc: &Document, resources: ObjectId, content: &[u8]) -> Result<bool> {
        detector().is_content_stream_colored(content, &resources_of(doc, resources))
    }

    fn empty_resources(doc: &mut Document) -> ObjectId {
        doc.add_object(Dictionary::new())
    }

    /// Counts lookups per (kind, name) while delegating to `PdfResources`.
    #[derive(Clone)]
    struct Counting<'a> {
        inner: PdfResources<'a>,
        lookups: Rc<RefCell<HashMap<(ResourceKind, Vec<u8>), usize>>>,
    }

    impl<'a> Counting<'a> {
        fn count(&self, kind: ResourceKind, name: &[u8]) {
            *self.lookups.borrow_mut().entry((kind, name.to_vec())).or_default() += 1;
        }

        fn wrap(&self, inner: PdfResources<'a>) -> Self {
            Self {
                inner,
                lookups: Rc::clone(&self.lookups),
            }
        }

        fn lookups(&self, kind: ResourceKind, name: &str) -> usize {
            self.lookups
                .borrow()
                .get(&(kind, name.as_bytes().to_vec()))
                .copied()
                .unwrap_or(0)
        }
    }

    impl ResourceResolver for Counting<'_> {
        fn scope(&self) -> ScopeId {
            self.inner.scope()
        }

        fn color_space(&self, name: &[u8]) -> Result<ColorSpace> {
            self.inner.color_space(name)
        }

        fn color_space_from(&self, space: &Object) -> Result<ColorSpace> {
            self.inner.color_space_from(space)
        }

        fn pattern(&self, name: &[u8]) -> Result<Pattern<Self>> {
            self.count(ResourceKind::Pattern, name);
            Ok(self.inner.pattern(name)?.map_resources(|inner| self.wrap(inner)))
        }

        fn shading(&self, name: &[u8]) -> Result<Shading> {
            self.count(ResourceKind::Shading, name);
            self.inner.shading(name)
        }

        fn xobject(&self, name: &[u8]) -> Result<XObject<Self>> {
            self.count(ResourceKind::XObject, name);
            Ok(self.inner.xobject(name)?.map_resources(|inner| self.wrap(inner)))
        }

        fn inline_image(&self, image: &Stream) -> Result<PdfImage> {
            self.inner.inline_image(image)
        }
    }

    fn rgb_image(doc: &mut Document, pixels: &[u8]) -> ObjectId {
        doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject", "Subtype" => "Image",
                "Width" => (pixels.len() / 3) as i64, "Height" => 1i64,
                "BitsPerComponent" => 8i64, "ColorSpace" => "DeviceRGB",
            },
            pixels.to_vec(),
        ))
    }

    fn form(doc: &mut Document, content: &[u8], resources: Option<ObjectId>) -> ObjectId {
        let mut dict = dictionary! { "Type" => "XObject", "Subtype" => "Form" };
        if let Some(resources) = resources {
            dict.set("Resources", resources);
        }
        doc.add_object(Stream::new(dict, content.to_vec()))
    }

    // -- Colors -----------------------------------------------------------------

    #[test]
    fn black_fill_is_gray_and_red_fill_is_colored() {
        let mut doc = Document::with_version("1.5");
        let res = empty_resources(&mut doc);
        assert!(!colored_with(&doc, res, b"0 0 0 rg 0 0 10 10 re f").unwrap());
        assert!(colored_with(&doc, res, b"1 0 0 rg 0 0 10 10 re f").unwrap());
    }

    #[test]
    fn stroke_operators_and_cmyk() {
        let mut doc = Document::with_version("1.5");
        let res = empty_resources(&mut doc);
        assert!(!colored_with(&doc, res, b"0.3 0.3 0.3 RG 0 0 0 0.8 K 0.5 G").unwrap());
        assert!(colored_with(&doc, res, b"0 1 0 0 K").unwrap());
        assert!(!colored_with(&doc, res, b"0.2 0.2 0.2 1 k").unwrap());
    }

    #[test]
    fn scn_in_named_separation_space() {
        let mut doc = Document::with_version("1.5");
        let tint = dictionary! {
            "FunctionType" => 2i64,
            "Domain" => vec![Object::Integer(0), Object::Integer(1)],
            "C0" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0), Object::Integer(0)],
            "C1" => vec![Object::Integer(0), Object::Integer(1), Object::Integer(1), Object::Integer(0)],
            "N" => 1i64,
        };
        let res = doc.add_object(dictionary! {
            "ColorSpace" => dictionary! {
                "Spot" => vec![name("Separation"), name("Red"), name("DeviceCMYK"), Object::Dictionary(tint)],
            },
        });
        assert!(!colored_with(&doc, res, b"/Spot cs 0 scn").unwrap());
        assert!(colored_with(&doc, res, b"/Spot cs 1 scn").unwrap());
    }

    #[test]
    fn detection_is_deterministic() {
        let mut doc = Document::with_version("1.5");
        let res = empty_resources(&mut doc);
        let content = b"0.5 g 0 0 1 rg";
        let first = detector().evaluate_content_stream(content, &resources_of(&doc, res)).unwrap();
        let second = detector().evaluate_content_stream(content, &resources_of(&doc, res)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.0, Verdict::Colored);
        assert_eq!(first.1.operations, 2);
    }

    #[test]
    fn colored_mark_stops_the_walk() {
        let mut doc = Document::with_version("1.5");
        let res = empty_resources(&mut doc);
        let (verdict, stats) = detector()
            .evaluate_content_stream(b"1 0 0 rg 0 g /Missing Do", &resources_of(&doc, res))
            .unwrap();
        assert!(verdict.is_colored());
        assert_eq!(stats.operations, 1);
    }

    #[test]
    fn missing_resources_and_bad_operands_fail() {
        let mut doc = Document::with_version("1.5");
        let res = empty_resources(&mut doc);
        assert!(matches!(
            colored_with(&doc, res, b"/Im0 Do"),
            Err(ChromascanError::MissingResource { kind: ResourceKind::XObject, .. })
        ));
        assert!(colored_with(&doc, res, b"/A /B sh").is_err());
        assert!(colored_with(&doc, res, b"1 2 3 4 rg").is_err());
    }

    // -- Images -------------------------------------------------------------------

    #[test]
    fn image_xobjects_are_decoded() {
        let mut doc = Document::with_version("1.5");
        let gray = rgb_image(&mut doc, &[10, 10, 10, 200, 200, 200]);
        let red = rgb_image(&mut doc, &[10, 10, 10, 200, 0, 0]);
        let res = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Gray" => gray, "Red" => red },
        });
        assert!(!colored_with(&doc, res, b"/Gray Do").unwrap());
        assert!(colored_with(&doc, res, b"/Red Do").unwrap());
    }

    #[test]
    fn single_channel_images_are_skipped_without_decoding() {
        let mut doc = Document::with_version("1.5");
        // Far too little data: decoding would fail.
        let gray = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 100i64, "Height" => 100i64,
                "BitsPerComponent" => 8i64, "ColorSpace" => "DeviceGray",
            },
            vec![0; 3],
        ));
        let res = doc.add_object(dictionary! { "XObject" => dictionary! { "Im0" => gray } });
        assert!(!colored_with(&doc, res, b"/Im0 Do").unwrap());
    }

    #[test]
    fn filter_shortcuts() {
        let mut doc = Document::with_version("1.5");
        let jpx = doc.add_object(Stream::new(
            dictionary! { "Subtype" => "Image", "Width" => 1i64, "Height" => 1i64, "Filter" => "JPXDecode" },
            vec![0; 8],
        ));
        let fax = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 8i64, "Height" => 8i64, "BitsPerComponent" => 8i64,
                "ColorSpace" => "DeviceRGB", "Filter" => "CCITTFaxDecode",
            },
            vec![0; 8],
        ));
        let res = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Jpx" => jpx, "Fax" => fax },
        });
        assert!(colored_with(&doc, res, b"/Jpx Do").unwrap());
        assert!(!colored_with(&doc, res, b"/Fax Do").unwrap());
    }

    #[test]
    fn ccitt_filter_alias_is_gray() {
        let mut doc = Document::with_version("1.5");
        let fax = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 8i64, "Height" => 8i64, "BitsPerComponent" => 8i64,
                "ColorSpace" => "DeviceRGB", "Filter" => "CCITTDecode",
            },
            vec![0; 8],
        ));
        let res = doc.add_object(dictionary! { "XObject" => dictionary! { "Fax" => fax } });
        assert!(!colored_with(&doc, res, b"/Fax Do").unwrap());
    }

    #[test]
    fn icc_profile_disagreeing_with_alternate_fails() {
        let mut doc = Document::with_version("1.5");
        let profile = doc.add_object(Stream::new(
            dictionary! { "N" => 3i64, "Alternate" => "DeviceCMYK" },
            Vec::new(),
        ));
        let img = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 1i64, "Height" => 1i64, "BitsPerComponent" => 8i64,
                "ColorSpace" => vec![name("ICCBased"), Object::Reference(profile)],
            },
            vec![255, 0, 0],
        ));
        let res = doc.add_object(dictionary! { "XObject" => dictionary! { "Im0" => img } });
        assert!(matches!(
            colored_with(&doc, res, b"/Im0 Do"),
            Err(ChromascanError::Malformed { .. })
        ));
    }

    #[test]
    fn devicen_image_with_short_tint_output_fails() {
        let mut doc = Document::with_version("1.5");
        // C0/C1 default to one output; DeviceRGB needs three.
        let tint = dictionary! {
            "FunctionType" => 2i64,
            "Domain" => vec![Object::Integer(0), Object::Integer(1), Object::Integer(0), Object::Integer(1)],
            "N" => 1i64,
        };
        let img = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image", "Width" => 1i64, "Height" => 1i64, "BitsPerComponent" => 8i64,
                "ColorSpace" => vec![
                    name("DeviceN"),
                    Object::Array(vec![name("A"), name("B")]),
                    name("DeviceRGB"),
                    Object::Dictionary(tint),
                ],
            },
            vec![128, 64],
        ));
        let res = doc.add_object(dictionary! { "XObject" => dictionary! { "Im0" => img } });
        assert!(colored_with(&doc, res, b"/Im0 Do").is_err());
    }

    #[test]
    fn stitching_tint_with_short_domain_fails() {
        let mut doc = Document::with_version("1.5");
        let tint = dictionary! {
            "FunctionType" => 3i64,
            "Domain" => vec![Object::Integer(0)],
            "Functions" => vec![Object::Dictionary(dictionary! {
                "FunctionType" => 2i64,
                "Domain" => vec![Object::Integer(0), Object::Integer(1)],
                "N" => 1i64,
            })],
            "Bounds" => Vec::<Object>::new(),
            "Encode" => vec![Object::Integer(0), Object::Integer(1)],
        };
        let res = doc.add_object(dictionary! {
            "ColorSpace" => dictionary! {
                "Spot" => vec![name("Separation"), name("Red"), name("DeviceGray"), Object::Dictionary(tint)],
            },
        });
        assert!(matches!(
            colored_with(&doc, res, b"/Spot cs 1 scn"),
            Err(ChromascanError::Malformed { .. })
        ));
    }

    #[test]
    fn colorspace_naming_itself_fails() {
        let mut doc = Document::with_version("1.5");
        let res = doc.add_object(dictionary! {
            "ColorSpace" => dictionary! {
                "CS0" => vec![
                    name("Indexed"),
                    name("CS0"),
                    Object::Integer(1),
                    Object::string_literal(vec![0u8, 0]),
                ],
            },
        });
        assert!(colored_with(&doc, res, b"/CS0 cs 0 sc").is_err());
    }

    #[test]
    fn inline_images() {
        let mut doc = Document::with_version("1.5");
        let res = empty_resources(&mut doc);

        let mut red = b"BI /W 1 /H 1 /BPC 8 /CS /RGB ID ".to_vec();
        red.extend_from_slice(&[255, 0, 0]);
        red.extend_from_slice(b" EI");
        assert!(colored_with(&doc, res, &red).unwrap());

        let mut gray = b"BI /W 1 /H 1 /BPC 8 /CS /RGB ID ".to_vec();
        gray.extend_from_slice(&[90, 90, 90]);
        gray.extend_from_slice(b" EI");
        assert!(!colored_with(&doc, res, &gray).unwrap());

        // One component: skipped.
        assert!(!colored_with(&doc, res, b"BI /W 1 /H 1 /BPC 8 ID \x80 EI").unwrap());
    }

    // -- Shadings and patterns -------------------------------------------------

    #[test]
    fn shadings_classify_by_component_count() {
        let mut doc = Document::with_version("1.5");
        let gray = doc.add_object(dictionary! { "ShadingType" => 2i64, "ColorSpace" => "DeviceGray" });
        let rgb = doc.add_object(dictionary! { "ShadingType" => 2i64, "ColorSpace" => "DeviceRGB" });
        let tint = dictionary! {
            "FunctionType" => 2i64,
            "Domain" => vec![Object::Integer(0), Object::Integer(1)],
            "C0" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
            "C1" => vec![Object::Integer(1), Object::Integer(1), Object::Integer(1)],
            "N" => 1i64,
        };
        let two = doc.add_object(dictionary! {
            "ShadingType" => 2i64,
            "ColorSpace" => vec![
                name("DeviceN"),
                Object::Array(vec![name("A"), name("B")]),
                name("DeviceRGB"),
                Object::Dictionary(tint),
            ],
        });
        let res = doc.add_object(dictionary! {
            "Shading" => dictionary! { "Gray" => gray, "Rgb" => rgb, "Two" => two },
        });
        assert!(!colored_with(&doc, res, b"/Gray sh").unwrap());
        assert!(colored_with(&doc, res, b"/Rgb sh").unwrap());
        assert!(matches!(
            colored_with(&doc, res, b"/Two sh"),
            Err(ChromascanError::UnsupportedColorSpace(_))
        ));
    }

    fn pattern_doc(pattern_content: &[u8], paint_type: i64) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let tile = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "Pattern", "PatternType" => 1i64, "PaintType" => paint_type,
                "TilingType" => 1i64, "XStep" => 10i64, "YStep" => 10i64,
                "BBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(10), Object::Integer(10)],
                "Resources" => Dictionary::new(),
            },
            pattern_content.to_vec(),
        ));
        let res = doc.add_object(dictionary! {
            "Pattern" => dictionary! { "P0" => tile },
            "ColorSpace" => dictionary! { "PCS" => vec![name("Pattern"), name("DeviceRGB")] },
        });
        (doc, res)
    }

    #[test]
    fn colored_tiling_pattern_marks_first_use() {
        let (doc, res) = pattern_doc(b"0 0 1 rg 0 0 5 5 re f", 1);
        assert!(colored_with(&doc, res, b"/Pattern cs /P0 scn 0 0 10 10 re f").unwrap());
        assert!(colored_with(&doc, res, b"/Pattern CS /P0 SCN").unwrap());

        let (doc, res) = pattern_doc(b"0.5 g 0 0 5 5 re f", 1);
        assert!(!colored_with(&doc, res, b"/Pattern cs /P0 scn").unwrap());
    }

    #[test]
    fn uncolored_pattern_uses_underlying_color() {
        let (doc, res) = pattern_doc(b"0 0 5 5 re f", 2);
        assert!(!colored_with(&doc, res, b"/PCS cs 0.5 0.5 0.5 /P0 scn").unwrap());
        assert!(colored_with(&doc, res, b"/PCS cs 1 0 0 /P0 scn").unwrap());
    }

    #[test]
    fn pattern_is_resolved_once_per_page() {
        let (doc, res) = pattern_doc(b"0.5 g", 1);
        let counting = Counting {
            inner: resources_of(&doc, res),
            lookups: Rc::default(),
        };
        let colored = detector()
            .is_content_stream_colored(b"/Pattern cs /P0 scn f /P0 scn f /Pattern CS /P0 SCN S", &counting)
            .unwrap();
        assert!(!colored);
        assert_eq!(counting.lookups(ResourceKind::Pattern, "P0"), 1);
    }

    #[test]
    fn pattern_space_operands() {
        let (doc, res) = pattern_doc(b"", 1);
        // `cs` selects the initial pattern color, which names no pattern.
        assert!(matches!(
            colored_with(&doc, res, b"/Pattern cs /P0 scn /Pattern cs 0 0 1 0 re"),
            Ok(false)
        ));
        assert!(colored_with(&doc, res, b"/Pattern cs (x) scn").is_err());
    }

    // -- Forms ------------------------------------------------------------------

    #[test]
    fn forms_use_own_resources_or_inherit() {
        let mut doc = Document::with_version("1.5");
        let red = rgb_image(&mut doc, &[255, 0, 0]);
        let gray = rgb_image(&mut doc, &[60, 60, 60]);

        // The form's own resources map /Im0 to a gray image.
        let form_res = doc.add_object(dictionary! { "XObject" => dictionary! { "Im0" => gray } });
        let own = form(&mut doc, b"/Im0 Do", Some(form_res));
        // No resources: /Im0 resolves in the page's resources (red).
        let inherits = form(&mut doc, b"/Im0 Do", None);

        let with_own = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Fm0" => own, "Im0" => red },
        });
        let inheriting = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Fm0" => inherits, "Im0" => red },
        });
        assert!(!colored_with(&doc, with_own, b"/Fm0 Do").unwrap());
        assert!(colored_with(&doc, inheriting, b"/Fm0 Do").unwrap());
    }

    #[test]
    fn form_inherits_graphics_state() {
        let mut doc = Document::with_version("1.5");
        let fm = form(&mut doc, b"1 0 0 sc 0 0 1 1 re f", None);
        let res = doc.add_object(dictionary! { "XObject" => dictionary! { "Fm0" => fm } });
        assert!(colored_with(&doc, res, b"/DeviceRGB cs /Fm0 Do").unwrap());
        assert!(colored_with(&doc, res, b"/DeviceGray cs /Fm0 Do").is_err());
    }

    #[test]
    fn repeated_form_is_walked_once() {
        let mut doc = Document::with_version("1.5");
        let fm = form(&mut doc, b"0.5 g 0 0 1 1 re f", None);
        let res = doc.add_object(dictionary! { "XObject" => dictionary! { "Fm0" => fm } });
        let counting = Counting {
            inner: resources_of(&doc, res),
            lookups: Rc::default(),
        };
        let (verdict, stats) = detector()
            .evaluate_content_stream(b"/Fm0 Do /Fm0 Do q /Fm0 Do Q", &counting)
            .unwrap();
        assert_eq!(verdict, Verdict::Undetermined);
        assert_eq!(stats.forms, 1);
        assert_eq!(counting.lookups(ResourceKind::XObject, "Fm0"), 1);
    }

    #[test]
    fn self_referencing_form_reads_as_gray() {
        let mut doc = Document::with_version("1.5");
        let form_res = doc.new_object_id();
        let fm = form(&mut doc, b"/Self Do 0.2 g", Some(form_res));
        doc.objects.insert(
            form_res,
            Object::Dictionary(dictionary! { "XObject" => dictionary! { "Self" => fm } }),
        );
        let res = doc.add_object(dictionary! { "XObject" => dictionary! { "Fm0" => fm } });
        assert!(!colored_with(&doc, res, b"/Fm0 Do").unwrap());
    }

    #[test]
    fn nesting_beyond_limit_fails() {
        let mut doc = Document::with_version("1.5");
        let mut inner = form(&mut doc, b"1 0 0 rg", None);
        for _ in 0..4 {
            let res = doc.add_object(dictionary! { "XObject" => dictionary! { "Fm" => inner } });
            inner = form(&mut doc, b"/Fm Do", Some(res));
        }
        let res = doc.add_object(dictionary! { "XObject" => dictionary! { "Fm" => inner } });

        // Five forms deep.
        assert!(colored_with(&doc, res, b"/Fm Do").unwrap());

        let shallow = ColorDetector::new(&ScanConfig {
            max_nesting_depth: 3,
            ..ScanConfig::default()
        });
        let err = shallow
            .is_content_stream_colored(b"/Fm Do", &resources_of(&doc, res))
            .unwrap_err();
        assert!(matches!(err, ChromascanError::NestingTooDeep(3)));
    }

    // -- Pages --------------------------------------------------------------------

    #[test]
    fn pages_of_a_document() {
        let mut builder = DocBuilder::new();
        builder.page(b"0 g 0 0 10 10 re f", Dictionary::new());
        builder.page(b"0 0 1 RG 0 0 m 10 10 l S", Dictionary::new());
        builder.page(b"0.5 0.5 0.5 rg", Dictionary::new());
        let reader = PdfReader::from_document(builder.finish()).unwrap();

        let detector = detector();
        assert!(!detector.is_page_colored(&reader, 1).unwrap());
        assert!(detector.is_page_colored(&reader, 2).unwrap());
        assert_eq!(reader.color_pages(&detector).unwrap(), vec![2]);
    }
}
