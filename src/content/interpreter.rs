//! Content stream interpreter.
//!
//! Executes parsed operators against a [`GraphicsStateStack`] and forwards
//! the results to a [`Device`]. Paths are built in user space and handed
//! over with the CTM at paint time. Resource problems (unknown fonts, bad
//! images, unsupported shadings) are logged and the operator is skipped;
//! only runaway form nesting aborts the run.

use std::collections::HashMap;
use std::sync::Arc;

use crate::content::device::{Device, Glyph, Path};
use crate::content::graphics_state::{ColorState, GraphicsState, GraphicsStateStack};
use crate::content::operators::{FillRule, Operator, TextElement};
use crate::content::parser::parse_content_stream;
use crate::decoders::{self, DecodeLimits};
use crate::error::{Error, Result};
use crate::geometry::{Matrix, Point, Rect};
use crate::object::{Dictionary, DictionaryExt, Object, ObjectRef, XObjectHandle};
use crate::page_tree::Page;
use crate::resources::{self, decode_image, ColorSpace, Font, FontRegistry, Gradient, ImageData};
use crate::store::ObjectStore;

/// A decoded external object kept for reuse within one run.
enum XObject {
    Image(Arc<ImageData>),
    Form {
        operators: Arc<Vec<Operator>>,
        matrix: Matrix,
        bbox: Option<Rect>,
        resources: Option<Dictionary>,
    },
}

/// Content stream virtual machine.
pub struct Interpreter<'a> {
    store: &'a mut ObjectStore,
    fonts: &'a FontRegistry,
    device: &'a mut dyn Device,
    states: GraphicsStateStack,
    resources: Dictionary,
    base_ctm: Matrix,
    path: Path,
    pending_clip: Option<FillRule>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_cache: HashMap<ObjectRef, Arc<Font>>,
    xobjects: Vec<XObject>,
    handles: HashMap<ObjectRef, Object>,
    form_stack: Vec<ObjectRef>,
}

impl<'a> Interpreter<'a> {
    /// Interpreter over `resources` whose user space maps to the device through `ctm`.
    pub fn new(
        store: &'a mut ObjectStore,
        fonts: &'a FontRegistry,
        device: &'a mut dyn Device,
        resources: Dictionary,
        ctm: Matrix,
    ) -> Self {
        Self {
            store,
            fonts,
            device,
            states: GraphicsStateStack::new(GraphicsState::new(ctm)),
            resources,
            base_ctm: ctm,
            path: Path::new(),
            pending_clip: None,
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            font_cache: HashMap::new(),
            xobjects: Vec::new(),
            handles: HashMap::new(),
            form_stack: Vec::new(),
        }
    }

    /// Current graphics state.
    pub fn state(&self) -> &GraphicsState {
        self.states.current()
    }

    /// Current text matrix.
    pub fn text_matrix(&self) -> Matrix {
        self.text_matrix
    }

    /// Parse and execute a content stream, then unwind any unbalanced `q`.
    pub fn run(&mut self, data: &[u8]) -> Result<()> {
        let operators = parse_content_stream(data)?;
        let result = self.execute(&operators);
        self.unwind_to(1);
        for _ in 0..self.states.current().clip_depth {
            self.device.pop_clip();
        }
        self.states.current_mut().clip_depth = 0;
        result
    }

    /// Execute operators in order.
    pub fn execute(&mut self, operators: &[Operator]) -> Result<()> {
        for op in operators {
            match self.apply(op) {
                Ok(()) => {},
                Err(e @ Error::RecursionLimitExceeded(_)) => return Err(e),
                Err(e) => log::warn!("Skipping operator {:?}: {}", op, e),
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: &Operator) -> Result<()> {
        match op {
            // Graphics state
            Operator::SaveState => self.states.save(),
            Operator::RestoreState => self.restore_state(),
            Operator::Cm { a, b, c, d, e, f } => {
                let gs = self.states.current_mut();
                gs.ctm = Matrix::new(*a, *b, *c, *d, *e, *f).multiply(&gs.ctm);
            },
            Operator::SetLineWidth { width } => self.states.current_mut().set_line_width(*width),
            Operator::SetLineCap { cap_style } => self.states.current_mut().set_line_cap(*cap_style),
            Operator::SetLineJoin { join_style } => self.states.current_mut().set_line_join(*join_style),
            Operator::SetMiterLimit { limit } => self.states.current_mut().set_miter_limit(*limit),
            Operator::SetDash { array, phase } => self.states.current_mut().set_dash(array.clone(), *phase),
            Operator::SetExtGState { dict_name } => self.apply_ext_gstate(dict_name)?,

            // Color
            Operator::SetFillGray { gray } => self.set_device_color(true, ColorSpace::Gray, vec![*gray]),
            Operator::SetStrokeGray { gray } => self.set_device_color(false, ColorSpace::Gray, vec![*gray]),
            Operator::SetFillRgb { r, g, b } => self.set_device_color(true, ColorSpace::Rgb, vec![*r, *g, *b]),
            Operator::SetStrokeRgb { r, g, b } => self.set_device_color(false, ColorSpace::Rgb, vec![*r, *g, *b]),
            Operator::SetFillCmyk { c, m, y, k } => {
                self.set_device_color(true, ColorSpace::Cmyk, vec![*c, *m, *y, *k])
            },
            Operator::SetStrokeCmyk { c, m, y, k } => {
                self.set_device_color(false, ColorSpace::Cmyk, vec![*c, *m, *y, *k])
            },
            Operator::SetFillColorSpace { name } => {
                let space = ColorSpace::resolve(&Object::name(name.as_str()), &self.resources, self.store)?;
                self.states.current_mut().set_fill(ColorState::in_space(space));
            },
            Operator::SetStrokeColorSpace { name } => {
                let space = ColorSpace::resolve(&Object::name(name.as_str()), &self.resources, self.store)?;
                self.states.current_mut().set_stroke(ColorState::in_space(space));
            },
            Operator::SetFillColor { components, pattern } => match pattern {
                Some(name) => self.set_fill_pattern(name, components)?,
                None => self.states.current_mut().set_fill_components(components.clone()),
            },
            Operator::SetStrokeColor { components, pattern } => {
                if pattern.is_some() {
                    log::debug!("Stroking with patterns is not supported; keeping the stroke color");
                } else {
                    self.states.current_mut().set_stroke_components(components.clone());
                }
            },

            // Text objects and state
            Operator::BeginText => {
                self.text_matrix = Matrix::identity();
                self.line_matrix = Matrix::identity();
            },
            Operator::EndText => {},
            Operator::Tc { char_space } => self.states.current_mut().text.char_space = *char_space,
            Operator::Tw { word_space } => self.states.current_mut().text.word_space = *word_space,
            Operator::Tz { scale } => self.states.current_mut().text.horizontal_scaling = *scale,
            Operator::TL { leading } => self.states.current_mut().text.leading = *leading,
            Operator::Tr { render } => self.states.current_mut().text.render_mode = *render,
            Operator::Ts { rise } => self.states.current_mut().text.rise = *rise,
            Operator::Tf { font, size } => {
                self.states.current_mut().text.font_size = *size;
                let loaded = self.load_font(font);
                if loaded.is_none() {
                    log::warn!("Font /{} could not be loaded; text will not advance", font);
                }
                self.states.current_mut().text.font = loaded;
            },

            // Text positioning
            Operator::Td { tx, ty } => self.move_text(*tx, *ty),
            Operator::TD { tx, ty } => {
                self.states.current_mut().text.leading = -*ty;
                self.move_text(*tx, *ty);
            },
            Operator::Tm { a, b, c, d, e, f } => {
                self.line_matrix = Matrix::new(*a, *b, *c, *d, *e, *f);
                self.text_matrix = self.line_matrix;
            },
            Operator::TStar => self.next_line(),

            // Text showing
            Operator::Tj { text } => self.show_text(text),
            Operator::Quote { text } => {
                self.next_line();
                self.show_text(text);
            },
            Operator::DoubleQuote {
                word_space,
                char_space,
                text,
            } => {
                let gs = self.states.current_mut();
                gs.text.word_space = *word_space;
                gs.text.char_space = *char_space;
                self.next_line();
                self.show_text(text);
            },
            Operator::TJ { array } => {
                for element in array {
                    match element {
                        TextElement::String(text) => self.show_text(text),
                        TextElement::Offset(adjust) => {
                            let text = &self.states.current().text;
                            let tx = -adjust / 1000.0 * text.font_size * text.horizontal_scaling / 100.0;
                            self.text_matrix = Matrix::translation(tx, 0.0).multiply(&self.text_matrix);
                        },
                    }
                }
            },

            // Path construction
            Operator::MoveTo { x, y } => self.path.move_to(Point::new(*x, *y)),
            Operator::LineTo { x, y } => self.path.line_to(Point::new(*x, *y)),
            Operator::CurveTo { x1, y1, x2, y2, x3, y3 } => {
                self.path
                    .curve_to(Point::new(*x1, *y1), Point::new(*x2, *y2), Point::new(*x3, *y3))
            },
            Operator::CurveToV { x2, y2, x3, y3 } => self.path.curve_to_v(Point::new(*x2, *y2), Point::new(*x3, *y3)),
            Operator::CurveToY { x1, y1, x3, y3 } => self.path.curve_to_y(Point::new(*x1, *y1), Point::new(*x3, *y3)),
            Operator::ClosePath => self.path.close(),
            Operator::Rectangle { x, y, width, height } => self.path.rect(*x, *y, *width, *height),

            // Path painting
            Operator::Stroke => self.paint(false, None),
            Operator::CloseStroke => {
                self.path.close();
                self.paint(false, None);
            },
            Operator::Fill { rule } => self.paint(false, Some(*rule)),
            Operator::FillStroke { rule } => self.paint(true, Some(*rule)),
            Operator::CloseFillStroke { rule } => {
                self.path.close();
                self.paint(true, Some(*rule));
            },
            Operator::EndPath => self.finish_path(),
            Operator::Clip { rule } => self.pending_clip = Some(*rule),

            // Shading and external objects
            Operator::PaintShading { name } => {
                let obj = self.lookup("Shading", name)?;
                let gradient = Gradient::load(&obj, &self.resources, self.store)?;
                let ctm = self.states.current().ctm;
                self.device.paint_shading(&gradient, &ctm);
            },
            Operator::Do { name } => self.paint_xobject(name)?,
            Operator::InlineImage { dict, data } => self.paint_inline_image(dict, data)?,

            Operator::Other { name, operands } => {
                log::debug!("Ignoring unsupported operator {} ({} operands)", name, operands.len());
            },
            op if op.is_no_op() => {},
            op => log::debug!("Unhandled operator {:?}", op),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Graphics state
    // ------------------------------------------------------------------

    fn restore_state(&mut self) {
        let before = self.states.current().clip_depth;
        if !self.states.restore() {
            log::debug!("Unbalanced Q ignored");
            return;
        }
        let after = self.states.current().clip_depth;
        for _ in after..before {
            self.device.pop_clip();
        }
    }

    fn unwind_to(&mut self, depth: usize) {
        while self.states.depth() > depth {
            self.restore_state();
        }
    }

    fn apply_ext_gstate(&mut self, name: &str) -> Result<()> {
        let obj = self.lookup("ExtGState", name)?;
        let dict = self
            .store
            .resolve_dict(&obj)
            .ok_or_else(|| Error::StructuralInvariantViolation(format!("ExtGState /{} is not a dictionary", name)))?;

        for (key, value) in &dict {
            let value = self.store.resolve(value);
            let gs = self.states.current_mut();
            match key.as_str() {
                "LW" => gs.set_line_width(value.as_number().unwrap_or(1.0)),
                "LC" => gs.set_line_cap(value.as_integer().unwrap_or(0).clamp(0, 2) as u8),
                "LJ" => gs.set_line_join(value.as_integer().unwrap_or(0).clamp(0, 2) as u8),
                "ML" => gs.set_miter_limit(value.as_number().unwrap_or(10.0)),
                "CA" => gs.set_stroke_alpha(value.as_number().unwrap_or(1.0)),
                "ca" => gs.set_fill_alpha(value.as_number().unwrap_or(1.0)),
                "D" => {
                    if let Some([array, phase]) = value.as_array().map(Vec::as_slice) {
                        gs.set_dash(array.as_number_array().unwrap_or_default(), phase.as_number().unwrap_or(0.0));
                    }
                },
                "Font" => {
                    if let Some([font, size]) = value.as_array().map(Vec::as_slice) {
                        gs.text.font_size = size.as_number().unwrap_or(0.0);
                        let font = self.font_from_object(font);
                        self.states.current_mut().text.font = font;
                    }
                },
                _ => {},
            }
        }
        Ok(())
    }

    fn set_device_color(&mut self, fill: bool, space: ColorSpace, components: Vec<f32>) {
        let color = ColorState {
            space,
            components,
            pattern: None,
        };
        let gs = self.states.current_mut();
        if fill {
            gs.set_fill(color);
        } else {
            gs.set_stroke(color);
        }
    }

    fn set_fill_pattern(&mut self, name: &str, components: &[f32]) -> Result<()> {
        let space = self.states.current().fill().space.clone();
        if !matches!(space, ColorSpace::Pattern(_)) {
            log::debug!("Pattern /{} used outside a Pattern color space", name);
            return Ok(());
        }
        let obj = self.lookup("Pattern", name)?;
        let dict = self
            .store
            .resolve_dict(&obj)
            .ok_or_else(|| Error::StructuralInvariantViolation(format!("pattern /{} is not a dictionary", name)))?;
        match dict.get_int("PatternType") {
            Some(2) => {
                let shading = dict
                    .get("Shading")
                    .ok_or_else(|| Error::StructuralInvariantViolation(format!("pattern /{} has no shading", name)))?;
                let gradient = Gradient::load(shading, &self.resources, self.store)?;
                let matrix = dict
                    .get("Matrix")
                    .and_then(Matrix::from_object)
                    .unwrap_or_default()
                    .multiply(&self.base_ctm);
                self.states.current_mut().set_fill(ColorState {
                    space,
                    components: components.to_vec(),
                    pattern: Some((Arc::new(gradient), matrix)),
                });
            },
            other => {
                log::info!(
                    "Pattern /{} of type {:?} is not supported; keeping the previous fill",
                    name,
                    other
                );
            },
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------

    fn paint(&mut self, stroke_after_fill: bool, fill: Option<FillRule>) {
        if !self.path.is_empty() {
            let gs = self.states.current_mut();
            let ctm = gs.ctm;
            if let Some(rule) = fill {
                let brush = gs.brush().clone();
                self.device.fill_path(&self.path, &ctm, &brush, rule);
            }
            if fill.is_none() || stroke_after_fill {
                let pen = self.states.current_mut().pen().clone();
                self.device.stroke_path(&self.path, &ctm, &pen);
            }
        }
        self.finish_path();
    }

    /// Apply a pending clip, then start a fresh path.
    fn finish_path(&mut self) {
        if let Some(rule) = self.pending_clip.take() {
            let gs = self.states.current_mut();
            self.device.push_clip(&self.path, &gs.ctm, rule);
            gs.clip_depth += 1;
        }
        self.path = Path::new();
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    fn move_text(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.states.current().text.leading;
        self.move_text(0.0, -leading);
    }

    fn show_text(&mut self, bytes: &[u8]) {
        let gs = self.states.current_mut();
        let Some(font) = gs.text.font.clone() else {
            log::debug!("Text shown with no font selected");
            return;
        };
        let text = gs.text.clone();
        let ctm = gs.ctm;
        let brush = gs.brush().clone();
        let th = text.horizontal_scaling / 100.0;
        // 3 is invisible, 7 adds to the clip only
        let visible = !matches!(text.render_mode, 3 | 7);

        for (code, len) in font.codes(bytes) {
            let w0 = font.width(code) / 1000.0;
            if visible {
                let trm = Matrix::new(text.font_size * th, 0.0, 0.0, text.font_size, 0.0, text.rise)
                    .multiply(&self.text_matrix)
                    .multiply(&ctm);
                let glyph = Glyph {
                    font: font.base_font.clone(),
                    code,
                    advance: w0,
                };
                self.device.draw_glyph(&glyph, &trm, &brush);
            }
            let word = if font.is_word_space(code, len) { text.word_space } else { 0.0 };
            let tx = (w0 * text.font_size + text.char_space + word) * th;
            self.text_matrix = Matrix::translation(tx, 0.0).multiply(&self.text_matrix);
        }
    }

    fn load_font(&mut self, name: &str) -> Option<Arc<Font>> {
        let obj = resources::lookup(self.store, &self.resources, "Font", name)?;
        self.font_from_object(&obj)
    }

    fn font_from_object(&mut self, obj: &Object) -> Option<Arc<Font>> {
        let reference = obj.as_reference();
        if let Some(font) = reference.and_then(|r| self.font_cache.get(&r)) {
            return Some(Arc::clone(font));
        }
        match Font::load(obj, self.store, self.fonts) {
            Ok(font) => {
                let font = Arc::new(font);
                if let Some(r) = reference {
                    self.font_cache.insert(r, Arc::clone(&font));
                }
                Some(font)
            },
            Err(e) => {
                log::warn!("Failed to load font: {}", e);
                None
            },
        }
    }

    // ------------------------------------------------------------------
    // Images and forms
    // ------------------------------------------------------------------

    fn lookup(&mut self, category: &str, name: &str) -> Result<Object> {
        resources::lookup(self.store, &self.resources, category, name)
            .ok_or_else(|| Error::StructuralInvariantViolation(format!("no /{} resource named /{}", category, name)))
    }

    fn paint_xobject(&mut self, name: &str) -> Result<()> {
        let obj = self.lookup("XObject", name)?;
        let reference = obj.as_reference().unwrap_or(ObjectRef::NONE);

        let handle = match self.handles.get(&reference) {
            Some(handle) => handle.clone(),
            None => self.load_xobject(&obj, reference)?,
        };
        match handle {
            Object::Image(h) => {
                if let Some(XObject::Image(image)) = self.xobjects.get(h.slot as usize) {
                    let ctm = self.states.current().ctm;
                    self.device.draw_image(image, &ctm);
                }
                Ok(())
            },
            Object::Form(h) => self.run_form(h),
            // Stencil masks depend on the fill color and are drawn on load
            _ => Ok(()),
        }
    }

    /// Decode an XObject and return its handle. Stencil masks are drawn
    /// directly and yield `Null`.
    fn load_xobject(&mut self, obj: &Object, reference: ObjectRef) -> Result<Object> {
        let resolved = self.store.resolve(obj);
        let stream = resolved.as_stream().ok_or_else(|| Error::InvalidObjectType {
            expected: "Stream".into(),
            found: resolved.type_name().into(),
        })?;
        let dict = &stream.dict;

        let xobject = match dict.get_name("Subtype") {
            Some("Image") => {
                let mask = dict.get_bool("ImageMask").unwrap_or(false);
                let space = match dict.get("ColorSpace") {
                    Some(cs) if !mask => Some(ColorSpace::resolve(cs, &self.resources, self.store)?),
                    _ => None,
                };
                let decoded = self.store.decode_stream(stream, reference)?;
                let fill = self.states.current().fill().rgb();
                let image = decode_image(dict, &decoded, space.as_ref(), fill)?;
                if mask {
                    let ctm = self.states.current().ctm;
                    self.device.draw_image(&image, &ctm);
                    return Ok(Object::Null);
                }
                XObject::Image(Arc::new(image))
            },
            Some("Form") => {
                let decoded = self.store.decode_stream(stream, reference)?;
                let resources = dict.get("Resources").and_then(|r| self.store.resolve_dict(r));
                XObject::Form {
                    operators: Arc::new(parse_content_stream(&decoded.data)?),
                    matrix: dict.get("Matrix").and_then(Matrix::from_object).unwrap_or_default(),
                    bbox: dict.get("BBox").and_then(Rect::from_object),
                    resources,
                }
            },
            other => return Err(Error::NotImplemented(format!("XObject subtype {:?}", other))),
        };

        let handle = XObjectHandle {
            slot: self.xobjects.len() as u32,
            source: reference,
        };
        let handle = match xobject {
            XObject::Image(_) => Object::Image(handle),
            XObject::Form { .. } => Object::Form(handle),
        };
        self.xobjects.push(xobject);
        if !reference.is_none() {
            self.handles.insert(reference, handle.clone());
        }
        Ok(handle)
    }

    fn run_form(&mut self, handle: XObjectHandle) -> Result<()> {
        if !handle.source.is_none() && self.form_stack.contains(&handle.source) {
            log::warn!("Refusing to draw form {} inside itself", handle.source);
            return Ok(());
        }
        let limit = self.store.options().max_recursion_depth;
        if self.form_stack.len() >= limit as usize {
            return Err(Error::RecursionLimitExceeded(limit));
        }
        let Some(XObject::Form {
            operators,
            matrix,
            bbox,
            resources,
        }) = self.xobjects.get(handle.slot as usize)
        else {
            return Ok(());
        };
        let (operators, matrix, bbox) = (Arc::clone(operators), *matrix, *bbox);
        let resources = resources.clone().unwrap_or_else(|| self.resources.clone());

        let depth = self.states.depth();
        self.states.save();
        {
            let gs = self.states.current_mut();
            gs.ctm = matrix.multiply(&gs.ctm);
        }
        if let Some(bbox) = bbox {
            let mut clip = Path::new();
            clip.rect(bbox.x0, bbox.y0, bbox.width(), bbox.height());
            let gs = self.states.current_mut();
            self.device.push_clip(&clip, &gs.ctm, FillRule::NonZero);
            gs.clip_depth += 1;
        }

        let saved_resources = std::mem::replace(&mut self.resources, resources);
        let saved_path = std::mem::take(&mut self.path);
        let saved_text = (self.text_matrix, self.line_matrix);
        self.form_stack.push(handle.source);

        let result = self.execute(&operators);

        self.form_stack.pop();
        (self.text_matrix, self.line_matrix) = saved_text;
        self.path = saved_path;
        self.resources = saved_resources;
        self.unwind_to(depth);
        result
    }

    fn paint_inline_image(&mut self, dict: &Dictionary, data: &[u8]) -> Result<()> {
        let mask = dict.get_bool("ImageMask").unwrap_or(false);
        let space = match dict.get("ColorSpace") {
            Some(cs) if !mask => Some(ColorSpace::resolve(cs, &self.resources, self.store)?),
            _ => None,
        };
        let decoded = decoders::decode_stream(data, dict, &DecodeLimits::from(self.store.options()))?;
        let fill = self.states.current().fill().rgb();
        let image = decode_image(dict, &decoded, space.as_ref(), fill)?;
        let ctm = self.states.current().ctm;
        self.device.draw_image(&image, &ctm);
        Ok(())
    }
}

/// Initial CTM for a page: crop box origin at (0, 0), then `/Rotate`.
pub fn page_transform(page: &Page) -> Matrix {
    let crop = page.crop_box;
    let origin = Matrix::translation(-crop.x0, -crop.y0);
    let (w, h) = (crop.width(), crop.height());
    let rotation = match page.rotate.rem_euclid(360) {
        90 => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, w),
        180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h),
        270 => Matrix::new(0.0, 1.0, -1.0, 0.0, h, 0.0),
        _ => Matrix::identity(),
    };
    origin.multiply(&rotation)
}

/// Concatenated, decoded `/Contents` of a page.
pub fn page_content(store: &mut ObjectStore, page: &Page) -> Result<Vec<u8>> {
    let contents = match page.dict.get("Contents") {
        Some(c) => c.clone(),
        None => return Ok(Vec::new()),
    };
    let parts = match store.resolve(&contents) {
        Object::Array(items) => items,
        _ => vec![contents],
    };

    let mut out = Vec::new();
    for part in parts {
        let owner = part.as_reference().unwrap_or(ObjectRef::NONE);
        let resolved = store.resolve(&part);
        let Some(stream) = resolved.as_stream() else {
            log::warn!("Page content part {} is not a stream", owner);
            continue;
        };
        match store.decode_stream(stream, owner) {
            Ok(decoded) => {
                out.extend_from_slice(&decoded.data);
                // Parts may split tokens only at whitespace
                out.push(b'\n');
            },
            Err(e) => log::warn!("Skipping content stream {}: {}", owner, e),
        }
    }
    Ok(out)
}

/// Render one page onto `device`.
pub fn render_page(store: &mut ObjectStore, fonts: &FontRegistry, page: &Page, device: &mut dyn Device) -> Result<()> {
    let content = page_content(store, page)?;
    let mut interpreter = Interpreter::new(store, fonts, device, page.resources.clone(), page_transform(page));
    interpreter.run(&content)
}
