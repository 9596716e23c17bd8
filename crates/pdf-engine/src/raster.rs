//! Content stream rasterizer for the default engine.
//!
//! Interprets the page's operators into a `tiny_skia` pixmap: paths, clipping,
//! text through [`crate::fonts`], image XObjects and form XObjects. Content it
//! cannot draw faithfully (shadings, patterns, inline images) fails the render
//! with [`PdfEngineError::Unsupported`] instead of leaving a blank page.

use crate::color::ColorSpace;
use crate::fonts::{Glyph, PdfFont};
use crate::images::decode_image;
use crate::objects::{inherited, number, resolve, resolve_dict, resource, stream_bytes, MediaBox};
use crate::{PdfEngineError, RgbaImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::rc::Rc;
use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, LineCap, LineJoin, Mask, Paint, Path, PathBuilder,
    Pixmap, PixmapPaint, Point, Stroke, StrokeDash, Transform,
};

const MAX_FORM_DEPTH: usize = 16;
/// Glyphs larger than this many pixels are skipped rather than rasterized.
const MAX_GLYPH_PX: f32 = 2048.0;

/// Renders one page at `width` x `height` pixels.
pub(crate) fn render_page(
    doc: &Document,
    page_id: ObjectId,
    page_index: u32,
    media: MediaBox,
    width: u32,
    height: u32,
) -> Result<RgbaImage, PdfEngineError> {
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        PdfEngineError::Backend(format!("cannot allocate {width}x{height} canvas"))
    })?;
    pixmap.fill(Color::WHITE);

    let sx = width as f32 / media.width;
    let sy = height as f32 / media.height;
    let base = Transform::from_row(
        sx,
        0.0,
        0.0,
        -sy,
        -media.left * sx,
        (media.bottom + media.height) * sy,
    );

    let has_content = doc
        .get_dictionary(page_id)
        .is_ok_and(|page| page.has(b"Contents"));
    let content = if has_content { doc.get_page_content(page_id)? } else { Vec::new() };
    let resources = inherited(doc, page_id, b"Resources").and_then(|r| r.as_dict().ok());

    let mut canvas = Canvas { doc, page_index, pixmap, fonts: HashMap::new() };
    canvas.run(&content, resources, GraphicsState::new(base), 0)?;

    let data = canvas.pixmap.take();
    RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| PdfEngineError::Backend("canvas size mismatch".to_owned()))
}

#[derive(Clone)]
struct GraphicsState {
    ctm: Transform,
    fill_space: ColorSpace,
    stroke_space: ColorSpace,
    fill: Option<[f32; 3]>,
    stroke: Option<[f32; 3]>,
    fill_alpha: f32,
    stroke_alpha: f32,
    line_width: f32,
    line_cap: LineCap,
    line_join: LineJoin,
    miter_limit: f32,
    dash: Option<StrokeDash>,
    clip: Option<Rc<Mask>>,
    font: Option<Rc<PdfFont>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    leading: f32,
    rise: f32,
    render_mode: i64,
}

impl GraphicsState {
    fn new(ctm: Transform) -> Self {
        Self {
            ctm,
            fill_space: ColorSpace::Gray,
            stroke_space: ColorSpace::Gray,
            fill: Some([0.0; 3]),
            stroke: Some([0.0; 3]),
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: None,
            clip: None,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }

    fn stroke_style(&self) -> Stroke {
        Stroke {
            width: self.line_width,
            miter_limit: self.miter_limit,
            line_cap: self.line_cap,
            line_join: self.line_join,
            dash: self.dash.clone(),
        }
    }

    fn intersect_clip(&mut self, path: &Path, rule: FillRule, width: u32, height: u32) {
        match self.clip.as_mut() {
            Some(mask) => Rc::make_mut(mask).intersect_path(path, rule, true, self.ctm),
            None => {
                if let Some(mut mask) = Mask::new(width, height) {
                    mask.fill_path(path, rule, true, self.ctm);
                    self.clip = Some(Rc::new(mask));
                }
            }
        }
    }
}

/// Path under construction plus a pending `W`/`W*`.
struct PathState {
    builder: PathBuilder,
    start: Option<(f32, f32)>,
    current: Option<(f32, f32)>,
    clip: Option<FillRule>,
}

impl PathState {
    fn new() -> Self {
        Self { builder: PathBuilder::new(), start: None, current: None, clip: None }
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x, y);
        self.start = Some((x, y));
        self.current = Some((x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        if self.current.is_none() {
            self.move_to(x, y);
            return;
        }
        self.builder.line_to(x, y);
        self.current = Some((x, y));
    }

    fn curve_to(&mut self, c1: (f32, f32), c2: (f32, f32), end: (f32, f32)) {
        if self.current.is_none() {
            self.move_to(c1.0, c1.1);
        }
        self.builder.cubic_to(c1.0, c1.1, c2.0, c2.1, end.0, end.1);
        self.current = Some(end);
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(x, y);
        self.builder.line_to(x + w, y);
        self.builder.line_to(x + w, y + h);
        self.builder.line_to(x, y + h);
        self.builder.close();
        self.current = Some((x, y));
    }

    fn close(&mut self) {
        if self.current.is_some() {
            self.builder.close();
            self.current = self.start;
        }
    }

    fn finish(&mut self) -> Option<Path> {
        let builder = std::mem::replace(&mut self.builder, PathBuilder::new());
        self.start = None;
        self.current = None;
        builder.finish()
    }
}

#[derive(Clone, Copy)]
struct TextMatrices {
    matrix: Transform,
    line: Transform,
}

impl TextMatrices {
    fn identity() -> Self {
        Self { matrix: Transform::identity(), line: Transform::identity() }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line = self.line.pre_concat(Transform::from_translate(tx, ty));
        self.matrix = self.line;
    }
}

struct Canvas<'a> {
    doc: &'a Document,
    page_index: u32,
    pixmap: Pixmap,
    fonts: HashMap<ObjectId, Rc<PdfFont>>,
}

impl<'a> Canvas<'a> {
    fn unsupported(&self, reason: impl Into<String>) -> PdfEngineError {
        PdfEngineError::Unsupported { page: self.page_index, reason: reason.into() }
    }

    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) -> Result<(), PdfEngineError> {
        let operations = Content::decode(content)?.operations;

        let mut gs = initial;
        let mut saved: Vec<GraphicsState> = Vec::new();
        let mut path = PathState::new();
        let mut text = TextMatrices::identity();

        for operation in &operations {
            let operands = operation.operands.as_slice();
            let n = |index: usize| operands.get(index).and_then(number).unwrap_or(0.0);
            let name = |index: usize| operands.get(index).and_then(|o| o.as_name().ok());

            match operation.operator.as_str() {
                "q" => saved.push(gs.clone()),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        gs = previous;
                    }
                }
                "cm" => {
                    if let Some(matrix) = matrix(operands) {
                        gs.ctm = gs.ctm.pre_concat(matrix);
                    }
                }
                "w" => gs.line_width = n(0).abs(),
                "J" => gs.line_cap = line_cap(n(0)),
                "j" => gs.line_join = line_join(n(0)),
                "M" => gs.miter_limit = n(0).max(1.0),
                "d" => gs.dash = dash(operands.first(), n(1)),
                "gs" => {
                    if let Some(name) = name(0) {
                        self.apply_ext_state(resources, name, &mut gs);
                    }
                }

                "g" => set_color(&mut gs.fill_space, &mut gs.fill, ColorSpace::Gray, operands),
                "G" => set_color(&mut gs.stroke_space, &mut gs.stroke, ColorSpace::Gray, operands),
                "rg" => set_color(&mut gs.fill_space, &mut gs.fill, ColorSpace::Rgb, operands),
                "RG" => set_color(&mut gs.stroke_space, &mut gs.stroke, ColorSpace::Rgb, operands),
                "k" => set_color(&mut gs.fill_space, &mut gs.fill, ColorSpace::Cmyk, operands),
                "K" => set_color(&mut gs.stroke_space, &mut gs.stroke, ColorSpace::Cmyk, operands),
                "cs" | "CS" => {
                    let space = match operands.first() {
                        Some(operand) => ColorSpace::resolve(self.doc, resources, operand),
                        None => ColorSpace::Gray,
                    };
                    let color = space.initial_color();
                    if operation.operator == "cs" {
                        (gs.fill_space, gs.fill) = (space, color);
                    } else {
                        (gs.stroke_space, gs.stroke) = (space, color);
                    }
                }
                "sc" | "scn" => gs.fill = component_color(&gs.fill_space, operands),
                "SC" | "SCN" => gs.stroke = component_color(&gs.stroke_space, operands),

                "m" => path.move_to(n(0), n(1)),
                "l" => path.line_to(n(0), n(1)),
                "c" => path.curve_to((n(0), n(1)), (n(2), n(3)), (n(4), n(5))),
                "v" => {
                    let current = path.current.unwrap_or((n(0), n(1)));
                    path.curve_to(current, (n(0), n(1)), (n(2), n(3)));
                }
                "y" => path.curve_to((n(0), n(1)), (n(2), n(3)), (n(2), n(3))),
                "re" => path.rect(n(0), n(1), n(2), n(3)),
                "h" => path.close(),
                "W" => path.clip = Some(FillRule::Winding),
                "W*" => path.clip = Some(FillRule::EvenOdd),

                "S" => self.paint(&mut gs, &mut path, None, true, false)?,
                "s" => self.paint(&mut gs, &mut path, None, true, true)?,
                "f" | "F" => self.paint(&mut gs, &mut path, Some(FillRule::Winding), false, false)?,
                "f*" => self.paint(&mut gs, &mut path, Some(FillRule::EvenOdd), false, false)?,
                "B" => self.paint(&mut gs, &mut path, Some(FillRule::Winding), true, false)?,
                "B*" => self.paint(&mut gs, &mut path, Some(FillRule::EvenOdd), true, false)?,
                "b" => self.paint(&mut gs, &mut path, Some(FillRule::Winding), true, true)?,
                "b*" => self.paint(&mut gs, &mut path, Some(FillRule::EvenOdd), true, true)?,
                "n" => self.paint(&mut gs, &mut path, None, false, false)?,

                "BT" => text = TextMatrices::identity(),
                "ET" => {}
                "Tf" => {
                    gs.font = name(0).and_then(|name| self.font(resources, name));
                    gs.font_size = n(1);
                }
                "Tc" => gs.char_spacing = n(0),
                "Tw" => gs.word_spacing = n(0),
                "Tz" => gs.h_scale = n(0) / 100.0,
                "TL" => gs.leading = n(0),
                "Ts" => gs.rise = n(0),
                "Tr" => gs.render_mode = n(0) as i64,
                "Td" => text.next_line(n(0), n(1)),
                "TD" => {
                    gs.leading = -n(1);
                    text.next_line(n(0), n(1));
                }
                "Tm" => {
                    if let Some(matrix) = matrix(operands) {
                        text = TextMatrices { matrix, line: matrix };
                    }
                }
                "T*" => text.next_line(0.0, -gs.leading),
                "Tj" => {
                    if let Some(bytes) = string_bytes(operands.first()) {
                        self.show_text(&gs, &mut text, bytes)?;
                    }
                }
                "'" => {
                    text.next_line(0.0, -gs.leading);
                    if let Some(bytes) = string_bytes(operands.first()) {
                        self.show_text(&gs, &mut text, bytes)?;
                    }
                }
                "\"" => {
                    gs.word_spacing = n(0);
                    gs.char_spacing = n(1);
                    text.next_line(0.0, -gs.leading);
                    if let Some(bytes) = string_bytes(operands.get(2)) {
                        self.show_text(&gs, &mut text, bytes)?;
                    }
                }
                "TJ" => {
                    let items = operands.first().and_then(|o| o.as_array().ok());
                    for item in items.into_iter().flatten() {
                        match item {
                            Object::String(bytes, _) => self.show_text(&gs, &mut text, bytes)?,
                            other => {
                                let adjust = number(other).unwrap_or(0.0);
                                let tx = -adjust / 1000.0 * gs.font_size * gs.h_scale;
                                let shift = Transform::from_translate(tx, 0.0);
                                text.matrix = text.matrix.pre_concat(shift);
                            }
                        }
                    }
                }

                "Do" => {
                    if let Some(name) = name(0) {
                        self.draw_xobject(&gs, resources, name, depth)?;
                    }
                }
                "sh" => return Err(self.unsupported("shading fill")),
                "BI" | "ID" | "EI" => return Err(self.unsupported("inline image")),

                "BMC" | "BDC" | "EMC" | "MP" | "DP" | "BX" | "EX" | "ri" | "i" | "d0" | "d1" => {}
                other => tracing::debug!(operator = other, "ignoring content operator"),
            }
        }

        Ok(())
    }

    fn paint(
        &mut self,
        gs: &mut GraphicsState,
        path: &mut PathState,
        fill: Option<FillRule>,
        stroke: bool,
        close: bool,
    ) -> Result<(), PdfEngineError> {
        if close {
            path.close();
        }
        let clip = path.clip.take();
        let Some(shape) = path.finish() else {
            return Ok(());
        };

        if let Some(rule) = fill {
            let color = gs.fill.ok_or_else(|| self.unsupported("pattern or unknown fill color"))?;
            let paint = solid(color, gs.fill_alpha);
            self.pixmap.fill_path(&shape, &paint, rule, gs.ctm, gs.clip.as_deref());
        }
        if stroke {
            let color =
                gs.stroke.ok_or_else(|| self.unsupported("pattern or unknown stroke color"))?;
            let paint = solid(color, gs.stroke_alpha);
            self.pixmap.stroke_path(&shape, &paint, &gs.stroke_style(), gs.ctm, gs.clip.as_deref());
        }
        if let Some(rule) = clip {
            gs.intersect_clip(&shape, rule, self.pixmap.width(), self.pixmap.height());
        }
        Ok(())
    }

    fn apply_ext_state(
        &self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        gs: &mut GraphicsState,
    ) {
        let state =
            resource(self.doc, resources, b"ExtGState", name).and_then(|o| o.as_dict().ok());
        let Some(state) = state else {
            tracing::debug!(name = %String::from_utf8_lossy(name), "missing ExtGState");
            return;
        };

        for (key, value) in state.iter() {
            let Some(value) = resolve(self.doc, value) else { continue };
            match key.as_slice() {
                b"LW" => gs.line_width = number(value).unwrap_or(gs.line_width).abs(),
                b"LC" => gs.line_cap = line_cap(number(value).unwrap_or(0.0)),
                b"LJ" => gs.line_join = line_join(number(value).unwrap_or(0.0)),
                b"ML" => gs.miter_limit = number(value).unwrap_or(gs.miter_limit).max(1.0),
                b"CA" => gs.stroke_alpha = number(value).unwrap_or(1.0).clamp(0.0, 1.0),
                b"ca" => gs.fill_alpha = number(value).unwrap_or(1.0).clamp(0.0, 1.0),
                b"D" => {
                    let parts = value.as_array().ok();
                    let phase = parts.and_then(|p| p.get(1)).and_then(number).unwrap_or(0.0);
                    gs.dash = dash(parts.and_then(|p| p.first()), phase);
                }
                b"Font" => {
                    let parts = value.as_array().ok();
                    if let Some(Object::Reference(id)) = parts.and_then(|p| p.first()) {
                        gs.font = self
                            .doc
                            .get_dictionary(*id)
                            .ok()
                            .map(|dict| Rc::new(PdfFont::load(self.doc, dict)));
                    }
                    let size = parts.and_then(|p| p.get(1)).and_then(number);
                    gs.font_size = size.unwrap_or(gs.font_size);
                }
                other => {
                    let key = String::from_utf8_lossy(other);
                    tracing::debug!(%key, "ignoring ExtGState entry");
                }
            }
        }
    }

    fn font(&mut self, resources: Option<&'a Dictionary>, name: &[u8]) -> Option<Rc<PdfFont>> {
        let fonts = resolve_dict(self.doc, resources?.get(b"Font").ok()?)?;
        let entry = fonts.get(name).ok()?;

        if let Object::Reference(id) = entry {
            if let Some(font) = self.fonts.get(id) {
                return Some(Rc::clone(font));
            }
        }
        let font = Rc::new(PdfFont::load(self.doc, resolve_dict(self.doc, entry)?));
        tracing::trace!(name = %String::from_utf8_lossy(name), ?font, "loaded font");
        if let Object::Reference(id) = entry {
            self.fonts.insert(*id, Rc::clone(&font));
        }
        Some(font)
    }

    fn show_text(
        &mut self,
        gs: &GraphicsState,
        text: &mut TextMatrices,
        bytes: &[u8],
    ) -> Result<(), PdfEngineError> {
        let Some(font) = gs.font.clone() else {
            tracing::debug!("text shown without a usable font");
            return Ok(());
        };
        let visible = !matches!(gs.render_mode, 3 | 7);
        let (color, alpha) = match gs.render_mode {
            1 | 5 => (gs.stroke, gs.stroke_alpha),
            _ => (gs.fill, gs.fill_alpha),
        };

        for code in font.codes(bytes) {
            let glyph = font.glyph(code);
            if let (true, Some(glyph)) = (visible, glyph.as_ref()) {
                let color = color.ok_or_else(|| self.unsupported("pattern text color"))?;
                self.draw_glyph(gs, text, glyph, color, alpha);
            }

            let advance = font.advance(code, glyph.as_ref()) / 1000.0 * gs.font_size;
            let spacing = gs.char_spacing + if font.is_space(code) { gs.word_spacing } else { 0.0 };
            let tx = (advance + spacing) * gs.h_scale;
            text.matrix = text.matrix.pre_concat(Transform::from_translate(tx, 0.0));
        }
        Ok(())
    }

    /// Glyphs are drawn upright at the text origin; skew and rotation in the
    /// text matrix only affect where they land.
    fn draw_glyph(
        &mut self,
        gs: &GraphicsState,
        text: &TextMatrices,
        glyph: &Glyph<'_>,
        color: [f32; 3],
        alpha: f32,
    ) {
        let to_device = gs.ctm.pre_concat(text.matrix);
        let mut origin = Point::from_xy(0.0, gs.rise);
        to_device.map_points(std::slice::from_mut(&mut origin));

        let scale = (to_device.kx * to_device.kx + to_device.sy * to_device.sy).sqrt();
        let px = gs.font_size.abs() * scale;
        if !px.is_finite() || !(0.5..=MAX_GLYPH_PX).contains(&px) {
            return;
        }

        let (metrics, coverage) = glyph.face.rasterize_indexed(glyph.index, px);
        if metrics.width == 0 || metrics.height == 0 {
            return;
        }
        let left = origin.x.round() as i64 + i64::from(metrics.xmin);
        let top = origin.y.round() as i64 - (i64::from(metrics.ymin) + metrics.height as i64);
        let rgb = color.map(|c| c.clamp(0.0, 1.0) * 255.0);

        let stride = i64::from(self.pixmap.width());
        let rows = i64::from(self.pixmap.height());
        let clip = gs.clip.as_deref().map(Mask::data);
        let data = self.pixmap.data_mut();

        for (row, line) in coverage.chunks(metrics.width).enumerate() {
            let y = top + row as i64;
            if !(0..rows).contains(&y) {
                continue;
            }
            for (col, value) in line.iter().enumerate() {
                let x = left + col as i64;
                if !(0..stride).contains(&x) || *value == 0 {
                    continue;
                }
                let offset = (y * stride + x) as usize;
                let mut weight = f32::from(*value) / 255.0 * alpha;
                if let Some(clip) = clip {
                    weight *= f32::from(clip[offset]) / 255.0;
                }
                if weight <= 0.0 {
                    continue;
                }
                let pixel = &mut data[offset * 4..offset * 4 + 4];
                for channel in 0..3 {
                    let under = f32::from(pixel[channel]);
                    pixel[channel] = (under + (rgb[channel] - under) * weight).round() as u8;
                }
                pixel[3] = 255;
            }
        }
    }

    fn draw_xobject(
        &mut self,
        gs: &GraphicsState,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        depth: usize,
    ) -> Result<(), PdfEngineError> {
        let stream =
            resource(self.doc, resources, b"XObject", name).and_then(|o| o.as_stream().ok());
        let Some(stream) = stream else {
            tracing::debug!(name = %String::from_utf8_lossy(name), "missing XObject");
            return Ok(());
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => self.draw_image(gs, resources, stream),
            Ok(b"Form") => self.draw_form(gs, resources, stream, depth),
            _ => Ok(()),
        }
    }

    fn draw_image(
        &mut self,
        gs: &GraphicsState,
        resources: Option<&'a Dictionary>,
        stream: &Stream,
    ) -> Result<(), PdfEngineError> {
        let stencil = gs.fill.unwrap_or([0.0; 3]).map(channel_u8);
        let image = decode_image(self.doc, resources, stream, stencil)?
            .ok_or_else(|| self.unsupported("image encoding"))?;

        let (width, height) = image.dimensions();
        let mut data = image.into_raw();
        for pixel in data.chunks_exact_mut(4) {
            let alpha = u16::from(pixel[3]);
            for channel in &mut pixel[..3] {
                *channel = ((u16::from(*channel) * alpha + 127) / 255) as u8;
            }
        }
        let source = IntSize::from_wh(width, height)
            .and_then(|size| Pixmap::from_vec(data, size))
            .ok_or_else(|| PdfEngineError::Backend(format!("bad image size {width}x{height}")))?;

        let (w, h) = (width as f32, height as f32);
        let unit = Transform::from_row(1.0 / w, 0.0, 0.0, -1.0 / h, 0.0, 1.0);
        let paint = PixmapPaint {
            opacity: gs.fill_alpha,
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        let transform = gs.ctm.pre_concat(unit);
        self.pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, transform, gs.clip.as_deref());
        Ok(())
    }

    fn draw_form(
        &mut self,
        gs: &GraphicsState,
        resources: Option<&'a Dictionary>,
        stream: &'a Stream,
        depth: usize,
    ) -> Result<(), PdfEngineError> {
        if depth >= MAX_FORM_DEPTH {
            let reason = format!("form XObjects nested deeper than {MAX_FORM_DEPTH}");
            return Err(self.unsupported(reason));
        }

        let dict = &stream.dict;
        let form_matrix = dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .and_then(|items| matrix(items))
            .unwrap_or_default();
        let form_resources = dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve_dict(self.doc, r))
            .or(resources);

        let mut inner = gs.clone();
        inner.ctm = gs.ctm.pre_concat(form_matrix);
        let bbox = dict.get(b"BBox").and_then(Object::as_array).ok().and_then(|items| {
            let [x0, y0, x1, y1] = items.as_slice() else { return None };
            let (x0, y0, x1, y1) = (number(x0)?, number(y0)?, number(x1)?, number(y1)?);
            let mut rect = PathState::new();
            rect.rect(x0, y0, x1 - x0, y1 - y0);
            rect.finish()
        });
        if let Some(bbox) = bbox {
            let (width, height) = (self.pixmap.width(), self.pixmap.height());
            inner.intersect_clip(&bbox, FillRule::Winding, width, height);
        }

        let content = stream_bytes(stream)?;
        self.run(&content, form_resources, inner, depth + 1)
    }
}

fn channel_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn solid(color: [f32; 3], alpha: f32) -> Paint<'static> {
    let [r, g, b] = color.map(channel_u8);
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, channel_u8(alpha));
    paint.anti_alias = true;
    paint
}

fn set_color(
    space: &mut ColorSpace,
    color: &mut Option<[f32; 3]>,
    device: ColorSpace,
    operands: &[Object],
) {
    *color = component_color(&device, operands);
    *space = device;
}

/// `sc`/`scn` operands; a trailing pattern name leaves no solid color.
fn component_color(space: &ColorSpace, operands: &[Object]) -> Option<[f32; 3]> {
    if operands.iter().any(|operand| operand.as_name().is_ok()) {
        return None;
    }
    let components: Vec<f32> = operands.iter().filter_map(number).collect();
    space.to_rgb(&components)
}

fn matrix(operands: &[Object]) -> Option<Transform> {
    let values: Vec<f32> = operands.iter().map(number).collect::<Option<_>>()?;
    let [a, b, c, d, e, f] = values.as_slice() else { return None };
    Some(Transform::from_row(*a, *b, *c, *d, *e, *f))
}

fn string_bytes(operand: Option<&Object>) -> Option<&[u8]> {
    match operand? {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

fn line_cap(value: f32) -> LineCap {
    match value as i64 {
        1 => LineCap::Round,
        2 => LineCap::Square,
        _ => LineCap::Butt,
    }
}

fn line_join(value: f32) -> LineJoin {
    match value as i64 {
        1 => LineJoin::Round,
        2 => LineJoin::Bevel,
        _ => LineJoin::Miter,
    }
}

/// An empty dash array means solid; odd-length arrays repeat once.
fn dash(array: Option<&Object>, phase: f32) -> Option<StrokeDash> {
    let mut intervals: Vec<f32> = array?.as_array().ok()?.iter().filter_map(number).collect();
    if intervals.is_empty() {
        return None;
    }
    if intervals.len() % 2 == 1 {
        intervals.extend_from_within(..);
    }
    StrokeDash::new(intervals, phase)
}
