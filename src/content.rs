//! The content-stream builder.
//!
//! A [`ContentBuilder`] accumulates page-description operators for one page,
//! form XObject, or tiling pattern. Methods beginning with `cmd_` map
//! directly to the PDF operator of the same name. Every method that touches
//! an external resource records its object number in a per-kind used set;
//! finishing the builder turns those sets into the resource dictionary and
//! wraps the operator text in a compressed stream object.
//!
//! The builder mutably borrows the document, so exactly one builder can be
//! active at a time. Dropping an unfinished builder finalizes it implicitly;
//! an error on that path is logged, never raised.

// Operator methods are named after the PDF operators they emit, case and all.
#![allow(non_snake_case)]

use std::collections::BTreeSet;
use std::fmt::Write;

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::color::{GrayColor, RgbColor};
use crate::document::PdfDocument;
use crate::error::{PdfError, Result};
use crate::font::BuiltinFont;
use crate::gstate::{LineCap, LineJoin, RenderingIntent};
use crate::outline::{escape_literal_string, Annotation};
use crate::types::{
    FontId, FormXObjectId, GstateId, IccId, ImageId, LabId, PageId, PatternId, PdfRect,
    SeparationId, ShadingId,
};

/// Text rendering modes for the `Tr` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRenderMode {
    Fill = 0,
    Stroke = 1,
    FillStroke = 2,
    Invisible = 3,
    FillClip = 4,
    StrokeClip = 5,
    FillStrokeClip = 6,
    Clip = 7,
}

/// A caller-positioned glyph, typically produced by an external shaper.
#[derive(Debug, Clone, Copy)]
pub struct PositionedGlyph {
    pub codepoint: char,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BuilderKind {
    Page,
    FormXObject { bbox: PdfRect },
    TilingPattern { w: f64, h: f64 },
}

pub(crate) enum FinishOutcome {
    Page(PageId),
    Pattern(PatternId),
    Form(FormXObjectId),
}

/// Builds one content stream and its resource dictionary.
pub struct ContentBuilder<'a> {
    doc: &'a mut PdfDocument,
    kind: BuilderKind,
    commands: String,
    used_images: BTreeSet<i32>,
    used_fonts: BTreeSet<i32>,
    used_subset_fonts: BTreeSet<i32>,
    used_colorspaces: BTreeSet<i32>,
    used_gstates: BTreeSet<i32>,
    used_shadings: BTreeSet<i32>,
    used_patterns: BTreeSet<i32>,
    used_xobjects: BTreeSet<i32>,
    uses_all_colorspace: bool,
    annotations: Vec<Annotation>,
    finished: bool,
}

fn check_component(v: f64) -> Result<()> {
    // Rejects NaN as well: the comparison fails.
    if v >= 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(PdfError::ColorOutOfRange)
    }
}

impl<'a> ContentBuilder<'a> {
    pub(crate) fn new(doc: &'a mut PdfDocument, kind: BuilderKind) -> Self {
        ContentBuilder {
            doc,
            kind,
            commands: String::new(),
            used_images: BTreeSet::new(),
            used_fonts: BTreeSet::new(),
            used_subset_fonts: BTreeSet::new(),
            used_colorspaces: BTreeSet::new(),
            used_gstates: BTreeSet::new(),
            used_shadings: BTreeSet::new(),
            used_patterns: BTreeSet::new(),
            used_xobjects: BTreeSet::new(),
            uses_all_colorspace: false,
            annotations: Vec::new(),
            finished: false,
        }
    }

    fn check_active(&self) -> Result<()> {
        if self.finished {
            Err(PdfError::BuilderFinished)
        } else {
            Ok(())
        }
    }

    // ─── Path construction ──────────────────────────────────────

    pub fn cmd_m(&mut self, x: f64, y: f64) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} {} m\n", x, y);
        Ok(())
    }

    pub fn cmd_l(&mut self, x: f64, y: f64) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} {} l\n", x, y);
        Ok(())
    }

    pub fn cmd_c(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} {} {} {} {} {} c\n", x1, y1, x2, y2, x3, y3);
        Ok(())
    }

    pub fn cmd_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} {} {} {} v\n", x2, y2, x3, y3);
        Ok(())
    }

    pub fn cmd_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} {} {} {} y\n", x1, y1, x3, y3);
        Ok(())
    }

    pub fn cmd_re(&mut self, x: f64, y: f64, w: f64, h: f64) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} {} {} {} re\n", x, y, w, h);
        Ok(())
    }

    pub fn cmd_h(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("h\n");
        Ok(())
    }

    // ─── Painting ───────────────────────────────────────────────

    pub fn cmd_f(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("f\n");
        Ok(())
    }

    pub fn cmd_fstar(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("f*\n");
        Ok(())
    }

    pub fn cmd_S(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("S\n");
        Ok(())
    }

    pub fn cmd_s(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("s\n");
        Ok(())
    }

    pub fn cmd_B(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("B\n");
        Ok(())
    }

    pub fn cmd_Bstar(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("B*\n");
        Ok(())
    }

    pub fn cmd_b(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("b\n");
        Ok(())
    }

    pub fn cmd_bstar(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("b*\n");
        Ok(())
    }

    pub fn cmd_n(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("n\n");
        Ok(())
    }

    // ─── Clipping ───────────────────────────────────────────────

    pub fn cmd_W(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("W\n");
        Ok(())
    }

    pub fn cmd_Wstar(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("W*\n");
        Ok(())
    }

    // ─── Graphics state ─────────────────────────────────────────

    pub fn cmd_q(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("q\n");
        Ok(())
    }

    pub fn cmd_Q(&mut self) -> Result<()> {
        self.check_active()?;
        self.commands.push_str("Q\n");
        Ok(())
    }

    pub fn cmd_cm(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Result<()> {
        self.check_active()?;
        let _ = write!(
            self.commands,
            "{:.4} {:.4} {:.4} {:.4} {:.4} {:.4} cm\n",
            a, b, c, d, e, f
        );
        Ok(())
    }

    pub fn cmd_w(&mut self, width: f64) -> Result<()> {
        self.check_active()?;
        if width < 0.0 || width.is_nan() {
            return Err(PdfError::NegativeLineWidth);
        }
        let _ = write!(self.commands, "{} w\n", width);
        Ok(())
    }

    pub fn cmd_M(&mut self, miter_limit: f64) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} M\n", miter_limit);
        Ok(())
    }

    pub fn cmd_J(&mut self, cap: LineCap) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} J\n", cap as i32);
        Ok(())
    }

    pub fn cmd_j(&mut self, join: LineJoin) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} j\n", join as i32);
        Ok(())
    }

    pub fn cmd_d(&mut self, dash_array: &[f64], phase: f64) -> Result<()> {
        self.check_active()?;
        if dash_array.is_empty() {
            return Err(PdfError::ZeroLengthArray);
        }
        if dash_array.iter().any(|v| *v < 0.0 || v.is_nan()) {
            return Err(PdfError::NegativeDash);
        }
        self.commands.push_str("[ ");
        for v in dash_array {
            let _ = write!(self.commands, "{} ", v);
        }
        let _ = write!(self.commands, "] {} d\n", phase);
        Ok(())
    }

    pub fn cmd_i(&mut self, flatness: f64) -> Result<()> {
        self.check_active()?;
        if !(0.0..=100.0).contains(&flatness) {
            return Err(PdfError::InvalidFlatness);
        }
        let _ = write!(self.commands, "{} i\n", flatness);
        Ok(())
    }

    pub fn cmd_ri(&mut self, intent: RenderingIntent) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "/{} ri\n", intent.pdf_name());
        Ok(())
    }

    pub fn cmd_gs(&mut self, gs: GstateId) -> Result<()> {
        self.check_active()?;
        let obj = self.doc.gstate_object(gs)?;
        self.used_gstates.insert(obj);
        let _ = write!(self.commands, "/GS{} gs\n", obj);
        Ok(())
    }

    // ─── Color operators ────────────────────────────────────────

    pub fn cmd_G(&mut self, gray: f64) -> Result<()> {
        self.check_active()?;
        check_component(gray)?;
        let _ = write!(self.commands, "{} G\n", gray);
        Ok(())
    }

    pub fn cmd_g(&mut self, gray: f64) -> Result<()> {
        self.check_active()?;
        check_component(gray)?;
        let _ = write!(self.commands, "{} g\n", gray);
        Ok(())
    }

    pub fn cmd_RG(&mut self, r: f64, g: f64, b: f64) -> Result<()> {
        self.check_active()?;
        check_component(r)?;
        check_component(g)?;
        check_component(b)?;
        let _ = write!(self.commands, "{} {} {} RG\n", r, g, b);
        Ok(())
    }

    pub fn cmd_rg(&mut self, r: f64, g: f64, b: f64) -> Result<()> {
        self.check_active()?;
        check_component(r)?;
        check_component(g)?;
        check_component(b)?;
        let _ = write!(self.commands, "{} {} {} rg\n", r, g, b);
        Ok(())
    }

    pub fn cmd_K(&mut self, c: f64, m: f64, y: f64, k: f64) -> Result<()> {
        self.check_active()?;
        for v in [c, m, y, k] {
            check_component(v)?;
        }
        let _ = write!(self.commands, "{} {} {} {} K\n", c, m, y, k);
        Ok(())
    }

    pub fn cmd_k(&mut self, c: f64, m: f64, y: f64, k: f64) -> Result<()> {
        self.check_active()?;
        for v in [c, m, y, k] {
            check_component(v)?;
        }
        let _ = write!(self.commands, "{} {} {} {} k\n", c, m, y, k);
        Ok(())
    }

    pub fn cmd_CS(&mut self, name: &str) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} CS\n", name);
        Ok(())
    }

    pub fn cmd_cs(&mut self, name: &str) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} cs\n", name);
        Ok(())
    }

    pub fn cmd_SCN(&mut self, values: &[f64]) -> Result<()> {
        self.check_active()?;
        for v in values {
            let _ = write!(self.commands, "{} ", v);
        }
        self.commands.push_str("SCN\n");
        Ok(())
    }

    pub fn cmd_scn(&mut self, values: &[f64]) -> Result<()> {
        self.check_active()?;
        for v in values {
            let _ = write!(self.commands, "{} ", v);
        }
        self.commands.push_str("scn\n");
        Ok(())
    }

    // ─── Device color selection with output conversion ──────────

    /// Stroke color; converted to the document's output colorspace.
    pub fn set_stroke_color(&mut self, c: RgbColor) -> Result<()> {
        self.check_active()?;
        let cm = self.doc.converter();
        match cm.output_colorspace() {
            crate::color::DeviceColorspace::Rgb => {
                self.cmd_RG(c.r.get(), c.g.get(), c.b.get())
            }
            crate::color::DeviceColorspace::Gray => {
                let gray = cm.to_gray(c);
                self.cmd_G(gray.v.get())
            }
            crate::color::DeviceColorspace::Cmyk => {
                let cmyk = cm.to_cmyk(c);
                self.cmd_K(cmyk.c.get(), cmyk.m.get(), cmyk.y.get(), cmyk.k.get())
            }
        }
    }

    /// Fill color; converted to the document's output colorspace.
    pub fn set_nonstroke_color(&mut self, c: RgbColor) -> Result<()> {
        self.check_active()?;
        let cm = self.doc.converter();
        match cm.output_colorspace() {
            crate::color::DeviceColorspace::Rgb => {
                self.cmd_rg(c.r.get(), c.g.get(), c.b.get())
            }
            crate::color::DeviceColorspace::Gray => {
                let gray = cm.to_gray(c);
                self.cmd_g(gray.v.get())
            }
            crate::color::DeviceColorspace::Cmyk => {
                let cmyk = cm.to_cmyk(c);
                self.cmd_k(cmyk.c.get(), cmyk.m.get(), cmyk.y.get(), cmyk.k.get())
            }
        }
    }

    /// Gray is valid in every output colorspace, no conversion needed.
    pub fn set_nonstroke_gray(&mut self, c: GrayColor) -> Result<()> {
        self.cmd_g(c.v.get())
    }

    pub fn set_stroke_gray(&mut self, c: GrayColor) -> Result<()> {
        self.cmd_G(c.v.get())
    }

    pub fn set_separation_stroke_color(&mut self, id: SeparationId, value: f64) -> Result<()> {
        self.check_active()?;
        let obj = self.doc.separation_object(id)?;
        self.used_colorspaces.insert(obj);
        let clamped = crate::color::UnitValue::new(value).get();
        let _ = write!(self.commands, "/CSpace{} CS\n", obj);
        self.cmd_SCN(&[clamped])
    }

    pub fn set_separation_nonstroke_color(&mut self, id: SeparationId, value: f64) -> Result<()> {
        self.check_active()?;
        let obj = self.doc.separation_object(id)?;
        self.used_colorspaces.insert(obj);
        let clamped = crate::color::UnitValue::new(value).get();
        let _ = write!(self.commands, "/CSpace{} cs\n", obj);
        self.cmd_scn(&[clamped])
    }

    pub fn set_lab_stroke_color(&mut self, id: LabId, l: f64, a: f64, b: f64) -> Result<()> {
        self.check_active()?;
        let obj = self.doc.lab_object(id)?;
        self.used_colorspaces.insert(obj);
        let _ = write!(self.commands, "/CSpace{} CS\n", obj);
        self.cmd_SCN(&[l, a, b])
    }

    pub fn set_lab_nonstroke_color(&mut self, id: LabId, l: f64, a: f64, b: f64) -> Result<()> {
        self.check_active()?;
        let obj = self.doc.lab_object(id)?;
        self.used_colorspaces.insert(obj);
        let _ = write!(self.commands, "/CSpace{} cs\n", obj);
        self.cmd_scn(&[l, a, b])
    }

    pub fn set_icc_stroke_color(&mut self, id: IccId, values: &[f64]) -> Result<()> {
        self.check_active()?;
        let (obj, channels) = self.doc.icc_colorspace(id)?;
        if values.len() != channels {
            return Err(PdfError::ChannelCountMismatch {
                expected: channels,
                got: values.len(),
            });
        }
        self.used_colorspaces.insert(obj);
        let _ = write!(self.commands, "/CSpace{} CS\n", obj);
        self.cmd_SCN(values)
    }

    pub fn set_icc_nonstroke_color(&mut self, id: IccId, values: &[f64]) -> Result<()> {
        self.check_active()?;
        let (obj, channels) = self.doc.icc_colorspace(id)?;
        if values.len() != channels {
            return Err(PdfError::ChannelCountMismatch {
                expected: channels,
                got: values.len(),
            });
        }
        self.used_colorspaces.insert(obj);
        let _ = write!(self.commands, "/CSpace{} cs\n", obj);
        self.cmd_scn(values)
    }

    /// Patterns can only be used from page contexts.
    pub fn set_pattern_color(&mut self, id: PatternId) -> Result<()> {
        self.check_active()?;
        if !matches!(self.kind, BuilderKind::Page) {
            return Err(PdfError::InvalidContextType);
        }
        let obj = self.doc.pattern_object(id)?;
        self.used_patterns.insert(obj);
        self.cmd_cs("/Pattern")?;
        let _ = write!(self.commands, "/Pattern-{} scn\n", obj);
        Ok(())
    }

    /// Stroke with the registration ("All") separation; CMYK documents only.
    pub fn set_all_stroke_color(&mut self) -> Result<()> {
        self.check_active()?;
        let _obj = self.doc.all_separation_object().ok_or(PdfError::BadResourceId)?;
        self.uses_all_colorspace = true;
        self.cmd_CS("/All")?;
        self.cmd_SCN(&[1.0])
    }

    // ─── Shadings, XObjects, matrices ───────────────────────────

    pub fn cmd_sh(&mut self, id: ShadingId) -> Result<()> {
        self.check_active()?;
        let obj = self.doc.shading_object(id)?;
        self.used_shadings.insert(obj);
        let _ = write!(self.commands, "/SH{} sh\n", obj);
        Ok(())
    }

    pub fn draw_image(&mut self, id: ImageId) -> Result<()> {
        self.check_active()?;
        let obj = self.doc.image_object(id)?;
        self.used_images.insert(obj);
        let _ = write!(self.commands, "/Image{} Do\n", obj);
        Ok(())
    }

    pub fn draw_form_xobject(&mut self, id: FormXObjectId) -> Result<()> {
        self.check_active()?;
        let obj = self.doc.form_xobject_object(id)?;
        self.used_xobjects.insert(obj);
        let _ = write!(self.commands, "/FXO{} Do\n", obj);
        Ok(())
    }

    pub fn scale(&mut self, sx: f64, sy: f64) -> Result<()> {
        self.cmd_cm(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn translate(&mut self, tx: f64, ty: f64) -> Result<()> {
        self.cmd_cm(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn rotate(&mut self, angle: f64) -> Result<()> {
        self.cmd_cm(
            angle.cos(),
            angle.sin(),
            -angle.sin(),
            angle.cos(),
            0.0,
            0.0,
        )
    }

    /// Run `body` between a `q`/`Q` pair, restoring state on every path.
    pub fn with_saved_state<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.cmd_q()?;
        let result = body(self);
        self.cmd_Q()?;
        result
    }

    // ─── Text ───────────────────────────────────────────────────

    pub fn cmd_Tr(&mut self, mode: TextRenderMode) -> Result<()> {
        self.check_active()?;
        let _ = write!(self.commands, "{} Tr\n", mode as i32);
        Ok(())
    }

    /// Render UTF-8 text with an embedded font at the given position.
    ///
    /// Glyphs stream into hex strings; a subset transition closes the
    /// current `TJ` array, switches the font, and opens a new one. Kerning
    /// adjustments from the donor's kern table are inserted between glyphs
    /// in thousandths of text space.
    pub fn render_text(
        &mut self,
        text: &str,
        fid: FontId,
        point_size: f64,
        x: f64,
        y: f64,
    ) -> Result<()> {
        self.check_active()?;
        if text.is_empty() {
            return Ok(());
        }
        let chars: Vec<char> = text.chars().collect();

        // Assign all glyphs first; assignment may open new subsets.
        let mut assigned = Vec::with_capacity(chars.len());
        for &ch in &chars {
            assigned.push(self.doc.subset_glyph(fid, ch)?);
        }

        // Kerning between adjacent codepoints, in TJ thousandths.
        let adjustments = self.kerning_adjustments(fid, &chars)?;

        let mut out = String::from("BT\n");
        let mut current_font_obj: Option<i32> = None;
        for (i, (glyph, font_obj)) in assigned.iter().enumerate() {
            if current_font_obj != Some(*font_obj) {
                if current_font_obj.is_some() {
                    out.push_str("> ] TJ\n");
                }
                self.used_subset_fonts.insert(*font_obj);
                let _ = write!(out, "  /SFont{} {} Tf\n", font_obj, point_size);
                if current_font_obj.is_none() {
                    let _ = write!(out, "  {} {} Td\n", x, y);
                }
                out.push_str("  [ <");
                current_font_obj = Some(*font_obj);
            } else if i > 0 && adjustments[i - 1] != 0 {
                let _ = write!(out, ">{}<", adjustments[i - 1]);
            }
            let _ = write!(out, "{:02x}", glyph.glyph_id);
        }
        out.push_str("> ] TJ\nET\n");
        self.commands.push_str(&out);
        Ok(())
    }

    /// Render caller-positioned glyphs (e.g. from an external shaper).
    pub fn render_positioned_glyphs(
        &mut self,
        glyphs: &[PositionedGlyph],
        fid: FontId,
        point_size: f64,
    ) -> Result<()> {
        self.check_active()?;
        if glyphs.is_empty() {
            return Ok(());
        }
        let mut out = String::from("BT\n");
        let mut current_font_obj: Option<i32> = None;
        let mut prev = (0.0, 0.0);
        for g in glyphs {
            let (glyph, font_obj) = self.doc.subset_glyph(fid, g.codepoint)?;
            if current_font_obj != Some(font_obj) {
                self.used_subset_fonts.insert(font_obj);
                let _ = write!(out, "  /SFont{} {} Tf\n", font_obj, point_size);
                current_font_obj = Some(font_obj);
            }
            let _ = write!(out, "  {} {} Td\n", g.x - prev.0, g.y - prev.1);
            prev = (g.x, g.y);
            let _ = write!(out, "  <{:02x}> Tj\n", glyph.glyph_id);
        }
        out.push_str("ET\n");
        self.commands.push_str(&out);
        Ok(())
    }

    /// Render text with one of the built-in Type1 faces. Characters outside
    /// Latin-1 have no encoding there and degrade to `?`.
    pub fn render_text_builtin(
        &mut self,
        text: &str,
        font: BuiltinFont,
        point_size: f64,
        x: f64,
        y: f64,
    ) -> Result<()> {
        self.check_active()?;
        let obj = self.doc.builtin_font_object(font);
        self.used_fonts.insert(obj);
        let mut escaped = String::with_capacity(text.len());
        for ch in text.chars() {
            match ch {
                '(' | ')' | '\\' => {
                    escaped.push('\\');
                    escaped.push(ch);
                }
                '\x20'..='\x7e' => escaped.push(ch),
                _ if (ch as u32) <= 0xFF => {
                    let _ = write!(escaped, "\\{:03o}", ch as u32);
                }
                _ => escaped.push('?'),
            }
        }
        let _ = write!(
            self.commands,
            "BT\n  /Font{} {} Tf\n  {} {} Td\n  ({}) Tj\nET\n",
            obj, point_size, x, y, escaped
        );
        Ok(())
    }

    fn kerning_adjustments(&self, fid: FontId, chars: &[char]) -> Result<Vec<i32>> {
        let font = self.doc.embedded_font(fid)?;
        let mut adjustments = vec![0i32; chars.len().saturating_sub(1)];
        let Ok(face) = ttf_parser::Face::parse(&font.data, 0) else {
            return Ok(adjustments);
        };
        if face.tables().kern.is_none() {
            return Ok(adjustments);
        }
        let upem = font.metrics.units_per_em as f64;
        for (i, pair) in chars.windows(2).enumerate() {
            let (Some(&left), Some(&right)) = (
                font.metrics.glyph_ids.get(&pair[0]),
                font.metrics.glyph_ids.get(&pair[1]),
            ) else {
                continue;
            };
            let kern = crate::font::glyph_kerning(
                &face,
                ttf_parser::GlyphId(left),
                ttf_parser::GlyphId(right),
            );
            if kern != 0 {
                // Positive TJ adjustments move left, so negate.
                adjustments[i] = (-(kern as f64) * 1000.0 / upem).round() as i32;
            }
        }
        Ok(adjustments)
    }

    // ─── Annotations ────────────────────────────────────────────

    /// Attach an annotation to this page. Page builders only.
    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<()> {
        self.check_active()?;
        if !matches!(self.kind, BuilderKind::Page) {
            return Err(PdfError::InvalidContextType);
        }
        self.annotations.push(annotation);
        Ok(())
    }

    /// A link annotation over the given rectangle.
    pub fn add_link(&mut self, rect: PdfRect, dest: crate::outline::Destination) -> Result<()> {
        self.add_annotation(Annotation::Link { rect, dest })
    }

    /// A text note annotation.
    pub fn add_text_note(&mut self, rect: PdfRect, contents: &str) -> Result<()> {
        self.add_annotation(Annotation::Text {
            rect,
            contents: contents.to_string(),
        })
    }

    // ─── Finalization ───────────────────────────────────────────

    fn build_resource_dict(&self) -> String {
        let mut resources = String::from("<<\n");
        if !self.used_images.is_empty() || !self.used_xobjects.is_empty() {
            resources.push_str("  /XObject <<\n");
            for obj in &self.used_images {
                let _ = write!(resources, "    /Image{} {} 0 R\n", obj, obj);
            }
            for obj in &self.used_xobjects {
                let _ = write!(resources, "    /FXO{} {} 0 R\n", obj, obj);
            }
            resources.push_str("  >>\n");
        }
        if !self.used_fonts.is_empty() || !self.used_subset_fonts.is_empty() {
            resources.push_str("  /Font <<\n");
            for obj in &self.used_fonts {
                let _ = write!(resources, "    /Font{} {} 0 R\n", obj, obj);
            }
            for obj in &self.used_subset_fonts {
                let _ = write!(resources, "    /SFont{} {} 0 R\n", obj, obj);
            }
            resources.push_str("  >>\n");
        }
        if !self.used_colorspaces.is_empty() || self.uses_all_colorspace {
            resources.push_str("  /ColorSpace <<\n");
            if self.uses_all_colorspace {
                if let Some(obj) = self.doc.all_separation_object() {
                    let _ = write!(resources, "    /All {} 0 R\n", obj);
                }
            }
            for obj in &self.used_colorspaces {
                let _ = write!(resources, "    /CSpace{} {} 0 R\n", obj, obj);
            }
            resources.push_str("  >>\n");
        }
        if !self.used_gstates.is_empty() {
            resources.push_str("  /ExtGState <<\n");
            for obj in &self.used_gstates {
                let _ = write!(resources, "    /GS{} {} 0 R\n", obj, obj);
            }
            resources.push_str("  >>\n");
        }
        if !self.used_shadings.is_empty() {
            resources.push_str("  /Shading <<\n");
            for obj in &self.used_shadings {
                let _ = write!(resources, "    /SH{} {} 0 R\n", obj, obj);
            }
            resources.push_str("  >>\n");
        }
        if !self.used_patterns.is_empty() {
            resources.push_str("  /Pattern <<\n");
            for obj in &self.used_patterns {
                let _ = write!(resources, "    /Pattern-{} {} 0 R\n", obj, obj);
            }
            resources.push_str("  >>\n");
        }
        resources.push_str(">>\n");
        resources
    }

    fn do_finish(&mut self) -> Result<FinishOutcome> {
        self.check_active()?;
        self.finished = true;
        let resources = self.build_resource_dict();
        let compressed = compress_to_vec_zlib(self.commands.as_bytes(), 6);
        match self.kind {
            BuilderKind::Page => {
                let content_dict = format!(
                    "<<\n  /Length {}\n  /Filter /FlateDecode\n>>\n",
                    compressed.len()
                );
                let annotations = std::mem::take(&mut self.annotations);
                let id = self
                    .doc
                    .add_page_objects(resources, content_dict, compressed, annotations);
                Ok(FinishOutcome::Page(id))
            }
            BuilderKind::FormXObject { bbox } => {
                let dict = format!(
                    "<<\n  /Type /XObject\n  /Subtype /Form\n  /BBox [ {} {} {} {} ]\n  /Resources {}  /Length {}\n  /Filter /FlateDecode\n>>\n",
                    bbox.x1, bbox.y1, bbox.x2, bbox.y2, resources, compressed.len()
                );
                let id = self.doc.add_form_xobject_object(dict, compressed);
                Ok(FinishOutcome::Form(id))
            }
            BuilderKind::TilingPattern { w, h } => {
                let dict = format!(
                    "<<\n  /Type /Pattern\n  /PatternType 1\n  /PaintType 1\n  /TilingType 1\n  /BBox [ 0 0 {} {} ]\n  /XStep {}\n  /YStep {}\n  /Resources {}  /Length {}\n  /Filter /FlateDecode\n>>\n",
                    w, h, w, h, resources, compressed.len()
                );
                let id = self.doc.add_pattern_object(dict, compressed);
                Ok(FinishOutcome::Pattern(id))
            }
        }
    }

    /// Finish a page builder, adding the page to the document.
    pub fn finish_page(mut self) -> Result<PageId> {
        if !matches!(self.kind, BuilderKind::Page) {
            return Err(PdfError::InvalidContextType);
        }
        match self.do_finish()? {
            FinishOutcome::Page(id) => Ok(id),
            _ => Err(PdfError::InvalidContextType),
        }
    }

    /// Finish a tiling-pattern builder.
    pub fn finish_pattern(mut self) -> Result<PatternId> {
        if !matches!(self.kind, BuilderKind::TilingPattern { .. }) {
            return Err(PdfError::InvalidContextType);
        }
        match self.do_finish()? {
            FinishOutcome::Pattern(id) => Ok(id),
            _ => Err(PdfError::InvalidContextType),
        }
    }

    /// Finish a form-XObject builder.
    pub fn finish_form(mut self) -> Result<FormXObjectId> {
        if !matches!(self.kind, BuilderKind::FormXObject { .. }) {
            return Err(PdfError::InvalidContextType);
        }
        match self.do_finish()? {
            FinishOutcome::Form(id) => Ok(id),
            _ => Err(PdfError::InvalidContextType),
        }
    }

    #[cfg(test)]
    pub(crate) fn commands_so_far(&self) -> &str {
        &self.commands
    }
}

impl Drop for ContentBuilder<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // Scoped-acquisition guarantee: finalize runs exactly once on
            // every exit path. Errors here are reported, not raised.
            if let Err(e) = self.do_finish() {
                log::error!("implicit content builder finalize failed: {}", e);
            }
        }
    }
}

/// Escape text for a PDF literal string. Re-exported convenience.
pub fn escape_pdf_string(s: &str) -> String {
    escape_literal_string(s)
}
