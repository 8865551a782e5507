//! The document model: resource arenas, page assembly, and the write pass.
//!
//! A [`PdfDocument`] only grows: every resource-creation call appends objects
//! and hands back a typed id. Nothing is written until the document is
//! consumed by [`PdfDocument::write_to_file`] (or [`write_to`]
//! (PdfDocument::write_to)), which lays out the page tree, outlines, and
//! catalog, materializes deferred font-subset objects, and streams the whole
//! file through the serializer in one pass.
//!
//! Object ordering invariants: the Info dictionary is the first object ever
//! allocated and the Catalog is the last, so `/Info` is always `1 0 R` and
//! `/Root` equals the total object count.

use std::collections::HashMap;
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::color::{CmykColor, ColorConverter, DeviceColorspace, LabColorSpace};
use crate::content::{BuilderKind, ContentBuilder};
use crate::error::{PdfError, Result};
use crate::font::{
    subset_font_name, BuiltinFont, EmbeddedFont, FontMetrics, FontSubsetter, SubsetGlyph,
    SubsetObjects,
};
use crate::gstate::GraphicsState;
use crate::image::{PixelData, RasterImage};
use crate::object::{ObjectEntry, ObjectStore, Serializer};
use crate::outline::{build_outline_objects, Annotation, Destination, Outline};
use crate::shading::{FunctionType2, Shading};
use crate::types::{
    FontId, FormXObjectId, FunctionId, GstateId, IccId, ImageId, LabId, OutlineId, PageId,
    PatternId, PdfBox, PdfRect, SeparationId, ShadingId,
};

const PRODUCER: &str = "Vellum 0.1.0";

/// Document-wide options fixed at construction.
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    pub mediabox: PdfBox,
    pub cropbox: Option<PdfBox>,
    pub bleedbox: Option<PdfBox>,
    pub trimbox: Option<PdfBox>,
    pub artbox: Option<PdfBox>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub output_colorspace: DeviceColorspace,
    /// Optional ICC profile blobs for the output intent; stored opaquely.
    pub rgb_profile: Option<Vec<u8>>,
    pub gray_profile: Option<Vec<u8>>,
    pub cmyk_profile: Option<Vec<u8>>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        DocumentOptions {
            mediabox: PdfBox::a4(),
            cropbox: None,
            bleedbox: None,
            trimbox: None,
            artbox: None,
            title: None,
            author: None,
            output_colorspace: DeviceColorspace::Rgb,
            rgb_profile: None,
            gray_profile: None,
            cmyk_profile: None,
        }
    }
}

#[derive(Debug, Clone)]
struct PageRecord {
    resources_obj: i32,
    contents_obj: i32,
    annotation_objs: Vec<i32>,
}

#[derive(Debug, Clone, Copy)]
struct IccInfo {
    object: i32,
    channels: usize,
}

/// The top-level document handle.
pub struct PdfDocument {
    options: DocumentOptions,
    converter: ColorConverter,
    store: ObjectStore,
    pages: Vec<PageRecord>,
    images: Vec<i32>,
    fonts: Vec<EmbeddedFont>,
    builtin_fonts: HashMap<BuiltinFont, i32>,
    separations: Vec<i32>,
    labs: Vec<i32>,
    iccs: Vec<IccInfo>,
    gstates: Vec<i32>,
    functions: Vec<i32>,
    shadings: Vec<i32>,
    patterns: Vec<i32>,
    form_xobjects: Vec<i32>,
    outlines: Vec<Outline>,
    annotations: Vec<Annotation>,
    all_separation: Option<SeparationId>,
    cmyk_profile_obj: Option<i32>,
}

impl PdfDocument {
    /// Create an empty document. Allocates the Info dictionary immediately
    /// so it is always object 1.
    pub fn new(options: DocumentOptions) -> Self {
        let mut doc = PdfDocument {
            converter: ColorConverter::new(options.output_colorspace),
            options,
            store: ObjectStore::new(),
            pages: Vec::new(),
            images: Vec::new(),
            fonts: Vec::new(),
            builtin_fonts: HashMap::new(),
            separations: Vec::new(),
            labs: Vec::new(),
            iccs: Vec::new(),
            gstates: Vec::new(),
            functions: Vec::new(),
            shadings: Vec::new(),
            patterns: Vec::new(),
            form_xobjects: Vec::new(),
            outlines: Vec::new(),
            annotations: Vec::new(),
            all_separation: None,
            cmyk_profile_obj: None,
        };
        doc.generate_info_object();
        if doc.options.output_colorspace == DeviceColorspace::Cmyk {
            // The registration colorant, available to every page.
            let id = doc.create_separation("All", CmykColor::new(1.0, 1.0, 1.0, 1.0));
            doc.all_separation = Some(id);
        }
        if let Some(profile) = doc.options.rgb_profile.take() {
            doc.store_icc_profile(&profile, 3);
        }
        if let Some(profile) = doc.options.gray_profile.take() {
            doc.store_icc_profile(&profile, 1);
        }
        if let Some(profile) = doc.options.cmyk_profile.take() {
            doc.cmyk_profile_obj = doc.store_icc_profile(&profile, 4);
        }
        doc
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    // ─── Builders ───────────────────────────────────────────────

    /// Open a builder for the next page.
    pub fn new_page(&mut self) -> ContentBuilder<'_> {
        ContentBuilder::new(self, BuilderKind::Page)
    }

    /// Open a builder for a tiling pattern cell of the given size.
    pub fn new_tiling_pattern(&mut self, w: f64, h: f64) -> ContentBuilder<'_> {
        ContentBuilder::new(self, BuilderKind::TilingPattern { w, h })
    }

    /// Open a builder for a reusable form XObject.
    pub fn new_form_xobject(&mut self, bbox: PdfRect) -> ContentBuilder<'_> {
        ContentBuilder::new(self, BuilderKind::FormXObject { bbox })
    }

    // ─── Fonts ──────────────────────────────────────────────────

    /// Load a TrueType font for embedding. The file is parsed for metrics up
    /// front; malformed fonts fail here, not at document close.
    pub fn load_font<P: AsRef<Path>>(&mut self, path: P) -> Result<FontId> {
        let data = std::fs::read(path)?;
        self.load_font_data(data)
    }

    /// Load a TrueType font from bytes already in memory.
    pub fn load_font_data(&mut self, data: Vec<u8>) -> Result<FontId> {
        let metrics = FontMetrics::from_font_data(&data)?;
        self.fonts.push(EmbeddedFont {
            data,
            metrics,
            subsetter: FontSubsetter::new(),
            subset_objects: Vec::new(),
        });
        Ok(FontId(self.fonts.len() - 1))
    }

    /// The advance width of a codepoint at the given size, if the font maps
    /// it.
    pub fn glyph_advance(&self, fid: FontId, point_size: f64, ch: char) -> Result<Option<f64>> {
        let font = self.fonts.get(fid.0).ok_or(PdfError::BadResourceId)?;
        Ok(font.metrics.advance(ch, point_size))
    }

    pub(crate) fn embedded_font(&self, fid: FontId) -> Result<&EmbeddedFont> {
        self.fonts.get(fid.0).ok_or(PdfError::BadResourceId)
    }

    /// Assign a codepoint to a subset, allocating the subset's four deferred
    /// objects when a new subset opens. Returns the assignment and the
    /// subset's font dictionary object number.
    pub(crate) fn subset_glyph(&mut self, fid: FontId, ch: char) -> Result<(SubsetGlyph, i32)> {
        let font = self.fonts.get_mut(fid.0).ok_or(PdfError::BadResourceId)?;
        let assignment = font.subsetter.get_or_assign(ch);
        if assignment.opened_subset {
            let subset = assignment.glyph.subset;
            let data_obj = self.store.add(ObjectEntry::SubsetFontData { font: fid, subset });
            let descriptor_obj = self.store.add(ObjectEntry::SubsetFontDescriptor {
                font: fid,
                subset,
                data_obj,
            });
            let cmap_obj = self.store.add(ObjectEntry::SubsetCmap { font: fid, subset });
            let font_obj = self.store.add(ObjectEntry::SubsetFont {
                font: fid,
                subset,
                descriptor_obj,
                cmap_obj,
            });
            font.subset_objects.push(SubsetObjects {
                data_obj,
                descriptor_obj,
                cmap_obj,
                font_obj,
            });
        }
        let font_obj = font.subset_objects[assignment.glyph.subset].font_obj;
        Ok((assignment.glyph, font_obj))
    }

    /// Object number for a built-in Type1 face, created on first use.
    pub(crate) fn builtin_font_object(&mut self, font: BuiltinFont) -> i32 {
        if let Some(&obj) = self.builtin_fonts.get(&font) {
            return obj;
        }
        let dict = format!(
            "<<\n  /Type /Font\n  /Subtype /Type1\n  /BaseFont /{}\n>>\n",
            font.pdf_name()
        );
        let obj = self.store.add_dict(dict);
        self.builtin_fonts.insert(font, obj);
        obj
    }

    // ─── Images ─────────────────────────────────────────────────

    /// Load and embed an image file (PNG or JPEG).
    pub fn load_image<P: AsRef<Path>>(&mut self, path: P) -> Result<ImageId> {
        let image = crate::image::load_image(path.as_ref())?;
        self.embed_image(&image)
    }

    /// Embed an already-decoded raster image.
    pub fn embed_image(&mut self, image: &RasterImage) -> Result<ImageId> {
        let obj = match &image.pixels {
            PixelData::Jpeg { data, gray } => {
                let colorspace = if *gray { "/DeviceGray" } else { "/DeviceRGB" };
                let dict = format!(
                    "<<\n  /Type /XObject\n  /Subtype /Image\n  /ColorSpace {}\n  /Width {}\n  /Height {}\n  /BitsPerComponent {}\n  /Length {}\n  /Filter /DCTDecode\n>>\n",
                    colorspace, image.width, image.height, image.bit_depth, data.len()
                );
                self.store.add_stream(dict, data.clone())
            }
            PixelData::Gray8 { data, alpha } => {
                let smask = alpha
                    .as_ref()
                    .map(|a| self.add_soft_mask(image.width, image.height, a));
                let colorspace = match self.store_image_profile(image, 1) {
                    Some(obj) => format!("[ /ICCBased {} 0 R ]", obj),
                    None => "/DeviceGray".to_string(),
                };
                self.add_flate_image(image, &colorspace, data, smask)
            }
            PixelData::Rgb8 { data, alpha } => {
                let smask = alpha
                    .as_ref()
                    .map(|a| self.add_soft_mask(image.width, image.height, a));
                match self.options.output_colorspace {
                    DeviceColorspace::Rgb => {
                        let colorspace = match self.store_image_profile(image, 3) {
                            Some(obj) => format!("[ /ICCBased {} 0 R ]", obj),
                            None => "/DeviceRGB".to_string(),
                        };
                        self.add_flate_image(image, &colorspace, data, smask)
                    }
                    DeviceColorspace::Gray => {
                        let converted = self.converter.rgb_pixels_to_gray(data);
                        self.add_flate_image(image, "/DeviceGray", &converted, smask)
                    }
                    DeviceColorspace::Cmyk => {
                        let converted = self.converter.rgb_pixels_to_cmyk(data);
                        let colorspace = match self.cmyk_profile_obj {
                            Some(obj) => format!("[ /ICCBased {} 0 R ]", obj),
                            None => "/DeviceCMYK".to_string(),
                        };
                        self.add_flate_image(image, &colorspace, &converted, smask)
                    }
                }
            }
        };
        self.images.push(obj);
        Ok(ImageId(self.images.len() - 1))
    }

    fn add_soft_mask(&mut self, width: u32, height: u32, alpha: &[u8]) -> i32 {
        let compressed = compress_to_vec_zlib(alpha, 6);
        let dict = format!(
            "<<\n  /Type /XObject\n  /Subtype /Image\n  /ColorSpace /DeviceGray\n  /Width {}\n  /Height {}\n  /BitsPerComponent 8\n  /Length {}\n  /Filter /FlateDecode\n>>\n",
            width, height, compressed.len()
        );
        self.store.add_stream(dict, compressed)
    }

    fn add_flate_image(
        &mut self,
        image: &RasterImage,
        colorspace: &str,
        pixels: &[u8],
        smask: Option<i32>,
    ) -> i32 {
        let compressed = compress_to_vec_zlib(pixels, 6);
        let mut dict = format!(
            "<<\n  /Type /XObject\n  /Subtype /Image\n  /ColorSpace {}\n  /Width {}\n  /Height {}\n  /BitsPerComponent {}\n  /Length {}\n  /Filter /FlateDecode\n",
            colorspace, image.width, image.height, image.bit_depth, compressed.len()
        );
        if let Some(smask) = smask {
            let _ = write!(dict, "  /SMask {} 0 R\n", smask);
        }
        dict.push_str(">>\n");
        self.store.add_stream(dict, compressed)
    }

    fn store_image_profile(&mut self, image: &RasterImage, channels: usize) -> Option<i32> {
        image
            .icc_profile
            .as_ref()
            .and_then(|p| self.store_icc_profile(p, channels))
    }

    pub(crate) fn image_object(&self, id: ImageId) -> Result<i32> {
        self.images.get(id.0).copied().ok_or(PdfError::BadResourceId)
    }

    // ─── Colorspaces ────────────────────────────────────────────

    /// Register a named separation colorant with a CMYK fallback, emitted as
    /// a type 4 tint transform.
    pub fn create_separation(&mut self, name: &str, fallback: CmykColor) -> SeparationId {
        let stream = format!(
            "{{ dup {} mul exch dup {} mul exch dup {} mul exch {} mul }}\n",
            fallback.c.get(),
            fallback.m.get(),
            fallback.y.get(),
            fallback.k.get()
        );
        let dict = format!(
            "<<\n  /FunctionType 4\n  /Domain [ 0.0 1.0 ]\n  /Range [ 0.0 1.0 0.0 1.0 0.0 1.0 0.0 1.0 ]\n  /Length {}\n>>\n",
            stream.len()
        );
        let fn_obj = self.store.add_stream(dict, stream.into_bytes());
        let array = format!(
            "[\n  /Separation\n    /{}\n    /DeviceCMYK\n    {} 0 R\n]\n",
            name, fn_obj
        );
        let obj = self.store.add_dict(array);
        self.separations.push(obj);
        SeparationId(self.separations.len() - 1)
    }

    /// Register a CIE Lab colorspace.
    pub fn add_lab_colorspace(&mut self, lab: LabColorSpace) -> LabId {
        let dict = format!(
            "[ /Lab\n  <<\n    /WhitePoint [ {} {} {} ]\n    /Range [ {} {} {} {} ]\n  >>\n]\n",
            lab.xw, lab.yw, lab.zw, lab.amin, lab.amax, lab.bmin, lab.bmax
        );
        let obj = self.store.add_dict(dict);
        self.labs.push(obj);
        LabId(self.labs.len() - 1)
    }

    /// Register an ICC-based colorspace from raw profile bytes supplied by a
    /// color-management collaborator.
    pub fn add_icc_colorspace(&mut self, profile: &[u8], channels: usize) -> Result<IccId> {
        let obj = self
            .store_icc_profile(profile, channels)
            .ok_or(PdfError::InvalidIccProfile)?;
        self.iccs.push(IccInfo {
            object: obj,
            channels,
        });
        Ok(IccId(self.iccs.len() - 1))
    }

    fn store_icc_profile(&mut self, profile: &[u8], channels: usize) -> Option<i32> {
        if profile.is_empty() {
            return None;
        }
        let compressed = compress_to_vec_zlib(profile, 6);
        let dict = format!(
            "<<\n  /Filter /FlateDecode\n  /Length {}\n  /N {}\n>>\n",
            compressed.len(),
            channels
        );
        Some(self.store.add_stream(dict, compressed))
    }

    pub(crate) fn separation_object(&self, id: SeparationId) -> Result<i32> {
        self.separations
            .get(id.0)
            .copied()
            .ok_or(PdfError::BadResourceId)
    }

    pub(crate) fn lab_object(&self, id: LabId) -> Result<i32> {
        self.labs.get(id.0).copied().ok_or(PdfError::BadResourceId)
    }

    pub(crate) fn icc_colorspace(&self, id: IccId) -> Result<(i32, usize)> {
        self.iccs
            .get(id.0)
            .map(|i| (i.object, i.channels))
            .ok_or(PdfError::BadResourceId)
    }

    pub(crate) fn all_separation_object(&self) -> Option<i32> {
        self.all_separation
            .and_then(|id| self.separations.get(id.0).copied())
    }

    pub(crate) fn converter(&self) -> ColorConverter {
        self.converter
    }

    // ─── Graphics state, functions, shadings ────────────────────

    pub fn add_graphics_state(&mut self, state: &GraphicsState) -> GstateId {
        let obj = self.store.add_dict(state.to_dict());
        self.gstates.push(obj);
        GstateId(self.gstates.len() - 1)
    }

    pub(crate) fn gstate_object(&self, id: GstateId) -> Result<i32> {
        self.gstates.get(id.0).copied().ok_or(PdfError::BadResourceId)
    }

    pub fn add_function_type2(&mut self, func: &FunctionType2) -> FunctionId {
        let obj = self.store.add_dict(func.to_dict());
        self.functions.push(obj);
        FunctionId(self.functions.len() - 1)
    }

    fn function_object(&self, id: FunctionId) -> Result<i32> {
        self.functions
            .get(id.0)
            .copied()
            .ok_or(PdfError::BadResourceId)
    }

    pub fn add_shading(&mut self, shading: &Shading) -> Result<ShadingId> {
        let obj = match shading {
            Shading::Axial(sh) => {
                let f = self.function_object(sh.function)?;
                self.store.add_dict(sh.to_dict(f))
            }
            Shading::Radial(sh) => {
                let f = self.function_object(sh.function)?;
                self.store.add_dict(sh.to_dict(f))
            }
            Shading::FreeForm(mesh) => {
                let (dict, stream) = mesh.to_object()?;
                self.store.add_stream(dict, stream)
            }
            Shading::Coons(mesh) => {
                let (dict, stream) = mesh.to_object()?;
                self.store.add_stream(dict, stream)
            }
        };
        self.shadings.push(obj);
        Ok(ShadingId(self.shadings.len() - 1))
    }

    pub(crate) fn shading_object(&self, id: ShadingId) -> Result<i32> {
        self.shadings
            .get(id.0)
            .copied()
            .ok_or(PdfError::BadResourceId)
    }

    pub(crate) fn pattern_object(&self, id: PatternId) -> Result<i32> {
        self.patterns
            .get(id.0)
            .copied()
            .ok_or(PdfError::BadResourceId)
    }

    pub(crate) fn form_xobject_object(&self, id: FormXObjectId) -> Result<i32> {
        self.form_xobjects
            .get(id.0)
            .copied()
            .ok_or(PdfError::BadResourceId)
    }

    // ─── Outlines ───────────────────────────────────────────────

    /// Add a node to the document outline tree.
    pub fn add_outline(
        &mut self,
        title: &str,
        dest: Destination,
        parent: Option<OutlineId>,
    ) -> Result<OutlineId> {
        if let Some(parent) = parent {
            if parent.0 >= self.outlines.len() {
                return Err(PdfError::BadResourceId);
            }
        }
        self.outlines.push(Outline {
            title: title.to_string(),
            dest,
            parent,
        });
        Ok(OutlineId(self.outlines.len() - 1))
    }

    // ─── Builder plumbing ───────────────────────────────────────

    pub(crate) fn add_page_objects(
        &mut self,
        resources: String,
        content_dict: String,
        content: Vec<u8>,
        annotations: Vec<Annotation>,
    ) -> PageId {
        let resources_obj = self.store.add_dict(resources);
        let contents_obj = self.store.add_stream(content_dict, content);
        let mut annotation_objs = Vec::with_capacity(annotations.len());
        for annotation in annotations {
            let index = self.annotations.len();
            self.annotations.push(annotation);
            annotation_objs.push(self.store.add(ObjectEntry::Annotation { index }));
        }
        self.pages.push(PageRecord {
            resources_obj,
            contents_obj,
            annotation_objs,
        });
        PageId(self.pages.len() - 1)
    }

    pub(crate) fn add_pattern_object(&mut self, dict: String, stream: Vec<u8>) -> PatternId {
        let obj = self.store.add_stream(dict, stream);
        self.patterns.push(obj);
        PatternId(self.patterns.len() - 1)
    }

    pub(crate) fn add_form_xobject_object(&mut self, dict: String, stream: Vec<u8>) -> FormXObjectId {
        let obj = self.store.add_stream(dict, stream);
        self.form_xobjects.push(obj);
        FormXObjectId(self.form_xobjects.len() - 1)
    }

    // ─── Finalization ───────────────────────────────────────────

    /// Write the finished document to a file. Consumes the document; partial
    /// output on failure is the caller's to discard.
    pub fn write_to_file<P: AsRef<Path>>(self, path: P) -> Result<()> {
        if self.pages.is_empty() {
            return Err(PdfError::NoPages);
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_document(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the finished document to an arbitrary sink.
    pub fn write_to<W: Write>(self, sink: W) -> Result<()> {
        self.write_document(sink)
    }

    fn write_document<W: Write>(mut self, sink: W) -> Result<()> {
        if self.pages.is_empty() {
            return Err(PdfError::NoPages);
        }

        // Lay out the remaining objects: page dictionaries + Pages tree,
        // outlines, then the catalog, which must come last.
        let page_objects = self.create_page_objects();
        let outline_root = self.create_outline_objects(&page_objects)?;
        self.create_catalog(outline_root);
        let root = self.store.len() as i32;

        // Resolve annotation destinations before any byte is written so
        // structural errors cannot leave a half-written file behind.
        let mut annotation_dicts = Vec::with_capacity(self.annotations.len());
        for annotation in &self.annotations {
            annotation_dicts.push(annotation.to_dict(&page_objects)?);
        }

        let mut ser = Serializer::new(sink);
        ser.write_header()?;
        for i in 0..self.store.len() {
            let object_number = (i + 1) as i32;
            match &self.store.entries()[i] {
                ObjectEntry::Full { dictionary, stream } => {
                    ser.write_object(object_number, dictionary, stream.as_deref())?;
                }
                ObjectEntry::SubsetFontData { font, subset } => {
                    let (dict, data) = self.subset_font_data_object(*font, *subset)?;
                    ser.write_object(object_number, &dict, Some(&data))?;
                }
                ObjectEntry::SubsetFontDescriptor { font, subset, data_obj } => {
                    let dict = self.subset_descriptor_dict(*font, *subset, *data_obj)?;
                    ser.write_object(object_number, &dict, None)?;
                }
                ObjectEntry::SubsetCmap { font, subset } => {
                    let cmap = self.subset_cmap(*font, *subset)?;
                    let dict = format!("<<\n  /Length {}\n>>\n", cmap.len());
                    ser.write_object(object_number, &dict, Some(cmap.as_bytes()))?;
                }
                ObjectEntry::SubsetFont { font, subset, descriptor_obj, cmap_obj } => {
                    let dict = self.subset_font_dict(*font, *subset, *descriptor_obj, *cmap_obj)?;
                    ser.write_object(object_number, &dict, None)?;
                }
                ObjectEntry::Annotation { index } => {
                    ser.write_object(object_number, &annotation_dicts[*index], None)?;
                }
            }
        }
        ser.write_xref_and_trailer(root, 1)?;
        ser.flush()
    }

    fn create_page_objects(&mut self) -> Vec<i32> {
        let pages_obj_num = (self.store.len() + self.pages.len() + 1) as i32;
        let mut page_objects = Vec::with_capacity(self.pages.len());

        for page in &self.pages {
            let mut dict = String::from("<<\n  /Type /Page\n");
            let _ = write!(dict, "  /Parent {} 0 R\n", pages_obj_num);
            write_box(&mut dict, "MediaBox", &self.options.mediabox);
            if let Some(b) = &self.options.cropbox {
                write_box(&mut dict, "CropBox", b);
            }
            if let Some(b) = &self.options.bleedbox {
                write_box(&mut dict, "BleedBox", b);
            }
            if let Some(b) = &self.options.trimbox {
                write_box(&mut dict, "TrimBox", b);
            }
            if let Some(b) = &self.options.artbox {
                write_box(&mut dict, "ArtBox", b);
            }
            let _ = write!(dict, "  /Contents {} 0 R\n", page.contents_obj);
            let _ = write!(dict, "  /Resources {} 0 R\n", page.resources_obj);
            if !page.annotation_objs.is_empty() {
                dict.push_str("  /Annots [ ");
                for obj in &page.annotation_objs {
                    let _ = write!(dict, "{} 0 R ", obj);
                }
                dict.push_str("]\n");
            }
            dict.push_str(">>\n");
            page_objects.push(self.store.add_dict(dict));
        }

        let mut kids = String::from("<<\n  /Type /Pages\n  /Kids [\n");
        for obj in &page_objects {
            let _ = write!(kids, "    {} 0 R\n", obj);
        }
        let _ = write!(kids, "  ]\n  /Count {}\n>>\n", page_objects.len());
        let actual = self.store.add_dict(kids);
        debug_assert_eq!(actual, pages_obj_num);
        page_objects
    }

    fn create_outline_objects(&mut self, page_objects: &[i32]) -> Result<Option<i32>> {
        let Some((objects, root)) = build_outline_objects(
            &self.outlines,
            page_objects,
            self.store.next_object_number(),
        )?
        else {
            return Ok(None);
        };
        for node in objects {
            let actual = self.store.add_dict(node.dictionary);
            debug_assert_eq!(actual, node.object_number);
        }
        Ok(Some(root))
    }

    fn create_catalog(&mut self, outline_root: Option<i32>) {
        // The Pages object is the most recent one before outlines were laid
        // out; recompute from the page count instead of trusting callers.
        let pages_obj = (self.store.len() - self.outline_object_count()) as i32;
        let mut dict = String::from("<<\n  /Type /Catalog\n");
        let _ = write!(dict, "  /Pages {} 0 R\n", pages_obj);
        if let Some(root) = outline_root {
            let _ = write!(dict, "  /Outlines {} 0 R\n", root);
        }
        dict.push_str(">>\n");
        self.store.add_dict(dict);
    }

    fn outline_object_count(&self) -> usize {
        if self.outlines.is_empty() {
            0
        } else {
            self.outlines.len() + 1
        }
    }

    // ─── Deferred font-subset objects ───────────────────────────

    fn subset_codepoints(&self, fid: FontId, subset: usize) -> Result<(&EmbeddedFont, &[char])> {
        let font = self.fonts.get(fid.0).ok_or(PdfError::BadResourceId)?;
        let codepoints = font
            .subsetter
            .subsets()
            .get(subset)
            .ok_or(PdfError::BadResourceId)?
            .codepoints();
        Ok((font, codepoints))
    }

    fn subset_font_data_object(&self, fid: FontId, subset: usize) -> Result<(String, Vec<u8>)> {
        let (font, codepoints) = self.subset_codepoints(fid, subset)?;
        let program =
            crate::font::subset::generate_subset_font(&font.data, codepoints, &font.metrics.glyph_ids)?;
        let compressed = compress_to_vec_zlib(&program, 6);
        let dict = format!(
            "<<\n  /Length {}\n  /Length1 {}\n  /Filter /FlateDecode\n>>\n",
            compressed.len(),
            program.len()
        );
        Ok((dict, compressed))
    }

    fn subset_descriptor_dict(&self, fid: FontId, subset: usize, data_obj: i32) -> Result<String> {
        let (font, _) = self.subset_codepoints(fid, subset)?;
        let m = &font.metrics;
        let scale = 1000.0 / m.units_per_em as f64;
        Ok(format!(
            "<<\n  /Type /FontDescriptor\n  /FontName /{}\n  /Flags 4\n  /FontBBox [ {} {} {} {} ]\n  /ItalicAngle 0\n  /Ascent {}\n  /Descent {}\n  /CapHeight {}\n  /StemV 80\n  /FontFile2 {} 0 R\n>>\n",
            subset_font_name(&m.postscript_name, subset),
            (m.bbox[0] as f64 * scale) as i32,
            (m.bbox[1] as f64 * scale) as i32,
            (m.bbox[2] as f64 * scale) as i32,
            (m.bbox[3] as f64 * scale) as i32,
            (m.ascender as f64 * scale) as i32,
            (m.descender as f64 * scale) as i32,
            (m.cap_height as f64 * scale) as i32,
            data_obj
        ))
    }

    fn subset_cmap(&self, fid: FontId, subset: usize) -> Result<String> {
        let (_, codepoints) = self.subset_codepoints(fid, subset)?;
        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n/CIDSystemInfo <<\n  /Registry (Adobe)\n  /Ordering (UCS)\n  /Supplement 0\n>> def\n/CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n1 begincodespacerange\n<00> <FF>\nendcodespacerange\n",
        );
        // beginbfchar blocks are limited to 100 entries.
        let mut units = [0u16; 2];
        for (block_start, block) in codepoints.chunks(100).enumerate() {
            let _ = write!(cmap, "{} beginbfchar\n", block.len());
            for (i, ch) in block.iter().enumerate() {
                let code = block_start * 100 + i;
                let _ = write!(cmap, "<{:02X}> <", code);
                for unit in ch.encode_utf16(&mut units) {
                    let _ = write!(cmap, "{:04X}", unit);
                }
                cmap.push_str(">\n");
            }
            cmap.push_str("endbfchar\n");
        }
        cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
        Ok(cmap)
    }

    fn subset_font_dict(
        &self,
        fid: FontId,
        subset: usize,
        descriptor_obj: i32,
        cmap_obj: i32,
    ) -> Result<String> {
        let (font, codepoints) = self.subset_codepoints(fid, subset)?;
        let m = &font.metrics;
        let scale = 1000.0 / m.units_per_em as f64;
        let mut widths = String::from("[ ");
        for ch in codepoints {
            let advance = m.advances.get(ch).copied().unwrap_or(0);
            let _ = write!(widths, "{} ", (advance as f64 * scale).round() as i32);
        }
        widths.push(']');
        Ok(format!(
            "<<\n  /Type /Font\n  /Subtype /TrueType\n  /BaseFont /{}\n  /FirstChar 0\n  /LastChar {}\n  /Widths {}\n  /FontDescriptor {} 0 R\n  /ToUnicode {} 0 R\n>>\n",
            subset_font_name(&m.postscript_name, subset),
            codepoints.len() - 1,
            widths,
            descriptor_obj,
            cmap_obj
        ))
    }

    // ─── Info object ────────────────────────────────────────────

    fn generate_info_object(&mut self) {
        let mut dict = String::from("<<\n");
        if let Some(title) = &self.options.title {
            let _ = write!(dict, "  /Title {}\n", pdf_utf16_string(title));
        }
        if let Some(author) = &self.options.author {
            let _ = write!(dict, "  /Author {}\n", pdf_utf16_string(author));
        }
        let _ = write!(dict, "  /Producer ({})\n", PRODUCER);
        let _ = write!(dict, "  /CreationDate {}\n", current_date_string());
        dict.push_str(">>\n");
        let obj = self.store.add_dict(dict);
        debug_assert_eq!(obj, 1);
    }
}

fn write_box(buf: &mut String, name: &str, b: &PdfBox) {
    let _ = write!(buf, "  /{} [ {} {} {} {} ]\n", name, b.x, b.y, b.w, b.h);
}

/// Encode text as a UTF-16BE hex string with BOM, per PDF 1.7 section
/// 7.9.2.2.
fn pdf_utf16_string(s: &str) -> String {
    let mut out = String::from("<FEFF");
    for unit in s.encode_utf16() {
        let _ = write!(out, "{:04X}", unit);
    }
    out.push('>');
    out
}

/// `(D:YYYYMMDDHHMMSSZ)` in UTC, honoring SOURCE_DATE_EPOCH for
/// reproducible builds.
fn current_date_string() -> String {
    let epoch = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0)
        });
    let (year, month, day, hour, minute, second) = civil_from_epoch(epoch);
    format!(
        "(D:{:04}{:02}{:02}{:02}{:02}{:02}Z)",
        year, month, day, hour, minute, second
    )
}

/// Gregorian date from Unix seconds (days-from-civil inverse).
fn civil_from_epoch(secs: i64) -> (i64, i64, i64, i64, i64, i64) {
    let days = secs.div_euclid(86400);
    let rem = secs.rem_euclid(86400);
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day, rem / 3600, (rem % 3600) / 60, rem % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(doc: PdfDocument) -> Vec<u8> {
        let mut out = Vec::new();
        doc.write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_no_pages_is_structural_error() {
        let doc = PdfDocument::new(DocumentOptions::default());
        let mut out = Vec::new();
        let err = doc.write_to(&mut out).unwrap_err();
        assert!(matches!(err, PdfError::NoPages));
        assert!(out.is_empty(), "nothing may be written on failure");
    }

    #[test]
    fn test_minimal_document_structure() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        let page = doc.new_page();
        page.finish_page().unwrap();
        let bytes = render(doc);
        let text = String::from_utf8_lossy(&bytes);
        assert!(bytes.starts_with(b"%PDF-1.7\n"));
        assert!(text.contains("/Type /Pages"));
        assert!(text.contains("/Type /Catalog"));
        assert!(text.contains("/Info 1 0 R"));
        assert!(text.ends_with("%%EOF\n"));
    }

    #[test]
    fn test_info_is_first_root_is_last() {
        let mut doc = PdfDocument::new(DocumentOptions {
            title: Some("T".into()),
            ..Default::default()
        });
        doc.new_page().finish_page().unwrap();
        let bytes = render(doc);
        let text = String::from_utf8_lossy(&bytes);
        // Object 1 carries the Producer entry.
        let obj1 = text.find("1 0 obj").unwrap();
        assert!(text[obj1..obj1 + 200].contains("/Producer"));
        // Root in the trailer equals /Size - 1 (the last object).
        let size: i32 = field_after(&text, "/Size ");
        let root: i32 = field_after(&text, "/Root ");
        assert_eq!(root, size - 1);
        let catalog = text.find(&format!("\n{} 0 obj", root)).unwrap();
        assert!(text[catalog..catalog + 100].contains("/Type /Catalog"));
    }

    fn field_after(text: &str, key: &str) -> i32 {
        let at = text.find(key).unwrap() + key.len();
        text[at..]
            .split_whitespace()
            .next()
            .unwrap()
            .parse()
            .unwrap()
    }

    #[test]
    fn test_cmyk_document_registers_all_separation() {
        let mut doc = PdfDocument::new(DocumentOptions {
            output_colorspace: DeviceColorspace::Cmyk,
            ..Default::default()
        });
        assert!(doc.all_separation_object().is_some());
        let mut page = doc.new_page();
        page.set_all_stroke_color().unwrap();
        page.finish_page().unwrap();
        let bytes = render(doc);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Separation"));
        assert!(text.contains("/All"));
    }

    #[test]
    fn test_rgb_document_has_no_all_separation() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        let mut page = doc.new_page();
        assert!(matches!(
            page.set_all_stroke_color().unwrap_err(),
            PdfError::BadResourceId
        ));
        page.finish_page().unwrap();
    }

    #[test]
    fn test_separation_tint_transform() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        let sep = doc.create_separation("Gold", CmykColor::new(0.0, 0.2, 0.6, 0.1));
        let mut page = doc.new_page();
        page.set_separation_nonstroke_color(sep, 0.8).unwrap();
        page.finish_page().unwrap();
        let bytes = render(doc);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/FunctionType 4"));
        assert!(text.contains("{ dup 0 mul exch dup 0.2 mul exch dup 0.6 mul exch 0.1 mul }"));
        assert!(text.contains("/Separation"));
        assert!(text.contains("/Gold"));
    }

    #[test]
    fn test_graphics_state_object_and_resource() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        let gs = doc.add_graphics_state(&GraphicsState {
            blend_mode: Some(crate::gstate::BlendMode::Multiply),
            ..Default::default()
        });
        let mut page = doc.new_page();
        page.cmd_gs(gs).unwrap();
        page.finish_page().unwrap();
        let bytes = render(doc);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Type /ExtGState"));
        assert!(text.contains("/BM /Multiply"));
        assert!(text.contains("/ExtGState <<"));
    }

    #[test]
    fn test_lab_and_icc_colorspaces() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        let lab = doc.add_lab_colorspace(LabColorSpace::cielab_1976_d65());
        let icc = doc.add_icc_colorspace(&[0u8; 128], 3).unwrap();
        let mut page = doc.new_page();
        page.set_lab_nonstroke_color(lab, 50.0, 10.0, -10.0).unwrap();
        page.set_icc_nonstroke_color(icc, &[0.1, 0.2, 0.3]).unwrap();
        let err = page.set_icc_nonstroke_color(icc, &[0.5]).unwrap_err();
        assert!(matches!(err, PdfError::ChannelCountMismatch { expected: 3, got: 1 }));
        page.finish_page().unwrap();
        let bytes = render(doc);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Lab"));
        assert!(text.contains("/WhitePoint [ 0.9505 1 1.089 ]"));
        assert!(text.contains("/N 3"));
    }

    #[test]
    fn test_empty_icc_profile_rejected() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        assert!(matches!(
            doc.add_icc_colorspace(&[], 3).unwrap_err(),
            PdfError::InvalidIccProfile
        ));
    }

    #[test]
    fn test_outline_objects_written() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        let page = doc.new_page().finish_page().unwrap();
        let top = doc
            .add_outline("Chapter 1", Destination::fit(page), None)
            .unwrap();
        doc.add_outline("Section 1.1", Destination::fit(page), Some(top))
            .unwrap();
        let bytes = render(doc);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Type /Outlines"));
        assert!(text.contains("/Title (Chapter 1)"));
        assert!(text.contains("/Outlines"));
    }

    #[test]
    fn test_outline_with_bad_parent_rejected() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        let page = doc.new_page().finish_page().unwrap();
        let err = doc
            .add_outline("X", Destination::fit(page), Some(OutlineId(7)))
            .unwrap_err();
        assert!(matches!(err, PdfError::BadResourceId));
    }

    #[test]
    fn test_builtin_font_object_reused() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        let a = doc.builtin_font_object(BuiltinFont::Helvetica);
        let b = doc.builtin_font_object(BuiltinFont::Helvetica);
        let c = doc.builtin_font_object(BuiltinFont::Courier);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_page_boxes_emitted() {
        let mut doc = PdfDocument::new(DocumentOptions {
            mediabox: PdfBox::new(0.0, 0.0, 200.0, 200.0),
            cropbox: Some(PdfBox::new(10.0, 10.0, 180.0, 180.0)),
            ..Default::default()
        });
        doc.new_page().finish_page().unwrap();
        let bytes = render(doc);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/MediaBox [ 0 0 200 200 ]"));
        assert!(text.contains("/CropBox [ 10 10 180 180 ]"));
    }

    #[test]
    fn test_utf16_metadata_encoding() {
        assert_eq!(pdf_utf16_string("AB"), "<FEFF00410042>");
        // Astral codepoints become surrogate pairs.
        assert_eq!(pdf_utf16_string("\u{1F600}"), "<FEFFD83DDE00>");
    }

    #[test]
    fn test_civil_from_epoch() {
        assert_eq!(civil_from_epoch(0), (1970, 1, 1, 0, 0, 0));
        // 2000-03-01 00:00:00 UTC, the day after a leap day.
        assert_eq!(civil_from_epoch(951_868_800), (2000, 3, 1, 0, 0, 0));
        // 2023-06-15 12:30:45 UTC.
        assert_eq!(civil_from_epoch(1_686_832_245), (2023, 6, 15, 12, 30, 45));
    }

    #[test]
    fn test_implicit_finalize_on_drop_adds_page() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        {
            let mut page = doc.new_page();
            page.cmd_rg(1.0, 0.0, 0.0).unwrap();
            // Dropped without finish_page: finalize must still run.
        }
        assert_eq!(doc.page_count(), 1);
        render(doc);
    }

    #[test]
    fn test_annotation_objects_referenced_from_page() {
        let mut doc = PdfDocument::new(DocumentOptions::default());
        let mut page = doc.new_page();
        page.add_text_note(PdfRect::new(10.0, 10.0, 40.0, 40.0), "note (escaped)")
            .unwrap();
        page.finish_page().unwrap();
        let bytes = render(doc);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Annots [ "));
        assert!(text.contains("/Subtype /Text"));
        assert!(text.contains("note \\(escaped\\)"));
    }
}
