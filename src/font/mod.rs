//! Font management: donor TrueType fonts, the built-in Type1 faces, and the
//! subset assignment engine.
//!
//! Embedded fonts are split into subsets of at most 256 codepoints so every
//! glyph is addressable by a single text byte. Assignment is greedy and
//! append-only: a codepoint keeps its `(subset, local id)` forever, and a new
//! subset opens only when the current one is full. Materializing a subset
//! into an embeddable font program lives in [`subset`].

pub mod subset;

use std::collections::HashMap;

use crate::error::{PdfError, Result};

/// Hard upper bound on text-addressable glyphs per subset: local glyph ids
/// are single bytes.
pub const MAX_SUBSET_GLYPHS: usize = 256;

/// The nine built-in Type1 faces that never need embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFont {
    TimesRoman,
    Helvetica,
    Courier,
    TimesBold,
    HelveticaBold,
    CourierBold,
    TimesItalic,
    HelveticaOblique,
    CourierOblique,
}

impl BuiltinFont {
    /// The PDF BaseFont name.
    pub fn pdf_name(self) -> &'static str {
        match self {
            BuiltinFont::TimesRoman => "Times-Roman",
            BuiltinFont::Helvetica => "Helvetica",
            BuiltinFont::Courier => "Courier",
            BuiltinFont::TimesBold => "Times-Bold",
            BuiltinFont::HelveticaBold => "Helvetica-Bold",
            BuiltinFont::CourierBold => "Courier-Bold",
            BuiltinFont::TimesItalic => "Times-Italic",
            BuiltinFont::HelveticaOblique => "Helvetica-Oblique",
            BuiltinFont::CourierOblique => "Courier-Oblique",
        }
    }
}

/// Metrics sampled from a donor font at load time, so later lookups never
/// need to re-parse the file.
#[derive(Debug, Clone)]
pub(crate) struct FontMetrics {
    pub units_per_em: u16,
    pub ascender: i16,
    pub descender: i16,
    pub cap_height: i16,
    pub bbox: [i16; 4],
    pub postscript_name: String,
    /// Unicode codepoint to glyph id in the donor font.
    pub glyph_ids: HashMap<char, u16>,
    /// Advance widths in font units, keyed by codepoint.
    pub advances: HashMap<char, u16>,
}

impl FontMetrics {
    pub fn from_font_data(data: &[u8]) -> Result<Self> {
        let face = ttf_parser::Face::parse(data, 0)
            .map_err(|e| PdfError::FontFormat(format!("failed to parse font: {}", e)))?;
        if face.tables().glyf.is_none() {
            return Err(PdfError::FontFormat(
                "only TrueType outline fonts are supported".into(),
            ));
        }

        let mut glyph_ids = HashMap::new();
        let mut advances = HashMap::new();
        // Sample the Basic Multilingual Plane once up front.
        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(gid) = face.glyph_index(ch) {
                    glyph_ids.insert(ch, gid.0);
                    advances.insert(ch, face.glyph_hor_advance(gid).unwrap_or(0));
                }
            }
        }

        let postscript_name = face
            .names()
            .into_iter()
            .find(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .and_then(|n| n.to_string())
            .or_else(|| {
                face.names()
                    .into_iter()
                    .find(|n| n.name_id == ttf_parser::name_id::FULL_NAME)
                    .and_then(|n| n.to_string())
            })
            .unwrap_or_else(|| "Embedded".to_string());

        let bbox = face.global_bounding_box();
        Ok(FontMetrics {
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            cap_height: face.capital_height().unwrap_or_else(|| face.ascender()),
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
            postscript_name,
            glyph_ids,
            advances,
        })
    }

    /// Advance width of a codepoint in points at the given size.
    pub fn advance(&self, ch: char, point_size: f64) -> Option<f64> {
        let adv = *self.advances.get(&ch)?;
        Some(adv as f64 / self.units_per_em as f64 * point_size)
    }
}

/// Where a codepoint ended up: which subset, and which byte within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubsetGlyph {
    pub subset: usize,
    pub glyph_id: u8,
}

/// Result of a subset assignment, flagging when a fresh subset was opened so
/// the document can allocate its deferred objects.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SubsetAssignment {
    pub glyph: SubsetGlyph,
    pub opened_subset: bool,
}

/// One subset: codepoints in assignment order plus a reverse index.
#[derive(Debug, Clone, Default)]
pub(crate) struct Subset {
    codepoints: Vec<char>,
    index: HashMap<char, u8>,
}

impl Subset {
    pub fn len(&self) -> usize {
        self.codepoints.len()
    }

    pub fn codepoints(&self) -> &[char] {
        &self.codepoints
    }
}

/// Greedy, append-only partitioning of codepoints into bounded subsets.
#[derive(Debug, Clone, Default)]
pub(crate) struct FontSubsetter {
    subsets: Vec<Subset>,
}

impl FontSubsetter {
    pub fn new() -> Self {
        FontSubsetter::default()
    }

    /// Return the stable assignment for a codepoint, creating it on first
    /// sight. Never remaps: repeated lookups always agree.
    pub fn get_or_assign(&mut self, ch: char) -> SubsetAssignment {
        if let Some(found) = self.find(ch) {
            return SubsetAssignment {
                glyph: found,
                opened_subset: false,
            };
        }

        let needs_new = match self.subsets.last() {
            Some(open) => open.len() >= MAX_SUBSET_GLYPHS,
            None => true,
        };
        if needs_new {
            self.subsets.push(Subset::default());
        }

        let subset_idx = self.subsets.len() - 1;
        let open = &mut self.subsets[subset_idx];
        let local = open.len() as u8;
        open.codepoints.push(ch);
        open.index.insert(ch, local);
        SubsetAssignment {
            glyph: SubsetGlyph {
                subset: subset_idx,
                glyph_id: local,
            },
            opened_subset: needs_new,
        }
    }

    fn find(&self, ch: char) -> Option<SubsetGlyph> {
        for (i, subset) in self.subsets.iter().enumerate() {
            if let Some(&local) = subset.index.get(&ch) {
                return Some(SubsetGlyph {
                    subset: i,
                    glyph_id: local,
                });
            }
        }
        None
    }

    pub fn subsets(&self) -> &[Subset] {
        &self.subsets
    }
}

/// The four PDF objects every subset embeds as, allocated when the subset is
/// opened and filled in during the write pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SubsetObjects {
    pub data_obj: i32,
    pub descriptor_obj: i32,
    pub cmap_obj: i32,
    pub font_obj: i32,
}

/// An embedded donor font with its subsets.
#[derive(Debug)]
pub(crate) struct EmbeddedFont {
    pub data: Vec<u8>,
    pub metrics: FontMetrics,
    pub subsetter: FontSubsetter,
    pub subset_objects: Vec<SubsetObjects>,
}

/// `/BaseFont` name for a subset: six uppercase letters encoding the subset
/// number, a plus sign, then the donor name stripped of characters that are
/// not valid in a PDF name.
pub(crate) fn subset_font_name(ps_name: &str, subset: usize) -> String {
    let mut out = String::with_capacity(ps_name.len() + 7);
    for digit in format!("{:06}", subset).bytes() {
        out.push((b'A' + (digit - b'0')) as char);
    }
    out.push('+');
    out.extend(ps_name.chars().filter(|c| *c != ' ' && *c != '\\'));
    out
}

/// Horizontal kerning between two glyphs in font units, from the donor's
/// kern table. Zero when the font carries none.
pub(crate) fn glyph_kerning(
    face: &ttf_parser::Face,
    left: ttf_parser::GlyphId,
    right: ttf_parser::GlyphId,
) -> i16 {
    let Some(kern) = face.tables().kern else {
        return 0;
    };
    for table in kern.subtables {
        if !table.horizontal || table.variable {
            continue;
        }
        if let Some(adj) = table.glyphs_kerning(left, right) {
            return adj;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_is_stable() {
        let mut ss = FontSubsetter::new();
        let first = ss.get_or_assign('A');
        assert!(first.opened_subset);
        assert_eq!(first.glyph, SubsetGlyph { subset: 0, glyph_id: 0 });
        let again = ss.get_or_assign('A');
        assert!(!again.opened_subset);
        assert_eq!(again.glyph, first.glyph);
        let second = ss.get_or_assign('B');
        assert_eq!(second.glyph, SubsetGlyph { subset: 0, glyph_id: 1 });
    }

    #[test]
    fn test_rollover_at_capacity() {
        let mut ss = FontSubsetter::new();
        for i in 0..MAX_SUBSET_GLYPHS {
            let a = ss.get_or_assign(char::from_u32(0x4E00 + i as u32).unwrap());
            assert_eq!(a.glyph.subset, 0);
            assert_eq!(a.glyph.glyph_id, i as u8);
        }
        // The 257th distinct codepoint opens subset 1 at local id 0.
        let next = ss.get_or_assign('Z');
        assert!(next.opened_subset);
        assert_eq!(next.glyph, SubsetGlyph { subset: 1, glyph_id: 0 });
        assert_eq!(ss.subsets()[0].len(), MAX_SUBSET_GLYPHS);
        assert_eq!(ss.subsets()[1].len(), 1);
    }

    #[test]
    fn test_earlier_subsets_stay_closed() {
        let mut ss = FontSubsetter::new();
        for i in 0..MAX_SUBSET_GLYPHS + 1 {
            ss.get_or_assign(char::from_u32(0x4E00 + i as u32).unwrap());
        }
        // A codepoint from the closed subset resolves there, a new one goes
        // to the open subset.
        let old = ss.get_or_assign('\u{4E00}');
        assert_eq!(old.glyph.subset, 0);
        let fresh = ss.get_or_assign('Q');
        assert_eq!(fresh.glyph.subset, 1);
        assert_eq!(fresh.glyph.glyph_id, 1);
    }

    #[test]
    fn test_subset_font_name_encoding() {
        assert_eq!(subset_font_name("Foo Bar", 0), "AAAAAA+FooBar");
        assert_eq!(subset_font_name("Foo", 1), "AAAAAB+Foo");
        assert_eq!(subset_font_name("Foo", 123), "AAABCD+Foo");
    }

    #[test]
    fn test_builtin_names() {
        assert_eq!(BuiltinFont::Helvetica.pdf_name(), "Helvetica");
        assert_eq!(BuiltinFont::TimesBold.pdf_name(), "Times-Bold");
    }

    #[test]
    fn test_bad_font_data_is_a_format_error() {
        let err = FontMetrics::from_font_data(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, PdfError::FontFormat(_)));
    }
}
