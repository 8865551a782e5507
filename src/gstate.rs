//! ExtGState parameter dictionaries and the fixed PDF name tables.
//!
//! A [`GraphicsState`] is a sparse set of optional fields; only fields that
//! are set produce dictionary entries. Field names and ordering follow the
//! ExtGState parameter table of the PDF specification.

use std::fmt::Write;

use crate::color::UnitValue;

/// Blend mode names, in PDF enumeration order.
pub const BLEND_MODE_NAMES: [&str; 16] = [
    "Normal",
    "Multiply",
    "Screen",
    "Overlay",
    "Darken",
    "Lighten",
    "ColorDodge",
    "ColorBurn",
    "HardLight",
    "SoftLight",
    "Difference",
    "Exclusion",
    "Hue",
    "Saturation",
    "Color",
    "Luminosity",
];

/// Rendering intent names, in PDF enumeration order.
pub const RENDERING_INTENT_NAMES: [&str; 4] = [
    "RelativeColorimetric",
    "AbsoluteColorimetric",
    "Saturation",
    "Perceptual",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt = 0,
    Round = 1,
    ProjectingSquare = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter = 0,
    Round = 1,
    Bevel = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Normal = 0,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    pub fn pdf_name(self) -> &'static str {
        BLEND_MODE_NAMES[self as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingIntent {
    RelativeColorimetric = 0,
    AbsoluteColorimetric,
    Saturation,
    Perceptual,
}

impl RenderingIntent {
    pub fn pdf_name(self) -> &'static str {
        RENDERING_INTENT_NAMES[self as usize]
    }
}

/// A sparse ExtGState parameter set. Named and ordered according to the
/// graphics state parameter dictionary, PDF 2.0 section 8.4.5.
#[derive(Debug, Clone, Default)]
pub struct GraphicsState {
    pub line_width: Option<f64>,
    pub line_cap: Option<LineCap>,
    pub line_join: Option<LineJoin>,
    pub miter_limit: Option<f64>,
    pub rendering_intent: Option<RenderingIntent>,
    pub stroke_overprint: Option<bool>,
    pub fill_overprint: Option<bool>,
    pub overprint_mode: Option<i32>,
    pub flatness: Option<f64>,
    pub smoothness: Option<f64>,
    pub stroke_adjustment: Option<bool>,
    pub blend_mode: Option<BlendMode>,
    pub stroke_alpha: Option<UnitValue>,
    pub fill_alpha: Option<UnitValue>,
    pub alpha_is_shape: Option<bool>,
    pub text_knockout: Option<bool>,
}

impl GraphicsState {
    pub fn new() -> Self {
        GraphicsState::default()
    }

    /// Serialize to an ExtGState dictionary; one entry per set field.
    pub(crate) fn to_dict(&self) -> String {
        let mut buf = String::from("<<\n  /Type /ExtGState\n");
        if let Some(v) = self.line_width {
            let _ = write!(buf, "  /LW {}\n", v);
        }
        if let Some(v) = self.line_cap {
            let _ = write!(buf, "  /LC {}\n", v as i32);
        }
        if let Some(v) = self.line_join {
            let _ = write!(buf, "  /LJ {}\n", v as i32);
        }
        if let Some(v) = self.miter_limit {
            let _ = write!(buf, "  /ML {}\n", v);
        }
        if let Some(v) = self.rendering_intent {
            let _ = write!(buf, "  /RI /{}\n", v.pdf_name());
        }
        if let Some(v) = self.stroke_overprint {
            let _ = write!(buf, "  /OP {}\n", v);
        }
        if let Some(v) = self.fill_overprint {
            let _ = write!(buf, "  /op {}\n", v);
        }
        if let Some(v) = self.overprint_mode {
            let _ = write!(buf, "  /OPM {}\n", v);
        }
        if let Some(v) = self.flatness {
            let _ = write!(buf, "  /FL {}\n", v);
        }
        if let Some(v) = self.smoothness {
            let _ = write!(buf, "  /SM {}\n", v);
        }
        if let Some(v) = self.stroke_adjustment {
            let _ = write!(buf, "  /SA {}\n", v);
        }
        if let Some(v) = self.blend_mode {
            let _ = write!(buf, "  /BM /{}\n", v.pdf_name());
        }
        if let Some(v) = self.stroke_alpha {
            let _ = write!(buf, "  /CA {}\n", v.get());
        }
        if let Some(v) = self.fill_alpha {
            let _ = write!(buf, "  /ca {}\n", v.get());
        }
        if let Some(v) = self.alpha_is_shape {
            let _ = write!(buf, "  /AIS {}\n", v);
        }
        if let Some(v) = self.text_knockout {
            let _ = write!(buf, "  /TK {}\n", v);
        }
        buf.push_str(">>\n");
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state_has_only_type() {
        let dict = GraphicsState::new().to_dict();
        assert_eq!(dict, "<<\n  /Type /ExtGState\n>>\n");
    }

    #[test]
    fn test_set_fields_become_entries() {
        let gs = GraphicsState {
            blend_mode: Some(BlendMode::Multiply),
            rendering_intent: Some(RenderingIntent::Perceptual),
            fill_alpha: Some(UnitValue::new(0.5)),
            ..Default::default()
        };
        let dict = gs.to_dict();
        assert!(dict.contains("/BM /Multiply"));
        assert!(dict.contains("/RI /Perceptual"));
        assert!(dict.contains("/ca 0.5"));
        assert!(!dict.contains("/LW"));
    }

    #[test]
    fn test_alpha_is_clamped() {
        let gs = GraphicsState {
            stroke_alpha: Some(UnitValue::new(7.0)),
            ..Default::default()
        };
        assert!(gs.to_dict().contains("/CA 1"));
    }

    #[test]
    fn test_name_tables() {
        assert_eq!(BlendMode::Luminosity.pdf_name(), "Luminosity");
        assert_eq!(
            RenderingIntent::AbsoluteColorimetric.pdf_name(),
            "AbsoluteColorimetric"
        );
        assert_eq!(BLEND_MODE_NAMES.len(), 16);
    }
}
