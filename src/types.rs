//! Shared geometry types and the typed resource ids handed out by
//! [`PdfDocument`](crate::document::PdfDocument).
//!
//! Every resource kind gets its own id type so an image id can never be
//! passed where a font id is expected. The inner index is crate-private;
//! callers treat ids as opaque tokens.

/// A page box: origin plus width and height, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl PdfBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        PdfBox { x, y, w, h }
    }

    /// A4 portrait, the conventional default.
    pub fn a4() -> Self {
        PdfBox::new(0.0, 0.0, 595.28, 841.89)
    }
}

/// A rectangle given by two corners, used for annotations and form BBoxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl PdfRect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        PdfRect { x1, y1, x2, y2 }
    }
}

/// A point in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

macro_rules! resource_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);
    };
}

resource_id!(
    /// A page, in visual order.
    PageId
);
resource_id!(
    /// A loaded font (embedded TrueType or built-in Type1).
    FontId
);
resource_id!(
    /// A loaded raster image.
    ImageId
);
resource_id!(
    /// A named separation colorspace.
    SeparationId
);
resource_id!(
    /// A CIE Lab colorspace.
    LabId
);
resource_id!(
    /// An ICC-based colorspace.
    IccId
);
resource_id!(
    /// An ExtGState graphics-state dictionary.
    GstateId
);
resource_id!(
    /// An interpolation function usable by shadings.
    FunctionId
);
resource_id!(
    /// A shading dictionary or mesh stream.
    ShadingId
);
resource_id!(
    /// A tiling pattern.
    PatternId
);
resource_id!(
    /// A form XObject.
    FormXObjectId
);
resource_id!(
    /// A node in the document outline tree.
    OutlineId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_dimensions() {
        let b = PdfBox::a4();
        assert!((b.w - 595.28).abs() < 1e-9);
        assert!((b.h - 841.89).abs() < 1e-9);
    }

    #[test]
    fn test_ids_are_distinct_types() {
        // Ord/Hash derive allows ids to key ordered sets.
        let mut set = std::collections::BTreeSet::new();
        set.insert(ImageId(3));
        set.insert(ImageId(1));
        assert_eq!(set.iter().next(), Some(&ImageId(1)));
    }
}
