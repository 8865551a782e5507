//! # Vellum
//!
//! A write-once PDF generation library.
//!
//! Vellum builds a document incrementally: open a [`PdfDocument`], draw onto
//! page builders, register resources (images, fonts, colorspaces, shadings),
//! then close the document to stream a complete, byte-exact PDF file —
//! indirect objects, cross-reference table, and trailer included.
//!
//! ## Architecture
//!
//! ```text
//! caller draw calls
//!       ↓
//!   [content]   — per-page operator accumulation + resource tracking
//!       ↓
//!   [document]  — resource arenas, page tree, finalization order
//!       ↓
//!   [object]    — object numbering, byte offsets, xref + trailer
//! ```
//!
//! Fonts embed as TrueType subsets of at most 256 glyphs each ([`font`]),
//! colors are converted to the document's output colorspace ([`color`]), and
//! gradients cover axial, radial, Gouraud-mesh, and Coons-patch shadings
//! ([`shading`]).
//!
//! ## Example
//!
//! ```no_run
//! use vellum::{DocumentOptions, PdfDocument};
//!
//! # fn main() -> vellum::Result<()> {
//! let mut doc = PdfDocument::new(DocumentOptions::default());
//! let mut page = doc.new_page();
//! page.set_nonstroke_color(vellum::RgbColor::new(1.0, 0.0, 0.0))?;
//! page.cmd_re(10.0, 10.0, 50.0, 50.0)?;
//! page.cmd_f()?;
//! page.finish_page()?;
//! doc.write_to_file("out.pdf")?;
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod content;
pub mod document;
pub mod error;
pub mod font;
pub mod gstate;
pub mod image;
pub mod object;
pub mod outline;
pub mod shading;
pub mod types;

pub use color::{
    CmykColor, ColorConverter, DeviceColor, DeviceColorspace, GrayColor, LabColorSpace, RgbColor,
    UnitValue,
};
pub use content::{ContentBuilder, PositionedGlyph, TextRenderMode};
pub use document::{DocumentOptions, PdfDocument};
pub use error::{ErrorKind, PdfError, Result};
pub use font::BuiltinFont;
pub use gstate::{BlendMode, GraphicsState, LineCap, LineJoin, RenderingIntent};
pub use image::{PixelData, RasterImage};
pub use outline::{Annotation, Destination, DestinationKind};
pub use shading::{
    AxialShading, CoonsMesh, FunctionType2, GouraudMesh, PatchEdge, RadialShading, Shading,
    ShadingVertex, StripEdge,
};
pub use types::{
    FontId, FormXObjectId, FunctionId, GstateId, IccId, ImageId, LabId, OutlineId, PageId,
    PatternId, PdfBox, PdfRect, Point, SeparationId, ShadingId,
};
