//! Shading dictionaries and mesh geometry.
//!
//! Axial (type 2) and radial (type 3) shadings are plain dictionaries over a
//! sampled interpolation function. Free-form Gouraud meshes (type 4) are
//! built incrementally as triangle strips; Coons patch meshes (type 6) as a
//! sequence of full patches and continuation patches that share one edge and
//! two corner colors with their predecessor. Mesh data is packed binary:
//! 8-bit flags, 32-bit coordinates scaled into the /Decode range, 16-bit
//! color components.

use std::fmt::Write;

use crate::color::{DeviceColor, DeviceColorspace};
use crate::error::{PdfError, Result};
use crate::types::{FunctionId, Point};

/// An exponential interpolation function (FunctionType 2), the ramp behind
/// axial and radial shadings.
#[derive(Debug, Clone)]
pub struct FunctionType2 {
    pub domain: [f64; 2],
    pub c0: Vec<f64>,
    pub c1: Vec<f64>,
    pub n: f64,
}

impl FunctionType2 {
    pub(crate) fn to_dict(&self) -> String {
        let mut buf = String::from("<<\n  /FunctionType 2\n");
        let _ = write!(buf, "  /N {}\n", self.n);
        let _ = write!(buf, "  /Domain [ {} {} ]\n", self.domain[0], self.domain[1]);
        buf.push_str("  /C0 [ ");
        for v in &self.c0 {
            let _ = write!(buf, "{} ", v);
        }
        buf.push_str("]\n  /C1 [ ");
        for v in &self.c1 {
            let _ = write!(buf, "{} ", v);
        }
        buf.push_str("]\n>>\n");
        buf
    }
}

/// A linear gradient between two points.
#[derive(Debug, Clone)]
pub struct AxialShading {
    pub colorspace: DeviceColorspace,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub function: FunctionId,
    pub extend0: bool,
    pub extend1: bool,
}

impl AxialShading {
    pub(crate) fn to_dict(&self, function_obj: i32) -> String {
        format!(
            "<<\n  /ShadingType 2\n  /ColorSpace {}\n  /Coords [ {} {} {} {} ]\n  /Function {} 0 R\n  /Extend [ {} {} ]\n>>\n",
            self.colorspace.pdf_name(),
            self.x0,
            self.y0,
            self.x1,
            self.y1,
            function_obj,
            self.extend0,
            self.extend1
        )
    }
}

/// A radial gradient between two circles.
#[derive(Debug, Clone)]
pub struct RadialShading {
    pub colorspace: DeviceColorspace,
    pub x0: f64,
    pub y0: f64,
    pub r0: f64,
    pub x1: f64,
    pub y1: f64,
    pub r1: f64,
    pub function: FunctionId,
    pub extend0: bool,
    pub extend1: bool,
}

impl RadialShading {
    pub(crate) fn to_dict(&self, function_obj: i32) -> String {
        format!(
            "<<\n  /ShadingType 3\n  /ColorSpace {}\n  /Coords [ {} {} {} {} {} {} ]\n  /Function {} 0 R\n  /Extend [ {} {} ]\n>>\n",
            self.colorspace.pdf_name(),
            self.x0,
            self.y0,
            self.r0,
            self.x1,
            self.y1,
            self.r1,
            function_obj,
            self.extend0,
            self.extend1
        )
    }
}

/// Which edge of the previous triangle a strip continuation shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripEdge {
    /// Share vertices b and c of the previous triangle.
    SharedBc = 1,
    /// Share vertices a and c of the previous triangle.
    SharedAc = 2,
}

/// One mesh vertex: a point with its color.
#[derive(Debug, Clone, Copy)]
pub struct ShadingVertex {
    pub p: Point,
    pub c: DeviceColor,
}

impl ShadingVertex {
    pub fn new(p: Point, c: DeviceColor) -> Self {
        ShadingVertex { p, c }
    }
}

/// A free-form Gouraud triangle mesh (shading type 4), built as strips.
#[derive(Debug, Clone)]
pub struct GouraudMesh {
    pub colorspace: DeviceColorspace,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    elements: Vec<(u8, ShadingVertex)>,
}

impl GouraudMesh {
    /// The bounding box must cover every vertex; coordinates are scaled into
    /// it when the mesh stream is encoded.
    pub fn new(colorspace: DeviceColorspace, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        GouraudMesh {
            colorspace,
            min_x,
            min_y,
            max_x,
            max_y,
            elements: Vec::new(),
        }
    }

    /// Begin a new triangle strip with three independent vertices.
    pub fn start_strip(&mut self, v0: ShadingVertex, v1: ShadingVertex, v2: ShadingVertex) {
        self.elements.push((0, v0));
        self.elements.push((0, v1));
        self.elements.push((0, v2));
    }

    /// Extend the current strip by one vertex, sharing an edge of the
    /// previous triangle.
    pub fn extend_strip(&mut self, v: ShadingVertex, edge: StripEdge) {
        self.elements.push((edge as u8, v));
    }

    pub(crate) fn to_object(&self) -> Result<(String, Vec<u8>)> {
        let ncomp = self.colorspace.num_channels();
        let mut stream = Vec::new();
        for (flag, v) in &self.elements {
            stream.push(*flag);
            push_coord(&mut stream, v.p.x, self.min_x, self.max_x);
            push_coord(&mut stream, v.p.y, self.min_y, self.max_y);
            push_components(&mut stream, &v.c, ncomp)?;
        }
        Ok((self.mesh_dict(4, stream.len()), stream))
    }

    fn mesh_dict(&self, shading_type: i32, length: usize) -> String {
        mesh_dict(
            shading_type,
            self.colorspace,
            self.min_x,
            self.max_x,
            self.min_y,
            self.max_y,
            length,
        )
    }
}

/// Which edge of the previous Coons patch a continuation attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchEdge {
    Right = 1,
    Top = 2,
    Left = 3,
}

#[derive(Debug, Clone)]
enum CoonsPatch {
    Full {
        points: [Point; 12],
        colors: [DeviceColor; 4],
    },
    Continuation {
        edge: PatchEdge,
        points: [Point; 8],
        colors: [DeviceColor; 2],
    },
}

/// A Coons patch mesh (shading type 6).
#[derive(Debug, Clone)]
pub struct CoonsMesh {
    pub colorspace: DeviceColorspace,
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    patches: Vec<CoonsPatch>,
}

impl CoonsMesh {
    pub fn new(colorspace: DeviceColorspace, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        CoonsMesh {
            colorspace,
            min_x,
            min_y,
            max_x,
            max_y,
            patches: Vec::new(),
        }
    }

    /// Add a full patch: 12 boundary control points and 4 corner colors.
    pub fn add_patch(&mut self, points: [Point; 12], colors: [DeviceColor; 4]) {
        self.patches.push(CoonsPatch::Full { points, colors });
    }

    /// Add a continuation patch sharing one edge and two corner colors with
    /// the previous patch: 8 new points and 2 new colors.
    pub fn add_continuation(
        &mut self,
        edge: PatchEdge,
        points: [Point; 8],
        colors: [DeviceColor; 2],
    ) -> Result<()> {
        if self.patches.is_empty() {
            return Err(PdfError::DanglingContinuation);
        }
        self.patches.push(CoonsPatch::Continuation {
            edge,
            points,
            colors,
        });
        Ok(())
    }

    pub(crate) fn to_object(&self) -> Result<(String, Vec<u8>)> {
        let ncomp = self.colorspace.num_channels();
        let mut stream = Vec::new();
        for patch in &self.patches {
            match patch {
                CoonsPatch::Full { points, colors } => {
                    stream.push(0);
                    for p in points {
                        push_coord(&mut stream, p.x, self.min_x, self.max_x);
                        push_coord(&mut stream, p.y, self.min_y, self.max_y);
                    }
                    for c in colors {
                        push_components(&mut stream, c, ncomp)?;
                    }
                }
                CoonsPatch::Continuation { edge, points, colors } => {
                    stream.push(*edge as u8);
                    for p in points {
                        push_coord(&mut stream, p.x, self.min_x, self.max_x);
                        push_coord(&mut stream, p.y, self.min_y, self.max_y);
                    }
                    for c in colors {
                        push_components(&mut stream, c, ncomp)?;
                    }
                }
            }
        }
        Ok((
            mesh_dict(
                6,
                self.colorspace,
                self.min_x,
                self.max_x,
                self.min_y,
                self.max_y,
                stream.len(),
            ),
            stream,
        ))
    }
}

/// The shading variants accepted by
/// [`PdfDocument::add_shading`](crate::document::PdfDocument::add_shading).
#[derive(Debug, Clone)]
pub enum Shading {
    Axial(AxialShading),
    Radial(RadialShading),
    FreeForm(GouraudMesh),
    Coons(CoonsMesh),
}

fn mesh_dict(
    shading_type: i32,
    colorspace: DeviceColorspace,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
    length: usize,
) -> String {
    let mut buf = String::new();
    let _ = write!(
        buf,
        "<<\n  /ShadingType {}\n  /ColorSpace {}\n  /BitsPerCoordinate 32\n  /BitsPerComponent 16\n  /BitsPerFlag 8\n  /Decode [ {} {} {} {}",
        shading_type,
        colorspace.pdf_name(),
        min_x,
        max_x,
        min_y,
        max_y
    );
    for _ in 0..colorspace.num_channels() {
        buf.push_str(" 0 1");
    }
    let _ = write!(buf, " ]\n  /Length {}\n>>\n", length);
    buf
}

/// Scale a coordinate into the decode range and append it big-endian.
fn push_coord(out: &mut Vec<u8>, v: f64, min: f64, max: f64) {
    let scaled = if max > min {
        ((v - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let q = (scaled * u32::MAX as f64).round() as u32;
    out.extend_from_slice(&q.to_be_bytes());
}

fn push_components(out: &mut Vec<u8>, c: &DeviceColor, expected: usize) -> Result<()> {
    let comps = c.components();
    if comps.len() != expected {
        return Err(PdfError::ChannelCountMismatch {
            expected,
            got: comps.len(),
        });
    }
    for v in comps {
        let q = (v * u16::MAX as f64).round() as u16;
        out.extend_from_slice(&q.to_be_bytes());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_vertex(x: f64, y: f64) -> ShadingVertex {
        ShadingVertex::new(Point::new(x, y), DeviceColor::rgb(1.0, 0.0, 0.0))
    }

    #[test]
    fn test_function_dict() {
        let f = FunctionType2 {
            domain: [0.0, 1.0],
            c0: vec![0.0, 0.0, 1.0],
            c1: vec![1.0, 0.0, 0.0],
            n: 1.0,
        };
        let dict = f.to_dict();
        assert!(dict.contains("/FunctionType 2"));
        assert!(dict.contains("/C0 [ 0 0 1 ]"));
        assert!(dict.contains("/C1 [ 1 0 0 ]"));
    }

    #[test]
    fn test_axial_dict() {
        let sh = AxialShading {
            colorspace: DeviceColorspace::Rgb,
            x0: 0.0,
            y0: 0.0,
            x1: 100.0,
            y1: 100.0,
            function: FunctionId(0),
            extend0: true,
            extend1: false,
        };
        let dict = sh.to_dict(7);
        assert!(dict.contains("/ShadingType 2"));
        assert!(dict.contains("/Coords [ 0 0 100 100 ]"));
        assert!(dict.contains("/Function 7 0 R"));
        assert!(dict.contains("/Extend [ true false ]"));
    }

    #[test]
    fn test_gouraud_record_layout() {
        let mut mesh = GouraudMesh::new(DeviceColorspace::Rgb, 0.0, 0.0, 100.0, 100.0);
        mesh.start_strip(rgb_vertex(0.0, 0.0), rgb_vertex(100.0, 0.0), rgb_vertex(50.0, 100.0));
        mesh.extend_strip(rgb_vertex(100.0, 100.0), StripEdge::SharedBc);
        let (dict, stream) = mesh.to_object().unwrap();
        // Each vertex record: 1 flag + 2*4 coord + 3*2 color = 15 bytes.
        assert_eq!(stream.len(), 4 * 15);
        assert_eq!(stream[0], 0);
        assert_eq!(stream[3 * 15], 1);
        assert!(dict.contains("/ShadingType 4"));
        assert!(dict.contains("/Decode [ 0 100 0 100 0 1 0 1 0 1 ]"));
    }

    #[test]
    fn test_coons_full_plus_continuation_record_sizes() {
        let mut mesh = CoonsMesh::new(DeviceColorspace::Rgb, 0.0, 0.0, 200.0, 200.0);
        let pts12 = [Point::new(0.0, 0.0); 12];
        let cols4 = [DeviceColor::rgb(0.0, 0.0, 0.0); 4];
        mesh.add_patch(pts12, cols4);
        mesh.add_continuation(
            PatchEdge::Right,
            [Point::new(10.0, 10.0); 8],
            [DeviceColor::rgb(1.0, 1.0, 1.0); 2],
        )
        .unwrap();
        let (_, stream) = mesh.to_object().unwrap();
        // Full patch: 1 + 12*8 + 4*6 = 121 bytes.
        // Continuation: 1 + 8*8 + 2*6 = 77 bytes, flag first.
        assert_eq!(stream.len(), 121 + 77);
        assert_eq!(stream[0], 0);
        assert_eq!(stream[121], PatchEdge::Right as u8);
    }

    #[test]
    fn test_continuation_without_patch_is_rejected() {
        let mut mesh = CoonsMesh::new(DeviceColorspace::Rgb, 0.0, 0.0, 1.0, 1.0);
        let err = mesh
            .add_continuation(
                PatchEdge::Top,
                [Point::new(0.0, 0.0); 8],
                [DeviceColor::gray(0.0); 2],
            )
            .unwrap_err();
        assert!(matches!(err, PdfError::DanglingContinuation));
    }

    #[test]
    fn test_channel_mismatch_is_rejected() {
        let mut mesh = GouraudMesh::new(DeviceColorspace::Cmyk, 0.0, 0.0, 1.0, 1.0);
        mesh.start_strip(rgb_vertex(0.0, 0.0), rgb_vertex(1.0, 0.0), rgb_vertex(0.0, 1.0));
        let err = mesh.to_object().unwrap_err();
        assert!(matches!(
            err,
            PdfError::ChannelCountMismatch { expected: 4, got: 3 }
        ));
    }

    #[test]
    fn test_coordinate_scaling() {
        let mut out = Vec::new();
        push_coord(&mut out, 0.0, 0.0, 100.0);
        push_coord(&mut out, 100.0, 0.0, 100.0);
        push_coord(&mut out, 50.0, 0.0, 100.0);
        assert_eq!(&out[0..4], &[0, 0, 0, 0]);
        assert_eq!(&out[4..8], &[0xFF, 0xFF, 0xFF, 0xFF]);
        let mid = u32::from_be_bytes([out[8], out[9], out[10], out[11]]);
        assert!((mid as f64 / u32::MAX as f64 - 0.5).abs() < 1e-6);
    }
}
