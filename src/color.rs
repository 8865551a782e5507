//! Color values and the output-colorspace conversion policy.
//!
//! Device color components are clamped to `[0, 1]` when the value is
//! constructed — a NaN maps to 0 — so conversion and operator emission never
//! need range checks. The converter maps requested RGB colors onto the
//! document's configured output colorspace: RGB passes through, Gray is a
//! luminance reduction, CMYK is the standard device conversion. Lab, ICC,
//! and Separation colors bypass conversion entirely; they are emitted
//! through their own colorspace-selection operators.

/// A color component clamped to `[0, 1]`. NaN clamps to 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitValue(f64);

impl UnitValue {
    pub fn new(v: f64) -> Self {
        if v.is_nan() {
            UnitValue(0.0)
        } else {
            UnitValue(v.clamp(0.0, 1.0))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl From<f64> for UnitValue {
    fn from(v: f64) -> Self {
        UnitValue::new(v)
    }
}

/// An RGB color with clamped components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbColor {
    pub r: UnitValue,
    pub g: UnitValue,
    pub b: UnitValue,
}

impl RgbColor {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        RgbColor {
            r: r.into(),
            g: g.into(),
            b: b.into(),
        }
    }
}

/// A grayscale color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrayColor {
    pub v: UnitValue,
}

impl GrayColor {
    pub fn new(v: f64) -> Self {
        GrayColor { v: v.into() }
    }
}

/// A CMYK color with clamped components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CmykColor {
    pub c: UnitValue,
    pub m: UnitValue,
    pub y: UnitValue,
    pub k: UnitValue,
}

impl CmykColor {
    pub fn new(c: f64, m: f64, y: f64, k: f64) -> Self {
        CmykColor {
            c: c.into(),
            m: m.into(),
            y: y.into(),
            k: k.into(),
        }
    }
}

/// A color in one of the three device colorspaces. Used for shading mesh
/// vertices and patch corners, where the colorspace is declared once on the
/// shading dictionary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceColor {
    Rgb(RgbColor),
    Gray(GrayColor),
    Cmyk(CmykColor),
}

impl DeviceColor {
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        DeviceColor::Rgb(RgbColor::new(r, g, b))
    }

    pub fn gray(v: f64) -> Self {
        DeviceColor::Gray(GrayColor::new(v))
    }

    pub fn cmyk(c: f64, m: f64, y: f64, k: f64) -> Self {
        DeviceColor::Cmyk(CmykColor::new(c, m, y, k))
    }

    /// The components in operator order.
    pub(crate) fn components(&self) -> Vec<f64> {
        match self {
            DeviceColor::Rgb(c) => vec![c.r.get(), c.g.get(), c.b.get()],
            DeviceColor::Gray(c) => vec![c.v.get()],
            DeviceColor::Cmyk(c) => vec![c.c.get(), c.m.get(), c.y.get(), c.k.get()],
        }
    }
}

/// Parameters of a CIE Lab colorspace: white point plus a/b ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabColorSpace {
    pub xw: f64,
    pub yw: f64,
    pub zw: f64,
    pub amin: f64,
    pub amax: f64,
    pub bmin: f64,
    pub bmax: f64,
}

impl LabColorSpace {
    /// CIELAB 1976 with a D65 white point and the conventional ±128 ranges.
    pub fn cielab_1976_d65() -> Self {
        LabColorSpace {
            xw: 0.9505,
            yw: 1.0,
            zw: 1.089,
            amin: -128.0,
            amax: 127.0,
            bmin: -128.0,
            bmax: 127.0,
        }
    }
}

/// One of the three device colorspaces a document can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceColorspace {
    #[default]
    Rgb,
    Gray,
    Cmyk,
}

impl DeviceColorspace {
    /// The PDF name of this colorspace, with leading slash.
    pub fn pdf_name(self) -> &'static str {
        match self {
            DeviceColorspace::Rgb => "/DeviceRGB",
            DeviceColorspace::Gray => "/DeviceGray",
            DeviceColorspace::Cmyk => "/DeviceCMYK",
        }
    }

    pub fn num_channels(self) -> usize {
        match self {
            DeviceColorspace::Rgb => 3,
            DeviceColorspace::Gray => 1,
            DeviceColorspace::Cmyk => 4,
        }
    }
}

/// Converts requested device colors to the document's output colorspace.
///
/// Pure functions over the configured target; no other state.
#[derive(Debug, Clone, Copy)]
pub struct ColorConverter {
    output: DeviceColorspace,
}

impl ColorConverter {
    pub fn new(output: DeviceColorspace) -> Self {
        ColorConverter { output }
    }

    pub fn output_colorspace(&self) -> DeviceColorspace {
        self.output
    }

    /// Rec. 601 luminance reduction.
    pub fn to_gray(&self, c: RgbColor) -> GrayColor {
        GrayColor::new(0.299 * c.r.get() + 0.587 * c.g.get() + 0.114 * c.b.get())
    }

    /// Device RGB to CMYK: black is the complement of the brightest channel,
    /// the chromatic components are the residuals rescaled by 1/(1-k).
    pub fn to_cmyk(&self, c: RgbColor) -> CmykColor {
        let (r, g, b) = (c.r.get(), c.g.get(), c.b.get());
        let k = 1.0 - r.max(g).max(b);
        if k >= 1.0 {
            return CmykColor::new(0.0, 0.0, 0.0, 1.0);
        }
        let scale = 1.0 - k;
        CmykColor::new(
            (1.0 - r - k) / scale,
            (1.0 - g - k) / scale,
            (1.0 - b - k) / scale,
            k,
        )
    }

    /// Convert packed 8-bit RGB rows to 8-bit gray, for image embedding.
    pub fn rgb_pixels_to_gray(&self, rgb: &[u8]) -> Vec<u8> {
        debug_assert!(rgb.len() % 3 == 0);
        rgb.chunks_exact(3)
            .map(|px| {
                let v = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
                v.round().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Convert packed 8-bit RGB rows to 8-bit CMYK, for image embedding.
    pub fn rgb_pixels_to_cmyk(&self, rgb: &[u8]) -> Vec<u8> {
        debug_assert!(rgb.len() % 3 == 0);
        let mut out = Vec::with_capacity(rgb.len() / 3 * 4);
        for px in rgb.chunks_exact(3) {
            let c = self.to_cmyk(RgbColor::new(
                px[0] as f64 / 255.0,
                px[1] as f64 / 255.0,
                px[2] as f64 / 255.0,
            ));
            out.push((c.c.get() * 255.0).round() as u8);
            out.push((c.m.get() * 255.0).round() as u8);
            out.push((c.y.get() * 255.0).round() as u8);
            out.push((c.k.get() * 255.0).round() as u8);
        }
        out
    }
}
