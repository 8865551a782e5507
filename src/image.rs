//! Raster image loading.
//!
//! JPEG files pass through untouched — the PDF imaging model embeds them
//! with DCTDecode — so only the header is scanned for dimensions and the
//! component count. PNG files are decoded to packed 8-bit Gray or RGB rows
//! with the alpha channel split off into its own plane (it becomes a
//! soft-mask object), and any embedded ICC profile is carried along.

use std::io::Cursor;
use std::path::Path;

use image::ImageDecoder;

use crate::error::{PdfError, Result};

/// A decoded image ready for embedding.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub pixels: PixelData,
    /// ICC profile embedded in the source file, stored opaquely.
    pub icc_profile: Option<Vec<u8>>,
}

/// Pixel payload in a form the document can embed directly.
#[derive(Debug, Clone)]
pub enum PixelData {
    /// width × height × 3 bytes, row-major.
    Rgb8 {
        data: Vec<u8>,
        /// width × height bytes; None when fully opaque.
        alpha: Option<Vec<u8>>,
    },
    /// width × height bytes.
    Gray8 {
        data: Vec<u8>,
        alpha: Option<Vec<u8>>,
    },
    /// Raw JPEG file bytes, embedded with DCTDecode.
    Jpeg { data: Vec<u8>, gray: bool },
}

/// Load and decode an image file (PNG or JPEG).
pub fn load_image(path: &Path) -> Result<RasterImage> {
    let bytes = std::fs::read(path)?;
    decode_image_bytes(&bytes)
}

/// Detect the format from magic bytes and decode accordingly.
pub fn decode_image_bytes(data: &[u8]) -> Result<RasterImage> {
    if data.len() < 4 {
        return Err(PdfError::ImageFormat("image data too short".into()));
    }
    if is_jpeg(data) {
        decode_jpeg(data)
    } else if is_png(data) {
        decode_png(data)
    } else {
        Err(PdfError::ImageFormat(
            "unsupported image format (expected JPEG or PNG)".into(),
        ))
    }
}

fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

fn is_png(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47
}

/// JPEG: read dimensions and component count from the SOF marker without
/// decoding pixels; the file bytes embed as-is.
fn decode_jpeg(data: &[u8]) -> Result<RasterImage> {
    let (width, height, components) = scan_jpeg_frame(data)
        .ok_or_else(|| PdfError::ImageFormat("JPEG has no frame header".into()))?;
    Ok(RasterImage {
        width,
        height,
        bit_depth: 8,
        pixels: PixelData::Jpeg {
            data: data.to_vec(),
            gray: components == 1,
        },
        icc_profile: None,
    })
}

/// Walk JPEG markers to the SOF (Start of Frame) segment.
/// SOF layout: marker(2) length(2) precision(1) height(2) width(2) ncomp(1).
fn scan_jpeg_frame(data: &[u8]) -> Option<(u32, u32, u8)> {
    let mut i = 2; // skip SOI
    while i + 3 < data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof {
            if i + 9 < data.len() {
                let height = u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32;
                let width = u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32;
                return Some((width, height, data[i + 9]));
            }
            return None;
        }
        let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + seg_len;
    }
    None
}

/// PNG: decode through the image crate, split alpha, keep the ICC profile.
fn decode_png(data: &[u8]) -> Result<RasterImage> {
    let mut decoder = image::codecs::png::PngDecoder::new(Cursor::new(data))
        .map_err(|e| PdfError::ImageFormat(format!("failed to parse PNG: {}", e)))?;
    let icc_profile = decoder.icc_profile();
    let img = image::DynamicImage::from_decoder(decoder)
        .map_err(|e| PdfError::ImageFormat(format!("failed to decode PNG: {}", e)))?;

    let (width, height) = (img.width(), img.height());
    let pixels = match img {
        image::DynamicImage::ImageLuma8(gray) => PixelData::Gray8 {
            data: gray.into_raw(),
            alpha: None,
        },
        image::DynamicImage::ImageLumaA8(gray) => {
            let raw = gray.into_raw();
            let mut data = Vec::with_capacity(raw.len() / 2);
            let mut alpha = Vec::with_capacity(raw.len() / 2);
            let mut has_transparency = false;
            for px in raw.chunks_exact(2) {
                data.push(px[0]);
                alpha.push(px[1]);
                if px[1] != 255 {
                    has_transparency = true;
                }
            }
            PixelData::Gray8 {
                data,
                alpha: if has_transparency { Some(alpha) } else { None },
            }
        }
        other => {
            let rgba = other.to_rgba8();
            let mut rgb = Vec::with_capacity((width * height * 3) as usize);
            let mut alpha = Vec::with_capacity((width * height) as usize);
            let mut has_transparency = false;
            for px in rgba.pixels() {
                rgb.push(px[0]);
                rgb.push(px[1]);
                rgb.push(px[2]);
                alpha.push(px[3]);
                if px[3] != 255 {
                    has_transparency = true;
                }
            }
            PixelData::Rgb8 {
                data: rgb,
                alpha: if has_transparency { Some(alpha) } else { None },
            }
        }
    };

    Ok(RasterImage {
        width,
        height,
        bit_depth: 8,
        pixels,
        icc_profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png_rgba(pixels: &[[u8; 4]], w: u32, h: u32) -> Vec<u8> {
        let mut img = image::RgbaImage::new(w, h);
        for (i, px) in pixels.iter().enumerate() {
            img.put_pixel(i as u32 % w, i as u32 / w, image::Rgba(*px));
        }
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), w, h, image::ColorType::Rgba8)
            .unwrap();
        buf
    }

    #[test]
    fn test_magic_sniffing() {
        assert!(is_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(!is_jpeg(&[0x89, 0x50, 0x4E, 0x47]));
        assert!(is_png(&[0x89, 0x50, 0x4E, 0x47]));
        assert!(!is_png(&[0xFF, 0xD8]));
    }

    #[test]
    fn test_short_and_unknown_data_rejected() {
        assert!(decode_image_bytes(&[0x00, 0x01]).is_err());
        assert!(decode_image_bytes(&[0x00, 0x01, 0x02, 0x03, 0x04]).is_err());
    }

    #[test]
    fn test_opaque_png_has_no_alpha_plane() {
        let buf = encode_png_rgba(&[[255, 0, 0, 255]], 1, 1);
        let img = decode_image_bytes(&buf).unwrap();
        assert_eq!((img.width, img.height), (1, 1));
        match img.pixels {
            PixelData::Rgb8 { data, alpha } => {
                assert_eq!(data, vec![255, 0, 0]);
                assert!(alpha.is_none());
            }
            _ => panic!("expected RGB pixels"),
        }
    }

    #[test]
    fn test_translucent_png_splits_alpha() {
        let buf = encode_png_rgba(&[[0, 255, 0, 128]], 1, 1);
        let img = decode_image_bytes(&buf).unwrap();
        match img.pixels {
            PixelData::Rgb8 { data, alpha } => {
                assert_eq!(data, vec![0, 255, 0]);
                assert_eq!(alpha.unwrap(), vec![128]);
            }
            _ => panic!("expected RGB pixels"),
        }
    }

    #[test]
    fn test_jpeg_passthrough() {
        let img = image::RgbImage::from_fn(2, 2, |_, _| image::Rgb([0, 128, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 2, 2, image::ColorType::Rgb8)
            .unwrap();

        let loaded = decode_image_bytes(&buf).unwrap();
        assert_eq!((loaded.width, loaded.height), (2, 2));
        match loaded.pixels {
            PixelData::Jpeg { data, gray } => {
                assert!(data.starts_with(&[0xFF, 0xD8]));
                assert!(!gray);
            }
            _ => panic!("JPEG should stay as Jpeg variant"),
        }
    }

    #[test]
    fn test_gray_jpeg_detected() {
        let img = image::GrayImage::from_fn(2, 2, |_, _| image::Luma([90]));
        let mut buf = Vec::new();
        let encoder = image::codecs::jpeg::JpegEncoder::new(&mut buf);
        image::ImageEncoder::write_image(encoder, img.as_raw(), 2, 2, image::ColorType::L8)
            .unwrap();
        let loaded = decode_image_bytes(&buf).unwrap();
        match loaded.pixels {
            PixelData::Jpeg { gray, .. } => assert!(gray),
            _ => panic!("expected Jpeg variant"),
        }
    }
}
