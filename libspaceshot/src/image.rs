//! The pixel-data model shared by capture, cropping, drawing and PNG
//! encoding (spec.md §3 "Image").

use crate::error::{Error, Result};
use wayland_client::protocol::wl_shm;

/// A pixel format an [`Image`] can hold.
///
/// `Xrgb2101010`/`Xbgr2101010` pack three 10-bit channels plus 2 padding bits
/// into a little-endian `u32`, following the layouts of the matching
/// `wl_shm` formats: `Xrgb2101010` is `x:R:G:B` (R in the high bits),
/// `Xbgr2101010` is `x:B:G:R` (B in the high bits).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelFormat {
    Xrgb8888,
    Argb8888,
    Xrgb2101010,
    Xbgr2101010,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Gray8 => 1,
            _ => 4,
        }
    }

    /// Whether color channels are stored in BGR (as opposed to RGB) byte/bit
    /// order. Consulted whenever a color literal, written in RGB, is drawn
    /// onto a surface of this format (spec.md §3).
    pub fn is_flipped(self) -> bool {
        matches!(self, PixelFormat::Xrgb8888 | PixelFormat::Argb8888 | PixelFormat::Xrgb2101010)
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Argb8888)
    }
}

/// Owns pixel data with `(format, width, height, stride)`.
///
/// Invariant: `bytes.len() >= stride * height` and
/// `stride >= width * bytes_per_pixel(format)`.
#[derive(Debug, Clone)]
pub struct Image {
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: u32,
    data: Vec<u8>,
}

impl Image {
    /// Allocate a zeroed image with the natural (tightly packed) stride.
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        let stride = width * format.bytes_per_pixel();
        Self {
            format,
            width,
            height,
            stride,
            data: vec![0u8; (stride * height) as usize],
        }
    }

    /// Build an image from caller-supplied bytes, validating the invariant.
    pub fn from_parts(
        format: PixelFormat,
        width: u32,
        height: u32,
        stride: u32,
        data: Vec<u8>,
    ) -> Result<Self> {
        if stride < width * format.bytes_per_pixel() {
            return Err(Error::BufferTooSmall);
        }
        if (data.len() as u64) < (stride as u64) * (height as u64) {
            return Err(Error::BufferTooSmall);
        }
        Ok(Self {
            format,
            width,
            height,
            stride,
            data,
        })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.stride) as usize;
        &self.data[start..start + self.stride as usize]
    }

    /// Rectangular crop in device pixels, clamped to the image bounds.
    pub fn crop(&self, x: i32, y: i32, width: u32, height: u32) -> Image {
        let x = x.clamp(0, self.width as i32) as u32;
        let y = y.clamp(0, self.height as i32) as u32;
        let width = width.min(self.width.saturating_sub(x));
        let height = height.min(self.height.saturating_sub(y));

        let bpp = self.format.bytes_per_pixel();
        let out_stride = width * bpp;
        let mut out = Image::new(self.format, width, height);
        out.stride = out_stride;
        out.data = vec![0u8; (out_stride * height) as usize];

        for row in 0..height {
            let src_row = self.row(y + row);
            let src_start = (x * bpp) as usize;
            let src = &src_row[src_start..src_start + out_stride as usize];
            let dst_start = (row * out_stride) as usize;
            out.data[dst_start..dst_start + out_stride as usize].copy_from_slice(src);
        }
        out
    }

    /// Convert to the canonical linear-RGBA pixel model: 8 bits/channel,
    /// byte order R,G,B,A, tightly packed.
    pub fn to_canonical_rgba(&self) -> Vec<u8> {
        let mut out = vec![0u8; (self.width * self.height * 4) as usize];
        for y in 0..self.height {
            let row = self.row(y);
            for x in 0..self.width {
                let (r, g, b, a) = self.read_pixel(row, x);
                let idx = ((y * self.width + x) * 4) as usize;
                out[idx] = r;
                out[idx + 1] = g;
                out[idx + 2] = b;
                out[idx + 3] = a;
            }
        }
        out
    }

    fn read_pixel(&self, row: &[u8], x: u32) -> (u8, u8, u8, u8) {
        match self.format {
            PixelFormat::Gray8 => {
                let v = row[x as usize];
                (v, v, v, 255)
            }
            PixelFormat::Xrgb8888 | PixelFormat::Argb8888 => {
                let off = (x * 4) as usize;
                let b = row[off];
                let g = row[off + 1];
                let r = row[off + 2];
                let a = if self.format.has_alpha() { row[off + 3] } else { 255 };
                (r, g, b, a)
            }
            PixelFormat::Xrgb2101010 | PixelFormat::Xbgr2101010 => {
                let off = (x * 4) as usize;
                let word = u32::from_le_bytes(row[off..off + 4].try_into().unwrap());
                let c0 = ((word >> 20) & 0x3FF) as u16;
                let c1 = ((word >> 10) & 0x3FF) as u16;
                let c2 = (word & 0x3FF) as u16;
                let (r, g, b) = if self.format == PixelFormat::Xrgb2101010 {
                    (c0, c1, c2)
                } else {
                    (c2, c1, c0)
                };
                (to_8bit(r), to_8bit(g), to_8bit(b), 255)
            }
        }
    }

    /// Build a new `Image` of `target` format from this one, going through
    /// the canonical RGBA model. `convert(convert(img, F), G) ==
    /// convert(img, G)` pixel-exactly whenever both formats fully cover RGB.
    pub fn convert(&self, target: PixelFormat) -> Image {
        if target == self.format {
            return self.clone();
        }
        let rgba = self.to_canonical_rgba();
        let mut out = Image::new(target, self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = ((y * self.width + x) * 4) as usize;
                write_pixel(
                    &mut out,
                    x,
                    y,
                    rgba[idx],
                    rgba[idx + 1],
                    rgba[idx + 2],
                    rgba[idx + 3],
                );
            }
        }
        out
    }

    /// Build a drawing surface initialized from this image's current
    /// contents. Only implemented for the 8-bit formats actually used as
    /// render-buffer backing stores (`Xrgb8888`/`Argb8888`).
    pub fn to_draw_surface(&self) -> Option<crate::draw::DrawSurface> {
        if !matches!(self.format, PixelFormat::Xrgb8888 | PixelFormat::Argb8888) {
            return None;
        }
        Some(crate::draw::DrawSurface::from_image(
            &self.data,
            self.width,
            self.height,
            self.stride,
            self.format.is_flipped(),
        ))
    }

    /// Copy a drawing surface's pixels back into this image. Panics if the
    /// surface's dimensions don't match (an internal-usage bug, never a
    /// runtime condition).
    pub fn apply_draw_surface(&mut self, surface: &crate::draw::DrawSurface) {
        assert_eq!(surface.width(), self.width);
        assert_eq!(surface.height(), self.height);
        surface.write_into(&mut self.data, self.stride, self.format.is_flipped(), self.format.has_alpha());
    }
}

fn to_8bit(component10: u16) -> u8 {
    // Matches the 10-to-8-bit truncation used elsewhere in this crate's
    // PNG path (keep just the 8 most significant of the 10 bits).
    ((component10 >> 2) & 0xFF) as u8
}

fn write_pixel(out: &mut Image, x: u32, y: u32, r: u8, g: u8, b: u8, a: u8) {
    let stride = out.stride;
    match out.format {
        PixelFormat::Gray8 => {
            let lum = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
            out.data[(y * stride + x) as usize] = lum;
        }
        PixelFormat::Xrgb8888 | PixelFormat::Argb8888 => {
            let off = (y * stride + x * 4) as usize;
            out.data[off] = b;
            out.data[off + 1] = g;
            out.data[off + 2] = r;
            out.data[off + 3] = if out.format.has_alpha() { a } else { 255 };
        }
        PixelFormat::Xrgb2101010 | PixelFormat::Xbgr2101010 => {
            let r10 = (r as u32) << 2;
            let g10 = (g as u32) << 2;
            let b10 = (b as u32) << 2;
            let word = if out.format == PixelFormat::Xrgb2101010 {
                (r10 << 20) | (g10 << 10) | b10
            } else {
                (b10 << 20) | (g10 << 10) | r10
            };
            let off = (y * stride + x * 4) as usize;
            out.data[off..off + 4].copy_from_slice(&word.to_le_bytes());
        }
    }
}

/// Map a negotiated `wl_shm` wire format onto the canonical [`PixelFormat`]
/// this crate stores images in, converting bytes in place if the wire byte
/// order differs from the canonical one. Returns `None` for unsupported
/// formats (the caller should reject the capture).
pub fn canonical_format_for_wl_shm(format: wl_shm::Format) -> Option<PixelFormat> {
    use wl_shm::Format as F;
    match format {
        F::Xrgb8888 => Some(PixelFormat::Xrgb8888),
        F::Argb8888 => Some(PixelFormat::Argb8888),
        F::Xbgr8888 | F::Abgr8888 => Some(PixelFormat::Xrgb8888),
        F::Xrgb2101010 | F::Argb2101010 => Some(PixelFormat::Xrgb2101010),
        F::Xbgr2101010 | F::Abgr2101010 => Some(PixelFormat::Xbgr2101010),
        _ => None,
    }
}

/// Byte-swap a freshly captured XBGR8888/ABGR8888 buffer in place into the
/// XRGB8888 canonical layout (R and B swapped, matching
/// `libwayshot::convert::ConvertRGB8`, which performs the identical swap in
/// the opposite direction).
pub fn swap_rb_inplace_8888(data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(4) {
        chunk.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_preserves_pixel_values() {
        let mut img = Image::new(PixelFormat::Xrgb8888, 4, 4);
        // paint pixel (2,1) red: B,G,R,X memory order.
        let off = ((1 * img.stride()) + 2 * 4) as usize;
        img.data_mut()[off..off + 4].copy_from_slice(&[0, 0, 255, 255]);

        let cropped = img.crop(2, 1, 1, 1);
        assert_eq!(cropped.data(), &[0, 0, 255, 255]);
    }

    #[test]
    fn convert_round_trip_is_pixel_exact_for_fully_covering_formats() {
        let mut img = Image::new(PixelFormat::Xrgb8888, 2, 2);
        for (i, px) in img.data_mut().chunks_exact_mut(4).enumerate() {
            px.copy_from_slice(&[(i * 10) as u8, (i * 20) as u8, (i * 30) as u8, 255]);
        }
        let via_argb = img.convert(PixelFormat::Argb8888);
        let direct = img.convert(PixelFormat::Xrgb8888);
        let round_tripped = via_argb.convert(PixelFormat::Xrgb8888);
        assert_eq!(round_tripped.data(), direct.data());
    }

    #[test]
    fn ten_bit_pack_unpack_preserves_high_bits() {
        let mut img = Image::new(PixelFormat::Xrgb2101010, 1, 1);
        write_pixel(&mut img, 0, 0, 0x80, 0x40, 0xC0, 255);
        let rgba = img.to_canonical_rgba();
        // only the top 8 of 10 bits survive the round trip.
        assert_eq!(rgba[0] & 0xFC, 0x80);
        assert_eq!(rgba[1] & 0xFC, 0x40);
        assert_eq!(rgba[2] & 0xFC, 0xC0);
    }

    #[test]
    fn from_parts_rejects_undersized_stride() {
        let err = Image::from_parts(PixelFormat::Xrgb8888, 10, 10, 4, vec![0; 400]);
        assert!(err.is_err());
    }
}
