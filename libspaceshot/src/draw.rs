//! Overlay rasterization for the region picker and smart border (spec.md
//! §4.5, §4.6): the selection rectangle, handles, dimming mask and dashed
//! border are all drawn here. Grounded on `tiny_skia`, confirmed in the
//! retrieval pack at `other_examples/manifests/devmobasa-wayscriber/Cargo.toml`
//! as this ecosystem's cairo-equivalent CPU rasterizer.

use tiny_skia::{
    Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, PixmapRef, Rect, Stroke, Transform,
};

/// An RGB color literal in the caller's natural RGB order. [`DrawSurface`]
/// swaps channels internally when the backing format stores BGR.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    fn to_tiny_skia(self) -> Color {
        Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

/// A CPU drawing surface. Internally an RGBA-premultiplied `tiny_skia::Pixmap`
/// regardless of the source [`crate::image::PixelFormat`]; `flipped` tracks
/// whether the *destination* image's memory order is BGR so round-tripping
/// through [`crate::image::Image::apply_draw_surface`] swaps channels back.
pub struct DrawSurface {
    pixmap: Pixmap,
}

impl DrawSurface {
    /// A blank (transparent) surface of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixmap: Pixmap::new(width, height).expect("non-zero dimensions"),
        }
    }

    /// Build a surface from an existing image's raw bytes, converting from
    /// the source's (possibly BGR) byte order into tiny_skia's RGBA.
    pub fn from_image(data: &[u8], width: u32, height: u32, stride: u32, flipped: bool) -> Self {
        let mut pixmap = Pixmap::new(width, height).expect("non-zero dimensions");
        let out = pixmap.data_mut();
        for y in 0..height {
            let row_start = (y * stride) as usize;
            for x in 0..width {
                let off = row_start + (x * 4) as usize;
                let (c0, c1, c2, c3) = (data[off], data[off + 1], data[off + 2], data[off + 3]);
                let (r, g, b, a) = if flipped { (c2, c1, c0, c3) } else { (c0, c1, c2, c3) };
                let dst = ((y * width + x) * 4) as usize;
                out[dst] = r;
                out[dst + 1] = g;
                out[dst + 2] = b;
                out[dst + 3] = a;
            }
        }
        Self { pixmap }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Write this surface's pixels into `dest`, a buffer with the given
    /// `stride` and byte order (`flipped` = BGR, `has_alpha` = keep A or
    /// force opaque).
    pub fn write_into(&self, dest: &mut [u8], stride: u32, flipped: bool, has_alpha: bool) {
        let src = self.pixmap.data();
        let width = self.width();
        for y in 0..self.height() {
            let row_start = (y * stride) as usize;
            for x in 0..width {
                let soff = ((y * width + x) * 4) as usize;
                let (r, g, b, a) = (src[soff], src[soff + 1], src[soff + 2], src[soff + 3]);
                let (c0, c1, c2) = if flipped { (b, g, r) } else { (r, g, b) };
                let doff = row_start + (x * 4) as usize;
                dest[doff] = c0;
                dest[doff + 1] = c1;
                dest[doff + 2] = c2;
                dest[doff + 3] = if has_alpha { a } else { 255 };
            }
        }
    }

    pub fn clear(&mut self, color: Rgba) {
        self.pixmap.fill(color.to_tiny_skia());
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
        let Some(rect) = Rect::from_xywh(x, y, width, height) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(color.to_tiny_skia());
        paint.anti_alias = false;
        self.pixmap
            .fill_rect(rect, &paint, Transform::identity(), None);
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32, stroke_width: f32, color: Rgba) {
        let Some(rect) = Rect::from_xywh(x, y, width, height) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let mut paint = Paint::default();
        paint.set_color(color.to_tiny_skia());
        paint.anti_alias = false;
        let stroke = Stroke {
            width: stroke_width,
            ..Default::default()
        };
        self.pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Paint `color` over the whole surface except for `hole`, using an
    /// even-odd fill rule. Used for the selection dimming mask (spec.md §4.5).
    pub fn fill_with_hole(&mut self, hole_x: f32, hole_y: f32, hole_w: f32, hole_h: f32, color: Rgba) {
        let mut pb = PathBuilder::new();
        let w = self.width() as f32;
        let h = self.height() as f32;
        pb.push_rect(Rect::from_xywh(0.0, 0.0, w, h).expect("surface has positive size"));
        if let Some(hole) = Rect::from_xywh(hole_x, hole_y, hole_w, hole_h) {
            pb.push_rect(hole);
        }
        let Some(path) = pb.finish() else { return };
        let mut paint = Paint::default();
        paint.set_color(color.to_tiny_skia());
        paint.anti_alias = false;
        self.pixmap
            .fill_path(&path, &paint, FillRule::EvenOdd, Transform::identity(), None);
    }

    /// Read back a single pixel, un-premultiplied RGBA order. Used to sample
    /// the smart-border mask while stroking (spec.md §4.6).
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let off = ((y * self.width() + x) * 4) as usize;
        let d = self.pixmap.data();
        Rgba::new(d[off], d[off + 1], d[off + 2], d[off + 3])
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        let w = self.width();
        let off = ((y * w + x) * 4) as usize;
        let d = self.pixmap.data_mut();
        d[off] = color.r;
        d[off + 1] = color.g;
        d[off + 2] = color.b;
        d[off + 3] = color.a;
    }

    /// Stroke a rectangle's border band by sampling `mask` (a black/white
    /// pattern the same size as this surface) pixel-for-pixel instead of a
    /// flat color, for the smart-border case (spec.md §4.6).
    pub fn stroke_rect_pattern(&mut self, x: f32, y: f32, width: f32, height: f32, stroke_width: f32, mask: &DrawSurface) {
        let half = (stroke_width / 2.0).max(1.0);
        let outer = (x - half, y - half, x + width + half, y + height + half);
        let inner = (x + half, y + half, x + width - half, y + height - half);
        let (ox0, oy0, ox1, oy1) = (
            outer.0.floor().max(0.0) as i64,
            outer.1.floor().max(0.0) as i64,
            outer.2.ceil() as i64,
            outer.3.ceil() as i64,
        );
        for py in oy0..oy1 {
            if py < 0 || py as u32 >= self.height() {
                continue;
            }
            for px in ox0..ox1 {
                if px < 0 || px as u32 >= self.width() {
                    continue;
                }
                let (fx, fy) = (px as f32, py as f32);
                let within_inner = fx >= inner.0 && fx < inner.2 && fy >= inner.1 && fy < inner.3;
                if within_inner {
                    continue;
                }
                let mx = (px as u32).min(mask.width().saturating_sub(1));
                let my = (py as u32).min(mask.height().saturating_sub(1));
                self.set_pixel(px as u32, py as u32, mask.pixel(mx, my));
            }
        }
    }

    /// Nearest-neighbor scaled blit of `src` onto this surface at `(x, y)`
    /// with `scale`, used to composite captured output imagery into the
    /// overlay at its logical (possibly fractionally scaled) position.
    pub fn blit_scaled(&mut self, src: &DrawSurface, x: f32, y: f32, scale: f32) {
        let transform = Transform::from_translate(x, y).pre_scale(scale, scale);
        let paint = PixmapPaint {
            quality: tiny_skia::FilterQuality::Nearest,
            ..Default::default()
        };
        if let Some(src_ref) = PixmapRef::from_bytes(src.pixmap.data(), src.width(), src.height()) {
            self.pixmap.draw_pixmap(0, 0, src_ref, &paint, transform, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_sets_every_pixel() {
        let mut surf = DrawSurface::blank(4, 4);
        surf.clear(Rgba::new(10, 20, 30, 255));
        let mut dest = vec![0u8; 4 * 4 * 4];
        surf.write_into(&mut dest, 16, true, true);
        assert_eq!(&dest[0..4], &[30, 20, 10, 255]);
    }

    #[test]
    fn round_trip_preserves_pixels_when_not_flipped() {
        let mut data = vec![0u8; 2 * 2 * 4];
        data[0..4].copy_from_slice(&[1, 2, 3, 255]);
        let surf = DrawSurface::from_image(&data, 2, 2, 8, false);
        let mut out = vec![0u8; 2 * 2 * 4];
        surf.write_into(&mut out, 8, false, true);
        assert_eq!(out, data);
    }

    #[test]
    fn flipped_round_trip_preserves_pixels() {
        let mut data = vec![0u8; 1 * 1 * 4];
        data.copy_from_slice(&[30, 20, 10, 255]); // B,G,R,A on disk
        let surf = DrawSurface::from_image(&data, 1, 1, 4, true);
        let mut out = vec![0u8; 4];
        surf.write_into(&mut out, 4, true, true);
        assert_eq!(out, data);
    }
}
