//! The "smart" border: a background worker that turns the captured
//! background into a black/white contrast mask so the selection border
//! stays visible over any content (spec.md §4.6).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::image::{Image, PixelFormat};

const THRESHOLD: u8 = 0x6F;

struct Shared {
    done: AtomicBool,
    refcount: AtomicUsize,
    result: std::sync::Mutex<Option<Image>>,
}

/// Computes a binary black/white mask from the captured background on a
/// dedicated thread, reference-counted between the worker and the picker
/// that spawned it (spec.md §4.6: "2 on start ... unref'd once by worker
/// exit and once by picker destruction").
pub struct SmartBorderWorker {
    shared: Arc<Shared>,
}

impl SmartBorderWorker {
    /// Spawn the worker. `scale_120ths` is the output's fractional scale in
    /// 120ths, matching the `wp-fractional-scale-v1` wire unit; the blur
    /// radius is `8 * scale / 120` pixels.
    pub fn spawn(background: Image, scale_120ths: u32, target_format: PixelFormat) -> Self {
        let shared = Arc::new(Shared {
            done: AtomicBool::new(false),
            refcount: AtomicUsize::new(2),
            result: std::sync::Mutex::new(None),
        });

        let worker_shared = shared.clone();
        thread::spawn(move || {
            let radius = ((8 * scale_120ths) / 120).max(1) as usize;
            let luminance = to_luminance(&background);
            let blurred = box_blur_separable(&luminance, background.width(), background.height(), radius);
            let mask = threshold_mask(&blurred, target_format, background.width(), background.height());

            *worker_shared.result.lock().expect("result mutex is never poisoned") = Some(mask);
            worker_shared.done.store(true, Ordering::Release);
            worker_shared.refcount.fetch_sub(1, Ordering::AcqRel);
        });

        Self { shared }
    }

    /// `Some(image)` once the worker has published its result; `None` means
    /// the caller should keep falling back to a solid border color.
    pub fn try_result(&self) -> Option<Image> {
        if !self.shared.done.load(Ordering::Acquire) {
            return None;
        }
        self.shared
            .result
            .lock()
            .expect("result mutex is never poisoned")
            .clone()
    }
}

impl Drop for SmartBorderWorker {
    fn drop(&mut self) {
        self.shared.refcount.fetch_sub(1, Ordering::AcqRel);
    }
}

fn to_luminance(image: &Image) -> Vec<u8> {
    let rgba = image.to_canonical_rgba();
    let mut out = Vec::with_capacity((image.width() * image.height()) as usize);
    for px in rgba.chunks_exact(4) {
        let lum = (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32).round() as u8;
        out.push(lum);
    }
    out
}

/// Separable box blur, extending the source at the borders (clamp-to-edge)
/// rather than wrapping or zero-padding.
fn box_blur_separable(src: &[u8], width: u32, height: u32, radius: usize) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut horizontal = vec![0u8; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(w - 1);
            let sum: u32 = row[lo..=hi].iter().map(|&v| v as u32).sum();
            horizontal[y * w + x] = (sum / (hi - lo + 1) as u32) as u8;
        }
    }

    let mut out = vec![0u8; w * h];
    for x in 0..w {
        for y in 0..h {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(h - 1);
            let mut sum = 0u32;
            for yy in lo..=hi {
                sum += horizontal[yy * w + x] as u32;
            }
            out[y * w + x] = (sum / (hi - lo + 1) as u32) as u8;
        }
    }
    out
}

fn threshold_mask(blurred: &[u8], format: PixelFormat, width: u32, height: u32) -> Image {
    let mut image = Image::new(format, width, height);
    for (i, &lum) in blurred.iter().enumerate() {
        let value = if lum > THRESHOLD { 0xFFu8 } else { 0x00u8 };
        write_mask_pixel(&mut image, i, value);
    }
    image
}

fn write_mask_pixel(image: &mut Image, index: usize, value: u8) {
    let bpp = image.format().bytes_per_pixel() as usize;
    let width = image.width() as usize;
    let stride = image.stride() as usize;
    let x = index % width;
    let y = index / width;
    let off = y * stride + x * bpp;
    for b in 0..bpp {
        image.data_mut()[off + b] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_eventually_publishes_a_result() {
        let img = Image::new(PixelFormat::Xrgb8888, 4, 4);
        let worker = SmartBorderWorker::spawn(img, 120, PixelFormat::Xrgb8888);
        let mut result = None;
        for _ in 0..1000 {
            if let Some(r) = worker.try_result() {
                result = Some(r);
                break;
            }
            std::thread::yield_now();
        }
        assert!(result.is_some());
    }

    #[test]
    fn box_blur_clamps_at_borders_instead_of_wrapping() {
        let src = vec![0, 0, 0, 255, 255];
        let blurred = box_blur_separable(&src, 5, 1, 1);
        // Rightmost pixel's window is clamped to [3,4], not wrapped to index 0.
        assert_eq!(blurred[4], 255);
    }

    #[test]
    fn threshold_mask_is_binary() {
        let blurred = vec![0x00, 0x6F, 0x70, 0xFF];
        let mask = threshold_mask(&blurred, PixelFormat::Gray8, 4, 1);
        assert_eq!(mask.data(), &[0x00, 0x00, 0xFF, 0xFF]);
    }
}
