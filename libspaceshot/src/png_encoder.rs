//! PNG encoding (spec.md §4.2). Uses the `png` crate directly rather than
//! the higher-level `image` crate so the per-format transform chain and the
//! `sBIT` (significant bits) chunk can be controlled exactly.

use png::chunk::ChunkType;
use png::{BitDepth, ColorType};

use crate::error::{Error, Result};
use crate::image::{Image, PixelFormat};
use crate::link_buffer::LinkBuffer;

const SBIT: ChunkType = ChunkType(*b"sBIT");

/// Encode `image` as a PNG into a freshly allocated [`LinkBuffer`].
///
/// Transform chain per format:
/// - `Gray8`: written as-is, 8-bit grayscale, `sBIT = 8`.
/// - `Xrgb8888`/`Argb8888`: BGR(X/A) memory order swapped to RGB(A), written
///   8-bit, `sBIT = 8,8,8[,8]`.
/// - `Xrgb2101010`: each 10-bit sample widened to a big-endian 16-bit sample
///   (value left-shifted by 6, matching the reference decoder's expectation
///   that the high bits carry the significant data) with an R/B channel
///   swap, `sBIT = 10,10,10`.
/// - `Xbgr2101010`: same widening, no R/B swap (already R,G,B order in the
///   canonical unpacking), `sBIT = 10,10,10`.
pub fn encode(image: &Image, compression_level: png::Compression) -> Result<LinkBuffer> {
    let mut out = LinkBuffer::new();
    {
        let (color_type, bit_depth, sbit, pixels) = transcode(image);

        let mut encoder = png::Encoder::new(&mut out, image.width(), image.height());
        encoder.set_color(color_type);
        encoder.set_depth(bit_depth);
        encoder.set_compression(compression_level);
        // Filtering is left at the crate default (adaptive); screenshots are
        // rarely large enough for filter choice to matter.

        let mut writer = encoder.write_header().map_err(Error::Png)?;
        writer
            .write_chunk(SBIT, &sbit)
            .map_err(Error::Png)?;
        writer
            .write_image_data(&pixels)
            .map_err(Error::Png)?;
    }
    Ok(out)
}

fn transcode(image: &Image) -> (ColorType, BitDepth, Vec<u8>, Vec<u8>) {
    match image.format() {
        PixelFormat::Gray8 => (
            ColorType::Grayscale,
            BitDepth::Eight,
            vec![8],
            image.data().to_vec(),
        ),
        PixelFormat::Xrgb8888 | PixelFormat::Argb8888 => {
            let has_alpha = image.format().has_alpha();
            let (color_type, channels, sbit) = if has_alpha {
                (ColorType::Rgba, 4, vec![8, 8, 8, 8])
            } else {
                (ColorType::Rgb, 3, vec![8, 8, 8])
            };
            let mut pixels = Vec::with_capacity((image.width() * image.height() * channels) as usize);
            for y in 0..image.height() {
                let row_start = (y * image.stride()) as usize;
                for x in 0..image.width() {
                    let off = row_start + (x * 4) as usize;
                    let row = image.data();
                    let (b, g, r, a) = (row[off], row[off + 1], row[off + 2], row[off + 3]);
                    pixels.push(r);
                    pixels.push(g);
                    pixels.push(b);
                    if has_alpha {
                        pixels.push(a);
                    }
                }
            }
            (color_type, BitDepth::Eight, sbit, pixels)
        }
        PixelFormat::Xrgb2101010 | PixelFormat::Xbgr2101010 => {
            let swap_rb = image.format() == PixelFormat::Xrgb2101010;
            let mut pixels =
                Vec::with_capacity((image.width() * image.height() * 3 * 2) as usize);
            for y in 0..image.height() {
                let row_start = (y * image.stride()) as usize;
                for x in 0..image.width() {
                    let off = row_start + (x * 4) as usize;
                    let word = u32::from_le_bytes(
                        image.data()[off..off + 4].try_into().expect("4-byte slice"),
                    );
                    let c0 = ((word >> 20) & 0x3FF) as u16;
                    let c1 = ((word >> 10) & 0x3FF) as u16;
                    let c2 = (word & 0x3FF) as u16;
                    let (r, g, b) = if swap_rb { (c2, c1, c0) } else { (c0, c1, c2) };
                    for sample in [r, g, b] {
                        let widened = sample << 6;
                        pixels.extend_from_slice(&widened.to_be_bytes());
                    }
                }
            }
            (ColorType::Rgb, BitDepth::Sixteen, vec![10, 10, 10], pixels)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray8_round_trip_header_is_sane() {
        let img = Image::new(PixelFormat::Gray8, 2, 2);
        let (color_type, depth, sbit, pixels) = transcode(&img);
        assert_eq!(color_type, ColorType::Grayscale);
        assert_eq!(depth, BitDepth::Eight);
        assert_eq!(sbit, vec![8]);
        assert_eq!(pixels.len(), 4);
    }

    #[test]
    fn xrgb8888_drops_filler_byte() {
        let mut img = Image::new(PixelFormat::Xrgb8888, 1, 1);
        img.data_mut().copy_from_slice(&[10, 20, 30, 0]); // B,G,R,X
        let (color_type, _depth, sbit, pixels) = transcode(&img);
        assert_eq!(color_type, ColorType::Rgb);
        assert_eq!(sbit, vec![8, 8, 8]);
        assert_eq!(pixels, vec![30, 20, 10]);
    }

    #[test]
    fn xrgb2101010_swaps_r_and_b() {
        let mut img = Image::new(PixelFormat::Xrgb2101010, 1, 1);
        let word: u32 = (0x3FFu32 << 20) | (0u32 << 10) | 0u32; // R=max, G=0, B=0
        img.data_mut().copy_from_slice(&word.to_le_bytes());
        let (_color_type, depth, sbit, pixels) = transcode(&img);
        assert_eq!(depth, BitDepth::Sixteen);
        assert_eq!(sbit, vec![10, 10, 10]);
        // after the R/B swap, the max sample should land in the blue slot.
        let blue = u16::from_be_bytes([pixels[4], pixels[5]]);
        assert_eq!(blue, 0x3FF << 6);
    }

    #[test]
    fn xbgr2101010_does_not_swap() {
        let mut img = Image::new(PixelFormat::Xbgr2101010, 1, 1);
        let word: u32 = (0x3FFu32 << 20) | (0u32 << 10) | 0u32; // stored c0=max
        img.data_mut().copy_from_slice(&word.to_le_bytes());
        let (_color_type, _depth, _sbit, pixels) = transcode(&img);
        let red = u16::from_be_bytes([pixels[0], pixels[1]]);
        assert_eq!(red, 0x3FF << 6);
    }
}
