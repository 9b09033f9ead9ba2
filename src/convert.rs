//! Pixel conversions for handing YUV frames to an RGB565 display.

use embedded_graphics::pixelcolor::{
    raw::{RawData, RawU16},
    Rgb565,
};

/// Grey RGB565 colour for a luma sample.
pub fn luma_to_color(y: u8) -> Rgb565 {
    Rgb565::new(y >> 3, y >> 2, y >> 3)
}

/// Rewrite a YUYV plane in place as grey RGB565, high byte first. Each 2-byte pixel is replaced
/// using its luma byte, the chroma byte is dropped.
pub fn luma_to_rgb565(data: &mut [u8]) {
    for px in data.chunks_exact_mut(2) {
        let raw = RawU16::from(luma_to_color(px[0])).into_inner();
        px.copy_from_slice(&raw.to_be_bytes());
    }
}
