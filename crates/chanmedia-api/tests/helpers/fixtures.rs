//! Test fixtures: encoded images and rejected payloads.

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// PNG of the given dimensions. `seed` varies the pixels so different seeds give
/// different digests.
pub fn create_test_png(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x as u8).wrapping_add(seed), (y as u8).wrapping_mul(3), seed])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode PNG");
    out.into_inner()
}

/// ELF header padded past the sniffing threshold.
pub fn create_test_executable() -> Vec<u8> {
    let mut elf = vec![0x7F, b'E', b'L', b'F', 0x02, 0x01, 0x01, 0x00];
    elf.resize(128, 0);
    elf
}

/// PNG signature followed by filler, `len` bytes in total.
pub fn create_oversized_png(len: usize) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.resize(len, 0xAB);
    data
}
