//! # Hazard Gauge Module
//!
//! This module renders the additives-danger-index gauge attached to scan
//! results: a donut chart with the index drawn in the center, colored by
//! severity. Rendered images are cached on disk keyed by the clamped index,
//! so each of the 101 possible gauges is drawn at most once per process
//! lifetime.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{ImageOutputFormat, Rgba, RgbaImage};
use log::info;
use tempfile::NamedTempFile;

/// Default on-disk cache directory for rendered gauges
pub const DEFAULT_CACHE_DIR: &str = "adi_cache";

const IMAGE_SIZE: u32 = 450;
const OUTER_RADIUS: f32 = 180.0;
const INNER_RADIUS: f32 = 135.0;
const DIGIT_SCALE: u32 = 10;

const BACKGROUND: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const TRACK: Rgba<u8> = Rgba([0xe0, 0xe0, 0xe0, 0xff]);
const TEXT: Rgba<u8> = Rgba([0x2d, 0x2d, 0x2d, 0xff]);
const LOW: Rgba<u8> = Rgba([0x2e, 0xcc, 0x71, 0xff]);
const MEDIUM: Rgba<u8> = Rgba([0xf1, 0xc4, 0x0f, 0xff]);
const HIGH: Rgba<u8> = Rgba([0xe7, 0x4c, 0x3c, 0xff]);

/// 5x7 bitmap glyphs for '0'..'9', one 5-bit row pattern per entry
const DIGIT_ROWS: [[u8; 7]; 10] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
    [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
];

/// Get the path to the cached gauge image for a danger index, rendering it
/// on the first request.
///
/// The index is clamped to 0-100. The cache file is filled atomically:
/// rendered into a temp file in the same directory, then persisted under
/// its final name, so a concurrent reader never sees a half-written PNG.
pub fn adi_image_path(adi: u8, folder: &Path) -> Result<PathBuf> {
    let adi = adi.min(100);

    fs::create_dir_all(folder)?;
    let file_path = folder.join(format!("adi_{adi}.png"));
    if file_path.exists() {
        return Ok(file_path);
    }

    let gauge = render_gauge(adi);
    let mut staging = NamedTempFile::new_in(folder)?;
    gauge.write_to(&mut staging, ImageOutputFormat::Png)?;
    staging.persist(&file_path)?;

    info!("Rendered hazard gauge for index {adi}");
    Ok(file_path)
}

/// Severity color for a danger index
fn color_for_index(adi: u8) -> Rgba<u8> {
    if adi < 40 {
        LOW
    } else if adi < 70 {
        MEDIUM
    } else {
        HIGH
    }
}

/// Draw the donut gauge with the index centered inside the ring
fn render_gauge(adi: u8) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, BACKGROUND);

    let center = IMAGE_SIZE as f32 / 2.0;
    let filled_angle = f32::from(adi) / 100.0 * std::f32::consts::TAU;
    let color = color_for_index(adi);

    for y in 0..IMAGE_SIZE {
        for x in 0..IMAGE_SIZE {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let distance = (dx * dx + dy * dy).sqrt();
            if !(INNER_RADIUS..=OUTER_RADIUS).contains(&distance) {
                continue;
            }

            // Angle measured clockwise from 12 o'clock
            let mut angle = dx.atan2(-dy);
            if angle < 0.0 {
                angle += std::f32::consts::TAU;
            }

            let pixel = if angle <= filled_angle { color } else { TRACK };
            image.put_pixel(x, y, pixel);
        }
    }

    draw_centered_number(&mut image, adi);
    image
}

/// Draw the index value in the middle of the ring with the bitmap glyphs
fn draw_centered_number(image: &mut RgbaImage, adi: u8) {
    let text = adi.to_string();
    let glyph_width = 5 * DIGIT_SCALE;
    let glyph_height = 7 * DIGIT_SCALE;
    let gap = DIGIT_SCALE;

    let digit_count = text.len() as u32;
    let total_width = digit_count * glyph_width + (digit_count - 1) * gap;
    let left = (IMAGE_SIZE - total_width) / 2;
    let top = (IMAGE_SIZE - glyph_height) / 2;

    for (index, ch) in text.chars().enumerate() {
        let digit = ch.to_digit(10).unwrap_or(0) as usize;
        let origin_x = left + index as u32 * (glyph_width + gap);

        for (row, bits) in DIGIT_ROWS[digit].iter().enumerate() {
            for col in 0..5u32 {
                if bits & (0b10000 >> col) == 0 {
                    continue;
                }
                for py in 0..DIGIT_SCALE {
                    for px in 0..DIGIT_SCALE {
                        image.put_pixel(
                            origin_x + col * DIGIT_SCALE + px,
                            top + row as u32 * DIGIT_SCALE + py,
                            TEXT,
                        );
                    }
                }
            }
        }
    }
}
