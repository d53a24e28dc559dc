//! In-place frame annotation: detection boxes, labels, per-class counts,
//! and the threshold readout.
//!
//! Everything draws directly into the frame's RGB byte slice with a small
//! 5x7 bitmap font, so no font files or rendering stack is needed. All
//! drawing clips to the frame; boxes partially outside stay safe.

use crate::detect::Detection;
use crate::frame::Frame;
use crate::state::CountSnapshot;

const GREEN: [u8; 3] = [0, 255, 0];
const BOX_STROKE: u32 = 2;
const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
const TEXT_SCALE: u32 = 2;
const LINE_STEP: u32 = 30;

/// Draw every detection as an outlined box with a "label confidence" tag
/// above it.
pub fn draw_detections(frame: &mut Frame, detections: &[Detection]) {
    for detection in detections {
        let b = detection.bbox;
        draw_rect(frame, b.x, b.y, b.width, b.height, BOX_STROKE, GREEN);
        let tag = format!("{} {:.2}", detection.label, detection.confidence);
        let text_y = b.y - (GLYPH_H * TEXT_SCALE) as i32 - 3;
        draw_text(frame, &tag, b.x, text_y, TEXT_SCALE, GREEN);
    }
}

/// Draw the per-class count list down the left edge, followed by the
/// current threshold.
pub fn draw_counts(frame: &mut Frame, counts: &CountSnapshot, threshold: u32) {
    let mut y = 30i32;
    for (label, count) in counts {
        draw_text(frame, &format!("{}: {}", label, count), 10, y, TEXT_SCALE, GREEN);
        y += LINE_STEP as i32;
    }
    draw_text(
        frame,
        &format!("Threshold: {}", threshold),
        10,
        y,
        TEXT_SCALE,
        GREEN,
    );
}

fn put_pixel(frame: &mut Frame, x: i32, y: i32, color: [u8; 3]) {
    if x < 0 || y < 0 || x >= frame.width() as i32 || y >= frame.height() as i32 {
        return;
    }
    let idx = ((y as u32 * frame.width() + x as u32) * 3) as usize;
    let pixels = frame.pixels_mut();
    pixels[idx..idx + 3].copy_from_slice(&color);
}

fn fill_rect(frame: &mut Frame, x: i32, y: i32, width: u32, height: u32, color: [u8; 3]) {
    for dy in 0..height as i32 {
        for dx in 0..width as i32 {
            put_pixel(frame, x + dx, y + dy, color);
        }
    }
}

/// Outline a rectangle with the given stroke width.
fn draw_rect(frame: &mut Frame, x: i32, y: i32, width: u32, height: u32, stroke: u32, color: [u8; 3]) {
    fill_rect(frame, x, y, width, stroke, color);
    fill_rect(frame, x, y + height as i32 - stroke as i32, width, stroke, color);
    fill_rect(frame, x, y, stroke, height, color);
    fill_rect(frame, x + width as i32 - stroke as i32, y, stroke, height, color);
}

/// Render text at (x, y) with an integer scale factor. Unknown characters
/// render as blank space.
fn draw_text(frame: &mut Frame, text: &str, x: i32, y: i32, scale: u32, color: [u8; 3]) {
    let mut cursor = x;
    for ch in text.chars() {
        let glyph = glyph_bits(ch.to_ascii_uppercase());
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0b10000 >> col) != 0 {
                    fill_rect(
                        frame,
                        cursor + (col * scale) as i32,
                        y + (row as u32 * scale) as i32,
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
        cursor += ((GLYPH_W + 1) * scale) as i32;
    }
}

/// 5x7 bitmap glyphs, one row per byte, leftmost pixel in bit 4.
fn glyph_bits(ch: char) -> [u8; 7] {
    match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b01110, 0b10000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00001, 0b01110],
        ':' => [0b00000, 0b00100, 0b00100, 0b00000, 0b00100, 0b00100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00110, 0b00110],
        '-' => [0b00000, 0b00000, 0b00000, 0b01110, 0b00000, 0b00000, 0b00000],
        _ => [0; 7],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};

    fn black_frame(width: u32, height: u32) -> Frame {
        Frame::from_rgb8(vec![0u8; (width * height * 3) as usize], width, height).unwrap()
    }

    fn green_pixels(frame: &Frame) -> usize {
        frame
            .pixels()
            .chunks_exact(3)
            .filter(|p| p == &[0, 255, 0])
            .count()
    }

    #[test]
    fn drawing_a_detection_marks_pixels() {
        let mut frame = black_frame(200, 150);
        let detections = vec![Detection {
            label: "person",
            class_id: 0,
            confidence: 0.92,
            bbox: BoundingBox {
                x: 40,
                y: 40,
                width: 60,
                height: 80,
            },
        }];
        draw_detections(&mut frame, &detections);
        assert!(green_pixels(&frame) > 0);
    }

    #[test]
    fn out_of_bounds_boxes_clip_instead_of_panicking() {
        let mut frame = black_frame(100, 100);
        let detections = vec![Detection {
            label: "person",
            class_id: 0,
            confidence: 0.6,
            bbox: BoundingBox {
                x: -30,
                y: -10,
                width: 300,
                height: 400,
            },
        }];
        draw_detections(&mut frame, &detections);
        assert!(green_pixels(&frame) > 0);
    }

    #[test]
    fn counts_overlay_includes_threshold_line() {
        let mut frame = black_frame(400, 200);
        let mut counts = CountSnapshot::new();
        counts.insert("person".to_string(), 12);
        draw_counts(&mut frame, &counts, 50);
        assert!(green_pixels(&frame) > 0);
    }
}
