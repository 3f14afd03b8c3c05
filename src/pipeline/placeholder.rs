use image::{Rgb, RgbImage};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const TEXT: &str = "OFFLINE";

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const FOREGROUND: Rgb<u8> = Rgb([220, 30, 30]);

/// 5x7 rows, most significant of the low five bits on the left
fn glyph(c: char) -> [u8; 7] {
    match c {
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'N' => [0b10001, 0b11001, 0b11001, 0b10101, 0b10011, 0b10011, 0b10001],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        _ => [0; 7],
    }
}

/// Solid frame at the output resolution with "OFFLINE" centred on it
pub fn offline_frame(width: u32, height: u32) -> RgbImage {
    let width = width.max(1);
    let height = height.max(1);
    let mut image = RgbImage::from_pixel(width, height, BACKGROUND);

    let columns = TEXT.len() as u32 * (GLYPH_WIDTH + 1) - 1;
    let scale = (width * 2 / 3 / columns).min(height / 3 / GLYPH_HEIGHT);
    if scale == 0 {
        return image;
    }

    let origin_x = (width - columns * scale) / 2;
    let origin_y = (height - GLYPH_HEIGHT * scale) / 2;

    for (i, c) in TEXT.chars().enumerate() {
        let glyph_x = origin_x + i as u32 * (GLYPH_WIDTH + 1) * scale;
        for (row, &bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let x0 = glyph_x + col * scale;
                let y0 = origin_y + row as u32 * scale;
                for y in y0..y0 + scale {
                    for x in x0..x0 + scale {
                        image.put_pixel(x, y, FOREGROUND);
                    }
                }
            }
        }
    }

    image
}
