//! In-place frame annotation.
//!
//! The pipeline stamps the first alert of a frame onto the frame itself so
//! the streamed video shows the violation as it happens. Nothing in the
//! stack rasterises fonts, so the banner uses an embedded 5x7 dot-matrix
//! glyph table (OSD style) covering the characters alert text can contain.
//! Unknown characters advance as blanks.
//!
//! Placement matches the stream this replaces: origin (10, 30) treated as
//! the text baseline, red, fixed scale.

use crate::frame::Frame;

/// Banner origin, interpreted as the text baseline.
pub const ALERT_ORIGIN: (u32, u32) = (10, 30);

/// Pixel multiplier per glyph dot.
pub const ALERT_SCALE: u32 = 2;

/// Banner colour in BGR: pure red.
pub const ALERT_COLOR: [u8; 3] = [0, 0, 255];

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
/// One blank column between glyphs.
const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;

/// Stamp the alert banner onto the frame.
pub fn draw_alert_banner(frame: &mut Frame, text: &str) {
    draw_text(
        frame,
        text,
        ALERT_ORIGIN.0,
        ALERT_ORIGIN.1,
        ALERT_SCALE,
        ALERT_COLOR,
    );
}

/// Stamp `text` with its baseline at (`x`, `baseline_y`). Pixels falling
/// outside the frame are clipped, not wrapped.
pub fn draw_text(
    frame: &mut Frame,
    text: &str,
    x: u32,
    baseline_y: u32,
    scale: u32,
    bgr: [u8; 3],
) {
    let scale = scale.max(1);
    let top = baseline_y.saturating_sub(GLYPH_HEIGHT * scale);
    let width = frame.width();
    let height = frame.height();

    let mut pen_x = x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (row_idx, row) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if row & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                        continue;
                    }
                    // Scale each glyph dot to a scale x scale block.
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let px = pen_x + col * scale + dx;
                            let py = top + row_idx as u32 * scale + dy;
                            if px >= width || py >= height {
                                continue;
                            }
                            let idx = ((py * width + px) * 3) as usize;
                            frame.as_bgr_mut()[idx..idx + 3].copy_from_slice(&bgr);
                        }
                    }
                }
            }
        }
        pen_x += GLYPH_ADVANCE * scale;
    }
}

/// 5x7 glyph rows, bit 4 leftmost. `None` for characters the table does
/// not cover (rendered as a blank advance).
fn glyph(ch: char) -> Option<&'static [u8; 7]> {
    let rows: &[u8; 7] = match ch {
        ' ' => &[0x00; 7],
        ',' => &[0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => &[0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => &[0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => &[0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '0' => &[0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => &[0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => &[0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => &[0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => &[0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => &[0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => &[0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => &[0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => &[0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => &[0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => &[0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => &[0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => &[0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => &[0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => &[0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => &[0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => &[0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => &[0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => &[0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => &[0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => &[0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => &[0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => &[0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => &[0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => &[0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => &[0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => &[0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => &[0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => &[0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => &[0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => &[0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => &[0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => &[0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => &[0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => &[0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => &[0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        'a' => &[0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F],
        'b' => &[0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x1E],
        'c' => &[0x00, 0x00, 0x0E, 0x10, 0x10, 0x11, 0x0E],
        'd' => &[0x01, 0x01, 0x0D, 0x13, 0x11, 0x11, 0x0F],
        'e' => &[0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        'f' => &[0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
        'g' => &[0x00, 0x0F, 0x11, 0x11, 0x0F, 0x01, 0x0E],
        'h' => &[0x10, 0x10, 0x16, 0x19, 0x11, 0x11, 0x11],
        'i' => &[0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E],
        'j' => &[0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0C],
        'k' => &[0x10, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12],
        'l' => &[0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'm' => &[0x00, 0x00, 0x1A, 0x15, 0x15, 0x11, 0x11],
        'n' => &[0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        'o' => &[0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E],
        'p' => &[0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10],
        'q' => &[0x00, 0x00, 0x0D, 0x13, 0x0F, 0x01, 0x01],
        'r' => &[0x00, 0x00, 0x16, 0x19, 0x10, 0x10, 0x10],
        's' => &[0x00, 0x00, 0x0E, 0x10, 0x0E, 0x01, 0x1E],
        't' => &[0x08, 0x08, 0x1C, 0x08, 0x08, 0x09, 0x06],
        'u' => &[0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D],
        'v' => &[0x00, 0x00, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'w' => &[0x00, 0x00, 0x11, 0x11, 0x15, 0x15, 0x0A],
        'x' => &[0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11],
        'y' => &[0x00, 0x00, 0x11, 0x11, 0x0F, 0x01, 0x0E],
        'z' => &[0x00, 0x00, 0x1F, 0x02, 0x04, 0x08, 0x1F],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn black_frame(w: u32, h: u32) -> Frame {
        Frame::from_bgr(vec![0u8; (w * h * 3) as usize], w, h).unwrap()
    }

    fn red_pixels(frame: &Frame) -> usize {
        frame
            .as_bgr()
            .chunks_exact(3)
            .filter(|p| p == &ALERT_COLOR)
            .count()
    }

    #[test]
    fn banner_paints_red_pixels_above_baseline() {
        let mut frame = black_frame(320, 240);
        draw_alert_banner(&mut frame, "No face detected");
        assert!(red_pixels(&frame) > 0);

        // Nothing below the baseline row.
        let baseline = ALERT_ORIGIN.1;
        let bgr = frame.as_bgr();
        for y in baseline..240 {
            for x in 0..320 {
                let idx = ((y * 320 + x) * 3) as usize;
                assert_eq!(&bgr[idx..idx + 3], &[0, 0, 0], "pixel below baseline at y={}", y);
            }
        }
    }

    #[test]
    fn clipping_never_panics() {
        // Text far wider than the frame.
        let mut frame = black_frame(32, 16);
        draw_alert_banner(&mut frame, "Prohibited objects: cell phone, book, laptop");
        assert!(red_pixels(&frame) > 0);
    }

    #[test]
    fn unknown_characters_advance_blank() {
        let mut with_unknown = black_frame(320, 240);
        let mut known = black_frame(320, 240);
        draw_text(&mut with_unknown, "\u{00e9}a", 10, 30, 2, ALERT_COLOR);
        draw_text(&mut known, " a", 10, 30, 2, ALERT_COLOR);
        assert_eq!(with_unknown.as_bgr(), known.as_bgr());
    }

    #[test]
    fn alert_vocabulary_is_fully_covered() {
        let texts = [
            crate::alert::NO_FACE_ALERT,
            crate::alert::MULTIPLE_FACES_ALERT,
            crate::alert::PROHIBITED_PREFIX,
            "cell phone, book, laptop",
        ];
        for text in texts {
            for ch in text.chars() {
                assert!(glyph(ch).is_some(), "no glyph for {:?}", ch);
            }
        }
    }
}
