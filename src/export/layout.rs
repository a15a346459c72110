//! Page layout for transcript export.
//!
//! Positions are in PDF points with the origin at the bottom-left corner of a US-Letter
//! page. Line breaking uses Times-Roman advance widths so the layout matches what the
//! renderer draws.

use crate::session::ChatTurn;

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const FONT_SIZE: f32 = 12.0;

/// Baseline of the first line on each page.
pub const TOP_Y: f32 = 750.0;
/// No line is placed below this baseline.
pub const BOTTOM_MARGIN: f32 = 40.0;
pub const LABEL_X: f32 = 40.0;
pub const BODY_X: f32 = 60.0;
pub const WRAP_WIDTH: f32 = 520.0;

const LABEL_ADVANCE: f32 = 15.0;
const LINE_ADVANCE: f32 = 14.0;
const TURN_GAP: f32 = 10.0;

/// One line of text at a fixed position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub bold: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<PlacedLine>,
}

/// Times-Roman advance widths for printable ASCII, in 1/1000 em.
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, // ' '../
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, // 0..?
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, // @..O
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, // P.._
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, // `..o
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, // p..~
];

const FALLBACK_WIDTH: u16 = 500;

fn char_width(c: char) -> f32 {
    let units = match c as u32 {
        code @ 32..=126 => TIMES_ROMAN_WIDTHS[(code - 32) as usize],
        _ => FALLBACK_WIDTH,
    };
    f32::from(units) * FONT_SIZE / 1000.0
}

/// Width of `text` in points at [`FONT_SIZE`].
pub fn text_width(text: &str) -> f32 {
    text.chars().map(char_width).sum()
}

/// Break `text` into lines no wider than `max_width` points.
///
/// Explicit newlines always break. Words are packed greedily; a word wider than the line
/// is split between characters. Blank lines are kept.
pub fn wrap_text(text: &str, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut current = String::new();
        let mut has_words = false;

        for word in paragraph.split_whitespace() {
            has_words = true;

            let candidate_width = if current.is_empty() {
                text_width(word)
            } else {
                text_width(&current) + char_width(' ') + text_width(word)
            };

            if candidate_width <= max_width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if text_width(word) <= max_width {
                current.push_str(word);
            } else {
                for c in word.chars() {
                    if !current.is_empty() && text_width(&current) + char_width(c) > max_width {
                        lines.push(std::mem::take(&mut current));
                    }
                    current.push(c);
                }
            }
        }

        if has_words {
            lines.push(current);
        } else {
            lines.push(String::new());
        }
    }

    lines
}

/// Lay the transcript out over as many pages as needed.
///
/// Each turn is a bold `Label:` line followed by its wrapped text. A new page starts
/// whenever the next line would sit below [`BOTTOM_MARGIN`].
pub fn layout_history(turns: &[ChatTurn]) -> Vec<Page> {
    let mut pages = vec![Page::default()];
    let mut y = TOP_Y;

    let place = |pages: &mut Vec<Page>, y: &mut f32, text: String, x: f32, bold: bool| {
        if *y < BOTTOM_MARGIN {
            pages.push(Page::default());
            *y = TOP_Y;
        }
        if let Some(page) = pages.last_mut() {
            page.lines.push(PlacedLine { text, x, y: *y, bold });
        }
    };

    for turn in turns {
        place(
            &mut pages,
            &mut y,
            format!("{}:", turn.role.label()),
            LABEL_X,
            true,
        );
        y -= LABEL_ADVANCE;

        for line in wrap_text(&turn.text, WRAP_WIDTH) {
            place(&mut pages, &mut y, line, BODY_X, false);
            y -= LINE_ADVANCE;
        }
        y -= TURN_GAP;
    }

    pages
}
