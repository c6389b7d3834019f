//! Horizontal scrolling of a single line
//!
//! Shared by the prompt and the buffer view. Columns are char indices.

use crate::config::{SCROLL_LEFT_MARKER, SCROLL_RIGHT_MARKER};

/// First visible column when the cursor is at `x` on a line `width` wide
pub fn line_x(x: usize, width: usize) -> usize {
    if x + 1 < width {
        0
    } else if width <= 1 {
        x
    } else {
        let margin = width.saturating_sub(3).min(6);
        let page = (width - margin - 2).max(1);
        page + (x + 1 - width) / page * page
    }
}

/// Column on screen (relative to the line start) for cursor column `x`
pub fn screen_column(x: usize, width: usize) -> usize {
    x - line_x(x, width)
}

/// The part of `s` that is visible with the cursor at `x`, padded to `width`
pub fn visible_window(s: &str, x: usize, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let l_x = line_x(x, width);
    let chars: Vec<char> = if l_x > 0 {
        std::iter::once(SCROLL_LEFT_MARKER)
            .chain(s.chars().skip(l_x + 1))
            .collect()
    } else {
        s.chars().collect()
    };

    if chars.len() > width {
        let mut out: String = chars[..width - 1].iter().collect();
        out.push(SCROLL_RIGHT_MARKER);
        out
    } else {
        let mut out: String = chars.iter().collect();
        out.extend(std::iter::repeat(' ').take(width - chars.len()));
        out
    }
}
