//! Screen geometry - which rows hold the header, the file body and the footer

/// Screen dimensions and the rows reserved around the file body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margin {
    pub header: bool,
    pub footer: bool,
    pub lines: u16,
    pub cols: u16,
}

impl Margin {
    /// Header needs at least 3 lines, footer at least 2
    pub fn new(cols: u16, lines: u16) -> Self {
        Self {
            header: lines > 2,
            footer: lines > 1,
            lines,
            cols,
        }
    }

    /// Number of rows available for file content
    pub fn body_lines(&self) -> usize {
        (self.lines as usize).saturating_sub(self.header as usize + self.footer as usize)
    }

    /// First screen row of the body
    pub fn body_top(&self) -> u16 {
        self.header as u16
    }

    /// Row of the footer / prompt line
    pub fn footer_row(&self) -> u16 {
        self.lines.saturating_sub(1)
    }

    /// Lines moved by PageUp / PageDown
    pub fn page_size(&self) -> usize {
        let body = self.body_lines();
        if body <= 2 {
            1
        } else {
            body - 2
        }
    }

    /// How far to jump when the cursor leaves the screen
    pub fn scroll_amount(&self) -> usize {
        // half the screen, rounded up
        self.body_lines().div_ceil(2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_screen() {
        let m = Margin::new(80, 24);
        assert!(m.header && m.footer);
        assert_eq!(m.body_lines(), 22);
        assert_eq!(m.body_top(), 1);
        assert_eq!(m.footer_row(), 23);
        assert_eq!(m.page_size(), 20);
        assert_eq!(m.scroll_amount(), 11);
    }

    #[test]
    fn test_tiny_screens() {
        let m = Margin::new(80, 1);
        assert!(!m.header && !m.footer);
        assert_eq!(m.body_lines(), 1);
        assert_eq!(m.page_size(), 1);

        let m = Margin::new(80, 2);
        assert!(!m.header && m.footer);
        assert_eq!(m.body_lines(), 1);
    }
}
