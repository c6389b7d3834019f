//! Status line - short-lived messages in the footer

use crate::margin::Margin;
use crate::prompt::PromptResult;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};

pub struct Status {
    message: String,
    ticks_left: u32,
    lifetime: u32,
}

impl Status {
    pub fn new(lifetime: u32) -> Self {
        Self {
            message: String::new(),
            ticks_left: 0,
            lifetime,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn update(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.ticks_left = self.lifetime;
    }

    pub fn clear(&mut self) {
        self.message.clear();
        self.ticks_left = 0;
    }

    /// Report an abandoned prompt
    pub fn cancelled(&mut self) -> PromptResult {
        self.update("cancelled");
        PromptResult::Cancelled
    }

    /// Age the current message by one redraw
    pub fn tick(&mut self, margin: &Margin) {
        if !margin.footer && self.message.is_empty() {
            return;
        }
        match self.ticks_left.checked_sub(1) {
            Some(left) => self.ticks_left = left,
            None => self.clear(),
        }
    }

    pub fn draw(&self, out: &mut impl Write, margin: &Margin) -> io::Result<()> {
        if !margin.footer {
            return Ok(());
        }
        queue!(out, MoveTo(0, margin.footer_row()), Clear(ClearType::CurrentLine))?;
        if self.message.is_empty() {
            return Ok(());
        }

        let text = format!("[ {} ]", self.message);
        let cols = margin.cols as usize;
        let len = text.chars().count();
        let (x, text) = if len >= cols {
            (0, text.chars().take(cols).collect())
        } else {
            ((cols - len) / 2, text)
        };
        queue!(
            out,
            MoveTo(x as u16, margin.footer_row()),
            SetAttribute(Attribute::Reverse),
            Print(text),
            SetAttribute(Attribute::Reset)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_expires() {
        let margin = Margin::new(80, 24);
        let mut status = Status::new(2);
        status.update("saved!");

        status.tick(&margin);
        status.tick(&margin);
        assert_eq!(status.message(), "saved!");
        status.tick(&margin);
        assert_eq!(status.message(), "");
    }

    #[test]
    fn test_cancelled() {
        let mut status = Status::new(25);
        assert_eq!(status.cancelled(), PromptResult::Cancelled);
        assert_eq!(status.message(), "cancelled");
    }

    #[test]
    fn test_draw_centred() {
        let margin = Margin::new(20, 5);
        let mut status = Status::new(25);
        status.update("hi");
        let mut out = Vec::new();
        status.draw(&mut out, &margin).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("[ hi ]"));
    }
}
