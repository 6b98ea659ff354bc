//! Depth-tested braille canvas
//!
//! Each terminal cell holds a 2x4 grid of dots. A dot keeps the colour of the
//! nearest thing drawn on it; a cell takes the colour of its nearest dot.

use super::camera::Projected;
use crate::colors::Rgb;
use crate::terminal::Terminal;

/// Braille bit for (row, column) inside a cell
const DOT_BITS: [[u8; 2]; 4] = [[0x01, 0x08], [0x02, 0x10], [0x04, 0x20], [0x40, 0x80]];

#[derive(Clone, Copy)]
struct Dot {
    depth: f32,
    color: Rgb,
}

pub struct BrailleCanvas {
    cols: usize,
    rows: usize,
    dots: Vec<Option<Dot>>,
}

impl BrailleCanvas {
    pub fn new(cols: u16, rows: u16) -> Self {
        let (cols, rows) = (cols as usize, rows as usize);
        Self {
            cols,
            rows,
            dots: vec![None; cols * 2 * rows * 4],
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        if (cols as usize, rows as usize) != (self.cols, self.rows) {
            *self = Self::new(cols, rows);
        }
    }

    pub fn clear(&mut self) {
        self.dots.fill(None);
    }

    pub fn width(&self) -> usize {
        self.cols * 2
    }

    pub fn height(&self) -> usize {
        self.rows * 4
    }

    /// Set a dot if it is nearer than what is already there
    pub fn plot(&mut self, x: i32, y: i32, depth: f32, color: Rgb) {
        if x < 0 || y < 0 || x as usize >= self.width() || y as usize >= self.height() {
            return;
        }
        let index = y as usize * self.width() + x as usize;
        match self.dots[index] {
            Some(dot) if dot.depth >= depth => {}
            _ => self.dots[index] = Some(Dot { depth, color }),
        }
    }

    pub fn plot_projected(&mut self, p: Projected, color: Rgb) {
        self.plot(p.x, p.y, p.depth, color);
    }

    /// Straight segment with interpolated depth
    pub fn line(&mut self, a: Projected, b: Projected, color: Rgb) {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let steps = dx.abs().max(dy.abs());
        if steps == 0 {
            self.plot(a.x, a.y, a.depth.max(b.depth), color);
            return;
        }
        // Off-canvas segments from wild projections are not worth walking
        if steps > 4 * (self.width() + self.height()) as i32 {
            return;
        }
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = a.x + (dx as f32 * t).round() as i32;
            let y = a.y + (dy as f32 * t).round() as i32;
            self.plot(x, y, a.depth + (b.depth - a.depth) * t, color);
        }
    }

    /// Braille glyph and colour of one cell
    pub fn cell(&self, col: usize, row: usize) -> Option<(char, Rgb)> {
        let mut bits = 0u8;
        let mut nearest: Option<Dot> = None;
        for (dy, row_bits) in DOT_BITS.iter().enumerate() {
            for (dx, &bit) in row_bits.iter().enumerate() {
                let index = (row * 4 + dy) * self.width() + col * 2 + dx;
                if let Some(dot) = self.dots[index] {
                    bits |= bit;
                    if nearest.map_or(true, |n| dot.depth > n.depth) {
                        nearest = Some(dot);
                    }
                }
            }
        }
        let dot = nearest?;
        let ch = char::from_u32(0x2800 + bits as u32)?;
        Some((ch, dot.color))
    }

    /// Copy every non-empty cell into the terminal buffer
    pub fn blit(&self, term: &mut Terminal) {
        for row in 0..self.rows {
            for col in 0..self.cols {
                if let Some((ch, color)) = self.cell(col, row) {
                    term.set(col as i32, row as i32, ch, Some(color.into()), false);
                }
            }
        }
    }
}
