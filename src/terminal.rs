use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{poll, read, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    Command,
};
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Terminal abstraction for rendering
pub struct Terminal {
    width: u16,
    height: u16,
    buffer: Vec<Vec<Cell>>,
    /// What is currently on screen, for diffing
    front: Vec<Vec<Option<Cell>>>,
    alternate_screen: bool,
}

/// A single cell in the terminal buffer
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bold: false,
        }
    }
}

impl Terminal {
    /// Initialize the terminal for drawing
    pub fn new(alternate_screen: bool) -> io::Result<Self> {
        let (width, height) = size()?;

        if alternate_screen {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        }

        Ok(Self::with_size(width, height, alternate_screen))
    }

    /// A buffer of fixed size that never touches the real terminal
    pub fn offscreen(width: u16, height: u16) -> Self {
        Self::with_size(width, height, false)
    }

    fn with_size(width: u16, height: u16, alternate_screen: bool) -> Self {
        Self {
            width,
            height,
            buffer: vec![vec![Cell::default(); width as usize]; height as usize],
            front: vec![vec![None; width as usize]; height as usize],
            alternate_screen,
        }
    }

    /// Get terminal dimensions
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Query the real terminal and resize the buffers if it changed
    pub fn refresh_size(&mut self) -> io::Result<bool> {
        let (width, height) = size()?;
        if (width, height) == (self.width, self.height) {
            return Ok(false);
        }
        self.resize(width, height);
        execute!(stdout(), Clear(ClearType::All))?;
        Ok(true)
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.buffer = vec![vec![Cell::default(); width as usize]; height as usize];
        self.front = vec![vec![None; width as usize]; height as usize];
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        for row in &mut self.buffer {
            row.fill(Cell::default());
        }
    }

    /// Set a character at position with optional color
    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize][x as usize] = Cell { ch, fg, bold };
        }
    }

    /// Set a string starting at position
    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg, bold);
        }
    }

    /// Write the cells that changed since the last present
    pub fn present(&mut self) -> io::Result<()> {
        let mut out = stdout().lock();
        let mut last_fg: Option<Option<Color>> = None;
        let mut last_bold = false;

        for (y, (row, front_row)) in self.buffer.iter().zip(self.front.iter_mut()).enumerate() {
            let mut cursor_at: Option<usize> = None;
            for (x, (cell, shown)) in row.iter().zip(front_row.iter_mut()).enumerate() {
                if shown.as_ref() == Some(cell) {
                    continue;
                }
                if cursor_at != Some(x) {
                    queue!(out, MoveTo(x as u16, y as u16))?;
                }
                if last_fg != Some(cell.fg) {
                    match cell.fg {
                        Some(color) => queue!(out, SetForegroundColor(color))?,
                        None => {
                            // SGR 0 drops bold as well
                            queue!(out, ResetColor)?;
                            last_bold = false;
                        }
                    }
                    last_fg = Some(cell.fg);
                }
                if cell.bold != last_bold {
                    let attribute = if cell.bold { Attribute::Bold } else { Attribute::NormalIntensity };
                    queue!(out, SetAttribute(attribute))?;
                    last_bold = cell.bold;
                }
                queue!(out, Print(cell.ch))?;
                cursor_at = Some(x + 1);
                *shown = Some(cell.clone());
            }
        }

        queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
        out.flush()
    }

    /// Force the next present to redraw everything
    pub fn invalidate(&mut self) {
        for row in &mut self.front {
            row.fill(None);
        }
    }

    /// Check for keypress (non-blocking), returns (code, modifiers)
    pub fn check_key(&self) -> io::Result<Option<(KeyCode, KeyModifiers)>> {
        while poll(Duration::from_millis(0))? {
            if let Event::Key(key_event) = read()? {
                if key_event.kind != KeyEventKind::Release {
                    return Ok(Some((key_event.code, key_event.modifiers)));
                }
            }
        }
        Ok(None)
    }

    /// Buffer as text with ANSI colors (for print mode)
    pub fn to_ansi_string(&self) -> String {
        let mut out = String::new();
        for row in &self.buffer {
            let mut style: Option<(Option<Color>, bool)> = None;
            for cell in row {
                let wanted = if cell.ch == ' ' { (None, false) } else { (cell.fg, cell.bold) };
                if style != Some(wanted) {
                    if style.is_some_and(|(fg, bold)| fg.is_some() || bold) {
                        let _ = SetAttribute(Attribute::Reset).write_ansi(&mut out);
                    }
                    if wanted.1 {
                        let _ = SetAttribute(Attribute::Bold).write_ansi(&mut out);
                    }
                    if let Some(color) = wanted.0 {
                        let _ = SetForegroundColor(color).write_ansi(&mut out);
                    }
                    style = Some(wanted);
                }
                out.push(cell.ch);
            }
            if style.is_some_and(|(fg, bold)| fg.is_some() || bold) {
                let _ = SetAttribute(Attribute::Reset).write_ansi(&mut out);
            }
            out.push('\n');
        }
        out
    }

    /// Buffer as plain text, trailing spaces trimmed (print --plain)
    pub fn to_plain_string(&self) -> String {
        let mut out = String::new();
        for row in &self.buffer {
            let line: String = row.iter().map(|c| c.ch).collect();
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.alternate_screen {
            let _ = execute!(stdout(), ResetColor, Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }
    }
}
