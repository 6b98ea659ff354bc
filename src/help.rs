use crate::colors::palette;
use crate::terminal::Terminal;
use crossterm::style::Color;

/// Key bindings shown by `?`
pub const KEYS: &[(&str, &str)] = &[
    ("q/Esc", "Quit"),
    ("Space", "Pause"),
    ("←/→ h/l", "Rotate"),
    ("↑/↓ k/j", "Tilt"),
    ("+/-", "Zoom in/out"),
    ("0", "Reset view"),
    ("r", "Toggle auto-rotate"),
    ("c", "Toggle country meshes"),
    ("g", "Toggle graticule"),
    ("o", "Toggle ocean"),
    ("?", "Close help"),
];

pub fn help_text() -> String {
    let key_width = KEYS.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    let mut text = String::from("NETGLOBE\n");
    text.push_str(&"─".repeat(key_width + 24));
    for (key, action) in KEYS {
        let pad = key_width - key.chars().count();
        text.push_str(&format!("\n{key}{}  {action}", " ".repeat(pad)));
    }
    text
}

/// Render a centered help overlay box with the provided text.
pub fn render_help_overlay(term: &mut Terminal, help_text: &str) {
    let lines: Vec<&str> = help_text.lines().collect();
    if lines.is_empty() {
        return;
    }

    let (width, height) = term.size();
    let inner = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 2;
    let box_width = inner + 2;
    let box_height = lines.len() + 2;
    let left = (width as usize).saturating_sub(box_width) as i32 / 2;
    let top = (height as usize).saturating_sub(box_height) as i32 / 2;

    let border = Some(Color::from(palette::HUD_ACCENT));
    let text_color = Some(Color::from(palette::HUD));
    let bottom = top + box_height as i32 - 1;

    let rule = "─".repeat(inner);
    term.set_str(left, top, &format!("┌{rule}┐"), border, false);
    term.set_str(left, bottom, &format!("└{rule}┘"), border, false);

    for (i, line) in lines.iter().enumerate() {
        let y = top + 1 + i as i32;
        let padded = format!(" {line:<width$} ", width = inner - 2);
        term.set(left, y, '│', border, false);
        term.set_str(left + 1, y, &padded, text_color, i == 0);
        term.set(left + box_width as i32 - 1, y, '│', border, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_lists_every_key() {
        let text = help_text();
        for (key, action) in KEYS {
            assert!(text.contains(key) && text.contains(action), "{key}");
        }
    }

    #[test]
    fn overlay_is_centered_and_boxed() {
        let mut term = Terminal::offscreen(20, 5);
        render_help_overlay(&mut term, "ab\ncd");
        let text = term.to_plain_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "       ┌────┐");
        assert_eq!(lines[1], "       │ ab │");
        assert_eq!(lines[2], "       │ cd │");
        assert_eq!(lines[3], "       └────┘");
    }

    #[test]
    fn oversized_overlay_does_not_panic() {
        let mut term = Terminal::offscreen(4, 2);
        render_help_overlay(&mut term, &help_text());
    }
}
