//! Utility helper functions for the UI module.

use std::io::{self, Stdout};

use anyhow::Result;
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::Terminal;

/// Fill an entire area with a background color
pub fn fill_area(buf: &mut Buffer, area: Rect, color: Color) {
    let style = Style::default().bg(color);
    for y in area.y..area.y + area.height {
        for x in area.x..area.x + area.width {
            buf.set_string(x, y, " ", style);
        }
    }
}

/// Truncate or pad a string to exactly the given width
pub fn truncate_or_pad(s: &str, width: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() >= width {
        chars[..width].iter().collect()
    } else {
        let mut result: String = chars.into_iter().collect();
        result.push_str(&" ".repeat(width - result.len()));
        result
    }
}

/// Set up the terminal for TUI mode
pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal mode
pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(())
}

/// Format time as relative (e.g., "2h ago", "3d ago")
pub fn format_relative_time(iso_time: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(iso_time)
        .map(|dt| {
            let now = chrono::Utc::now();
            let diff = now.signed_duration_since(dt);
            if diff.num_hours() < 1 {
                format!("{}m ago", diff.num_minutes())
            } else if diff.num_days() < 1 {
                format!("{}h ago", diff.num_hours())
            } else {
                format!("{}d ago", diff.num_days())
            }
        })
        .unwrap_or_else(|_| iso_time.to_string())
}

/// Character-based text wrapping - breaks at width boundary
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut result = Vec::new();
    for line in text.lines() {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            result.push(String::new());
            continue;
        }
        let mut start = 0;
        while start < chars.len() {
            let end = (start + width).min(chars.len());
            result.push(chars[start..end].iter().collect());
            start = end;
        }
    }
    result
}

/// Open a URL with the platform launcher; failures are silently ignored
pub fn open_in_browser(url: &str) {
    #[cfg(target_os = "macos")]
    let launcher = "open";
    #[cfg(not(target_os = "macos"))]
    let launcher = "xdg-open";

    let _ = std::process::Command::new(launcher)
        .arg(url)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_or_pad() {
        assert_eq!(truncate_or_pad("hello", 3), "hel");
        assert_eq!(truncate_or_pad("hi", 5), "hi   ");
        assert_eq!(truncate_or_pad("", 3), "   ");
    }

    #[test]
    fn test_wrap_text_breaks_long_lines() {
        let wrapped = wrap_text("abcdefghij", 4);
        assert_eq!(wrapped, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_text_preserves_empty_lines() {
        let wrapped = wrap_text("a\n\nb", 10);
        assert_eq!(wrapped, vec!["a", "", "b"]);
    }

    #[test]
    fn test_wrap_text_zero_width() {
        let wrapped = wrap_text("abc", 0);
        assert_eq!(wrapped, vec!["abc"]);
    }

    #[test]
    fn test_format_relative_time_invalid_passthrough() {
        assert_eq!(format_relative_time("not-a-date"), "not-a-date");
    }
}
