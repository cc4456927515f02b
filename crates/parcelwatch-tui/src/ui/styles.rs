use ratatui::style::{Color, Modifier, Style};

// Color palette
pub const PRIMARY: Color = Color::Rgb(64, 128, 192);
pub const SECONDARY: Color = Color::Rgb(96, 160, 96);
pub const ACCENT: Color = Color::Rgb(192, 160, 64);
pub const ERROR: Color = Color::Rgb(192, 64, 64);
pub const MUTED: Color = Color::Rgb(128, 128, 128);
pub const HIGHLIGHT: Color = Color::Rgb(48, 48, 64);

// Styles
pub fn title_style() -> Style {
    Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn selected_style() -> Style {
    Style::default()
        .bg(HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default().fg(Color::White)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn highlight_style() -> Style {
    Style::default().fg(ACCENT)
}

pub fn success_style() -> Style {
    Style::default().fg(SECONDARY)
}

pub fn error_style() -> Style {
    Style::default().fg(ERROR)
}

pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(PRIMARY)
    } else {
        Style::default().fg(MUTED)
    }
}

pub fn input_style(focused: bool) -> Style {
    if focused {
        selected_style()
    } else {
        list_item_style()
    }
}

pub fn status_bar_style() -> Style {
    Style::default().bg(Color::Rgb(32, 32, 40)).fg(Color::White)
}

pub fn help_key_style() -> Style {
    Style::default()
        .fg(ACCENT)
        .add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    Style::default().fg(Color::White)
}

/// Color a carrier status string by how far along the package is.
pub fn package_status_style(status: &str) -> Style {
    let status = status.to_ascii_lowercase();
    if status.contains("error") || status.contains("exception") || status.contains("fail") {
        error_style()
    } else if status.contains("deliver") && !status.contains("out for") {
        success_style()
    } else if status.contains("transit") || status.contains("out for") {
        highlight_style()
    } else {
        list_item_style()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_status_style() {
        assert_eq!(package_status_style("Delivered"), success_style());
        assert_eq!(package_status_style("Out for Delivery"), highlight_style());
        assert_eq!(package_status_style("In transit"), highlight_style());
        assert_eq!(package_status_style("Delivery exception"), error_style());
        assert_eq!(package_status_style("Registered"), list_item_style());
    }
}
