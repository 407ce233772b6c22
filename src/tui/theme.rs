use ratatui::style::{Color, Modifier, Style};

use crate::search::Availability;

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub header_style: Style,
    pub footer_style: Style,
    pub log_style: Style,
    pub error_style: Style,
    pub input_style: Style,
    pub notice_style: Style,
    pub heading_style: Style,
    pub selected_heading_style: Style,
    pub detail_style: Style,
    pub available_style: Style,
    pub on_order_style: Style,
    pub unavailable_style: Style,
    pub unknown_style: Style,
    pub cart_style: Style,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: "dark".to_string(),
            header_style: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            footer_style: Style::default().fg(Color::Cyan),
            log_style: Style::default().fg(Color::White),
            error_style: Style::default().fg(Color::LightRed),
            input_style: Style::default().fg(Color::White),
            notice_style: Style::default().fg(Color::Yellow),
            heading_style: Style::default().fg(Color::LightBlue).add_modifier(Modifier::BOLD),
            selected_heading_style: Style::default()
                .bg(Color::DarkGray)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            detail_style: Style::default().fg(Color::DarkGray),
            available_style: Style::default().fg(Color::Green),
            on_order_style: Style::default().fg(Color::Yellow),
            unavailable_style: Style::default().fg(Color::Red),
            unknown_style: Style::default().fg(Color::Gray),
            cart_style: Style::default().fg(Color::White),
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light".to_string(),
            header_style: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            footer_style: Style::default().fg(Color::Blue),
            log_style: Style::default().fg(Color::Black),
            error_style: Style::default().fg(Color::Red),
            input_style: Style::default().fg(Color::Black),
            notice_style: Style::default().fg(Color::Magenta),
            heading_style: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected_heading_style: Style::default()
                .bg(Color::Gray)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
            detail_style: Style::default().fg(Color::DarkGray),
            available_style: Style::default().fg(Color::Green),
            on_order_style: Style::default().fg(Color::Magenta),
            unavailable_style: Style::default().fg(Color::Red),
            unknown_style: Style::default().fg(Color::DarkGray),
            cart_style: Style::default().fg(Color::Black),
        }
    }

    /// Unknown names fall back to the dark theme.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "light" => Self::light(),
            _ => Self::dark(),
        }
    }

    pub fn badge_style(&self, availability: Availability) -> Style {
        match availability {
            Availability::Available => self.available_style,
            Availability::OnOrder => self.on_order_style,
            Availability::Unavailable => self.unavailable_style,
            Availability::Unknown | Availability::Missing => self.unknown_style,
        }
    }
}
