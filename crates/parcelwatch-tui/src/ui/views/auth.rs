//! Login, registration and password reset forms.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, Form, Screen};
use crate::ui::render::centered_rect_fixed;
use crate::ui::styles;

const DIALOG_WIDTH: u16 = 56;
const LABEL_WIDTH: usize = 14;
const INPUT_WIDTH: usize = 30;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(form) = app.current_form() else {
        return;
    };
    let intro = match app.screen {
        Screen::Login => "Log in to track your packages",
        Screen::Register => "Create a new account",
        Screen::ForgotPassword => "We'll email you a reset link",
        Screen::ResetPassword => "Paste the token from the reset email",
        Screen::Dashboard | Screen::PackageDetail => "",
    };

    let mut lines = vec![
        Line::from(Span::styled(format!(" {}", intro), styles::muted_style())),
        Line::from(""),
    ];

    for (i, field) in form.fields.iter().enumerate() {
        let focused = i == form.focus;
        let cursor = if focused { "▌" } else { " " };
        lines.push(Line::from(vec![
            Span::styled(format!(" {:>width$}: [", field.label, width = LABEL_WIDTH), styles::muted_style()),
            Span::styled(
                format!(
                    "{:<width$}{}",
                    field_display(&field.value, field.masked, INPUT_WIDTH),
                    cursor,
                    width = INPUT_WIDTH
                ),
                styles::input_style(focused),
            ),
            Span::styled("]", styles::muted_style()),
        ]));
    }

    lines.push(Line::from(""));
    lines.extend(form_footer(form));

    let height = lines.len() as u16 + 2;
    let dialog = centered_rect_fixed(DIALOG_WIDTH + LABEL_WIDTH as u16, height, area);
    frame.render_widget(Clear, dialog);

    let block = Block::default()
        .title(format!(" {} ", app.screen.title()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), dialog);
}

/// Submit state, then error, then notice.
fn form_footer(form: &Form) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if form.submitting {
        lines.push(Line::from(Span::styled(" Please wait...", styles::highlight_style())));
    } else {
        lines.push(Line::from(Span::styled(
            " Enter to continue, Tab to switch fields",
            styles::muted_style(),
        )));
    }
    if let Some(ref error) = form.error {
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }
    if let Some(ref notice) = form.notice {
        lines.push(Line::from(Span::styled(format!(" {}", notice), styles::success_style())));
    }
    lines
}

/// Text shown inside an input box: masked if secret, and only the tail
/// when longer than the box.
fn field_display(value: &str, masked: bool, width: usize) -> String {
    let count = value.chars().count();
    if masked {
        return "*".repeat(count.min(width));
    }
    if count <= width {
        value.to_string()
    } else {
        value.chars().skip(count - width).collect()
    }
}
