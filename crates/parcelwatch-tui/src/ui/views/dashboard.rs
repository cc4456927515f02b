use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame,
};

use parcelwatch_core::models::Package;
use parcelwatch_core::utils::{format_optional, truncate_string};

use crate::app::{fields, App};
use crate::ui::render::centered_rect_fixed;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let title = if app.packages_loading {
        format!(" Packages ({}) - loading... ", app.packages.len())
    } else {
        format!(" Packages ({}) ", app.packages.len())
    };
    let block = Block::default()
        .title(title)
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    if app.packages.is_empty() {
        let message = match (&app.packages_error, app.packages_loading) {
            (Some(error), _) => Line::from(Span::styled(format!(" {}", error), styles::error_style())),
            (None, true) => Line::from(Span::styled(" Loading packages...", styles::muted_style())),
            (None, false) => Line::from(vec![
                Span::styled(" No packages yet. Press ", styles::muted_style()),
                Span::styled("[a]", styles::help_key_style()),
                Span::styled(" to add one.", styles::muted_style()),
            ]),
        };
        frame.render_widget(Paragraph::new(vec![Line::from(""), message]).block(block), area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("Package"),
        Cell::from("Tracking number"),
        Cell::from("Carrier"),
        Cell::from("Status"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = app
        .packages
        .iter()
        .enumerate()
        .map(|(i, package)| {
            let style = if i == app.package_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let status = status_cell(package);
            let status_style = styles::package_status_style(&status);
            Row::new(vec![
                Cell::from(truncate_string(package.display_name(), 32)),
                Cell::from(package.tracking_number.as_str()),
                Cell::from(package.carrier_display()),
                Cell::from(Span::styled(status, status_style)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(30),
        Constraint::Length(24),
        Constraint::Length(10),
        Constraint::Fill(1),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.package_selection));

    // Inline error above the list when a refresh failed but old rows remain
    if let Some(ref error) = app.packages_error {
        let chunks = Layout::default()
            .constraints([Constraint::Length(1), Constraint::Min(3)])
            .split(area);
        frame.render_widget(
            Paragraph::new(Span::styled(format!(" {}", error), styles::error_style())),
            chunks[0],
        );
        frame.render_stateful_widget(table, chunks[1], &mut state);
    } else {
        frame.render_stateful_widget(table, area, &mut state);
    }
}

fn status_cell(package: &Package) -> String {
    format_optional(package.status_line().as_deref(), "Not tracked yet")
}

pub fn render_add_overlay(frame: &mut Frame, app: &App) {
    let form = &app.add_form;
    let mut lines = vec![Line::from("")];

    for (i, field) in form.fields.iter().enumerate() {
        let focused = i == form.focus;
        let cursor = if focused { "▌" } else { " " };
        let value = truncate_string(&field.value, 30);
        lines.push(Line::from(vec![
            Span::styled(format!(" {:>16}: [", field.label), styles::muted_style()),
            Span::styled(format!("{:<30}{}", value, cursor), styles::input_style(focused)),
            Span::styled("]", styles::muted_style()),
        ]));
    }
    lines.push(Line::from(vec![
        Span::styled(format!(" {:>16}:  ", "Carrier"), styles::muted_style()),
        Span::styled("◀ ", styles::help_key_style()),
        Span::styled(app.add_carrier_label(), styles::highlight_style()),
        Span::styled(" ▶", styles::help_key_style()),
    ]));
    lines.push(Line::from(""));

    if form.submitting {
        lines.push(Line::from(Span::styled(" Adding package...", styles::highlight_style())));
    } else if form.value(fields::ADD_TRACKING_NUMBER).trim().is_empty() {
        lines.push(Line::from(Span::styled(
            " Tracking number is required",
            styles::muted_style(),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            " Enter to add, ←/→ carrier, Esc to cancel",
            styles::muted_style(),
        )));
    }
    if let Some(ref error) = form.error {
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let area = centered_rect_fixed(58, lines.len() as u16 + 2, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Add package ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn render_delete_overlay(frame: &mut Frame, app: &App) {
    let Some(package) = app.selected_package() else {
        return;
    };
    let area = centered_rect_fixed(52, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("   Delete ", styles::highlight_style()),
            Span::styled(truncate_string(package.display_name(), 36), styles::title_style()),
            Span::styled("?", styles::highlight_style()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to delete, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
