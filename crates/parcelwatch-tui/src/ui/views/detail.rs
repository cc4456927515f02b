use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use parcelwatch_core::models::{Package, TrackingEvent, TrackingInfo};
use parcelwatch_core::utils::format_optional;

use crate::app::{App, DetailView, Load};
use crate::ui::render::centered_rect_fixed;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(detail) = app.detail.as_ref() else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(5)])
        .split(area);

    render_summary(frame, detail, chunks[0]);
    render_timeline(frame, detail, chunks[1]);
}

fn field_line(label: &'static str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {:<14}", label), styles::muted_style()),
        Span::raw(value),
    ])
}

fn package_lines(package: &Package) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            format!(" {}", package.display_name()),
            styles::title_style(),
        )),
        field_line("Tracking no.", package.tracking_number.clone()),
        field_line("Carrier", package.carrier_display()),
    ];
    if let Some(ref created) = package.created_at {
        lines.push(field_line("Added", created.clone()));
    }
    lines
}

/// Lines for the tracking part of the summary. A failed lookup keeps the
/// package fields on screen and shows a placeholder here instead.
fn tracking_lines(tracking: &Load<TrackingInfo>, updating_carrier: bool) -> Vec<Line<'static>> {
    let mut lines = match tracking {
        Load::Idle => Vec::new(),
        Load::Loading => vec![Line::from(Span::styled(
            " Fetching tracking from carrier...",
            styles::muted_style(),
        ))],
        Load::Failed(message) => vec![
            field_line("Status", "Tracking unavailable".to_string()),
            Line::from(Span::styled(format!(" {}", message), styles::error_style())),
        ],
        Load::Loaded(info) => {
            let status = format_optional(info.status.as_deref(), "Unknown");
            vec![
                Line::from(vec![
                    Span::styled(format!(" {:<14}", "Status"), styles::muted_style()),
                    Span::styled(status.clone(), styles::package_status_style(&status)),
                ]),
                field_line("Location", format_optional(info.location.as_deref(), "-")),
            ]
        }
    };
    if updating_carrier {
        lines.push(Line::from(Span::styled(" Updating carrier...", styles::highlight_style())));
    }
    lines
}

fn render_summary(frame: &mut Frame, detail: &DetailView, area: Rect) {
    let mut lines = match &detail.package {
        Load::Loaded(package) => package_lines(package),
        Load::Failed(message) => vec![Line::from(Span::styled(
            format!(" {}", message),
            styles::error_style(),
        ))],
        Load::Idle | Load::Loading => vec![Line::from(Span::styled(
            " Loading package...",
            styles::muted_style(),
        ))],
    };
    lines.extend(tracking_lines(&detail.tracking, detail.updating_carrier));

    let block = Block::default()
        .title(" Package ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn event_item(event: &TrackingEvent) -> ListItem<'static> {
    let mut spans = vec![
        Span::styled(format!(" {:<20}", event.formatted_timestamp()), styles::muted_style()),
        Span::styled(event.status.clone(), styles::package_status_style(&event.status)),
    ];
    if let Some(ref location) = event.location {
        spans.push(Span::styled(format!("  {}", location), styles::muted_style()));
    }
    ListItem::new(Line::from(spans))
}

fn render_timeline(frame: &mut Frame, detail: &DetailView, area: Rect) {
    let block = Block::default()
        .title(format!(" Tracking history ({}) ", detail.timeline.len()))
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    if detail.timeline.is_empty() {
        let message = match detail.tracking {
            Load::Loaded(_) => " No tracking events yet",
            Load::Failed(_) => " History unavailable",
            Load::Idle | Load::Loading => "",
        };
        frame.render_widget(
            Paragraph::new(Span::styled(message, styles::muted_style())).block(block),
            area,
        );
        return;
    }

    let items: Vec<ListItem> = detail.timeline.iter().map(event_item).collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(styles::selected_style());

    let mut state = ListState::default();
    state.select(Some(detail.timeline_scroll));
    frame.render_stateful_widget(list, area, &mut state);
}

pub fn render_carrier_overlay(frame: &mut Frame, app: &App) {
    let Some(detail) = app.detail.as_ref() else {
        return;
    };
    let options = app.carrier_options();
    let height = (options.len() as u16 + 4).min(20);
    let area = centered_rect_fixed(36, height, frame.area());
    frame.render_widget(Clear, area);

    let items: Vec<ListItem> = options
        .iter()
        .map(|c| ListItem::new(Line::from(format!(" {}", c.name))))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .title(" Carrier ")
                .title_style(styles::title_style())
                .title_bottom(Line::from(Span::styled(
                    " Enter select, Esc cancel ",
                    styles::muted_style(),
                )))
                .borders(Borders::ALL)
                .border_style(styles::border_style(true))
                .style(Style::default()),
        )
        .highlight_style(styles::selected_style())
        .highlight_symbol("▶");

    let mut state = ListState::default();
    state.select(Some(detail.carrier_selection));
    frame.render_stateful_widget(list, area, &mut state);
}
