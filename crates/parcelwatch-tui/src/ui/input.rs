//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, AppState, Screen, PAGE_SCROLL_SIZE};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return false;
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return true;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return false;
    }

    if app.screen.is_auth() {
        return handle_auth_input(app, key);
    }

    match app.state {
        AppState::AddingPackage => {
            handle_add_package_input(app, key);
            return false;
        }
        AppState::ConfirmingDelete => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm_delete(),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return false;
        }
        AppState::ChoosingCarrier => {
            match key.code {
                KeyCode::Up | KeyCode::Char('k') => app.move_carrier_selection(false),
                KeyCode::Down | KeyCode::Char('j') => app.move_carrier_selection(true),
                KeyCode::Enter => app.apply_carrier(),
                KeyCode::Esc => app.state = AppState::Normal,
                _ => {}
            }
            return false;
        }
        _ => {}
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return false;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return false;
        }
        _ => {}
    }

    match app.screen {
        Screen::Dashboard => handle_dashboard_input(app, key),
        Screen::PackageDetail => handle_detail_input(app, key),
        _ => {}
    }
    false
}

/// Login, registration and password reset forms.
fn handle_auth_input(app: &mut App, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('r') => app.show_screen(Screen::Register),
            KeyCode::Char('f') => app.show_screen(Screen::ForgotPassword),
            KeyCode::Char('t') => app.show_screen(Screen::ResetPassword),
            KeyCode::Char('l') => app.show_screen(Screen::Login),
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::Esc => {
            if app.screen == Screen::Login {
                app.state = AppState::Quitting;
                return true;
            }
            app.show_screen(Screen::Login);
        }
        KeyCode::Down | KeyCode::Tab => {
            if let Some(form) = app.current_form_mut() {
                form.focus_next();
            }
        }
        KeyCode::Up | KeyCode::BackTab => {
            if let Some(form) = app.current_form_mut() {
                form.focus_prev();
            }
        }
        KeyCode::Enter => {
            let last = app.current_form().is_some_and(|f| f.is_last_field());
            if last {
                app.submit_current_form();
            } else if let Some(form) = app.current_form_mut() {
                form.focus_next();
            }
        }
        KeyCode::Backspace => {
            if let Some(form) = app.current_form_mut() {
                form.pop_char();
            }
        }
        KeyCode::Char(c) => {
            if let Some(form) = app.current_form_mut() {
                form.push_char(c);
            }
        }
        _ => {}
    }
    false
}

fn handle_dashboard_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.select_prev_package(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next_package(),
        KeyCode::Home => app.package_selection = 0,
        KeyCode::End => app.package_selection = app.packages.len().saturating_sub(1),
        KeyCode::Enter => app.open_selected_package(),
        KeyCode::Char('a') => app.open_add_package(),
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
        KeyCode::Char('r') => app.refresh_packages(),
        KeyCode::Char('L') => app.logout(),
        _ => {}
    }
}

fn handle_add_package_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.state = AppState::Normal,
        KeyCode::Tab | KeyCode::Down => app.add_form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => app.add_form.focus_prev(),
        KeyCode::Left => app.cycle_add_carrier(false),
        KeyCode::Right => app.cycle_add_carrier(true),
        KeyCode::Enter => app.submit_add_package(),
        KeyCode::Backspace => app.add_form.pop_char(),
        KeyCode::Char(c) => {
            app.add_form.push_char(c);
        }
        _ => {}
    }
}

fn handle_detail_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Backspace => app.back_to_dashboard(),
        KeyCode::Char('r') => app.refresh_tracking(),
        KeyCode::Char('c') => app.open_carrier_chooser(),
        KeyCode::Up | KeyCode::Char('k') => app.scroll_timeline(-1),
        KeyCode::Down | KeyCode::Char('j') => app.scroll_timeline(1),
        KeyCode::PageUp => app.scroll_timeline(-(PAGE_SCROLL_SIZE as isize)),
        KeyCode::PageDown => app.scroll_timeline(PAGE_SCROLL_SIZE as isize),
        _ => {}
    }
}
