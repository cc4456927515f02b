//! Application state management for parcelwatch.
//!
//! This module contains the core `App` struct that manages all application
//! state: which screen is showing, form input, loaded packages and tracking
//! data, and the background tasks that talk to the API.

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use parcelwatch_core::models::package::AUTO_CARRIER;
use parcelwatch_core::models::{
    sorted_history, Carrier, NewPackage, Package, PackageUpdate, TrackingEvent, TrackingInfo,
};
use parcelwatch_core::{ApiClient, ApiError, ApiResult, Config};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for username and email input.
const MAX_USERNAME_LENGTH: usize = 64;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Reset tokens are JWTs pasted from the email link.
const MAX_TOKEN_LENGTH: usize = 1024;

const MAX_TRACKING_NUMBER_LENGTH: usize = 64;

const MAX_LABEL_LENGTH: usize = 80;

/// Number of timeline rows to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

// ============================================================================
// UI State Types
// ============================================================================

/// Top-level screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Register,
    ForgotPassword,
    ResetPassword,
    Dashboard,
    PackageDetail,
}

impl Screen {
    pub fn title(&self) -> &'static str {
        match self {
            Screen::Login => "Log in",
            Screen::Register => "Create account",
            Screen::ForgotPassword => "Forgot password",
            Screen::ResetPassword => "Reset password",
            Screen::Dashboard => "Packages",
            Screen::PackageDetail => "Package details",
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Screen::Login | Screen::Register | Screen::ForgotPassword | Screen::ResetPassword
        )
    }
}

/// Overlay / modal state on top of the current screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    AddingPackage,
    ConfirmingDelete,
    ChoosingCarrier,
    ConfirmingQuit,
    Quitting,
}

/// Remote data lifecycle for one control
#[derive(Debug, Clone, PartialEq)]
pub enum Load<T> {
    Idle,
    Loading,
    Loaded(T),
    Failed(String),
}

impl<T> Load<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Load::Loading)
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            Load::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Clone)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
    pub masked: bool,
    max_len: usize,
}

impl FormField {
    fn text(label: &'static str, max_len: usize) -> Self {
        Self {
            label,
            value: String::new(),
            masked: false,
            max_len,
        }
    }

    fn secret(label: &'static str) -> Self {
        Self {
            masked: true,
            ..Self::text(label, MAX_PASSWORD_LENGTH)
        }
    }
}

/// A vertical list of input fields with one focused field, an inline error
/// line and an optional notice.
#[derive(Debug, Clone)]
pub struct Form {
    pub fields: Vec<FormField>,
    pub focus: usize,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub submitting: bool,
}

impl Form {
    fn new(fields: Vec<FormField>) -> Self {
        Self {
            fields,
            focus: 0,
            error: None,
            notice: None,
            submitting: false,
        }
    }

    pub fn value(&self, index: usize) -> &str {
        self.fields.get(index).map(|f| f.value.as_str()).unwrap_or("")
    }

    pub fn set_value(&mut self, index: usize, value: String) {
        if let Some(field) = self.fields.get_mut(index) {
            field.value = value;
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len().max(1);
    }

    pub fn focus_prev(&mut self) {
        let len = self.fields.len().max(1);
        self.focus = (self.focus + len - 1) % len;
    }

    pub fn is_last_field(&self) -> bool {
        self.focus + 1 >= self.fields.len()
    }

    /// Append a character to the focused field. Returns false if rejected.
    pub fn push_char(&mut self, c: char) -> bool {
        let Some(field) = self.fields.get_mut(self.focus) else {
            return false;
        };
        if !can_add_field_char(field.value.chars().count(), field.max_len, c) {
            return false;
        }
        field.value.push(c);
        self.error = None;
        true
    }

    pub fn pop_char(&mut self) {
        if let Some(field) = self.fields.get_mut(self.focus) {
            field.value.pop();
        }
    }

    /// Wipe masked fields, e.g. after a submit.
    pub fn clear_secrets(&mut self) {
        for field in self.fields.iter_mut().filter(|f| f.masked) {
            field.value.clear();
        }
    }

    pub fn reset(&mut self) {
        for field in &mut self.fields {
            field.value.clear();
        }
        self.focus = 0;
        self.error = None;
        self.notice = None;
        self.submitting = false;
    }
}

pub mod fields {
    pub const LOGIN_USERNAME: usize = 0;
    pub const LOGIN_PASSWORD: usize = 1;

    pub const REGISTER_EMAIL: usize = 0;
    pub const REGISTER_USERNAME: usize = 1;
    pub const REGISTER_PASSWORD: usize = 2;
    pub const REGISTER_CONFIRM: usize = 3;

    pub const FORGOT_EMAIL: usize = 0;

    pub const RESET_TOKEN: usize = 0;
    pub const RESET_PASSWORD: usize = 1;
    pub const RESET_CONFIRM: usize = 2;

    pub const ADD_TRACKING_NUMBER: usize = 0;
    pub const ADD_LABEL: usize = 1;
}

// ============================================================================
// Package detail
// ============================================================================

/// State of the package detail screen.
#[derive(Debug, Clone)]
pub struct DetailView {
    pub id: i64,
    pub package: Load<Package>,
    pub tracking: Load<TrackingInfo>,
    /// History sorted newest first, rebuilt whenever tracking loads
    pub timeline: Vec<TrackingEvent>,
    pub timeline_scroll: usize,
    pub carrier_selection: usize,
    pub updating_carrier: bool,
}

impl DetailView {
    fn new(id: i64) -> Self {
        Self {
            id,
            package: Load::Idle,
            tracking: Load::Idle,
            timeline: Vec::new(),
            timeline_scroll: 0,
            carrier_selection: 0,
            updating_carrier: false,
        }
    }

    fn set_tracking(&mut self, result: ApiResult<TrackingInfo>) {
        match result {
            Ok(info) => {
                self.timeline = sorted_history(&info.history);
                self.timeline_scroll = 0;
                self.tracking = Load::Loaded(info);
            }
            Err(e) => {
                self.timeline.clear();
                self.tracking = Load::Failed(e.user_message("Tracking information is unavailable"));
            }
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent from spawned API calls back to the main loop.
enum TaskResult {
    Login {
        username: String,
        result: ApiResult<String>,
    },
    Registered(ApiResult<()>),
    ResetRequested(ApiResult<()>),
    PasswordReset(ApiResult<()>),
    Packages(ApiResult<Vec<Package>>),
    Carriers(ApiResult<Vec<Carrier>>),
    PackageAdded(ApiResult<Package>),
    /// Delete outcome with the row that was optimistically removed
    PackageDeleted {
        package: Package,
        index: usize,
        result: ApiResult<()>,
    },
    Detail {
        id: i64,
        package: ApiResult<Package>,
        tracking: ApiResult<TrackingInfo>,
    },
    Tracking {
        id: i64,
        result: ApiResult<TrackingInfo>,
    },
    CarrierUpdated {
        id: i64,
        result: ApiResult<Package>,
    },
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    pub config: Config,
    pub api: ApiClient,

    pub state: AppState,
    pub screen: Screen,

    // Auth forms
    pub login_form: Form,
    pub register_form: Form,
    pub forgot_form: Form,
    pub reset_form: Form,

    // Dashboard
    pub packages: Vec<Package>,
    pub packages_loading: bool,
    pub packages_error: Option<String>,
    pub package_selection: usize,
    pub carriers: Vec<Carrier>,
    carriers_loading: bool,
    pub add_form: Form,
    /// 0 is auto-detect, n is `carriers[n - 1]`
    pub add_carrier_selection: usize,

    // Package detail
    pub detail: Option<DetailView>,

    pub status_message: Option<String>,

    task_rx: mpsc::Receiver<TaskResult>,
    task_tx: mpsc::Sender<TaskResult>,
}

impl App {
    pub fn new(config: Config, api: ApiClient) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let mut login_form = Form::new(vec![
            FormField::text("Username", MAX_USERNAME_LENGTH),
            FormField::secret("Password"),
        ]);
        let username = std::env::var(parcelwatch_core::config::ENV_USERNAME)
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();
        let password = std::env::var(parcelwatch_core::config::ENV_PASSWORD).unwrap_or_default();
        if !username.is_empty() {
            login_form.focus = fields::LOGIN_PASSWORD;
        }
        login_form.set_value(fields::LOGIN_USERNAME, username);
        login_form.set_value(fields::LOGIN_PASSWORD, password);

        Self {
            config,
            api,
            state: AppState::Normal,
            screen: Screen::Login,

            login_form,
            register_form: Form::new(vec![
                FormField::text("Email", MAX_USERNAME_LENGTH),
                FormField::text("Username", MAX_USERNAME_LENGTH),
                FormField::secret("Password"),
                FormField::secret("Confirm"),
            ]),
            forgot_form: Form::new(vec![FormField::text("Email", MAX_USERNAME_LENGTH)]),
            reset_form: Form::new(vec![
                FormField::text("Token", MAX_TOKEN_LENGTH),
                FormField::secret("New password"),
                FormField::secret("Confirm"),
            ]),

            packages: Vec::new(),
            packages_loading: false,
            packages_error: None,
            package_selection: 0,
            carriers: Vec::new(),
            carriers_loading: false,
            add_form: Form::new(vec![
                FormField::text("Tracking number", MAX_TRACKING_NUMBER_LENGTH),
                FormField::text("Label", MAX_LABEL_LENGTH),
            ]),
            add_carrier_selection: 0,

            detail: None,
            status_message: None,

            task_rx: rx,
            task_tx: tx,
        }
    }

    /// Pick the first screen: dashboard with a stored credential, else login.
    pub fn start(&mut self) {
        if self.is_authenticated() {
            info!("Stored session found");
            self.go_to_dashboard();
        } else {
            self.show_screen(Screen::Login);
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.api.session().is_authenticated()
    }

    /// Spawn an API call; its result comes back through the task channel.
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            if tx.send(task.await).await.is_err() {
                error!("Failed to send task result - channel closed");
            }
        });
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn show_screen(&mut self, screen: Screen) {
        debug!(?screen, "Switching screen");
        self.screen = screen;
        self.state = AppState::Normal;
        if let Some(form) = self.current_form_mut() {
            form.error = None;
            form.submitting = false;
        }
    }

    /// Form belonging to the current auth screen, if any.
    pub fn current_form(&self) -> Option<&Form> {
        match self.screen {
            Screen::Login => Some(&self.login_form),
            Screen::Register => Some(&self.register_form),
            Screen::ForgotPassword => Some(&self.forgot_form),
            Screen::ResetPassword => Some(&self.reset_form),
            Screen::Dashboard | Screen::PackageDetail => None,
        }
    }

    pub fn current_form_mut(&mut self) -> Option<&mut Form> {
        match self.screen {
            Screen::Login => Some(&mut self.login_form),
            Screen::Register => Some(&mut self.register_form),
            Screen::ForgotPassword => Some(&mut self.forgot_form),
            Screen::ResetPassword => Some(&mut self.reset_form),
            Screen::Dashboard | Screen::PackageDetail => None,
        }
    }

    pub fn go_to_dashboard(&mut self) {
        self.show_screen(Screen::Dashboard);
        self.detail = None;
        self.refresh_packages();
        if self.carriers.is_empty() {
            self.load_carriers();
        }
    }

    pub fn back_to_dashboard(&mut self) {
        self.detail = None;
        self.show_screen(Screen::Dashboard);
        // Tracking may have refreshed the cached status
        self.refresh_packages();
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn submit_current_form(&mut self) {
        match self.screen {
            Screen::Login => self.submit_login(),
            Screen::Register => self.submit_register(),
            Screen::ForgotPassword => self.submit_forgot_password(),
            Screen::ResetPassword => self.submit_reset_password(),
            Screen::Dashboard | Screen::PackageDetail => {}
        }
    }

    pub fn submit_login(&mut self) {
        if self.login_form.submitting {
            return;
        }
        let username = self.login_form.value(fields::LOGIN_USERNAME).trim().to_string();
        let password = self.login_form.value(fields::LOGIN_PASSWORD).to_string();
        if username.is_empty() || password.is_empty() {
            self.login_form.error = Some("Username and password required".to_string());
            return;
        }

        self.login_form.error = None;
        self.login_form.submitting = true;
        let api = self.api.clone();
        self.spawn(async move {
            let result = api.login(&username, &password).await;
            TaskResult::Login { username, result }
        });
    }

    pub fn submit_register(&mut self) {
        let form = &mut self.register_form;
        if form.submitting {
            return;
        }
        if form.value(fields::REGISTER_PASSWORD) != form.value(fields::REGISTER_CONFIRM) {
            form.error = Some("Passwords do not match".to_string());
            return;
        }

        form.error = None;
        form.submitting = true;
        let email = form.value(fields::REGISTER_EMAIL).to_string();
        let username = form.value(fields::REGISTER_USERNAME).to_string();
        let password = form.value(fields::REGISTER_PASSWORD).to_string();
        let api = self.api.clone();
        self.spawn(async move {
            TaskResult::Registered(api.register(&email, &username, &password).await)
        });
    }

    pub fn submit_forgot_password(&mut self) {
        if self.forgot_form.submitting {
            return;
        }
        self.forgot_form.error = None;
        self.forgot_form.notice = None;
        self.forgot_form.submitting = true;
        let email = self.forgot_form.value(fields::FORGOT_EMAIL).to_string();
        let api = self.api.clone();
        self.spawn(async move { TaskResult::ResetRequested(api.request_password_reset(&email).await) });
    }

    pub fn submit_reset_password(&mut self) {
        let form = &mut self.reset_form;
        if form.submitting {
            return;
        }
        if form.value(fields::RESET_PASSWORD) != form.value(fields::RESET_CONFIRM) {
            form.error = Some("Passwords do not match".to_string());
            return;
        }

        form.error = None;
        form.submitting = true;
        let token = form.value(fields::RESET_TOKEN).to_string();
        let password = form.value(fields::RESET_PASSWORD).to_string();
        let api = self.api.clone();
        self.spawn(async move { TaskResult::PasswordReset(api.reset_password(&token, &password).await) });
    }

    pub fn logout(&mut self) {
        if let Err(e) = self.api.logout() {
            warn!(error = %e, "Failed to clear session");
        }
        info!("Logged out");
        self.clear_user_data();
        self.show_screen(Screen::Login);
        self.login_form.notice = Some("You have been logged out".to_string());
    }

    /// Any 401: the client already dropped the credential, so go to login.
    /// A late 401 for a credential that has since been replaced is ignored.
    fn session_expired(&mut self) {
        if self.api.session().is_authenticated() {
            debug!("Ignoring 401 for a replaced credential");
            return;
        }
        warn!("Session expired, returning to login");
        self.clear_user_data();
        self.show_screen(Screen::Login);
        self.login_form.error = Some(ApiError::Unauthorized.user_message("Please log in again"));
    }

    fn clear_user_data(&mut self) {
        self.packages.clear();
        self.packages_loading = false;
        self.packages_error = None;
        self.package_selection = 0;
        self.detail = None;
        self.status_message = None;
        self.login_form.clear_secrets();
        self.login_form.submitting = false;
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    pub fn refresh_packages(&mut self) {
        if self.packages_loading {
            return;
        }
        self.packages_loading = true;
        self.packages_error = None;
        let api = self.api.clone();
        self.spawn(async move { TaskResult::Packages(api.list_packages().await) });
    }

    pub fn load_carriers(&mut self) {
        if self.carriers_loading {
            return;
        }
        self.carriers_loading = true;
        let api = self.api.clone();
        self.spawn(async move { TaskResult::Carriers(api.list_carriers().await) });
    }

    pub fn selected_package(&self) -> Option<&Package> {
        self.packages.get(self.package_selection)
    }

    pub fn select_next_package(&mut self) {
        if self.package_selection + 1 < self.packages.len() {
            self.package_selection += 1;
        }
    }

    pub fn select_prev_package(&mut self) {
        self.package_selection = self.package_selection.saturating_sub(1);
    }

    pub fn open_add_package(&mut self) {
        self.add_form.reset();
        self.add_carrier_selection = 0;
        self.state = AppState::AddingPackage;
    }

    /// Carrier label for the add form's carrier picker.
    pub fn add_carrier_label(&self) -> String {
        match self.add_carrier_selection {
            0 => "Auto-detect".to_string(),
            n => self
                .carriers
                .get(n - 1)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "Auto-detect".to_string()),
        }
    }

    pub fn cycle_add_carrier(&mut self, forward: bool) {
        let options = self.carriers.len() + 1;
        self.add_carrier_selection = if forward {
            (self.add_carrier_selection + 1) % options
        } else {
            (self.add_carrier_selection + options - 1) % options
        };
    }

    pub fn submit_add_package(&mut self) {
        if self.add_form.submitting {
            return;
        }
        let tracking_number = self.add_form.value(fields::ADD_TRACKING_NUMBER).trim().to_string();
        if tracking_number.is_empty() {
            self.add_form.error = Some("Please enter a tracking number".to_string());
            return;
        }
        let carrier = self
            .add_carrier_selection
            .checked_sub(1)
            .and_then(|i| self.carriers.get(i))
            .map(|c| c.id.clone());
        let package = NewPackage::new(tracking_number)
            .with_carrier(carrier.as_deref())
            .with_description(Some(self.add_form.value(fields::ADD_LABEL)));

        self.add_form.error = None;
        self.add_form.submitting = true;
        let api = self.api.clone();
        self.spawn(async move { TaskResult::PackageAdded(api.add_package(&package).await) });
    }

    pub fn request_delete(&mut self) {
        if self.selected_package().is_some() {
            self.state = AppState::ConfirmingDelete;
        }
    }

    /// Remove the row right away and restore it if the server refuses.
    pub fn confirm_delete(&mut self) {
        self.state = AppState::Normal;
        if self.package_selection >= self.packages.len() {
            return;
        }
        let index = self.package_selection;
        let package = self.packages.remove(index);
        if self.package_selection >= self.packages.len() {
            self.package_selection = self.packages.len().saturating_sub(1);
        }

        let id = package.id;
        let api = self.api.clone();
        self.spawn(async move {
            let result = api.delete_package(id).await;
            TaskResult::PackageDeleted { package, index, result }
        });
    }

    // =========================================================================
    // Package detail
    // =========================================================================

    pub fn open_selected_package(&mut self) {
        if let Some(id) = self.selected_package().map(|p| p.id) {
            self.open_package(id);
        }
    }

    /// Load package and tracking in parallel and show the detail screen.
    pub fn open_package(&mut self, id: i64) {
        let mut detail = DetailView::new(id);
        detail.package = Load::Loading;
        detail.tracking = Load::Loading;
        self.detail = Some(detail);
        self.show_screen(Screen::PackageDetail);

        let api = self.api.clone();
        self.spawn(async move {
            let (package, tracking) =
                futures::future::join(api.get_package(id), api.track_package(id)).await;
            TaskResult::Detail { id, package, tracking }
        });
    }

    pub fn refresh_tracking(&mut self) {
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        if detail.tracking.is_loading() {
            return;
        }
        detail.tracking = Load::Loading;
        let id = detail.id;
        let api = self.api.clone();
        self.spawn(async move {
            TaskResult::Tracking {
                id,
                result: api.track_package(id).await,
            }
        });
    }

    pub fn scroll_timeline(&mut self, delta: isize) {
        if let Some(detail) = self.detail.as_mut() {
            let max = detail.timeline.len().saturating_sub(1);
            let next = detail.timeline_scroll.saturating_add_signed(delta);
            detail.timeline_scroll = next.min(max);
        }
    }

    /// Options of the carrier picker on the detail screen: auto plus the
    /// server's list.
    pub fn carrier_options(&self) -> Vec<Carrier> {
        let mut options = vec![Carrier {
            id: AUTO_CARRIER.to_string(),
            name: "Auto-detect".to_string(),
        }];
        options.extend(self.carriers.iter().cloned());
        options
    }

    pub fn open_carrier_chooser(&mut self) {
        if self.carriers.is_empty() {
            self.load_carriers();
        }
        let options = self.carrier_options();
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        if detail.updating_carrier {
            return;
        }
        let current = detail
            .package
            .loaded()
            .and_then(|p| p.carrier.as_deref())
            .unwrap_or(AUTO_CARRIER);
        detail.carrier_selection = options
            .iter()
            .position(|c| c.id.eq_ignore_ascii_case(current))
            .unwrap_or(0);
        self.state = AppState::ChoosingCarrier;
    }

    pub fn move_carrier_selection(&mut self, forward: bool) {
        let count = self.carrier_options().len();
        if let Some(detail) = self.detail.as_mut() {
            detail.carrier_selection = if forward {
                (detail.carrier_selection + 1).min(count.saturating_sub(1))
            } else {
                detail.carrier_selection.saturating_sub(1)
            };
        }
    }

    /// Save the chosen carrier; tracking is re-fetched once it is stored.
    pub fn apply_carrier(&mut self) {
        self.state = AppState::Normal;
        let options = self.carrier_options();
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        let Some(carrier) = options.get(detail.carrier_selection) else {
            return;
        };
        detail.updating_carrier = true;
        let id = detail.id;
        let update = PackageUpdate::carrier(&carrier.id);
        let api = self.api.clone();
        self.spawn(async move {
            TaskResult::CarrierUpdated {
                id,
                result: api.update_package(id, &update).await,
            }
        });
    }

    // =========================================================================
    // Background results
    // =========================================================================

    /// Drain finished background tasks
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.task_rx.try_recv() {
            self.process_task_result(result);
        }
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Login { username, result } => {
                self.login_form.submitting = false;
                match result {
                    Ok(_) => {
                        self.login_form.clear_secrets();
                        self.login_form.notice = None;
                        if let Err(e) = self.config.remember_username(&username) {
                            warn!(error = %e, "Failed to save config");
                        }
                        self.go_to_dashboard();
                    }
                    Err(e) => {
                        error!(error = %e, "Login failed");
                        self.login_form.error = Some(e.user_message("Login failed"));
                    }
                }
            }
            TaskResult::Registered(result) => {
                self.register_form.submitting = false;
                match result {
                    Ok(()) => {
                        let username = self.register_form.value(fields::REGISTER_USERNAME).to_string();
                        self.register_form.reset();
                        self.login_form.set_value(fields::LOGIN_USERNAME, username);
                        self.login_form.focus = fields::LOGIN_PASSWORD;
                        self.show_screen(Screen::Login);
                        self.login_form.notice =
                            Some("Account created. Please log in.".to_string());
                    }
                    Err(e) => {
                        self.register_form.error = Some(e.user_message("Registration failed"));
                    }
                }
            }
            TaskResult::ResetRequested(result) => {
                self.forgot_form.submitting = false;
                match result {
                    Ok(()) => {
                        self.forgot_form.notice = Some(
                            "If the email exists, a password reset link has been sent".to_string(),
                        );
                    }
                    Err(e) => {
                        self.forgot_form.error = Some(e.user_message("Failed to send reset email"));
                    }
                }
            }
            TaskResult::PasswordReset(result) => {
                self.reset_form.submitting = false;
                match result {
                    Ok(()) => {
                        self.reset_form.reset();
                        self.show_screen(Screen::Login);
                        self.login_form.notice =
                            Some("Password updated. Please log in.".to_string());
                    }
                    Err(e) => {
                        self.reset_form.error = Some(e.user_message("Password reset failed"));
                    }
                }
            }
            TaskResult::Packages(result) => {
                self.packages_loading = false;
                match result {
                    Ok(packages) => {
                        self.packages = packages;
                        if self.package_selection >= self.packages.len() {
                            self.package_selection = self.packages.len().saturating_sub(1);
                        }
                    }
                    Err(e) if e.is_unauthorized() => self.session_expired(),
                    Err(e) => {
                        self.packages_error = Some(e.user_message("Failed to load packages"));
                    }
                }
            }
            TaskResult::Carriers(result) => {
                self.carriers_loading = false;
                match result {
                    Ok(carriers) => self.carriers = carriers,
                    Err(e) if e.is_unauthorized() => self.session_expired(),
                    // The picker still offers auto-detect
                    Err(e) => warn!(error = %e, "Failed to load carriers"),
                }
            }
            TaskResult::PackageAdded(result) => {
                self.add_form.submitting = false;
                match result {
                    Ok(package) => {
                        self.status_message = Some(format!("Added {}", package.display_name()));
                        self.packages.push(package);
                        self.package_selection = self.packages.len() - 1;
                        if self.state == AppState::AddingPackage {
                            self.state = AppState::Normal;
                        }
                    }
                    Err(e) if e.is_unauthorized() => self.session_expired(),
                    Err(e) => {
                        self.add_form.error = Some(e.user_message("Failed to add package"));
                    }
                }
            }
            TaskResult::PackageDeleted { package, index, result } => match result {
                Ok(()) => {
                    self.status_message = Some(format!("Deleted {}", package.display_name()));
                }
                // Already gone on the server; keep it removed
                Err(ApiError::NotFound(_)) => {
                    debug!(id = package.id, "Package was already deleted");
                }
                Err(e) if e.is_unauthorized() => self.session_expired(),
                Err(e) => {
                    self.status_message = Some(e.user_message("Failed to delete package"));
                    // A refresh may have brought the row back already
                    if !self.packages.iter().any(|p| p.id == package.id) {
                        let index = index.min(self.packages.len());
                        self.packages.insert(index, package);
                    }
                }
            },
            TaskResult::Detail { id, package, tracking } => {
                if package.as_ref().is_err_and(ApiError::is_unauthorized)
                    || tracking.as_ref().is_err_and(ApiError::is_unauthorized)
                {
                    self.session_expired();
                    return;
                }
                let Some(detail) = self.detail.as_mut().filter(|d| d.id == id) else {
                    return;
                };
                detail.package = match package {
                    Ok(package) => Load::Loaded(package),
                    Err(e) => Load::Failed(e.user_message("Failed to load package details")),
                };
                detail.set_tracking(tracking);
            }
            TaskResult::Tracking { id, result } => {
                if result.as_ref().is_err_and(ApiError::is_unauthorized) {
                    self.session_expired();
                    return;
                }
                if let Some(detail) = self.detail.as_mut().filter(|d| d.id == id) {
                    detail.set_tracking(result);
                }
            }
            TaskResult::CarrierUpdated { id, result } => {
                let Some(detail) = self.detail.as_mut().filter(|d| d.id == id) else {
                    if result.as_ref().is_err_and(ApiError::is_unauthorized) {
                        self.session_expired();
                    }
                    return;
                };
                detail.updating_carrier = false;
                match result {
                    Ok(package) => {
                        self.status_message =
                            Some(format!("Carrier set to {}", package.carrier_display()));
                        detail.package = Load::Loaded(package);
                        self.refresh_tracking();
                    }
                    Err(e) if e.is_unauthorized() => self.session_expired(),
                    Err(e) => {
                        self.status_message = Some(e.user_message("Failed to update carrier"));
                    }
                }
            }
        }
    }
}

/// Check if a character is valid for text input (printable, non-control)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a character can be appended to a field of the given length
pub fn can_add_field_char(current_len: usize, max_len: usize, c: char) -> bool {
    current_len < max_len && is_valid_input_char(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parcelwatch_core::auth::MemorySlot;
    use parcelwatch_core::Session;

    fn test_app() -> App {
        let session = Arc::new(Session::new(Box::new(MemorySlot::default())));
        // Nothing listens on the discard port; spawned calls just fail.
        let api = ApiClient::new("http://127.0.0.1:9", session).unwrap();
        App::new(Config::default(), api)
    }

    fn package(id: i64, tracking: &str) -> Package {
        Package {
            id,
            tracking_number: tracking.to_string(),
            carrier: Some("gls".to_string()),
            description: None,
            status: None,
            last_location: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn event(ts: &str, status: &str) -> TrackingEvent {
        TrackingEvent {
            timestamp: ts.to_string(),
            status: status.to_string(),
            location: None,
        }
    }

    // -------------------------------------------------------------------------
    // Form Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_can_add_field_char() {
        assert!(can_add_field_char(0, 10, 'a'));
        assert!(can_add_field_char(9, 10, '!'));
        assert!(!can_add_field_char(10, 10, 'a'));
        assert!(!can_add_field_char(0, 10, '\x00'));
        assert!(!can_add_field_char(0, 10, '\n'));
        assert!(!can_add_field_char(0, 10, '\t'));
    }

    #[test]
    fn test_form_focus_wraps() {
        let mut form = Form::new(vec![
            FormField::text("a", 5),
            FormField::text("b", 5),
            FormField::secret("c"),
        ]);
        form.focus_prev();
        assert_eq!(form.focus, 2);
        assert!(form.is_last_field());
        form.focus_next();
        assert_eq!(form.focus, 0);
    }

    #[test]
    fn test_form_input_and_secrets() {
        let mut form = Form::new(vec![FormField::text("user", 3), FormField::secret("pw")]);
        assert!(form.push_char('a'));
        assert!(form.push_char('b'));
        assert!(form.push_char('c'));
        assert!(!form.push_char('d'));
        assert_eq!(form.value(0), "abc");
        form.pop_char();
        assert_eq!(form.value(0), "ab");

        form.focus_next();
        form.push_char('x');
        form.clear_secrets();
        assert_eq!(form.value(0), "ab");
        assert_eq!(form.value(1), "");
    }

    // -------------------------------------------------------------------------
    // Screen Flow Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_login_requires_both_fields() {
        let mut app = test_app();
        app.login_form.set_value(fields::LOGIN_USERNAME, String::new());
        app.login_form.set_value(fields::LOGIN_PASSWORD, String::new());
        app.submit_login();
        assert_eq!(app.login_form.error.as_deref(), Some("Username and password required"));
        assert!(!app.login_form.submitting);
    }

    #[test]
    fn test_register_password_mismatch() {
        let mut app = test_app();
        app.register_form.set_value(fields::REGISTER_PASSWORD, "password1".into());
        app.register_form.set_value(fields::REGISTER_CONFIRM, "password2".into());
        app.submit_register();
        assert_eq!(app.register_form.error.as_deref(), Some("Passwords do not match"));
    }

    #[test]
    fn test_add_package_empty_tracking_number_rejected_locally() {
        let mut app = test_app();
        app.open_add_package();
        app.submit_add_package();
        assert_eq!(app.add_form.error.as_deref(), Some("Please enter a tracking number"));
        assert!(!app.add_form.submitting);
        assert_eq!(app.state, AppState::AddingPackage);
    }

    #[test]
    fn test_add_carrier_cycle() {
        let mut app = test_app();
        app.carriers = vec![Carrier::from_id("gls"), Carrier::from_id("seur")];
        assert_eq!(app.add_carrier_label(), "Auto-detect");
        app.cycle_add_carrier(true);
        assert_eq!(app.add_carrier_label(), "GLS");
        app.cycle_add_carrier(false);
        app.cycle_add_carrier(false);
        assert_eq!(app.add_carrier_label(), "SEUR");
    }

    #[tokio::test]
    async fn test_unauthorized_returns_to_login() {
        let mut app = test_app();
        app.screen = Screen::Dashboard;
        app.packages = vec![package(1, "A")];
        app.process_task_result(TaskResult::Packages(Err(ApiError::Unauthorized)));

        assert_eq!(app.screen, Screen::Login);
        assert!(app.packages.is_empty());
        assert_eq!(
            app.login_form.error.as_deref(),
            Some("Session expired, please log in again")
        );
    }

    #[tokio::test]
    async fn test_failed_tracking_still_shows_package() {
        let mut app = test_app();
        app.detail = Some(DetailView::new(5));
        app.screen = Screen::PackageDetail;

        app.process_task_result(TaskResult::Detail {
            id: 5,
            package: Ok(package(5, "GLS5")),
            tracking: Err(ApiError::CarrierUnavailable("GLS API timeout".into())),
        });

        let detail = app.detail.as_ref().unwrap();
        assert_eq!(detail.package.loaded().map(|p| p.tracking_number.as_str()), Some("GLS5"));
        assert_eq!(detail.tracking, Load::Failed("GLS API timeout".to_string()));
        assert_eq!(app.screen, Screen::PackageDetail);
    }

    #[tokio::test]
    async fn test_tracking_timeline_sorted_on_load() {
        let mut app = test_app();
        app.detail = Some(DetailView::new(5));
        app.process_task_result(TaskResult::Tracking {
            id: 5,
            result: Ok(TrackingInfo {
                history: vec![
                    event("2024-01-14T14:20:00", "In transit"),
                    event("2024-01-16T07:30:00", "Delivered"),
                ],
                ..TrackingInfo::default()
            }),
        });
        let statuses: Vec<&str> = app.detail.as_ref().unwrap().timeline.iter().map(|e| e.status.as_str()).collect();
        assert_eq!(statuses, vec!["Delivered", "In transit"]);
    }

    #[tokio::test]
    async fn test_stale_detail_result_ignored() {
        let mut app = test_app();
        app.detail = Some(DetailView::new(7));
        app.process_task_result(TaskResult::Detail {
            id: 3,
            package: Ok(package(3, "OLD")),
            tracking: Ok(TrackingInfo::default()),
        });
        assert_eq!(app.detail.as_ref().unwrap().package, Load::Idle);
    }

    #[tokio::test]
    async fn test_optimistic_delete_restored_on_failure() {
        let mut app = test_app();
        app.packages = vec![package(1, "A"), package(2, "B"), package(3, "C")];
        app.package_selection = 1;
        app.confirm_delete();
        let ids: Vec<i64> = app.packages.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);

        app.process_task_result(TaskResult::PackageDeleted {
            package: package(2, "B"),
            index: 1,
            result: Err(ApiError::ServerError("boom".into())),
        });
        let ids: Vec<i64> = app.packages.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(app.status_message.as_deref(), Some("Failed to delete package"));
    }

    #[tokio::test]
    async fn test_delete_of_missing_package_stays_removed() {
        let mut app = test_app();
        app.packages = vec![package(1, "A")];
        app.process_task_result(TaskResult::PackageDeleted {
            package: package(2, "B"),
            index: 1,
            result: Err(ApiError::NotFound("Package not found".into())),
        });
        assert_eq!(app.packages.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_after_refresh_does_not_duplicate() {
        let mut app = test_app();
        app.packages = vec![package(1, "A"), package(2, "B"), package(3, "C")];
        app.package_selection = 1;
        app.confirm_delete();

        // List refresh lands before the delete fails
        app.process_task_result(TaskResult::Packages(Ok(vec![
            package(1, "A"),
            package(2, "B"),
            package(3, "C"),
        ])));
        app.process_task_result(TaskResult::PackageDeleted {
            package: package(2, "B"),
            index: 1,
            result: Err(ApiError::ServerError("boom".into())),
        });

        let ids: Vec<i64> = app.packages.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_late_unauthorized_with_fresh_credential_stays_put() {
        let mut app = test_app();
        app.api.session().set_credential("fresh", Some("alice")).unwrap();
        app.screen = Screen::Dashboard;
        app.packages = vec![package(1, "A")];

        app.process_task_result(TaskResult::Packages(Err(ApiError::Unauthorized)));

        assert_eq!(app.screen, Screen::Dashboard);
        assert_eq!(app.packages.len(), 1);
        assert!(app.login_form.error.is_none());
    }

    fn detail_with_carrier_update(id: i64) -> DetailView {
        let mut detail = DetailView::new(id);
        detail.package = Load::Loaded(package(id, "GLS5"));
        detail.tracking = Load::Loaded(TrackingInfo::default());
        detail.updating_carrier = true;
        detail
    }

    #[tokio::test]
    async fn test_carrier_update_reloads_tracking() {
        let mut app = test_app();
        app.screen = Screen::PackageDetail;
        app.detail = Some(detail_with_carrier_update(5));

        let mut updated = package(5, "GLS5");
        updated.carrier = Some("seur".to_string());
        app.process_task_result(TaskResult::CarrierUpdated {
            id: 5,
            result: Ok(updated),
        });

        let detail = app.detail.as_ref().unwrap();
        assert!(!detail.updating_carrier);
        assert_eq!(
            detail.package.loaded().and_then(|p| p.carrier.as_deref()),
            Some("seur")
        );
        assert_eq!(detail.tracking, Load::Loading);
        assert_eq!(app.status_message.as_deref(), Some("Carrier set to SEUR"));
    }

    #[tokio::test]
    async fn test_carrier_update_unauthorized_returns_to_login() {
        let mut app = test_app();
        app.screen = Screen::PackageDetail;
        app.detail = Some(detail_with_carrier_update(5));

        app.process_task_result(TaskResult::CarrierUpdated {
            id: 5,
            result: Err(ApiError::Unauthorized),
        });

        assert_eq!(app.screen, Screen::Login);
        assert!(app.detail.is_none());
        assert_eq!(
            app.login_form.error.as_deref(),
            Some("Session expired, please log in again")
        );
    }

    #[test]
    fn test_screen_is_auth() {
        assert!(Screen::Login.is_auth());
        assert!(Screen::ResetPassword.is_auth());
        assert!(!Screen::Dashboard.is_auth());
        assert!(!Screen::PackageDetail.is_auth());
    }
}
