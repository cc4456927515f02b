//! API client for the package-tracking REST API.
//!
//! This module provides the `ApiClient` struct. Every operation is a single
//! request/response round trip: nothing is retried, batched or cached.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::config::{Config, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::models::{Carrier, CarriersResponse, NewPackage, Package, PackageUpdate, TrackingInfo};

use super::{ApiError, ApiResult};

// ============================================================================
// Constants
// ============================================================================

/// Minimum password length accepted by the server
pub const MIN_PASSWORD_LENGTH: usize = 8;

const AUTH_REGISTER: &str = "/api/auth/register";
const AUTH_LOGIN: &str = "/api/auth/login";
const AUTH_RESET_REQUEST: &str = "/api/auth/password-reset-request";
const AUTH_RESET: &str = "/api/auth/password-reset";
const PACKAGES: &str = "/api/packages/";
const CARRIERS: &str = "/api/packages/carriers";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct ResetRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    new_password: &'a str,
}

/// API client for the package-tracking service.
/// Clone is cheap - reqwest::Client and the session are reference counted.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    /// Create a new API client against `base_url` using the given session.
    pub fn new(base_url: &str, session: Arc<Session>) -> ApiResult<Self> {
        Self::with_timeout(
            base_url,
            session,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(base_url: &str, session: Arc<Session>, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn from_config(config: &Config, session: Arc<Session>) -> ApiResult<Self> {
        Self::with_timeout(
            config.api_base(),
            session,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn package_url(&self, id: i64) -> String {
        format!("{}{}{}", self.base_url, PACKAGES, id)
    }

    // ===== Request plumbing =====

    fn auth_headers(&self) -> ApiResult<header::HeaderMap> {
        Self::bearer_headers(self.session.credential().as_deref())
    }

    fn bearer_headers(token: Option<&str>) -> ApiResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::Session("Stored credential is not a valid header value".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Send a request with the current credential attached.
    /// A 401 invalidates the session before returning `Unauthorized`, unless
    /// the credential was replaced while the request was in flight.
    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let sent = self.session.credential();
        let response = request
            .headers(Self::bearer_headers(sent.as_deref())?)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "Request rejected with 401");
            if let Some(token) = sent {
                self.invalidate_session(&token);
            }
            return Err(ApiError::Unauthorized);
        }
        Ok(response)
    }

    /// Send a request to a public auth endpoint. 401 here means bad input,
    /// not an expired session, so the session is left alone.
    async fn send_public(&self, request: RequestBuilder) -> ApiResult<Response> {
        Ok(request.headers(self.auth_headers()?).send().await?)
    }

    fn invalidate_session(&self, token: &str) {
        if let Err(e) = self.session.clear_if_current(token) {
            warn!(error = %e, "Failed to clear stored credential");
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> ApiResult<Response> {
        Self::check_response_with(response, |_, _| None).await
    }

    /// Like `check_response`, but lets the caller map specific statuses to
    /// operation-specific errors. Unmapped statuses fall back to `from_status`.
    async fn check_response_with(
        response: Response,
        map: impl FnOnce(StatusCode, &str) -> Option<ApiError>,
    ) -> ApiResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        debug!(%status, url = %url, "Request failed");
        Err(map(status, &body).unwrap_or_else(|| ApiError::from_status(status, &body)))
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let url = response.url().to_string();
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!(url = %url, error = %e, "Unexpected response body");
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e))
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        debug!(url = url, "GET");
        let response = self.send(self.client.get(url)).await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> ApiResult<T> {
        debug!(url = url, "POST");
        let response = self.send(self.client.post(url).json(body)).await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> ApiResult<T> {
        debug!(url = url, "PUT");
        let response = self.send(self.client.put(url).json(body)).await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    // ===== Authentication =====

    /// Create an account. The user still has to log in afterwards.
    pub async fn register(&self, email: &str, username: &str, password: &str) -> ApiResult<()> {
        let email = email.trim();
        let username = username.trim();
        if email.is_empty() || username.is_empty() || password.is_empty() {
            return Err(ApiError::Validation(
                "Email, username and password are required".into(),
            ));
        }
        if !email.contains('@') {
            return Err(ApiError::Validation("Please enter a valid email address".into()));
        }
        check_password_length(password)?;

        let body = RegisterRequest { email, username, password };
        let response = self
            .send_public(self.client.post(self.url(AUTH_REGISTER)).json(&body))
            .await?;
        Self::check_response(response).await?;
        info!(username = username, "Registered new account");
        Ok(())
    }

    /// Log in with a username (or email) and password.
    ///
    /// On success the token is stored in the session, so every following
    /// request carries it, and is also returned.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<String> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::Validation("Username and password required".into()));
        }

        let request = self
            .client
            .post(self.url(AUTH_LOGIN))
            .form(&[("username", username), ("password", password)]);
        let response = self.send_public(request).await?;
        let response = Self::check_response_with(response, |status, body| {
            matches!(status.as_u16(), 400 | 401).then(|| {
                ApiError::InvalidCredentials(
                    ApiError::server_detail(body)
                        .unwrap_or_else(|| "Incorrect username or password".into()),
                )
            })
        })
        .await?;

        let auth: TokenResponse = Self::parse_json(response).await?;
        if auth.access_token.is_empty() {
            return Err(ApiError::InvalidResponse("Login response had an empty token".into()));
        }

        if let Err(e) = self.session.set_credential(&auth.access_token, Some(username)) {
            warn!(error = %e, "Failed to persist credential, session lasts until exit");
        }
        info!(username = username, "Login successful");
        Ok(auth.access_token)
    }

    /// Drop the local credential. There is no server-side logout.
    pub fn logout(&self) -> ApiResult<()> {
        self.session
            .clear_credential()
            .map_err(|e| ApiError::Session(e.to_string()))
    }

    /// Ask the server to email a reset link.
    ///
    /// Any answer from the server counts as success so the caller cannot
    /// tell whether the account exists. Transport failures are still
    /// returned since the request may never have arrived.
    pub async fn request_password_reset(&self, email: &str) -> ApiResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ApiError::Validation("Please enter your email address".into()));
        }

        let body = ResetRequest { email };
        let response = self
            .send_public(self.client.post(self.url(AUTH_RESET_REQUEST)).json(&body))
            .await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "Password reset request not accepted, reporting success");
        }
        Ok(())
    }

    /// Set a new password using the token from the reset email.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> ApiResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::InvalidResetToken("Reset token is missing".into()));
        }
        check_password_length(new_password)?;

        let body = ResetPasswordRequest { token, new_password };
        let response = self
            .send_public(self.client.post(self.url(AUTH_RESET)).json(&body))
            .await?;
        Self::check_response_with(response, |status, body| {
            matches!(status.as_u16(), 400 | 401 | 404).then(|| {
                ApiError::InvalidResetToken(
                    ApiError::server_detail(body)
                        .unwrap_or_else(|| "Invalid or expired reset token".into()),
                )
            })
        })
        .await?;
        info!("Password reset");
        Ok(())
    }

    // ===== Packages =====

    pub async fn list_packages(&self) -> ApiResult<Vec<Package>> {
        let packages: Vec<Package> = self.get(&self.url(PACKAGES)).await?;
        debug!(count = packages.len(), "Packages fetched");
        Ok(packages)
    }

    /// Add a package. An empty tracking number is rejected without a request.
    pub async fn add_package(&self, package: &NewPackage) -> ApiResult<Package> {
        let tracking_number = package.tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(ApiError::Validation("Please enter a tracking number".into()));
        }
        let body = NewPackage {
            tracking_number: tracking_number.to_string(),
            ..package.clone()
        };
        let created: Package = self.post(&self.url(PACKAGES), &body).await?;
        info!(id = created.id, carrier = ?created.carrier, "Package added");
        Ok(created)
    }

    pub async fn get_package(&self, id: i64) -> ApiResult<Package> {
        self.get(&self.package_url(id)).await
    }

    pub async fn update_package(&self, id: i64, update: &PackageUpdate) -> ApiResult<Package> {
        if update.is_empty() {
            return Err(ApiError::Validation("Nothing to update".into()));
        }
        if update.carrier.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ApiError::Validation("Please choose a carrier".into()));
        }
        let updated: Package = self.put(&self.package_url(id), update).await?;
        info!(id = id, "Package updated");
        Ok(updated)
    }

    pub async fn delete_package(&self, id: i64) -> ApiResult<()> {
        let url = self.package_url(id);
        debug!(url = %url, "DELETE");
        let response = self.send(self.client.delete(&url)).await?;
        Self::check_response(response).await?;
        info!(id = id, "Package deleted");
        Ok(())
    }

    /// Fetch live tracking data from the carrier via the server.
    ///
    /// Carrier failures, whether reported as an error status or inside a
    /// 200 body, come back as `CarrierUnavailable`.
    pub async fn track_package(&self, id: i64) -> ApiResult<TrackingInfo> {
        let url = format!("{}/track", self.package_url(id));
        debug!(url = %url, "GET");
        let response = self.send(self.client.get(&url)).await?;
        let response = Self::check_response_with(response, |status, body| {
            (status == StatusCode::BAD_REQUEST || status.is_server_error()).then(|| {
                ApiError::CarrierUnavailable(ApiError::server_detail(body).unwrap_or_default())
            })
        })
        .await?;

        let info: TrackingInfo = Self::parse_json(response).await?;
        if let Some(error) = info.error.as_deref().filter(|e| !e.is_empty()) {
            warn!(id = id, error = error, "Carrier lookup failed");
            return Err(ApiError::CarrierUnavailable(error.to_string()));
        }
        debug!(id = id, events = info.history.len(), "Tracking fetched");
        Ok(info)
    }

    pub async fn list_carriers(&self) -> ApiResult<Vec<Carrier>> {
        let response: CarriersResponse = self.get(&self.url(CARRIERS)).await?;
        Ok(response.into_carriers())
    }
}

fn check_password_length(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySlot;

    fn client() -> ApiClient {
        let session = Arc::new(Session::new(Box::new(MemorySlot::default())));
        // Nothing listens here; validation must fail before any request.
        ApiClient::new("http://127.0.0.1:9/", session).unwrap()
    }

    #[test]
    fn test_urls() {
        let api = client();
        assert_eq!(api.base_url(), "http://127.0.0.1:9");
        assert_eq!(api.url(PACKAGES), "http://127.0.0.1:9/api/packages/");
        assert_eq!(api.package_url(42), "http://127.0.0.1:9/api/packages/42");
    }

    #[test]
    fn test_auth_headers_follow_session() {
        let api = client();
        assert!(api.auth_headers().unwrap().get(header::AUTHORIZATION).is_none());

        api.session().set_credential("abc123", None).unwrap();
        let headers = api.auth_headers().unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer abc123");

        api.logout().unwrap();
        assert!(api.auth_headers().unwrap().get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_check_password_length() {
        assert!(check_password_length("12345678").is_ok());
        assert!(matches!(check_password_length("short"), Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_client_side_validation() {
        let api = client();
        assert!(matches!(
            api.add_package(&NewPackage::new("   ")).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(api.login("", "pw").await, Err(ApiError::Validation(_))));
        assert!(matches!(
            api.register("not-an-email", "bob", "password123").await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            api.request_password_reset(" ").await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            api.reset_password("", "password123").await,
            Err(ApiError::InvalidResetToken(_))
        ));
        assert!(matches!(
            api.update_package(1, &PackageUpdate::default()).await,
            Err(ApiError::Validation(_))
        ));
    }
}
