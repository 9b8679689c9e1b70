//! OAuth session handling: password and refresh-token logins, token refresh.

use reqwest::StatusCode;

use crate::error::{Error, RingError, Result};

use super::RingClient;
use super::models::{Session, TokenRequest, TokenResponse};

const GRANT_PASSWORD: &str = "password";
const GRANT_REFRESH_TOKEN: &str = "refresh_token";
const SCOPE: &str = "client";

impl RingClient {
    /// Log in with account credentials
    ///
    /// When the account has two-factor authentication enabled, the first call (without
    /// a code) makes Ring send a code to the user and fails with
    /// [`RingError::TwoFactorRequired`]; call again with that code.
    ///
    /// # Errors
    ///
    /// - [`RingError::TwoFactorRequired`] when a code is needed
    /// - [`RingError::Throttled`] when too many codes were requested recently
    /// - [`RingError::AuthenticationFailed`] for rejected credentials
    pub async fn login_with_password(
        &self,
        username: &str,
        password: &str,
        two_factor_code: Option<&str>,
    ) -> Result<()> {
        let request = TokenRequest {
            client_id: &self.config.client_id,
            grant_type: GRANT_PASSWORD,
            scope: SCOPE,
            username: Some(username),
            password: Some(password),
            refresh_token: None,
        };
        let token = self.request_token(&request, two_factor_code).await?;
        tracing::info!("Authenticated with username and password");
        *self.session.lock().await = Some(Session::from_token(token));
        Ok(())
    }

    /// Log in with a refresh token saved from a previous session
    pub async fn login_with_refresh_token(&self, refresh_token: &str) -> Result<()> {
        let session = self.refresh(refresh_token).await?;
        tracing::info!("Authenticated with cached refresh token");
        *self.session.lock().await = Some(session);
        Ok(())
    }

    /// Refresh token of the current session (it may change when the session refreshes)
    pub async fn current_refresh_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
    }

    /// Current access token, refreshed first when it has expired
    pub(super) async fn access_token(&self) -> Result<String> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_ref() else {
            return Err(RingError::AuthenticationFailed("not logged in".to_string()).into());
        };
        if !session.is_expired() {
            return Ok(session.access_token.clone());
        }

        tracing::debug!("Access token expired, refreshing");
        let refreshed = self.refresh(&session.refresh_token).await?;
        let token = refreshed.access_token.clone();
        *guard = Some(refreshed);
        Ok(token)
    }

    /// Drop the access token so the next request refreshes it
    pub(super) async fn invalidate_access_token(&self) {
        if let Some(session) = self.session.lock().await.as_mut() {
            session.expires_at = Some(std::time::Instant::now());
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let request = TokenRequest {
            client_id: &self.config.client_id,
            grant_type: GRANT_REFRESH_TOKEN,
            scope: SCOPE,
            username: None,
            password: None,
            refresh_token: Some(refresh_token),
        };
        let token = self.request_token(&request, None).await?;
        Ok(Session::from_token(token))
    }

    async fn request_token(
        &self,
        request: &TokenRequest<'_>,
        two_factor_code: Option<&str>,
    ) -> Result<TokenResponse> {
        if two_factor_code.is_some() {
            tracing::debug!("Sending two-factor code");
        }

        let response = self
            .http
            .post(&self.config.oauth_url)
            .timeout(self.config.request_timeout)
            .header("2fa-support", "true")
            .header("2fa-code", two_factor_code.unwrap_or_default())
            .json(request)
            .send()
            .await?;
        let status = response.status();
        match status {
            s if s.is_success() => Ok(response.json::<TokenResponse>().await?),
            StatusCode::PRECONDITION_FAILED => Err(RingError::TwoFactorRequired.into()),
            StatusCode::TOO_MANY_REQUESTS => Err(RingError::Throttled.into()),
            _ => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), grant_type = request.grant_type, "OAuth request rejected");
                Err(Error::Ring(RingError::AuthenticationFailed(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    body.trim()
                ))))
            }
        }
    }
}
