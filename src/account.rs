use crate::api::ApiError;
use crate::api::Backend;
use crate::api::SignInRequest;
use crate::api::SignUpRequest;
use crate::browser::Browser;
use crate::notify::Notifier;
use crate::route::ROOT_PATH;
use crate::route::SIGNIN_PATH;
use crate::session::SessionStore;
use crate::session::StorageError;
use crate::timer::TimerHandle;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Storage key for the OAuth `state` handed out with the Google sign in URL.
pub const OAUTH_STATE_KEY: &str = "oauth_state";

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Sign in, sign up and sign out. Together with the OAuth callback these are
/// the only writers of the session.
pub struct Account<B: Backend> {
    backend: Arc<B>,
    session: SessionStore,
    browser: Arc<dyn Browser>,
    notifier: Notifier,
    redirect_delay: Duration,
}

impl<B: Backend> Account<B> {
    pub fn new(
        backend: Arc<B>,
        session: SessionStore,
        browser: Arc<dyn Browser>,
        notifier: Notifier,
        redirect_delay: Duration,
    ) -> Self {
        Self {
            backend,
            session,
            browser,
            notifier,
            redirect_delay,
        }
    }

    /// Stores the session and schedules the move to `/`. Dropping the returned
    /// handle cancels the redirect.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<TimerHandle, AccountError> {
        let request = SignInRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };

        let response = self.backend.sign_in(&request).await.map_err(|e| {
            self.notifier.error(e.user_message("Failed to sign in"));
            e
        })?;

        self.session.set(&response.token, response.user_id)?;
        self.notifier.success("Signed in successfully! Redirecting...");

        let browser = self.browser.clone();
        Ok(TimerHandle::after(self.redirect_delay, move || {
            browser.assign(ROOT_PATH)
        }))
    }

    /// Creates an account. The user still has to sign in afterwards.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<i64, AccountError> {
        if request.password.trim() != request.confirmed_password.trim() {
            self.notifier.error(AccountError::PasswordMismatch.to_string());
            return Err(AccountError::PasswordMismatch);
        }

        let response = self.backend.sign_up(&request).await.map_err(|e| {
            self.notifier.error(e.user_message("Signup failed"));
            e
        })?;

        info!("created account {}", response.id);
        self.notifier.success("Account created successfully!");
        Ok(response.id)
    }

    pub fn sign_out(&self) -> Result<(), AccountError> {
        self.session.clear()?;
        self.browser.assign(SIGNIN_PATH);
        Ok(())
    }

    /// Leaves the app for Google's consent page. The backend sends the browser
    /// back to `/auth/callback` afterwards.
    pub async fn google_sign_in(&self) -> Result<(), AccountError> {
        let url = self.backend.google_auth_url().await.map_err(|e| {
            self.notifier
                .error(e.user_message("Failed to get Google auth URL"));
            e
        })?;

        if let Some(state) = url.state.as_deref() {
            self.session
                .storage()
                .set_all(&[(OAUTH_STATE_KEY, state)])?;
        }

        self.browser.assign(&url.auth_url);
        Ok(())
    }
}
