use crate::browser::Browser;
use crate::browser::Location;
use crate::notify::Notification;
use crate::notify::Notifier;
use crate::route::ROOT_PATH;
use crate::session::SessionStore;
use crate::timer::TimerHandle;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    SignedIn { user_id: i64 },
    Rejected,
}

/// The `/auth/callback` page the backend sends the browser to after Google
/// sign in. It runs once, on mount; the page is then left through a redirect,
/// so the `token` and `user_id` parameters are never read twice.
pub struct AuthCallbackPage {
    outcome: CallbackOutcome,
    redirect: Option<TimerHandle>,
}

impl AuthCallbackPage {
    pub fn mount(
        browser: Arc<dyn Browser>,
        session: &SessionStore,
        notifier: &Notifier,
        redirect_delay: Duration,
    ) -> Self {
        let location = browser.location();
        let token = location.param("token");
        let user_id = location.param("user_id").and_then(|id| id.parse::<i64>().ok());

        let (Some(token), Some(user_id)) = (token, user_id) else {
            warn!("auth callback without a usable token and user id");
            notifier.error("Authentication failed. Please try again.");
            return Self::rejected();
        };

        if let Err(e) = session.set(token, user_id) {
            warn!("could not store the session: {}", e);
            notifier.error("Authentication failed. Please try again.");
            return Self::rejected();
        }

        notifier.success("Authentication successful! Redirecting to dashboard...");
        let redirect = TimerHandle::after(redirect_delay, move || browser.assign(ROOT_PATH));

        Self {
            outcome: CallbackOutcome::SignedIn { user_id },
            redirect: Some(redirect),
        }
    }

    fn rejected() -> Self {
        Self {
            outcome: CallbackOutcome::Rejected,
            redirect: None,
        }
    }

    pub fn outcome(&self) -> CallbackOutcome {
        self.outcome
    }

    /// Waits for the scheduled redirect. Returns at once on a rejected
    /// callback, which stays on the page.
    pub async fn finished(self) {
        if let Some(redirect) = self.redirect {
            redirect.finished().await;
        }
    }
}

/// Consumes an `auth_success` or `auth_error` parameter from the current
/// address, on whatever page it arrives.
///
/// The parameter is stripped with `replace_state` so a reload does not show
/// the notification again.
pub fn consume_auth_notice(browser: &dyn Browser, notifier: &Notifier) -> Option<Notification> {
    let location: Location = browser.location();

    let notification = if let Some(message) = location.param("auth_success") {
        Notification::success(message)
    } else if let Some(message) = location.param("auth_error") {
        Notification::error(message)
    } else {
        return None;
    };

    info!("consumed auth notice on {}", location.path());
    browser.replace_state(location.path());
    notifier.publish(notification.clone());
    Some(notification)
}
