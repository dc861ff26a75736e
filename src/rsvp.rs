use crate::api::ApiError;
use crate::api::Backend;
use crate::api::RsvpCounts;
use crate::api::RsvpStatus;
use crate::browser::Browser;
use crate::notify::Notifier;
use crate::route::SIGNIN_PATH;
use crate::session::SessionStore;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use thiserror::Error;
use tracing::info;
use tracing::warn;

#[derive(Error, Debug, PartialEq)]
pub enum RsvpError {
    #[error("sign in to RSVP")]
    SignInRequired,
    #[error("an RSVP update is already in flight")]
    Busy,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Default)]
struct RsvpState {
    status: Option<RsvpStatus>,
    counts: RsvpCounts,
    loading: bool,
}

/// Clears the in-flight flag when the call ends, including when the caller
/// drops the future halfway.
struct InFlight {
    state: Arc<Mutex<RsvpState>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loading = false;
    }
}

/// RSVP state of the viewer for one event.
///
/// The status only ever holds a value the server acknowledged, and the counts
/// are only ever what the server last reported.
pub struct RsvpController<B: Backend> {
    event_id: i64,
    backend: Arc<B>,
    session: SessionStore,
    browser: Arc<dyn Browser>,
    notifier: Notifier,
    state: Arc<Mutex<RsvpState>>,
}

impl<B: Backend> Clone for RsvpController<B> {
    fn clone(&self) -> Self {
        Self {
            event_id: self.event_id,
            backend: self.backend.clone(),
            session: self.session.clone(),
            browser: self.browser.clone(),
            notifier: self.notifier.clone(),
            state: self.state.clone(),
        }
    }
}

impl<B: Backend> RsvpController<B> {
    pub fn new(
        event_id: i64,
        backend: Arc<B>,
        session: SessionStore,
        browser: Arc<dyn Browser>,
        notifier: Notifier,
    ) -> Self {
        Self {
            event_id,
            backend,
            session,
            browser,
            notifier,
            state: Arc::new(Mutex::new(RsvpState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, RsvpState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn event_id(&self) -> i64 {
        self.event_id
    }

    /// `None` is "no RSVP".
    pub fn status(&self) -> Option<RsvpStatus> {
        self.state().status
    }

    pub fn counts(&self) -> RsvpCounts {
        self.state().counts
    }

    /// True while a toggle is in flight; the trigger should be disabled.
    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    fn begin(&self) -> Result<InFlight, RsvpError> {
        let mut state = self.state();
        if state.loading {
            return Err(RsvpError::Busy);
        }
        state.loading = true;
        Ok(InFlight {
            state: self.state.clone(),
        })
    }

    /// Loads the viewer's answer. Guests skip the call and stay at `None`.
    pub async fn fetch_status(&self) -> Result<Option<RsvpStatus>, RsvpError> {
        let Some(token) = self.session.token() else {
            return Ok(None);
        };

        match self.backend.rsvp_status(&token, self.event_id).await {
            Ok(status) => {
                self.state().status = status;
                Ok(status)
            }
            Err(e) => {
                warn!("fetching rsvp status for event {} failed: {}", self.event_id, e);
                self.notifier
                    .error(e.user_message("Failed to fetch RSVP status"));
                Err(e.into())
            }
        }
    }

    pub async fn fetch_counts(&self) -> Result<RsvpCounts, RsvpError> {
        match self.backend.rsvp_counts(self.event_id).await {
            Ok(counts) => {
                self.state().counts = counts;
                Ok(counts)
            }
            Err(e) => {
                warn!("fetching rsvp counts for event {} failed: {}", self.event_id, e);
                self.notifier
                    .error(e.user_message("Failed to fetch RSVP counts"));
                Err(e.into())
            }
        }
    }

    /// Answers `status`, or withdraws the answer when it already is `status`.
    ///
    /// Makes exactly one mutating call, then reloads the counts before
    /// returning. Guests are sent to the sign in page instead.
    pub async fn toggle(&self, status: RsvpStatus) -> Result<Option<RsvpStatus>, RsvpError> {
        let Some(token) = self.session.token() else {
            info!("guest tried to rsvp to event {}", self.event_id);
            self.browser.assign(SIGNIN_PATH);
            return Err(RsvpError::SignInRequired);
        };

        let _in_flight = self.begin()?;
        let current = self.status();

        let (result, next, done, fallback) = if current == Some(status) {
            (
                self.backend.remove_rsvp(&token, self.event_id).await,
                None,
                "RSVP removed successfully",
                "Failed to remove RSVP",
            )
        } else {
            (
                self.backend.set_rsvp(&token, self.event_id, status).await,
                Some(status),
                "RSVP updated successfully",
                "Failed to update RSVP",
            )
        };

        if let Err(e) = result {
            warn!("rsvp for event {} failed: {}", self.event_id, e);
            self.notifier.error(e.user_message(fallback));
            return Err(e.into());
        }

        info!(
            "rsvp for event {} moved from {:?} to {:?}",
            self.event_id, current, next
        );
        self.state().status = next;
        self.notifier.success(done);

        // the mutation stands even if the reload fails; the old counts stay up
        let _ = self.fetch_counts().await;

        Ok(next)
    }
}
