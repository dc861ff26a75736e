pub mod popup;

pub use popup::CalendarConnectedPage;

use crate::api::ApiError;
use crate::api::Backend;
use crate::browser::Browser;
use crate::notify::Notifier;
use crate::session::SessionStore;
use crate::timer::TimerHandle;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

#[derive(Error, Debug, PartialEq)]
pub enum CalendarError {
    #[error("sign in to use Google Calendar")]
    SignInRequired,
    #[error("a calendar request is already in flight")]
    Busy,
    #[error("Please connect your Google Calendar first")]
    AuthorizationRequired,
    #[error("could not open the authorization page: {0}")]
    Browser(String),
    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for CalendarError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::AuthorizationRequired => CalendarError::AuthorizationRequired,
            other => CalendarError::Api(other),
        }
    }
}

#[derive(Debug, Default)]
struct CalendarState {
    connected: bool,
    loading: bool,
}

struct InFlight {
    state: Arc<Mutex<CalendarState>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loading = false;
    }
}

/// Google Calendar link of the signed-in user.
///
/// The grant is completed in another browser window, so this side only ever
/// learns about it by asking `check-connection`.
pub struct CalendarConnection<B: Backend> {
    backend: Arc<B>,
    session: SessionStore,
    browser: Arc<dyn Browser>,
    notifier: Notifier,
    state: Arc<Mutex<CalendarState>>,
}

impl<B: Backend> Clone for CalendarConnection<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            session: self.session.clone(),
            browser: self.browser.clone(),
            notifier: self.notifier.clone(),
            state: self.state.clone(),
        }
    }
}

impl<B: Backend> CalendarConnection<B> {
    pub fn new(
        backend: Arc<B>,
        session: SessionStore,
        browser: Arc<dyn Browser>,
        notifier: Notifier,
    ) -> Self {
        Self {
            backend,
            session,
            browser,
            notifier,
            state: Arc::new(Mutex::new(CalendarState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, CalendarState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    fn begin(&self) -> Result<InFlight, CalendarError> {
        let mut state = self.state();
        if state.loading {
            return Err(CalendarError::Busy);
        }
        state.loading = true;
        Ok(InFlight {
            state: self.state.clone(),
        })
    }

    fn require_token(&self, action: &str) -> Result<String, CalendarError> {
        self.session.token().ok_or_else(|| {
            self.notifier
                .error(format!("You must be logged in to {action}"));
            CalendarError::SignInRequired
        })
    }

    /// Asks the backend whether the grant exists. Only `connected` changes;
    /// failures are logged and leave it as it was. Guests are never connected
    /// and make no call.
    pub async fn check_connection(&self) -> Result<bool, CalendarError> {
        let Some(token) = self.session.token() else {
            return Ok(false);
        };

        match self.backend.calendar_connected(&token).await {
            Ok(connected) => {
                self.state().connected = connected;
                Ok(connected)
            }
            Err(e) => {
                warn!("calendar connection check failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Fetches the consent URL and opens it in a new window. The current page
    /// stays where it is.
    pub async fn connect(&self) -> Result<(), CalendarError> {
        let token = self.require_token("connect Google Calendar")?;
        let _in_flight = self.begin()?;

        let url = match self.backend.calendar_authorize(&token).await {
            Ok(url) => url,
            Err(e) => {
                self.notifier.error(
                    e.user_message("An error occurred while connecting to Google Calendar"),
                );
                return Err(e.into());
            }
        };

        info!("opening calendar consent page");
        self.browser.open_window(&url).map_err(|e| {
            self.notifier.error(e.to_string());
            CalendarError::Browser(e.to_string())
        })
    }

    /// Adds one event to the user's calendar.
    ///
    /// When the backend says the grant is missing, `connected` drops back to
    /// false so the UI offers "Connect" again. Nothing is retried.
    pub async fn add_event(&self, event_id: i64) -> Result<(), CalendarError> {
        let token = self.require_token("add events to Google Calendar")?;
        let _in_flight = self.begin()?;

        match self.backend.calendar_add_event(&token, event_id).await {
            Ok(()) => {
                info!("event {} added to calendar", event_id);
                self.notifier
                    .success("Event added to Google Calendar successfully!");
                Ok(())
            }
            Err(ApiError::AuthorizationRequired) => {
                info!("calendar grant missing, back to disconnected");
                self.state().connected = false;
                self.notifier.error(ApiError::AuthorizationRequired.to_string());
                Err(CalendarError::AuthorizationRequired)
            }
            Err(e) => {
                self.notifier.error(
                    e.user_message("An error occurred while adding the event to Google Calendar"),
                );
                Err(e.into())
            }
        }
    }

    /// Checks every `interval` until connected. Returns once connected; cancel
    /// by dropping the future.
    pub async fn poll_until_connected(&self, interval: Duration) {
        debug!("polling calendar connection every {:?}", interval);
        loop {
            tokio::time::sleep(interval).await;
            if self.is_connected() {
                break;
            }
            if let Ok(true) = self.check_connection().await {
                info!("calendar connected");
                break;
            }
        }
        debug!("calendar connection poll finished");
    }
}

/// Owner of a `CalendarConnection` for one mounted view. Keeps a background
/// poll alive while disconnected; dropping the panel stops it.
pub struct CalendarPanel<B: Backend> {
    connection: CalendarConnection<B>,
    poll_interval: Duration,
    poll: Option<TimerHandle>,
}

impl<B: Backend> CalendarPanel<B> {
    pub async fn mount(connection: CalendarConnection<B>, poll_interval: Duration) -> Self {
        let mut panel = Self {
            connection,
            poll_interval,
            poll: None,
        };
        let _ = panel.connection.check_connection().await;
        panel.ensure_polling();
        panel
    }

    pub fn connection(&self) -> &CalendarConnection<B> {
        &self.connection
    }

    pub fn is_polling(&self) -> bool {
        self.poll.as_ref().is_some_and(|poll| !poll.is_finished())
    }

    fn ensure_polling(&mut self) {
        if self.connection.is_connected() {
            self.poll = None;
            return;
        }
        if self.is_polling() {
            return;
        }
        let connection = self.connection.clone();
        let interval = self.poll_interval;
        self.poll = Some(TimerHandle::spawn(async move {
            connection.poll_until_connected(interval).await;
        }));
    }

    pub async fn connect(&mut self) -> Result<(), CalendarError> {
        let result = self.connection.connect().await;
        self.ensure_polling();
        result
    }

    pub async fn add_event(&mut self, event_id: i64) -> Result<(), CalendarError> {
        let result = self.connection.add_event(event_id).await;
        self.ensure_polling();
        result
    }

    /// Resolves once the poll has seen the connection come up. Returns at once
    /// if nothing is polling.
    pub async fn connected(&mut self) -> bool {
        if let Some(poll) = self.poll.take() {
            poll.finished().await;
        }
        self.connection.is_connected()
    }
}
