pub mod details;

pub use details::EventDetailsPage;

use crate::api::ApiError;
use crate::api::Attendee;
use crate::api::Backend;
use crate::api::Event;
use crate::api::EventRequest;
use crate::api::SearchQuery;
use crate::browser::Browser;
use crate::notify::Notifier;
use crate::route::SIGNIN_PATH;
use crate::session::SessionStore;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use tracing::warn;

#[derive(Error, Debug, PartialEq)]
pub enum EventError {
    #[error("sign in to manage events")]
    SignInRequired,
    #[error("Event not found")]
    NotFound,
    #[error("Title, date and location are required")]
    MissingFields,
    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for EventError {
    fn from(e: ApiError) -> Self {
        match e.status() {
            Some(404) => EventError::NotFound,
            _ => EventError::Api(e),
        }
    }
}

/// Event listing, search and the owner's create/update/delete calls.
pub struct EventBoard<B: Backend> {
    backend: Arc<B>,
    session: SessionStore,
    browser: Arc<dyn Browser>,
    notifier: Notifier,
}

impl<B: Backend> Clone for EventBoard<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            session: self.session.clone(),
            browser: self.browser.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<B: Backend> EventBoard<B> {
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
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Token for a call that needs one. Guests are sent to the sign in page.
    fn require_token(&self) -> Result<String, EventError> {
        match self.session.token() {
            Some(token) => Ok(token),
            None => {
                self.browser.assign(SIGNIN_PATH);
                Err(EventError::SignInRequired)
            }
        }
    }

    fn report(&self, e: ApiError, fallback: &str) -> EventError {
        warn!("{}: {}", fallback, e);
        let e = EventError::from(e);
        match &e {
            EventError::Api(api) => self.notifier.error(api.user_message(fallback)),
            other => self.notifier.error(other.to_string()),
        }
        e
    }

    pub async fn upcoming(&self) -> Result<Vec<Event>, EventError> {
        self.backend
            .upcoming_events()
            .await
            .map_err(|e| self.report(e, "Failed to fetch events"))
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Event>, EventError> {
        self.backend
            .search_events(query)
            .await
            .map_err(|e| self.report(e, "Failed to search events"))
    }

    /// Events created by the signed-in user.
    pub async fn mine(&self) -> Result<Vec<Event>, EventError> {
        let token = self.require_token()?;
        self.backend
            .user_events(&token)
            .await
            .map_err(|e| self.report(e, "Failed to fetch your events"))
    }

    pub async fn get(&self, event_id: i64) -> Result<Event, EventError> {
        self.backend
            .get_event(event_id)
            .await
            .map_err(|e| self.report(e, "Failed to fetch event"))
    }

    /// Returns the id of the new event. The backend does not echo the event,
    /// so callers that need it `get` it afterwards.
    pub async fn create(&self, request: &EventRequest) -> Result<i64, EventError> {
        let token = self.require_token()?;
        validate(request)?;

        let event_id = self
            .backend
            .create_event(&token, request)
            .await
            .map_err(|e| self.report(e, "Failed to create event"))?;
        info!("created event {}", event_id);
        self.notifier.success("Event created successfully");
        Ok(event_id)
    }

    pub async fn update(&self, event_id: i64, request: &EventRequest) -> Result<(), EventError> {
        let token = self.require_token()?;
        validate(request)?;

        self.backend
            .update_event(&token, event_id, request)
            .await
            .map_err(|e| self.report(e, "Failed to update event"))?;
        info!("updated event {}", event_id);
        self.notifier.success("Event updated successfully");
        Ok(())
    }

    pub async fn delete(&self, event_id: i64) -> Result<(), EventError> {
        let token = self.require_token()?;

        self.backend
            .delete_event(&token, event_id)
            .await
            .map_err(|e| self.report(e, "Failed to delete event"))?;
        info!("deleted event {}", event_id);
        self.notifier.success("Event deleted successfully");
        Ok(())
    }

    /// Who answered, and how. Only the creator of the event may ask.
    pub async fn attendees(&self, event_id: i64) -> Result<Vec<Attendee>, EventError> {
        let token = self.require_token()?;
        self.backend
            .attendees(&token, event_id)
            .await
            .map_err(|e| self.report(e, "Failed to fetch attendees"))
    }

    pub fn is_owner(&self, event: &Event) -> bool {
        self.session.user_id() == Some(event.user_id)
    }
}

fn validate(request: &EventRequest) -> Result<(), EventError> {
    if request.title.trim().is_empty() || request.location.trim().is_empty() {
        return Err(EventError::MissingFields);
    }
    Ok(())
}
