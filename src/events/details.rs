use super::EventBoard;
use super::EventError;
use crate::api::Backend;
use crate::api::Event;
use crate::browser::Browser;
use crate::route::event_id_from_path;
use crate::rsvp::RsvpController;
use tracing::debug;

/// The `/event/<id>` page: the event itself plus the viewer's RSVP controls.
pub struct EventDetailsPage<B: Backend> {
    event: Event,
    owned: bool,
    rsvp: RsvpController<B>,
}

impl<B: Backend> EventDetailsPage<B> {
    /// Reads the id from the current path and loads the event, the viewer's
    /// answer (signed in only) and the counts.
    ///
    /// A failed status or count load leaves the defaults in place; only a
    /// missing event fails the page.
    pub async fn mount(board: &EventBoard<B>) -> Result<Self, EventError> {
        let path = board.browser.location().path().to_string();
        let event_id = event_id_from_path(&path).ok_or(EventError::NotFound)?;

        let event = board.get(event_id).await?;
        let rsvp = RsvpController::new(
            event_id,
            board.backend.clone(),
            board.session.clone(),
            board.browser.clone(),
            board.notifier.clone(),
        );

        if board.session.is_authenticated() {
            let _ = rsvp.fetch_status().await;
        }
        let _ = rsvp.fetch_counts().await;
        debug!("mounted event page {}", event_id);

        Ok(Self {
            owned: board.is_owner(&event),
            event,
            rsvp,
        })
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Edit, delete and the attendee list are only offered to the creator.
    pub fn is_owner(&self) -> bool {
        self.owned
    }

    pub fn rsvp(&self) -> &RsvpController<B> {
        &self.rsvp
    }
}
