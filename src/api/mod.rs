pub mod error;
pub mod http;
pub mod types;

pub use error::ApiError;
pub use error::ApiResult;
pub use http::HttpBackend;
pub use types::*;

use std::future::Future;

/// The REST API the client talks to. Calls taking a `token` send it as a
/// bearer header.
pub trait Backend: Send + Sync + 'static {
    fn sign_in(
        &self,
        request: &SignInRequest,
    ) -> impl Future<Output = ApiResult<SignInResponse>> + Send;

    fn sign_up(
        &self,
        request: &SignUpRequest,
    ) -> impl Future<Output = ApiResult<SignUpResponse>> + Send;

    fn google_auth_url(&self) -> impl Future<Output = ApiResult<GoogleAuthUrl>> + Send;

    fn get_event(&self, event_id: i64) -> impl Future<Output = ApiResult<Event>> + Send;

    fn upcoming_events(&self) -> impl Future<Output = ApiResult<Vec<Event>>> + Send;

    fn search_events(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = ApiResult<Vec<Event>>> + Send;

    fn user_events(&self, token: &str) -> impl Future<Output = ApiResult<Vec<Event>>> + Send;

    /// Returns the id of the new event.
    fn create_event(
        &self,
        token: &str,
        request: &EventRequest,
    ) -> impl Future<Output = ApiResult<i64>> + Send;

    fn update_event(
        &self,
        token: &str,
        event_id: i64,
        request: &EventRequest,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    fn delete_event(&self, token: &str, event_id: i64)
    -> impl Future<Output = ApiResult<()>> + Send;

    /// `None` when the viewer has not answered.
    fn rsvp_status(
        &self,
        token: &str,
        event_id: i64,
    ) -> impl Future<Output = ApiResult<Option<RsvpStatus>>> + Send;

    fn rsvp_counts(&self, event_id: i64) -> impl Future<Output = ApiResult<RsvpCounts>> + Send;

    fn set_rsvp(
        &self,
        token: &str,
        event_id: i64,
        status: RsvpStatus,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    fn remove_rsvp(&self, token: &str, event_id: i64)
    -> impl Future<Output = ApiResult<()>> + Send;

    fn attendees(
        &self,
        token: &str,
        event_id: i64,
    ) -> impl Future<Output = ApiResult<Vec<Attendee>>> + Send;

    fn calendar_connected(&self, token: &str) -> impl Future<Output = ApiResult<bool>> + Send;

    /// Returns the Google consent URL for the calendar grant.
    fn calendar_authorize(&self, token: &str) -> impl Future<Output = ApiResult<String>> + Send;

    fn calendar_add_event(
        &self,
        token: &str,
        event_id: i64,
    ) -> impl Future<Output = ApiResult<()>> + Send;
}
