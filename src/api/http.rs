use super::Backend;
use super::error::ApiError;
use super::error::ApiResult;
use super::types::AddEventRequest;
use super::types::Attendee;
use super::types::CalendarAuthUrl;
use super::types::CalendarConnectionStatus;
use super::types::CreatedEvent;
use super::types::Event;
use super::types::EventRequest;
use super::types::GoogleAuthUrl;
use super::types::RsvpCounts;
use super::types::RsvpRecord;
use super::types::RsvpRequest;
use super::types::RsvpStatus;
use super::types::SearchQuery;
use super::types::SignInRequest;
use super::types::SignInResponse;
use super::types::SignUpRequest;
use super::types::SignUpResponse;
use ehttp::Headers;
use ehttp::Request;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tracing::debug;

/// `Backend` over HTTP. Each call is one `ehttp::fetch` whose callback is
/// bridged back into the caller's task.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: &str, path: &str, token: Option<&str>, body: Option<Vec<u8>>) -> Request {
        let bearer = token.map(|token| format!("Bearer {token}"));

        let mut headers: Vec<(&str, &str)> = vec![("Accept", "application/json")];
        if body.is_some() {
            headers.push(("Content-Type", "application/json"));
        }
        if let Some(bearer) = bearer.as_deref() {
            headers.push(("Authorization", bearer));
        }

        Request {
            method: method.to_string(),
            url: format!("{}{}", self.base_url, path),
            body: body.unwrap_or_default(),
            headers: Headers::new(&headers),
        }
    }

    async fn send(&self, request: Request) -> ApiResult<Vec<u8>> {
        let method = request.method.clone();
        let url = request.url.clone();

        let (sender, receiver) = oneshot::channel();
        ehttp::fetch(request, move |response| {
            // the receiver is gone only when the caller stopped waiting
            let _ = sender.send(response);
        });

        let response = receiver
            .await
            .map_err(|_| ApiError::Transport("request was dropped".to_string()))?
            .map_err(ApiError::Transport)?;

        debug!("{} {} -> {}", method, url, response.status);

        if response.ok {
            Ok(response.bytes)
        } else {
            Err(ApiError::from_response(response.status, &response.bytes))
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> ApiResult<T> {
        let bytes = self.send(self.request("GET", path, token, None)).await?;
        decode(&bytes)
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> ApiResult<T> {
        let body = serde_json::to_vec(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        let bytes = self
            .send(self.request(method, path, token, Some(body)))
            .await?;
        decode(&bytes)
    }

    /// For calls whose success body carries nothing the client needs.
    async fn send_discarding(
        &self,
        method: &str,
        path: &str,
        token: &str,
        body: Option<Vec<u8>>,
    ) -> ApiResult<()> {
        self.send(self.request(method, path, Some(token), body))
            .await
            .map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

impl Backend for HttpBackend {
    async fn sign_in(&self, request: &SignInRequest) -> ApiResult<SignInResponse> {
        self.send_json("POST", "/api/signin", None, request).await
    }

    async fn sign_up(&self, request: &SignUpRequest) -> ApiResult<SignUpResponse> {
        self.send_json("POST", "/api/signup", None, request).await
    }

    async fn google_auth_url(&self) -> ApiResult<GoogleAuthUrl> {
        self.get("/api/auth/google", None).await
    }

    async fn get_event(&self, event_id: i64) -> ApiResult<Event> {
        self.get(&format!("/api/events/{event_id}"), None).await
    }

    async fn upcoming_events(&self) -> ApiResult<Vec<Event>> {
        self.get("/api/events/upcoming", None).await
    }

    async fn search_events(&self, query: &SearchQuery) -> ApiResult<Vec<Event>> {
        let query = query.to_query_string();
        let path = if query.is_empty() {
            "/api/events/search".to_string()
        } else {
            format!("/api/events/search?{query}")
        };
        self.get(&path, None).await
    }

    async fn user_events(&self, token: &str) -> ApiResult<Vec<Event>> {
        self.get("/api/events/user", Some(token)).await
    }

    async fn create_event(&self, token: &str, request: &EventRequest) -> ApiResult<i64> {
        let created: CreatedEvent = self
            .send_json("POST", "/api/events", Some(token), request)
            .await?;
        Ok(created.id)
    }

    async fn update_event(
        &self,
        token: &str,
        event_id: i64,
        request: &EventRequest,
    ) -> ApiResult<()> {
        let body = serde_json::to_vec(request).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.send_discarding("PUT", &format!("/api/events/{event_id}"), token, Some(body))
            .await
    }

    async fn delete_event(&self, token: &str, event_id: i64) -> ApiResult<()> {
        self.send_discarding("DELETE", &format!("/api/events/{event_id}"), token, None)
            .await
    }

    async fn rsvp_status(&self, token: &str, event_id: i64) -> ApiResult<Option<RsvpStatus>> {
        let record: Option<RsvpRecord> = self
            .get(&format!("/api/events/{event_id}/rsvp"), Some(token))
            .await?;
        Ok(record.map(|record| record.status))
    }

    async fn rsvp_counts(&self, event_id: i64) -> ApiResult<RsvpCounts> {
        self.get(&format!("/api/events/{event_id}/rsvp/count"), None)
            .await
    }

    async fn set_rsvp(&self, token: &str, event_id: i64, status: RsvpStatus) -> ApiResult<()> {
        let body = serde_json::to_vec(&RsvpRequest { status })
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        self.send_discarding(
            "POST",
            &format!("/api/events/{event_id}/rsvp"),
            token,
            Some(body),
        )
        .await
    }

    async fn remove_rsvp(&self, token: &str, event_id: i64) -> ApiResult<()> {
        self.send_discarding(
            "DELETE",
            &format!("/api/events/{event_id}/rsvp"),
            token,
            None,
        )
        .await
    }

    async fn attendees(&self, token: &str, event_id: i64) -> ApiResult<Vec<Attendee>> {
        let attendees: Option<Vec<Attendee>> = self
            .get(&format!("/api/events/{event_id}/rsvps"), Some(token))
            .await?;
        Ok(attendees.unwrap_or_default())
    }

    async fn calendar_connected(&self, token: &str) -> ApiResult<bool> {
        let status: CalendarConnectionStatus = self
            .get("/api/calendar/check-connection", Some(token))
            .await?;
        Ok(status.connected)
    }

    async fn calendar_authorize(&self, token: &str) -> ApiResult<String> {
        let url: CalendarAuthUrl = self.get("/api/calendar/authorize", Some(token)).await?;
        Ok(url.auth_url)
    }

    async fn calendar_add_event(&self, token: &str, event_id: i64) -> ApiResult<()> {
        let body = serde_json::to_vec(&AddEventRequest { event_id })
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        self.send_discarding("POST", "/api/calendar/add-event", token, Some(body))
            .await
    }
}
