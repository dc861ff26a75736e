//! Test doubles for the browser and the REST API.

use crate::api::ApiError;
use crate::api::ApiResult;
use crate::api::Attendee;
use crate::api::Backend;
use crate::api::Event;
use crate::api::EventRequest;
use crate::api::GoogleAuthUrl;
use crate::api::RsvpCounts;
use crate::api::RsvpRecord;
use crate::api::RsvpStatus;
use crate::api::SearchQuery;
use crate::api::SignInRequest;
use crate::api::SignInResponse;
use crate::api::SignUpRequest;
use crate::api::SignUpResponse;
use crate::browser::Browser;
use crate::browser::BrowserError;
use crate::browser::Location;
use crate::browser::is_external;
use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

pub(crate) fn token_for(user_id: i64) -> String {
    format!("token-{user_id}")
}

pub(crate) fn sample_event(id: i64, owner: i64) -> Event {
    let date: DateTime<Utc> = Utc
        .with_ymd_and_hms(2030, 5, 17, 18, 30, 0)
        .single()
        .expect("fixture date is valid");
    Event {
        id,
        title: format!("Event {id}"),
        description: "A test event".to_string(),
        date,
        location: "Lisbon".to_string(),
        user_id: owner,
        created_at: date,
        updated_at: date,
        organizer_email: None,
        organizer_first_name: None,
        organizer_last_name: None,
    }
}

#[derive(Default)]
struct FakeState {
    users: BTreeMap<String, (String, i64)>,
    events: BTreeMap<i64, Event>,
    rsvps: BTreeMap<(i64, i64), RsvpStatus>,
    calendar_answers: VecDeque<bool>,
    calendar_connected: bool,
    failures: BTreeMap<&'static str, ApiError>,
    calls: Vec<&'static str>,
    next_id: i64,
}

/// In-memory backend. Tokens are `token-<user id>`.
#[derive(Default)]
pub(crate) struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_user(self, email: &str, password: &str, user_id: i64) -> Self {
        self.state()
            .users
            .insert(email.to_string(), (password.to_string(), user_id));
        self
    }

    pub fn with_event(self, event: Event) -> Self {
        self.state().events.insert(event.id, event);
        self
    }

    pub fn with_rsvp(self, event_id: i64, user_id: i64, status: RsvpStatus) -> Self {
        self.state().rsvps.insert((event_id, user_id), status);
        self
    }

    /// Answers for successive connection checks. The last answer sticks.
    pub fn with_calendar_answers(self, answers: &[bool]) -> Self {
        self.state().calendar_answers = answers.iter().copied().collect();
        self
    }

    pub fn with_calendar_connected(self, connected: bool) -> Self {
        self.state().calendar_connected = connected;
        self
    }

    /// Makes the next call named `call` fail with `error`.
    pub fn fail_next(&self, call: &'static str, error: ApiError) {
        self.state().failures.insert(call, error);
    }

    pub fn calls(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == call).count()
    }

    pub fn call_log(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn rsvp_of(&self, event_id: i64, user_id: i64) -> Option<RsvpStatus> {
        self.state().rsvps.get(&(event_id, user_id)).copied()
    }

    pub fn has_event(&self, event_id: i64) -> bool {
        self.state().events.contains_key(&event_id)
    }

    fn enter(&self, call: &'static str) -> ApiResult<MutexGuard<'_, FakeState>> {
        let mut state = self.state();
        state.calls.push(call);
        match state.failures.remove(call) {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

fn user_of(token: &str) -> ApiResult<i64> {
    token
        .strip_prefix("token-")
        .and_then(|id| id.parse().ok())
        .ok_or(ApiError::Unparseable { status: 401 })
}

fn not_found() -> ApiError {
    ApiError::Unparseable { status: 404 }
}

impl Backend for FakeBackend {
    async fn sign_in(&self, request: &SignInRequest) -> ApiResult<SignInResponse> {
        let state = self.enter("sign_in")?;
        match state.users.get(&request.email) {
            Some((password, user_id)) if *password == request.password => Ok(SignInResponse {
                token: token_for(*user_id),
                user_id: *user_id,
            }),
            _ => Err(ApiError::Server {
                status: 401,
                message: "Invalid email or password".to_string(),
            }),
        }
    }

    async fn sign_up(&self, request: &SignUpRequest) -> ApiResult<SignUpResponse> {
        let mut state = self.enter("sign_up")?;
        if state.users.contains_key(&request.email) {
            return Err(ApiError::Server {
                status: 409,
                message: "User already exists".to_string(),
            });
        }
        state.next_id += 1;
        let id = 100 + state.next_id;
        state
            .users
            .insert(request.email.clone(), (request.password.clone(), id));
        Ok(SignUpResponse { id })
    }

    async fn google_auth_url(&self) -> ApiResult<GoogleAuthUrl> {
        self.enter("google_auth_url")?;
        Ok(GoogleAuthUrl {
            auth_url: "https://accounts.google.com/o/oauth2/auth?state=xyz".to_string(),
            state: Some("xyz".to_string()),
        })
    }

    async fn get_event(&self, event_id: i64) -> ApiResult<Event> {
        let state = self.enter("get_event")?;
        state.events.get(&event_id).cloned().ok_or_else(not_found)
    }

    async fn upcoming_events(&self) -> ApiResult<Vec<Event>> {
        let state = self.enter("upcoming_events")?;
        Ok(state.events.values().cloned().collect())
    }

    async fn search_events(&self, query: &SearchQuery) -> ApiResult<Vec<Event>> {
        let state = self.enter("search_events")?;
        let text = query.text.clone().unwrap_or_default().to_lowercase();
        Ok(state
            .events
            .values()
            .filter(|event| event.title.to_lowercase().contains(&text))
            .cloned()
            .collect())
    }

    async fn user_events(&self, token: &str) -> ApiResult<Vec<Event>> {
        let state = self.enter("user_events")?;
        let user_id = user_of(token)?;
        Ok(state
            .events
            .values()
            .filter(|event| event.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_event(&self, token: &str, request: &EventRequest) -> ApiResult<i64> {
        let mut state = self.enter("create_event")?;
        let user_id = user_of(token)?;
        state.next_id += 1;
        let mut event = sample_event(1000 + state.next_id, user_id);
        event.title = request.title.clone();
        event.description = request.description.clone();
        event.date = request.date;
        event.location = request.location.clone();
        let id = event.id;
        state.events.insert(id, event);
        Ok(id)
    }

    async fn update_event(
        &self,
        token: &str,
        event_id: i64,
        request: &EventRequest,
    ) -> ApiResult<()> {
        let mut state = self.enter("update_event")?;
        let user_id = user_of(token)?;
        let event = state.events.get_mut(&event_id).ok_or_else(not_found)?;
        if event.user_id != user_id {
            return Err(ApiError::Unparseable { status: 403 });
        }
        event.title = request.title.clone();
        event.description = request.description.clone();
        event.date = request.date;
        event.location = request.location.clone();
        Ok(())
    }

    async fn delete_event(&self, token: &str, event_id: i64) -> ApiResult<()> {
        let mut state = self.enter("delete_event")?;
        let user_id = user_of(token)?;
        let owner = state
            .events
            .get(&event_id)
            .map(|event| event.user_id)
            .ok_or_else(not_found)?;
        if owner != user_id {
            return Err(ApiError::Unparseable { status: 403 });
        }
        state.events.remove(&event_id);
        Ok(())
    }

    async fn rsvp_status(&self, token: &str, event_id: i64) -> ApiResult<Option<RsvpStatus>> {
        let state = self.enter("rsvp_status")?;
        let user_id = user_of(token)?;
        Ok(state.rsvps.get(&(event_id, user_id)).copied())
    }

    async fn rsvp_counts(&self, event_id: i64) -> ApiResult<RsvpCounts> {
        let state = self.enter("rsvp_counts")?;
        let mut counts = RsvpCounts::default();
        for status in state
            .rsvps
            .iter()
            .filter(|((event, _), _)| *event == event_id)
            .map(|(_, status)| status)
        {
            match status {
                RsvpStatus::Going => counts.going += 1,
                RsvpStatus::Maybe => counts.maybe += 1,
                RsvpStatus::NotGoing => counts.not_going += 1,
            }
        }
        Ok(counts)
    }

    async fn set_rsvp(&self, token: &str, event_id: i64, status: RsvpStatus) -> ApiResult<()> {
        let mut state = self.enter("set_rsvp")?;
        let user_id = user_of(token)?;
        state.rsvps.insert((event_id, user_id), status);
        Ok(())
    }

    async fn remove_rsvp(&self, token: &str, event_id: i64) -> ApiResult<()> {
        let mut state = self.enter("remove_rsvp")?;
        let user_id = user_of(token)?;
        state.rsvps.remove(&(event_id, user_id));
        Ok(())
    }

    async fn attendees(&self, token: &str, event_id: i64) -> ApiResult<Vec<Attendee>> {
        let state = self.enter("attendees")?;
        let user_id = user_of(token)?;
        let event = state.events.get(&event_id).ok_or_else(not_found)?;
        if event.user_id != user_id {
            return Err(ApiError::Unparseable { status: 403 });
        }
        let created = event.created_at;
        Ok(state
            .rsvps
            .iter()
            .filter(|((event, _), _)| *event == event_id)
            .enumerate()
            .map(|(index, ((event_id, user_id), status))| Attendee {
                rsvp: RsvpRecord {
                    id: index as i64 + 1,
                    event_id: *event_id,
                    user_id: *user_id,
                    status: *status,
                    created_at: created,
                    updated_at: created,
                },
                first_name: format!("User{user_id}"),
                last_name: "Test".to_string(),
            })
            .collect())
    }

    async fn calendar_connected(&self, token: &str) -> ApiResult<bool> {
        let mut state = self.enter("calendar_connected")?;
        user_of(token)?;
        if let Some(answer) = state.calendar_answers.pop_front() {
            state.calendar_connected = answer;
            if state.calendar_answers.is_empty() {
                state.calendar_answers.push_back(answer);
            }
        }
        Ok(state.calendar_connected)
    }

    async fn calendar_authorize(&self, token: &str) -> ApiResult<String> {
        self.enter("calendar_authorize")?;
        user_of(token)?;
        Ok("https://accounts.google.com/o/oauth2/auth?scope=calendar".to_string())
    }

    async fn calendar_add_event(&self, token: &str, event_id: i64) -> ApiResult<()> {
        let state = self.enter("calendar_add_event")?;
        user_of(token)?;
        if !state.events.contains_key(&event_id) {
            return Err(not_found());
        }
        if !state.calendar_connected {
            return Err(ApiError::AuthorizationRequired);
        }
        Ok(())
    }
}

/// Browser double that records every navigation request.
pub(crate) struct RecordingBrowser {
    location: Mutex<Location>,
    assigned: Mutex<Vec<String>>,
    replaced: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
    opener: bool,
    closed: AtomicBool,
}

impl RecordingBrowser {
    pub fn at(href: &str) -> Self {
        Self {
            location: Mutex::new(Location::parse(href).expect("test href should parse")),
            assigned: Mutex::new(Vec::new()),
            replaced: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            opener: false,
            closed: AtomicBool::new(false),
        }
    }

    pub fn popup_at(href: &str) -> Self {
        Self {
            opener: true,
            ..Self::at(href)
        }
    }

    pub fn set_location(&self, location: Location) {
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) = location;
    }

    pub fn assigned(&self) -> Vec<String> {
        self.assigned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replaced(&self) -> Vec<String> {
        self.replaced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Browser for RecordingBrowser {
    fn location(&self) -> Location {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn assign(&self, href: &str) {
        self.assigned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(href.to_string());
        if !is_external(href) {
            if let Ok(location) = Location::parse(href) {
                self.set_location(location);
            }
        }
    }

    fn replace_state(&self, href: &str) {
        self.replaced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(href.to_string());
        if let Ok(location) = Location::parse(href) {
            self.set_location(location);
        }
    }

    fn open_window(&self, url: &str) -> Result<(), BrowserError> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        Ok(())
    }

    fn has_opener(&self) -> bool {
        self.opener
    }

    fn close_window(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
