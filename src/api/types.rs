use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer_first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer_last_name: Option<String>,
}

impl Event {
    pub fn organizer(&self) -> Option<String> {
        let first = self.organizer_first_name.as_deref().unwrap_or_default();
        let last = self.organizer_last_name.as_deref().unwrap_or_default();
        let name = format!("{first} {last}").trim().to_string();
        (!name.is_empty()).then_some(name)
    }
}

/// Body of event create and update calls.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventRequest {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
}

/// A viewer's answer for one event. The absence of an answer ("none") is
/// modelled as `Option<RsvpStatus>::None` everywhere in the crate.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    Going,
    Maybe,
    NotGoing,
}

impl RsvpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpStatus::Going => "going",
            RsvpStatus::Maybe => "maybe",
            RsvpStatus::NotGoing => "not_going",
        }
    }
}

impl Display for RsvpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RsvpStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "going" => Ok(RsvpStatus::Going),
            "maybe" => Ok(RsvpStatus::Maybe),
            "not_going" => Ok(RsvpStatus::NotGoing),
            other => Err(format!(
                "invalid status '{other}', expected going, maybe or not_going"
            )),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RsvpCounts {
    pub going: u32,
    pub maybe: u32,
    pub not_going: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RsvpRecord {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub status: RsvpStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Attendee {
    #[serde(flatten)]
    pub rsvp: RsvpRecord,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct RsvpRequest {
    pub status: RsvpStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirmed_password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SignInResponse {
    pub token: String,
    pub user_id: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SignUpResponse {
    pub id: i64,
}

/// Body of a `201` from `POST /api/events`. The event itself is not echoed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct CreatedEvent {
    pub id: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GoogleAuthUrl {
    pub auth_url: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct CalendarAuthUrl {
    pub auth_url: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub(crate) struct CalendarConnectionStatus {
    pub connected: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub(crate) struct AddEventRequest {
    pub event_id: i64,
}

/// Filters for `/api/events/search`. Empty fields are left out of the query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl SearchQuery {
    pub fn to_query_string(&self) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            pairs.push(("q", text.to_string()));
        }
        if let Some(location) = self
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
        {
            pairs.push(("location", location.to_string()));
        }
        if let Some(start) = self.start_date {
            pairs.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }

        pairs
            .into_iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(&value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsvp_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&RsvpStatus::NotGoing).expect("status should serialize"),
            "\"not_going\""
        );
        assert_eq!("not-going".parse::<RsvpStatus>(), Ok(RsvpStatus::NotGoing));
        assert!("sometimes".parse::<RsvpStatus>().is_err());
    }

    #[test]
    fn test_null_rsvp_body_means_no_answer() {
        let record: Option<RsvpRecord> =
            serde_json::from_str("null").expect("null should parse as no record");
        assert!(record.is_none());
    }

    #[test]
    fn test_search_query_omits_empty_fields() {
        let query = SearchQuery {
            text: Some("rust meetup".to_string()),
            location: Some("   ".to_string()),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            end_date: None,
        };

        assert_eq!(query.to_query_string(), "q=rust%20meetup&start_date=2025-03-01");
        assert_eq!(SearchQuery::default().to_query_string(), "");
    }

    #[test]
    fn test_organizer_name() {
        let event: Event = serde_json::from_str(
            r#"{
                "id": 1,
                "title": "Launch",
                "description": "",
                "date": "2025-06-01T18:00:00Z",
                "location": "Berlin",
                "user_id": 3,
                "created_at": "2025-01-01T00:00:00Z",
                "updated_at": "2025-01-01T00:00:00Z",
                "organizer_first_name": "Ada",
                "organizer_last_name": "Lovelace"
            }"#,
        )
        .expect("event should parse");

        assert_eq!(event.organizer().as_deref(), Some("Ada Lovelace"));
    }
}
