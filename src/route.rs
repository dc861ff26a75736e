use crate::browser::Browser;
use crate::config::DefaultRoute;
use crate::session::SessionStore;
use std::sync::Arc;
use tracing::debug;
use tracing::info;

pub const SIGNIN_PATH: &str = "/signin";
pub const ROOT_PATH: &str = "/";

/// Which page to mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    EventDetails { id: i64 },
    SignIn,
    SignUp,
    EventForm,
    EventList,
    UpcomingEvents,
    Search,
    CalendarConnected,
    AuthCallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Render(View),
    /// Full page redirect; nothing is rendered for this path.
    Redirect(&'static str),
}

struct RouteEntry {
    path: &'static str,
    view: View,
    guarded: bool,
}

const ROUTES: &[RouteEntry] = &[
    RouteEntry {
        path: "/signin",
        view: View::SignIn,
        guarded: false,
    },
    RouteEntry {
        path: "/signup",
        view: View::SignUp,
        guarded: false,
    },
    RouteEntry {
        path: "/create-event",
        view: View::EventForm,
        guarded: true,
    },
    RouteEntry {
        path: "/my-events",
        view: View::EventList,
        guarded: true,
    },
    RouteEntry {
        path: "/upcoming-events",
        view: View::UpcomingEvents,
        guarded: false,
    },
    RouteEntry {
        path: "/search",
        view: View::Search,
        guarded: false,
    },
    RouteEntry {
        path: "/calendar-connected",
        view: View::CalendarConnected,
        guarded: false,
    },
    RouteEntry {
        path: "/auth/callback",
        view: View::AuthCallback,
        guarded: false,
    },
];

/// Id in a `/event/<integer>` path.
///
/// Both the router and the event page call this on the raw path; the id is
/// never handed from one to the other.
pub fn event_id_from_path(path: &str) -> Option<i64> {
    let id = path.strip_prefix("/event/")?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

/// Picks the page for `path`. Depends on nothing but its arguments.
pub fn resolve(path: &str, authenticated: bool, default_route: DefaultRoute) -> Resolution {
    if let Some(id) = event_id_from_path(path) {
        return Resolution::Render(View::EventDetails { id });
    }

    if let Some(entry) = ROUTES.iter().find(|entry| entry.path == path) {
        if entry.guarded && !authenticated {
            return Resolution::Redirect(SIGNIN_PATH);
        }
        return Resolution::Render(entry.view);
    }

    match (authenticated, default_route) {
        (true, _) => Resolution::Render(View::EventList),
        (false, DefaultRoute::Public) => Resolution::Render(View::UpcomingEvents),
        (false, DefaultRoute::SignIn) => Resolution::Redirect(SIGNIN_PATH),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteState {
    pub path: String,
}

/// Mirrors the browser's path and decides what to mount.
///
/// The router never intercepts navigation. Links do full page loads; the
/// router reads the path when it mounts and again on back/forward.
pub struct Router {
    browser: Arc<dyn Browser>,
    session: SessionStore,
    default_route: DefaultRoute,
    state: RouteState,
}

impl Router {
    pub fn mount(
        browser: Arc<dyn Browser>,
        session: SessionStore,
        default_route: DefaultRoute,
    ) -> Self {
        let path = browser.location().path().to_string();
        Self {
            browser,
            session,
            default_route,
            state: RouteState { path },
        }
    }

    pub fn state(&self) -> &RouteState {
        &self.state
    }

    /// Back/forward happened; re-read the path and render again.
    pub fn on_popstate(&mut self) -> Option<View> {
        self.state.path = self.browser.location().path().to_string();
        debug!("history moved to {}", self.state.path);
        self.render()
    }

    /// Resolves the current path against the session as stored right now.
    /// A redirect navigates the browser and yields `None`.
    pub fn render(&self) -> Option<View> {
        let authenticated = self.session.is_authenticated();
        match resolve(&self.state.path, authenticated, self.default_route) {
            Resolution::Render(view) => {
                debug!("{} -> {:?}", self.state.path, view);
                Some(view)
            }
            Resolution::Redirect(target) => {
                info!("{} requires a session, redirecting to {}", self.state.path, target);
                self.browser.assign(target);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Location;
    use crate::testing::RecordingBrowser;

    #[test]
    fn test_resolution_table() {
        let public = DefaultRoute::Public;

        assert_eq!(
            resolve("/my-events", false, public),
            Resolution::Redirect("/signin")
        );
        assert_eq!(
            resolve("/my-events", true, public),
            Resolution::Render(View::EventList)
        );
        assert_eq!(
            resolve("/create-event", false, public),
            Resolution::Redirect("/signin")
        );
        assert_eq!(
            resolve("/create-event", true, public),
            Resolution::Render(View::EventForm)
        );
        for authenticated in [true, false] {
            assert_eq!(
                resolve("/event/42", authenticated, public),
                Resolution::Render(View::EventDetails { id: 42 })
            );
            assert_eq!(
                resolve("/search", authenticated, public),
                Resolution::Render(View::Search)
            );
        }
        assert_eq!(
            resolve("/nonexistent", false, public),
            Resolution::Render(View::UpcomingEvents)
        );
        assert_eq!(
            resolve("/nonexistent", true, public),
            Resolution::Render(View::EventList)
        );
        assert_eq!(resolve("/", true, public), Resolution::Render(View::EventList));
    }

    #[test]
    fn test_signin_default_route_policy() {
        let policy = DefaultRoute::SignIn;

        assert_eq!(resolve("/", false, policy), Resolution::Redirect("/signin"));
        assert_eq!(resolve("/", true, policy), Resolution::Render(View::EventList));
        // table routes are unaffected
        assert_eq!(
            resolve("/upcoming-events", false, policy),
            Resolution::Render(View::UpcomingEvents)
        );
    }

    #[test]
    fn test_event_path_parsing() {
        assert_eq!(event_id_from_path("/event/7"), Some(7));
        assert_eq!(event_id_from_path("/event/"), None);
        assert_eq!(event_id_from_path("/event/-7"), None);
        assert_eq!(event_id_from_path("/event/7/edit"), None);
        assert_eq!(event_id_from_path("/event/abc"), None);
        assert_eq!(event_id_from_path("/event/99999999999999999999999"), None);
        assert_eq!(event_id_from_path("/events/7"), None);
    }

    #[test]
    fn test_guest_on_guarded_route_is_redirected_without_render() {
        let browser = Arc::new(RecordingBrowser::at("/create-event"));
        let router = Router::mount(
            browser.clone(),
            SessionStore::in_memory(),
            DefaultRoute::Public,
        );

        assert_eq!(router.render(), None);
        assert_eq!(browser.assigned(), vec!["/signin".to_string()]);
    }

    #[test]
    fn test_router_follows_history_and_session() {
        let browser = Arc::new(RecordingBrowser::at("/my-events"));
        let session = SessionStore::in_memory();
        session.set("tok", 1).expect("memory writes cannot fail");
        let mut router = Router::mount(browser.clone(), session.clone(), DefaultRoute::Public);

        assert_eq!(router.state().path, "/my-events");
        assert_eq!(router.render(), Some(View::EventList));

        browser.set_location(Location::parse("/event/9").expect("href should parse"));
        assert_eq!(router.on_popstate(), Some(View::EventDetails { id: 9 }));
        assert_eq!(router.state().path, "/event/9");

        // signing out is picked up on the next navigation, not before
        session.clear().expect("memory writes cannot fail");
        browser.set_location(Location::parse("/my-events").expect("href should parse"));
        assert_eq!(router.on_popstate(), None);
        assert_eq!(browser.assigned(), vec!["/signin".to_string()]);
    }
}
