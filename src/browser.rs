use std::fmt::Display;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use thiserror::Error;
use tracing::info;
use tracing::warn;
use url::Url;
use url::form_urlencoded;

/// Origin the app is served from. Relative hrefs resolve against it and
/// anything on another origin counts as leaving the app.
pub const APP_ORIGIN: &str = "http://localhost:5173/";

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("could not open a browser window: {0}")]
    Open(String),
}

/// Path and query of the page being shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    path: String,
    query: Vec<(String, String)>,
}

impl Location {
    pub fn parse(href: &str) -> Result<Self, BrowserError> {
        let url = Url::parse(APP_ORIGIN)?.join(href)?;
        Ok(Self::from_url(&url))
    }

    fn from_url(url: &Url) -> Self {
        Self {
            path: url.path().to_string(),
            query: url
                .query_pairs()
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
        }
    }

    pub fn root() -> Self {
        Self {
            path: "/".to_string(),
            query: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value of a query parameter. An empty value counts as absent.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    pub fn has_query(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn href(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{}", self.path, query)
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.href())
    }
}

/// True when `href` points outside the app's origin.
pub fn is_external(href: &str) -> bool {
    match (Url::parse(APP_ORIGIN), Url::parse(href)) {
        (Ok(app), Ok(target)) => app.origin() != target.origin(),
        // relative hrefs stay in the app
        _ => false,
    }
}

/// The window the client runs in.
pub trait Browser: Send + Sync {
    fn location(&self) -> Location;

    /// Full page navigation. The current page is abandoned.
    fn assign(&self, href: &str);

    /// Rewrites the address without navigating or adding a history entry.
    fn replace_state(&self, href: &str);

    /// Opens `url` in a new browser context. The current page stays.
    fn open_window(&self, url: &str) -> Result<(), BrowserError>;

    /// True when this window was opened by another one.
    fn has_opener(&self) -> bool;

    fn close_window(&self);
}

struct History {
    entries: Vec<Location>,
    index: usize,
}

/// `Browser` for the terminal host. It keeps an in-process history and hands
/// external URLs to the system browser.
pub struct DesktopBrowser {
    history: Mutex<History>,
    opener: bool,
    closed: AtomicBool,
}

impl DesktopBrowser {
    pub fn new(start: Location) -> Self {
        Self {
            history: Mutex::new(History {
                entries: vec![start],
                index: 0,
            }),
            opener: false,
            closed: AtomicBool::new(false),
        }
    }

    /// A window that was opened by another window.
    pub fn popup(start: Location) -> Self {
        Self {
            opener: true,
            ..Self::new(start)
        }
    }

    /// Moves one entry back. Returns false at the start of history.
    pub fn back(&self) -> bool {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.index == 0 {
            return false;
        }
        history.index -= 1;
        true
    }

    /// Moves one entry forward. Returns false at the end of history.
    pub fn forward(&self) -> bool {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.index + 1 >= history.entries.len() {
            return false;
        }
        history.index += 1;
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Browser for DesktopBrowser {
    fn location(&self) -> Location {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history
            .entries
            .get(history.index)
            .cloned()
            .unwrap_or_else(Location::root)
    }

    fn assign(&self, href: &str) {
        if is_external(href) {
            info!("leaving the app for {}", href);
            if let Err(e) = self.open_window(href) {
                warn!("{}", e);
            }
            return;
        }

        let location = match Location::parse(href) {
            Ok(location) => location,
            Err(e) => {
                warn!("ignoring navigation to {}: {}", href, e);
                return;
            }
        };

        info!("navigating to {}", location);
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let next = history.index + 1;
        history.entries.truncate(next);
        history.entries.push(location);
        history.index = next;
    }

    fn replace_state(&self, href: &str) {
        match Location::parse(href) {
            Ok(location) => {
                let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
                let index = history.index;
                if let Some(entry) = history.entries.get_mut(index) {
                    *entry = location;
                }
            }
            Err(e) => warn!("ignoring replace_state to {}: {}", href, e),
        }
    }

    fn open_window(&self, url: &str) -> Result<(), BrowserError> {
        opener::open_browser(url).map_err(|e| BrowserError::Open(e.to_string()))
    }

    fn has_opener(&self) -> bool {
        self.opener
    }

    fn close_window(&self) {
        info!("closing window");
        self.closed.store(true, Ordering::SeqCst);
    }
}
