use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use clap::Parser;
use clap::Subcommand;
use dotenvy::dotenv;
use evently::account::Account;
use evently::account::AccountError;
use evently::api::Event;
use evently::api::EventRequest;
use evently::api::HttpBackend;
use evently::api::RsvpStatus;
use evently::api::SearchQuery;
use evently::api::SignUpRequest;
use evently::auth_callback::AuthCallbackPage;
use evently::auth_callback::CallbackOutcome;
use evently::auth_callback::consume_auth_notice;
use evently::browser::Browser;
use evently::browser::BrowserError;
use evently::browser::DesktopBrowser;
use evently::browser::Location;
use evently::calendar::CalendarConnectedPage;
use evently::calendar::CalendarConnection;
use evently::calendar::CalendarError;
use evently::calendar::CalendarPanel;
use evently::config::Config;
use evently::config::ConfigError;
use evently::events::EventBoard;
use evently::events::EventDetailsPage;
use evently::events::EventError;
use evently::notify::Notification;
use evently::notify::Notifier;
use evently::route::Router;
use evently::route::View;
use evently::rsvp::RsvpController;
use evently::rsvp::RsvpError;
use evently::session::FileStorage;
use evently::session::SessionStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// More redirects than this in one navigation is a loop.
const MAX_REDIRECTS: usize = 5;

#[derive(Parser)]
#[command(
    name = "evently",
    version = env!("CARGO_PKG_VERSION"),
    about = "Browse events, RSVP and sync them to Google Calendar",
    long_about = None
)]
struct Cli {
    /// Base URL of the REST API, overrides EVENTLY_API_URL
    #[arg(global = true, long = "api-url")]
    api_url: Option<String>,

    /// Where the session is kept, overrides EVENTLY_SESSION_FILE
    #[arg(global = true, long = "session-file")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Navigate to a path and render the page it resolves to
    Open {
        #[arg(default_value = "/")]
        path: String,
    },

    /// Sign in with email and password
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long = "confirm")]
        confirmed_password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },

    /// Forget the stored session
    Signout,

    /// Start Google sign in in the system browser
    GoogleSignin,

    /// Deliver a redirect URL from the OAuth flow back to the app
    Callback { url: String },

    /// Answer an event invitation; repeating the same answer withdraws it
    Rsvp {
        event_id: i64,
        /// going, maybe or not_going
        status: RsvpStatus,
    },

    /// Google Calendar link
    Calendar {
        #[command(subcommand)]
        command: CalendarCommand,
    },

    /// Browse and manage events
    Events {
        #[command(subcommand)]
        command: EventsCommand,
    },
}

#[derive(Subcommand)]
enum CalendarCommand {
    /// Show whether Google Calendar is connected
    Status,
    /// Grant calendar access, then wait until the grant shows up
    Connect,
    /// Copy an event into Google Calendar
    Add { event_id: i64 },
}

#[derive(Subcommand)]
enum EventsCommand {
    Upcoming,
    /// Events you created
    Mine,
    Search {
        #[arg(long = "q")]
        text: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// YYYY-MM-DD
        #[arg(long = "from")]
        start_date: Option<NaiveDate>,
        /// YYYY-MM-DD
        #[arg(long = "to")]
        end_date: Option<NaiveDate>,
    },
    Show {
        event_id: i64,
    },
    Create {
        #[command(flatten)]
        fields: EventFields,
    },
    Update {
        event_id: i64,
        #[command(flatten)]
        fields: EventFields,
    },
    Delete {
        event_id: i64,
    },
    /// Who answered your event
    Attendees {
        event_id: i64,
    },
}

#[derive(clap::Args)]
struct EventFields {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    /// RFC 3339, e.g. 2030-05-17T18:30:00Z
    #[arg(long)]
    date: DateTime<Utc>,
    #[arg(long)]
    location: String,
}

impl From<EventFields> for EventRequest {
    fn from(fields: EventFields) -> Self {
        EventRequest {
            title: fields.title,
            description: fields.description,
            date: fields.date,
            location: fields.location,
        }
    }
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Events(#[from] EventError),
    #[error(transparent)]
    Rsvp(#[from] RsvpError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error("more than {0} redirects, giving up")]
    RedirectLoop(usize),
}

/// Everything a command needs, wired to the real ports.
struct App {
    config: Config,
    backend: Arc<HttpBackend>,
    session: SessionStore,
    browser: Arc<DesktopBrowser>,
    notifier: Notifier,
}

impl App {
    fn new(config: Config, notifier: Notifier, start: Location) -> Self {
        let storage = Arc::new(FileStorage::new(config.session_file.clone()));
        Self {
            backend: Arc::new(HttpBackend::new(config.api_url.clone())),
            session: SessionStore::new(storage),
            browser: Arc::new(DesktopBrowser::new(start)),
            notifier,
            config,
        }
    }

    fn account(&self) -> Account<HttpBackend> {
        Account::new(
            self.backend.clone(),
            self.session.clone(),
            self.browser.clone(),
            self.notifier.clone(),
            self.config.redirect_delay,
        )
    }

    fn board(&self) -> EventBoard<HttpBackend> {
        EventBoard::new(
            self.backend.clone(),
            self.session.clone(),
            self.browser.clone(),
            self.notifier.clone(),
        )
    }

    fn calendar(&self) -> CalendarConnection<HttpBackend> {
        CalendarConnection::new(
            self.backend.clone(),
            self.session.clone(),
            self.browser.clone(),
            self.notifier.clone(),
        )
    }

    /// Routes the current location, following redirects, and renders the
    /// page it lands on.
    async fn open(&self) -> Result<(), CliError> {
        consume_auth_notice(self.browser.as_ref(), &self.notifier);

        for _ in 0..=MAX_REDIRECTS {
            let router = Router::mount(
                self.browser.clone(),
                self.session.clone(),
                self.config.default_route,
            );
            let Some(view) = router.render() else {
                continue;
            };
            if self.show(view).await? == Rendered::Done {
                return Ok(());
            }
        }
        Err(CliError::RedirectLoop(MAX_REDIRECTS))
    }

    async fn show(&self, view: View) -> Result<Rendered, CliError> {
        info!("rendering {:?} at {}", view, self.browser.location());
        match view {
            View::EventList => print_events(&self.board().mine().await?),
            View::UpcomingEvents => print_events(&self.board().upcoming().await?),
            View::EventDetails { .. } => {
                let page = EventDetailsPage::mount(&self.board()).await?;
                print_event(page.event());
                if let Some(organizer) = page.event().organizer() {
                    println!("  organized by {}", organizer);
                }
                println!("  {}", page.event().description);
                let counts = page.rsvp().counts();
                println!(
                    "  going {} | maybe {} | not going {}",
                    counts.going, counts.maybe, counts.not_going
                );
                if let Some(status) = page.rsvp().status() {
                    println!("  your answer: {}", status);
                }
            }
            View::CalendarConnected => {
                println!("Google Calendar connected.");
                CalendarConnectedPage::mount(self.browser.clone(), self.config.popup_close_delay)
                    .finished()
                    .await;
                if !self.browser.is_closed() {
                    return Ok(Rendered::Navigated);
                }
            }
            View::AuthCallback => {
                let page = AuthCallbackPage::mount(
                    self.browser.clone(),
                    &self.session,
                    &self.notifier,
                    self.config.redirect_delay,
                );
                let signed_in = matches!(page.outcome(), CallbackOutcome::SignedIn { .. });
                page.finished().await;
                if signed_in {
                    return Ok(Rendered::Navigated);
                }
            }
            View::SignIn => println!("Sign in with `evently signin --email .. --password ..`"),
            View::SignUp => println!("Create an account with `evently signup`"),
            View::EventForm => println!("Create an event with `evently events create`"),
            View::Search => println!("Search with `evently events search --q ..`"),
        }
        Ok(Rendered::Done)
    }
}

/// Whether a page stayed put or sent the browser somewhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendered {
    Done,
    Navigated,
}

fn print_event(event: &Event) {
    println!(
        "#{} {} | {} | {}",
        event.id,
        event.title,
        event.date.format("%Y-%m-%d %H:%M"),
        event.location
    );
}

fn print_events(events: &[Event]) {
    if events.is_empty() {
        println!("No events.");
    }
    for event in events {
        print_event(event);
    }
}

async fn print_notifications(mut notifications: broadcast::Receiver<Notification>) {
    loop {
        match notifications.recv().await {
            Ok(notification) => println!("{}", notification),
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}

async fn run(command: Commands, config: Config, notifier: Notifier) -> Result<(), CliError> {
    let start = match &command {
        Commands::Open { path: href } | Commands::Callback { url: href } => Location::parse(href)?,
        _ => Location::root(),
    };
    let app = App::new(config, notifier, start);

    match command {
        Commands::Open { .. } | Commands::Callback { .. } => app.open().await?,
        Commands::Signin { email, password } => {
            app.account().sign_in(&email, &password).await?.finished().await;
            app.open().await?;
        }
        Commands::Signup {
            email,
            password,
            confirmed_password,
            first_name,
            last_name,
        } => {
            app.account()
                .sign_up(SignUpRequest {
                    email,
                    password,
                    confirmed_password,
                    first_name,
                    last_name,
                })
                .await?;
        }
        Commands::Signout => app.account().sign_out()?,
        Commands::GoogleSignin => {
            app.account().google_sign_in().await?;
            println!("Finish signing in in your browser, then run `evently callback <url>`.");
        }
        Commands::Rsvp { event_id, status } => {
            let rsvp = RsvpController::new(
                event_id,
                app.backend.clone(),
                app.session.clone(),
                app.browser.clone(),
                app.notifier.clone(),
            );
            rsvp.fetch_status().await?;
            rsvp.toggle(status).await?;
            let counts = rsvp.counts();
            println!(
                "going {} | maybe {} | not going {}",
                counts.going, counts.maybe, counts.not_going
            );
        }
        Commands::Calendar { command } => calendar(&app, command).await?,
        Commands::Events { command } => events(&app, command).await?,
    }
    Ok(())
}

async fn calendar(app: &App, command: CalendarCommand) -> Result<(), CliError> {
    match command {
        CalendarCommand::Status => {
            let connected = app.calendar().check_connection().await?;
            println!(
                "Google Calendar is {}",
                if connected { "connected" } else { "not connected" }
            );
        }
        CalendarCommand::Connect => {
            let mut panel = CalendarPanel::mount(app.calendar(), app.config.poll_interval).await;
            if panel.connection().is_connected() {
                println!("Google Calendar is already connected.");
                return Ok(());
            }
            panel.connect().await?;
            println!("Waiting for the grant, Ctrl-C to stop.");
            tokio::select! {
                connected = panel.connected() => {
                    if connected {
                        println!("Google Calendar connected.");
                    }
                }
                _ = tokio::signal::ctrl_c() => info!("stopped waiting for the calendar grant"),
            }
        }
        CalendarCommand::Add { event_id } => app.calendar().add_event(event_id).await?,
    }
    Ok(())
}

async fn events(app: &App, command: EventsCommand) -> Result<(), CliError> {
    let board = app.board();
    match command {
        EventsCommand::Upcoming => print_events(&board.upcoming().await?),
        EventsCommand::Mine => print_events(&board.mine().await?),
        EventsCommand::Search {
            text,
            location,
            start_date,
            end_date,
        } => {
            let query = SearchQuery {
                text,
                location,
                start_date,
                end_date,
            };
            print_events(&board.search(&query).await?);
        }
        EventsCommand::Show { event_id } => print_event(&board.get(event_id).await?),
        EventsCommand::Create { fields } => {
            let event_id = board.create(&fields.into()).await?;
            print_event(&board.get(event_id).await?);
        }
        EventsCommand::Update { event_id, fields } => {
            board.update(event_id, &fields.into()).await?;
            print_event(&board.get(event_id).await?);
        }
        EventsCommand::Delete { event_id } => board.delete(event_id).await?,
        EventsCommand::Attendees { event_id } => {
            for attendee in board.attendees(event_id).await? {
                println!(
                    "{} {}: {}",
                    attendee.first_name, attendee.last_name, attendee.rsvp.status
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(session_file) = cli.session_file {
        config.session_file = session_file;
    }

    let notifier = Notifier::new();
    let printer = tokio::spawn(print_notifications(notifier.subscribe()));

    let result = run(cli.command, config, notifier).await;
    // every sender is gone once `run` returns, which ends the printer
    let _ = printer.await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evently::api::ApiError;
    use std::time::Duration;

    /// No server listens here, so any page that loads data fails fast.
    fn app_at(href: &str, dir: &tempfile::TempDir) -> App {
        let config = Config {
            api_url: "http://127.0.0.1:9".to_string(),
            session_file: dir.path().join("session.json"),
            redirect_delay: Duration::ZERO,
            ..Config::default()
        };
        App::new(
            config,
            Notifier::new(),
            Location::parse(href).expect("test href should parse"),
        )
    }

    #[tokio::test]
    async fn test_callback_goes_on_to_the_landing_page() {
        let dir = tempfile::tempdir().expect("failed to create a temp dir");
        let app = app_at("/auth/callback?token=jwt.abc&user_id=42", &dir);

        let result = app.open().await;

        assert!(app.session.is_authenticated());
        assert_eq!(app.browser.location().path(), "/");
        // the landing page is EventList, which asks the backend for the user's events
        assert!(matches!(
            result,
            Err(CliError::Events(EventError::Api(ApiError::Transport(_))))
        ));
    }

    #[tokio::test]
    async fn test_rejected_callback_stays_put() {
        let dir = tempfile::tempdir().expect("failed to create a temp dir");
        let app = app_at("/auth/callback?token=jwt.abc", &dir);

        assert!(app.open().await.is_ok());
        assert!(!app.session.is_authenticated());
        assert_eq!(app.browser.location().path(), "/auth/callback");
    }
}
