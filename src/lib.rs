pub mod account;
pub mod api;
pub mod auth_callback;
pub mod browser;
pub mod calendar;
pub mod config;
pub mod events;
pub mod notify;
pub mod route;
pub mod rsvp;
pub mod session;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;
