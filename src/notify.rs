use crate::timer::TimerHandle;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

impl Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            NotificationKind::Success => write!(f, "[ok] {}", self.message),
            NotificationKind::Error => write!(f, "[error] {}", self.message),
        }
    }
}

/// Publish side of the app-wide notification channel. Any component holding
/// a clone can raise a notification without knowing who displays it.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn publish(&self, notification: Notification) {
        // nobody listening is fine
        let _ = self.sender.send(notification);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(Notification::success(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(Notification::error(message));
    }
}

/// The single on-screen notification slot. Success notifications clear
/// themselves after `dismiss_after`; errors stay until closed or replaced.
pub struct Toast {
    current: Arc<Mutex<Option<Notification>>>,
    dismiss_after: Duration,
    dismiss: Option<TimerHandle>,
}

impl Toast {
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            dismiss_after,
            dismiss: None,
        }
    }

    pub fn show(&mut self, notification: Notification) {
        let auto_dismiss = notification.kind == NotificationKind::Success;
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(notification.clone());

        // replacing the timer cancels any dismissal armed for the previous one
        self.dismiss = auto_dismiss.then(|| {
            let current = self.current.clone();
            TimerHandle::after(self.dismiss_after, move || {
                let mut slot = current.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.as_ref() == Some(&notification) {
                    *slot = None;
                }
            })
        });
    }

    pub fn current(&self) -> Option<Notification> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn close(&mut self) {
        self.dismiss = None;
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
