use crate::browser::Browser;
use crate::route::ROOT_PATH;
use crate::timer::TimerHandle;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Landing page of the calendar consent flow, shown in the window the
/// consent page was opened in. It has no controls: after `delay` it closes its
/// own window, or sends the tab to the app root when nothing opened it.
pub struct CalendarConnectedPage {
    timer: TimerHandle,
}

impl CalendarConnectedPage {
    pub fn mount(browser: Arc<dyn Browser>, delay: Duration) -> Self {
        let timer = TimerHandle::after(delay, move || {
            if browser.has_opener() {
                info!("calendar connected, closing the consent window");
                browser.close_window();
            } else {
                browser.assign(ROOT_PATH);
            }
        });
        Self { timer }
    }

    /// Waits for the window to close or redirect.
    pub async fn finished(self) {
        self.timer.finished().await;
    }
}
