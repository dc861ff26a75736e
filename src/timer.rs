use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A pending timer or background loop. Dropping the handle cancels it, so a
/// view that owns one cannot be called back after it is torn down.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Runs `f` once after `delay`.
    pub fn after<F>(delay: Duration, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        })
    }

    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: tokio::spawn(future),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until the timer has fired or its loop has ended.
    pub async fn finished(mut self) {
        let _ = (&mut self.task).await;
    }

    pub fn clear(self) {}
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
