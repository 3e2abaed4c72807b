use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ClientError;

/// A live poll loop. Dropping the handle cancels the loop, including a
/// tick that is still in flight, so nothing keeps writing into a view the
/// user has left.
pub struct PollHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel and wait for the loop to wind down.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run `tick` now and then every `every` until cancelled. Failed ticks
/// are logged and dropped; the next tick is the retry.
pub(crate) fn spawn_poll_loop<F, Fut>(label: String, every: Duration, mut tick: F) -> PollHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ClientError>> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                _ = token.cancelled() => break,
                result = tick() => {
                    if let Err(e) = result {
                        warn!("Poll of {} failed, retrying next tick: {}", label, e);
                    }
                }
            }
        }

        debug!("Polling of {} stopped", label);
    });

    PollHandle {
        cancel,
        task: Some(task),
    }
}
