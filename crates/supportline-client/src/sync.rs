use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use supportline_types::api::{ReactResponse, ReactionAction, SendMessageRequest};
use supportline_types::{Actor, Attachment, Message, Side};

use crate::api::ChatApi;
use crate::error::ClientError;
use crate::poll::{PollHandle, spawn_poll_loop};

/// Local copy of one thread, exactly as the last poll returned it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadView {
    pub thread_id: Uuid,
    pub messages: Vec<Message>,
    /// `None` until the first successful poll.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl ThreadView {
    pub fn message(&self, id: i64) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn unread_for(&self, side: Side) -> usize {
        self.messages
            .iter()
            .filter(|m| m.author_side != side && !m.is_read_by(side))
            .count()
    }
}

/// A message ready to go out, attachment already uploaded.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub body: String,
    pub attachment: Option<Attachment>,
    pub reply_to_id: Option<i64>,
}

/// Per-thread, per-actor synchronizer. Create one for every open thread
/// view; the thread it serves never changes.
pub struct SyncClient<A> {
    inner: Arc<SyncInner<A>>,
}

impl<A> Clone for SyncClient<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct SyncInner<A> {
    api: Arc<A>,
    actor: Actor,
    thread_id: Uuid,
    view: watch::Sender<Arc<ThreadView>>,
    /// One call at a time per actor: a poll never overlaps this actor's
    /// own writes.
    sequencer: Mutex<()>,
    /// Set by the first successful list of this instance.
    mounted: AtomicBool,
}

impl<A: ChatApi> SyncClient<A> {
    pub fn new(api: Arc<A>, actor: Actor, thread_id: Uuid) -> Self {
        let (view, _) = watch::channel(Arc::new(ThreadView {
            thread_id,
            ..Default::default()
        }));
        Self {
            inner: Arc::new(SyncInner {
                api,
                actor,
                thread_id,
                view,
                sequencer: Mutex::new(()),
                mounted: AtomicBool::new(false),
            }),
        }
    }

    /// A user's client for their own thread.
    pub fn own_thread(api: Arc<A>, actor: Actor) -> Self {
        Self::new(api, actor, actor.id)
    }

    pub fn actor(&self) -> Actor {
        self.inner.actor
    }

    pub fn thread_id(&self) -> Uuid {
        self.inner.thread_id
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ThreadView>> {
        self.inner.view.subscribe()
    }

    pub fn snapshot(&self) -> Arc<ThreadView> {
        self.inner.view.borrow().clone()
    }

    /// Start polling. The first tick runs right away (the mount-time list).
    pub fn start(&self, every: Duration) -> PollHandle {
        let client = self.clone();
        spawn_poll_loop(format!("thread {}", self.inner.thread_id), every, move || {
            let client = client.clone();
            async move { client.tick().await }
        })
    }

    /// One poll: list, greet an empty thread on mount, sweep read state,
    /// then replace the local snapshot.
    pub async fn tick(&self) -> Result<(), ClientError> {
        let _turn = self.inner.sequencer.lock().await;
        self.poll_locked().await
    }

    async fn poll_locked(&self) -> Result<(), ClientError> {
        let inner = &self.inner;
        let side = inner.actor.side;
        let mut messages = inner.api.list(inner.thread_id).await?;

        // Only the first list of this instance may greet. Later empty
        // polls never do, even if the greeting call failed.
        let first_list = !inner.mounted.swap(true, Ordering::AcqRel);
        if first_list && side == Side::User && messages.is_empty() {
            match inner.api.bootstrap().await {
                Ok(Some(greeting)) => {
                    info!("Greeting {} posted into thread {}", greeting.id, inner.thread_id);
                    messages.push(greeting);
                }
                Ok(None) => debug!("Thread {} was no longer empty at greeting time", inner.thread_id),
                Err(e) => warn!("Greeting for thread {} failed: {}", inner.thread_id, e),
            }
        }

        let has_unread = messages
            .iter()
            .any(|m| m.author_side != side && !m.is_read_by(side));
        if has_unread {
            match inner.api.mark_read(inner.thread_id, side).await {
                Ok(_) => {
                    for m in messages.iter_mut().filter(|m| m.author_side != side) {
                        m.set_read_by(side);
                    }
                }
                Err(e) => warn!("mark_read on thread {} failed: {}", inner.thread_id, e),
            }
        }

        inner.view.send_replace(Arc::new(ThreadView {
            thread_id: inner.thread_id,
            messages,
            fetched_at: Some(Utc::now()),
        }));
        Ok(())
    }

    /// Re-list after an acknowledged write. The write already succeeded, so
    /// a failed refresh only leaves the view stale until the next tick.
    async fn refresh_locked(&self) {
        if let Err(e) = self.poll_locked().await {
            warn!("Refresh of thread {} after write failed: {}", self.inner.thread_id, e);
        }
    }

    // -- Mutations: awaited, never retried --

    pub async fn send(&self, outgoing: OutgoingMessage) -> Result<Message, ClientError> {
        let _turn = self.inner.sequencer.lock().await;

        let mut req = SendMessageRequest {
            thread_id: Some(self.inner.thread_id),
            message: outgoing.body,
            reply_to_id: outgoing.reply_to_id,
            ..Default::default()
        };
        req.set_attachment(outgoing.attachment);

        let message = self.inner.api.send(req).await?;
        self.refresh_locked().await;
        Ok(message)
    }

    pub async fn edit(&self, message_id: i64, body: String) -> Result<Message, ClientError> {
        let _turn = self.inner.sequencer.lock().await;
        let message = self.inner.api.edit(message_id, body).await?;
        self.refresh_locked().await;
        Ok(message)
    }

    pub async fn delete(&self, message_id: i64) -> Result<(), ClientError> {
        let _turn = self.inner.sequencer.lock().await;
        self.inner.api.delete(message_id).await?;
        self.refresh_locked().await;
        Ok(())
    }

    /// Toggle this actor's `emoji` on a message. The toggle is resolved
    /// here into an explicit add or remove, so repeating a call whose
    /// outcome was lost cannot flip the reaction back.
    pub async fn react(&self, message_id: i64, emoji: &str) -> Result<ReactResponse, ClientError> {
        let _turn = self.inner.sequencer.lock().await;

        let action = match self.snapshot().message(message_id) {
            Some(m) if m.has_reaction(self.inner.actor.id, emoji) => ReactionAction::Remove,
            _ => ReactionAction::Add,
        };

        let resp = self
            .inner
            .api
            .react(message_id, emoji.to_string(), action)
            .await?;
        self.refresh_locked().await;
        Ok(resp)
    }

    pub async fn mark_read(&self) -> Result<usize, ClientError> {
        let _turn = self.inner.sequencer.lock().await;
        let updated = self
            .inner
            .api
            .mark_read(self.inner.thread_id, self.inner.actor.side)
            .await?;
        self.refresh_locked().await;
        Ok(updated)
    }
}
