use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use supportline_types::{Actor, ThreadSummary};

use crate::api::ChatApi;
use crate::error::ClientError;
use crate::poll::{PollHandle, spawn_poll_loop};
use crate::sync::SyncClient;

/// Staff-side list of every thread, most recent activity first, refreshed
/// by polling.
pub struct ThreadListClient<A> {
    api: Arc<A>,
    summaries: Arc<watch::Sender<Arc<Vec<ThreadSummary>>>>,
}

impl<A> Clone for ThreadListClient<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            summaries: self.summaries.clone(),
        }
    }
}

impl<A: ChatApi> ThreadListClient<A> {
    pub fn new(api: Arc<A>) -> Self {
        let (summaries, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            api,
            summaries: Arc::new(summaries),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<ThreadSummary>>> {
        self.summaries.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Vec<ThreadSummary>> {
        self.summaries.borrow().clone()
    }

    pub fn total_unread(&self) -> u32 {
        self.summaries.borrow().iter().map(|s| s.unread_count).sum()
    }

    pub async fn tick(&self) -> Result<(), ClientError> {
        let list = self.api.all_chats().await?;
        self.summaries.send_replace(Arc::new(list));
        Ok(())
    }

    pub fn start(&self, every: Duration) -> PollHandle {
        let client = self.clone();
        spawn_poll_loop("thread list".to_string(), every, move || {
            let client = client.clone();
            async move { client.tick().await }
        })
    }
}

/// The thread a desk currently has open, with its poller.
pub struct OpenThread<A> {
    pub client: SyncClient<A>,
    poll: PollHandle,
}

impl<A> OpenThread<A> {
    pub fn is_polling(&self) -> bool {
        self.poll.is_running()
    }
}

/// Staff workspace: the thread list plus at most one open thread.
/// Opening another thread tears down the previous thread's poller before
/// the new one starts.
pub struct AdminDesk<A> {
    api: Arc<A>,
    actor: Actor,
    thread_every: Duration,
    list: ThreadListClient<A>,
    list_poll: PollHandle,
    open: Option<OpenThread<A>>,
}

impl<A: ChatApi> AdminDesk<A> {
    pub fn start(api: Arc<A>, actor: Actor, list_every: Duration, thread_every: Duration) -> Self {
        let list = ThreadListClient::new(api.clone());
        let list_poll = list.start(list_every);
        Self {
            api,
            actor,
            thread_every,
            list,
            list_poll,
            open: None,
        }
    }

    pub fn threads(&self) -> &ThreadListClient<A> {
        &self.list
    }

    pub fn is_listing(&self) -> bool {
        self.list_poll.is_running()
    }

    pub fn current(&self) -> Option<&OpenThread<A>> {
        self.open.as_ref()
    }

    pub async fn open_thread(&mut self, thread_id: Uuid) -> &SyncClient<A> {
        if let Some(prev) = self.open.take() {
            if prev.client.thread_id() == thread_id {
                return &self.open.insert(prev).client;
            }
            info!("Leaving thread {}", prev.client.thread_id());
            prev.poll.stop().await;
        }

        info!("Opening thread {}", thread_id);
        let client = SyncClient::new(self.api.clone(), self.actor, thread_id);
        let poll = client.start(self.thread_every);
        &self.open.insert(OpenThread { client, poll }).client
    }

    pub async fn close_thread(&mut self) {
        if let Some(prev) = self.open.take() {
            prev.poll.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use supportline_db::NewMessage;
    use supportline_types::Side;

    use super::*;
    use crate::testing::{LocalChatApi, store};

    fn post(db: &supportline_db::Database, actor: &Actor, body: &str) {
        db.send_message(
            actor,
            NewMessage {
                thread_id: actor.id,
                body: body.into(),
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[tokio::test]
    async fn list_tracks_unread_totals() {
        let db = store();
        let anna = Actor::user(Uuid::new_v4());
        let boris = Actor::user(Uuid::new_v4());
        post(&db, &anna, "where is my certificate?");
        post(&db, &boris, "hi");
        post(&db, &boris, "anyone there?");

        let admin = Actor::admin(Uuid::new_v4());
        let list = ThreadListClient::new(LocalChatApi::new(db.clone(), admin));
        list.tick().await.unwrap();

        let threads = list.snapshot();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].thread_id, boris.id);
        assert_eq!(list.total_unread(), 3);

        db.mark_read(Side::Admin, boris.id).unwrap();
        list.tick().await.unwrap();
        assert_eq!(list.total_unread(), 1);
    }

    #[tokio::test]
    async fn users_cannot_list_threads() {
        let db = store();
        let user = Actor::user(Uuid::new_v4());
        let list = ThreadListClient::new(LocalChatApi::new(db, user));
        assert!(matches!(list.tick().await, Err(ClientError::Forbidden)));
        assert!(list.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn switching_threads_stops_the_previous_poller() {
        let db = store();
        let anna = Actor::user(Uuid::new_v4());
        let boris = Actor::user(Uuid::new_v4());
        post(&db, &anna, "first");
        post(&db, &boris, "second");

        let admin = Actor::admin(Uuid::new_v4());
        let api = LocalChatApi::new(db.clone(), admin);
        let mut desk = AdminDesk::start(api.clone(), admin, Duration::from_secs(5), Duration::from_secs(4));

        desk.open_thread(anna.id).await;
        tokio::time::sleep(Duration::from_secs(9)).await;
        let anna_polls = api.list_calls_for(anna.id);
        assert_eq!(anna_polls, 3);

        desk.open_thread(boris.id).await;
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(api.list_calls_for(anna.id), anna_polls);
        assert!(api.list_calls_for(boris.id) >= 5);
        assert_eq!(desk.current().unwrap().client.thread_id(), boris.id);
        assert!(desk.current().unwrap().is_polling());
        assert!(desk.is_listing());

        // Both threads were swept while open
        assert_eq!(desk.threads().total_unread(), 0);
        assert_eq!(api.bootstrap_calls.load(Ordering::SeqCst), 0);

        desk.close_thread().await;
        assert!(desk.current().is_none());
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(api.list_calls_for(boris.id) <= 7);
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_the_same_thread_keeps_its_poller() {
        let db = store();
        let admin = Actor::admin(Uuid::new_v4());
        let thread = Uuid::new_v4();
        let api = LocalChatApi::new(db, admin);
        let mut desk = AdminDesk::start(api.clone(), admin, Duration::from_secs(5), Duration::from_secs(4));

        desk.open_thread(thread).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        desk.open_thread(thread).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.list_calls_for(thread), 1);
    }
}
