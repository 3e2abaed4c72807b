//! In-process doubles: a `ChatApi` that talks straight to an in-memory
//! store under a fixed identity, and a scriptable uploader.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use uuid::Uuid;

use supportline_db::{Database, NewMessage, StoreError};
use supportline_types::api::{ReactResponse, ReactionAction, SendMessageRequest};
use supportline_types::{Actor, Message, Side, ThreadSummary};

use crate::api::ChatApi;
use crate::error::ClientError;
use crate::upload::{AttachmentUploader, StagedAttachment};

pub(crate) const GREETING: &str = "Welcome! How can we help?";

pub(crate) fn store() -> Arc<Database> {
    Arc::new(Database::open_in_memory().unwrap())
}

fn store_err(e: StoreError) -> ClientError {
    match e {
        StoreError::NotFound(_) => ClientError::NotFound,
        StoreError::Forbidden(_) => ClientError::Forbidden,
        StoreError::Validation(msg) => ClientError::Validation(msg),
        StoreError::Internal(e) => ClientError::Transient(e.to_string()),
    }
}

pub(crate) struct LocalChatApi {
    db: Arc<Database>,
    actor: Actor,
    pub listed: Mutex<Vec<Uuid>>,
    pub bootstrap_calls: AtomicUsize,
    pub mark_read_calls: AtomicUsize,
    pub react_actions: Mutex<Vec<ReactionAction>>,
    pub fail_lists: AtomicBool,
    /// Lists hang for an hour of (paused) time before answering.
    pub stall_lists: AtomicBool,
}

impl LocalChatApi {
    pub fn new(db: Arc<Database>, actor: Actor) -> Arc<Self> {
        Arc::new(Self {
            db,
            actor,
            listed: Mutex::new(Vec::new()),
            bootstrap_calls: AtomicUsize::new(0),
            mark_read_calls: AtomicUsize::new(0),
            react_actions: Mutex::new(Vec::new()),
            fail_lists: AtomicBool::new(false),
            stall_lists: AtomicBool::new(false),
        })
    }

    pub fn list_calls(&self) -> usize {
        self.listed.lock().unwrap().len()
    }

    pub fn list_calls_for(&self, thread_id: Uuid) -> usize {
        self.listed.lock().unwrap().iter().filter(|t| **t == thread_id).count()
    }
}

impl ChatApi for LocalChatApi {
    async fn list(&self, thread_id: Uuid) -> Result<Vec<Message>, ClientError> {
        self.listed.lock().unwrap().push(thread_id);
        if self.stall_lists.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(ClientError::Transient("connection reset".into()));
        }
        if !self.actor.can_access(thread_id) {
            return Err(ClientError::Forbidden);
        }
        self.db.list_messages(thread_id).map_err(store_err)
    }

    async fn all_chats(&self) -> Result<Vec<ThreadSummary>, ClientError> {
        if self.actor.side != Side::Admin {
            return Err(ClientError::Forbidden);
        }
        self.db.thread_summaries().map_err(store_err)
    }

    async fn send(&self, req: SendMessageRequest) -> Result<Message, ClientError> {
        let attachment = req.attachment().map_err(ClientError::Validation)?;
        let thread_id = req.thread_id.unwrap_or(self.actor.id);
        let new = NewMessage {
            thread_id,
            body: req.message,
            attachment,
            reply_to_id: req.reply_to_id,
        };
        self.db.send_message(&self.actor, new).map_err(store_err)
    }

    async fn edit(&self, message_id: i64, body: String) -> Result<Message, ClientError> {
        self.db.edit_message(&self.actor, message_id, &body).map_err(store_err)
    }

    async fn delete(&self, message_id: i64) -> Result<(), ClientError> {
        self.db.delete_message(&self.actor, message_id).map_err(store_err)
    }

    async fn react(
        &self,
        message_id: i64,
        emoji: String,
        action: ReactionAction,
    ) -> Result<ReactResponse, ClientError> {
        self.react_actions.lock().unwrap().push(action);
        let (added, message) = self
            .db
            .react(&self.actor, message_id, &emoji, action)
            .map_err(store_err)?;
        Ok(ReactResponse { added, message })
    }

    async fn mark_read(&self, thread_id: Uuid, _side: Side) -> Result<usize, ClientError> {
        self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
        self.db.mark_read(self.actor.side, thread_id).map_err(store_err)
    }

    async fn bootstrap(&self) -> Result<Option<Message>, ClientError> {
        self.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
        if self.actor.side != Side::User {
            return Err(ClientError::Forbidden);
        }
        self.db.insert_greeting(self.actor.id, GREETING).map_err(store_err)
    }
}

#[derive(Default)]
pub(crate) struct FakeUploader {
    pub fail: bool,
    pub uploads: AtomicUsize,
}

impl AttachmentUploader for FakeUploader {
    async fn upload(&self, staged: &StagedAttachment) -> Result<String, ClientError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClientError::Transient("upload timed out".into()));
        }
        Ok(format!("https://files.test/{}", staged.name))
    }
}
