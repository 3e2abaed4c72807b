use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use supportline_types::api::{
    BootstrapResponse, DeleteMessageRequest, DeleteMessageResponse, EditMessageRequest,
    ListQuery, MarkReadRequest, MarkReadResponse, ReactRequest, ReactResponse, ReactionAction,
    SendMessageRequest,
};
use supportline_types::{Actor, Message, Side, ThreadSummary};

use crate::error::ClientError;

/// Calls a Sync Client makes against the Message Store. Every call is a
/// single request; nothing here retries.
pub trait ChatApi: Send + Sync + 'static {
    fn list(&self, thread_id: Uuid) -> impl Future<Output = Result<Vec<Message>, ClientError>> + Send;

    fn all_chats(&self) -> impl Future<Output = Result<Vec<ThreadSummary>, ClientError>> + Send;

    fn send(&self, req: SendMessageRequest) -> impl Future<Output = Result<Message, ClientError>> + Send;

    fn edit(&self, message_id: i64, body: String) -> impl Future<Output = Result<Message, ClientError>> + Send;

    fn delete(&self, message_id: i64) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn react(
        &self,
        message_id: i64,
        emoji: String,
        action: ReactionAction,
    ) -> impl Future<Output = Result<ReactResponse, ClientError>> + Send;

    fn mark_read(&self, thread_id: Uuid, side: Side) -> impl Future<Output = Result<usize, ClientError>> + Send;

    /// Ask the server to greet the caller's own empty thread.
    fn bootstrap(&self) -> impl Future<Output = Result<Option<Message>, ClientError>> + Send;
}

/// `ChatApi` over the HTTP contract.
pub struct HttpChatApi {
    http: Client,
    base_url: String,
    token: String,
    actor: Actor,
}

impl HttpChatApi {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        actor: Actor,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            actor,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let resp = req.bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::from_status(status));
        }
        Ok(resp.json::<T>().await?)
    }
}

impl ChatApi for HttpChatApi {
    async fn list(&self, thread_id: Uuid) -> Result<Vec<Message>, ClientError> {
        let query = ListQuery {
            thread_id: Some(thread_id),
        };
        self.execute(self.http.get(self.url("/chat/list")).query(&query))
            .await
    }

    async fn all_chats(&self) -> Result<Vec<ThreadSummary>, ClientError> {
        self.execute(self.http.get(self.url("/chat/all_chats"))).await
    }

    async fn send(&self, mut req: SendMessageRequest) -> Result<Message, ClientError> {
        req.author_side = Some(self.actor.side);
        self.execute(self.http.post(self.url("/chat/send")).json(&req))
            .await
    }

    async fn edit(&self, message_id: i64, body: String) -> Result<Message, ClientError> {
        let req = EditMessageRequest {
            message_id,
            message: body,
            user_id: Some(self.actor.id),
        };
        self.execute(self.http.post(self.url("/chat/edit")).json(&req))
            .await
    }

    async fn delete(&self, message_id: i64) -> Result<(), ClientError> {
        let req = DeleteMessageRequest {
            message_id,
            user_id: Some(self.actor.id),
        };
        let _: DeleteMessageResponse = self
            .execute(self.http.post(self.url("/chat/delete")).json(&req))
            .await?;
        Ok(())
    }

    async fn react(
        &self,
        message_id: i64,
        emoji: String,
        action: ReactionAction,
    ) -> Result<ReactResponse, ClientError> {
        let req = ReactRequest {
            message_id,
            user_id: Some(self.actor.id),
            reaction: emoji,
            action,
        };
        self.execute(self.http.post(self.url("/chat/react")).json(&req))
            .await
    }

    async fn mark_read(&self, thread_id: Uuid, side: Side) -> Result<usize, ClientError> {
        let req = MarkReadRequest {
            thread_id: Some(thread_id),
            is_admin: Some(side == Side::Admin),
        };
        let resp: MarkReadResponse = self
            .execute(self.http.put(self.url("/chat/mark_read")).json(&req))
            .await?;
        Ok(resp.updated)
    }

    async fn bootstrap(&self) -> Result<Option<Message>, ClientError> {
        let resp: BootstrapResponse = self
            .execute(self.http.post(self.url("/chat/bootstrap")))
            .await?;
        Ok(resp.created)
    }
}
