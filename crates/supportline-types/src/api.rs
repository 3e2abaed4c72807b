use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Actor, Attachment, Message, Side};

// -- JWT Claims --

/// Claims issued by the session layer. Canonical definition shared by the
/// REST middleware and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
    pub exp: usize,
}

impl Claims {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.sub,
            side: Side::from_is_admin(self.is_admin),
        }
    }
}

// -- Listing --

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ListQuery {
    pub thread_id: Option<Uuid>,
}

// -- Messages --

/// `author_side` is advisory: the server derives the side from the session.
/// Request bodies tolerate fields they do not know, so older clients that
/// send extra keys keep working.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SendMessageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_side: Option<Side>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<i64>,
}

impl SendMessageRequest {
    /// Fold the flat wire fields into a single attachment.
    pub fn attachment(&self) -> Result<Option<Attachment>, String> {
        match (&self.image_url, &self.file_url) {
            (Some(_), Some(_)) => Err("a message carries at most one attachment".into()),
            (Some(url), None) => Ok(Some(Attachment::Image { url: url.clone() })),
            (None, Some(url)) => Ok(Some(Attachment::File {
                url: url.clone(),
                name: self.file_name.clone().unwrap_or_default(),
                mime_type: self
                    .file_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".into()),
            })),
            (None, None) => Ok(None),
        }
    }

    pub fn set_attachment(&mut self, attachment: Option<Attachment>) {
        self.image_url = None;
        self.file_url = None;
        self.file_name = None;
        self.file_type = None;
        match attachment {
            Some(Attachment::Image { url }) => self.image_url = Some(url),
            Some(Attachment::File { url, name, mime_type }) => {
                self.file_url = Some(url);
                self.file_name = Some(name);
                self.file_type = Some(mime_type);
            }
            None => {}
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EditMessageRequest {
    pub message_id: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeleteMessageRequest {
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeleteMessageResponse {
    pub deleted: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapResponse {
    pub created: Option<Message>,
}

// -- Reactions --

/// `Toggle` keeps the legacy single-verb surface. `Add` and `Remove` are
/// idempotent and safe to retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    #[default]
    Toggle,
    Add,
    Remove,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReactRequest {
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub reaction: String,
    #[serde(default)]
    pub action: ReactionAction,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReactResponse {
    pub added: bool,
    pub message: Message,
}

// -- Read state --

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MarkReadRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

// -- Uploads --

/// Response of the external attachment upload endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadResponse {
    pub url: String,
}
