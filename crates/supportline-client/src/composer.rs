//! Message input state: plain text, a reply target or an edit target, and
//! at most one staged attachment.

use tracing::debug;

use supportline_types::Message;

use crate::api::ChatApi;
use crate::error::ClientError;
use crate::sync::{OutgoingMessage, SyncClient};
use crate::upload::{AttachmentLimits, AttachmentUploader, StagedAttachment};

const REF_PREVIEW_CHARS: usize = 80;

/// What the composer remembers about a message it replies to or edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: i64,
    pub preview: String,
    pub has_attachment: bool,
}

impl From<&Message> for MessageRef {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id,
            preview: msg.preview(REF_PREVIEW_CHARS),
            has_attachment: msg.attachment.is_some(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ComposerMode {
    #[default]
    Normal,
    Replying(MessageRef),
    Editing(MessageRef),
}

/// A submission taken out of the composer. It owns everything it needs,
/// so the composer stays usable while it runs.
#[derive(Debug, Clone)]
pub enum Submission {
    Edit {
        message_id: i64,
        body: String,
    },
    Send {
        body: String,
        staged: Option<StagedAttachment>,
        reply_to_id: Option<i64>,
    },
}

impl Submission {
    /// Run the submission. A staged attachment is uploaded first; if that
    /// fails nothing is sent.
    pub async fn execute<A, U>(self, sync: &SyncClient<A>, uploader: &U) -> Result<Message, ClientError>
    where
        A: ChatApi,
        U: AttachmentUploader,
    {
        match self {
            Submission::Edit { message_id, body } => sync.edit(message_id, body).await,
            Submission::Send {
                body,
                staged,
                reply_to_id,
            } => {
                let attachment = match staged {
                    Some(staged) => {
                        let url = uploader.upload(&staged).await?;
                        debug!("Uploaded {} to {}", staged.name, url);
                        Some(staged.into_attachment(url))
                    }
                    None => None,
                };

                sync.send(OutgoingMessage {
                    body,
                    attachment,
                    reply_to_id,
                })
                .await
            }
        }
    }
}

/// Input as it was when a submission started.
#[derive(Debug)]
struct InFlight {
    mode: ComposerMode,
    text: String,
    staged: Option<StagedAttachment>,
}

#[derive(Debug, Default)]
pub struct Composer {
    mode: ComposerMode,
    text: String,
    staged: Option<StagedAttachment>,
    in_flight: Option<InFlight>,
    limits: AttachmentLimits,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: AttachmentLimits) -> Self {
        Self {
            limits,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> &ComposerMode {
        &self.mode
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn staged(&self) -> Option<&StagedAttachment> {
        self.staged.as_ref()
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn reply_to(&mut self, msg: &Message) {
        if matches!(self.mode, ComposerMode::Editing(_)) {
            self.text.clear();
        }
        self.mode = ComposerMode::Replying(msg.into());
    }

    pub fn start_edit(&mut self, msg: &Message) {
        self.mode = ComposerMode::Editing(msg.into());
        self.text = msg.body.clone();
        self.staged = None;
    }

    /// Back to a plain message. Leaving an edit drops its prefilled text.
    pub fn cancel(&mut self) {
        if matches!(self.mode, ComposerMode::Editing(_)) {
            self.text.clear();
        }
        self.mode = ComposerMode::Normal;
    }

    pub fn stage_attachment(&mut self, staged: StagedAttachment) -> Result<(), ClientError> {
        if matches!(self.mode, ComposerMode::Editing(_)) {
            return Err(ClientError::validation("attachments cannot be changed while editing"));
        }
        self.limits.check(&staged)?;
        self.staged = Some(staged);
        Ok(())
    }

    pub fn clear_attachment(&mut self) {
        self.staged = None;
    }

    pub fn can_submit(&self) -> bool {
        if self.is_sending() {
            return false;
        }
        let has_text = !self.text.trim().is_empty();
        match &self.mode {
            ComposerMode::Editing(target) => has_text || target.has_attachment,
            _ => has_text || self.staged.is_some(),
        }
    }

    /// Take the pending input out as a [`Submission`] and mark the composer
    /// as sending. Input stays in place until [`Composer::finish_submit`].
    pub fn begin_submit(&mut self) -> Result<Submission, ClientError> {
        if self.is_sending() {
            return Err(ClientError::validation("a message is already being sent"));
        }
        if !self.can_submit() {
            return Err(ClientError::validation("nothing to send"));
        }

        let body = self.text.trim().to_string();
        let submission = match &self.mode {
            ComposerMode::Editing(target) => Submission::Edit {
                message_id: target.id,
                body,
            },
            ComposerMode::Replying(target) => Submission::Send {
                body,
                staged: self.staged.clone(),
                reply_to_id: Some(target.id),
            },
            ComposerMode::Normal => Submission::Send {
                body,
                staged: self.staged.clone(),
                reply_to_id: None,
            },
        };

        self.in_flight = Some(InFlight {
            mode: self.mode.clone(),
            text: self.text.clone(),
            staged: self.staged.clone(),
        });
        Ok(submission)
    }

    /// Settle a submission started with `begin_submit`. Success clears the
    /// input that was sent; anything changed while the call was in flight
    /// stays. Failure keeps the input for another try.
    pub fn finish_submit(&mut self, result: &Result<Message, ClientError>) {
        let Some(sent) = self.in_flight.take() else {
            return;
        };
        if result.is_err() {
            return;
        }
        if self.mode == sent.mode {
            self.mode = ComposerMode::Normal;
        }
        if self.text == sent.text {
            self.text.clear();
        }
        if self.staged == sent.staged {
            self.staged = None;
        }
    }

    pub async fn submit<A, U>(&mut self, sync: &SyncClient<A>, uploader: &U) -> Result<Message, ClientError>
    where
        A: ChatApi,
        U: AttachmentUploader,
    {
        let submission = self.begin_submit()?;
        let result = submission.execute(sync, uploader).await;
        self.finish_submit(&result);
        result
    }
}
