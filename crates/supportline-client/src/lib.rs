//! Client side of the support chat: polling synchronizers for a thread and
//! for the staff thread list, the message composer and the render
//! projection.

pub mod api;
pub mod composer;
pub mod config;
pub mod directory;
pub mod error;
pub mod poll;
pub mod render;
pub mod sync;
pub mod upload;

#[cfg(test)]
mod testing;

pub use api::{ChatApi, HttpChatApi};
pub use composer::{Composer, ComposerMode, MessageRef, Submission};
pub use directory::{AdminDesk, OpenThread, ThreadListClient};
pub use error::ClientError;
pub use poll::PollHandle;
pub use render::{DayLabel, MessageView, ReactionBadge, RenderItem, ReplyPreview, project};
pub use sync::{OutgoingMessage, SyncClient, ThreadView};
pub use upload::{AttachmentKind, AttachmentLimits, AttachmentUploader, HttpUploader, StagedAttachment};
