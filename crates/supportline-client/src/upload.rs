use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, header};

use supportline_types::Attachment;
use supportline_types::api::UploadResponse;

use crate::error::ClientError;

const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    File,
}

/// An attachment picked in the composer but not uploaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAttachment {
    pub kind: AttachmentKind,
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl StagedAttachment {
    pub fn image(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            kind: AttachmentKind::Image,
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn file(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            kind: AttachmentKind::File,
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Message attachment pointing at the uploaded copy.
    pub fn into_attachment(self, url: String) -> Attachment {
        match self.kind {
            AttachmentKind::Image => Attachment::Image { url },
            AttachmentKind::File => Attachment::File {
                url,
                name: self.name,
                mime_type: self.mime_type,
            },
        }
    }
}

/// Checks run before any upload so oversized or unsupported files never
/// leave the client.
#[derive(Debug, Clone)]
pub struct AttachmentLimits {
    pub max_image_bytes: usize,
    pub max_file_bytes: usize,
    pub image_types: Vec<String>,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: 10 * MIB,
            max_file_bytes: 20 * MIB,
            image_types: ["image/jpeg", "image/png", "image/gif", "image/webp"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl AttachmentLimits {
    pub fn check(&self, staged: &StagedAttachment) -> Result<(), ClientError> {
        if staged.bytes.is_empty() {
            return Err(ClientError::validation("the selected file is empty"));
        }

        let max = match staged.kind {
            AttachmentKind::Image => {
                if !self.image_types.iter().any(|t| t == &staged.mime_type) {
                    return Err(ClientError::validation(format!(
                        "images must be one of: {}",
                        self.image_types.join(", ")
                    )));
                }
                self.max_image_bytes
            }
            AttachmentKind::File => self.max_file_bytes,
        };

        if staged.bytes.len() > max {
            return Err(ClientError::validation(format!(
                "{} is larger than {} MB",
                staged.name,
                max / MIB
            )));
        }
        Ok(())
    }
}

/// External attachment storage: takes the bytes, hands back a URL.
pub trait AttachmentUploader: Send + Sync {
    fn upload(&self, staged: &StagedAttachment) -> impl Future<Output = Result<String, ClientError>> + Send;
}

pub struct HttpUploader {
    http: Client,
    upload_url: String,
    token: String,
}

impl HttpUploader {
    pub fn new(upload_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            upload_url: upload_url.into(),
            token: token.into(),
        })
    }
}

impl AttachmentUploader for HttpUploader {
    async fn upload(&self, staged: &StagedAttachment) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(&self.upload_url)
            .bearer_auth(&self.token)
            .query(&[("name", staged.name.as_str())])
            .header(header::CONTENT_TYPE, staged.mime_type.as_str())
            .body(staged.bytes.clone())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::from_status(status));
        }

        let uploaded: UploadResponse = resp.json().await?;
        if uploaded.url.trim().is_empty() {
            return Err(ClientError::Transient("upload returned no url".into()));
        }
        Ok(uploaded.url)
    }
}
