use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which participant of a thread authored or is looking at a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    User,
    Admin,
}

impl Side {
    pub fn from_is_admin(is_admin: bool) -> Self {
        if is_admin { Self::Admin } else { Self::User }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::User => Self::Admin,
            Self::Admin => Self::User,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

/// The authenticated identity behind a call. Always derived from the
/// verified session, never from request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub side: Side,
}

impl Actor {
    pub fn user(id: Uuid) -> Self {
        Self { id, side: Side::User }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { id, side: Side::Admin }
    }

    /// Whether this actor may see and touch messages of `thread_id`.
    pub fn can_access(&self, thread_id: Uuid) -> bool {
        match self.side {
            Side::Admin => true,
            Side::User => self.id == thread_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Attachment {
    Image {
        url: String,
    },
    File {
        url: String,
        name: String,
        mime_type: String,
    },
}

impl Attachment {
    pub fn url(&self) -> &str {
        match self {
            Self::Image { url } | Self::File { url, .. } => url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image { .. } => "image",
            Self::File { .. } => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub thread_id: Uuid,
    pub author_id: Uuid,
    pub author_side: Side,
    pub body: String,
    pub attachment: Option<Attachment>,
    pub reply_to_id: Option<i64>,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub read_by_user: bool,
    pub read_by_admin: bool,
    /// In the order they were added.
    pub reactions: Vec<Reaction>,
}

impl Message {
    pub fn is_read_by(&self, side: Side) -> bool {
        match side {
            Side::User => self.read_by_user,
            Side::Admin => self.read_by_admin,
        }
    }

    pub fn set_read_by(&mut self, side: Side) {
        match side {
            Side::User => self.read_by_user = true,
            Side::Admin => self.read_by_admin = true,
        }
    }

    pub fn has_reaction(&self, user_id: Uuid, emoji: &str) -> bool {
        self.reactions
            .iter()
            .any(|r| r.user_id == user_id && r.emoji == emoji)
    }

    pub fn preview(&self, max_chars: usize) -> String {
        preview_text(&self.body, self.attachment.as_ref(), max_chars)
    }
}

/// Short single-line rendering of a message body, falling back to an
/// attachment label when the body is empty.
pub fn preview_text(body: &str, attachment: Option<&Attachment>, max_chars: usize) -> String {
    let body = body.trim();
    if body.is_empty() {
        return match attachment {
            Some(Attachment::Image { .. }) => "[image]".to_string(),
            Some(Attachment::File { name, .. }) => format!("[file: {}]", name),
            None => String::new(),
        };
    }

    let line = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() <= max_chars {
        line
    } else {
        let mut cut: String = line.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}

/// One row of the staff thread list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: Uuid,
    pub last_message_preview: String,
    pub last_message_time: DateTime<Utc>,
    pub unread_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_collapses_whitespace_and_truncates() {
        assert_eq!(preview_text("  hello\n  world ", None, 20), "hello world");
        assert_eq!(preview_text("abcdef", None, 3), "abc…");
        assert_eq!(preview_text("Здравствуйте", None, 4), "Здра…");
    }

    #[test]
    fn preview_falls_back_to_attachment_label() {
        let image = Attachment::Image { url: "https://cdn/x.png".into() };
        let file = Attachment::File {
            url: "https://cdn/a.pdf".into(),
            name: "a.pdf".into(),
            mime_type: "application/pdf".into(),
        };
        assert_eq!(preview_text("", Some(&image), 10), "[image]");
        assert_eq!(preview_text(" ", Some(&file), 10), "[file: a.pdf]");
    }

    #[test]
    fn user_actor_only_reaches_own_thread() {
        let me = Uuid::new_v4();
        assert!(Actor::user(me).can_access(me));
        assert!(!Actor::user(me).can_access(Uuid::new_v4()));
        assert!(Actor::admin(Uuid::new_v4()).can_access(me));
    }

    #[test]
    fn side_parses_and_flips() {
        assert_eq!("admin".parse::<Side>(), Ok(Side::Admin));
        assert!("staff".parse::<Side>().is_err());
        assert_eq!(Side::User.opposite(), Side::Admin);
        assert_eq!(
            serde_json::to_string(&Side::User).unwrap(),
            "\"user\""
        );
    }
}
