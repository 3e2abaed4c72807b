use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use supportline_types::models::preview_text;
use supportline_types::api::ReactionAction;
use supportline_types::{Actor, Attachment, Message, Reaction, Side, ThreadSummary};

use crate::Database;
use crate::error::StoreError;
use crate::models::{MessageRow, ReactionRow, ThreadSummaryRow};

pub const MAX_BODY_CHARS: usize = 4000;
pub const MAX_EMOJI_BYTES: usize = 32;
pub const PREVIEW_CHARS: usize = 80;

const MESSAGE_COLUMNS: &str = "id, thread_id, author_id, author_side, body, \
     attachment_kind, attachment_url, attachment_name, attachment_mime, \
     reply_to_id, edited_at, created_at, read_by_user, read_by_admin";

/// Input of `send_message`. The side and author come from the `Actor`.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub thread_id: Uuid,
    pub body: String,
    pub attachment: Option<Attachment>,
    pub reply_to_id: Option<i64>,
}

/// What a reaction call does once a toggle has been resolved against the
/// current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReactionCommand {
    Add,
    Remove,
}

impl Database {
    // -- Reads --

    /// Thread log, oldest first.
    pub fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>, StoreError> {
        Ok(self.with_conn(|conn| load_thread(conn, thread_id))?)
    }

    pub fn get_message(&self, message_id: i64) -> Result<Option<Message>, StoreError> {
        Ok(self.with_conn(|conn| load_message(conn, message_id))?)
    }

    /// Staff thread list, most recently active first.
    pub fn thread_summaries(&self) -> Result<Vec<ThreadSummary>, StoreError> {
        Ok(self.with_conn(query_thread_summaries)?)
    }

    // -- Writes --

    pub fn send_message(&self, actor: &Actor, new: NewMessage) -> Result<Message, StoreError> {
        if !actor.can_access(new.thread_id) {
            return Err(StoreError::Forbidden(format!(
                "{} {} cannot post into thread {}",
                actor.side, actor.id, new.thread_id
            )));
        }
        validate_body(&new.body, new.attachment.is_some())?;
        if let Some(attachment) = &new.attachment {
            validate_attachment(attachment)?;
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            // A missing target is accepted: it may have been deleted after the
            // sender last polled. An existing one must be in the same thread.
            if let Some(reply_to_id) = new.reply_to_id {
                let target = fetch_row(&tx, reply_to_id)?;
                if target.is_some_and(|row| row.thread_id != new.thread_id.to_string()) {
                    return Err(StoreError::validation(format!(
                        "reply target {} is not in thread {}",
                        reply_to_id, new.thread_id
                    )));
                }
            }

            let id = insert_message(
                &tx,
                new.thread_id,
                actor.id,
                actor.side,
                &new.body,
                new.attachment.as_ref(),
                new.reply_to_id,
            )?;
            let message = load_message(&tx, id)?
                .ok_or_else(|| StoreError::message_not_found(id))?;
            tx.commit()?;

            debug!("Message {} sent by {} into thread {}", id, actor.side, new.thread_id);
            Ok(message)
        })
    }

    /// Insert the onboarding message as staff, but only into an empty
    /// thread. Returns `None` when the thread already has messages.
    pub fn insert_greeting(&self, thread_id: Uuid, body: &str) -> Result<Option<Message>, StoreError> {
        validate_body(body, false)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM messages WHERE thread_id = ?1",
                [thread_id.to_string()],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Ok(None);
            }

            let id = insert_message(&tx, thread_id, Uuid::nil(), Side::Admin, body, None, None)?;
            let message = load_message(&tx, id)?
                .ok_or_else(|| StoreError::message_not_found(id))?;
            tx.commit()?;

            debug!("Greeting {} inserted into thread {}", id, thread_id);
            Ok(Some(message))
        })
    }

    pub fn edit_message(&self, actor: &Actor, message_id: i64, body: &str) -> Result<Message, StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let row = authored_row(&tx, actor, message_id)?;
            validate_body(body, row.attachment_kind.is_some())?;

            tx.execute(
                "UPDATE messages SET body = ?1, edited_at = ?2 WHERE id = ?3",
                rusqlite::params![body, now_timestamp(), message_id],
            )?;
            let message = load_message(&tx, message_id)?
                .ok_or_else(|| StoreError::message_not_found(message_id))?;
            tx.commit()?;

            Ok(message)
        })
    }

    /// Hard delete. Reactions cascade; replies pointing here are left as is.
    pub fn delete_message(&self, actor: &Actor, message_id: i64) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            authored_row(&tx, actor, message_id)?;
            tx.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;
            tx.commit()?;

            debug!("Message {} deleted by {} {}", message_id, actor.side, actor.id);
            Ok(())
        })
    }

    /// Apply a reaction call. Returns whether the reaction is now present,
    /// together with the updated message.
    pub fn react(
        &self,
        actor: &Actor,
        message_id: i64,
        emoji: &str,
        action: ReactionAction,
    ) -> Result<(bool, Message), StoreError> {
        validate_emoji(emoji)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            visible_row(&tx, actor, message_id)?;

            let user_id = actor.id.to_string();
            let exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM message_reactions
                 WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                rusqlite::params![message_id, user_id, emoji],
                |row| row.get(0),
            )?;

            let command = match action {
                ReactionAction::Toggle if exists > 0 => ReactionCommand::Remove,
                ReactionAction::Toggle | ReactionAction::Add => ReactionCommand::Add,
                ReactionAction::Remove => ReactionCommand::Remove,
            };

            match command {
                ReactionCommand::Add => {
                    tx.execute(
                        "INSERT OR IGNORE INTO message_reactions (message_id, user_id, emoji, created_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![message_id, user_id, emoji, now_timestamp()],
                    )?;
                }
                ReactionCommand::Remove => {
                    tx.execute(
                        "DELETE FROM message_reactions
                         WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                        rusqlite::params![message_id, user_id, emoji],
                    )?;
                }
            }

            let message = load_message(&tx, message_id)?
                .ok_or_else(|| StoreError::message_not_found(message_id))?;
            tx.commit()?;

            Ok((command == ReactionCommand::Add, message))
        })
    }

    /// Mark every message of the thread that `side` did not author as read
    /// by `side`. Returns the number of messages that changed.
    pub fn mark_read(&self, side: Side, thread_id: Uuid) -> Result<usize, StoreError> {
        let column = read_column(side);
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                &format!(
                    "UPDATE messages SET {column} = 1
                     WHERE thread_id = ?1 AND author_side != ?2 AND {column} = 0"
                ),
                rusqlite::params![thread_id.to_string(), side.as_str()],
            )?;
            Ok(updated)
        })
    }
}

// -- Validation --

fn validate_body(body: &str, has_attachment: bool) -> Result<(), StoreError> {
    if body.trim().is_empty() && !has_attachment {
        return Err(StoreError::validation("message is empty"));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(StoreError::validation(format!(
            "message is longer than {} characters",
            MAX_BODY_CHARS
        )));
    }
    Ok(())
}

fn validate_attachment(attachment: &Attachment) -> Result<(), StoreError> {
    if attachment.url().trim().is_empty() {
        return Err(StoreError::validation("attachment url is empty"));
    }
    if let Attachment::File { name, .. } = attachment {
        if name.trim().is_empty() {
            return Err(StoreError::validation("file attachment has no name"));
        }
    }
    Ok(())
}

fn validate_emoji(emoji: &str) -> Result<(), StoreError> {
    if emoji.is_empty() || emoji.len() > MAX_EMOJI_BYTES || emoji.chars().any(char::is_whitespace) {
        return Err(StoreError::validation(format!("invalid reaction '{}'", emoji)));
    }
    Ok(())
}

// -- Row access --

fn read_column(side: Side) -> &'static str {
    match side {
        Side::User => "read_by_user",
        Side::Admin => "read_by_admin",
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn insert_message(
    conn: &Connection,
    thread_id: Uuid,
    author_id: Uuid,
    side: Side,
    body: &str,
    attachment: Option<&Attachment>,
    reply_to_id: Option<i64>,
) -> Result<i64> {
    let (kind, url, name, mime) = match attachment {
        Some(Attachment::Image { url }) => (Some("image"), Some(url.as_str()), None, None),
        Some(Attachment::File { url, name, mime_type }) => (
            Some("file"),
            Some(url.as_str()),
            Some(name.as_str()),
            Some(mime_type.as_str()),
        ),
        None => (None, None, None, None),
    };

    // The author has seen their own message; the other side has not.
    conn.execute(
        "INSERT INTO messages (thread_id, author_id, author_side, body,
             attachment_kind, attachment_url, attachment_name, attachment_mime,
             reply_to_id, created_at, read_by_user, read_by_admin)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        rusqlite::params![
            thread_id.to_string(),
            author_id.to_string(),
            side.as_str(),
            body,
            kind,
            url,
            name,
            mime,
            reply_to_id,
            now_timestamp(),
            side == Side::User,
            side == Side::Admin,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

fn map_message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        author_id: row.get(2)?,
        author_side: row.get(3)?,
        body: row.get(4)?,
        attachment_kind: row.get(5)?,
        attachment_url: row.get(6)?,
        attachment_name: row.get(7)?,
        attachment_mime: row.get(8)?,
        reply_to_id: row.get(9)?,
        edited_at: row.get(10)?,
        created_at: row.get(11)?,
        read_by_user: row.get(12)?,
        read_by_admin: row.get(13)?,
    })
}

fn fetch_row(conn: &Connection, message_id: i64) -> Result<Option<MessageRow>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        [message_id],
        map_message_row,
    )
    .optional()
}

/// Row of a message the actor is allowed to see. Messages in threads the
/// actor cannot reach are reported as missing.
fn visible_row(conn: &Connection, actor: &Actor, message_id: i64) -> Result<MessageRow, StoreError> {
    fetch_row(conn, message_id)?
        .filter(|row| {
            row.thread_id
                .parse::<Uuid>()
                .is_ok_and(|thread_id| actor.can_access(thread_id))
        })
        .ok_or_else(|| StoreError::message_not_found(message_id))
}

/// Row of a visible message that the actor authored.
fn authored_row(conn: &Connection, actor: &Actor, message_id: i64) -> Result<MessageRow, StoreError> {
    let row = visible_row(conn, actor, message_id)?;
    if row.author_id != actor.id.to_string() || row.author_side != actor.side.as_str() {
        return Err(StoreError::Forbidden(format!(
            "{} {} is not the author of message {}",
            actor.side, actor.id, message_id
        )));
    }
    Ok(row)
}

fn load_message(conn: &Connection, message_id: i64) -> Result<Option<Message>> {
    let Some(row) = fetch_row(conn, message_id)? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT message_id, user_id, emoji FROM message_reactions
         WHERE message_id = ?1
         ORDER BY id",
    )?;
    let reactions = stmt
        .query_map([message_id], map_reaction_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .filter_map(into_reaction)
        .collect();

    Ok(Some(into_message(row, reactions)))
}

fn load_thread(conn: &Connection, thread_id: Uuid) -> Result<Vec<Message>> {
    let thread_id = thread_id.to_string();

    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE thread_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([&thread_id], map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // One query for all reactions of the thread (eliminates N+1)
    let mut stmt = conn.prepare(
        "SELECT r.message_id, r.user_id, r.emoji
         FROM message_reactions r
         JOIN messages m ON m.id = r.message_id
         WHERE m.thread_id = ?1
         ORDER BY r.id",
    )?;
    let reaction_rows = stmt
        .query_map([&thread_id], map_reaction_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut reaction_map: HashMap<i64, Vec<Reaction>> = HashMap::new();
    for r in reaction_rows {
        let message_id = r.message_id;
        if let Some(reaction) = into_reaction(r) {
            reaction_map.entry(message_id).or_default().push(reaction);
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let reactions = reaction_map.remove(&row.id).unwrap_or_default();
            into_message(row, reactions)
        })
        .collect())
}

fn query_thread_summaries(conn: &Connection) -> Result<Vec<ThreadSummary>> {
    let mut stmt = conn.prepare(
        "SELECT m.thread_id, m.body, m.attachment_kind, m.attachment_url,
                m.attachment_name, m.attachment_mime, m.created_at,
                (SELECT COUNT(*) FROM messages u
                  WHERE u.thread_id = m.thread_id
                    AND u.author_side = 'user'
                    AND u.read_by_admin = 0)
         FROM messages m
         WHERE m.id = (SELECT MAX(id) FROM messages l WHERE l.thread_id = m.thread_id)
         ORDER BY m.created_at DESC, m.id DESC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(ThreadSummaryRow {
                thread_id: row.get(0)?,
                body: row.get(1)?,
                attachment_kind: row.get(2)?,
                attachment_url: row.get(3)?,
                attachment_name: row.get(4)?,
                attachment_mime: row.get(5)?,
                created_at: row.get(6)?,
                unread_count: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let attachment = attachment_from_parts(
                row.attachment_kind,
                row.attachment_url,
                row.attachment_name,
                row.attachment_mime,
            );
            ThreadSummary {
                thread_id: parse_uuid(&row.thread_id, "thread_id"),
                last_message_preview: preview_text(&row.body, attachment.as_ref(), PREVIEW_CHARS),
                last_message_time: parse_timestamp(&row.created_at),
                unread_count: row.unread_count,
            }
        })
        .collect())
}

// -- Row conversion --

fn map_reaction_row(row: &Row<'_>) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        message_id: row.get(0)?,
        user_id: row.get(1)?,
        emoji: row.get(2)?,
    })
}

fn into_reaction(row: ReactionRow) -> Option<Reaction> {
    match row.user_id.parse::<Uuid>() {
        Ok(user_id) => Some(Reaction {
            emoji: row.emoji,
            user_id,
        }),
        Err(e) => {
            warn!("Corrupt reaction user_id '{}' on message {}: {}", row.user_id, row.message_id, e);
            None
        }
    }
}

fn into_message(row: MessageRow, reactions: Vec<Reaction>) -> Message {
    let author_side = row.author_side.parse().unwrap_or_else(|e| {
        warn!("Corrupt author_side on message {}: {}", row.id, e);
        Side::User
    });

    Message {
        id: row.id,
        thread_id: parse_uuid(&row.thread_id, "thread_id"),
        author_id: parse_uuid(&row.author_id, "author_id"),
        author_side,
        body: row.body,
        attachment: attachment_from_parts(
            row.attachment_kind,
            row.attachment_url,
            row.attachment_name,
            row.attachment_mime,
        ),
        reply_to_id: row.reply_to_id,
        edited_at: row.edited_at.as_deref().map(parse_timestamp),
        created_at: parse_timestamp(&row.created_at),
        read_by_user: row.read_by_user,
        read_by_admin: row.read_by_admin,
        reactions,
    }
}

fn attachment_from_parts(
    kind: Option<String>,
    url: Option<String>,
    name: Option<String>,
    mime: Option<String>,
) -> Option<Attachment> {
    match (kind.as_deref(), url) {
        (Some("image"), Some(url)) => Some(Attachment::Image { url }),
        (Some("file"), Some(url)) => Some(Attachment::File {
            url,
            name: name.unwrap_or_default(),
            mime_type: mime.unwrap_or_else(|| "application/octet-stream".into()),
        }),
        _ => None,
    }
}

fn parse_uuid(value: &str, field: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", field, value, e);
        Uuid::default()
    })
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand through sqlite3 use datetime('now') format.
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", value, e);
            DateTime::default()
        })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
