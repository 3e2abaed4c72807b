//! Pure projection of a thread snapshot into what a chat view draws.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use supportline_types::{Actor, Attachment, Message, Side};

const REPLY_SNIPPET_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    Today,
    Yesterday,
    Date(NaiveDate),
}

impl DayLabel {
    fn for_day(day: NaiveDate, today: NaiveDate) -> Self {
        if day == today {
            DayLabel::Today
        } else if today.pred_opt() == Some(day) {
            DayLabel::Yesterday
        } else {
            DayLabel::Date(day)
        }
    }
}

impl std::fmt::Display for DayLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayLabel::Today => f.write_str("Today"),
            DayLabel::Yesterday => f.write_str("Yesterday"),
            DayLabel::Date(d) => write!(f, "{}", d.format("%d.%m.%Y")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPreview {
    Resolved { id: i64, snippet: String },
    /// The target is gone; only its id is left.
    Missing { id: i64 },
}

impl ReplyPreview {
    pub fn label(&self) -> String {
        match self {
            ReplyPreview::Resolved { snippet, .. } => snippet.clone(),
            ReplyPreview::Missing { id } => format!("Reply to message #{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionBadge {
    pub emoji: String,
    pub count: usize,
    pub reacted_by_me: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub id: i64,
    pub is_mine: bool,
    pub show_sender_name: bool,
    pub author_side: Side,
    pub body: String,
    pub attachment: Option<Attachment>,
    pub reply: Option<ReplyPreview>,
    pub reactions: Vec<ReactionBadge>,
    pub edited: bool,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderItem {
    DaySeparator(DayLabel),
    Message(MessageView),
}

/// Lay out `messages` for `viewer`. Days and times are computed in `tz`
/// relative to `now`; the same inputs always give the same output.
pub fn project<Tz: TimeZone>(
    messages: &[Message],
    viewer: &Actor,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<RenderItem> {
    let today = now.with_timezone(tz).date_naive();
    let by_id: HashMap<i64, &Message> = messages.iter().map(|m| (m.id, m)).collect();

    let mut items = Vec::with_capacity(messages.len() + 4);
    let mut current_day: Option<NaiveDate> = None;
    let mut previous_side: Option<Side> = None;

    for msg in messages {
        let local = msg.created_at.with_timezone(tz);
        let day = local.date_naive();

        if current_day != Some(day) {
            items.push(RenderItem::DaySeparator(DayLabel::for_day(day, today)));
            current_day = Some(day);
            previous_side = None;
        }

        let is_mine = msg.author_side == viewer.side;
        let show_sender_name = !is_mine && previous_side != Some(msg.author_side);
        previous_side = Some(msg.author_side);

        items.push(RenderItem::Message(MessageView {
            id: msg.id,
            is_mine,
            show_sender_name,
            author_side: msg.author_side,
            body: msg.body.clone(),
            attachment: msg.attachment.clone(),
            reply: msg.reply_to_id.map(|id| match by_id.get(&id) {
                Some(target) => ReplyPreview::Resolved {
                    id,
                    snippet: target.preview(REPLY_SNIPPET_CHARS),
                },
                None => ReplyPreview::Missing { id },
            }),
            reactions: badges(msg, viewer.id),
            edited: msg.edited_at.is_some(),
            time: local.time(),
        }));
    }

    items
}

fn badges(msg: &Message, viewer_id: Uuid) -> Vec<ReactionBadge> {
    let mut out: Vec<ReactionBadge> = Vec::new();
    for r in &msg.reactions {
        let mine = r.user_id == viewer_id;
        match out.iter_mut().find(|b| b.emoji == r.emoji) {
            Some(badge) => {
                badge.count += 1;
                badge.reacted_by_me |= mine;
            }
            None => out.push(ReactionBadge {
                emoji: r.emoji.clone(),
                count: 1,
                reacted_by_me: mine,
            }),
        }
    }
    out
}
