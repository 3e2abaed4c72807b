/// Database row types. These map directly to SQLite rows and are
/// converted into `supportline_types` models at the query boundary.

pub struct MessageRow {
    pub id: i64,
    pub thread_id: String,
    pub author_id: String,
    pub author_side: String,
    pub body: String,
    pub attachment_kind: Option<String>,
    pub attachment_url: Option<String>,
    pub attachment_name: Option<String>,
    pub attachment_mime: Option<String>,
    pub reply_to_id: Option<i64>,
    pub edited_at: Option<String>,
    pub created_at: String,
    pub read_by_user: bool,
    pub read_by_admin: bool,
}

pub struct ReactionRow {
    pub message_id: i64,
    pub user_id: String,
    pub emoji: String,
}

pub struct ThreadSummaryRow {
    pub thread_id: String,
    pub body: String,
    pub attachment_kind: Option<String>,
    pub attachment_url: Option<String>,
    pub attachment_name: Option<String>,
    pub attachment_mime: Option<String>,
    pub created_at: String,
    pub unread_count: u32,
}
