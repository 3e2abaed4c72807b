pub mod api;
pub mod models;

pub use models::{Actor, Attachment, Message, Reaction, Side, ThreadSummary};
