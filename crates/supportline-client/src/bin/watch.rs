//! Terminal front end for the support chat. Users follow their own thread
//! and type messages; staff follow the thread list or one thread.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::{Local, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use supportline_client::config::ClientConfig;
use supportline_client::{
    AdminDesk, ChatApi, Composer, HttpChatApi, HttpUploader, RenderItem, StagedAttachment,
    SyncClient, ThreadView, project,
};
use supportline_types::{Actor, Side};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supportline=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    let api = Arc::new(HttpChatApi::new(
        config.base_url.clone(),
        config.token.clone(),
        config.actor,
        config.request_timeout,
    )?);
    info!("Connected to {} as {} {}", config.base_url, config.actor.side, config.actor.id);

    match (config.actor.side, config.thread_id) {
        (Side::Admin, None) => watch_thread_list(api, config).await,
        (Side::Admin, Some(thread_id)) => {
            let mut desk = AdminDesk::start(api, config.actor, config.list_poll, config.thread_poll);
            let sync = desk.open_thread(thread_id).await.clone();
            let result = converse(sync, &config).await;
            desk.close_thread().await;
            result
        }
        (Side::User, _) => {
            let sync = SyncClient::own_thread(api, config.actor);
            let _poll = sync.start(config.thread_poll);
            converse(sync, &config).await
        }
    }
}

async fn watch_thread_list(api: Arc<HttpChatApi>, config: ClientConfig) -> Result<()> {
    let desk = AdminDesk::start(api, config.actor, config.list_poll, config.thread_poll);
    let mut rx = desk.threads().subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let threads = rx.borrow_and_update().clone();
                println!("---- {} threads, {} unread", threads.len(), desk.threads().total_unread());
                for t in threads.iter() {
                    println!(
                        "{:>3}  {}  {}  {}",
                        t.unread_count,
                        t.last_message_time.with_timezone(&Local).format("%d.%m %H:%M"),
                        t.thread_id,
                        t.last_message_preview
                    );
                }
            }
        }
    }
    Ok(())
}

/// Print the thread on every change and turn stdin lines into composer
/// actions until Ctrl-C or end of input.
async fn converse<A: ChatApi>(sync: SyncClient<A>, config: &ClientConfig) -> Result<()> {
    let uploader = match &config.upload_url {
        Some(url) => Some(HttpUploader::new(url.clone(), config.token.clone(), config.request_timeout)?),
        None => None,
    };

    let mut composer = Composer::new();
    let mut rx = sync.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = rx.borrow_and_update().clone();
                print_thread(&view, &sync.actor());
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Err(e) = handle_line(line.trim(), &sync, &mut composer, uploader.as_ref()).await {
                    println!("! {}", e);
                }
            }
        }
    }
    Ok(())
}

async fn handle_line<A: ChatApi>(
    line: &str,
    sync: &SyncClient<A>,
    composer: &mut Composer,
    uploader: Option<&HttpUploader>,
) -> Result<()> {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let view = sync.snapshot();
    let target = |arg: &str| -> Result<i64> {
        let id: i64 = arg.trim().parse()?;
        if view.message(id).is_none() {
            bail!("no message #{} in this thread", id);
        }
        Ok(id)
    };

    match cmd {
        "" => {}
        "/reply" => {
            let id = target(rest)?;
            if let Some(msg) = view.message(id) {
                composer.reply_to(msg);
            }
        }
        "/edit" => {
            let id = target(rest)?;
            if let Some(msg) = view.message(id) {
                composer.start_edit(msg);
                println!("editing #{}: {}", id, composer.text());
            }
        }
        "/cancel" => composer.cancel(),
        "/delete" => sync.delete(target(rest)?).await.map_err(notice)?,
        "/react" => {
            let (id, emoji) = rest.split_once(' ').unwrap_or((rest, "👍"));
            sync.react(target(id)?, emoji.trim()).await.map_err(notice)?;
        }
        "/attach" => {
            let path = Path::new(rest.trim());
            let bytes = tokio::fs::read(path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".into());
            let staged = match image_type(&name) {
                Some(mime) => StagedAttachment::image(name, mime, bytes),
                None => StagedAttachment::file(name, "application/octet-stream", bytes),
            };
            composer.stage_attachment(staged).map_err(notice)?;
        }
        _ => {
            composer.set_text(line);
            let result = match uploader {
                Some(uploader) => composer.submit(sync, uploader).await,
                None => composer.submit(sync, &NoUploads).await,
            };
            result.map_err(notice)?;
        }
    }
    Ok(())
}

fn notice(e: supportline_client::ClientError) -> anyhow::Error {
    warn!("{}", e);
    anyhow::anyhow!(e.notice())
}

fn image_type(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Used when no upload endpoint is configured: plain text goes through,
/// a staged attachment fails before anything is sent.
struct NoUploads;

impl supportline_client::AttachmentUploader for NoUploads {
    async fn upload(&self, _staged: &StagedAttachment) -> Result<String, supportline_client::ClientError> {
        Err(supportline_client::ClientError::validation("no upload endpoint configured"))
    }
}

fn print_thread(view: &ThreadView, viewer: &Actor) {
    println!("---- thread {}", view.thread_id);
    for item in project(&view.messages, viewer, Utc::now(), &Local) {
        match item {
            RenderItem::DaySeparator(label) => println!("        -- {} --", label),
            RenderItem::Message(m) => {
                let who = if m.is_mine {
                    "me"
                } else if m.show_sender_name {
                    m.author_side.as_str()
                } else {
                    ""
                };
                let mut line = format!("#{:<4} {} {:>5} {}", m.id, m.time.format("%H:%M"), who, m.body);
                if let Some(reply) = &m.reply {
                    line.push_str(&format!("  [re: {}]", reply.label()));
                }
                if let Some(att) = &m.attachment {
                    line.push_str(&format!("  [{}: {}]", att.kind(), att.url()));
                }
                if m.edited {
                    line.push_str("  (edited)");
                }
                for badge in &m.reactions {
                    let mark = if badge.reacted_by_me { "*" } else { "" };
                    line.push_str(&format!("  {}{}{}", badge.emoji, badge.count, mark));
                }
                println!("{}", line);
            }
        }
    }
}
