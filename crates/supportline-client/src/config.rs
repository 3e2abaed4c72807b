use std::time::Duration;

use anyhow::{Context, Result, bail};
use uuid::Uuid;

use supportline_types::{Actor, Side};

pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    pub actor: Actor,
    pub upload_url: Option<String>,
    pub thread_poll: Duration,
    pub list_poll: Duration,
    /// Thread a staff watcher follows; users always follow their own.
    pub thread_id: Option<Uuid>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = get("SUPPORTLINE_URL").unwrap_or_else(|| "http://127.0.0.1:3000".into());

        let token = get("SUPPORTLINE_TOKEN").unwrap_or_default();
        if token.trim().is_empty() {
            bail!("SUPPORTLINE_TOKEN is unset");
        }

        let user_id: Uuid = get("SUPPORTLINE_USER_ID")
            .context("SUPPORTLINE_USER_ID is unset")?
            .parse()
            .context("SUPPORTLINE_USER_ID is not a UUID")?;

        let is_admin = match get("SUPPORTLINE_IS_ADMIN").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => bail!("SUPPORTLINE_IS_ADMIN must be true or false, got '{}'", other),
        };

        let thread_id = get("SUPPORTLINE_THREAD_ID")
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.parse::<Uuid>())
            .transpose()
            .context("SUPPORTLINE_THREAD_ID is not a UUID")?;

        Ok(Self {
            base_url,
            token,
            actor: Actor {
                id: user_id,
                side: Side::from_is_admin(is_admin),
            },
            upload_url: get("SUPPORTLINE_UPLOAD_URL").filter(|u| !u.trim().is_empty()),
            thread_poll: secs(&get, "SUPPORTLINE_THREAD_POLL_SECS", 4)?,
            list_poll: secs(&get, "SUPPORTLINE_LIST_POLL_SECS", 5)?,
            thread_id,
            request_timeout: Duration::from_secs(15),
        })
    }
}

fn secs(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    let secs = match get(key) {
        Some(v) => v.parse::<u64>().with_context(|| format!("{} must be whole seconds", key))?,
        None => default,
    };
    if secs == 0 {
        bail!("{} must be at least 1", key);
    }
    Ok(Duration::from_secs(secs))
}
