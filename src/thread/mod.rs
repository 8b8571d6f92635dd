mod model;

pub use model::{RemoteFile, Thread};

use regex::Regex;
use reqwest::StatusCode;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://a.4cdn.org";
pub const DEFAULT_MEDIA_BASE: &str = "https://i.4cdn.org";

static THREAD_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"boards\.4chan(?:nel)?\.org/([a-z0-9]+)/thread/([0-9]+)")
        .expect("thread URL pattern is valid")
});

/// Board and thread number extracted from a thread's browser URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadUrl {
    pub board: String,
    pub id: u64,
}

impl ThreadUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || Error::InvalidThreadUrl(url.to_string());
        let captures = THREAD_URL.captures(url).ok_or_else(invalid)?;
        Ok(ThreadUrl {
            board: captures[1].to_string(),
            id: captures[2].parse().map_err(|_| invalid())?,
        })
    }
}

/// Retrieves threads from the JSON API.
pub struct ThreadClient {
    client: reqwest::Client,
    api_base: String,
    media_base: String,
}

impl ThreadClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_bases(client, DEFAULT_API_BASE, DEFAULT_MEDIA_BASE)
    }

    pub fn with_bases(client: reqwest::Client, api_base: &str, media_base: &str) -> Self {
        ThreadClient {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            media_base: media_base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch(&self, url: &ThreadUrl) -> Result<Thread> {
        let api_url = format!("{}/{}/thread/{}.json", self.api_base, url.board, url.id);
        debug!("Retrieving JSON from {}", api_url);

        let response = self.client.get(api_url.as_str()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(Error::Status {
                url: api_url,
                status: response.status().as_u16(),
            });
        }
        let body = response.text().await?;
        Thread::from_json(&url.board, &body, &self.media_base)
    }
}
