use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::{fmt::bytes_fmt, text::unescape_html};

/// Thread as served by `<api>/<board>/thread/<id>.json`.
#[derive(Debug, Deserialize)]
struct ThreadJson {
    #[serde(default)]
    posts: Vec<PostJson>,
}

#[derive(Debug, Deserialize)]
struct PostJson {
    no: u64,
    time: i64,
    sub: Option<String>,
    com: Option<String>,
    semantic_url: Option<String>,
    tim: Option<u64>,
    filename: Option<String>,
    ext: Option<String>,
    fsize: Option<u64>,
    w: Option<u32>,
    h: Option<u32>,
    md5: Option<String>,
}

/// A media file attached to a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Upload timestamp in milliseconds; unique within a board.
    pub id: u64,
    pub board: String,
    /// Original name of the file, without extension.
    pub name: String,
    /// Extension without the leading dot.
    pub extension: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    /// 32 lowercase hex characters.
    pub md5: String,
    pub url: String,
}

impl fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File({}, {}.{}, {}, {}x{})",
            self.id,
            self.name,
            self.extension,
            bytes_fmt(self.size as f64),
            self.width,
            self.height
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: u64,
    /// Unix timestamp of submission.
    pub time: i64,
    pub body: Option<String>,
    pub file: Option<RemoteFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub board: String,
    /// Number of the opening post.
    pub id: u64,
    pub subject: Option<String>,
    /// Subject, first sentence of the opening post, or its number.
    pub title: String,
    pub slug: String,
    pub posts: Vec<Post>,
}

impl Thread {
    /// Parse the API's thread JSON. File URLs are built against `media_base`.
    pub fn from_json(board: &str, json: &str, media_base: &str) -> Result<Self> {
        let thread: ThreadJson = serde_json::from_str(json)?;
        let first = thread.posts.first().ok_or(Error::EmptyThread)?;

        let subject = first.sub.as_deref().map(unescape_html);
        let title = match &subject {
            Some(subject) => subject.clone(),
            None => first
                .com
                .as_deref()
                .map(unescape_html)
                .and_then(|comment| first_sentence(&comment))
                .unwrap_or_else(|| first.no.to_string()),
        };

        Ok(Thread {
            board: board.to_string(),
            id: first.no,
            subject,
            title,
            slug: first.semantic_url.clone().unwrap_or_default(),
            posts: thread
                .posts
                .iter()
                .map(|post| Post::from_json(board, post, media_base))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// Where the thread can be viewed in a browser.
    pub fn url(&self) -> String {
        format!(
            "https://boards.4chan.org/{}/thread/{}/{}",
            self.board, self.id, self.slug
        )
    }

    /// Files attached to the thread's posts, in post order.
    pub fn files(&self) -> impl Iterator<Item = &RemoteFile> {
        self.posts.iter().filter_map(|post| post.file.as_ref())
    }
}

impl Post {
    fn from_json(board: &str, json: &PostJson, media_base: &str) -> Result<Self> {
        let file = match json.tim {
            Some(tim) => Some(RemoteFile::from_json(board, tim, json, media_base)?),
            None => None,
        };
        Ok(Post {
            id: json.no,
            time: json.time,
            body: json.com.as_deref().map(unescape_html),
            file,
        })
    }
}

impl RemoteFile {
    fn from_json(board: &str, tim: u64, json: &PostJson, media_base: &str) -> Result<Self> {
        let missing = |field: &str| Error::MalformedPost {
            post: json.no,
            message: format!("file is missing `{}`", field),
        };

        let ext = json.ext.as_deref().ok_or_else(|| missing("ext"))?;
        let packed = json.md5.as_deref().ok_or_else(|| missing("md5"))?;
        let digest = STANDARD
            .decode(packed.trim())
            .map_err(|err| Error::MalformedPost {
                post: json.no,
                message: format!("undecodable md5 {:?}: {}", packed, err),
            })?;

        Ok(RemoteFile {
            id: tim,
            board: board.to_string(),
            name: unescape_html(json.filename.as_deref().ok_or_else(|| missing("filename"))?),
            extension: ext.trim_start_matches('.').to_string(),
            size: json.fsize.ok_or_else(|| missing("fsize"))?,
            width: json.w.unwrap_or_default(),
            height: json.h.unwrap_or_default(),
            md5: hex::encode(digest),
            url: format!("{}/{}/{}{}", media_base.trim_end_matches('/'), board, tim, ext),
        })
    }
}

/// Text up to the first sentence break, if any precedes it.
fn first_sentence(text: &str) -> Option<String> {
    let sentence = text
        .split(['.', ':', ';', '?'])
        .next()
        .unwrap_or_default();
    if sentence.is_empty() {
        None
    } else {
        Some(sentence.to_string())
    }
}
