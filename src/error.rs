use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("unsupported url: {0}")]
    UnsupportedUrl(String),

    #[error("no <video> element on the page")]
    VideoNotFound,

    #[error("no <source> element inside the <video> element")]
    SourceNotFound,

    #[error("page has no {0}")]
    MissingElement(&'static str),

    #[error("directory does not exist: {}", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("download incomplete: {0}")]
    Incomplete(String),

    #[error("download task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
