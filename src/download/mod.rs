pub mod video;

use std::path::{Path, PathBuf};

use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use url::Url;

use crate::error::Result;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Clone)]
pub struct DownloadClient {
    client: reqwest::Client,
}

impl DownloadClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// Loads a page, following redirects. Returns the final url with the body,
    /// so short share links come back as their canonical page.
    pub async fn fetch_page(&self, url: &Url) -> Result<(Url, String)> {
        let response = self.client.get(url.as_str()).send().await?.error_for_status()?;
        let final_url = response.url().clone();
        let body = response.text().await?;

        if &final_url != url {
            tracing::debug!("{} redirected to {}", url, final_url);
        }

        Ok((final_url, body))
    }

    async fn head(&self, url: &Url) -> Result<HeaderMap> {
        let response = self.client.head(url.as_str()).send().await?.error_for_status()?;

        Ok(response.headers().clone())
    }

    /// Content length announced by the server, if it announces one.
    pub async fn content_length(&self, url: &Url) -> Result<Option<u64>> {
        let headers = self.head(url).await?;

        let length = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|length| *length > 0);

        if length.is_none() {
            tracing::debug!("no content length for {}", url);
        }

        Ok(length)
    }

    pub async fn download(&self, url: &Url) -> Result<Bytes> {
        self.download_header(url, &HeaderMap::new()).await
    }

    pub async fn download_header(&self, url: &Url, headers: &HeaderMap) -> Result<Bytes> {
        let response = self
            .client
            .get(url.as_str())
            .headers(headers.to_owned())
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?)
    }

    /// Saves `url` as `dir/file_name` in one request. An existing file is kept.
    pub async fn save_content(&self, url: &Url, dir: &Path, file_name: &str) -> Result<PathBuf> {
        let path = dir.join(file_name);

        if path.is_file() {
            tracing::info!("file already exists: {}", path.display());
            return Ok(path);
        }

        let bytes = self.download(url).await?;
        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!("saved {} ({} bytes)", path.display(), bytes.len());

        Ok(path)
    }
}
