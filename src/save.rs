use std::path::{Path, PathBuf};

use serde::Serialize;
use url::Url;

use crate::dom::HtmlDocument;
use crate::download::video::download_video;
use crate::download::DownloadClient;
use crate::error::{Error, Result};
use crate::options::Options;
use crate::page::{self, PageInfo, PageKind};
use crate::script::{self, LogDiagnostics, ScriptError, DEFAULT_FILE_NAME};

/// What a save produced, printed by the CLI.
#[derive(Debug, Serialize)]
pub struct SaveResult {
    #[serde(rename = "type")]
    pub kind: PageKind,
    pub author_username: Option<String>,
    pub files: Vec<PathBuf>,
    /// The page for videos and photos, the track itself for music.
    pub url: String,
    pub music_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicInfo>,
}

#[derive(Debug, Serialize)]
pub struct MusicInfo {
    pub author: MusicAuthor,
    pub thumb_url: Option<String>,
    pub clip_count: Option<u64>,
    pub clips: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MusicAuthor {
    pub name: String,
    pub url: String,
}

impl From<ScriptError> for Error {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::VideoNotFound => Error::VideoNotFound,
            ScriptError::SourceNotFound => Error::SourceNotFound,
        }
    }
}

pub struct Saver {
    client: DownloadClient,
    download_dir: PathBuf,
    file_name: Option<String>,
    options: Options,
}

impl Saver {
    pub fn new(download_dir: impl Into<PathBuf>, options: Options) -> Result<Self> {
        Self::with_client(DownloadClient::new()?, download_dir, options)
    }

    /// A saver that shares `client` (and its connection pool) with others.
    pub fn with_client(client: DownloadClient, download_dir: impl Into<PathBuf>, options: Options) -> Result<Self> {
        let download_dir = download_dir.into();
        if !download_dir.is_dir() {
            return Err(Error::DirectoryMissing(download_dir));
        }

        Ok(Self {
            client,
            download_dir,
            file_name: None,
            options,
        })
    }

    /// Saves videos under `name` instead of a name derived from the page.
    pub fn with_file_name(mut self, name: Option<String>) -> Self {
        self.file_name = name;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub async fn save(&self, url: &str) -> Result<SaveResult> {
        let url = Url::parse(url)?;
        let (page_url, html) = self.client.fetch_page(&url).await?;
        tracing::debug!("normalized url: {}", page_url);

        let kind = page::classify(&page_url)?;
        self.save_page(kind, &page_url, &html).await
    }

    /// Saves the content of an already loaded page.
    pub async fn save_page(&self, kind: PageKind, page_url: &Url, html: &str) -> Result<SaveResult> {
        match kind {
            PageKind::Video => self.save_video(page_url, html).await,
            PageKind::Photo => self.save_photo(page_url, html).await,
            PageKind::Music => self.save_music(page_url, html).await,
        }
    }

    async fn save_video(&self, page_url: &Url, html: &str) -> Result<SaveResult> {
        // the parsed page is not Send; keep it out of the awaits below
        let (request, author_username, music_uri) = {
            let mut document = HtmlDocument::parse(html, Some(page_url.clone()));

            let page = PageInfo::new(document.html());
            let author_username = page.author_username();
            let music_uri = page.music_uri();
            let file_name = match &self.file_name {
                Some(name) => page::usable_file_name(name).unwrap_or_else(|| {
                    tracing::warn!("file name {:?} is not usable, saving as {}", name, DEFAULT_FILE_NAME);
                    DEFAULT_FILE_NAME.to_string()
                }),
                None => format!("{}.mp4", file_stem(&page, "video")),
            };

            // a video that carries its url directly plays like an opened media file
            if let Some(src) = page.video_src() {
                let media_url = page_url.join(&src)?;
                tracing::debug!("video element plays {} directly", media_url);
                document = HtmlDocument::media(&media_url);
            }

            script::run(&mut document, &file_name, &mut LogDiagnostics)?;

            let request = document
                .take_downloads()
                .into_iter()
                .next()
                .ok_or_else(|| Error::Incomplete("page did not request a download".to_string()))?;
            (request, author_username, music_uri)
        };

        let video_url = page_url.join(&request.href)?;
        let output = self.download_dir.join(&request.file_name);

        tracing::info!("downloading video {} from {}", request.file_name, video_url);
        download_video(&self.client, &video_url, &output, &self.options).await?;

        Ok(SaveResult {
            kind: PageKind::Video,
            author_username,
            files: vec![output],
            url: page_url.to_string(),
            music_uri,
            music: None,
        })
    }

    async fn save_photo(&self, page_url: &Url, html: &str) -> Result<SaveResult> {
        let (stem, photo_urls, audio_url, author_username, music_uri) = {
            let html = scraper::Html::parse_document(html);
            let page = PageInfo::new(&html);
            (
                file_stem(&page, "photo"),
                page.photo_urls(),
                page.audio_url(),
                page.author_username(),
                page.music_uri(),
            )
        };

        if photo_urls.is_empty() {
            return Err(Error::MissingElement("photo slides"));
        }
        let audio_url = audio_url.ok_or(Error::MissingElement("audio track"))?;

        let mut files = Vec::with_capacity(photo_urls.len() + 1);
        for (index, photo_url) in photo_urls.iter().enumerate() {
            let name = format!("{}_{}.jpg", index + 1, stem);
            tracing::debug!("downloading photo {} from {}", name, photo_url);
            files.push(self.client.save_content(&page_url.join(photo_url)?, &self.download_dir, &name).await?);
        }

        let audio_name = format!("{stem}.mp3");
        tracing::debug!("downloading audio {} from {}", audio_name, audio_url);
        files.push(self.client.save_content(&page_url.join(&audio_url)?, &self.download_dir, &audio_name).await?);

        Ok(SaveResult {
            kind: PageKind::Photo,
            author_username,
            files,
            url: page_url.to_string(),
            music_uri,
            music: None,
        })
    }

    async fn save_music(&self, page_url: &Url, html: &str) -> Result<SaveResult> {
        let (author, track_url, thumb_url, clip_count, clips) = {
            let html = scraper::Html::parse_document(html);
            let page = PageInfo::new(&html);
            (
                page.music_author(),
                page.video_src(),
                page.music_thumb_url(),
                page.clip_count(),
                page.clip_urls(),
            )
        };

        let (name, author_url) = author.ok_or(Error::MissingElement("music author"))?;
        let track_url = page_url.join(&track_url.ok_or(Error::MissingElement("music track"))?)?;
        let file_name = format!("{}.mp3", page::usable_file_name(&name).unwrap_or_else(|| "music".to_string()));

        tracing::debug!("{} lists {:?} clips, {} on the page", name, clip_count, clips.len());
        tracing::info!("downloading music {} from {}", file_name, track_url);
        let file = self.client.save_content(&track_url, &self.download_dir, &file_name).await?;

        Ok(SaveResult {
            kind: PageKind::Music,
            author_username: None,
            files: vec![file],
            url: track_url.to_string(),
            music_uri: None,
            music: Some(MusicInfo {
                author: MusicAuthor {
                    name,
                    url: page_url.join(&author_url)?.to_string(),
                },
                thumb_url,
                clip_count,
                clips,
            }),
        })
    }
}

fn file_stem(page: &PageInfo<'_>, fallback: &str) -> String {
    page.description()
        .and_then(|description| page::usable_file_name(&description))
        .unwrap_or_else(|| fallback.to_string())
}
