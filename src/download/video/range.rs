use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, RANGE};
use url::Url;

use crate::download::DownloadClient;
use crate::error::{Error, Result};
use crate::options::Options;

const RETRY_DELAY: Duration = Duration::from_millis(250);

pub struct Video {
    download_client: DownloadClient,
    url: Url,
    size: u64,
}

impl Video {
    pub fn new(download_client: DownloadClient, url: Url, size: u64) -> Self {
        Self { download_client, url, size }
    }
}

/// Inclusive byte range `start..=end` of a video.
#[derive(Clone)]
pub struct VideoSegment {
    video: Arc<Video>,
    id: u64,
    start: u64,
    end: u64,
}

impl VideoSegment {
    pub fn new(id: u64, video: Arc<Video>, start: u64, end: u64) -> Self {
        Self { id, video, start, end }
    }

    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    fn path(&self, folder: &Path) -> PathBuf {
        folder.join(format!("{}.part", self.id))
    }

    async fn fetch(&self, folder: &Path) -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_str(&format!("bytes={}-{}", self.start, self.end))?);

        let bytes = self.video.download_client.download_header(&self.video.url, &headers).await?;
        if bytes.len() as u64 != self.size() {
            return Err(Error::Incomplete(format!(
                "segment {} returned {} of {} bytes",
                self.id,
                bytes.len(),
                self.size()
            )));
        }

        tokio::fs::write(self.path(folder), &bytes).await?;

        Ok(())
    }

    /// Fetches the segment, retrying up to `retries` more times.
    /// Complete segments already on disk from an earlier run are reused.
    pub async fn download(&self, folder: &Path, retries: usize) -> Result<()> {
        match tokio::fs::metadata(self.path(folder)).await {
            Ok(metadata) if metadata.is_file() && metadata.len() == self.size() => return Ok(()),
            Ok(metadata) => {
                tracing::debug!("segment {} has {} of {} bytes, fetching again", self.id, metadata.len(), self.size());
            }
            Err(_) => {}
        }

        let mut attempt = 0;
        loop {
            match self.fetch(folder).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < retries => {
                    attempt += 1;
                    tracing::warn!("segment {} failed ({}), retry {}/{}", self.id, err, attempt, retries);
                    tokio::time::sleep(RETRY_DELAY * attempt as u32).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub struct SegmentedVideo {
    segments: Vec<VideoSegment>,
    folder: PathBuf,
}

impl SegmentedVideo {
    pub fn new(video: Video, block_size: u64, folder: PathBuf) -> Self {
        let video = Arc::new(video);
        let block_size = block_size.max(1);

        let mut segments = vec![];
        let mut start = 0;
        while start < video.size {
            let end = (start + block_size).min(video.size) - 1;
            segments.push(VideoSegment::new(segments.len() as u64, Arc::clone(&video), start, end));
            start = end + 1;
        }

        Self { segments, folder }
    }

    pub async fn download(&self, options: &Options) -> Result<()> {
        tokio::fs::create_dir_all(&self.folder).await?;

        let folder = Arc::new(self.folder.clone());
        let semaphore = Arc::new(tokio::sync::Semaphore::new(options.max_parallel_downloads.max(1)));
        let segments_downloaded = Arc::new(AtomicU64::new(0));
        let total_segments = self.segments.len() as u64;
        let retries = options.max_download_retries;

        let tasks = self.segments.iter().cloned().map(|segment| {
            let folder = Arc::clone(&folder);
            let semaphore = Arc::clone(&semaphore);
            let segments_downloaded = Arc::clone(&segments_downloaded);
            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::Incomplete("download cancelled".to_string()))?;
                segment.download(&folder, retries).await?;

                let done = segments_downloaded.fetch_add(1, Ordering::SeqCst) + 1;
                let progress = format!(
                    "downloaded {:width$} / {:width$} segments ({:5.2}%)",
                    done,
                    total_segments,
                    (done as f64 / total_segments as f64) * 100.,
                    width = total_segments.to_string().len()
                );
                tracing::info!("{}", progress);

                Ok::<_, Error>(())
            })
        }).collect::<Vec<_>>();

        for task in tasks {
            task.await??;
        }

        Ok(())
    }

    /// Concatenates the downloaded segments into `output`, in order.
    pub fn combine(&self, output: &Path) -> Result<()> {
        let mut file = std::fs::File::create(output)?;

        for segment in &self.segments {
            let path = segment.path(&self.folder);
            let mut part = std::fs::File::open(&path)
                .map_err(|err| Error::Incomplete(format!("missing segment {}: {}", segment.id, err)))?;
            std::io::copy(&mut part, &mut file)?;
        }

        Ok(())
    }

    pub fn cleanup(&self) {
        if let Err(err) = std::fs::remove_dir_all(&self.folder) {
            tracing::warn!("could not remove {}: {}", self.folder.display(), err);
        }
    }
}
