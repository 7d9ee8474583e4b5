pub mod range;

use std::path::Path;

use url::Url;

use crate::download::DownloadClient;
use crate::error::Result;
use crate::options::Options;

use range::{SegmentedVideo, Video};

/// Saves the video at `url` to `output`.
///
/// Large files with a known length are fetched as concurrent byte ranges and
/// stitched together; everything else is a single GET.
pub async fn download_video(client: &DownloadClient, url: &Url, output: &Path, options: &Options) -> Result<()> {
    if output.is_file() {
        tracing::info!("file already exists: {}", output.display());
        return Ok(());
    }

    let size = match client.content_length(url).await {
        Ok(size) => size,
        Err(err) => {
            tracing::debug!("HEAD {} failed ({}), using a single request", url, err);
            None
        }
    };

    match size {
        Some(size) if options.block_size > 0 && size > options.block_size => {
            let video = Video::new(client.clone(), url.clone(), size);

            let mut folder_name = output.file_name().unwrap_or_default().to_os_string();
            folder_name.push("_segments");
            let folder = output.with_file_name(folder_name);

            let video_segments = SegmentedVideo::new(video, options.block_size, folder);
            video_segments.download(options).await?;
            video_segments.combine(output)?;
            video_segments.cleanup();
        }
        _ => {
            let bytes = client.download(url).await?;
            tokio::fs::write(output, &bytes).await?;
        }
    }

    tracing::debug!("video saved to {}", output.display());

    Ok(())
}
