use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::download::DownloadClient;
use crate::error::Result;
use crate::options::Options;
use crate::save::Saver;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DownloadEntity {
    url: String,
    download_dir: Option<PathBuf>,
}

/// Saves every entry of a JSON batch file. Entries without a directory go to
/// `default_dir`; a failed entry is logged and the batch moves on.
/// Returns how many entries failed.
pub async fn download_file(file: &Path, default_dir: &Path, options: &Options) -> Result<usize> {
    let content = tokio::fs::read_to_string(file).await?;
    let downloads: Vec<DownloadEntity> = serde_json::from_str(&content)?;
    tracing::info!("{} entries in {}", downloads.len(), file.display());

    let client = DownloadClient::new()?;
    let mut failed = 0;
    for download in downloads {
        let dir = download.download_dir.as_deref().unwrap_or(default_dir);

        let result = match Saver::with_client(client.clone(), dir, options.clone()) {
            Ok(saver) => saver.save(&download.url).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(result) => tracing::info!("saved {} ({} files)", download.url, result.files.len()),
            Err(err) => {
                tracing::error!("error downloading {}: {}", download.url, err);
                failed += 1;
            }
        }
    }

    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Options {
        Options {
            max_parallel_downloads: 1,
            max_download_retries: 0,
            block_size: 0,
        }
    }

    #[tokio::test]
    async fn bad_entries_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let batch = dir.path().join("download.json");
        std::fs::write(
            &batch,
            r#"[
                { "url": "not a url" },
                { "url": "https://www.tiktok.com/@someone/video/1", "downloadDir": "/definitely/missing/dir" }
            ]"#,
        )
        .unwrap();

        let failed = download_file(&batch, dir.path(), &options()).await.unwrap();

        assert_eq!(failed, 2);
    }

    #[tokio::test]
    async fn malformed_batch_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let batch = dir.path().join("download.json");
        std::fs::write(&batch, "{ not json").unwrap();

        assert!(download_file(&batch, dir.path(), &options()).await.is_err());
    }
}
