/// Download tuning shared by every save.
#[derive(Debug, Clone)]
pub struct Options {
    pub max_parallel_downloads: usize,
    pub max_download_retries: usize,
    /// Byte range size for segmented video downloads; 0 disables splitting.
    pub block_size: u64,
}
