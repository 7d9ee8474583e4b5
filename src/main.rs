mod dom;
mod download;
mod error;
mod file;
mod logging;
mod options;
mod page;
mod save;
mod script;
#[cfg(test)]
mod test_server;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use url::Url;

use crate::dom::HtmlDocument;
use crate::save::{SaveResult, Saver};
use crate::script::{LogDiagnostics, DEFAULT_FILE_NAME};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[clap(subcommand)]
    subcmd: SubCmd,

    #[clap(short, long, default_value = "4", env = "TTSAVE_PARALLEL")]
    /// set the maximum number of parallel range requests per video
    parallel: usize,

    #[clap(short, long, default_value = "3", env = "TTSAVE_RETRIES")]
    /// set the maximum number of retries per range request
    retries: usize,

    #[clap(short, long, default_value = "4")]
    /// set the range size in mega bytes, 0 downloads videos in one request
    block_size: u64,

    #[clap(short, long)]
    /// print debug output
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum SubCmd {
    /// Download a TikTok video, photo post or music track
    Download {
        #[clap(value_parser = url_parser)]
        /// provide a TikTok link (share links are followed)
        url: String,

        #[clap(env = "TTSAVE_DIR")]
        /// provide an existing output directory, defaults to the current one
        download_dir: Option<PathBuf>,

        #[clap(short, long)]
        /// save the video under this file name
        name: Option<String>,

        #[clap(long)]
        /// print the result as json
        json: bool,
    },
    /// Download every link listed in a json file
    File {
        #[clap(default_value = "download.json")]
        /// provide a json array of { "url", "downloadDir" } entries
        file: PathBuf,

        #[clap(long, env = "TTSAVE_DIR")]
        /// directory for entries without their own
        download_dir: Option<PathBuf>,
    },
    /// Find the video of a saved html page without downloading it
    Extract {
        /// provide a saved html page
        html: PathBuf,

        #[clap(long)]
        /// resolve relative sources against this url
        base_url: Option<Url>,

        #[clap(short, long)]
        /// suggested file name for the download
        name: Option<String>,
    },
}

fn url_parser(url: &str) -> Result<String, String> {
    if url.starts_with("http") {
        Ok(url.to_string())
    } else {
        Err("URL must start with http or https".to_string())
    }
}

fn print_result(result: &SaveResult) {
    println!("Downloaded {} files:", result.kind);
    for file in &result.files {
        println!(" - {}", file.display());
    }
    if let Some(author) = &result.author_username {
        println!("Author: {}", author);
    }
    if let Some(music) = &result.music_uri {
        println!("Music: {}", music);
    }
    if let Some(music) = &result.music {
        println!("Author: {} ({})", music.author.name, music.author.url);
        if let Some(count) = music.clip_count {
            println!("Used in {} videos", count);
        }
    }
}

fn current_dir_or(dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("could not read the current directory"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    logging::init_logging(args.debug);

    let options = options::Options {
        max_parallel_downloads: args.parallel,
        max_download_retries: args.retries,
        block_size: args.block_size * 1024 * 1024,
    };

    tracing::debug!("options: {:?}", options);

    match args.subcmd {
        SubCmd::Download { url, download_dir, name, json } => {
            let saver = Saver::new(current_dir_or(download_dir)?, options)?.with_file_name(name);
            tracing::info!("saving {} to {}", url, saver.download_dir().display());

            let result = saver
                .save(&url)
                .await
                .with_context(|| format!("could not save {}", url))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        SubCmd::File { file, download_dir } => {
            let failed = file::download_file(&file, &current_dir_or(download_dir)?, &options)
                .await
                .with_context(|| format!("could not process {}", file.display()))?;

            tracing::info!("finished reading file {}", file.display());
            if failed > 0 {
                tracing::warn!("{} entries failed", failed);
                return Ok(ExitCode::FAILURE);
            }
        }
        SubCmd::Extract { html, base_url, name } => {
            let source = std::fs::read_to_string(&html)
                .with_context(|| format!("could not read {}", html.display()))?;
            let mut document = HtmlDocument::parse(&source, base_url);
            let file_name = name.as_deref().unwrap_or(DEFAULT_FILE_NAME);

            if script::run(&mut document, file_name, &mut LogDiagnostics).is_err() {
                return Ok(ExitCode::FAILURE);
            }

            for request in document.downloads() {
                println!("{}\t{}", request.href, request.file_name);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
