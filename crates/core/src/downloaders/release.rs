use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use super::WeightFetcher;
use crate::config::DownloadConfig;
use crate::tasks::Progress;

/// Report a progress line every this many percent (or bytes, when the
/// server does not send a length).
const REPORT_PERCENT_STEP: u64 = 10;
const REPORT_BYTES_STEP: u64 = 8 * 1024 * 1024;

/// Downloads `<model>.pt` assets from a release base URL.
pub struct ReleaseDownloader {
    client: Client,
    base_url: String,
}

impl ReleaseDownloader {
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("enginekit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn asset_url(&self, dest: &Path) -> Result<String> {
        let file_name = dest
            .file_name()
            .and_then(|n| n.to_str())
            .context("Weights path has no file name")?;
        Ok(format!("{}/{}", self.base_url, file_name))
    }

    async fn download_to(&self, url: &str, part: &Path, progress: &Progress) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download {}: {}", url, response.status());
        }

        let total_size = response.content_length();
        let mut file = File::create(part)
            .await
            .with_context(|| format!("Failed to create {}", part.display()))?;
        let mut downloaded: u64 = 0;
        let mut reported: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error downloading chunk")?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            progress.transfer(downloaded, total_size);

            let mark = match total_size {
                Some(total) if total > 0 => downloaded * 100 / total / REPORT_PERCENT_STEP,
                _ => downloaded / REPORT_BYTES_STEP,
            };
            if mark > reported {
                reported = mark;
                progress.line(describe_transfer(downloaded, total_size));
            }
        }

        file.flush().await?;
        Ok(downloaded)
    }
}

#[async_trait]
impl WeightFetcher for ReleaseDownloader {
    async fn fetch(&self, model: &str, dest: &Path, progress: &Progress) -> Result<()> {
        if dest.exists() {
            tracing::debug!("{} already present at {:?}", model, dest);
            return Ok(());
        }

        let url = self.asset_url(dest)?;
        tracing::info!("Downloading {} from {}", model, url);
        progress.line(format!("Downloading {}", url));

        let part = part_path(dest);
        match self.download_to(&url, &part, progress).await {
            Ok(bytes) => {
                fs::rename(&part, dest)
                    .await
                    .with_context(|| format!("Failed to move download into {}", dest.display()))?;
                tracing::info!("Downloaded {} ({} bytes)", model, bytes);
                Ok(())
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&part).await {
                    tracing::debug!("No partial file to clean up at {:?}: {}", part, rm);
                }
                Err(e)
            }
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn describe_transfer(downloaded: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => format!(
            "Downloaded {} / {} ({}%)",
            format_size(downloaded),
            format_size(total),
            downloaded * 100 / total
        ),
        _ => format!("Downloaded {}", format_size(downloaded)),
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
