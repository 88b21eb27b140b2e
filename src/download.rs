use crate::config::DownloadSettings;
use crate::dataspace::Provider;
use crate::error::{AuthError, DownloadError};
use crate::product::ProductDescriptor;
use anyhow::Result;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub datadir: PathBuf,
    pub unzip: bool,
    /// Extra attempts after the first one fails with a transient error.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl DownloadOptions {
    pub fn new<P: Into<PathBuf>>(datadir: P) -> Self {
        Self {
            datadir: datadir.into(),
            unzip: false,
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn from_settings(settings: &DownloadSettings) -> Self {
        Self {
            datadir: settings.datadir.clone(),
            unzip: false,
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    /// The archive was already on disk and nothing was fetched.
    pub skipped: bool,
}

/// `<datadir>/T<tile>/<name>.zip`
pub fn archive_path(datadir: &Path, product: &ProductDescriptor) -> Result<PathBuf, DownloadError> {
    let name = product.name.as_str();
    if name.is_empty() || name == "." || name == ".." || name.contains(|c: char| c == '/' || c == '\\') {
        return Err(DownloadError::InvalidProductName(name.to_string()));
    }
    Ok(datadir
        .join(product.tile.dir_name())
        .join(format!("{name}.zip")))
}

pub async fn try_download(
    provider: &Provider,
    product: &ProductDescriptor,
    options: &DownloadOptions,
) -> Result<DownloadOutcome> {
    if options.unzip {
        return Err(DownloadError::UnzipUnsupported.into());
    }

    // Check if the output file already exists; return early if so
    let dst = archive_path(&options.datadir, product)?;
    if fs::try_exists(&dst).await? {
        warn!(path = %dst.display(), "Output file already exists");
        let bytes = fs::metadata(&dst).await?.len();
        return Ok(DownloadOutcome {
            path: dst,
            bytes,
            skipped: true,
        });
    }

    let mut attempt = 0;
    loop {
        match fetch_archive(provider, product, &dst).await {
            Ok(bytes) => {
                info!(path = %dst.display(), bytes, "Download complete");
                return Ok(DownloadOutcome {
                    path: dst,
                    bytes,
                    skipped: false,
                });
            }
            Err(err) if attempt < options.max_retries && is_retryable(&err) => {
                let delay = backoff(options.retry_delay, attempt);
                attempt += 1;
                warn!(
                    attempt,
                    max_retries = options.max_retries,
                    ?delay,
                    error = %err,
                    "Download failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    if !fs::try_exists(dir).await? {
        info!(dir = %dir.display(), "Creating tile directory");
        fs::create_dir_all(dir).await?;
    }
    Ok(())
}

async fn fetch_archive(provider: &Provider, product: &ProductDescriptor, dst: &Path) -> Result<u64> {
    info!(
        tile = %product.tile,
        origin_date = %product.origin_date,
        id = %product.id,
        "Downloading"
    );
    let response = provider.open_archive(&product.id).await?;

    if let Some(parent) = dst.parent() {
        ensure_dir(parent).await?;
    }

    let partial = partial_path(dst);
    let bytes = match write_stream(response.bytes_stream(), &partial).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = fs::remove_file(&partial).await;
            return Err(err);
        }
    };

    // Rename the file to remove .partial suffix
    fs::rename(&partial, dst).await?;
    Ok(bytes)
}

fn partial_path(dst: &Path) -> PathBuf {
    let mut partial = dst.as_os_str().to_owned();
    partial.push(".partial");
    PathBuf::from(partial)
}

/// Write every non-empty chunk of `stream` to a fresh file at `path`, returning the byte count.
pub async fn write_stream<S, B, E>(stream: S, path: &Path) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut stream = std::pin::pin!(stream);
    let file = fs::File::create(path).await?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);

    let mut byte_count = 0_u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        if chunk.is_empty() {
            continue;
        }
        writer.write_all(chunk).await?;
        byte_count += chunk.len() as u64;
    }
    writer.flush().await?;
    debug!(path = %path.display(), byte_count, "Stream written");

    Ok(byte_count)
}

fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(DownloadError::Status { status }) = err.downcast_ref::<DownloadError>() {
        return status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS;
    }
    if let Some(AuthError::Transport(_)) = err.downcast_ref::<AuthError>() {
        return true;
    }
    err.downcast_ref::<reqwest::Error>().is_some()
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1 << attempt.min(6))
}
