//! HuggingFace model resolution
//!
//! Turns the configured model reference into a local GGUF path, downloading
//! it into the models directory the first time it is used.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = concat!("llama-oneshot/", env!("CARGO_PKG_VERSION"));

/// Errors while resolving or downloading a model
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid model reference '{0}': expected a local path or <user>/<repo>[/<file>]")]
    InvalidReference(String),
    #[error("invalid model filename '{0}'")]
    InvalidFilename(String),
    #[error("no GGUF files found in {0}")]
    NoGgufFiles(String),
    #[error("multiple GGUF files found, please specify one of: {}", .0.join(", "))]
    AmbiguousGguf(Vec<String>),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("download failed with status {0}")]
    Status(reqwest::StatusCode),
    #[error("could not determine file size")]
    UnknownSize,
    #[error("download incomplete: got {downloaded} bytes, expected {expected}")]
    Incomplete { downloaded: u64, expected: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parsed HuggingFace model location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuggingFaceUrl {
    pub repo_id: String,
    /// Empty when the reference names only the repository
    pub filename: String,
    pub revision: String,
}

impl HuggingFaceUrl {
    /// Parse various HuggingFace URL formats
    pub fn parse(url: &str) -> Result<Self, DownloadError> {
        // Handle different URL formats:
        // 1. https://huggingface.co/username/repo/blob/main/model.gguf
        // 2. https://huggingface.co/username/repo/resolve/main/model.gguf
        // 3. username/repo/model.gguf
        // 4. username/repo

        let trimmed = url.trim();
        let trimmed = trimmed.split('?').next().unwrap_or(trimmed);
        let trimmed = trimmed.split('#').next().unwrap_or(trimmed);
        let invalid = || DownloadError::InvalidReference(url.to_string());

        let path = trimmed
            .strip_prefix("https://huggingface.co/")
            .or_else(|| trimmed.strip_prefix("http://huggingface.co/"));

        if let Some(path) = path {
            let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
            if parts.len() < 2 {
                return Err(invalid());
            }
            let repo_id = format!("{}/{}", parts[0], parts[1]);

            if let Some(pos) = parts.iter().position(|&p| p == "blob" || p == "resolve") {
                if parts.len() > pos + 2 {
                    return Ok(Self {
                        repo_id,
                        filename: parts[pos + 2..].join("/"),
                        revision: parts[pos + 1].to_string(),
                    });
                }
            }

            return Ok(Self {
                repo_id,
                filename: String::new(),
                revision: "main".to_string(),
            });
        }

        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() < 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            repo_id: format!("{}/{}", parts[0], parts[1]),
            filename: parts[2..].join("/"),
            revision: "main".to_string(),
        })
    }

    /// Build the download URL for `filename` in this repository
    pub fn download_url(&self, filename: &str) -> String {
        format!(
            "https://huggingface.co/{}/resolve/{}/{}",
            self.repo_id, self.revision, filename
        )
    }
}

/// Flatten a repository path into a single safe file name
fn sanitize_local_filename(filename: &str) -> Result<String, DownloadError> {
    let trimmed = filename.trim();
    let no_leading = trimmed.trim_start_matches('/');
    let flattened = no_leading.replace('\\', "/").replace('/', "__");

    let mut sanitized: String = flattened
        .chars()
        .map(|ch| {
            let invalid = matches!(ch, '<' | '>' | ':' | '"' | '|' | '?' | '*');
            if invalid || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }

    if sanitized.is_empty() {
        return Err(DownloadError::InvalidFilename(filename.to_string()));
    }

    Ok(sanitized)
}

/// Resolve a model reference to a local file.
///
/// An existing path wins; anything else is treated as a HuggingFace
/// reference and fetched into `models_dir` unless already cached there.
pub fn resolve_model(reference: &str, models_dir: &Path) -> Result<PathBuf, DownloadError> {
    let local = Path::new(reference);
    if local.is_file() {
        return Ok(local.to_path_buf());
    }

    let hf_url = HuggingFaceUrl::parse(reference)?;
    if !hf_url.filename.is_empty() {
        let cached = models_dir.join(sanitize_local_filename(&hf_url.filename)?);
        if is_non_empty_file(&cached) {
            tracing::info!("Using cached model: {}", cached.display());
            return Ok(cached);
        }
    }

    // Downloads are the only async work; run them on a throwaway runtime.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(download_model(&hf_url, models_dir, log_progress()))
}

fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

/// Progress callback that logs every 10%
fn log_progress() -> impl FnMut(u64, u64) {
    let mut last_decile = 0;
    move |downloaded, total| {
        let decile = if total == 0 { 10 } else { downloaded * 10 / total };
        if decile > last_decile {
            last_decile = decile;
            tracing::info!(
                "Downloaded {} / {} ({}%)",
                format_size(downloaded),
                format_size(total),
                decile * 10
            );
        }
    }
}

/// Download a model from HuggingFace into `models_dir`
pub async fn download_model(
    hf_url: &HuggingFaceUrl,
    models_dir: &Path,
    mut progress_callback: impl FnMut(u64, u64),
) -> Result<PathBuf, DownloadError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3600)) // 1 hour timeout for large models
        .user_agent(USER_AGENT)
        .build()?;

    // If no specific filename, the repository must hold exactly one GGUF file
    let filename = if hf_url.filename.is_empty() {
        let mut files = list_gguf_files(&client, hf_url).await?;
        match files.len() {
            0 => return Err(DownloadError::NoGgufFiles(hf_url.repo_id.clone())),
            1 => files.remove(0),
            _ => return Err(DownloadError::AmbiguousGguf(files)),
        }
    } else {
        hf_url.filename.clone()
    };

    let safe_filename = sanitize_local_filename(&filename)?;
    fs::create_dir_all(models_dir)?;

    let output_path = models_dir.join(&safe_filename);
    let temp_path = models_dir.join(format!("{safe_filename}.tmp"));

    if is_non_empty_file(&output_path) {
        tracing::info!("Model already exists: {}", output_path.display());
        return Ok(output_path);
    }

    let download_url = hf_url.download_url(&filename);
    tracing::info!("Downloading from: {}", download_url);

    let mut response = client.get(&download_url).send().await?;
    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status()));
    }

    let total_size = response.content_length().ok_or(DownloadError::UnknownSize)?;
    tracing::info!("File size: {}", format_size(total_size));

    // Write to temp file first
    let mut temp_file = File::create(&temp_path).await?;
    let mut downloaded: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        temp_file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress_callback(downloaded, total_size);
    }
    temp_file.flush().await?;
    drop(temp_file);

    if downloaded != total_size {
        let _ = fs::remove_file(&temp_path);
        return Err(DownloadError::Incomplete {
            downloaded,
            expected: total_size,
        });
    }

    fs::rename(&temp_path, &output_path)?;
    tracing::info!("Download complete: {}", output_path.display());

    Ok(output_path)
}

/// List available GGUF files in a HuggingFace repository
async fn list_gguf_files(
    client: &reqwest::Client,
    hf_url: &HuggingFaceUrl,
) -> Result<Vec<String>, DownloadError> {
    let api_url = format!(
        "https://huggingface.co/api/models/{}/tree/{}",
        hf_url.repo_id, hf_url.revision
    );

    let response = client.get(&api_url).send().await?;
    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status()));
    }

    let files: Vec<FileInfo> = response.json().await?;
    Ok(files
        .into_iter()
        .filter(|f| f.path.ends_with(".gguf"))
        .map(|f| f.path)
        .collect())
}

#[derive(Debug, serde::Deserialize)]
struct FileInfo {
    path: String,
}

/// Get a human-readable size string
pub fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes as u64)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}
