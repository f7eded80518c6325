//! WordPress core download and unpacking.
//!
//! Fetches a WordPress distribution archive over HTTP, optionally caching it
//! in the user cache directory, and unpacks it into the local server folder
//! with leading path components stripped (`wordpress/index.php` → `index.php`).

pub mod archive;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, instrument};
use url::Url;

use themekit_shared::{Result, ThemekitError};

pub use archive::{extract, find_archives};

/// User-Agent string for download requests.
const USER_AGENT: &str = concat!("themekit/", env!("CARGO_PKG_VERSION"));

/// File name used when the URL path has no usable last segment.
const FALLBACK_ARCHIVE_NAME: &str = "wordpress.zip";

/// Options for [`download`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Directory to reuse archives from. `latest.*` archives are never cached
    /// because their contents change between releases.
    pub cache_dir: Option<PathBuf>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            cache_dir: None,
        }
    }
}

/// `~/.cache/themekit/wordpress` (platform equivalent), if resolvable.
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("themekit").join("wordpress"))
}

/// Archive file name for a download URL (its last path segment).
pub fn archive_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| FALLBACK_ARCHIVE_NAME.to_string())
}

fn is_cacheable(name: &str) -> bool {
    !name.starts_with("latest")
}

/// Download `url` into `dest_dir`, returning the archive path.
#[instrument(skip_all, fields(url = %url, dest = %dest_dir.display()))]
pub async fn download(url: &Url, dest_dir: &Path, opts: &DownloadOptions) -> Result<PathBuf> {
    let name = archive_name(url);
    std::fs::create_dir_all(dest_dir).map_err(|e| ThemekitError::io(dest_dir, e))?;
    let target = dest_dir.join(&name);

    let cached = opts
        .cache_dir
        .as_ref()
        .filter(|_| is_cacheable(&name))
        .map(|dir| dir.join(&name));

    if let Some(cached) = cached.as_ref().filter(|p| p.is_file()) {
        info!(archive = %cached.display(), "using cached archive");
        std::fs::copy(cached, &target).map_err(|e| ThemekitError::io(&target, e))?;
        return Ok(target);
    }

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| ThemekitError::Network(format!("client build: {e}")))?;

    info!("downloading WordPress");
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| ThemekitError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ThemekitError::Network(format!("{url}: HTTP {status}")));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ThemekitError::Network(format!("{url}: {e}")))?;

    write_atomic(&target, &body)?;
    debug!(bytes = body.len(), archive = %target.display(), "archive written");

    if let Some(cached) = cached {
        if let Some(parent) = cached.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ThemekitError::io(parent, e))?;
        }
        write_atomic(&cached, &body)?;
        debug!(archive = %cached.display(), "archive cached");
    }

    Ok(target)
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(target: &Path, contents: &[u8]) -> Result<()> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = target.with_file_name(format!(".{file_name}.part"));

    std::fs::write(&temp, contents).map_err(|e| ThemekitError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| ThemekitError::io(target, e))?;
    Ok(())
}
