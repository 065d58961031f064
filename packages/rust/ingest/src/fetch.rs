//! Cached source-file downloads.
//!
//! Upstream files are fetched once into the raw-cache directory and
//! reused on later runs. There is deliberately no retry or backoff
//! here; a failed download surfaces immediately and the caller decides
//! whether to continue with cached data.

use std::path::{Path, PathBuf};

use url::Url;

use jobatlas_shared::{JobAtlasError, Result};

/// Download `url` into `dest_dir`, returning the local path.
///
/// An already-present file is reused without touching the network.
pub async fn download_cached(url: &str, dest_dir: &Path) -> Result<PathBuf> {
    let parsed = Url::parse(url)
        .map_err(|e| JobAtlasError::Fetch(format!("invalid source URL '{url}': {e}")))?;
    let dest_path = dest_dir.join(cache_file_name(&parsed));

    if dest_path.exists() {
        tracing::debug!(path = %dest_path.display(), "using cached source file");
        return Ok(dest_path);
    }

    std::fs::create_dir_all(dest_dir).map_err(|e| JobAtlasError::io(dest_dir, e))?;

    tracing::info!(%url, "downloading source file");
    let client = reqwest::Client::builder()
        .user_agent(concat!("JobAtlas/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .map_err(|e| JobAtlasError::Fetch(format!("client build: {e}")))?;

    let response = client
        .get(parsed.as_str())
        .send()
        .await
        .map_err(|e| JobAtlasError::Fetch(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(JobAtlasError::Fetch(format!("{url}: HTTP {status}")));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| JobAtlasError::Fetch(format!("{url}: {e}")))?;

    std::fs::write(&dest_path, &body).map_err(|e| JobAtlasError::io(&dest_path, e))?;
    tracing::info!(
        path = %dest_path.display(),
        bytes = body.len(),
        "saved source file"
    );
    Ok(dest_path)
}

/// Local cache file name for a URL: its last path segment, or the host
/// when the path is empty.
fn cache_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| url.host_str().unwrap_or("download").to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_name_from_url_path() {
        let url = Url::parse("https://example.com/files/us_occupational_data.csv")
            .expect("parse url");
        assert_eq!(cache_file_name(&url), "us_occupational_data.csv");
    }

    #[test]
    fn cache_name_falls_back_to_host() {
        let url = Url::parse("https://example.com/").expect("parse url");
        assert_eq!(cache_file_name(&url), "example.com");
    }

    #[tokio::test]
    async fn cached_file_skips_network() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cached = tmp.path().join("task_ratings.csv");
        std::fs::write(&cached, "occupation_code,task_id\n").expect("seed cache");

        // Unroutable host: reaching the network would fail, so success
        // proves the cache hit.
        let path = download_cached(
            "http://jobatlas.invalid/task_ratings.csv",
            tmp.path(),
        )
        .await
        .expect("cache hit");
        assert_eq!(path, cached);
    }
}
