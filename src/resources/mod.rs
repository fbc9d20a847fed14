use std::fmt;

use anyhow::Context;

/**
 * This module contains all logic for fetching environment maps and models from
 * remote URLs or the local asset directory.
 */
pub mod gltf_asset;
pub mod hdr;

pub use self::gltf_asset::{GltfAsset, load_gltf};
pub use self::hdr::{HdrImage, load_hdr};

/// Download progress of a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    /// `None` when the transport does not announce a length.
    pub total: Option<u64>,
}

impl Progress {
    pub fn new(loaded: u64, total: Option<u64>) -> Self {
        Self { loaded, total }
    }

    /// `loaded / total * 100`, if the total is known and non-zero.
    pub fn percent(&self) -> Option<f64> {
        self.total
            .filter(|&total| total > 0)
            .map(|total| self.loaded as f64 / total as f64 * 100.0)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percent() {
            Some(percent) => write!(f, "{}% loaded", percent),
            None => write!(f, "{} bytes loaded", self.loaded),
        }
    }
}

pub(crate) fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Resolve `uri` relative to the directory of `base`.
///
/// Absolute URLs are returned unchanged.
pub fn resolve(base: &str, uri: &str) -> String {
    if is_remote(uri) || uri.starts_with('/') {
        return uri.to_string();
    }
    match base.rfind('/') {
        Some(idx) => format!("{}{}", &base[..=idx], uri),
        None => uri.to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    if is_remote(file_name) {
        return Ok(reqwest::Url::parse(file_name)?);
    }
    let window = web_sys::window().context("no global window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("no page origin: {:?}", e))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

#[cfg(not(target_arch = "wasm32"))]
fn asset_path(file_name: &str) -> std::path::PathBuf {
    std::path::Path::new("./").join("assets").join(file_name)
}

pub async fn load_binary(source: &str) -> anyhow::Result<Vec<u8>> {
    load_binary_with_progress(source, |_| ()).await
}

/// Fetch `source` in chunks, reporting progress after every chunk.
///
/// Remote sources go through HTTP; anything else is an asset file.
pub async fn load_binary_with_progress(
    source: &str,
    mut on_progress: impl FnMut(Progress),
) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(source)?;
        fetch_http(url.as_str(), &mut on_progress).await?
    };

    #[cfg(not(target_arch = "wasm32"))]
    let data = if is_remote(source) {
        fetch_http(source, &mut on_progress).await?
    } else {
        use tokio::io::AsyncReadExt;

        let path = asset_path(source);
        let mut file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("cannot open {}", path.display()))?;
        let total = file.metadata().await.ok().map(|m| m.len());
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; 64 * 1024];
        loop {
            let read = file.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..read]);
            on_progress(Progress::new(data.len() as u64, total));
        }
        data
    };

    Ok(data)
}

// `bytes_stream` is the only chunked body reader the wasm `Response` offers
async fn fetch_http(url: &str, on_progress: &mut impl FnMut(Progress)) -> anyhow::Result<Vec<u8>> {
    use futures::StreamExt;

    let response = reqwest::get(url).await?.error_for_status()?;
    let total = response.content_length();
    let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.with_context(|| format!("failed to read the body of {url}"))?;
        data.extend_from_slice(&chunk);
        on_progress(Progress::new(data.len() as u64, total));
    }
    Ok(data)
}
